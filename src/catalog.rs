//! Product catalog: subscription products offered during registration.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::api::OnboardingBackend;
use crate::error::FetchError;

/// A subscription product as published by the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Product {
    pub product_id: i64,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub price_per_user_monthly: Decimal,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

/// Immutable snapshot of the catalog for one registration session.
#[derive(Debug, Clone, Default)]
pub struct ProductCatalog {
    products: Vec<Product>,
}

impl ProductCatalog {
    /// Build a catalog, dropping duplicate ids (first wins) and negative prices.
    pub fn new(products: Vec<Product>) -> Self {
        let mut kept: Vec<Product> = Vec::with_capacity(products.len());
        for product in products {
            if product.price_per_user_monthly.is_sign_negative() {
                warn!(product_id = product.product_id, "Dropping product with negative price");
                continue;
            }
            if kept.iter().any(|p| p.product_id == product.product_id) {
                warn!(product_id = product.product_id, "Dropping duplicate product id");
                continue;
            }
            kept.push(product);
        }
        Self { products: kept }
    }

    /// Fetch the catalog. Fails on transport errors or a non-success envelope.
    pub async fn fetch(backend: &Arc<dyn OnboardingBackend>) -> Result<Self, FetchError> {
        let products = backend.fetch_products().await?;
        debug!(count = products.len(), "Fetched product catalog");
        Ok(Self::new(products))
    }

    /// Fetch the catalog, degrading to an empty one on failure.
    ///
    /// The registration form must keep working without products; the caller
    /// is not expected to retry.
    pub async fn load_or_empty(backend: &Arc<dyn OnboardingBackend>) -> Self {
        match Self::fetch(backend).await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!(error = %e, "Product catalog unavailable; continuing with empty catalog");
                Self::default()
            }
        }
    }

    /// All products in backend order.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products a user may select.
    pub fn active(&self) -> impl Iterator<Item = &Product> {
        self.products.iter().filter(|p| p.is_active)
    }

    /// Look up a selectable product by id.
    pub fn find(&self, product_id: i64) -> Option<&Product> {
        self.active().find(|p| p.product_id == product_id)
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }

    pub fn len(&self) -> usize {
        self.products.len()
    }
}

//! Backend API: the portal's REST service as seen by the onboarding core.

pub mod envelope;
pub mod http;

use async_trait::async_trait;
use serde::Serialize;

use crate::catalog::Product;
use crate::error::FetchError;
use crate::registration::{AccountStatus, RegistrationPayload};

pub use envelope::{ApiRequest, ApiResponse};
pub use http::HttpBackend;

/// Endpoint paths consumed by onboarding.
pub mod endpoints {
    pub const PRODUCTS: &str = "/master/product/public";
    pub const EMPLOYER_REGISTER: &str = "/accounts/employer-register";
    pub const EMPLOYER_REGISTER_PAID: &str = "/accounts/employer-register-paid";
    pub const EMPLOYER_STATUS: &str = "/accounts/get-employer-status";
}

/// Result of an employer status query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub status: AccountStatus,
    pub rejection_reason: Option<String>,
}

impl StatusReport {
    /// Parse the `Data` object of a status response.
    pub fn from_data(data: &serde_json::Value) -> Option<Self> {
        let status = envelope::field_str(data, "Status").and_then(|s| AccountStatus::parse(&s))?;
        let rejection_reason = envelope::field_str(data, "RejectionReason")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Some(Self {
            status,
            rejection_reason,
        })
    }
}

/// Backend operations the onboarding flow depends on.
///
/// Registration calls return the raw normalized envelope: a `Success: false`
/// answer is a business outcome for the submitter to interpret, not a
/// transport failure.
#[async_trait]
pub trait OnboardingBackend: Send + Sync {
    /// `GET /master/product/public`.
    async fn fetch_products(&self) -> Result<Vec<Product>, FetchError>;

    /// `POST /accounts/employer-register`.
    async fn register_employer(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<ApiResponse, FetchError>;

    /// `POST /accounts/employer-register-paid`.
    async fn register_employer_paid(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<ApiResponse, FetchError>;

    /// `POST /accounts/get-employer-status`.
    async fn get_employer_status(&self, emp_id: &str) -> Result<StatusReport, FetchError>;
}

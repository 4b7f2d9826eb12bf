//! Payment processors.
//!
//! Only a simulated gateway ships today. A real integration implements
//! [`PaymentProcessor`] and is handed to the simulator in its place.

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use tracing::{debug, info};

use super::model::{PaymentMethod, PaymentReceipt};
use crate::error::PaymentError;

/// Charges a payment method.
#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    /// Human-readable gateway name for logs.
    fn name(&self) -> &str;

    /// Settle `amount` against `method`.
    async fn charge(
        &self,
        amount: Decimal,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError>;
}

/// Local stand-in for a gateway: waits a fixed delay, then settles.
pub struct SimulatedProcessor {
    delay: Duration,
    declines_remaining: AtomicU32,
}

impl SimulatedProcessor {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            declines_remaining: AtomicU32::new(0),
        }
    }

    /// Decline the next `count` charges before succeeding again.
    pub fn decline_next(&self, count: u32) {
        self.declines_remaining.store(count, Ordering::SeqCst);
    }

    fn take_decline(&self) -> bool {
        self.declines_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedProcessor {
    fn name(&self) -> &str {
        "simulated"
    }

    async fn charge(
        &self,
        amount: Decimal,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError> {
        debug!(method = %method.kind(), %amount, delay_ms = self.delay.as_millis() as u64, "Simulating settlement");
        tokio::time::sleep(self.delay).await;

        if self.take_decline() {
            return Err(PaymentError::Declined {
                reason: "Simulated gateway declined the charge".to_string(),
            });
        }

        let reference = simulated_reference();
        info!(method = %method.kind(), %amount, reference = %reference, "Simulated payment settled");
        Ok(PaymentReceipt {
            reference,
            amount,
            method: method.kind(),
        })
    }
}

fn simulated_reference() -> String {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(12)
        .map(char::from)
        .collect();
    format!("SIM-{}", suffix.to_uppercase())
}

//! Payment modal state machine.
//!
//! Idle → FormOpen → Submitting → Succeeded | Failed. Closing the modal
//! while Submitting cancels the in-flight settlement; nothing is finalized.

use std::sync::Arc;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use super::model::{PaymentMethod, PaymentReceipt};
use super::processor::PaymentProcessor;
use crate::error::{FlowError, PaymentError};
use crate::notify::{Notice, Notifier};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentPhase {
    Idle,
    FormOpen,
    Submitting,
    Succeeded,
    Failed,
}

impl PaymentPhase {
    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: PaymentPhase) -> bool {
        use PaymentPhase::*;
        matches!(
            (self, target),
            (Idle, FormOpen)
                | (FormOpen, Submitting)
                | (FormOpen, Idle)
                | (Submitting, Succeeded)
                | (Submitting, Failed)
                | (Submitting, Idle)
                | (Failed, FormOpen)
                | (Failed, Idle)
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for PaymentPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::FormOpen => "form_open",
            Self::Submitting => "submitting",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

struct SimulatorState {
    phase: PaymentPhase,
    history: Vec<PaymentPhase>,
    /// Set while Submitting; sending `true` abandons the settlement.
    cancel_tx: Option<watch::Sender<bool>>,
}

impl SimulatorState {
    fn transition(&mut self, target: PaymentPhase) -> Result<(), FlowError> {
        if !self.phase.can_transition_to(target) {
            return Err(FlowError::InvalidTransition {
                from: self.phase.to_string(),
                to: target.to_string(),
            });
        }
        debug!(from = %self.phase, to = %target, "Payment phase transition");
        self.phase = target;
        self.history.push(target);
        Ok(())
    }
}

/// Drives one payment modal against a [`PaymentProcessor`].
pub struct PaymentSimulator {
    processor: Arc<dyn PaymentProcessor>,
    notifier: Arc<dyn Notifier>,
    state: Mutex<SimulatorState>,
}

impl PaymentSimulator {
    pub fn new(processor: Arc<dyn PaymentProcessor>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            processor,
            notifier,
            state: Mutex::new(SimulatorState {
                phase: PaymentPhase::Idle,
                history: vec![PaymentPhase::Idle],
                cancel_tx: None,
            }),
        }
    }

    pub async fn phase(&self) -> PaymentPhase {
        self.state.lock().await.phase
    }

    /// Every phase entered so far, starting with `Idle`.
    pub async fn history(&self) -> Vec<PaymentPhase> {
        self.state.lock().await.history.clone()
    }

    /// Open the modal. Also used to retry after a failure.
    pub async fn open(&self) -> Result<(), FlowError> {
        let mut state = self.state.lock().await;
        if state.phase == PaymentPhase::FormOpen {
            return Ok(());
        }
        state.transition(PaymentPhase::FormOpen)
    }

    /// Submit the form: validate presence, then settle.
    ///
    /// Blank method fields keep the modal open and raise a notice without
    /// touching the processor.
    pub async fn submit(
        &self,
        amount: Decimal,
        method: &PaymentMethod,
    ) -> Result<PaymentReceipt, PaymentError> {
        let mut cancel_rx = {
            let mut state = self.state.lock().await;
            match state.phase {
                PaymentPhase::FormOpen => {}
                PaymentPhase::Submitting => return Err(PaymentError::InProgress),
                _ => return Err(PaymentError::NotOpen),
            }

            let missing = method.missing_fields();
            if !missing.is_empty() {
                self.notifier.notify(Notice::warning(format!(
                    "Please fill in all {} payment details",
                    method.kind()
                )));
                return Err(PaymentError::MissingDetails { fields: missing });
            }

            state
                .transition(PaymentPhase::Submitting)
                .map_err(|_| PaymentError::NotOpen)?;
            let (tx, rx) = watch::channel(false);
            state.cancel_tx = Some(tx);
            rx
        };

        info!(
            processor = self.processor.name(),
            method = %method.kind(),
            %amount,
            "Payment submitted"
        );

        let outcome = tokio::select! {
            result = self.processor.charge(amount, method) => result,
            _ = cancel_rx.changed() => Err(PaymentError::Cancelled),
        };

        let mut state = self.state.lock().await;
        state.cancel_tx = None;

        // Closed while the charge was settling: discard the outcome.
        if state.phase != PaymentPhase::Submitting {
            debug!(phase = %state.phase, "Discarding settlement for closed payment modal");
            return Err(PaymentError::Cancelled);
        }

        match outcome {
            Ok(receipt) => {
                state
                    .transition(PaymentPhase::Succeeded)
                    .map_err(|_| PaymentError::Cancelled)?;
                self.notifier.notify(Notice::success("Payment successful"));
                Ok(receipt)
            }
            Err(PaymentError::Cancelled) => {
                let _ = state.transition(PaymentPhase::Idle);
                Err(PaymentError::Cancelled)
            }
            Err(e) => {
                let _ = state.transition(PaymentPhase::Failed);
                warn!(error = %e, "Payment failed");
                self.notifier.notify(Notice::error(format!(
                    "Payment failed: {e}. Please try again."
                )));
                Err(e)
            }
        }
    }

    /// Close the modal. Cancels an in-flight settlement. No-op when idle or done.
    pub async fn close(&self) {
        let mut state = self.state.lock().await;
        match state.phase {
            PaymentPhase::Idle | PaymentPhase::Succeeded => {}
            PaymentPhase::Submitting => {
                if let Some(tx) = state.cancel_tx.take() {
                    let _ = tx.send(true);
                }
                let _ = state.transition(PaymentPhase::Idle);
                info!("Payment modal closed during settlement");
            }
            PaymentPhase::FormOpen | PaymentPhase::Failed => {
                let _ = state.transition(PaymentPhase::Idle);
            }
        }
    }
}

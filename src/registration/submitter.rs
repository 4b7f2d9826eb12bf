//! Registration submitter: sends a validated draft to the backend.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{info, warn};

use super::model::{AccountStatus, EMPLOYER_ROLE, EmployerAccount, RegistrationDraft};
use crate::api::envelope::{self, ApiResponse};
use crate::api::{OnboardingBackend, endpoints};
use crate::error::{FetchError, RegistrationError};
use crate::notify::{Notice, Notifier};
use crate::payment::PaymentInfo;
use crate::session::{SessionStore, SessionUser};

/// Submits registrations, notifies the user, and records the new session user.
pub struct RegistrationSubmitter {
    backend: Arc<dyn OnboardingBackend>,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    /// Once `true`, answers that arrive late produce no notice or session write.
    cancel: Option<watch::Receiver<bool>>,
}

impl RegistrationSubmitter {
    pub fn new(
        backend: Arc<dyn OnboardingBackend>,
        session: Arc<SessionStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            backend,
            session,
            notifier,
            cancel: None,
        }
    }

    /// Tie follow-up effects to a cancellation signal.
    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Register for administrator review. The account comes back pending.
    pub async fn submit_pending(
        &self,
        draft: &RegistrationDraft,
    ) -> Result<EmployerAccount, RegistrationError> {
        info!(mobile = %draft.mobile_no, "Submitting employer registration");
        let result = self.backend.register_employer(&draft.to_payload()).await;
        let account = self.finish(
            draft,
            result,
            endpoints::EMPLOYER_REGISTER,
            AccountStatus::Pending,
        )?;

        self.announce(
            &account,
            Notice::success("Registration submitted. Your account is pending approval."),
        )
        .await;
        Ok(account)
    }

    /// Register with a settled payment. The account normally comes back
    /// approved; the backend may still hold it for review or refuse it.
    pub async fn submit_paid(
        &self,
        draft: &RegistrationDraft,
        payment: &PaymentInfo,
    ) -> Result<EmployerAccount, RegistrationError> {
        info!(
            mobile = %draft.mobile_no,
            method = %payment.method,
            amount = %payment.amount,
            reference = %payment.reference,
            "Submitting paid employer registration"
        );
        let result = self
            .backend
            .register_employer_paid(&draft.to_paid_payload(payment))
            .await;
        let account = self.finish(
            draft,
            result,
            endpoints::EMPLOYER_REGISTER_PAID,
            AccountStatus::Approved,
        )?;

        let notice = match account.status {
            AccountStatus::Approved => Notice::success("Payment received. Your account is approved."),
            AccountStatus::Pending => {
                Notice::info("Payment received. Your account is pending approval.")
            }
            AccountStatus::Rejected => Notice::error(match account.rejection_reason {
                Some(ref r) => format!("Your registration was rejected: {r}. Please contact support."),
                None => "Your registration was rejected. Please contact support.".to_string(),
            }),
        };
        self.announce(&account, notice).await;
        Ok(account)
    }

    fn finish(
        &self,
        draft: &RegistrationDraft,
        result: Result<ApiResponse, FetchError>,
        endpoint: &str,
        expected: AccountStatus,
    ) -> Result<EmployerAccount, RegistrationError> {
        let outcome = result
            .map_err(RegistrationError::from)
            .and_then(|resp| {
                if resp.success {
                    account_from_response(draft, &resp, endpoint, expected)
                } else {
                    Err(RegistrationError::Rejected {
                        message: resp.message_or("Registration failed"),
                    })
                }
            });

        if let Err(ref e) = outcome {
            warn!(endpoint, error = %e, "Registration failed");
            if !self.is_cancelled() {
                self.notifier.notify(Notice::error(e.user_message()));
            }
        }
        outcome
    }

    async fn announce(&self, account: &EmployerAccount, notice: Notice) {
        if self.is_cancelled() {
            info!(emp_id = %account.emp_id, "Registration answered after cancellation; not recording it");
            return;
        }
        self.notifier.notify(notice);
        self.remember(account).await;
    }

    async fn remember(&self, account: &EmployerAccount) {
        if let Err(e) = self.session.write(SessionUser::from_account(account)).await {
            warn!(error = %e, "Registered, but failed to store session user");
        }
    }
}

fn account_from_response(
    draft: &RegistrationDraft,
    resp: &ApiResponse,
    endpoint: &str,
    expected: AccountStatus,
) -> Result<EmployerAccount, RegistrationError> {
    let data = &resp.data;
    let emp_id = ["EmpId", "UserId", "Id"]
        .iter()
        .find_map(|key| envelope::field_str(data, key))
        .filter(|id| !id.trim().is_empty())
        .ok_or_else(|| FetchError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: "registration response carries no employer id".to_string(),
        })?;

    let status = envelope::field_str(data, "Status")
        .and_then(|s| AccountStatus::parse(&s))
        .unwrap_or(expected);
    if status != expected {
        warn!(%status, %expected, "Backend returned an unexpected account status");
    }

    Ok(EmployerAccount {
        emp_id,
        name: envelope::field_str(data, "Name").unwrap_or_else(|| draft.name.trim().to_string()),
        role: envelope::field_str(data, "Role").unwrap_or_else(|| EMPLOYER_ROLE.to_string()),
        status,
        rejection_reason: envelope::field_str(data, "RejectionReason"),
    })
}

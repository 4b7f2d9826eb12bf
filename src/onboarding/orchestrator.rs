//! OnboardingOrchestrator: owns the flow state and composes the submitter,
//! payment simulator, and status poller.
//!
//! A paying draft goes through the payment modal and is normally approved on
//! the spot. Everything else, including a paid registration the backend holds
//! for review, is polled until an administrator decides. Registration always completes before the flow state moves.

use std::sync::{Arc, PoisonError, Weak};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, RwLock, watch};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::state::{FlowState, Navigation};
use crate::api::OnboardingBackend;
use crate::catalog::ProductCatalog;
use crate::config::OnboardConfig;
use crate::error::{FlowError, Result};
use crate::notify::{Notice, Notifier};
use crate::payment::{PaymentInfo, PaymentMethod, PaymentPhase, PaymentProcessor, PaymentSimulator};
use crate::poller::{PollEvent, PollerHandle, StatusPoller};
use crate::registration::{
    AccountStatus, RegistrationDraft, RegistrationIntent, RegistrationSubmitter, intent,
    paying_product, validate,
};
use crate::session::SessionStore;

/// Collaborators injected into the orchestrator.
pub struct OnboardingDeps {
    pub backend: Arc<dyn OnboardingBackend>,
    pub session: Arc<SessionStore>,
    pub notifier: Arc<dyn Notifier>,
    pub processor: Arc<dyn PaymentProcessor>,
}

/// Timers the flow runs on.
#[derive(Debug, Clone, Copy)]
pub struct FlowTimings {
    pub poll_interval: Duration,
    /// Pause between paid approval and the dashboard redirect.
    pub redirect_delay: Duration,
}

impl FlowTimings {
    pub fn from_config(config: &OnboardConfig) -> Self {
        Self {
            poll_interval: config.poll_interval,
            redirect_delay: config.redirect_delay,
        }
    }
}

impl Default for FlowTimings {
    fn default() -> Self {
        Self::from_config(&OnboardConfig::default())
    }
}

/// Onboarding status returned by the REST endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OnboardingStatus {
    pub flow_id: Uuid,
    #[serde(flatten)]
    pub state: FlowState,
    pub payment_phase: PaymentPhase,
    pub polling: bool,
    pub contact_support: bool,
    pub abandoned: bool,
    pub navigations: Vec<Navigation>,
}

/// Coordinates one employer's onboarding from form submission to dashboard.
pub struct OnboardingOrchestrator {
    flow_id: Uuid,
    timings: FlowTimings,
    backend: Arc<dyn OnboardingBackend>,
    session: Arc<SessionStore>,
    notifier: Arc<dyn Notifier>,
    submitter: RegistrationSubmitter,
    poller: StatusPoller,
    payment: PaymentSimulator,
    catalog: RwLock<ProductCatalog>,
    state: RwLock<FlowState>,
    state_tx: watch::Sender<FlowState>,
    draft: RwLock<Option<RegistrationDraft>>,
    /// Payment that settled but whose paid registration has not gone through yet.
    settled: Mutex<Option<PaymentInfo>>,
    poller_handle: Mutex<Option<PollerHandle>>,
    nav_tx: watch::Sender<Option<Navigation>>,
    nav_history: std::sync::Mutex<Vec<Navigation>>,
    /// Flips to `true` once on abandon; cancels timers and blocks mutation.
    shutdown_tx: watch::Sender<bool>,
}

impl OnboardingOrchestrator {
    pub fn new(deps: OnboardingDeps, timings: FlowTimings) -> Arc<Self> {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let submitter = RegistrationSubmitter::new(
            Arc::clone(&deps.backend),
            Arc::clone(&deps.session),
            Arc::clone(&deps.notifier),
        )
        .with_cancel(shutdown_rx);
        let poller =
            StatusPoller::new(Arc::clone(&deps.backend)).with_session(Arc::clone(&deps.session));
        let payment = PaymentSimulator::new(deps.processor, Arc::clone(&deps.notifier));
        let (nav_tx, _) = watch::channel(None);
        let (state_tx, _) = watch::channel(FlowState::form());

        Arc::new(Self {
            flow_id: Uuid::new_v4(),
            timings,
            backend: deps.backend,
            session: deps.session,
            notifier: deps.notifier,
            submitter,
            poller,
            payment,
            catalog: RwLock::new(ProductCatalog::default()),
            state: RwLock::new(FlowState::form()),
            state_tx,
            draft: RwLock::new(None),
            settled: Mutex::new(None),
            poller_handle: Mutex::new(None),
            nav_tx,
            nav_history: std::sync::Mutex::new(Vec::new()),
            shutdown_tx,
        })
    }

    pub fn flow_id(&self) -> Uuid {
        self.flow_id
    }

    /// Load the product catalog for the form. Returns the number of products.
    pub async fn load_catalog(&self) -> usize {
        let catalog = ProductCatalog::load_or_empty(&self.backend).await;
        let count = catalog.len();
        *self.catalog.write().await = catalog;
        count
    }

    pub async fn catalog(&self) -> ProductCatalog {
        self.catalog.read().await.clone()
    }

    pub async fn state(&self) -> FlowState {
        self.state.read().await.clone()
    }

    /// Subscribe to flow state changes.
    pub fn state_changes(&self) -> watch::Receiver<FlowState> {
        self.state_tx.subscribe()
    }

    /// The draft submitted from the form, kept across a dismissed payment modal.
    pub async fn draft(&self) -> Option<RegistrationDraft> {
        self.draft.read().await.clone()
    }

    pub async fn payment_phase(&self) -> PaymentPhase {
        self.payment.phase().await
    }

    pub async fn payment_history(&self) -> Vec<PaymentPhase> {
        self.payment.history().await
    }

    /// Subscribe to navigation requests for the host router.
    pub fn navigation(&self) -> watch::Receiver<Option<Navigation>> {
        self.nav_tx.subscribe()
    }

    /// Every navigation issued so far, in order.
    pub fn navigations(&self) -> Vec<Navigation> {
        self.nav_history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_abandoned(&self) -> bool {
        *self.shutdown_tx.borrow()
    }

    pub async fn is_polling(&self) -> bool {
        self.poller_handle
            .lock()
            .await
            .as_ref()
            .is_some_and(|h| !h.is_stopped())
    }

    pub async fn status(&self) -> OnboardingStatus {
        let state = self.state().await;
        OnboardingStatus {
            flow_id: self.flow_id,
            contact_support: state.offers_support_contact(),
            state,
            payment_phase: self.payment_phase().await,
            polling: self.is_polling().await,
            abandoned: self.is_abandoned(),
            navigations: self.navigations(),
        }
    }

    /// Submit the registration form.
    ///
    /// Paying drafts open the payment modal; the backend is not called until
    /// payment settles. Other drafts are registered as pending and polled.
    /// Any failure leaves the flow on the form with the draft intact.
    pub async fn submit(self: &Arc<Self>, draft: RegistrationDraft) -> Result<FlowState> {
        self.ensure_active()?;
        let current = self.state().await;
        if !matches!(current, FlowState::Form { .. }) {
            return Err(FlowError::InvalidTransition {
                from: current.to_string(),
                to: "submission".to_string(),
            }
            .into());
        }

        if let Err(e) = validate(&draft) {
            warn!(flow_id = %self.flow_id, error = %e, "Registration draft failed validation");
            let fields: Vec<&str> = e.errors.iter().map(|f| f.field).collect();
            self.notifier.notify(Notice::warning(format!(
                "Please correct the following fields: {}",
                fields.join(", ")
            )));
            return Err(e.into());
        }

        let product = {
            let catalog = self.catalog.read().await;
            paying_product(&draft, &catalog)
        };
        let product = match product {
            Ok(product) => product,
            Err(e) => {
                self.notifier.notify(Notice::error(e.user_message()));
                return Err(e.into());
            }
        };

        match product {
            Some(product) => {
                let next = FlowState::PaymentFlow {
                    product_id: product.product_id,
                };
                self.transition(next.clone()).await?;
                *self.draft.write().await = Some(draft);
                self.payment.open().await?;
                info!(
                    flow_id = %self.flow_id,
                    product_id = product.product_id,
                    price = %product.price_per_user_monthly,
                    "Awaiting payment"
                );
                Ok(next)
            }
            None => {
                let account = self.submitter.submit_pending(&draft).await?;
                self.ensure_active()?;
                let next = FlowState::Pending {
                    emp_id: account.emp_id.clone(),
                };
                self.transition(next.clone()).await?;
                *self.draft.write().await = Some(draft);
                self.start_polling(account.emp_id).await;
                self.navigate(Navigation::PendingStatus);
                Ok(next)
            }
        }
    }

    /// Pay with `method` and register.
    ///
    /// An approved answer schedules the dashboard redirect. If the backend
    /// holds the paid account for review the flow goes to pending and polls,
    /// and a refusal ends it as rejected. A payment that settled before a
    /// failed paid registration is reused on retry rather than charged again.
    pub async fn pay(self: &Arc<Self>, method: PaymentMethod) -> Result<FlowState> {
        self.ensure_active()?;
        let current = self.state().await;
        let not_payable = || FlowError::InvalidTransition {
            from: current.to_string(),
            to: "payment".to_string(),
        };
        if !matches!(current, FlowState::PaymentFlow { .. }) {
            return Err(not_payable().into());
        }
        let draft = self.draft().await.ok_or_else(not_payable)?;

        let resolved = {
            let catalog = self.catalog.read().await;
            intent(&draft, &catalog, method)?
        };
        let RegistrationIntent::PayNow { product, method } = resolved else {
            return Err(not_payable().into());
        };

        let settled = self.settled.lock().await.clone();
        let payment = match settled {
            Some(info) => {
                info!(flow_id = %self.flow_id, reference = %info.reference, "Reusing settled payment");
                info
            }
            None => {
                if self.payment.phase().await == PaymentPhase::Failed {
                    self.payment.open().await?;
                }
                let receipt = self
                    .payment
                    .submit(product.price_per_user_monthly, &method)
                    .await?;
                let info = receipt.into_info();
                *self.settled.lock().await = Some(info.clone());
                info
            }
        };

        self.ensure_active()?;
        let account = self.submitter.submit_paid(&draft, &payment).await?;
        self.ensure_active()?;

        let next = match account.status {
            AccountStatus::Approved => FlowState::Approved {
                emp_id: account.emp_id.clone(),
            },
            AccountStatus::Pending => FlowState::Pending {
                emp_id: account.emp_id.clone(),
            },
            AccountStatus::Rejected => FlowState::Rejected {
                reason: account.rejection_reason.clone(),
            },
        };
        self.transition(next.clone()).await?;
        self.settled.lock().await.take();

        match account.status {
            AccountStatus::Approved => self.schedule_redirect(),
            AccountStatus::Pending => {
                warn!(flow_id = %self.flow_id, emp_id = %account.emp_id, "Paid registration held for review");
                self.start_polling(account.emp_id).await;
                self.navigate(Navigation::PendingStatus);
            }
            AccountStatus::Rejected => {
                warn!(flow_id = %self.flow_id, emp_id = %account.emp_id, "Paid registration refused");
            }
        }
        Ok(next)
    }

    /// Dismiss the payment modal and return to the form, draft intact.
    ///
    /// Once a payment has settled the modal stays until registration completes.
    pub async fn close_payment(&self) -> Result<FlowState> {
        self.ensure_active()?;
        if self.settled.lock().await.is_some() {
            info!(flow_id = %self.flow_id, "Payment already settled; keeping payment flow open");
            return Ok(self.state().await);
        }

        self.payment.close().await;
        if matches!(*self.state.read().await, FlowState::PaymentFlow { .. }) {
            self.transition(FlowState::form()).await?;
        }
        Ok(self.state().await)
    }

    /// Pick up a flow from the stored session user.
    ///
    /// A pending user re-enters the pending view and polling restarts. A
    /// missing identity is fatal and redirects to login.
    pub async fn resume(self: &Arc<Self>) -> Result<FlowState> {
        self.ensure_active()?;
        let user = match self.session.require_user() {
            Ok(user) => user,
            Err(e) => {
                warn!(flow_id = %self.flow_id, "No session user; redirecting to login");
                self.navigate(Navigation::Login);
                return Err(e.into());
            }
        };
        info!(flow_id = %self.flow_id, user_id = %user.user_id, status = %user.status, "Resuming onboarding");

        let restored = match user.status {
            AccountStatus::Pending => FlowState::Pending {
                emp_id: user.user_id.clone(),
            },
            AccountStatus::Approved => FlowState::Approved {
                emp_id: user.user_id.clone(),
            },
            // The reason is not cached; the next status query would carry it.
            AccountStatus::Rejected => FlowState::Rejected { reason: None },
        };
        self.restore(restored.clone()).await?;

        match user.status {
            AccountStatus::Pending => {
                self.start_polling(user.user_id).await;
                self.navigate(Navigation::PendingStatus);
            }
            AccountStatus::Approved => self.navigate(Navigation::EmployerDashboard),
            AccountStatus::Rejected => {}
        }
        Ok(restored)
    }

    /// Tear the flow down: stop polling, cancel payment and pending redirects.
    /// Nothing mutates the flow afterwards. Safe to call more than once.
    pub async fn abandon(&self) {
        if self.shutdown_tx.send_replace(true) {
            debug!(flow_id = %self.flow_id, "Onboarding already abandoned");
            return;
        }
        if let Some(handle) = self.poller_handle.lock().await.take() {
            handle.stop();
        }
        self.payment.close().await;
        info!(flow_id = %self.flow_id, "Onboarding flow abandoned");
    }

    fn ensure_active(&self) -> std::result::Result<(), FlowError> {
        if self.is_abandoned() {
            Err(FlowError::Abandoned)
        } else {
            Ok(())
        }
    }

    async fn transition(&self, target: FlowState) -> std::result::Result<(), FlowError> {
        let mut state = self.state.write().await;
        if !state.can_transition_to(&target) {
            return Err(FlowError::InvalidTransition {
                from: state.to_string(),
                to: target.to_string(),
            });
        }
        info!(flow_id = %self.flow_id, from = %*state, to = %target, "Onboarding transition");
        self.state_tx.send_replace(target.clone());
        *state = target;
        Ok(())
    }

    /// Jump straight to a state recovered from the session. Only allowed
    /// before anything has been submitted.
    async fn restore(&self, target: FlowState) -> std::result::Result<(), FlowError> {
        let mut state = self.state.write().await;
        if *state != FlowState::form() {
            return Err(FlowError::InvalidTransition {
                from: state.to_string(),
                to: target.to_string(),
            });
        }
        info!(flow_id = %self.flow_id, to = %target, "Onboarding restored from session");
        self.state_tx.send_replace(target.clone());
        *state = target;
        Ok(())
    }

    fn navigate(&self, navigation: Navigation) {
        if self.is_abandoned() {
            debug!(flow_id = %self.flow_id, ?navigation, "Flow abandoned; navigation dropped");
            return;
        }
        {
            let mut history = self
                .nav_history
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            if navigation == Navigation::EmployerDashboard && history.contains(&navigation) {
                debug!(flow_id = %self.flow_id, "Dashboard navigation already issued");
                return;
            }
            history.push(navigation);
        }
        info!(flow_id = %self.flow_id, ?navigation, "Navigating");
        self.nav_tx.send_replace(Some(navigation));
    }

    fn schedule_redirect(self: &Arc<Self>) {
        let this = Arc::downgrade(self);
        let mut shutdown_rx = self.shutdown_tx.subscribe();
        let delay = self.timings.redirect_delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    if let Some(this) = this.upgrade() {
                        this.navigate(Navigation::EmployerDashboard);
                    }
                }
                _ = shutdown_rx.changed() => debug!("Dashboard redirect cancelled"),
            }
        });
    }

    async fn start_polling(self: &Arc<Self>, emp_id: String) {
        let (handle, mut events) = self.poller.start(emp_id, self.timings.poll_interval);
        if let Some(previous) = self.poller_handle.lock().await.replace(handle) {
            previous.stop();
        }
        // Abandoned while the poller was starting
        if self.is_abandoned()
            && let Some(handle) = self.poller_handle.lock().await.take()
        {
            handle.stop();
        }

        let this: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(this) = this.upgrade() else {
                    break;
                };
                this.on_poll_event(event).await;
            }
        });
    }

    async fn on_poll_event(&self, event: PollEvent) {
        if self.is_abandoned() {
            return;
        }
        match event {
            PollEvent::Pending => debug!(flow_id = %self.flow_id, "Still awaiting approval"),
            PollEvent::QueryFailed { error } => {
                debug!(flow_id = %self.flow_id, %error, "Status check failed; staying on pending view");
            }
            PollEvent::Approved => {
                {
                    let mut state = self.state.write().await;
                    let FlowState::Pending { emp_id } = &*state else {
                        warn!(flow_id = %self.flow_id, state = %*state, "Approval arrived outside pending state");
                        return;
                    };
                    let next = FlowState::Approved {
                        emp_id: emp_id.clone(),
                    };
                    info!(flow_id = %self.flow_id, from = %*state, to = %next, "Onboarding transition");
                    self.state_tx.send_replace(next.clone());
                    *state = next;
                }
                self.notifier.notify(Notice::success(
                    "Your account has been approved. Welcome aboard!",
                ));
                self.navigate(Navigation::EmployerDashboard);
            }
            PollEvent::Rejected { reason } => {
                let message = match reason {
                    Some(ref r) => {
                        format!("Your registration was rejected: {r}. Please contact support.")
                    }
                    None => "Your registration was rejected. Please contact support.".to_string(),
                };
                if let Err(e) = self.transition(FlowState::Rejected { reason }).await {
                    warn!(flow_id = %self.flow_id, error = %e, "Ignoring rejection");
                    return;
                }
                self.notifier.notify(Notice::error(message));
            }
        }
    }
}

impl std::fmt::Debug for OnboardingOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnboardingOrchestrator")
            .field("flow_id", &self.flow_id)
            .field("timings", &self.timings)
            .finish_non_exhaustive()
    }
}

//! Onboarding flow: takes an employer from the registration form to the
//! dashboard.
//!
//! Submission branches on whether the employer pays. Paying employers go
//! through the payment modal and are approved immediately. Everyone else is
//! registered as pending and polled until an administrator decides.

pub mod orchestrator;
pub mod routes;
pub mod state;

pub use orchestrator::{FlowTimings, OnboardingDeps, OnboardingOrchestrator, OnboardingStatus};
pub use routes::{OnboardingRouteState, onboarding_routes};
pub use state::{FlowState, Navigation, Step};

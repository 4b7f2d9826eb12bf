//! Onboarding flow state machine: tracks which page the user is on.

use serde::{Deserialize, Serialize};

/// Form pages reachable before submission.
///
/// The citizen pages share routing with the employer flow; employers only
/// ever see `EmployerForm`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    EmployerForm,
    MobileVerify,
    OtpVerify,
    ProfileForm,
}

impl Step {
    /// Next page of the citizen sequence, if any.
    pub fn next(&self) -> Option<Step> {
        use Step::*;
        match self {
            MobileVerify => Some(OtpVerify),
            OtpVerify => Some(ProfileForm),
            ProfileForm | EmployerForm => None,
        }
    }
}

impl Default for Step {
    fn default() -> Self {
        Self::EmployerForm
    }
}

impl std::fmt::Display for Step {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::EmployerForm => "employer_form",
            Self::MobileVerify => "mobile_verify",
            Self::OtpVerify => "otp_verify",
            Self::ProfileForm => "profile_form",
        };
        write!(f, "{s}")
    }
}

/// Where the onboarding flow currently is.
///
/// Form → Pending | PaymentFlow; Pending → Approved | Rejected;
/// PaymentFlow → Approved, or back to Form when the modal is dismissed.
/// A paid registration the backend holds for review or refuses moves
/// PaymentFlow → Pending | Rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum FlowState {
    Form { step: Step },
    Pending { emp_id: String },
    PaymentFlow { product_id: i64 },
    Approved { emp_id: String },
    Rejected { reason: Option<String> },
}

impl FlowState {
    pub fn form() -> Self {
        Self::Form {
            step: Step::EmployerForm,
        }
    }

    /// Check if a transition from `self` to `target` is valid.
    pub fn can_transition_to(&self, target: &FlowState) -> bool {
        use FlowState::*;
        match (self, target) {
            (Form { step }, Form { step: to }) => step.next() == Some(*to),
            (Form { .. }, Pending { .. } | PaymentFlow { .. }) => true,
            (PaymentFlow { .. }, Form { .. } | Approved { .. }) => true,
            (PaymentFlow { .. }, Pending { .. } | Rejected { .. }) => true,
            (Pending { .. }, Approved { .. } | Rejected { .. }) => true,
            _ => false,
        }
    }

    /// Whether the flow is over (admitted or refused).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Approved { .. } | Self::Rejected { .. })
    }

    /// Rejected accounts are offered a way to reach support.
    pub fn offers_support_contact(&self) -> bool {
        matches!(self, Self::Rejected { .. })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Form { .. } => "form",
            Self::Pending { .. } => "pending",
            Self::PaymentFlow { .. } => "payment_flow",
            Self::Approved { .. } => "approved",
            Self::Rejected { .. } => "rejected",
        }
    }
}

impl Default for FlowState {
    fn default() -> Self {
        Self::form()
    }
}

impl std::fmt::Display for FlowState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Form { step } => write!(f, "form({step})"),
            other => write!(f, "{}", other.name()),
        }
    }
}

/// Navigation requests issued to the host router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Navigation {
    PendingStatus,
    EmployerDashboard,
    /// Hard redirect when no identity is available.
    Login,
}

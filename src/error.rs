//! Error types for employer onboarding.

use std::fmt;

/// Top-level error type for the onboarding core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Registration error: {0}")]
    Registration(#[from] RegistrationError),

    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// A single field-level problem found before anything reaches the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Wire name of the offending field, e.g. `"MobileNo"`.
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Client-side validation failure, carrying every field error at once.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{} invalid field(s): {}", .errors.len(), join_fields(.errors))]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field == field)
    }
}

fn join_fields(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Catalog or status query failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("HTTP error calling {endpoint}: {reason}")]
    Http { endpoint: String, reason: String },

    #[error("Backend returned status {status} for {endpoint}")]
    Status { endpoint: String, status: u16 },

    #[error("Backend reported failure for {endpoint}: {message}")]
    Rejected { endpoint: String, message: String },

    #[error("Invalid response from {endpoint}: {reason}")]
    InvalidResponse { endpoint: String, reason: String },
}

/// The backend refused (or never acknowledged) a registration submission.
#[derive(Debug, thiserror::Error)]
pub enum RegistrationError {
    /// Backend answered with `Success: false`; `message` is user-facing.
    #[error("{message}")]
    Rejected { message: String },

    #[error("Registration request failed: {0}")]
    Transport(#[from] FetchError),

    #[error("Selected product {product_id} is not in the loaded catalog")]
    UnknownProduct { product_id: i64 },
}

impl RegistrationError {
    /// Text suitable for a toast.
    pub fn user_message(&self) -> String {
        match self {
            Self::Rejected { message } if !message.is_empty() => message.clone(),
            Self::Rejected { .. } => "Registration failed".to_string(),
            Self::Transport(_) => "Registration failed. Please try again.".to_string(),
            Self::UnknownProduct { .. } => "Please select a valid product".to_string(),
        }
    }
}

/// Simulated (or real) settlement failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PaymentError {
    #[error("Missing payment details: {}", .fields.join(", "))]
    MissingDetails { fields: Vec<&'static str> },

    #[error("Payment declined: {reason}")]
    Declined { reason: String },

    #[error("Payment cancelled")]
    Cancelled,

    #[error("Payment already in progress")]
    InProgress,

    #[error("Payment form is not open")]
    NotOpen,
}

/// Session store errors.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The only fatal condition: a protected flow needs a user and there is none.
    #[error("No authenticated user in session")]
    MissingIdentity,

    #[error("Failed to persist session to {path}: {reason}")]
    Persist { path: String, reason: String },

    #[error("Corrupt session record at {path}: {reason}")]
    Corrupt { path: String, reason: String },
}

/// Orchestrator state-machine violations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("Cannot transition from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Flow has been abandoned")]
    Abandoned,
}

/// Result type alias for the onboarding core.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_error_lists_fields() {
        let err = ValidationError {
            errors: vec![
                FieldError::new("MobileNo", "must be 10 digits"),
                FieldError::new("Password", "too short"),
            ],
        };
        let text = err.to_string();
        assert!(text.starts_with("2 invalid field(s)"));
        assert!(text.contains("MobileNo: must be 10 digits"));
        assert!(err.has_field("Password"));
        assert!(!err.has_field("Name"));
    }

    #[test]
    fn registration_user_message_prefers_backend_text() {
        let err = RegistrationError::Rejected {
            message: "Mobile number already registered".into(),
        };
        assert_eq!(err.user_message(), "Mobile number already registered");

        let blank = RegistrationError::Rejected {
            message: String::new(),
        };
        assert_eq!(blank.user_message(), "Registration failed");
    }
}

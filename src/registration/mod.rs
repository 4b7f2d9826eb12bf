//! Employer registration: draft model, validation, and submission.

pub mod model;
pub mod submitter;
pub mod validate;

pub use model::{
    AccountStatus, EMPLOYER_ROLE, EmployerAccount, PaidFields, RegistrationDraft,
    RegistrationIntent, RegistrationPayload,
};
pub use submitter::RegistrationSubmitter;
pub use validate::{intent, paying_product, validate, validate_at};

//! Registration draft, intent, and the employer account as observed from the client.

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

use crate::catalog::Product;
use crate::payment::{PaymentInfo, PaymentMethod};

/// Review state of an employer account. Only the backend moves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Pending,
    Approved,
    Rejected,
}

impl AccountStatus {
    /// Parse a backend status string, ignoring case and surrounding whitespace.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(Self::Pending),
            "approved" | "active" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
        }
    }
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An employer account as returned by registration or status queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EmployerAccount {
    pub emp_id: String,
    pub name: String,
    pub role: String,
    pub status: AccountStatus,
    pub rejection_reason: Option<String>,
}

/// Role string the portal uses for employer accounts.
pub const EMPLOYER_ROLE: &str = "Employer";

/// Form data captured when the employer submits registration.
///
/// Lives only for the duration of one onboarding flow.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationDraft {
    pub name: String,
    pub company_name: String,
    pub mobile_no: String,
    pub email_id: String,
    pub aadhar_no: String,
    pub password: SecretString,
    pub ticket: String,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default = "default_licenses")]
    pub licenses: u32,
    #[serde(default)]
    pub established_year: Option<i32>,
    #[serde(rename = "isPaying", default)]
    pub is_paying: bool,
}

fn default_licenses() -> u32 {
    1
}

impl RegistrationDraft {
    /// Wire payload for `employer-register`.
    pub fn to_payload(&self) -> RegistrationPayload {
        RegistrationPayload {
            name: self.name.trim().to_string(),
            company_name: self.company_name.trim().to_string(),
            mobile_no: self.mobile_no.trim().to_string(),
            email_id: self.email_id.trim().to_string(),
            aadhar_no: self.aadhar_no.trim().to_string(),
            password: self.password.expose_secret().to_string(),
            ticket: self.ticket.trim().to_string(),
            product_id: self.product_id,
            licenses: self.licenses,
            established_year: self.established_year,
            payment: None,
        }
    }

    /// Wire payload for `employer-register-paid`.
    pub fn to_paid_payload(&self, payment: &PaymentInfo) -> RegistrationPayload {
        RegistrationPayload {
            payment: Some(PaidFields {
                payment_method: payment.method.as_str().to_string(),
                payment_amount: payment.amount,
                is_paid: true,
                payment_reference: payment.reference.clone(),
            }),
            ..self.to_payload()
        }
    }
}

/// Registration payload as the backend expects it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct RegistrationPayload {
    pub name: String,
    pub company_name: String,
    pub mobile_no: String,
    pub email_id: String,
    pub aadhar_no: String,
    pub password: String,
    pub ticket: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product_id: Option<i64>,
    pub licenses: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub established_year: Option<i32>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaidFields>,
}

/// Extra fields on a paid registration.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaidFields {
    pub payment_method: String,
    /// Sent as a JSON number.
    #[serde(with = "rust_decimal::serde::float")]
    pub payment_amount: rust_decimal::Decimal,
    pub is_paid: bool,
    pub payment_reference: String,
}

/// How the employer wants to be onboarded, decided before submission.
#[derive(Debug, Clone)]
pub enum RegistrationIntent {
    /// Submit for administrator review.
    Pending,
    /// Pay for instant approval.
    PayNow {
        product: Product,
        method: PaymentMethod,
    },
}

impl RegistrationIntent {
    pub fn is_paying(&self) -> bool {
        matches!(self, Self::PayNow { .. })
    }
}

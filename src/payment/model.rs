//! Payment method and payment info models.

use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};

/// Which kind of payment the user picked, without its details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PaymentKind {
    CreditCard,
    Upi,
}

impl PaymentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit-card",
            Self::Upi => "upi",
        }
    }
}

impl std::fmt::Display for PaymentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Card fields collected by the payment form.
#[derive(Debug, Clone, Deserialize)]
pub struct CardDetails {
    pub card_number: SecretString,
    pub card_name: String,
    pub expiry: String,
    pub cvv: SecretString,
}

/// A payment method together with its method-specific input.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "kebab-case")]
pub enum PaymentMethod {
    CreditCard(CardDetails),
    Upi { upi_id: String },
}

impl PaymentMethod {
    pub fn credit_card(
        card_number: impl Into<String>,
        card_name: impl Into<String>,
        expiry: impl Into<String>,
        cvv: impl Into<String>,
    ) -> Self {
        Self::CreditCard(CardDetails {
            card_number: SecretString::from(card_number.into()),
            card_name: card_name.into(),
            expiry: expiry.into(),
            cvv: SecretString::from(cvv.into()),
        })
    }

    pub fn upi(upi_id: impl Into<String>) -> Self {
        Self::Upi {
            upi_id: upi_id.into(),
        }
    }

    pub fn kind(&self) -> PaymentKind {
        match self {
            Self::CreditCard(_) => PaymentKind::CreditCard,
            Self::Upi { .. } => PaymentKind::Upi,
        }
    }

    /// Names of required fields that are blank. Presence only; no card or
    /// VPA format checks happen here.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        match self {
            Self::CreditCard(card) => {
                if card.card_number.expose_secret().trim().is_empty() {
                    missing.push("cardNumber");
                }
                if card.card_name.trim().is_empty() {
                    missing.push("cardName");
                }
                if card.expiry.trim().is_empty() {
                    missing.push("expiry");
                }
                if card.cvv.expose_secret().trim().is_empty() {
                    missing.push("cvv");
                }
            }
            Self::Upi { upi_id } => {
                if upi_id.trim().is_empty() {
                    missing.push("upiId");
                }
            }
        }
        missing
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
}

/// What the paid registration call needs to know about a settled payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaymentInfo {
    pub method: PaymentKind,
    pub amount: Decimal,
    pub status: PaymentStatus,
    /// Gateway transaction reference.
    pub reference: String,
}

/// Proof of a successful charge from a [`PaymentProcessor`](super::PaymentProcessor).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    pub reference: String,
    pub amount: Decimal,
    pub method: PaymentKind,
}

impl PaymentReceipt {
    pub fn into_info(self) -> PaymentInfo {
        PaymentInfo {
            method: self.method,
            amount: self.amount,
            status: PaymentStatus::Paid,
            reference: self.reference,
        }
    }
}

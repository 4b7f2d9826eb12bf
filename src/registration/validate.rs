//! Client-side validation of a registration draft.

use std::sync::LazyLock;

use chrono::Datelike;
use regex::Regex;
use secrecy::ExposeSecret;

use super::model::{RegistrationDraft, RegistrationIntent};
use crate::catalog::{Product, ProductCatalog};
use crate::error::{FieldError, RegistrationError, ValidationError};
use crate::payment::PaymentMethod;

/// Indian mobile numbers: 10 digits, first digit 6–9.
static MOBILE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[6-9]\d{9}$").expect("mobile regex"));
static AADHAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d{12}$").expect("aadhar regex"));
static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

pub const MIN_PASSWORD_LEN: usize = 6;
pub const MIN_ESTABLISHED_YEAR: i32 = 1900;

/// Validate a draft against the current calendar year.
pub fn validate(draft: &RegistrationDraft) -> Result<(), ValidationError> {
    validate_at(draft, chrono::Utc::now().year())
}

/// Validate a draft, treating `current_year` as the latest allowed
/// establishment year.
pub fn validate_at(draft: &RegistrationDraft, current_year: i32) -> Result<(), ValidationError> {
    let mut errors = Vec::new();

    let required = [
        ("Name", draft.name.as_str()),
        ("CompanyName", draft.company_name.as_str()),
        ("MobileNo", draft.mobile_no.as_str()),
        ("EmailId", draft.email_id.as_str()),
        ("AadharNo", draft.aadhar_no.as_str()),
        ("Password", draft.password.expose_secret()),
        ("Ticket", draft.ticket.as_str()),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(FieldError::new(field, format!("{field} is required")));
        }
    }

    let mobile = draft.mobile_no.trim();
    if !mobile.is_empty() && !MOBILE_RE.is_match(mobile) {
        errors.push(FieldError::new(
            "MobileNo",
            "Mobile number must be 10 digits starting with 6-9",
        ));
    }

    let aadhar = draft.aadhar_no.trim();
    if !aadhar.is_empty() && !AADHAR_RE.is_match(aadhar) {
        errors.push(FieldError::new("AadharNo", "Aadhar number must be exactly 12 digits"));
    }

    let email = draft.email_id.trim();
    if !email.is_empty() && !EMAIL_RE.is_match(email) {
        errors.push(FieldError::new("EmailId", "Invalid email address"));
    }

    let password = draft.password.expose_secret();
    if !password.trim().is_empty() && password.chars().count() < MIN_PASSWORD_LEN {
        errors.push(FieldError::new(
            "Password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        ));
    }

    if draft.is_paying {
        if draft.product_id.is_none() {
            errors.push(FieldError::new("ProductId", "Please select a product"));
        }
        if draft.licenses == 0 {
            errors.push(FieldError::new("Licenses", "At least one license is required"));
        }
    }

    if let Some(year) = draft.established_year
        && !(MIN_ESTABLISHED_YEAR..=current_year).contains(&year)
    {
        errors.push(FieldError::new(
            "EstablishedYear",
            format!("Established year must be between {MIN_ESTABLISHED_YEAR} and {current_year}"),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ValidationError { errors })
    }
}

/// Resolve the product a paying draft selected.
///
/// Returns `None` for non-paying drafts. A paying draft whose product is not
/// in the loaded catalog is refused.
pub fn paying_product(
    draft: &RegistrationDraft,
    catalog: &ProductCatalog,
) -> Result<Option<Product>, RegistrationError> {
    if !draft.is_paying {
        return Ok(None);
    }
    let product_id = draft
        .product_id
        .ok_or(RegistrationError::UnknownProduct { product_id: 0 })?;
    catalog
        .find(product_id)
        .cloned()
        .map(Some)
        .ok_or(RegistrationError::UnknownProduct { product_id })
}

/// Decide how a draft is onboarded. `method` is only consulted for paying drafts.
pub fn intent(
    draft: &RegistrationDraft,
    catalog: &ProductCatalog,
    method: PaymentMethod,
) -> Result<RegistrationIntent, RegistrationError> {
    Ok(match paying_product(draft, catalog)? {
        Some(product) => RegistrationIntent::PayNow { product, method },
        None => RegistrationIntent::Pending,
    })
}

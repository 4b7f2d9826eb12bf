//! Employer onboarding with optional paid instant approval.

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod notify;
pub mod onboarding;
pub mod payment;
pub mod poller;
pub mod registration;
pub mod session;

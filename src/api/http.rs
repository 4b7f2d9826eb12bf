//! reqwest-backed implementation of [`OnboardingBackend`].

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tracing::{debug, warn};

use super::envelope::{ApiRequest, ApiResponse};
use super::{OnboardingBackend, StatusReport, endpoints};
use crate::catalog::Product;
use crate::config::OnboardConfig;
use crate::error::FetchError;
use crate::registration::RegistrationPayload;

/// Talks to the portal backend over HTTPS.
pub struct HttpBackend {
    base_url: String,
    auth_token: SecretString,
    client: reqwest::Client,
}

impl HttpBackend {
    pub fn new(config: &OnboardConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| FetchError::Http {
                endpoint: config.api_base_url.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            base_url: config.api_base_url.clone(),
            auth_token: config.auth_token.clone(),
            client,
        })
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{endpoint}", self.base_url)
    }

    /// POST an envelope and normalize the answer.
    ///
    /// Error statuses that still carry an envelope are returned as-is so the
    /// caller can surface the backend's message.
    async fn post<P: Serialize + Send>(
        &self,
        endpoint: &str,
        op: &str,
        payload: P,
    ) -> Result<ApiResponse, FetchError> {
        let request = ApiRequest::new(op, self.auth_token.expose_secret(), payload);
        debug!(endpoint, request_id = %request.request_id, "POST");

        let resp = self
            .client
            .post(self.url(endpoint))
            .json(&request)
            .send()
            .await
            .map_err(|e| FetchError::Http {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        let status = resp.status();
        let body = read_json(endpoint, resp).await;
        match body.and_then(|v| {
            ApiResponse::from_value(v).ok_or_else(|| FetchError::InvalidResponse {
                endpoint: endpoint.to_string(),
                reason: "body is not a response envelope".to_string(),
            })
        }) {
            Ok(envelope) => {
                if !status.is_success() {
                    warn!(endpoint, status = status.as_u16(), message = %envelope.message, "Backend returned error status");
                }
                Ok(envelope)
            }
            Err(_) if !status.is_success() => Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            }),
            Err(e) => Err(e),
        }
    }
}

async fn read_json(endpoint: &str, resp: reqwest::Response) -> Result<serde_json::Value, FetchError> {
    resp.json::<serde_json::Value>()
        .await
        .map_err(|e| FetchError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl OnboardingBackend for HttpBackend {
    async fn fetch_products(&self) -> Result<Vec<Product>, FetchError> {
        let endpoint = endpoints::PRODUCTS;
        let resp = self
            .client
            .get(self.url(endpoint))
            .send()
            .await
            .map_err(|e| FetchError::Http {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        if !resp.status().is_success() {
            return Err(FetchError::Status {
                endpoint: endpoint.to_string(),
                status: resp.status().as_u16(),
            });
        }

        let body = read_json(endpoint, resp).await?;
        // Either a bare array or an envelope around one.
        let list = if body.is_array() {
            body
        } else {
            let envelope =
                ApiResponse::from_value(body).ok_or_else(|| FetchError::InvalidResponse {
                    endpoint: endpoint.to_string(),
                    reason: "expected a product list".to_string(),
                })?;
            if !envelope.success {
                return Err(FetchError::Rejected {
                    endpoint: endpoint.to_string(),
                    message: envelope.message_or("Failed to load products"),
                });
            }
            envelope.data
        };

        serde_json::from_value(list).map_err(|e| FetchError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    async fn register_employer(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<ApiResponse, FetchError> {
        self.post(endpoints::EMPLOYER_REGISTER, "employer-register", payload)
            .await
    }

    async fn register_employer_paid(
        &self,
        payload: &RegistrationPayload,
    ) -> Result<ApiResponse, FetchError> {
        self.post(
            endpoints::EMPLOYER_REGISTER_PAID,
            "employer-register-paid",
            payload,
        )
        .await
    }

    async fn get_employer_status(&self, emp_id: &str) -> Result<StatusReport, FetchError> {
        let endpoint = endpoints::EMPLOYER_STATUS;
        let envelope = self
            .post(
                endpoint,
                "get-employer-status",
                serde_json::json!({ "EmpId": emp_id }),
            )
            .await?;

        if !envelope.success {
            return Err(FetchError::Rejected {
                endpoint: endpoint.to_string(),
                message: envelope.message_or("Failed to fetch status"),
            });
        }

        StatusReport::from_data(&envelope.data).ok_or_else(|| FetchError::InvalidResponse {
            endpoint: endpoint.to_string(),
            reason: format!("unrecognized status payload: {}", envelope.data),
        })
    }
}

//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::ConfigError;

/// Default status poll interval (one minute, matching the portal's pending view).
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(60);

/// Onboarding client configuration, built from environment variables.
#[derive(Debug, Clone)]
pub struct OnboardConfig {
    /// Backend base URL, e.g. `https://api.example.com`.
    pub api_base_url: String,
    /// Bearer token sent in the envelope. Empty when unauthenticated.
    pub auth_token: SecretString,
    /// How often the status poller queries the backend.
    pub poll_interval: Duration,
    /// Artificial settlement latency of the simulated payment gateway.
    pub payment_delay: Duration,
    /// Pause between a successful payment and dashboard navigation.
    pub redirect_delay: Duration,
    /// Client-side timeout applied to every backend request.
    pub request_timeout: Duration,
    /// Where the session record is persisted. `None` keeps it in memory.
    pub session_path: Option<PathBuf>,
    /// Port for the local state routes.
    pub http_port: u16,
}

impl Default for OnboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://127.0.0.1:5000".to_string(),
            auth_token: SecretString::from(String::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
            payment_delay: Duration::from_millis(2000),
            redirect_delay: Duration::from_millis(3000),
            request_timeout: Duration::from_secs(30),
            session_path: None,
            http_port: 8080,
        }
    }
}

impl OnboardConfig {
    /// Build config from environment variables.
    ///
    /// `ONBOARD_API_BASE_URL` is required; everything else has a default.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_base_url = std::env::var("ONBOARD_API_BASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("ONBOARD_API_BASE_URL".to_string()))?;
        Self::from_lookup(api_base_url, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(api_base_url: String, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let api_base_url = api_base_url.trim().trim_end_matches('/').to_string();
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARD_API_BASE_URL".to_string(),
                message: format!("expected an http(s) URL, got '{api_base_url}'"),
            });
        }

        let auth_token = SecretString::from(lookup("ONBOARD_AUTH_TOKEN").unwrap_or_default());

        let poll_interval = parse_u64(&lookup, "ONBOARD_POLL_INTERVAL_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.poll_interval);
        if poll_interval.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "ONBOARD_POLL_INTERVAL_SECS".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }

        let payment_delay = parse_u64(&lookup, "ONBOARD_PAYMENT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.payment_delay);

        let redirect_delay = parse_u64(&lookup, "ONBOARD_REDIRECT_DELAY_MS")?
            .map(Duration::from_millis)
            .unwrap_or(defaults.redirect_delay);

        let request_timeout = parse_u64(&lookup, "ONBOARD_REQUEST_TIMEOUT_SECS")?
            .map(Duration::from_secs)
            .unwrap_or(defaults.request_timeout);

        let session_path = lookup("ONBOARD_SESSION_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from);

        let http_port = match lookup("ONBOARD_HTTP_PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "ONBOARD_HTTP_PORT".to_string(),
                message: format!("'{raw}' is not a port number"),
            })?,
            None => defaults.http_port,
        };

        Ok(Self {
            api_base_url,
            auth_token,
            poll_interval,
            payment_delay,
            redirect_delay,
            request_timeout,
            session_path,
            http_port,
        })
    }
}

fn parse_u64<F>(lookup: &F, key: &str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                key: key.to_string(),
                message: format!("'{raw}' is not a non-negative integer"),
            }),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let cfg = OnboardConfig::from_lookup("https://api.test/".into(), lookup_from(&[])).unwrap();
        assert_eq!(cfg.api_base_url, "https://api.test");
        assert_eq!(cfg.poll_interval, Duration::from_secs(60));
        assert_eq!(cfg.payment_delay, Duration::from_millis(2000));
        assert_eq!(cfg.redirect_delay, Duration::from_millis(3000));
        assert_eq!(cfg.request_timeout, Duration::from_secs(30));
        assert!(cfg.session_path.is_none());
        assert_eq!(cfg.auth_token.expose_secret(), "");
    }

    #[test]
    fn overrides_are_parsed() {
        let cfg = OnboardConfig::from_lookup(
            "http://localhost:5000".into(),
            lookup_from(&[
                ("ONBOARD_POLL_INTERVAL_SECS", "5"),
                ("ONBOARD_PAYMENT_DELAY_MS", "10"),
                ("ONBOARD_SESSION_PATH", "/tmp/user.json"),
                ("ONBOARD_HTTP_PORT", "9090"),
                ("ONBOARD_AUTH_TOKEN", "tok"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.poll_interval, Duration::from_secs(5));
        assert_eq!(cfg.payment_delay, Duration::from_millis(10));
        assert_eq!(cfg.session_path, Some(PathBuf::from("/tmp/user.json")));
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.auth_token.expose_secret(), "tok");
    }

    #[test]
    fn rejects_bad_values() {
        let err = OnboardConfig::from_lookup(
            "http://localhost".into(),
            lookup_from(&[("ONBOARD_POLL_INTERVAL_SECS", "soon")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "ONBOARD_POLL_INTERVAL_SECS"));

        let err = OnboardConfig::from_lookup(
            "http://localhost".into(),
            lookup_from(&[("ONBOARD_POLL_INTERVAL_SECS", "0")]),
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));

        let err = OnboardConfig::from_lookup("ftp://nope".into(), lookup_from(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }
}

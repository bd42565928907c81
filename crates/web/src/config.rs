//! Runtime configuration from environment variables.

use std::time::Duration;

use thiserror::Error;

use patentdesk_auth::{GatePolicy, PROFILE_COLLECTION};

const DEV_BACKEND_URL: &str = "http://localhost:54321";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{var} must be a non-negative integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    #[error("{var} must be an absolute path starting with '/', got '{value}'")]
    InvalidPath { var: &'static str, value: String },

    #[error("{var} must be an http(s) URL, got '{value}'")]
    InvalidUrl { var: &'static str, value: String },
}

/// Connection settings for the hosted backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendConfig {
    /// Project URL, without a trailing slash.
    pub url: String,
    /// Public (anon) API key sent with every request.
    pub anon_key: String,
    /// Access token persisted by a previous sign-in, if any.
    pub access_token: Option<String>,
    pub profile_collection: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub backend: BackendConfig,
    pub policy: GatePolicy,
    /// Redirects followed per navigation before giving up.
    pub max_redirects: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig {
                url: DEV_BACKEND_URL.to_string(),
                anon_key: String::new(),
                access_token: None,
                profile_collection: PROFILE_COLLECTION.to_string(),
                timeout: Duration::from_secs(10),
            },
            policy: GatePolicy::default(),
            max_redirects: 8,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Build from an arbitrary variable source (unset and empty are the same).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |var: &str| lookup(var).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        let url = match get("PATENTDESK_BACKEND_URL") {
            Some(url) => {
                if !(url.starts_with("http://") || url.starts_with("https://")) {
                    return Err(ConfigError::InvalidUrl {
                        var: "PATENTDESK_BACKEND_URL",
                        value: url,
                    });
                }
                url.trim_end_matches('/').to_string()
            }
            None => {
                tracing::warn!("PATENTDESK_BACKEND_URL not set; using local dev backend {DEV_BACKEND_URL}");
                defaults.backend.url
            }
        };

        let anon_key = get("PATENTDESK_ANON_KEY").unwrap_or_else(|| {
            tracing::warn!("PATENTDESK_ANON_KEY not set; backend requests will be unauthenticated");
            String::new()
        });

        let timeout = match get("PATENTDESK_HTTP_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(number("PATENTDESK_HTTP_TIMEOUT_SECS", raw)?),
            None => defaults.backend.timeout,
        };

        let max_redirects = match get("PATENTDESK_MAX_REDIRECTS") {
            Some(raw) => {
                let hops = number("PATENTDESK_MAX_REDIRECTS", raw.clone())?;
                usize::try_from(hops).map_err(|_| ConfigError::InvalidNumber {
                    var: "PATENTDESK_MAX_REDIRECTS",
                    value: raw,
                })?
            }
            None => defaults.max_redirects,
        };

        let policy = GatePolicy {
            login_path: path("PATENTDESK_LOGIN_PATH", get("PATENTDESK_LOGIN_PATH"), defaults.policy.login_path)?,
            user_area: path("PATENTDESK_USER_AREA", get("PATENTDESK_USER_AREA"), defaults.policy.user_area)?,
            admin_area: path("PATENTDESK_ADMIN_AREA", get("PATENTDESK_ADMIN_AREA"), defaults.policy.admin_area)?,
        };

        Ok(Self {
            backend: BackendConfig {
                url,
                anon_key,
                access_token: get("PATENTDESK_ACCESS_TOKEN"),
                profile_collection: get("PATENTDESK_PROFILE_COLLECTION")
                    .unwrap_or(defaults.backend.profile_collection),
                timeout,
            },
            policy,
            max_redirects,
        })
    }
}

fn number(var: &'static str, raw: String) -> Result<u64, ConfigError> {
    raw.parse()
        .map_err(|_| ConfigError::InvalidNumber { var, value: raw })
}

fn path(var: &'static str, value: Option<String>, default: String) -> Result<String, ConfigError> {
    let Some(value) = value else {
        return Ok(default);
    };
    let trimmed = value.trim_end_matches('/');
    // Only "/" itself may stand for the root.
    let malformed = !value.starts_with('/')
        || value.contains(['?', '#'])
        || trimmed.contains("//")
        || (trimmed.is_empty() && value.len() > 1);
    if malformed {
        return Err(ConfigError::InvalidPath { var, value });
    }
    if trimmed.is_empty() {
        return Ok(value);
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn from(vars: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|var| map.get(var).cloned())
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(from(&[]).unwrap(), AppConfig::default());
    }

    #[test]
    fn reads_every_variable() {
        let config = from(&[
            ("PATENTDESK_BACKEND_URL", "https://abc.example.co/"),
            ("PATENTDESK_ANON_KEY", "anon"),
            ("PATENTDESK_ACCESS_TOKEN", "tok"),
            ("PATENTDESK_PROFILE_COLLECTION", "members"),
            ("PATENTDESK_LOGIN_PATH", "/sign-in/"),
            ("PATENTDESK_USER_AREA", "/app"),
            ("PATENTDESK_ADMIN_AREA", "/ops"),
            ("PATENTDESK_MAX_REDIRECTS", "3"),
            ("PATENTDESK_HTTP_TIMEOUT_SECS", "2"),
        ])
        .unwrap();

        assert_eq!(config.backend.url, "https://abc.example.co");
        assert_eq!(config.backend.anon_key, "anon");
        assert_eq!(config.backend.access_token.as_deref(), Some("tok"));
        assert_eq!(config.backend.profile_collection, "members");
        assert_eq!(config.backend.timeout, Duration::from_secs(2));
        assert_eq!(config.policy.login_path, "/sign-in");
        assert_eq!(config.policy.user_area, "/app");
        assert_eq!(config.policy.admin_area, "/ops");
        assert_eq!(config.max_redirects, 3);
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            from(&[("PATENTDESK_MAX_REDIRECTS", "many")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
        assert!(matches!(
            from(&[("PATENTDESK_USER_AREA", "dashboard")]),
            Err(ConfigError::InvalidPath { .. })
        ));
        assert!(matches!(
            from(&[("PATENTDESK_BACKEND_URL", "ftp://x")]),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn slash_only_area_is_rejected_but_root_is_kept() {
        assert!(matches!(
            from(&[("PATENTDESK_ADMIN_AREA", "//")]),
            Err(ConfigError::InvalidPath { var: "PATENTDESK_ADMIN_AREA", .. })
        ));
        assert!(matches!(
            from(&[("PATENTDESK_LOGIN_PATH", "/auth//login")]),
            Err(ConfigError::InvalidPath { .. })
        ));
        let config = from(&[("PATENTDESK_USER_AREA", "/")]).unwrap();
        assert_eq!(config.policy.user_area, "/");
    }

    #[test]
    fn redirect_limit_beyond_usize_is_rejected() {
        let huge = u64::MAX.to_string();
        let result = from(&[("PATENTDESK_MAX_REDIRECTS", huge.as_str())]);
        if usize::BITS < 64 {
            assert!(matches!(result, Err(ConfigError::InvalidNumber { .. })));
        } else {
            assert_eq!(result.unwrap().max_redirects, usize::MAX);
        }
        assert!(matches!(
            from(&[("PATENTDESK_MAX_REDIRECTS", "-1")]),
            Err(ConfigError::InvalidNumber { .. })
        ));
    }

    #[test]
    fn blank_access_token_means_none() {
        let config = from(&[("PATENTDESK_ACCESS_TOKEN", "  ")]).unwrap();
        assert!(config.backend.access_token.is_none());
    }
}

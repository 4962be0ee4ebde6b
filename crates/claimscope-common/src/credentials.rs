//! NCBI credential resolution and rate-tier derivation.
//!
//! NCBI grants 10 requests/second with an API key and 3 without one. Absence
//! of a key is not an error — the client falls back to the unauthenticated
//! tier. `Config` errors are reserved for explicitly supplied credentials
//! that are malformed.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClaimscopeError, Result};

pub const ENV_API_KEY: &str = "NCBI_API_KEY";
pub const ENV_EMAIL: &str = "NCBI_EMAIL";

/// Minimum spacing between requests with an API key (10 req/s).
pub const AUTHENTICATED_INTERVAL: Duration = Duration::from_millis(100);
/// Minimum spacing without an API key (3 req/s).
pub const UNAUTHENTICATED_INTERVAL: Duration = Duration::from_millis(334);

/// API key and contact email sent with every E-utilities request.
///
/// Immutable once resolved; build a new value (and a new client) to change
/// tiers.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NcbiCredentials {
    pub api_key: Option<String>,
    pub email: Option<String>,
}

impl NcbiCredentials {
    /// Resolve credentials from explicit values and/or the environment.
    ///
    /// Explicit arguments always win. When `load_from_env` is set, missing
    /// values are filled from `NCBI_API_KEY` / `NCBI_EMAIL` (a `.env` file in
    /// the working directory is honoured). Neither source yielding a key is
    /// fine — the unauthenticated tier applies.
    pub fn resolve(
        api_key: Option<String>,
        email: Option<String>,
        load_from_env: bool,
    ) -> Result<Self> {
        if load_from_env {
            // A missing .env file is not an error; the process environment
            // still applies.
            let _ = dotenvy::dotenv();
        }
        Self::resolve_with(api_key, email, load_from_env, |name| {
            std::env::var(name).ok()
        })
    }

    /// Same as [`NcbiCredentials::resolve`] with an injectable environment
    /// lookup, so tests do not mutate process-wide state.
    pub fn resolve_with<F>(
        api_key: Option<String>,
        email: Option<String>,
        load_from_env: bool,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(key) = &api_key {
            if key.trim().is_empty() {
                return Err(ClaimscopeError::Config(
                    "api_key must not be blank".to_string(),
                ));
            }
        }
        if let Some(addr) = &email {
            if !addr.contains('@') {
                return Err(ClaimscopeError::Config(format!(
                    "contact email looks malformed: {addr}"
                )));
            }
        }

        let api_key = api_key.or_else(|| {
            if load_from_env {
                lookup(ENV_API_KEY)
            } else {
                None
            }
        });
        let email = email.or_else(|| {
            if load_from_env {
                lookup(ENV_EMAIL)
            } else {
                None
            }
        });

        Ok(Self {
            api_key: normalize(api_key),
            email: normalize(email),
        })
    }

    pub fn is_authenticated(&self) -> bool {
        self.api_key.is_some()
    }

    /// Minimum spacing between outbound E-utilities requests for this tier.
    pub fn min_request_interval(&self) -> Duration {
        if self.is_authenticated() {
            AUTHENTICATED_INTERVAL
        } else {
            UNAUTHENTICATED_INTERVAL
        }
    }
}

fn normalize(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

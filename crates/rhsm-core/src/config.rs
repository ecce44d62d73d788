//! Runtime configuration
//!
//! Defaults match a stock RHEL system. `from_env` applies optional
//! overrides. The skip switch is deliberately not stored: it is read from
//! the environment on every check.

use crate::certs::PRODUCT_CERT_DIRS;
use crate::repos::DEFAULT_RHSM_REPOFILE;
use crate::retry::RetryPolicy;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Environment variable that turns every RHSM operation into a no-op
pub const SKIP_RHSM_ENV: &str = "LEAPP_DEVEL_SKIP_RHSM";
/// Override for the retry attempt count
pub const RETRY_ATTEMPTS_ENV: &str = "RHSM_RETRY_ATTEMPTS";
/// Override for the delay between retries, in seconds
pub const RETRY_DELAY_ENV: &str = "RHSM_RETRY_DELAY_SECS";

/// Configuration shared by all RHSM operations
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RhsmConfig {
    /// Name of the skip switch variable
    pub skip_env_var: String,
    /// Policy for recoverable operations
    pub retry: RetryPolicy,
    /// Repo file whose repositories count as RHSM-provided
    pub rhsm_repo_file: String,
    /// Product certificate directories, in scan order
    pub product_cert_dirs: Vec<String>,
}

impl Default for RhsmConfig {
    fn default() -> Self {
        RhsmConfig {
            skip_env_var: SKIP_RHSM_ENV.to_string(),
            retry: RetryPolicy::default(),
            rhsm_repo_file: DEFAULT_RHSM_REPOFILE.to_string(),
            product_cert_dirs: PRODUCT_CERT_DIRS.iter().map(|d| d.to_string()).collect(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(var = name, value = %raw, "ignoring invalid value");
            None
        }
    }
}

impl RhsmConfig {
    /// Defaults with overrides from the process environment
    pub fn from_env() -> Self {
        let mut config = Self::default();
        if let Some(attempts) = parse_env::<u32>(RETRY_ATTEMPTS_ENV) {
            config.retry.max_attempts = attempts.max(1);
        }
        if let Some(delay) = parse_env::<u64>(RETRY_DELAY_ENV) {
            config.retry.delay_secs = delay;
        }
        config
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Use a different skip switch variable
    pub fn with_skip_env_var(mut self, name: &str) -> Self {
        self.skip_env_var = name.to_string();
        self
    }

    /// Whether RHSM operations are currently switched off.
    ///
    /// Only the exact value `"1"` skips. Read on every call.
    pub fn skip_rhsm(&self) -> bool {
        std::env::var(&self.skip_env_var).is_ok_and(|value| value == "1")
    }
}

//! Configuration loading from TOML with environment variable resolution.
//!
//! An optional `config.toml` tunes the HTTP clients and the settle delay;
//! every key has a default so the tool runs without one. Secrets never live
//! in the file. They come from flags or from the environment (optionally
//! via `.env`) and are resolved into a [`CashoutConfig`] that the engine
//! receives explicitly.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::rules::FinanceCredentials;

/// Wait between reading the balance and reading the feed. The feed lags the
/// balance, so payments that already count toward it may not be listed yet.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

pub const VENMO_TOKEN_ENV: &str = "VENMO_API_TOKEN";
pub const LUNCHMONEY_EMAIL_ENV: &str = "LUNCHMONEY_EMAIL";
pub const LUNCHMONEY_PASSWORD_ENV: &str = "LUNCHMONEY_PASSWORD";
pub const LUNCHMONEY_OTP_SECRET_ENV: &str = "LUNCHMONEY_OTP_SECRET";

// ---------------------------------------------------------------------------
// File configuration
// ---------------------------------------------------------------------------

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub venmo: VenmoConfig,
    pub cashout: CashoutSettings,
    pub lunchmoney: LunchMoneyConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VenmoConfig {
    pub base_url: String,
    pub timeout_secs: u64,
    /// Number of stories requested from the feed.
    pub feed_limit: u32,
}

impl Default for VenmoConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.venmo.com/v1".to_string(),
            timeout_secs: 30,
            feed_limit: 50,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CashoutSettings {
    pub settle_delay_secs: u64,
}

impl Default for CashoutSettings {
    fn default() -> Self {
        Self {
            settle_delay_secs: DEFAULT_SETTLE_DELAY.as_secs(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LunchMoneyConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for LunchMoneyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.lunchmoney.app".to_string(),
            timeout_secs: 30,
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from a TOML string.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        Ok(config)
    }

    /// Resolve an environment variable, treating empty values as unset.
    pub fn resolve_env(env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.is_empty())
    }
}

// ---------------------------------------------------------------------------
// Run configuration
// ---------------------------------------------------------------------------

/// Everything a single cashout run needs to know. Built once by the binary
/// (or by a test) and passed to the engine; the engine reads no ambient state.
#[derive(Debug)]
pub struct CashoutConfig {
    /// Compute and report the plan without issuing transfers.
    pub dry_run: bool,
    /// Suppress user-facing output.
    pub quiet: bool,
    pub settle_delay: Duration,
    /// When set, matching rules are created after the transfers.
    pub finance_credentials: Option<FinanceCredentials>,
}

impl Default for CashoutConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            quiet: false,
            settle_delay: DEFAULT_SETTLE_DELAY,
            finance_credentials: None,
        }
    }
}

impl CashoutConfig {
    /// Assemble finance-tool credentials from optional parts.
    ///
    /// No email means rule creation is disabled. An email without a password
    /// is rejected.
    pub fn credentials_from_parts(
        email: Option<String>,
        password: Option<String>,
        otp_secret: Option<String>,
    ) -> Result<Option<FinanceCredentials>> {
        let Some(email) = email else {
            return Ok(None);
        };
        let password = password
            .context("A Lunch Money password is required when a Lunch Money email is set")?;

        Ok(Some(FinanceCredentials {
            email,
            password: SecretString::new(password),
            otp_secret: otp_secret.map(SecretString::new),
        }))
    }
}

//! Lunch Money rule integration.
//!
//! Logs in with the account's web credentials (the public API token cannot
//! manage rules) and creates one one-time rule per cashed-out payment. When
//! the matching Venmo deposit lands in the bank feed, the rule renames it to
//! the original payer and copies the payment note.
//!
//! Auth: cookie session from `POST /auth/login`; accounts with two-factor
//! auth also send a TOTP code (RFC 6238, SHA-1, 6 digits, 30 s).

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Serialize;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::{debug, info};

use super::{FinanceCredentials, RuleSink};
use crate::config::LunchMoneyConfig;
use crate::types::Transaction;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Bank transfers out of Venmo show up with the payee containing this.
const VENMO_PAYEE_MATCH: &str = "Venmo";

const TOTP_DIGITS: usize = 6;
const TOTP_STEP_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// API request types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    username: &'a str,
    password: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    totp: Option<String>,
    remember_me: bool,
}

#[derive(Debug, Serialize, PartialEq)]
struct RuleRequest {
    conditions: RuleConditions,
    actions: RuleActions,
    /// Delete the rule after it has matched once.
    one_time_rule: bool,
    priority: u32,
}

#[derive(Debug, Serialize, PartialEq)]
struct RuleConditions {
    payee: TextCondition,
    amount: AmountCondition,
}

#[derive(Debug, Serialize, PartialEq)]
struct TextCondition {
    #[serde(rename = "match")]
    match_type: &'static str,
    value: String,
}

#[derive(Debug, Serialize, PartialEq)]
struct AmountCondition {
    #[serde(rename = "match")]
    match_type: &'static str,
    /// Dollar amount with two decimals.
    value: String,
    /// Deposits into the bank account are credits.
    #[serde(rename = "type")]
    amount_type: &'static str,
}

#[derive(Debug, Serialize, PartialEq)]
struct RuleActions {
    payee_name: String,
    notes: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Lunch Money rule-creation client.
pub struct LunchMoneyClient {
    http: Client,
    base_url: String,
}

impl LunchMoneyClient {
    pub fn new(config: &LunchMoneyConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .cookie_store(true)
            .user_agent(concat!("venmo-cashout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Lunch Money")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn login(&self, credentials: &FinanceCredentials) -> Result<()> {
        info!(email = %credentials.email, "Authenticating with Lunch Money...");

        let totp = credentials
            .otp_secret
            .as_ref()
            .map(|secret| current_totp(secret.expose_secret()))
            .transpose()?;

        let body = LoginRequest {
            username: &credentials.email,
            password: credentials.password.expose_secret(),
            totp,
            remember_me: false,
        };

        let resp = self
            .http
            .post(format!("{}/auth/login", self.base_url))
            .json(&body)
            .send()
            .await
            .context("Lunch Money login request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Lunch Money login failed {status}: {body}");
        }

        info!("Lunch Money authentication successful");
        Ok(())
    }

    async fn create_rule(&self, transaction: &Transaction) -> Result<()> {
        let rule = build_rule(transaction);

        let resp = self
            .http
            .post(format!("{}/rules", self.base_url))
            .json(&rule)
            .send()
            .await
            .context("Lunch Money rule request failed")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Lunch Money rule creation failed {status}: {body}");
        }

        debug!(
            id = %transaction.id,
            amount = %transaction.amount,
            payee = %transaction.payer.display_name,
            "Lunch Money rule created"
        );
        Ok(())
    }
}

/// One-time rule that relabels the bank deposit for `transaction`.
fn build_rule(transaction: &Transaction) -> RuleRequest {
    RuleRequest {
        conditions: RuleConditions {
            payee: TextCondition {
                match_type: "contain",
                value: VENMO_PAYEE_MATCH.to_string(),
            },
            amount: AmountCondition {
                match_type: "exactly",
                value: format!("{:.2}", transaction.amount.to_dollars()),
                amount_type: "credit",
            },
        },
        actions: RuleActions {
            payee_name: transaction.payer.display_name.clone(),
            notes: transaction.note.clone(),
        },
        one_time_rule: true,
        priority: 1,
    }
}

/// TOTP code for `secret` (base32) at `unix_time`.
fn totp_code(secret: &str, unix_time: u64) -> Result<String> {
    let normalized: String = secret
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    let bytes = Secret::Encoded(normalized)
        .to_bytes()
        .map_err(|e| anyhow!("Invalid Lunch Money OTP secret: {e:?}"))?;

    // Authenticator secrets are often shorter than the 128 bits TOTP::new insists on.
    let totp = TOTP::new_unchecked(Algorithm::SHA1, TOTP_DIGITS, 1, TOTP_STEP_SECS, bytes);
    Ok(totp.generate(unix_time))
}

fn current_totp(secret: &str) -> Result<String> {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .context("System clock is before the Unix epoch")?;
    totp_code(secret, now.as_secs())
}

// ---------------------------------------------------------------------------
// RuleSink trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl RuleSink for LunchMoneyClient {
    async fn create_matching_rules(
        &self,
        transactions: &[Transaction],
        credentials: &FinanceCredentials,
    ) -> Result<usize> {
        if transactions.is_empty() {
            debug!("No transactions cashed out, skipping Lunch Money rules");
            return Ok(0);
        }

        self.login(credentials).await?;

        for transaction in transactions {
            self.create_rule(transaction)
                .await
                .with_context(|| format!("Rule for transaction {} failed", transaction.id))?;
        }

        info!(count = transactions.len(), "Lunch Money rules created");
        Ok(transactions.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

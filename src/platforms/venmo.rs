//! Venmo integration.
//!
//! Reads the account balance and payment feed and initiates standard
//! (free, one to three business days) transfers to the default linked bank account.
//!
//! Base URL: https://api.venmo.com/v1/
//! Auth: `Authorization: Bearer {access_token}` on every request.
//! Amounts: balances arrive as dollar strings, story amounts as dollar
//! numbers, transfer amounts are sent in cents.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::PaymentPlatform;
use crate::config::VenmoConfig;
use crate::types::{Cents, Payee, Payer, Profile, Transaction, TransferReceipt};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

const PLATFORM_NAME: &str = "venmo";

const TRANSFER_TYPE_STANDARD: &str = "standard";

// ---------------------------------------------------------------------------
// API response types (Venmo JSON → Rust)
// ---------------------------------------------------------------------------

/// All Venmo responses wrap their payload in `{"data": ...}`.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: T,
}

/// `/v1/account`.
#[derive(Debug, Deserialize)]
struct VenmoAccount {
    user: VenmoUser,
    /// Dollar amount as a string, e.g. `"12.34"`.
    balance: Decimal,
}

#[derive(Debug, Deserialize)]
struct VenmoUser {
    id: String,
    username: String,
    #[serde(default)]
    display_name: String,
}

/// One entry of `/v1/stories/target-or-actor/{user_id}`.
#[derive(Debug, Deserialize)]
struct VenmoStory {
    #[serde(default)]
    payment: Option<VenmoPayment>,
}

#[derive(Debug, Deserialize)]
struct VenmoPayment {
    id: String,
    /// "pay" or "charge".
    action: String,
    /// Dollar amount as a JSON number.
    amount: Decimal,
    #[serde(default)]
    note: String,
    #[serde(default)]
    date_created: Option<String>,
    actor: VenmoUser,
    target: VenmoTarget,
}

/// Payment target. `user` is absent when the target is an email address or
/// phone number that has no Venmo account.
#[derive(Debug, Deserialize)]
struct VenmoTarget {
    #[serde(default)]
    user: Option<VenmoUser>,
}

/// `/v1/transfers/options`.
#[derive(Debug, Deserialize)]
struct TransferOptions {
    standard: TransferOption,
}

#[derive(Debug, Deserialize)]
struct TransferOption {
    #[serde(default)]
    eligible_destinations: Vec<TransferDestination>,
}

#[derive(Debug, Deserialize)]
struct TransferDestination {
    id: String,
    #[serde(default)]
    is_default: bool,
}

#[derive(Debug, Serialize)]
struct TransferRequest<'a> {
    amount: u64,
    final_amount: u64,
    destination_id: &'a str,
    transfer_type: &'a str,
}

#[derive(Debug, Deserialize)]
struct VenmoTransfer {
    id: String,
    #[serde(default)]
    status: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Venmo platform client.
pub struct VenmoClient {
    http: Client,
    base_url: String,
    access_token: SecretString,
    feed_limit: u32,
}

impl VenmoClient {
    pub fn new(access_token: SecretString, config: &VenmoConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("venmo-cashout/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client for Venmo")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            access_token,
            feed_limit: config.feed_limit,
        })
    }

    // -- Internal helpers ------------------------------------------------

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Venmo GET");

        let resp = self
            .http
            .get(&url)
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await
            .with_context(|| format!("Venmo request failed: GET {path}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Venmo API error {status}: {body}");
        }

        let envelope: Envelope<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Venmo response for {path}"))?;

        Ok(envelope.data)
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{path}", self.base_url);
        debug!(url = %url, "Venmo POST");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(self.access_token.expose_secret())
            .json(body)
            .send()
            .await
            .with_context(|| format!("Venmo request failed: POST {path}"))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Venmo API error {status}: {body}");
        }

        let envelope: Envelope<T> = resp
            .json()
            .await
            .with_context(|| format!("Failed to parse Venmo response for {path}"))?;

        Ok(envelope.data)
    }

    /// The default standard-transfer destination, or the first eligible one.
    async fn default_destination(&self) -> Result<String> {
        let options: TransferOptions = self.get("/transfers/options").await?;
        pick_destination(&options).context("No eligible bank account linked for standard transfers")
    }

    fn to_profile(account: VenmoAccount) -> Result<Profile> {
        let balance = Cents::from_dollars(account.balance.round_dp(2))
            .with_context(|| format!("Invalid Venmo balance: {}", account.balance))?;

        Ok(Profile {
            id: account.user.id,
            username: account.user.username,
            display_name: account.user.display_name,
            balance,
        })
    }

    /// Convert a story to a transaction. Stories without a payment, or whose
    /// counterparty has no Venmo account, are dropped.
    ///
    /// For "pay" the actor pays the target; for "charge" the actor requested
    /// money, so the target is the one who paid.
    fn to_transaction(story: VenmoStory) -> Option<Transaction> {
        let payment = story.payment?;
        let target = payment.target.user?;

        let (payer, payee) = match payment.action.as_str() {
            "pay" => (payment.actor, target),
            "charge" => (target, payment.actor),
            other => {
                debug!(id = %payment.id, action = other, "Skipping story with unknown action");
                return None;
            }
        };

        let amount = Cents::from_dollars(payment.amount.round_dp(2))?;

        Some(Transaction {
            id: payment.id,
            payer: Payer {
                username: payer.username,
                display_name: payer.display_name,
            },
            payee: Payee {
                username: payee.username,
            },
            amount,
            note: payment.note,
            created_at: payment.date_created.as_deref().and_then(parse_timestamp),
        })
    }
}

/// Venmo timestamps are UTC, usually without an offset
/// (`2024-03-01T18:22:10`), occasionally RFC 3339.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

fn pick_destination(options: &TransferOptions) -> Option<String> {
    let destinations = &options.standard.eligible_destinations;
    destinations
        .iter()
        .find(|d| d.is_default)
        .or_else(|| destinations.first())
        .map(|d| d.id.clone())
}

// ---------------------------------------------------------------------------
// PaymentPlatform trait implementation
// ---------------------------------------------------------------------------

#[async_trait]
impl PaymentPlatform for VenmoClient {
    async fn get_profile(&self) -> Result<Profile> {
        let account: VenmoAccount = self.get("/account").await?;
        let profile = Self::to_profile(account)?;

        debug!(username = %profile.username, balance = %profile.balance, "Venmo profile loaded");
        Ok(profile)
    }

    async fn list_transactions(&self, profile: &Profile) -> Result<Vec<Transaction>> {
        let path = format!(
            "/stories/target-or-actor/{}?limit={}",
            profile.id, self.feed_limit
        );
        let stories: Vec<VenmoStory> = self.get(&path).await?;
        let story_count = stories.len();

        let transactions: Vec<Transaction> =
            stories.into_iter().filter_map(Self::to_transaction).collect();

        debug!(
            stories = story_count,
            payments = transactions.len(),
            "Venmo feed fetched"
        );
        Ok(transactions)
    }

    async fn initiate_transfer(&self, amount: Cents) -> Result<TransferReceipt> {
        let destination_id = self.default_destination().await?;

        let request = TransferRequest {
            amount: amount.0,
            final_amount: amount.0,
            destination_id: &destination_id,
            transfer_type: TRANSFER_TYPE_STANDARD,
        };

        let transfer: VenmoTransfer = self
            .post("/transfers", &request)
            .await
            .with_context(|| format!("Transfer of {amount} was not accepted"))?;

        info!(id = %transfer.id, amount = %amount, status = %transfer.status, "Venmo transfer initiated");

        Ok(TransferReceipt {
            id: transfer.id,
            amount,
            status: transfer.status,
        })
    }

    fn name(&self) -> &'static str {
        PLATFORM_NAME
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

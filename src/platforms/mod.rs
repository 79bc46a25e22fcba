//! Payment platform integrations.
//!
//! Defines the `PaymentPlatform` trait and provides the Venmo
//! implementation. The engine only ever talks to the trait, so tests can
//! swap in an in-memory platform.

pub mod venmo;

use anyhow::Result;
use async_trait::async_trait;

use crate::types::{Cents, Profile, Transaction, TransferReceipt};

/// Abstraction over a peer-payment account that can be cashed out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PaymentPlatform: Send + Sync {
    /// Load the authenticated account, including its current balance.
    async fn get_profile(&self) -> Result<Profile>;

    /// List payments involving `profile`, newest first.
    async fn list_transactions(&self, profile: &Profile) -> Result<Vec<Transaction>>;

    /// Move `amount` from the platform balance to the linked bank account.
    async fn initiate_transfer(&self, amount: Cents) -> Result<TransferReceipt>;

    /// Platform name for logging and identification.
    fn name(&self) -> &'static str;
}

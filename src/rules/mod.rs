//! Personal-finance rule integrations.
//!
//! After a cashout, each eligible payment can be registered with the
//! finance tool as a one-time matching rule so the resulting bank transfer
//! is categorised against the original payer and note.

pub mod lunchmoney;

use anyhow::Result;
use async_trait::async_trait;
use secrecy::SecretString;

use crate::types::Transaction;

/// Login details for the finance tool.
#[derive(Debug)]
pub struct FinanceCredentials {
    pub email: String,
    pub password: SecretString,
    /// Base32 TOTP secret, when the account has two-factor auth enabled.
    pub otp_secret: Option<SecretString>,
}

/// Something that can record matching rules for cashed-out transactions.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RuleSink: Send + Sync {
    /// Create one matching rule per transaction. Returns how many were created.
    async fn create_matching_rules(
        &self,
        transactions: &[Transaction],
        credentials: &FinanceCredentials,
    ) -> Result<usize>;
}

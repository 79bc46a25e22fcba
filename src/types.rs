//! Shared types for the cashout pipeline.
//!
//! These types form the data model used across all modules so that the
//! platform clients, the rule sink and the engine can depend on them
//! without depending on each other.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;

// ---------------------------------------------------------------------------
// Money
// ---------------------------------------------------------------------------

/// A non-negative amount in minor currency units (cents).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cents(pub u64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    pub fn checked_sub(self, other: Cents) -> Option<Cents> {
        self.0.checked_sub(other.0).map(Cents)
    }

    /// Convert a dollar amount (e.g. `12.34`) into cents.
    ///
    /// Returns `None` for negative amounts, amounts with sub-cent precision,
    /// or values that do not fit.
    pub fn from_dollars(dollars: Decimal) -> Option<Cents> {
        if dollars.is_sign_negative() && !dollars.is_zero() {
            return None;
        }
        let cents = dollars * Decimal::ONE_HUNDRED;
        if cents.fract() != Decimal::ZERO {
            return None;
        }
        cents.to_u64().map(Cents)
    }

    /// The amount as a two-decimal dollar value.
    pub fn to_dollars(self) -> Decimal {
        Decimal::from(self.0) / Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for Cents {
    /// Renders as `$1,234.56`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let dollars = self.0 / 100;
        let cents = self.0 % 100;

        let digits = dollars.to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "${grouped}.{cents:02}")
    }
}

impl Sum for Cents {
    fn sum<I: Iterator<Item = Cents>>(iter: I) -> Self {
        Cents(iter.map(|c| c.0).sum())
    }
}

impl<'a> Sum<&'a Cents> for Cents {
    fn sum<I: Iterator<Item = &'a Cents>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// The account being cashed out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub username: String,
    pub display_name: String,
    pub balance: Cents,
}

// ---------------------------------------------------------------------------
// Transactions
// ---------------------------------------------------------------------------

/// The sending side of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payer {
    pub username: String,
    pub display_name: String,
}

/// The receiving side of a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payee {
    pub username: String,
}

/// One payment as reported by the platform feed. Never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: String,
    pub payer: Payer,
    pub payee: Payee,
    pub amount: Cents,
    pub note: String,
    /// When the payment was created, if the platform reports it.
    /// Feed ordering is authoritative; this is informational.
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl fmt::Display for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -- {} ({})", self.amount, self.payer.display_name, self.note)
    }
}

/// Receipt for one outbound bank transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferReceipt {
    pub id: String,
    pub amount: Cents,
    pub status: String,
}

// ---------------------------------------------------------------------------
// Plan & report
// ---------------------------------------------------------------------------

/// Transactions selected for cashout plus the unattributed remainder.
///
/// `eligible` amounts plus `remainder` always equal the balance the plan was
/// built from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CashoutPlan {
    pub eligible: Vec<Transaction>,
    pub remainder: Cents,
}

impl CashoutPlan {
    /// Sum of the selected transaction amounts.
    pub fn matched_total(&self) -> Cents {
        self.eligible.iter().map(|t| t.amount).sum()
    }

    /// The balance this plan accounts for.
    pub fn total(&self) -> Cents {
        Cents(self.matched_total().0 + self.remainder.0)
    }

    /// Transfer amounts in issue order: one per eligible transaction, then
    /// the remainder if non-zero.
    ///
    /// Zero-amount eligible payments keep their $0.00 entry so every
    /// selected payment maps to exactly one transfer.
    pub fn transfer_amounts(&self) -> Vec<Cents> {
        let mut amounts: Vec<Cents> = self.eligible.iter().map(|t| t.amount).collect();
        if !self.remainder.is_zero() {
            amounts.push(self.remainder);
        }
        amounts
    }

    pub fn is_empty(&self) -> bool {
        self.eligible.is_empty() && self.remainder.is_zero()
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CashoutOutcome {
    /// Balance was zero.
    NothingToDo,
    /// Plan computed and reported, nothing issued.
    DryRun,
    /// All transfers issued (and rules created, if configured).
    Completed,
}

impl fmt::Display for CashoutOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CashoutOutcome::NothingToDo => write!(f, "nothing-to-do"),
            CashoutOutcome::DryRun => write!(f, "dry-run"),
            CashoutOutcome::Completed => write!(f, "completed"),
        }
    }
}

/// Summary of a single cashout run.
#[derive(Debug, Clone, Serialize)]
pub struct CashoutReport {
    pub run_id: uuid::Uuid,
    pub started_at: DateTime<Utc>,
    pub balance: Cents,
    pub plan: CashoutPlan,
    pub outcome: CashoutOutcome,
    pub transfers: Vec<TransferReceipt>,
    /// Number of matching rules created, if rule creation ran.
    pub rules_created: Option<usize>,
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Terminal failures of a cashout run, one per stage.
#[derive(Debug, thiserror::Error)]
pub enum CashoutError {
    #[error("Failed to load Venmo profile: {0}")]
    ProfileUnavailable(String),

    #[error("Failed to load transactions: {0}")]
    FeedUnavailable(String),

    #[error("Transfer of {amount} failed after {completed} successful transfer(s): {message}")]
    TransferFailed {
        amount: Cents,
        completed: usize,
        message: String,
    },

    #[error("Failed to create Lunch Money rules: {0}")]
    RuleCreationFailed(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

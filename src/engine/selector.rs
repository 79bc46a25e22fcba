//! Eligibility selector.
//!
//! Walks the feed newest-first and claims payments to this account until the
//! balance is accounted for. The first payment larger than what is still
//! unaccounted ends the walk: in a newest-first feed, that payment predates
//! the run of payments that make up the current balance.
//!
//! Nothing guards against feeds that are not newest-first; such feeds produce
//! a smaller selection and a larger remainder rather than an error.

use tracing::debug;

use crate::types::{CashoutPlan, Cents, Transaction};

/// Select the transactions that account for `balance`.
///
/// `feed` is consumed lazily and nothing past the terminating element is
/// pulled. The returned plan always satisfies
/// `plan.matched_total() + plan.remainder == balance`.
pub fn select<I>(balance: Cents, feed: I, username: &str) -> CashoutPlan
where
    I: IntoIterator<Item = Transaction>,
{
    let mut remaining = balance;
    let mut eligible = Vec::new();

    if remaining.is_zero() {
        return CashoutPlan::default();
    }

    for transaction in feed {
        // Payments we sent, or charges we paid
        if transaction.payee.username != username {
            continue;
        }

        let Some(after) = remaining.checked_sub(transaction.amount) else {
            debug!(
                id = %transaction.id,
                amount = %transaction.amount,
                remaining = %remaining,
                "Transaction exceeds remaining balance, stopping"
            );
            break;
        };

        remaining = after;
        eligible.push(transaction);

        if remaining.is_zero() {
            break;
        }
    }

    CashoutPlan {
        eligible,
        remainder: remaining,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

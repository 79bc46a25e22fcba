//! Cashout orchestrator.
//!
//! Reads the balance, waits for the feed to settle, selects the payments
//! that make up the balance and transfers each one out individually,
//! followed by one transfer for whatever could not be attributed. Transfers
//! are issued one at a time and never rolled back: a failure part-way leaves
//! the earlier transfers in effect.

use std::fmt::Display;

use chrono::Utc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::config::CashoutConfig;
use crate::engine::selector;
use crate::platforms::PaymentPlatform;
use crate::rules::RuleSink;
use crate::types::{CashoutError, CashoutOutcome, CashoutPlan, CashoutReport, Cents};

// ---------------------------------------------------------------------------
// Console
// ---------------------------------------------------------------------------

/// User-facing output. Separate from tracing so `--quiet` silences the
/// report without touching log configuration.
#[derive(Debug, Clone, Copy)]
struct Console {
    quiet: bool,
}

impl Console {
    fn say(&self, msg: impl Display) {
        if !self.quiet {
            println!("{msg}");
        }
    }
}

// ---------------------------------------------------------------------------
// Runner
// ---------------------------------------------------------------------------

pub struct CashoutRunner<P, R> {
    platform: P,
    rules: R,
    config: CashoutConfig,
}

impl<P, R> CashoutRunner<P, R>
where
    P: PaymentPlatform,
    R: RuleSink,
{
    pub fn new(platform: P, rules: R, config: CashoutConfig) -> Self {
        Self {
            platform,
            rules,
            config,
        }
    }

    pub fn config(&self) -> &CashoutConfig {
        &self.config
    }

    /// Execute one cashout run.
    ///
    /// In dry-run mode the plan is computed and reported but no transfers
    /// or rules are created.
    pub async fn run(&self) -> Result<CashoutReport, CashoutError> {
        let run_id = uuid::Uuid::new_v4();
        let span = info_span!("cashout", run_id = %run_id, dry_run = self.config.dry_run);
        self.run_inner(run_id).instrument(span).await
    }

    async fn run_inner(&self, run_id: uuid::Uuid) -> Result<CashoutReport, CashoutError> {
        let console = Console {
            quiet: self.config.quiet,
        };

        let profile = self
            .platform
            .get_profile()
            .await
            .map_err(|e| CashoutError::ProfileUnavailable(format!("{e:#}")))?;

        let mut report = CashoutReport {
            run_id,
            started_at: Utc::now(),
            balance: profile.balance,
            plan: CashoutPlan::default(),
            outcome: CashoutOutcome::NothingToDo,
            transfers: Vec::new(),
            rules_created: None,
        };

        info!(username = %profile.username, balance = %profile.balance, "Profile loaded");

        if profile.balance.is_zero() {
            console.say("Your venmo balance is zero. Nothing to do");
            return Ok(report);
        }

        console.say(format!("Your balance is {}", profile.balance));

        let delay = self.config.settle_delay;
        if !delay.is_zero() {
            console.say(format!(
                "Waiting {} seconds before querying transactions...",
                delay.as_secs_f64()
            ));
            tokio::time::sleep(delay).await;
        }

        let feed = self
            .platform
            .list_transactions(&profile)
            .instrument(info_span!("get_transactions"))
            .await
            .map_err(|e| CashoutError::FeedUnavailable(format!("{e:#}")))?;

        debug!(feed_len = feed.len(), "Transaction feed loaded");

        let plan = selector::select(profile.balance, feed, &profile.username);

        info!(
            transaction_count = plan.eligible.len(),
            matched = %plan.matched_total(),
            remainder = %plan.remainder,
            "Cashout plan computed"
        );

        for line in plan_lines(&plan, self.config.dry_run) {
            console.say(line);
        }
        report.plan = plan;

        if self.config.dry_run {
            report.outcome = CashoutOutcome::DryRun;
            return Ok(report);
        }

        self.issue_transfers(&mut report)
            .instrument(info_span!("initiate_transfer"))
            .await?;

        if let Some(credentials) = &self.config.finance_credentials {
            let created = self
                .rules
                .create_matching_rules(&report.plan.eligible, credentials)
                .instrument(info_span!("lunchmoney_create_rules"))
                .await
                .map_err(|e| {
                    warn!(error = %e, "Rule creation failed after transfers were issued");
                    CashoutError::RuleCreationFailed(format!("{e:#}"))
                })?;

            info!(rules = created, "Matching rules created");
            report.rules_created = Some(created);
        }

        console.say("\nAll money transferred out!");
        report.outcome = CashoutOutcome::Completed;
        Ok(report)
    }

    /// Issue one transfer per planned amount, stopping at the first failure.
    async fn issue_transfers(&self, report: &mut CashoutReport) -> Result<(), CashoutError> {
        let amounts = report.plan.transfer_amounts();
        info!(count = amounts.len(), "Initiating transfers");

        for amount in amounts {
            match self.platform.initiate_transfer(amount).await {
                Ok(receipt) => {
                    info!(id = %receipt.id, amount = %receipt.amount, status = %receipt.status, "Transfer initiated");
                    report.transfers.push(receipt);
                }
                Err(e) => {
                    warn!(
                        amount = %amount,
                        completed = report.transfers.len(),
                        error = %e,
                        "Transfer failed"
                    );
                    return Err(CashoutError::TransferFailed {
                        amount,
                        completed: report.transfers.len(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        Ok(())
    }
}

/// The lines shown to the user for a computed plan, ending with the
/// dry-run notice when no transfers will follow.
fn plan_lines(plan: &CashoutPlan, dry_run: bool) -> Vec<String> {
    let mut lines = vec![format!(
        "There are {} transactions to cash-out",
        plan.eligible.len()
    )];

    if !plan.eligible.is_empty() {
        lines.push(String::new());
    }

    for transaction in &plan.eligible {
        lines.push(format!(" -> Transfer: {transaction}"));
    }

    if plan.remainder > Cents::ZERO {
        lines.push(format!(
            " -> Transfer: {} of remaining balance",
            plan.remainder
        ));
    }

    if dry_run {
        lines.push("\ndry-run -- Not initiating transfers".to_string());
    }

    lines
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! End-to-end cashout runs.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use secrecy::SecretString;
use tokio_test::{assert_err, assert_ok};

use venmo_cashout::config::CashoutConfig;
use venmo_cashout::engine::CashoutRunner;
use venmo_cashout::rules::FinanceCredentials;
use venmo_cashout::types::{CashoutError, CashoutOutcome, Cents};

use crate::mock_platform::{payment, Call, CallLog, MockPlatform, MockRules};

fn log() -> CallLog {
    Arc::new(Mutex::new(Vec::new()))
}

fn credentials() -> FinanceCredentials {
    FinanceCredentials {
        email: "me@example.com".to_string(),
        password: SecretString::new("pw".to_string()),
        otp_secret: Some(SecretString::new("JBSWY3DPEHPK3PXP".to_string())),
    }
}

fn config(dry_run: bool, with_rules: bool) -> CashoutConfig {
    CashoutConfig {
        dry_run,
        quiet: true,
        settle_delay: Duration::ZERO,
        finance_credentials: with_rules.then(credentials),
    }
}

#[tokio::test]
async fn test_matched_payments_then_no_remainder() {
    let calls = log();
    let platform = MockPlatform::with_log(
        1500,
        vec![
            payment("1", "me", 1000),
            payment("2", "other", 500),
            payment("3", "me", 500),
        ],
        calls.clone(),
    );
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(false, false));
    let report = assert_ok!(runner.run().await);

    assert_eq!(report.outcome, CashoutOutcome::Completed);
    let ids: Vec<_> = report.plan.eligible.iter().map(|t| t.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert_eq!(report.plan.remainder, Cents::ZERO);
    assert_eq!(handle.transfers(), vec![Cents(1000), Cents(500)]);
    assert_eq!(report.transfers.len(), 2);
}

#[tokio::test]
async fn test_over_budget_head_becomes_single_remainder_transfer() {
    let platform = MockPlatform::new(700, vec![payment("1", "me", 1000)]);
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(log()), config(false, false));
    let report = assert_ok!(runner.run().await);

    assert!(report.plan.eligible.is_empty());
    assert_eq!(report.plan.remainder, Cents(700));
    assert_eq!(handle.transfers(), vec![Cents(700)]);
}

#[tokio::test]
async fn test_zero_balance_is_a_successful_no_op() {
    let calls = log();
    let platform = MockPlatform::with_log(0, vec![payment("1", "me", 100)], calls.clone());
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(false, true));
    let report = assert_ok!(runner.run().await);

    assert_eq!(report.outcome, CashoutOutcome::NothingToDo);
    assert_eq!(handle.calls(), vec![Call::GetProfile]);
    assert_eq!(handle.feed_fetches(), 0);
}

#[tokio::test]
async fn test_dry_run_reports_plan_without_side_effects() {
    let calls = log();
    let platform = MockPlatform::with_log(
        1250,
        vec![payment("1", "me", 1000), payment("2", "me", 100)],
        calls.clone(),
    );
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(true, true));
    let report = assert_ok!(runner.run().await);

    assert_eq!(report.outcome, CashoutOutcome::DryRun);
    assert_eq!(report.plan.eligible.len(), 2);
    assert_eq!(report.plan.remainder, Cents(150));
    assert_eq!(report.plan.transfer_amounts(), vec![Cents(1000), Cents(100), Cents(150)]);
    assert_eq!(handle.calls(), vec![Call::GetProfile, Call::ListTransactions]);
    assert!(report.transfers.is_empty());
    assert_eq!(report.rules_created, None);
}

#[tokio::test]
async fn test_rules_created_after_all_transfers() {
    let calls = log();
    let platform = MockPlatform::with_log(
        1100,
        vec![payment("a", "me", 600), payment("b", "me", 400)],
        calls.clone(),
    );
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(false, true));
    let report = assert_ok!(runner.run().await);

    assert_eq!(report.rules_created, Some(2));
    assert_eq!(
        handle.calls(),
        vec![
            Call::GetProfile,
            Call::ListTransactions,
            Call::Transfer(Cents(600)),
            Call::Transfer(Cents(400)),
            Call::Transfer(Cents(100)),
            Call::CreateRules(vec!["a".to_string(), "b".to_string()]),
        ]
    );
}

#[tokio::test]
async fn test_rules_called_once_even_with_empty_eligible_set() {
    let calls = log();
    let platform = MockPlatform::with_log(300, vec![payment("1", "me", 900)], calls.clone());
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(false, true));
    let report = assert_ok!(runner.run().await);

    assert_eq!(report.rules_created, Some(0));
    assert_eq!(handle.calls().last(), Some(&Call::CreateRules(vec![])));
}

#[tokio::test]
async fn test_partial_transfer_failure_keeps_earlier_transfers() {
    let calls = log();
    let platform = MockPlatform::with_log(
        900,
        vec![
            payment("1", "me", 300),
            payment("2", "me", 300),
            payment("3", "me", 300),
        ],
        calls.clone(),
    )
    .failing_transfer_at(1);
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(false, true));
    let err = assert_err!(runner.run().await);

    match err {
        CashoutError::TransferFailed {
            amount, completed, ..
        } => {
            assert_eq!(amount, Cents(300));
            assert_eq!(completed, 1);
        }
        other => panic!("unexpected error: {other}"),
    }

    // Third transfer never attempted, rules never created
    assert_eq!(handle.transfers(), vec![Cents(300), Cents(300)]);
    assert!(!handle
        .calls()
        .iter()
        .any(|c| matches!(c, Call::CreateRules(_))));
}

#[tokio::test]
async fn test_profile_failure_message_names_stage() {
    let platform = MockPlatform::new(100, vec![]).failing_profile("401 Unauthorized");
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(log()), config(false, false));
    let err = assert_err!(runner.run().await);

    assert!(matches!(err, CashoutError::ProfileUnavailable(_)));
    assert!(err.to_string().contains("Venmo profile"));
    assert_eq!(handle.feed_fetches(), 0);
}

#[tokio::test]
async fn test_feed_failure_issues_no_transfers() {
    let platform = MockPlatform::new(100, vec![]).failing_feed("connection reset");
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(log()), config(false, false));
    let err = assert_err!(runner.run().await);

    assert!(matches!(err, CashoutError::FeedUnavailable(ref m) if m.contains("connection reset")));
    assert!(handle.transfers().is_empty());
}

#[tokio::test]
async fn test_rule_failure_after_transfers() {
    let calls = log();
    let platform = MockPlatform::with_log(500, vec![payment("1", "me", 500)], calls.clone());
    let handle = platform.clone();

    let rules = MockRules::new(calls).failing("login rejected");
    let runner = CashoutRunner::new(platform, rules, config(false, true));
    let err = assert_err!(runner.run().await);

    assert!(matches!(err, CashoutError::RuleCreationFailed(_)));
    assert_eq!(handle.transfers(), vec![Cents(500)]);
}

#[tokio::test]
async fn test_settle_delay_precedes_feed_read() {
    let delay = Duration::from_millis(200);
    let platform = MockPlatform::new(100, vec![payment("1", "me", 100)]);
    let handle = platform.clone();

    let mut cfg = config(true, false);
    cfg.settle_delay = delay;

    let runner = CashoutRunner::new(platform, MockRules::new(log()), cfg);
    let started = Instant::now();
    assert_ok!(runner.run().await);

    let fetched = handle.feed_read_at().expect("feed was never read");
    assert!(
        fetched.duration_since(started) >= delay,
        "feed read {:?} after start, before the settle delay elapsed",
        fetched.duration_since(started)
    );
}

#[tokio::test]
async fn test_zero_amount_payment_still_gets_its_transfer() {
    let calls = log();
    let platform = MockPlatform::with_log(
        500,
        vec![payment("1", "me", 0), payment("2", "me", 500)],
        calls.clone(),
    );
    let handle = platform.clone();

    let runner = CashoutRunner::new(platform, MockRules::new(calls), config(false, true));
    let report = assert_ok!(runner.run().await);

    assert_eq!(handle.transfers(), vec![Cents::ZERO, Cents(500)]);
    assert_eq!(report.rules_created, Some(2));
}

//! venmo-cashout: empty a Venmo balance as one bank transfer per payment.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod platforms;
pub mod rules;
pub mod engine;
pub mod cli;

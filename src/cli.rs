//! Command-line flags.
//!
//! Every secret flag falls back to an environment variable, so the tool can
//! run from cron with a `.env` file and no arguments.

use secrecy::SecretString;

use crate::config::{
    CashoutConfig, LUNCHMONEY_EMAIL_ENV, LUNCHMONEY_OTP_SECRET_ENV, LUNCHMONEY_PASSWORD_ENV,
    VENMO_TOKEN_ENV,
};
use crate::rules::FinanceCredentials;
use crate::types::CashoutError;

pub const USAGE: &str = "\
Automatically cash-out your Venmo balance as individual transfers

Usage: venmo-cashout [OPTIONS]

Options:
  --token <TOKEN>                    Your Venmo API token [env: VENMO_API_TOKEN]
  --lunchmoney-email <EMAIL>         Authenticate with Lunch Money to add matching rules on cashout [env: LUNCHMONEY_EMAIL]
  --lunchmoney-password <PASSWORD>   [env: LUNCHMONEY_PASSWORD]
  --lunchmoney-otp-secret <SECRET>   [env: LUNCHMONEY_OTP_SECRET]
  --quiet, --no-quiet                Do not produce any output
  --dry-run, --no-dry-run            Do not actually initiate bank transfers
  --config <PATH>                    Optional TOML file with client settings
  -h, --help                         Print help";

/// Flags as given on the command line, before environment defaults.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Args {
    pub token: Option<String>,
    pub lunchmoney_email: Option<String>,
    pub lunchmoney_password: Option<String>,
    pub lunchmoney_otp_secret: Option<String>,
    pub quiet: bool,
    pub dry_run: bool,
    pub config: Option<String>,
    pub help: bool,
}

/// Flags with environment defaults applied and secrets wrapped.
#[derive(Debug)]
pub struct Resolved {
    pub token: SecretString,
    pub finance_credentials: Option<FinanceCredentials>,
    pub quiet: bool,
    pub dry_run: bool,
    pub config: Option<String>,
}

impl Args {
    /// Parse flags, excluding the program name.
    pub fn parse<I>(args: I) -> Result<Self, CashoutError>
    where
        I: IntoIterator<Item = String>,
    {
        let mut parsed = Args::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let (flag, inline) = match arg.split_once('=') {
                Some((flag, value)) if flag.starts_with("--") => (flag.to_string(), Some(value.to_string())),
                _ => (arg.clone(), None),
            };

            let mut value = |name: &str| -> Result<String, CashoutError> {
                inline
                    .clone()
                    .or_else(|| args.next())
                    .ok_or_else(|| CashoutError::Config(format!("{name} requires a value")))
            };

            match flag.as_str() {
                "--token" => parsed.token = Some(value("--token")?),
                "--lunchmoney-email" => parsed.lunchmoney_email = Some(value("--lunchmoney-email")?),
                "--lunchmoney-password" => {
                    parsed.lunchmoney_password = Some(value("--lunchmoney-password")?)
                }
                "--lunchmoney-otp-secret" => {
                    parsed.lunchmoney_otp_secret = Some(value("--lunchmoney-otp-secret")?)
                }
                "--config" => parsed.config = Some(value("--config")?),
                "--quiet" => parsed.quiet = true,
                "--no-quiet" => parsed.quiet = false,
                "--dry-run" => parsed.dry_run = true,
                "--no-dry-run" => parsed.dry_run = false,
                "-h" | "--help" => parsed.help = true,
                other => {
                    return Err(CashoutError::Config(format!("unrecognized argument '{other}'")));
                }
            }
        }

        Ok(parsed)
    }

    /// Fill unset flags from `env` and validate the combination.
    pub fn resolve<F>(self, env: F) -> Result<Resolved, CashoutError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = self
            .token
            .or_else(|| env(VENMO_TOKEN_ENV))
            .ok_or_else(|| {
                CashoutError::Config(format!("--token is required (or set {VENMO_TOKEN_ENV})"))
            })?;

        let finance_credentials = CashoutConfig::credentials_from_parts(
            self.lunchmoney_email.or_else(|| env(LUNCHMONEY_EMAIL_ENV)),
            self.lunchmoney_password.or_else(|| env(LUNCHMONEY_PASSWORD_ENV)),
            self.lunchmoney_otp_secret.or_else(|| env(LUNCHMONEY_OTP_SECRET_ENV)),
        )
        .map_err(|e| CashoutError::Config(e.to_string()))?;

        Ok(Resolved {
            token: SecretString::new(token),
            finance_credentials,
            quiet: self.quiet,
            dry_run: self.dry_run,
            config: self.config,
        })
    }
}

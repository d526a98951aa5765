//! Runtime configuration read from the environment.
use anyhow::Context;

use crate::escrow::{Address, Decimals, MAX_DECIMALS, TokenOption};

/// Decimal places of GHST and most ERC-20 tokens.
const DEFAULT_DECIMALS: Decimals = 18;

/// Output format of the log lines written to stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Settings shared by every withdrawal run.
pub struct Config {
    /// Decimal places of the withdrawn token.
    pub decimals: Decimals,
    /// GHST or a custom token contract.
    pub token: TokenOption,
    /// Wallet that receives the withdrawn tokens.
    pub recipient: Address,
    /// Text or JSON log lines.
    pub log_format: LogFormat,
}

impl Config {
    /// Reads `ESCROW_*` variables. Call `dotenvy::dotenv()` first to pick up a `.env` file.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let decimals = lookup("ESCROW_TOKEN_DECIMALS")
            .map(|value| value.trim().parse::<Decimals>())
            .transpose()
            .context("Invalid ESCROW_TOKEN_DECIMALS")?
            .unwrap_or(DEFAULT_DECIMALS);
        anyhow::ensure!(
            decimals <= MAX_DECIMALS,
            "ESCROW_TOKEN_DECIMALS must be at most {MAX_DECIMALS}"
        );
        let token = lookup("ESCROW_TOKEN")
            .unwrap_or_else(|| "ghst".into())
            .parse()
            .context("Invalid ESCROW_TOKEN")?;
        let recipient = lookup("ESCROW_RECIPIENT")
            .context("ESCROW_RECIPIENT is not set")?
            .parse()
            .context("Invalid ESCROW_RECIPIENT")?;
        let log_format = match lookup("ESCROW_LOG_FORMAT") {
            Some(format) if format.eq_ignore_ascii_case("json") => LogFormat::Json,
            _ => LogFormat::Text,
        };
        Ok(Config {
            decimals,
            token,
            recipient,
            log_format,
        })
    }
}

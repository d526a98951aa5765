use anyhow::Context;
use csv::{ReaderBuilder, Trim};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::config::{Config, LogFormat};
use crate::escrow::{CsvPlanSink, PlanSink, Registry, Selection};

mod config;
mod escrow;

/// The size of the channel for loading escrow records.
const CHANNEL_SIZE: usize = 100;

/// Logs go to stderr so the plan on stdout stays machine-readable.
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
        LogFormat::Text => registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = std::env::args().collect::<Vec<_>>();
    if !(3..=4).contains(&args.len()) {
        eprintln!("Usage: {} <balances_csv> <amount|max> [token_id]", args[0]);
        std::process::exit(1);
    }
    let input_file = &args[1];
    let amount = &args[2];
    let selection = match args.get(3) {
        Some(token_id) => Selection::Single(token_id.parse().context("Invalid token id")?),
        None => Selection::All,
    };

    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    init_tracing(config.log_format);

    let (sender, receiver) = mpsc::channel(CHANNEL_SIZE);
    let mut registry = Registry::new(receiver, config.decimals);

    let handle = tokio::spawn(async move {
        registry.run().await;
        registry
    });

    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .from_path(input_file)
        .with_context(|| format!("Failed to read CSV file {input_file}"))?;

    for record in reader.deserialize() {
        match record {
            Ok(record) => {
                if let Err(err) = sender.send(record).await {
                    tracing::error!("Error sending escrow record: {err}");
                }
            }
            Err(err) => tracing::warn!("Skipping malformed row: {err}"),
        }
    }

    drop(sender); // Close the sender to signal no more records will be sent
    let registry = handle
        .await
        .context("Failed to join the registry task")?;

    tracing::info!(
        "Loaded {} escrow accounts, {} owned",
        registry.all().len(),
        registry.owned().count()
    );
    for account in registry.owned() {
        tracing::debug!(
            token_id = account.token_id(),
            wallet = %account.escrow_wallet(),
            "{}: {}",
            account.display_name(),
            escrow::format_units(account.balance(&config.token), config.decimals)
        );
    }

    let requested = if amount.eq_ignore_ascii_case("max") {
        let max = registry.max_amount(&selection, &config.token)?;
        tracing::info!(
            "Max amount set: {} for {:?}",
            escrow::format_units(max, config.decimals),
            selection
        );
        max
    } else {
        escrow::parse_units(amount, config.decimals)
            .with_context(|| format!("Invalid amount {amount:?}"))?
    };

    let plan = escrow::plan_withdrawal(
        &registry,
        &selection,
        &config.token,
        config.recipient.clone(),
        requested,
    )?;

    tracing::info!(
        "Planned batch withdrawal of {} from {} escrow accounts:",
        escrow::format_units(plan.total(), plan.decimals()),
        plan.entries().len()
    );
    for entry in plan.entries() {
        tracing::info!(
            "Aavegotchi {}: {}",
            entry.token_id,
            escrow::format_units(entry.amount, plan.decimals())
        );
    }
    tracing::debug!(
        token_ids = ?plan.token_ids(),
        tokens = ?plan.token_addresses(),
        recipients = ?plan.recipients(),
        amounts = ?plan.amounts(),
        "batchTransferEscrow arguments"
    );

    let mut sink = CsvPlanSink::new(std::io::stdout());
    sink.submit(&plan)?;
    Ok(())
}

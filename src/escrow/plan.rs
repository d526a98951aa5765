//! Withdrawal plans and the seams that feed and consume them.
use std::io;

use serde::Serialize;
use thiserror::Error;

use crate::escrow::{
    Address, AllocationError, Amount, Decimals, EscrowBalance, RegistryError, Selection, TokenId,
    TokenOption, allocate, format_units,
};

/// Supplies per-account balances and their precision.
pub trait BalanceSource {
    /// Decimal places of the balances returned by [`BalanceSource::balances`].
    fn decimals(&self) -> Decimals;

    /// Balances of `token` held by the selected accounts, in a stable order.
    fn balances(
        &self,
        selection: &Selection,
        token: &TokenOption,
    ) -> Result<Vec<EscrowBalance>, RegistryError>;
}

/// Accepts a finished plan for execution.
pub trait PlanSink {
    /// Hands `plan` to the executor.
    fn submit(&mut self, plan: &WithdrawalPlan) -> Result<(), SinkError>;
}

/// Errors raised by a [`PlanSink`].
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Failed to write plan: {0}")]
    Csv(#[from] csv::Error),
    #[error("Failed to flush plan: {0}")]
    Io(#[from] io::Error),
}

/// Errors that can occur while planning a withdrawal.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum WithdrawError {
    #[error("No escrow accounts selected")]
    NoAccountsSelected,
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Allocation(#[from] AllocationError),
}

/// One transfer out of an escrow wallet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlanEntry {
    pub token_id: TokenId,
    pub amount: Amount,
}

/// A batch escrow transfer of one token to one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WithdrawalPlan {
    token: Address,
    recipient: Address,
    decimals: Decimals,
    entries: Vec<PlanEntry>,
}

impl WithdrawalPlan {
    /// Gets the address of the withdrawn token.
    pub fn token(&self) -> &Address {
        &self.token
    }

    /// Gets the wallet receiving every transfer.
    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    /// Gets the decimal places of the entry amounts.
    pub fn decimals(&self) -> Decimals {
        self.decimals
    }

    /// Gets the transfers in account order.
    pub fn entries(&self) -> &[PlanEntry] {
        &self.entries
    }

    /// Sum of all entry amounts; equals the requested total.
    pub fn total(&self) -> Amount {
        self.entries.iter().map(|entry| entry.amount).sum()
    }

    /// The token ID column of the batch transfer.
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.entries.iter().map(|entry| entry.token_id).collect()
    }

    /// The token address repeated once per entry.
    pub fn token_addresses(&self) -> Vec<Address> {
        vec![self.token.clone(); self.entries.len()]
    }

    /// The recipient repeated once per entry.
    pub fn recipients(&self) -> Vec<Address> {
        vec![self.recipient.clone(); self.entries.len()]
    }

    /// The amount column of the batch transfer.
    pub fn amounts(&self) -> Vec<Amount> {
        self.entries.iter().map(|entry| entry.amount).collect()
    }
}

/// Builds the plan that withdraws `requested_total` of `token` from the selected accounts.
pub fn plan_withdrawal<S: BalanceSource>(
    source: &S,
    selection: &Selection,
    token: &TokenOption,
    recipient: Address,
    requested_total: Amount,
) -> Result<WithdrawalPlan, WithdrawError> {
    let balances = source.balances(selection, token)?;
    if balances.is_empty() {
        return Err(WithdrawError::NoAccountsSelected);
    }
    let decimals = source.decimals();
    let entries = allocate(&balances, requested_total, decimals)?
        .into_iter()
        .map(|allocation| PlanEntry {
            token_id: allocation.token_id,
            amount: allocation.amount,
        })
        .collect();
    Ok(WithdrawalPlan {
        token: token.address(),
        recipient,
        decimals,
        entries,
    })
}

#[derive(Serialize)]
struct PlanRow<'a> {
    token_id: TokenId,
    token: &'a Address,
    recipient: &'a Address,
    amount: String,
}

/// Writes a plan as CSV, one row per transfer.
pub struct CsvPlanSink<W: io::Write> {
    writer: csv::Writer<W>,
}

impl<W: io::Write> CsvPlanSink<W> {
    /// Creates a sink writing a header row and then one row per entry.
    pub fn new(writer: W) -> Self {
        CsvPlanSink {
            writer: csv::Writer::from_writer(writer),
        }
    }

    /// Returns the underlying writer, flushing buffered rows.
    #[cfg(test)]
    pub fn into_inner(self) -> Result<W, SinkError> {
        self.writer.into_inner().map_err(|err| {
            let source = err.error();
            SinkError::Io(io::Error::new(source.kind(), source.to_string()))
        })
    }
}

impl<W: io::Write> PlanSink for CsvPlanSink<W> {
    fn submit(&mut self, plan: &WithdrawalPlan) -> Result<(), SinkError> {
        for entry in plan.entries() {
            self.writer.serialize(PlanRow {
                token_id: entry.token_id,
                token: plan.token(),
                recipient: plan.recipient(),
                amount: format_units(entry.amount, plan.decimals()),
            })?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

//! The `Registry` collects escrow accounts from a balance snapshot and answers selection queries.
use std::collections::HashMap;

use thiserror::Error;
use tokio::sync::mpsc;

use crate::escrow::{
    Amount, BalanceSource, Decimals, EscrowAccount, EscrowBalance, EscrowRecord, TokenId,
    TokenOption, UnitsError,
};

/// Which owned escrow accounts a withdrawal draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// Every account that is not lent out.
    All,
    /// A single account.
    Single(TokenId),
}

/// Errors that can occur while loading or querying escrow accounts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("Account {0} is already registered")]
    DuplicateAccount(TokenId),
    #[error("Invalid balance for account {token_id}: {source}")]
    InvalidBalance {
        token_id: TokenId,
        source: UnitsError,
    },
    #[error("Account {0} is not registered")]
    UnknownAccount(TokenId),
    #[error("Account {0} is lent out")]
    AccountLent(TokenId),
    #[error("Aggregate balance overflows")]
    BalanceOverflow,
}

/// Escrow accounts in snapshot order, fed through a channel.
pub struct Registry {
    /// Accounts in the order they were received.
    accounts: Vec<EscrowAccount>,
    /// Position of each account in `accounts`.
    index: HashMap<TokenId, usize>,
    /// Decimal places of the token balances.
    decimals: Decimals,
    /// A channel receiver for incoming snapshot rows.
    receiver: mpsc::Receiver<EscrowRecord>,
}

impl Registry {
    /// Creates an empty registry reading rows from `receiver`.
    pub fn new(receiver: mpsc::Receiver<EscrowRecord>, decimals: Decimals) -> Self {
        Registry {
            accounts: Vec::new(),
            index: HashMap::new(),
            decimals,
            receiver,
        }
    }

    /// Adds one snapshot row. Duplicates and unparsable balances are rejected.
    pub fn register(&mut self, record: EscrowRecord) -> Result<(), RegistryError> {
        let token_id = record.token_id;
        if self.index.contains_key(&token_id) {
            return Err(RegistryError::DuplicateAccount(token_id));
        }
        let account = EscrowAccount::from_record(record, self.decimals)
            .map_err(|source| RegistryError::InvalidBalance { token_id, source })?;
        self.index.insert(token_id, self.accounts.len());
        self.accounts.push(account);
        Ok(())
    }

    /// Retrieves an account by token ID.
    pub fn get(&self, token_id: TokenId) -> Option<&EscrowAccount> {
        self.index.get(&token_id).map(|&i| &self.accounts[i])
    }

    /// Retrieves all accounts in snapshot order, lent ones included.
    pub fn all(&self) -> &[EscrowAccount] {
        &self.accounts
    }

    /// Accounts that are not lent out, in snapshot order.
    pub fn owned(&self) -> impl Iterator<Item = &EscrowAccount> {
        self.accounts.iter().filter(|account| !account.is_lent())
    }

    /// The accounts named by `selection`.
    pub fn select(&self, selection: &Selection) -> Result<Vec<&EscrowAccount>, RegistryError> {
        match selection {
            Selection::All => Ok(self.owned().collect()),
            Selection::Single(token_id) => {
                let account = self
                    .get(*token_id)
                    .ok_or(RegistryError::UnknownAccount(*token_id))?;
                if account.is_lent() {
                    return Err(RegistryError::AccountLent(*token_id));
                }
                Ok(vec![account])
            }
        }
    }

    /// Largest withdrawable amount: the summed balance of the selected accounts.
    pub fn max_amount(
        &self,
        selection: &Selection,
        token: &TokenOption,
    ) -> Result<Amount, RegistryError> {
        self.select(selection)?
            .iter()
            .try_fold(0, |sum: Amount, account| {
                sum.checked_add(account.balance(token))
            })
            .ok_or(RegistryError::BalanceOverflow)
    }

    /// Runs the ingestion loop until the sender side is closed.
    pub async fn run(&mut self) {
        while let Some(record) = self.receiver.recv().await {
            if let Err(e) = self.register(record) {
                tracing::warn!("Skipping escrow record: {e}");
            }
        }
        tracing::debug!(accounts = self.accounts.len(), "registry loaded");
    }
}

impl BalanceSource for Registry {
    fn decimals(&self) -> Decimals {
        self.decimals
    }

    fn balances(
        &self,
        selection: &Selection,
        token: &TokenOption,
    ) -> Result<Vec<EscrowBalance>, RegistryError> {
        Ok(self
            .select(selection)?
            .into_iter()
            .map(|account| account.escrow_balance(token))
            .collect())
    }
}

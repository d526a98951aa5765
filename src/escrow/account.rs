//! Escrow accounts held by Aavegotchi NFTs.
use serde::Deserialize;

use crate::escrow::{
    Address, Amount, Decimals, EscrowBalance, TokenId, TokenOption, UnitsError, parse_units,
};

/// One row of a balance snapshot, with balances still in decimal form.
#[derive(Deserialize, Debug, Clone)]
pub struct EscrowRecord {
    /// The NFT that owns the escrow wallet.
    pub token_id: TokenId,

    /// Display name of the Aavegotchi, possibly empty.
    #[serde(default)]
    pub name: String,

    /// Address of the escrow wallet.
    pub escrow_wallet: Address,

    /// GHST balance, e.g. `"12.5"`.
    pub ghst_balance: String,

    /// Balance of the custom token, if one was queried.
    #[serde(default)]
    pub custom_balance: Option<String>,

    /// Whether the Aavegotchi is currently lent out.
    #[serde(default)]
    pub lent: bool,
}

/// An escrow account with balances scaled to fixed point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EscrowAccount {
    token_id: TokenId,
    name: String,
    escrow_wallet: Address,
    ghst_balance: Amount,
    custom_balance: Option<Amount>,
    lent: bool,
}

impl EscrowAccount {
    /// Converts a snapshot row, parsing its balances with the given precision.
    pub fn from_record(record: EscrowRecord, decimals: Decimals) -> Result<Self, UnitsError> {
        let ghst_balance = parse_units(&record.ghst_balance, decimals)?;
        let custom_balance = match record.custom_balance.as_deref().map(str::trim) {
            Some(text) if !text.is_empty() => Some(parse_units(text, decimals)?),
            _ => None,
        };
        Ok(EscrowAccount {
            token_id: record.token_id,
            name: record.name,
            escrow_wallet: record.escrow_wallet,
            ghst_balance,
            custom_balance,
            lent: record.lent,
        })
    }

    /// Gets the token ID of the owning Aavegotchi.
    pub fn token_id(&self) -> TokenId {
        self.token_id
    }

    /// The name, falling back to `Aavegotchi #<id>` when none is set.
    pub fn display_name(&self) -> String {
        if self.name.trim().is_empty() {
            format!("Aavegotchi #{}", self.token_id)
        } else {
            self.name.clone()
        }
    }

    /// Gets the escrow wallet address.
    pub fn escrow_wallet(&self) -> &Address {
        &self.escrow_wallet
    }

    /// Indicates whether the Aavegotchi is lent out.
    pub fn is_lent(&self) -> bool {
        self.lent
    }

    /// Balance of the given token. A missing custom-token balance counts as zero.
    pub fn balance(&self, token: &TokenOption) -> Amount {
        match token {
            TokenOption::Ghst => self.ghst_balance,
            TokenOption::Custom(_) => self.custom_balance.unwrap_or_default(),
        }
    }

    /// The account's balance of `token` as allocator input.
    pub fn escrow_balance(&self, token: &TokenOption) -> EscrowBalance {
        EscrowBalance::new(self.token_id, self.balance(token))
    }
}

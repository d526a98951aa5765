//! Types used throughout the escrow withdrawal planner.
use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::escrow::AllocationError;

/// GHST token contract on Polygon, the default withdrawal token.
pub const GHST_CONTRACT_ADDRESS: &str = "0x385Eeac5cB85A38A9a07A70c73e0a3271CfB54A7";

/// Largest number of decimal places whose scale `10^decimals` fits in an [`Amount`].
pub const MAX_DECIMALS: Decimals = 38;

/// Token ID type, the Aavegotchi NFT that owns an escrow wallet.
pub type TokenId = u64;

/// Amount type, a token quantity scaled by `10^decimals`.
pub type Amount = u128;

/// Number of decimal places of a token.
pub type Decimals = u8;

/// A `0x`-prefixed, 20-byte hex account or contract address.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct Address(String);

impl Address {
    /// The GHST token contract.
    pub fn ghst() -> Self {
        Address(GHST_CONTRACT_ADDRESS.to_string())
    }

    /// An address that is zero except for its last byte.
    #[cfg(test)]
    pub fn from_low_byte(byte: u8) -> Self {
        Address(format!("0x{byte:040x}"))
    }
}

impl FromStr for Address {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) else {
            let message = format!("address {s:?} lacks 0x prefix");
            return Err(AllocationError::InvalidInput(message));
        };
        if hex.len() != 40 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            let message = format!("address {s:?} is not 40 hex digits");
            return Err(AllocationError::InvalidInput(message));
        }
        Ok(Address(format!("0x{hex}")))
    }
}

impl TryFrom<String> for Address {
    type Error = AllocationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which token balance a withdrawal draws from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenOption {
    Ghst,
    Custom(Address),
}

impl TokenOption {
    /// Contract address of the selected token.
    pub fn address(&self) -> Address {
        match self {
            TokenOption::Ghst => Address::ghst(),
            TokenOption::Custom(address) => address.clone(),
        }
    }
}

impl FromStr for TokenOption {
    type Err = AllocationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("ghst") {
            Ok(TokenOption::Ghst)
        } else {
            s.parse().map(TokenOption::Custom)
        }
    }
}

/// Balance held by one escrow account, already scaled to fixed point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EscrowBalance {
    pub token_id: TokenId,
    pub balance: Amount,
}

impl EscrowBalance {
    /// Creates a balance record for the given token ID.
    pub fn new(token_id: TokenId, balance: Amount) -> Self {
        EscrowBalance { token_id, balance }
    }
}

/// Amount assigned to one escrow account by the allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub token_id: TokenId,
    pub amount: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAVEGOTCHI_DIAMOND: &str = "0x86935F11C86623deC8a25696E1C19a8659CbF95d";

    fn is_address(s: &str) -> bool {
        s.parse::<Address>().is_ok()
    }

    #[test]
    fn test_address_parse() {
        let address: Address = AAVEGOTCHI_DIAMOND.parse().unwrap();
        assert_eq!(address.to_string(), AAVEGOTCHI_DIAMOND);
        assert!(is_address(" 0X86935F11C86623deC8a25696E1C19a8659CbF95d "));
        assert!(!is_address("86935F11C86623deC8a25696E1C19a8659CbF95d"));
        assert!(!is_address("0x1234"));
        assert!(!is_address("0xZZ935F11C86623deC8a25696E1C19a8659CbF95d"));
    }

    #[test]
    fn test_from_low_byte() {
        let address = Address::from_low_byte(0xaa);
        assert_eq!(address.to_string().len(), 42);
        assert!(is_address(&address.to_string()));
    }

    #[test]
    fn test_token_option() {
        assert_eq!("GHST".parse::<TokenOption>(), Ok(TokenOption::Ghst));
        assert_eq!(TokenOption::Ghst.address(), Address::ghst());
        let address = Address::from_low_byte(1);
        assert_eq!(
            address.to_string().parse::<TokenOption>(),
            Ok(TokenOption::Custom(address))
        );
        assert!("usdc".parse::<TokenOption>().is_err());
    }
}

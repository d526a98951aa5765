//! Escrow module for loading per-NFT balances and planning proportional withdrawals.
mod account;
mod allocator;
mod plan;
mod registry;
mod types;
mod units;

pub use account::*;
pub use allocator::*;
pub use plan::*;
pub use registry::*;
pub use types::*;
pub use units::*;

//! Proportional split of a withdrawal across escrow accounts in exact fixed-point arithmetic.
use std::collections::HashSet;

use primitive_types::U256;
use thiserror::Error;

use crate::escrow::{Allocation, Amount, Decimals, EscrowBalance, MAX_DECIMALS, format_units};

/// Errors that can occur while allocating a withdrawal.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AllocationError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance {
        requested: Amount,
        available: Amount,
    },
}

/// Sums the balances, rejecting an aggregate that does not fit in an [`Amount`].
pub fn total_balance(accounts: &[EscrowBalance]) -> Result<Amount, AllocationError> {
    let mut total: Amount = 0;
    for account in accounts {
        total = total
            .checked_add(account.balance)
            .ok_or_else(|| AllocationError::InvalidInput("aggregate balance overflows".into()))?;
    }
    Ok(total)
}

fn validate(accounts: &[EscrowBalance], decimals: Decimals) -> Result<(), AllocationError> {
    if accounts.is_empty() {
        return Err(AllocationError::InvalidInput("no account to allocate to".into()));
    }
    if decimals > MAX_DECIMALS {
        return Err(AllocationError::InvalidInput(format!(
            "precision of {decimals} decimals exceeds {MAX_DECIMALS}"
        )));
    }
    let mut seen = HashSet::with_capacity(accounts.len());
    if let Some(duplicate) = accounts.iter().find(|a| !seen.insert(a.token_id)) {
        let message = format!("account {} listed twice", duplicate.token_id);
        return Err(AllocationError::InvalidInput(message));
    }
    Ok(())
}

/// Splits `requested_total` across `accounts` in proportion to their balances.
///
/// Each account first receives `floor(balance * requested_total / total_balance)`.
/// The units lost to truncation are then handed out one at a time, in input
/// order, to the accounts whose share was truncated. The result has one entry
/// per account in input order and sums exactly to `requested_total`; no entry
/// exceeds its account's balance or strays a full unit from the exact share.
///
/// Fails with [`AllocationError::InvalidInput`] on an empty or duplicated
/// account list or an unsupported precision, and with
/// [`AllocationError::InsufficientBalance`] when the accounts hold less than
/// `requested_total`.
pub fn allocate(
    accounts: &[EscrowBalance],
    requested_total: Amount,
    decimals: Decimals,
) -> Result<Vec<Allocation>, AllocationError> {
    validate(accounts, decimals)?;
    let available = total_balance(accounts)?;
    if requested_total > available {
        return Err(AllocationError::InsufficientBalance {
            requested: requested_total,
            available,
        });
    }

    if available == 0 {
        return Ok(accounts
            .iter()
            .map(|account| Allocation {
                token_id: account.token_id,
                amount: 0,
            })
            .collect());
    }

    let requested = U256::from(requested_total);
    let total = U256::from(available);
    let mut remaining = requested_total;
    let mut allocations = Vec::with_capacity(accounts.len());
    let mut truncated = Vec::with_capacity(accounts.len());
    for account in accounts {
        // balance * requested fits in 256 bits for any pair of u128 values.
        let (share, lost) = (U256::from(account.balance) * requested).div_mod(total);
        // share <= requested_total, so it fits back into an Amount.
        let share = share.as_u128().min(remaining);
        remaining -= share;
        allocations.push(Allocation {
            token_id: account.token_id,
            amount: share,
        });
        truncated.push(!lost.is_zero());
    }

    assert!(
        remaining < accounts.len() as Amount,
        "rounding leftover {remaining} not below account count {}",
        accounts.len()
    );

    for (allocation, _) in allocations
        .iter_mut()
        .zip(&truncated)
        .filter(|(_, was_truncated)| **was_truncated)
    {
        if remaining == 0 {
            break;
        }
        allocation.amount += 1;
        remaining -= 1;
    }
    debug_assert_eq!(remaining, 0, "rounding leftover left undistributed");

    tracing::debug!(
        accounts = accounts.len(),
        requested = %format_units(requested_total, decimals),
        available = %format_units(available, decimals),
        "allocated withdrawal"
    );
    Ok(allocations)
}

#[cfg(test)]
mod tests {
    use primitive_types::U256;
    use proptest::prelude::*;

    use crate::escrow::{Allocation, AllocationError, Amount, EscrowBalance, allocate};

    const MAX_BALANCE: Amount = 1_000_000_000_000_000_000_000;

    fn balances(values: &[Amount]) -> Vec<EscrowBalance> {
        values
            .iter()
            .enumerate()
            .map(|(i, balance)| EscrowBalance::new(i as u64 + 1, *balance))
            .collect()
    }

    fn amounts(allocations: &[Allocation]) -> Vec<Amount> {
        allocations.iter().map(|a| a.amount).collect()
    }

    #[test]
    fn test_exact_division() {
        let result = allocate(&balances(&[300, 100, 100]), 250, 0).unwrap();
        assert_eq!(amounts(&result), vec![150, 50, 50]);
        assert_eq!(
            result.iter().map(|a| a.token_id).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn test_remainder_goes_to_first_accounts() {
        let result = allocate(&balances(&[1, 1, 1]), 2, 0).unwrap();
        assert_eq!(amounts(&result), vec![1, 1, 0]);
    }

    #[test]
    fn test_remainder_skips_exact_shares() {
        // Ideal shares are 1, 0.5 and 0.5: the first account is already exact.
        let result = allocate(&balances(&[2, 1, 1]), 2, 0).unwrap();
        assert_eq!(amounts(&result), vec![1, 1, 0]);
    }

    #[test]
    fn test_remainder_skips_empty_accounts() {
        let result = allocate(&balances(&[0, 1, 1]), 1, 0).unwrap();
        assert_eq!(amounts(&result), vec![0, 1, 0]);
    }

    #[test]
    fn test_zero_request() {
        let result = allocate(&balances(&[7, 0, 13]), 0, 18).unwrap();
        assert_eq!(amounts(&result), vec![0, 0, 0]);
    }

    #[test]
    fn test_all_empty_accounts_zero_request() {
        let result = allocate(&balances(&[0, 0]), 0, 18).unwrap();
        assert_eq!(amounts(&result), vec![0, 0]);
    }

    #[test]
    fn test_full_withdrawal() {
        let values: [Amount; 3] = [1_234_567_890_123_456_789, 1, 42_000_000_000_000_000_000];
        let total: Amount = values.iter().sum();
        let result = allocate(&balances(&values), total, 18).unwrap();
        assert_eq!(amounts(&result), values.to_vec());
    }

    #[test]
    fn test_large_balances_do_not_overflow() {
        let values = [u128::MAX / 2, u128::MAX / 4];
        let total = values[0] + values[1];
        let result = allocate(&balances(&values), total - 1, 18).unwrap();
        assert_eq!(result.iter().map(|a| a.amount).sum::<Amount>(), total - 1);
    }

    #[test]
    fn test_empty_accounts() {
        assert_eq!(
            allocate(&[], 0, 18),
            Err(AllocationError::InvalidInput("no account to allocate to".into()))
        );
    }

    #[test]
    fn test_duplicate_account() {
        let accounts = [EscrowBalance::new(7, 10), EscrowBalance::new(7, 20)];
        assert!(matches!(
            allocate(&accounts, 5, 0),
            Err(AllocationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_precision_too_large() {
        assert!(matches!(
            allocate(&balances(&[10]), 5, 39),
            Err(AllocationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_balance_overflow() {
        assert!(matches!(
            allocate(&balances(&[u128::MAX, 1]), 5, 0),
            Err(AllocationError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_insufficient_balance() {
        assert_eq!(
            allocate(&balances(&[100, 50]), 151, 0),
            Err(AllocationError::InsufficientBalance {
                requested: 151,
                available: 150
            })
        );
    }

    #[test]
    fn test_empty_balances_nonzero_request() {
        assert!(matches!(
            allocate(&balances(&[0, 0, 0]), 1, 0),
            Err(AllocationError::InsufficientBalance { .. })
        ));
    }

    fn arb_request() -> impl Strategy<Value = (Vec<Amount>, Amount)> {
        let strategy = proptest::collection::vec(0..MAX_BALANCE, 1..20);
        strategy.prop_flat_map(|values| {
            let total: Amount = values.iter().sum();
            (Just(values), 0..=total)
        })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        #[test]
        fn prop_sums_to_request((values, requested) in arb_request()) {
            let result = allocate(&balances(&values), requested, 18).unwrap();
            prop_assert_eq!(amounts(&result).iter().sum::<Amount>(), requested);
        }

        #[test]
        fn prop_within_balance_and_one_unit((values, requested) in arb_request()) {
            let total: Amount = values.iter().sum();
            let result = allocate(&balances(&values), requested, 18).unwrap();
            prop_assert_eq!(result.len(), values.len());
            for (allocation, balance) in result.iter().zip(&values) {
                prop_assert!(allocation.amount <= *balance);
                if total > 0 {
                    // |amount * total - balance * requested| < total, so under one unit.
                    let scaled = U256::from(allocation.amount) * U256::from(total);
                    let ideal = U256::from(*balance) * U256::from(requested);
                    let diff = if scaled > ideal { scaled - ideal } else { ideal - scaled };
                    prop_assert!(diff < U256::from(total));
                }
            }
        }

        #[test]
        fn prop_deterministic((values, requested) in arb_request()) {
            let accounts = balances(&values);
            prop_assert_eq!(allocate(&accounts, requested, 6), allocate(&accounts, requested, 6));
        }

        #[test]
        fn prop_rejects_over_request(
            values in proptest::collection::vec(0..MAX_BALANCE, 1..20),
            extra in 1..MAX_BALANCE
        ) {
            let total: Amount = values.iter().sum();
            let is_insufficient = matches!(
                allocate(&balances(&values), total + extra, 0),
                Err(AllocationError::InsufficientBalance { .. })
            );
            prop_assert!(is_insufficient);
        }
    }
}

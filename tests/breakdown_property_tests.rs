//! Property-based tests for breakdown sum validation
//!
//! This module uses proptest to verify that the breakdown validator accepts
//! exactly the entry sets whose denomination counts reproduce the declared
//! sums, across randomly generated denominations and counts. The validation
//! logic is critical - bugs here let financial movements commit with counts
//! that do not add up.
//!
//! These tests deliberately stay off the database: validation is pure, and
//! the atomic-commit behavior around it is covered by the integration
//! scenarios.

use proptest::prelude::*;
use rust_decimal::Decimal;

use float_ledger::{
    breakdown::{BreakdownEntry, verify_breakdown_sums},
    money::Amount,
    org::{Currency, CurrencyKind, Denomination},
    stack::{Direction, StackKey},
};

/// Fixed USD denomination set the generated entries draw from
fn usd() -> Currency {
    Currency {
        ticker: "USD".to_string(),
        org_id: "org".to_string(),
        name: "US Dollar".to_string(),
        kind: CurrencyKind::Fiat,
        denominations: [1, 2, 5, 10, 20, 50, 100]
            .into_iter()
            .map(|v| Denomination {
                id: format!("usd-{v}"),
                value: Amount::new(Decimal::new(v, 0)),
                accepted: true,
            })
            .collect(),
    }
}

fn entry(denomination_value: i64, count: i64, direction: Direction) -> BreakdownEntry {
    BreakdownEntry {
        stack: StackKey {
            session_id: "sess".to_string(),
            repository_id: "till".to_string(),
            ticker: "USD".to_string(),
            denomination_id: format!("usd-{denomination_value}"),
        },
        denomination_id: format!("usd-{denomination_value}"),
        count: Amount::new(Decimal::new(count, 0)),
        direction,
    }
}

/// Strategy: a list of (denomination value, count) pairs
fn counts_strategy() -> impl Strategy<Value = Vec<(i64, i64)>> {
    prop::collection::vec(
        (
            prop::sample::select(vec![1i64, 2, 5, 10, 20, 50, 100]),
            0i64..=1_000,
        ),
        0..8,
    )
}

fn sum_of(counts: &[(i64, i64)]) -> Amount {
    let total: i64 = counts.iter().map(|(value, count)| value * count).sum();
    Amount::new(Decimal::new(total, 0))
}

proptest! {
    /// Property: entries whose counts reproduce the declared sum always
    /// validate
    #[test]
    fn prop_matching_sums_validate(counts in counts_strategy()) {
        let entries: Vec<BreakdownEntry> = counts
            .iter()
            .map(|&(value, count)| entry(value, count, Direction::Outbound))
            .collect();

        prop_assert!(
            verify_breakdown_sums(&entries, &usd(), sum_of(&counts), Amount::ZERO).is_ok()
        );
    }

    /// Property: inflating any single count breaks validation
    #[test]
    fn prop_inflated_count_fails(
        counts in counts_strategy(),
        victim in any::<prop::sample::Index>(),
        inflation in 1i64..=100
    ) {
        prop_assume!(!counts.is_empty());
        let declared = sum_of(&counts);

        let victim = victim.index(counts.len());
        let mut tampered = counts;
        tampered[victim].1 += inflation;

        let entries: Vec<BreakdownEntry> = tampered
            .iter()
            .map(|&(value, count)| entry(value, count, Direction::Outbound))
            .collect();

        prop_assert!(
            verify_breakdown_sums(&entries, &usd(), declared, Amount::ZERO).is_err()
        );
    }

    /// Property: directions validate independently; each leg must match its
    /// own declared sum
    #[test]
    fn prop_directions_validate_independently(
        outbound in counts_strategy(),
        inbound in counts_strategy()
    ) {
        let mut entries: Vec<BreakdownEntry> = outbound
            .iter()
            .map(|&(value, count)| entry(value, count, Direction::Outbound))
            .collect();
        entries.extend(
            inbound
                .iter()
                .map(|&(value, count)| entry(value, count, Direction::Inbound)),
        );

        prop_assert!(
            verify_breakdown_sums(&entries, &usd(), sum_of(&outbound), sum_of(&inbound)).is_ok()
        );

        // swapping the declared legs only passes when the two legs happen to
        // sum the same
        let swapped_ok =
            verify_breakdown_sums(&entries, &usd(), sum_of(&inbound), sum_of(&outbound)).is_ok();
        prop_assert_eq!(swapped_ok, sum_of(&outbound) == sum_of(&inbound));
    }

    /// Property: an entry naming a denomination the currency does not carry
    /// never validates
    #[test]
    fn prop_unknown_denomination_fails(count in 0i64..=1_000) {
        let mut bogus = entry(100, count, Direction::Outbound);
        bogus.denomination_id = "usd-500".to_string();
        let declared = Amount::new(Decimal::new(count * 100, 0));

        prop_assert!(
            verify_breakdown_sums(&[bogus], &usd(), declared, Amount::ZERO).is_err()
        );
    }
}

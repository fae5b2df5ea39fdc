//! Read-only aggregation over float stacks: the five canonical sums,
//! confirmation completeness, and the off-balance tolerance check that gates
//! session close in the UI.

use crate::config::FloatConfig;
use crate::money::Amount;
use crate::org::CurrencyKind;
use crate::session::RepositoryState;
use crate::stack::FloatStack;

/// Which count feeds a sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatSumKind {
    Current,
    LastSession,
    Open,
    Midday,
    Close,
}

/// Float-operation context a repository is in, derived from its sub-state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatContext {
    Open,
    Close,
    Current,
    Unavailable,
}

pub fn float_context(state: RepositoryState) -> FloatContext {
    match state {
        RepositoryState::OpenStart => FloatContext::Open,
        RepositoryState::CloseStart => FloatContext::Close,
        RepositoryState::OpenConfirmed => FloatContext::Current,
        RepositoryState::Dormant => FloatContext::Unavailable,
    }
}

/// Sum of `count x denominated_value` over the stacks. A term the decimal
/// type cannot represent (overflow, the fixed-point analogue of a corrupted
/// field) is dropped from the total and logged rather than poisoning the
/// whole panel.
pub fn count_float_sum(kind: FloatSumKind, stacks: &[FloatStack]) -> Amount {
    let mut total = Amount::ZERO;

    for stack in stacks {
        let count = match kind {
            FloatSumKind::Current => stack.current_count(),
            FloatSumKind::LastSession => stack.last_session_count,
            FloatSumKind::Open => stack.open_count,
            FloatSumKind::Midday => stack.midday_count,
            FloatSumKind::Close => stack.close_count,
        };

        match count
            .checked_mul(stack.denominated_value)
            .and_then(|term| total.checked_add(term))
        {
            Some(next) => total = next,
            None => {
                tracing::warn!(
                    stack = %stack.key,
                    sum = ?kind,
                    count = %count,
                    "dropping unrepresentable term from float sum"
                );
            }
        }
    }

    total
}

/// True iff every stack carries the confirmation timestamp the context
/// requires. Vacuously true for an empty set; callers decide separately
/// whether counting was required at all.
pub fn are_float_stacks_confirmed(context: FloatContext, stacks: &[FloatStack]) -> bool {
    match context {
        FloatContext::Open | FloatContext::Current => {
            stacks.iter().all(|s| s.open_confirmed_at.is_some())
        }
        FloatContext::Close => stacks.iter().all(|s| s.close_confirmed_at.is_some()),
        FloatContext::Unavailable => false,
    }
}

/// Off-balance tolerance check with the default thresholds.
pub fn float_amount_is_within_valid_range(expected: Amount, actual: Amount) -> bool {
    FloatConfig::default().amount_within_tolerance(expected, actual)
}

/// The canonical per-currency reconciliation summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyPanel {
    pub previous: Amount,
    pub open: Amount,
    pub midday: Amount,
    pub close: Amount,
    pub current: Amount,
}

pub fn currency_panel(stacks: &[FloatStack]) -> CurrencyPanel {
    CurrencyPanel {
        previous: count_float_sum(FloatSumKind::LastSession, stacks),
        open: count_float_sum(FloatSumKind::Open, stacks),
        midday: count_float_sum(FloatSumKind::Midday, stacks),
        close: count_float_sum(FloatSumKind::Close, stacks),
        current: count_float_sum(FloatSumKind::Current, stacks),
    }
}

/// Display formatting: 2 decimal places for fiat/metal, 8 for crypto.
pub fn format_amount(amount: Amount, kind: CurrencyKind) -> String {
    amount.to_display(kind.display_decimals())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::StackKey;

    fn stack(open: &str, value: &str) -> FloatStack {
        FloatStack::provisioned(
            StackKey {
                session_id: "sess".into(),
                repository_id: "till".into(),
                ticker: "USD".into(),
                denomination_id: format!("usd-{value}"),
            },
            Amount::parse(open).unwrap(),
            Amount::parse(value).unwrap(),
            None,
        )
    }

    #[test]
    fn open_sum_weights_by_denomination() {
        let stacks = vec![stack("3", "100"), stack("5", "20")];

        assert_eq!(
            count_float_sum(FloatSumKind::Open, &stacks),
            Amount::parse("400").unwrap()
        );
    }

    #[test]
    fn tolerance_boundary() {
        let expected = Amount::parse("100.00").unwrap();

        assert!(float_amount_is_within_valid_range(
            expected,
            Amount::parse("100.009").unwrap()
        ));
        assert!(!float_amount_is_within_valid_range(
            expected,
            Amount::parse("100.02").unwrap()
        ));
    }

    #[test]
    fn format_follows_currency_kind() {
        let amount = Amount::parse("12.3").unwrap();

        assert_eq!(format_amount(amount, CurrencyKind::Fiat), "12.30");
        assert_eq!(format_amount(amount, CurrencyKind::Metal), "12.30");
        assert_eq!(format_amount(amount, CurrencyKind::Crypto), "12.30000000");
    }
}

//! Tunables for session gating and reconciliation tolerance.

use crate::money::Amount;
use rust_decimal::Decimal;

/// How many most-recent sessions must be closed before a new one may open.
pub const DEFAULT_CLOSED_SESSION_LOOKBACK: usize = 5;

/// Absolute discrepancy treated as balanced, after significant-digit rounding.
pub const DEFAULT_OFF_BALANCE_THRESHOLD: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Significant digits the discrepancy is rounded to before the threshold check.
pub const DEFAULT_OFF_BALANCE_SIG_DIGITS: u32 = 4;

#[derive(Debug, Clone)]
pub struct FloatConfig {
    pub closed_session_lookback: usize,
    pub off_balance_threshold: Decimal,
    pub off_balance_sig_digits: u32,
}

impl Default for FloatConfig {
    fn default() -> Self {
        Self {
            closed_session_lookback: DEFAULT_CLOSED_SESSION_LOOKBACK,
            off_balance_threshold: DEFAULT_OFF_BALANCE_THRESHOLD,
            off_balance_sig_digits: DEFAULT_OFF_BALANCE_SIG_DIGITS,
        }
    }
}

impl FloatConfig {
    /// Round the discrepancy first, then compare. Rounding first keeps
    /// floating noise just above the threshold from flagging a balanced till.
    pub fn amount_within_tolerance(&self, expected: Amount, actual: Amount) -> bool {
        let diff = expected.abs_diff(actual);

        match diff.round_sf(self.off_balance_sig_digits) {
            Some(rounded) => rounded.inner() <= self.off_balance_threshold,
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threshold_constant_is_one_cent() {
        assert_eq!(DEFAULT_OFF_BALANCE_THRESHOLD.to_string(), "0.01");
    }
}

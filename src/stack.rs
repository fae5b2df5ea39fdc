//! The float stack: one denomination's physical-count ledger row within one
//! repository for one session.

use crate::money::Amount;
use crate::time::TimeStamp;
use chrono::Utc;
use std::fmt;

/// Movement direction relative to the repository holding the stack.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    #[n(0)]
    Inbound,
    #[n(1)]
    Outbound,
}

/// Composite row identity. Doubles as the store-level uniqueness constraint
/// on (session, repository, ticker, denomination).
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct StackKey {
    #[n(0)]
    pub session_id: String,
    #[n(1)]
    pub repository_id: String,
    #[n(2)]
    pub ticker: String,
    #[n(3)]
    pub denomination_id: String,
}

impl fmt::Display for StackKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.session_id, self.repository_id, self.ticker, self.denomination_id
        )
    }
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct FloatStack {
    #[n(0)]
    pub key: StackKey,
    #[n(1)]
    pub open_count: Amount,
    #[n(2)]
    pub close_count: Amount,
    #[n(3)]
    pub midday_count: Amount,
    #[n(4)]
    pub last_session_count: Amount,
    #[n(5)]
    pub spent_during_session: Amount,
    #[n(6)]
    pub transferred_during_session: Amount,
    // snapshot of the denomination's face value at provisioning time, so the
    // row stays stable if the denomination is later edited
    #[n(7)]
    pub denominated_value: Amount,
    #[n(8)]
    pub open_spot: Option<Amount>,
    #[n(9)]
    pub close_spot: Option<Amount>,
    #[n(10)]
    pub average_spot: Option<Amount>,
    #[n(11)]
    pub open_confirmed_at: Option<TimeStamp<Utc>>,
    #[n(12)]
    pub close_confirmed_at: Option<TimeStamp<Utc>>,
    #[n(13)]
    pub prev_stack: Option<StackKey>,
    #[n(14)]
    pub created_at: TimeStamp<Utc>,
    #[n(15)]
    pub updated_at: TimeStamp<Utc>,
}

impl FloatStack {
    /// Row as provisioning materializes it: the previous session's close
    /// count carries forward into both `last_session_count` and `open_count`.
    pub fn provisioned(
        key: StackKey,
        last_session_count: Amount,
        denominated_value: Amount,
        prev_stack: Option<StackKey>,
    ) -> Self {
        let now = TimeStamp::new();
        Self {
            key,
            open_count: last_session_count,
            close_count: Amount::ZERO,
            midday_count: Amount::ZERO,
            last_session_count,
            spent_during_session: Amount::ZERO,
            transferred_during_session: Amount::ZERO,
            denominated_value,
            open_spot: None,
            close_spot: None,
            average_spot: None,
            open_confirmed_at: None,
            close_confirmed_at: None,
            prev_stack,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// What should physically be present right now.
    pub fn current_count(&self) -> Amount {
        self.open_count - self.spent_during_session - self.transferred_during_session
    }

    /// Breakdown-commit mutation: outbound movements debit the close count,
    /// inbound movements credit it.
    pub fn apply_directional_delta(&mut self, count: Amount, direction: Direction) {
        self.close_count = match direction {
            Direction::Outbound => self.close_count - count,
            Direction::Inbound => self.close_count + count,
        };
        self.updated_at = TimeStamp::new();
    }

    pub fn apply(&mut self, patch: UpdateFloatStack) {
        if let Some(v) = patch.open_count {
            self.open_count = v;
        }
        if let Some(v) = patch.close_count {
            self.close_count = v;
        }
        if let Some(v) = patch.midday_count {
            self.midday_count = v;
        }
        if let Some(v) = patch.open_spot {
            self.open_spot = Some(v);
        }
        if let Some(v) = patch.close_spot {
            self.close_spot = Some(v);
        }
        if let Some(v) = patch.average_spot {
            self.average_spot = Some(v);
        }
        if let Some(v) = patch.open_confirmed_at {
            self.open_confirmed_at = Some(v);
        }
        if let Some(v) = patch.close_confirmed_at {
            self.close_confirmed_at = Some(v);
        }
        self.updated_at = TimeStamp::new();
    }
}

/// Typed partial update for a float stack. Only provided fields are patched;
/// no cross-field validation happens at this level.
#[derive(Debug, Clone, Default)]
pub struct UpdateFloatStack {
    pub open_count: Option<Amount>,
    pub close_count: Option<Amount>,
    pub midday_count: Option<Amount>,
    pub open_spot: Option<Amount>,
    pub close_spot: Option<Amount>,
    pub average_spot: Option<Amount>,
    pub open_confirmed_at: Option<TimeStamp<Utc>>,
    pub close_confirmed_at: Option<TimeStamp<Utc>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key() -> StackKey {
        StackKey {
            session_id: "sess".into(),
            repository_id: "till".into(),
            ticker: "USD".into(),
            denomination_id: "usd-100".into(),
        }
    }

    #[test]
    fn current_count_subtracts_spend_and_transfers() {
        let mut stack = FloatStack::provisioned(
            key(),
            Amount::parse("100").unwrap(),
            Amount::parse("100").unwrap(),
            None,
        );
        stack.spent_during_session = Amount::parse("30.5").unwrap();
        stack.transferred_during_session = Amount::parse("5").unwrap();

        assert_eq!(stack.current_count(), Amount::parse("64.5").unwrap());
    }

    #[test]
    fn directional_delta_moves_close_count() {
        let mut stack = FloatStack::provisioned(key(), Amount::ZERO, Amount::ZERO, None);
        stack.close_count = Amount::parse("10").unwrap();

        stack.apply_directional_delta(Amount::parse("4").unwrap(), Direction::Outbound);
        assert_eq!(stack.close_count, Amount::parse("6").unwrap());

        stack.apply_directional_delta(Amount::parse("1").unwrap(), Direction::Inbound);
        assert_eq!(stack.close_count, Amount::parse("7").unwrap());
    }

    #[test]
    fn patch_leaves_absent_fields_alone() {
        let mut stack = FloatStack::provisioned(
            key(),
            Amount::parse("42").unwrap(),
            Amount::parse("100").unwrap(),
            None,
        );

        stack.apply(UpdateFloatStack {
            close_count: Some(Amount::parse("41").unwrap()),
            ..Default::default()
        });

        assert_eq!(stack.open_count, Amount::parse("42").unwrap());
        assert_eq!(stack.close_count, Amount::parse("41").unwrap());
        assert_eq!(stack.midday_count, Amount::ZERO);
    }

    #[test]
    fn stack_encoding() {
        let original = FloatStack::provisioned(
            key(),
            Amount::parse("42").unwrap(),
            Amount::parse("100").unwrap(),
            None,
        );

        let encoding = minicbor::to_vec(&original).unwrap();
        let decode: FloatStack = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }
}

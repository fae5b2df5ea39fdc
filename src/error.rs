use crate::money::Amount;
use crate::session::SessionStatus;
use crate::stack::Direction;

#[derive(thiserror::Error, Debug)]
pub enum FloatError {
    #[error("caller identity is missing or unknown")]
    Unauthorized,
    #[error("user {user_id} is not in the authorized set of session {session_id}")]
    NotAuthorizedForSession { session_id: String, user_id: String },
    #[error("previous sessions are still open: {open_session_ids:?}")]
    SessionsNotClosed { open_session_ids: Vec<String> },
    #[error("float is not readable while the session is {status:?}, allowed: {allowed:?}")]
    FloatAccessDenied {
        status: SessionStatus,
        allowed: &'static [SessionStatus],
    },
    #[error("{direction:?} breakdown sums to {counted}, declared {declared}")]
    BreakdownSumMismatch {
        direction: Direction,
        declared: Amount,
        counted: Amount,
    },
    #[error("unknown session {0}")]
    UnknownSession(String),
    #[error("unknown repository {0}")]
    UnknownRepository(String),
    #[error("unknown currency {0}")]
    UnknownCurrency(String),
    #[error("currency {ticker} has no denomination {denomination_id}")]
    UnknownDenomination {
        ticker: String,
        denomination_id: String,
    },
    #[error("no float stack at {0}")]
    UnknownFloatStack(String),
    // raced inserts and half-written batches surface generically; details go
    // to the server log only
    #[error("commit failed, retry")]
    CommitConflict,
    #[error("amount overflow while aggregating float")]
    AmountOverflow,
}

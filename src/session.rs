//! Trading session lifecycle records.
//!
//! A session walks DORMANT -> FLOAT_OPEN_START -> FLOAT_OPEN_COMPLETE ->
//! FLOAT_CLOSE_START -> FLOAT_CLOSE_COMPLETE. Per-repository sub-state is
//! never stored; it is re-derived from the repository's access log on every
//! read so the log stays the single source of truth.

use crate::time::TimeStamp;
use chrono::Utc;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    #[n(0)]
    Dormant,
    #[n(1)]
    FloatOpenStart,
    #[n(2)]
    FloatOpenComplete,
    #[n(3)]
    FloatCloseStart,
    #[n(4)]
    FloatCloseComplete,
}

/// Statuses in which session float may be fetched.
pub const FLOAT_READABLE: &[SessionStatus] = &[
    SessionStatus::Dormant,
    SessionStatus::FloatOpenStart,
    SessionStatus::FloatOpenComplete,
    SessionStatus::FloatCloseStart,
];

impl SessionStatus {
    pub fn is_closed(self) -> bool {
        self == SessionStatus::FloatCloseComplete
    }

    pub fn float_readable(self) -> bool {
        FLOAT_READABLE.contains(&self)
    }
}

/// Requested lifecycle transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FloatAction {
    StartOpen,
    ConfirmOpen,
    StartClose,
    CancelClose,
    ConfirmClose,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Session {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub org_id: String,
    #[n(2)]
    pub status: SessionStatus,
    #[n(3)]
    pub created_at: TimeStamp<Utc>,
    #[n(4)]
    pub open_start_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub open_start_user: Option<String>,
    #[n(6)]
    pub open_confirm_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    pub open_confirm_user: Option<String>,
    #[n(8)]
    pub close_start_at: Option<TimeStamp<Utc>>,
    #[n(9)]
    pub close_start_user: Option<String>,
    #[n(10)]
    pub close_confirm_at: Option<TimeStamp<Utc>>,
    #[n(11)]
    pub close_confirm_user: Option<String>,
    #[n(12)]
    pub authorized_user_ids: Vec<String>,
    #[n(13)]
    pub active_user_id: String,
}

impl Session {
    /// Fresh DORMANT session with the creator as the sole authorized user.
    pub fn new(id: String, org_id: String, creator_user_id: String) -> Self {
        Self {
            id,
            org_id,
            status: SessionStatus::Dormant,
            created_at: TimeStamp::new(),
            open_start_at: None,
            open_start_user: None,
            open_confirm_at: None,
            open_confirm_user: None,
            close_start_at: None,
            close_start_user: None,
            close_confirm_at: None,
            close_confirm_user: None,
            authorized_user_ids: vec![creator_user_id.clone()],
            active_user_id: creator_user_id,
        }
    }

    pub fn is_authorized(&self, user_id: &str) -> bool {
        self.authorized_user_ids.iter().any(|u| u == user_id)
    }

    pub fn authorize(&mut self, user_id: &str) {
        if !self.is_authorized(user_id) {
            self.authorized_user_ids.push(user_id.to_string());
        }
    }
}

/// Derived per-repository sub-state within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepositoryState {
    Dormant,
    OpenStart,
    OpenConfirmed,
    CloseStart,
}

/// Per (session, repository) record of who touched a till and when each
/// open/close step happened. One row per pair, created idempotently.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct RepositoryAccessLog {
    #[n(0)]
    pub session_id: String,
    #[n(1)]
    pub repository_id: String,
    #[n(2)]
    pub open_start_at: Option<TimeStamp<Utc>>,
    #[n(3)]
    pub open_confirm_at: Option<TimeStamp<Utc>>,
    #[n(4)]
    pub close_start_at: Option<TimeStamp<Utc>>,
    #[n(5)]
    pub close_confirm_at: Option<TimeStamp<Utc>>,
    #[n(6)]
    pub user_ids: Vec<String>,
}

impl RepositoryAccessLog {
    pub fn new(session_id: String, repository_id: String, user_id: String) -> Self {
        Self {
            session_id,
            repository_id,
            open_start_at: None,
            open_confirm_at: None,
            close_start_at: None,
            close_confirm_at: None,
            user_ids: vec![user_id],
        }
    }

    pub fn touch(&mut self, user_id: &str) {
        if !self.user_ids.iter().any(|u| u == user_id) {
            self.user_ids.push(user_id.to_string());
        }
    }

    /// Latest-marker-wins derivation; the order of the checks is the
    /// lifecycle in reverse.
    pub fn state(&self) -> RepositoryState {
        if self.close_confirm_at.is_some() {
            RepositoryState::Dormant
        } else if self.close_start_at.is_some() {
            RepositoryState::CloseStart
        } else if self.open_confirm_at.is_some() {
            RepositoryState::OpenConfirmed
        } else if self.open_start_at.is_some() {
            RepositoryState::OpenStart
        } else {
            RepositoryState::Dormant
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_log_state_walks_lifecycle() {
        let mut log = RepositoryAccessLog::new("sess".into(), "repo".into(), "user".into());
        assert_eq!(log.state(), RepositoryState::Dormant);

        log.open_start_at = Some(TimeStamp::new());
        assert_eq!(log.state(), RepositoryState::OpenStart);

        log.open_confirm_at = Some(TimeStamp::new());
        assert_eq!(log.state(), RepositoryState::OpenConfirmed);

        log.close_start_at = Some(TimeStamp::new());
        assert_eq!(log.state(), RepositoryState::CloseStart);

        log.close_confirm_at = Some(TimeStamp::new());
        assert_eq!(log.state(), RepositoryState::Dormant);
    }

    #[test]
    fn cancel_close_reverts_state() {
        let mut log = RepositoryAccessLog::new("sess".into(), "repo".into(), "user".into());
        log.open_start_at = Some(TimeStamp::new());
        log.open_confirm_at = Some(TimeStamp::new());
        log.close_start_at = Some(TimeStamp::new());
        assert_eq!(log.state(), RepositoryState::CloseStart);

        log.close_start_at = None;
        assert_eq!(log.state(), RepositoryState::OpenConfirmed);
    }

    #[test]
    fn touch_is_idempotent() {
        let mut log = RepositoryAccessLog::new("sess".into(), "repo".into(), "teller_a".into());
        log.touch("teller_b");
        log.touch("teller_b");

        assert_eq!(log.user_ids, vec!["teller_a", "teller_b"]);
    }
}

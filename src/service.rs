//! Service layer API for the session float lifecycle.
//!
//! Every operation takes an explicit [`OperationContext`] naming the
//! authenticated caller and their active organization; nothing here reaches
//! for ambient identity. Authentication itself happens upstream.

use crate::activity::{Activity, ActivityKind};
use crate::breakdown::{self, BreakdownEntry, CurrencySwap, Transfer};
use crate::config::FloatConfig;
use crate::error::FloatError;
use crate::money::Amount;
use crate::org::{Currency, CurrencyKind, Repository};
use crate::provision::{self, ProvisionReport};
use crate::session::{
    FLOAT_READABLE, FloatAction, RepositoryAccessLog, RepositoryState, Session, SessionStatus,
};
use crate::stack::{FloatStack, StackKey, UpdateFloatStack};
use crate::store::LedgerStore;
use crate::time::TimeStamp;
use crate::utils;
use std::sync::Arc;

/// Who is acting, and for which organization.
#[derive(Debug, Clone)]
pub struct OperationContext {
    pub caller_user_id: String,
    pub organization_id: String,
}

impl OperationContext {
    pub fn new(caller_user_id: impl Into<String>, organization_id: impl Into<String>) -> Self {
        Self {
            caller_user_id: caller_user_id.into(),
            organization_id: organization_id.into(),
        }
    }

    fn ensure_identified(&self) -> Result<(), FloatError> {
        if self.caller_user_id.is_empty() || self.organization_id.is_empty() {
            return Err(FloatError::Unauthorized);
        }
        Ok(())
    }
}

/// New swap request, validated at the boundary before any ledger work.
#[derive(Debug, Clone)]
pub struct NewSwap {
    pub outbound_repository: String,
    pub inbound_repository: String,
    pub ticker: String,
    pub outbound_sum: Amount,
    pub inbound_sum: Amount,
}

/// New transfer request; one declared sum moves between two repositories.
#[derive(Debug, Clone)]
pub struct NewTransfer {
    pub from_repository: String,
    pub to_repository: String,
    pub ticker: String,
    pub sum: Amount,
}

/// Per-ticker slice of a repository's float.
#[derive(Debug, Clone)]
pub struct TickerFloat {
    pub ticker: String,
    pub kind: CurrencyKind,
    pub stacks: Vec<FloatStack>,
}

/// One repository's view inside a session, with its derived sub-state.
#[derive(Debug, Clone)]
pub struct RepositoryFloat {
    pub repository: Repository,
    pub state: RepositoryState,
    pub access_log: Option<RepositoryAccessLog>,
    pub float: Vec<TickerFloat>,
}

/// Everything a reconciliation display needs for one session.
#[derive(Debug, Clone)]
pub struct SessionFloat {
    pub session: Session,
    pub repositories: Vec<RepositoryFloat>,
}

pub struct FloatService {
    store: LedgerStore,
    config: FloatConfig,
}

impl FloatService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self::with_config(instance, FloatConfig::default())
    }

    pub fn with_config(instance: Arc<sled::Db>, config: FloatConfig) -> Self {
        Self {
            store: LedgerStore::new(instance),
            config,
        }
    }

    pub fn store(&self) -> &LedgerStore {
        &self.store
    }

    /// Seed surface for the admin CRUD collaborators: repositories and
    /// currencies are read-only inputs to everything else here.
    pub fn register_repository(&self, repository: &Repository) -> anyhow::Result<()> {
        self.store.insert_repository(repository)
    }

    pub fn register_currency(&self, currency: &Currency) -> anyhow::Result<()> {
        self.store.insert_currency(currency)
    }

    /// Open a new trading context for the organization. Fails while any of
    /// the most recent sessions is still open.
    pub fn create_session(&self, ctx: &OperationContext) -> anyhow::Result<Session> {
        ctx.ensure_identified()?;

        let recent = self
            .store
            .recent_sessions(&ctx.organization_id, self.config.closed_session_lookback)?;
        let open_session_ids: Vec<String> = recent
            .iter()
            .filter(|s| !s.status.is_closed())
            .map(|s| s.id.clone())
            .collect();
        if !open_session_ids.is_empty() {
            return Err(FloatError::SessionsNotClosed { open_session_ids }.into());
        }

        let session = Session::new(
            utils::session_id()?,
            ctx.organization_id.clone(),
            ctx.caller_user_id.clone(),
        );
        self.store.insert_session(&session)?;

        provision::provision_session(&self.store, &session)?;

        self.append_activity(ctx, Some(&session.id), ActivityKind::SessionCreated)?;

        Ok(session)
    }

    /// Start-type transitions: `StartOpen`, `StartClose`, `CancelClose`.
    /// `CancelClose` on a session that is not closing is a no-op so a
    /// double-click cannot error.
    pub fn start_float(
        &self,
        ctx: &OperationContext,
        session_id: &str,
        action: FloatAction,
    ) -> anyhow::Result<SessionStatus> {
        ctx.ensure_identified()?;
        let mut session = self.store.session(session_id)?;
        let now = TimeStamp::new();

        match action {
            FloatAction::StartOpen => {
                session.open_start_at = Some(now);
                session.open_start_user = Some(ctx.caller_user_id.clone());
                session.status = SessionStatus::FloatOpenStart;
                self.store.save_session(&session)?;

                // fills any gap left by repositories added after creation
                provision::provision_session(&self.store, &session)?;

                self.append_activity(ctx, Some(session_id), ActivityKind::FloatOpenStarted)?;
            }
            FloatAction::StartClose => {
                session.close_start_at = Some(now.clone());
                session.close_start_user = Some(ctx.caller_user_id.clone());
                session.status = SessionStatus::FloatCloseStart;
                self.store.save_session(&session)?;

                for mut log in self.store.session_access_logs(session_id)? {
                    if log.close_start_at.is_none() {
                        log.close_start_at = Some(now.clone());
                        self.store.save_access_log(&log)?;
                    }
                }

                self.append_activity(ctx, Some(session_id), ActivityKind::FloatCloseStarted)?;
            }
            FloatAction::CancelClose => {
                if session.status != SessionStatus::FloatCloseStart {
                    return Ok(session.status);
                }

                session.close_start_at = None;
                session.close_start_user = None;
                session.status = SessionStatus::FloatOpenComplete;
                self.store.save_session(&session)?;

                for mut log in self.store.session_access_logs(session_id)? {
                    if log.close_start_at.is_some() {
                        log.close_start_at = None;
                        self.store.save_access_log(&log)?;
                    }
                }

                self.append_activity(ctx, Some(session_id), ActivityKind::FloatCloseCancelled)?;
            }
            FloatAction::ConfirmOpen | FloatAction::ConfirmClose => {
                return Err(anyhow::anyhow!(
                    "confirm actions go through confirm_float, got {:?}",
                    action
                ));
            }
        }

        Ok(session.status)
    }

    /// Confirm-type transitions: `ConfirmOpen`, `ConfirmClose`. Whether every
    /// required stack was counted is the caller's gate; check with
    /// [`crate::reconcile::are_float_stacks_confirmed`] before confirming.
    pub fn confirm_float(
        &self,
        ctx: &OperationContext,
        session_id: &str,
        action: FloatAction,
    ) -> anyhow::Result<SessionStatus> {
        ctx.ensure_identified()?;
        let mut session = self.store.session(session_id)?;
        let now = TimeStamp::new();

        match action {
            FloatAction::ConfirmOpen => {
                session.open_confirm_at = Some(now);
                session.open_confirm_user = Some(ctx.caller_user_id.clone());
                session.status = SessionStatus::FloatOpenComplete;
                self.store.save_session(&session)?;

                self.append_activity(ctx, Some(session_id), ActivityKind::FloatOpenConfirmed)?;
            }
            FloatAction::ConfirmClose => {
                session.close_confirm_at = Some(now);
                session.close_confirm_user = Some(ctx.caller_user_id.clone());
                session.status = SessionStatus::FloatCloseComplete;
                self.store.save_session(&session)?;

                self.append_activity(ctx, Some(session_id), ActivityKind::FloatCloseConfirmed)?;
            }
            _ => {
                return Err(anyhow::anyhow!(
                    "start actions go through start_float, got {:?}",
                    action
                ));
            }
        }

        Ok(session.status)
    }

    /// Add the caller to the session's authorized set.
    pub fn join_session(&self, ctx: &OperationContext, session_id: &str) -> anyhow::Result<Session> {
        ctx.ensure_identified()?;
        let mut session = self.store.session(session_id)?;

        if !session.is_authorized(&ctx.caller_user_id) {
            session.authorize(&ctx.caller_user_id);
            session.active_user_id = ctx.caller_user_id.clone();
            self.store.save_session(&session)?;

            self.append_activity(ctx, Some(session_id), ActivityKind::SessionJoined)?;
        }

        Ok(session)
    }

    /// Per-repository lifecycle touch: stamps the access log the repository
    /// sub-state derives from, creating the log idempotently on first touch.
    pub fn update_repository_access(
        &self,
        ctx: &OperationContext,
        session_id: &str,
        repository_id: &str,
        action: FloatAction,
    ) -> anyhow::Result<RepositoryState> {
        ctx.ensure_identified()?;
        // session must exist even though only the log is touched
        self.store.session(session_id)?;

        let fresh = RepositoryAccessLog::new(
            session_id.to_string(),
            repository_id.to_string(),
            ctx.caller_user_id.clone(),
        );
        self.store.try_insert_access_log(&fresh)?;

        let mut log = self
            .store
            .access_log_opt(session_id, repository_id)?
            .ok_or(FloatError::CommitConflict)?;
        log.touch(&ctx.caller_user_id);

        let now = TimeStamp::new();
        match action {
            FloatAction::StartOpen => log.open_start_at = Some(now),
            FloatAction::ConfirmOpen => log.open_confirm_at = Some(now),
            FloatAction::StartClose => log.close_start_at = Some(now),
            FloatAction::CancelClose => log.close_start_at = None,
            FloatAction::ConfirmClose => log.close_confirm_at = Some(now),
        }
        self.store.save_access_log(&log)?;

        Ok(log.state())
    }

    /// Full float view for a session. Readable only while the session is in
    /// a pre-close-complete status and only by an authorized user.
    pub fn get_session_float(
        &self,
        ctx: &OperationContext,
        session_id: &str,
    ) -> anyhow::Result<SessionFloat> {
        ctx.ensure_identified()?;
        let session = self.store.session(session_id)?;

        if !session.is_authorized(&ctx.caller_user_id) {
            return Err(FloatError::NotAuthorizedForSession {
                session_id: session_id.to_string(),
                user_id: ctx.caller_user_id.clone(),
            }
            .into());
        }
        if !session.status.float_readable() {
            return Err(FloatError::FloatAccessDenied {
                status: session.status,
                allowed: FLOAT_READABLE,
            }
            .into());
        }

        let mut repositories = Vec::new();
        for repository in self.store.repositories(&session.org_id)? {
            if !repository.active {
                continue;
            }

            let access_log = self.store.access_log_opt(session_id, &repository.id)?;
            let state = access_log
                .as_ref()
                .map(|l| l.state())
                .unwrap_or(RepositoryState::Dormant);

            let mut float = Vec::new();
            for ticker in &repository.tickers {
                let Some(currency) = self.store.currency_opt(&session.org_id, ticker)? else {
                    continue;
                };
                let stacks =
                    self.store
                        .repository_ticker_stacks(session_id, &repository.id, ticker)?;
                float.push(TickerFloat {
                    ticker: ticker.clone(),
                    kind: currency.kind,
                    stacks,
                });
            }

            repositories.push(RepositoryFloat {
                repository,
                state,
                access_log,
                float,
            });
        }

        Ok(SessionFloat {
            session,
            repositories,
        })
    }

    /// Low-level count patch; no cross-field validation on purpose.
    pub fn update_float_stack(
        &self,
        key: &StackKey,
        patch: UpdateFloatStack,
    ) -> anyhow::Result<FloatStack> {
        let mut stack = self.store.stack(key)?;
        stack.apply(patch);
        self.store.save_stack(&stack)?;

        Ok(stack)
    }

    /// Order debit: accumulates into `spent_during_session`, the feed behind
    /// `current_count`.
    pub fn record_order_spend(
        &self,
        ctx: &OperationContext,
        key: &StackKey,
        amount: Amount,
    ) -> anyhow::Result<FloatStack> {
        ctx.ensure_identified()?;
        let mut stack = self.store.stack(key)?;
        stack.spent_during_session = stack.spent_during_session + amount;
        stack.updated_at = TimeStamp::new();
        self.store.save_stack(&stack)?;

        self.append_activity(ctx, Some(&key.session_id), ActivityKind::OrderSpendRecorded)?;

        Ok(stack)
    }

    /// Validate and atomically commit a currency swap with its breakdowns.
    pub fn commit_swap(
        &self,
        ctx: &OperationContext,
        swap: NewSwap,
        entries: &[BreakdownEntry],
    ) -> anyhow::Result<CurrencySwap> {
        ctx.ensure_identified()?;
        self.store
            .repository(&ctx.organization_id, &swap.outbound_repository)?;
        self.store
            .repository(&ctx.organization_id, &swap.inbound_repository)?;

        let record = CurrencySwap {
            id: utils::swap_id()?,
            org_id: ctx.organization_id.clone(),
            outbound_repository: swap.outbound_repository,
            inbound_repository: swap.inbound_repository,
            ticker: swap.ticker,
            outbound_sum: swap.outbound_sum,
            inbound_sum: swap.inbound_sum,
            user_id: ctx.caller_user_id.clone(),
            created_at: TimeStamp::new(),
        };

        breakdown::commit_swap(&self.store, record, entries)
    }

    /// Validate and atomically commit a repository-to-repository transfer.
    pub fn commit_transfer(
        &self,
        ctx: &OperationContext,
        transfer: NewTransfer,
        entries: &[BreakdownEntry],
    ) -> anyhow::Result<Transfer> {
        ctx.ensure_identified()?;
        self.store
            .repository(&ctx.organization_id, &transfer.from_repository)?;
        self.store
            .repository(&ctx.organization_id, &transfer.to_repository)?;

        let record = Transfer {
            id: utils::transfer_id()?,
            org_id: ctx.organization_id.clone(),
            from_repository: transfer.from_repository,
            to_repository: transfer.to_repository,
            ticker: transfer.ticker,
            sum: transfer.sum,
            user_id: ctx.caller_user_id.clone(),
            created_at: TimeStamp::new(),
        };

        breakdown::commit_transfer(&self.store, record, entries)
    }

    /// Re-run provisioning for a session, e.g. after repository changes.
    pub fn provision(&self, session_id: &str) -> anyhow::Result<ProvisionReport> {
        let session = self.store.session(session_id)?;
        provision::provision_session(&self.store, &session)
    }

    fn append_activity(
        &self,
        ctx: &OperationContext,
        session_id: Option<&str>,
        kind: ActivityKind,
    ) -> anyhow::Result<()> {
        self.store.append_activity(&Activity::new(
            ctx.organization_id.clone(),
            session_id.map(|s| s.to_string()),
            ctx.caller_user_id.clone(),
            kind,
        ))
    }
}

//! Ledger store: every record type lives in the default sled tree under a
//! typed key prefix. Multi-record commits go through one `sled::Batch` so a
//! breakdown commit is all-or-nothing, and uniqueness-sensitive inserts go
//! through `compare_and_swap` so concurrent provisioners cannot double-create
//! a row.

use crate::activity::Activity;
use crate::breakdown::{Breakdown, CurrencySwap, Transfer};
use crate::error::FloatError;
use crate::org::{Currency, Repository};
use crate::session::{RepositoryAccessLog, Session};
use crate::stack::{FloatStack, StackKey};
use sled::{Batch, Db};
use std::sync::Arc;

pub struct LedgerStore {
    instance: Arc<Db>,
}

impl LedgerStore {
    pub fn new(instance: Arc<Db>) -> Self {
        Self { instance }
    }

    // KEY LAYOUT
    //
    // session/{id}
    // orgsess/{org}/{nanos_be}/{id}        -> session id
    // repo/{org}/{id}
    // currency/{org}/{ticker}
    // stack/{session}/{repo}/{ticker}/{denomination}
    // stackhist/{repo}/{ticker}/{denomination}/{nanos_be}/{session} -> stack key
    // alog/{session}/{repo}
    // swap/{id}
    // transfer/{id}
    // breakdown/{parent}/{seq_be}
    // activity/{nanos_be}/{payload_hash}

    fn session_key(id: &str) -> Vec<u8> {
        format!("session/{id}").into_bytes()
    }

    fn org_session_index_key(session: &Session) -> Vec<u8> {
        let mut key = format!("orgsess/{}/", session.org_id).into_bytes();
        key.extend_from_slice(&session.created_at.index_bytes());
        key.extend_from_slice(format!("/{}", session.id).as_bytes());
        key
    }

    fn repository_key(org_id: &str, id: &str) -> Vec<u8> {
        format!("repo/{org_id}/{id}").into_bytes()
    }

    fn currency_key(org_id: &str, ticker: &str) -> Vec<u8> {
        format!("currency/{org_id}/{ticker}").into_bytes()
    }

    pub(crate) fn stack_storage_key(key: &StackKey) -> Vec<u8> {
        format!("stack/{key}").into_bytes()
    }

    fn stack_history_key(stack: &FloatStack) -> Vec<u8> {
        let key = &stack.key;
        let mut out = format!(
            "stackhist/{}/{}/{}/",
            key.repository_id, key.ticker, key.denomination_id
        )
        .into_bytes();
        out.extend_from_slice(&stack.created_at.index_bytes());
        out.extend_from_slice(format!("/{}", key.session_id).as_bytes());
        out
    }

    fn access_log_key(session_id: &str, repository_id: &str) -> Vec<u8> {
        format!("alog/{session_id}/{repository_id}").into_bytes()
    }

    fn swap_key(id: &str) -> Vec<u8> {
        format!("swap/{id}").into_bytes()
    }

    fn transfer_key(id: &str) -> Vec<u8> {
        format!("transfer/{id}").into_bytes()
    }

    fn breakdown_key(parent_id: &str, seq: u32) -> Vec<u8> {
        let mut key = format!("breakdown/{parent_id}/").into_bytes();
        key.extend_from_slice(&seq.to_be_bytes());
        key
    }

    fn activity_key(activity: &Activity, payload_hash: &str) -> Vec<u8> {
        let mut key = b"activity/".to_vec();
        key.extend_from_slice(&activity.at.index_bytes());
        key.extend_from_slice(format!("/{payload_hash}").as_bytes());
        key
    }

    // GENERIC PLUMBING

    fn put<T>(&self, key: Vec<u8>, value: &T) -> anyhow::Result<()>
    where
        T: minicbor::Encode<()>,
    {
        self.instance.insert(key, minicbor::to_vec(value)?)?;
        Ok(())
    }

    fn get<T>(&self, key: &[u8]) -> anyhow::Result<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        match self.instance.get(key)? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T>(&self, prefix: &[u8]) -> anyhow::Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        let mut out = Vec::new();
        for entry in self.instance.scan_prefix(prefix) {
            let (_, value) = entry?;
            out.push(minicbor::decode(&value)?);
        }
        Ok(out)
    }

    pub fn apply(&self, batch: Batch) -> anyhow::Result<()> {
        self.instance.apply_batch(batch)?;
        Ok(())
    }

    // SESSIONS

    pub fn insert_session(&self, session: &Session) -> anyhow::Result<()> {
        self.put(Self::session_key(&session.id), session)?;
        self.instance.insert(
            Self::org_session_index_key(session),
            session.id.as_bytes(),
        )?;
        Ok(())
    }

    pub fn session(&self, id: &str) -> anyhow::Result<Session> {
        self.get(&Self::session_key(id))?
            .ok_or_else(|| FloatError::UnknownSession(id.to_string()).into())
    }

    pub fn save_session(&self, session: &Session) -> anyhow::Result<()> {
        self.put(Self::session_key(&session.id), session)
    }

    /// The `limit` most recent sessions of an organization, newest first.
    pub fn recent_sessions(&self, org_id: &str, limit: usize) -> anyhow::Result<Vec<Session>> {
        let prefix = format!("orgsess/{org_id}/").into_bytes();
        let mut ids = Vec::new();
        for entry in self.instance.scan_prefix(&prefix) {
            let (_, value) = entry?;
            ids.push(String::from_utf8(value.to_vec())?);
        }

        ids.iter()
            .rev()
            .take(limit)
            .map(|id| self.session(id))
            .collect()
    }

    // ORGANIZATION INPUTS

    pub fn insert_repository(&self, repository: &Repository) -> anyhow::Result<()> {
        self.put(
            Self::repository_key(&repository.org_id, &repository.id),
            repository,
        )
    }

    pub fn repository(&self, org_id: &str, id: &str) -> anyhow::Result<Repository> {
        self.get(&Self::repository_key(org_id, id))?
            .ok_or_else(|| FloatError::UnknownRepository(id.to_string()).into())
    }

    pub fn repositories(&self, org_id: &str) -> anyhow::Result<Vec<Repository>> {
        self.scan(format!("repo/{org_id}/").as_bytes())
    }

    pub fn insert_currency(&self, currency: &Currency) -> anyhow::Result<()> {
        self.put(
            Self::currency_key(&currency.org_id, &currency.ticker),
            currency,
        )
    }

    pub fn currency_opt(&self, org_id: &str, ticker: &str) -> anyhow::Result<Option<Currency>> {
        self.get(&Self::currency_key(org_id, ticker))
    }

    pub fn currency(&self, org_id: &str, ticker: &str) -> anyhow::Result<Currency> {
        self.currency_opt(org_id, ticker)?
            .ok_or_else(|| FloatError::UnknownCurrency(ticker.to_string()).into())
    }

    // FLOAT STACKS

    /// Race-safe unique insert. Returns false when a row already exists for
    /// the key, which callers count as an idempotent skip.
    pub fn try_insert_stack(&self, stack: &FloatStack) -> anyhow::Result<bool> {
        let key = Self::stack_storage_key(&stack.key);
        let value = minicbor::to_vec(stack)?;

        let swapped = self
            .instance
            .compare_and_swap(key.clone(), None as Option<&[u8]>, Some(value))?;

        match swapped {
            Ok(()) => {
                self.instance
                    .insert(Self::stack_history_key(stack), key)?;
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    pub fn stack_opt(&self, key: &StackKey) -> anyhow::Result<Option<FloatStack>> {
        self.get(&Self::stack_storage_key(key))
    }

    pub fn stack(&self, key: &StackKey) -> anyhow::Result<FloatStack> {
        self.stack_opt(key)?
            .ok_or_else(|| FloatError::UnknownFloatStack(key.to_string()).into())
    }

    pub fn save_stack(&self, stack: &FloatStack) -> anyhow::Result<()> {
        self.put(Self::stack_storage_key(&stack.key), stack)
    }

    pub fn session_stacks(&self, session_id: &str) -> anyhow::Result<Vec<FloatStack>> {
        self.scan(format!("stack/{session_id}/").as_bytes())
    }

    pub fn repository_ticker_stacks(
        &self,
        session_id: &str,
        repository_id: &str,
        ticker: &str,
    ) -> anyhow::Result<Vec<FloatStack>> {
        self.scan(format!("stack/{session_id}/{repository_id}/{ticker}/").as_bytes())
    }

    /// Most recent stack for (repository, ticker, denomination) across all
    /// sessions, via the time-ordered history index.
    pub fn latest_prior_stack(
        &self,
        repository_id: &str,
        ticker: &str,
        denomination_id: &str,
    ) -> anyhow::Result<Option<FloatStack>> {
        let prefix = format!("stackhist/{repository_id}/{ticker}/{denomination_id}/").into_bytes();

        let Some(entry) = self.instance.scan_prefix(&prefix).last() else {
            return Ok(None);
        };
        let (_, stack_key) = entry?;

        match self.instance.get(&stack_key)? {
            Some(bytes) => Ok(Some(minicbor::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    // ACCESS LOGS

    /// Idempotent creation: one row per (session, repository), first writer
    /// wins.
    pub fn try_insert_access_log(&self, log: &RepositoryAccessLog) -> anyhow::Result<bool> {
        let key = Self::access_log_key(&log.session_id, &log.repository_id);
        let value = minicbor::to_vec(log)?;

        let swapped = self
            .instance
            .compare_and_swap(key, None as Option<&[u8]>, Some(value))?;

        Ok(swapped.is_ok())
    }

    pub fn access_log_opt(
        &self,
        session_id: &str,
        repository_id: &str,
    ) -> anyhow::Result<Option<RepositoryAccessLog>> {
        self.get(&Self::access_log_key(session_id, repository_id))
    }

    pub fn save_access_log(&self, log: &RepositoryAccessLog) -> anyhow::Result<()> {
        self.put(Self::access_log_key(&log.session_id, &log.repository_id), log)
    }

    pub fn session_access_logs(
        &self,
        session_id: &str,
    ) -> anyhow::Result<Vec<RepositoryAccessLog>> {
        self.scan(format!("alog/{session_id}/").as_bytes())
    }

    // MOVEMENTS

    pub fn swap(&self, id: &str) -> anyhow::Result<Option<CurrencySwap>> {
        self.get(&Self::swap_key(id))
    }

    pub fn transfer(&self, id: &str) -> anyhow::Result<Option<Transfer>> {
        self.get(&Self::transfer_key(id))
    }

    /// Committed breakdowns for a parent, in caller order.
    pub fn breakdowns(&self, parent_id: &str) -> anyhow::Result<Vec<Breakdown>> {
        self.scan(format!("breakdown/{parent_id}/").as_bytes())
    }

    // ACTIVITIES

    pub fn append_activity(&self, activity: &Activity) -> anyhow::Result<()> {
        let (hash, cbor) = activity.build()?;
        self.instance
            .insert(Self::activity_key(activity, &hash), cbor)?;
        Ok(())
    }

    pub fn activities(&self) -> anyhow::Result<Vec<Activity>> {
        self.scan(b"activity/")
    }

    // BATCH STAGING
    //
    // Used by the breakdown commit path: stage every row, apply once.

    pub fn stage_swap(batch: &mut Batch, swap: &CurrencySwap) -> anyhow::Result<()> {
        batch.insert(Self::swap_key(&swap.id), minicbor::to_vec(swap)?);
        Ok(())
    }

    pub fn stage_transfer(batch: &mut Batch, transfer: &Transfer) -> anyhow::Result<()> {
        batch.insert(Self::transfer_key(&transfer.id), minicbor::to_vec(transfer)?);
        Ok(())
    }

    pub fn stage_stack(batch: &mut Batch, stack: &FloatStack) -> anyhow::Result<()> {
        batch.insert(Self::stack_storage_key(&stack.key), minicbor::to_vec(stack)?);
        Ok(())
    }

    pub fn stage_breakdown(
        batch: &mut Batch,
        parent_id: &str,
        seq: u32,
        breakdown: &Breakdown,
    ) -> anyhow::Result<()> {
        batch.insert(
            Self::breakdown_key(parent_id, seq),
            minicbor::to_vec(breakdown)?,
        );
        Ok(())
    }

    pub fn stage_activity(batch: &mut Batch, activity: &Activity) -> anyhow::Result<()> {
        let (hash, cbor) = activity.build()?;
        batch.insert(Self::activity_key(activity, &hash), cbor);
        Ok(())
    }
}

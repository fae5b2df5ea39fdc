//! Breakdown validation and the atomic commit path for swaps and transfers.
//!
//! A commit verifies that the proposed denomination counts reproduce the
//! declared sums per direction, then stages the parent record, the mutated
//! float stacks, one committed breakdown row per entry (caller order) and the
//! audit row last, all into a single batch. Nothing touches the store until
//! every entry has validated, so a failed commit leaves no parent and no
//! partial mutation behind.

use crate::activity::{Activity, ActivityKind};
use crate::error::FloatError;
use crate::money::Amount;
use crate::org::Currency;
use crate::stack::{Direction, FloatStack, StackKey};
use crate::store::LedgerStore;
use crate::time::TimeStamp;
use chrono::Utc;
use sled::Batch;

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakdownStatus {
    #[n(0)]
    Committed,
}

/// Immutable record of one denomination-count movement under a parent swap
/// or transfer.
#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Breakdown {
    #[n(0)]
    pub stack: StackKey,
    #[n(1)]
    pub denomination_id: String,
    #[n(2)]
    pub count: Amount,
    #[n(3)]
    pub direction: Direction,
    #[n(4)]
    pub status: BreakdownStatus,
    #[n(5)]
    pub at: TimeStamp<Utc>,
}

/// Caller-proposed movement of `count` units of one denomination.
#[derive(Debug, Clone)]
pub struct BreakdownEntry {
    pub stack: StackKey,
    pub denomination_id: String,
    pub count: Amount,
    pub direction: Direction,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct CurrencySwap {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub org_id: String,
    #[n(2)]
    pub outbound_repository: String,
    #[n(3)]
    pub inbound_repository: String,
    #[n(4)]
    pub ticker: String,
    #[n(5)]
    pub outbound_sum: Amount,
    #[n(6)]
    pub inbound_sum: Amount,
    #[n(7)]
    pub user_id: String,
    #[n(8)]
    pub created_at: TimeStamp<Utc>,
}

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub org_id: String,
    #[n(2)]
    pub from_repository: String,
    #[n(3)]
    pub to_repository: String,
    #[n(4)]
    pub ticker: String,
    #[n(5)]
    pub sum: Amount,
    #[n(6)]
    pub user_id: String,
    #[n(7)]
    pub created_at: TimeStamp<Utc>,
}

/// Sum `count x denomination value` over the entries of one direction.
fn direction_sum(
    entries: &[BreakdownEntry],
    currency: &Currency,
    direction: Direction,
) -> anyhow::Result<Amount> {
    let mut total = Amount::ZERO;

    for entry in entries.iter().filter(|e| e.direction == direction) {
        let denomination = currency.denomination(&entry.denomination_id).ok_or_else(|| {
            FloatError::UnknownDenomination {
                ticker: currency.ticker.clone(),
                denomination_id: entry.denomination_id.clone(),
            }
        })?;

        let term = entry
            .count
            .checked_mul(denomination.value)
            .and_then(|t| total.checked_add(t))
            .ok_or(FloatError::AmountOverflow)?;
        total = term;
    }

    Ok(total)
}

fn verify_direction(
    entries: &[BreakdownEntry],
    currency: &Currency,
    direction: Direction,
    declared: Amount,
) -> anyhow::Result<()> {
    let counted = direction_sum(entries, currency, direction)?;

    if counted != declared {
        return Err(FloatError::BreakdownSumMismatch {
            direction,
            declared,
            counted,
        }
        .into());
    }

    Ok(())
}

/// Load the referenced stacks and apply each entry's delta in caller order.
/// `track_transfers` additionally accumulates `transferred_during_session`
/// so `current_count` stays truthful mid-session.
fn apply_entries(
    store: &LedgerStore,
    entries: &[BreakdownEntry],
    track_transfers: bool,
) -> anyhow::Result<Vec<FloatStack>> {
    let mut stacks: Vec<FloatStack> = Vec::new();

    for entry in entries {
        if !stacks.iter().any(|s| s.key == entry.stack) {
            stacks.push(store.stack(&entry.stack)?);
        }
        let stack = stacks
            .iter_mut()
            .find(|s| s.key == entry.stack)
            .ok_or(FloatError::CommitConflict)?;

        stack.apply_directional_delta(entry.count, entry.direction);

        if track_transfers {
            stack.transferred_during_session = match entry.direction {
                Direction::Outbound => stack.transferred_during_session + entry.count,
                Direction::Inbound => stack.transferred_during_session - entry.count,
            };
        }
    }

    Ok(stacks)
}

fn stage_breakdowns(
    batch: &mut Batch,
    parent_id: &str,
    entries: &[BreakdownEntry],
) -> anyhow::Result<()> {
    for (seq, entry) in entries.iter().enumerate() {
        let breakdown = Breakdown {
            stack: entry.stack.clone(),
            denomination_id: entry.denomination_id.clone(),
            count: entry.count,
            direction: entry.direction,
            status: BreakdownStatus::Committed,
            at: TimeStamp::new(),
        };
        LedgerStore::stage_breakdown(batch, parent_id, seq as u32, &breakdown)?;
    }
    Ok(())
}

/// Boundary pre-check: do the proposed entries reproduce the declared sums?
/// The commit paths run the same check; exposing it lets callers validate a
/// form before anything is written.
pub fn verify_breakdown_sums(
    entries: &[BreakdownEntry],
    currency: &Currency,
    declared_outbound: Amount,
    declared_inbound: Amount,
) -> anyhow::Result<()> {
    verify_direction(entries, currency, Direction::Outbound, declared_outbound)?;
    verify_direction(entries, currency, Direction::Inbound, declared_inbound)
}

pub fn commit_swap(
    store: &LedgerStore,
    swap: CurrencySwap,
    entries: &[BreakdownEntry],
) -> anyhow::Result<CurrencySwap> {
    let currency = store.currency(&swap.org_id, &swap.ticker)?;

    verify_breakdown_sums(entries, &currency, swap.outbound_sum, swap.inbound_sum)?;

    let stacks = apply_entries(store, entries, false)?;

    let mut batch = Batch::default();
    LedgerStore::stage_swap(&mut batch, &swap)?;
    for stack in &stacks {
        LedgerStore::stage_stack(&mut batch, stack)?;
    }
    stage_breakdowns(&mut batch, &swap.id, entries)?;
    LedgerStore::stage_activity(
        &mut batch,
        &Activity::new(
            swap.org_id.clone(),
            entries.first().map(|e| e.stack.session_id.clone()),
            swap.user_id.clone(),
            ActivityKind::SwapCommitted,
        ),
    )?;

    store.apply(batch)?;

    Ok(swap)
}

pub fn commit_transfer(
    store: &LedgerStore,
    transfer: Transfer,
    entries: &[BreakdownEntry],
) -> anyhow::Result<Transfer> {
    let currency = store.currency(&transfer.org_id, &transfer.ticker)?;

    // both legs of a transfer move the same declared sum
    verify_breakdown_sums(entries, &currency, transfer.sum, transfer.sum)?;

    let stacks = apply_entries(store, entries, true)?;

    let mut batch = Batch::default();
    LedgerStore::stage_transfer(&mut batch, &transfer)?;
    for stack in &stacks {
        LedgerStore::stage_stack(&mut batch, stack)?;
    }
    stage_breakdowns(&mut batch, &transfer.id, entries)?;
    LedgerStore::stage_activity(
        &mut batch,
        &Activity::new(
            transfer.org_id.clone(),
            entries.first().map(|e| e.stack.session_id.clone()),
            transfer.user_id.clone(),
            ActivityKind::TransferCommitted,
        ),
    )?;

    store.apply(batch)?;

    Ok(transfer)
}

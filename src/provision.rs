//! Float provisioning: materialize one float stack per active
//! (repository x ticker x accepted denomination) combination for a session,
//! carrying the previous session's close count forward.
//!
//! Safe to run any number of times for the same session. A repository with
//! no tickers, an unknown currency, or a currency without denominations is a
//! logged no-op, never a batch failure.

use crate::session::RepositoryAccessLog;
use crate::session::Session;
use crate::stack::{FloatStack, StackKey};
use crate::store::LedgerStore;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProvisionReport {
    pub created: usize,
    pub skipped: usize,
    /// Repositories provisioning passed over, with the reason.
    pub skipped_repositories: Vec<(String, String)>,
}

pub fn provision_session(store: &LedgerStore, session: &Session) -> anyhow::Result<ProvisionReport> {
    let mut report = ProvisionReport::default();

    for repository in store.repositories(&session.org_id)? {
        if !repository.active {
            continue;
        }

        match provision_repository(store, session, &repository.id, &repository.tickers, &mut report)
        {
            Ok(()) => {}
            Err(e) => {
                // one misconfigured repository must not block the batch
                tracing::warn!(
                    repository = %repository.id,
                    session = %session.id,
                    error = %e,
                    "skipping repository during float provisioning"
                );
                report
                    .skipped_repositories
                    .push((repository.id.clone(), e.to_string()));
            }
        }
    }

    Ok(report)
}

fn provision_repository(
    store: &LedgerStore,
    session: &Session,
    repository_id: &str,
    tickers: &[String],
    report: &mut ProvisionReport,
) -> anyhow::Result<()> {
    if tickers.is_empty() {
        tracing::debug!(
            repository = %repository_id,
            session = %session.id,
            "repository carries no tickers, nothing to provision"
        );
        report
            .skipped_repositories
            .push((repository_id.to_string(), "no tickers configured".into()));
        return Ok(());
    }

    let log = RepositoryAccessLog::new(
        session.id.clone(),
        repository_id.to_string(),
        session.active_user_id.clone(),
    );
    store.try_insert_access_log(&log)?;

    for ticker in tickers {
        let Some(currency) = store.currency_opt(&session.org_id, ticker)? else {
            tracing::debug!(
                repository = %repository_id,
                ticker = %ticker,
                "ticker has no currency record, skipping"
            );
            report
                .skipped_repositories
                .push((repository_id.to_string(), format!("unknown currency {ticker}")));
            continue;
        };

        if currency.denominations.is_empty() {
            tracing::debug!(
                repository = %repository_id,
                ticker = %ticker,
                "currency has no denominations, skipping"
            );
            report.skipped_repositories.push((
                repository_id.to_string(),
                format!("currency {ticker} has no denominations"),
            ));
            continue;
        }

        for denomination in currency.denominations.iter().filter(|d| d.accepted) {
            let key = StackKey {
                session_id: session.id.clone(),
                repository_id: repository_id.to_string(),
                ticker: ticker.clone(),
                denomination_id: denomination.id.clone(),
            };

            if store.stack_opt(&key)?.is_some() {
                report.skipped += 1;
                continue;
            }

            let prior = store.latest_prior_stack(repository_id, ticker, &denomination.id)?;
            let (last_session_count, prev_stack) = match prior {
                Some(prev) => (prev.close_count, Some(prev.key)),
                None => (crate::money::Amount::ZERO, None),
            };

            let stack =
                FloatStack::provisioned(key, last_session_count, denomination.value, prev_stack);

            // compare_and_swap: a concurrent provisioner may have won the
            // race between our existence check and this insert
            if store.try_insert_stack(&stack)? {
                report.created += 1;
            } else {
                report.skipped += 1;
            }
        }
    }

    Ok(())
}

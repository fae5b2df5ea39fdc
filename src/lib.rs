//! Session float lifecycle and reconciliation engine for a multi-tenant
//! currency-exchange back office.
//!
//! Organizations run bounded trading sessions over a set of repositories
//! (tills, vaults, virtual wallets). Each session provisions a float stack
//! per denomination per repository, carries the prior session's close counts
//! forward, and tracks physical counts through the open/close lifecycle.
//! Swaps and transfers move denominated counts between repositories through
//! validated, atomically committed breakdowns, and the reconciliation module
//! computes the expected-versus-actual sums that gate session close.

pub mod activity;
pub mod breakdown;
pub mod config;
pub mod error;
pub mod money;
pub mod org;
pub mod provision;
pub mod reconcile;
pub mod service;
pub mod session;
pub mod stack;
pub mod store;
pub mod time;
pub mod utils;

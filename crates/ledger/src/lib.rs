//! Double-entry ledger for the accounting service.
//!
//! Every captured payment produces exactly one balanced pair of
//! entries: a debit against `CustomerReceivable` and a credit of the
//! same amount against `Revenue`, sharing a transaction ID. Entries are
//! immutable once written (corrections are new compensating entries,
//! never edits), so the sum of all debits must always equal the sum of
//! all credits. Reconciliation verifies that invariant on demand.

pub mod accounts;
pub mod entry;
pub mod error;
pub mod reconciliation;
pub mod store;

pub use entry::LedgerEntry;
pub use error::LedgerError;
pub use reconciliation::{ReconciliationReport, Reconciler};
pub use store::{InMemoryLedgerStore, LedgerStore};

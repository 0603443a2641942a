//! Error kinds surfaced by the ledger services.
//!
//! Every rejected precondition maps to a distinguishable kind so the
//! API layer can render a specific message; storage failures are
//! wrapped rather than swallowed.

use std::fmt;

#[derive(Debug)]
pub enum LedgerError {
    /// Referenced entity does not exist.
    NotFound(String),
    /// Operation attempted outside its valid status.
    InvalidState(String),
    /// Amount, deadline, or cap rule would be violated.
    InvariantViolation(String),
    /// One-shot operation was already applied (safe for caller retries).
    AlreadyProcessed(String),
    /// Underlying store failure.
    Storage(anyhow::Error),
}

pub type LedgerResult<T> = Result<T, LedgerError>;

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LedgerError::NotFound(msg) => write!(f, "not found: {msg}"),
            LedgerError::InvalidState(msg) => write!(f, "invalid state: {msg}"),
            LedgerError::InvariantViolation(msg) => write!(f, "invariant violation: {msg}"),
            LedgerError::AlreadyProcessed(msg) => write!(f, "already processed: {msg}"),
            LedgerError::Storage(err) => write!(f, "storage error: {err}"),
        }
    }
}

impl std::error::Error for LedgerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LedgerError::Storage(err) => err.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for LedgerError {
    fn from(err: anyhow::Error) -> Self {
        LedgerError::Storage(err)
    }
}

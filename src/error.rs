//! Error types for cadlock.
//!
//! Uses thiserror for derive macros. Lease ownership conflicts are not errors:
//! they surface as `Acquisition::Denied` and collision events. Everything here
//! is recoverable by the reconciliation loop, which logs and retries next cycle.

use crate::exit_codes;
use thiserror::Error;

/// Main error type for cadlock operations.
#[derive(Error, Debug)]
pub enum CadlockError {
    /// User provided invalid arguments or configuration.
    #[error("{0}")]
    UserError(String),

    /// The shared lock directory is unreachable or unreadable.
    #[error("Lock store unavailable: {0}")]
    StorageUnavailable(String),

    /// A lease record body could not be parsed.
    #[error("Corrupt lease record: {0}")]
    RecordCorrupt(String),

    /// A record changed between read and write and retries were exhausted.
    #[error("Lost race on lease record: {0}")]
    RaceLost(String),

    /// The resource is leased by another owner.
    #[error("Lease denied: {0}")]
    LeaseDenied(String),

    /// Two different resources encoded to the same lease record key.
    #[error("Lease key collision: {0}")]
    KeyCollision(String),

    /// The external editor could not be launched.
    #[error("Launch failed: {0}")]
    LaunchError(String),
}

impl CadlockError {
    /// Returns the appropriate exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            CadlockError::UserError(_) | CadlockError::KeyCollision(_) => exit_codes::USER_ERROR,
            CadlockError::StorageUnavailable(_)
            | CadlockError::RecordCorrupt(_)
            | CadlockError::RaceLost(_) => exit_codes::STORAGE_FAILURE,
            CadlockError::LeaseDenied(_) => exit_codes::LOCK_FAILURE,
            CadlockError::LaunchError(_) => exit_codes::LAUNCH_FAILURE,
        }
    }
}

/// Result type alias for cadlock operations.
pub type Result<T> = std::result::Result<T, CadlockError>;

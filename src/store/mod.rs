//! Lease store: the shared directory of lease record files.
//!
//! The store is the only shared state between agents. It is a flat directory
//! holding one JSON file per lease, named `{record key}{suffix}` (suffix
//! `.lock` by default). Any agent may create, rewrite, or delete any file;
//! ownership is only expressed by the record body.
//!
//! # Guarantees
//!
//! - New records are written to a temporary file and published with a hard
//!   link, which fails if the record already exists. Readers never see a
//!   half-written record and local creators racing on one key cannot both
//!   win. Sync-based network drives may still end up with duplicates (e.g.
//!   conflict copies), which the conflict detector reports.
//! - Rewrites go through an atomic temp-file-and-rename.
//! - Reads tolerate a record vanishing at any point, and report unparseable
//!   bodies as [`StoredLease::Corrupt`] together with the file's modification
//!   time so that such files can still age out.
//!
//! # Record Format
//!
//! ```json
//! {
//!   "resource": "G:\\CAD Data\\P1.sldprt",
//!   "owner": { "user": "alice", "host": "CAD-01" },
//!   "created_at": "2026-10-19T08:00:00Z",
//!   "last_renewed_at": "2026-10-19T08:05:10.417Z",
//!   "origin": "auto"
//! }
//! ```
//!
//! Unknown top-level fields are preserved across renewals.

mod operations;
mod record;
mod types;


pub use operations::LeaseStore;
pub use record::{LeaseRecord, Origin, format_age, is_stale};
pub use types::{CorruptRecord, CreateOutcome, StoredEntry, StoredLease};

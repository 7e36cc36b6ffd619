//! Conflict detection over the lease store.
//!
//! The store cannot stop two agents from writing a record for the same
//! resource in the same instant, so single ownership is checked after the
//! fact. Two kinds of collision are reported:
//!
//! - **Foreign-owned active use**: a resource this agent is using has a lease
//!   held by somebody else.
//! - **Multiple owners**: the store holds records with distinct owners for one
//!   normalized resource. Any agent may notice this, including one that is
//!   not involved.
//!
//! Each collision is reported once per episode. An episode ends when the set
//! of owners involved changes or the condition clears, after which the same
//! collision can be reported again. Detection only reads the store.

mod detector;
mod event;


pub use detector::{ConflictDetector, owners_by_resource};
pub use event::CollisionEvent;

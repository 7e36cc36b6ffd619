//! Filesystem utilities for cadlock.
//!
//! Lease records are rewritten in place on every renewal, so every rewrite
//! goes through an atomic temp-file-and-rename to keep readers on other
//! workstations from ever seeing a half-written record.

pub mod atomic;

pub use atomic::{atomic_create, atomic_write};

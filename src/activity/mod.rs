//! Activity sources: which resources are in use on this workstation.
//!
//! The reconciliation loop only needs a set of active resources and a flag
//! telling whether the host application runs at all. How they are found is
//! up to the source. The built-in [`MarkerScan`] looks for the lock marker
//! files the CAD application drops next to every document it has open
//! (`~$Part.sldprt` beside `Part.sldprt`), and optionally asks an external
//! [`HostProbe`] command whether the application process is alive.

mod marker;
mod probe;


use crate::error::Result;
use crate::resource::ResourceId;
use std::collections::BTreeSet;

pub use marker::{MarkerScan, build_globset};
pub use probe::HostProbe;

/// A per-agent detector of active resources.
pub trait ActivitySource: Send {
    /// Resources currently in use on this agent.
    fn snapshot(&self) -> Result<BTreeSet<ResourceId>>;

    /// Whether the host application is running at all.
    fn host_application_running(&self) -> bool;
}

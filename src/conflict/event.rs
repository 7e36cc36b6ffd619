use crate::resource::{Owner, ResourceId};
use serde::Serialize;
use std::fmt;

/// A detected violation of single ownership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollisionEvent {
    /// A resource active on this agent is leased by other owners.
    ForeignOwnedActiveUse {
        resource: ResourceId,
        holders: Vec<Owner>,
    },

    /// Records with more than one distinct owner exist for one resource.
    MultipleOwners {
        resource: ResourceId,
        owners: Vec<Owner>,
    },
}

impl CollisionEvent {
    pub fn resource(&self) -> &ResourceId {
        match self {
            CollisionEvent::ForeignOwnedActiveUse { resource, .. }
            | CollisionEvent::MultipleOwners { resource, .. } => resource,
        }
    }
}

fn join(owners: &[Owner]) -> String {
    owners
        .iter()
        .map(|o| o.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for CollisionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollisionEvent::ForeignOwnedActiveUse { resource, holders } => {
                write!(f, "{} is in use here but leased by {}", resource, join(holders))
            }
            CollisionEvent::MultipleOwners { resource, owners } => {
                write!(f, "{} is leased by several owners: {}", resource, join(owners))
            }
        }
    }
}

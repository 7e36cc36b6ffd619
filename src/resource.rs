//! Resource identifiers and lease owners.
//!
//! A [`ResourceId`] keeps the exact path string it was created from (that is
//! what lease records store and what users see) next to a normalized form used
//! for every comparison: separators unified to `/`, repeated separators
//! collapsed, trailing separator dropped, and case folded. Two paths that only
//! differ in separators or casing therefore name the same resource.
//!
//! An [`Owner`] is the `(user, host)` principal that holds leases. Owners
//! compare case-insensitively since both halves come from Windows-style
//! environment values on most workstations.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Canonical identifier of a protected resource.
#[derive(Debug, Clone)]
pub struct ResourceId {
    original: String,
    normalized: String,
}

impl ResourceId {
    /// Create a resource identifier from a path string.
    pub fn new(raw: impl Into<String>) -> Self {
        let original = raw.into();
        let normalized = normalize(&original);
        Self {
            original,
            normalized,
        }
    }

    /// Create a resource identifier from a filesystem path.
    pub fn from_path(path: &Path) -> Self {
        Self::new(path.to_string_lossy().into_owned())
    }

    /// The exact string this identifier was created from.
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// The normalized comparison form.
    pub fn normalized(&self) -> &str {
        &self.normalized
    }

    /// Last path segment of the original string.
    pub fn file_name(&self) -> &str {
        self.original
            .rsplit(['/', '\\'])
            .find(|s| !s.is_empty())
            .unwrap_or(&self.original)
    }

    /// Normalized path relative to `root`, if this resource lives under it.
    pub fn relative_to(&self, root: &ResourceId) -> Option<&str> {
        let root = root.normalized();
        if root.is_empty() {
            return None;
        }
        let rest = self.normalized.strip_prefix(root)?;
        let rest = if root.ends_with('/') {
            rest
        } else {
            rest.strip_prefix('/')?
        };
        (!rest.is_empty()).then_some(rest)
    }
}

/// Normalize a path string for comparison.
pub(crate) fn normalize(raw: &str) -> String {
    let unified = raw.replace('\\', "/").to_lowercase();

    // Keep a UNC-style double leading separator, collapse every other run.
    let leading = unified.chars().take_while(|&c| c == '/').count();
    let mut out = String::with_capacity(unified.len());
    out.push_str(match leading {
        0 => "",
        1 => "/",
        _ => "//",
    });

    let mut prev_sep = true;
    for c in unified[leading..].chars() {
        if c == '/' {
            if !prev_sep {
                out.push('/');
            }
            prev_sep = true;
        } else {
            out.push(c);
            prev_sep = false;
        }
    }

    if out.len() > leading.min(2) && out.ends_with('/') {
        out.pop();
    }
    out
}

impl PartialEq for ResourceId {
    fn eq(&self, other: &Self) -> bool {
        self.normalized == other.normalized
    }
}

impl Eq for ResourceId {}

impl Hash for ResourceId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.normalized.hash(state);
    }
}

impl PartialOrd for ResourceId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ResourceId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.normalized.cmp(&other.normalized)
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl Serialize for ResourceId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.original)
    }
}

impl<'de> Deserialize<'de> for ResourceId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(ResourceId::new)
    }
}

/// The principal that holds a lease.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Owner {
    /// Login name of the user.
    pub user: String,

    /// Workstation host name.
    pub host: String,
}

impl Owner {
    pub fn new(user: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
        }
    }

    /// The owner of this process, from `USER`/`USERNAME` and the host name.
    pub fn current() -> Self {
        let user = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .unwrap_or_else(|_| "unknown".to_string());

        let host = hostname::get()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self { user, host }
    }

    /// Case-folded `user@host`, the identity used for comparisons.
    pub fn key(&self) -> String {
        format!("{}@{}", self.user, self.host).to_lowercase()
    }
}

impl PartialEq for Owner {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Owner {}

impl Hash for Owner {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Owner {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Owner {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.user, self.host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_separators_and_case_are_normalized() {
        let a = ResourceId::new(r"G:\CAD Data\Parts\P1.SLDPRT");
        let b = ResourceId::new("g:/cad data/parts/p1.sldprt");
        assert_eq!(a, b);
        assert_eq!(a.normalized(), "g:/cad data/parts/p1.sldprt");
        // Original form is kept verbatim.
        assert_eq!(a.as_str(), r"G:\CAD Data\Parts\P1.SLDPRT");
    }

    #[test]
    fn test_repeated_and_trailing_separators_collapse() {
        assert_eq!(normalize(r"G:\\CAD\\\Parts\"), "g:/cad/parts");
        assert_eq!(normalize("/srv//cad/"), "/srv/cad");
    }

    #[test]
    fn test_unc_prefix_is_preserved() {
        let unc = ResourceId::new(r"\\share\P1.part");
        assert_eq!(unc.normalized(), "//share/p1.part");
        assert_ne!(unc, ResourceId::new(r"\share\P1.part"));
    }

    #[test]
    fn test_hash_follows_normalized_form() {
        let mut set = HashSet::new();
        set.insert(ResourceId::new(r"\\share\P1.part"));
        assert!(set.contains(&ResourceId::new("//SHARE/p1.PART")));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(ResourceId::new(r"G:\CAD\P1.sldprt").file_name(), "P1.sldprt");
        assert_eq!(ResourceId::new("/srv/cad/asm/").file_name(), "asm");
        assert_eq!(ResourceId::new("plain").file_name(), "plain");
    }

    #[test]
    fn test_relative_to_root() {
        let root = ResourceId::new(r"G:\CAD Data");
        let inside = ResourceId::new(r"g:/cad data/Sub/P1.sldprt");
        let sibling = ResourceId::new(r"G:\CAD Database\P1.sldprt");
        assert_eq!(inside.relative_to(&root), Some("sub/p1.sldprt"));
        assert_eq!(sibling.relative_to(&root), None);
        assert_eq!(root.relative_to(&root), None);
    }

    #[test]
    fn test_serde_round_trips_original() {
        let id = ResourceId::new(r"G:\Mixed/Sep Dir\Part A.sldprt");
        let json = serde_json::to_string(&id).unwrap();
        let back: ResourceId = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_str(), id.as_str());
    }

    #[test]
    fn test_owner_comparison_is_case_insensitive() {
        let a = Owner::new("Alice", "CAD-01");
        let b = Owner::new("alice", "cad-01");
        assert_eq!(a, b);
        assert_ne!(a, Owner::new("alice", "cad-02"));
        assert_eq!(a.to_string(), "Alice@CAD-01");
    }

    #[test]
    fn test_current_owner_is_populated() {
        let owner = Owner::current();
        assert!(!owner.user.is_empty());
        assert!(!owner.host.is_empty());
    }
}

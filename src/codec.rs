//! Path codec: resource identifier to lease record key.
//!
//! Keys are derived from the normalized resource path, so every spelling of a
//! resource (mixed separators, mixed case) maps to the same record file.
//!
//! # Encoding
//!
//! - Resources under the configured root are encoded root-relative; anything
//!   else is encoded from its full normalized path behind a `%%` marker.
//! - Every character that is illegal in a Windows file name, plus `%`, `#` and
//!   the segment separator `/`, is replaced by `%XX` (uppercase hex). A leading
//!   `.` is escaped as well so keys never look like hidden or temporary files.
//! - Because `%` itself is always escaped, escaping is injective: two distinct
//!   normalized paths never produce the same key, and `%%` can only appear as
//!   the absolute-path marker.
//! - Keys longer than [`MAX_KEY_LEN`] bytes are cut at an escape boundary and
//!   suffixed with `#` and the SHA-256 of the full key. Unhashed keys never
//!   contain a bare `#`, so the two forms cannot collide either.
//!
//! The exact original path is stored in the record body, so [`PathCodec::decode`]
//! only has to recover the normalized path and gives up on hashed keys.

use crate::resource::ResourceId;
use sha2::{Digest, Sha256};
use std::fmt;

/// Longest key kept verbatim before switching to the hashed form.
pub const MAX_KEY_LEN: usize = 180;

/// Bytes of readable prefix kept in a hashed key.
const HASHED_PREFIX_LEN: usize = 120;

const ABSOLUTE_MARKER: &str = "%%";

/// Storage key of a lease record (the record file name without its suffix).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordKey(String);

impl RecordKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File name of the record with the given suffix (e.g. `.lock`).
    pub fn file_name(&self, suffix: &str) -> String {
        format!("{}{}", self.0, suffix)
    }

    /// Recover the key from a record file name.
    pub fn from_file_name(name: &str, suffix: &str) -> Option<Self> {
        let stem = name.strip_suffix(suffix)?;
        (!stem.is_empty() && !stem.starts_with('.')).then(|| Self(stem.to_string()))
    }
}

impl fmt::Display for RecordKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized path recovered from an unhashed key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedKey {
    /// Normalized path, root-relative unless `absolute` is set.
    pub path: String,

    /// Whether the key was encoded from a path outside the root.
    pub absolute: bool,
}

/// Deterministic mapping from resources to record keys.
#[derive(Debug, Clone)]
pub struct PathCodec {
    root: Option<ResourceId>,
}

impl PathCodec {
    /// Create a codec encoding resources relative to `root` when possible.
    pub fn new(root: Option<ResourceId>) -> Self {
        Self { root }
    }

    /// Encode a resource into its record key. Pure and total.
    pub fn encode(&self, resource: &ResourceId) -> RecordKey {
        let relative = self.root.as_ref().and_then(|root| resource.relative_to(root));

        let mut tokens: Vec<String> = Vec::new();
        let body = match relative {
            Some(rel) => rel,
            None => {
                tokens.push(ABSOLUTE_MARKER.to_string());
                resource.normalized()
            }
        };

        for (i, c) in body.chars().enumerate() {
            let at_start = i == 0 && tokens.is_empty();
            tokens.push(escape_char(c, at_start));
        }

        let full: String = tokens.concat();
        if full.len() <= MAX_KEY_LEN {
            return RecordKey(full);
        }

        let mut prefix = String::with_capacity(HASHED_PREFIX_LEN);
        for token in &tokens {
            if prefix.len() + token.len() > HASHED_PREFIX_LEN {
                break;
            }
            prefix.push_str(token);
        }

        let digest = Sha256::digest(full.as_bytes());
        let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
        RecordKey(format!("{}#{}", prefix, hex))
    }

    /// Recover the normalized path from a key, when it was not hashed.
    pub fn decode(key: &RecordKey) -> Option<DecodedKey> {
        let raw = key.as_str();
        if raw.contains('#') {
            return None;
        }

        let (body, absolute) = match raw.strip_prefix(ABSOLUTE_MARKER) {
            Some(rest) => (rest, true),
            None => (raw, false),
        };

        let mut path = String::with_capacity(body.len());
        let mut chars = body.chars();
        while let Some(c) = chars.next() {
            if c != '%' {
                path.push(c);
                continue;
            }
            let hi = chars.next()?.to_digit(16)?;
            let lo = chars.next()?.to_digit(16)?;
            path.push(char::from_u32(hi * 16 + lo)?);
        }

        Some(DecodedKey { path, absolute })
    }
}

fn escape_char(c: char, at_start: bool) -> String {
    let escape = match c {
        '%' | '#' | '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => true,
        '.' => at_start,
        c => c.is_control(),
    };

    if escape && c.is_ascii() {
        format!("%{:02X}", c as u32)
    } else {
        c.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> PathCodec {
        PathCodec::new(Some(ResourceId::new(r"G:\Shared drives\CAD Data")))
    }

    #[test]
    fn test_encode_is_root_relative() {
        let key = codec().encode(&ResourceId::new(r"G:\Shared drives\CAD Data\Sub\P1.sldprt"));
        assert_eq!(key.as_str(), "sub%2Fp1.sldprt");
    }

    #[test]
    fn test_spelling_variants_share_a_key() {
        let c = codec();
        let a = c.encode(&ResourceId::new(r"G:\Shared drives\CAD Data\Sub\P1.sldprt"));
        let b = c.encode(&ResourceId::new("g:/shared drives/cad data//sub/P1.SLDPRT"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_segment_boundaries_do_not_collide() {
        let c = codec();
        let root = r"G:\Shared drives\CAD Data";
        let with_sep = c.encode(&ResourceId::new(format!(r"{}\a\b.sldprt", root)));
        let underscore = c.encode(&ResourceId::new(format!(r"{}\a_b.sldprt", root)));
        let literal_escape = c.encode(&ResourceId::new(format!(r"{}\a%2Fb.sldprt", root)));
        assert_ne!(with_sep, underscore);
        assert_ne!(with_sep, literal_escape);
        assert_ne!(underscore, literal_escape);
    }

    #[test]
    fn test_outside_root_encodes_full_path() {
        let c = codec();
        let outside = ResourceId::new(r"\\share\P1.part");
        let key = c.encode(&outside);
        assert_eq!(key.as_str(), "%%%2F%2Fshare%2Fp1.part");
        // Deterministic.
        assert_eq!(key, c.encode(&outside));
    }

    #[test]
    fn test_absolute_and_relative_forms_do_not_collide() {
        // Without a root, "p1.part" is encoded as an absolute path.
        let no_root = PathCodec::new(None).encode(&ResourceId::new("p1.part"));
        let rooted = PathCodec::new(Some(ResourceId::new("/cad")))
            .encode(&ResourceId::new("/cad/p1.part"));
        assert_eq!(rooted.as_str(), "p1.part");
        assert_ne!(no_root, rooted);
    }

    #[test]
    fn test_illegal_characters_are_escaped() {
        let key = PathCodec::new(Some(ResourceId::new("/cad")))
            .encode(&ResourceId::new("/cad/a:b*c?d\"e<f>g|h#i.sldprt"));
        for illegal in [':', '*', '?', '"', '<', '>', '|', '/', '\\', '#'] {
            assert!(!key.as_str().contains(illegal), "{} in {}", illegal, key);
        }
    }

    #[test]
    fn test_leading_dot_is_escaped() {
        let key = PathCodec::new(Some(ResourceId::new("/cad")))
            .encode(&ResourceId::new("/cad/.hidden.sldprt"));
        assert_eq!(key.as_str(), "%2Ehidden.sldprt");
        assert!(RecordKey::from_file_name(&key.file_name(".lock"), ".lock").is_some());
    }

    #[test]
    fn test_decode_recovers_normalized_path() {
        let c = codec();
        let resource = ResourceId::new(r"G:\Shared drives\CAD Data\My Parts\Bracket v2.SLDPRT");
        let decoded = PathCodec::decode(&c.encode(&resource)).unwrap();
        assert_eq!(decoded.path, "my parts/bracket v2.sldprt");
        assert!(!decoded.absolute);

        let outside = ResourceId::new(r"D:\Other\X.sldasm");
        let decoded = PathCodec::decode(&c.encode(&outside)).unwrap();
        assert_eq!(decoded.path, outside.normalized());
        assert!(decoded.absolute);
    }

    #[test]
    fn test_long_paths_are_hashed() {
        let c = codec();
        let deep = format!(r"G:\Shared drives\CAD Data\{}\part.sldprt", "very long folder\\".repeat(20));
        let key = c.encode(&ResourceId::new(&deep));
        assert!(key.as_str().len() <= HASHED_PREFIX_LEN + 1 + 64);
        assert!(key.as_str().contains('#'));
        assert!(PathCodec::decode(&key).is_none());

        // A sibling with the same long prefix gets a different key.
        let sibling = deep.replace("part.sldprt", "other.sldprt");
        assert_ne!(key, c.encode(&ResourceId::new(sibling)));
    }

    #[test]
    fn test_record_key_file_name() {
        let key = RecordKey("p1.sldprt".to_string());
        assert_eq!(key.file_name(".lock"), "p1.sldprt.lock");
        assert_eq!(RecordKey::from_file_name("p1.sldprt.lock", ".lock"), Some(key));
        assert_eq!(RecordKey::from_file_name(".p1.sldprt.lock.tmp", ".lock"), None);
        assert_eq!(RecordKey::from_file_name("notes.txt", ".lock"), None);
    }
}

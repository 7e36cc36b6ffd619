//! Atomic file replacement.
//!
//! All atomic writes follow this pattern:
//! 1. Write content to a temporary file in the same directory
//! 2. Sync the file to disk (fsync)
//! 3. Rename it over the target
//!
//! `std::fs::rename` replaces an existing target on both POSIX (`rename(2)`)
//! and Windows (`MoveFileExW` with `MOVEFILE_REPLACE_EXISTING`).
//!
//! New records are published the same way, except that step 3 is a hard link
//! which fails if the target already exists. Readers therefore never observe
//! a half-written record, and two creators racing on one name cannot both win.
//!
//! Several workstations may write into the same shared directory, so the
//! temporary name carries a caller-supplied tag (`.{filename}.{tag}.tmp`).
//! Two writers with distinct tags never share a temporary file. A crash can
//! leave the temporary file behind; its leading dot keeps it out of record
//! listings.

use crate::error::{CadlockError, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

/// Atomically write bytes to a file.
///
/// # Arguments
///
/// * `path` - The target file path
/// * `content` - The bytes to write
/// * `tag` - Writer tag that makes the temporary file name unique
pub fn atomic_write<P: AsRef<Path>>(path: P, content: &[u8], tag: &str) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent()
        && !parent.exists()
    {
        fs::create_dir_all(parent).map_err(|e| {
            CadlockError::StorageUnavailable(format!(
                "failed to create directory '{}': {}",
                parent.display(),
                e
            ))
        })?;
    }

    let temp_path = generate_temp_path(path, tag)?;
    write_and_sync(&temp_path, content)?;

    fs::rename(&temp_path, path).map_err(|e| {
        let _ = fs::remove_file(&temp_path);
        CadlockError::StorageUnavailable(format!(
            "failed to atomically replace '{}': {}",
            path.display(),
            e
        ))
    })?;

    Ok(())
}

/// Atomically publish a new file. Returns `false` if `path` already exists.
///
/// Falls back to an exclusive create when the filesystem cannot hard link.
pub fn atomic_create<P: AsRef<Path>>(path: P, content: &[u8], tag: &str) -> Result<bool> {
    let path = path.as_ref();
    let temp_path = generate_temp_path(path, tag)?;
    write_and_sync(&temp_path, content)?;

    let linked = fs::hard_link(&temp_path, path);
    let _ = fs::remove_file(&temp_path);
    match linked {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(_) => create_exclusive(path, content),
    }
}

fn create_exclusive(path: &Path, content: &[u8]) -> Result<bool> {
    let mut file = match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => {
            return Err(CadlockError::StorageUnavailable(format!(
                "failed to create '{}': {}",
                path.display(),
                e
            )));
        }
    };

    file.write_all(content)
        .and_then(|()| file.sync_all())
        .map_err(|e| {
            let _ = fs::remove_file(path);
            CadlockError::StorageUnavailable(format!("failed to write '{}': {}", path.display(), e))
        })?;

    Ok(true)
}

/// Generate a temporary file path in the same directory as the target.
fn generate_temp_path(target: &Path, tag: &str) -> Result<PathBuf> {
    let parent = target.parent().unwrap_or(Path::new("."));
    let filename = target
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| CadlockError::UserError("invalid file path".to_string()))?;

    let tag: String = tag
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    Ok(parent.join(format!(".{}.{}.tmp", filename, tag)))
}

/// Write content to a file and sync to disk.
fn write_and_sync(path: &Path, content: &[u8]) -> Result<()> {
    let mut file = File::create(path).map_err(|e| {
        CadlockError::StorageUnavailable(format!(
            "failed to create temporary file '{}': {}",
            path.display(),
            e
        ))
    })?;

    file.write_all(content).map_err(|e| {
        let _ = fs::remove_file(path);
        CadlockError::StorageUnavailable(format!("failed to write temporary file: {}", e))
    })?;

    file.sync_all().map_err(|e| {
        let _ = fs::remove_file(path);
        CadlockError::StorageUnavailable(format!("failed to sync temporary file: {}", e))
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_atomic_write_new_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("p1.sldprt.lock");

        atomic_write(&file_path, b"{}", "alice@cad-01").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "{}");
    }

    #[test]
    fn test_atomic_write_replace_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("p1.sldprt.lock");
        fs::write(&file_path, "original").unwrap();

        atomic_write(&file_path, b"renewed", "alice@cad-01").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "renewed");
    }

    #[test]
    fn test_atomic_write_creates_parent_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("Locks").join("nested").join("a.lock");

        atomic_write(&file_path, b"nested", "t").unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "nested");
    }

    #[test]
    fn test_temp_file_is_cleaned_up() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("a.lock");

        atomic_write(&file_path, b"content", "bob@cad-02").unwrap();

        let leftovers: Vec<_> = fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_atomic_create_refuses_existing() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("p1.sldprt.lock");

        assert!(atomic_create(&file_path, b"first", "alice").unwrap());
        assert!(!atomic_create(&file_path, b"second", "bob").unwrap());

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "first");
        let entries = fs::read_dir(temp_dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn test_temp_path_is_tagged_and_hidden() {
        let temp = generate_temp_path(Path::new("/locks/a.lock"), "alice@CAD-01.42").unwrap();
        assert_eq!(temp.parent().unwrap(), Path::new("/locks"));
        assert_eq!(
            temp.file_name().unwrap().to_str().unwrap(),
            ".a.lock.alice_CAD_01_42.tmp"
        );
    }

    #[test]
    fn test_distinct_tags_do_not_share_temp_files() {
        let a = generate_temp_path(Path::new("/locks/a.lock"), "alice@cad-01").unwrap();
        let b = generate_temp_path(Path::new("/locks/a.lock"), "bob@cad-02").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_concurrent_writers_to_different_files() {
        let temp_dir = TempDir::new().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let path = temp_dir.path().join(format!("r{}.lock", i));
                let content = format!("content {}", i);
                std::thread::spawn(move || {
                    atomic_write(&path, content.as_bytes(), "w").unwrap();
                    (path, content)
                })
            })
            .collect();

        for handle in handles {
            let (path, expected) = handle.join().unwrap();
            assert_eq!(fs::read_to_string(&path).unwrap(), expected);
        }
    }
}

//! IO Utilities for File Operations
//! Author: kartik4091

use std::{fs, io, path::Path, thread, time::Duration};

use tracing::{debug, warn};

use crate::error::Result;

/// Checks if a path is a regular readable file.
pub fn is_readable_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file())
        .unwrap_or(false)
}

/// Ensures parent directory exists for a file path.
pub fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Deletes a file, retrying with exponential backoff while the filesystem
/// still holds it. Returns whether the file is gone; never fails the caller.
pub fn remove_with_retry(path: &Path, attempts: u32, base_delay: Duration) -> bool {
    for attempt in 0..attempts.max(1) {
        match fs::remove_file(path) {
            Ok(()) => {
                debug!("Removed {}", path.display());
                return true;
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => return true,
            Err(e) => {
                let delay = base_delay * 2u32.saturating_pow(attempt);
                debug!(
                    "Delete of {} failed (attempt {}): {}; retrying in {:?}",
                    path.display(),
                    attempt + 1,
                    e,
                    delay
                );
                thread::sleep(delay);
            }
        }
    }
    warn!("⚠️ Could not delete temporary file {}", path.display());
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_with_retry_deletes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tmp.docx");
        fs::write(&path, b"x").unwrap();
        assert!(remove_with_retry(&path, 3, Duration::from_millis(1)));
        assert!(!path.exists());
        assert!(remove_with_retry(&path, 3, Duration::from_millis(1)));
    }

    #[test]
    fn test_remove_with_retry_gives_up_on_directories() {
        let dir = tempfile::tempdir().unwrap();
        // remove_file refuses directories, standing in for a locked file
        assert!(!remove_with_retry(dir.path(), 2, Duration::from_millis(1)));
        assert!(dir.path().exists());
    }

    #[test]
    fn test_ensure_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a").join("b").join("c.pdf");
        ensure_parent_dir(&path).unwrap();
        assert!(dir.path().join("a").join("b").is_dir());
        assert!(!is_readable_file(&path));
    }
}

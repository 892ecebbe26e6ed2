//! In-memory mock storage

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::platform::error::{PlatformError, Result};
use crate::platform::traits::storage::{DirListing, PathString, StorageInterface};

/// Filesystem backed by an in-memory path-to-bytes map.
///
/// Paths are stored absolute, `/sdcard/...` by default. Directories exist
/// implicitly through the files beneath them.
#[derive(Debug)]
pub struct MockStorage {
    files: Mutex<BTreeMap<String, Vec<u8>>>,
    mounted: bool,
    fail_mount: bool,
}

impl MockStorage {
    pub fn new() -> MockStorage {
        MockStorage {
            files: Mutex::new(BTreeMap::new()),
            mounted: false,
            fail_mount: false,
        }
    }

    /// Seed a file at an absolute path.
    pub fn insert_file(&self, path: &str, contents: &[u8]) {
        self.lock_files()
            .insert(path.to_string(), contents.to_vec());
    }

    /// Make the next `mount` fail with `InitializationFailed`.
    pub fn fail_mount(&mut self) {
        self.fail_mount = true;
    }

    fn lock_files(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, Vec<u8>>> {
        self.files.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Default for MockStorage {
    fn default() -> MockStorage {
        MockStorage::new()
    }
}

impl StorageInterface for MockStorage {
    fn mount(&mut self) -> Result<()> {
        if self.fail_mount {
            self.fail_mount = false;
            return Err(PlatformError::InitializationFailed);
        }
        self.mounted = true;
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn mount_point(&self) -> &str {
        "/sdcard"
    }

    fn list_dir(&self, dir: &str) -> Result<DirListing> {
        if !self.mounted {
            return Err(PlatformError::NotMounted);
        }

        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let mut listing = DirListing::new();
        for path in self.lock_files().keys() {
            let Some(rest) = path.strip_prefix(&prefix) else {
                continue;
            };
            // Direct children only.
            if rest.is_empty() || rest.contains('/') {
                continue;
            }
            let mut name = PathString::new();
            if name.push_str(rest).is_err() {
                continue;
            }
            if listing.push(name).is_err() {
                break;
            }
        }
        Ok(listing)
    }

    fn read_file(&self, path: &str, buf: &mut [u8]) -> Result<usize> {
        if !self.mounted {
            return Err(PlatformError::NotMounted);
        }
        let files = self.lock_files();
        let contents = files.get(path).ok_or(PlatformError::NotFound)?;
        if contents.len() > buf.len() {
            return Err(PlatformError::BufferTooSmall);
        }
        buf[..contents.len()].copy_from_slice(contents);
        Ok(contents.len())
    }

    fn file_exists(&self, path: &str) -> bool {
        self.mounted && self.lock_files().contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_mount() {
        let storage = MockStorage::new();
        storage.insert_file("/sdcard/a.txt", b"a");
        assert_eq!(
            storage.list_dir("/sdcard").unwrap_err(),
            PlatformError::NotMounted
        );
        assert!(!storage.file_exists("/sdcard/a.txt"));
    }

    #[test]
    fn test_mount_failure_injection() {
        let mut storage = MockStorage::new();
        storage.fail_mount();
        assert_eq!(
            storage.mount().unwrap_err(),
            PlatformError::InitializationFailed
        );
        assert!(!storage.is_mounted());
        // Injection is one-shot.
        assert!(storage.mount().is_ok());
        assert!(storage.is_mounted());
    }

    #[test]
    fn test_list_dir_returns_direct_children() {
        let mut storage = MockStorage::new();
        storage.insert_file("/sdcard/music/a.mp3", b"");
        storage.insert_file("/sdcard/music/b.mp3", b"");
        storage.insert_file("/sdcard/music/sub/c.mp3", b"");
        storage.insert_file("/sdcard/other.txt", b"");
        storage.mount().unwrap();

        let listing = storage.list_dir("/sdcard/music").unwrap();
        let names: Vec<&str> = listing.iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["a.mp3", "b.mp3"]);
    }

    #[test]
    fn test_read_file() {
        let mut storage = MockStorage::new();
        storage.insert_file("/sdcard/config/x.txt", b"payload");
        storage.mount().unwrap();

        let mut buf = [0u8; 16];
        let len = storage.read_file("/sdcard/config/x.txt", &mut buf).unwrap();
        assert_eq!(&buf[..len], b"payload");

        let mut small = [0u8; 3];
        assert_eq!(
            storage
                .read_file("/sdcard/config/x.txt", &mut small)
                .unwrap_err(),
            PlatformError::BufferTooSmall
        );
        assert_eq!(
            storage.read_file("/sdcard/missing", &mut buf).unwrap_err(),
            PlatformError::NotFound
        );
    }
}

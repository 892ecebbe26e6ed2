//! Block storage interface
//!
//! Filesystem access over removable media (SD card in the reference
//! hardware). Paths and directory listings use fixed capacities so the
//! media layer never allocates per entry.

use crate::platform::error::Result;

/// Maximum path length in bytes, including the mount point prefix.
pub const MAX_PATH_LEN: usize = 128;

/// Maximum directory entries returned by [`StorageInterface::list_dir`].
pub const MAX_DIR_ENTRIES: usize = 32;

/// Fixed-capacity path.
pub type PathString = heapless::String<MAX_PATH_LEN>;

/// Fixed-capacity directory listing of entry names (not full paths).
pub type DirListing = heapless::Vec<PathString, MAX_DIR_ENTRIES>;

/// Mounted filesystem on removable media.
pub trait StorageInterface {
    /// Mount the filesystem. Idempotent once mounted.
    fn mount(&mut self) -> Result<()>;

    /// True after a successful mount.
    fn is_mounted(&self) -> bool;

    /// Absolute mount point prefix, e.g. `/sdcard`.
    fn mount_point(&self) -> &str;

    /// List entry names in `dir` (an absolute path). Entries beyond
    /// [`MAX_DIR_ENTRIES`] are dropped.
    fn list_dir(&self, dir: &str) -> Result<DirListing>;

    /// Read `path` into `buf`, returning the byte count. Fails with
    /// `BufferTooSmall` when the file does not fit.
    fn read_file(&self, path: &str, buf: &mut [u8]) -> Result<usize>;

    /// True when `path` names an existing file.
    fn file_exists(&self, path: &str) -> bool;
}

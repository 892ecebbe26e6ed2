//! Media library discovery and playback configuration
//!
//! Reads the card layout the deck expects:
//!
//! ```text
//! /sdcard/
//!   music/                    .mp3 files
//!   config/
//!     playback_order.txt      one music/ file name per line, optional
//!     bt_config.txt           speaker MAC as XX:XX:XX:XX:XX:XX, optional
//! ```
//!
//! All lookups go through [`StorageInterface`], so the module is exercised
//! against mock storage and works unchanged on hardware.

use crate::platform::error::{PlatformError, Result};
use crate::platform::traits::storage::{DirListing, PathString, StorageInterface};

/// Directory under the mount point holding the tracks.
pub const MUSIC_DIR: &str = "music";

/// Optional file fixing the playback order.
pub const ORDER_FILE: &str = "config/playback_order.txt";

/// Optional file naming the Bluetooth speaker to pair with.
pub const BT_CONFIG_FILE: &str = "config/bt_config.txt";

const ORDER_FILE_MAX: usize = 4096;

/// Join path segments into a fixed-capacity absolute path.
fn join_path(parts: &[&str]) -> Result<PathString> {
    let mut path = PathString::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 && path.push('/').is_err() {
            return Err(PlatformError::PathTooLong);
        }
        if path.push_str(part).is_err() {
            return Err(PlatformError::PathTooLong);
        }
    }
    Ok(path)
}

/// List the full paths of all `.mp3` files in the music directory,
/// unordered. Entries whose full path exceeds the path capacity are
/// logged and skipped.
pub fn list_media_files<S: StorageInterface>(storage: &S) -> Result<DirListing> {
    let music_dir = join_path(&[storage.mount_point(), MUSIC_DIR])?;
    let entries = storage.list_dir(music_dir.as_str())?;

    let mut files = DirListing::new();
    for entry in &entries {
        if !entry.as_str().ends_with(".mp3") {
            continue;
        }
        let Ok(path) = join_path(&[music_dir.as_str(), entry.as_str()]) else {
            log::warn!("skipping track with over-long path: {}", entry);
            continue;
        };
        if files.push(path).is_err() {
            log::warn!("music directory holds more tracks than the playlist can");
            break;
        }
    }
    Ok(files)
}

/// Resolve the playback order.
///
/// With `config/playback_order.txt` present, returns the listed tracks as
/// full paths in file order, dropping lines that name no existing file.
/// Without it, falls back to the unordered directory listing. Other read
/// errors propagate.
pub fn ordered_media_files<S: StorageInterface>(storage: &S) -> Result<DirListing> {
    let order_path = join_path(&[storage.mount_point(), ORDER_FILE])?;
    // Heap-held: the order file buffer is too large for a task stack
    // frame that already carries directory listings.
    let mut buf = vec![0u8; ORDER_FILE_MAX];
    let len = match storage.read_file(order_path.as_str(), &mut buf) {
        Ok(len) => len,
        Err(PlatformError::NotFound) => {
            log::info!("no playback order file, using directory order");
            return list_media_files(storage);
        }
        Err(err) => return Err(err),
    };

    let Ok(text) = core::str::from_utf8(&buf[..len]) else {
        log::warn!("playback order file is not UTF-8, using directory order");
        return list_media_files(storage);
    };

    let music_dir = join_path(&[storage.mount_point(), MUSIC_DIR])?;
    let mut files = DirListing::new();
    for line in text.lines() {
        let name = line.trim_end_matches('\r').trim();
        if name.is_empty() {
            continue;
        }
        let Ok(path) = join_path(&[music_dir.as_str(), name]) else {
            log::warn!("skipping over-long playback entry: {}", name);
            continue;
        };
        if !storage.file_exists(path.as_str()) {
            log::warn!("playback order names missing track: {}", name);
            continue;
        }
        if files.push(path).is_err() {
            log::warn!("playback order holds more tracks than the playlist can");
            break;
        }
    }
    Ok(files)
}

/// Read the Bluetooth speaker address from `config/bt_config.txt`.
///
/// Expects `XX:XX:XX:XX:XX:XX` hex octets on the first line. Returns
/// `None` when the file is absent or malformed; pairing is optional.
pub fn read_bluetooth_config<S: StorageInterface>(storage: &S) -> Option<[u8; 6]> {
    let path = join_path(&[storage.mount_point(), BT_CONFIG_FILE]).ok()?;
    let mut buf = [0u8; 64];
    let len = match storage.read_file(path.as_str(), &mut buf) {
        Ok(len) => len,
        Err(PlatformError::NotFound) => return None,
        Err(err) => {
            log::warn!("failed to read bluetooth config: {}", err);
            return None;
        }
    };

    let text = core::str::from_utf8(&buf[..len]).ok()?;
    let line = text.lines().next()?.trim();
    parse_mac(line).or_else(|| {
        log::warn!("malformed bluetooth address: {}", line);
        None
    })
}

fn parse_mac(text: &str) -> Option<[u8; 6]> {
    let mut mac = [0u8; 6];
    let mut octets = text.split(':');
    for byte in &mut mac {
        let octet = octets.next()?;
        if octet.len() != 2 {
            return None;
        }
        *byte = u8::from_str_radix(octet, 16).ok()?;
    }
    if octets.next().is_some() {
        return None;
    }
    Some(mac)
}

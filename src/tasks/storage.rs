//! Storage task: mounts the card and builds the playlist
//!
//! Initialization mounts the filesystem and resolves the playback order;
//! a mount failure marks the task done so the supervisor can join it
//! instead of a dead card spinning the loop forever. The periodic step is
//! a health check on the mount.

use std::time::Duration;

use crate::core::task::{MemoryLoad, Priority, Task, TaskConfig, TaskContext};
use crate::media;
use crate::platform::traits::storage::{DirListing, StorageInterface};

/// Task body owning the storage device and the playlist built from it.
pub struct StorageTask<S: StorageInterface + Send> {
    storage: S,
    playlist: DirListing,
    speaker: Option<[u8; 6]>,
}

impl<S: StorageInterface + Send> StorageTask<S> {
    pub fn new(storage: S) -> StorageTask<S> {
        StorageTask {
            storage,
            playlist: DirListing::new(),
            speaker: None,
        }
    }

    /// Standard scheduling for this task: 1s health checks at high
    /// priority. Catalog building keeps whole directory listings in
    /// local frames, so the stack class is the filesystem-sized one.
    pub fn task_config() -> TaskConfig {
        TaskConfig::new("storage", MemoryLoad::Heavy, Priority::High)
            .with_period(Duration::from_secs(1))
    }

    /// Tracks in playback order, as absolute paths.
    pub fn playlist(&self) -> &DirListing {
        &self.playlist
    }

    /// Bluetooth speaker address from the card, when configured.
    pub fn speaker(&self) -> Option<[u8; 6]> {
        self.speaker
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }
}

impl<S: StorageInterface + Send> Task for StorageTask<S> {
    fn initialize(&mut self, ctx: &TaskContext) {
        if let Err(err) = self.storage.mount() {
            log::error!("failed to mount storage: {}", err);
            ctx.mark_done();
            return;
        }

        match media::ordered_media_files(&self.storage) {
            Ok(playlist) => {
                log::info!("playlist holds {} tracks", playlist.len());
                self.playlist = playlist;
            }
            Err(err) => log::error!("failed to build playlist: {}", err),
        }

        self.speaker = media::read_bluetooth_config(&self.storage);
        if let Some(mac) = self.speaker {
            log::info!(
                "bluetooth speaker configured: {:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
                mac[0],
                mac[1],
                mac[2],
                mac[3],
                mac[4],
                mac[5]
            );
        }
    }

    fn step(&mut self, _ctx: &TaskContext) {
        if !self.storage.is_mounted() {
            log::warn!("storage is no longer mounted");
        }
    }
}

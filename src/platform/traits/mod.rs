//! Platform service traits

pub mod network;
pub mod storage;
pub mod watchdog;

pub use network::{AccessPointInterface, ApConfig, AuthMode};
pub use storage::{DirListing, PathString, StorageInterface};
pub use watchdog::{NoopWatchdog, WatchdogInterface};

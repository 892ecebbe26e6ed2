//! Firmware tasks

pub mod net;
pub mod storage;

pub use net::{NetCommand, NetMessage, NetTask};
pub use storage::StorageTask;

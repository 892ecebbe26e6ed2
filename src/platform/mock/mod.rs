//! Mock platform implementations for tests and hardware-free builds

pub mod network;
pub mod storage;
pub mod watchdog;

pub use network::MockAccessPoint;
pub use storage::MockStorage;
pub use watchdog::MockWatchdog;

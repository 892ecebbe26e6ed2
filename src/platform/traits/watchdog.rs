//! Task watchdog interface
//!
//! Tasks subscribe their own thread to the watchdog and must feed it
//! within the supervisor's deadline or the firmware resets. Registration
//! is per calling thread: `register`, `pet`, and `deregister` all act on
//! the thread that invokes them.

/// Per-thread watchdog subscription.
pub trait WatchdogInterface: Send + Sync {
    /// Subscribe the calling thread under `task_name`.
    fn register(&self, task_name: &str);

    /// Reset the calling thread's deadline.
    fn pet(&self);

    /// Remove the calling thread's subscription.
    fn deregister(&self);
}

/// Watchdog that accepts everything and enforces nothing. Used on hosts
/// with no hardware watchdog and in examples.
#[derive(Debug, Default)]
pub struct NoopWatchdog;

impl WatchdogInterface for NoopWatchdog {
    fn register(&self, _task_name: &str) {}
    fn pet(&self) {}
    fn deregister(&self) {}
}

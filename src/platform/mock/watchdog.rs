//! Mock watchdog recording per-thread subscriptions and feeds

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread::{self, ThreadId};

use crate::platform::traits::watchdog::WatchdogInterface;

#[derive(Debug, Default)]
struct Subscription {
    name: String,
    pets: u32,
}

/// Records watchdog traffic per subscribing thread. Pets from threads
/// without a subscription are ignored, matching the hardware watchdog's
/// behavior for unsubscribed tasks.
#[derive(Debug, Default)]
pub struct MockWatchdog {
    subscriptions: Mutex<HashMap<ThreadId, Subscription>>,
    log: Mutex<WatchdogLog>,
}

#[derive(Debug, Default)]
struct WatchdogLog {
    registrations: Vec<String>,
    deregistrations: u32,
    total_pets: u32,
}

impl MockWatchdog {
    pub fn new() -> MockWatchdog {
        MockWatchdog::default()
    }

    /// Task names passed to `register`, in order.
    pub fn registrations(&self) -> Vec<String> {
        self.lock_log().registrations.clone()
    }

    pub fn deregistrations(&self) -> u32 {
        self.lock_log().deregistrations
    }

    /// Pets from subscribed threads, across all subscriptions.
    pub fn total_pets(&self) -> u32 {
        self.lock_log().total_pets
    }

    /// True while any thread holds a subscription.
    pub fn has_subscribers(&self) -> bool {
        !self.lock_subs().is_empty()
    }

    /// Names of the currently subscribed threads, unordered.
    pub fn subscriber_names(&self) -> Vec<String> {
        self.lock_subs().values().map(|s| s.name.clone()).collect()
    }

    fn lock_subs(&self) -> std::sync::MutexGuard<'_, HashMap<ThreadId, Subscription>> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|p| p.into_inner())
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, WatchdogLog> {
        self.log.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl WatchdogInterface for MockWatchdog {
    fn register(&self, task_name: &str) {
        self.lock_subs().insert(
            thread::current().id(),
            Subscription {
                name: task_name.to_string(),
                pets: 0,
            },
        );
        self.lock_log().registrations.push(task_name.to_string());
    }

    fn pet(&self) {
        let mut subs = self.lock_subs();
        if let Some(sub) = subs.get_mut(&thread::current().id()) {
            sub.pets += 1;
            drop(subs);
            self.lock_log().total_pets += 1;
        }
    }

    fn deregister(&self) {
        if self.lock_subs().remove(&thread::current().id()).is_some() {
            self.lock_log().deregistrations += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_records_lifecycle_for_the_calling_thread() {
        let watchdog = MockWatchdog::new();

        watchdog.register("unit");
        assert!(watchdog.has_subscribers());
        assert_eq!(watchdog.subscriber_names(), vec!["unit".to_string()]);
        watchdog.pet();
        watchdog.pet();
        watchdog.deregister();

        assert_eq!(watchdog.registrations(), vec!["unit".to_string()]);
        assert_eq!(watchdog.total_pets(), 2);
        assert_eq!(watchdog.deregistrations(), 1);
        assert!(!watchdog.has_subscribers());
    }

    #[test]
    fn test_ignores_unsubscribed_traffic() {
        let watchdog = MockWatchdog::new();
        watchdog.pet();
        watchdog.deregister();
        assert_eq!(watchdog.total_pets(), 0);
        assert_eq!(watchdog.deregistrations(), 0);
    }
}

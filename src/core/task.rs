//! Supervised task lifecycle wrapper
//!
//! [`ActiveTask`] owns one kernel thread running a [`Task`] body under
//! firmware discipline: named threads with symbolic stack sizes, optional
//! drift-free periodic stepping, watchdog registration for the thread's
//! lifetime, cooperative stop, and a join that keeps feeding the caller's
//! watchdog while it waits. Dropping a joinable `ActiveTask` stops and
//! joins its thread, so a task can never outlive its owner.
//!
//! Bodies implement [`Task`]: `initialize` runs once on the task thread
//! before the loop, `step` runs per iteration. A body signals voluntary
//! completion through [`TaskContext::mark_done`]; the supervisor signals
//! shutdown through [`ActiveTask::request_stop`]. Either one ends the loop
//! at the next iteration boundary.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use mp3_deck::core::task::{
//!     ActiveTask, MemoryLoad, Priority, Task, TaskConfig, TaskContext,
//! };
//! use mp3_deck::platform::traits::watchdog::NoopWatchdog;
//!
//! struct Blink {
//!     remaining: u32,
//! }
//!
//! impl Task for Blink {
//!     fn step(&mut self, ctx: &TaskContext) {
//!         self.remaining -= 1;
//!         if self.remaining == 0 {
//!             ctx.mark_done();
//!         }
//!     }
//! }
//!
//! let config = TaskConfig::new("blink", MemoryLoad::Minimal, Priority::Low)
//!     .with_period(Duration::from_millis(10));
//! let mut task = ActiveTask::new(config, Blink { remaining: 3 }, Arc::new(NoopWatchdog));
//! assert!(task.start());
//! assert!(task.join());
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::platform::traits::watchdog::WatchdogInterface;

/// Maximum task name length in characters.
pub const MAX_TASK_NAME_LEN: usize = 32;

/// Fixed-capacity task name.
pub type TaskName = heapless::String<MAX_TASK_NAME_LEN>;

/// How long `join` waits between watchdog feeds while a task winds down.
const JOIN_WAIT: Duration = Duration::from_millis(500);

/// Symbolic stack sizing. Tasks declare their footprint class instead of a
/// raw byte count so sizes stay consistent across the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryLoad {
    /// Tight loops with little local state.
    Minimal,
    /// Typical control tasks.
    Standard,
    /// Filesystem and parsing workloads.
    Heavy,
}

impl MemoryLoad {
    /// Stack size in bytes for this class.
    pub const fn stack_bytes(self) -> usize {
        match self {
            MemoryLoad::Minimal => 16 * 1024,
            MemoryLoad::Standard => 32 * 1024,
            MemoryLoad::Heavy => 64 * 1024,
        }
    }
}

/// Scheduling priority tiers, mapped to kernel priorities at spawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Priority {
    Low = 1,
    Medium = 3,
    High = 5,
}

/// Core affinity request. Advisory on hosts without pinning support.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorePreference {
    Core0,
    Core1,
    Any,
}

/// Static description of one supervised task.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    pub name: TaskName,
    pub load: MemoryLoad,
    pub priority: Priority,
    pub core: CorePreference,
    /// Step interval. `None` runs the loop back to back.
    pub period: Option<Duration>,
    /// One-shot delay before `initialize`, for tasks that must let other
    /// subsystems come up first.
    pub settle_delay: Option<Duration>,
    /// Detached tasks cannot be joined and are not stopped on drop.
    pub detached: bool,
}

impl TaskConfig {
    /// Describe a joinable, aperiodic task on any core.
    ///
    /// Names longer than [`MAX_TASK_NAME_LEN`] are truncated.
    pub fn new(name: &str, load: MemoryLoad, priority: Priority) -> TaskConfig {
        let mut task_name = TaskName::new();
        for ch in name.chars() {
            if task_name.push(ch).is_err() {
                break;
            }
        }
        TaskConfig {
            name: task_name,
            load,
            priority,
            core: CorePreference::Any,
            period: None,
            settle_delay: None,
            detached: false,
        }
    }

    /// Step every `period`, measured from each scheduled wake rather than
    /// from step completion, so the cadence does not drift.
    pub fn with_period(mut self, period: Duration) -> TaskConfig {
        self.period = Some(period);
        self
    }

    pub fn with_core(mut self, core: CorePreference) -> TaskConfig {
        self.core = core;
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> TaskConfig {
        self.settle_delay = Some(delay);
        self
    }

    /// Run fire-and-forget: `join` reports failure and drop leaves the
    /// thread running.
    pub fn detached(mut self) -> TaskConfig {
        self.detached = true;
        self
    }
}

/// A task body. Both hooks run on the task's own thread.
pub trait Task: Send {
    /// Runs once before the step loop.
    fn initialize(&mut self, _ctx: &TaskContext) {}

    /// Runs each loop iteration.
    fn step(&mut self, ctx: &TaskContext);
}

/// State shared between the supervisor and the task thread.
struct TaskShared {
    /// Supervisor asked the loop to end.
    stop: AtomicBool,
    /// Body declared itself finished.
    done: AtomicBool,
    exit: Mutex<ExitState>,
    exited: Condvar,
}

struct ExitState {
    exited: bool,
    /// The body parks here while no thread is running, and returns here
    /// when the loop ends so `join` can hand it back for restart.
    body: Option<Box<dyn Task>>,
}

/// Handle the task body uses to observe and signal lifecycle state.
pub struct TaskContext {
    shared: Arc<TaskShared>,
}

impl TaskContext {
    /// Declare the body finished. The loop ends at the next iteration
    /// boundary; the flag is one-shot and survives until the task is
    /// joined and restarted.
    pub fn mark_done(&self) {
        self.shared.done.store(true, Ordering::SeqCst);
    }

    /// True once the supervisor has requested a stop.
    pub fn stop_requested(&self) -> bool {
        self.shared.stop.load(Ordering::SeqCst)
    }

    /// Standalone context for exercising a body without a thread.
    #[cfg(any(test, feature = "mock"))]
    pub fn standalone() -> TaskContext {
        TaskContext {
            shared: Arc::new(TaskShared {
                stop: AtomicBool::new(false),
                done: AtomicBool::new(false),
                exit: Mutex::new(ExitState {
                    exited: false,
                    body: None,
                }),
                exited: Condvar::new(),
            }),
        }
    }

    #[cfg(any(test, feature = "mock"))]
    pub fn is_done(&self) -> bool {
        self.shared.done.load(Ordering::SeqCst)
    }
}

/// One supervised kernel thread running a [`Task`] body.
pub struct ActiveTask {
    config: TaskConfig,
    shared: Arc<TaskShared>,
    watchdog: Arc<dyn WatchdogInterface>,
    /// Body parked between runs; `None` while a thread holds it.
    body: Option<Box<dyn Task>>,
    /// The running-state guard: `Some` exactly while a thread is live and
    /// unjoined.
    handle: Option<thread::JoinHandle<()>>,
}

impl ActiveTask {
    /// Wrap `body` under `config`. The thread does not start until
    /// [`start`](ActiveTask::start).
    pub fn new(
        config: TaskConfig,
        body: impl Task + 'static,
        watchdog: Arc<dyn WatchdogInterface>,
    ) -> ActiveTask {
        ActiveTask {
            config,
            shared: Arc::new(TaskShared {
                stop: AtomicBool::new(false),
                done: AtomicBool::new(false),
                exit: Mutex::new(ExitState {
                    exited: false,
                    body: None,
                }),
                exited: Condvar::new(),
            }),
            watchdog,
            body: Some(Box::new(body)),
            handle: None,
        }
    }

    /// Spawn the task thread. Returns false if the task is already running
    /// or the spawn fails; a failed spawn leaves the task startable again.
    pub fn start(&mut self) -> bool {
        if self.handle.is_some() {
            log::warn!("task {} is already running", self.config.name);
            return false;
        }
        let Some(body) = self.body.take() else {
            log::warn!("task {} has no body to run", self.config.name);
            return false;
        };

        // Stage the body where the thread will pick it up; if the spawn
        // fails we can pull it straight back.
        {
            let mut exit = lock_exit(&self.shared);
            exit.exited = false;
            exit.body = Some(body);
        }

        let shared = Arc::clone(&self.shared);
        let watchdog = Arc::clone(&self.watchdog);
        let config = self.config.clone();

        let spawn = thread::Builder::new()
            .name(config.name.as_str().to_string())
            .stack_size(config.load.stack_bytes())
            .spawn(move || task_main(config, shared, watchdog));

        match spawn {
            Ok(handle) => {
                log::info!(
                    "started task {} (stack {} bytes, priority {:?})",
                    self.config.name,
                    self.config.load.stack_bytes(),
                    self.config.priority
                );
                self.handle = Some(handle);
                true
            }
            Err(err) => {
                log::error!("failed to spawn task {}: {}", self.config.name, err);
                let mut exit = lock_exit(&self.shared);
                self.body = exit.body.take();
                false
            }
        }
    }

    /// Ask the loop to end at its next iteration boundary. Does not wait.
    pub fn request_stop(&self) {
        self.shared.stop.store(true, Ordering::SeqCst);
    }

    /// True while a thread is live and unjoined.
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Wait for the task thread to finish and reclaim it.
    ///
    /// Returns true exactly once per run; a second join, a join before
    /// start, or a join on a detached task returns false. While waiting,
    /// the caller's watchdog registration is fed every 500ms so a slow
    /// wind-down cannot trip the supervisor's own deadline.
    pub fn join(&mut self) -> bool {
        if self.config.detached {
            return false;
        }
        let Some(handle) = self.handle.take() else {
            return false;
        };

        let mut exit = lock_exit(&self.shared);
        while !exit.exited {
            let (guard, _) = self
                .shared
                .exited
                .wait_timeout(exit, JOIN_WAIT)
                .unwrap_or_else(|p| p.into_inner());
            exit = guard;
            self.watchdog.pet();
            // A panicking body never reaches the exit handshake.
            if handle.is_finished() {
                break;
            }
        }
        self.body = exit.body.take();
        drop(exit);

        if handle.join().is_err() {
            log::error!("task {} panicked", self.config.name);
        }

        // Clear run state so the body can be started again.
        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.done.store(false, Ordering::SeqCst);
        log::info!("joined task {}", self.config.name);
        true
    }

    pub fn name(&self) -> &str {
        self.config.name.as_str()
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }
}

impl Drop for ActiveTask {
    fn drop(&mut self) {
        if !self.config.detached && self.handle.is_some() {
            log::info!("ending task {}", self.config.name);
            self.request_stop();
            self.join();
        }
    }
}

impl std::fmt::Debug for ActiveTask {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveTask")
            .field("name", &self.config.name)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

fn lock_exit(shared: &TaskShared) -> std::sync::MutexGuard<'_, ExitState> {
    shared.exit.lock().unwrap_or_else(|p| p.into_inner())
}

/// The task thread's whole life: settle, register, initialize, loop, park
/// the body, signal exit, deregister.
fn task_main(config: TaskConfig, shared: Arc<TaskShared>, watchdog: Arc<dyn WatchdogInterface>) {
    let mut body = {
        let mut exit = lock_exit(&shared);
        match exit.body.take() {
            Some(body) => body,
            // Start staged the body before spawning; missing means a bug.
            None => {
                log::error!("task {} started with no body", config.name);
                exit.exited = true;
                shared.exited.notify_all();
                return;
            }
        }
    };

    if let Some(delay) = config.settle_delay {
        thread::sleep(delay);
    }

    watchdog.register(config.name.as_str());

    let ctx = TaskContext {
        shared: Arc::clone(&shared),
    };
    body.initialize(&ctx);
    watchdog.pet();

    let mut next_wake = Instant::now();
    loop {
        if shared.stop.load(Ordering::SeqCst) || shared.done.load(Ordering::SeqCst) {
            break;
        }

        body.step(&ctx);
        watchdog.pet();

        if let Some(period) = config.period {
            next_wake += period;
            let now = Instant::now();
            if next_wake > now {
                thread::sleep(next_wake - now);
            } else if now - next_wake > period {
                // More than a full period behind: resynchronize to now
                // instead of firing a burst of catch-up steps.
                next_wake = now;
            }
        }
    }

    {
        let mut exit = lock_exit(&shared);
        exit.body = Some(body);
        exit.exited = true;
    }
    shared.exited.notify_all();
    watchdog.deregister();
}

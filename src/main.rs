//! Firmware entry point
//!
//! Brings the deck up the way the boot sequence does on hardware: build
//! the shared mailbox, pre-queue the network activation command, start
//! the storage and network tasks, then run until shutdown. On a host
//! build the run window is bounded so the binary exits cleanly.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use mp3_deck::core::mailbox::Mailbox;
use mp3_deck::core::task::ActiveTask;
use mp3_deck::core::timeout::Timeout;
use mp3_deck::platform::mock::{MockAccessPoint, MockStorage};
use mp3_deck::platform::traits::network::ApConfig;
use mp3_deck::platform::traits::watchdog::{NoopWatchdog, WatchdogInterface};
use mp3_deck::tasks::{NetCommand, NetMessage, NetTask, StorageTask};

const NET_MAILBOX_BYTES: usize = 64;
const HOST_RUN_WINDOW: Duration = Duration::from_secs(2);

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    log::info!("mp3-deck firmware core starting");

    let watchdog: Arc<dyn WatchdogInterface> = Arc::new(NoopWatchdog);

    let net_mailbox: Arc<Mailbox<NetMessage>> = Arc::new(Mailbox::new(NET_MAILBOX_BYTES));
    // Queue the activation before the task starts so the access point
    // comes up on the first step.
    if !net_mailbox.send(NetCommand::Activate, Timeout::NO_WAIT) {
        log::error!("failed to queue network activation");
    }

    let storage = MockStorage::new();
    let net = NetTask::new(
        MockAccessPoint::new(),
        Arc::clone(&net_mailbox),
        ApConfig::default(),
    );

    let mut tasks = [
        ActiveTask::new(
            StorageTask::<MockStorage>::task_config(),
            StorageTask::new(storage),
            Arc::clone(&watchdog),
        ),
        ActiveTask::new(
            NetTask::<MockAccessPoint>::task_config(),
            net,
            Arc::clone(&watchdog),
        ),
    ];

    for task in &mut tasks {
        if !task.start() {
            log::error!("task {} failed to start", task.name());
        }
    }

    thread::sleep(HOST_RUN_WINDOW);

    for task in &tasks {
        task.request_stop();
    }
    for task in &mut tasks {
        task.join();
    }

    log::info!("mp3-deck firmware core stopped");
}

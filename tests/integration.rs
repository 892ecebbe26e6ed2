//! End-to-end tests across the task wrapper, the mailbox, and the tasks
//! that use them.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use serial_test::serial;

use mp3_deck::core::mailbox::{Mailbox, Received};
use mp3_deck::core::task::{
    ActiveTask, MemoryLoad, Priority, Task, TaskConfig, TaskContext,
};
use mp3_deck::core::timeout::Timeout;
use mp3_deck::message_set;
use mp3_deck::platform::mock::{MockAccessPoint, MockStorage, MockWatchdog};
use mp3_deck::platform::traits::network::ApConfig;
use mp3_deck::platform::traits::watchdog::{NoopWatchdog, WatchdogInterface};
use mp3_deck::tasks::{NetCommand, NetMessage, NetTask, StorageTask};

message_set! {
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum Telemetry {
        Count(i32),
        Gain(f32),
    }
}

fn recv_telemetry(mailbox: &Mailbox<Telemetry>, timeout: Timeout) -> Option<Telemetry> {
    let handle = mailbox.acquire_recv_handle(timeout)?;
    handle.visit(|received| match received {
        Received::Message(message) => message,
        Received::Blob(_) => panic!("unexpected blob"),
    })
}

#[test]
fn test_mixed_type_stream_preserves_program_order() {
    // A 1KiB mailbox carrying two payload types, fed from two threads
    // that coordinate so the overall send order is deterministic.
    let mailbox: Arc<Mailbox<Telemetry>> = Arc::new(Mailbox::new(1024));

    let int_sender = {
        let mailbox = Arc::clone(&mailbox);
        thread::spawn(move || {
            assert!(mailbox.send(7i32, Timeout::FOREVER));
        })
    };
    int_sender.join().unwrap();

    let float_sender = {
        let mailbox = Arc::clone(&mailbox);
        thread::spawn(move || {
            assert!(mailbox.send(2.5f32, Timeout::FOREVER));
        })
    };
    float_sender.join().unwrap();

    assert_eq!(
        recv_telemetry(&mailbox, Timeout::NO_WAIT),
        Some(Telemetry::Count(7))
    );
    assert_eq!(
        recv_telemetry(&mailbox, Timeout::NO_WAIT),
        Some(Telemetry::Gain(2.5))
    );
    assert!(recv_telemetry(&mailbox, Timeout::NO_WAIT).is_none());
}

#[test]
fn test_multi_producer_streams_stay_ordered_per_producer() {
    let mailbox: Arc<Mailbox<Telemetry>> = Arc::new(Mailbox::new(512));
    let mut producers = Vec::new();

    for base in [0i32, 100, 200] {
        let mailbox = Arc::clone(&mailbox);
        producers.push(thread::spawn(move || {
            for n in 0..25 {
                assert!(mailbox.send(base + n, Timeout::FOREVER));
            }
        }));
    }

    let mut streams = [Vec::new(), Vec::new(), Vec::new()];
    for _ in 0..75 {
        match recv_telemetry(&mailbox, Timeout::from_millis(2000)) {
            Some(Telemetry::Count(n)) => streams[(n / 100) as usize].push(n % 100),
            other => panic!("unexpected record: {:?}", other),
        }
    }

    for producer in producers {
        producer.join().unwrap();
    }
    for stream in &streams {
        assert_eq!(*stream, (0..25).collect::<Vec<_>>());
    }
}

#[test]
fn test_backpressure_blocks_then_releases() {
    // Small mailbox: a blocked producer must make progress once the
    // consumer drains.
    let mailbox: Arc<Mailbox<Telemetry>> = Arc::new(Mailbox::new(64));
    let sent = Arc::new(AtomicU32::new(0));

    let producer = {
        let mailbox = Arc::clone(&mailbox);
        let sent = Arc::clone(&sent);
        thread::spawn(move || {
            for n in 0..50i32 {
                assert!(mailbox.send(n, Timeout::from_millis(5000)));
                sent.fetch_add(1, Ordering::SeqCst);
            }
        })
    };

    thread::sleep(Duration::from_millis(100));
    let stalled = sent.load(Ordering::SeqCst);
    assert!(stalled < 50, "producer never blocked");

    for expected in 0..50 {
        assert_eq!(
            recv_telemetry(&mailbox, Timeout::from_millis(5000)),
            Some(Telemetry::Count(expected))
        );
    }
    producer.join().unwrap();
}

struct Beat {
    ticks: Arc<AtomicU32>,
}

impl Task for Beat {
    fn step(&mut self, _ctx: &TaskContext) {
        self.ticks.fetch_add(1, Ordering::SeqCst);
    }
}

#[test]
fn test_start_guard_and_idempotent_join() {
    let ticks = Arc::new(AtomicU32::new(0));
    let config = TaskConfig::new("beat", MemoryLoad::Minimal, Priority::Low)
        .with_period(Duration::from_millis(10));
    let mut task = ActiveTask::new(
        config,
        Beat {
            ticks: Arc::clone(&ticks),
        },
        Arc::new(NoopWatchdog),
    );

    assert!(!task.join(), "join before start must fail");
    assert!(task.start());
    assert!(!task.start(), "second start must fail while running");

    task.request_stop();
    assert!(task.join());
    assert!(!task.join(), "second join must fail");
}

#[test]
#[serial]
fn test_stop_latency_is_bounded_by_one_period() {
    let period = Duration::from_millis(50);
    let ticks = Arc::new(AtomicU32::new(0));
    let config =
        TaskConfig::new("latency", MemoryLoad::Minimal, Priority::Low).with_period(period);
    let mut task = ActiveTask::new(
        config,
        Beat {
            ticks: Arc::clone(&ticks),
        },
        Arc::new(NoopWatchdog),
    );

    assert!(task.start());
    thread::sleep(Duration::from_millis(120));

    let begin = Instant::now();
    task.request_stop();
    assert!(task.join());
    // One period of sleep plus scheduling slack.
    assert!(begin.elapsed() < period + Duration::from_millis(700));
}

#[test]
fn test_task_threads_feed_the_watchdog() {
    let watchdog = Arc::new(MockWatchdog::new());
    let ticks = Arc::new(AtomicU32::new(0));
    let config = TaskConfig::new("fed", MemoryLoad::Minimal, Priority::Low)
        .with_period(Duration::from_millis(10));
    let mut task = ActiveTask::new(
        config,
        Beat {
            ticks: Arc::clone(&ticks),
        },
        watchdog.clone(),
    );

    assert!(task.start());
    thread::sleep(Duration::from_millis(80));
    task.request_stop();
    assert!(task.join());

    assert_eq!(watchdog.registrations(), vec!["fed".to_string()]);
    assert_eq!(watchdog.deregistrations(), 1);
    assert!(watchdog.total_pets() >= ticks.load(Ordering::SeqCst));
    assert!(!watchdog.has_subscribers());
}

#[test]
fn test_boot_sequence_over_mocks() {
    // Mirrors the boot path: seed the card, queue the activation, start
    // both tasks, then wind everything down and inspect the results.
    let watchdog: Arc<dyn WatchdogInterface> = Arc::new(NoopWatchdog);

    let storage = MockStorage::new();
    storage.insert_file("/sdcard/music/intro.mp3", b"");
    storage.insert_file("/sdcard/music/outro.mp3", b"");
    storage.insert_file(
        "/sdcard/config/playback_order.txt",
        b"outro.mp3\nintro.mp3\n",
    );

    let net_mailbox: Arc<Mailbox<NetMessage>> = Arc::new(Mailbox::new(64));
    assert!(net_mailbox.send(NetCommand::Activate, Timeout::NO_WAIT));

    let storage_body = StorageTask::new(storage);
    let net_body = NetTask::new(
        MockAccessPoint::new(),
        Arc::clone(&net_mailbox),
        ApConfig::default(),
    );

    // Fast cadence so the test finishes quickly.
    let storage_config = TaskConfig::new("storage", MemoryLoad::Heavy, Priority::High)
        .with_period(Duration::from_millis(20));
    let net_config = TaskConfig::new("net", MemoryLoad::Standard, Priority::Low)
        .with_period(Duration::from_millis(20));

    let mut storage_task =
        ActiveTask::new(storage_config, storage_body, Arc::clone(&watchdog));
    let mut net_task = ActiveTask::new(net_config, net_body, Arc::clone(&watchdog));

    assert!(storage_task.start());
    assert!(net_task.start());
    thread::sleep(Duration::from_millis(150));

    storage_task.request_stop();
    net_task.request_stop();
    assert!(storage_task.join());
    assert!(net_task.join());

    // The queued command was consumed.
    assert!(net_mailbox.acquire_recv_handle(Timeout::NO_WAIT).is_none());
}

#[test]
fn test_storage_task_builds_catalog_under_its_configured_stack() {
    // Catalog building holds an order-file buffer plus full directory
    // listings in task-thread frames; run the production configuration
    // end to end so a stack regression aborts this test, not a device.
    let storage = MockStorage::new();
    for n in 0..20 {
        storage.insert_file(&format!("/sdcard/music/track-{:02}.mp3", n), b"");
    }
    storage.insert_file(
        "/sdcard/config/playback_order.txt",
        b"track-19.mp3\ntrack-00.mp3\n",
    );

    let config = StorageTask::<MockStorage>::task_config();
    assert_eq!(config.load, MemoryLoad::Heavy);

    let mut task = ActiveTask::new(config, StorageTask::new(storage), Arc::new(NoopWatchdog));
    assert!(task.start());
    thread::sleep(Duration::from_millis(100));
    task.request_stop();
    assert!(task.join());
}

#[test]
fn test_storage_task_mount_failure_self_terminates() {
    let mut storage = MockStorage::new();
    storage.fail_mount();

    let config = TaskConfig::new("storage", MemoryLoad::Standard, Priority::High)
        .with_period(Duration::from_millis(10));
    let mut task = ActiveTask::new(
        config,
        StorageTask::new(storage),
        Arc::new(NoopWatchdog),
    );

    assert!(task.start());
    // The task marked itself done during initialize; join without a stop.
    assert!(task.join());
}

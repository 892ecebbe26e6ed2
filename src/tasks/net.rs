//! Network task: soft access point lifecycle driven by mailbox commands
//!
//! Each step drains at most one command from the task's mailbox and moves
//! the access point to the commanded state. Commands are idempotent, so a
//! repeated `Activate` on a running access point is a no-op rather than a
//! restart.

use std::sync::Arc;
use std::time::Duration;

use crate::core::mailbox::{Mailbox, Message, Received};
use crate::core::task::{MemoryLoad, Priority, Task, TaskConfig, TaskContext};
use crate::core::timeout::Timeout;
use crate::platform::traits::network::{AccessPointInterface, ApConfig};

/// Status page served while the access point is up.
const INDEX_PAGE: &str = "<html><body><h1>mp3-deck</h1></body></html>";

/// Access point lifecycle command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetCommand {
    Activate,
    Deactivate,
}

impl Message for NetCommand {
    const ENCODED_SIZE: usize = 1;

    fn encode(&self, buf: &mut [u8]) {
        buf[0] = match self {
            NetCommand::Activate => 0,
            NetCommand::Deactivate => 1,
        };
    }

    fn decode(buf: &[u8]) -> Option<Self> {
        match buf {
            [0] => Some(NetCommand::Activate),
            [1] => Some(NetCommand::Deactivate),
            _ => None,
        }
    }
}

crate::message_set! {
    /// Message set carried by the network task's mailbox.
    #[derive(Debug)]
    pub enum NetMessage {
        Command(NetCommand),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ApState {
    Down,
    Up,
}

/// Task body owning the access point.
pub struct NetTask<A: AccessPointInterface + Send> {
    ap: A,
    mailbox: Arc<Mailbox<NetMessage>>,
    config: ApConfig,
    state: ApState,
}

impl<A: AccessPointInterface + Send> NetTask<A> {
    pub fn new(ap: A, mailbox: Arc<Mailbox<NetMessage>>, config: ApConfig) -> NetTask<A> {
        NetTask {
            ap,
            mailbox,
            config,
            state: ApState::Down,
        }
    }

    /// Standard scheduling for this task: 1s command polling at low
    /// priority.
    pub fn task_config() -> TaskConfig {
        TaskConfig::new("net", MemoryLoad::Standard, Priority::Low)
            .with_period(Duration::from_secs(1))
    }

    pub fn access_point(&self) -> &A {
        &self.ap
    }

    fn spin_up(&mut self) {
        if self.state == ApState::Up {
            return;
        }
        match self
            .ap
            .start(&self.config)
            .and_then(|()| self.ap.serve_index(INDEX_PAGE))
        {
            Ok(()) => {
                log::info!(
                    "access point {} up on port {}",
                    self.config.ssid,
                    self.config.port
                );
                self.state = ApState::Up;
            }
            Err(err) => log::error!("failed to start access point: {}", err),
        }
    }

    fn spin_down(&mut self) {
        if self.state == ApState::Down {
            return;
        }
        match self.ap.stop() {
            Ok(()) => {
                log::info!("access point {} down", self.config.ssid);
                self.state = ApState::Down;
            }
            Err(err) => log::error!("failed to stop access point: {}", err),
        }
    }
}

impl<A: AccessPointInterface + Send> Task for NetTask<A> {
    fn step(&mut self, _ctx: &TaskContext) {
        let Some(handle) = self.mailbox.acquire_recv_handle(Timeout::NO_WAIT) else {
            return;
        };
        // Extract the command before acting so the record's space returns
        // to the channel while the radio call runs.
        let command = handle
            .visit(|received| match received {
                Received::Message(NetMessage::Command(command)) => Some(command),
                Received::Blob(_) => None,
            })
            .flatten();
        drop(handle);

        match command {
            Some(NetCommand::Activate) => self.spin_up(),
            Some(NetCommand::Deactivate) => self.spin_down(),
            None => {}
        }
    }
}

//! Firmware core for an ESP32-class MP3 deck
//!
//! Two building blocks carry the whole firmware: supervised tasks
//! ([`crate::core::task`]) that run named, watchdog-fed kernel threads
//! on a fixed cadence, and typed mailboxes ([`crate::core::mailbox`])
//! that move a
//! closed set of message types between them over bounded byte channels.
//! The [`platform`] traits isolate board services so everything above
//! them runs unchanged against mocks, and [`tasks`] wires the deck's
//! storage and network behavior onto the two building blocks.

pub mod core;
pub mod media;
pub mod platform;
pub mod tasks;

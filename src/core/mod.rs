//! Concurrency core: supervised tasks, typed mailboxes, and timeouts

pub mod mailbox;
pub mod task;
pub mod timeout;

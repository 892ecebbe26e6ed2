//! Typed inter-task mailbox over a bounded byte channel
//!
//! A [`Mailbox`] carries the closed set of message types declared with
//! [`message_set!`](crate::message_set) between tasks, framed over the
//! channel in [`ringbuf`]. Every record starts with a fixed header:
//!
//! ```text
//! Record layout (offsets in bytes):
//!
//! +-----+------------------+---------+------------------+
//! | tag | payload length   | padding | payload          |
//! | u8  | usize, native-   | to the  | payload length   |
//! |     | endian           | widest  | bytes            |
//! |     |                  | align   |                  |
//! +-----+------------------+---------+------------------+
//! 0     1                  1+word    header size
//! ```
//!
//! The header is padded so the payload lands at the alignment of the widest
//! member type. Tag [`BLOB_TAG`] marks an untyped byte blob that bypasses
//! the message machinery, for bulk payloads such as audio frames.
//!
//! Typed sends encode in one call; blob producers reserve space with
//! [`Mailbox::acquire_send_handle`], fill it in place, and commit. Readers
//! take a [`RecvHandle`] and dispatch through [`RecvHandle::visit`], and
//! the record's space returns to the channel when the handle drops.
//!
//! # Example
//!
//! ```
//! use mp3_deck::core::mailbox::{Mailbox, Received};
//! use mp3_deck::core::timeout::Timeout;
//!
//! mp3_deck::message_set! {
//!     #[derive(Debug)]
//!     pub enum Reading {
//!         Ticks(u32),
//!         Level(f32),
//!     }
//! }
//!
//! let mailbox: Mailbox<Reading> = Mailbox::new(256);
//! assert!(mailbox.send(7u32, Timeout::NO_WAIT));
//!
//! let handle = mailbox.acquire_recv_handle(Timeout::NO_WAIT).unwrap();
//! handle.visit(|received| match received {
//!     Received::Message(Reading::Ticks(n)) => assert_eq!(n, 7),
//!     other => panic!("unexpected record: {:?}", other),
//! });
//! ```

pub mod message;
pub mod ringbuf;

pub use message::{Message, MessageSet};
pub use ringbuf::RingBuffer;

use std::marker::PhantomData;

use crate::core::timeout::Timeout;
use ringbuf::{align_up, ReadGrant, WriteGrant};

/// Wire tag reserved for untyped byte blobs.
pub const BLOB_TAG: u8 = 255;

/// Typed mailbox over a bounded byte channel.
///
/// Construction cannot fail: a degenerate capacity yields an inert mailbox
/// whose operations all report failure, so a misconfigured task degrades to
/// logged errors instead of aborting the firmware.
pub struct Mailbox<S: MessageSet> {
    ring: Option<RingBuffer>,
    _types: PhantomData<fn() -> S>,
}

impl<S: MessageSet> Mailbox<S> {
    /// Record alignment: the widest member payload, but never narrower than
    /// the length word in the header.
    const ALIGN: usize = if S::MAX_ALIGN > std::mem::align_of::<usize>() {
        S::MAX_ALIGN
    } else {
        std::mem::align_of::<usize>()
    };

    /// Header size: tag byte plus length word, padded to [`Self::ALIGN`].
    const HEADER: usize = align_up(1 + std::mem::size_of::<usize>(), Self::ALIGN);

    /// Create a mailbox with `capacity_bytes` of channel space.
    ///
    /// Capacity covers headers and padding as well as payloads. A capacity
    /// too small for even one header produces an inert mailbox.
    pub fn new(capacity_bytes: usize) -> Mailbox<S> {
        let ring = RingBuffer::new(capacity_bytes, Self::ALIGN);
        if ring.is_none() {
            log::error!(
                "mailbox capacity {} cannot hold any record, mailbox is inert",
                capacity_bytes
            );
        }
        Mailbox {
            ring,
            _types: PhantomData,
        }
    }

    /// True when construction failed and every operation will report
    /// failure.
    pub fn is_inert(&self) -> bool {
        self.ring.is_none()
    }

    /// Encode and enqueue one typed message, blocking up to `timeout` for
    /// space. Returns false on timeout or an inert mailbox; a failed send
    /// leaves no partial record behind.
    pub fn send(&self, message: impl Into<S>, timeout: Timeout) -> bool {
        let message = message.into();
        let Some(ring) = &self.ring else {
            return false;
        };

        let payload_len = message.payload_size();
        let Some(mut grant) = ring.reserve(Self::HEADER + payload_len, timeout) else {
            return false;
        };

        let buf = grant.bytes_mut();
        write_header(buf, Self::HEADER, message.tag(), payload_len);
        message.encode_payload(&mut buf[Self::HEADER..Self::HEADER + payload_len]);
        grant.commit();
        true
    }

    /// Reserve space for an untyped blob of `payload_size` bytes.
    ///
    /// The caller fills [`SendHandle::payload_mut`] in place and commits
    /// (or drops) the handle to publish. Blocks up to `timeout` for space.
    pub fn acquire_send_handle(
        &self,
        payload_size: usize,
        timeout: Timeout,
    ) -> Option<SendHandle<'_>> {
        let ring = self.ring.as_ref()?;
        let mut grant = ring.reserve(Self::HEADER + payload_size, timeout)?;
        write_header(grant.bytes_mut(), Self::HEADER, BLOB_TAG, payload_size);
        Some(SendHandle {
            grant,
            header: Self::HEADER,
        })
    }

    /// Receive the oldest record, blocking up to `timeout`.
    ///
    /// The record's channel space is held until the handle drops.
    pub fn acquire_recv_handle(&self, timeout: Timeout) -> Option<RecvHandle<'_, S>> {
        let ring = self.ring.as_ref()?;
        let grant = ring.receive(timeout)?;

        let Some((tag, payload_len)) = read_header(grant.bytes()) else {
            log::error!("mailbox record shorter than its header, dropping");
            return None;
        };
        if Self::HEADER + payload_len > grant.len() {
            log::error!(
                "mailbox record claims {} payload bytes but holds {}, dropping",
                payload_len,
                grant.len().saturating_sub(Self::HEADER)
            );
            return None;
        }

        Some(RecvHandle {
            grant,
            tag,
            payload_len,
            _types: PhantomData,
        })
    }
}

impl<S: MessageSet> std::fmt::Debug for Mailbox<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox")
            .field("inert", &self.is_inert())
            .finish_non_exhaustive()
    }
}

fn write_header(buf: &mut [u8], header: usize, tag: u8, payload_len: usize) {
    let word = std::mem::size_of::<usize>();
    buf[0] = tag;
    buf[1..1 + word].copy_from_slice(&payload_len.to_ne_bytes());
    for byte in &mut buf[1 + word..header] {
        *byte = 0;
    }
}

fn read_header(buf: &[u8]) -> Option<(u8, usize)> {
    let word = std::mem::size_of::<usize>();
    if buf.len() < 1 + word {
        return None;
    }
    let mut len_bytes = [0u8; std::mem::size_of::<usize>()];
    len_bytes.copy_from_slice(&buf[1..1 + word]);
    Some((buf[0], usize::from_ne_bytes(len_bytes)))
}

/// One dispatched record: either a decoded member of the set or a raw blob.
#[derive(Debug)]
pub enum Received<'a, S> {
    Message(S),
    Blob(&'a [u8]),
}

/// In-place writer for an untyped blob record. Commits on drop.
#[derive(Debug)]
pub struct SendHandle<'a> {
    grant: WriteGrant<'a>,
    header: usize,
}

impl SendHandle<'_> {
    /// Writable payload region, excluding the header.
    pub fn payload_mut(&mut self) -> &mut [u8] {
        let header = self.header;
        &mut self.grant.bytes_mut()[header..]
    }

    /// Payload length in bytes.
    pub fn payload_len(&self) -> usize {
        self.grant.len() - self.header
    }

    /// Publish the blob. Equivalent to dropping the handle.
    pub fn commit(self) {}
}

/// Scoped reader for one received record. The record's channel space
/// returns when this drops.
#[derive(Debug)]
pub struct RecvHandle<'a, S: MessageSet> {
    grant: ReadGrant<'a>,
    tag: u8,
    payload_len: usize,
    _types: PhantomData<fn() -> S>,
}

impl<S: MessageSet> RecvHandle<'_, S> {
    /// True when the record carries an untyped blob.
    pub fn is_blob(&self) -> bool {
        self.tag == BLOB_TAG
    }

    /// Decode the record and hand it to `dispatch`.
    ///
    /// Returns `None` without invoking `dispatch` when the tag is not in
    /// the set or the payload fails to decode; the malformed record is
    /// still consumed when the handle drops.
    pub fn visit<R>(&self, dispatch: impl FnOnce(Received<'_, S>) -> R) -> Option<R> {
        let payload =
            &self.grant.bytes()[Mailbox::<S>::HEADER..Mailbox::<S>::HEADER + self.payload_len];

        if self.tag == BLOB_TAG {
            return Some(dispatch(Received::Blob(payload)));
        }

        match S::decode_payload(self.tag, payload) {
            Some(message) => Some(dispatch(Received::Message(message))),
            None => {
                log::warn!("mailbox record with unknown tag {}, skipping", self.tag);
                None
            }
        }
    }
}

//! Bounded byte channel with two-phase writes
//!
//! Fixed-capacity, thread-safe FIFO over a contiguous byte buffer. Writers
//! reserve a contiguous region, fill it, and commit it; readers receive the
//! next visible record and return its space when done. Both sides block with
//! an explicit [`Timeout`]. Records are never split across the wrap point:
//! when the tail fragment is too small for a reservation the writer skips to
//! offset 0 and the skipped tail is charged against capacity until the
//! record's space is returned.
//!
//! Visibility follows reservation order, gated on commit: a record becomes
//! readable only once it and every earlier reservation have committed. For
//! writers that reserve and commit in one call this is exactly commit order.
//! Space is reclaimed in FIFO order as readers return their grants.
//!
//! All bookkeeping lives under one mutex; the payload bytes live outside it
//! so grants can expose slices without holding the lock. Live grants always
//! reference disjoint regions of the buffer, which is what makes that sound.

use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};
use std::time::Instant;

use crate::core::timeout::Timeout;

/// One reservation's bookkeeping entry.
///
/// `span` is the total capacity charge: the requested length rounded up to
/// the channel alignment, plus any tail bytes skipped to wrap.
#[derive(Debug, Clone, Copy)]
struct Slot {
    id: u64,
    start: usize,
    len: usize,
    span: usize,
    closed: bool,
}

#[derive(Debug)]
struct Inner {
    /// Offset where the next reservation starts.
    write: usize,
    /// Bytes not charged to any live reservation or unreturned record.
    free: usize,
    /// Monotonic grant id source.
    next_id: u64,
    /// Reserved but not yet visible, in reservation order. `closed` here
    /// means committed.
    reserved: VecDeque<Slot>,
    /// Visible and waiting for a reader, in order.
    ready: VecDeque<Slot>,
    /// Received but not yet returned, in order. `closed` here means the
    /// reader dropped its grant; space frees when the front closes.
    reading: VecDeque<Slot>,
}

/// Fixed-capacity byte channel with reserve/commit writes and
/// receive/return reads.
pub struct RingBuffer {
    /// Per-byte cells: grant pointers derive from shared references, so
    /// concurrent disjoint grants never materialize aliasing `&mut`s.
    storage: Box<[UnsafeCell<u8>]>,
    capacity: usize,
    align: usize,
    inner: Mutex<Inner>,
    /// Signaled when space is returned.
    space: Condvar,
    /// Signaled when a record becomes visible.
    records: Condvar,
}

// Grants hand out raw slices into `storage` without holding the lock. This
// is sound because the allocator never produces overlapping live slots and
// every transfer of a region between threads goes through `inner`'s mutex,
// which orders the accesses.
unsafe impl Send for RingBuffer {}
unsafe impl Sync for RingBuffer {}

impl RingBuffer {
    /// Create a channel of `capacity` bytes whose records start at
    /// `align`-multiple offsets.
    ///
    /// Returns `None` for a zero capacity, a capacity smaller than one
    /// aligned record, or an alignment that is not a power of two. Callers
    /// that must stay usable treat `None` as a permanently inert channel.
    pub fn new(capacity: usize, align: usize) -> Option<RingBuffer> {
        if capacity == 0 || align == 0 || !align.is_power_of_two() || capacity < align {
            return None;
        }

        Some(RingBuffer {
            storage: (0..capacity).map(|_| UnsafeCell::new(0u8)).collect(),
            capacity,
            align,
            inner: Mutex::new(Inner {
                write: 0,
                free: capacity,
                next_id: 0,
                reserved: VecDeque::new(),
                ready: VecDeque::new(),
                reading: VecDeque::new(),
            }),
            space: Condvar::new(),
            records: Condvar::new(),
        })
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes currently not held by any reservation or unreturned record.
    pub fn free_bytes(&self) -> usize {
        self.lock().free
    }

    /// Reserve `len` contiguous bytes, blocking up to `timeout` for space.
    ///
    /// The grant is an exclusive lease on the region; it becomes visible to
    /// readers when committed, and dropping the grant commits it. A request
    /// that can never fit (larger than capacity after alignment) fails
    /// immediately regardless of the timeout.
    pub fn reserve(&self, len: usize, timeout: Timeout) -> Option<WriteGrant<'_>> {
        if len == 0 || align_up(len, self.align) > self.capacity {
            return None;
        }

        let padded = align_up(len, self.align);
        let deadline = timeout.deadline_from(Instant::now());
        let mut inner = self.lock();

        loop {
            // An idle ring restarts at the origin; otherwise a request
            // longer than the remaining tail plus the wrap charge could
            // starve with nothing left to free.
            if inner.free == self.capacity {
                inner.write = 0;
            }

            // Place at the write offset, or wrap to 0 when the tail
            // fragment is too small for a contiguous record.
            let (start, span) = if inner.write + padded <= self.capacity {
                (inner.write, padded)
            } else {
                (0, (self.capacity - inner.write) + padded)
            };

            if inner.free >= span {
                inner.free -= span;
                inner.write = (start + padded) % self.capacity;
                let id = inner.next_id;
                inner.next_id += 1;
                inner.reserved.push_back(Slot {
                    id,
                    start,
                    len,
                    span,
                    closed: false,
                });
                return Some(WriteGrant {
                    ring: self,
                    id,
                    start,
                    len,
                });
            }

            inner = match self.wait(inner, &self.space, deadline) {
                Some(guard) => guard,
                None => return None,
            };
        }
    }

    /// Receive the oldest visible record, blocking up to `timeout`.
    ///
    /// The grant's space returns to the channel when it is dropped.
    pub fn receive(&self, timeout: Timeout) -> Option<ReadGrant<'_>> {
        let deadline = timeout.deadline_from(Instant::now());
        let mut inner = self.lock();

        loop {
            if let Some(mut slot) = inner.ready.pop_front() {
                slot.closed = false;
                let grant = ReadGrant {
                    ring: self,
                    id: slot.id,
                    start: slot.start,
                    len: slot.len,
                };
                inner.reading.push_back(slot);
                return Some(grant);
            }

            inner = match self.wait(inner, &self.records, deadline) {
                Some(guard) => guard,
                None => return None,
            };
        }
    }

    /// Mark a reservation committed and publish every leading committed
    /// reservation to readers.
    fn commit(&self, id: u64) {
        let mut inner = self.lock();

        if let Some(slot) = inner.reserved.iter_mut().find(|s| s.id == id) {
            slot.closed = true;
        }

        let mut published = false;
        while inner.reserved.front().is_some_and(|s| s.closed) {
            if let Some(slot) = inner.reserved.pop_front() {
                inner.ready.push_back(slot);
                published = true;
            }
        }

        if published {
            self.records.notify_all();
        }
    }

    /// Return a received record's space, reclaiming in FIFO order.
    fn give_back(&self, id: u64) {
        let mut inner = self.lock();

        if let Some(slot) = inner.reading.iter_mut().find(|s| s.id == id) {
            slot.closed = true;
        }

        let mut freed = false;
        while inner.reading.front().is_some_and(|s| s.closed) {
            if let Some(slot) = inner.reading.pop_front() {
                inner.free += slot.span;
                freed = true;
            }
        }

        if freed {
            self.space.notify_all();
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A poisoning panic can only come from a grant holder; the
        // bookkeeping itself never panics while locked.
        self.inner
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Block on `condvar` until notified or `deadline` passes. Returns the
    /// reacquired guard, or `None` on timeout.
    fn wait<'a>(
        &self,
        guard: MutexGuard<'a, Inner>,
        condvar: &Condvar,
        deadline: Option<Instant>,
    ) -> Option<MutexGuard<'a, Inner>> {
        match deadline {
            None => Some(condvar.wait(guard).unwrap_or_else(|p| p.into_inner())),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                let (guard, _) = condvar
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(|p| p.into_inner());
                Some(guard)
            }
        }
    }

    /// Raw pointer into the payload buffer. Callers must only touch the
    /// region their grant covers.
    fn region_ptr(&self, start: usize) -> *mut u8 {
        self.storage[start].get()
    }
}

impl std::fmt::Debug for RingBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RingBuffer")
            .field("capacity", &self.capacity)
            .field("align", &self.align)
            .finish_non_exhaustive()
    }
}

/// Exclusive lease on a reserved region. Commits on drop, so a reservation
/// can never be leaked uncommitted. Move-only by construction.
#[derive(Debug)]
pub struct WriteGrant<'a> {
    ring: &'a RingBuffer,
    id: u64,
    start: usize,
    len: usize,
}

impl WriteGrant<'_> {
    /// Writable view of the reserved region.
    pub fn bytes_mut(&mut self) -> &mut [u8] {
        // Exclusive: the allocator never hands out overlapping live slots,
        // and &mut self forbids aliasing through this grant.
        unsafe { std::slice::from_raw_parts_mut(self.ring.region_ptr(self.start), self.len) }
    }

    /// Region length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the reservation is empty (never produced by `reserve`).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Commit the region, making it eligible for readers. Equivalent to
    /// dropping the grant; provided for call sites where the handoff should
    /// be visible in the source.
    pub fn commit(self) {}
}

impl Drop for WriteGrant<'_> {
    fn drop(&mut self) {
        self.ring.commit(self.id);
    }
}

/// Read lease on a received record. Returns the record's space on drop.
#[derive(Debug)]
pub struct ReadGrant<'a> {
    ring: &'a RingBuffer,
    id: u64,
    start: usize,
    len: usize,
}

impl ReadGrant<'_> {
    /// Read-only view of the record.
    pub fn bytes(&self) -> &[u8] {
        // The record was committed before it became visible and no writer
        // can touch it until the space is returned.
        unsafe { std::slice::from_raw_parts(self.ring.region_ptr(self.start), self.len) }
    }

    /// Record length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the record is empty (never produced by `receive`).
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Drop for ReadGrant<'_> {
    fn drop(&mut self) {
        self.ring.give_back(self.id);
    }
}

/// Round `value` up to the next multiple of `align` (a power of two).
pub(crate) const fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_rejects_degenerate_construction() {
        assert!(RingBuffer::new(0, 8).is_none());
        assert!(RingBuffer::new(64, 0).is_none());
        assert!(RingBuffer::new(64, 3).is_none());
        assert!(RingBuffer::new(4, 8).is_none());
    }

    #[test]
    fn test_write_then_read_round_trip() {
        let ring = RingBuffer::new(64, 8).unwrap();

        let mut grant = ring.reserve(5, Timeout::NO_WAIT).unwrap();
        grant.bytes_mut().copy_from_slice(b"hello");
        grant.commit();

        let record = ring.receive(Timeout::NO_WAIT).unwrap();
        assert_eq!(record.bytes(), b"hello");
        drop(record);

        assert_eq!(ring.free_bytes(), 64);
    }

    #[test]
    fn test_uncommitted_reservation_is_invisible() {
        let ring = RingBuffer::new(64, 8).unwrap();

        let grant = ring.reserve(8, Timeout::NO_WAIT).unwrap();
        assert!(ring.receive(Timeout::NO_WAIT).is_none());

        drop(grant); // drop commits
        assert!(ring.receive(Timeout::NO_WAIT).is_some());
    }

    #[test]
    fn test_visibility_follows_reservation_order() {
        let ring = RingBuffer::new(64, 8).unwrap();

        let mut first = ring.reserve(1, Timeout::NO_WAIT).unwrap();
        first.bytes_mut()[0] = 1;
        let mut second = ring.reserve(1, Timeout::NO_WAIT).unwrap();
        second.bytes_mut()[0] = 2;

        // Committing the later reservation publishes nothing yet.
        second.commit();
        assert!(ring.receive(Timeout::NO_WAIT).is_none());

        first.commit();
        assert_eq!(ring.receive(Timeout::NO_WAIT).unwrap().bytes(), &[1]);
        assert_eq!(ring.receive(Timeout::NO_WAIT).unwrap().bytes(), &[2]);
    }

    #[test]
    fn test_full_channel_times_out_without_side_effect() {
        let ring = RingBuffer::new(32, 8).unwrap();

        let _held = ring.reserve(32, Timeout::NO_WAIT).unwrap();
        assert!(ring.reserve(8, Timeout::NO_WAIT).is_none());
        assert!(ring.reserve(8, Timeout::from_millis(20)).is_none());
    }

    #[test]
    fn test_oversized_request_fails_fast() {
        let ring = RingBuffer::new(32, 8).unwrap();
        let before = Instant::now();
        assert!(ring.reserve(33, Timeout::FOREVER).is_none());
        assert!(before.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn test_wrap_around_keeps_records_contiguous() {
        let ring = RingBuffer::new(32, 8).unwrap();

        // Fill 24 of 32 bytes, then free the first 16.
        for byte in 0..3u8 {
            let mut grant = ring.reserve(8, Timeout::NO_WAIT).unwrap();
            grant.bytes_mut().fill(byte);
        }
        for _ in 0..2 {
            ring.receive(Timeout::NO_WAIT).unwrap();
        }

        // 16 contiguous bytes only exist by wrapping past the 8-byte tail.
        let mut grant = ring.reserve(16, Timeout::NO_WAIT).unwrap();
        grant.bytes_mut().fill(9);
        drop(grant);

        assert_eq!(ring.receive(Timeout::NO_WAIT).unwrap().bytes(), &[2u8; 8]);
        let wrapped = ring.receive(Timeout::NO_WAIT).unwrap();
        assert_eq!(wrapped.bytes(), &[9u8; 16]);
    }

    #[test]
    fn test_idle_ring_accepts_any_fitting_reservation() {
        let ring = RingBuffer::new(64, 8).unwrap();

        // Leave the write offset at 24 with the ring fully drained.
        let mut grant = ring.reserve(24, Timeout::NO_WAIT).unwrap();
        grant.bytes_mut().fill(1);
        drop(grant);
        drop(ring.receive(Timeout::NO_WAIT).unwrap());
        assert_eq!(ring.free_bytes(), 64);

        // 48 contiguous bytes only exist from the origin; the idle ring
        // must restart there instead of waiting for space forever.
        let mut grant = ring.reserve(48, Timeout::from_millis(400)).unwrap();
        grant.bytes_mut().fill(2);
        drop(grant);
        assert_eq!(ring.receive(Timeout::NO_WAIT).unwrap().bytes(), &[2u8; 48]);
    }

    #[test]
    fn test_space_frees_in_fifo_order() {
        let ring = RingBuffer::new(32, 8).unwrap();

        ring.reserve(8, Timeout::NO_WAIT).unwrap();
        ring.reserve(8, Timeout::NO_WAIT).unwrap();

        let first = ring.receive(Timeout::NO_WAIT).unwrap();
        let second = ring.receive(Timeout::NO_WAIT).unwrap();

        // Returning the newer record first reclaims nothing yet.
        drop(second);
        assert_eq!(ring.free_bytes(), 16);
        drop(first);
        assert_eq!(ring.free_bytes(), 32);
    }

    #[test]
    fn test_blocked_writer_wakes_when_reader_returns() {
        let ring = Arc::new(RingBuffer::new(32, 8).unwrap());
        ring.reserve(32, Timeout::NO_WAIT).unwrap();

        let writer = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let mut grant = ring.reserve(8, Timeout::from_millis(2000)).unwrap();
                grant.bytes_mut().fill(7);
            })
        };

        thread::sleep(Duration::from_millis(50));
        drop(ring.receive(Timeout::NO_WAIT).unwrap());

        writer.join().unwrap();
        assert_eq!(
            ring.receive(Timeout::from_millis(500)).unwrap().bytes(),
            &[7u8; 8]
        );
    }

    #[test]
    fn test_blocked_reader_wakes_on_commit() {
        let ring = Arc::new(RingBuffer::new(64, 8).unwrap());

        let reader = {
            let ring = Arc::clone(&ring);
            thread::spawn(move || {
                let record = ring.receive(Timeout::from_millis(2000)).unwrap();
                record.bytes().to_vec()
            })
        };

        thread::sleep(Duration::from_millis(50));
        let mut grant = ring.reserve(3, Timeout::NO_WAIT).unwrap();
        grant.bytes_mut().copy_from_slice(b"abc");
        drop(grant);

        assert_eq!(reader.join().unwrap(), b"abc");
    }

    #[test]
    fn test_many_producers_preserve_record_integrity() {
        let ring = Arc::new(RingBuffer::new(256, 8).unwrap());
        let mut producers = Vec::new();

        for value in 0..4u8 {
            let ring = Arc::clone(&ring);
            producers.push(thread::spawn(move || {
                for _ in 0..16 {
                    let mut grant = ring.reserve(8, Timeout::FOREVER).unwrap();
                    grant.bytes_mut().fill(value);
                }
            }));
        }

        let mut seen = [0usize; 4];
        for _ in 0..64 {
            let record = ring.receive(Timeout::from_millis(2000)).unwrap();
            let bytes = record.bytes();
            // Never a torn record: all eight bytes from one producer.
            assert!(bytes.iter().all(|b| *b == bytes[0]));
            seen[bytes[0] as usize] += 1;
        }

        for producer in producers {
            producer.join().unwrap();
        }
        assert_eq!(seen, [16, 16, 16, 16]);
    }
}

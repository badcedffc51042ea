//! Bounded lock-free single-producer/single-consumer queue.
//!
//! Capacity is a power of two; indices are masked and one slot stays
//! unused, so a ring of capacity N holds at most N - 1 items. Visibility
//! across threads is established by a release store of the publishing
//! index paired with an acquire load on the other side.
//!
//! # Contract
//!
//! Exactly one thread may push and exactly one thread may pop at any
//! time. The type is `Send`/`Sync` for `T: Send` so both sides can live
//! behind an `Arc`; upholding the single-producer/single-consumer
//! discipline is the caller's responsibility (the engine dedicates one
//! consumer thread per ring and serializes producers with a mutex).

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Index counter on its own cache line so the producer and consumer
/// positions never false-share.
#[repr(align(64))]
struct PaddedIndex(AtomicUsize);

pub struct RingBuffer<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    /// Next slot to pop; written only by the consumer
    head: PaddedIndex,
    /// Next slot to write; written only by the producer
    tail: PaddedIndex,
}

unsafe impl<T: Send> Send for RingBuffer<T> {}
unsafe impl<T: Send> Sync for RingBuffer<T> {}

impl<T> RingBuffer<T> {
    /// Create a ring with the given capacity.
    ///
    /// # Panics
    /// Panics unless `capacity` is a power of two greater than one.
    pub fn with_capacity(capacity: usize) -> Self {
        assert!(
            capacity.is_power_of_two() && capacity > 1,
            "ring capacity must be a power of two greater than one"
        );
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect::<Vec<_>>()
            .into_boxed_slice();
        Self {
            slots,
            mask: capacity - 1,
            head: PaddedIndex(AtomicUsize::new(0)),
            tail: PaddedIndex(AtomicUsize::new(0)),
        }
    }

    /// Append an item if the ring is not full; never blocks.
    ///
    /// On success the item is visible to a subsequent `try_pop`. When the
    /// ring is full the item is handed back in `Err`.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.0.load(Ordering::Relaxed);
        let next = (tail + 1) & self.mask;

        if next == self.head.0.load(Ordering::Acquire) {
            return Err(item); // full
        }

        // SAFETY: slot `tail` is outside the readable region [head, tail),
        // so the consumer will not touch it until the release store below
        // publishes it.
        unsafe {
            (*self.slots[tail].get()).write(item);
        }

        self.tail.0.store(next, Ordering::Release);
        Ok(())
    }

    /// Remove the oldest item if the ring is not empty; never blocks.
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.0.load(Ordering::Relaxed);

        if head == self.tail.0.load(Ordering::Acquire) {
            return None; // empty
        }

        // SAFETY: the acquire load above proved slot `head` was published
        // by the producer, and the producer will not reuse it until the
        // release store below retires it.
        let item = unsafe { (*self.slots[head].get()).assume_init_read() };

        self.head.0.store((head + 1) & self.mask, Ordering::Release);
        Some(item)
    }

    /// Number of items currently queued.
    ///
    /// Approximate under concurrent mutation; exact when quiescent.
    pub fn len(&self) -> usize {
        let head = self.head.0.load(Ordering::Acquire);
        let tail = self.tail.0.load(Ordering::Acquire);
        tail.wrapping_sub(head) & self.mask
    }

    pub fn is_empty(&self) -> bool {
        self.head.0.load(Ordering::Acquire) == self.tail.0.load(Ordering::Acquire)
    }

    pub fn is_full(&self) -> bool {
        let next = (self.tail.0.load(Ordering::Acquire) + 1) & self.mask;
        next == self.head.0.load(Ordering::Acquire)
    }

    /// Total slot count. One slot is reserved, so at most
    /// `capacity() - 1` items fit.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Drain and drop everything currently queued.
    ///
    /// Runs on the consumer side of the contract (it pops).
    pub fn clear(&self) {
        while self.try_pop().is_some() {}
    }
}

impl<T> Drop for RingBuffer<T> {
    fn drop(&mut self) {
        // Remaining items were written but never read out.
        while self.try_pop().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_empty_ring() {
        let ring: RingBuffer<u64> = RingBuffer::with_capacity(8);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    #[should_panic]
    fn test_non_power_of_two_rejected() {
        let _ = RingBuffer::<u64>::with_capacity(6);
    }

    #[test]
    fn test_capacity_boundary() {
        // Capacity 8 means 7 usable slots: the 7th push succeeds, the 8th
        // comes back rejected, and one pop frees a slot again.
        let ring = RingBuffer::with_capacity(8);
        for i in 0..7u64 {
            assert!(ring.try_push(i).is_ok(), "push {} should fit", i);
        }
        assert!(ring.is_full());
        assert_eq!(ring.len(), 7);
        assert_eq!(ring.try_push(7), Err(7));

        assert_eq!(ring.try_pop(), Some(0));
        assert!(ring.try_push(7).is_ok());
        assert!(ring.is_full());
    }

    #[test]
    fn test_fifo_order() {
        let ring = RingBuffer::with_capacity(16);
        for i in 0..10u64 {
            ring.try_push(i).unwrap();
        }
        for i in 0..10u64 {
            assert_eq!(ring.try_pop(), Some(i));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_wraparound() {
        let ring = RingBuffer::with_capacity(4);
        for round in 0..100u64 {
            ring.try_push(round).unwrap();
            ring.try_push(round + 1000).unwrap();
            assert_eq!(ring.try_pop(), Some(round));
            assert_eq!(ring.try_pop(), Some(round + 1000));
        }
        assert!(ring.is_empty());
    }

    #[test]
    fn test_clear() {
        let ring = RingBuffer::with_capacity(8);
        for i in 0..5u64 {
            ring.try_push(i).unwrap();
        }
        ring.clear();
        assert!(ring.is_empty());
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn test_drop_drains_items() {
        // Heap-owning payloads must be dropped with the ring.
        let ring = RingBuffer::with_capacity(8);
        ring.try_push(String::from("left behind")).unwrap();
        ring.try_push(String::from("also left behind")).unwrap();
        drop(ring);
    }

    #[test]
    fn test_spsc_handoff() {
        const COUNT: u64 = 100_000;
        let ring = Arc::new(RingBuffer::with_capacity(1024));

        let producer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                for i in 0..COUNT {
                    loop {
                        if ring.try_push(i).is_ok() {
                            break;
                        }
                        std::hint::spin_loop();
                    }
                }
            })
        };

        let consumer = {
            let ring = Arc::clone(&ring);
            std::thread::spawn(move || {
                let mut expected = 0u64;
                while expected < COUNT {
                    if let Some(value) = ring.try_pop() {
                        assert_eq!(value, expected, "items must arrive in production order");
                        expected += 1;
                    } else {
                        std::hint::spin_loop();
                    }
                }
            })
        };

        producer.join().unwrap();
        consumer.join().unwrap();
        assert!(ring.is_empty());
    }
}

//! A single-producer single-consumer bounded ring buffer.
//!
//! `Ring<T, N>` is the hand-off primitive between pipeline stages. `N` is a
//! const generic capacity that must be a power of two; the buffer is
//! embedded directly in the struct (no heap allocation, no pointer
//! indirection), the same shape as a stack-allocated ring.
//!
//! # Memory ordering
//!
//! Only two atomics participate: `tail` (written by the producer, read by
//! the consumer) and `head` (written by the consumer, read by the
//! producer). The producer stores into a buffer slot with a plain write,
//! then publishes the slot with a `Release` store to `tail`; the consumer's
//! `Acquire` load of `tail` synchronizes with that store, so the slot's
//! contents are visible before the consumer reads them. The symmetric
//! protocol applies to `head`: a slot freed by the consumer is not safe for
//! the producer to reuse until the producer's `Acquire` load of `head`
//! observes the consumer's `Release` store.
//!
//! `head` and `tail` are each wrapped in a 64-byte aligned cache line to
//! prevent false sharing between the producer and consumer cores.
//!
//! Unlike a sequence-number ring that counts pushes without wrapping, this
//! ring wraps indices modulo `N` directly and reserves one slot to
//! disambiguate empty from full: usable capacity is `N - 1`.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::ptr;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Wrapper type that pads its contents to a full cache line, preventing
/// false sharing between producer-owned and consumer-owned fields.
#[repr(align(64))]
struct CacheAligned<T>(T);

impl<T> std::ops::Deref for CacheAligned<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.0
    }
}

const fn assert_power_of_two<const N: usize>() {
    assert!(N >= 2, "Ring capacity must be at least 2");
    assert!(N.is_power_of_two(), "Ring capacity must be a power of 2");
}

/// Bounded SPSC ring buffer with inline, const-generic-sized storage.
///
/// Usable capacity is `N - 1`: one slot is always kept empty so that
/// `head == tail` can mean "empty" without an extra flag.
#[repr(C)]
pub struct Ring<T, const N: usize> {
    /// Producer-owned index (next slot to write).
    tail: CacheAligned<AtomicUsize>,
    /// Consumer-owned index (next slot to read).
    head: CacheAligned<AtomicUsize>,
    buffer: [UnsafeCell<MaybeUninit<T>>; N],
}

// Safety: Ring is Send + Sync as long as T is Send. The single-producer,
// single-consumer protocol plus the acquire/release pairing on head/tail
// ensures the buffer is never accessed by two threads at once.
unsafe impl<T: Send, const N: usize> Send for Ring<T, N> {}
unsafe impl<T: Send, const N: usize> Sync for Ring<T, N> {}

impl<T, const N: usize> Ring<T, N> {
    const MASK: usize = N - 1;

    /// Creates a new, empty ring.
    ///
    /// # Panics
    ///
    /// Panics if `N` is not a power of two, or is less than 2.
    pub fn new() -> Self {
        assert_power_of_two::<N>();
        Self {
            tail: CacheAligned(AtomicUsize::new(0)),
            head: CacheAligned(AtomicUsize::new(0)),
            // SAFETY: an array of `MaybeUninit` does not require its
            // elements to be initialized.
            buffer: unsafe { MaybeUninit::uninit().assume_init() },
        }
    }

    /// Total slot count (usable capacity is one less, see struct docs).
    #[inline]
    pub const fn capacity(&self) -> usize {
        N - 1
    }

    /// Number of items currently queued. Advisory under concurrent access
    /// from the non-owning side, but self-consistent for the owning side.
    #[inline]
    pub fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        Self::distance(head, tail)
    }

    #[inline]
    fn distance(head: usize, tail: usize) -> usize {
        if tail >= head {
            tail - head
        } else {
            N - (head - tail)
        }
    }

    /// Returns true iff `head == tail`.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tail.load(Ordering::Relaxed) == self.head.load(Ordering::Relaxed)
    }

    /// Returns true iff `(tail + 1) mod N == head`.
    #[inline]
    pub fn is_full(&self) -> bool {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Relaxed);
        (tail + 1) & Self::MASK == head
    }

    /// Producer-only. Attempts to enqueue `item`. Never blocks, never
    /// allocates. On failure (ring full) the item is handed back to the
    /// caller untouched.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let next_tail = (tail + 1) & Self::MASK;

        // Acquire pairs with the consumer's Release store to `head` in
        // `try_pop`, so a slot the consumer just freed is visible as free
        // here before we reuse it.
        if next_tail == self.head.load(Ordering::Acquire) {
            return Err(item);
        }

        // SAFETY: `tail` is owned exclusively by the producer; the slot at
        // `tail` is not in [head, tail) so the consumer will not touch it
        // until `tail` advances below.
        unsafe {
            let slot = self.buffer[tail].get();
            ptr::write(slot, MaybeUninit::new(item));
        }

        // Release publishes both the payload write above and the new tail
        // to the consumer's subsequent Acquire load.
        self.tail.store(next_tail, Ordering::Release);
        Ok(())
    }

    /// Consumer-only. Attempts to dequeue the oldest item. Never blocks.
    pub fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);

        // Acquire pairs with the producer's Release store to `tail` in
        // `try_push`, so the payload written there is visible here.
        if head == self.tail.load(Ordering::Acquire) {
            return None;
        }

        // SAFETY: `head` is owned exclusively by the consumer; the slot at
        // `head` is within [head, tail) so it was initialized by the
        // producer and is not being written concurrently.
        let item = unsafe {
            let slot = self.buffer[head].get();
            ptr::read(slot).assume_init()
        };

        let next_head = (head + 1) & Self::MASK;
        // Release publishes the freed slot to the producer's subsequent
        // Acquire load.
        self.head.store(next_head, Ordering::Release);
        Some(item)
    }
}

impl<T, const N: usize> Default for Ring<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, const N: usize> Drop for Ring<T, N> {
    fn drop(&mut self) {
        let head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        let mut idx = head;
        while idx != tail {
            // SAFETY: every slot in [head, tail) was initialized by a
            // completed try_push and not yet consumed.
            unsafe {
                ptr::drop_in_place(self.buffer[idx].get().cast::<T>());
            }
            idx = (idx + 1) & Self::MASK;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_has_no_items() {
        let ring: Ring<u64, 8> = Ring::new();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.len(), 0);
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn push_pop_preserves_fifo_order() {
        let ring: Ring<u64, 8> = Ring::new();
        for i in 0..7 {
            assert!(ring.try_push(i).is_ok());
        }
        for i in 0..7 {
            assert_eq!(ring.try_pop(), Some(i));
        }
        assert_eq!(ring.try_pop(), None);
    }

    #[test]
    fn usable_capacity_is_n_minus_one() {
        let ring: Ring<u64, 4> = Ring::new();
        assert_eq!(ring.capacity(), 3);
        assert!(ring.try_push(1).is_ok());
        assert!(ring.try_push(2).is_ok());
        assert!(ring.try_push(3).is_ok());
        assert!(ring.is_full());
        assert_eq!(ring.len(), 3);

        // The 4th push fails and hands the item back.
        match ring.try_push(4) {
            Ok(()) => panic!("ring should be full"),
            Err(item) => assert_eq!(item, 4),
        }
    }

    #[test]
    fn failed_push_returns_item_for_retry() {
        let ring: Ring<u64, 2> = Ring::new();
        assert!(ring.try_push(10).is_ok());
        let rejected = ring.try_push(20).unwrap_err();
        assert_eq!(rejected, 20);

        // Drop-oldest retry pattern used by the Compute stage.
        assert_eq!(ring.try_pop(), Some(10));
        assert!(ring.try_push(rejected).is_ok());
        assert_eq!(ring.try_pop(), Some(20));
    }

    #[test]
    fn n_equals_two_yields_capacity_one() {
        let ring: Ring<u64, 2> = Ring::new();
        assert_eq!(ring.capacity(), 1);
        assert!(ring.try_push(1).is_ok());
        assert!(ring.is_full());
        assert!(ring.try_push(2).is_err());
        assert_eq!(ring.try_pop(), Some(1));
        assert!(ring.is_empty());
    }

    #[test]
    fn wraps_around_many_times() {
        let ring: Ring<u64, 4> = Ring::new();
        for round in 0..100u64 {
            for i in 0..3 {
                assert!(ring.try_push(round * 3 + i).is_ok());
            }
            for i in 0..3 {
                assert_eq!(ring.try_pop(), Some(round * 3 + i));
            }
        }
    }

    #[test]
    fn drop_runs_destructors_for_queued_items() {
        use std::sync::atomic::AtomicUsize as Counter;
        use std::sync::Arc;

        struct DropCounter(Arc<Counter>);
        impl Drop for DropCounter {
            fn drop(&mut self) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }

        let count = Arc::new(Counter::new(0));
        {
            let ring: Ring<DropCounter, 8> = Ring::new();
            for _ in 0..5 {
                ring.try_push(DropCounter(Arc::clone(&count))).unwrap();
            }
            // 2 popped and dropped immediately, 3 remain queued.
            drop(ring.try_pop());
            drop(ring.try_pop());
        }
        assert_eq!(count.load(Ordering::SeqCst), 5);
    }
}

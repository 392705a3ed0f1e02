//! Triple-buffered frame hand-over between the application and the refresh
//! interrupt.
//!
//! Three frame slots rotate through three roles:
//!
//! - **in use**: scanned out by the refresh interrupt, owned by the consumer
//! - **published**: the most recent complete frame, owned by neither side
//! - **pending**: the producer's scratch slot, owned by the producer
//!
//! The producer fills its pending slot and swaps it with the published slot.
//! At a frame boundary the consumer swaps its in-use slot with the published
//! slot if that holds a frame it has not seen yet. Both swaps are single
//! atomic exchanges, so the three indices always form a permutation of
//! `{0, 1, 2}` and neither side ever reads a slot the other is writing. When
//! the producer publishes faster than frames complete, the newest frame wins
//! and the skipped ones are recycled as pending slots.

use core::cell::UnsafeCell;

use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::frame::DmdFrame;

/// Low bits of `published`: the slot index.
const INDEX: u8 = 0b011;
/// High bit of `published`: set by the producer, cleared by adoption.
const FRESH: u8 = 0b100;

/// Three frames and the indices that hand them between one producer and
/// one consumer without locking.
pub struct FrameStore<const ROWS: usize, const COLS: usize, const NCOLS: usize> {
    slots: [UnsafeCell<DmdFrame<ROWS, COLS, NCOLS>>; 3],
    published: AtomicU8,
    pending: AtomicU8,
    in_use: AtomicU8,
    writer: AtomicBool,
}

// SAFETY: a slot is only ever accessed through the role that owns it, and
// roles are handed over with atomic exchanges. `publish` rejects a second
// concurrent producer; the consumer functions are `unsafe` and require a
// single consumer.
unsafe impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> Sync
    for FrameStore<ROWS, COLS, NCOLS>
{
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> Default
    for FrameStore<ROWS, COLS, NCOLS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> FrameStore<ROWS, COLS, NCOLS> {
    /// Three blank frames. Nothing is published yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            slots: [
                UnsafeCell::new(DmdFrame::new()),
                UnsafeCell::new(DmdFrame::new()),
                UnsafeCell::new(DmdFrame::new()),
            ],
            in_use: AtomicU8::new(0),
            published: AtomicU8::new(1),
            pending: AtomicU8::new(2),
            writer: AtomicBool::new(false),
        }
    }

    /// Publish a copy of `frame`. It is shown from the start of the next
    /// frame the refresh interrupt begins.
    ///
    /// A frame published earlier that has not been adopted yet is
    /// superseded.
    ///
    /// # Panics
    ///
    /// Panics if called while another `publish` on the same store is still
    /// running, e.g. from an interrupt that preempted the producer.
    pub fn publish(&self, frame: &DmdFrame<ROWS, COLS, NCOLS>) {
        let busy = self.writer.swap(true, Ordering::Acquire);
        assert!(!busy, "FrameStore::publish re-entered");

        let pending = self.pending.load(Ordering::Relaxed);
        // SAFETY: the pending slot belongs to the producer, which `writer`
        // makes exclusive.
        unsafe {
            *self.slots[usize::from(pending)].get() = *frame;
        }
        let previous = self.published.swap(pending | FRESH, Ordering::AcqRel);
        self.pending.store(previous & INDEX, Ordering::Relaxed);

        self.writer.store(false, Ordering::Release);
    }

    /// Whether the last published frame has been picked up by the refresh
    /// interrupt. True as well when nothing was ever published.
    #[must_use]
    pub fn is_adopted(&self) -> bool {
        self.published.load(Ordering::Acquire) & FRESH == 0
    }

    /// Run `f` on the frame being scanned out.
    ///
    /// # Safety
    ///
    /// Consumer side: must not run concurrently with [`Self::adopt`] or
    /// another `scan` from a different context.
    pub(crate) unsafe fn scan<R>(&self, f: impl FnOnce(&DmdFrame<ROWS, COLS, NCOLS>) -> R) -> R {
        let in_use = self.in_use.load(Ordering::Relaxed);
        // SAFETY: the in-use slot belongs to the consumer, which the caller
        // guarantees is unique.
        f(unsafe { &*self.slots[usize::from(in_use)].get() })
    }

    /// Take over the published frame if it has not been shown yet. Returns
    /// whether a new frame was adopted.
    ///
    /// # Safety
    ///
    /// Same contract as [`Self::scan`].
    pub(crate) unsafe fn adopt(&self) -> bool {
        if self.published.load(Ordering::Acquire) & FRESH == 0 {
            return false;
        }
        let in_use = self.in_use.load(Ordering::Relaxed);
        let fresh = self.published.swap(in_use, Ordering::AcqRel);
        self.in_use.store(fresh & INDEX, Ordering::Relaxed);
        true
    }

    #[cfg(test)]
    fn roles(&self) -> [u8; 3] {
        [
            self.in_use.load(Ordering::Relaxed),
            self.published.load(Ordering::Relaxed) & INDEX,
            self.pending.load(Ordering::Relaxed),
        ]
    }
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> core::fmt::Debug
    for FrameStore<ROWS, COLS, NCOLS>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FrameStore")
            .field("in_use", &self.in_use.load(Ordering::Relaxed))
            .field("published", &(self.published.load(Ordering::Relaxed) & INDEX))
            .field("adopted", &self.is_adopted())
            .finish_non_exhaustive()
    }
}

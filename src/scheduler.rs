//! Refresh scheduling.
//!
//! One refresh interrupt shows one scan row of one bit-plane. A frame is
//! `NROWS * BITPLANES` interrupts long: all rows of bit-plane 0, then all rows
//! of bit-plane 1 and so on. Each interrupt re-arms the timer with the dwell of
//! the bit-plane it just latched, so the heavier bit-planes stay lit longer.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;

use crate::buffer::FrameStore;
use crate::profile::{ColourMask, DmdPins, PanelProfile};
use crate::IntervalTimer;
use crate::Micros;
use crate::BITPLANES;

/// A position in the refresh sequence.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ScanPosition {
    /// Scan row, `0..NROWS`
    pub row: usize,
    /// Bit-plane, `0..BITPLANES`
    pub bitplane: usize,
}

/// The row and bit-plane the next refresh interrupt will show.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RefreshState<const NROWS: usize> {
    position: ScanPosition,
}

impl<const NROWS: usize> RefreshState<NROWS> {
    /// Start of a frame.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            position: ScanPosition { row: 0, bitplane: 0 },
        }
    }

    /// Position to show next.
    #[must_use]
    pub const fn position(&self) -> ScanPosition {
        self.position
    }

    /// Step to the next position. Returns `true` when this wraps to the start
    /// of a new frame.
    pub fn advance(&mut self) -> bool {
        let position = &mut self.position;
        position.row += 1;
        if position.row < NROWS {
            return false;
        }
        position.row = 0;
        position.bitplane += 1;
        if position.bitplane < BITPLANES {
            return false;
        }
        position.bitplane = 0;
        true
    }
}

/// Everything the refresh interrupt owns: the pins, its timer and the scan
/// position.
pub(crate) struct Scanner<P, T, const NROWS: usize> {
    pub(crate) pins: DmdPins<P>,
    pub(crate) timer: T,
    pub(crate) state: RefreshState<NROWS>,
}

impl<P, T, const NROWS: usize> Scanner<P, T, NROWS>
where
    P: OutputPin<Error = Infallible>,
    T: IntervalTimer,
{
    pub(crate) fn new(pins: DmdPins<P>, timer: T) -> Self {
        Self {
            pins,
            timer,
            state: RefreshState::new(),
        }
    }

    /// Run one refresh interrupt.
    ///
    /// Shows the current position, advances, adopts a newly published frame
    /// if a frame just completed, and re-arms the timer with the dwell of the
    /// row just latched. When `active` is false the timer is left stopped,
    /// the panel is blanked and `None` is returned.
    ///
    /// # Safety
    ///
    /// Must not run concurrently with another consumer of `store`
    /// ([`FrameStore::scan`] and [`FrameStore::adopt`]).
    pub(crate) unsafe fn tick<const ROWS: usize, const COLS: usize, const NCOLS: usize>(
        &mut self,
        store: &FrameStore<ROWS, COLS, NCOLS>,
        profile: &PanelProfile,
        brightness: u8,
        mask: ColourMask,
        active: bool,
    ) -> Option<Micros> {
        self.timer.stop();

        let position = self.state.position();
        let pins = &mut self.pins;
        // SAFETY: forwarded from the caller
        let dwell = unsafe {
            store.scan(|frame| pins.shift_row(frame, position, brightness, mask, profile))
        };

        if self.state.advance() {
            // SAFETY: forwarded from the caller
            unsafe { store.adopt() };
        }

        if active {
            self.timer.start(dwell);
            Some(dwell)
        } else {
            self.pins.blank();
            None
        }
    }
}

//! Row output: serialises one scan row of one bit-plane onto the panel.

use core::convert::Infallible;

use embedded_hal::digital::OutputPin;
use embedded_hal::digital::PinState;

use crate::frame::DmdFrame;
use crate::profile::{ColourMask, DataLines, DmdPins, PanelProfile, Polarity};
use crate::scheduler::ScanPosition;
use crate::Micros;
use crate::BRIGHTNESS_LEVELS;

#[inline(always)]
fn drive<P: OutputPin<Error = Infallible>>(pin: &mut P, high: bool) {
    let Ok(()) = pin.set_state(PinState::from(high));
}

/// First column at which the previous row is blanked for `brightness`.
///
/// This is the first column `c` with `c * BRIGHTNESS_LEVELS / cols >= brightness`,
/// i.e. every second column on a 128 wide panel.
#[inline]
pub(crate) const fn blank_column(brightness: u8, cols: usize) -> usize {
    (brightness as usize * cols).div_ceil(BRIGHTNESS_LEVELS)
}

impl<P: OutputPin<Error = Infallible>> DataLines<P> {
    #[inline(always)]
    fn write(&mut self, upper: bool, lower: bool) {
        drive(&mut self.upper, upper);
        drive(&mut self.lower, lower);
    }
}

impl<P: OutputPin<Error = Infallible>> DmdPins<P> {
    /// Put every line in its idle state with the panel blanked.
    pub(crate) fn reset(&mut self) {
        drive(&mut self.blank, true);
        drive(&mut self.clock, false);
        drive(&mut self.latch, false);
        for line in &mut self.address {
            drive(line, false);
        }
        self.write_data(false, false, ColourMask::default(), Polarity::Normal);
    }

    pub(crate) fn blank(&mut self) {
        drive(&mut self.blank, true);
    }

    #[inline(always)]
    fn write_data(&mut self, upper: bool, lower: bool, mask: ColourMask, polarity: Polarity) {
        let level = |enabled: bool, bit: bool| polarity.level(enabled && bit);
        self.red
            .write(level(mask.red(), upper), level(mask.red(), lower));
        if let Some(green) = &mut self.green {
            green.write(level(mask.green(), upper), level(mask.green(), lower));
        }
        if let Some(blue) = &mut self.blue {
            blue.write(level(mask.blue(), upper), level(mask.blue(), lower));
        }
    }

    /// Shift scan row `position.row` of bit-plane `position.bitplane` into the
    /// panel, then latch it and light it.
    ///
    /// The previously latched row stays lit during the shift until the
    /// brightness column is reached. Returns how long the new row should stay
    /// lit.
    pub(crate) fn shift_row<const ROWS: usize, const COLS: usize, const NCOLS: usize>(
        &mut self,
        frame: &DmdFrame<ROWS, COLS, NCOLS>,
        position: ScanPosition,
        brightness: u8,
        mask: ColourMask,
        profile: &PanelProfile,
    ) -> Micros {
        let ScanPosition { row, bitplane } = position;
        let lower_row = row + ROWS / 2;
        let cutoff = blank_column(brightness, COLS);

        for col in 0..COLS {
            if col == cutoff {
                drive(&mut self.blank, true);
            }
            let upper = frame.plane_bit(col, row, bitplane);
            let lower = frame.plane_bit(col, lower_row, bitplane);
            self.write_data(upper, lower, mask, profile.polarity);
            drive(&mut self.clock, true);
            drive(&mut self.clock, false);
        }
        if cutoff >= COLS {
            drive(&mut self.blank, true);
        }

        for (bit, line) in self.address.iter_mut().enumerate() {
            drive(line, (row >> bit) & 1 == 1);
        }
        drive(&mut self.latch, true);
        drive(&mut self.latch, false);
        drive(&mut self.blank, false);

        profile.dwell(bitplane)
    }
}

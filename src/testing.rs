//! Host-side fakes for pins and timers.
//!
//! [`FakePanel`] models the panel's shift register: it samples the data lines
//! on every rising clock edge and records a [`Latched`] row on every rising
//! latch edge, together with the address and the blank state at that moment.
extern crate std;

use core::cell::{Ref, RefCell};
use core::convert::Infallible;
use std::collections::HashMap;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::digital::{ErrorType, OutputPin};

use crate::profile::{Channels, DataLines, DmdPins};
use crate::{IntervalTimer, Micros};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Half {
    Upper,
    Lower,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum Line {
    Red(Half),
    Green(Half),
    Blue(Half),
    Address(u8),
    Clock,
    Latch,
    Blank,
}

/// Data line levels of one clocked column, `[red, green, blue]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Column {
    pub upper: [bool; 3],
    pub lower: [bool; 3],
}

/// A row as the panel latched it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Latched {
    pub address: u8,
    pub columns: Vec<Column>,
    /// Columns shifted before blank was raised.
    pub blanked_after: Option<usize>,
    pub blank_while_latching: bool,
}

#[derive(Debug, Default)]
pub(crate) struct PanelState {
    levels: HashMap<Line, bool>,
    pub shifted: Vec<Column>,
    pub latches: Vec<Latched>,
    blank_at: Option<usize>,
}

impl PanelState {
    pub fn level(&self, line: Line) -> bool {
        self.levels.get(&line).copied().unwrap_or(false)
    }

    fn sample(&self, half: Half) -> [bool; 3] {
        [
            self.level(Line::Red(half)),
            self.level(Line::Green(half)),
            self.level(Line::Blue(half)),
        ]
    }

    fn address(&self) -> u8 {
        (0..8u8)
            .filter(|bit| self.level(Line::Address(*bit)))
            .fold(0, |acc, bit| acc | (1 << bit))
    }

    fn set(&mut self, line: Line, high: bool) {
        let rising = high && !self.level(line);
        self.levels.insert(line, high);
        if !rising {
            return;
        }
        match line {
            Line::Clock => {
                let column = Column {
                    upper: self.sample(Half::Upper),
                    lower: self.sample(Half::Lower),
                };
                self.shifted.push(column);
            }
            Line::Latch => {
                let latched = Latched {
                    address: self.address(),
                    columns: core::mem::take(&mut self.shifted),
                    blanked_after: self.blank_at.take(),
                    blank_while_latching: self.level(Line::Blank),
                };
                self.latches.push(latched);
            }
            Line::Blank => self.blank_at = Some(self.shifted.len()),
            _ => {}
        }
    }
}

pub(crate) struct FakePin {
    line: Line,
    panel: Rc<RefCell<PanelState>>,
}

impl ErrorType for FakePin {
    type Error = Infallible;
}

impl OutputPin for FakePin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.panel.borrow_mut().set(self.line, false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.panel.borrow_mut().set(self.line, true);
        Ok(())
    }
}

#[derive(Default)]
pub(crate) struct FakePanel {
    state: Rc<RefCell<PanelState>>,
}

impl FakePanel {
    pub fn new() -> Self {
        Self::default()
    }

    fn pin(&self, line: Line) -> FakePin {
        FakePin {
            line,
            panel: Rc::clone(&self.state),
        }
    }

    fn lines(&self, upper: Line, lower: Line) -> DataLines<FakePin> {
        DataLines {
            upper: self.pin(upper),
            lower: self.pin(lower),
        }
    }

    /// Pins for a panel with `channels` wired and address lines A to D.
    pub fn pins(&self, channels: Channels) -> DmdPins<FakePin> {
        let count = channels.count();
        let mut address = heapless::Vec::new();
        for bit in 0..4 {
            if address.push(self.pin(Line::Address(bit))).is_err() {
                unreachable!();
            }
        }
        DmdPins {
            red: self.lines(Line::Red(Half::Upper), Line::Red(Half::Lower)),
            green: (count >= 2)
                .then(|| self.lines(Line::Green(Half::Upper), Line::Green(Half::Lower))),
            blue: (count >= 3)
                .then(|| self.lines(Line::Blue(Half::Upper), Line::Blue(Half::Lower))),
            address,
            clock: self.pin(Line::Clock),
            latch: self.pin(Line::Latch),
            blank: self.pin(Line::Blank),
        }
    }

    pub fn state(&self) -> Ref<'_, PanelState> {
        self.state.borrow()
    }

    pub fn take_latches(&self) -> Vec<Latched> {
        core::mem::take(&mut self.state.borrow_mut().latches)
    }
}

#[derive(Debug, Default)]
pub(crate) struct TimerState {
    pub armed: Option<Micros>,
    pub starts: Vec<Micros>,
    pub stops: usize,
}

/// An interval timer that records how it was driven. Clones share state.
#[derive(Clone, Default)]
pub(crate) struct FakeTimer {
    state: Rc<RefCell<TimerState>>,
}

impl FakeTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> Ref<'_, TimerState> {
        self.state.borrow()
    }

    pub fn armed(&self) -> Option<Micros> {
        self.state.borrow().armed
    }
}

impl IntervalTimer for FakeTimer {
    fn start(&mut self, period: Micros) {
        let mut state = self.state.borrow_mut();
        state.armed = Some(period);
        state.starts.push(period);
    }

    fn stop(&mut self) {
        let mut state = self.state.borrow_mut();
        state.armed = None;
        state.stops += 1;
    }
}

/// A delay that advances the display by one refresh tick per microsecond
/// waited, standing in for the refresh interrupt.
pub(crate) struct TickingDelay<F: FnMut()> {
    pub tick: F,
    pub waited: u32,
}

impl<F: FnMut()> embedded_hal::delay::DelayNs for TickingDelay<F> {
    fn delay_ns(&mut self, ns: u32) {
        for _ in 0..ns.div_ceil(1000) {
            self.waited += 1;
            (self.tick)();
        }
    }

    fn delay_us(&mut self, us: u32) {
        for _ in 0..us {
            self.waited += 1;
            (self.tick)();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fake_panel_records_shift_and_latch() {
        let panel = FakePanel::new();
        let mut pins = panel.pins(Channels::Two);
        assert!(pins.blue.is_none());

        let Ok(()) = pins.red.upper.set_high();
        let Ok(()) = pins.clock.set_high();
        let Ok(()) = pins.clock.set_low();
        let Ok(()) = pins.blank.set_high();
        let Ok(()) = pins.address[1].set_high();
        let Ok(()) = pins.latch.set_high();

        let latches = panel.take_latches();
        assert_eq!(latches.len(), 1);
        assert_eq!(latches[0].address, 2);
        assert_eq!(latches[0].columns[0].upper, [true, false, false]);
        assert_eq!(latches[0].blanked_after, Some(1));
        assert!(latches[0].blank_while_latching);
    }

    #[test]
    fn test_fake_timer_shares_state() {
        let timer = FakeTimer::new();
        let mut handle = timer.clone();
        handle.start(Micros::micros(30));
        assert_eq!(timer.armed(), Some(Micros::micros(30)));
        handle.stop();
        assert_eq!(timer.armed(), None);
        assert_eq!(timer.state().stops, 1);
    }
}

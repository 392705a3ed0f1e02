//! Colour selection and the automatic colour cycle.
//!
//! The colour value is written from two places: the application through
//! [`Dmd::set_colour`](crate::Dmd::set_colour) and the colour-cycle interrupt.
//! The `cycling` flag names the single writer of the effective colour. A
//! manual colour clears it before touching anything else, and the cycle tick
//! only writes while it is set.

use core::cell::RefCell;

use critical_section::Mutex;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::profile::{ColourMask, PanelProfile};
use crate::IntervalTimer;

/// The colour the cycle shows after `current` on a panel whose largest
/// colour value is `max`.
///
/// The cycle runs through `1..max`, skipping colour 0 and the auto value.
pub(crate) const fn next_cycle_colour(current: u8, max: u8) -> u8 {
    if current == 0 || current + 1 >= max {
        1
    } else {
        current + 1
    }
}

pub(crate) struct ColourControl<T> {
    /// What `set_colour` last accepted, possibly the auto value.
    requested: AtomicU8,
    /// What the panel shows.
    effective: AtomicU8,
    cycling: AtomicBool,
    timer: Mutex<RefCell<Option<T>>>,
}

impl<T: IntervalTimer> ColourControl<T> {
    pub(crate) const fn new() -> Self {
        Self {
            requested: AtomicU8::new(0),
            effective: AtomicU8::new(0),
            cycling: AtomicBool::new(false),
            timer: Mutex::new(RefCell::new(None)),
        }
    }

    /// Install the colour-cycle timer, stopping and dropping a previous one.
    ///
    /// A running cycle ends with its timer; call [`Self::revalidate`]
    /// afterwards to resume the requested colour on the new timer.
    pub(crate) fn bind(&self, timer: T) {
        self.cycling.store(false, Ordering::Release);
        critical_section::with(|cs| {
            let previous = self.timer.borrow_ref_mut(cs).replace(timer);
            if let Some(mut previous) = previous {
                previous.stop();
            }
        });
    }

    pub(crate) fn requested(&self) -> u8 {
        self.requested.load(Ordering::Acquire)
    }

    pub(crate) fn effective(&self) -> u8 {
        self.effective.load(Ordering::Acquire)
    }

    pub(crate) fn is_cycling(&self) -> bool {
        self.cycling.load(Ordering::Acquire)
    }

    /// Channels to drive right now.
    pub(crate) fn mask(&self, profile: &PanelProfile) -> ColourMask {
        ColourMask::new(self.effective(), profile.channels)
    }

    /// Select `value`. Returns `false` and changes nothing when `value` is
    /// above the profile's largest colour.
    pub(crate) fn set(&self, value: u8, profile: &PanelProfile) -> bool {
        if value > profile.max_colour() {
            #[cfg(feature = "defmt")]
            defmt::warn!(
                "colour {} rejected, panel accepts 0..={}",
                value,
                profile.max_colour()
            );
            return false;
        }

        if profile.auto_colour() == Some(value) {
            self.requested.store(value, Ordering::Release);
            if !self.cycling.swap(true, Ordering::AcqRel) {
                self.with_timer(|timer| timer.start(profile.colour_cycle_period));
                #[cfg(feature = "defmt")]
                defmt::info!("colour cycle started");
            }
        } else {
            if self.cycling.swap(false, Ordering::AcqRel) {
                self.with_timer(T::stop);
                #[cfg(feature = "defmt")]
                defmt::info!("colour cycle stopped");
            }
            self.effective.store(value, Ordering::Release);
            self.requested.store(value, Ordering::Release);
        }
        true
    }

    /// Re-apply the requested colour under a new profile, falling back to
    /// colour 0 when the profile no longer accepts it.
    pub(crate) fn revalidate(&self, profile: &PanelProfile) {
        if !self.set(self.requested(), profile) {
            self.set(0, profile);
        }
        // the shown colour may be outside the new cycle
        if self.is_cycling() && self.effective() >= profile.max_colour() {
            self.effective.store(1, Ordering::Release);
        }
    }

    /// Colour-cycle interrupt: show the next colour while cycling.
    pub(crate) fn tick(&self, profile: &PanelProfile) {
        if !self.cycling.load(Ordering::Acquire) {
            return;
        }
        let next = next_cycle_colour(self.effective(), profile.max_colour());
        self.effective.store(next, Ordering::Release);
    }

    fn with_timer(&self, f: impl FnOnce(&mut T)) {
        critical_section::with(|cs| {
            if let Some(timer) = self.timer.borrow_ref_mut(cs).as_mut() {
                f(timer);
            }
        });
    }
}

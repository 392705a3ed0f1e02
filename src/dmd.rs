//! The display context shared by the application and the two interrupts.

use core::cell::{Cell, RefCell};
use core::convert::Infallible;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

use crate::buffer::FrameStore;
use crate::colour::ColourControl;
use crate::frame::DmdFrame;
use crate::profile::{DmdPins, PanelProfile, Polarity};
use crate::scheduler::{ScanPosition, Scanner};
use crate::Error;
use crate::IntervalTimer;
use crate::Micros;
use crate::Result;
use crate::MAX_ADDRESS_LINES;
use crate::MAX_BRIGHTNESS;

/// Delay before the first refresh interrupt after [`Dmd::start`].
const FIRST_TICK: Micros = Micros::micros(1);

/// A scanned dot-matrix display.
///
/// `Dmd` owns the frame buffers and, once [initialised](Self::initialise),
/// the panel pins and both timers. All methods take `&self`, so it can be
/// placed in a `static` and shared between the application and the
/// interrupt handlers.
///
/// # Type Parameters
/// - `P`: Output pin type of the panel connector
/// - `T`: Interval timer type for the refresh and colour-cycle interrupts
/// - `ROWS`: Number of dot rows (panel height)
/// - `COLS`: Number of dot columns (panel width)
/// - `NROWS`: Number of scan rows, see [`compute_rows`](crate::compute_rows)
/// - `NCOLS`: Number of packed bytes per row, see
///   [`compute_packed_cols`](crate::compute_packed_cols)
pub struct Dmd<
    P,
    T,
    const ROWS: usize,
    const COLS: usize,
    const NROWS: usize,
    const NCOLS: usize,
> {
    store: FrameStore<ROWS, COLS, NCOLS>,
    scanner: Mutex<RefCell<Option<Scanner<P, T, NROWS>>>>,
    colour: ColourControl<T>,
    profile: Mutex<Cell<PanelProfile>>,
    brightness: AtomicU8,
    active: AtomicBool,
}

impl<P, T, const ROWS: usize, const COLS: usize, const NROWS: usize, const NCOLS: usize> Default
    for Dmd<P, T, ROWS, COLS, NROWS, NCOLS>
where
    P: OutputPin<Error = Infallible>,
    T: IntervalTimer,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<P, T, const ROWS: usize, const COLS: usize, const NROWS: usize, const NCOLS: usize>
    Dmd<P, T, ROWS, COLS, NROWS, NCOLS>
where
    P: OutputPin<Error = Infallible>,
    T: IntervalTimer,
{
    /// An uninitialised display with blank frames, brightness 0 and colour 0.
    #[must_use]
    pub const fn new() -> Self {
        const {
            assert!(NROWS * 2 == ROWS, "NROWS must be compute_rows(ROWS)");
            assert!(
                NROWS <= 1 << MAX_ADDRESS_LINES,
                "too many scan rows for the address lines"
            );
        }
        Self {
            store: FrameStore::new(),
            scanner: Mutex::new(RefCell::new(None)),
            colour: ColourControl::new(),
            profile: Mutex::new(Cell::new(PanelProfile::HUB75)),
            brightness: AtomicU8::new(0),
            active: AtomicBool::new(false),
        }
    }

    /// Take ownership of the panel pins and timers.
    ///
    /// The pins are checked against `profile`, set to idle and the panel is
    /// blanked. Refreshing begins with [`Self::start`]. Initialising again
    /// stops the refresh and releases the previous pins and timers.
    ///
    /// The colour selected earlier is kept when `profile` accepts it and
    /// reset to 0 otherwise.
    ///
    /// # Errors
    ///
    /// [`Error::MissingColourLines`] or [`Error::TooFewAddressLines`] when
    /// `pins` cannot drive the panel described by `profile`. Nothing changes
    /// in that case.
    pub fn initialise(
        &self,
        pins: DmdPins<P>,
        refresh_timer: T,
        colour_timer: T,
        profile: PanelProfile,
    ) -> Result<()> {
        pins.check(&profile, NROWS)?;

        let mut pins = pins;
        pins.reset();
        self.active.store(false, Ordering::Release);
        critical_section::with(|cs| {
            self.profile.borrow(cs).set(profile);
            let scanner = Scanner::new(pins, refresh_timer);
            if let Some(mut previous) = self.scanner.borrow_ref_mut(cs).replace(scanner) {
                previous.timer.stop();
                previous.pins.blank();
            }
        });
        self.colour.bind(colour_timer);
        self.colour.revalidate(&profile);

        #[cfg(feature = "defmt")]
        defmt::info!(
            "dmd initialised: {}x{}, {} scan rows, {}",
            COLS,
            ROWS,
            NROWS,
            profile
        );
        Ok(())
    }

    /// Begin refreshing. Does nothing when already running.
    ///
    /// # Errors
    ///
    /// [`Error::NotInitialised`] before [`Self::initialise`].
    pub fn start(&self) -> Result<()> {
        critical_section::with(|cs| -> Result<()> {
            let mut scanner = self.scanner.borrow_ref_mut(cs);
            let scanner = scanner.as_mut().ok_or(Error::NotInitialised)?;
            if !self.active.swap(true, Ordering::AcqRel) {
                scanner.timer.start(FIRST_TICK);
            }
            Ok(())
        })?;

        #[cfg(feature = "defmt")]
        defmt::info!("dmd started");
        Ok(())
    }

    /// Stop refreshing.
    ///
    /// The refresh interrupt already scheduled still runs; it blanks the
    /// panel instead of re-arming its timer.
    pub fn stop(&self) {
        self.active.store(false, Ordering::Release);

        #[cfg(feature = "defmt")]
        defmt::info!("dmd stopped");
    }

    /// Whether the refresh interrupt keeps re-arming itself.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Set the brightness, `0..=63`. Returns `false` and keeps the current
    /// value when `brightness` is out of range.
    ///
    /// Brightness shortens how long each latched row stays lit: the row is
    /// blanked once that fraction of the next row has been shifted in.
    pub fn set_brightness(&self, brightness: u8) -> bool {
        if brightness > MAX_BRIGHTNESS {
            #[cfg(feature = "defmt")]
            defmt::warn!("brightness {} rejected", brightness);
            return false;
        }
        self.brightness.store(brightness, Ordering::Relaxed);
        true
    }

    /// Current brightness.
    #[must_use]
    pub fn brightness(&self) -> u8 {
        self.brightness.load(Ordering::Relaxed)
    }

    /// Select the colour, `0..=profile.max_colour()`.
    ///
    /// Colour `v` drives the channels whose bits are set in `v + 1`, see
    /// [`ColourMask`](crate::ColourMask). The panel's
    /// [auto colour](PanelProfile::auto_colour) starts the colour cycle; any
    /// other value stops it. Returns `false` and changes nothing when
    /// `colour` is out of range.
    pub fn set_colour(&self, colour: u8) -> bool {
        self.colour.set(colour, &self.profile())
    }

    /// The colour last selected with [`Self::set_colour`].
    ///
    /// While cycling this is the auto colour, not the colour shown.
    #[must_use]
    pub fn colour(&self) -> u8 {
        self.colour.requested()
    }

    /// Switch the data line polarity of the current profile.
    pub fn set_panel_variant(&self, polarity: Polarity) {
        critical_section::with(|cs| {
            let profile = self.profile.borrow(cs);
            profile.set(profile.get().with_polarity(polarity));
        });

        #[cfg(feature = "defmt")]
        defmt::info!("panel polarity {}", polarity);
    }

    /// The active panel profile.
    #[must_use]
    pub fn profile(&self) -> PanelProfile {
        critical_section::with(|cs| self.profile.borrow(cs).get())
    }

    /// Publish `frame`. It is shown from the next frame boundary on.
    ///
    /// # Panics
    ///
    /// Panics when called from an interrupt that preempted another
    /// `set_frame`.
    pub fn set_frame(&self, frame: &DmdFrame<ROWS, COLS, NCOLS>) {
        self.store.publish(frame);
    }

    /// Whether the refresh has started showing the last published frame.
    #[must_use]
    pub fn is_synced(&self) -> bool {
        self.store.is_adopted()
    }

    /// Wait until the refresh has started showing the last published frame,
    /// polling every microsecond.
    ///
    /// With `Some(timeout)`, gives up after roughly that long and returns
    /// `false`. With `None`, waits for as long as it takes; this never
    /// returns if the display is stopped with a frame pending.
    ///
    /// Must not be called from the refresh interrupt or any interrupt that
    /// blocks it.
    pub fn wait_sync(&self, delay: &mut impl DelayNs, timeout: Option<Micros>) -> bool {
        let mut remaining = timeout.map(|timeout| timeout.ticks());
        while !self.is_synced() {
            match remaining.as_mut() {
                Some(0) => return false,
                Some(left) => *left -= 1,
                None => {}
            }
            delay.delay_us(1);
        }
        true
    }

    /// The row and bit-plane the next refresh interrupt shows, or `None`
    /// before [`Self::initialise`].
    #[must_use]
    pub fn position(&self) -> Option<ScanPosition> {
        critical_section::with(|cs| {
            self.scanner
                .borrow_ref(cs)
                .as_ref()
                .map(|scanner| scanner.state.position())
        })
    }

    /// Body of the refresh interrupt handler.
    ///
    /// Returns the period the refresh timer was re-armed with, or `None` when
    /// the display is stopped or not initialised.
    pub fn on_refresh_tick(&self) -> Option<Micros> {
        critical_section::with(|cs| {
            let profile = self.profile.borrow(cs).get();
            let mut scanner = self.scanner.borrow_ref_mut(cs);
            let scanner = scanner.as_mut()?;
            let brightness = self.brightness.load(Ordering::Relaxed);
            let mask = self.colour.mask(&profile);
            let active = self.active.load(Ordering::Acquire);
            // SAFETY: the store's only consumer is the scanner, which lives
            // behind the mutex held here.
            unsafe { scanner.tick(&self.store, &profile, brightness, mask, active) }
        })
    }

    /// Body of the colour-cycle interrupt handler.
    pub fn on_colour_tick(&self) {
        self.colour.tick(&self.profile());
    }
}

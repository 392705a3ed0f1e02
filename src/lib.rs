//! Interrupt-driven refresh engine for scanned dot-matrix LED panels.
//!
//! ## How Scanned Dot-Matrix Panels Work
//!
//! HUB75 (and the older single-colour HUB08) panels are scanned,
//! time-multiplexed displays that behave like a long shift register rather
//! than a random-access framebuffer. The LED drivers can only switch a dot
//! fully on or fully off.
//!
//! ### Signal names
//! - **R1 G1 B1 / R2 G2 B2** – Serial colour data for the upper and lower halves of the active scan line
//! - **CLK** – Shift-register clock; every rising edge pushes the data bits one dot along
//! - **LAT / STB** – Latch; copies the shift-register contents to the LED drivers for the row currently selected by the address lines
//! - **OE / EN** – Output enable (active LOW): dots are lit while it is LOW and blanked when it is HIGH. This crate calls it `blank`
//! - **A B C D (E)** – Row-address select lines (choose which pair of rows is lit)
//!
//! ### Row-pair scanning
//! A 32-row panel is wired as two 16-row halves sharing one set of address
//! lines, so every scan row lights dot row `r` and dot row `r + 16` at the
//! same time. One refresh pass therefore consists of 16 scan rows:
//! 1. While row pair N − 1 is still lit, the data for row pair N is clocked in.
//! 2. Part-way through the shift, `blank` is raised. How early this happens is the
//!    [brightness](Dmd::set_brightness) setting: a later cut-off keeps row pair N − 1 lit for longer.
//! 3. After the last column, the address lines select row pair N, LAT is pulsed and `blank` is dropped.
//! 4. Row pair N stays lit until the next timer interrupt repeats the sequence.
//!
//! ### Intensity by weighted bit-planes
//! Each dot stores a 4-bit intensity (0–15). The engine makes four passes over
//! the panel per frame, one per bit of the intensity, and holds each pass
//! visible for a different dwell time. The canonical schedule is
//! `[1, 2, 30, 45]` µs for bit-planes 0..=3; the eye integrates the on-time of
//! the passes in which a dot's bit is set. The ratios are part of the
//! panel's look and are reproduced exactly.
//!
//! ## Architecture
//!
//! - [`DmdFrame`] – the content the application composes (supports `embedded-graphics`)
//! - [`PanelProfile`] and [`DmdPins`] – what the panel is and how it is wired
//! - [`Dmd`] – the application context: the triple-buffered [`FrameStore`], the
//!   scanner driven from the refresh interrupt, brightness and colour state
//!
//! The [`Dmd`] has a `const` constructor and is meant to live in a `static`.
//! Two interrupt handlers call into it: [`Dmd::on_refresh_tick`] from the
//! refresh timer and [`Dmd::on_colour_tick`] from the colour-cycle timer.
//! Foreground code publishes frames with [`Dmd::set_frame`] and may pace
//! itself with [`Dmd::wait_sync`].
//!
//! ```rust,ignore
//! use hub75_dmd::{Dmd128x32, DmdPins, Frame128x32, PanelProfile};
//!
//! static DMD: Dmd128x32<Output<'static>, Pit> = Dmd128x32::new();
//!
//! #[interrupt]
//! fn PIT_CHANNEL0() {
//!     DMD.on_refresh_tick();
//! }
//!
//! #[interrupt]
//! fn PIT_CHANNEL1() {
//!     DMD.on_colour_tick();
//! }
//!
//! fn main() -> ! {
//!     let pins: DmdPins<Output<'static>> = board_pins();
//!     DMD.initialise(pins, pit0, pit1, PanelProfile::HUB75).unwrap();
//!     DMD.start().unwrap();
//!
//!     let mut frame = Frame128x32::new();
//!     loop {
//!         compose(&mut frame);
//!         DMD.wait_sync(&mut delay, None);
//!         DMD.set_frame(&frame);
//!     }
//! }
//! ```
//!
//! ## Available Feature Flags
//!
//! ### `defmt` Feature
//! Implements `defmt::Format` for the public data types and logs foreground
//! lifecycle events (initialise, start, stop, colour mode changes). Nothing is
//! logged from the refresh interrupt.
#![no_std]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]

pub mod buffer;
mod colour;
mod dmd;
pub mod frame;
pub mod profile;
mod row;
pub mod scheduler;
#[cfg(test)]
mod testing;

pub use buffer::FrameStore;
pub use dmd::Dmd;
pub use frame::DmdFrame;
pub use profile::{Channels, ColourMask, DataLines, DmdPins, PanelProfile, Polarity};
pub use scheduler::ScanPosition;

/// Time values used for dwell times and timer periods.
pub type Micros = fugit::MicrosDurationU32;

/// Number of bit-planes, i.e. bits of intensity per dot.
pub const BITPLANES: usize = 4;

/// Highest dot intensity.
pub const MAX_INTENSITY: u8 = (1 << BITPLANES) - 1;

/// Number of brightness steps.
pub const BRIGHTNESS_LEVELS: usize = 64;

/// Highest accepted brightness.
pub const MAX_BRIGHTNESS: u8 = (BRIGHTNESS_LEVELS - 1) as u8;

/// Most row-address lines a panel can have (A to E).
pub const MAX_ADDRESS_LINES: usize = 5;

/// A 128 × 32 frame, the canonical panel size.
pub type Frame128x32 = DmdFrame<32, 128, 64>;

/// A display driving a 128 × 32 panel.
pub type Dmd128x32<P, T> = Dmd<P, T, 32, 128, 16, 64>;

/// Computes the NROWS value (scan rows) from ROWS
///
/// # Arguments
///
/// * `rows` - Total number of dot rows in the display
///
/// # Returns
///
/// Number of scan rows; two dot rows are lit per scan row
#[must_use]
pub const fn compute_rows(rows: usize) -> usize {
    rows / 2
}

/// Computes the NCOLS value (packed bytes per row) from COLS
///
/// # Arguments
///
/// * `cols` - Number of dot columns in the display
///
/// # Returns
///
/// Number of bytes per row; two 4-bit dots share a byte
#[must_use]
pub const fn compute_packed_cols(cols: usize) -> usize {
    cols / 2
}

/// A hardware interval timer that calls an interrupt handler every `period`.
///
/// The refresh engine uses one for the refresh interrupt, which it stops and
/// restarts with a new period on every tick, and one for the colour cycle.
pub trait IntervalTimer {
    /// (Re)start the timer so that its interrupt fires every `period`.
    fn start(&mut self, period: Micros);

    /// Stop the timer. No further interrupts fire until the next `start`.
    fn stop(&mut self);
}

/// Errors reported while setting up the display.
///
/// Range violations (brightness, colour) are not errors; those setters
/// return `false` and leave the state unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display, derive_more::Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The profile uses more colour channels than data lines were supplied for.
    #[display("profile uses {channels} colour channels but only {provided} are wired")]
    MissingColourLines {
        /// Channels the profile needs
        channels: u8,
        /// Channels with data lines present
        provided: u8,
    },
    /// The address lines cannot select every scan row.
    #[display("{scan_rows} scan rows need {needed} address lines, {provided} given")]
    TooFewAddressLines {
        /// Scan rows of the panel
        scan_rows: usize,
        /// Address lines required
        needed: usize,
        /// Address lines supplied
        provided: usize,
    },
    /// The display was used before [`Dmd::initialise`].
    #[display("display not initialised")]
    NotInitialised,
}

/// Result type used by this crate.
pub type Result<T, E = Error> = core::result::Result<T, E>;

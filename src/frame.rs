//! In-memory frame content for a dot-matrix panel.
//!
//! A [`DmdFrame`] is a fixed `COLS × ROWS` grid of 4-bit intensities
//! (0 = dark, 15 = full). Frames are what the application composes and hands
//! to [`Dmd::set_frame`](crate::Dmd::set_frame); the refresh engine copies
//! them by value into its own buffers and never aliases the caller's frame.
//!
//! # Storage
//! Two neighbouring columns share one byte, so a 128 × 32
//! frame occupies 2 KiB. The packing is an internal detail: every accessor
//! works in logical `(x, y)` dot coordinates.
//!
//! # Drawing
//! `DmdFrame` implements the `embedded-graphics`
//! [`DrawTarget`](embedded_graphics::draw_target::DrawTarget) trait with
//! [`Gray4`] as its colour, so fonts, images and primitives can be rendered
//! straight into a frame:
//!
//! ```rust
//! use embedded_graphics::pixelcolor::Gray4;
//! use embedded_graphics::prelude::*;
//! use embedded_graphics::primitives::{PrimitiveStyle, Rectangle};
//! use hub75_dmd::Frame128x32;
//!
//! let mut frame = Frame128x32::new();
//!
//! Rectangle::new(Point::new(4, 4), Size::new(20, 8))
//!     .into_styled(PrimitiveStyle::with_fill(Gray4::new(9)))
//!     .draw(&mut frame)
//!     .unwrap();
//!
//! assert_eq!(frame.dot(10, 6), 9);
//! assert_eq!(frame.dot(0, 0), 0);
//! ```

use core::convert::Infallible;

use bitfield::bitfield;
use embedded_graphics::pixelcolor::Gray4;
use embedded_graphics::pixelcolor::GrayColor;
use embedded_graphics::prelude::OriginDimensions;
use embedded_graphics::prelude::Size;

use crate::MAX_INTENSITY;

bitfield! {
    /// One byte holding the intensities of two horizontally adjacent dots.
    ///
    /// The bit layout is as follows:
    /// - Bits 7-4: Intensity of the odd column
    /// - Bits 3-0: Intensity of the even column
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    struct Dots(u8);
    impl Debug;
    pub u8, even, set_even: 3, 0;
    pub u8, odd, set_odd: 7, 4;
}

impl Dots {
    pub const fn new() -> Self {
        Self(0)
    }

    /// Both dots set to the same intensity.
    pub const fn splat(value: u8) -> Self {
        let value = value & MAX_INTENSITY;
        Self(value << 4 | value)
    }

    fn get(self, x: usize) -> u8 {
        if x & 1 == 0 {
            self.even()
        } else {
            self.odd()
        }
    }

    fn set(&mut self, x: usize, value: u8) {
        if x & 1 == 0 {
            self.set_even(value);
        } else {
            self.set_odd(value);
        }
    }
}

/// A `COLS × ROWS` grid of 4-bit dot intensities.
///
/// # Type Parameters
/// - `ROWS`: Number of dot rows (panel height)
/// - `COLS`: Number of dot columns (panel width)
/// - `NCOLS`: Number of packed bytes per row, see
///   [`compute_packed_cols`](crate::compute_packed_cols)
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct DmdFrame<const ROWS: usize, const COLS: usize, const NCOLS: usize> {
    dots: [[Dots; NCOLS]; ROWS],
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> Default
    for DmdFrame<ROWS, COLS, NCOLS>
{
    fn default() -> Self {
        Self::new()
    }
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> DmdFrame<ROWS, COLS, NCOLS> {
    /// Create a frame with every dot dark.
    /// # Example
    /// ```rust
    /// use hub75_dmd::{DmdFrame, compute_packed_cols};
    ///
    /// const ROWS: usize = 32;
    /// const COLS: usize = 128;
    /// const NCOLS: usize = compute_packed_cols(COLS);
    ///
    /// let frame = DmdFrame::<ROWS, COLS, NCOLS>::new();
    /// assert_eq!(frame.dot(5, 5), 0);
    /// ```
    #[must_use]
    pub const fn new() -> Self {
        const {
            assert!(COLS % 2 == 0, "COLS must be even");
            assert!(NCOLS * 2 == COLS, "NCOLS must be compute_packed_cols(COLS)");
        }
        Self {
            dots: [[Dots::new(); NCOLS]; ROWS],
        }
    }

    /// Set every dot to `value` (masked to 4 bits).
    pub fn clear(&mut self, value: u8) {
        let fill = Dots::splat(value);
        for row in &mut self.dots {
            row.fill(fill);
        }
    }

    /// Intensity of the dot at `(x, y)`, or 0 when the coordinate is outside
    /// the frame.
    #[must_use]
    pub fn dot(&self, x: i32, y: i32) -> u8 {
        match Self::index(x, y) {
            Some((x, y)) => self.dots[y][x / 2].get(x),
            None => 0,
        }
    }

    /// Set the dot at `(x, y)` to `value` (masked to 4 bits). Coordinates
    /// outside the frame are ignored.
    pub fn set_dot(&mut self, x: i32, y: i32, value: u8) {
        if let Some((x, y)) = Self::index(x, y) {
            self.dots[y][x / 2].set(x, value & MAX_INTENSITY);
        }
    }

    /// Whether bit `bitplane` of the dot at column `x`, row `y` is set.
    ///
    /// Callers guarantee `x < COLS` and `y < ROWS`.
    #[inline]
    pub(crate) fn plane_bit(&self, x: usize, y: usize, bitplane: usize) -> bool {
        self.dots[y][x / 2].get(x) & (1 << bitplane) != 0
    }

    fn index(x: i32, y: i32) -> Option<(usize, usize)> {
        if x < 0 || y < 0 {
            return None;
        }
        let (x, y) = (x as usize, y as usize);
        if x >= COLS || y >= ROWS {
            return None;
        }
        Some((x, y))
    }
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> OriginDimensions
    for DmdFrame<ROWS, COLS, NCOLS>
{
    fn size(&self) -> Size {
        Size::new(COLS as u32, ROWS as u32)
    }
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize>
    embedded_graphics::draw_target::DrawTarget for DmdFrame<ROWS, COLS, NCOLS>
{
    type Color = Gray4;

    type Error = Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = embedded_graphics::Pixel<Self::Color>>,
    {
        for pixel in pixels {
            self.set_dot(pixel.0.x, pixel.0.y, pixel.1.luma());
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        DmdFrame::clear(self, color.luma());
        Ok(())
    }
}

impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> core::fmt::Debug
    for DmdFrame<ROWS, COLS, NCOLS>
{
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let lit = self
            .dots
            .iter()
            .flatten()
            .map(|dots| u32::from(dots.even() != 0) + u32::from(dots.odd() != 0))
            .sum::<u32>();
        f.debug_struct("DmdFrame")
            .field("cols", &COLS)
            .field("rows", &ROWS)
            .field("size", &core::mem::size_of_val(&self.dots))
            .field("lit", &lit)
            .finish()
    }
}

#[cfg(feature = "defmt")]
impl<const ROWS: usize, const COLS: usize, const NCOLS: usize> defmt::Format
    for DmdFrame<ROWS, COLS, NCOLS>
{
    fn format(&self, f: defmt::Formatter) {
        defmt::write!(f, "DmdFrame<{}, {}, {}>", ROWS, COLS, NCOLS);
        defmt::write!(f, " size: {}", core::mem::size_of_val(&self.dots));
    }
}

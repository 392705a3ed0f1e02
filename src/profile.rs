//! Panel profiles and pin roles.
//!
//! A [`PanelProfile`] describes what the attached panel can do: how many
//! colour channels it has, whether its data lines are active high or active
//! low, the bit-plane dwell schedule and the colour-cycle period. Geometry is
//! fixed at compile time by the const parameters of [`Dmd`](crate::Dmd).
//!
//! [`DmdPins`] binds the logical signal roles to output pins.

use heapless::Vec;

use crate::Micros;
use crate::BITPLANES;
use crate::MAX_ADDRESS_LINES;
use bitfield::bitfield;

/// Canonical bit-plane dwell schedule.
pub const CANONICAL_SCHEDULE: [Micros; BITPLANES] = [
    Micros::micros(1),
    Micros::micros(2),
    Micros::micros(30),
    Micros::micros(45),
];

/// Canonical period of the automatic colour cycle.
pub const COLOUR_CYCLE_PERIOD: Micros = Micros::secs(60);

/// Number of colour channels a panel has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Channels {
    /// Red only
    One = 1,
    /// Red and green
    Two = 2,
    /// Red, green and blue
    Three = 3,
}

impl Channels {
    /// Number of channels.
    #[must_use]
    pub const fn count(self) -> u8 {
        self as u8
    }

    /// Largest valid colour value, `2^count - 1`.
    #[must_use]
    pub const fn max_colour(self) -> u8 {
        (1 << self.count()) - 1
    }
}

/// The electrical sense of the data lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Polarity {
    /// A high data bit lights the dot.
    #[default]
    Normal,
    /// A low data bit lights the dot.
    Inverted,
}

impl Polarity {
    /// Line level that shows `lit` on this panel.
    #[inline]
    #[must_use]
    pub const fn level(self, lit: bool) -> bool {
        match self {
            Polarity::Normal => lit,
            Polarity::Inverted => !lit,
        }
    }
}

bitfield! {
    /// The colour channels driven for a colour value.
    ///
    /// Colour value `v` enables the channels whose bits are set in `v + 1`,
    /// limited to the channels the panel has:
    ///
    /// | value | 0 | 1 | 2 | 3 | 4 | 5 | 6 | 7 |
    /// |-------|---|---|---|---|---|---|---|---|
    /// | mask  | R | G | RG | B | RB | GB | RGB | off |
    ///
    /// The bit layout is as follows:
    /// - Bit 2: Blue
    /// - Bit 1: Green
    /// - Bit 0: Red
    #[derive(Clone, Copy, Default, PartialEq, Eq)]
    #[repr(transparent)]
    pub struct ColourMask(u8);
    impl Debug;
    /// Red channel enabled
    pub red, _: 0;
    /// Green channel enabled
    pub green, _: 1;
    /// Blue channel enabled
    pub blue, _: 2;
}

impl ColourMask {
    /// Channels enabled by colour `value` on a panel with `channels`.
    #[must_use]
    pub const fn new(value: u8, channels: Channels) -> Self {
        Self(value.wrapping_add(1) & channels.max_colour())
    }

    /// No channel enabled.
    #[must_use]
    pub const fn is_off(self) -> bool {
        self.0 == 0
    }
}

/// Static description of a panel.
///
/// # Example
/// ```rust
/// use hub75_dmd::{Channels, PanelProfile, Polarity};
///
/// let profile = PanelProfile::new(Channels::Two).with_polarity(Polarity::Inverted);
/// assert_eq!(profile.max_colour(), 3);
/// assert_eq!(profile.auto_colour(), Some(3));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PanelProfile {
    /// Colour channels wired on the panel.
    pub channels: Channels,
    /// Sense of the data lines.
    pub polarity: Polarity,
    /// Dwell time of each bit-plane pass, indexed by bit-plane.
    pub schedule: [Micros; BITPLANES],
    /// How long each colour is shown in auto-cycle mode.
    pub colour_cycle_period: Micros,
}

impl Default for PanelProfile {
    fn default() -> Self {
        Self::HUB75
    }
}

impl PanelProfile {
    /// Full-colour HUB75 panel with active-high data.
    pub const HUB75: Self = Self::new(Channels::Three);

    /// Single-colour HUB08 module. These light a dot when the data line is low.
    pub const HUB08: Self = Self::new(Channels::One).with_polarity(Polarity::Inverted);

    /// Profile for a panel with `channels`, normal polarity and the canonical
    /// timing.
    #[must_use]
    pub const fn new(channels: Channels) -> Self {
        Self {
            channels,
            polarity: Polarity::Normal,
            schedule: CANONICAL_SCHEDULE,
            colour_cycle_period: COLOUR_CYCLE_PERIOD,
        }
    }

    /// Same profile with another polarity.
    #[must_use]
    pub const fn with_polarity(mut self, polarity: Polarity) -> Self {
        self.polarity = polarity;
        self
    }

    /// Same profile with another bit-plane schedule.
    #[must_use]
    pub const fn with_schedule(mut self, schedule: [Micros; BITPLANES]) -> Self {
        self.schedule = schedule;
        self
    }

    /// Same profile with another colour-cycle period.
    #[must_use]
    pub const fn with_colour_cycle_period(mut self, period: Micros) -> Self {
        self.colour_cycle_period = period;
        self
    }

    /// Largest colour value accepted by [`Dmd::set_colour`](crate::Dmd::set_colour).
    #[must_use]
    pub const fn max_colour(&self) -> u8 {
        self.channels.max_colour()
    }

    /// The colour value that selects automatic colour cycling, if this panel
    /// has colours to cycle through.
    ///
    /// The cycle visits `1..max_colour()`, so a single-channel panel has no
    /// auto mode and its top value is an ordinary colour.
    #[must_use]
    pub const fn auto_colour(&self) -> Option<u8> {
        let max = self.max_colour();
        if max >= 3 {
            Some(max)
        } else {
            None
        }
    }

    /// Dwell time of `bitplane`.
    #[inline]
    #[must_use]
    pub fn dwell(&self, bitplane: usize) -> Micros {
        self.schedule[bitplane]
    }
}

/// Upper and lower half data lines of one colour channel.
pub struct DataLines<P> {
    /// Drives dot row `r` of scan row `r`
    pub upper: P,
    /// Drives dot row `r + NROWS` of scan row `r`
    pub lower: P,
}

/// Pin roles of the panel connector.
///
/// Colour channels beyond the profile's channel count may be left as `None`.
/// Address line `i` carries bit `i` of the scan row (A = bit 0).
pub struct DmdPins<P> {
    /// R1 / R2
    pub red: DataLines<P>,
    /// G1 / G2
    pub green: Option<DataLines<P>>,
    /// B1 / B2
    pub blue: Option<DataLines<P>>,
    /// A, B, C, D, E
    pub address: Vec<P, MAX_ADDRESS_LINES>,
    /// CLK
    pub clock: P,
    /// LAT / STB
    pub latch: P,
    /// OE / EN (high blanks the panel)
    pub blank: P,
}

impl<P> DmdPins<P> {
    /// Number of colour channels with data lines present, counting from red.
    #[must_use]
    pub fn wired_channels(&self) -> u8 {
        match (&self.green, &self.blue) {
            (None, _) => 1,
            (Some(_), None) => 2,
            (Some(_), Some(_)) => 3,
        }
    }

    pub(crate) fn check(&self, profile: &PanelProfile, scan_rows: usize) -> crate::Result<()> {
        let provided = self.wired_channels();
        if provided < profile.channels.count() {
            return Err(crate::Error::MissingColourLines {
                channels: profile.channels.count(),
                provided,
            });
        }
        let needed = address_lines_for(scan_rows);
        if self.address.len() < needed {
            return Err(crate::Error::TooFewAddressLines {
                scan_rows,
                needed,
                provided: self.address.len(),
            });
        }
        Ok(())
    }
}

/// Address lines needed to select `scan_rows` rows.
pub(crate) const fn address_lines_for(scan_rows: usize) -> usize {
    if scan_rows <= 1 {
        0
    } else {
        (usize::BITS - (scan_rows - 1).leading_zeros()) as usize
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use std::format;

    use super::*;
    use crate::testing::FakePanel;
    use crate::Error;

    #[test]
    fn test_channels() {
        assert_eq!(Channels::One.count(), 1);
        assert_eq!(Channels::Two.count(), 2);
        assert_eq!(Channels::Three.count(), 3);

        assert_eq!(Channels::One.max_colour(), 1);
        assert_eq!(Channels::Two.max_colour(), 3);
        assert_eq!(Channels::Three.max_colour(), 7);
    }

    #[test]
    fn test_polarity_level() {
        assert!(Polarity::Normal.level(true));
        assert!(!Polarity::Normal.level(false));
        assert!(!Polarity::Inverted.level(true));
        assert!(Polarity::Inverted.level(false));
        assert_eq!(Polarity::default(), Polarity::Normal);
    }

    #[test]
    fn test_colour_mask_three_channels() {
        let expected = [
            (false, false, false), // placeholder for value 7
            (true, false, false),
            (false, true, false),
            (true, true, false),
            (false, false, true),
            (true, false, true),
            (false, true, true),
            (true, true, true),
        ];
        for value in 0..=7u8 {
            let mask = ColourMask::new(value, Channels::Three);
            let (r, g, b) = expected[usize::from((value + 1) % 8)];
            assert_eq!((mask.red(), mask.green(), mask.blue()), (r, g, b), "value {value}");
        }
        assert!(ColourMask::new(7, Channels::Three).is_off());
    }

    #[test]
    fn test_colour_mask_limited_by_channels() {
        // 2 + 1 = 0b011 but the panel has red only
        let mask = ColourMask::new(2, Channels::One);
        assert!(mask.red());
        assert!(!mask.green());

        assert!(ColourMask::new(0, Channels::One).red());
        assert!(ColourMask::new(1, Channels::One).is_off());

        // 5 + 1 = 0b110, blue is not wired
        let mask = ColourMask::new(5, Channels::Two);
        assert!(!mask.red());
        assert!(mask.green());
        assert!(!mask.blue());
    }

    #[test]
    fn test_colour_mask_debug() {
        let debug_string = format!("{:?}", ColourMask::new(6, Channels::Three));
        assert!(debug_string.contains("ColourMask"));
    }

    #[test]
    fn test_profile_constants() {
        let hub75 = PanelProfile::HUB75;
        assert_eq!(hub75.channels, Channels::Three);
        assert_eq!(hub75.polarity, Polarity::Normal);
        assert_eq!(hub75.schedule, CANONICAL_SCHEDULE);
        assert_eq!(hub75.colour_cycle_period, Micros::secs(60));
        assert_eq!(PanelProfile::default(), hub75);

        let hub08 = PanelProfile::HUB08;
        assert_eq!(hub08.channels, Channels::One);
        assert_eq!(hub08.polarity, Polarity::Inverted);
    }

    #[test]
    fn test_canonical_schedule() {
        let ticks = CANONICAL_SCHEDULE.map(|dwell| dwell.ticks());
        assert_eq!(ticks, [1, 2, 30, 45]);
    }

    #[test]
    fn test_profile_builders() {
        let schedule = [
            Micros::micros(2),
            Micros::micros(4),
            Micros::micros(8),
            Micros::micros(16),
        ];
        let profile = PanelProfile::new(Channels::Two)
            .with_polarity(Polarity::Inverted)
            .with_schedule(schedule)
            .with_colour_cycle_period(Micros::millis(500));
        assert_eq!(profile.polarity, Polarity::Inverted);
        assert_eq!(profile.dwell(3), Micros::micros(16));
        assert_eq!(profile.colour_cycle_period, Micros::millis(500));
    }

    #[test]
    fn test_auto_colour_depends_on_channels() {
        assert_eq!(PanelProfile::new(Channels::One).auto_colour(), None);
        assert_eq!(PanelProfile::new(Channels::Two).auto_colour(), Some(3));
        assert_eq!(PanelProfile::new(Channels::Three).auto_colour(), Some(7));
    }

    #[test]
    fn test_address_lines_for() {
        assert_eq!(address_lines_for(1), 0);
        assert_eq!(address_lines_for(2), 1);
        assert_eq!(address_lines_for(8), 3);
        assert_eq!(address_lines_for(16), 4);
        assert_eq!(address_lines_for(17), 5);
        assert_eq!(address_lines_for(32), 5);
    }

    #[test]
    fn test_pins_check() {
        let panel = FakePanel::new();

        let pins = panel.pins(Channels::Three);
        assert_eq!(pins.wired_channels(), 3);
        assert!(pins.check(&PanelProfile::HUB75, 16).is_ok());

        let pins = panel.pins(Channels::One);
        assert_eq!(pins.wired_channels(), 1);
        assert!(pins.check(&PanelProfile::HUB08, 16).is_ok());
        assert_eq!(
            pins.check(&PanelProfile::HUB75, 16),
            Err(Error::MissingColourLines {
                channels: 3,
                provided: 1
            })
        );

        let mut pins = panel.pins(Channels::Three);
        pins.address.pop();
        assert_eq!(
            pins.check(&PanelProfile::HUB75, 16),
            Err(Error::TooFewAddressLines {
                scan_rows: 16,
                needed: 4,
                provided: 3
            })
        );
        assert!(pins.check(&PanelProfile::HUB75, 8).is_ok());
    }
}

/*!
 # Command frames for the Milight bridge protocol

 Every command is a fixed 3-byte datagram: opcode, argument, terminator.
 The opcode tables live in [`ProtocolConfig`] so a bridge with different
 codes can be supported without touching the encoder.
*/

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Number of individually addressable zones
pub const ZONE_COUNT: usize = 5;

/// Addressable zone: 0 means all zones, 1..=5 an individual group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Zone(pub(crate) u8);

impl Zone {
    /// Every zone at once
    pub const ALL: Self = Self(0);

    /// Creates a zone, rejecting numbers past the zone table
    pub fn new(zone: u8) -> Result<Self> {
        if usize::from(zone) > ZONE_COUNT {
            return Err(Error::ValueOutOfRange {
                what: "Zone",
                value: u32::from(zone),
                min: 0,
                max: ZONE_COUNT as u32,
            });
        }
        Ok(Self(zone))
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn is_all(self) -> bool {
        self.0 == 0
    }

    /// Index into the zone code table, `None` for [`Zone::ALL`]
    fn slot(self) -> Option<usize> {
        usize::from(self.0).checked_sub(1)
    }
}

impl TryFrom<u8> for Zone {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Zone> for u8 {
    fn from(zone: Zone) -> u8 {
        zone.0
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_all() {
            write!(f, "all zones")
        } else {
            write!(f, "zone {}", self.0)
        }
    }
}

/// Brightness level on the bridge's 19-step scale
///
/// # Examples
///
/// ```
/// use milight_wakeup::Brightness;
///
/// let level = Brightness::new(12).unwrap();
/// assert_eq!(level.level(), 12);
/// assert!(Brightness::new(19).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Brightness(u8);

impl Brightness {
    /// Number of discrete levels
    pub const LEVELS: u8 = 19;

    pub const MIN: Self = Self(0);

    pub const MAX: Self = Self(Self::LEVELS - 1);

    /// Creates a brightness level.
    ///
    /// # Errors
    ///
    /// Returns `Error::ValueOutOfRange` for levels above 18. Values are never clamped.
    pub fn new(level: u8) -> Result<Self> {
        if level >= Self::LEVELS {
            return Err(Error::ValueOutOfRange {
                what: "Brightness",
                value: u32::from(level),
                min: 0,
                max: u32::from(Self::LEVELS - 1),
            });
        }
        Ok(Self(level))
    }

    pub fn level(self) -> u8 {
        self.0
    }

    /// All levels from darkest to brightest
    pub fn ascending() -> impl DoubleEndedIterator<Item = Brightness> + ExactSizeIterator {
        (0..Self::LEVELS).map(Self)
    }
}

/// Colour wheel position, passed to the bridge unchanged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hue(u8);

impl Hue {
    pub const RED: Self = Self(174);
    pub const BLUE: Self = Self(240);

    pub fn value(self) -> u8 {
        self.0
    }
}

impl From<u8> for Hue {
    fn from(value: u8) -> Self {
        Self(value)
    }
}

impl TryFrom<u32> for Hue {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self> {
        u8::try_from(value)
            .map(Self)
            .map_err(|_| Error::ValueOutOfRange {
                what: "Hue",
                value,
                min: 0,
                max: 255,
            })
    }
}

/// High-level lamp action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    On(Zone),
    Off(Zone),
    Hue(Hue),
    Brightness(Brightness),
    WhiteMode,
}

/// Encoded 3-byte datagram, immutable once built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommandFrame([u8; 3]);

impl CommandFrame {
    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }

    pub fn opcode(&self) -> u8 {
        self.0[0]
    }

    pub fn argument(&self) -> u8 {
        self.0[1]
    }
}

impl fmt::Display for CommandFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c] = self.0;
        write!(f, "[{a:#04x}, {b:#04x}, {c:#04x}]")
    }
}

/// Opcode tables and byte ranges understood by the bridge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProtocolConfig {
    /// On-codes for zones 1..=5; each zone's off-code is its on-code + 1
    pub zone_codes: [u8; ZONE_COUNT],
    /// On-code for all zones, if the bridge has one
    pub all_on_code: Option<u8>,
    /// Off-code for all zones
    pub all_off_code: u8,
    pub hue_opcode: u8,
    pub brightness_opcode: u8,
    pub white_opcode: u8,
    /// Bridge byte for brightness level 0
    pub brightness_floor: u8,
    /// Bridge byte for brightness level 18
    pub brightness_ceiling: u8,
    /// Trailing byte of every frame
    pub terminator: u8,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            zone_codes: [0x42, 0x45, 0x47, 0x49, 0x4B],
            all_on_code: None,
            all_off_code: 0x41,
            hue_opcode: 0x40,
            brightness_opcode: 0x4E,
            white_opcode: 0xC2,
            brightness_floor: 0x02,
            brightness_ceiling: 0x1B,
            terminator: 0x55,
        }
    }
}

impl ProtocolConfig {
    /// Checks the tables can encode every valid command unambiguously
    pub fn validate(&self) -> Result<()> {
        let span = self
            .brightness_ceiling
            .checked_sub(self.brightness_floor)
            .unwrap_or(0);
        if span < Brightness::LEVELS - 1 {
            return Err(Error::InvalidConfig(format!(
                "brightness range {:#04x}..={:#04x} is too narrow for {} levels",
                self.brightness_floor,
                self.brightness_ceiling,
                Brightness::LEVELS
            )));
        }

        if let Some(code) = self.zone_codes.iter().find(|&&c| c == u8::MAX) {
            return Err(Error::InvalidConfig(format!(
                "zone on-code {code:#04x} has no room for an off-code"
            )));
        }

        for (i, code) in self.zone_codes.iter().enumerate() {
            if self.zone_codes[..i].contains(code) {
                return Err(Error::InvalidConfig(format!(
                    "zone on-code {code:#04x} is used by more than one zone"
                )));
            }
        }

        Ok(())
    }

    /// Bridge byte for a brightness level, spread evenly over the configured range
    pub fn brightness_byte(&self, brightness: Brightness) -> u8 {
        let span = u32::from(self.brightness_ceiling.saturating_sub(self.brightness_floor));
        let steps = u32::from(Brightness::LEVELS - 1);
        let offset = (u32::from(brightness.level()) * span + steps / 2) / steps;
        // offset <= span, so this stays inside the configured range
        self.brightness_floor + offset as u8
    }

    /// Encodes a command into its wire frame.
    ///
    /// # Errors
    ///
    /// Returns `Error::ZoneNotAddressable` when powering on [`Zone::ALL`]
    /// without an `all_on_code`. All other commands are infallible.
    pub fn encode(&self, command: Command) -> Result<CommandFrame> {
        let (opcode, argument) = match command {
            Command::On(zone) => match zone.slot() {
                Some(slot) => (self.zone_codes[slot], 0x00),
                None => (
                    self.all_on_code
                        .ok_or(Error::ZoneNotAddressable(zone.number()))?,
                    0x00,
                ),
            },
            Command::Off(zone) => match zone.slot() {
                Some(slot) => (self.zone_codes[slot].wrapping_add(1), 0x00),
                None => (self.all_off_code, 0x00),
            },
            Command::Hue(hue) => (self.hue_opcode, hue.value()),
            Command::Brightness(level) => (self.brightness_opcode, self.brightness_byte(level)),
            Command::WhiteMode => (self.white_opcode, 0x00),
        };

        Ok(CommandFrame([opcode, argument, self.terminator]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zone(n: u8) -> Zone {
        Zone::new(n).unwrap()
    }

    #[test]
    fn zone_one_powers_on_with_first_table_entry() {
        let frame = ProtocolConfig::default().encode(Command::On(zone(1))).unwrap();
        assert_eq!(frame.as_bytes(), &[0x42, 0x00, 0x55]);
    }

    #[test]
    fn off_code_is_on_code_plus_one() {
        let config = ProtocolConfig::default();
        for n in 1..=ZONE_COUNT as u8 {
            let on = config.encode(Command::On(zone(n))).unwrap();
            let off = config.encode(Command::Off(zone(n))).unwrap();
            assert_eq!(off.opcode(), on.opcode() + 1, "zone {n}");
            assert_eq!(off.argument(), 0x00);
        }
    }

    #[test]
    fn all_zones_off_uses_dedicated_code() {
        let frame = ProtocolConfig::default().encode(Command::Off(Zone::ALL)).unwrap();
        assert_eq!(frame.as_bytes(), &[0x41, 0x00, 0x55]);
    }

    #[test]
    fn all_zones_on_is_rejected_by_default() {
        let err = ProtocolConfig::default()
            .encode(Command::On(Zone::ALL))
            .unwrap_err();
        assert!(matches!(err, Error::ZoneNotAddressable(0)));
    }

    #[test]
    fn all_zones_on_uses_configured_code() {
        let config = ProtocolConfig {
            all_on_code: Some(0x42),
            ..ProtocolConfig::default()
        };
        let frame = config.encode(Command::On(Zone::ALL)).unwrap();
        assert_eq!(frame.as_bytes(), &[0x42, 0x00, 0x55]);
    }

    #[test]
    fn hue_passes_through() {
        let config = ProtocolConfig::default();
        for h in [0u8, 1, 174, 240, 255] {
            let frame = config.encode(Command::Hue(Hue::from(h))).unwrap();
            assert_eq!(frame.as_bytes(), &[0x40, h, 0x55]);
        }
    }

    #[test]
    fn white_mode_frame() {
        let frame = ProtocolConfig::default().encode(Command::WhiteMode).unwrap();
        assert_eq!(frame.as_bytes(), &[0xC2, 0x00, 0x55]);
    }

    #[test]
    fn brightness_table_spans_bridge_range() {
        let config = ProtocolConfig::default();
        assert_eq!(config.brightness_byte(Brightness::MIN), 0x02);
        assert_eq!(config.brightness_byte(Brightness::MAX), 0x1B);

        let frame = config.encode(Command::Brightness(Brightness::MAX)).unwrap();
        assert_eq!(frame.as_bytes(), &[0x4E, 0x1B, 0x55]);
    }

    #[test]
    fn brightness_table_is_strictly_increasing() {
        let config = ProtocolConfig::default();
        let bytes: Vec<u8> = Brightness::ascending()
            .map(|b| config.brightness_byte(b))
            .collect();
        assert_eq!(bytes.len(), 19);
        assert!(bytes.windows(2).all(|w| w[0] < w[1]), "{bytes:?}");
    }

    #[test]
    fn narrowest_valid_range_is_still_monotonic() {
        let config = ProtocolConfig {
            brightness_floor: 0x10,
            brightness_ceiling: 0x10 + 18,
            ..ProtocolConfig::default()
        };
        config.validate().unwrap();
        let bytes: Vec<u8> = Brightness::ascending()
            .map(|b| config.brightness_byte(b))
            .collect();
        assert_eq!(bytes, (0x10..=0x22).collect::<Vec<u8>>());
    }

    #[test]
    fn encoding_is_deterministic() {
        let config = ProtocolConfig::default();
        let commands = [
            Command::On(zone(3)),
            Command::Off(zone(3)),
            Command::Hue(Hue::RED),
            Command::Brightness(Brightness::new(7).unwrap()),
            Command::WhiteMode,
        ];
        for command in commands {
            assert_eq!(config.encode(command).unwrap(), config.encode(command).unwrap());
        }
    }

    #[test]
    fn out_of_range_values_are_rejected() {
        assert!(Zone::new(6).is_err());
        assert!(Brightness::new(19).is_err());
        assert!(Hue::try_from(256u32).is_err());
        assert_eq!(Hue::try_from(255u32).unwrap().value(), 255);
    }

    #[test]
    fn validate_rejects_narrow_brightness_range() {
        let config = ProtocolConfig {
            brightness_floor: 0x02,
            brightness_ceiling: 0x10,
            ..ProtocolConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn validate_rejects_duplicate_zone_codes() {
        let config = ProtocolConfig {
            zone_codes: [0x42, 0x42, 0x47, 0x49, 0x4B],
            ..ProtocolConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn frame_display_is_hex() {
        let frame = ProtocolConfig::default().encode(Command::On(zone(1))).unwrap();
        assert_eq!(frame.to_string(), "[0x42, 0x00, 0x55]");
    }
}

//! # Common IEEE C37.118 frame types
//!
//! Shared building blocks for every frame variant: the decode error taxonomy,
//! standard-version and frame-type discrimination carried in the SYNC field,
//! the 14-byte frame prefix, and the STAT status word of data frames.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Size of the common frame prefix in bytes.
pub const PREFIX_SIZE: usize = 14;

/// Smallest well-formed frame: prefix plus the trailing CRC.
pub const MIN_FRAME_SIZE: usize = PREFIX_SIZE + 2;

/// Errors raised while decoding or constructing IEEE C37.118 frames.
///
/// Decode errors are non-fatal and scoped to a single message: the session
/// that hit one logs it and keeps its connection open.
#[derive(Debug)]
pub enum ParseError {
    InvalidLength { message: String },
    InvalidFrameType { message: String },
    InvalidChecksum { message: String },
    InvalidFormat { message: String },
    InvalidHeader { message: String },
    UnknownVersion { message: String },
    InvalidPhasorType { message: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::InvalidLength { message } => write!(f, "Invalid length: {}", message),
            ParseError::InvalidFrameType { message } => {
                write!(f, "Invalid frame type: {}", message)
            }
            ParseError::InvalidChecksum { message } => write!(f, "Invalid checksum: {}", message),
            ParseError::InvalidFormat { message } => write!(f, "Invalid format: {}", message),
            ParseError::InvalidHeader { message } => write!(f, "Invalid header: {}", message),
            ParseError::UnknownVersion { message } => write!(f, "Unknown version: {}", message),
            ParseError::InvalidPhasorType { message } => {
                write!(f, "Invalid phasor type: {}", message)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// IEEE C37.118 standard revision carried in the SYNC field's version bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Version {
    V2005,
    #[default]
    V2011,
    V2024,
}

impl Version {
    /// Extracts the version from SYNC bits 3-0.
    pub fn from_sync(sync: u16) -> Result<Self, ParseError> {
        match sync & 0x000F {
            0x0001 => Ok(Version::V2005),
            0x0002 => Ok(Version::V2011),
            0x0003 => Ok(Version::V2024),
            other => Err(ParseError::UnknownVersion {
                message: format!("Unsupported version bits: 0x{:X}", other),
            }),
        }
    }

    fn bits(self) -> u16 {
        match self {
            Version::V2005 => 0x1,
            Version::V2011 => 0x2,
            Version::V2024 => 0x3,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::V2005 => write!(f, "IEEE Std C37.118-2005"),
            Version::V2011 => write!(f, "IEEE Std C37.118.2-2011"),
            Version::V2024 => write!(f, "IEEE Std C37.118.2-2024"),
        }
    }
}

/// Frame variant encoded in SYNC bits 6-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameType {
    Data,
    Header,
    Config1,
    Config2,
    Config3,
    Command,
}

impl FrameType {
    /// Extracts the frame type from the SYNC field.
    ///
    /// Fails if the leading byte is not 0xAA or the type bits are reserved.
    pub fn from_sync(sync: u16) -> Result<FrameType, ParseError> {
        if (sync >> 8) != 0xAA {
            return Err(ParseError::InvalidFrameType {
                message: format!("Invalid first byte: 0x{:02X}, expected 0xAA", sync >> 8),
            });
        }
        match (sync >> 4) & 0x7 {
            0 => Ok(FrameType::Data),
            1 => Ok(FrameType::Header),
            2 => Ok(FrameType::Config1),
            3 => Ok(FrameType::Config2),
            4 => Ok(FrameType::Command),
            5 => Ok(FrameType::Config3),
            bits => Err(ParseError::InvalidFrameType {
                message: format!("Invalid frame type bits: {}", bits),
            }),
        }
    }

    fn bits(self) -> u16 {
        match self {
            FrameType::Data => 0,
            FrameType::Header => 1,
            FrameType::Config1 => 2,
            FrameType::Config2 => 3,
            FrameType::Command => 4,
            FrameType::Config3 => 5,
        }
    }
}

impl fmt::Display for FrameType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameType::Data => write!(f, "Data Frame"),
            FrameType::Header => write!(f, "Header Frame"),
            FrameType::Config1 => write!(f, "Configuration Frame 1"),
            FrameType::Config2 => write!(f, "Configuration Frame 2"),
            FrameType::Config3 => write!(f, "Configuration Frame 3"),
            FrameType::Command => write!(f, "Command Frame"),
        }
    }
}

/// Builds a SYNC word: leading byte 0xAA, type bits 6-4, version bits 3-0.
pub fn create_sync(version: Version, frame_type: FrameType) -> u16 {
    (0xAA << 8) | (frame_type.bits() << 4) | version.bits()
}

/// Common 14-byte prefix shared by every IEEE C37.118 frame.
///
/// FRACSEC is a 24-bit counter of TIME_BASE units past SOC; the byte ahead of
/// it carries leap-second and time-quality flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrefixFrame {
    pub sync: u16,
    pub framesize: u16,
    pub idcode: u16,
    pub soc: u32,
    pub leapbyte: u8,
    pub fracsec: u32,
    #[serde(skip)]
    pub version: Version,
}

impl PrefixFrame {
    /// Creates a prefix for a fresh frame of the given type.
    ///
    /// FRAMESIZE is a placeholder; encoding recomputes it from the final byte
    /// sequence.
    pub fn new(frame_type: FrameType, idcode: u16, version: Version) -> Self {
        PrefixFrame {
            sync: create_sync(version, frame_type),
            framesize: PREFIX_SIZE as u16,
            idcode,
            soc: 0,
            leapbyte: 0,
            fracsec: 0,
            version,
        }
    }

    /// Parses the prefix from the first 14 bytes of a frame.
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < PREFIX_SIZE {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Expected at least {} bytes for frame prefix, got {}",
                    PREFIX_SIZE,
                    bytes.len()
                ),
            });
        }
        let sync = u16::from_be_bytes([bytes[0], bytes[1]]);
        let version = Version::from_sync(sync)?;
        Ok(PrefixFrame {
            sync,
            framesize: u16::from_be_bytes([bytes[2], bytes[3]]),
            idcode: u16::from_be_bytes([bytes[4], bytes[5]]),
            soc: u32::from_be_bytes([bytes[6], bytes[7], bytes[8], bytes[9]]),
            leapbyte: bytes[10],
            fracsec: u32::from_be_bytes([0, bytes[11], bytes[12], bytes[13]]),
            version,
        })
    }

    /// Serializes the prefix to its 14-byte wire form.
    pub fn to_hex(&self) -> [u8; PREFIX_SIZE] {
        let mut result = [0u8; PREFIX_SIZE];
        result[0..2].copy_from_slice(&self.sync.to_be_bytes());
        result[2..4].copy_from_slice(&self.framesize.to_be_bytes());
        result[4..6].copy_from_slice(&self.idcode.to_be_bytes());
        result[6..10].copy_from_slice(&self.soc.to_be_bytes());
        result[10] = self.leapbyte;
        let fracsec = self.fracsec.to_be_bytes();
        result[11..14].copy_from_slice(&fracsec[1..4]);
        result
    }

    /// Stamps the prefix with a second-of-century / fractional-second pair.
    pub fn set_time(&mut self, soc: u32, fracsec: u32) {
        self.soc = soc;
        self.fracsec = fracsec & 0x00FF_FFFF;
    }
}

/// STAT status word of a data frame, 2011 bit layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatField {
    pub data_error: u8,      // Bits 15-14
    pub pmu_sync: bool,      // Bit 13
    pub data_sorting: bool,  // Bit 12
    pub pmu_trigger: bool,   // Bit 11
    pub config_change: bool, // Bit 10
    pub data_modified: bool, // Bit 9
    pub time_quality: u8,    // Bits 8-6
    pub unlock_time: u8,     // Bits 5-4
    pub trigger_reason: u8,  // Bits 3-0
}

impl StatField {
    /// STAT for a healthy, time-synchronized measurement.
    pub fn ok() -> Self {
        StatField {
            data_error: 0,
            pmu_sync: true,
            data_sorting: false,
            pmu_trigger: false,
            config_change: false,
            data_modified: false,
            time_quality: 0,
            unlock_time: 0,
            trigger_reason: 0,
        }
    }

    pub fn from_raw(raw: u16) -> Self {
        StatField {
            data_error: ((raw >> 14) & 0x03) as u8,
            pmu_sync: (raw & 0x2000) != 0,
            data_sorting: (raw & 0x1000) != 0,
            pmu_trigger: (raw & 0x0800) != 0,
            config_change: (raw & 0x0400) != 0,
            data_modified: (raw & 0x0200) != 0,
            time_quality: ((raw >> 6) & 0x07) as u8,
            unlock_time: ((raw >> 4) & 0x03) as u8,
            trigger_reason: (raw & 0x000F) as u8,
        }
    }

    pub fn to_raw(&self) -> u16 {
        let mut raw = 0u16;
        raw |= (self.data_error as u16 & 0x03) << 14;
        raw |= (self.pmu_sync as u16) << 13;
        raw |= (self.data_sorting as u16) << 12;
        raw |= (self.pmu_trigger as u16) << 11;
        raw |= (self.config_change as u16) << 10;
        raw |= (self.data_modified as u16) << 9;
        raw |= ((self.time_quality & 0x07) as u16) << 6;
        raw |= ((self.unlock_time & 0x03) as u16) << 4;
        raw |= self.trigger_reason as u16 & 0x000F;
        raw
    }
}

impl Default for StatField {
    fn default() -> Self {
        StatField::ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_sync_round_trips() {
        let versions = [Version::V2005, Version::V2011, Version::V2024];
        let frame_types = [
            FrameType::Data,
            FrameType::Header,
            FrameType::Config1,
            FrameType::Config2,
            FrameType::Config3,
            FrameType::Command,
        ];
        for &version in &versions {
            for &frame_type in &frame_types {
                let sync = create_sync(version, frame_type);
                assert_eq!(sync >> 8, 0xAA);
                assert_eq!(FrameType::from_sync(sync).unwrap(), frame_type);
                assert_eq!(Version::from_sync(sync).unwrap(), version);
            }
        }
        // Known encodings from the standard.
        assert_eq!(create_sync(Version::V2011, FrameType::Command), 0xAA42);
        assert_eq!(create_sync(Version::V2005, FrameType::Config2), 0xAA31);
    }

    #[test]
    fn test_sync_rejects_bad_lead_byte() {
        assert!(FrameType::from_sync(0xBB42).is_err());
        assert!(FrameType::from_sync(0xAA72).is_err()); // reserved type bits
    }

    #[test]
    fn test_prefix_round_trip() {
        let mut prefix = PrefixFrame::new(FrameType::Data, 780, Version::V2011);
        prefix.framesize = 52;
        prefix.set_time(1_149_580_800, 16_817);

        let bytes = prefix.to_hex();
        let parsed = PrefixFrame::from_hex(&bytes).unwrap();
        assert_eq!(parsed.sync, prefix.sync);
        assert_eq!(parsed.framesize, 52);
        assert_eq!(parsed.idcode, 780);
        assert_eq!(parsed.soc, 1_149_580_800);
        assert_eq!(parsed.fracsec, 16_817);
        assert_eq!(parsed.version, Version::V2011);
    }

    #[test]
    fn test_prefix_too_short() {
        assert!(PrefixFrame::from_hex(&[0xAA, 0x01, 0x00]).is_err());
    }

    #[test]
    fn test_fracsec_masked_to_24_bits() {
        let mut prefix = PrefixFrame::new(FrameType::Data, 1, Version::V2011);
        prefix.set_time(0, 0xFF00_0001);
        assert_eq!(prefix.fracsec, 0x0000_0001);
    }

    #[test]
    fn test_stat_field_round_trip() {
        let stat = StatField {
            data_error: 2,
            pmu_sync: true,
            data_sorting: true,
            pmu_trigger: false,
            config_change: true,
            data_modified: false,
            time_quality: 5,
            unlock_time: 1,
            trigger_reason: 9,
        };
        assert_eq!(StatField::from_raw(stat.to_raw()), stat);
        assert_eq!(StatField::ok().to_raw(), 0x2000);
    }

    #[test]
    fn test_stat_time_quality_and_unlock_time_are_disjoint() {
        // Time quality occupies bits 8-6 and unlock time bits 5-4; an odd
        // time quality must not bleed into the unlock field.
        let stat = StatField {
            time_quality: 5,
            unlock_time: 1,
            ..StatField::ok()
        };
        let raw = stat.to_raw();
        assert_eq!((raw >> 6) & 0x07, 5);
        assert_eq!((raw >> 4) & 0x03, 1);

        let parsed = StatField::from_raw(raw);
        assert_eq!(parsed.time_quality, 5);
        assert_eq!(parsed.unlock_time, 1);

        // Exhaustive over both fields: every combination round-trips.
        for tq in 0..8u8 {
            for ut in 0..4u8 {
                let stat = StatField {
                    time_quality: tq,
                    unlock_time: ut,
                    ..StatField::ok()
                };
                assert_eq!(StatField::from_raw(stat.to_raw()), stat);
            }
        }
    }
}

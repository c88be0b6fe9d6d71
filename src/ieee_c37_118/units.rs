//! # Measurement unit codecs
//!
//! Conversion-factor and rate fields carried in configuration frames:
//! PHUNIT (phasor scaling), ANUNIT (analog scaling), DIGUNIT (digital status
//! masks), FNOM (nominal frequency) and DATA_RATE. Each type round-trips its
//! fixed-width wire form and exposes the derived quantities the server and
//! data-frame codec need.

use super::common::ParseError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// PHUNIT conversion factor for one phasor channel.
///
/// The leading byte marks voltage (0) or current (1); the remaining 24 bits
/// are an unsigned scale in 10⁻⁵ V or A per bit, applied to 16-bit integer
/// phasor data and ignored for floating-point formats.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhasorUnits {
    pub is_current: bool,
    pub scale_factor: u32,
}

impl PhasorUnits {
    pub fn voltage(scale_factor: u32) -> Self {
        PhasorUnits {
            is_current: false,
            scale_factor,
        }
    }

    pub fn current(scale_factor: u32) -> Self {
        PhasorUnits {
            is_current: true,
            scale_factor,
        }
    }

    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 4 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for PhasorUnits: expected 4 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(PhasorUnits {
            is_current: bytes[0] == 1,
            scale_factor: u32::from_be_bytes([0, bytes[1], bytes[2], bytes[3]]),
        })
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        if self.is_current {
            bytes[0] = 1;
        }
        bytes[1..4].copy_from_slice(&self.scale_factor.to_be_bytes()[1..]);
        bytes
    }
}

/// Measurement type carried in the leading ANUNIT byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MeasurementType {
    SinglePointOnWave,
    RmsOfAnalogInput,
    PeakOfAnalogInput,
}

impl fmt::Display for MeasurementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MeasurementType::SinglePointOnWave => write!(f, "Single Point-On-Wave"),
            MeasurementType::RmsOfAnalogInput => write!(f, "RMS"),
            MeasurementType::PeakOfAnalogInput => write!(f, "Peak"),
        }
    }
}

impl MeasurementType {
    fn from_hex(byte: u8) -> Result<Self, ParseError> {
        match byte {
            0 => Ok(MeasurementType::SinglePointOnWave),
            1 => Ok(MeasurementType::RmsOfAnalogInput),
            2 => Ok(MeasurementType::PeakOfAnalogInput),
            _ => Err(ParseError::InvalidFormat {
                message: format!("Invalid MeasurementType: expected 0, 1 or 2, got {}", byte),
            }),
        }
    }

    fn to_hex(self) -> u8 {
        match self {
            MeasurementType::SinglePointOnWave => 0,
            MeasurementType::RmsOfAnalogInput => 1,
            MeasurementType::PeakOfAnalogInput => 2,
        }
    }
}

/// ANUNIT conversion factor for one analog channel: measurement type plus a
/// signed 24-bit user-defined scale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalogUnits {
    pub measurement_type: MeasurementType,
    pub scale_factor: i32,
}

impl AnalogUnits {
    pub fn new(measurement_type: MeasurementType, scale_factor: i32) -> Self {
        AnalogUnits {
            measurement_type,
            scale_factor,
        }
    }

    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 4 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for AnalogUnits: expected 4 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        let measurement_type = MeasurementType::from_hex(bytes[0])?;
        // Sign-extend the 24-bit factor.
        let raw = i32::from_be_bytes([bytes[1], bytes[2], bytes[3], 0]) >> 8;
        Ok(AnalogUnits {
            measurement_type,
            scale_factor: raw,
        })
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        bytes[0] = self.measurement_type.to_hex();
        bytes[1..4].copy_from_slice(&self.scale_factor.to_be_bytes()[1..]);
        bytes
    }
}

/// DIGUNIT mask pair for one digital status word.
///
/// `normal_mask` XORed with the status word yields 0 when every input is in
/// its normal state; `valid_mask` has a bit set for each input the device
/// actually wires.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DigitalUnits {
    pub normal_mask: u16,
    pub valid_mask: u16,
}

impl DigitalUnits {
    /// Masks for a word with all inputs valid and normal-low.
    pub fn all_valid() -> Self {
        DigitalUnits {
            normal_mask: 0x0000,
            valid_mask: 0xFFFF,
        }
    }

    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 4 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for DigitalUnits: expected 4 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(DigitalUnits {
            normal_mask: u16::from_be_bytes([bytes[0], bytes[1]]),
            valid_mask: u16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut bytes = [0u8; 4];
        bytes[0..2].copy_from_slice(&self.normal_mask.to_be_bytes());
        bytes[2..4].copy_from_slice(&self.valid_mask.to_be_bytes());
        bytes
    }
}

/// FNOM nominal system frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NominalFrequency {
    Hz50,
    Hz60,
}

impl NominalFrequency {
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 2 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for NominalFrequency: expected 2 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        // Only the least significant bit is defined.
        match u16::from_be_bytes([bytes[0], bytes[1]]) & 0x0001 {
            0 => Ok(NominalFrequency::Hz50),
            _ => Ok(NominalFrequency::Hz60),
        }
    }

    pub fn to_hex(&self) -> [u8; 2] {
        match self {
            NominalFrequency::Hz50 => [0, 0],
            NominalFrequency::Hz60 => [0, 1],
        }
    }

    pub fn hz(&self) -> f32 {
        match self {
            NominalFrequency::Hz50 => 50.0,
            NominalFrequency::Hz60 => 60.0,
        }
    }
}

impl fmt::Display for NominalFrequency {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            NominalFrequency::Hz50 => write!(f, "50 Hz"),
            NominalFrequency::Hz60 => write!(f, "60 Hz"),
        }
    }
}

/// DATA_RATE field: positive values are frames per second, negative values
/// are seconds per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRate {
    pub value: i16,
}

impl DataRate {
    pub fn new(value: i16) -> Self {
        DataRate { value }
    }

    pub fn from_hex(bytes: &[u8; 2]) -> Self {
        DataRate {
            value: i16::from_be_bytes(*bytes),
        }
    }

    pub fn to_hex(&self) -> [u8; 2] {
        self.value.to_be_bytes()
    }

    /// Data rate in frames per second.
    pub fn frequency(&self) -> f32 {
        if self.value > 0 {
            self.value as f32
        } else if self.value < 0 {
            1.0 / (-self.value as f32)
        } else {
            0.0
        }
    }

    /// Pacing interval between consecutive data frames. A rate of 0 yields
    /// a zero interval.
    pub fn interval(&self) -> Duration {
        if self.value > 0 {
            Duration::from_secs_f64(1.0 / self.value as f64)
        } else if self.value < 0 {
            Duration::from_secs((-self.value) as u64)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phasor_units() {
        // PHUNIT examples from IEEE C37.118-2011 Table 9.
        let phunit1: [u8; 4] = [0x00, 0x0D, 0xF8, 0x47];
        let phunit2: [u8; 4] = [0x01, 0x00, 0xB2, 0xD0];

        let p1 = PhasorUnits::from_hex(&phunit1).unwrap();
        let p2 = PhasorUnits::from_hex(&phunit2).unwrap();

        assert!(!p1.is_current);
        assert!(p2.is_current);
        assert_eq!(p1.scale_factor, 915527);
        assert_eq!(p2.scale_factor, 45776);

        assert_eq!(p1.to_hex(), phunit1);
        assert_eq!(p2.to_hex(), phunit2);
        assert_eq!(PhasorUnits::voltage(915527), p1);
        assert_eq!(PhasorUnits::current(45776), p2);
    }

    #[test]
    fn test_analog_units_round_trip() {
        let units = AnalogUnits::new(MeasurementType::RmsOfAnalogInput, 1);
        let parsed = AnalogUnits::from_hex(&units.to_hex()).unwrap();
        assert_eq!(parsed, units);

        let negative = AnalogUnits::new(MeasurementType::PeakOfAnalogInput, -256);
        assert_eq!(AnalogUnits::from_hex(&negative.to_hex()).unwrap(), negative);

        assert!(AnalogUnits::from_hex(&[5, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_digital_units_round_trip() {
        let units = DigitalUnits::all_valid();
        assert_eq!(units.to_hex(), [0x00, 0x00, 0xFF, 0xFF]);
        assert_eq!(DigitalUnits::from_hex(&units.to_hex()).unwrap(), units);
    }

    #[test]
    fn test_nominal_frequency() {
        let n1 = NominalFrequency::from_hex(&[0x00, 0x00]).unwrap();
        let n2 = NominalFrequency::from_hex(&[0x00, 0x01]).unwrap();

        assert_eq!(n1, NominalFrequency::Hz50);
        assert_eq!(n2, NominalFrequency::Hz60);
        assert_eq!(n1.to_hex(), [0x00, 0x00]);
        assert_eq!(n2.to_hex(), [0x00, 0x01]);
        assert_eq!(n2.hz(), 60.0);
    }

    #[test]
    fn test_data_rate_interval() {
        assert_eq!(DataRate::new(30).interval(), Duration::from_secs_f64(1.0 / 30.0));
        assert_eq!(DataRate::new(-5).interval(), Duration::from_secs(5));
        assert_eq!(DataRate::new(0).interval(), Duration::ZERO);
        assert_eq!(DataRate::new(30).frequency(), 30.0);
        assert_eq!(DataRate::new(-5).frequency(), 0.2);
    }
}

//! # Phasor sample encodings
//!
//! A phasor represents a voltage or current as a complex number. The wire
//! format carries it in one of four encodings selected by the configuration
//! frame's FORMAT word: rectangular or polar coordinates, 16-bit integer or
//! 32-bit float components. Integer encodings need the channel's PHUNIT
//! factor (10⁻⁵ V or A per bit) to recover physical units.

use super::common::ParseError;
use std::fmt;

// PHUNIT factors scale 16-bit integer data in 10^-5 units per bit.
// See IEEE C37.118-2011 Table 9.
const SCALE_DENOMINATOR_INVERSE: f32 = 0.00001;

/// Scales a raw integer phasor component by a PHUNIT conversion factor.
///
/// Worked examples from the standard: voltage factor 915527 maps raw 14635
/// to about 134 kV; current factor 45776 maps raw 1092 to about 500 A.
pub fn scale_phasor_value(value: f32, factor: u32) -> f32 {
    value * SCALE_DENOMINATOR_INVERSE * factor as f32
}

fn calc_magnitude(real: f32, imag: f32) -> f32 {
    (real * real + imag * imag).sqrt()
}

/// Phasor wire encoding, derived from the FORMAT word's polar and
/// phasor-float bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhasorType {
    FloatPolar,
    FloatRect,
    IntRect,
    IntPolar,
}

impl PhasorType {
    /// Encoded size in bytes: 8 for float formats, 4 for integer formats.
    pub fn size(&self) -> usize {
        match self {
            PhasorType::FloatPolar | PhasorType::FloatRect => 8,
            PhasorType::IntRect | PhasorType::IntPolar => 4,
        }
    }
}

impl fmt::Display for PhasorType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PhasorType::FloatPolar => write!(f, "FloatPolar"),
            PhasorType::FloatRect => write!(f, "FloatRect"),
            PhasorType::IntRect => write!(f, "IntRect"),
            PhasorType::IntPolar => write!(f, "IntPolar"),
        }
    }
}

/// A single phasor sample in one of the four wire encodings.
#[derive(Debug, Clone, Copy)]
pub enum PhasorValue {
    FloatPolar(PhasorFloatPolar),
    FloatRect(PhasorFloatRect),
    IntPolar(PhasorIntPolar),
    IntRect(PhasorIntRect),
}

impl PhasorValue {
    /// Parses one phasor of the given encoding from the front of `bytes`.
    pub fn from_hex(bytes: &[u8], phasor_type: PhasorType) -> Result<Self, ParseError> {
        match phasor_type {
            PhasorType::FloatPolar => Ok(PhasorValue::FloatPolar(PhasorFloatPolar::from_hex(
                bytes,
            )?)),
            PhasorType::FloatRect => Ok(PhasorValue::FloatRect(PhasorFloatRect::from_hex(bytes)?)),
            PhasorType::IntPolar => Ok(PhasorValue::IntPolar(PhasorIntPolar::from_hex(bytes)?)),
            PhasorType::IntRect => Ok(PhasorValue::IntRect(PhasorIntRect::from_hex(bytes)?)),
        }
    }

    /// Serializes the sample in its own encoding.
    pub fn to_hex(&self) -> Vec<u8> {
        match self {
            PhasorValue::FloatPolar(phasor) => phasor.to_hex().to_vec(),
            PhasorValue::FloatRect(phasor) => phasor.to_hex().to_vec(),
            PhasorValue::IntPolar(phasor) => phasor.to_hex().to_vec(),
            PhasorValue::IntRect(phasor) => phasor.to_hex().to_vec(),
        }
    }

    pub fn get_type(&self) -> PhasorType {
        match self {
            PhasorValue::FloatPolar(_) => PhasorType::FloatPolar,
            PhasorValue::FloatRect(_) => PhasorType::FloatRect,
            PhasorValue::IntPolar(_) => PhasorType::IntPolar,
            PhasorValue::IntRect(_) => PhasorType::IntRect,
        }
    }

    /// Encoded size in bytes.
    pub fn size(&self) -> usize {
        self.get_type().size()
    }

    /// Converts to floating-point polar with physical-unit magnitude.
    ///
    /// Integer encodings require the channel's PHUNIT factor; float
    /// encodings ignore it.
    pub fn to_float_polar(&self, scale_factor: Option<u32>) -> Result<PhasorFloatPolar, ParseError> {
        match self {
            PhasorValue::FloatPolar(phasor) => Ok(*phasor),
            PhasorValue::FloatRect(phasor) => Ok(phasor.to_float_polar()),
            PhasorValue::IntPolar(phasor) => {
                let scale = require_scale(scale_factor, "IntPolar")?;
                Ok(phasor.to_float_polar(scale))
            }
            PhasorValue::IntRect(phasor) => {
                let scale = require_scale(scale_factor, "IntRect")?;
                Ok(phasor.to_float_polar(scale))
            }
        }
    }

    /// Converts to floating-point rectangular with physical-unit components.
    pub fn to_float_rect(&self, scale_factor: Option<u32>) -> Result<PhasorFloatRect, ParseError> {
        match self {
            PhasorValue::FloatRect(phasor) => Ok(*phasor),
            PhasorValue::FloatPolar(phasor) => Ok(phasor.to_float_rect()),
            PhasorValue::IntPolar(phasor) => {
                let scale = require_scale(scale_factor, "IntPolar")?;
                Ok(phasor.to_float_rect(scale))
            }
            PhasorValue::IntRect(phasor) => {
                let scale = require_scale(scale_factor, "IntRect")?;
                Ok(phasor.to_float_rect(scale))
            }
        }
    }
}

fn require_scale(scale_factor: Option<u32>, encoding: &str) -> Result<u32, ParseError> {
    scale_factor.ok_or_else(|| ParseError::InvalidPhasorType {
        message: format!("Scale factor is required for {} conversion", encoding),
    })
}

/// Floating-point polar phasor: magnitude in physical units, angle in
/// radians.
#[derive(Debug, Clone, Copy)]
pub struct PhasorFloatPolar {
    pub magnitude: f32,
    pub angle: f32,
}

impl PhasorFloatPolar {
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 8 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for PhasorFloatPolar: expected 8 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(PhasorFloatPolar {
            magnitude: f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            angle: f32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    pub fn to_hex(&self) -> [u8; 8] {
        let mut result = [0u8; 8];
        result[0..4].copy_from_slice(&self.magnitude.to_be_bytes());
        result[4..8].copy_from_slice(&self.angle.to_be_bytes());
        result
    }

    pub fn to_float_rect(&self) -> PhasorFloatRect {
        PhasorFloatRect {
            real: self.magnitude * self.angle.cos(),
            imag: self.magnitude * self.angle.sin(),
        }
    }
}

/// Floating-point rectangular phasor with components in physical units.
#[derive(Debug, Clone, Copy)]
pub struct PhasorFloatRect {
    pub real: f32,
    pub imag: f32,
}

impl PhasorFloatRect {
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 8 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for PhasorFloatRect: expected 8 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(PhasorFloatRect {
            real: f32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
            imag: f32::from_be_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]),
        })
    }

    pub fn to_hex(&self) -> [u8; 8] {
        let mut result = [0u8; 8];
        result[0..4].copy_from_slice(&self.real.to_be_bytes());
        result[4..8].copy_from_slice(&self.imag.to_be_bytes());
        result
    }

    pub fn to_float_polar(&self) -> PhasorFloatPolar {
        PhasorFloatPolar {
            magnitude: calc_magnitude(self.real, self.imag),
            angle: self.imag.atan2(self.real),
        }
    }
}

/// Integer polar phasor: raw magnitude, angle in 10⁻⁴ radian units.
#[derive(Debug, Clone, Copy)]
pub struct PhasorIntPolar {
    pub magnitude: u16,
    pub angle: i16,
}

impl PhasorIntPolar {
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 4 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for PhasorIntPolar: expected 4 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(PhasorIntPolar {
            magnitude: u16::from_be_bytes([bytes[0], bytes[1]]),
            angle: i16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut result = [0u8; 4];
        result[0..2].copy_from_slice(&self.magnitude.to_be_bytes());
        result[2..4].copy_from_slice(&self.angle.to_be_bytes());
        result
    }

    pub fn to_float_polar(&self, scale_factor: u32) -> PhasorFloatPolar {
        PhasorFloatPolar {
            magnitude: scale_phasor_value(self.magnitude as f32, scale_factor),
            angle: (self.angle as f32) * 0.0001,
        }
    }

    pub fn to_float_rect(&self, scale_factor: u32) -> PhasorFloatRect {
        self.to_float_polar(scale_factor).to_float_rect()
    }
}

/// Integer rectangular phasor with raw 16-bit components.
#[derive(Debug, Clone, Copy)]
pub struct PhasorIntRect {
    pub real: i16,
    pub imag: i16,
}

impl PhasorIntRect {
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 4 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Invalid length for PhasorIntRect: expected 4 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        Ok(PhasorIntRect {
            real: i16::from_be_bytes([bytes[0], bytes[1]]),
            imag: i16::from_be_bytes([bytes[2], bytes[3]]),
        })
    }

    pub fn to_hex(&self) -> [u8; 4] {
        let mut result = [0u8; 4];
        result[0..2].copy_from_slice(&self.real.to_be_bytes());
        result[2..4].copy_from_slice(&self.imag.to_be_bytes());
        result
    }

    pub fn to_float_polar(&self, scale_factor: u32) -> PhasorFloatPolar {
        PhasorFloatPolar {
            magnitude: scale_phasor_value(
                calc_magnitude(self.real as f32, self.imag as f32),
                scale_factor,
            ),
            angle: (self.imag as f32).atan2(self.real as f32),
        }
    }

    pub fn to_float_rect(&self, scale_factor: u32) -> PhasorFloatRect {
        PhasorFloatRect {
            real: scale_phasor_value(self.real as f32, scale_factor),
            imag: scale_phasor_value(self.imag as f32, scale_factor),
        }
    }
}

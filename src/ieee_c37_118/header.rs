//! Header frames: free-form descriptive text a collector can request with
//! the `SendHeaderFrame` command.

use super::common::{
    create_sync, FrameType, ParseError, PrefixFrame, Version, MIN_FRAME_SIZE, PREFIX_SIZE,
};
use super::utils::{calculate_crc, validate_checksum};
use serde::{Deserialize, Serialize};

/// An IEEE C37.118 header frame: prefix, human-readable text, trailing CRC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeaderFrame {
    pub prefix: PrefixFrame,
    pub data: String,
    pub chk: u16,
}

impl HeaderFrame {
    pub fn new(idcode: u16, data: impl Into<String>) -> Self {
        let data = data.into();
        let prefix = PrefixFrame {
            sync: create_sync(Version::V2011, FrameType::Header),
            framesize: (MIN_FRAME_SIZE + data.len()) as u16,
            idcode,
            soc: 0,
            leapbyte: 0,
            fracsec: 0,
            version: Version::V2011,
        };
        HeaderFrame {
            prefix,
            data,
            chk: 0,
        }
    }

    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "HeaderFrame: Expected at least {} bytes, but got {}",
                    MIN_FRAME_SIZE,
                    bytes.len()
                ),
            });
        }

        if !validate_checksum(bytes) {
            return Err(ParseError::InvalidChecksum {
                message: "HeaderFrame: CRC mismatch".to_string(),
            });
        }

        let prefix = PrefixFrame::from_hex(&bytes[0..PREFIX_SIZE])?;
        if prefix.framesize as usize != bytes.len() {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "HeaderFrame: Declared frame size {} does not match buffer length {}",
                    prefix.framesize,
                    bytes.len()
                ),
            });
        }

        let data = String::from_utf8_lossy(&bytes[PREFIX_SIZE..bytes.len() - 2]).into_owned();
        let chk = u16::from_be_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);

        Ok(HeaderFrame { prefix, data, chk })
    }

    /// Serializes the frame, recomputing FRAMESIZE and the trailing CRC.
    pub fn to_hex(&self) -> Vec<u8> {
        let mut prefix = self.prefix.clone();
        prefix.framesize = (MIN_FRAME_SIZE + self.data.len()) as u16;

        let mut result = Vec::with_capacity(prefix.framesize as usize);
        result.extend_from_slice(&prefix.to_hex());
        result.extend_from_slice(self.data.as_bytes());
        let crc = calculate_crc(&result);
        result.extend_from_slice(&crc.to_be_bytes());
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_round_trip() {
        let header = HeaderFrame::new(7734, "Hi! I am tinyPMU!");
        let bytes = header.to_hex();

        assert_eq!(bytes.len(), 16 + 17);
        assert_eq!(bytes[0], 0xAA);
        assert_eq!(bytes[1], 0x12); // Header frame, version 2
        assert!(validate_checksum(&bytes));

        let parsed = HeaderFrame::from_hex(&bytes).unwrap();
        assert_eq!(parsed.prefix.idcode, 7734);
        assert_eq!(parsed.data, "Hi! I am tinyPMU!");
    }

    #[test]
    fn test_empty_header() {
        let header = HeaderFrame::new(1, "");
        let bytes = header.to_hex();
        assert_eq!(bytes.len(), MIN_FRAME_SIZE);
        assert_eq!(HeaderFrame::from_hex(&bytes).unwrap().data, "");
    }

    #[test]
    fn test_truncated_header_rejected() {
        let bytes = HeaderFrame::new(1, "station description").to_hex();
        assert!(HeaderFrame::from_hex(&bytes[..bytes.len() - 4]).is_err());
    }
}

//! # Frame tagged union
//!
//! `Frame` wraps every frame variant behind one decode/encode surface. The
//! decoder validates the envelope (minimum length, declared-versus-actual
//! size, CRC) before dispatching on the SYNC frame-type bits; the encoder
//! delegates to the variant codecs, which recompute FRAMESIZE and CHK so an
//! encoded frame is always internally consistent.

use super::commands::CommandFrame;
use super::common::{FrameType, ParseError, MIN_FRAME_SIZE};
use super::config::ConfigurationFrame;
use super::data_frame::DataFrame;
use super::header::HeaderFrame;
use super::utils::validate_checksum;

/// Any IEEE C37.118 frame.
#[derive(Debug, Clone)]
pub enum Frame {
    Command(CommandFrame),
    Config1(ConfigurationFrame),
    Config2(ConfigurationFrame),
    Config3(ConfigurationFrame),
    Data(DataFrame),
    Header(HeaderFrame),
}

impl Frame {
    /// Decodes a complete frame buffer.
    ///
    /// `config` is the governing CFG-2, required to decode data frames; a
    /// data frame without one is an error. The envelope (length, declared
    /// size, CRC) is validated here so variant codecs see whole frames.
    pub fn decode(bytes: &[u8], config: Option<&ConfigurationFrame>) -> Result<Self, ParseError> {
        if bytes.len() < MIN_FRAME_SIZE {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Frame: expected at least {} bytes, got {}",
                    MIN_FRAME_SIZE,
                    bytes.len()
                ),
            });
        }

        let declared = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        if declared != bytes.len() {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "Frame: declared size {} does not match buffer length {}",
                    declared,
                    bytes.len()
                ),
            });
        }

        if !validate_checksum(bytes) {
            return Err(ParseError::InvalidChecksum {
                message: "Frame: CRC mismatch".to_string(),
            });
        }

        let sync = u16::from_be_bytes([bytes[0], bytes[1]]);
        match FrameType::from_sync(sync)? {
            FrameType::Command => Ok(Frame::Command(CommandFrame::from_hex(bytes)?)),
            FrameType::Config1 => Ok(Frame::Config1(ConfigurationFrame::from_hex(bytes)?)),
            FrameType::Config2 => Ok(Frame::Config2(ConfigurationFrame::from_hex(bytes)?)),
            FrameType::Config3 => Ok(Frame::Config3(ConfigurationFrame::from_hex(bytes)?)),
            FrameType::Header => Ok(Frame::Header(HeaderFrame::from_hex(bytes)?)),
            FrameType::Data => {
                let config = config.ok_or_else(|| ParseError::InvalidFrameType {
                    message: "Frame: cannot decode a data frame without a configuration"
                        .to_string(),
                })?;
                Ok(Frame::Data(DataFrame::from_hex(bytes, config)?))
            }
        }
    }

    /// Serializes the frame in its variant's wire form.
    pub fn to_hex(&self) -> Vec<u8> {
        match self {
            Frame::Command(frame) => frame.to_hex(),
            Frame::Config1(frame) | Frame::Config2(frame) | Frame::Config3(frame) => {
                frame.to_hex()
            }
            Frame::Data(frame) => frame.to_hex(),
            Frame::Header(frame) => frame.to_hex(),
        }
    }

    pub fn frame_type(&self) -> FrameType {
        match self {
            Frame::Command(_) => FrameType::Command,
            Frame::Config1(_) => FrameType::Config1,
            Frame::Config2(_) => FrameType::Config2,
            Frame::Config3(_) => FrameType::Config3,
            Frame::Data(_) => FrameType::Data,
            Frame::Header(_) => FrameType::Header,
        }
    }

    pub fn idcode(&self) -> u16 {
        match self {
            Frame::Command(frame) => frame.prefix.idcode,
            Frame::Config1(frame) | Frame::Config2(frame) | Frame::Config3(frame) => {
                frame.prefix.idcode
            }
            Frame::Data(frame) => frame.prefix.idcode,
            Frame::Header(frame) => frame.prefix.idcode,
        }
    }

    /// Stamps the frame's prefix with a second-of-century / fractional-second
    /// pair.
    pub fn set_time(&mut self, soc: u32, fracsec: u32) {
        let prefix = match self {
            Frame::Command(frame) => &mut frame.prefix,
            Frame::Config1(frame) | Frame::Config2(frame) | Frame::Config3(frame) => {
                &mut frame.prefix
            }
            Frame::Data(frame) => &mut frame.prefix,
            Frame::Header(frame) => &mut frame.prefix,
        };
        prefix.set_time(soc, fracsec);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::random::{random_data_frame, sample_configuration_frame};

    #[test]
    fn test_decode_dispatch() {
        let config = sample_configuration_frame(7734, 30);

        let cmd = CommandFrame::new_turn_on_transmission(7734, None);
        assert!(matches!(
            Frame::decode(&cmd.to_hex(), None).unwrap(),
            Frame::Command(_)
        ));

        assert!(matches!(
            Frame::decode(&config.to_hex(), None).unwrap(),
            Frame::Config2(_)
        ));

        let header = HeaderFrame::new(7734, "Hi! I am tinyPMU!");
        assert!(matches!(
            Frame::decode(&header.to_hex(), None).unwrap(),
            Frame::Header(_)
        ));

        let data = random_data_frame(&config).unwrap();
        let decoded = Frame::decode(&data.to_hex(), Some(&config)).unwrap();
        assert!(matches!(decoded, Frame::Data(_)));
        assert_eq!(decoded.idcode(), 7734);
    }

    #[test]
    fn test_data_without_config_is_an_error() {
        let config = sample_configuration_frame(7734, 30);
        let data = random_data_frame(&config).unwrap();
        assert!(Frame::decode(&data.to_hex(), None).is_err());
    }

    #[test]
    fn test_declared_length_must_match() {
        let cmd = CommandFrame::new_turn_off_transmission(7734, None).to_hex();
        let mut padded = cmd.clone();
        padded.push(0x00);
        assert!(matches!(
            Frame::decode(&padded, None),
            Err(ParseError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_set_time_reaches_the_prefix() {
        let config = sample_configuration_frame(7734, 30);
        let mut frame = Frame::Config2(config);
        frame.set_time(1_149_580_800, 1234);
        let decoded = Frame::decode(&frame.to_hex(), None).unwrap();
        if let Frame::Config2(cfg) = decoded {
            assert_eq!(cfg.prefix.soc, 1_149_580_800);
            assert_eq!(cfg.prefix.fracsec, 1234);
        } else {
            panic!("expected a CFG-2 frame");
        }
    }
}

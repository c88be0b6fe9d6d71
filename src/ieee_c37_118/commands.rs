//! # Command frames
//!
//! Command frames carry collector instructions to the device: start or stop
//! real-time transmission, and request header or configuration frames. They
//! are the only frame variant a PMU endpoint receives.

use super::common::{
    create_sync, FrameType, ParseError, PrefixFrame, Version, MIN_FRAME_SIZE, PREFIX_SIZE,
};
use super::utils::{calculate_crc, validate_checksum};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Minimum size of a command frame: prefix + CMD field + CHK.
pub const MIN_COMMAND_SIZE: usize = MIN_FRAME_SIZE + 2;

/// An IEEE C37.118 command frame: prefix, 16-bit command code, optional
/// extended data, trailing CRC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandFrame {
    pub prefix: PrefixFrame,
    pub command: u16,
    pub extended_data: Option<Vec<u8>>,
    pub chk: u16,
}

/// Standard command codes carried in the CMD field.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum CommandType {
    TurnOffTransmission = 1,
    TurnOnTransmission = 2,
    SendHeaderFrame = 3,
    SendConfigFrame1 = 4,
    SendConfigFrame2 = 5,
    SendConfigFrame3 = 6,
    SendExtendedFrame = 8,
}

impl CommandFrame {
    /// Builds a command frame addressed to `idcode`.
    ///
    /// `time` is an optional `(soc, fracsec)` stamp; commands sent without
    /// one carry zeros.
    pub fn new(
        idcode: u16,
        cmd_type: CommandType,
        time: Option<(u32, u32)>,
        extended_data: Option<Vec<u8>>,
    ) -> Self {
        let ext_size = extended_data.as_ref().map_or(0, |data| data.len());
        let (soc, fracsec) = time.unwrap_or((0, 0));

        let prefix = PrefixFrame {
            sync: create_sync(Version::V2011, FrameType::Command),
            framesize: (MIN_COMMAND_SIZE + ext_size) as u16,
            idcode,
            soc,
            leapbyte: 0,
            fracsec,
            version: Version::V2011,
        };

        // CHK is recomputed by to_hex.
        CommandFrame {
            prefix,
            command: cmd_type as u16,
            extended_data,
            chk: 0,
        }
    }

    pub fn new_turn_on_transmission(idcode: u16, time: Option<(u32, u32)>) -> Self {
        Self::new(idcode, CommandType::TurnOnTransmission, time, None)
    }

    pub fn new_turn_off_transmission(idcode: u16, time: Option<(u32, u32)>) -> Self {
        Self::new(idcode, CommandType::TurnOffTransmission, time, None)
    }

    /// Parses a command frame from a complete frame buffer.
    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < MIN_COMMAND_SIZE {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "CommandFrame: Expected at least {} bytes, but got {}",
                    MIN_COMMAND_SIZE,
                    bytes.len()
                ),
            });
        }

        if !validate_checksum(bytes) {
            return Err(ParseError::InvalidChecksum {
                message: "CommandFrame: CRC mismatch".to_string(),
            });
        }

        let prefix = PrefixFrame::from_hex(&bytes[0..PREFIX_SIZE])?;
        if prefix.framesize as usize != bytes.len() {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "CommandFrame: Declared frame size {} does not match buffer length {}",
                    prefix.framesize,
                    bytes.len()
                ),
            });
        }

        let command = u16::from_be_bytes([bytes[14], bytes[15]]);
        let extended_data = if bytes.len() > MIN_COMMAND_SIZE {
            Some(bytes[16..bytes.len() - 2].to_vec())
        } else {
            None
        };
        let chk = u16::from_be_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);

        Ok(CommandFrame {
            prefix,
            command,
            extended_data,
            chk,
        })
    }

    /// Serializes the frame, recomputing the trailing CRC.
    pub fn to_hex(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.prefix.framesize as usize);
        result.extend_from_slice(&self.prefix.to_hex());
        result.extend_from_slice(&self.command.to_be_bytes());
        if let Some(data) = &self.extended_data {
            result.extend_from_slice(data);
        }
        let crc = calculate_crc(&result);
        result.extend_from_slice(&crc.to_be_bytes());
        result
    }

    /// The command code as an enum, or `None` for unrecognized codes.
    pub fn command_type(&self) -> Option<CommandType> {
        CommandType::try_from(self.command).ok()
    }

    /// Human-readable description for logs and events.
    pub fn command_description(&self) -> String {
        match self.command_type() {
            Some(cmd_type) => cmd_type.to_string(),
            None => format!("Unknown command ({})", self.command),
        }
    }
}

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandType::TurnOffTransmission => write!(f, "Turn OFF real-time data transmission"),
            CommandType::TurnOnTransmission => write!(f, "Turn ON real-time data transmission"),
            CommandType::SendHeaderFrame => write!(f, "Send Header frame"),
            CommandType::SendConfigFrame1 => write!(f, "Send Configuration frame 1"),
            CommandType::SendConfigFrame2 => write!(f, "Send Configuration frame 2"),
            CommandType::SendConfigFrame3 => write!(f, "Send Configuration frame 3"),
            CommandType::SendExtendedFrame => write!(f, "Send Extended frame"),
        }
    }
}

impl TryFrom<u16> for CommandType {
    type Error = ParseError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(CommandType::TurnOffTransmission),
            2 => Ok(CommandType::TurnOnTransmission),
            3 => Ok(CommandType::SendHeaderFrame),
            4 => Ok(CommandType::SendConfigFrame1),
            5 => Ok(CommandType::SendConfigFrame2),
            6 => Ok(CommandType::SendConfigFrame3),
            8 => Ok(CommandType::SendExtendedFrame),
            _ => Err(ParseError::InvalidFormat {
                message: format!("Invalid command type: {}", value),
            }),
        }
    }
}

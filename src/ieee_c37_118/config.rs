//! # Configuration frames
//!
//! Configuration frames describe the device's channel layout, data formats
//! and conversion scaling. CFG-2 is the authoritative description of what the
//! device currently streams; CFG-1 advertises capability and is derived from
//! CFG-2; CFG-3 is the extended descriptor a device may optionally carry.
//! A data frame can only be encoded or decoded against a configuration frame.

use super::common::{
    create_sync, FrameType, ParseError, PrefixFrame, Version, MIN_FRAME_SIZE, PREFIX_SIZE,
};
use super::phasors::PhasorType;
use super::units::{AnalogUnits, DataRate, DigitalUnits, NominalFrequency, PhasorUnits};
use super::utils::{calculate_crc, validate_checksum};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decoded view of the FORMAT word's four defined bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DataFormat {
    /// Bit 0: phasors in polar (true) or rectangular (false) coordinates.
    pub polar: bool,
    /// Bit 1: phasors as 32-bit floats (true) or 16-bit integers (false).
    pub phasor_float: bool,
    /// Bit 2: analogs as 32-bit floats (true) or 16-bit integers (false).
    pub analog_float: bool,
    /// Bit 3: FREQ/DFREQ as 32-bit floats (true) or 16-bit integers (false).
    pub freq_float: bool,
}

impl DataFormat {
    pub fn from_raw(raw: u16) -> Self {
        DataFormat {
            polar: raw & 0x0001 != 0,
            phasor_float: raw & 0x0002 != 0,
            analog_float: raw & 0x0004 != 0,
            freq_float: raw & 0x0008 != 0,
        }
    }

    pub fn to_raw(&self) -> u16 {
        (self.polar as u16)
            | (self.phasor_float as u16) << 1
            | (self.analog_float as u16) << 2
            | (self.freq_float as u16) << 3
    }

    /// The phasor encoding this format selects.
    pub fn phasor_type(&self) -> PhasorType {
        match (self.phasor_float, self.polar) {
            (false, false) => PhasorType::IntRect,
            (false, true) => PhasorType::IntPolar,
            (true, false) => PhasorType::FloatRect,
            (true, true) => PhasorType::FloatPolar,
        }
    }
}

/// Per-device section of a configuration frame: station name, channel
/// counts and names, formats and conversion factors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PmuConfig {
    pub stn: [u8; 16],
    pub idcode: u16,
    pub format: DataFormat,
    /// Channel names, phasors first, then analogs, then 16 per digital word.
    pub chnam: Vec<String>,
    pub phunit: Vec<PhasorUnits>,
    pub anunit: Vec<AnalogUnits>,
    pub digunit: Vec<DigitalUnits>,
    pub fnom: NominalFrequency,
    pub cfgcnt: u16,
}

impl PmuConfig {
    /// Number of phasor channels.
    pub fn phnmr(&self) -> u16 {
        self.phunit.len() as u16
    }

    /// Number of analog channels.
    pub fn annmr(&self) -> u16 {
        self.anunit.len() as u16
    }

    /// Number of digital status words.
    pub fn dgnmr(&self) -> u16 {
        self.digunit.len() as u16
    }

    /// Station name with wire padding trimmed.
    pub fn station_name(&self) -> String {
        String::from_utf8_lossy(&self.stn).trim_end().to_string()
    }

    /// Sets the station name, truncated or space-padded to 16 bytes.
    pub fn set_station_name(&mut self, name: &str) {
        self.stn = pad_name(name);
    }

    /// Checks the channel-name count against the channel counts. The wire
    /// format requires one name per phasor, one per analog and 16 per
    /// digital word.
    pub fn validate(&self) -> Result<(), ParseError> {
        let expected = (self.phnmr() + self.annmr() + 16 * self.dgnmr()) as usize;
        if self.chnam.len() != expected {
            return Err(ParseError::InvalidFormat {
                message: format!(
                    "PmuConfig: expected {} channel names, got {}",
                    expected,
                    self.chnam.len()
                ),
            });
        }
        Ok(())
    }

    pub fn phasor_size(&self) -> usize {
        if self.format.phasor_float {
            8
        } else {
            4
        }
    }

    pub fn analog_size(&self) -> usize {
        if self.format.analog_float {
            4
        } else {
            2
        }
    }

    pub fn freq_dfreq_size(&self) -> usize {
        if self.format.freq_float {
            4
        } else {
            2
        }
    }

    /// Encoded size of this section in a configuration frame.
    pub fn size(&self) -> usize {
        let chnam_len = 16 * self.chnam.len();
        let unit_len = 4 * (self.phnmr() + self.annmr() + self.dgnmr()) as usize;
        // STN + IDCODE + FORMAT + PHNMR + ANNMR + DGNMR + names + units + FNOM + CFGCNT
        16 + 2 + 2 + 6 + chnam_len + unit_len + 2 + 2
    }

    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < 26 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "PmuConfig: expected at least 26 bytes, got {}",
                    bytes.len()
                ),
            });
        }
        let mut offset = 0;
        let stn: [u8; 16] = bytes[0..16].try_into().unwrap();
        offset += 16;
        let idcode = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;
        let format = DataFormat::from_raw(u16::from_be_bytes([bytes[offset], bytes[offset + 1]]));
        offset += 2;
        let phnmr = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;
        let annmr = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;
        let dgnmr = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;

        let name_count = (phnmr + annmr + 16 * dgnmr) as usize;
        let needed = offset + 16 * name_count + 4 * (phnmr + annmr + dgnmr) as usize + 4;
        if bytes.len() < needed {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "PmuConfig: expected {} bytes for declared channel counts, got {}",
                    needed,
                    bytes.len()
                ),
            });
        }

        let mut chnam = Vec::with_capacity(name_count);
        for _ in 0..name_count {
            let chunk = &bytes[offset..offset + 16];
            chnam.push(String::from_utf8_lossy(chunk).trim_end().to_string());
            offset += 16;
        }

        let mut phunit = Vec::with_capacity(phnmr as usize);
        for _ in 0..phnmr {
            phunit.push(PhasorUnits::from_hex(&bytes[offset..offset + 4])?);
            offset += 4;
        }
        let mut anunit = Vec::with_capacity(annmr as usize);
        for _ in 0..annmr {
            anunit.push(AnalogUnits::from_hex(&bytes[offset..offset + 4])?);
            offset += 4;
        }
        let mut digunit = Vec::with_capacity(dgnmr as usize);
        for _ in 0..dgnmr {
            digunit.push(DigitalUnits::from_hex(&bytes[offset..offset + 4])?);
            offset += 4;
        }

        let fnom = NominalFrequency::from_hex(&bytes[offset..offset + 2])?;
        offset += 2;
        let cfgcnt = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);

        Ok(PmuConfig {
            stn,
            idcode,
            format,
            chnam,
            phunit,
            anunit,
            digunit,
            fnom,
            cfgcnt,
        })
    }

    pub fn to_hex(&self) -> Vec<u8> {
        let mut result = Vec::with_capacity(self.size());
        result.extend_from_slice(&self.stn);
        result.extend_from_slice(&self.idcode.to_be_bytes());
        result.extend_from_slice(&self.format.to_raw().to_be_bytes());
        result.extend_from_slice(&self.phnmr().to_be_bytes());
        result.extend_from_slice(&self.annmr().to_be_bytes());
        result.extend_from_slice(&self.dgnmr().to_be_bytes());
        for name in &self.chnam {
            result.extend_from_slice(&pad_name(name));
        }
        for ph in &self.phunit {
            result.extend_from_slice(&ph.to_hex());
        }
        for an in &self.anunit {
            result.extend_from_slice(&an.to_hex());
        }
        for dg in &self.digunit {
            result.extend_from_slice(&dg.to_hex());
        }
        result.extend_from_slice(&self.fnom.to_hex());
        result.extend_from_slice(&self.cfgcnt.to_be_bytes());
        result
    }
}

/// Truncates or space-pads a name to the 16-byte field the wire carries.
fn pad_name(name: &str) -> [u8; 16] {
    let mut field = [b' '; 16];
    let bytes = name.as_bytes();
    let len = bytes.len().min(16);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

/// A complete configuration frame (CFG-1, CFG-2 or CFG-3) for a single
/// device. Multi-device aggregation frames (NUM_PMU > 1) are rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigurationFrame {
    pub prefix: PrefixFrame,
    pub time_base: u32,
    pub pmu: PmuConfig,
    pub data_rate: i16,
    pub chk: u16,
    pub cfg_type: u8,
}

impl ConfigurationFrame {
    /// Builds a CFG-2 frame for a single device.
    pub fn new_config2(
        idcode: u16,
        time_base: u32,
        pmu: PmuConfig,
        data_rate: i16,
    ) -> Result<Self, ParseError> {
        pmu.validate()?;
        let prefix = PrefixFrame::new(FrameType::Config2, idcode, Version::V2011);
        let mut frame = ConfigurationFrame {
            prefix,
            time_base,
            pmu,
            data_rate,
            chk: 0,
            cfg_type: 2,
        };
        frame.prefix.framesize = frame.size() as u16;
        Ok(frame)
    }

    /// Encoded frame size in bytes.
    pub fn size(&self) -> usize {
        // prefix + TIME_BASE + NUM_PMU + pmu section + DATA_RATE + CHK
        PREFIX_SIZE + 4 + 2 + self.pmu.size() + 2 + 2
    }

    pub fn from_hex(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.len() < MIN_FRAME_SIZE + 8 {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "ConfigurationFrame: Expected at least {} bytes, got {}",
                    MIN_FRAME_SIZE + 8,
                    bytes.len()
                ),
            });
        }

        let prefix = PrefixFrame::from_hex(bytes)?;
        let frame_type = FrameType::from_sync(prefix.sync)?;
        let cfg_type = match frame_type {
            FrameType::Config1 => 1,
            FrameType::Config2 => 2,
            FrameType::Config3 => 3,
            _ => {
                return Err(ParseError::InvalidFrameType {
                    message: format!(
                        "ConfigurationFrame: Expected a configuration frame type, got {}",
                        frame_type
                    ),
                })
            }
        };

        if prefix.framesize as usize != bytes.len() {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "ConfigurationFrame: Declared frame size {} does not match buffer length {}",
                    prefix.framesize,
                    bytes.len()
                ),
            });
        }

        if !validate_checksum(bytes) {
            return Err(ParseError::InvalidChecksum {
                message: "ConfigurationFrame: CRC mismatch".to_string(),
            });
        }

        let mut offset = PREFIX_SIZE;
        let time_base = u32::from_be_bytes(bytes[offset..offset + 4].try_into().unwrap());
        offset += 4;
        let num_pmu = u16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        offset += 2;

        if num_pmu != 1 {
            return Err(ParseError::InvalidFormat {
                message: format!(
                    "ConfigurationFrame: single-device frames only, got NUM_PMU = {}",
                    num_pmu
                ),
            });
        }

        let pmu = PmuConfig::from_hex(&bytes[offset..bytes.len() - 4])?;
        offset += pmu.size();

        if offset + 4 != bytes.len() {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "ConfigurationFrame: {} trailing bytes after PMU section, expected 4",
                    bytes.len() - offset
                ),
            });
        }

        let data_rate = i16::from_be_bytes([bytes[offset], bytes[offset + 1]]);
        let chk = u16::from_be_bytes([bytes[offset + 2], bytes[offset + 3]]);

        Ok(ConfigurationFrame {
            prefix,
            time_base,
            pmu,
            data_rate,
            chk,
            cfg_type,
        })
    }

    /// Serializes the frame, recomputing FRAMESIZE and the trailing CRC.
    pub fn to_hex(&self) -> Vec<u8> {
        let frame_size = self.size();
        let mut prefix = self.prefix.clone();
        prefix.framesize = frame_size as u16;

        let mut result = Vec::with_capacity(frame_size);
        result.extend_from_slice(&prefix.to_hex());
        result.extend_from_slice(&self.time_base.to_be_bytes());
        result.extend_from_slice(&1u16.to_be_bytes()); // NUM_PMU
        result.extend_from_slice(&self.pmu.to_hex());
        result.extend_from_slice(&self.data_rate.to_be_bytes());
        let chk = calculate_crc(&result);
        result.extend_from_slice(&chk.to_be_bytes());
        result
    }

    /// Derives the CFG-1 capability frame from this configuration: same
    /// content under the CFG-1 discriminator. This frame is not modified.
    pub fn to_config1(&self) -> ConfigurationFrame {
        let mut cfg1 = self.clone();
        cfg1.cfg_type = 1;
        cfg1.prefix.sync = create_sync(self.prefix.version, FrameType::Config1);
        cfg1
    }

    /// Updates the stream and device IDCODE.
    pub fn set_id_code(&mut self, idcode: u16) {
        self.prefix.idcode = idcode;
        self.pmu.idcode = idcode;
    }

    pub fn set_data_rate(&mut self, data_rate: i16) {
        self.data_rate = data_rate;
    }

    /// Pacing interval between consecutive data frames at this rate.
    pub fn interval(&self) -> Duration {
        DataRate::new(self.data_rate).interval()
    }

    /// Expected encoded size of a data frame governed by this configuration.
    pub fn calc_data_frame_size(&self) -> usize {
        MIN_FRAME_SIZE
            + 2 // STAT
            + self.pmu.phasor_size() * self.pmu.phnmr() as usize
            + 2 * self.pmu.freq_dfreq_size()
            + self.pmu.analog_size() * self.pmu.annmr() as usize
            + 2 * self.pmu.dgnmr() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::random::sample_configuration_frame;

    #[test]
    fn test_config2_round_trip() {
        let frame = sample_configuration_frame(7734, 30);
        let bytes = frame.to_hex();

        assert_eq!(bytes.len(), frame.size());
        assert_eq!(u16::from_be_bytes([bytes[2], bytes[3]]), bytes.len() as u16);
        assert!(validate_checksum(&bytes));

        let parsed = ConfigurationFrame::from_hex(&bytes).unwrap();
        assert_eq!(parsed.cfg_type, 2);
        assert_eq!(parsed.prefix.idcode, 7734);
        assert_eq!(parsed.data_rate, 30);
        assert_eq!(parsed.time_base, 1_000_000);
        assert_eq!(parsed.pmu.station_name(), "Station A");
        assert_eq!(parsed.pmu.phnmr(), 4);
        assert_eq!(parsed.pmu.annmr(), 3);
        assert_eq!(parsed.pmu.dgnmr(), 1);
        assert_eq!(parsed.pmu.chnam.len(), 4 + 3 + 16);
        assert_eq!(parsed.pmu.chnam[0], "VA");
        assert_eq!(parsed.pmu.phunit[3], PhasorUnits::current(45776));
    }

    #[test]
    fn test_config1_derivation_is_pure() {
        let cfg2 = sample_configuration_frame(7734, 30);
        let cfg1 = cfg2.to_config1();

        assert_eq!(cfg1.cfg_type, 1);
        assert_eq!(cfg2.cfg_type, 2);
        assert_eq!(
            FrameType::from_sync(cfg1.prefix.sync).unwrap(),
            FrameType::Config1
        );
        assert_eq!(
            FrameType::from_sync(cfg2.prefix.sync).unwrap(),
            FrameType::Config2
        );

        // Same content, different discriminator.
        let parsed = ConfigurationFrame::from_hex(&cfg1.to_hex()).unwrap();
        assert_eq!(parsed.cfg_type, 1);
        assert_eq!(parsed.pmu.station_name(), cfg2.pmu.station_name());
        assert_eq!(parsed.data_rate, cfg2.data_rate);
    }

    #[test]
    fn test_set_id_code_updates_both_levels() {
        let mut frame = sample_configuration_frame(7734, 30);
        frame.set_id_code(780);
        assert_eq!(frame.prefix.idcode, 780);
        assert_eq!(frame.pmu.idcode, 780);
    }

    #[test]
    fn test_multi_pmu_rejected() {
        let frame = sample_configuration_frame(7734, 30);
        let mut bytes = frame.to_hex();
        // Overwrite NUM_PMU.
        bytes[18..20].copy_from_slice(&2u16.to_be_bytes());
        let body_len = bytes.len() - 2;
        let chk = calculate_crc(&bytes[..body_len]);
        bytes[body_len..].copy_from_slice(&chk.to_be_bytes());

        assert!(matches!(
            ConfigurationFrame::from_hex(&bytes),
            Err(ParseError::InvalidFormat { .. })
        ));
    }

    #[test]
    fn test_channel_name_count_validated() {
        let mut frame = sample_configuration_frame(7734, 30);
        frame.pmu.chnam.pop();
        assert!(frame.pmu.validate().is_err());
    }

    #[test]
    fn test_corrupted_config_rejected() {
        let frame = sample_configuration_frame(7734, 30);
        let mut bytes = frame.to_hex();
        bytes[20] ^= 0xFF;
        assert!(matches!(
            ConfigurationFrame::from_hex(&bytes),
            Err(ParseError::InvalidChecksum { .. })
        ));
    }

    #[test]
    fn test_data_frame_size_for_int_formats() {
        let frame = sample_configuration_frame(7734, 30);
        // 16 envelope + 2 stat + 4*4 phasors + 2*2 freq + 3*2 analogs + 2 digital
        assert_eq!(frame.calc_data_frame_size(), 16 + 2 + 16 + 4 + 6 + 2);
    }
}

//! # Data frames
//!
//! A data frame carries one measurement instant: a STAT word, phasor
//! samples, frequency and rate-of-change-of-frequency, analog values and
//! digital status words. The wire layout has no self-describing structure
//! beyond the common prefix, so both encoding and decoding require the
//! governing CFG-2 frame.

use super::common::{
    create_sync, FrameType, ParseError, PrefixFrame, StatField, Version, PREFIX_SIZE,
};
use super::config::ConfigurationFrame;
use super::phasors::{PhasorType, PhasorValue};
use super::utils::{calculate_crc, validate_checksum};

/// FREQ or DFREQ sample in the format the FORMAT word selects.
///
/// Fixed-point FREQ is the deviation from nominal in millihertz; fixed-point
/// DFREQ is ROCOF in hundredths of hertz per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FreqValue {
    Fixed(i16),
    Float(f32),
}

/// Analog channel sample in the format the FORMAT word selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnalogValue {
    Fixed(i16),
    Float(f32),
}

/// A single-device IEEE C37.118 data frame.
#[derive(Debug, Clone)]
pub struct DataFrame {
    pub prefix: PrefixFrame,
    pub stat: StatField,
    pub phasors: Vec<PhasorValue>,
    pub freq: FreqValue,
    pub dfreq: FreqValue,
    pub analog: Vec<AnalogValue>,
    pub digital: Vec<u16>,
    pub chk: u16,
}

impl DataFrame {
    /// Builds a data frame for the given configuration, validating that the
    /// measurement counts and encodings match the configured channel layout.
    pub fn new(
        config: &ConfigurationFrame,
        stat: StatField,
        phasors: Vec<PhasorValue>,
        freq: FreqValue,
        dfreq: FreqValue,
        analog: Vec<AnalogValue>,
        digital: Vec<u16>,
    ) -> Result<Self, ParseError> {
        if phasors.len() != config.pmu.phnmr() as usize {
            return Err(ParseError::InvalidFormat {
                message: format!(
                    "DataFrame: expected {} phasors, got {}",
                    config.pmu.phnmr(),
                    phasors.len()
                ),
            });
        }
        let expected_type = config.pmu.format.phasor_type();
        for phasor in &phasors {
            if phasor.get_type() != expected_type {
                return Err(ParseError::InvalidPhasorType {
                    message: format!(
                        "DataFrame: configuration selects {} phasors, got {}",
                        expected_type,
                        phasor.get_type()
                    ),
                });
            }
        }
        if analog.len() != config.pmu.annmr() as usize {
            return Err(ParseError::InvalidFormat {
                message: format!(
                    "DataFrame: expected {} analog values, got {}",
                    config.pmu.annmr(),
                    analog.len()
                ),
            });
        }
        if digital.len() != config.pmu.dgnmr() as usize {
            return Err(ParseError::InvalidFormat {
                message: format!(
                    "DataFrame: expected {} digital words, got {}",
                    config.pmu.dgnmr(),
                    digital.len()
                ),
            });
        }
        check_freq_format(&freq, config, "FREQ")?;
        check_freq_format(&dfreq, config, "DFREQ")?;
        for value in &analog {
            let is_float = matches!(value, AnalogValue::Float(_));
            if is_float != config.pmu.format.analog_float {
                return Err(ParseError::InvalidFormat {
                    message: "DataFrame: analog value format does not match configuration"
                        .to_string(),
                });
            }
        }

        let mut prefix = PrefixFrame::new(FrameType::Data, config.prefix.idcode, Version::V2011);
        prefix.sync = create_sync(config.prefix.version, FrameType::Data);
        prefix.framesize = config.calc_data_frame_size() as u16;

        Ok(DataFrame {
            prefix,
            stat,
            phasors,
            freq,
            dfreq,
            analog,
            digital,
            chk: 0,
        })
    }

    /// Parses a data frame against its governing configuration.
    pub fn from_hex(bytes: &[u8], config: &ConfigurationFrame) -> Result<Self, ParseError> {
        let expected = config.calc_data_frame_size();
        if bytes.len() != expected {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "DataFrame: expected {} bytes for the configured layout, got {}",
                    expected,
                    bytes.len()
                ),
            });
        }

        if !validate_checksum(bytes) {
            return Err(ParseError::InvalidChecksum {
                message: "DataFrame: CRC mismatch".to_string(),
            });
        }

        let prefix = PrefixFrame::from_hex(bytes)?;
        if prefix.framesize as usize != bytes.len() {
            return Err(ParseError::InvalidLength {
                message: format!(
                    "DataFrame: Declared frame size {} does not match buffer length {}",
                    prefix.framesize,
                    bytes.len()
                ),
            });
        }

        let mut offset = PREFIX_SIZE;
        let stat = StatField::from_raw(u16::from_be_bytes([bytes[offset], bytes[offset + 1]]));
        offset += 2;

        let phasor_type = config.pmu.format.phasor_type();
        let phasor_size = config.pmu.phasor_size();
        let mut phasors = Vec::with_capacity(config.pmu.phnmr() as usize);
        for _ in 0..config.pmu.phnmr() {
            phasors.push(PhasorValue::from_hex(
                &bytes[offset..offset + phasor_size],
                phasor_type,
            )?);
            offset += phasor_size;
        }

        let freq = read_freq(bytes, &mut offset, config.pmu.format.freq_float);
        let dfreq = read_freq(bytes, &mut offset, config.pmu.format.freq_float);

        let mut analog = Vec::with_capacity(config.pmu.annmr() as usize);
        for _ in 0..config.pmu.annmr() {
            if config.pmu.format.analog_float {
                analog.push(AnalogValue::Float(f32::from_be_bytes(
                    bytes[offset..offset + 4].try_into().unwrap(),
                )));
                offset += 4;
            } else {
                analog.push(AnalogValue::Fixed(i16::from_be_bytes([
                    bytes[offset],
                    bytes[offset + 1],
                ])));
                offset += 2;
            }
        }

        let mut digital = Vec::with_capacity(config.pmu.dgnmr() as usize);
        for _ in 0..config.pmu.dgnmr() {
            digital.push(u16::from_be_bytes([bytes[offset], bytes[offset + 1]]));
            offset += 2;
        }

        let chk = u16::from_be_bytes([bytes[bytes.len() - 2], bytes[bytes.len() - 1]]);

        Ok(DataFrame {
            prefix,
            stat,
            phasors,
            freq,
            dfreq,
            analog,
            digital,
            chk,
        })
    }

    /// Serializes the frame, recomputing FRAMESIZE and the trailing CRC.
    pub fn to_hex(&self) -> Vec<u8> {
        let mut body = Vec::new();
        body.extend_from_slice(&self.stat.to_raw().to_be_bytes());
        for phasor in &self.phasors {
            body.extend_from_slice(&phasor.to_hex());
        }
        write_freq(&mut body, self.freq);
        write_freq(&mut body, self.dfreq);
        for value in &self.analog {
            match value {
                AnalogValue::Fixed(v) => body.extend_from_slice(&v.to_be_bytes()),
                AnalogValue::Float(v) => body.extend_from_slice(&v.to_be_bytes()),
            }
        }
        for word in &self.digital {
            body.extend_from_slice(&word.to_be_bytes());
        }

        let mut prefix = self.prefix.clone();
        prefix.framesize = (PREFIX_SIZE + body.len() + 2) as u16;

        let mut result = Vec::with_capacity(prefix.framesize as usize);
        result.extend_from_slice(&prefix.to_hex());
        result.extend_from_slice(&body);
        let chk = calculate_crc(&result);
        result.extend_from_slice(&chk.to_be_bytes());
        result
    }

    /// Phasor samples in physical units (polar), scaled by the channel
    /// PHUNIT factors from the governing configuration.
    pub fn scaled_phasors(
        &self,
        config: &ConfigurationFrame,
    ) -> Result<Vec<super::phasors::PhasorFloatPolar>, ParseError> {
        self.phasors
            .iter()
            .zip(&config.pmu.phunit)
            .map(|(phasor, unit)| phasor.to_float_polar(Some(unit.scale_factor)))
            .collect()
    }

    /// Actual frequency in hertz: nominal plus the millihertz deviation for
    /// fixed-point data, the carried value for floats.
    pub fn frequency_hz(&self, config: &ConfigurationFrame) -> f32 {
        match self.freq {
            FreqValue::Fixed(deviation) => config.pmu.fnom.hz() + deviation as f32 / 1000.0,
            FreqValue::Float(hz) => hz,
        }
    }
}

fn check_freq_format(
    value: &FreqValue,
    config: &ConfigurationFrame,
    field: &str,
) -> Result<(), ParseError> {
    let is_float = matches!(value, FreqValue::Float(_));
    if is_float != config.pmu.format.freq_float {
        return Err(ParseError::InvalidFormat {
            message: format!(
                "DataFrame: {} format does not match configuration",
                field
            ),
        });
    }
    Ok(())
}

fn read_freq(bytes: &[u8], offset: &mut usize, float: bool) -> FreqValue {
    if float {
        let value = f32::from_be_bytes(bytes[*offset..*offset + 4].try_into().unwrap());
        *offset += 4;
        FreqValue::Float(value)
    } else {
        let value = i16::from_be_bytes([bytes[*offset], bytes[*offset + 1]]);
        *offset += 2;
        FreqValue::Fixed(value)
    }
}

fn write_freq(buf: &mut Vec<u8>, value: FreqValue) {
    match value {
        FreqValue::Fixed(v) => buf.extend_from_slice(&v.to_be_bytes()),
        FreqValue::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ieee_c37_118::phasors::PhasorIntRect;
    use crate::ieee_c37_118::random::sample_configuration_frame;

    fn sample_frame(config: &ConfigurationFrame) -> DataFrame {
        DataFrame::new(
            config,
            StatField::ok(),
            vec![
                PhasorValue::IntRect(PhasorIntRect { real: 14635, imag: 0 }),
                PhasorValue::IntRect(PhasorIntRect {
                    real: -7318,
                    imag: -12676,
                }),
                PhasorValue::IntRect(PhasorIntRect {
                    real: -7318,
                    imag: 12675,
                }),
                PhasorValue::IntRect(PhasorIntRect { real: 1092, imag: 0 }),
            ],
            FreqValue::Fixed(2500),
            FreqValue::Fixed(0),
            vec![
                AnalogValue::Fixed(100),
                AnalogValue::Fixed(1000),
                AnalogValue::Fixed(10000),
            ],
            vec![0x3C12],
        )
        .unwrap()
    }

    #[test]
    fn test_data_frame_round_trip() {
        let config = sample_configuration_frame(7734, 30);
        let mut frame = sample_frame(&config);
        frame.prefix.set_time(1_149_580_800, 16_817);

        let bytes = frame.to_hex();
        assert_eq!(bytes.len(), config.calc_data_frame_size());
        assert!(validate_checksum(&bytes));

        let parsed = DataFrame::from_hex(&bytes, &config).unwrap();
        assert_eq!(parsed.prefix.idcode, 7734);
        assert_eq!(parsed.prefix.soc, 1_149_580_800);
        assert_eq!(parsed.stat, StatField::ok());
        assert_eq!(parsed.phasors.len(), 4);
        assert_eq!(parsed.freq, FreqValue::Fixed(2500));
        assert_eq!(parsed.analog[2], AnalogValue::Fixed(10000));
        assert_eq!(parsed.digital, vec![0x3C12]);
    }

    #[test]
    fn test_count_and_format_validation() {
        let config = sample_configuration_frame(7734, 30);

        // Too few phasors.
        let err = DataFrame::new(
            &config,
            StatField::ok(),
            vec![PhasorValue::IntRect(PhasorIntRect { real: 0, imag: 0 })],
            FreqValue::Fixed(0),
            FreqValue::Fixed(0),
            vec![AnalogValue::Fixed(0); 3],
            vec![0],
        );
        assert!(matches!(err, Err(ParseError::InvalidFormat { .. })));

        // Float FREQ against an integer-format configuration.
        let mut frame = sample_frame(&config);
        frame.freq = FreqValue::Float(60.0);
        let err = DataFrame::new(
            &config,
            frame.stat,
            frame.phasors.clone(),
            frame.freq,
            frame.dfreq,
            frame.analog.clone(),
            frame.digital.clone(),
        );
        assert!(matches!(err, Err(ParseError::InvalidFormat { .. })));
    }

    #[test]
    fn test_wrong_length_rejected() {
        let config = sample_configuration_frame(7734, 30);
        let bytes = sample_frame(&config).to_hex();
        assert!(matches!(
            DataFrame::from_hex(&bytes[..bytes.len() - 1], &config),
            Err(ParseError::InvalidLength { .. })
        ));
    }

    #[test]
    fn test_scaled_accessors() {
        let config = sample_configuration_frame(7734, 30);
        let frame = sample_frame(&config);

        let scaled = frame.scaled_phasors(&config).unwrap();
        // Voltage A: raw 14635 with factor 915527 is about 134 kV.
        assert!((scaled[0].magnitude - 134_000.0).abs() < 1000.0);
        // Current I1: raw 1092 with factor 45776 is about 500 A.
        assert!((scaled[3].magnitude - 500.0).abs() < 1.0);

        // Fixed FREQ 2500 mHz above a 60 Hz nominal.
        assert!((frame.frequency_hz(&config) - 62.5).abs() < 0.001);
    }
}

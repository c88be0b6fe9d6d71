//! Sample and randomized frame generators for tests and demo harnesses.

use super::common::{ParseError, StatField};
use super::config::{ConfigurationFrame, DataFormat, PmuConfig};
use super::data_frame::{AnalogValue, DataFrame, FreqValue};
use super::phasors::{PhasorIntRect, PhasorValue};
use super::units::{AnalogUnits, DigitalUnits, MeasurementType, NominalFrequency, PhasorUnits};
use rand::Rng;

/// A CFG-2 frame for a small three-phase station: four integer-rectangular
/// phasors (VA, VB, VC, I1) with the standard's worked conversion factors,
/// three analogs and one digital status word at 60 Hz nominal.
pub fn sample_configuration_frame(idcode: u16, data_rate: i16) -> ConfigurationFrame {
    let mut chnam: Vec<String> = ["VA", "VB", "VC", "I1", "ANALOG1", "ANALOG2", "ANALOG3"]
        .iter()
        .map(|name| name.to_string())
        .collect();
    for i in 1..=16 {
        chnam.push(format!("BREAKER {} STATUS", i));
    }

    let mut pmu = PmuConfig {
        stn: [b' '; 16],
        idcode,
        format: DataFormat::default(),
        chnam,
        phunit: vec![
            PhasorUnits::voltage(915527),
            PhasorUnits::voltage(915527),
            PhasorUnits::voltage(915527),
            PhasorUnits::current(45776),
        ],
        anunit: vec![
            AnalogUnits::new(MeasurementType::SinglePointOnWave, 1),
            AnalogUnits::new(MeasurementType::RmsOfAnalogInput, 1),
            AnalogUnits::new(MeasurementType::PeakOfAnalogInput, 1),
        ],
        digunit: vec![DigitalUnits::all_valid()],
        fnom: NominalFrequency::Hz60,
        cfgcnt: 22,
    };
    pmu.set_station_name("Station A");

    // The fixture's layout is valid by construction.
    ConfigurationFrame::new_config2(idcode, 1_000_000, pmu, data_rate)
        .expect("sample configuration is well formed")
}

/// A data frame with randomized measurements matching the given
/// configuration. Only integer formats are generated; the sample
/// configuration uses them exclusively.
pub fn random_data_frame(config: &ConfigurationFrame) -> Result<DataFrame, ParseError> {
    let mut rng = rand::rng();

    let mut phasors = Vec::with_capacity(config.pmu.phnmr() as usize);
    for _ in 0..config.pmu.phnmr() {
        phasors.push(PhasorValue::IntRect(PhasorIntRect {
            real: rng.random_range(14135..14435),
            imag: rng.random_range(-12176..12176),
        }));
    }

    let freq = FreqValue::Fixed(rng.random_range(-100..100));
    let dfreq = FreqValue::Fixed(0);

    let mut analog = Vec::with_capacity(config.pmu.annmr() as usize);
    for _ in 0..config.pmu.annmr() {
        analog.push(AnalogValue::Fixed(rng.random_range(300..400)));
    }

    let mut digital = Vec::with_capacity(config.pmu.dgnmr() as usize);
    for _ in 0..config.pmu.dgnmr() {
        digital.push(rng.random_range(0..0x7FFF) as u16);
    }

    DataFrame::new(
        config,
        StatField::ok(),
        phasors,
        freq,
        dfreq,
        analog,
        digital,
    )
}

//! Cross-variant codec tests: every frame kind through the `Frame` decode
//! surface, plus integrity checks a conformant endpoint must enforce.

use super::commands::{CommandFrame, CommandType};
use super::common::{FrameType, ParseError};
use super::frame::Frame;
use super::header::HeaderFrame;
use super::random::{random_data_frame, sample_configuration_frame};

#[test]
fn every_variant_round_trips_through_frame_decode() {
    let config = sample_configuration_frame(7734, 30);

    let frames = vec![
        Frame::Command(CommandFrame::new(
            7734,
            CommandType::SendConfigFrame2,
            Some((1_149_577_200, 0)),
            None,
        )),
        Frame::Config1(config.to_config1()),
        Frame::Config2(config.clone()),
        Frame::Header(HeaderFrame::new(7734, "Hi! I am tinyPMU!")),
        Frame::Data(random_data_frame(&config).unwrap()),
    ];

    for frame in frames {
        let bytes = frame.to_hex();
        let declared = u16::from_be_bytes([bytes[2], bytes[3]]) as usize;
        assert_eq!(declared, bytes.len(), "{} framesize", frame.frame_type());

        let decoded = Frame::decode(&bytes, Some(&config)).unwrap();
        assert_eq!(decoded.frame_type(), frame.frame_type());
        assert_eq!(decoded.idcode(), 7734);
        assert_eq!(decoded.to_hex(), bytes, "{} re-encode", frame.frame_type());
    }
}

#[test]
fn single_byte_corruption_is_always_detected() {
    let config = sample_configuration_frame(780, 5);
    let bytes = config.to_hex();

    for i in 0..bytes.len() {
        let mut corrupted = bytes.clone();
        corrupted[i] ^= 0x01;
        assert!(
            Frame::decode(&corrupted, None).is_err(),
            "corruption at byte {} went undetected",
            i
        );
    }
}

#[test]
fn truncated_and_padded_buffers_are_rejected() {
    let cmd = CommandFrame::new_turn_on_transmission(1, None).to_hex();

    for len in 0..cmd.len() {
        assert!(Frame::decode(&cmd[..len], None).is_err());
    }

    let mut padded = cmd;
    padded.extend_from_slice(&[0, 0, 0, 0]);
    assert!(matches!(
        Frame::decode(&padded, None),
        Err(ParseError::InvalidLength { .. })
    ));
}

#[test]
fn cfg3_discriminator_round_trips() {
    // A device that carries CFG-3 encodes it under the CFG-3 sync bits with
    // the same body layout.
    let mut cfg3 = sample_configuration_frame(7734, 30);
    cfg3.cfg_type = 3;
    cfg3.prefix.sync = super::common::create_sync(cfg3.prefix.version, FrameType::Config3);

    let decoded = Frame::decode(&cfg3.to_hex(), None).unwrap();
    assert_eq!(decoded.frame_type(), FrameType::Config3);
}

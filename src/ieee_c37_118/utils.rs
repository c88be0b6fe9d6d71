//! CRC calculation/validation and SOC/FRACSEC timestamping.

use std::time::{SystemTime, UNIX_EPOCH};

/// CRC-CCITT over a byte slice: polynomial 0x1021, initial value 0xFFFF,
/// no final XOR. Every IEEE C37.118 frame carries this over all bytes
/// except the trailing CHK field itself.
pub fn calculate_crc(data: &[u8]) -> u16 {
    let mut crc: u16 = 0xFFFF;
    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ 0x1021;
            } else {
                crc <<= 1;
            }
        }
    }
    crc
}

/// Checks a complete frame's trailing CHK against the CRC of the bytes
/// ahead of it. Frames shorter than the checksum itself fail.
pub fn validate_checksum(frame: &[u8]) -> bool {
    if frame.len() < 2 {
        return false;
    }
    let (body, chk) = frame.split_at(frame.len() - 2);
    calculate_crc(body) == u16::from_be_bytes([chk[0], chk[1]])
}

/// Current time as a (SOC, FRACSEC) pair: whole seconds since the UNIX
/// epoch and the sub-second fraction in TIME_BASE units, masked to the
/// 24 bits the wire format carries.
pub fn now_soc_fracsec(time_base: u32) -> (u32, u32) {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    let soc = now.as_secs() as u32;
    let fracsec = (now.subsec_nanos() as u64 * time_base as u64 / 1_000_000_000) as u32;
    (soc, fracsec & 0x00FF_FFFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crc_known_vector() {
        // "123456789" is the standard CRC-CCITT (FALSE) check string.
        assert_eq!(calculate_crc(b"123456789"), 0x29B1);
        assert_eq!(calculate_crc(&[]), 0xFFFF);
    }

    #[test]
    fn test_validate_checksum() {
        let mut frame = b"123456789".to_vec();
        frame.extend_from_slice(&0x29B1u16.to_be_bytes());
        assert!(validate_checksum(&frame));

        frame[3] ^= 0x01;
        assert!(!validate_checksum(&frame));
        assert!(!validate_checksum(&[0xAA]));
    }

    #[test]
    fn test_now_soc_fracsec_in_range() {
        let (soc, fracsec) = now_soc_fracsec(1_000_000);
        assert!(soc > 1_700_000_000);
        assert!(fracsec < 1_000_000);
    }
}

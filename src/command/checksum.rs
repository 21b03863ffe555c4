//! # Command Checksum
//!
//! JJRC checksum: the first payload byte minus every following payload byte,
//! wrapping modulo 256.

use super::protocol::COMMAND_PAYLOAD_SIZE;

/// Calculate the checksum over a command payload
///
/// # Arguments
///
/// * `payload` - The 10 payload bytes (header through last trailer byte)
///
/// # Returns
///
/// * `u8` - `payload[0] - payload[1] - ... - payload[9]` (mod 256)
///
/// # Examples
///
/// ```
/// use jjrc_link::command::checksum::checksum;
///
/// let payload = [0xff, 0x08, 0x00, 0x00, 0x00, 0x00, 0x90, 0x10, 0x10, 0x00];
/// assert_eq!(checksum(&payload), 0x47);
/// ```
pub fn checksum(payload: &[u8; COMMAND_PAYLOAD_SIZE]) -> u8 {
    payload[1..]
        .iter()
        .fold(payload[0], |acc, &byte| acc.wrapping_sub(byte))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Same checksum computed with wide signed arithmetic
    fn checksum_wide(payload: &[u8; COMMAND_PAYLOAD_SIZE]) -> u8 {
        let mut total = payload[0] as i32;
        for &byte in &payload[1..] {
            total -= byte as i32;
        }
        total.rem_euclid(256) as u8
    }

    #[test]
    fn test_checksum_steer_base() {
        let payload = [0xff, 0x08, 0x00, 0x00, 0x00, 0x00, 0x90, 0x10, 0x10, 0x00];
        // 255 - 8 - 144 - 16 - 16 = 71
        assert_eq!(checksum(&payload), 0x47);
    }

    #[test]
    fn test_checksum_all_zero() {
        assert_eq!(checksum(&[0u8; COMMAND_PAYLOAD_SIZE]), 0x00);
    }

    #[test]
    fn test_checksum_wraps_below_zero() {
        let mut payload = [0u8; COMMAND_PAYLOAD_SIZE];
        payload[1] = 1;
        assert_eq!(checksum(&payload), 0xff);
    }

    #[test]
    fn test_checksum_matches_wide_arithmetic() {
        let test_data = [
            [0xff, 0x08, 0x7e, 0x3f, 0x40, 0x3f, 0x90, 0x10, 0x10, 0x80],
            [0xff, 0x08, 0x00, 0x3f, 0x40, 0x3f, 0x50, 0x10, 0x10, 0x00],
            [0xff; COMMAND_PAYLOAD_SIZE],
            [0x01, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
        ];

        for payload in test_data.iter() {
            assert_eq!(
                checksum(payload),
                checksum_wide(payload),
                "Checksum mismatch for payload: {:02x?}",
                payload
            );
        }
    }

    #[test]
    fn test_checksum_changes_with_data() {
        let a = [0xff, 0x08, 0x7f, 0x3f, 0x3f, 0x3f, 0x90, 0x10, 0x10, 0x00];
        let mut b = a;
        b[2] = 0x80;
        assert_ne!(checksum(&a), checksum(&b));
    }
}

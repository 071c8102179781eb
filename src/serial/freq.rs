//! Frequency list parsing
//!
//! A scan line is a list of decimal MHz values such as `433, 868 915`.
//! `,`, space and tab separate tokens; any other non-digit also ends the
//! token in progress. Values that are zero or do not fit in 16 bits are
//! dropped, and at most [`MAX_FREQS`] values are kept in order of
//! appearance.

use heapless::Vec as BoundedVec;

pub use crate::protocol::frame::MAX_FREQS;

/// Parsed frequencies in MHz
pub type FrequencySet = BoundedVec<u16, MAX_FREQS>;

#[derive(Default)]
struct Token {
    value: u32,
    has_digits: bool,
    overflow: bool,
}

impl Token {
    fn push_digit(&mut self, digit: u8) {
        self.has_digits = true;
        if !self.overflow {
            self.value = self.value * 10 + u32::from(digit - b'0');
            if self.value > u32::from(u16::MAX) {
                self.overflow = true;
            }
        }
    }

    /// Emits the token into `out` if valid and resets it
    fn close(&mut self, out: &mut FrequencySet) {
        if self.has_digits && !self.overflow && self.value != 0 {
            // Full set: extra values are ignored
            let _ = out.push(self.value as u16);
        }
        *self = Token::default();
    }
}

/// Parses one line; parsing stops at the end of `line` or the first NUL
pub fn parse_frequency_list(line: &[u8]) -> FrequencySet {
    let mut out = FrequencySet::new();
    let mut token = Token::default();

    for &byte in line.iter().take_while(|&&b| b != 0) {
        if byte.is_ascii_digit() {
            token.push_digit(byte);
        } else {
            token.close(&mut out);
        }
    }
    token.close(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mixed_separators_and_garbage() {
        let parsed = parse_frequency_list(b"433, 868  915,,abc70000");
        assert_eq!(parsed.as_slice(), &[433, 868, 915]);
    }

    #[test]
    fn test_caps_at_max_freqs() {
        let parsed = parse_frequency_list(b"1 2 3 4 5 6 7");
        assert_eq!(parsed.as_slice(), &[1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_and_overflow_dropped() {
        assert_eq!(parse_frequency_list(b"0,65535,65536,00433").as_slice(), &[65535, 433]);
        assert_eq!(parse_frequency_list(b"99999999999999999999").as_slice(), &[] as &[u16]);
    }

    #[test]
    fn test_other_characters_split_tokens() {
        assert_eq!(parse_frequency_list(b"433MHz;868\t915").as_slice(), &[433, 868, 915]);
        assert_eq!(parse_frequency_list(b"12a34").as_slice(), &[12, 34]);
    }

    #[test]
    fn test_stops_at_nul() {
        assert_eq!(parse_frequency_list(b"433\x00868").as_slice(), &[433]);
    }

    #[test]
    fn test_empty_line() {
        assert!(parse_frequency_list(b"").is_empty());
        assert!(parse_frequency_list(b" , \t").is_empty());
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_output_bounded_and_nonzero(line in proptest::collection::vec(any::<u8>(), 0..64)) {
                let parsed = parse_frequency_list(&line);
                prop_assert!(parsed.len() <= MAX_FREQS);
                prop_assert!(parsed.iter().all(|&f| f != 0));
            }

            #[test]
            fn prop_listed_values_parse_back(values in proptest::collection::vec(1u16.., 0..5)) {
                let line = values
                    .iter()
                    .map(|v| v.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                let parsed = parse_frequency_list(line.as_bytes());
                prop_assert_eq!(parsed.as_slice(), values.as_slice());
            }
        }
    }
}

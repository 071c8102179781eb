//! Utility module
//!
//! Millisecond clock arithmetic and the bounded ring shared by the transmit
//! queue and the dedup cache.

pub mod ring;

pub use self::ring::Ring;

use std::time::Duration;

/// Returns true once `now_ms` has reached `deadline_ms`
///
/// Uses the signed difference so a wrapping 32-bit counter still compares correctly.
pub fn time_reached(now_ms: u32, deadline_ms: u32) -> bool {
    (now_ms.wrapping_sub(deadline_ms) as i32) >= 0
}

/// Milliseconds elapsed between `since_ms` and `now_ms` on a wrapping clock
pub fn elapsed_ms(now_ms: u32, since_ms: u32) -> u32 {
    now_ms.wrapping_sub(since_ms)
}

/// Converts a duration to a 32-bit millisecond count, saturating
pub fn duration_to_ms(duration: Duration) -> u32 {
    duration.as_millis().min(u32::MAX as u128) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_time_reached() {
        assert!(time_reached(100, 100));
        assert!(time_reached(101, 100));
        assert!(!time_reached(99, 100));
    }

    #[test]
    fn test_time_reached_across_rollover() {
        let deadline = u32::MAX - 10;
        assert!(!time_reached(u32::MAX - 20, deadline));
        assert!(time_reached(u32::MAX - 10, deadline));
        // Counter wrapped past zero
        assert!(time_reached(5, deadline));

        let deadline = 20u32;
        assert!(!time_reached(u32::MAX - 5, deadline));
    }

    #[test]
    fn test_elapsed_wraps() {
        assert_eq!(elapsed_ms(10, u32::MAX - 9), 20);
        assert_eq!(elapsed_ms(500, 200), 300);
    }

    #[test]
    fn test_duration_conversion() {
        assert_eq!(duration_to_ms(Duration::from_millis(1500)), 1500);
        assert_eq!(duration_to_ms(Duration::from_secs(u64::MAX / 2)), u32::MAX);
    }
}

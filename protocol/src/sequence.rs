//! Wrapping message numbers
//!
//! Every v086 message carries a 16-bit message number assigned by the sender.
//! Numbers wrap from 0xFFFF back to 0, so ordering is defined with modular
//! arithmetic: a number is "newer" than another when the forward distance
//! between them is at most half the number space.

use serde::{Deserialize, Serialize};
use std::fmt;

const HALF_RANGE: u16 = 32768;

/// Returns true if `s1` is newer than `s2` under wraparound
///
/// sequence_greater_than(2, 1) is true, sequence_greater_than(0, 65535) is true,
/// sequence_greater_than(1, 1) is false.
pub fn sequence_greater_than(s1: u16, s2: u16) -> bool {
    ((s1 > s2) && (s1 - s2 <= HALF_RANGE)) || ((s1 < s2) && (s2 - s1 > HALF_RANGE))
}

/// Returns true if `s1` is older than `s2` under wraparound
pub fn sequence_less_than(s1: u16, s2: u16) -> bool {
    sequence_greater_than(s2, s1)
}

/// Signed forward distance from `a` to `b`
///
/// wrapping_diff(1, 2) == 1, wrapping_diff(65535, 0) == 1, wrapping_diff(0, 65535) == -1.
pub fn wrapping_diff(a: u16, b: u16) -> i16 {
    b.wrapping_sub(a) as i16
}

/// A wrapping 16-bit message number
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct MessageNumber(pub u16);

impl MessageNumber {
    pub const ZERO: MessageNumber = MessageNumber(0);

    pub fn new(value: u16) -> Self {
        Self(value)
    }

    pub fn value(self) -> u16 {
        self.0
    }

    /// The number that follows this one, wrapping at 0xFFFF
    pub fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn is_newer_than(self, other: MessageNumber) -> bool {
        sequence_greater_than(self.0, other.0)
    }

    pub fn is_older_than(self, other: MessageNumber) -> bool {
        sequence_less_than(self.0, other.0)
    }

    /// Signed distance from `self` forward to `other`
    pub fn distance_to(self, other: MessageNumber) -> i16 {
        wrapping_diff(self.0, other.0)
    }
}

impl From<u16> for MessageNumber {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for MessageNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequence_greater_than() {
        assert!(sequence_greater_than(2, 1));
        assert!(!sequence_greater_than(1, 2));
        assert!(!sequence_greater_than(1, 1));
        assert!(sequence_greater_than(0, 65535));
        assert!(sequence_greater_than(10, 65530));
        assert!(!sequence_greater_than(65530, 10));
    }

    #[test]
    fn test_sequence_less_than() {
        assert!(sequence_less_than(1, 2));
        assert!(sequence_less_than(65535, 0));
        assert!(!sequence_less_than(5, 5));
    }

    #[test]
    fn test_wrapping_diff() {
        assert_eq!(wrapping_diff(1, 2), 1);
        assert_eq!(wrapping_diff(2, 1), -1);
        assert_eq!(wrapping_diff(65535, 0), 1);
        assert_eq!(wrapping_diff(0, 65535), -1);
        assert_eq!(wrapping_diff(65530, 4), 10);
    }

    #[test]
    fn test_next_wraps_at_max() {
        assert_eq!(MessageNumber(41).next(), MessageNumber(42));
        assert_eq!(MessageNumber(0xFFFF).next(), MessageNumber::ZERO);
    }

    #[test]
    fn test_newer_across_wrap() {
        let before = MessageNumber(0xFFFE);
        let after = before.next().next();

        assert_eq!(after, MessageNumber(0));
        assert!(after.is_newer_than(before));
        assert!(before.is_older_than(after));
        assert_eq!(before.distance_to(after), 2);
    }

    #[test]
    fn test_monotonic_run_across_wrap() {
        let mut current = MessageNumber(0xFFF0);
        for _ in 0..64 {
            let next = current.next();
            assert!(next.is_newer_than(current));
            current = next;
        }
        assert_eq!(current, MessageNumber(0x0030));
    }
}

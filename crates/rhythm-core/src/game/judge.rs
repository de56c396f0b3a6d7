//! Tap timing judgment

/// Where a tap landed relative to its beat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TapResult {
    Early,
    Late,
    Success,
}

/// Judge a tap against the expected beat time
///
/// Both bounds of the window are inclusive: a tap exactly `window_ms` away
/// from `expected_ms` on either side is a success. All values are signed
/// milliseconds on the same clock; nothing is clamped. Bounds are computed in
/// `i128` so the full `i64` range is judged without overflow.
pub fn judge(tap_ms: i64, expected_ms: i64, window_ms: i64) -> TapResult {
    let (tap, expected, window) = (tap_ms as i128, expected_ms as i128, window_ms as i128);
    if tap > expected + window {
        TapResult::Late
    } else if tap < expected - window {
        TapResult::Early
    } else {
        TapResult::Success
    }
}

/// A judged tap, in song time
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TapVerdict {
    /// Song position the tap was heard at
    pub song_position_ms: i64,
    /// Beat it was judged against
    pub expected_ms: i64,
    pub result: TapResult,
}

impl TapVerdict {
    /// Signed distance from the beat (negative = early)
    pub fn offset_ms(&self) -> i64 {
        self.song_position_ms.saturating_sub(self.expected_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_window_is_inclusive() {
        assert_eq!(judge(1049, 1000, 50), TapResult::Success);
        assert_eq!(judge(1050, 1000, 50), TapResult::Success);
        assert_eq!(judge(1051, 1000, 50), TapResult::Late);
        assert_eq!(judge(950, 1000, 50), TapResult::Success);
        assert_eq!(judge(949, 1000, 50), TapResult::Early);
    }

    #[test]
    fn test_exact_hit() {
        assert_eq!(judge(1000, 1000, 0), TapResult::Success);
        assert_eq!(judge(1001, 1000, 0), TapResult::Late);
        assert_eq!(judge(999, 1000, 0), TapResult::Early);
    }

    #[test]
    fn test_negative_times() {
        assert_eq!(judge(-20, 0, 50), TapResult::Success);
        assert_eq!(judge(-51, 0, 50), TapResult::Early);
        assert_eq!(judge(i64::MIN / 2, 0, 100), TapResult::Early);
    }

    #[test]
    fn test_extreme_times() {
        assert_eq!(judge(0, i64::MAX, 1), TapResult::Early);
        assert_eq!(judge(i64::MAX, i64::MIN, 1), TapResult::Late);
        assert_eq!(judge(i64::MIN, i64::MAX, i64::MAX), TapResult::Early);
        assert_eq!(judge(i64::MAX, i64::MAX, i64::MAX), TapResult::Success);
        assert_eq!(judge(i64::MIN, i64::MIN, i64::MAX), TapResult::Success);
    }

    #[test]
    fn test_verdict_offset() {
        let verdict = TapVerdict {
            song_position_ms: 480,
            expected_ms: 500,
            result: TapResult::Success,
        };
        assert_eq!(verdict.offset_ms(), -20);

        let far = TapVerdict {
            song_position_ms: i64::MIN,
            expected_ms: i64::MAX,
            result: TapResult::Early,
        };
        assert_eq!(far.offset_ms(), i64::MIN);
    }
}

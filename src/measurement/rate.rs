//! Transmit rate derivation.
//!
//! Integer truncation is part of the contract: stored historical measurements were produced
//! with exactly this arithmetic.

use super::error::MeasurementError;

const BYTES_PER_MBIT: u64 = 1_000_000 / 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDerivation {
    pub frames_per_second: u64,
    pub frames_total: u64,
}

/// Turns a target rate into a frame schedule.
///
/// A rate of 0 Mbit/s is the keep-alive sentinel and always yields a single frame,
/// whatever the frame length or duration.
pub fn derive_rate(
    speed_mbit: u64,
    frame_len: u32,
    duration_secs: u64,
) -> Result<RateDerivation, MeasurementError> {
    if speed_mbit == 0 {
        return Ok(RateDerivation {
            frames_per_second: 1,
            frames_total: 1,
        });
    }
    if frame_len == 0 {
        return Err(MeasurementError::InvalidParameter(
            "frame length must be > 0".to_string(),
        ));
    }

    let bytes_per_second = speed_mbit.checked_mul(BYTES_PER_MBIT).ok_or_else(|| {
        MeasurementError::InvalidParameter(format!("rate {speed_mbit} Mbit/s overflows"))
    })?;
    let frames_per_second = bytes_per_second / u64::from(frame_len);
    let frames_total = frames_per_second.checked_mul(duration_secs).ok_or_else(|| {
        MeasurementError::InvalidParameter(format!(
            "{frames_per_second} frames/s over {duration_secs}s overflows"
        ))
    })?;

    Ok(RateDerivation {
        frames_per_second,
        frames_total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_to_whole_frames() {
        // 10 Mbit/s = 1_250_000 B/s, 1_250_000 / 1518 = 823.45..
        let rate = derive_rate(10, 1518, 10).unwrap();
        assert_eq!(rate.frames_per_second, 823);
        assert_eq!(rate.frames_total, 8230);
    }

    #[test]
    fn matches_closed_form_over_a_grid() {
        for speed in [1u64, 5, 40, 100, 999, 1000] {
            for frame_len in [64u32, 100, 512, 1000, 1518] {
                for duration in [0u64, 1, 7, 30] {
                    let rate = derive_rate(speed, frame_len, duration).unwrap();
                    let expected_fps = speed * 125_000 / u64::from(frame_len);
                    assert_eq!(rate.frames_per_second, expected_fps);
                    assert_eq!(rate.frames_total, expected_fps * duration);
                }
            }
        }
    }

    #[test]
    fn zero_rate_is_single_frame_sentinel() {
        for (frame_len, duration) in [(64, 0), (1518, 10), (0, 1000)] {
            assert_eq!(
                derive_rate(0, frame_len, duration).unwrap(),
                RateDerivation {
                    frames_per_second: 1,
                    frames_total: 1,
                }
            );
        }
    }

    #[test]
    fn zero_duration_yields_zero_frames() {
        let rate = derive_rate(40, 100, 0).unwrap();
        assert_eq!(rate.frames_per_second, 50_000);
        assert_eq!(rate.frames_total, 0);
    }

    #[test]
    fn rejects_zero_frame_length_and_overflow() {
        assert!(matches!(
            derive_rate(10, 0, 1),
            Err(MeasurementError::InvalidParameter(_))
        ));
        assert!(matches!(
            derive_rate(u64::MAX, 64, 1),
            Err(MeasurementError::InvalidParameter(_))
        ));
        assert!(matches!(
            derive_rate(1000, 64, u64::MAX),
            Err(MeasurementError::InvalidParameter(_))
        ));
    }
}

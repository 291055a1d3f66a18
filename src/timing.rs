use serde::{Deserialize, Serialize};

/// Shortest display duration a slide may be assigned, in seconds. Downstream
/// encoders reject zero-length segments, so derivation and clamping never
/// produce a value below this.
pub const MIN_SLIDE_DURATION: f64 = 0.1;

/// Tail duration for the final slide when no narration-track length is known.
pub const DEFAULT_TAIL_SECONDS: f64 = 5.0;

/// The absolute moment (seconds from the start of the narration track) at
/// which a slide becomes visible. `slide_index` is 0-based and is the source
/// of truth for slide order, not storage position.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SlideTiming {
    pub slide_index: u32,
    pub time_seconds: f64,
}

/// An ordered set of [`SlideTiming`] covering a contiguous `[0, page_count)`
/// index range.
pub type Schedule = Vec<SlideTiming>;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("overlay_relative_width must be within [0.05, 0.50], got {0}")]
    OverlayWidthOutOfRange(f64),
    #[error("timings must not be empty")]
    EmptyTimings,
    #[error("timings must be non-decreasing by time")]
    NonMonotonicTimings,
    #[error("slide indices must start at 0 and be contiguous")]
    InvalidSlideIndices,
}

fn round_ms(seconds: f64) -> f64 {
    (seconds * 1000.0).round() / 1000.0
}

/// Split `total_duration_seconds` evenly across `page_count` slides.
///
/// Slide `i` starts at `i * total / page_count`, rounded to millisecond
/// precision so displayed values stay stable and downstream sum checks do not
/// see floating-point jitter. Slide 0 always starts at 0.0; times are
/// strictly increasing whenever the step is at least one millisecond. Below
/// that, rounding collapses neighbours to equal times, which derivation
/// later floors to [`MIN_SLIDE_DURATION`].
///
/// Invalid input (`page_count == 0`, non-finite or non-positive duration)
/// yields an empty schedule: the inputs are simply not yet computable, which
/// is not a fault.
pub fn uniform_schedule(page_count: u32, total_duration_seconds: f64) -> Schedule {
    if page_count == 0 || !total_duration_seconds.is_finite() || total_duration_seconds <= 0.0 {
        return Vec::new();
    }
    let step = total_duration_seconds / f64::from(page_count);
    (0..page_count)
        .map(|i| SlideTiming {
            slide_index: i,
            time_seconds: round_ms(f64::from(i) * step),
        })
        .collect()
}

/// Reduce a duration sequence so its sum never exceeds `total_seconds`.
///
/// Only the last element absorbs the overshoot, floored at
/// [`MIN_SLIDE_DURATION`]; earlier values are operator-edited and are
/// preserved exactly. A sequence already within the ceiling is returned
/// unchanged, so the operation is idempotent.
pub fn clamp_durations_to_total(durations: &[f64], total_seconds: f64) -> Vec<f64> {
    let mut out = durations.to_vec();
    let sum: f64 = out.iter().sum();
    if sum > total_seconds {
        if let Some(last) = out.last_mut() {
            *last = (*last - (sum - total_seconds)).max(MIN_SLIDE_DURATION);
        }
    }
    out
}

/// Convert absolute slide start-times into per-slide display durations.
///
/// The schedule is sorted by `slide_index` on a working copy first; indices,
/// not storage order, define slide order. Every slide except the last gets
/// `max(0.1, t[i+1] - t[i])`; the floor corrects out-of-order or duplicate
/// operator-entered times. The last slide has no successor and gets
/// `fallback_tail_seconds`. When `ceiling_seconds` is supplied (the probed
/// narration length) the whole sequence is passed through
/// [`clamp_durations_to_total`].
pub fn derive_durations(
    schedule: &[SlideTiming],
    fallback_tail_seconds: f64,
    ceiling_seconds: Option<f64>,
) -> Vec<f64> {
    let mut ordered: Vec<&SlideTiming> = schedule.iter().collect();
    ordered.sort_by_key(|t| t.slide_index);

    let mut durations = Vec::with_capacity(ordered.len());
    for pair in ordered.windows(2) {
        durations.push((pair[1].time_seconds - pair[0].time_seconds).max(MIN_SLIDE_DURATION));
    }
    if !ordered.is_empty() {
        durations.push(fallback_tail_seconds.max(MIN_SLIDE_DURATION));
    }

    match ceiling_seconds {
        Some(ceiling) => clamp_durations_to_total(&durations, ceiling),
        None => durations,
    }
}

/// Structural check applied at the composition boundary: timings must be
/// non-empty, indices contiguous from 0, and times non-decreasing once in
/// index order. Equal times are tolerated here; the deriver floors them to
/// [`MIN_SLIDE_DURATION`].
pub fn validate_timings(timings: &[SlideTiming]) -> Result<(), ValidationError> {
    if timings.is_empty() {
        return Err(ValidationError::EmptyTimings);
    }
    for (expected_index, t) in timings.iter().enumerate() {
        if t.slide_index != expected_index as u32 {
            return Err(ValidationError::InvalidSlideIndices);
        }
    }
    for w in timings.windows(2) {
        if w[1].time_seconds < w[0].time_seconds {
            return Err(ValidationError::NonMonotonicTimings);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn times(schedule: &[SlideTiming]) -> Vec<f64> {
        schedule.iter().map(|t| t.time_seconds).collect()
    }

    #[test]
    fn uniform_splits_evenly() {
        let schedule = uniform_schedule(4, 100.0);
        assert_eq!(times(&schedule), vec![0.0, 25.0, 50.0, 75.0]);
        assert_eq!(
            schedule.iter().map(|t| t.slide_index).collect::<Vec<_>>(),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn uniform_starts_at_zero_and_strictly_increases() {
        let schedule = uniform_schedule(7, 33.3);
        assert_eq!(schedule.len(), 7);
        assert_eq!(schedule[0].time_seconds, 0.0);
        for w in schedule.windows(2) {
            assert!(w[0].time_seconds < w[1].time_seconds);
        }
    }

    #[test]
    fn uniform_rounds_to_milliseconds() {
        let schedule = uniform_schedule(3, 10.0);
        assert_eq!(times(&schedule), vec![0.0, 3.333, 6.667]);
    }

    #[test]
    fn uniform_submillisecond_steps_collapse_but_stay_ordered() {
        let schedule = uniform_schedule(4, 0.001);
        assert_eq!(times(&schedule), vec![0.0, 0.0, 0.001, 0.001]);
        for w in schedule.windows(2) {
            assert!(w[0].time_seconds <= w[1].time_seconds);
        }
        // Derivation still yields usable durations from the collapsed times.
        let durations = derive_durations(&schedule, 5.0, None);
        assert!(durations.iter().all(|d| *d >= MIN_SLIDE_DURATION));
    }

    #[test]
    fn uniform_invalid_inputs_yield_empty() {
        assert!(uniform_schedule(0, 100.0).is_empty());
        assert!(uniform_schedule(4, 0.0).is_empty());
        assert!(uniform_schedule(4, -2.0).is_empty());
        assert!(uniform_schedule(4, f64::NAN).is_empty());
        assert!(uniform_schedule(4, f64::INFINITY).is_empty());
    }

    #[test]
    fn clamp_reduces_only_last() {
        assert_eq!(
            clamp_durations_to_total(&[30.0, 40.0, 50.0], 100.0),
            vec![30.0, 40.0, 30.0]
        );
    }

    #[test]
    fn clamp_is_a_noop_within_ceiling() {
        let durations = [10.0, 20.0, 30.0];
        assert_eq!(clamp_durations_to_total(&durations, 100.0), durations);
        let once = clamp_durations_to_total(&durations, 60.0);
        assert_eq!(clamp_durations_to_total(&once, 60.0), once);
    }

    #[test]
    fn clamp_floors_last_at_minimum() {
        let clamped = clamp_durations_to_total(&[5.0, 5.0, 200.0], 10.0);
        assert_eq!(clamped, vec![5.0, 5.0, MIN_SLIDE_DURATION]);
    }

    #[test]
    fn derive_matches_schedule_length_and_floor() {
        let schedule = uniform_schedule(5, 50.0);
        let durations = derive_durations(&schedule, DEFAULT_TAIL_SECONDS, None);
        assert_eq!(durations.len(), schedule.len());
        assert!(durations.iter().all(|d| *d >= MIN_SLIDE_DURATION));
        assert_eq!(durations, vec![10.0, 10.0, 10.0, 10.0, DEFAULT_TAIL_SECONDS]);
    }

    #[test]
    fn derive_respects_ceiling() {
        let schedule = uniform_schedule(4, 100.0);
        let durations = derive_durations(&schedule, 30.0, Some(100.0));
        let sum: f64 = durations.iter().sum();
        assert!(sum <= 100.0 + 1e-9);
        // First three slides keep their 25s spans; the tail absorbs the clamp.
        assert_eq!(&durations[..3], &[25.0, 25.0, 25.0]);
        assert!((durations[3] - 25.0).abs() < 1e-9);
    }

    #[test]
    fn derive_sorts_by_slide_index_first() {
        let shuffled = vec![
            SlideTiming { slide_index: 2, time_seconds: 20.0 },
            SlideTiming { slide_index: 0, time_seconds: 0.0 },
            SlideTiming { slide_index: 1, time_seconds: 5.0 },
        ];
        let sorted = vec![
            SlideTiming { slide_index: 0, time_seconds: 0.0 },
            SlideTiming { slide_index: 1, time_seconds: 5.0 },
            SlideTiming { slide_index: 2, time_seconds: 20.0 },
        ];
        assert_eq!(
            derive_durations(&shuffled, 5.0, Some(30.0)),
            derive_durations(&sorted, 5.0, Some(30.0))
        );
    }

    #[test]
    fn derive_floors_duplicate_and_reversed_times() {
        let schedule = vec![
            SlideTiming { slide_index: 0, time_seconds: 10.0 },
            SlideTiming { slide_index: 1, time_seconds: 10.0 },
            SlideTiming { slide_index: 2, time_seconds: 4.0 },
        ];
        let durations = derive_durations(&schedule, 5.0, None);
        assert_eq!(durations, vec![MIN_SLIDE_DURATION, MIN_SLIDE_DURATION, 5.0]);
    }

    #[test]
    fn derive_empty_schedule_is_empty() {
        assert!(derive_durations(&[], 5.0, Some(10.0)).is_empty());
    }

    #[test]
    fn timings_validation_ok() {
        let timings = vec![
            SlideTiming { slide_index: 0, time_seconds: 0.5 },
            SlideTiming { slide_index: 1, time_seconds: 10.0 },
            SlideTiming { slide_index: 2, time_seconds: 20.0 },
        ];
        assert!(validate_timings(&timings).is_ok());
    }

    #[test]
    fn timings_empty_err() {
        assert!(matches!(
            validate_timings(&[]),
            Err(ValidationError::EmptyTimings)
        ));
    }

    #[test]
    fn timings_decreasing_err_but_equal_tolerated() {
        let equal = vec![
            SlideTiming { slide_index: 0, time_seconds: 1.0 },
            SlideTiming { slide_index: 1, time_seconds: 1.0 },
        ];
        assert!(validate_timings(&equal).is_ok());

        let decreasing = vec![
            SlideTiming { slide_index: 0, time_seconds: 2.0 },
            SlideTiming { slide_index: 1, time_seconds: 1.0 },
        ];
        assert!(matches!(
            validate_timings(&decreasing),
            Err(ValidationError::NonMonotonicTimings)
        ));
    }

    #[test]
    fn timings_invalid_indices_err() {
        let timings = vec![
            SlideTiming { slide_index: 0, time_seconds: 0.5 },
            SlideTiming { slide_index: 2, time_seconds: 1.0 },
        ];
        assert!(matches!(
            validate_timings(&timings),
            Err(ValidationError::InvalidSlideIndices)
        ));
    }
}

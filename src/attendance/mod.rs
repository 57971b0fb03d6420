//! Attendance arithmetic. Everything here is a pure function of its inputs and is recomputed on
//! every display instead of being cached next to the records.
//!
//! Counts are taken as `u64` and thresholds as `i64`, so thresholds outside of `0..=100` produce
//! consistent (if meaningless) answers instead of panics. Threshold comparisons are done on exact
//! integers: `present / total * 100 >= min` is evaluated as `present * 100 >= min * total`.
//! Projections too large for `u64` are reported as [Projection::Unbounded].

pub mod summary;

use std::fmt::Display;

use crate::utils::percentage::{ratio_percentage, Percentage};

/// Width of the band right below the threshold that is reported as [Status::Warning].
pub const WARNING_BAND: f64 = 5.;

/// Current attendance. A subject without any held classes is at 0%.
pub fn percentage(present: u64, total: u64) -> Percentage {
    ratio_percentage(present, total)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    Safe,
    Warning,
    Danger,
}

impl Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Status::Safe => write!(f, "safe"),
            Status::Warning => write!(f, "warning"),
            Status::Danger => write!(f, "danger"),
        }
    }
}

/// Classifies a percentage against the threshold. Both bounds are inclusive, so a value sitting
/// exactly on a boundary lands in the safer bucket.
pub fn status(percentage: f64, min_attendance: i64) -> Status {
    let min_attendance = min_attendance as f64;
    if percentage >= min_attendance {
        Status::Safe
    } else if percentage >= min_attendance - WARNING_BAND {
        Status::Warning
    } else {
        Status::Danger
    }
}

/// Number of classes in a forward-looking projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Projection {
    Classes(u64),
    /// No finite number of classes satisfies the request.
    Unbounded,
}

impl Projection {
    pub fn classes(self) -> Option<u64> {
        match self {
            Projection::Classes(v) => Some(v),
            Projection::Unbounded => None,
        }
    }

    pub fn is_unbounded(self) -> bool {
        matches!(self, Projection::Unbounded)
    }

    /// Counts that don't fit into `u64` are reported as [Projection::Unbounded].
    fn from_count(count: i128) -> Self {
        u64::try_from(count).map_or(Projection::Unbounded, Projection::Classes)
    }
}

impl Display for Projection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Projection::Classes(v) => write!(f, "{v}"),
            Projection::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Whether `present` out of `total` is at or above the threshold, following [percentage] for an
/// empty total.
fn meets_threshold(present: i128, total: i128, min_attendance: i128) -> bool {
    if total == 0 {
        0 >= min_attendance
    } else {
        present * 100 >= min_attendance * total
    }
}

/// How many more classes can be missed (added to `total` only) while the attendance stays at or
/// above `min_attendance`.
///
/// This is the largest `k >= 0` with `present / (total + k) * 100 >= min_attendance`. Since the
/// left side only decreases with `k`, it matches counting trial absences until the first one that
/// drops below the threshold. A threshold of zero or less can never be crossed by skipping.
pub fn classes_can_skip(present: u64, total: u64, min_attendance: i64) -> Projection {
    if min_attendance <= 0 {
        return Projection::Unbounded;
    }
    let present = i128::from(present);
    let total = i128::from(total);
    let min_attendance = i128::from(min_attendance);

    let max_total = present * 100 / min_attendance;
    let skippable = (max_total - total).max(0);
    Projection::from_count(skippable)
}

/// How many more classes have to be attended (added to both `present` and `total`) before the
/// attendance reaches `min_attendance`.
///
/// Returns 0 when the threshold is already met. Otherwise solves
/// `(present + k) * 100 >= min * (total + k)` for the smallest `k >= 1`, which rearranges to
/// `k * (100 - min) >= min * total - 100 * present`. When `100 - min` isn't positive the left side
/// never grows, so only `k = 1` can work and anything else is [Projection::Unbounded].
pub fn classes_needed_to_attend(present: u64, total: u64, min_attendance: i64) -> Projection {
    let present = i128::from(present);
    let total = i128::from(total);
    let min_attendance = i128::from(min_attendance);

    if meets_threshold(present, total, min_attendance) {
        return Projection::Classes(0);
    }

    let headroom = 100 - min_attendance;
    let deficit = min_attendance * total - 100 * present;

    if headroom > 0 {
        // deficit can only be non-positive here when total is 0, where a single class is enough.
        let needed = div_ceil(deficit, headroom).max(1);
        Projection::from_count(needed)
    } else if headroom >= deficit {
        Projection::Classes(1)
    } else {
        Projection::Unbounded
    }
}

fn div_ceil(numerator: i128, denominator: i128) -> i128 {
    let quotient = numerator / denominator;
    if numerator % denominator > 0 {
        quotient + 1
    } else {
        quotient
    }
}

#[cfg(test)]
mod tests {
    use super::{
        classes_can_skip, classes_needed_to_attend, percentage, status, Projection, Status,
    };

    /// Mirror of the step-by-step definition with a generous bound. Only used to cross-check the
    /// closed forms on small inputs.
    fn skip_by_steps(present: u64, total: u64, min: i64) -> Option<u64> {
        let mut skippable = 0;
        let mut new_total = total;
        while skippable < 10_000 {
            new_total += 1;
            if (present as i128) * 100 < (min as i128) * (new_total as i128) {
                return Some(skippable);
            }
            skippable += 1;
        }
        None
    }

    fn attend_by_steps(present: u64, total: u64, min: i64) -> Option<u64> {
        if *percentage(present, total) >= min as f64 {
            return Some(0);
        }
        let (mut p, mut t) = (present, total);
        for needed in 1..=10_000 {
            p += 1;
            t += 1;
            if (p as i128) * 100 >= (min as i128) * (t as i128) {
                return Some(needed);
            }
        }
        None
    }

    #[test]
    fn test_percentage_of_empty_subject() {
        assert_eq!(*percentage(0, 0), 0.);
        assert_eq!(*percentage(3, 0), 0.);
    }

    #[test]
    fn test_percentage_stays_in_range() {
        for total in 1..=40u64 {
            for present in 0..=total {
                let value = *percentage(present, total);
                assert!((0. ..=100.).contains(&value), "{present}/{total} gave {value}");
            }
        }
    }

    #[test]
    fn test_status_boundaries() {
        assert_eq!(status(75., 75), Status::Safe);
        assert_eq!(status(70., 75), Status::Warning);
        assert_eq!(status(70. - 1e-9, 75), Status::Danger);
        assert_eq!(status(100., 75), Status::Safe);
        assert_eq!(status(0., 0), Status::Safe);
    }

    #[test]
    fn test_status_with_out_of_range_threshold() {
        assert_eq!(status(100., 120), Status::Danger);
        assert_eq!(status(0., -10), Status::Safe);
    }

    #[test]
    fn test_can_skip_example() {
        assert_eq!(classes_can_skip(27, 30, 80), Projection::Classes(3));
        assert!(*percentage(27, 33) >= 80.);
        assert!(*percentage(27, 34) < 80.);
    }

    #[test]
    fn test_can_skip_when_already_below() {
        assert_eq!(classes_can_skip(5, 10, 75), Projection::Classes(0));
        assert_eq!(classes_can_skip(0, 0, 75), Projection::Classes(0));
    }

    #[test]
    fn test_can_skip_includes_exact_boundary() {
        // 3 of 4 is exactly 75%.
        assert_eq!(classes_can_skip(3, 3, 75), Projection::Classes(1));
    }

    #[test]
    fn test_can_skip_without_threshold() {
        assert_eq!(classes_can_skip(3, 10, 0), Projection::Unbounded);
        assert_eq!(classes_can_skip(3, 10, -20), Projection::Unbounded);
    }

    #[test]
    fn test_needed_to_attend_example() {
        assert_eq!(classes_needed_to_attend(5, 10, 75), Projection::Classes(10));
        assert!(*percentage(15, 20) >= 75.);
        assert!(*percentage(14, 19) < 75.);
    }

    #[test]
    fn test_needed_to_attend_when_already_safe() {
        assert_eq!(classes_needed_to_attend(9, 10, 75), Projection::Classes(0));
        assert_eq!(classes_needed_to_attend(0, 0, 0), Projection::Classes(0));
    }

    #[test]
    fn test_needed_to_attend_for_empty_subject() {
        assert_eq!(classes_needed_to_attend(0, 0, 75), Projection::Classes(1));
        assert_eq!(classes_needed_to_attend(0, 0, 100), Projection::Classes(1));
    }

    #[test]
    fn test_needed_to_attend_full_attendance() {
        assert_eq!(classes_needed_to_attend(3, 10, 100), Projection::Unbounded);
        assert_eq!(classes_needed_to_attend(10, 10, 100), Projection::Classes(0));
        assert_eq!(classes_needed_to_attend(3, 10, 150), Projection::Unbounded);
    }

    #[test]
    fn test_needed_to_attend_reports_large_finite_values() {
        // Far beyond 200 steps but still reachable.
        assert_eq!(classes_needed_to_attend(0, 100, 99), Projection::Classes(9900));
    }

    #[test]
    fn test_closed_forms_match_step_by_step_definition() {
        for min in [1, 33, 50, 60, 66, 75, 80, 85, 90, 99] {
            for total in 0..=30u64 {
                for present in 0..=total {
                    assert_eq!(
                        classes_can_skip(present, total, min).classes(),
                        skip_by_steps(present, total, min),
                        "skip {present}/{total} at {min}"
                    );
                    assert_eq!(
                        classes_needed_to_attend(present, total, min).classes(),
                        attend_by_steps(present, total, min),
                        "attend {present}/{total} at {min}"
                    );
                }
            }
        }
    }

    #[test]
    fn test_extreme_inputs_do_not_panic() {
        let max = u32::MAX as u64;
        assert_eq!(classes_can_skip(max, max, i64::MAX), Projection::Classes(0));
        assert_eq!(classes_needed_to_attend(0, max, i64::MIN), Projection::Classes(0));
        assert!(classes_needed_to_attend(0, max, 99).classes().is_some());
    }

    #[test]
    fn test_projections_beyond_u64_are_unbounded() {
        assert_eq!(classes_can_skip(u64::MAX, 0, 1), Projection::Unbounded);
        assert_eq!(classes_needed_to_attend(0, u64::MAX, 99), Projection::Unbounded);
        assert_eq!(
            classes_can_skip(u64::MAX, u64::MAX, 100),
            Projection::Classes(0)
        );
        assert_eq!(
            classes_needed_to_attend(0, u64::MAX, 50),
            Projection::Classes(u64::MAX)
        );
        assert_eq!(
            classes_needed_to_attend(u64::MAX, u64::MAX, i64::MIN),
            Projection::Classes(0)
        );
    }
}

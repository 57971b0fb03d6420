use crate::{tracker::entities::SubjectRecord, utils::percentage::Percentage};

use super::{classes_can_skip, classes_needed_to_attend, percentage, status, Projection, Status};

/// What a subject needs next to stay on the right side of the threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Guidance {
    /// The subject is safe and this many classes can still be missed.
    CanSkip(Projection),
    /// The subject is below the threshold and this many classes have to be attended.
    MustAttend(Projection),
}

/// Everything displayed for a single subject, derived from its counters.
#[derive(Debug, Clone)]
pub struct SubjectStanding<'a> {
    pub subject: &'a SubjectRecord,
    pub percentage: Percentage,
    pub status: Status,
    pub guidance: Guidance,
}

impl<'a> SubjectStanding<'a> {
    pub fn evaluate(subject: &'a SubjectRecord, min_attendance: i64) -> Self {
        let present = u64::from(subject.present);
        let total = u64::from(subject.total);
        let percentage = percentage(present, total);
        let status = status(*percentage, min_attendance);
        let guidance = match status {
            Status::Safe => Guidance::CanSkip(classes_can_skip(present, total, min_attendance)),
            Status::Warning | Status::Danger => {
                Guidance::MustAttend(classes_needed_to_attend(present, total, min_attendance))
            }
        };
        Self {
            subject,
            percentage,
            status,
            guidance,
        }
    }
}

/// Aggregate numbers shown at the top of the dashboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Overview {
    pub overall: Percentage,
    pub total_subjects: usize,
    pub safe_subjects: usize,
    pub at_risk_subjects: usize,
}

/// Attendance over all classes of all subjects, not the mean of per-subject percentages.
pub fn overall_percentage(subjects: &[SubjectRecord]) -> Percentage {
    let (present, total) = subjects.iter().fold((0u64, 0u64), |(present, total), s| {
        (present + u64::from(s.present), total + u64::from(s.total))
    });
    percentage(present, total)
}

pub fn overview(subjects: &[SubjectRecord], min_attendance: i64) -> Overview {
    let safe_subjects = subjects
        .iter()
        .filter(|s| {
            *percentage(u64::from(s.present), u64::from(s.total)) >= min_attendance as f64
        })
        .count();
    Overview {
        overall: overall_percentage(subjects),
        total_subjects: subjects.len(),
        safe_subjects,
        at_risk_subjects: subjects.len() - safe_subjects,
    }
}

/// Orders subjects from the lowest attendance to the highest. The sort is stable, so subjects
/// with equal attendance keep the order they were added in.
pub fn rank_by_risk(subjects: &[SubjectRecord]) -> Vec<&SubjectRecord> {
    let mut ranked = subjects.iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| {
        let a = percentage(u64::from(a.present), u64::from(a.total));
        let b = percentage(u64::from(b.present), u64::from(b.total));
        a.total_cmp(&b)
    });
    ranked
}

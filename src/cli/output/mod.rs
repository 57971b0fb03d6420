pub mod analytics;

use ansi_term::Colour;

use crate::{
    attendance::{
        percentage,
        summary::{overview, rank_by_risk, Guidance, SubjectStanding},
        Projection, Status,
    },
    import::ImportReport,
    tracker::entities::SubjectRecord,
};

pub const EMPTY_HINT: &str = "No subjects yet. Add one with `attend add` or `attend import`.";

/// Rendering options shared by every view.
#[derive(Debug, Clone, Copy)]
pub struct Style {
    pub color: bool,
}

impl Style {
    pub fn paint(&self, status: Status, text: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        let colour = match status {
            Status::Safe => Colour::Green,
            Status::Warning => Colour::Yellow,
            Status::Danger => Colour::Red,
        };
        colour.paint(text).to_string()
    }
}

fn plural(count: u64) -> &'static str {
    if count == 1 {
        "class"
    } else {
        "classes"
    }
}

/// Human readable advice. Unbounded projections never show up as numbers.
pub fn guidance_text(guidance: Guidance, min_attendance: u8) -> String {
    match guidance {
        Guidance::CanSkip(Projection::Classes(0)) => "can't skip any class".to_string(),
        Guidance::CanSkip(Projection::Classes(n)) => format!("can skip {n} more {}", plural(n)),
        Guidance::CanSkip(Projection::Unbounded) => "can skip any number of classes".to_string(),
        Guidance::MustAttend(Projection::Classes(n)) => {
            format!("attend {n} more {}", plural(n))
        }
        Guidance::MustAttend(Projection::Unbounded) => {
            format!("can't reach {min_attendance}% by attending")
        }
    }
}

pub fn render_standing(standing: &SubjectStanding, min_attendance: u8, style: Style) -> String {
    let subject = standing.subject;
    let status = format!("{:<8}", standing.status.to_string());
    format!(
        "#{:<4} {:<10} {:<28} {:>5}/{:<5} {:>7}  {}  {}",
        subject.id,
        subject.code,
        subject.name,
        subject.present,
        subject.total,
        standing.percentage.to_string(),
        style.paint(standing.status, &status),
        guidance_text(standing.guidance, min_attendance)
    )
}

/// Joins rendered lines, each one terminated by a newline.
pub(crate) fn to_text(lines: Vec<String>) -> String {
    lines.into_iter().map(|line| line + "\n").collect()
}

/// Summary numbers followed by every subject, least safe first.
pub fn render_dashboard(subjects: &[SubjectRecord], min_attendance: u8, style: Style) -> String {
    let threshold = i64::from(min_attendance);
    let overview = overview(subjects, threshold);
    let overall_status = crate::attendance::status(*overview.overall, threshold);

    let mut lines = vec![
        format!(
            "Overall attendance  {}",
            style.paint(overall_status, &overview.overall.to_string())
        ),
        format!("Total subjects      {}", overview.total_subjects),
        format!("Safe subjects       {}", overview.safe_subjects),
        format!("At-risk subjects    {}", overview.at_risk_subjects),
        format!("Minimum attendance  {min_attendance}%"),
        String::new(),
    ];

    if subjects.is_empty() {
        lines.push(EMPTY_HINT.to_string());
    } else {
        lines.extend(rank_by_risk(subjects).into_iter().map(|subject| {
            let standing = SubjectStanding::evaluate(subject, threshold);
            render_standing(&standing, min_attendance, style)
        }));
    }
    to_text(lines)
}

/// Subjects in the order they were added, with their raw counters.
pub fn render_subject_list(subjects: &[&SubjectRecord]) -> String {
    let header = "ID\tCODE\tPRESENT\tABSENT\tTOTAL\tPERCENT\tNAME".to_string();
    let rows = subjects.iter().map(|subject| {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            subject.id,
            subject.code,
            subject.present,
            subject.absent(),
            subject.total,
            percentage(u64::from(subject.present), u64::from(subject.total)),
            subject.name
        )
    });
    to_text(std::iter::once(header).chain(rows).collect())
}

pub fn render_import_report(report: &ImportReport, dry_run: bool) -> String {
    let verb = if dry_run { "Would import" } else { "Imported" };
    let mut lines = vec![format!("{verb} {} subjects", report.accepted.len())];

    lines.extend(report.accepted.iter().enumerate().map(|(index, draft)| {
        let id = report
            .added
            .get(index)
            .map(|id| format!("#{id}"))
            .unwrap_or_else(|| "-".to_string());
        format!(
            "  {id}\t{}\t{}/{}\t{}",
            draft.code, draft.present, draft.total, draft.name
        )
    }));

    if !report.rejected.is_empty() {
        lines.push(format!("Skipped {} rows", report.rejected.len()));
        lines.extend(report.rejected.iter().map(|rejected| {
            format!(
                "  row {}\t{:?}\t{}",
                rejected.index + 1,
                rejected.row.subject_code,
                rejected.reason
            )
        }));
    }
    to_text(lines)
}

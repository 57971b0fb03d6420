use crate::{
    attendance::{percentage, status},
    tracker::entities::SubjectRecord,
};

use super::{to_text, Style, EMPTY_HINT};

const BAR_WIDTH: usize = 40;

/// Number of filled cells for a percentage, rounded to the closest cell.
fn filled_cells(value: f64) -> usize {
    let cells = (value.clamp(0., 100.) / 100. * BAR_WIDTH as f64).round();
    cells as usize
}

/// Horizontal bar per subject, coloured by status, with the threshold marked on an axis below.
pub fn render_analytics(subjects: &[SubjectRecord], min_attendance: u8, style: Style) -> String {
    if subjects.is_empty() {
        return to_text(vec![EMPTY_HINT.to_string()]);
    }

    let label_width = subjects
        .iter()
        .map(|s| s.code.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = subjects
        .iter()
        .map(|subject| {
            let value = percentage(u64::from(subject.present), u64::from(subject.total));
            let filled = filled_cells(*value);
            let bar = format!("{}{}", "█".repeat(filled), "·".repeat(BAR_WIDTH - filled));
            format!(
                "{:<label_width$}  {}  {:>6}",
                subject.code,
                style.paint(status(*value, i64::from(min_attendance)), &bar),
                value.to_string()
            )
        })
        .collect::<Vec<_>>();

    let marker = filled_cells(f64::from(min_attendance)).min(BAR_WIDTH - 1);
    lines.push(format!(
        "{:<label_width$}  {}^ {min_attendance}% minimum",
        "",
        " ".repeat(marker)
    ));
    to_text(lines)
}

#[cfg(test)]
mod tests {
    use crate::tracker::entities::{SubjectDraft, SubjectId, SubjectRecord};

    use super::{filled_cells, render_analytics, BAR_WIDTH};
    use crate::cli::output::Style;

    fn subject(code: &str, present: u32, total: u32) -> SubjectRecord {
        SubjectDraft::new(code, "name", present, total).into_record(SubjectId(1))
    }

    #[test]
    fn test_filled_cells() {
        assert_eq!(filled_cells(0.), 0);
        assert_eq!(filled_cells(50.), BAR_WIDTH / 2);
        assert_eq!(filled_cells(100.), BAR_WIDTH);
        assert_eq!(filled_cells(140.), BAR_WIDTH);
    }

    #[test]
    fn test_one_bar_per_subject_in_insertion_order() {
        let subjects = [subject("MA101", 10, 10), subject("PH102", 0, 4)];
        let text = render_analytics(&subjects, 75, Style { color: false });
        let lines = text.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("MA101"));
        assert!(lines[0].ends_with("100.0%"));
        assert!(lines[1].starts_with("PH102"));
        assert!(lines[1].contains(&"·".repeat(BAR_WIDTH)));
        assert!(lines[2].contains("^ 75% minimum"));
    }
}

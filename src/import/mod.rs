//! Bulk import of subjects from a photographed attendance table.
//!
//! [SubjectExtractor] abstracts the image-understanding service; [GeminiExtractor] is the real
//! implementation. Extracted rows are checked one by one: rows breaking the record invariants are
//! left out and reported, the rest are added through a single [Tracker::bulk_add]. A failed
//! extraction imports nothing.

pub mod gemini;

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Number;
use thiserror::Error;
use tracing::{info, warn};

pub use gemini::GeminiExtractor;

use crate::tracker::{
    entities::{count_from_signed, SubjectDraft, SubjectId, ValidationError},
    storage::StateStorage,
    Tracker,
};

/// An encoded image together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: &'static str,
}

impl ImageInput {
    pub fn new(bytes: Vec<u8>, mime_type: &'static str) -> Self {
        Self { bytes, mime_type }
    }

    /// Reads an image from disk, inferring its type from the file extension.
    pub async fn from_path(path: &Path) -> Result<Self> {
        let mime_type = mime_type_for(path)
            .ok_or_else(|| anyhow!("Unsupported image type for {path:?}. Use png, jpeg, webp, gif or heic"))?;
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {path:?}"))?;
        Ok(Self { bytes, mime_type })
    }
}

fn mime_type_for(path: &Path) -> Option<&'static str> {
    let extension = path.extension()?.to_str()?.to_ascii_lowercase();
    match extension.as_str() {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "heic" => Some("image/heic"),
        "heif" => Some("image/heif"),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("API key is not set. Pass --api-key or set GEMINI_API_KEY")]
    MissingApiKey,
    #[error("extraction service is unreachable: {0}")]
    Network(String),
    #[error("extraction service failed with HTTP {status}: {body}")]
    Service { status: u16, body: String },
    #[error("extraction service returned an unusable response: {0}")]
    MalformedResponse(String),
}

/// A row exactly as the extraction service reported it. Counts are kept as arbitrary JSON
/// numbers because nothing guarantees the service doesn't answer `-1` or `20.5`, and such a row
/// must not spoil the rest of the table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ExtractedRow {
    pub subject_code: String,
    pub subject_name: String,
    pub present: Number,
    pub total: Number,
}

impl ExtractedRow {
    pub fn into_draft(self) -> Result<SubjectDraft, ValidationError> {
        let present = count_from_number("present", &self.present)?;
        let total = count_from_number("total", &self.total)?;
        SubjectDraft::new(self.subject_code, self.subject_name, present, total).validate()
    }
}

/// Accepts integers and integral floats such as `20.0`.
fn count_from_number(field: &'static str, value: &Number) -> Result<u32, ValidationError> {
    if let Some(value) = value.as_i64() {
        return count_from_signed(field, value);
    }
    if value.is_u64() {
        return Err(ValidationError::CountOverflow {
            field,
            value: value.to_string(),
        });
    }
    let float = value.as_f64().unwrap_or(f64::NAN);
    if !float.is_finite() || float.fract() != 0. {
        return Err(ValidationError::FractionalCount {
            field,
            value: value.to_string(),
        });
    }
    if float < i64::MIN as f64 || float >= i64::MAX as f64 {
        return Err(ValidationError::CountOverflow {
            field,
            value: value.to_string(),
        });
    }
    count_from_signed(field, float as i64)
}

/// Contract for services able to read an attendance table from an image.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubjectExtractor: Send + Sync {
    async fn extract(&self, image: &ImageInput) -> Result<Vec<ExtractedRow>, ExtractionError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// Zero-based position of the row in the extracted table.
    pub index: usize,
    pub row: ExtractedRow,
    pub reason: ValidationError,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ImportReport {
    /// Valid drafts in table order.
    pub accepted: Vec<SubjectDraft>,
    /// Ids given to the accepted drafts. Empty for a dry run.
    pub added: Vec<SubjectId>,
    pub rejected: Vec<RejectedRow>,
}

/// Splits extracted rows into valid drafts and rejected rows.
pub fn validate_rows(rows: Vec<ExtractedRow>) -> (Vec<SubjectDraft>, Vec<RejectedRow>) {
    let mut accepted = Vec::new();
    let mut rejected = Vec::new();
    for (index, row) in rows.into_iter().enumerate() {
        match row.clone().into_draft() {
            Ok(draft) => accepted.push(draft),
            Err(reason) => {
                warn!("Rejecting extracted row {index} {row:?}: {reason}");
                rejected.push(RejectedRow { index, row, reason });
            }
        }
    }
    (accepted, rejected)
}

/// Extracts subjects from `image` and adds the valid ones to the tracker. With `dry_run` the
/// tracker is left untouched.
pub async fn import_subjects<S: StateStorage>(
    tracker: &mut Tracker<S>,
    extractor: &dyn SubjectExtractor,
    image: &ImageInput,
    dry_run: bool,
) -> Result<ImportReport> {
    let rows = extractor
        .extract(image)
        .await
        .context("Failed to extract data from the image")?;
    info!("Extracted {} rows", rows.len());

    let (accepted, rejected) = validate_rows(rows);
    let added = if dry_run || accepted.is_empty() {
        Vec::new()
    } else {
        tracker.bulk_add(accepted.clone()).await?
    };

    Ok(ImportReport {
        accepted,
        added,
        rejected,
    })
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use anyhow::Result;
    use serde_json::json;
    use tempfile::tempdir;

    use crate::tracker::{entities::ValidationError, storage::JsonFileStorage, Tracker};

    use super::{
        import_subjects, mime_type_for, validate_rows, ExtractedRow, ExtractionError, ImageInput,
        MockSubjectExtractor,
    };

    fn row(code: &str, present: i64, total: i64) -> ExtractedRow {
        ExtractedRow {
            subject_code: code.into(),
            subject_name: format!("{code} name"),
            present: present.into(),
            total: total.into(),
        }
    }

    fn image() -> ImageInput {
        ImageInput::new(vec![0x89, b'P', b'N', b'G'], "image/png")
    }

    #[test]
    fn test_row_counts_from_json_numbers() {
        let rows: Vec<ExtractedRow> = serde_json::from_value(json!([
            { "subject_code": "A", "subject_name": "A", "present": 20.0, "total": 25 },
            { "subject_code": "B", "subject_name": "B", "present": 20.5, "total": 25 },
            { "subject_code": "C", "subject_name": "C", "present": 1, "total": 1e300 },
            { "subject_code": "D", "subject_name": "D", "present": 1, "total": u64::MAX },
            { "subject_code": "E", "subject_name": "E", "present": -2.0, "total": 3 }
        ]))
        .unwrap();
        let (accepted, rejected) = validate_rows(rows);

        assert_eq!(accepted.len(), 1);
        assert_eq!((accepted[0].present, accepted[0].total), (20, 25));
        let reasons = rejected.into_iter().map(|r| r.reason).collect::<Vec<_>>();
        assert!(matches!(
            reasons[0],
            ValidationError::FractionalCount { field: "present", .. }
        ));
        assert!(matches!(
            reasons[1],
            ValidationError::CountOverflow { field: "total", .. }
        ));
        assert!(matches!(
            reasons[2],
            ValidationError::CountOverflow { field: "total", .. }
        ));
        assert_eq!(
            reasons[3],
            ValidationError::NegativeCount {
                field: "present",
                value: -2
            }
        );
    }

    #[test]
    fn test_mime_types() {
        assert_eq!(mime_type_for(Path::new("table.PNG")), Some("image/png"));
        assert_eq!(mime_type_for(Path::new("a/b/table.jpeg")), Some("image/jpeg"));
        assert_eq!(mime_type_for(Path::new("table.pdf")), None);
        assert_eq!(mime_type_for(Path::new("table")), None);
    }

    #[tokio::test]
    async fn test_image_from_unsupported_path() {
        assert!(ImageInput::from_path(Path::new("notes.txt")).await.is_err());
    }

    #[tokio::test]
    async fn test_invalid_rows_are_rejected_individually() -> Result<()> {
        let dir = tempdir()?;
        let mut tracker = Tracker::load(JsonFileStorage::new(dir.path().to_owned())?).await?;

        let mut extractor = MockSubjectExtractor::new();
        extractor.expect_extract().times(1).returning(|_| {
            Ok(vec![
                row("CSEN2031", 20, 25),
                row("MATH2001", 30, 28),
                row("PHYS1002", -1, 4),
                row("", 1, 1),
                row("CHEM1003", 0, 0),
            ])
        });

        let report = import_subjects(&mut tracker, &extractor, &image(), false).await?;

        assert_eq!(report.added.len(), 2);
        assert_eq!(
            report.rejected.iter().map(|r| r.index).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert_eq!(
            report.rejected[0].reason,
            ValidationError::PresentExceedsTotal {
                present: 30,
                total: 28
            }
        );
        let codes = tracker
            .subjects()
            .iter()
            .map(|s| s.code.as_str())
            .collect::<Vec<_>>();
        assert_eq!(codes, vec!["CSEN2031", "CHEM1003"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_failed_extraction_imports_nothing() -> Result<()> {
        let dir = tempdir()?;
        let mut tracker = Tracker::load(JsonFileStorage::new(dir.path().to_owned())?).await?;

        let mut extractor = MockSubjectExtractor::new();
        extractor
            .expect_extract()
            .returning(|_| Err(ExtractionError::MalformedResponse("not an array".into())));

        let result = import_subjects(&mut tracker, &extractor, &image(), false).await;
        let error = result.unwrap_err();
        assert!(error.downcast_ref::<ExtractionError>().is_some());
        assert!(tracker.subjects().is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn test_dry_run_leaves_tracker_untouched() -> Result<()> {
        let dir = tempdir()?;
        let mut tracker = Tracker::load(JsonFileStorage::new(dir.path().to_owned())?).await?;

        let mut extractor = MockSubjectExtractor::new();
        extractor
            .expect_extract()
            .returning(|_| Ok(vec![row("CSEN2031", 20, 25)]));

        let report = import_subjects(&mut tracker, &extractor, &image(), true).await?;
        assert_eq!(report.accepted.len(), 1);
        assert!(report.added.is_empty());
        assert!(tracker.subjects().is_empty());
        Ok(())
    }
}

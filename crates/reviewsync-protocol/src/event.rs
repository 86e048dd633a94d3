use chrono::DateTime;
use serde::{Deserialize, Serialize};

use crate::ids::{CellKey, ColumnId, FileId, ReviewId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectedEvent {
    pub review_id: ReviewId,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct HeartbeatEvent {
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStartedEvent {
    pub review_id: ReviewId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisCompletedEvent {
    pub review_id: ReviewId,
    pub message: Option<String>,
    pub progress: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisFailedEvent {
    pub review_id: ReviewId,
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellProcessingStartedEvent {
    pub review_id: ReviewId,
    pub file_id: FileId,
    pub column_id: ColumnId,
    pub message: Option<String>,
}

/// Extracted value block nested inside `cell_completed` frames.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellResult {
    pub extracted_value: Option<String>,
    pub confidence_score: Option<f64>,
    pub source_reference: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellCompletedEvent {
    pub review_id: ReviewId,
    pub file_id: FileId,
    pub column_id: ColumnId,
    pub result: CellResult,
    pub progress: Option<f64>,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellErrorEvent {
    pub review_id: ReviewId,
    pub file_id: FileId,
    pub column_id: ColumnId,
    pub error: String,
    pub timestamp: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAddedEvent {
    pub review_id: ReviewId,
    pub column_id: ColumnId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesAddedEvent {
    pub review_id: ReviewId,
    pub file_count: Option<u64>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultUpdatedEvent {
    pub review_id: ReviewId,
    pub result_id: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnUpdatedEvent {
    pub review_id: ReviewId,
    pub column_id: ColumnId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDeletedEvent {
    pub review_id: ReviewId,
    pub column_id: ColumnId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesAnalysisStartedEvent {
    pub review_id: ReviewId,
    #[serde(default)]
    pub file_ids: Vec<FileId>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesAnalysisCompletedEvent {
    pub review_id: ReviewId,
    #[serde(default)]
    pub file_ids: Vec<FileId>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilesAnalysisFailedEvent {
    pub review_id: ReviewId,
    #[serde(default)]
    pub file_ids: Vec<FileId>,
    pub error: Option<String>,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnalysisStartedEvent {
    pub review_id: ReviewId,
    pub column_id: ColumnId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnalysisCompletedEvent {
    pub review_id: ReviewId,
    pub column_id: ColumnId,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnAnalysisFailedEvent {
    pub review_id: ReviewId,
    pub column_id: ColumnId,
    pub error: Option<String>,
    pub message: Option<String>,
}

/// Closed union of every frame the live channel can deliver.
///
/// Frames with an unknown `type` or a payload that does not match its
/// variant shape fail deserialization; the transport logs and drops them
/// instead of surfacing a parse error to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    Connected(ConnectedEvent),
    Heartbeat(HeartbeatEvent),
    AnalysisStarted(AnalysisStartedEvent),
    AnalysisCompleted(AnalysisCompletedEvent),
    AnalysisFailed(AnalysisFailedEvent),
    CellProcessingStarted(CellProcessingStartedEvent),
    CellCompleted(CellCompletedEvent),
    CellError(CellErrorEvent),
    ColumnAdded(ColumnAddedEvent),
    ColumnUpdated(ColumnUpdatedEvent),
    ColumnDeleted(ColumnDeletedEvent),
    FilesAdded(FilesAddedEvent),
    ResultUpdated(ResultUpdatedEvent),
    FilesAnalysisStarted(FilesAnalysisStartedEvent),
    FilesAnalysisCompleted(FilesAnalysisCompletedEvent),
    FilesAnalysisFailed(FilesAnalysisFailedEvent),
    ColumnAnalysisStarted(ColumnAnalysisStartedEvent),
    ColumnAnalysisCompleted(ColumnAnalysisCompletedEvent),
    ColumnAnalysisFailed(ColumnAnalysisFailedEvent),
}

impl LiveEvent {
    /// The review this frame belongs to; `heartbeat` is review-agnostic.
    pub fn review_id(&self) -> Option<&ReviewId> {
        match self {
            Self::Connected(event) => Some(&event.review_id),
            Self::Heartbeat(_) => None,
            Self::AnalysisStarted(event) => Some(&event.review_id),
            Self::AnalysisCompleted(event) => Some(&event.review_id),
            Self::AnalysisFailed(event) => Some(&event.review_id),
            Self::CellProcessingStarted(event) => Some(&event.review_id),
            Self::CellCompleted(event) => Some(&event.review_id),
            Self::CellError(event) => Some(&event.review_id),
            Self::ColumnAdded(event) => Some(&event.review_id),
            Self::ColumnUpdated(event) => Some(&event.review_id),
            Self::ColumnDeleted(event) => Some(&event.review_id),
            Self::FilesAdded(event) => Some(&event.review_id),
            Self::ResultUpdated(event) => Some(&event.review_id),
            Self::FilesAnalysisStarted(event) => Some(&event.review_id),
            Self::FilesAnalysisCompleted(event) => Some(&event.review_id),
            Self::FilesAnalysisFailed(event) => Some(&event.review_id),
            Self::ColumnAnalysisStarted(event) => Some(&event.review_id),
            Self::ColumnAnalysisCompleted(event) => Some(&event.review_id),
            Self::ColumnAnalysisFailed(event) => Some(&event.review_id),
        }
    }

    pub fn cell_key(&self) -> Option<CellKey> {
        match self {
            Self::CellProcessingStarted(event) => Some(CellKey::new(
                event.file_id.clone(),
                event.column_id.clone(),
            )),
            Self::CellCompleted(event) => Some(CellKey::new(
                event.file_id.clone(),
                event.column_id.clone(),
            )),
            Self::CellError(event) => Some(CellKey::new(
                event.file_id.clone(),
                event.column_id.clone(),
            )),
            _ => None,
        }
    }
}

/// Parse an RFC 3339 event-origin timestamp into epoch milliseconds.
///
/// The backend emits naive ISO timestamps without an offset; those are
/// interpreted as UTC.
pub fn timestamp_millis(raw: &str) -> Option<i64> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.timestamp_millis());
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc().timestamp_millis())
}

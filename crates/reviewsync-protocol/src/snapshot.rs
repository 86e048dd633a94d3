use serde::{Deserialize, Serialize};

use crate::event::timestamp_millis;
use crate::ids::{CellKey, ColumnId, FileId, ReviewId};

/// Declared review-level status as persisted by the backend.
///
/// The backend writes `failed` for a review whose analysis aborted; that is
/// the same terminal error state this engine calls `error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    Draft,
    Queued,
    Processing,
    Completed,
    #[serde(alias = "failed")]
    Error,
}

impl ReviewStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    pub id: ColumnId,
    pub column_name: String,
    pub prompt: String,
    pub data_type: Option<String>,
    pub column_order: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub file_id: FileId,
    pub filename: Option<String>,
    pub file_size: Option<u64>,
    pub status: Option<String>,
}

/// One already-persisted extraction result from the snapshot read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedResult {
    pub file_id: FileId,
    pub column_id: ColumnId,
    pub extracted_value: Option<String>,
    pub confidence_score: Option<f64>,
    pub source_reference: Option<String>,
    pub created_at: Option<String>,
}

impl PersistedResult {
    pub fn cell_key(&self) -> CellKey {
        CellKey::new(self.file_id.clone(), self.column_id.clone())
    }

    pub fn created_at_millis(&self) -> Option<i64> {
        self.created_at.as_deref().and_then(timestamp_millis)
    }
}

/// Structural description of a review plus any results persisted so far.
///
/// Seeds the cell store before any live event arrives and backfills it when
/// polling observes a terminal status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSnapshot {
    pub id: ReviewId,
    pub status: ReviewStatus,
    pub created_at: Option<String>,
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub files: Vec<FileDescriptor>,
    #[serde(default)]
    pub results: Vec<PersistedResult>,
}

impl ReviewSnapshot {
    /// Every (document, column) identity the review currently declares.
    pub fn cell_keys(&self) -> impl Iterator<Item = CellKey> + '_ {
        self.files.iter().flat_map(move |file| {
            self.columns
                .iter()
                .map(move |column| CellKey::new(file.file_id.clone(), column.id.clone()))
        })
    }

    pub fn total_cells(&self) -> usize {
        self.files.len() * self.columns.len()
    }

    pub fn created_at_millis(&self) -> Option<i64> {
        self.created_at.as_deref().and_then(timestamp_millis)
    }
}

/// Status-poll response; extra fields on the wire are ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisStatus {
    pub status: ReviewStatus,
    #[serde(default)]
    pub progress_percentage: f64,
}

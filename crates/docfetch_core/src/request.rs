use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

pub type RequestId = u64;

/// What the user asked for. Drives the fetch program's kind flag and the
/// resolver's course-code heuristics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    Book,
    Paper,
}

impl DocKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::Book => "book",
            DocKind::Paper => "paper",
        }
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RequestStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Failed)
    }

    /// Status only moves forward: queued -> processing -> completed|failed.
    pub fn can_advance_to(self, next: RequestStatus) -> bool {
        matches!(
            (self, next),
            (RequestStatus::Queued, RequestStatus::Processing)
                | (RequestStatus::Processing, RequestStatus::Completed)
                | (RequestStatus::Processing, RequestStatus::Failed)
        )
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            RequestStatus::Queued => "queued",
            RequestStatus::Processing => "processing",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Opaque handle back to the message/chat a request came from.
///
/// Owned by the messaging collaborator; the scheduler only carries it around
/// so replies land in the right place.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceRef(pub String);

impl SourceRef {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Files a scheduled cleanup timer will delete when it fires.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CleanupHandle {
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: RequestId,
    pub query: String,
    pub kind: DocKind,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub source: SourceRef,
    pub error: Option<String>,
    pub cleanup: Option<CleanupHandle>,
}

impl Request {
    pub fn new(
        id: RequestId,
        query: impl Into<String>,
        kind: DocKind,
        source: SourceRef,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            query: query.into(),
            kind,
            status: RequestStatus::Queued,
            created_at,
            source,
            error: None,
            cleanup: None,
        }
    }
}

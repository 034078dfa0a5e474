use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub type RequestId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchKind {
    Book,
    Paper,
}

impl FetchKind {
    /// Value passed to the fetch program after `--kind`.
    pub fn as_flag(self) -> &'static str {
        match self {
            FetchKind::Book => "book",
            FetchKind::Paper => "paper",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobProgress {
    pub request_id: RequestId,
    pub stream: OutputStream,
    pub line: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    Progress(JobProgress),
    FetchCompleted {
        request_id: RequestId,
        result: Result<Artifact, FetchFailure>,
    },
    CleanupFinished {
        request_id: RequestId,
    },
    SweepDue,
}

/// What one run of the fetch program amounted to, before any file lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResult {
    pub outcome: FetchOutcome,
    pub message: String,
    pub file_path: Option<PathBuf>,
    pub cover_path: Option<PathBuf>,
    pub alternatives: Vec<String>,
    /// Raw stdout kept for diagnostics when it could not be interpreted.
    pub raw_output: Option<String>,
}

impl FetchResult {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            outcome: FetchOutcome::Success,
            message: message.into(),
            file_path: None,
            cover_path: None,
            alternatives: Vec::new(),
            raw_output: None,
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            outcome: FetchOutcome::Failure(kind),
            ..Self::success(message)
        }
    }

    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        self.raw_output = Some(raw.into());
        self
    }

    pub fn is_success(&self) -> bool {
        self.outcome == FetchOutcome::Success
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Success,
    Failure(FailureKind),
}

/// A located artifact ready to hand to the messaging side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub cover: Option<PathBuf>,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct FetchFailure {
    pub kind: FailureKind,
    pub message: String,
    pub alternatives: Vec<String>,
    pub diagnostic: Option<String>,
}

impl FetchFailure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            alternatives: Vec::new(),
            diagnostic: None,
        }
    }

    /// Short text suitable for a chat reply.
    pub fn user_message(&self) -> String {
        const LIMIT: usize = 300;
        let message = self.message.trim();
        if message.chars().count() <= LIMIT {
            return message.to_string();
        }
        let mut short: String = message.chars().take(LIMIT).collect();
        short.push_str("...");
        short
    }
}

impl From<FetchResult> for FetchFailure {
    fn from(result: FetchResult) -> Self {
        let kind = match result.outcome {
            FetchOutcome::Failure(kind) => kind,
            FetchOutcome::Success => FailureKind::ArtifactNotFound,
        };
        Self {
            kind,
            message: result.message,
            alternatives: result.alternatives,
            diagnostic: result.raw_output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The process could not be started.
    InvocationError,
    /// Non-zero exit, death by signal (`code: None`) or stderr output.
    ProcessFailure { code: Option<i32> },
    Timeout,
    MalformedOutput,
    ArtifactNotFound,
    /// The program itself said it failed, via a structured record.
    Reported,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvocationError => write!(f, "invocation error"),
            FailureKind::ProcessFailure { code: Some(code) } => {
                write!(f, "process failure (exit code {code})")
            }
            FailureKind::ProcessFailure { code: None } => write!(f, "process failure"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::MalformedOutput => write!(f, "malformed output"),
            FailureKind::ArtifactNotFound => write!(f, "artifact not found"),
            FailureKind::Reported => write!(f, "fetch failed"),
        }
    }
}

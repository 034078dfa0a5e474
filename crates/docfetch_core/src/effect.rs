use std::path::PathBuf;

use crate::{DocKind, RequestId, SourceRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    React {
        source: SourceRef,
        reaction: Reaction,
    },
    Reply {
        source: SourceRef,
        text: String,
    },
    StartFetch {
        request_id: RequestId,
        query: String,
        kind: DocKind,
    },
    DeliverArtifact {
        source: SourceRef,
        artifact: PathBuf,
        cover: Option<PathBuf>,
        caption: String,
    },
    ScheduleCleanup {
        request_id: RequestId,
        files: Vec<PathBuf>,
    },
    /// Delete right away; nobody is waiting for these files.
    DiscardFiles { files: Vec<PathBuf> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reaction {
    Received,
    Succeeded,
    Failed,
}

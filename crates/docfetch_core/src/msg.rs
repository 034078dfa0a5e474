use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::{RequestId, SourceRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Msg {
    /// Text arrived from the messaging collaborator.
    CommandReceived {
        source: SourceRef,
        text: String,
        at: DateTime<Utc>,
    },
    /// A dispatched fetch ran to completion (artifact resolved or not).
    FetchFinished {
        request_id: RequestId,
        outcome: DispatchOutcome,
    },
    /// A per-request cleanup timer fired and its files are gone.
    CleanupFinished { request_id: RequestId },
    /// Periodic stale sweep.
    SweepTick { now: DateTime<Utc> },
    /// The inbound command stream ended; stop admitting.
    InputClosed,
}

/// What the engine reports back for one dispatch, already reduced to the
/// terms the scheduler cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered {
        artifact: PathBuf,
        cover: Option<PathBuf>,
        message: String,
    },
    Failed {
        reason: String,
        alternatives: Vec<String>,
    },
}

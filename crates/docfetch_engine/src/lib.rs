//! Docfetch engine: fetch processes, artifact resolution and cleanup timers.
mod classify;
mod engine;
mod invoker;
mod outdir;
mod reaper;
mod resolver;
mod types;

pub use classify::{classify_output, ClassificationTier, ProcessOutput, INVALID_OUTPUT};
pub use engine::{settle, EngineEvents, EngineHandle, EngineSettings};
pub use invoker::{
    ChannelProgressSink, FetchInvoker, InvokerSettings, ProcessInvoker, ProgressSink,
};
pub use outdir::{ensure_output_dir, list_candidates, Candidate, OutputDirError};
pub use reaper::{cleanup_delay, remove_artifacts, ReaperSettings};
pub use resolver::{
    extract_course_code, extract_year, select_candidate, tokenize_query, ArtifactResolver,
    ResolverSettings, ScoringRules,
};
pub use types::{
    Artifact, EngineEvent, FailureKind, FetchFailure, FetchKind, FetchOutcome, FetchResult,
    JobProgress, OutputStream, RequestId,
};

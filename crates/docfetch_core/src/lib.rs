//! Docfetch core: pure scheduling state machine for document requests.
mod command;
mod effect;
mod ledger;
mod msg;
mod queue;
mod request;
mod scheduler;
mod update;
mod view_model;

pub use command::{normalize_query, Command};
pub use effect::{Effect, Reaction};
pub use ledger::Ledger;
pub use msg::{DispatchOutcome, Msg};
pub use queue::AdmissionQueue;
pub use request::{CleanupHandle, DocKind, Request, RequestId, RequestStatus, SourceRef};
pub use scheduler::{AdmissionError, SchedulerConfig, SchedulerState};
pub use update::update;
pub use view_model::{help_text, SchedulerView};

use std::sync::mpsc;
use std::thread;

use chrono::Utc;
use docfetch_core::{DispatchOutcome, DocKind, Effect, Msg};
use docfetch_engine::{Artifact, EngineEvent, EngineEvents, EngineHandle, FetchFailure, FetchKind};
use docfetch_logging::{fetch_debug, fetch_info, fetch_warn};

use super::messenger::Messenger;

/// Carries out the effects `update` asks for: engine work goes to the
/// engine, everything user-facing goes to the messenger.
pub struct EffectRunner<M: Messenger> {
    engine: EngineHandle,
    messenger: M,
}

impl<M: Messenger> EffectRunner<M> {
    pub fn new(engine: EngineHandle, messenger: M) -> Self {
        Self { engine, messenger }
    }

    #[cfg(test)]
    pub fn messenger(&self) -> &M {
        &self.messenger
    }

    pub fn run(&self, effects: Vec<Effect>) {
        for effect in effects {
            self.run_one(effect);
        }
    }

    fn run_one(&self, effect: Effect) {
        match effect {
            Effect::React { source, reaction } => {
                if let Err(err) = self.messenger.react(&source, reaction) {
                    fetch_warn!("reaction {:?} to {} failed: {}", reaction, source, err);
                }
            }
            Effect::Reply { source, text } => {
                if let Err(err) = self.messenger.reply(&source, &text) {
                    fetch_warn!("reply to {} failed: {}", source, err);
                }
            }
            Effect::StartFetch {
                request_id,
                query,
                kind,
            } => {
                fetch_info!("dispatching request {} ({}) {:?}", request_id, kind, query);
                self.engine.dispatch(request_id, query, map_kind(kind));
            }
            Effect::DeliverArtifact {
                source,
                artifact,
                cover,
                caption,
            } => {
                if let Err(err) = self.messenger.send_document(&source, &artifact, &caption) {
                    fetch_warn!("delivering {:?} to {} failed: {}", artifact, source, err);
                }
                if let Some(cover) = cover {
                    if let Err(err) = self.messenger.send_image(&source, &cover) {
                        fetch_warn!("delivering cover {:?} to {} failed: {}", cover, source, err);
                    }
                }
            }
            Effect::ScheduleCleanup { request_id, files } => {
                fetch_debug!(
                    "cleanup for request {} scheduled ({} files)",
                    request_id,
                    files.len()
                );
                self.engine.schedule_cleanup(request_id, files);
            }
            Effect::DiscardFiles { files } => {
                fetch_info!("discarding {} orphaned files", files.len());
                self.engine.discard(files);
            }
        }
    }

    /// Runs cleanup timers that have not fired yet. Returns the number of
    /// files removed.
    pub fn shutdown(&self) -> usize {
        self.engine.flush_cleanups()
    }
}

/// Forwards engine events to the scheduling loop until either side hangs up.
pub fn spawn_event_forwarder(events: EngineEvents, msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        while let Some(event) = events.recv() {
            let Some(msg) = map_event(event) else {
                continue;
            };
            if msg_tx.send(msg).is_err() {
                break;
            }
        }
    });
}

pub fn map_event(event: EngineEvent) -> Option<Msg> {
    match event {
        EngineEvent::Progress(_) => None,
        EngineEvent::FetchCompleted { request_id, result } => Some(Msg::FetchFinished {
            request_id,
            outcome: map_outcome(request_id, result),
        }),
        EngineEvent::CleanupFinished { request_id } => Some(Msg::CleanupFinished { request_id }),
        EngineEvent::SweepDue => Some(Msg::SweepTick { now: Utc::now() }),
    }
}

fn map_outcome(request_id: u64, result: Result<Artifact, FetchFailure>) -> DispatchOutcome {
    match result {
        Ok(artifact) => DispatchOutcome::Delivered {
            artifact: artifact.path,
            cover: artifact.cover,
            message: artifact.message,
        },
        Err(failure) => {
            fetch_warn!("request {} failed: {}", request_id, failure);
            if let Some(diagnostic) = &failure.diagnostic {
                fetch_debug!("request {} output was: {}", request_id, diagnostic);
            }
            let mut reason = failure.user_message();
            if reason.is_empty() {
                reason = failure.kind.to_string();
            }
            DispatchOutcome::Failed {
                reason,
                alternatives: failure.alternatives,
            }
        }
    }
}

fn map_kind(kind: DocKind) -> FetchKind {
    match kind {
        DocKind::Book => FetchKind::Book,
        DocKind::Paper => FetchKind::Paper,
    }
}

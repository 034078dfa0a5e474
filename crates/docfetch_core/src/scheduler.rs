use std::collections::{BTreeSet, VecDeque};
use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use crate::command::normalize_query;
use crate::{
    AdmissionQueue, CleanupHandle, DispatchOutcome, DocKind, Effect, Ledger, Reaction, Request,
    RequestId, RequestStatus, SchedulerView, SourceRef,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Admission queue depth; submissions beyond it are refused.
    pub queue_capacity: usize,
    /// Fetch processes allowed to run at once.
    pub max_concurrent: usize,
    /// Ledger entries older than this are dropped by the sweep.
    pub stale_after: Duration,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 10,
            max_concurrent: 3,
            stale_after: Duration::hours(1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AdmissionError {
    #[error("the download queue is full ({capacity} requests), try again later")]
    QueueFull { capacity: usize },
    #[error("nothing to search for")]
    EmptyQuery,
}

/// Owns every piece of request bookkeeping: the ledger, both queues and the
/// set of worker slots in use.
///
/// All mutation goes through `&mut self`, so whoever owns the state is the
/// single scheduling thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerState {
    config: SchedulerConfig,
    ledger: Ledger,
    admission: AdmissionQueue,
    pending: VecDeque<RequestId>,
    running: BTreeSet<RequestId>,
    next_id: RequestId,
    accepting: bool,
}

impl Default for SchedulerState {
    fn default() -> Self {
        Self::new(SchedulerConfig::default())
    }
}

impl SchedulerState {
    pub fn new(config: SchedulerConfig) -> Self {
        let admission = AdmissionQueue::new(config.queue_capacity);
        Self {
            config,
            ledger: Ledger::new(),
            admission,
            pending: VecDeque::new(),
            running: BTreeSet::new(),
            next_id: 1,
            accepting: true,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn request(&self, id: RequestId) -> Option<&Request> {
        self.ledger.get(id)
    }

    pub fn pending_ids(&self) -> Vec<RequestId> {
        self.pending.iter().copied().collect()
    }

    pub fn running_ids(&self) -> Vec<RequestId> {
        self.running.iter().copied().collect()
    }

    pub fn admitted_len(&self) -> usize {
        self.admission.len()
    }

    pub fn accepting(&self) -> bool {
        self.accepting
    }

    pub fn close_input(&mut self) {
        self.accepting = false;
    }

    /// Nothing running and nothing waiting for a slot.
    pub fn is_idle(&self) -> bool {
        self.running.is_empty() && self.pending.is_empty()
    }

    /// Admits a request: ledger entry in `queued`, a place in the admission
    /// queue, then an immediate dispatch attempt.
    pub fn submit(
        &mut self,
        raw_query: &str,
        kind: DocKind,
        source: SourceRef,
        now: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) -> Result<RequestId, AdmissionError> {
        let (query, kind) = normalize_query(raw_query, kind);
        if query.is_empty() {
            return Err(AdmissionError::EmptyQuery);
        }
        if self.admission.is_full() {
            return Err(AdmissionError::QueueFull {
                capacity: self.admission.capacity(),
            });
        }

        let id = self.next_id;
        self.next_id += 1;
        self.ledger.insert(Request::new(id, query, kind, source, now));
        self.admission.try_push(id);
        self.dispatch(id, effects);
        Ok(id)
    }

    /// Starts the request if a worker slot is free, otherwise parks it at the
    /// back of the pending queue. Only `queued` requests are considered.
    pub fn dispatch(&mut self, id: RequestId, effects: &mut Vec<Effect>) {
        let Some(request) = self.ledger.get(id) else {
            return;
        };
        if request.status != RequestStatus::Queued {
            return;
        }

        if self.running.len() < self.config.max_concurrent {
            let query = request.query.clone();
            let kind = request.kind;
            self.running.insert(id);
            self.ledger.advance(id, RequestStatus::Processing);
            effects.push(Effect::StartFetch {
                request_id: id,
                query,
                kind,
            });
        } else if !self.pending.contains(&id) {
            self.pending.push_back(id);
        }
    }

    /// Books the end of a dispatch: frees the slot, records the terminal
    /// status, reports to the source, schedules cleanup and starts the next
    /// waiter.
    ///
    /// Completions for ids that hold no slot are ignored. A completion whose
    /// ledger entry was already swept still frees its slot, and its files are
    /// discarded.
    pub fn complete(&mut self, id: RequestId, outcome: DispatchOutcome, effects: &mut Vec<Effect>) {
        if !self.running.remove(&id) {
            return;
        }
        self.admission.remove(id);

        match self.ledger.get(id).cloned() {
            Some(request) => self.record_outcome(request, outcome, effects),
            None => {
                if let DispatchOutcome::Delivered {
                    artifact, cover, ..
                } = outcome
                {
                    effects.push(Effect::DiscardFiles {
                        files: artifact_files(artifact, cover),
                    });
                }
            }
        }

        self.drain_pending(effects);
    }

    fn record_outcome(
        &mut self,
        request: Request,
        outcome: DispatchOutcome,
        effects: &mut Vec<Effect>,
    ) {
        let id = request.id;
        let files = match outcome {
            DispatchOutcome::Delivered {
                artifact,
                cover,
                message,
            } => {
                self.ledger.advance(id, RequestStatus::Completed);
                let caption = if message.trim().is_empty() {
                    format!("Here is '{}'", request.query)
                } else {
                    message
                };
                effects.push(Effect::DeliverArtifact {
                    source: request.source.clone(),
                    artifact: artifact.clone(),
                    cover: cover.clone(),
                    caption,
                });
                effects.push(Effect::React {
                    source: request.source.clone(),
                    reaction: Reaction::Succeeded,
                });
                artifact_files(artifact, cover)
            }
            DispatchOutcome::Failed {
                reason,
                alternatives,
            } => {
                self.ledger.advance(id, RequestStatus::Failed);
                self.ledger.set_error(id, reason.clone());
                effects.push(Effect::Reply {
                    source: request.source.clone(),
                    text: failure_text(&request.query, &reason, &alternatives),
                });
                effects.push(Effect::React {
                    source: request.source.clone(),
                    reaction: Reaction::Failed,
                });
                Vec::new()
            }
        };

        self.ledger.attach_cleanup(
            id,
            CleanupHandle {
                files: files.clone(),
            },
        );
        effects.push(Effect::ScheduleCleanup {
            request_id: id,
            files,
        });
    }

    fn drain_pending(&mut self, effects: &mut Vec<Effect>) {
        while self.running.len() < self.config.max_concurrent {
            let Some(next) = self.pending.pop_front() else {
                break;
            };
            self.dispatch(next, effects);
        }
    }

    /// Drops every ledger entry older than the staleness threshold,
    /// whatever its status, and scrubs it from both queues. Running fetches
    /// keep their slot until their completion arrives.
    pub fn sweep(&mut self, now: DateTime<Utc>) -> Vec<RequestId> {
        let stale = self.ledger.stale_ids(now, self.config.stale_after);
        for id in &stale {
            self.ledger.remove(*id);
            self.admission.remove(*id);
            self.pending.retain(|pending| pending != id);
        }
        stale
    }

    /// Removes a request whose cleanup timer fired. Safe to call repeatedly.
    pub fn finish_cleanup(&mut self, id: RequestId) -> bool {
        self.admission.remove(id);
        self.ledger.remove(id).is_some()
    }

    pub fn view(&self) -> SchedulerView {
        SchedulerView {
            admitted: self.admission.len(),
            capacity: self.admission.capacity(),
            running: self.running.len(),
            max_concurrent: self.config.max_concurrent,
            pending: self.pending.len(),
            queued: self.ledger.count_with_status(RequestStatus::Queued),
            processing: self.ledger.count_with_status(RequestStatus::Processing),
            completed: self.ledger.count_with_status(RequestStatus::Completed),
            failed: self.ledger.count_with_status(RequestStatus::Failed),
            accepting: self.accepting,
        }
    }

    /// One-based place of `id` in the pending queue.
    pub fn pending_position(&self, id: RequestId) -> Option<usize> {
        self.pending
            .iter()
            .position(|pending| *pending == id)
            .map(|index| index + 1)
    }
}

fn artifact_files(artifact: PathBuf, cover: Option<PathBuf>) -> Vec<PathBuf> {
    let mut files = vec![artifact];
    files.extend(cover);
    files
}

fn failure_text(query: &str, reason: &str, alternatives: &[String]) -> String {
    let mut text = format!("Could not fetch '{query}': {reason}");
    if !alternatives.is_empty() {
        text.push_str("\nYou could try:");
        for alternative in alternatives {
            text.push_str("\n- ");
            text.push_str(alternative);
        }
    }
    text
}

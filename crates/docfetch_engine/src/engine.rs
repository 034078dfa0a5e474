use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Duration;

use docfetch_logging::{fetch_info, fetch_warn};

use crate::invoker::{ChannelProgressSink, FetchInvoker, InvokerSettings, ProcessInvoker};
use crate::reaper::{
    cleanup_delay, remove_artifacts, run_cleanup, run_sweep_ticker, PendingCleanups,
    ReaperSettings,
};
use crate::resolver::{ArtifactResolver, ResolverSettings};
use crate::{Artifact, EngineEvent, FailureKind, FetchFailure, FetchKind, FetchResult, RequestId};

#[derive(Debug, Clone, Default)]
pub struct EngineSettings {
    pub invoker: InvokerSettings,
    pub resolver: ResolverSettings,
    pub reaper: ReaperSettings,
}

enum EngineCommand {
    Dispatch {
        request_id: RequestId,
        query: String,
        kind: FetchKind,
    },
    ScheduleCleanup {
        request_id: RequestId,
        files: Vec<PathBuf>,
    },
    Discard {
        files: Vec<PathBuf>,
    },
    FlushCleanups {
        done: mpsc::Sender<usize>,
    },
}

/// Sending half of the engine. Work runs on the engine's own tokio runtime
/// thread; results come back through [`EngineEvents`].
pub struct EngineHandle {
    cmd_tx: mpsc::Sender<EngineCommand>,
}

/// Receiving half of the engine.
pub struct EngineEvents {
    event_rx: mpsc::Receiver<EngineEvent>,
}

impl EngineHandle {
    pub fn spawn(settings: EngineSettings) -> (Self, EngineEvents) {
        let invoker = Arc::new(ProcessInvoker::new(settings.invoker.clone()));
        Self::spawn_with_invoker(settings, invoker)
    }

    pub fn spawn_with_invoker(
        settings: EngineSettings,
        invoker: Arc<dyn FetchInvoker>,
    ) -> (Self, EngineEvents) {
        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let resolver = Arc::new(ArtifactResolver::new(settings.resolver.clone()));
        let reaper = settings.reaper;

        thread::spawn(move || {
            let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
            let pending = PendingCleanups::default();
            if !reaper.sweep_interval.is_zero() {
                runtime.spawn(run_sweep_ticker(reaper.sweep_interval, event_tx.clone()));
            }
            while let Ok(command) = cmd_rx.recv() {
                match command {
                    EngineCommand::Dispatch {
                        request_id,
                        query,
                        kind,
                    } => {
                        let invoker = invoker.clone();
                        let resolver = resolver.clone();
                        let event_tx = event_tx.clone();
                        runtime.spawn(async move {
                            let sink = ChannelProgressSink::new(event_tx.clone());
                            let result = invoker.run(request_id, &query, kind, &sink).await;
                            let result = settle(result, &resolver, &query, kind);
                            let _ = event_tx.send(EngineEvent::FetchCompleted { request_id, result });
                        });
                    }
                    EngineCommand::ScheduleCleanup { request_id, files } => {
                        pending.insert(request_id, files);
                        let delay = cleanup_delay(reaper.cleanup_delay, reaper.cleanup_jitter);
                        runtime.spawn(run_cleanup(
                            request_id,
                            delay,
                            pending.clone(),
                            event_tx.clone(),
                        ));
                    }
                    EngineCommand::Discard { files } => {
                        remove_artifacts(&files);
                    }
                    EngineCommand::FlushCleanups { done } => {
                        let mut removed = 0;
                        for (request_id, files) in pending.take_all() {
                            removed += remove_artifacts(&files);
                            let _ = event_tx.send(EngineEvent::CleanupFinished { request_id });
                        }
                        let _ = done.send(removed);
                    }
                }
            }
            // Dropping the runtime kills any fetch still running.
            runtime.shutdown_timeout(Duration::from_secs(1));
        });

        (Self { cmd_tx }, EngineEvents { event_rx })
    }

    pub fn dispatch(&self, request_id: RequestId, query: impl Into<String>, kind: FetchKind) {
        let _ = self.cmd_tx.send(EngineCommand::Dispatch {
            request_id,
            query: query.into(),
            kind,
        });
    }

    pub fn schedule_cleanup(&self, request_id: RequestId, files: Vec<PathBuf>) {
        let _ = self
            .cmd_tx
            .send(EngineCommand::ScheduleCleanup { request_id, files });
    }

    pub fn discard(&self, files: Vec<PathBuf>) {
        let _ = self.cmd_tx.send(EngineCommand::Discard { files });
    }

    /// Runs every pending cleanup now and waits for it. Returns the number
    /// of files removed.
    pub fn flush_cleanups(&self) -> usize {
        let (done, wait) = mpsc::channel();
        if self.cmd_tx.send(EngineCommand::FlushCleanups { done }).is_err() {
            return 0;
        }
        wait.recv().unwrap_or(0)
    }
}

impl EngineEvents {
    /// Blocks until the next event; `None` once the engine is gone.
    pub fn recv(&self) -> Option<EngineEvent> {
        self.event_rx.recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }
}

/// Turns a raw fetch result into a deliverable artifact, consulting the
/// resolver when the program gave no usable path.
pub fn settle(
    result: FetchResult,
    resolver: &ArtifactResolver,
    query: &str,
    kind: FetchKind,
) -> Result<Artifact, FetchFailure> {
    if !result.is_success() {
        return Err(FetchFailure::from(result));
    }

    let stated = result
        .file_path
        .as_deref()
        .and_then(|path| locate(path, resolver.output_dir()));
    let path = match stated {
        Some(path) => path,
        None => {
            if let Some(path) = &result.file_path {
                fetch_warn!("stated artifact {:?} does not exist, resolving by name", path);
            }
            match resolver.resolve(query, kind) {
                Some(path) => path,
                None => {
                    let mut failure = FetchFailure::new(
                        FailureKind::ArtifactNotFound,
                        "the download reported success but no file was found",
                    );
                    failure.alternatives = result.alternatives;
                    failure.diagnostic = result.raw_output;
                    return Err(failure);
                }
            }
        }
    };
    let cover = result
        .cover_path
        .as_deref()
        .and_then(|cover| locate(cover, resolver.output_dir()));

    fetch_info!("artifact for {:?}: {:?} (cover {:?})", query, path, cover);
    Ok(Artifact {
        path,
        cover,
        message: result.message,
    })
}

/// The path as given if it exists, else the same file name inside the
/// output directory.
fn locate(path: &Path, output_dir: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    let in_output = output_dir.join(path.file_name()?);
    in_output.is_file().then_some(in_output)
}

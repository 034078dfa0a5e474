use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use docfetch_logging::{fetch_debug, fetch_info, fetch_warn, process_line};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::classify::{classify_output, ProcessOutput};
use crate::{EngineEvent, FailureKind, FetchKind, FetchResult, JobProgress, OutputStream, RequestId};

#[derive(Debug, Clone)]
pub struct InvokerSettings {
    pub program: PathBuf,
    /// Arguments placed before `--kind <kind> <query>`.
    pub args: Vec<String>,
    pub working_dir: Option<PathBuf>,
    /// Hard wall-clock limit; the process is killed when it runs out.
    pub timeout: Duration,
    pub success_sentinel: String,
}

impl Default for InvokerSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("python3"),
            args: vec!["fetcher.py".to_string()],
            working_dir: None,
            timeout: Duration::from_secs(20 * 60),
            success_sentinel: "SUCCESS".to_string(),
        }
    }
}

pub trait ProgressSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

pub struct ChannelProgressSink {
    tx: std::sync::mpsc::Sender<EngineEvent>,
}

impl ChannelProgressSink {
    pub fn new(tx: std::sync::mpsc::Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl ProgressSink for ChannelProgressSink {
    fn emit(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }
}

/// Runs one fetch for one request. Never fails outright: every problem is
/// folded into a `FetchResult` failure.
#[async_trait::async_trait]
pub trait FetchInvoker: Send + Sync {
    async fn run(
        &self,
        request_id: RequestId,
        query: &str,
        kind: FetchKind,
        sink: &dyn ProgressSink,
    ) -> FetchResult;
}

/// Invokes the external fetch program as
/// `<program> <args..> --kind <book|paper> <query>`.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    settings: InvokerSettings,
}

impl ProcessInvoker {
    pub fn new(settings: InvokerSettings) -> Self {
        Self { settings }
    }

    fn build_command(&self, query: &str, kind: FetchKind) -> Command {
        let mut cmd = Command::new(&self.settings.program);
        cmd.args(&self.settings.args)
            .arg("--kind")
            .arg(kind.as_flag())
            .arg(query)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &self.settings.working_dir {
            cmd.current_dir(dir);
        }
        cmd
    }
}

#[async_trait::async_trait]
impl FetchInvoker for ProcessInvoker {
    async fn run(
        &self,
        request_id: RequestId,
        query: &str,
        kind: FetchKind,
        sink: &dyn ProgressSink,
    ) -> FetchResult {
        let program = self.settings.program.display().to_string();
        let mut child = match self.build_command(query, kind).spawn() {
            Ok(child) => child,
            Err(err) => {
                fetch_warn!("request {} could not start {}: {}", request_id, program, err);
                return FetchResult::failure(
                    FailureKind::InvocationError,
                    format!("could not start {program}: {err}"),
                );
            }
        };
        fetch_info!(
            "request {} started {} pid={:?} kind={} query={:?}",
            request_id,
            program,
            child.id(),
            kind.as_flag(),
            query
        );

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = async {
            let (stdout, stderr) = tokio::join!(
                collect_lines(stdout, request_id, OutputStream::Stdout, sink),
                collect_lines(stderr, request_id, OutputStream::Stderr, sink),
            );
            (child.wait().await, stdout, stderr)
        };

        let (status, stdout, stderr) = match tokio::time::timeout(self.settings.timeout, finished).await
        {
            Ok(done) => done,
            Err(_) => {
                fetch_warn!(
                    "request {} exceeded {:?}, killing {}",
                    request_id,
                    self.settings.timeout,
                    program
                );
                if let Err(err) = child.start_kill() {
                    fetch_warn!("request {} kill failed: {}", request_id, err);
                }
                let _ = child.wait().await;
                return FetchResult::failure(
                    FailureKind::Timeout,
                    format!("timed out after {}s", self.settings.timeout.as_secs()),
                );
            }
        };

        let status = match status {
            Ok(status) => status,
            Err(err) => {
                return FetchResult::failure(
                    FailureKind::InvocationError,
                    format!("lost track of {program}: {err}"),
                );
            }
        };

        let output = ProcessOutput {
            exit_code: status.code(),
            stdout,
            stderr,
        };
        let (tier, result) = classify_output(&output, &self.settings.success_sentinel);
        if tier.is_heuristic() {
            fetch_warn!(
                "request {} classified as success by {:?} fallback, no structured record",
                request_id,
                tier
            );
        } else {
            fetch_debug!(
                "request {} classified by {:?}: success={}",
                request_id,
                tier,
                result.is_success()
            );
        }
        result
    }
}

/// Reads a pipe to EOF, reporting each line as it arrives.
async fn collect_lines<R>(
    reader: Option<R>,
    request_id: RequestId,
    stream: OutputStream,
    sink: &dyn ProgressSink,
) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(reader) = reader else {
        return String::new();
    };
    let mut reader = BufReader::new(reader);
    let mut collected = String::new();
    let mut buf = Vec::new();
    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let line = String::from_utf8_lossy(&buf);
                collected.push_str(&line);
                let line = line.trim_end().to_string();
                process_line!("request {} {:?}: {}", request_id, stream, line);
                sink.emit(EngineEvent::Progress(JobProgress {
                    request_id,
                    stream,
                    line,
                }));
            }
            Err(err) => {
                fetch_warn!("request {} {:?} read failed: {}", request_id, stream, err);
                break;
            }
        }
    }
    collected
}

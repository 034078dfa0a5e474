use std::io::{self, BufRead};
use std::path::PathBuf;
use std::sync::mpsc;
use std::thread;

use anyhow::Context;
use chrono::Utc;
use docfetch_core::{update, Msg, SchedulerState};
use docfetch_engine::{ensure_output_dir, EngineHandle};
use docfetch_logging::{fetch_info, fetch_warn, parse_level};

use super::config::AppConfig;
use super::effects::{spawn_event_forwarder, EffectRunner};
use super::logging;
use super::messenger::{parse_inbound, ConsoleMessenger, Messenger};

const DEFAULT_CONFIG: &str = "docfetch.ron";

pub fn run_app() -> anyhow::Result<()> {
    let config_path = std::env::args_os()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG));
    let (config, source) = AppConfig::load(&config_path)?;

    logging::initialize(
        config.log.destination,
        parse_level(&config.log.level),
        &config.log.file,
    );
    fetch_info!(
        "docfetch starting with {}: output {:?}, {} workers, queue of {}",
        source,
        config.output_dir,
        config.scheduler.max_concurrent,
        config.scheduler.queue_capacity
    );

    ensure_output_dir(&config.output_dir)
        .with_context(|| format!("preparing output directory {:?}", config.output_dir))?;

    let (msg_tx, msg_rx) = mpsc::channel::<Msg>();
    let (engine, events) = EngineHandle::spawn(config.engine_settings());
    spawn_event_forwarder(events, msg_tx.clone());
    spawn_stdin_reader(msg_tx);

    let runner = EffectRunner::new(engine, ConsoleMessenger::stdout());
    let state = run(SchedulerState::new(config.scheduler_config()), &msg_rx, &runner);

    let removed = runner.shutdown();
    fetch_info!(
        "docfetch stopped: {} requests left in the ledger, {} files cleaned up at exit",
        state.ledger().len(),
        removed
    );
    Ok(())
}

/// The single scheduling loop. Every state change happens here, one
/// message at a time. Returns once input has closed and no request is
/// running or waiting.
fn run<M: Messenger>(
    mut state: SchedulerState,
    msg_rx: &mpsc::Receiver<Msg>,
    runner: &EffectRunner<M>,
) -> SchedulerState {
    while let Ok(msg) = msg_rx.recv() {
        let (next, effects) = update(state, msg);
        state = next;
        runner.run(effects);
        if !state.accepting() && state.is_idle() {
            break;
        }
    }
    state
}

fn spawn_stdin_reader(msg_tx: mpsc::Sender<Msg>) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            let line = match line {
                Ok(line) => line,
                Err(err) => {
                    fetch_warn!("stopped reading commands: {}", err);
                    break;
                }
            };
            if line.trim().is_empty() {
                continue;
            }
            let (source, text) = parse_inbound(&line);
            let msg = Msg::CommandReceived {
                source,
                text,
                at: Utc::now(),
            };
            if msg_tx.send(msg).is_err() {
                return;
            }
        }
        let _ = msg_tx.send(Msg::InputClosed);
    });
}

#[cfg(all(test, unix))]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use docfetch_core::{Reaction, SourceRef};

    use super::super::messenger::DeliveryError;
    use super::*;

    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<String>>,
    }

    impl RecordingMessenger {
        fn push(&self, entry: String) {
            self.sent.lock().unwrap().push(entry);
        }

        fn sent(&self) -> Vec<String> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl Messenger for RecordingMessenger {
        fn react(&self, source: &SourceRef, reaction: Reaction) -> Result<(), DeliveryError> {
            self.push(format!("{source} react {reaction:?}"));
            Ok(())
        }

        fn reply(&self, source: &SourceRef, text: &str) -> Result<(), DeliveryError> {
            self.push(format!("{source} reply {text}"));
            Ok(())
        }

        fn send_document(
            &self,
            source: &SourceRef,
            path: &Path,
            caption: &str,
        ) -> Result<(), DeliveryError> {
            let name = path.file_name().unwrap().to_string_lossy();
            self.push(format!("{source} document {name} {caption}"));
            Ok(())
        }

        fn send_image(&self, source: &SourceRef, path: &Path) -> Result<(), DeliveryError> {
            self.push(format!("{source} image {}", path.display()));
            Ok(())
        }
    }

    fn command(source: &str, text: &str) -> Msg {
        Msg::CommandReceived {
            source: SourceRef::new(source),
            text: text.to_string(),
            at: Utc::now(),
        }
    }

    /// A config whose fetch program is a shell script writing into `dir`.
    fn script_config(dir: &Path, script: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.output_dir = dir.to_path_buf();
        config.fetcher.program = PathBuf::from("sh");
        config.fetcher.args = vec!["-c".to_string(), script.to_string(), "fetcher".to_string()];
        config.fetcher.timeout_secs = 10;
        config
    }

    fn run_session(config: &AppConfig, inbox: Vec<Msg>) -> (SchedulerState, Vec<String>, usize) {
        let (msg_tx, msg_rx) = mpsc::channel();
        let (engine, events) = EngineHandle::spawn(config.engine_settings());
        spawn_event_forwarder(events, msg_tx.clone());
        for msg in inbox {
            msg_tx.send(msg).unwrap();
        }
        let runner = EffectRunner::new(engine, RecordingMessenger::default());
        let state = run(SchedulerState::new(config.scheduler_config()), &msg_rx, &runner);
        let removed = runner.shutdown();
        (state, runner.messenger().sent(), removed)
    }

    #[test]
    fn delivers_then_cleans_up_at_exit() {
        let dir = tempfile::tempdir().unwrap();
        let script = format!(
            r#"printf '%%PDF' > "{}/$3.pdf"; echo '{{"success": true, "message": "done"}}'"#,
            dir.path().display()
        );
        let config = script_config(dir.path(), &script);

        let (state, sent, removed) =
            run_session(&config, vec![command("alice", "book Dune"), Msg::InputClosed]);

        assert_eq!(
            sent,
            vec![
                "alice react Received".to_string(),
                "alice reply Searching for book 'Dune'...".to_string(),
                "alice document Dune.pdf done".to_string(),
                "alice react Succeeded".to_string(),
            ]
        );
        assert!(state.is_idle());
        assert_eq!(removed, 1);
        assert!(!dir.path().join("Dune.pdf").exists());
    }

    #[test]
    fn reported_failure_is_answered_with_alternatives() {
        let dir = tempfile::tempdir().unwrap();
        let script = r#"echo '{"status": "info", "message": "no direct download", "resources": ["library"], "tips": ["ask a lecturer"]}'"#;
        let config = script_config(dir.path(), script);

        let (_, sent, removed) =
            run_session(&config, vec![command("bob", "paper BICT 2303"), Msg::InputClosed]);

        assert_eq!(sent.len(), 4);
        assert_eq!(
            sent[2],
            "bob reply Could not fetch 'BICT 2303': no direct download\n\
             You could try:\n\
             - library\n\
             - ask a lecturer"
        );
        assert_eq!(sent[3], "bob react Failed");
        assert_eq!(removed, 0);
    }

    #[test]
    fn closed_input_with_nothing_running_stops_at_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = script_config(dir.path(), "exit 0");
        let (state, sent, _) =
            run_session(&config, vec![command("carol", "help"), Msg::InputClosed]);
        assert!(!state.accepting());
        assert_eq!(sent.len(), 1);
        assert!(sent[0].starts_with("carol reply Commands:"));
    }
}

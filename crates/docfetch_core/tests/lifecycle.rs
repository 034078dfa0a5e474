use std::path::PathBuf;
use std::sync::Once;

use chrono::{DateTime, Duration, TimeZone, Utc};
use docfetch_core::{
    update, DispatchOutcome, Effect, Msg, SchedulerConfig, SchedulerState, SourceRef,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(docfetch_logging::initialize_for_tests);
}

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn scheduler() -> SchedulerState {
    SchedulerState::new(SchedulerConfig {
        queue_capacity: 10,
        max_concurrent: 1,
        stale_after: Duration::minutes(60),
    })
}

fn submit_at(state: SchedulerState, title: &str, at: DateTime<Utc>) -> (SchedulerState, Vec<Effect>) {
    update(
        state,
        Msg::CommandReceived {
            source: SourceRef::new("chat"),
            text: format!("book {title}"),
            at,
        },
    )
}

#[test]
fn cleanup_removes_entry_and_is_idempotent() {
    init_logging();
    let (state, _) = submit_at(scheduler(), "a", t0());
    let (state, _) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome: DispatchOutcome::Failed {
                reason: "exited with code 2".to_string(),
                alternatives: Vec::new(),
            },
        },
    );
    assert_eq!(state.ledger().len(), 1);

    let (state, effects) = update(state, Msg::CleanupFinished { request_id: 1 });
    assert!(effects.is_empty());
    assert!(state.ledger().is_empty());

    let (mut state, effects) = update(state, Msg::CleanupFinished { request_id: 1 });
    assert!(effects.is_empty());
    assert!(!state.finish_cleanup(1));
}

#[test]
fn sweep_drops_old_entries_whatever_their_status() {
    init_logging();
    let (state, _) = submit_at(scheduler(), "old-running", t0());
    let (state, _) = submit_at(state, "old-waiting", t0() + Duration::minutes(1));
    let (state, _) = submit_at(state, "fresh", t0() + Duration::minutes(50));
    assert_eq!(state.pending_ids(), vec![2, 3]);

    let (state, _) = update(
        state,
        Msg::SweepTick {
            now: t0() + Duration::minutes(65),
        },
    );

    assert!(state.request(1).is_none());
    assert!(state.request(2).is_none());
    assert!(state.request(3).is_some());
    assert_eq!(state.pending_ids(), vec![3]);
    assert_eq!(state.admitted_len(), 1);
    // The swept fetch is still running and keeps its slot.
    assert_eq!(state.running_ids(), vec![1]);
}

#[test]
fn late_completion_after_sweep_frees_slot_and_discards_files() {
    init_logging();
    let (state, _) = submit_at(scheduler(), "swept", t0());
    let (state, _) = submit_at(state, "waiting", t0() + Duration::minutes(30));
    let (state, _) = update(
        state,
        Msg::SweepTick {
            now: t0() + Duration::minutes(61),
        },
    );

    let (state, effects) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome: DispatchOutcome::Delivered {
                artifact: PathBuf::from("downloads/swept.pdf"),
                cover: None,
                message: String::new(),
            },
        },
    );

    assert_eq!(
        effects,
        vec![
            Effect::DiscardFiles {
                files: vec![PathBuf::from("downloads/swept.pdf")],
            },
            Effect::StartFetch {
                request_id: 2,
                query: "waiting".to_string(),
                kind: docfetch_core::DocKind::Book,
            },
        ]
    );
    assert_eq!(state.running_ids(), vec![2]);
}

#[test]
fn every_entry_is_gone_after_threshold_plus_interval() {
    init_logging();
    let sweep_interval = Duration::minutes(10);
    let mut state = scheduler();
    for n in 0..5 {
        let (next, _) = submit_at(state, &format!("t{n}"), t0() + Duration::minutes(n));
        state = next;
    }

    let mut now = t0();
    let deadline = t0() + Duration::minutes(4) + state.config().stale_after + sweep_interval;
    while now <= deadline {
        let (next, _) = update(state, Msg::SweepTick { now });
        state = next;
        now += sweep_interval;
    }
    assert!(state.ledger().is_empty());
}

#[test]
fn idle_once_nothing_runs_or_waits() {
    init_logging();
    let (state, _) = submit_at(scheduler(), "a", t0());
    assert!(!state.is_idle());
    let (state, _) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome: DispatchOutcome::Failed {
                reason: "invalid output".to_string(),
                alternatives: Vec::new(),
            },
        },
    );
    assert!(state.is_idle());
}

use std::path::PathBuf;
use std::sync::Once;

use chrono::{TimeZone, Utc};
use docfetch_core::{
    update, DispatchOutcome, DocKind, Effect, Msg, Reaction, RequestId, RequestStatus,
    SchedulerConfig, SchedulerState, SourceRef,
};
use pretty_assertions::assert_eq;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(docfetch_logging::initialize_for_tests);
}

fn submit_all(mut state: SchedulerState, titles: &[&str]) -> (SchedulerState, Vec<Effect>) {
    let mut all = Vec::new();
    for title in titles {
        let (next, effects) = update(
            state,
            Msg::CommandReceived {
                source: SourceRef::new(format!("chat-{title}")),
                text: format!("book {title}"),
                at: Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap(),
            },
        );
        state = next;
        all.extend(effects);
    }
    (state, all)
}

fn started(effects: &[Effect]) -> Vec<RequestId> {
    effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::StartFetch { request_id, .. } => Some(*request_id),
            _ => None,
        })
        .collect()
}

fn delivered(name: &str) -> DispatchOutcome {
    DispatchOutcome::Delivered {
        artifact: PathBuf::from(format!("downloads/{name}.pdf")),
        cover: None,
        message: format!("Downloaded '{name}'"),
    }
}

fn limited(max_concurrent: usize) -> SchedulerState {
    SchedulerState::new(SchedulerConfig {
        queue_capacity: 10,
        max_concurrent,
        ..SchedulerConfig::default()
    })
}

#[test]
fn five_submissions_with_three_workers_park_two_in_order() {
    init_logging();
    let (state, effects) = submit_all(limited(3), &["a", "b", "c", "d", "e"]);

    assert_eq!(started(&effects), vec![1, 2, 3]);
    assert_eq!(state.running_ids(), vec![1, 2, 3]);
    assert_eq!(state.pending_ids(), vec![4, 5]);
    for id in [4, 5] {
        assert_eq!(state.request(id).unwrap().status, RequestStatus::Queued);
    }

    let (state, effects) = update(
        state,
        Msg::FetchFinished {
            request_id: 2,
            outcome: delivered("b"),
        },
    );
    assert_eq!(started(&effects), vec![4]);
    assert_eq!(state.pending_ids(), vec![5]);
    assert_eq!(state.request(4).unwrap().status, RequestStatus::Processing);
}

#[test]
fn parked_request_is_told_its_place_in_line() {
    init_logging();
    let (_state, effects) = submit_all(limited(1), &["a", "b", "c"]);
    let replies: Vec<_> = effects
        .iter()
        .filter_map(|effect| match effect {
            Effect::Reply { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        replies,
        vec![
            "Searching for book 'a'...",
            "All workers are busy, 'b' is number 1 in line.",
            "All workers are busy, 'c' is number 2 in line.",
        ]
    );
}

#[test]
fn running_count_never_exceeds_limit_for_interleaved_arrivals() {
    init_logging();
    let mut state = limited(2);
    let mut next_to_finish: Vec<RequestId> = Vec::new();
    for round in 0..6 {
        let titles = [format!("x{round}"), format!("y{round}")];
        let titles: Vec<&str> = titles.iter().map(String::as_str).collect();
        let (next, effects) = submit_all(state, &titles);
        state = next;
        next_to_finish.extend(started(&effects));
        assert!(state.running_ids().len() <= 2);

        if let Some(id) = next_to_finish.first().copied() {
            next_to_finish.remove(0);
            let (next, effects) = update(
                state,
                Msg::FetchFinished {
                    request_id: id,
                    outcome: delivered("x"),
                },
            );
            state = next;
            next_to_finish.extend(started(&effects));
            assert!(state.running_ids().len() <= 2);
        }
    }
}

#[test]
fn success_delivers_reacts_and_schedules_cleanup() {
    init_logging();
    let (state, _) = submit_all(limited(1), &["Dune"]);
    let outcome = DispatchOutcome::Delivered {
        artifact: PathBuf::from("downloads/Dune.pdf"),
        cover: Some(PathBuf::from("downloads/Dune_cover.jpg")),
        message: "Downloaded 'Dune'".to_string(),
    };
    let (state, effects) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome,
        },
    );

    let files = vec![
        PathBuf::from("downloads/Dune.pdf"),
        PathBuf::from("downloads/Dune_cover.jpg"),
    ];
    assert_eq!(
        effects,
        vec![
            Effect::DeliverArtifact {
                source: SourceRef::new("chat-Dune"),
                artifact: PathBuf::from("downloads/Dune.pdf"),
                cover: Some(PathBuf::from("downloads/Dune_cover.jpg")),
                caption: "Downloaded 'Dune'".to_string(),
            },
            Effect::React {
                source: SourceRef::new("chat-Dune"),
                reaction: Reaction::Succeeded,
            },
            Effect::ScheduleCleanup {
                request_id: 1,
                files: files.clone(),
            },
        ]
    );
    let request = state.request(1).unwrap();
    assert_eq!(request.status, RequestStatus::Completed);
    assert_eq!(request.cleanup.as_ref().map(|c| c.files.clone()), Some(files));
}

#[test]
fn failure_records_error_and_lists_alternatives() {
    init_logging();
    let (state, _) = submit_all(limited(1), &["Obscure"]);
    let (state, effects) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome: DispatchOutcome::Failed {
                reason: "timeout".to_string(),
                alternatives: vec!["https://archive.org/search.php?query=Obscure".to_string()],
            },
        },
    );

    assert_eq!(
        effects[0],
        Effect::Reply {
            source: SourceRef::new("chat-Obscure"),
            text: "Could not fetch 'Obscure': timeout\nYou could try:\n\
                   - https://archive.org/search.php?query=Obscure"
                .to_string(),
        }
    );
    assert_eq!(
        effects[2],
        Effect::ScheduleCleanup {
            request_id: 1,
            files: Vec::new(),
        }
    );
    let request = state.request(1).unwrap();
    assert_eq!(request.status, RequestStatus::Failed);
    assert_eq!(request.error.as_deref(), Some("timeout"));
}

#[test]
fn duplicate_completion_is_ignored() {
    init_logging();
    let (state, _) = submit_all(limited(1), &["a", "b"]);
    let (state, _) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome: delivered("a"),
        },
    );
    let before = state.clone();
    let (state, effects) = update(
        state,
        Msg::FetchFinished {
            request_id: 1,
            outcome: delivered("a"),
        },
    );
    assert!(effects.is_empty());
    assert_eq!(state, before);
    assert_eq!(state.running_ids(), vec![2]);
}

#[test]
fn status_never_regresses_from_terminal() {
    init_logging();
    let (mut state, _) = submit_all(limited(1), &["a"]);
    let mut effects = Vec::new();
    state.complete(1, delivered("a"), &mut effects);
    state.dispatch(1, &mut effects);
    assert_eq!(state.request(1).unwrap().status, RequestStatus::Completed);
    assert!(state.running_ids().is_empty());
    assert_eq!(state.request(1).unwrap().kind, DocKind::Book);
}

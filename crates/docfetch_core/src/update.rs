use crate::{
    help_text, AdmissionError, Command, DocKind, Effect, Msg, Reaction, RequestStatus, SchedulerState,
};

/// Pure update function: applies a message to state and returns any effects.
pub fn update(mut state: SchedulerState, msg: Msg) -> (SchedulerState, Vec<Effect>) {
    let mut effects = Vec::new();
    match msg {
        Msg::CommandReceived { source, text, at } => match Command::parse(&text) {
            Some(Command::Help) => effects.push(Effect::Reply {
                source,
                text: help_text(),
            }),
            Some(Command::Status) => effects.push(Effect::Reply {
                source,
                text: state.view().render(),
            }),
            Some(Command::Fetch { .. }) if !state.accepting() => {}
            Some(Command::Fetch { kind, query }) => {
                let mut started = Vec::new();
                match state.submit(&query, kind, source.clone(), at, &mut started) {
                    Ok(id) => {
                        effects.push(Effect::React {
                            source: source.clone(),
                            reaction: Reaction::Received,
                        });
                        effects.push(Effect::Reply {
                            source,
                            text: admitted_text(&state, id),
                        });
                        effects.extend(started);
                    }
                    Err(err @ AdmissionError::EmptyQuery) => effects.push(Effect::Reply {
                        source,
                        text: format!("Usage: {kind} {} ({err})", usage_argument(kind)),
                    }),
                    Err(err @ AdmissionError::QueueFull { .. }) => {
                        effects.push(Effect::Reply {
                            source: source.clone(),
                            text: err.to_string(),
                        });
                        effects.push(Effect::React {
                            source,
                            reaction: Reaction::Failed,
                        });
                    }
                }
            }
            None => {}
        },
        Msg::FetchFinished {
            request_id,
            outcome,
        } => state.complete(request_id, outcome, &mut effects),
        Msg::CleanupFinished { request_id } => {
            state.finish_cleanup(request_id);
        }
        Msg::SweepTick { now } => {
            state.sweep(now);
        }
        Msg::InputClosed => state.close_input(),
    }

    (state, effects)
}

fn usage_argument(kind: DocKind) -> &'static str {
    match kind {
        DocKind::Book => "<title>",
        DocKind::Paper => "<subject>",
    }
}

fn admitted_text(state: &SchedulerState, id: crate::RequestId) -> String {
    let Some(request) = state.request(id) else {
        return String::new();
    };
    match (request.status, state.pending_position(id)) {
        (RequestStatus::Queued, Some(position)) => format!(
            "All workers are busy, '{}' is number {position} in line.",
            request.query
        ),
        _ => format!("Searching for {} '{}'...", request.kind, request.query),
    }
}

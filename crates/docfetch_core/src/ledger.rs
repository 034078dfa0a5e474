use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};

use crate::{CleanupHandle, Request, RequestId, RequestStatus};

/// Authoritative map of in-flight requests.
///
/// Keyed by a `BTreeMap` so iteration (status views, sweeps) is in admission
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Ledger {
    entries: BTreeMap<RequestId, Request>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a new request. Returns `false` (and leaves the ledger alone)
    /// when the id is already present.
    pub fn insert(&mut self, request: Request) -> bool {
        if self.entries.contains_key(&request.id) {
            return false;
        }
        self.entries.insert(request.id, request);
        true
    }

    pub fn get(&self, id: RequestId) -> Option<&Request> {
        self.entries.get(&id)
    }

    /// Moves a request forward. Missing ids and backwards moves are refused.
    pub fn advance(&mut self, id: RequestId, next: RequestStatus) -> bool {
        match self.entries.get_mut(&id) {
            Some(request) if request.status.can_advance_to(next) => {
                request.status = next;
                true
            }
            _ => false,
        }
    }

    pub fn set_error(&mut self, id: RequestId, error: impl Into<String>) {
        if let Some(request) = self.entries.get_mut(&id) {
            request.error = Some(error.into());
        }
    }

    pub fn attach_cleanup(&mut self, id: RequestId, handle: CleanupHandle) -> bool {
        match self.entries.get_mut(&id) {
            Some(request) => {
                request.cleanup = Some(handle);
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: RequestId) -> Option<Request> {
        self.entries.remove(&id)
    }

    /// Ids of entries created more than `max_age` before `now`, whatever
    /// their status.
    pub fn stale_ids(&self, now: DateTime<Utc>, max_age: Duration) -> Vec<RequestId> {
        self.entries
            .values()
            .filter(|request| now - request.created_at > max_age)
            .map(|request| request.id)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count_with_status(&self, status: RequestStatus) -> usize {
        self.entries
            .values()
            .filter(|request| request.status == status)
            .count()
    }
}

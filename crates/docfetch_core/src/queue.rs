use std::collections::VecDeque;

use crate::RequestId;

/// Bounded FIFO of request ids that are waiting for or currently in the
/// fetch pipeline. Capacity is the admission limit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdmissionQueue {
    ids: VecDeque<RequestId>,
    capacity: usize,
}

impl AdmissionQueue {
    pub fn new(capacity: usize) -> Self {
        Self {
            ids: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `id` unless the queue is full. Returns whether it was admitted.
    pub fn try_push(&mut self, id: RequestId) -> bool {
        if self.is_full() {
            return false;
        }
        self.ids.push_back(id);
        true
    }

    /// Removes `id` wherever it sits. Removing an absent id is a no-op.
    pub fn remove(&mut self, id: RequestId) -> bool {
        match self.ids.iter().position(|queued| *queued == id) {
            Some(index) => {
                self.ids.remove(index);
                true
            }
            None => false,
        }
    }

    pub fn is_full(&self) -> bool {
        self.ids.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

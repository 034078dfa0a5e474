use std::fmt::Write;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SchedulerView {
    pub admitted: usize,
    pub capacity: usize,
    pub running: usize,
    pub max_concurrent: usize,
    pub pending: usize,
    pub queued: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
    pub accepting: bool,
}

impl SchedulerView {
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Queue: {}/{}", self.admitted, self.capacity);
        let _ = writeln!(out, "Workers busy: {}/{}", self.running, self.max_concurrent);
        let _ = writeln!(out, "Waiting for a worker: {}", self.pending);
        let _ = write!(
            out,
            "Requests: {} queued, {} processing, {} completed, {} failed",
            self.queued, self.processing, self.completed, self.failed
        );
        if !self.accepting {
            out.push_str("\nNot accepting new requests.");
        }
        out
    }
}

pub fn help_text() -> String {
    [
        "Commands:",
        "  book <title>     fetch a book by title",
        "  paper <subject>  fetch a past paper (course code and year help, e.g. CS301 2020)",
        "  status           show queue and worker usage",
        "  help | menu      show this menu",
    ]
    .join("\n")
}

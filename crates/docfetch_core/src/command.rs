use crate::DocKind;

/// An inbound text command, after prefix matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `book <title>` or `paper <subject>`. The argument may still be empty;
    /// rejecting it is the scheduler's job so the user gets a reply.
    Fetch { kind: DocKind, query: String },
    Status,
    Help,
}

impl Command {
    /// Parses one message body. Text that is not a command yields `None`.
    pub fn parse(text: &str) -> Option<Self> {
        let trimmed = text.trim();
        let body = trimmed
            .strip_prefix('!')
            .or_else(|| trimmed.strip_prefix('/'))
            .unwrap_or(trimmed);

        let (word, rest) = match body.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest),
            None => (body, ""),
        };

        match word.to_ascii_lowercase().as_str() {
            "book" => Some(Command::Fetch {
                kind: DocKind::Book,
                query: rest.to_string(),
            }),
            "paper" => Some(Command::Fetch {
                kind: DocKind::Paper,
                query: rest.to_string(),
            }),
            "status" if rest.trim().is_empty() => Some(Command::Status),
            "help" | "menu" if rest.trim().is_empty() => Some(Command::Help),
            _ => None,
        }
    }
}

/// Cleans a raw query: trims, collapses whitespace and drops a trailing
/// `.pdf`. Returns the kind to admit under, which may switch a book query
/// mentioning past/exam papers over to `Paper`.
pub fn normalize_query(raw: &str, kind: DocKind) -> (String, DocKind) {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    let lower = collapsed.to_lowercase();
    let cut = collapsed.len().saturating_sub(4);
    let cleaned = if collapsed.is_char_boundary(cut) && collapsed[cut..].eq_ignore_ascii_case(".pdf")
    {
        collapsed[..cut].trim_end().to_string()
    } else {
        collapsed
    };

    let kind = match kind {
        DocKind::Book if mentions_exam_paper(&lower) => DocKind::Paper,
        other => other,
    };
    (cleaned, kind)
}

fn mentions_exam_paper(lower: &str) -> bool {
    lower.contains("past paper") || lower.contains("exam paper")
}

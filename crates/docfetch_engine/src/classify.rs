use std::path::PathBuf;

use serde::Deserialize;

use crate::{FailureKind, FetchResult};

/// Everything a finished fetch process left behind.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProcessOutput {
    /// `None` when the process died from a signal.
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Which rung of the interpretation ladder produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassificationTier {
    ExitStatus,
    Record,
    Sentinel,
    Vocabulary,
    Malformed,
}

impl ClassificationTier {
    /// Tiers that guessed success without a structured record.
    pub fn is_heuristic(self) -> bool {
        matches!(self, ClassificationTier::Sentinel | ClassificationTier::Vocabulary)
    }
}

pub const INVALID_OUTPUT: &str = "invalid output";

/// Interprets a terminated fetch process, most trustworthy signal first:
/// exit status and stderr, a structured record (JSON or a printed Python
/// dict), the success sentinel,
/// success vocabulary, and finally a malformed-output failure.
pub fn classify_output(output: &ProcessOutput, sentinel: &str) -> (ClassificationTier, FetchResult) {
    let stderr = output.stderr.trim();
    match output.exit_code {
        Some(0) if stderr.is_empty() => {}
        code => {
            let message = if !stderr.is_empty() {
                stderr.to_string()
            } else if let Some(code) = code {
                format!("exited with code {code}")
            } else {
                "terminated by a signal".to_string()
            };
            let result = FetchResult::failure(FailureKind::ProcessFailure { code }, message);
            return (ClassificationTier::ExitStatus, result);
        }
    }

    let stdout = output.stdout.as_str();
    if let Some(record) = find_record(stdout) {
        return (ClassificationTier::Record, record.into_result());
    }

    if !sentinel.is_empty() && stdout.contains(sentinel) {
        return (
            ClassificationTier::Sentinel,
            FetchResult::success("download finished"),
        );
    }

    if has_success_vocabulary(stdout) {
        return (
            ClassificationTier::Vocabulary,
            FetchResult::success("download completed"),
        );
    }

    (
        ClassificationTier::Malformed,
        FetchResult::failure(FailureKind::MalformedOutput, INVALID_OUTPUT).with_raw_output(stdout),
    )
}

fn has_success_vocabulary(stdout: &str) -> bool {
    let lower = stdout.to_lowercase();
    lower.contains("download") && (lower.contains("success") || lower.contains("complete"))
}

#[derive(Debug, Deserialize)]
struct RawRecord {
    #[serde(default)]
    success: Option<bool>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default, alias = "filePath", alias = "path")]
    file_path: Option<String>,
    #[serde(default, alias = "coverPath", alias = "cover")]
    cover_path: Option<String>,
    #[serde(default)]
    alternatives: Option<Vec<String>>,
    #[serde(default)]
    resources: Option<Vec<String>>,
    #[serde(default)]
    tips: Option<Vec<String>>,
}

impl RawRecord {
    /// A record without any outcome flag is just some other JSON.
    fn succeeded(&self) -> Option<bool> {
        match (self.success, self.status.as_deref()) {
            (Some(flag), _) => Some(flag),
            (None, Some(status)) => Some(status.eq_ignore_ascii_case("success")),
            (None, None) => None,
        }
    }

    fn into_result(self) -> FetchResult {
        let succeeded = self.succeeded().unwrap_or(false);
        let message = self
            .message
            .filter(|message| !message.trim().is_empty())
            .unwrap_or_else(|| {
                if succeeded {
                    "download finished".to_string()
                } else {
                    "the fetch program reported a failure".to_string()
                }
            });

        let mut result = if succeeded {
            FetchResult::success(message)
        } else {
            FetchResult::failure(FailureKind::Reported, message)
        };
        result.file_path = non_empty_path(self.file_path);
        result.cover_path = non_empty_path(self.cover_path);
        result.alternatives = [self.alternatives, self.resources, self.tips]
            .into_iter()
            .flatten()
            .flatten()
            .collect();
        result
    }
}

fn non_empty_path(raw: Option<String>) -> Option<PathBuf> {
    raw.map(|raw| raw.trim().to_string())
        .filter(|raw| !raw.is_empty())
        .map(PathBuf::from)
}

/// The record is either the whole of stdout or its last object line;
/// progress chatter may come before it. Objects are read as JSON first,
/// then as a Python dict literal.
fn find_record(stdout: &str) -> Option<RawRecord> {
    let parse = |text: &str| {
        serde_json::from_str::<RawRecord>(text)
            .ok()
            .or_else(|| {
                let json = python_literal_to_json(text)?;
                serde_json::from_str::<RawRecord>(&json).ok()
            })
            .filter(|record| record.succeeded().is_some())
    };

    let whole = stdout.trim();
    if whole.starts_with('{') {
        if let Some(record) = parse(whole) {
            return Some(record);
        }
    }

    stdout
        .lines()
        .rev()
        .map(str::trim)
        .filter(|line| line.starts_with('{') && line.ends_with('}'))
        .find_map(parse)
}

/// Rewrites a Python literal as JSON: strings in either quote style,
/// `None`, `True` and `False`. Any other bare word makes it unreadable.
fn python_literal_to_json(text: &str) -> Option<String> {
    let mut json = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' => {
                json.push('"');
                loop {
                    match chars.next()? {
                        end if end == c => break,
                        '\\' => push_python_escape(&mut json, &mut chars)?,
                        other => push_json_char(&mut json, other),
                    }
                }
                json.push('"');
            }
            // Exponent of a number such as `1e5`.
            c if c.is_ascii_alphabetic()
                && json.ends_with(|p: char| p.is_ascii_digit() || p == '.') =>
            {
                json.push(c);
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek() {
                    if !(next.is_ascii_alphanumeric() || next == '_') {
                        break;
                    }
                    word.push(next);
                    chars.next();
                }
                json.push_str(match word.as_str() {
                    "None" | "null" => "null",
                    "True" | "true" => "true",
                    "False" | "false" => "false",
                    _ => return None,
                });
            }
            c => json.push(c),
        }
    }
    Some(json)
}

fn push_python_escape(
    json: &mut String,
    chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
) -> Option<()> {
    match chars.next()? {
        'n' => json.push_str("\\n"),
        'r' => json.push_str("\\r"),
        't' => json.push_str("\\t"),
        'x' => push_json_char(json, read_hex(chars, 2)?),
        'u' => push_json_char(json, read_hex(chars, 4)?),
        'U' => push_json_char(json, read_hex(chars, 8)?),
        other => push_json_char(json, other),
    }
    Some(())
}

fn read_hex(chars: &mut std::iter::Peekable<std::str::Chars<'_>>, digits: usize) -> Option<char> {
    let code: String = chars.by_ref().take(digits).collect();
    if code.chars().count() != digits {
        return None;
    }
    char::from_u32(u32::from_str_radix(&code, 16).ok()?)
}

fn push_json_char(json: &mut String, c: char) {
    match c {
        '"' => json.push_str("\\\""),
        '\\' => json.push_str("\\\\"),
        c if c.is_control() => json.push_str(&format!("\\u{:04x}", u32::from(c))),
        c => json.push(c),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_without_outcome_flag_is_ignored() {
        assert!(find_record(r#"{"message": "hello"}"#).is_none());
    }

    #[test]
    fn last_json_line_wins() {
        let stdout = "Searching...\n{\"success\": false}\n{\"status\": \"success\", \"file_path\": \"a.pdf\"}\n";
        let record = find_record(stdout).expect("record");
        assert_eq!(record.succeeded(), Some(true));
        assert_eq!(record.file_path.as_deref(), Some("a.pdf"));
    }

    #[test]
    fn python_literals_become_json() {
        assert_eq!(
            python_literal_to_json(r#"{'a': None, 'b': [True, False], 'c': "it's", 'd': 'say \'hi\'\n'}"#)
                .as_deref(),
            Some(r#"{"a": null, "b": [true, false], "c": "it's", "d": "say 'hi'\n"}"#)
        );
        assert_eq!(python_literal_to_json("{'n': 1e5}").as_deref(), Some(r#"{"n": 1e5}"#));
        assert_eq!(python_literal_to_json("{'when': datetime(2024)}"), None);
        assert_eq!(python_literal_to_json("{'open': 'unterminated"), None);
    }

    #[test]
    fn pretty_printed_record_is_found_as_a_whole() {
        let stdout = "{\n  \"success\": true,\n  \"message\": \"ok\"\n}\n";
        assert!(find_record(stdout).is_some());
    }
}

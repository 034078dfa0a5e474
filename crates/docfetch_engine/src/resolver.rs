use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, SystemTime};

use docfetch_logging::{fetch_debug, fetch_info, fetch_warn};
use regex::Regex;

use crate::outdir::{list_candidates, Candidate};
use crate::FetchKind;

const FULL_QUERY_BONUS: i64 = 100;
const TERM_BONUS: i64 = 10;
const RECENT_BONUS: i64 = 20;
const SUBSTANTIAL_BONUS: i64 = 10;
const CODE_OR_YEAR_BONUS: i64 = 50;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScoringRules {
    /// Files created this recently get the recency bonus.
    pub recent_window: Duration,
    /// Files larger than this look like a complete download.
    pub substantial_bytes: u64,
    /// Below this best score, the newest file is taken instead.
    pub min_score: i64,
}

impl Default for ScoringRules {
    fn default() -> Self {
        Self {
            recent_window: Duration::from_secs(60),
            substantial_bytes: 1024 * 1024,
            min_score: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResolverSettings {
    pub output_dir: PathBuf,
    pub extension: String,
    pub rules: ScoringRules,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("downloads"),
            extension: "pdf".to_string(),
            rules: ScoringRules::default(),
        }
    }
}

/// Finds the file a fetch most likely produced when the fetch program did
/// not say (or said wrongly) where it put it.
#[derive(Debug, Clone)]
pub struct ArtifactResolver {
    settings: ResolverSettings,
}

impl ArtifactResolver {
    pub fn new(settings: ResolverSettings) -> Self {
        Self { settings }
    }

    pub fn output_dir(&self) -> &Path {
        &self.settings.output_dir
    }

    pub fn resolve(&self, query: &str, kind: FetchKind) -> Option<PathBuf> {
        self.resolve_at(query, kind, SystemTime::now())
    }

    pub fn resolve_at(&self, query: &str, kind: FetchKind, now: SystemTime) -> Option<PathBuf> {
        let candidates = match list_candidates(&self.settings.output_dir, &self.settings.extension)
        {
            Ok(candidates) => candidates,
            Err(err) => {
                fetch_warn!(
                    "cannot list {:?} for resolution: {}",
                    self.settings.output_dir,
                    err
                );
                return None;
            }
        };
        let chosen = select_candidate(&candidates, query, kind, now, &self.settings.rules)?;
        fetch_info!(
            "resolved {:?} ({}) to {:?} among {} candidates",
            query,
            kind.as_flag(),
            chosen.name,
            candidates.len()
        );
        Some(chosen.path.clone())
    }
}

/// Picks the best-scoring candidate for `query`, falling back to the newest
/// file when nothing scores at least `rules.min_score`.
///
/// For papers, a course code or year in the query narrows the field to
/// files mentioning either, each of which earns a flat bonus. Ties go to the
/// newer file, then to the lexically smaller name.
pub fn select_candidate<'a>(
    candidates: &'a [Candidate],
    query: &str,
    kind: FetchKind,
    now: SystemTime,
    rules: &ScoringRules,
) -> Option<&'a Candidate> {
    if candidates.is_empty() {
        return None;
    }
    let scorer = Scorer::new(query, now, rules);

    if kind == FetchKind::Paper {
        let code = extract_course_code(query);
        let year = extract_year(query);
        if code.is_some() || year.is_some() {
            let narrowed: Vec<&Candidate> = candidates
                .iter()
                .filter(|candidate| {
                    mentions_code_or_year(&candidate.name, code.as_deref(), year.as_deref())
                })
                .collect();
            if !narrowed.is_empty() {
                fetch_debug!(
                    "paper query {:?}: code={:?} year={:?} narrowed to {} files",
                    query,
                    code,
                    year,
                    narrowed.len()
                );
                let boosted = |candidate: &Candidate| scorer.score(candidate) + CODE_OR_YEAR_BONUS;
                return best_or_newest(narrowed, boosted, rules.min_score);
            }
        }
    }

    let general = |candidate: &Candidate| scorer.score(candidate);
    best_or_newest(candidates.iter().collect(), general, rules.min_score)
}

fn best_or_newest<'a>(
    candidates: Vec<&'a Candidate>,
    score: impl Fn(&Candidate) -> i64,
    min_score: i64,
) -> Option<&'a Candidate> {
    let (best, best_score) = candidates
        .iter()
        .map(|candidate| (*candidate, score(candidate)))
        .max_by(|(a, a_score), (b, b_score)| a_score.cmp(b_score).then_with(|| newer_first(a, b)))?;

    if best_score >= min_score {
        fetch_debug!("best candidate {:?} scored {}", best.name, best_score);
        return Some(best);
    }
    fetch_debug!(
        "best score {} below {}, taking the newest file",
        best_score,
        min_score
    );
    candidates.into_iter().max_by(|a, b| newer_first(a, b))
}

/// Orders so that `max_by` prefers the newer file, then the smaller name.
fn newer_first(a: &Candidate, b: &Candidate) -> Ordering {
    a.created
        .cmp(&b.created)
        .then_with(|| b.name.cmp(&a.name))
}

struct Scorer<'r> {
    query: String,
    terms: Vec<String>,
    now: SystemTime,
    rules: &'r ScoringRules,
}

impl<'r> Scorer<'r> {
    fn new(query: &str, now: SystemTime, rules: &'r ScoringRules) -> Self {
        Self {
            query: query.trim().to_lowercase(),
            terms: tokenize_query(query),
            now,
            rules,
        }
    }

    fn score(&self, candidate: &Candidate) -> i64 {
        let name = candidate.name.to_lowercase();
        let mut score = 0;

        if !self.query.is_empty()
            && (name.contains(&self.query) || separators_to_spaces(&name).contains(&self.query))
        {
            score += FULL_QUERY_BONUS;
        }
        score += TERM_BONUS
            * self
                .terms
                .iter()
                .filter(|term| name.contains(term.as_str()))
                .count() as i64;

        // A creation time in the future counts as brand new.
        let age = self.now.duration_since(candidate.created).unwrap_or_default();
        if age <= self.rules.recent_window {
            score += RECENT_BONUS;
        }
        if candidate.size > self.rules.substantial_bytes {
            score += SUBSTANTIAL_BONUS;
        }
        score
    }
}

fn separators_to_spaces(name: &str) -> String {
    name.chars()
        .map(|c| if c == '_' || c == '-' { ' ' } else { c })
        .collect()
}

/// Lowercase query terms with punctuation removed; terms of two characters
/// or fewer are dropped. Duplicates are kept once.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let cleaned: String = query
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    let mut terms: Vec<String> = Vec::new();
    for term in cleaned.split_whitespace() {
        if term.chars().count() > 2 && !terms.iter().any(|seen| seen == term) {
            terms.push(term.to_string());
        }
    }
    terms
}

/// A course code such as `CS301`, `cs 301` or `BICT230`, returned
/// lowercase with the space removed.
pub fn extract_course_code(query: &str) -> Option<String> {
    static CODE: OnceLock<Regex> = OnceLock::new();
    let re = CODE.get_or_init(|| {
        Regex::new(r"(?i)\b([a-z]{2,4})\s?(\d{3})").expect("course code pattern")
    });
    re.captures(query)
        .map(|caps| format!("{}{}", caps[1].to_lowercase(), &caps[2]))
}

/// A standalone 19xx or 20xx year.
pub fn extract_year(query: &str) -> Option<String> {
    static YEAR: OnceLock<Regex> = OnceLock::new();
    let re = YEAR.get_or_init(|| {
        Regex::new(r"(?:^|[^0-9A-Za-z])((?:19|20)\d{2})(?:[^0-9]|$)").expect("year pattern")
    });
    re.captures(query).map(|caps| caps[1].to_string())
}

fn mentions_code_or_year(name: &str, code: Option<&str>, year: Option<&str>) -> bool {
    let compact: String = name
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();
    code.is_some_and(|code| compact.contains(code)) || year.is_some_and(|year| name.contains(year))
}

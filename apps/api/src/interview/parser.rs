//! Response Parser — turns raw model text into typed interview results.
//!
//! Two stages:
//! 1. Strict: strip code fences, isolate the JSON object, decode it, then
//!    normalise each field (numbers as strings, aliases, missing keys).
//! 2. Fallback, per field: a field the decoded object does not carry in the
//!    expected place is searched for in nested objects, then pulled out of
//!    the raw text with patterns (`technical_score: 8`, quoted lists,
//!    salvageable question objects, numbered question lines). When the
//!    document does not decode at all, every field takes the pattern route.
//!
//! Parsing never fails. Anything that had to be defaulted, clamped or
//! recovered is reported through `Decoded::Fallback` so the caller can log it.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::interview::models::{CandidateProfile, Feedback, Question, QuestionType, Scores};

/// Placeholder for any textual field the model did not provide.
pub const NOT_SPECIFIED: &str = "Not specified";
pub const DEFAULT_CANDIDATE_NAME: &str = "Candidate";
pub const DEFAULT_CATEGORY: &str = "general";
/// Used when a score is missing entirely. Present scores are clamped instead.
pub const DEFAULT_SCORE: u8 = 5;
pub const MIN_SCORE: u8 = 1;
pub const MAX_SCORE: u8 = 10;

/// Outcome of a decode. `Fallback` still carries a complete, usable value.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded<T> {
    Strict(T),
    Fallback { value: T, reasons: Vec<String> },
}

impl<T> Decoded<T> {
    pub fn value(&self) -> &T {
        match self {
            Decoded::Strict(value) | Decoded::Fallback { value, .. } => value,
        }
    }

    pub fn into_inner(self) -> T {
        match self {
            Decoded::Strict(value) | Decoded::Fallback { value, .. } => value,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Decoded::Fallback { .. })
    }

    pub fn reasons(&self) -> &[String] {
        match self {
            Decoded::Strict(_) => &[],
            Decoded::Fallback { reasons, .. } => reasons,
        }
    }

    fn from_parts(value: T, reasons: Vec<String>) -> Self {
        if reasons.is_empty() {
            Decoded::Strict(value)
        } else {
            Decoded::Fallback { value, reasons }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntroResult {
    pub profile: CandidateProfile,
    /// Never empty: the fallback question set fills in when nothing parses.
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnswerResult {
    pub transcription: String,
    pub scores: Scores,
    pub feedback: Feedback,
}

// ────────────────────────────────────────────────────────────────────────────
// Public entry points
// ────────────────────────────────────────────────────────────────────────────

pub fn parse_intro(raw: &str) -> Decoded<IntroResult> {
    let mut reasons = Vec::new();
    let source = Source::new(raw, "intro", &mut reasons);

    let name = match source.text(NAME_KEYS, &mut reasons) {
        Some(name) => name,
        None => {
            reasons.push("name missing".to_string());
            DEFAULT_CANDIDATE_NAME.to_string()
        }
    };

    let mut list = |keys: &[&str]| match source.list(keys, &mut reasons) {
        Some(items) => items,
        None => {
            reasons.push(format!("{} missing", keys[0]));
            vec![NOT_SPECIFIED.to_string()]
        }
    };
    let skills = list(SKILLS_KEYS);
    let strengths = list(STRENGTHS_KEYS);
    let weaknesses = list(WEAKNESSES_KEYS);

    let mut questions = source.questions(&mut reasons);
    if questions.is_empty() {
        reasons.push("no usable questions, substituted fallback set".to_string());
        questions = fallback_questions();
    }

    Decoded::from_parts(
        IntroResult {
            profile: CandidateProfile {
                name,
                skills,
                strengths,
                weaknesses,
            },
            questions,
        },
        reasons,
    )
}

pub fn parse_answer(raw: &str) -> Decoded<AnswerResult> {
    let mut reasons = Vec::new();
    let source = Source::new(raw, "answer", &mut reasons);

    let mut text = |keys: &[&str]| match source.text(keys, &mut reasons) {
        Some(text) => text,
        None => {
            reasons.push(format!("{} missing", keys[0]));
            NOT_SPECIFIED.to_string()
        }
    };
    let transcription = text(TRANSCRIPTION_KEYS);
    let feedback = Feedback {
        technical: text(TECHNICAL_FEEDBACK_KEYS),
        problem_solving: text(PROBLEM_SOLVING_FEEDBACK_KEYS),
        communication: text(COMMUNICATION_FEEDBACK_KEYS),
    };

    let mut score = |keys: &[&str]| match source.score(keys, &mut reasons) {
        Some(raw) => {
            let clamped = clamp_score(raw);
            if f64::from(clamped) != raw {
                reasons.push(format!("{} {raw} clamped to {clamped}", keys[0]));
            }
            clamped
        }
        None => {
            reasons.push(format!("{} missing", keys[0]));
            DEFAULT_SCORE
        }
    };
    let scores = Scores {
        technical: score(TECHNICAL_SCORE_KEYS),
        problem_solving: score(PROBLEM_SOLVING_SCORE_KEYS),
        communication: score(COMMUNICATION_SCORE_KEYS),
    };

    Decoded::from_parts(
        AnswerResult {
            transcription,
            scores,
            feedback,
        },
        reasons,
    )
}

/// Rounds to the nearest integer and clamps into [1, 10].
/// Non-finite input yields the default score.
pub fn clamp_score(raw: f64) -> u8 {
    if !raw.is_finite() {
        return DEFAULT_SCORE;
    }
    raw.round()
        .clamp(f64::from(MIN_SCORE), f64::from(MAX_SCORE)) as u8
}

/// Minimum viable question set used when intro analysis yields no questions.
pub fn fallback_questions() -> Vec<Question> {
    const FALLBACK: &[(QuestionType, &str, &str)] = &[
        (
            QuestionType::Technical,
            "data structures",
            "Explain the difference between an array and a linked list, and when you would choose each.",
        ),
        (
            QuestionType::Technical,
            "algorithms",
            "How would you detect whether a string has all unique characters? Discuss time and space complexity.",
        ),
        (
            QuestionType::Technical,
            "projects",
            "Walk me through a project you built. What was the hardest technical problem and how did you solve it?",
        ),
        (
            QuestionType::Behavioral,
            "teamwork",
            "Tell me about a time you disagreed with a teammate. How did you resolve it?",
        ),
        (
            QuestionType::Behavioral,
            "learning",
            "Describe a time you had to learn a new technology quickly. How did you approach it?",
        ),
    ];

    FALLBACK
        .iter()
        .zip(1..)
        .map(|(&(question_type, category, text), id)| Question {
            id,
            question_type,
            question: text.to_string(),
            category: category.to_string(),
        })
        .collect()
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 1: strict decode
// ────────────────────────────────────────────────────────────────────────────

/// Strips ```json ... ``` or ``` ... ``` code fences from model output.
fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

/// Narrows text to the outermost `{ ... }` span when the model wrapped the
/// object in prose.
fn object_span(text: &str) -> &str {
    match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => text,
    }
}

fn decode_object(raw: &str) -> Result<Map<String, Value>, String> {
    let text = object_span(strip_json_fences(raw));
    match serde_json::from_str::<Value>(text).map_err(|e| e.to_string())? {
        Value::Object(obj) => Ok(obj),
        Value::Array(items) => items
            .into_iter()
            .find_map(|item| match item {
                Value::Object(obj) => Some(obj),
                _ => None,
            })
            .ok_or_else(|| "array without an object".to_string()),
        other => Err(format!("expected an object, got {other}")),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Field access
// ────────────────────────────────────────────────────────────────────────────

// Accepted keys per field, canonical name first. Dotted entries are paths
// into nested objects (`{"scores": {"technical": 9}}`).
const NAME_KEYS: &[&str] = &["name", "candidate_name"];
const SKILLS_KEYS: &[&str] = &["skills", "technical_skills"];
const STRENGTHS_KEYS: &[&str] = &["strengths"];
const WEAKNESSES_KEYS: &[&str] = &["weaknesses", "areas_for_improvement", "improvements"];
const TRANSCRIPTION_KEYS: &[&str] = &["transcription", "transcript"];
const TECHNICAL_FEEDBACK_KEYS: &[&str] = &["technical_feedback", "feedback.technical"];
const PROBLEM_SOLVING_FEEDBACK_KEYS: &[&str] =
    &["problem_solving_feedback", "feedback.problem_solving"];
const COMMUNICATION_FEEDBACK_KEYS: &[&str] = &["communication_feedback", "feedback.communication"];
const TECHNICAL_SCORE_KEYS: &[&str] = &["technical_score", "technical", "scores.technical"];
const PROBLEM_SOLVING_SCORE_KEYS: &[&str] =
    &["problem_solving_score", "problem_solving", "scores.problem_solving"];
const COMMUNICATION_SCORE_KEYS: &[&str] =
    &["communication_score", "communication", "scores.communication"];

const ALL_FIELD_KEYS: &[&[&str]] = &[
    NAME_KEYS,
    SKILLS_KEYS,
    STRENGTHS_KEYS,
    WEAKNESSES_KEYS,
    TRANSCRIPTION_KEYS,
    TECHNICAL_FEEDBACK_KEYS,
    PROBLEM_SOLVING_FEEDBACK_KEYS,
    COMMUNICATION_FEEDBACK_KEYS,
    TECHNICAL_SCORE_KEYS,
    PROBLEM_SOLVING_SCORE_KEYS,
    COMMUNICATION_SCORE_KEYS,
];

/// The model reply: its decoded object when it has one, and the raw text
/// every field can fall back to.
struct Source<'a> {
    object: Option<Map<String, Value>>,
    raw: &'a str,
}

impl<'a> Source<'a> {
    fn new(raw: &'a str, what: &str, reasons: &mut Vec<String>) -> Self {
        let object = match decode_object(raw) {
            Ok(obj) => Some(obj),
            Err(e) => {
                reasons.push(format!("{what} response was not valid JSON ({e})"));
                None
            }
        };
        Self {
            object,
            raw: strip_json_fences(raw),
        }
    }

    fn text(&self, keys: &[&str], reasons: &mut Vec<String>) -> Option<String> {
        self.field(keys, reasons, value_as_text, KeyPatterns::text)
    }

    fn list(&self, keys: &[&str], reasons: &mut Vec<String>) -> Option<Vec<String>> {
        self.field(
            keys,
            reasons,
            |v| value_as_list(v).filter(|items| !items.is_empty()),
            |p, raw| p.list(raw).filter(|items| !items.is_empty()),
        )
    }

    fn score(&self, keys: &[&str], reasons: &mut Vec<String>) -> Option<f64> {
        self.field(keys, reasons, value_as_number, KeyPatterns::score)
    }

    /// Resolves one field: keys and paths on the decoded object, then the
    /// canonical key in any nested object, then the raw-text patterns.
    fn field<T>(
        &self,
        keys: &[&str],
        reasons: &mut Vec<String>,
        from_value: impl Fn(&Value) -> Option<T>,
        from_text: impl Fn(&KeyPatterns, &str) -> Option<T>,
    ) -> Option<T> {
        if let Some(obj) = &self.object {
            if let Some(value) = keys
                .iter()
                .find_map(|k| lookup_path(obj, k).and_then(&from_value))
            {
                return Some(value);
            }
            if let Some(value) = find_nested(obj, keys[0], &from_value) {
                reasons.push(format!("{} taken from a nested object", keys[0]));
                return Some(value);
            }
        }

        let recovered = keys
            .iter()
            .filter_map(|k| key_patterns(k))
            .find_map(|patterns| from_text(patterns, self.raw))?;
        if self.object.is_some() {
            reasons.push(format!("{} recovered from raw text", keys[0]));
        }
        Some(recovered)
    }

    fn questions(&self, reasons: &mut Vec<String>) -> Vec<Question> {
        let Some(obj) = &self.object else {
            return number_questions(questions_from_text(self.raw));
        };

        let mut drafts: Vec<QuestionDraft> = match lookup(obj, "questions") {
            Some(Value::Array(items)) => items.iter().filter_map(question_from_value).collect(),
            Some(Value::String(text)) => {
                let drafts = questions_from_text(text);
                if !drafts.is_empty() {
                    reasons.push("questions given as text, split into lines".to_string());
                }
                drafts
            }
            _ => Vec::new(),
        };
        if drafts.is_empty() {
            drafts = questions_from_text(self.raw);
            if !drafts.is_empty() {
                reasons.push("questions recovered from raw text".to_string());
            }
        }
        number_questions(drafts)
    }
}

/// Looks a key up exactly, then with case and separators ignored
/// (`problemSolvingScore`, `Problem Solving Score`).
fn lookup<'m>(obj: &'m Map<String, Value>, key: &str) -> Option<&'m Value> {
    obj.get(key).or_else(|| {
        let wanted = normalise_key(key);
        obj.iter()
            .find(|(k, _)| normalise_key(k) == wanted)
            .map(|(_, v)| v)
    })
}

/// `lookup` over a dotted path (`scores.technical`).
fn lookup_path<'m>(obj: &'m Map<String, Value>, path: &str) -> Option<&'m Value> {
    let mut segments = path.split('.');
    let first = lookup(obj, segments.next()?)?;
    segments.try_fold(first, |value, segment| lookup(value.as_object()?, segment))
}

/// Depth-first search of nested objects for the first usable value under `key`.
fn find_nested<T>(
    obj: &Map<String, Value>,
    key: &str,
    convert: &impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    obj.values().filter_map(Value::as_object).find_map(|inner| {
        lookup(inner, key)
            .and_then(convert)
            .or_else(|| find_nested(inner, key, convert))
    })
}

fn normalise_key(key: &str) -> String {
    key.chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_lowercase())
        .collect()
}

fn value_as_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .filter_map(value_as_text)
            .collect::<Vec<_>>()
            .join(" "),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}

fn value_as_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(value_as_text).collect()),
        Value::String(s) => Some(split_list(s)),
        _ => None,
    }
}

fn value_as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => first_number(s),
        Value::Object(inner) => lookup(inner, "score").and_then(value_as_number),
        _ => None,
    }
}

fn split_list(s: &str) -> Vec<String> {
    s.split([',', ';', '\n'])
        .map(|item| {
            item.trim()
                .trim_matches(|c: char| matches!(c, '[' | ']' | '"' | '\'' | '-' | '*'))
                .trim()
                .to_string()
        })
        .filter(|item| !item.is_empty())
        .collect()
}

fn first_number(s: &str) -> Option<f64> {
    static NUMBER: OnceLock<Option<Regex>> = OnceLock::new();
    NUMBER
        .get_or_init(|| Regex::new(r"-?\d+(?:\.\d+)?").ok())
        .as_ref()?
        .find(s)?
        .as_str()
        .parse()
        .ok()
}

// ────────────────────────────────────────────────────────────────────────────
// Stage 2: pattern fallback over raw text
// ────────────────────────────────────────────────────────────────────────────

/// Pattern for a key allowing `_`, `-` or whitespace between its words and
/// optional quotes around it: `technical_score` matches `"Technical Score"`.
fn key_pattern(key: &str) -> String {
    let words: Vec<String> = key.split('_').map(regex::escape).collect();
    format!(r#"["']?{}["']?"#, words.join(r"[_\s-]*"))
}

const QUOTED: &str = r#""((?:[^"\\]|\\.)*)""#;

/// Compiled raw-text patterns for one field key.
struct KeyPatterns {
    quoted_text: Regex,
    text_line: Regex,
    bracketed_list: Regex,
    list_line: Regex,
    score: Regex,
}

impl KeyPatterns {
    fn compile(key: &str) -> Result<Self, regex::Error> {
        let kp = key_pattern(key);
        Ok(Self {
            quoted_text: Regex::new(&format!(r"(?i){kp}\s*[:=]\s*{QUOTED}"))?,
            text_line: Regex::new(&format!(r"(?im)^[\s*\-]*{kp}\s*[:=]\s*(.+?)\s*,?\s*$"))?,
            bracketed_list: Regex::new(&format!(r"(?is){kp}\s*[:=]\s*\[(.*?)\]"))?,
            list_line: Regex::new(&format!(r"(?im)^[\s*\-]*{kp}\s*[:=]\s*(.+?)\s*$"))?,
            score: Regex::new(&format!(r#"(?i){kp}\s*[:=]\s*["']?\s*(-?\d+(?:\.\d+)?)"#))?,
        })
    }

    fn text(&self, raw: &str) -> Option<String> {
        if let Some(caps) = self.quoted_text.captures(raw) {
            let text = unescape(&caps[1]);
            if !text.trim().is_empty() {
                return Some(text.trim().to_string());
            }
        }
        let text = self.text_line.captures(raw)?[1]
            .trim_matches('"')
            .trim()
            .to_string();
        (!text.is_empty()).then_some(text)
    }

    fn list(&self, raw: &str) -> Option<Vec<String>> {
        if let Some(caps) = self.bracketed_list.captures(raw) {
            let items = quoted_strings(&caps[1]);
            if !items.is_empty() {
                return Some(items);
            }
            return Some(split_list(&caps[1]));
        }
        Some(split_list(&self.list_line.captures(raw)?[1]))
    }

    fn score(&self, raw: &str) -> Option<f64> {
        self.score.captures(raw)?[1].parse().ok()
    }
}

/// Patterns for every plain (non-path) field key, compiled once per process.
fn key_patterns(key: &str) -> Option<&'static KeyPatterns> {
    static PATTERNS: OnceLock<HashMap<&'static str, KeyPatterns>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            ALL_FIELD_KEYS
                .iter()
                .flat_map(|keys| keys.iter().copied())
                .filter(|key| !key.contains('.'))
                .filter_map(|key| match KeyPatterns::compile(key) {
                    Ok(patterns) => Some((key, patterns)),
                    Err(e) => {
                        tracing::error!("Failed to compile field pattern for '{key}': {e}");
                        None
                    }
                })
                .collect()
        })
        .get(key)
}

fn quoted_strings(s: &str) -> Vec<String> {
    static QUOTED_RE: OnceLock<Option<Regex>> = OnceLock::new();
    let Some(re) = QUOTED_RE.get_or_init(|| Regex::new(QUOTED).ok()).as_ref() else {
        return Vec::new();
    };
    re.captures_iter(s)
        .map(|caps| unescape(&caps[1]).trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn unescape(s: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{s}\"")).unwrap_or_else(|_| s.to_string())
}

/// Recovers questions from a response whose overall JSON is broken:
/// individually decodable `{...}` objects after the `questions` key first,
/// then bare `"question": "..."` pairs, then numbered lines ending in `?`.
fn questions_from_text(raw: &str) -> Vec<QuestionDraft> {
    static OBJECT: OnceLock<Option<Regex>> = OnceLock::new();
    static PAIR: OnceLock<Option<Regex>> = OnceLock::new();
    static NUMBERED: OnceLock<Option<Regex>> = OnceLock::new();

    let tail = raw
        .find("\"questions\"")
        .or_else(|| raw.to_ascii_lowercase().find("questions"))
        .map(|at| &raw[at..])
        .unwrap_or(raw);

    if let Some(re) = OBJECT.get_or_init(|| Regex::new(r"\{[^{}]*\}").ok()).as_ref() {
        let drafts: Vec<_> = re
            .find_iter(tail)
            .filter_map(|m| serde_json::from_str::<Value>(m.as_str()).ok())
            .filter_map(|v| question_from_value(&v))
            .collect();
        if !drafts.is_empty() {
            return drafts;
        }
    }

    if let Some(re) = PAIR
        .get_or_init(|| Regex::new(&format!(r#"(?i)"question"\s*:\s*{QUOTED}"#)).ok())
        .as_ref()
    {
        let drafts: Vec<_> = re
            .captures_iter(tail)
            .map(|caps| QuestionDraft::text_only(unescape(&caps[1])))
            .filter(|d| !d.question.trim().is_empty())
            .collect();
        if !drafts.is_empty() {
            return drafts;
        }
    }

    NUMBERED
        .get_or_init(|| Regex::new(r"(?m)^\s*(?:Q\s*)?\d+\s*[.):]\s+(.+\?)\s*$").ok())
        .as_ref()
        .map(|re| {
            re.captures_iter(raw)
                .map(|caps| QuestionDraft::text_only(caps[1].trim().to_string()))
                .collect()
        })
        .unwrap_or_default()
}

// ────────────────────────────────────────────────────────────────────────────
// Question normalisation
// ────────────────────────────────────────────────────────────────────────────

struct QuestionDraft {
    question_type: QuestionType,
    question: String,
    category: String,
}

impl QuestionDraft {
    fn text_only(question: String) -> Self {
        Self {
            question_type: QuestionType::Technical,
            question,
            category: DEFAULT_CATEGORY.to_string(),
        }
    }
}

fn question_from_value(value: &Value) -> Option<QuestionDraft> {
    match value {
        Value::String(s) if !s.trim().is_empty() => {
            Some(QuestionDraft::text_only(s.trim().to_string()))
        }
        Value::Object(obj) => {
            let question = ["question", "text", "prompt"]
                .iter()
                .find_map(|k| lookup(obj, k).and_then(value_as_text))?;
            let question_type = lookup(obj, "type")
                .and_then(Value::as_str)
                .map(QuestionType::from_label)
                .unwrap_or(QuestionType::Technical);
            let category = lookup(obj, "category")
                .and_then(value_as_text)
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
            Some(QuestionDraft {
                question_type,
                question,
                category,
            })
        }
        _ => None,
    }
}

/// Assigns ids 1..=n in order. Model-supplied ids are not trusted.
fn number_questions(drafts: Vec<QuestionDraft>) -> Vec<Question> {
    drafts
        .into_iter()
        .zip(1..)
        .map(|(d, id)| Question {
            id,
            question_type: d.question_type,
            question: d.question,
            category: d.category,
        })
        .collect()
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Position of a session in the interview state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    Intro,
    Questioning,
    Completed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Intro => "INTRO",
            Phase::Questioning => "QUESTIONING",
            Phase::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    Technical,
    Behavioral,
}

impl QuestionType {
    /// Lenient mapping of model output. Anything that is not recognisably
    /// behavioral is treated as technical.
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_ascii_lowercase();
        if label.starts_with("behavio") || label == "soft" || label == "situational" {
            QuestionType::Behavioral
        } else {
            QuestionType::Technical
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub id: u32,
    #[serde(rename = "type")]
    pub question_type: QuestionType,
    pub question: String,
    pub category: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateProfile {
    pub name: String,
    pub skills: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
}

/// Three integer scores, each in [1, 10].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    pub technical: u8,
    pub problem_solving: u8,
    pub communication: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub technical: String,
    pub problem_solving: String,
    pub communication: String,
}

/// The scored outcome of one answered question. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub question_id: u32,
    pub question_text: String,
    pub transcription: String,
    pub scores: Scores,
    pub feedback: Feedback,
    pub submitted_at: DateTime<Utc>,
}

/// One candidate's interview. Owned by the `SessionStore`.
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub phase: Phase,
    pub profile: Option<CandidateProfile>,
    pub questions: Vec<Question>,
    pub evaluations: Vec<EvaluationRecord>,
    pub created_at: DateTime<Utc>,
    #[serde(skip)]
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(id: String, now: DateTime<Utc>) -> Self {
        Self {
            id,
            phase: Phase::Intro,
            profile: None,
            questions: Vec::new(),
            evaluations: Vec::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn question(&self, id: u32) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }
}

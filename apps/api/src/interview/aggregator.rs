//! Aggregator — final report arithmetic over a session's evaluation history.
//!
//! Pure and deterministic: the same records and thresholds always produce the
//! same report, so the final-report operation is idempotent.

use serde::{Deserialize, Serialize};

use crate::interview::models::EvaluationRecord;

/// Reported for every average when no answers were evaluated.
pub const NEUTRAL_SCORE: f64 = 0.0;
pub const INSUFFICIENT_DATA: &str = "Insufficient Data";

/// Cutoffs over the overall score. Checked top-down, first match wins.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RecommendationThresholds {
    pub strong_hire: f64,
    pub hire: f64,
    pub lean_no_hire: f64,
}

impl Default for RecommendationThresholds {
    fn default() -> Self {
        Self {
            strong_hire: 8.0,
            hire: 6.0,
            lean_no_hire: 4.0,
        }
    }
}

impl RecommendationThresholds {
    /// Thresholds must lie in [1, 10] and be strictly descending.
    pub fn validate(&self) -> Result<(), String> {
        let all = [self.strong_hire, self.hire, self.lean_no_hire];
        if all.iter().any(|t| !(1.0..=10.0).contains(t)) {
            return Err(format!("thresholds must be within [1, 10], got {all:?}"));
        }
        if !(self.strong_hire > self.hire && self.hire > self.lean_no_hire) {
            return Err(format!(
                "thresholds must be strictly descending (strong_hire > hire > lean_no_hire), got {all:?}"
            ));
        }
        Ok(())
    }

    pub fn recommend(&self, overall: f64) -> Recommendation {
        if overall >= self.strong_hire {
            Recommendation::StrongHire
        } else if overall >= self.hire {
            Recommendation::Hire
        } else if overall >= self.lean_no_hire {
            Recommendation::LeanNoHire
        } else {
            Recommendation::NoHire
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recommendation {
    StrongHire,
    Hire,
    LeanNoHire,
    NoHire,
    InsufficientData,
}

impl Recommendation {
    pub fn label(self) -> &'static str {
        match self {
            Recommendation::StrongHire => "Strong Hire",
            Recommendation::Hire => "Hire",
            Recommendation::LeanNoHire => "Lean No Hire",
            Recommendation::NoHire => "No Hire",
            Recommendation::InsufficientData => INSUFFICIENT_DATA,
        }
    }
}

/// Derived final report. Never stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregateReport {
    pub technical_average: f64,
    pub problem_solving_average: f64,
    pub communication_average: f64,
    /// Mean of the three dimension means.
    pub overall_score: f64,
    pub overall_feedback: String,
    pub recommendation: String,
    pub total_questions: usize,
}

pub fn aggregate(
    records: &[EvaluationRecord],
    thresholds: &RecommendationThresholds,
) -> AggregateReport {
    if records.is_empty() {
        return AggregateReport {
            technical_average: NEUTRAL_SCORE,
            problem_solving_average: NEUTRAL_SCORE,
            communication_average: NEUTRAL_SCORE,
            overall_score: NEUTRAL_SCORE,
            overall_feedback: "No answers were evaluated, so no overall assessment is available."
                .to_string(),
            recommendation: Recommendation::InsufficientData.label().to_string(),
            total_questions: 0,
        };
    }

    let technical = dimension_mean(records, |r| r.scores.technical);
    let problem_solving = dimension_mean(records, |r| r.scores.problem_solving);
    let communication = dimension_mean(records, |r| r.scores.communication);
    let overall = overall_score(technical, problem_solving, communication);
    let recommendation = thresholds.recommend(overall);

    AggregateReport {
        technical_average: technical,
        problem_solving_average: problem_solving,
        communication_average: communication,
        overall_score: overall,
        overall_feedback: overall_feedback(
            technical,
            problem_solving,
            communication,
            records.len(),
            recommendation,
        ),
        recommendation: recommendation.label().to_string(),
        total_questions: records.len(),
    }
}

/// Mean of the three (already rounded) dimension means, rounded to one decimal.
/// Averaging per dimension first keeps each dimension equally weighted.
pub fn overall_score(technical: f64, problem_solving: f64, communication: f64) -> f64 {
    round1((technical + problem_solving + communication) / 3.0)
}

fn dimension_mean(records: &[EvaluationRecord], score: impl Fn(&EvaluationRecord) -> u8) -> f64 {
    let total: u32 = records.iter().map(|r| u32::from(score(r))).sum();
    round1(f64::from(total) / records.len() as f64)
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn overall_feedback(
    technical: f64,
    problem_solving: f64,
    communication: f64,
    answered: usize,
    recommendation: Recommendation,
) -> String {
    let dims = [
        ("technical knowledge", technical),
        ("problem solving", problem_solving),
        ("communication", communication),
    ];
    // Ties resolve to the first dimension listed.
    let strongest = dims
        .iter()
        .fold(dims[0], |best, d| if d.1 > best.1 { *d } else { best });
    let weakest = dims
        .iter()
        .fold(dims[0], |worst, d| if d.1 < worst.1 { *d } else { worst });

    let plural = if answered == 1 { "" } else { "s" };
    let mut text = format!(
        "Across {answered} answered question{plural}, the candidate averaged \
         {technical:.1}/10 in technical knowledge, {problem_solving:.1}/10 in problem solving \
         and {communication:.1}/10 in communication."
    );
    if strongest.1 > weakest.1 {
        text.push_str(&format!(
            " Strongest area: {} ({:.1}). Area to develop: {} ({:.1}).",
            strongest.0, strongest.1, weakest.0, weakest.1
        ));
    } else {
        text.push_str(" Performance was even across all dimensions.");
    }
    text.push_str(&format!(" Recommendation: {}.", recommendation.label()));
    text
}

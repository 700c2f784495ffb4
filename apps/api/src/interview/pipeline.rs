//! Interview Pipeline — drives a session through INTRO → QUESTIONING → COMPLETED.
//!
//! Flow per operation: check phase (fast fail) → gateway call with no lock
//! held → parse (never fails) → apply validated result under the session lock,
//! re-checking the phase. A gateway failure or timeout leaves the session as
//! it was.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::gateway::{AiGateway, GatewayError, Media};
use crate::interview::aggregator::{aggregate, AggregateReport, RecommendationThresholds};
use crate::interview::media::archive_intro;
use crate::interview::models::{CandidateProfile, EvaluationRecord, Phase, Question, Session};
use crate::interview::parser::{parse_answer, parse_intro, Decoded};
use crate::interview::prompts::{answer_prompt, intro_prompt};
use crate::interview::store::SessionStore;

// ────────────────────────────────────────────────────────────────────────────
// Response models (wire format)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct IntroResponse {
    pub name: String,
    pub skills: Vec<String>,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub questions: Vec<Question>,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnswerResponse {
    pub question_id: u32,
    pub transcription: String,
    pub technical_score: u8,
    pub problem_solving_score: u8,
    pub communication_score: u8,
    pub technical_feedback: String,
    pub problem_solving_feedback: String,
    pub communication_feedback: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct FinalReportResponse {
    pub session_id: String,
    #[serde(flatten)]
    pub report: AggregateReport,
}

/// Answer submission after request validation.
#[derive(Debug, Clone)]
pub struct AnswerSubmission {
    pub session_id: String,
    pub question_id: u32,
    pub question_text: String,
    pub media: Media,
}

// ────────────────────────────────────────────────────────────────────────────
// Pipeline
// ────────────────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct InterviewPipeline {
    store: Arc<SessionStore>,
    gateway: Arc<dyn AiGateway>,
    thresholds: RecommendationThresholds,
    gateway_timeout: Duration,
    upload_dir: Option<PathBuf>,
}

impl InterviewPipeline {
    pub fn new(
        store: Arc<SessionStore>,
        gateway: Arc<dyn AiGateway>,
        thresholds: RecommendationThresholds,
        gateway_timeout: Duration,
    ) -> Self {
        Self {
            store,
            gateway,
            thresholds,
            gateway_timeout,
            upload_dir: None,
        }
    }

    pub fn with_upload_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.upload_dir = dir;
        self
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Analyzes an intro clip and moves the session to QUESTIONING.
    ///
    /// Without `session_id` a new session is created. With one, the call is a
    /// retry of a previously failed intro and the session must still be in INTRO.
    /// On gateway failure the session stays in INTRO and the error carries its id.
    pub async fn submit_intro(
        &self,
        session_id: Option<String>,
        media: Media,
    ) -> Result<IntroResponse, AppError> {
        let session_id = match session_id {
            Some(id) => {
                let session = self.store.get(&id).await?;
                require_phase(&session, Phase::Intro)?;
                id
            }
            None => self.store.create().await,
        };
        info!("Analyzing introduction for {session_id}");

        if let Some(dir) = &self.upload_dir {
            archive_intro(dir, &session_id, &media).await;
        }

        let raw = self
            .invoke(&intro_prompt(), &media)
            .await
            .map_err(|source| AppError::Gateway {
                source,
                session_id: Some(session_id.clone()),
            })?;

        let intro = log_fallback(&session_id, "intro", parse_intro(&raw)).into_inner();

        let profile = intro.profile.clone();
        let questions = intro.questions.clone();
        self.store
            .apply(&session_id, move |session| {
                require_phase(session, Phase::Intro)?;
                session.profile = Some(intro.profile);
                session.questions = intro.questions;
                session.phase = Phase::Questioning;
                Ok(())
            })
            .await?;

        info!(
            "Session {session_id} moved to QUESTIONING with {} question(s)",
            questions.len()
        );

        let CandidateProfile {
            name,
            skills,
            strengths,
            weaknesses,
        } = profile;
        Ok(IntroResponse {
            name,
            skills,
            strengths,
            weaknesses,
            questions,
            session_id,
        })
    }

    /// Evaluates one answer clip and appends an EvaluationRecord.
    pub async fn submit_answer(
        &self,
        submission: AnswerSubmission,
    ) -> Result<AnswerResponse, AppError> {
        let AnswerSubmission {
            session_id,
            question_id,
            question_text,
            media,
        } = submission;

        let session = self.store.get(&session_id).await?;
        require_phase(&session, Phase::Questioning)?;
        require_question(&session, question_id)?;
        info!("Analyzing answer for {session_id}, question {question_id}");

        let raw = self.invoke(&answer_prompt(&question_text), &media).await?;
        let context = format!("answer to question {question_id}");
        let answer = log_fallback(&session_id, &context, parse_answer(&raw)).into_inner();

        let record = EvaluationRecord {
            question_id,
            question_text,
            transcription: answer.transcription,
            scores: answer.scores,
            feedback: answer.feedback,
            submitted_at: Utc::now(),
        };
        let response = AnswerResponse {
            question_id,
            transcription: record.transcription.clone(),
            technical_score: record.scores.technical,
            problem_solving_score: record.scores.problem_solving,
            communication_score: record.scores.communication,
            technical_feedback: record.feedback.technical.clone(),
            problem_solving_feedback: record.feedback.problem_solving.clone(),
            communication_feedback: record.feedback.communication.clone(),
        };

        let duplicate = self
            .store
            .apply(&session_id, move |session| {
                require_phase(session, Phase::Questioning)?;
                require_question(session, question_id)?;
                let duplicate = session
                    .evaluations
                    .iter()
                    .any(|e| e.question_id == question_id);
                session.evaluations.push(record);
                Ok(duplicate)
            })
            .await?;

        if duplicate {
            warn!("Session {session_id}: question {question_id} answered more than once, keeping all evaluations");
        }

        Ok(response)
    }

    /// Completes the session and returns the aggregate report.
    /// Idempotent: repeated calls recompute from the same history.
    pub async fn final_report(&self, session_id: &str) -> Result<FinalReportResponse, AppError> {
        let evaluations = self
            .store
            .apply(session_id, |session| {
                match session.phase {
                    Phase::Intro => {
                        return Err(AppError::invalid_phase(
                            &session.id,
                            "QUESTIONING or COMPLETED",
                            session.phase,
                        ))
                    }
                    Phase::Questioning => {
                        info!("Session {} moved to COMPLETED", session.id);
                        session.phase = Phase::Completed;
                    }
                    Phase::Completed => {}
                }
                Ok(session.evaluations.clone())
            })
            .await?;

        Ok(FinalReportResponse {
            session_id: session_id.to_string(),
            report: aggregate(&evaluations, &self.thresholds),
        })
    }

    pub async fn session(&self, session_id: &str) -> Result<Session, AppError> {
        self.store.get(session_id).await
    }

    /// Bounded gateway call. Exceeding the timeout drops the in-flight request.
    async fn invoke(&self, prompt: &str, media: &Media) -> Result<String, GatewayError> {
        tokio::time::timeout(self.gateway_timeout, self.gateway.invoke(prompt, media))
            .await
            .map_err(|_| GatewayError::Timeout(self.gateway_timeout))?
    }
}

fn require_phase(session: &Session, expected: Phase) -> Result<(), AppError> {
    if session.phase == expected {
        Ok(())
    } else {
        Err(AppError::invalid_phase(
            &session.id,
            &expected.to_string(),
            session.phase,
        ))
    }
}

fn require_question(session: &Session, question_id: u32) -> Result<(), AppError> {
    session.question(question_id).map(|_| ()).ok_or_else(|| {
        AppError::Validation(format!(
            "question_id {question_id} does not exist in session {}",
            session.id
        ))
    })
}

fn log_fallback<T>(session_id: &str, what: &str, decoded: Decoded<T>) -> Decoded<T> {
    if decoded.is_fallback() {
        warn!(
            "Session {session_id}: {what} parsed with fallback: {}",
            decoded.reasons().join("; ")
        );
    }
    decoded
}

// Prompt constants for the interview pipeline.
// Reuses cross-cutting fragments from gateway::prompts.

use crate::gateway::prompts::{JSON_ONLY_INSTRUCTION, SCORE_SCALE_INSTRUCTION};

/// Intro analysis prompt. The media part carries the candidate's introduction clip.
pub const INTRO_PROMPT: &str = r#"Analyze this candidate introduction video for an SDE Intern position. Extract:
1. Candidate's name
2. Mentioned technical skills
3. Strengths
4. Areas for improvement
5. Generate 5-7 relevant interview questions, mixing technical and behavioral ones

Return JSON exactly in this format:
{
  "name": "...",
  "skills": ["..."],
  "strengths": ["..."],
  "weaknesses": ["..."],
  "questions": [
    {"id": 1, "type": "technical", "question": "...", "category": "..."}
  ]
}

"type" is either "technical" or "behavioral".
"#;

/// Answer evaluation prompt template. Replace `{question_text}` before sending.
pub const ANSWER_PROMPT_TEMPLATE: &str = r#"Analyze this candidate's video answer to the question: "{question_text}"

Return JSON exactly in this format:
{
  "transcription": "...",
  "technical_score": 1-10,
  "problem_solving_score": 1-10,
  "communication_score": 1-10,
  "technical_feedback": "...",
  "problem_solving_feedback": "...",
  "communication_feedback": "..."
}
"#;

pub fn intro_prompt() -> String {
    format!("{INTRO_PROMPT}\n{JSON_ONLY_INSTRUCTION}")
}

pub fn answer_prompt(question_text: &str) -> String {
    // Quotes would break out of the quoted question in the template.
    let question = question_text.trim().replace('"', "'");
    format!(
        "{}\n{SCORE_SCALE_INSTRUCTION}\n{JSON_ONLY_INSTRUCTION}",
        ANSWER_PROMPT_TEMPLATE.replace("{question_text}", &question)
    )
}

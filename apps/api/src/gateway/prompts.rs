// Shared prompt fragments.
// Each pipeline stage keeps its own prompts next to it (see interview::prompts).
// This file contains cross-cutting fragments only.

/// Instruction appended to every prompt that expects structured output.
pub const JSON_ONLY_INSTRUCTION: &str = "\
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Scoring scale shared by every evaluation prompt.
pub const SCORE_SCALE_INSTRUCTION: &str = "\
    Scores are integers from 1 (very poor) to 10 (exceptional). \
    Never return a score outside that range.";

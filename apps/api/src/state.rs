use crate::config::Config;
use crate::interview::pipeline::InterviewPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the session store and the gateway handle.
    pub pipeline: InterviewPipeline,
    pub config: Config,
}

pub mod health;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

/// Room for multipart boundaries and the text fields next to the clip.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.max_media_bytes + MULTIPART_OVERHEAD_BYTES;

    Router::new()
        .route("/", get(health::health_handler))
        .route("/health", get(health::health_handler))
        .route("/analyze_intro", post(handlers::handle_analyze_intro))
        .route("/analyze_answer", post(handlers::handle_analyze_answer))
        .route("/final_report", post(handlers::handle_final_report))
        .route("/sessions/:id", get(handlers::handle_get_session))
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::Value;
    use tower::ServiceExt; // for `oneshot`

    use super::*;
    use crate::config::Config;
    use crate::gateway::{AiGateway, GatewayError, Media};
    use crate::interview::aggregator::RecommendationThresholds;
    use crate::interview::pipeline::InterviewPipeline;
    use crate::interview::store::SessionStore;

    const BOUNDARY: &str = "interviewer-test-boundary";

    const INTRO_JSON: &str = r#"```json
{"name": "Dev", "skills": ["C++"], "strengths": ["debugging"], "weaknesses": ["docs"],
 "questions": [{"id": 1, "type": "technical", "question": "What is RAII?", "category": "cpp"}]}
```"#;

    const ANSWER_JSON: &str = r#"{"transcription": "Scope-bound cleanup", "technical_score": 9,
        "problem_solving_score": 7, "communication_score": 8, "technical_feedback": "Accurate",
        "problem_solving_feedback": "Good examples", "communication_feedback": "Concise"}"#;

    struct QueueGateway(Mutex<VecDeque<Result<String, GatewayError>>>);

    #[async_trait]
    impl AiGateway for QueueGateway {
        async fn invoke(&self, _prompt: &str, _media: &Media) -> Result<String, GatewayError> {
            self.0
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(GatewayError::EmptyContent))
        }
    }

    fn test_config() -> Config {
        Config {
            gemini_api_key: None,
            gemini_model: "gemini-2.0-flash".to_string(),
            port: 0,
            rust_log: "info".to_string(),
            gateway_timeout: Duration::from_secs(5),
            max_media_bytes: 1024,
            session_ttl: None,
            session_sweep_interval: Duration::from_secs(60),
            upload_dir: None,
            thresholds: RecommendationThresholds::default(),
        }
    }

    fn app(replies: Vec<Result<String, GatewayError>>) -> Router {
        let config = test_config();
        let pipeline = InterviewPipeline::new(
            Arc::new(SessionStore::new(None)),
            Arc::new(QueueGateway(Mutex::new(replies.into()))),
            config.thresholds,
            config.gateway_timeout,
        );
        build_router(AppState { pipeline, config })
    }

    /// Builds a multipart body with optional video part and text fields.
    fn multipart(video: Option<&[u8]>, fields: &[(&str, &str)]) -> Vec<u8> {
        let mut body = Vec::new();
        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some(bytes) = video {
            body.extend_from_slice(
                format!(
                    "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"video\"; filename=\"clip.webm\"\r\n\
                     Content-Type: video/webm\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(bytes);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        body
    }

    fn post_multipart(uri: &str, body: Vec<u8>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(
                "content-type",
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(Body::from(body))
            .unwrap()
    }

    fn post_json(uri: &str, json: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap()
    }

    async fn extract_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("Should read body");
        serde_json::from_slice(&bytes).expect("Should parse JSON")
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let response = app(vec![])
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(extract_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_full_interview_flow() {
        let app = app(vec![Ok(INTRO_JSON.to_string()), Ok(ANSWER_JSON.to_string())]);

        let response = app
            .clone()
            .oneshot(post_multipart("/analyze_intro", multipart(Some(b"clip"), &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let intro = extract_json(response).await;
        assert_eq!(intro["name"], "Dev");
        assert_eq!(intro["questions"][0]["type"], "technical");
        let session_id = intro["session_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(post_multipart(
                "/analyze_answer",
                multipart(
                    Some(b"answer clip"),
                    &[
                        ("session_id", session_id.as_str()),
                        ("question_id", "1"),
                        ("question_text", "What is RAII?"),
                    ],
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let answer = extract_json(response).await;
        assert_eq!(answer["technical_score"], 9);
        assert_eq!(answer["communication_feedback"], "Concise");

        let response = app
            .clone()
            .oneshot(post_json(
                "/final_report",
                serde_json::json!({ "session_id": session_id }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let report = extract_json(response).await;
        assert_eq!(report["technical_average"], 9.0);
        assert_eq!(report["overall_score"], 8.0);
        assert_eq!(report["recommendation"], "Strong Hire");
        assert_eq!(report["total_questions"], 1);

        let response = app
            .oneshot(
                Request::get(format!("/sessions/{session_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(extract_json(response).await["phase"], "COMPLETED");
    }

    #[tokio::test]
    async fn test_unknown_session_is_404_and_wrong_phase_is_409() {
        let app = app(vec![Ok(INTRO_JSON.to_string())]);

        let response = app
            .clone()
            .oneshot(post_json(
                "/final_report",
                serde_json::json!({ "session_id": "session_77_missing" }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            extract_json(response).await["error"]["code"],
            "SESSION_NOT_FOUND"
        );

        let response = app
            .clone()
            .oneshot(post_multipart("/analyze_intro", multipart(Some(b"clip"), &[])))
            .await
            .unwrap();
        let session_id = extract_json(response).await["session_id"]
            .as_str()
            .unwrap()
            .to_string();

        // QUESTIONING session: retrying the intro is a phase error.
        let response = app
            .oneshot(post_multipart(
                "/analyze_intro",
                multipart(Some(b"clip"), &[("session_id", session_id.as_str())]),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(extract_json(response).await["error"]["code"], "INVALID_PHASE");
    }

    #[tokio::test]
    async fn test_gateway_failure_returns_502_with_session_id() {
        let app = app(vec![Err(GatewayError::QuotaExceeded("limit".into()))]);
        let response = app
            .oneshot(post_multipart("/analyze_intro", multipart(Some(b"clip"), &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = extract_json(response).await;
        assert_eq!(body["error"]["code"], "GATEWAY_ERROR");
        assert!(body["error"]["session_id"]
            .as_str()
            .unwrap()
            .starts_with("session_"));
    }

    #[tokio::test]
    async fn test_missing_video_is_validation_error() {
        let response = app(vec![])
            .oneshot(post_multipart("/analyze_intro", multipart(None, &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            extract_json(response).await["error"]["code"],
            "VALIDATION_ERROR"
        );
    }

    #[tokio::test]
    async fn test_empty_video_is_malformed_media() {
        let response = app(vec![])
            .oneshot(post_multipart("/analyze_intro", multipart(Some(b""), &[])))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(
            extract_json(response).await["error"]["code"],
            "MALFORMED_MEDIA"
        );
    }

    #[tokio::test]
    async fn test_non_numeric_question_id_is_validation_error() {
        let response = app(vec![])
            .oneshot(post_multipart(
                "/analyze_answer",
                multipart(
                    Some(b"clip"),
                    &[
                        ("session_id", "session_1_abc"),
                        ("question_id", "first"),
                        ("question_text", "Why?"),
                    ],
                ),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_malformed_final_report_body_is_validation_error() {
        let response = app(vec![])
            .oneshot(post_json("/final_report", serde_json::json!({ "id": 3 })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            extract_json(response).await["error"]["code"],
            "VALIDATION_ERROR"
        );
    }
}

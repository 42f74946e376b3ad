use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::api::rest::{handlers, logging_middleware::request_logging_middleware, AppState};

pub fn create_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route("/version", get(handlers::version))
        .route("/agent", post(handlers::agent))
        .route("/credentials/override", put(handlers::set_override));

    Router::new()
        .nest("/api", api_routes)
        .layer(middleware::from_fn(request_logging_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent::conversation::ChatMessage;
    use crate::agent::{
        AgentError, ChatBackend, CredentialFailoverClient, CredentialStore, Result,
        ToolChoicePlanner, ToolExecutor,
    };
    use crate::tools::{CodeRunner, SearchCredentials, WebSearch};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use tower::ServiceExt;

    struct Backend;
    struct Runner;
    struct Search;

    #[async_trait]
    impl ChatBackend for Backend {
        async fn complete(&self, messages: &[ChatMessage], credential: &str) -> Result<String> {
            if credential != "good" {
                return Err(AgentError::Upstream(format!("rejected key {credential}")));
            }
            if messages[0].content.contains("tool selector") {
                // Reports how many planner turns this session has seen.
                let turns = messages.len() / 2;
                Ok(format!(r#"[{{"tool":"RunCode","input":"turn {turns}"}}]"#))
            } else {
                Ok("delegated".to_string())
            }
        }
    }

    #[async_trait]
    impl CodeRunner for Runner {
        async fn run(&self, source: &str) -> String {
            source.to_string()
        }
    }

    #[async_trait]
    impl WebSearch for Search {
        async fn search(&self, _query: &str, _credentials: &SearchCredentials) -> String {
            String::new()
        }
    }

    /// Never plans; delegated calls echo the prompt they were given.
    struct Echo;

    #[async_trait]
    impl ChatBackend for Echo {
        async fn complete(&self, messages: &[ChatMessage], _credential: &str) -> Result<String> {
            if messages[0].content.contains("tool selector") {
                Ok("no plan today".to_string())
            } else {
                Ok(format!("<{}>", messages[messages.len() - 1].content))
            }
        }
    }

    fn app(primary: &str) -> Router {
        app_with(Arc::new(Backend), primary)
    }

    fn app_with(backend: Arc<dyn ChatBackend>, primary: &str) -> Router {
        let client = CredentialFailoverClient::new(
            ToolChoicePlanner::new(backend.clone()),
            ToolExecutor::new(Arc::new(Runner), Arc::new(Search), backend),
            Arc::new(CredentialStore::new(
                Some(primary.to_string()),
                Vec::new(),
                HashMap::new(),
            )),
            SearchCredentials::default(),
        );
        create_router(Arc::new(AppState::new(client)))
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    #[tokio::test]
    async fn agent_returns_reply() {
        let app = app("good");
        let (status, body) = send(
            &app,
            "POST",
            "/api/agent",
            json!({"message": "hi", "model": "gpt"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["reply"], "turn 1\n\nTools Used: [\"RunCode\"]");
    }

    #[tokio::test]
    async fn sessions_keep_separate_history() {
        let app = app("good");
        let alice = json!({"message": "hi", "model": "gpt", "session": "alice"});
        send(&app, "POST", "/api/agent", alice.clone()).await;
        let (_, second) = send(&app, "POST", "/api/agent", alice).await;
        assert_eq!(second["reply"], "turn 2\n\nTools Used: [\"RunCode\"]");

        let (_, other) = send(
            &app,
            "POST",
            "/api/agent",
            json!({"message": "hi", "model": "gpt", "session": "bob"}),
        )
        .await;
        assert_eq!(other["reply"], "turn 1\n\nTools Used: [\"RunCode\"]");
    }

    #[tokio::test]
    async fn exhausted_credentials_are_a_generic_500() {
        let app = app("secret-bad-key");
        let (status, body) = send(
            &app,
            "POST",
            "/api/agent",
            json!({"message": "hi", "model": "gpt"}),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to generate response"}));
    }

    #[tokio::test]
    async fn message_reaches_the_pipeline_unchanged() {
        let app = app_with(Arc::new(Echo), "good");
        let (status, body) = send(
            &app,
            "POST",
            "/api/agent",
            json!({"message": "  spaced out \n", "model": "gpt"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["reply"],
            "<  spaced out \n>\n\nTools Used: [\"DelegateCall\"]"
        );
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let app = app("good");
        let (status, body) = send(&app, "POST", "/api/agent", json!({"message": "   "})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "message must not be empty");
    }

    #[tokio::test]
    async fn override_key_rescues_bad_primary() {
        let app = app("bad");
        let (status, body) = send(
            &app,
            "PUT",
            "/api/credentials/override",
            json!({"api_key": "good"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["override_active"], true);

        let (status, _) = send(
            &app,
            "POST",
            "/api/agent",
            json!({"message": "hi", "model": "gpt"}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn version_is_reported() {
        let app = app("good");
        let request = Request::builder()
            .uri("/api/version")
            .body(Body::empty())
            .unwrap();
        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}

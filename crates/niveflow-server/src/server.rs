//! Webhook HTTP server.
//!
//! `GET /health` reports whether a run is active. `/webhook` and `/build`
//! (any method, optionally followed by `/{name}` or given `?name=`) start a
//! forced run in the background, or answer 429 while one is active.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::{any, get},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};

use crate::error::ServerError;
use crate::guard::{BuildGuard, BuildPermit};
use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone)]
pub struct WebhookServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for WebhookServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3001,
        }
    }
}

/// State shared by the handlers.
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<Orchestrator>,
    pub guard: BuildGuard,
}

#[derive(Debug, Default, Deserialize)]
pub struct TriggerQuery {
    name: Option<String>,
}

/// Routes of the webhook server.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([axum::http::header::CONTENT_TYPE]);

    Router::new()
        .route("/health", get(health))
        .route("/webhook", any(trigger))
        .route("/webhook/{name}", any(trigger_named))
        .route("/build", any(trigger))
        .route("/build/{name}", any(trigger_named))
        .fallback(not_found)
        .layer(cors)
        .with_state(state)
}

pub struct WebhookServer {
    config: WebhookServerConfig,
    state: AppState,
}

impl WebhookServer {
    pub fn new(config: WebhookServerConfig, state: AppState) -> Self {
        Self { config, state }
    }

    pub async fn start(self) -> Result<(), ServerError> {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|_| {
                ServerError::InvalidAddress(format!("{}:{}", self.config.host, self.config.port))
            })?;

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        tracing::info!("Webhook server listening on http://{}", addr);
        tracing::info!("  GET  /health");
        tracing::info!("  POST /webhook[/{{name}}]  POST /build[/{{name}}]");

        axum::serve(listener, router(self.state))
            .await
            .map_err(ServerError::Serve)
    }
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "building": state.guard.is_building(),
    }))
}

async fn trigger(
    State(state): State<AppState>,
    Query(query): Query<TriggerQuery>,
) -> impl IntoResponse {
    // `?name=` means every source.
    start_run(state, query.name.filter(|name| !name.is_empty()))
}

async fn trigger_named(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    start_run(state, Some(name))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" })))
}

fn start_run(state: AppState, name: Option<String>) -> (StatusCode, Json<serde_json::Value>) {
    let Some(permit) = state.guard.try_acquire() else {
        tracing::warn!("Build requested while another build is running");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "message": "A build is already in progress",
            })),
        );
    };

    let repo = name.clone().unwrap_or_else(|| "all".to_string());
    tracing::info!("Build triggered for {}", repo);

    tokio::spawn(run_detached(state.orchestrator, name, permit));

    (
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "message": "Build started",
            "repo": repo,
        })),
    )
}

async fn run_detached(orchestrator: Arc<Orchestrator>, name: Option<String>, _permit: BuildPermit) {
    match orchestrator.run(true, name.as_deref()).await {
        Ok(report) => tracing::info!("Triggered build finished ({} built)", report.built.len()),
        Err(e) => tracing::error!("Triggered build failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::body::to_bytes;
    use axum::response::Response;

    use crate::orchestrator::tests::Fixture;

    fn state(fixture: &Fixture, names: &[&str]) -> AppState {
        AppState {
            orchestrator: Arc::new(fixture.orchestrator(names)),
            guard: BuildGuard::new(),
        }
    }

    async fn body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn wait_idle(guard: &BuildGuard) {
        tokio::time::timeout(Duration::from_secs(10), async {
            while guard.is_building() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn health_reports_state() {
        let fixture = Fixture::new(&["a"]);
        let state = state(&fixture, &["a"]);

        let json = body(health(State(state.clone())).await.into_response()).await;
        assert_eq!(json, json!({"status": "ok", "building": false}));

        let _permit = state.guard.try_acquire().unwrap();
        let json = body(health(State(state)).await.into_response()).await;
        assert_eq!(json["building"], true);
    }

    #[tokio::test]
    async fn trigger_starts_forced_run() {
        let fixture = Fixture::new(&["a", "b"]);
        let state = state(&fixture, &["a", "b"]);

        let response = trigger(State(state.clone()), Query(TriggerQuery::default()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(
            body(response).await,
            json!({"success": true, "message": "Build started", "repo": "all"})
        );

        wait_idle(&state.guard).await;
        assert_eq!(fixture.built(), ["a", "b"]);
    }

    #[tokio::test]
    async fn named_trigger_builds_one_source() {
        let fixture = Fixture::new(&["a", "b"]);
        let state = state(&fixture, &["a", "b"]);

        let response = trigger_named(State(state.clone()), Path("b".to_string()))
            .await
            .into_response();
        assert_eq!(body(response).await["repo"], "b");

        wait_idle(&state.guard).await;
        assert_eq!(fixture.built(), ["b"]);
    }

    #[tokio::test]
    async fn query_selects_source() {
        let fixture = Fixture::new(&["a", "b"]);
        let state = state(&fixture, &["a", "b"]);

        let query = TriggerQuery {
            name: Some("a".to_string()),
        };
        trigger(State(state.clone()), Query(query)).await;

        wait_idle(&state.guard).await;
        assert_eq!(fixture.built(), ["a"]);
    }

    #[tokio::test]
    async fn empty_query_name_means_all() {
        let fixture = Fixture::new(&["a", "b"]);
        let state = state(&fixture, &["a", "b"]);

        let query = TriggerQuery {
            name: Some(String::new()),
        };
        let response = trigger(State(state.clone()), Query(query))
            .await
            .into_response();
        assert_eq!(body(response).await["repo"], "all");

        wait_idle(&state.guard).await;
        assert_eq!(fixture.built(), ["a", "b"]);
    }

    #[tokio::test]
    async fn busy_trigger_is_rejected() {
        let fixture = Fixture::new(&["a"]);
        let state = state(&fixture, &["a"]);
        let _permit = state.guard.try_acquire().unwrap();

        let response = trigger(State(state.clone()), Query(TriggerQuery::default()))
            .await
            .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(body(response).await["success"], false);
        assert!(fixture.built().is_empty());
    }

    #[tokio::test]
    async fn guard_released_after_failed_run() {
        let fixture = Fixture::new(&["a"]);
        let state = state(&fixture, &["a"]);

        trigger_named(State(state.clone()), Path("nope".to_string())).await;

        wait_idle(&state.guard).await;
        assert!(state.guard.try_acquire().is_some());
    }

    #[tokio::test]
    async fn unknown_route_is_json_404() {
        let response = not_found().await.into_response();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body(response).await, json!({"error": "Not Found"}));
    }
}

use std::net::SocketAddr;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::concept::ConceptService;
use crate::config::AppConfig;
use crate::models::{ConceptNode, ConceptQuery, ConceptRequest, HealthResponse, DEFAULT_LANGUAGE};

#[derive(Clone)]
struct AppState {
    concepts: ConceptService,
}

pub async fn run_server(config: AppConfig, concepts: ConceptService) -> Result<()> {
    let app = router(&config, concepts);

    let addr: SocketAddr = config.bind_addr.parse()?;
    tracing::info!("listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn router(config: &AppConfig, concepts: ConceptService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/concept/:keyword", get(get_concept))
        .route("/api/concept", post(post_concept))
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { concepts })
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if config.allows_any_origin() {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("ignoring invalid allowed origin {origin:?}");
                None
            }
        })
        .collect();
    cors.allow_origin(AllowOrigin::list(origins))
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn get_concept(
    State(state): State<AppState>,
    Path(keyword): Path<String>,
    Query(query): Query<ConceptQuery>,
) -> Result<Json<ConceptNode>, ApiError> {
    let request = ConceptRequest {
        keyword,
        language: query
            .language
            .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
        parent_context: query.parent_context,
    };
    concept_response(&state, request).await
}

async fn post_concept(
    State(state): State<AppState>,
    Json(request): Json<ConceptRequest>,
) -> Result<Json<ConceptNode>, ApiError> {
    concept_response(&state, request).await
}

async fn concept_response(
    state: &AppState,
    request: ConceptRequest,
) -> Result<Json<ConceptNode>, ApiError> {
    if request.keyword.trim().is_empty() {
        return Err(ApiError::bad_request("keyword must not be empty".to_string()));
    }
    Ok(Json(state.concepts.handle(&request).await))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

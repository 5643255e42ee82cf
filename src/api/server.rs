//! HTTP server implementation for the document store

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;

use crate::persistence::LocalStore;

use super::handlers;
use super::models::{BulkRequest, ClipQuery};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<LocalStore>,
}

/// Configure and start the HTTP server
pub async fn start_http_server(store: Arc<LocalStore>, port: u16) -> Result<()> {
    let app_state = AppState { store };

    // Allow the browser-based feed UI to talk to the store directly
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE]);

    let app = Router::new()
        .route("/health", get(health_handler))
        // User preference document
        .route(
            "/user-preferences/:user_id",
            get(get_preferences_handler)
                .put(put_preferences_handler)
                .patch(patch_preferences_handler)
                .delete(delete_preferences_handler),
        )
        .route(
            "/user-preferences/:user_id/reset",
            post(reset_preferences_handler),
        )
        // Clip collection
        .route("/clips", get(list_clips_handler).post(create_clip_handler))
        .route("/clips/stats/summary", get(stats_summary_handler))
        .route("/clips/find-and-update", put(find_and_update_handler))
        .route("/clips/bulk", post(bulk_clips_handler))
        .route(
            "/clips/:id",
            get(get_clip_handler)
                .put(update_clip_handler)
                .delete(delete_clip_handler),
        )
        .with_state(app_state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors),
        );

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    info!("🌐 Document store listening on http://0.0.0.0:{}", port);

    axum::serve(listener, app).await?;

    Ok(())
}

fn error_response(status: StatusCode, e: anyhow::Error) -> axum::response::Response {
    (status, Json(serde_json::json!({ "error": e.to_string() }))).into_response()
}

async fn health_handler() -> impl IntoResponse {
    match handlers::health_check().await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn get_preferences_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match handlers::get_preferences(&state.store, &user_id).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn put_preferences_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match handlers::put_preferences(&state.store, &user_id, payload).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn patch_preferences_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match handlers::patch_preferences(&state.store, &user_id, payload).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn delete_preferences_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match handlers::delete_preferences(&state.store, &user_id).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn reset_preferences_handler(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
) -> impl IntoResponse {
    match handlers::reset_preferences(&state.store, &user_id).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn list_clips_handler(
    State(state): State<AppState>,
    Query(query): Query<ClipQuery>,
) -> impl IntoResponse {
    match handlers::list_clips(&state.store, &query).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn get_clip_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match handlers::get_clip(&state.store, &id).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::NOT_FOUND, e),
    }
}

async fn create_clip_handler(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match handlers::create_clip(&state.store, payload).await {
        Ok(data) => (StatusCode::CREATED, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn update_clip_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match handlers::update_clip(&state.store, &id, payload).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn find_and_update_handler(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    match handlers::find_and_update_clip(&state.store, payload).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn delete_clip_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    match handlers::delete_clip(&state.store, &id).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

async fn bulk_clips_handler(
    State(state): State<AppState>,
    Json(payload): Json<serde_json::Value>,
) -> impl IntoResponse {
    let request: BulkRequest = match serde_json::from_value(payload) {
        Ok(request) => request,
        Err(e) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                anyhow::anyhow!("invalid bulk request: {}", e),
            )
        }
    };
    match handlers::bulk_clips(&state.store, request).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::BAD_REQUEST, e),
    }
}

async fn stats_summary_handler(State(state): State<AppState>) -> impl IntoResponse {
    match handlers::stats_summary(&state.store).await {
        Ok(data) => (StatusCode::OK, Json(data)).into_response(),
        Err(e) => error_response(StatusCode::INTERNAL_SERVER_ERROR, e),
    }
}

//! HTTP API for variant-sync

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::color::{ColorMatch, PALETTE};
use crate::config::Config;
use crate::db::Database;
use crate::draft::VariantDraft;
use crate::models::{ColorHex, ColorHexError, ProductSnapshot};
use crate::reconcile::{self, SyncError};
use crate::service::{Category, CategoryDirectory, InventoryService, ServiceError};
use crate::validate::ValidationResult;

/// Store and configuration shared by every handler
pub struct AppState {
    pub db: Database,
    pub config: Config,
}

impl AppState {
    pub fn new(db: Database, config: Config) -> Arc<Self> {
        Arc::new(Self { db, config })
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/palette", get(palette))
        .route("/api/v1/colors/classify", get(classify))
        .route("/api/v1/categories", get(categories))
        .route("/api/v1/products/{id}", get(product))
        .route("/api/v1/products/validate", post(validate_draft))
        .route("/api/v1/products/sync", post(sync_draft))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "variant-sync",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({ "error": message })),
    )
        .into_response()
}

/// Requires `Authorization: Bearer <token>` on everything but `/health`
async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Response {
    if request.uri().path() == "/health" {
        return next.run(request).await;
    }

    let bearer = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "));

    match bearer {
        None => unauthorized("Missing or invalid Authorization header"),
        Some(token) if !state.config.validate_token(token) => unauthorized("Invalid API token"),
        Some(_) => next.run(request).await,
    }
}

async fn palette() -> Json<Vec<ColorMatch>> {
    Json(PALETTE.iter().map(ColorMatch::from_swatch).collect())
}

#[derive(Debug, Deserialize)]
struct ClassifyQuery {
    hex: String,
}

async fn classify(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ClassifyQuery>,
) -> Result<Json<ColorMatch>, ApiError> {
    let hex: ColorHex = query.hex.parse()?;
    Ok(Json(state.config.sync.classifier().classify(&hex)))
}

async fn categories(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.db.list_categories().await?))
}

async fn product(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ProductSnapshot>, ApiError> {
    Ok(Json(state.db.load_product(&id).await?))
}

async fn validate_draft(Json(draft): Json<VariantDraft>) -> Json<ValidationResult> {
    Json(draft.validate())
}

/// Validate, reconcile and settle a draft
async fn sync_draft(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<VariantDraft>,
) -> Response {
    tracing::info!(
        product_id = ?draft.product().id,
        variants = draft.variants().len(),
        "Sync request received"
    );

    match reconcile::save(&state.db, &draft, state.config.sync.options()).await {
        Ok((report, settled)) => {
            let status = if report.is_fatal() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::OK
            };
            (
                status,
                Json(serde_json::json!({ "report": report, "draft": settled })),
            )
                .into_response()
        }
        Err(SyncError::Invalid(errors)) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": "Draft is invalid", "fields": errors })),
        )
            .into_response(),
    }
}

/// API error type
#[derive(Debug)]
pub struct ApiError(anyhow::Error);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = if let Some(ServiceError::NotFound { .. }) = self.0.downcast_ref() {
            StatusCode::NOT_FOUND
        } else if self.0.downcast_ref::<ColorHexError>().is_some() {
            StatusCode::BAD_REQUEST
        } else {
            tracing::error!(error = %self.0, "API error");
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}

/**
 * API REST INSPECTOR - Consultation de l'état accumulé
 *
 * RÔLE :
 * Permet aux observateurs externes (dashboard, scripts, debug) de lire le
 * snapshot courant sans participer au cycle d'inspection.
 *
 * ROUTES :
 * - GET  /health                 toujours accessible
 * - GET  /snapshot               map target_id → dernier rapport
 * - GET  /snapshot/{target_id}   rapport d'une cible (404 si absent)
 * - GET  /targets                cibles enregistrées, triées
 * - POST /targets                {"target_id": "..."} enregistre une cible
 *
 * SÉCURITÉ :
 * Si `http.api_key` est configurée, header x-api-key obligatoire sauf /health.
 */

use crate::error::InspectionError;
use crate::models::{Report, Snapshot, TargetAnnouncement, TargetId};
use crate::runtime::CoordinatorHandle;
use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::{self, Next};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tracing::warn;

#[derive(Clone)]
pub struct AppState {
    pub coordinator: CoordinatorHandle,
    pub api_key: Option<String>,
}

pub fn build_router(app_state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/snapshot", get(get_snapshot))
        .route("/snapshot/{id}", get(get_report))
        .route("/targets", get(list_targets).post(register_target))
        .layer(middleware::from_fn_with_state(app_state.clone(), require_api_key))
        .with_state(app_state)
}

async fn require_api_key(
    State(app): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    let Some(expected) = app.api_key.as_deref() else {
        return Ok(next.run(req).await);
    };
    if req.uri().path().starts_with("/health") {
        return Ok(next.run(req).await);
    }

    let ok = req
        .headers()
        .get("x-api-key")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == expected)
        .unwrap_or(false);

    if !ok {
        warn!(path = %req.uri().path(), "rejected request without valid api key");
        return Err(StatusCode::UNAUTHORIZED);
    }
    Ok(next.run(req).await)
}

fn unavailable(e: InspectionError) -> StatusCode {
    warn!(error = %e, "coordinator unreachable from API");
    StatusCode::SERVICE_UNAVAILABLE
}

// GET /snapshot
async fn get_snapshot(State(app): State<AppState>) -> Result<Json<Snapshot>, StatusCode> {
    let snapshot = app.coordinator.query_snapshot().await.map_err(unavailable)?;
    Ok(Json(snapshot))
}

// GET /snapshot/{id}
async fn get_report(
    State(app): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Report>, StatusCode> {
    let mut snapshot = app.coordinator.query_snapshot().await.map_err(unavailable)?;
    let Some(report) = snapshot.remove(&TargetId::new(id)) else {
        return Err(StatusCode::NOT_FOUND);
    };
    Ok(Json(report))
}

// GET /targets
async fn list_targets(State(app): State<AppState>) -> Result<Json<Vec<TargetId>>, StatusCode> {
    let targets = app.coordinator.targets().await.map_err(unavailable)?;
    Ok(Json(targets))
}

// POST /targets
async fn register_target(
    State(app): State<AppState>,
    Json(body): Json<TargetAnnouncement>,
) -> Result<StatusCode, StatusCode> {
    app.coordinator.register_target(body.target_id).map_err(unavailable)?;
    Ok(StatusCode::ACCEPTED)
}

//! Route handlers.
//!
//! Each handler moves its work onto the blocking pool: password hashing and
//! durable commits must not stall the async workers.

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::audit::{AuditRecord, VerificationReport};
use crate::http::auth::{bearer_from_headers, BearerToken};
use crate::http::error::ApiError;
use crate::http::server::AppState;
use crate::service::{
    AuditQuery, DecisionView, EthicsVerdict, FairnessReport, FairnessRequest, LoginRequest, LoginResponse,
    MonitorService, NewDecision, NewLogEntry, NewUser, RoleChange, SecurityReport, ServiceResult, UserView,
};

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct EvaluateRequest {
    pub decision_id: u64,
}

async fn run_blocking<T, F>(state: &AppState, work: F) -> Result<T, ApiError>
where
    F: FnOnce(&MonitorService) -> ServiceResult<T> + Send + 'static,
    T: Send + 'static,
{
    let service = state.service.clone();
    Ok(tokio::task::spawn_blocking(move || work(&service)).await??)
}

pub async fn health() -> Json<HealthStatus> {
    Json(HealthStatus {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    run_blocking(&state, move |svc| svc.login(&body)).await.map(Json)
}

pub async fn register_user(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<NewUser>,
) -> Result<(StatusCode, Json<UserView>), ApiError> {
    let token = bearer_from_headers(&headers);
    let user = run_blocking(&state, move |svc| svc.register_user(token.as_deref(), body)).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub async fn get_user(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
) -> Result<Json<UserView>, ApiError> {
    run_blocking(&state, move |svc| svc.get_user(&token, &id)).await.map(Json)
}

pub async fn change_role(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<String>,
    Json(body): Json<RoleChange>,
) -> Result<Json<UserView>, ApiError> {
    run_blocking(&state, move |svc| svc.change_role(&token, &id, body)).await.map(Json)
}

pub async fn create_decision(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(body): Json<NewDecision>,
) -> Result<(StatusCode, Json<DecisionView>), ApiError> {
    let decision = run_blocking(&state, move |svc| svc.create_decision(&token, body)).await?;
    Ok((StatusCode::CREATED, Json(decision)))
}

pub async fn get_decision(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Path(id): Path<u64>,
) -> Result<Json<DecisionView>, ApiError> {
    run_blocking(&state, move |svc| svc.get_decision(&token, id)).await.map(Json)
}

pub async fn append_log(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(body): Json<NewLogEntry>,
) -> Result<(StatusCode, Json<AuditRecord>), ApiError> {
    let record = run_blocking(&state, move |svc| svc.append_log(&token, body)).await?;
    Ok((StatusCode::CREATED, Json(record)))
}

pub async fn evaluate_ethics(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(body): Json<EvaluateRequest>,
) -> Result<Json<EthicsVerdict>, ApiError> {
    run_blocking(&state, move |svc| svc.evaluate_ethics(&token, body.decision_id))
        .await
        .map(Json)
}

pub async fn assess_fairness(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Json(body): Json<FairnessRequest>,
) -> Result<Json<FairnessReport>, ApiError> {
    run_blocking(&state, move |svc| svc.assess_fairness(&token, body)).await.map(Json)
}

pub async fn query_audit(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    run_blocking(&state, move |svc| svc.query_audit(&token, &query)).await.map(Json)
}

pub async fn verify_audit(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<VerificationReport>, ApiError> {
    run_blocking(&state, move |svc| svc.verify_audit(&token)).await.map(Json)
}

pub async fn security_report(
    State(state): State<AppState>,
    Extension(BearerToken(token)): Extension<BearerToken>,
) -> Result<Json<SecurityReport>, ApiError> {
    run_blocking(&state, move |svc| svc.security_report(&token)).await.map(Json)
}

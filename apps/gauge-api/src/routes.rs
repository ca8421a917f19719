use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::Serialize;
use time::OffsetDateTime;
use uuid::Uuid;

use gauge_service::{ResolutionState, ResolveRequest, ResolveResponse, ServiceError};
use gauge_storage::{catalog, models::ResolutionAttemptRecord};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/resolve", post(resolve))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn resolve(
	State(state): State<AppState>,
	Json(payload): Json<ResolveRequest>,
) -> Result<Json<ResolveResponse>, ApiError> {
	let query = payload.query.clone();
	let response = state.service.resolve(payload).await?;

	persist_outcome(&state, &query, &response).await;

	Ok(Json(response))
}

/// Audit logging and usage bumps are best-effort; a full log table never
/// blocks a resolution.
async fn persist_outcome(state: &AppState, query: &str, response: &ResolveResponse) {
	let now = OffsetDateTime::now_utc();

	for attempt in &response.attempts {
		let record = ResolutionAttemptRecord {
			attempt_id: Uuid::new_v4(),
			query: query.to_string(),
			tier: attempt.tier.as_str().to_string(),
			success: attempt.success,
			confidence: attempt.confidence,
			elapsed_ms: attempt.elapsed_ms as i64,
			metadata: attempt.metadata.clone(),
			created_at: now,
		};

		if let Err(err) = catalog::record_attempt(&state.db, &record).await {
			tracing::error!(error = %err, "Failed to record resolution attempt.");
		}
	}

	if response.state == ResolutionState::Resolved
		&& let Some(top) = response.results.first()
		&& let Err(err) = catalog::bump_usage(&state.db, top.candidate.metric_id).await
	{
		tracing::error!(error = %err, "Failed to bump metric usage.");
	}
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}

impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match &err {
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message.clone()),
			ServiceError::Provider { message } =>
				Self::new(StatusCode::BAD_GATEWAY, "provider_error", message.clone()),
			ServiceError::Storage { message } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message.clone()),
		}
	}
}

impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}

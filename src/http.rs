//! HTTP API
//!
//! Thin axum adapters over the record service. Handlers translate the
//! service errors into status codes: NotFound becomes 404, Validation
//! becomes 400, everything else is a 500.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::db::DbStats;
use crate::error::ServiceError;
use crate::models::{StatusCriteria, TreatmentAction};
use crate::service::RecordService;

/// Default page size for listings
const DEFAULT_PAGE_LIMIT: u32 = 10;

/// Build the API router
pub fn router(service: RecordService) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/stats", get(stats))
        .route("/v1/patients", post(create_patient).get(list_patients))
        .route(
            "/v1/patients/:id",
            get(get_patient).patch(patch_patient).delete(delete_patient),
        )
        .route("/v1/treatments", post(create_treatment).get(list_treatments))
        .route(
            "/v1/treatments/:id",
            get(get_treatment).delete(delete_treatment),
        )
        .with_state(service)
}

/// Error body returned for failed requests
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub message: String,
}

struct ApiError(ServiceError);

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::BAD_REQUEST,
            other => {
                error!("Request failed: {}", other);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let body = Json(ErrorBody {
            message: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

/// Health check endpoint
async fn health() -> impl IntoResponse {
    "OK"
}

/// GET /v1/stats
async fn stats(State(service): State<RecordService>) -> Result<Json<DbStats>, ApiError> {
    Ok(Json(service.db().stats()?))
}

#[derive(Debug, Deserialize)]
pub struct CreatePatientRequest {
    pub name: String,
    #[serde(default)]
    pub status: Option<StatusCriteria>,
}

/// POST /v1/patients
async fn create_patient(
    State(service): State<RecordService>,
    Json(request): Json<CreatePatientRequest>,
) -> Result<Response, ApiError> {
    let patient = service.create_patient(&request.name, request.status.as_ref())?;
    Ok((StatusCode::CREATED, Json(patient)).into_response())
}

/// GET /v1/patients/:id
async fn get_patient(
    State(service): State<RecordService>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(service.get_patient(id)?).into_response())
}

#[derive(Debug, Deserialize)]
pub struct PatchPatientRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub status: Option<StatusCriteria>,
}

/// PATCH /v1/patients/:id
async fn patch_patient(
    State(service): State<RecordService>,
    Path(id): Path<i64>,
    Json(request): Json<PatchPatientRequest>,
) -> Result<Response, ApiError> {
    let patient = service.patch_patient(id, request.name.as_deref(), request.status.as_ref())?;
    Ok(Json(patient).into_response())
}

/// DELETE /v1/patients/:id
async fn delete_patient(
    State(service): State<RecordService>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    service.delete_patient(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListPatientsQuery {
    #[serde(default)]
    pub name: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /v1/patients
async fn list_patients(
    State(service): State<RecordService>,
    Query(query): Query<ListPatientsQuery>,
) -> Result<Response, ApiError> {
    let page = service.list_patients(
        query.name.as_deref(),
        query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        query.offset.unwrap_or(0),
    )?;
    Ok(Json(page).into_response())
}

#[derive(Debug, Deserialize)]
pub struct CreateTreatmentRequest {
    pub patient_id: i64,
    pub before_status: StatusCriteria,
    pub actions: Vec<TreatmentAction>,
    pub expected_status: StatusCriteria,
}

/// POST /v1/treatments
async fn create_treatment(
    State(service): State<RecordService>,
    Json(request): Json<CreateTreatmentRequest>,
) -> Result<Response, ApiError> {
    let view = service
        .create_treatment(
            request.patient_id,
            &request.before_status,
            &request.actions,
            &request.expected_status,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(view)).into_response())
}

/// GET /v1/treatments/:id
async fn get_treatment(
    State(service): State<RecordService>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    Ok(Json(service.get_treatment(id)?).into_response())
}

/// DELETE /v1/treatments/:id
async fn delete_treatment(
    State(service): State<RecordService>,
    Path(id): Path<i64>,
) -> Result<Response, ApiError> {
    service.delete_treatment(id)?;
    Ok(StatusCode::NO_CONTENT.into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListTreatmentsQuery {
    pub patient_id: Option<i64>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// GET /v1/treatments
async fn list_treatments(
    State(service): State<RecordService>,
    Query(query): Query<ListTreatmentsQuery>,
) -> Result<Response, ApiError> {
    let page = service.list_treatments(
        query.patient_id,
        query.limit.unwrap_or(DEFAULT_PAGE_LIMIT),
        query.offset.unwrap_or(0),
    )?;
    Ok(Json(page).into_response())
}

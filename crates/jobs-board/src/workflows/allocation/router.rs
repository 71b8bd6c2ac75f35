use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;

use super::domain::{AllocationRun, PreferenceEntry, ResidencyCode, StudentNumber, YearGroup};
use super::repository::AllocationStore;
use super::service::{AllocationServiceError, InterviewAllocationService};

#[derive(Debug, Deserialize)]
pub(crate) struct ResidencyQuery {
    pub(crate) residency: ResidencyCode,
}

/// Router builder exposing allocation, query and preference endpoints.
pub fn allocation_router<S>(service: Arc<InterviewAllocationService<S>>) -> Router
where
    S: AllocationStore + 'static,
{
    Router::new()
        .route("/api/v1/allocate", post(allocate_handler::<S>))
        .route("/api/v1/allocations", get(allocations_handler::<S>))
        .route(
            "/api/v1/allocations/eligibility",
            get(eligibility_handler::<S>),
        )
        .route("/api/v1/allocations/jobs", get(job_fill_handler::<S>))
        .route(
            "/api/v1/allocations/students",
            get(student_fill_handler::<S>),
        )
        .route("/api/v1/jobs-to-rank", get(jobs_to_rank_handler::<S>))
        .route("/api/v1/cohorts/:year", get(cohort_handler::<S>))
        .route(
            "/api/v1/students/:student_number/preferences",
            post(preferences_handler::<S>),
        )
        .with_state(service)
}

pub(crate) fn error_response(error: AllocationServiceError) -> Response {
    let status = match &error {
        AllocationServiceError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
        AllocationServiceError::UnsupportedResidency(_) => StatusCode::BAD_REQUEST,
        AllocationServiceError::AllocationInProgress(_) => StatusCode::CONFLICT,
        AllocationServiceError::UnknownStudent(_) => StatusCode::NOT_FOUND,
        AllocationServiceError::UnknownJob(_)
        | AllocationServiceError::DuplicatePreference(_)
        | AllocationServiceError::PreferenceOutsideResidency { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };

    let payload = json!({
        "error": error.to_string(),
        "retryable": error.is_retryable(),
    });
    (status, Json(payload)).into_response()
}

/// Runs a service call on the blocking pool so store I/O stays off the async workers.
async fn run_blocking<S, T, F>(
    service: Arc<InterviewAllocationService<S>>,
    call: F,
) -> Result<T, Response>
where
    S: AllocationStore + 'static,
    T: Send + 'static,
    F: FnOnce(&InterviewAllocationService<S>) -> Result<T, AllocationServiceError> + Send + 'static,
{
    match tokio::task::spawn_blocking(move || call(&service)).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(error)) => Err(error_response(error)),
        Err(join_error) => {
            error!(error = %join_error, "allocation task aborted");
            let payload = json!({
                "error": "allocation task aborted",
                "retryable": false,
            });
            Err((StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response())
        }
    }
}

pub(crate) async fn allocate_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Query(query): Query<ResidencyQuery>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let residency = query.residency;
    match run_blocking(service, move |service| service.run_allocation(residency)).await {
        Ok(run @ AllocationRun::Completed(_)) => (StatusCode::OK, Json(run)).into_response(),
        Ok(run @ AllocationRun::Rejected(_)) => {
            (StatusCode::UNPROCESSABLE_ENTITY, Json(run)).into_response()
        }
        Err(response) => response,
    }
}

pub(crate) async fn allocations_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Query(query): Query<ResidencyQuery>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let residency = query.residency;
    match run_blocking(service, move |service| service.fetch_allocations(residency)).await {
        Ok(views) => (StatusCode::OK, Json(views)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn eligibility_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Query(query): Query<ResidencyQuery>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let residency = query.residency;
    match run_blocking(service, move |service| service.check_eligibility(residency)).await {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn job_fill_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Query(query): Query<ResidencyQuery>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let residency = query.residency;
    match run_blocking(service, move |service| service.job_fill(residency)).await {
        Ok(fill) => (StatusCode::OK, Json(fill)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn student_fill_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Query(query): Query<ResidencyQuery>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let residency = query.residency;
    match run_blocking(service, move |service| service.student_fill(residency)).await {
        Ok(fill) => (StatusCode::OK, Json(fill)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn jobs_to_rank_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Query(query): Query<ResidencyQuery>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let residency = query.residency;
    match run_blocking(service, move |service| service.jobs_to_rank(residency)).await {
        Ok(jobs) => (StatusCode::OK, Json(jobs)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn cohort_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Path(year): Path<u8>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let year = match YearGroup::try_from(year) {
        Ok(year) => year,
        Err(message) => {
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response()
        }
    };

    match run_blocking(service, move |service| service.cohort_status(year)).await {
        Ok(members) => (StatusCode::OK, Json(members)).into_response(),
        Err(response) => response,
    }
}

pub(crate) async fn preferences_handler<S>(
    State(service): State<Arc<InterviewAllocationService<S>>>,
    Path(student_number): Path<i64>,
    Json(entries): Json<Vec<PreferenceEntry>>,
) -> Response
where
    S: AllocationStore + 'static,
{
    let student = StudentNumber(student_number);
    let submission = run_blocking(service, move |service| {
        service.submit_preferences(student, &entries)
    });
    match submission.await {
        Ok(recorded) => {
            let payload = json!({
                "student_number": student,
                "recorded": recorded,
            });
            (StatusCode::CREATED, Json(payload)).into_response()
        }
        Err(response) => response,
    }
}

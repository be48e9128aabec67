//! Process list, descriptions and execution.

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use drill_common::DrillError;
use tracing::{debug, instrument};
use wps_protocol::{ExceptionReport, ExecuteRequest, ExecuteResponse, ProcessDescription, ProcessList};

use crate::state::AppState;

/// A failed request, sent as an exception report.
#[derive(Debug)]
pub struct ApiError(pub ExceptionReport);

impl From<DrillError> for ApiError {
    fn from(err: DrillError) -> Self {
        ApiError(ExceptionReport::from_error(&err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.0.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self.0)).into_response()
    }
}

/// GET / - every process in the catalogue
pub async fn list_processes_handler(
    Extension(state): Extension<Arc<AppState>>,
) -> Json<ProcessList> {
    Json(ProcessList {
        processes: state.catalog.summaries(),
    })
}

/// HEAD / - liveness for load balancers
pub async fn head_handler() -> StatusCode {
    StatusCode::OK
}

/// GET /processes/:id
pub async fn describe_process_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<ProcessDescription>, ApiError> {
    state
        .catalog
        .description(&identifier)
        .map(Json)
        .ok_or_else(|| DrillError::ProcessNotFound(identifier).into())
}

/// POST /processes/:id/execution
#[instrument(skip(state, body))]
pub async fn execute_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(identifier): Path<String>,
    body: Result<Json<ExecuteRequest>, JsonRejection>,
) -> Result<Json<ExecuteResponse>, ApiError> {
    let Json(request) =
        body.map_err(|rejection| DrillError::invalid_input("body", rejection.body_text()))?;
    let process = state
        .catalog
        .get(&identifier)
        .ok_or_else(|| DrillError::ProcessNotFound(identifier.clone()))?;
    debug!(inputs = request.inputs.len(), "Execute request");

    let response = state.pipeline.execute(process, &request).await?;
    Ok(Json(response))
}

//! Event record handlers: append, batch append, range query, lookup.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    AppendRecordRequest, AppendRecordResponse, BatchAppendRequest, BatchAppendResponse,
    EventRecordDto, RecordListResponse, TimeRangeParams,
};
use crate::app_state::AppState;
use crate::domain::{NewEventRecord, RecordId};
use crate::error::{ErrorResponse, StoreError};

/// `POST /events` — Append one balance-update record.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPayload`] for a null, scalar or empty
/// payload and [`StoreError::StorageUnavailable`] if the store does not
/// answer.
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Append a balance update",
    description = "Durably appends one record and returns its store-assigned identifier. The record is broadcast to WebSocket subscribers once written.",
    request_body = AppendRecordRequest,
    responses(
        (status = 201, description = "Record appended", body = AppendRecordResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn append_event(
    State(state): State<AppState>,
    Json(req): Json<AppendRecordRequest>,
) -> Result<impl IntoResponse, StoreError> {
    let record = NewEventRecord::try_from(req)?;
    let id = state.event_service.append(record).await?;
    Ok((StatusCode::CREATED, Json(AppendRecordResponse { id })))
}

/// `POST /events/batch` — Append several records atomically.
///
/// # Errors
///
/// Returns [`StoreError::InvalidPayload`] if any record is invalid (nothing
/// is written) and [`StoreError::StorageUnavailable`] if the store does not
/// answer.
#[utoipa::path(
    post,
    path = "/api/v1/events/batch",
    tag = "Events",
    summary = "Append a batch of balance updates",
    description = "Appends every record in one atomic unit. Identifiers ascend in request order.",
    request_body = BatchAppendRequest,
    responses(
        (status = 201, description = "Batch appended", body = BatchAppendResponse),
        (status = 400, description = "Invalid payload", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn append_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchAppendRequest>,
) -> Result<impl IntoResponse, StoreError> {
    let records = req
        .records
        .into_iter()
        .map(NewEventRecord::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let ids = state.event_service.append_batch(records).await?;
    Ok((StatusCode::CREATED, Json(BatchAppendResponse { ids })))
}

/// `GET /events` — Records in an inclusive time window.
///
/// # Errors
///
/// Returns [`StoreError::InvalidRange`] if `from` is after `to` and
/// [`StoreError::StorageUnavailable`] if the store does not answer.
#[utoipa::path(
    get,
    path = "/api/v1/events",
    tag = "Events",
    summary = "Query by time range",
    description = "Returns every record whose insert time lies in [from, to], ordered by insert time then identifier. An empty window is not an error.",
    params(TimeRangeParams),
    responses(
        (status = 200, description = "Matching records", body = RecordListResponse),
        (status = 400, description = "Invalid time range", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn query_events(
    State(state): State<AppState>,
    Query(params): Query<TimeRangeParams>,
) -> Result<impl IntoResponse, StoreError> {
    let records = state
        .event_service
        .query_by_time_range(params.from, params.to)
        .await?;
    Ok(Json(RecordListResponse::from(records)))
}

/// `GET /events/{id}` — Point lookup.
///
/// # Errors
///
/// Returns [`StoreError::NotFound`] for an unknown identifier.
#[utoipa::path(
    get,
    path = "/api/v1/events/{id}",
    tag = "Events",
    summary = "Get a record",
    description = "Returns one record by its store-assigned identifier.",
    params(
        ("id" = i64, Path, description = "Record identifier"),
    ),
    responses(
        (status = 200, description = "Record", body = EventRecordDto),
        (status = 404, description = "Record not found", body = ErrorResponse),
        (status = 503, description = "Storage unavailable", body = ErrorResponse),
    )
)]
pub async fn get_event(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, StoreError> {
    let record = state.event_service.get_by_id(RecordId::new(id)).await?;
    Ok(Json(EventRecordDto::from(record)))
}

/// Event record routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/events", post(append_event).get(query_events))
        .route("/events/batch", post(append_batch))
        .route("/events/{id}", get(get_event))
}

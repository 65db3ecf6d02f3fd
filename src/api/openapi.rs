//! OpenAPI document for the REST surface.

use utoipa::OpenApi;

use crate::api::dto::{
    AppendRecordRequest, AppendRecordResponse, BatchAppendRequest, BatchAppendResponse,
    EventRecordDto, RecordListResponse,
};
use crate::api::handlers::{events, system};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "Balance Event Store",
        description = "Append-only log of exchange balance updates, queryable by time range."
    ),
    paths(
        events::append_event,
        events::append_batch,
        events::query_events,
        events::get_event,
        system::health_handler,
    ),
    components(schemas(
        AppendRecordRequest,
        AppendRecordResponse,
        BatchAppendRequest,
        BatchAppendResponse,
        EventRecordDto,
        RecordListResponse,
        system::HealthResponse,
        ErrorResponse,
        ErrorBody,
    )),
    tags(
        (name = "Events", description = "Append and read balance-update records"),
        (name = "System", description = "Service health"),
    )
)]
pub struct ApiDoc;

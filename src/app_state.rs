//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::domain::EventBus;
use crate::service::EventService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Event service for every store operation.
    pub event_service: Arc<EventService>,
    /// Event bus for WebSocket live tails.
    pub event_bus: EventBus,
}

impl AppState {
    /// Builds state around a service, sharing its bus.
    #[must_use]
    pub fn new(event_service: EventService) -> Self {
        let event_bus = event_service.event_bus().clone();
        Self {
            event_service: Arc::new(event_service),
            event_bus,
        }
    }
}

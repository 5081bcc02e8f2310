//! Event publishing DTOs.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::PublishReport;

/// Response body for `POST /events`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PublishResponse {
    /// `event_type` of the accepted event.
    pub event_type: String,
    /// The event was handed to the dispatcher.
    pub dispatched: bool,
    /// The dispatcher reported a failure.
    pub dispatch_failed: bool,
    /// Local handlers that completed.
    pub handlers_run: usize,
    /// Local handlers that failed.
    pub handlers_failed: usize,
}

impl PublishResponse {
    /// Builds the response from a publish report.
    #[must_use]
    pub fn new(event_type: &str, report: PublishReport) -> Self {
        Self {
            event_type: event_type.to_string(),
            dispatched: report.dispatched,
            dispatch_failed: report.dispatch_failed,
            handlers_run: report.handlers_run,
            handlers_failed: report.handlers_failed,
        }
    }
}

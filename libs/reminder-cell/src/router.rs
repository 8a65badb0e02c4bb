// libs/reminder-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn reminder_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/due", get(handlers::list_due_reminders))
        .route("/{reminder_id}/sent", post(handlers::mark_reminder_sent))
        .route("/{reminder_id}/failed", post(handlers::mark_reminder_failed))
        .route(
            "/appointments/{appointment_id}",
            get(handlers::list_appointment_reminders),
        )
        .with_state(state)
}

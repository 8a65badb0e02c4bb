// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn appointment_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", post(handlers::confirm_appointment))
        .route("/{appointment_id}/cancel", post(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", post(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", post(handlers::mark_no_show))
        .route("/queue/doctors/{doctor_id}", get(handlers::list_queue))
        .route("/queue/doctors/{doctor_id}/call-next", post(handlers::call_next_in_queue))
        .route("/queue/entries/{entry_id}/skip", post(handlers::skip_queue_entry))
        .route("/queue/entries/{entry_id}/finish", post(handlers::finish_queue_entry))
        .with_state(state)
}

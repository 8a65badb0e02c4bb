// libs/schedule-cell/src/router.rs
use std::sync::Arc;

use axum::{
    routing::{get, post, put},
    Router,
};

use shared_database::AppState;

use crate::handlers;

pub fn schedule_routes(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/doctors/{doctor_id}", get(handlers::get_weekly_schedule))
        .route("/doctors/{doctor_id}/template", put(handlers::upsert_template))
        .route("/doctors/{doctor_id}/exceptions", post(handlers::create_exception))
        .route("/doctors/{doctor_id}/available-days", get(handlers::get_available_days))
        .route("/doctors/{doctor_id}/slots", get(handlers::list_slots))
        .route("/doctors/{doctor_id}/slots/generate", post(handlers::generate_slots))
        .route("/slots/{slot_id}/block", post(handlers::block_slot))
        .route("/slots/{slot_id}/unblock", post(handlers::unblock_slot))
        .with_state(state)
}

pub mod handlers;
pub mod models;
pub mod router;
pub mod services;

pub use models::{CoordinatorStatus, JobKind, JobRun};
pub use services::JobCoordinator;

pub mod coordinator;

pub use coordinator::JobCoordinator;

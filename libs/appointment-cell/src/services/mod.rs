pub mod ledger;
pub mod lifecycle;
pub mod queue;

pub use ledger::BookingLedger;
pub use lifecycle::AppointmentLifecycleService;
pub use queue::AppointmentQueueService;

pub mod dispatch;
pub mod reminders;

pub use dispatch::{NotificationClient, ReminderDispatchService};
pub use reminders::ReminderSchedulerService;

pub mod clock;
pub mod identity;
pub mod reminders;
pub mod scheduler;
pub mod transport;

pub mod config;
pub mod daemon;
pub mod db;
pub mod domains;
pub mod error;
pub mod interfaces;
pub mod logging;
pub mod mentions;
pub mod reminders;
pub mod runtime_paths;
pub mod scheduler;
pub mod services;
pub mod timing;

pub use crate::config::Config;
pub use crate::domains::identity::PublicKey;
pub use crate::domains::message::{NostrEvent, OutboundNote};
pub use crate::domains::reminder::{NewReminder, Reminder};
pub use crate::error::RemindMeError;

pub type Result<T> = std::result::Result<T, RemindMeError>;

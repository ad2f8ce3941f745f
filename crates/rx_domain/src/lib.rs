pub mod alarm;
pub mod compose;
pub mod dose_time;
pub mod drug;
pub mod error;
pub mod events;
pub mod notifications;
pub mod receiver;
pub mod service;
pub mod settings;
pub mod text;

pub use crate::error::ReminderError;
pub use crate::receiver::{plan_invocation, InvocationContext, PlannedEffects, Trigger};
pub use crate::service::{DoseReminder, DoseReminderBuilder, ReminderContext};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::alarm::AlarmRequest;

/// Identifier every reminder notification is posted under.
pub const NOTIFICATION_ID: u32 = 1;

pub const LED_CYCLE_MS: u32 = 5000;
pub const LED_ON_MS: u32 = 500;
pub const LED_OFF_MS: u32 = LED_CYCLE_MS - LED_ON_MS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationIcon {
    Normal,
    Exclamation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Default,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionKind {
    MarkAllTaken,
    SnoozeRefillReminder,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationAction {
    pub kind: ActionKind,
    pub label: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Lights {
    Default,
    Custom { argb: u32, on_ms: u32, off_ms: u32 },
    Off,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sound {
    Silent,
    Default,
    Uri(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub title: String,
    pub text: String,
    pub ticker: String,
    /// Expanded HTML body, present when more than one line is shown.
    pub big_text: Option<String>,
    pub big_title: Option<String>,
    pub icon: NotificationIcon,
    pub priority: Priority,
    pub ongoing: bool,
    /// Date the drug list opens at when the notification is tapped.
    pub open_date: NaiveDate,
    pub action: Option<NotificationAction>,
    pub delete_action: Option<ActionKind>,
    pub only_alert_once: bool,
    pub lights: Lights,
    pub sound: Sound,
    pub vibrate: bool,
}

/// Platform notification service.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, id: u32, notification: &Notification);
    fn cancel(&self, id: u32);
}

/// Platform alarm service.
pub trait AlarmScheduler: Send + Sync {
    fn schedule_exact(&self, handle: u32, request: &AlarmRequest);
    fn cancel(&self, handle: u32);
}

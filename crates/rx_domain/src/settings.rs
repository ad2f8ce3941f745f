use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, NaiveTime};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dose_time::{DoseTimeSchedule, TimePeriod};
use crate::error::ReminderError;

/// Persisted preferences consumed by the reminder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReminderSettings {
    pub dose_times: Option<DoseTimeSchedule>,
    /// Minutes between repeated alarms; `-1` repeats every ten seconds.
    pub alarm_repeat: i32,
    pub quiet_hours_enabled: bool,
    pub quiet_hours: Option<String>,
    pub notification_sound: Option<String>,
    pub notification_light_color: String,
    pub use_vibrator: bool,
    pub use_safe_mode: bool,
    pub min_supply_days: u32,
    pub last_message_hash: Option<String>,
    pub next_refill_reminder_date: Option<NaiveDate>,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            dose_times: None,
            alarm_repeat: 0,
            quiet_hours_enabled: false,
            quiet_hours: None,
            notification_sound: None,
            notification_light_color: String::new(),
            use_vibrator: true,
            use_safe_mode: false,
            min_supply_days: 7,
            last_message_hash: None,
            next_refill_reminder_date: None,
        }
    }
}

/// A single mutation the reminder wants persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SettingsUpdate {
    LastMessageHash(String),
    NextRefillReminderDate(Option<NaiveDate>),
}

impl ReminderSettings {
    pub fn apply(&mut self, update: &SettingsUpdate) {
        match update {
            SettingsUpdate::LastMessageHash(hash) => {
                self.last_message_hash = Some(hash.clone());
            }
            SettingsUpdate::NextRefillReminderDate(date) => {
                self.next_refill_reminder_date = *date;
            }
        }
    }

    /// Whether `time` falls inside the configured quiet hours. An unparsable
    /// window is logged and treated as "not quiet".
    pub fn is_quiet_at(&self, time: NaiveTime) -> bool {
        if !self.quiet_hours_enabled {
            return false;
        }
        let Some(raw) = self.quiet_hours.as_deref() else {
            return false;
        };
        match raw.parse::<TimePeriod>() {
            Ok(period) => period.contains(time),
            Err(err) => {
                warn!(%err, "ignoring quiet hours");
                false
            }
        }
    }
}

pub trait SettingsStore: Send + Sync {
    fn load(&self) -> Result<ReminderSettings>;
    fn apply(&self, updates: &[SettingsUpdate]) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemorySettingsStore {
    settings: RwLock<ReminderSettings>,
}

impl MemorySettingsStore {
    pub fn new(settings: ReminderSettings) -> Self {
        Self {
            settings: RwLock::new(settings),
        }
    }

    pub fn snapshot(&self) -> ReminderSettings {
        self.settings.read().clone()
    }
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<ReminderSettings> {
        Ok(self.snapshot())
    }

    fn apply(&self, updates: &[SettingsUpdate]) -> Result<()> {
        let mut settings = self.settings.write();
        for update in updates {
            settings.apply(update);
        }
        Ok(())
    }
}

/// Settings kept in a JSON file, re-read on every access so edits made by
/// other writers are seen. A missing file loads as defaults.
#[derive(Debug)]
pub struct JsonSettingsStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonSettingsStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> Result<ReminderSettings, ReminderError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "settings file missing; using defaults");
            return Ok(ReminderSettings::default());
        }
        let raw = fs::read_to_string(&self.path).map_err(|source| ReminderError::SettingsIo {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ReminderError::SettingsDecode {
            path: self.path.clone(),
            source,
        })
    }

    fn write_file(&self, settings: &ReminderSettings) -> Result<(), ReminderError> {
        let encoded = serde_json::to_string_pretty(settings).map_err(|source| {
            ReminderError::SettingsEncode {
                path: self.path.clone(),
                source,
            }
        })?;
        fs::write(&self.path, encoded).map_err(|source| ReminderError::SettingsIo {
            path: self.path.clone(),
            source,
        })
    }
}

impl SettingsStore for JsonSettingsStore {
    fn load(&self) -> Result<ReminderSettings> {
        Ok(self.read_file()?)
    }

    fn apply(&self, updates: &[SettingsUpdate]) -> Result<()> {
        if updates.is_empty() {
            return Ok(());
        }
        let _guard = self.write_lock.lock();
        let mut settings = self.read_file()?;
        for update in updates {
            settings.apply(update);
        }
        self.write_file(&settings)?;
        Ok(())
    }
}

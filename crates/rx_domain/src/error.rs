use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReminderError {
    #[error("invalid time period `{0}` (expected HH:MM-HH:MM)")]
    InvalidTimePeriod(String),
    #[error("invalid light color `{0}`")]
    InvalidLightColor(String),
    #[error("unable to access settings at {path}")]
    SettingsIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to decode settings at {path}")]
    SettingsDecode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unable to encode settings for {path}")]
    SettingsEncode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

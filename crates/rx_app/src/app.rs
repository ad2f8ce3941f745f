use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use rx_domain::compose::Capabilities;
use rx_domain::dose_time::DoseTime;
use rx_domain::receiver::ReevaluateRequest;
use rx_domain::settings::JsonSettingsStore;
use rx_domain::{DoseReminder, PlannedEffects, Trigger};
use tracing::info;

use crate::host::{JsonDrugSource, LoggingAlarmScheduler, LoggingNotificationSink};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppConfig {
    pub(crate) settings_path: PathBuf,
    pub(crate) drugs_path: PathBuf,
    pub(crate) trigger: Trigger,
    pub(crate) action_buttons: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settings_path: PathBuf::from("rxdroid-settings.json"),
            drugs_path: PathBuf::from("rxdroid-drugs.json"),
            trigger: Trigger::Reevaluate(ReevaluateRequest::default()),
            action_buttons: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = lookup("RXDROID_SETTINGS") {
            config.settings_path = PathBuf::from(path);
        }
        if let Some(path) = lookup("RXDROID_DRUGS") {
            config.drugs_path = PathBuf::from(path);
        }
        if let Some(value) = lookup("RXDROID_ACTION_BUTTONS") {
            config.action_buttons = parse_flag(&value);
        }

        let flag = |key: &str| lookup(key).map(|value| parse_flag(&value)).unwrap_or(false);
        let action = lookup("RXDROID_ACTION").unwrap_or_else(|| "reevaluate".to_string());
        config.trigger = match action.trim().to_ascii_lowercase().as_str() {
            "mark-all-taken" => Trigger::MarkAllTaken,
            "snooze" => Trigger::SnoozeRefillReminder,
            "clock-changed" => Trigger::ClockChanged,
            "reevaluate" => {
                let slot = lookup("RXDROID_DOSE_TIME")
                    .map(|value| parse_slot(&value))
                    .transpose()?;
                let date = lookup("RXDROID_DATE")
                    .map(|value| {
                        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
                            .with_context(|| format!("invalid RXDROID_DATE `{value}`"))
                    })
                    .transpose()?;
                Trigger::Reevaluate(ReevaluateRequest {
                    date,
                    slot,
                    is_dose_time_end: flag("RXDROID_DOSE_TIME_END"),
                    is_repetition: flag("RXDROID_REPETITION"),
                    force_update: flag("RXDROID_FORCE_UPDATE"),
                    silent: flag("RXDROID_SILENT"),
                })
            }
            other => bail!("unknown RXDROID_ACTION `{other}`"),
        };
        Ok(config)
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn parse_slot(value: &str) -> Result<DoseTime> {
    let slot = match value.trim().to_ascii_lowercase().as_str() {
        "morning" => DoseTime::Morning,
        "noon" => DoseTime::Noon,
        "evening" => DoseTime::Evening,
        "night" => DoseTime::Night,
        other => bail!("unknown dose time `{other}`"),
    };
    Ok(slot)
}

pub fn run(config: &AppConfig) -> Result<PlannedEffects> {
    info!(
        settings = %config.settings_path.display(),
        drugs = %config.drugs_path.display(),
        trigger = ?config.trigger,
        "running reminder"
    );
    let reminder = DoseReminder::builder()
        .with_settings(Box::new(JsonSettingsStore::new(&config.settings_path)))
        .with_drugs(Box::new(JsonDrugSource::new(&config.drugs_path)))
        .with_alarm_scheduler(Box::new(LoggingAlarmScheduler))
        .with_notification_sink(Box::new(LoggingNotificationSink))
        .with_capabilities(Capabilities {
            action_buttons: config.action_buttons,
        })
        .build()?;
    Ok(reminder.handle(config.trigger))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        AppConfig::from_lookup(|key| env.get(key).cloned())
    }

    #[test]
    fn defaults_to_plain_reevaluate() {
        let config = config_from(&[]).expect("config");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn parses_alarm_style_trigger() {
        let config = config_from(&[
            ("RXDROID_DOSE_TIME", "Evening"),
            ("RXDROID_DATE", "2025-03-10"),
            ("RXDROID_DOSE_TIME_END", "true"),
            ("RXDROID_SILENT", "1"),
        ])
        .expect("config");
        assert_eq!(
            config.trigger,
            Trigger::Reevaluate(ReevaluateRequest {
                date: NaiveDate::from_ymd_opt(2025, 3, 10),
                slot: Some(DoseTime::Evening),
                is_dose_time_end: true,
                is_repetition: false,
                force_update: false,
                silent: true,
            })
        );
    }

    #[test]
    fn rejects_unknown_action_and_slot() {
        assert!(config_from(&[("RXDROID_ACTION", "explode")]).is_err());
        assert!(config_from(&[("RXDROID_DOSE_TIME", "brunch")]).is_err());
        assert_eq!(
            config_from(&[("RXDROID_ACTION", "snooze")]).expect("config").trigger,
            Trigger::SnoozeRefillReminder
        );
    }

    #[test]
    fn run_without_files_cancels_everything() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = AppConfig {
            settings_path: temp.path().join("settings.json"),
            drugs_path: temp.path().join("drugs.json"),
            ..AppConfig::default()
        };
        let effects = run(&config).expect("run");
        assert!(effects.events.is_empty());
        assert_eq!(
            effects.notification,
            rx_domain::compose::NotificationDecision::Cancel
        );
    }
}

//! Platform adapters for running the reminder outside of a phone.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use rx_domain::alarm::AlarmRequest;
use rx_domain::drug::{Drug, Intake};
use rx_domain::notifications::{AlarmScheduler, Notification, NotificationSink};
use rx_domain::service::DrugSource;
use tracing::{debug, info};

/// Drug list stored as a JSON array. A missing file is an empty list.
#[derive(Debug, Clone)]
pub struct JsonDrugSource {
    path: PathBuf,
}

impl JsonDrugSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl DrugSource for JsonDrugSource {
    fn load(&self) -> Result<Vec<Drug>> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "drug file missing; no drugs loaded");
            return Ok(Vec::new());
        }
        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("reading drugs from {}", self.path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("decoding drugs from {}", self.path.display()))
    }

    fn record_intakes(&self, intakes: &[Intake]) -> Result<()> {
        let mut drugs = self.load()?;
        for intake in intakes {
            let drug = drugs
                .iter_mut()
                .find(|drug| drug.id == intake.drug_id)
                .ok_or_else(|| anyhow!("unknown drug {}", intake.drug_id))?;
            drug.record_intake(intake.date, intake.slot);
        }
        let encoded = serde_json::to_string_pretty(&drugs)?;
        fs::write(&self.path, encoded)
            .with_context(|| format!("writing drugs to {}", self.path.display()))?;
        info!(count = intakes.len(), "recorded intakes");
        Ok(())
    }
}

/// Alarm service that only logs; the host has no wake-up facility.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAlarmScheduler;

impl AlarmScheduler for LoggingAlarmScheduler {
    fn schedule_exact(&self, handle: u32, request: &AlarmRequest) {
        info!(
            handle,
            trigger_at = %request.trigger_at,
            slot = %request.slot,
            date = %request.date,
            end = request.is_dose_time_end,
            repetition = request.is_repetition,
            "alarm scheduled"
        );
    }

    fn cancel(&self, handle: u32) {
        debug!(handle, "alarm cancelled");
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotificationSink;

impl NotificationSink for LoggingNotificationSink {
    fn notify(&self, id: u32, notification: &Notification) {
        info!(
            id,
            title = %notification.title,
            text = %notification.text,
            alert_once = notification.only_alert_once,
            sound = ?notification.sound,
            "notification posted"
        );
    }

    fn cancel(&self, id: u32) {
        info!(id, "notification cancelled");
    }
}

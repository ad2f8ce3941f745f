use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

use crate::dose_time::DoseTime;
use crate::drug::{self, Drug};
use crate::error::ReminderError;
use crate::notifications::{
    ActionKind, Lights, Notification, NotificationAction, NotificationIcon, Priority, Sound,
    LED_OFF_MS, LED_ON_MS,
};
use crate::settings::{ReminderSettings, SettingsUpdate};
use crate::text;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationMode {
    Normal,
    /// Alert even if the message did not change.
    ForceUpdate,
    /// Never play sound or vibrate. Lights are unaffected.
    ForceSilent,
}

impl NotificationMode {
    pub fn from_flags(force_update: bool, silent: bool) -> Self {
        if force_update {
            NotificationMode::ForceUpdate
        } else if silent {
            NotificationMode::ForceSilent
        } else {
            NotificationMode::Normal
        }
    }
}

/// What the host platform can render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Capabilities {
    /// Per-notification action buttons are supported.
    pub action_buttons: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            action_buttons: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ComposeRequest {
    pub date: NaiveDate,
    pub slot: Option<DoseTime>,
    pub slot_is_active: bool,
    pub mode: NotificationMode,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationDecision {
    Post(Box<Notification>),
    /// Nothing to show.
    Cancel,
    /// Only the refill reminder would be shown, and it is snoozed.
    Suppressed { until: NaiveDate },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub decision: NotificationDecision,
    pub settings_updates: Vec<SettingsUpdate>,
}

impl Composition {
    fn without_updates(decision: NotificationDecision) -> Self {
        Self {
            decision,
            settings_updates: Vec::new(),
        }
    }
}

pub fn message_hash(message: &str) -> String {
    let digest = Sha256::digest(message.as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}

/// Parses an RGB hex string (at most 24 bits, optional `#`) and forces full
/// alpha. `Ok(None)` means a colour of zero, which turns the light off.
pub fn parse_light_color(raw: &str) -> Result<Option<u32>, ReminderError> {
    let invalid = || ReminderError::InvalidLightColor(raw.to_string());
    let trimmed = raw.trim();
    let digits = trimmed.strip_prefix('#').unwrap_or(trimmed);
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(invalid());
    }
    let value = u32::from_str_radix(digits, 16).map_err(|_| invalid())?;
    if value > 0x00ff_ffff {
        return Err(invalid());
    }
    if value == 0 {
        return Ok(None);
    }
    Ok(Some(value | 0xff00_0000))
}

fn lights_for(color: &str) -> Lights {
    if color.is_empty() {
        return Lights::Default;
    }
    match parse_light_color(color) {
        Ok(Some(argb)) => Lights::Custom {
            argb,
            on_ms: LED_ON_MS,
            off_ms: LED_OFF_MS,
        },
        Ok(None) => Lights::Off,
        Err(err) => {
            error!(%err, "failed to parse light color; using default");
            Lights::Default
        }
    }
}

/// Decides whether to show, replace or cancel the reminder notification and
/// what it carries.
pub fn compose_notification(
    request: ComposeRequest,
    settings: &ReminderSettings,
    drugs: &[Drug],
    now: NaiveDateTime,
    capabilities: Capabilities,
) -> Composition {
    let ComposeRequest {
        date,
        slot,
        slot_is_active,
        mode,
    } = request;

    let low_supply: Vec<String> = drug::low_supply(drugs, settings.min_supply_days)
        .into_iter()
        .map(Drug::display_name)
        .collect();
    let missed_count = slot.map_or(0, |slot| drug::count_missed(drugs, date, slot));
    let due_count = match slot {
        Some(slot) if slot_is_active => drug::count_due(drugs, date, slot),
        _ => 0,
    };

    let mut parts = Vec::new();
    if due_count != 0 {
        parts.push(text::due_doses(due_count));
    }
    if missed_count != 0 {
        parts.push(text::missed_doses(missed_count));
    }
    let mut message = parts.join(", ");

    let doses_line = (!message.is_empty()).then(|| {
        format!("<b>{}</b> {}", text::TITLE_DOSES, text::escape_html(&message))
    });

    let low_supply_only = !low_supply.is_empty() && message.is_empty();
    let low_supply_line = (!low_supply.is_empty()).then(|| {
        let msg = text::low_supply(&low_supply);
        let line = format!("<b>{}</b> {}", text::TITLE_LOW_SUPPLIES, text::escape_html(&msg));
        if low_supply_only {
            message = msg;
        }
        line
    });

    if message.is_empty() {
        debug!("nothing to show; cancelling notification");
        return Composition::without_updates(NotificationDecision::Cancel);
    }

    let mut settings_updates = Vec::new();
    let today = now.date();

    if low_supply_only {
        debug!(
            next_refill_reminder_date = ?settings.next_refill_reminder_date,
            "showing refill reminder only"
        );
        match settings.next_refill_reminder_date {
            Some(until) if today < until => {
                debug!(%until, "refill reminder snoozed");
                return Composition::without_updates(NotificationDecision::Suppressed { until });
            }
            Some(_) => {
                debug!("refill reminder snooze expired; clearing");
                settings_updates.push(SettingsUpdate::NextRefillReminderDate(None));
            }
            None => {}
        }
    }

    let lines: Vec<String> = [low_supply_line, doses_line].into_iter().flatten().collect();
    let (big_title, big_text) = if lines.len() > 1 {
        (Some(text::APP_NAME.to_string()), Some(lines.join("\n<br/>\n")))
    } else {
        (None, None)
    };

    let mut ongoing = true;
    let mut action = None;
    let mut delete_action = None;
    if !low_supply_only && !settings.use_safe_mode {
        action = Some(NotificationAction {
            kind: ActionKind::MarkAllTaken,
            label: text::ACTION_TAKE_ALL.to_string(),
        });
    } else if low_supply_only {
        if capabilities.action_buttons {
            action = Some(NotificationAction {
                kind: ActionKind::SnoozeRefillReminder,
                label: text::ACTION_REMIND_TOMORROW.to_string(),
            });
        } else {
            // Ongoing notifications cannot be dismissed.
            delete_action = Some(ActionKind::SnoozeRefillReminder);
            ongoing = false;
        }
    }

    let hash = message_hash(&message);
    let unchanged = settings.last_message_hash.as_deref() == Some(hash.as_str());
    let only_alert_once = mode != NotificationMode::ForceUpdate && unchanged;
    if !only_alert_once {
        settings_updates.push(SettingsUpdate::LastMessageHash(hash));
    }

    // Repeated alarms must not keep sounding for low supplies alone.
    let mode = if low_supply_only {
        NotificationMode::ForceSilent
    } else {
        mode
    };

    let lights = lights_for(&settings.notification_light_color);

    let sound = if mode == NotificationMode::ForceSilent {
        Sound::Silent
    } else if settings.is_quiet_at(now.time()) {
        info!("currently within quiet hours; muting sound");
        Sound::Silent
    } else {
        match &settings.notification_sound {
            Some(uri) => Sound::Uri(uri.clone()),
            None => Sound::Default,
        }
    };

    let vibrate = mode != NotificationMode::ForceSilent && settings.use_vibrator;

    let notification = Notification {
        title: if low_supply_only {
            text::TITLE_LOW_SUPPLIES
        } else {
            text::TITLE_DOSES
        }
        .to_string(),
        text: message,
        ticker: text::TICKER.to_string(),
        big_text,
        big_title,
        icon: if low_supply.is_empty() {
            NotificationIcon::Normal
        } else {
            NotificationIcon::Exclamation
        },
        priority: if low_supply_only {
            Priority::Default
        } else {
            Priority::High
        },
        ongoing,
        open_date: date,
        action,
        delete_action,
        only_alert_once,
        lights,
        sound,
        vibrate,
    };

    Composition {
        decision: NotificationDecision::Post(Box::new(notification)),
        settings_updates,
    }
}

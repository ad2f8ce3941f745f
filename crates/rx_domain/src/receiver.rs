use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::alarm::{plan_next_alarm, AlarmPlan, RepeatInterval};
use crate::compose::{
    compose_notification, Capabilities, ComposeRequest, NotificationDecision, NotificationMode,
};
use crate::dose_time::{DoseTime, DoseTimeInfo};
use crate::drug::{mark_notified_taken, Drug, Intake};
use crate::events::DoseTimeEvent;
use crate::settings::{ReminderSettings, SettingsUpdate};

/// Flags carried by a generic re-evaluation, including fired alarms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReevaluateRequest {
    pub date: Option<NaiveDate>,
    pub slot: Option<DoseTime>,
    pub is_dose_time_end: bool,
    pub is_repetition: bool,
    pub force_update: bool,
    pub silent: bool,
}

impl ReevaluateRequest {
    /// Re-plans alarms and refreshes the notification without a dose-time event.
    pub fn reschedule(silent: bool, force_update: bool) -> Self {
        Self {
            silent,
            force_update,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    MarkAllTaken,
    SnoozeRefillReminder,
    /// System date, time or timezone changed.
    ClockChanged,
    Reevaluate(ReevaluateRequest),
}

/// Everything one invocation decides on.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub trigger: Trigger,
    /// Host clock at the moment of evaluation.
    pub now: NaiveDateTime,
    pub settings: ReminderSettings,
    pub drugs: Vec<Drug>,
    pub capabilities: Capabilities,
}

impl InvocationContext {
    pub fn new(
        trigger: Trigger,
        now: NaiveDateTime,
        settings: ReminderSettings,
        drugs: Vec<Drug>,
    ) -> Self {
        Self {
            trigger,
            now,
            settings,
            drugs,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Dose-time state at `now` under the configured schedule.
    pub fn dose_time_info(&self) -> DoseTimeInfo {
        match &self.settings.dose_times {
            Some(schedule) => DoseTimeInfo::compute(schedule, self.now),
            None => DoseTimeInfo::unconfigured(self.now),
        }
    }
}

/// The slot the notification reports on: the active one, else the next.
fn notification_target(
    info: &DoseTimeInfo,
    now: NaiveDateTime,
) -> (NaiveDate, Option<DoseTime>, bool) {
    match (info.active, info.next) {
        (Some((slot, date)), _) => (date, Some(slot), true),
        (None, Some((slot, date))) => (date, Some(slot), false),
        (None, None) => (now.date(), None, false),
    }
}

/// Side effects an invocation wants performed, in order: events, settings,
/// intakes, alarm, notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedEffects {
    pub events: Vec<DoseTimeEvent>,
    /// `None` leaves the pending alarm alone; otherwise it is cancelled and
    /// replaced by the plan's request, if any.
    pub alarm: Option<AlarmPlan>,
    pub notification: NotificationDecision,
    pub settings_updates: Vec<SettingsUpdate>,
    pub intakes: Vec<Intake>,
}

pub fn plan_invocation(ctx: &InvocationContext) -> PlannedEffects {
    let mut settings = ctx.settings.clone();
    let mut drugs = ctx.drugs.clone();
    let mut events = Vec::new();
    let mut settings_updates = Vec::new();
    let mut intakes = Vec::new();
    let mut alarm = None;
    let mut mode = NotificationMode::Normal;
    let info = ctx.dose_time_info();
    let (date, slot, slot_is_active) = notification_target(&info, ctx.now);

    let mut push_update = |settings: &mut ReminderSettings, update: SettingsUpdate| {
        settings.apply(&update);
        settings_updates.push(update);
    };

    let reevaluate = match ctx.trigger {
        Trigger::MarkAllTaken => {
            if let Some(slot) = slot {
                intakes = mark_notified_taken(&mut drugs, date, slot, slot_is_active);
            }
            info!(count = intakes.len(), "marking notified doses as taken");
            None
        }
        Trigger::SnoozeRefillReminder => {
            let tomorrow = ctx.now.date().succ_opt();
            info!(?tomorrow, "snoozing refill reminder");
            push_update(&mut settings, SettingsUpdate::NextRefillReminderDate(tomorrow));
            None
        }
        Trigger::ClockChanged => {
            debug!("clock changed; clearing refill reminder snooze");
            push_update(&mut settings, SettingsUpdate::NextRefillReminderDate(None));
            Some(ReevaluateRequest::reschedule(true, false))
        }
        Trigger::Reevaluate(request) => Some(request),
    };

    if let Some(request) = reevaluate {
        if let (Some(slot), false) = (request.slot, request.is_repetition) {
            let date = request.date.unwrap_or_else(|| ctx.now.date());
            events.push(if request.is_dose_time_end {
                DoseTimeEvent::End { date, slot }
            } else {
                DoseTimeEvent::Begin { date, slot }
            });
        }

        let force_update = request.is_repetition || request.force_update;
        mode = NotificationMode::from_flags(force_update, request.silent);
        alarm = Some(plan_next_alarm(
            settings.dose_times.as_ref(),
            &info,
            RepeatInterval::from_minutes(settings.alarm_repeat),
            ctx.now,
        ));
    }

    let composition = compose_notification(
        ComposeRequest {
            date,
            slot,
            slot_is_active,
            mode,
        },
        &settings,
        &drugs,
        ctx.now,
        ctx.capabilities,
    );
    settings_updates.extend(composition.settings_updates);

    PlannedEffects {
        events,
        alarm,
        notification: composition.decision,
        settings_updates,
        intakes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dose_time::tests::schedule;
    use crate::notifications::Sound;

    fn at(h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(h, m, 0)
            .unwrap()
    }

    fn settings() -> ReminderSettings {
        ReminderSettings {
            dose_times: Some(schedule()),
            ..ReminderSettings::default()
        }
    }

    fn drugs() -> Vec<Drug> {
        vec![Drug::new(1, "Aspirin").with_dose(DoseTime::Noon, 1.0)]
    }

    #[test]
    fn alarm_begin_emits_event_and_reschedules() {
        let request = ReevaluateRequest {
            date: Some(at(11, 0).date()),
            slot: Some(DoseTime::Noon),
            ..ReevaluateRequest::default()
        };
        let ctx = InvocationContext::new(
            Trigger::Reevaluate(request),
            at(11, 0),
            settings(),
            drugs(),
        );
        let effects = plan_invocation(&ctx);
        assert_eq!(
            effects.events,
            vec![DoseTimeEvent::Begin {
                date: at(11, 0).date(),
                slot: DoseTime::Noon
            }]
        );
        let alarm = effects.alarm.as_ref().and_then(AlarmPlan::request).expect("alarm");
        assert_eq!(alarm.trigger_at, at(14, 0));
        assert!(alarm.is_dose_time_end);
        assert!(matches!(effects.notification, NotificationDecision::Post(_)));
    }

    #[test]
    fn repetition_forces_alert_without_event() {
        let request = ReevaluateRequest {
            date: Some(at(11, 0).date()),
            slot: Some(DoseTime::Noon),
            is_repetition: true,
            ..ReevaluateRequest::default()
        };
        let mut settings = settings();
        settings.last_message_hash = Some(crate::compose::message_hash("1 due"));
        let ctx = InvocationContext::new(
            Trigger::Reevaluate(request),
            at(11, 30),
            settings,
            drugs(),
        );
        let effects = plan_invocation(&ctx);
        assert!(effects.events.is_empty());
        match &effects.notification {
            NotificationDecision::Post(notification) => {
                assert!(!notification.only_alert_once);
                assert_eq!(notification.sound, Sound::Default);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn mark_all_taken_clears_notification() {
        let ctx = InvocationContext::new(
            Trigger::MarkAllTaken,
            at(12, 0),
            settings(),
            drugs(),
        );
        let effects = plan_invocation(&ctx);
        assert_eq!(effects.intakes.len(), 1);
        assert!(effects.alarm.is_none());
        assert_eq!(effects.notification, NotificationDecision::Cancel);
    }

    #[test]
    fn snooze_suppresses_refill_reminder() {
        let mut zinc = Drug::new(1, "Zinc")
            .with_dose(DoseTime::Morning, 1.0)
            .with_supply(1.0, 30.0);
        zinc.record_intake(at(7, 0).date(), DoseTime::Morning);
        let drugs = vec![zinc];
        let ctx = InvocationContext::new(
            Trigger::SnoozeRefillReminder,
            at(12, 0),
            settings(),
            drugs,
        );
        let effects = plan_invocation(&ctx);
        let tomorrow = at(12, 0).date().succ_opt();
        assert_eq!(
            effects.settings_updates,
            vec![SettingsUpdate::NextRefillReminderDate(tomorrow)]
        );
        assert!(matches!(effects.notification, NotificationDecision::Suppressed { .. }));
    }

    #[test]
    fn clock_change_clears_snooze_and_reschedules_silently() {
        let mut settings = settings();
        settings.next_refill_reminder_date = at(0, 0).date().succ_opt();
        let ctx = InvocationContext::new(
            Trigger::ClockChanged,
            at(12, 0),
            settings,
            drugs(),
        );
        let effects = plan_invocation(&ctx);
        assert_eq!(
            effects.settings_updates.first(),
            Some(&SettingsUpdate::NextRefillReminderDate(None))
        );
        assert!(effects.alarm.is_some());
        match &effects.notification {
            NotificationDecision::Post(notification) => {
                assert_eq!(notification.sound, Sound::Silent)
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unconfigured_schedule_cancels_alarm_only() {
        let ctx = InvocationContext::new(
            Trigger::Reevaluate(ReevaluateRequest::reschedule(false, false)),
            at(12, 0),
            ReminderSettings::default(),
            drugs(),
        );
        let effects = plan_invocation(&ctx);
        assert_eq!(effects.alarm, Some(AlarmPlan::Unconfigured));
        assert_eq!(effects.notification, NotificationDecision::Cancel);
    }

    #[test]
    fn untaken_night_dose_stays_missed_after_its_slot() {
        let drugs = vec![Drug::new(3, "Melatonin").with_dose(DoseTime::Night, 1.0)];
        let text_at = |now: NaiveDateTime| {
            let ctx = InvocationContext::new(
                Trigger::Reevaluate(ReevaluateRequest::reschedule(false, false)),
                now,
                settings(),
                drugs.clone(),
            );
            match plan_invocation(&ctx).notification {
                NotificationDecision::Post(notification) => notification.text,
                other => panic!("unexpected {other:?}"),
            }
        };
        let next_day = at(0, 0).date().succ_opt().unwrap();
        assert_eq!(text_at(at(23, 0)), "1 due");
        assert_eq!(text_at(next_day.and_hms_opt(2, 0, 0).unwrap()), "1 missed");
        assert_eq!(text_at(next_day.and_hms_opt(12, 0, 0).unwrap()), "1 missed");

        let ctx = InvocationContext::new(
            Trigger::MarkAllTaken,
            next_day.and_hms_opt(2, 0, 0).unwrap(),
            settings(),
            drugs,
        );
        let effects = plan_invocation(&ctx);
        assert_eq!(
            effects.intakes,
            vec![Intake {
                drug_id: 3,
                date: at(0, 0).date(),
                slot: DoseTime::Night,
            }]
        );
        assert_eq!(effects.notification, NotificationDecision::Cancel);
    }
}

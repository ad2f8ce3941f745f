use std::fs;
use std::path::Path;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rx_domain::alarm::AlarmRequest;
use rx_domain::dose_time::{DoseTime, DoseTimeSchedule};
use rx_domain::drug::Drug;
use rx_domain::events::DoseTimeListener;
use rx_domain::notifications::{AlarmScheduler, Notification, NotificationSink, Sound};
use rx_domain::receiver::ReevaluateRequest;
use rx_domain::service::{FixedClock, MemoryDrugSource};
use rx_domain::settings::{JsonSettingsStore, ReminderSettings, SettingsStore};
use rx_domain::{DoseReminder, ReminderContext, Trigger};
use tempfile::tempdir;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Schedule(AlarmRequest),
    CancelAlarm,
    Notify(Box<Notification>),
    CancelNotification,
    Begin(NaiveDate, DoseTime),
    End(NaiveDate, DoseTime),
}

#[derive(Clone, Default)]
struct Recorder(Arc<Mutex<Vec<Call>>>);

impl Recorder {
    fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.lock())
    }
}

impl AlarmScheduler for Recorder {
    fn schedule_exact(&self, _handle: u32, request: &AlarmRequest) {
        self.0.lock().push(Call::Schedule(request.clone()));
    }

    fn cancel(&self, _handle: u32) {
        self.0.lock().push(Call::CancelAlarm);
    }
}

impl NotificationSink for Recorder {
    fn notify(&self, _id: u32, notification: &Notification) {
        self.0.lock().push(Call::Notify(Box::new(notification.clone())));
    }

    fn cancel(&self, _id: u32) {
        self.0.lock().push(Call::CancelNotification);
    }
}

impl DoseTimeListener for Recorder {
    fn on_dose_time_begin(&self, date: NaiveDate, slot: DoseTime) {
        self.0.lock().push(Call::Begin(date, slot));
    }

    fn on_dose_time_end(&self, date: NaiveDate, slot: DoseTime) {
        self.0.lock().push(Call::End(date, slot));
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date")
}

fn at(h: u32, m: u32, s: u32) -> NaiveDateTime {
    day().and_hms_opt(h, m, s).expect("valid time")
}

fn persisted(path: &Path) -> ReminderSettings {
    JsonSettingsStore::new(path).load().expect("load settings")
}

fn schedule() -> DoseTimeSchedule {
    DoseTimeSchedule {
        morning: "06:00-10:00".parse().expect("morning"),
        noon: "11:00-14:00".parse().expect("noon"),
        evening: "17:00-20:00".parse().expect("evening"),
        night: "21:00-01:00".parse().expect("night"),
    }
}

#[test]
fn dose_time_alarm_cycle_persists_settings() {
    let temp = tempdir().expect("tempdir");
    let settings_path = temp.path().join("settings.json");
    let settings = ReminderSettings {
        dose_times: Some(schedule()),
        alarm_repeat: 30,
        notification_light_color: "ff0000".into(),
        ..ReminderSettings::default()
    };
    fs::write(
        &settings_path,
        serde_json::to_string(&settings).expect("encode settings"),
    )
    .expect("write settings");

    let recorder = Recorder::default();
    let clock = Arc::new(FixedClock::new(at(11, 0, 1)));
    let drugs = Arc::new(MemoryDrugSource::new(vec![
        Drug::new(1, "Aspirin").with_dose(DoseTime::Noon, 1.0),
    ]));
    let context = ReminderContext::new();
    let listener = context.register_listener(Arc::new(recorder.clone()));

    let reminder = DoseReminder::builder()
        .with_context(context.clone())
        .with_settings(Box::new(JsonSettingsStore::new(&settings_path)))
        .with_drugs(Box::new(drugs.clone()))
        .with_alarm_scheduler(Box::new(recorder.clone()))
        .with_notification_sink(Box::new(recorder.clone()))
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("build reminder");

    // Noon begins.
    reminder.handle(Trigger::Reevaluate(ReevaluateRequest {
        date: Some(day()),
        slot: Some(DoseTime::Noon),
        ..ReevaluateRequest::default()
    }));
    let calls = recorder.take();
    assert_eq!(calls[0], Call::Begin(day(), DoseTime::Noon));
    assert_eq!(calls[1], Call::CancelAlarm);
    let Call::Schedule(repetition) = calls[2].clone() else {
        panic!("expected an alarm, got {:?}", calls[2]);
    };
    assert_eq!(repetition.trigger_at, at(11, 30, 0));
    assert!(repetition.is_repetition);
    let Call::Notify(first) = &calls[3] else {
        panic!("expected a notification, got {:?}", calls[3]);
    };
    assert!(!first.only_alert_once);

    assert!(persisted(&settings_path).last_message_hash.is_some());

    // Plain refresh with the same message only alerts once.
    reminder.reschedule(false, false);
    let calls = recorder.take();
    let Some(Call::Notify(refreshed)) = calls.last() else {
        panic!("expected a notification, got {calls:?}");
    };
    assert!(refreshed.only_alert_once);

    // The repetition fires and re-alerts without a dose-time event.
    clock.set(at(11, 30, 2));
    reminder.handle(Trigger::Reevaluate(repetition.into_reevaluation()));
    let calls = recorder.take();
    assert!(!calls
        .iter()
        .any(|call| matches!(call, Call::Begin(..) | Call::End(..))));
    let Some(Call::Notify(repeated)) = calls.last() else {
        panic!("expected a notification, got {calls:?}");
    };
    assert!(!repeated.only_alert_once);
    assert_eq!(repeated.sound, Sound::Default);
    assert!(calls.contains(&Call::Schedule(AlarmRequest {
        trigger_at: at(12, 0, 0),
        slot: DoseTime::Noon,
        date: day(),
        is_dose_time_end: true,
        silent: false,
        force_update: true,
        is_repetition: true,
    })));

    // Taking everything clears the notification and records the intake.
    reminder.handle(Trigger::MarkAllTaken);
    assert_eq!(recorder.take(), vec![Call::CancelNotification]);
    assert!(drugs.snapshot()[0].has_taken(day(), DoseTime::Noon));

    assert!(context.unregister_listener(listener));
    reminder.handle(Trigger::Reevaluate(ReevaluateRequest {
        date: Some(day()),
        slot: Some(DoseTime::Noon),
        is_dose_time_end: true,
        ..ReevaluateRequest::default()
    }));
    assert!(!recorder
        .take()
        .iter()
        .any(|call| matches!(call, Call::End(..))));
}

#[test]
fn missing_schedule_cancels_without_scheduling() {
    let temp = tempdir().expect("tempdir");
    let recorder = Recorder::default();
    let reminder = DoseReminder::builder()
        .with_settings(Box::new(JsonSettingsStore::new(
            temp.path().join("absent.json"),
        )))
        .with_drugs(Box::new(MemoryDrugSource::default()))
        .with_alarm_scheduler(Box::new(recorder.clone()))
        .with_notification_sink(Box::new(recorder.clone()))
        .with_clock(Box::new(FixedClock::new(at(9, 0, 0))))
        .build()
        .expect("build reminder");

    reminder.reschedule(false, false);
    assert_eq!(
        recorder.take(),
        vec![Call::CancelAlarm, Call::CancelNotification]
    );
}

#[test]
fn snoozed_refill_reminder_stays_hidden_until_tomorrow() {
    let temp = tempdir().expect("tempdir");
    let settings_path = temp.path().join("settings.json");
    let recorder = Recorder::default();
    let clock = Arc::new(FixedClock::new(at(15, 0, 0)));
    let reminder = DoseReminder::builder()
        .with_settings(Box::new(JsonSettingsStore::new(&settings_path)))
        .with_drugs(Box::new(MemoryDrugSource::new(vec![Drug::new(7, "Iron")
            .with_dose(DoseTime::Night, 1.0)
            .with_supply(3.0, 30.0)])))
        .with_alarm_scheduler(Box::new(recorder.clone()))
        .with_notification_sink(Box::new(recorder.clone()))
        .with_clock(Box::new(clock.clone()))
        .build()
        .expect("build reminder");

    reminder.reschedule(false, false);
    let calls = recorder.take();
    assert!(matches!(calls.last(), Some(Call::Notify(n)) if n.title == "Low supplies"));

    reminder.handle(Trigger::SnoozeRefillReminder);
    assert_eq!(recorder.take(), vec![Call::CancelNotification]);
    assert_eq!(
        persisted(&settings_path).next_refill_reminder_date,
        day().succ_opt()
    );

    clock.set(day().succ_opt().expect("tomorrow").and_hms_opt(8, 0, 0).expect("time"));
    reminder.reschedule(false, false);
    let calls = recorder.take();
    assert!(matches!(calls.last(), Some(Call::Notify(_))));
    assert_eq!(persisted(&settings_path).next_refill_reminder_date, None);
}

use chrono::{Duration, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::dose_time::{DoseTime, DoseTimeInfo, DoseTimeSchedule};
use crate::receiver::ReevaluateRequest;

/// Triggers at most this many milliseconds in the past are still scheduled.
pub const PAST_TRIGGER_TOLERANCE_MS: i64 = 5_000;

/// Handle reused for every wake-up so at most one is ever pending.
pub const ALARM_HANDLE: u32 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepeatInterval {
    Never,
    Every(Duration),
}

impl RepeatInterval {
    pub fn from_minutes(minutes: i32) -> Self {
        match minutes {
            -1 => RepeatInterval::Every(Duration::seconds(10)),
            m if m > 0 => RepeatInterval::Every(Duration::minutes(i64::from(m))),
            0 => RepeatInterval::Never,
            other => {
                warn!(minutes = other, "ignoring negative alarm repeat interval");
                RepeatInterval::Never
            }
        }
    }

    pub fn period(self) -> Option<Duration> {
        match self {
            RepeatInterval::Never => None,
            RepeatInterval::Every(period) => Some(period),
        }
    }
}

/// A single wake-up to register with the platform alarm service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlarmRequest {
    pub trigger_at: NaiveDateTime,
    pub slot: DoseTime,
    pub date: NaiveDate,
    pub is_dose_time_end: bool,
    pub silent: bool,
    pub force_update: bool,
    pub is_repetition: bool,
}

impl AlarmRequest {
    /// The re-evaluation this alarm performs once it fires.
    pub fn into_reevaluation(self) -> ReevaluateRequest {
        ReevaluateRequest {
            date: Some(self.date),
            slot: Some(self.slot),
            is_dose_time_end: self.is_dose_time_end,
            is_repetition: self.is_repetition,
            force_update: self.force_update,
            silent: self.silent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmPlan {
    /// No dose-time schedule configured; nothing is registered.
    Unconfigured,
    /// The computed trigger was too far in the past.
    Skipped {
        trigger_at: NaiveDateTime,
        lag_ms: i64,
    },
    Schedule(AlarmRequest),
}

impl AlarmPlan {
    pub fn request(&self) -> Option<&AlarmRequest> {
        match self {
            AlarmPlan::Schedule(request) => Some(request),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerCheck {
    OnTime,
    /// Late, but within [`PAST_TRIGGER_TOLERANCE_MS`].
    Late(Duration),
    Stale(Duration),
}

pub fn check_trigger(trigger_at: NaiveDateTime, now: NaiveDateTime) -> TriggerCheck {
    let lag = now - trigger_at;
    if lag <= Duration::zero() {
        TriggerCheck::OnTime
    } else if lag <= Duration::milliseconds(PAST_TRIGGER_TOLERANCE_MS) {
        TriggerCheck::Late(lag)
    } else {
        TriggerCheck::Stale(lag)
    }
}

/// Smallest `anchor + i * period` (i >= 0) that is not before `now`.
pub fn next_repetition(
    anchor: NaiveDateTime,
    period: Duration,
    now: NaiveDateTime,
) -> NaiveDateTime {
    let period_ms = period.num_milliseconds();
    if period_ms <= 0 {
        return anchor.max(now);
    }
    let elapsed_ms = (now - anchor).num_milliseconds();
    if elapsed_ms <= 0 {
        return anchor;
    }
    let steps = (elapsed_ms + period_ms - 1) / period_ms;
    anchor + Duration::milliseconds(steps * period_ms)
}

/// Plans the wake-up for the next dose-time boundary: the end of the active
/// slot, or the begin of the next one. With a repeat interval, a repetition
/// anchored at the active slot's begin replaces the boundary when it is
/// earlier.
pub fn plan_next_alarm(
    schedule: Option<&DoseTimeSchedule>,
    info: &DoseTimeInfo,
    repeat: RepeatInterval,
    now: NaiveDateTime,
) -> AlarmPlan {
    let Some(schedule) = schedule else {
        warn!("no dose-time settings available; not scheduling alarms");
        return AlarmPlan::Unconfigured;
    };

    let (slot, date, is_end) = match (info.active, info.next) {
        (Some((slot, date)), _) => (slot, date, true),
        (None, Some((slot, date))) => (slot, date, false),
        (None, None) => {
            warn!("dose-time info has neither an active nor a next slot");
            return AlarmPlan::Unconfigured;
        }
    };

    let offset = if is_end {
        schedule.until_end(info.current_time, slot, date)
    } else {
        schedule.until_begin(info.current_time, slot, date)
    };

    let mut request = AlarmRequest {
        trigger_at: info.current_time + offset,
        slot,
        date,
        is_dose_time_end: is_end,
        silent: false,
        force_update: false,
        is_repetition: false,
    };

    if let Some(period) = repeat.period() {
        request.force_update = true;
        if is_end {
            let anchor = schedule.begin_at(slot, date);
            let repeated = next_repetition(anchor, period, info.current_time);
            if repeated < request.trigger_at {
                request.trigger_at = repeated;
                request.is_repetition = true;
            }
        }
    }

    match check_trigger(request.trigger_at, now) {
        TriggerCheck::Stale(lag) => {
            warn!(
                trigger_at = %request.trigger_at,
                lag_ms = lag.num_milliseconds(),
                "alarm time is in the past; ignoring"
            );
            return AlarmPlan::Skipped {
                trigger_at: request.trigger_at,
                lag_ms: lag.num_milliseconds(),
            };
        }
        TriggerCheck::Late(lag) => {
            warn!(
                lag_ms = lag.num_milliseconds(),
                "alarm time is in the past by less than the tolerance"
            );
        }
        TriggerCheck::OnTime => {}
    }

    if request.is_repetition {
        info!(trigger_at = %request.trigger_at, "scheduling alarm repetition");
    } else {
        let boundary = if is_end { "end" } else { "begin" };
        info!(
            boundary,
            %slot,
            %date,
            trigger_at = %request.trigger_at,
            "scheduling dose-time alarm"
        );
    }
    info!(in_secs = (request.trigger_at - now).num_seconds(), "alarm will go off");

    AlarmPlan::Schedule(request)
}

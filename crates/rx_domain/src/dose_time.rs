use std::fmt;
use std::str::FromStr;

use chrono::{Duration, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::ReminderError;

/// The fixed set of daily periods during which a dose may be taken.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum DoseTime {
    Morning,
    Noon,
    Evening,
    Night,
}

impl DoseTime {
    pub const ALL: [DoseTime; 4] = [
        DoseTime::Morning,
        DoseTime::Noon,
        DoseTime::Evening,
        DoseTime::Night,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Slots that come before this one on the same date.
    pub fn earlier(self) -> impl Iterator<Item = DoseTime> {
        DoseTime::ALL.into_iter().take(self.index())
    }

    /// Slots that come after this one on the same date.
    pub fn later(self) -> impl Iterator<Item = DoseTime> {
        DoseTime::ALL.into_iter().skip(self.index() + 1)
    }
}

impl fmt::Display for DoseTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DoseTime::Morning => "morning",
            DoseTime::Noon => "noon",
            DoseTime::Evening => "evening",
            DoseTime::Night => "night",
        };
        f.write_str(name)
    }
}

/// A daily time-of-day window. A period whose end is not after its begin
/// wraps past midnight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TimePeriod {
    pub begin: NaiveTime,
    pub end: NaiveTime,
}

impl TimePeriod {
    pub fn new(begin: NaiveTime, end: NaiveTime) -> Self {
        Self { begin, end }
    }

    pub fn wraps_midnight(&self) -> bool {
        self.end <= self.begin
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.wraps_midnight() {
            time >= self.begin || time < self.end
        } else {
            time >= self.begin && time < self.end
        }
    }
}

impl FromStr for TimePeriod {
    type Err = ReminderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || ReminderError::InvalidTimePeriod(s.to_string());
        let (begin, end) = s.trim().split_once('-').ok_or_else(invalid)?;
        let begin = parse_time_segment(begin).ok_or_else(invalid)?;
        let end = parse_time_segment(end).ok_or_else(invalid)?;
        Ok(Self { begin, end })
    }
}

impl TryFrom<String> for TimePeriod {
    type Error = ReminderError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TimePeriod> for String {
    fn from(period: TimePeriod) -> Self {
        period.to_string()
    }
}

impl fmt::Display for TimePeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}-{}",
            self.begin.format("%H:%M"),
            self.end.format("%H:%M")
        )
    }
}

fn parse_time_segment(segment: &str) -> Option<NaiveTime> {
    let segment = segment.trim();
    NaiveTime::parse_from_str(segment, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(segment, "%H:%M:%S"))
        .ok()
}

/// Configured begin/end of every dose-time slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseTimeSchedule {
    pub morning: TimePeriod,
    pub noon: TimePeriod,
    pub evening: TimePeriod,
    pub night: TimePeriod,
}

impl DoseTimeSchedule {
    pub fn period(&self, slot: DoseTime) -> TimePeriod {
        match slot {
            DoseTime::Morning => self.morning,
            DoseTime::Noon => self.noon,
            DoseTime::Evening => self.evening,
            DoseTime::Night => self.night,
        }
    }

    pub fn begin_at(&self, slot: DoseTime, date: NaiveDate) -> NaiveDateTime {
        date.and_time(self.period(slot).begin)
    }

    pub fn end_at(&self, slot: DoseTime, date: NaiveDate) -> NaiveDateTime {
        let period = self.period(slot);
        let end = date.and_time(period.end);
        if period.wraps_midnight() {
            end + Duration::days(1)
        } else {
            end
        }
    }

    pub fn until_begin(&self, now: NaiveDateTime, slot: DoseTime, date: NaiveDate) -> Duration {
        self.begin_at(slot, date) - now
    }

    pub fn until_end(&self, now: NaiveDateTime, slot: DoseTime, date: NaiveDate) -> Duration {
        self.end_at(slot, date) - now
    }
}

/// Snapshot of where `current_time` falls relative to the dose-time schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DoseTimeInfo {
    pub current_time: NaiveDateTime,
    pub active: Option<(DoseTime, NaiveDate)>,
    pub next: Option<(DoseTime, NaiveDate)>,
}

impl DoseTimeInfo {
    pub fn unconfigured(current_time: NaiveDateTime) -> Self {
        Self {
            current_time,
            active: None,
            next: None,
        }
    }

    pub fn compute(schedule: &DoseTimeSchedule, now: NaiveDateTime) -> Self {
        let today = now.date();
        let mut active = None;
        let mut next: Option<(NaiveDateTime, DoseTime, NaiveDate)> = None;

        for slot in DoseTime::ALL {
            // A wrapping slot entered after midnight belongs to yesterday.
            for date in [today.pred_opt(), Some(today), today.succ_opt()]
                .into_iter()
                .flatten()
            {
                let begin = schedule.begin_at(slot, date);
                let end = schedule.end_at(slot, date);
                if active.is_none() && begin <= now && now < end {
                    active = Some((slot, date));
                }
                if begin > now && next.map_or(true, |(best, _, _)| begin < best) {
                    next = Some((begin, slot, date));
                }
            }
        }

        Self {
            current_time: now,
            active,
            next: next.map(|(_, slot, date)| (slot, date)),
        }
    }

    pub fn active_dose_time(&self) -> Option<DoseTime> {
        self.active.map(|(slot, _)| slot)
    }

    pub fn active_date(&self) -> Option<NaiveDate> {
        self.active.map(|(_, date)| date)
    }

    pub fn next_dose_time(&self) -> Option<DoseTime> {
        self.next.map(|(slot, _)| slot)
    }

    pub fn next_dose_time_date(&self) -> Option<NaiveDate> {
        self.next.map(|(_, date)| date)
    }
}

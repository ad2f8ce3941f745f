use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::dose_time::DoseTime;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Drug {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Dose amount per slot, indexed by [`DoseTime::index`].
    #[serde(default)]
    pub doses: [f64; 4],
    #[serde(default)]
    pub supply: Option<Supply>,
    #[serde(default)]
    pub intakes: Vec<IntakeRecord>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Supply {
    pub current: f64,
    pub refill_size: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct IntakeRecord {
    pub date: NaiveDate,
    pub slot: DoseTime,
}

/// An intake that should be persisted for `drug_id`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Intake {
    pub drug_id: u64,
    pub date: NaiveDate,
    pub slot: DoseTime,
}

fn default_active() -> bool {
    true
}

impl Drug {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            active: true,
            doses: [0.0; 4],
            supply: None,
            intakes: Vec::new(),
        }
    }

    pub fn with_dose(mut self, slot: DoseTime, amount: f64) -> Self {
        self.doses[slot.index()] = amount;
        self
    }

    pub fn with_supply(mut self, current: f64, refill_size: f64) -> Self {
        self.supply = Some(Supply {
            current,
            refill_size,
        });
        self
    }

    pub fn display_name(&self) -> String {
        let trimmed = self.name.trim();
        if trimmed.is_empty() {
            format!("#{}", self.id)
        } else {
            trimmed.to_string()
        }
    }

    pub fn dose(&self, slot: DoseTime) -> f64 {
        self.doses[slot.index()]
    }

    pub fn daily_dose(&self) -> f64 {
        self.doses.iter().copied().filter(|dose| *dose > 0.0).sum()
    }

    pub fn has_taken(&self, date: NaiveDate, slot: DoseTime) -> bool {
        self.intakes
            .iter()
            .any(|record| record.date == date && record.slot == slot)
    }

    fn has_untaken_dose(&self, date: NaiveDate, slot: DoseTime) -> bool {
        self.active && self.dose(slot) > 0.0 && !self.has_taken(date, slot)
    }

    pub fn is_due(&self, date: NaiveDate, slot: DoseTime) -> bool {
        self.has_untaken_dose(date, slot)
    }

    /// Whether a dose scheduled in the day before `slot` on `date` was never
    /// taken. See [`missed_window`].
    pub fn has_missed(&self, date: NaiveDate, slot: DoseTime) -> bool {
        missed_window(date, slot).any(|(day, earlier)| self.has_untaken_dose(day, earlier))
    }

    /// Supply lasts fewer than `min_supply_days` days at the current daily dose.
    pub fn has_low_supply(&self, min_supply_days: u32) -> bool {
        let Some(supply) = self.supply else {
            return false;
        };
        if !self.active || supply.refill_size <= 0.0 {
            return false;
        }
        let daily = self.daily_dose();
        if daily <= 0.0 {
            return false;
        }
        supply.current / daily < f64::from(min_supply_days)
    }

    pub fn record_intake(&mut self, date: NaiveDate, slot: DoseTime) -> Option<Intake> {
        if self.has_taken(date, slot) {
            return None;
        }
        self.intakes.push(IntakeRecord { date, slot });
        if let Some(supply) = self.supply.as_mut() {
            supply.current = (supply.current - self.doses[slot.index()]).max(0.0);
        }
        Some(Intake {
            drug_id: self.id,
            date,
            slot,
        })
    }
}

/// Slot occurrences in the day leading up to `slot` on `date`: the later
/// slots of the previous date, then the earlier slots of `date`.
pub fn missed_window(
    date: NaiveDate,
    slot: DoseTime,
) -> impl Iterator<Item = (NaiveDate, DoseTime)> {
    let previous = date
        .pred_opt()
        .into_iter()
        .flat_map(move |previous| slot.later().map(move |later| (previous, later)));
    previous.chain(slot.earlier().map(move |earlier| (date, earlier)))
}

pub fn count_due(drugs: &[Drug], date: NaiveDate, slot: DoseTime) -> usize {
    drugs.iter().filter(|drug| drug.is_due(date, slot)).count()
}

pub fn count_missed(drugs: &[Drug], date: NaiveDate, slot: DoseTime) -> usize {
    drugs.iter().filter(|drug| drug.has_missed(date, slot)).count()
}

pub fn low_supply<'a>(drugs: &'a [Drug], min_supply_days: u32) -> Vec<&'a Drug> {
    drugs
        .iter()
        .filter(|drug| drug.has_low_supply(min_supply_days))
        .collect()
}

/// Records every dose the notification for `date`/`slot` reported: missed
/// doses in the preceding day, plus the due dose when `slot` is active.
pub fn mark_notified_taken(
    drugs: &mut [Drug],
    date: NaiveDate,
    slot: DoseTime,
    slot_is_active: bool,
) -> Vec<Intake> {
    let mut intakes = Vec::new();
    for drug in drugs.iter_mut() {
        for (day, earlier) in missed_window(date, slot) {
            if drug.has_untaken_dose(day, earlier) {
                intakes.extend(drug.record_intake(day, earlier));
            }
        }
        if slot_is_active && drug.is_due(date, slot) {
            intakes.extend(drug.record_intake(date, slot));
        }
    }
    intakes
}

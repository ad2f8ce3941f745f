use std::sync::Arc;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDateTime};
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use crate::alarm::ALARM_HANDLE;
use crate::compose::{Capabilities, NotificationDecision};
use crate::drug::{Drug, Intake};
use crate::events::{DoseTimeEvents, DoseTimeListener, ListenerId};
use crate::notifications::{AlarmScheduler, NotificationSink, NOTIFICATION_ID};
use crate::receiver::{
    plan_invocation, InvocationContext, PlannedEffects, ReevaluateRequest, Trigger,
};
use crate::settings::{ReminderSettings, SettingsStore};

pub trait Clock: Send + Sync {
    fn now(&self) -> NaiveDateTime;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct FixedClock {
    now: RwLock<NaiveDateTime>,
}

impl FixedClock {
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        *self.now.write() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> NaiveDateTime {
        *self.now.read()
    }
}

impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> NaiveDateTime {
        (**self).now()
    }
}

/// Read access to the drug database plus intake recording.
pub trait DrugSource: Send + Sync {
    fn load(&self) -> Result<Vec<Drug>>;
    fn record_intakes(&self, intakes: &[Intake]) -> Result<()>;
}

impl<D: DrugSource + ?Sized> DrugSource for Arc<D> {
    fn load(&self) -> Result<Vec<Drug>> {
        (**self).load()
    }

    fn record_intakes(&self, intakes: &[Intake]) -> Result<()> {
        (**self).record_intakes(intakes)
    }
}

#[derive(Debug, Default)]
pub struct MemoryDrugSource {
    drugs: RwLock<Vec<Drug>>,
}

impl MemoryDrugSource {
    pub fn new(drugs: Vec<Drug>) -> Self {
        Self {
            drugs: RwLock::new(drugs),
        }
    }

    pub fn snapshot(&self) -> Vec<Drug> {
        self.drugs.read().clone()
    }
}

impl DrugSource for MemoryDrugSource {
    fn load(&self) -> Result<Vec<Drug>> {
        Ok(self.snapshot())
    }

    fn record_intakes(&self, intakes: &[Intake]) -> Result<()> {
        let mut drugs = self.drugs.write();
        for intake in intakes {
            let drug = drugs
                .iter_mut()
                .find(|drug| drug.id == intake.drug_id)
                .ok_or_else(|| anyhow!("unknown drug {}", intake.drug_id))?;
            drug.record_intake(intake.date, intake.slot);
        }
        Ok(())
    }
}

/// Process-wide state that outlives single invocations.
#[derive(Default)]
pub struct ReminderContext {
    events: DoseTimeEvents,
}

impl ReminderContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn events(&self) -> &DoseTimeEvents {
        &self.events
    }

    pub fn register_listener(&self, listener: Arc<dyn DoseTimeListener>) -> ListenerId {
        self.events.register(listener)
    }

    pub fn unregister_listener(&self, id: ListenerId) -> bool {
        self.events.unregister(id)
    }
}

pub struct DoseReminder {
    context: Arc<ReminderContext>,
    settings: Box<dyn SettingsStore>,
    drugs: Box<dyn DrugSource>,
    alarms: Box<dyn AlarmScheduler>,
    notifications: Box<dyn NotificationSink>,
    clock: Box<dyn Clock>,
    capabilities: Capabilities,
}

pub struct DoseReminderBuilder {
    context: Option<Arc<ReminderContext>>,
    settings: Option<Box<dyn SettingsStore>>,
    drugs: Option<Box<dyn DrugSource>>,
    alarms: Option<Box<dyn AlarmScheduler>>,
    notifications: Option<Box<dyn NotificationSink>>,
    clock: Option<Box<dyn Clock>>,
    capabilities: Capabilities,
}

impl Default for DoseReminderBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DoseReminderBuilder {
    pub fn new() -> Self {
        Self {
            context: None,
            settings: None,
            drugs: None,
            alarms: None,
            notifications: None,
            clock: None,
            capabilities: Capabilities::default(),
        }
    }

    pub fn with_context(mut self, context: Arc<ReminderContext>) -> Self {
        self.context = Some(context);
        self
    }

    pub fn with_settings(mut self, store: Box<dyn SettingsStore>) -> Self {
        self.settings = Some(store);
        self
    }

    pub fn with_drugs(mut self, source: Box<dyn DrugSource>) -> Self {
        self.drugs = Some(source);
        self
    }

    pub fn with_alarm_scheduler(mut self, alarms: Box<dyn AlarmScheduler>) -> Self {
        self.alarms = Some(alarms);
        self
    }

    pub fn with_notification_sink(mut self, sink: Box<dyn NotificationSink>) -> Self {
        self.notifications = Some(sink);
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn build(self) -> Result<DoseReminder> {
        Ok(DoseReminder {
            context: self.context.unwrap_or_else(ReminderContext::new),
            settings: self
                .settings
                .ok_or_else(|| anyhow!("a settings store is required"))?,
            drugs: self
                .drugs
                .ok_or_else(|| anyhow!("a drug source is required"))?,
            alarms: self
                .alarms
                .ok_or_else(|| anyhow!("an alarm scheduler is required"))?,
            notifications: self
                .notifications
                .ok_or_else(|| anyhow!("a notification sink is required"))?,
            clock: self.clock.unwrap_or_else(|| Box::new(SystemClock)),
            capabilities: self.capabilities,
        })
    }
}

impl DoseReminder {
    pub fn builder() -> DoseReminderBuilder {
        DoseReminderBuilder::new()
    }

    pub fn context(&self) -> &Arc<ReminderContext> {
        &self.context
    }

    /// Runs one invocation to completion and returns what it did.
    #[instrument(skip(self))]
    pub fn handle(&self, trigger: Trigger) -> PlannedEffects {
        let settings = self.settings.load().unwrap_or_else(|err| {
            warn!(%err, "unable to load settings; using defaults");
            ReminderSettings::default()
        });
        let drugs = self.drugs.load().unwrap_or_else(|err| {
            warn!(%err, "unable to load drugs");
            Vec::new()
        });

        let ctx = InvocationContext::new(trigger, self.clock.now(), settings, drugs)
            .with_capabilities(self.capabilities);
        let effects = plan_invocation(&ctx);
        self.apply(&effects);
        effects
    }

    pub fn reschedule(&self, silent: bool, force_update: bool) -> PlannedEffects {
        self.handle(Trigger::Reevaluate(ReevaluateRequest::reschedule(
            silent,
            force_update,
        )))
    }

    pub fn cancel_notification(&self) {
        self.notifications.cancel(NOTIFICATION_ID);
    }

    fn apply(&self, effects: &PlannedEffects) {
        for event in &effects.events {
            self.context.events.dispatch(*event);
        }

        if let Err(err) = self.settings.apply(&effects.settings_updates) {
            warn!(%err, "unable to persist settings");
        }

        if !effects.intakes.is_empty() {
            if let Err(err) = self.drugs.record_intakes(&effects.intakes) {
                warn!(%err, "unable to record intakes");
            }
        }

        if let Some(plan) = &effects.alarm {
            self.alarms.cancel(ALARM_HANDLE);
            if let Some(request) = plan.request() {
                self.alarms.schedule_exact(ALARM_HANDLE, request);
            }
        }

        match &effects.notification {
            NotificationDecision::Post(notification) => {
                self.notifications.notify(NOTIFICATION_ID, notification);
            }
            NotificationDecision::Cancel | NotificationDecision::Suppressed { .. } => {
                info!("cancelling reminder notification");
                self.notifications.cancel(NOTIFICATION_ID);
            }
        }
    }
}

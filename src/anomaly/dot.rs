//! Damage-over-time effects spawned by anomaly activations.
//!
//! A dot carries its own application cooldown and duration, distinct
//! from the bar that spawned it. Exit is either a fixed duration or a
//! custom policy evaluated each tick.

use std::fmt;

use tracing::debug;

use crate::data::Element;

/// Context handed to custom exit policies each lifecycle tick.
#[derive(Debug, Clone, Copy)]
pub struct DotCtx {
    pub tick: u64,
    /// Whether any anomaly status is currently active on the target.
    pub any_anomaly_active: bool,
}

/// Custom dot exit policy.
pub trait DotExit: Send + Sync {
    fn should_exit(&self, dot: &Dot, ctx: &DotCtx) -> bool;
}

/// Keeps the dot alive for as long as any anomaly status remains active
/// on the target, regardless of the dot's nominal duration.
pub struct PersistWhileAnomalous;

impl DotExit for PersistWhileAnomalous {
    fn should_exit(&self, _dot: &Dot, ctx: &DotCtx) -> bool {
        !ctx.any_anomaly_active
    }
}

/// Static shape of a dot effect.
#[derive(Debug, Clone)]
pub struct DotFeature {
    pub index: String,
    pub name: String,
    pub element: Element,
    /// Minimum ticks between damage applications.
    pub update_cd: u64,
    pub duration: u64,
    /// Hard cap on applications over the dot's lifetime.
    pub max_effect_times: u32,
    /// Damage ratio delivered per application.
    pub dmg_ratio: f64,
}

/// Mutable lifecycle state.
#[derive(Debug, Clone, Default)]
pub struct DotDynamic {
    pub active: bool,
    pub start_tick: u64,
    pub end_tick: u64,
    pub last_effect_tick: u64,
    pub effect_times: u32,
}

pub struct Dot {
    pub ft: DotFeature,
    pub dy: DotDynamic,
    pub exit: Option<Box<dyn DotExit>>,
    /// Attribution array snapshotted from the bar at activation.
    pub source_ratio: Vec<f64>,
}

impl fmt::Debug for Dot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dot")
            .field("ft", &self.ft)
            .field("dy", &self.dy)
            .field("custom_exit", &self.exit.is_some())
            .field("source_ratio", &self.source_ratio)
            .finish()
    }
}

impl Dot {
    pub fn new(ft: DotFeature) -> Self {
        Self {
            ft,
            dy: DotDynamic::default(),
            exit: None,
            source_ratio: Vec::new(),
        }
    }

    pub fn with_exit(mut self, exit: Box<dyn DotExit>) -> Self {
        self.exit = Some(exit);
        self
    }

    /// Burning: periodic fire damage.
    pub fn ignite() -> Self {
        Self::new(DotFeature {
            index: "ignite".into(),
            name: "Ignite".into(),
            element: Element::Fire,
            update_cd: 30,
            duration: 600,
            max_effect_times: 20,
            dmg_ratio: 0.5,
        })
    }

    /// Frozen: a single shatter application; duration stretches with the
    /// target's freeze resistance.
    pub fn freeze(freeze_resistance: f64) -> Self {
        let duration = (240.0 * (1.0 + freeze_resistance)).max(0.0) as u64;
        Self::new(DotFeature {
            index: "freeze".into(),
            name: "Freeze".into(),
            element: Element::Ice,
            update_cd: 0,
            duration,
            max_effect_times: 1,
            dmg_ratio: 5.0,
        })
    }

    pub fn start(&mut self, tick: u64, source_ratio: Vec<f64>) {
        self.dy.active = true;
        self.dy.start_tick = tick;
        self.dy.end_tick = tick + self.ft.duration;
        // First application is eligible immediately.
        self.dy.last_effect_tick = tick.saturating_sub(self.ft.update_cd);
        self.dy.effect_times = 0;
        self.source_ratio = source_ratio;
        debug!(index = %self.ft.index, tick, end = self.dy.end_tick, "dot started");
    }

    /// Whether a damage application is due this tick. Ticking and damage
    /// application are separate: a dot past its application cap stays
    /// active until its exit condition fires.
    pub fn is_due(&self, tick: u64) -> bool {
        self.dy.active
            && self.dy.effect_times < self.ft.max_effect_times
            && tick.saturating_sub(self.dy.last_effect_tick) >= self.ft.update_cd
    }

    pub fn apply(&mut self, tick: u64) {
        self.dy.last_effect_tick = tick;
        self.dy.effect_times += 1;
    }

    /// Exit check: the custom policy wins when present, otherwise the
    /// dot ends once its nominal duration has elapsed.
    pub fn should_end(&self, ctx: &DotCtx) -> bool {
        if !self.dy.active {
            return false;
        }
        match &self.exit {
            Some(exit) => exit.should_exit(self, ctx),
            None => ctx.tick >= self.dy.end_tick,
        }
    }

    pub fn end(&mut self, tick: u64) {
        self.dy.active = false;
        debug!(index = %self.ft.index, tick, applications = self.dy.effect_times, "dot ended");
    }
}

//! Elemental buildup bars.
//!
//! Each target holds one bar per element. Hits feed buildup snapshots
//! into the bar; once buildup crosses the threshold and the internal
//! cooldown allows it, the bar activates a status effect, weight-averages
//! its pending snapshots into a damage-attribution array, and resets.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::data::Element;

/// Explicit subtype tag. Disorder variants are produced when a second
/// anomaly lands while another is active, never inferred from type
/// identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    Standard,
    Disorder,
    PolarityDisorder,
    Abloom,
}

/// One pending buildup snapshot awaiting settlement.
#[derive(Debug, Clone)]
pub struct PendingSnapshot {
    pub element: Element,
    pub buildup: f64,
    pub source_ratio: Vec<f64>,
}

/// Base internal cooldown between activations of the same bar.
pub const ANOMALY_BASE_CD: u64 = 180;

#[derive(Debug)]
pub struct AnomalyBar {
    pub element: Element,
    pub kind: AnomalyKind,
    pub buildup: f64,
    pub max_anomaly: f64,
    pending: Vec<PendingSnapshot>,
    pub cd: u64,
    pub last_active: u64,
    pub ready: bool,
    pub active: bool,
    pub anomaly_times: u32,
    pub basic_max_duration: u64,
    pub max_duration: u64,
    /// Fresh id per activation.
    pub activation_id: Option<Uuid>,
    pub activated_by: Option<String>,
    /// Attribution array from the last settlement.
    pub settled_ratio: Vec<f64>,
}

impl AnomalyBar {
    pub fn new(element: Element, max_anomaly: f64, basic_max_duration: u64) -> Self {
        Self {
            element,
            kind: AnomalyKind::Standard,
            buildup: 0.0,
            max_anomaly,
            pending: Vec::new(),
            cd: ANOMALY_BASE_CD,
            last_active: 0,
            ready: true,
            active: false,
            anomaly_times: 0,
            basic_max_duration,
            max_duration: basic_max_duration,
            activation_id: None,
            activated_by: None,
            settled_ratio: Vec::new(),
        }
    }

    pub fn is_full(&self) -> bool {
        self.buildup >= self.max_anomaly
    }

    pub fn buildup_pct(&self) -> f64 {
        if self.is_full() {
            return 1.0;
        }
        self.buildup / self.max_anomaly
    }

    /// Add one hit snapshot. Buildup is monotonically non-decreasing
    /// within a charge cycle; only effective hits join the pending box
    /// that attribution averaging is computed over.
    pub fn accumulate(&mut self, buildup: f64, source_ratio: &[f64], effective: bool) {
        let buildup = buildup.max(0.0);
        self.buildup += buildup;
        if effective && buildup > 0.0 {
            self.pending.push(PendingSnapshot {
                element: self.element,
                buildup,
                source_ratio: source_ratio.to_vec(),
            });
        }
    }

    /// Re-open the internal cooldown gate when enough ticks have passed.
    pub fn ready_judge(&mut self, tick: u64) {
        if tick.saturating_sub(self.last_active) >= self.cd {
            self.ready = true;
        }
    }

    pub fn can_activate(&self) -> bool {
        self.is_full() && self.ready
    }

    /// Weight-average the pending box into the attribution array:
    /// `sum(ratio_i * buildup_i) / sum(buildup_i)`, then clear pending
    /// and reset buildup for the next charge cycle.
    pub fn settle(&mut self) -> Vec<f64> {
        let width = self
            .pending
            .iter()
            .map(|s| s.source_ratio.len())
            .max()
            .unwrap_or(0);
        let mut total = vec![0.0; width];
        let mut effective_buildup = 0.0;
        for snapshot in self.pending.drain(..) {
            for (slot, value) in snapshot.source_ratio.iter().enumerate() {
                total[slot] += value * snapshot.buildup;
            }
            effective_buildup += snapshot.buildup;
        }
        if effective_buildup > 0.0 {
            for value in &mut total {
                *value /= effective_buildup;
            }
        }
        self.buildup = 0.0;
        self.settled_ratio = total.clone();
        total
    }

    /// Activation bookkeeping. `duration_pct`/`duration_flat` come from
    /// the active duration-modifying debuffs, recomputed by the caller at
    /// every (re)activation.
    pub fn activate(&mut self, tick: u64, skill_tag: &str, duration_pct: f64, duration_flat: f64) {
        self.ready = false;
        self.anomaly_times += 1;
        self.last_active = tick;
        self.active = true;
        self.activated_by = Some(skill_tag.to_string());
        self.activation_id = Some(Uuid::new_v4());
        let duration = self.basic_max_duration as f64 * (1.0 + duration_pct) + duration_flat;
        self.max_duration = duration.max(0.0) as u64;
        debug!(
            element = %self.element,
            anomaly = self.element.anomaly_name(),
            tick,
            by = skill_tag,
            duration = self.max_duration,
            "anomaly activated"
        );
    }

    /// Expire the active status once its duration has run out. Returns
    /// true when the bar deactivated on this call.
    pub fn check(&mut self, tick: u64) -> bool {
        if self.active && self.last_active + self.max_duration < tick {
            self.active = false;
            debug!(element = %self.element, tick, "anomaly expired");
            return true;
        }
        false
    }

    pub fn remaining(&self, tick: u64) -> u64 {
        if !self.active {
            return 0;
        }
        (self.last_active + self.max_duration).saturating_sub(tick)
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar() -> AnomalyBar {
        AnomalyBar::new(Element::Fire, 100.0, 600)
    }

    #[test]
    fn fills_exactly_once_at_threshold() {
        let mut bar = bar();
        let mut transitions = 0;
        let mut was_full = bar.is_full();
        for amount in [40.0, 40.0, 30.0] {
            bar.accumulate(amount, &[1.0, 0.0, 0.0], true);
            if bar.is_full() && !was_full {
                transitions += 1;
            }
            was_full = bar.is_full();
        }
        assert_eq!(transitions, 1);
        assert!((bar.buildup - 110.0).abs() < 1e-12);
        assert!(bar.is_full());
    }

    #[test]
    fn settle_weight_averages_and_resets() {
        let mut bar = bar();
        bar.accumulate(60.0, &[1.0, 0.0, 0.0], true);
        bar.accumulate(40.0, &[0.0, 1.0, 0.0], true);
        bar.accumulate(20.0, &[0.0, 0.0, 1.0], false); // ineffective: buildup only

        assert!((bar.buildup - 120.0).abs() < 1e-12);
        let ratio = bar.settle();
        assert!((ratio[0] - 0.6).abs() < 1e-12);
        assert!((ratio[1] - 0.4).abs() < 1e-12);
        assert!((ratio[2] - 0.0).abs() < 1e-12);
        assert_eq!(bar.buildup, 0.0);
        assert_eq!(bar.pending_len(), 0);
    }

    #[test]
    fn buildup_is_monotonic_between_settlements() {
        let mut bar = bar();
        let mut last = bar.buildup;
        for _ in 0..10 {
            bar.accumulate(7.0, &[1.0], true);
            assert!(bar.buildup >= last);
            last = bar.buildup;
        }
        bar.accumulate(-5.0, &[1.0], true); // clamped, still monotonic
        assert!(bar.buildup >= last);
        bar.settle();
        assert_eq!(bar.buildup, 0.0);
    }

    #[test]
    fn cooldown_gates_reactivation() {
        let mut bar = bar();
        bar.accumulate(120.0, &[1.0], true);
        assert!(bar.can_activate());
        bar.settle();
        bar.activate(100, "1211_E_EX", 0.0, 0.0);
        assert!(!bar.ready);

        bar.accumulate(120.0, &[1.0], true);
        bar.ready_judge(100 + ANOMALY_BASE_CD - 1);
        assert!(!bar.can_activate());
        bar.ready_judge(100 + ANOMALY_BASE_CD);
        assert!(bar.can_activate());
    }

    #[test]
    fn duration_recomputes_from_buff_modifiers_and_floors_at_zero() {
        let mut bar = bar();
        bar.activate(0, "x", 0.5, 60.0);
        assert_eq!(bar.max_duration, 960);

        let mut bar = AnomalyBar::new(Element::Ice, 100.0, 100);
        bar.activate(0, "x", -2.0, 0.0);
        assert_eq!(bar.max_duration, 0);
    }

    #[test]
    fn active_status_expires_after_duration() {
        let mut bar = bar();
        bar.activate(100, "x", 0.0, 0.0);
        assert!(!bar.check(700));
        assert!(bar.active);
        assert!(bar.check(701));
        assert!(!bar.active);
        assert!(!bar.check(702));
    }
}

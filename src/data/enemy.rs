//! Enemy reference records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::data::element::Element;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnemyRecord {
    pub index: u32,
    pub name: String,
    #[serde(default = "default_anomaly_max")]
    pub base_anomaly_max: f64,
    /// Per-element overrides of the buildup threshold.
    #[serde(default)]
    pub anomaly_max: BTreeMap<Element, f64>,
    #[serde(default = "default_stun_max")]
    pub stun_max: f64,
    /// Ticks the enemy stays stunned once the gauge fills.
    #[serde(default = "default_stun_duration")]
    pub stun_duration: u32,
    /// Scales the freeze dot duration; 0.0 means the baseline 240 ticks.
    #[serde(default)]
    pub freeze_resistance: f64,
    #[serde(default)]
    pub defense: f64,
}

fn default_anomaly_max() -> f64 {
    3000.0
}

fn default_stun_max() -> f64 {
    600.0
}

fn default_stun_duration() -> u32 {
    600
}

impl EnemyRecord {
    /// Buildup threshold for one element, scaled by the roster's
    /// difficulty adjustment.
    pub fn anomaly_max_for(&self, element: Element, adjustment: f64) -> f64 {
        let base = self
            .anomaly_max
            .get(&element)
            .copied()
            .unwrap_or(self.base_anomaly_max);
        (base * adjustment).max(1.0)
    }
}

//! Character reference records and per-run dynamic state.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharacterRecord {
    pub cid: u32,
    pub name: String,
    pub atk: f64,
    #[serde(default)]
    pub crit_chance: f64,
    #[serde(default)]
    pub crit_damage: f64,
    /// Scales elemental buildup contributed by this character's hits.
    #[serde(default = "default_mastery")]
    pub anomaly_mastery: f64,
    /// Passive resource regeneration per tick.
    #[serde(default)]
    pub energy_regen: f64,
    #[serde(default = "default_energy_max")]
    pub energy_max: f64,
}

fn default_mastery() -> f64 {
    100.0
}

fn default_energy_max() -> f64 {
    120.0
}

/// Mutable per-run character state. Fresh per simulation; never shared
/// across runs.
#[derive(Debug, Clone)]
pub struct CharacterState {
    pub record: CharacterRecord,
    pub energy: f64,
    pub on_field: bool,
}

impl CharacterState {
    pub fn new(record: CharacterRecord) -> Self {
        Self {
            record,
            energy: 0.0,
            on_field: false,
        }
    }

    pub fn cid(&self) -> u32 {
        self.record.cid
    }

    pub fn gain_energy(&mut self, amount: f64) {
        self.energy = (self.energy + amount).clamp(0.0, self.record.energy_max);
    }

    pub fn regen_tick(&mut self) {
        self.gain_energy(self.record.energy_regen);
    }
}

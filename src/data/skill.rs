//! Skill reference records. A skill tag is `<cid>_<kind>_<n>`, e.g.
//! `1211_NA_1` for the first normal-attack stage of character 1211.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::data::element::Element;

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillRecord {
    pub tag: String,
    pub cid: u32,
    pub element: Element,
    /// Ticks between the action being scheduled and its effects starting
    /// (animation / cast lead time).
    #[serde(default)]
    pub lead_ticks: u32,
    /// Ticks from start to end of the execution window.
    pub duration_ticks: u32,
    /// Hit timings as offsets from the start tick. Empty means one hit at
    /// the final tick of the window.
    #[serde(default)]
    pub hit_offsets: Vec<u32>,
    /// Damage ratio applied to the owner's attack, split evenly per hit.
    #[serde(default)]
    pub dmg_ratio: f64,
    #[serde(default)]
    pub buildup_per_hit: f64,
    #[serde(default)]
    pub stun_per_hit: f64,
    /// Free-form labels consulted by buffs, conditions and stacks
    /// (e.g. `additional_damage`, `heavy_attack`).
    #[serde(default)]
    pub labels: BTreeSet<String>,
    /// False for reactive/incidental executions that should not count as
    /// the player's own action.
    #[serde(default = "default_true")]
    pub active_generation: bool,
    /// Whether this skill's buildup participates in attribution averaging.
    #[serde(default = "default_true")]
    pub effective_buildup: bool,
    /// Coarse skill class used by buff applicability filters
    /// (1 = basic, 2 = special, 5 = ultimate, 6 = chain).
    #[serde(default)]
    pub trigger_level: u8,
    /// Resource gained by the owner per hit.
    #[serde(default)]
    pub energy_gain: f64,
}

impl SkillRecord {
    /// Resolved hit offsets: explicit list, or a single hit at window end.
    pub fn hits(&self) -> Vec<u32> {
        if self.hit_offsets.is_empty() {
            vec![self.duration_ticks]
        } else {
            self.hit_offsets.clone()
        }
    }

    pub fn hit_count(&self) -> usize {
        self.hits().len()
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }

    pub fn dmg_ratio_per_hit(&self) -> f64 {
        let hits = self.hit_count().max(1);
        self.dmg_ratio / hits as f64
    }
}

/// Parse the owning CID out of a skill tag. Tags start with the numeric
/// character id followed by `_`.
pub fn cid_from_tag(tag: &str) -> Option<u32> {
    tag.split('_').next()?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SkillRecord {
        SkillRecord {
            tag: "1211_NA_1".to_string(),
            cid: 1211,
            element: Element::Electric,
            lead_ticks: 4,
            duration_ticks: 30,
            hit_offsets: vec![10, 20, 30],
            dmg_ratio: 1.2,
            buildup_per_hit: 12.0,
            stun_per_hit: 3.0,
            labels: BTreeSet::new(),
            active_generation: true,
            effective_buildup: true,
            trigger_level: 1,
            energy_gain: 1.5,
        }
    }

    #[test]
    fn explicit_hit_offsets_win_over_default() {
        let skill = sample();
        assert_eq!(skill.hits(), vec![10, 20, 30]);

        let mut single = sample();
        single.hit_offsets.clear();
        assert_eq!(single.hits(), vec![30]);
    }

    #[test]
    fn damage_ratio_splits_evenly_across_hits() {
        let skill = sample();
        assert!((skill.dmg_ratio_per_hit() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn cid_parses_from_tag() {
        assert_eq!(cid_from_tag("1211_NA_1"), Some(1211));
        assert_eq!(cid_from_tag("garbage"), None);
    }
}

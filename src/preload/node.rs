//! Skill execution nodes and per-hit snapshots.

use std::collections::BTreeSet;

use crate::data::{Element, SkillRecord};

/// One time-bounded execution of a skill by a character. Owned by the
/// preload timeline; stacks keep their own clones of resolved nodes.
#[derive(Debug, Clone)]
pub struct SkillNode {
    pub skill: SkillRecord,
    pub cid: u32,
    /// Tick the action was scheduled.
    pub preload_tick: u64,
    /// Tick effects begin (preload + lead time).
    pub start_tick: u64,
    pub end_tick: u64,
    /// Labels copied from the skill record plus run-time additions.
    pub labels: BTreeSet<String>,
    /// Override flags set by strategies or special states.
    pub forced_trigger: bool,
    pub element_override: Option<Element>,
    /// True for player-initiated actions, false for reactive follow-ups.
    pub active_generation: bool,
}

impl SkillNode {
    pub fn new(skill: SkillRecord, preload_tick: u64) -> Self {
        let start_tick = preload_tick + u64::from(skill.lead_ticks);
        let end_tick = start_tick + u64::from(skill.duration_ticks);
        let labels = skill.labels.clone();
        let cid = skill.cid;
        let active_generation = skill.active_generation;
        Self {
            skill,
            cid,
            preload_tick,
            start_tick,
            end_tick,
            labels,
            forced_trigger: false,
            element_override: None,
            active_generation,
        }
    }

    pub fn tag(&self) -> &str {
        &self.skill.tag
    }

    pub fn element(&self) -> Element {
        self.element_override.unwrap_or(self.skill.element)
    }

    pub fn is_active(&self, tick: u64) -> bool {
        self.start_tick <= tick && tick <= self.end_tick
    }

    pub fn is_expired(&self, tick: u64) -> bool {
        tick > self.end_tick
    }

    /// Whether one of the node's hits lands exactly on this tick.
    pub fn is_hit_now(&self, tick: u64) -> bool {
        if tick < self.start_tick {
            return false;
        }
        let offset = tick - self.start_tick;
        self.skill
            .hits()
            .iter()
            .any(|&h| u64::from(h) == offset)
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains(label)
    }
}

/// Immutable per-hit snapshot handed to the enemy side. Consumed
/// immediately; retained only inside an anomaly bar's pending box.
#[derive(Debug, Clone)]
pub struct SingleHit {
    pub skill_tag: String,
    pub cid: u32,
    pub element: Element,
    pub buildup: f64,
    /// Damage-attribution weights, one slot per roster member.
    pub source_ratio: Vec<f64>,
    pub stun: f64,
    pub dmg_expect: f64,
    pub dmg_crit: f64,
    pub hit_index: usize,
    pub hit_count: usize,
    /// Whether the action was player-initiated.
    pub proactive: bool,
    /// Last hit of a heavy-attack skill.
    pub heavy_hit: bool,
    /// Whether this snapshot participates in attribution averaging.
    pub effective_buildup: bool,
    pub trigger_level: u8,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataRepo;

    fn node() -> SkillNode {
        let repo = DataRepo::demo();
        SkillNode::new(repo.skill("1211_NA_1").unwrap().clone(), 100)
    }

    #[test]
    fn window_derives_from_lead_and_duration() {
        let node = node();
        assert_eq!(node.preload_tick, 100);
        assert_eq!(node.start_tick, 104);
        assert_eq!(node.end_tick, 104 + 30);
        assert!(node.is_active(104));
        assert!(node.is_active(134));
        assert!(node.is_expired(135));
        assert!(!node.is_active(103));
    }

    #[test]
    fn hit_ticks_match_offsets() {
        let node = node();
        assert!(node.is_hit_now(104 + 12));
        assert!(node.is_hit_now(104 + 30));
        assert!(!node.is_hit_now(104 + 13));
    }

    #[test]
    fn element_override_wins() {
        let mut node = node();
        assert_eq!(node.element(), Element::Electric);
        node.element_override = Some(Element::Fire);
        assert_eq!(node.element(), Element::Fire);
    }
}

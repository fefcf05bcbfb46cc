//! Skill scheduling: owns the timeline of pending and resident nodes,
//! advances it tick by tick, and exposes what is executing now.

use tracing::{debug, warn};

use crate::data::DataRepo;
use crate::preload::node::SkillNode;
use crate::preload::stack::{ActionStack, NodeStack};
use crate::sim::error::SimResult;

/// A hit that lands on the current tick.
#[derive(Debug, Clone)]
pub struct DueHit {
    pub node: SkillNode,
    pub hit_index: usize,
    pub hit_count: usize,
}

#[derive(Debug, Default)]
pub struct PreloadEngine {
    /// Scheduled nodes that have not started yet, ordered by start tick.
    pending: Vec<SkillNode>,
    /// Nodes currently inside their execution window.
    resident: Vec<SkillNode>,
    pub action_stack: ActionStack,
    pub node_stack: NodeStack,
}

impl PreloadEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a skill to begin at `at`, clamped to `now` if already
    /// past so late scheduling is never silently reordered. Unknown
    /// tags surface as lookup errors for the clock boundary to catch.
    pub fn schedule(
        &mut self,
        data: &DataRepo,
        skill_tag: &str,
        now: u64,
        at: u64,
    ) -> SimResult<()> {
        self.schedule_with(data, skill_tag, now, at, false)
    }

    /// `schedule` with control over the forced-trigger flag.
    pub fn schedule_with(
        &mut self,
        data: &DataRepo,
        skill_tag: &str,
        now: u64,
        at: u64,
        forced: bool,
    ) -> SimResult<()> {
        let skill = data.skill(skill_tag)?.clone();
        let at = if at < now {
            warn!(skill_tag, requested = at, now, "schedule tick already past, clamping");
            now
        } else {
            at
        };
        let mut node = SkillNode::new(skill, at);
        node.forced_trigger = forced;
        debug!(
            skill_tag,
            preload = node.preload_tick,
            start = node.start_tick,
            end = node.end_tick,
            "scheduled"
        );
        let insert_at = self
            .pending
            .partition_point(|n| n.start_tick <= node.start_tick);
        self.pending.insert(insert_at, node);
        Ok(())
    }

    /// Activate nodes whose start tick has arrived and expire those past
    /// their end. Returns the nodes that started this tick, in schedule
    /// order. Overlapping nodes across characters are permitted.
    pub fn advance(&mut self, tick: u64) -> Vec<SkillNode> {
        self.resident.retain(|n| !n.is_expired(tick));

        let mut started = Vec::new();
        while let Some(node) = self.pending.first() {
            if node.start_tick > tick {
                break;
            }
            let node = self.pending.remove(0);
            started.push(node.clone());
            self.node_stack.push(node.clone());
            if node.active_generation {
                self.action_stack.push(node.clone());
            }
            self.resident.push(node);
        }
        started
    }

    /// Hits landing exactly on this tick, across every resident node.
    pub fn due_hits(&self, tick: u64) -> Vec<DueHit> {
        let mut due = Vec::new();
        for node in &self.resident {
            if !node.is_active(tick) {
                continue;
            }
            let offset = tick - node.start_tick;
            let hits = node.skill.hits();
            for (hit_index, &h) in hits.iter().enumerate() {
                if u64::from(h) == offset {
                    due.push(DueHit {
                        node: node.clone(),
                        hit_index,
                        hit_count: hits.len(),
                    });
                }
            }
        }
        due
    }

    /// The character whose node currently holds the field.
    pub fn operating_char(&self, tick: u64) -> Option<u32> {
        self.node_stack.on_field_node(tick).map(|n| n.cid)
    }

    /// Whether a character has a pending or resident node and therefore
    /// cannot take a new action.
    pub fn is_busy(&self, cid: u32, tick: u64) -> bool {
        self.pending.iter().any(|n| n.cid == cid)
            || self
                .resident
                .iter()
                .any(|n| n.cid == cid && n.end_tick > tick)
    }

    pub fn resident_nodes(&self) -> &[SkillNode] {
        &self.resident
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

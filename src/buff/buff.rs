//! Buff core types: the static feature block shared by every instance of
//! a buff index, and the dynamic block tracking one beneficiary's state.

use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::buff::strategy::BuffStrategy;
use crate::data::{Element, OwnerId};
use crate::event::Signal;
use crate::preload::SingleHit;

/// How a buff decides it is over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum ExitPolicy {
    /// Never expires while registered.
    AllTime,
    /// Ends at `start + ticks`.
    Duration { ticks: u64 },
    /// Each stack carries its own expiry; count = live stacks.
    IndividuallySettled { ticks: u64 },
    /// Strategy callback decides.
    Custom,
}

/// What starts a buff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BuffTrigger {
    /// A matching skill starting its execution window.
    SkillStart {
        #[serde(default)]
        skills: BTreeSet<String>,
        #[serde(default)]
        labels: BTreeSet<String>,
    },
    /// A hit landing, optionally element-filtered.
    SkillHit {
        #[serde(default)]
        element: Option<Element>,
    },
    /// A bus signal.
    Signal { signal: Signal },
    /// Only started explicitly.
    Manual,
}

/// Applicability filter consulted at aggregation time. Empty sets do not
/// filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EffectScope {
    #[serde(default)]
    pub skills: BTreeSet<String>,
    #[serde(default)]
    pub labels: BTreeSet<String>,
    #[serde(default)]
    pub elements: BTreeSet<Element>,
    #[serde(default)]
    pub min_trigger_level: u8,
    #[serde(default)]
    pub back_attack_only: bool,
    /// Restrict to hits originating from one character.
    #[serde(default)]
    pub origin: Option<u32>,
}

/// The hit/skill context an aggregation is asked about.
#[derive(Debug, Clone, PartialEq)]
pub struct EffectTarget {
    pub skill_tag: String,
    pub labels: BTreeSet<String>,
    pub element: Element,
    pub trigger_level: u8,
    pub back_attack: bool,
    pub origin_cid: u32,
}

impl EffectTarget {
    pub fn from_hit(hit: &SingleHit, labels: &BTreeSet<String>) -> Self {
        Self {
            skill_tag: hit.skill_tag.clone(),
            labels: labels.clone(),
            element: hit.element,
            trigger_level: hit.trigger_level,
            back_attack: false,
            origin_cid: hit.cid,
        }
    }

    /// Stable fingerprint for per-tick memoization.
    pub fn cache_key(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        self.skill_tag.hash(&mut hasher);
        self.element.hash(&mut hasher);
        self.trigger_level.hash(&mut hasher);
        self.back_attack.hash(&mut hasher);
        self.origin_cid.hash(&mut hasher);
        for label in &self.labels {
            label.hash(&mut hasher);
        }
        hasher.finish()
    }
}

impl EffectScope {
    pub fn applies_to(&self, target: &EffectTarget) -> bool {
        if !self.skills.is_empty() && !self.skills.contains(&target.skill_tag) {
            return false;
        }
        if !self.labels.is_empty() && self.labels.is_disjoint(&target.labels) {
            return false;
        }
        if !self.elements.is_empty() && !self.elements.contains(&target.element) {
            return false;
        }
        if target.trigger_level < self.min_trigger_level {
            return false;
        }
        if self.back_attack_only && !target.back_attack {
            return false;
        }
        if let Some(origin) = self.origin {
            if origin != target.origin_cid {
                return false;
            }
        }
        true
    }
}

/// Static feature set of one buff index. Serializable so configurations
/// round-trip through export files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuffFeature {
    pub index: String,
    pub name: String,
    /// Internal cooldown between (re)starts; 0 means none.
    #[serde(default)]
    pub cooldown: u64,
    pub max_count: u32,
    /// Stacks added per trigger.
    #[serde(default = "default_step")]
    pub step: u32,
    #[serde(default)]
    pub is_debuff: bool,
    pub exit: ExitPolicy,
    pub trigger: BuffTrigger,
    /// effect key -> per-stack value.
    #[serde(default)]
    pub effects: BTreeMap<String, f64>,
    #[serde(default)]
    pub scope: EffectScope,
}

fn default_step() -> u32 {
    1
}

/// Dynamic state of one beneficiary's instance.
#[derive(Default)]
pub struct BuffDynamic {
    pub active: bool,
    pub count: u32,
    pub start_tick: u64,
    pub end_tick: u64,
    pub last_start: Option<u64>,
    /// `(value, expiry)` per stack, for individually-settled buffs.
    pub settle_box: Vec<(f64, u64)>,
    /// Private cross-call state for the strategy, allocated once at
    /// roster construction.
    pub record: Option<Box<dyn Any + Send>>,
}

impl std::fmt::Debug for BuffDynamic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuffDynamic")
            .field("active", &self.active)
            .field("count", &self.count)
            .field("start_tick", &self.start_tick)
            .field("end_tick", &self.end_tick)
            .field("settle_box", &self.settle_box)
            .field("has_record", &self.record.is_some())
            .finish()
    }
}

/// One persistent modifier instance bound to one beneficiary.
pub struct Buff {
    pub ft: BuffFeature,
    pub dy: BuffDynamic,
    pub owner: OwnerId,
    pub strategy: Option<Arc<dyn BuffStrategy>>,
}

impl std::fmt::Debug for Buff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Buff")
            .field("index", &self.ft.index)
            .field("owner", &self.owner)
            .field("dy", &self.dy)
            .field("has_strategy", &self.strategy.is_some())
            .finish()
    }
}

impl Buff {
    pub fn new(ft: BuffFeature, owner: OwnerId, strategy: Option<Arc<dyn BuffStrategy>>) -> Self {
        let record = strategy.as_ref().and_then(|s| s.init_record());
        Self {
            ft,
            dy: BuffDynamic {
                record,
                ..BuffDynamic::default()
            },
            owner,
            strategy,
        }
    }

    pub fn off_cooldown(&self, tick: u64) -> bool {
        if self.ft.cooldown == 0 {
            return true;
        }
        match self.dy.last_start {
            None => true,
            Some(last) => tick.saturating_sub(last) >= self.ft.cooldown,
        }
    }

    /// Activate or refresh. Returns false when blocked by cooldown.
    pub fn start(&mut self, tick: u64) -> bool {
        if !self.off_cooldown(tick) {
            return false;
        }
        self.dy.last_start = Some(tick);
        if !self.dy.active {
            self.dy.start_tick = tick;
        }
        self.dy.active = true;
        match &self.ft.exit {
            ExitPolicy::AllTime | ExitPolicy::Custom => {
                self.dy.count = (self.dy.count + self.ft.step).min(self.ft.max_count);
            }
            ExitPolicy::Duration { ticks } => {
                self.dy.count = (self.dy.count + self.ft.step).min(self.ft.max_count);
                self.dy.end_tick = tick + ticks;
            }
            ExitPolicy::IndividuallySettled { ticks } => {
                for _ in 0..self.ft.step {
                    self.dy.settle_box.push((1.0, tick + ticks));
                }
                while self.dy.settle_box.len() > self.ft.max_count as usize {
                    self.dy.settle_box.remove(0);
                }
                self.dy.count = self.dy.settle_box.len() as u32;
                self.dy.end_tick = self
                    .dy
                    .settle_box
                    .iter()
                    .map(|&(_, expiry)| expiry)
                    .max()
                    .unwrap_or(tick);
            }
        }
        true
    }

    /// Drop expired stacks of an individually-settled buff.
    pub fn settle(&mut self, tick: u64) {
        if !matches!(self.ft.exit, ExitPolicy::IndividuallySettled { .. }) {
            return;
        }
        self.dy.settle_box.retain(|&(_, expiry)| expiry > tick);
        self.dy.count = self.dy.settle_box.len() as u32;
    }

    /// Exit re-validation, run every tick against the active subset.
    pub fn should_exit(&self, tick: u64) -> bool {
        if !self.dy.active {
            return true;
        }
        match &self.ft.exit {
            ExitPolicy::AllTime => false,
            ExitPolicy::Duration { .. } => tick > self.dy.end_tick,
            ExitPolicy::IndividuallySettled { .. } => {
                self.dy.settle_box.is_empty() || tick >= self.dy.end_tick
            }
            ExitPolicy::Custom => match &self.strategy {
                Some(strategy) => strategy.should_exit(self, tick).unwrap_or(false),
                None => false,
            },
        }
    }

    /// Deactivate and reset dynamic state. Beneficiary-side teardown is
    /// the manager's job.
    pub fn end(&mut self, _tick: u64) {
        self.dy.active = false;
        self.dy.count = 0;
        self.dy.settle_box.clear();
    }
}

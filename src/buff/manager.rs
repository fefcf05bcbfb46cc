//! Buff lifecycle manager.
//!
//! Owns exactly one persistent instance per (beneficiary, buff index)
//! for the whole roster, plus the active subset per beneficiary. Buffs
//! are started or refreshed on trigger, re-validated every tick, and
//! removed (with beneficiary-side teardown) when their exit condition is
//! met. The debuff pool invariant is enforced both at registration and
//! at every update: a debuff lives only under the enemy owner.

use std::collections::BTreeMap;

use tracing::debug;

use crate::buff::aggregate::AggregateCache;
use crate::buff::buff::{Buff, BuffFeature, BuffTrigger, EffectTarget};
use crate::buff::strategy::{strategy_for, TriggerCtx};
use crate::data::OwnerId;
use crate::event::Signal;
use crate::preload::SingleHit;
use crate::sim::error::{SimError, SimResult};

/// One row of the buff-activity log: stack count at a tick.
#[derive(Debug, Clone, PartialEq)]
pub struct BuffActivity {
    pub owner: OwnerId,
    pub tick: u64,
    pub index: String,
    pub count: u32,
}

#[derive(Debug, Default)]
pub struct BuffManager {
    pools: BTreeMap<OwnerId, BTreeMap<String, Buff>>,
    /// Active buff indices per owner, in activation order.
    active: BTreeMap<OwnerId, Vec<String>>,
    cache: AggregateCache,
}

impl BuffManager {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_pool_invariant(owner: OwnerId, ft: &BuffFeature) -> SimResult<()> {
        if ft.is_debuff && owner != OwnerId::Enemy {
            return Err(SimError::Invariant(format!(
                "'{}' is a debuff but entered the {owner} pool",
                ft.index
            )));
        }
        if !ft.is_debuff && owner == OwnerId::Enemy {
            return Err(SimError::Invariant(format!(
                "'{}' is a buff but entered the enemy debuff pool",
                ft.index
            )));
        }
        Ok(())
    }

    /// Instantiate the persistent instance for one beneficiary. Called
    /// once per (owner, index) at roster setup.
    pub fn register(&mut self, owner: OwnerId, ft: BuffFeature) -> SimResult<()> {
        Self::check_pool_invariant(owner, &ft)?;
        let strategy = strategy_for(&ft.index);
        let index = ft.index.clone();
        self.pools
            .entry(owner)
            .or_default()
            .insert(index, Buff::new(ft, owner, strategy));
        Ok(())
    }

    pub fn buff(&self, owner: OwnerId, index: &str) -> SimResult<&Buff> {
        self.pools
            .get(&owner)
            .and_then(|pool| pool.get(index))
            .ok_or_else(|| SimError::UnknownBuff(index.to_string()))
    }

    fn buff_mut(&mut self, owner: OwnerId, index: &str) -> SimResult<&mut Buff> {
        self.pools
            .get_mut(&owner)
            .and_then(|pool| pool.get_mut(index))
            .ok_or_else(|| SimError::UnknownBuff(index.to_string()))
    }

    /// Current stack count; 0 when absent or inactive.
    pub fn count(&self, owner: OwnerId, index: &str) -> u32 {
        self.buff(owner, index)
            .map(|b| if b.dy.active { b.dy.count } else { 0 })
            .unwrap_or(0)
    }

    /// Activate or refresh one buff.
    pub fn start(&mut self, owner: OwnerId, index: &str, tick: u64) -> SimResult<bool> {
        let buff = self.buff_mut(owner, index)?;
        let started = buff.start(tick);
        if started {
            debug!(owner = %owner, index, tick, count = buff.dy.count, "buff start");
            let list = self.active.entry(owner).or_default();
            if !list.iter().any(|i| i == index) {
                list.push(index.to_string());
            }
        }
        Ok(started)
    }

    /// Run trigger judgement for every registered buff. The strategy's
    /// judge hook, when present and decisive, overrides the declarative
    /// trigger.
    pub fn judge_triggers(&mut self, tick: u64, ctx: &TriggerCtx<'_>) -> SimResult<()> {
        let mut to_start: Vec<(OwnerId, String)> = Vec::new();
        for (owner, pool) in &self.pools {
            for buff in pool.values() {
                let decision = buff
                    .strategy
                    .as_ref()
                    .and_then(|s| s.judge(buff, ctx))
                    .unwrap_or_else(|| Self::declarative_trigger(&buff.ft.trigger, ctx));
                if decision {
                    to_start.push((*owner, buff.ft.index.clone()));
                }
            }
        }
        for (owner, index) in to_start {
            self.start(owner, &index, tick)?;
        }
        Ok(())
    }

    fn declarative_trigger(trigger: &BuffTrigger, ctx: &TriggerCtx<'_>) -> bool {
        match trigger {
            BuffTrigger::SkillStart { skills, labels } => {
                let Some(node) = ctx.node else { return false };
                let skill_ok = skills.is_empty() || skills.contains(node.tag());
                let label_ok = labels.is_empty() || !labels.is_disjoint(&node.labels);
                skill_ok && label_ok
            }
            BuffTrigger::SkillHit { element } => {
                let Some(hit) = ctx.hit else { return false };
                element.map_or(true, |e| e == hit.element)
            }
            // Signal triggers fire through on_signal, manual ones never.
            BuffTrigger::Signal { .. } | BuffTrigger::Manual => false,
        }
    }

    /// Start every buff whose trigger matches a bus signal.
    pub fn on_signal(&mut self, signal: Signal, tick: u64) -> SimResult<()> {
        let mut to_start: Vec<(OwnerId, String)> = Vec::new();
        for (owner, pool) in &self.pools {
            for buff in pool.values() {
                if matches!(&buff.ft.trigger, BuffTrigger::Signal { signal: s } if *s == signal) {
                    to_start.push((*owner, buff.ft.index.clone()));
                }
            }
        }
        for (owner, index) in to_start {
            self.start(owner, &index, tick)?;
        }
        Ok(())
    }

    /// Feed one landed hit to every active buff's strategy hook.
    pub fn on_hit(&mut self, hit: &SingleHit, tick: u64) {
        for pool in self.pools.values_mut() {
            for buff in pool.values_mut() {
                if !buff.dy.active {
                    continue;
                }
                if let Some(strategy) = buff.strategy.clone() {
                    strategy.on_hit(buff, hit, tick);
                }
            }
        }
    }

    /// Per-tick re-validation of the active subset. Returns the activity
    /// rows for buffs that survived this tick.
    pub fn update(&mut self, tick: u64) -> SimResult<Vec<BuffActivity>> {
        let mut activity = Vec::new();
        let owners: Vec<OwnerId> = self.active.keys().copied().collect();
        for owner in owners {
            let indices = self.active.get(&owner).cloned().unwrap_or_default();
            let mut removed: Vec<String> = Vec::new();
            for index in &indices {
                let buff = self.buff_mut(owner, index)?;
                Self::check_pool_invariant(owner, &buff.ft)?;
                buff.settle(tick);
                if buff.should_exit(tick) {
                    buff.end(tick);
                    debug!(owner = %owner, index, tick, "buff end, removed from active pool");
                    removed.push(index.clone());
                } else {
                    activity.push(BuffActivity {
                        owner,
                        tick,
                        index: index.clone(),
                        count: buff.dy.count,
                    });
                }
            }
            if !removed.is_empty() {
                // Teardown: drop from the owner's active pool. For the
                // enemy owner this is exactly removal from the debuff list.
                if let Some(list) = self.active.get_mut(&owner) {
                    list.retain(|i| !removed.contains(i));
                }
            }
        }
        Ok(activity)
    }

    /// Active buffs of one owner, in activation order.
    pub fn active_buffs(&self, owner: OwnerId) -> Vec<&Buff> {
        let Some(indices) = self.active.get(&owner) else {
            return Vec::new();
        };
        indices
            .iter()
            .filter_map(|index| self.pools.get(&owner).and_then(|pool| pool.get(index)))
            .collect()
    }

    /// Memoized effect aggregation across several owners' active buffs.
    pub fn aggregate(
        &mut self,
        owners: &[OwnerId],
        target: &EffectTarget,
        tick: u64,
    ) -> BTreeMap<String, f64> {
        self.cache.begin_tick(tick);
        let mut buffs: Vec<&Buff> = Vec::new();
        for owner in owners {
            if let Some(indices) = self.active.get(owner) {
                for index in indices {
                    if let Some(buff) = self.pools.get(owner).and_then(|pool| pool.get(index)) {
                        buffs.push(buff);
                    }
                }
            }
        }
        self.cache.get_or_compute(&buffs, target)
    }

    pub fn registered_count(&self) -> usize {
        self.pools.values().map(|pool| pool.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::buff::{EffectScope, ExitPolicy};
    use crate::data::{DataRepo, Element};
    use crate::preload::SkillNode;
    use std::collections::BTreeSet;

    fn feature(index: &str, is_debuff: bool) -> BuffFeature {
        BuffFeature {
            index: index.to_string(),
            name: index.to_string(),
            cooldown: 0,
            max_count: 3,
            step: 1,
            is_debuff,
            exit: ExitPolicy::Duration { ticks: 120 },
            trigger: BuffTrigger::Manual,
            effects: BTreeMap::from([("atk_pct".to_string(), 0.05)]),
            scope: EffectScope::default(),
        }
    }

    #[test]
    fn debuff_outside_enemy_pool_is_a_hard_error() {
        let mut manager = BuffManager::new();
        let err = manager
            .register(OwnerId::Character(1211), feature("bleed", true))
            .unwrap_err();
        assert!(err.is_hard());

        let err = manager
            .register(OwnerId::Enemy, feature("atk_up", false))
            .unwrap_err();
        assert!(err.is_hard());

        assert!(manager.register(OwnerId::Enemy, feature("bleed", true)).is_ok());
        assert!(manager
            .register(OwnerId::Character(1211), feature("atk_up", false))
            .is_ok());
    }

    #[test]
    fn expired_buffs_leave_the_active_pool() {
        let mut manager = BuffManager::new();
        manager
            .register(OwnerId::Character(1211), feature("atk_up", false))
            .unwrap();
        manager.start(OwnerId::Character(1211), "atk_up", 10).unwrap();
        assert_eq!(manager.active_buffs(OwnerId::Character(1211)).len(), 1);

        let rows = manager.update(50).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].count, 1);

        let rows = manager.update(131).unwrap();
        assert!(rows.is_empty());
        assert!(manager.active_buffs(OwnerId::Character(1211)).is_empty());
        assert_eq!(manager.count(OwnerId::Character(1211), "atk_up"), 0);
    }

    #[test]
    fn unknown_buff_is_a_lookup_error() {
        let mut manager = BuffManager::new();
        assert!(matches!(
            manager.start(OwnerId::Character(1211), "missing", 0),
            Err(SimError::UnknownBuff(_))
        ));
    }

    #[test]
    fn skill_start_trigger_matches_tags() {
        let mut manager = BuffManager::new();
        let mut ft = feature("on_ex", false);
        ft.trigger = BuffTrigger::SkillStart {
            skills: BTreeSet::from(["1211_E_EX".to_string()]),
            labels: BTreeSet::new(),
        };
        manager.register(OwnerId::Character(1211), ft).unwrap();

        let repo = DataRepo::demo();
        let na = SkillNode::new(repo.skill("1211_NA_1").unwrap().clone(), 0);
        let ctx = TriggerCtx {
            tick: 0,
            node: Some(&na),
            hit: None,
            operating_char: None,
        };
        manager.judge_triggers(0, &ctx).unwrap();
        assert_eq!(manager.count(OwnerId::Character(1211), "on_ex"), 0);

        let ex = SkillNode::new(repo.skill("1211_E_EX").unwrap().clone(), 0);
        let ctx = TriggerCtx {
            tick: 0,
            node: Some(&ex),
            hit: None,
            operating_char: None,
        };
        manager.judge_triggers(0, &ctx).unwrap();
        assert_eq!(manager.count(OwnerId::Character(1211), "on_ex"), 1);
    }

    #[test]
    fn signal_trigger_starts_on_matching_signal_only() {
        let mut manager = BuffManager::new();
        let mut ft = feature("parry_guard", false);
        ft.trigger = BuffTrigger::Signal {
            signal: Signal::Parry,
        };
        manager.register(OwnerId::Character(1211), ft).unwrap();

        manager.on_signal(Signal::Stun, 5).unwrap();
        assert_eq!(manager.count(OwnerId::Character(1211), "parry_guard"), 0);
        manager.on_signal(Signal::Parry, 5).unwrap();
        assert_eq!(manager.count(OwnerId::Character(1211), "parry_guard"), 1);
    }

    #[test]
    fn aggregation_spans_owners_and_memoizes() {
        let mut manager = BuffManager::new();
        manager
            .register(OwnerId::Character(1211), feature("atk_up", false))
            .unwrap();
        manager.register(OwnerId::Enemy, feature("bleed", true)).unwrap();
        manager.start(OwnerId::Character(1211), "atk_up", 0).unwrap();
        manager.start(OwnerId::Enemy, "bleed", 0).unwrap();

        let target = EffectTarget {
            skill_tag: "1211_NA_1".to_string(),
            labels: BTreeSet::new(),
            element: Element::Electric,
            trigger_level: 1,
            back_attack: false,
            origin_cid: 1211,
        };
        let owners = [OwnerId::Character(1211), OwnerId::Enemy];
        let totals = manager.aggregate(&owners, &target, 3);
        assert!((totals["atk_pct"] - 0.1).abs() < 1e-12);
        // Second call in the same tick hits the cache.
        let again = manager.aggregate(&owners, &target, 3);
        assert_eq!(totals, again);
    }
}

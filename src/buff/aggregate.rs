//! Effect aggregation: turn a set of active buffs plus a hit/skill
//! context into `{effect_key: total}`. Results are memoized per unique
//! (buff set, target) within a tick, since the same aggregation is asked
//! for once per hit and hits cluster heavily.

use std::collections::{BTreeMap, HashMap};
use std::hash::{Hash, Hasher};

use crate::buff::buff::{Buff, EffectTarget};

/// Sum `value * count` per effect key across applicable buffs. Buffs
/// whose scope does not match contribute nothing. A strategy may replace
/// its buff's static table outright.
pub fn aggregate(buffs: &[&Buff], target: &EffectTarget) -> BTreeMap<String, f64> {
    let mut totals: BTreeMap<String, f64> = BTreeMap::new();
    for buff in buffs {
        if !buff.dy.active || buff.dy.count == 0 {
            continue;
        }
        if let Some(strategy) = &buff.strategy {
            if let Some(effects) = strategy.effect(buff, target) {
                for (key, value) in effects {
                    *totals.entry(key).or_default() += value;
                }
                continue;
            }
        }
        if !buff.ft.scope.applies_to(target) {
            continue;
        }
        for (key, value) in &buff.ft.effects {
            *totals.entry(key.clone()).or_default() += value * f64::from(buff.dy.count);
        }
    }
    totals
}

/// Fingerprint of a buff set: index + count pairs, order-sensitive in
/// activation order so refreshes that change counts invalidate entries.
pub fn fingerprint(buffs: &[&Buff]) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    for buff in buffs {
        buff.ft.index.hash(&mut hasher);
        buff.dy.count.hash(&mut hasher);
        buff.dy.active.hash(&mut hasher);
    }
    hasher.finish()
}

#[derive(Debug, Default)]
pub struct AggregateCache {
    tick: u64,
    entries: HashMap<(u64, u64), BTreeMap<String, f64>>,
    hits: u64,
    misses: u64,
}

impl AggregateCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invalidate everything when the clock moves.
    pub fn begin_tick(&mut self, tick: u64) {
        if tick != self.tick {
            self.tick = tick;
            self.entries.clear();
        }
    }

    pub fn get_or_compute(
        &mut self,
        buffs: &[&Buff],
        target: &EffectTarget,
    ) -> BTreeMap<String, f64> {
        let key = (fingerprint(buffs), target.cache_key());
        if let Some(found) = self.entries.get(&key) {
            self.hits += 1;
            return found.clone();
        }
        self.misses += 1;
        let computed = aggregate(buffs, target);
        self.entries.insert(key, computed.clone());
        computed
    }

    pub fn hit_count(&self) -> u64 {
        self.hits
    }

    pub fn miss_count(&self) -> u64 {
        self.misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::buff::{BuffFeature, BuffTrigger, EffectScope, ExitPolicy};
    use crate::data::{Element, OwnerId};
    use std::collections::BTreeSet;

    fn buff(index: &str, value: f64, count: u32) -> Buff {
        let ft = BuffFeature {
            index: index.to_string(),
            name: index.to_string(),
            cooldown: 0,
            max_count: 10,
            step: count,
            is_debuff: false,
            exit: ExitPolicy::Duration { ticks: 600 },
            trigger: BuffTrigger::Manual,
            effects: BTreeMap::from([("dmg_bonus".to_string(), value)]),
            scope: EffectScope::default(),
        };
        let mut buff = Buff::new(ft, OwnerId::Character(1211), None);
        buff.start(0);
        buff
    }

    fn target() -> EffectTarget {
        EffectTarget {
            skill_tag: "1211_NA_1".to_string(),
            labels: BTreeSet::new(),
            element: Element::Electric,
            trigger_level: 1,
            back_attack: false,
            origin_cid: 1211,
        }
    }

    #[test]
    fn totals_scale_by_stack_count() {
        let a = buff("a", 0.1, 3);
        let b = buff("b", 0.05, 1);
        let totals = aggregate(&[&a, &b], &target());
        assert!((totals["dmg_bonus"] - 0.35).abs() < 1e-12);
    }

    #[test]
    fn unmatched_scope_contributes_nothing() {
        let mut narrow = buff("narrow", 1.0, 1);
        narrow.ft.scope.elements.insert(Element::Fire);
        let wide = buff("wide", 0.1, 1);
        let totals = aggregate(&[&narrow, &wide], &target());
        assert!((totals["dmg_bonus"] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn cache_reuses_within_a_tick_and_clears_across_ticks() {
        let a = buff("a", 0.1, 2);
        let mut cache = AggregateCache::new();
        cache.begin_tick(5);
        let first = cache.get_or_compute(&[&a], &target());
        let second = cache.get_or_compute(&[&a], &target());
        assert_eq!(first, second);
        assert_eq!(cache.hit_count(), 1);
        assert_eq!(cache.miss_count(), 1);

        cache.begin_tick(6);
        cache.get_or_compute(&[&a], &target());
        assert_eq!(cache.miss_count(), 2);
    }

    #[test]
    fn fingerprint_tracks_count_changes() {
        let mut a = buff("a", 0.1, 1);
        let before = fingerprint(&[&a]);
        a.start(10);
        let after = fingerprint(&[&a]);
        assert_ne!(before, after);
    }
}

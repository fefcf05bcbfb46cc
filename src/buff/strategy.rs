//! Per-buff behavior overrides.
//!
//! Most buffs are fully described by their feature block. The ones that
//! are not get a strategy: an object implementing any subset of the
//! judge/hit/effect/exit hooks, selected from a registry keyed on the
//! buff index. Strategies are stateless templates; cross-call state
//! lives in the buff instance's record slot, allocated once up front.

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::buff::buff::{Buff, EffectTarget};
use crate::preload::{SingleHit, SkillNode};

/// Context for trigger judgement.
#[derive(Debug, Clone, Copy, Default)]
pub struct TriggerCtx<'a> {
    pub tick: u64,
    /// The node that just started, for skill-start judgement.
    pub node: Option<&'a SkillNode>,
    /// The hit that just landed, for on-hit judgement.
    pub hit: Option<&'a SingleHit>,
    pub operating_char: Option<u32>,
}

pub trait BuffStrategy: Send + Sync {
    /// Allocate the per-instance record. Called once per beneficiary at
    /// roster construction.
    fn init_record(&self) -> Option<Box<dyn Any + Send>> {
        None
    }

    /// Override the trigger decision. `None` defers to the feature's
    /// declarative trigger.
    fn judge(&self, _buff: &Buff, _ctx: &TriggerCtx<'_>) -> Option<bool> {
        None
    }

    /// Called for every landed hit while the buff is active.
    fn on_hit(&self, _buff: &mut Buff, _hit: &SingleHit, _tick: u64) {}

    /// Override or extend the aggregated effects. `None` defers to the
    /// feature's static effect table.
    fn effect(&self, _buff: &Buff, _target: &EffectTarget) -> Option<BTreeMap<String, f64>> {
        None
    }

    /// Exit decision for `ExitPolicy::Custom` buffs. `None` means "no
    /// opinion" and the buff stays.
    fn should_exit(&self, _buff: &Buff, _tick: u64) -> Option<bool> {
        None
    }
}

/// Record for [`OverchargeStrategy`].
#[derive(Debug, Default)]
pub struct OverchargeRecord {
    pub charged_hits: u32,
}

/// Gains charge on every hit from its beneficiary's special skills and
/// converts charge into a growing damage bonus; discharges (exits) once
/// fully charged.
pub struct OverchargeStrategy {
    pub charge_cap: u32,
    pub bonus_per_charge: f64,
}

impl OverchargeStrategy {
    fn record(buff: &Buff) -> Option<&OverchargeRecord> {
        buff.dy
            .record
            .as_ref()
            .and_then(|r| r.downcast_ref::<OverchargeRecord>())
    }
}

impl BuffStrategy for OverchargeStrategy {
    fn init_record(&self) -> Option<Box<dyn Any + Send>> {
        Some(Box::new(OverchargeRecord::default()))
    }

    fn judge(&self, buff: &Buff, ctx: &TriggerCtx<'_>) -> Option<bool> {
        // Only starts on the beneficiary's own special skills.
        let node = ctx.node?;
        let owner_cid = match buff.owner {
            crate::data::OwnerId::Character(cid) => cid,
            crate::data::OwnerId::Enemy => return Some(false),
        };
        Some(node.cid == owner_cid && node.skill.trigger_level >= 2)
    }

    fn on_hit(&self, buff: &mut Buff, hit: &SingleHit, _tick: u64) {
        let cap = self.charge_cap;
        let owner_matches = matches!(buff.owner, crate::data::OwnerId::Character(cid) if cid == hit.cid);
        if !owner_matches || hit.trigger_level < 2 {
            return;
        }
        if let Some(record) = buff
            .dy
            .record
            .as_mut()
            .and_then(|r| r.downcast_mut::<OverchargeRecord>())
        {
            record.charged_hits = (record.charged_hits + 1).min(cap);
        }
    }

    fn effect(&self, buff: &Buff, target: &EffectTarget) -> Option<BTreeMap<String, f64>> {
        if !buff.ft.scope.applies_to(target) {
            return Some(BTreeMap::new());
        }
        let charges = Self::record(buff).map_or(0, |r| r.charged_hits);
        Some(BTreeMap::from([(
            "dmg_bonus".to_string(),
            f64::from(charges) * self.bonus_per_charge,
        )]))
    }

    fn should_exit(&self, buff: &Buff, _tick: u64) -> Option<bool> {
        Some(Self::record(buff).map_or(false, |r| r.charged_hits >= self.charge_cap))
    }
}

/// Resolve the strategy for a buff index. Returns `None` for purely
/// declarative buffs.
pub fn strategy_for(index: &str) -> Option<Arc<dyn BuffStrategy>> {
    match index {
        "overcharge" => Some(Arc::new(OverchargeStrategy {
            charge_cap: 12,
            bonus_per_charge: 0.02,
        })),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buff::buff::{BuffFeature, BuffTrigger, EffectScope, ExitPolicy};
    use crate::data::{DataRepo, Element, OwnerId};
    use std::collections::BTreeSet;

    fn overcharge_buff() -> Buff {
        let ft = BuffFeature {
            index: "overcharge".to_string(),
            name: "Overcharge".to_string(),
            cooldown: 0,
            max_count: 1,
            step: 1,
            is_debuff: false,
            exit: ExitPolicy::Custom,
            trigger: BuffTrigger::Manual,
            effects: BTreeMap::new(),
            scope: EffectScope::default(),
        };
        Buff::new(ft, OwnerId::Character(1211), strategy_for("overcharge"))
    }

    fn special_hit(cid: u32) -> SingleHit {
        SingleHit {
            skill_tag: format!("{cid}_E_EX"),
            cid,
            element: Element::Electric,
            buildup: 45.0,
            source_ratio: vec![1.0, 0.0, 0.0],
            stun: 18.0,
            dmg_expect: 1000.0,
            dmg_crit: 1600.0,
            hit_index: 0,
            hit_count: 3,
            proactive: true,
            heavy_hit: false,
            effective_buildup: true,
            trigger_level: 2,
        }
    }

    #[test]
    fn record_is_allocated_at_construction() {
        let buff = overcharge_buff();
        assert!(buff.dy.record.is_some());
    }

    #[test]
    fn charge_accumulates_only_from_owner_specials() {
        let mut buff = overcharge_buff();
        let strategy = buff.strategy.clone().unwrap();

        strategy.on_hit(&mut buff, &special_hit(1211), 10);
        strategy.on_hit(&mut buff, &special_hit(1091), 11);
        let mut basic = special_hit(1211);
        basic.trigger_level = 1;
        strategy.on_hit(&mut buff, &basic, 12);

        let record = buff
            .dy
            .record
            .as_ref()
            .unwrap()
            .downcast_ref::<OverchargeRecord>()
            .unwrap();
        assert_eq!(record.charged_hits, 1);
    }

    #[test]
    fn fully_charged_strategy_requests_exit() {
        let mut buff = overcharge_buff();
        buff.start(0);
        let strategy = buff.strategy.clone().unwrap();
        for tick in 0..12 {
            strategy.on_hit(&mut buff, &special_hit(1211), tick);
        }
        assert!(buff.should_exit(12));
    }

    #[test]
    fn judge_defers_for_unknown_inputs() {
        let buff = overcharge_buff();
        let strategy = buff.strategy.clone().unwrap();
        // No node in context: judge cannot decide.
        assert_eq!(strategy.judge(&buff, &TriggerCtx::default()), None);

        let repo = DataRepo::demo();
        let node = crate::preload::SkillNode::new(repo.skill("1211_E_EX").unwrap().clone(), 0);
        let ctx = TriggerCtx {
            tick: 0,
            node: Some(&node),
            hit: None,
            operating_char: None,
        };
        assert_eq!(strategy.judge(&buff, &ctx), Some(true));
    }

    #[test]
    fn effect_scales_with_charges_and_respects_scope() {
        let mut buff = overcharge_buff();
        let strategy = buff.strategy.clone().unwrap();
        for tick in 0..5 {
            strategy.on_hit(&mut buff, &special_hit(1211), tick);
        }
        let target = EffectTarget {
            skill_tag: "1211_E_EX".to_string(),
            labels: BTreeSet::new(),
            element: Element::Electric,
            trigger_level: 2,
            back_attack: false,
            origin_cid: 1211,
        };
        let effects = strategy.effect(&buff, &target).unwrap();
        assert!((effects["dmg_bonus"] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn unknown_index_has_no_strategy() {
        assert!(strategy_for("plain_attack_up").is_none());
    }
}

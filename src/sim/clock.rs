//! The per-tick simulation driver.
//!
//! One tick resolves in a fixed order: special states see the tick
//! first, the preload timeline advances and the rotation picks the next
//! action, hits land and feed buffs / anomaly bars / the stun gauge,
//! activations settle and spawn dots, buffs re-validate, and finally
//! the bus delivers the tick's queued signals. This ordering is
//! load-bearing; condition evaluation on tick N must see the world as
//! tick N-1 left it.

use std::collections::BTreeMap;

use tracing::{debug, info, warn};

use crate::apl::{self, ActionRecord, EvalContext};
use crate::buff::{BuffFeature, BuffManager, EffectTarget, TriggerCtx};
use crate::data::{CharacterState, DataRepo, Element, OwnerId, Roster};
use crate::event::{
    Event, EventBus, EventPayload, Signal, SpecialCtx, SpecialState, SpecialStateManager,
    SpecialUpdateSignal,
};
use crate::preload::{PreloadEngine, SingleHit, SkillNode};
use crate::report::{HitRecord, Report, RunSummary, TickRecord};
use crate::sim::enemy::EnemyState;
use crate::sim::error::{SimError, SimResult};
use crate::sim::rng::{fold_seed, Rng};

/// Effect keys the clock reads from buff aggregation.
const KEY_DMG_PCT: &str = "dmg_pct";
const KEY_CRIT_CHANCE: &str = "crit_chance";
const KEY_CRIT_DMG: &str = "crit_dmg";
const KEY_BUILDUP_PCT: &str = "buildup_pct";
const KEY_STUN_PCT: &str = "stun_pct";
const KEY_ANOMALY_DURATION_PCT: &str = "anomaly_duration_pct";
const KEY_ANOMALY_DURATION_FLAT: &str = "anomaly_duration_flat";

/// Damage ratio of the burst dealt when a second anomaly lands while
/// another is active.
const DISORDER_RATIO: f64 = 4.5;

pub struct Simulation {
    pub tick: u64,
    pub data: DataRepo,
    pub roster: Roster,
    pub chars: BTreeMap<u32, CharacterState>,
    pub enemy: EnemyState,
    pub records: Vec<ActionRecord>,
    pub preload: PreloadEngine,
    pub buffs: BuffManager,
    pub specials: SpecialStateManager,
    pub bus: EventBus,
    pub report: Report,
    rng: Rng,
    roster_slots: Vec<u32>,
}

impl Simulation {
    /// Fail-fast construction: every roster id must resolve before the
    /// first tick runs.
    pub fn init(roster: Roster, data: DataRepo) -> SimResult<Self> {
        roster.validate()?;

        let mut chars = BTreeMap::new();
        for &cid in &roster.characters {
            let record = data.character(cid)?.clone();
            chars.insert(cid, CharacterState::new(record));
        }
        if let Some(first) = roster.characters.first() {
            if let Some(state) = chars.get_mut(first) {
                state.on_field = true;
            }
        }

        let enemy_record = data.enemy(roster.enemy_index)?.clone();
        let enemy = EnemyState::new(enemy_record, roster.enemy_adjustment, roster.difficulty);

        let records = apl::load(&roster.apl, &roster.characters, &data)?;
        if records.is_empty() {
            return Err(SimError::Config(
                "rotation script produced no usable actions".to_string(),
            ));
        }

        let rng = Rng::new(fold_seed(roster.seed, "kernel"));
        let roster_slots = roster.characters.clone();

        let mut sim = Self {
            tick: 0,
            data,
            roster,
            chars,
            enemy,
            records,
            preload: PreloadEngine::new(),
            buffs: BuffManager::new(),
            specials: SpecialStateManager::new(),
            bus: EventBus::new(),
            report: Report::new(),
            rng,
            roster_slots,
        };
        sim.bus.broadcast(Event {
            signal: Signal::EnterBattle,
            payload: EventPayload::None,
            tick: 0,
        });
        sim.buffs.on_signal(Signal::EnterBattle, 0)?;
        info!(
            characters = ?sim.roster.characters,
            enemy = sim.roster.enemy_index,
            seed = sim.roster.seed,
            "simulation initialized"
        );
        Ok(sim)
    }

    pub fn register_buff(&mut self, owner: OwnerId, ft: BuffFeature) -> SimResult<()> {
        self.buffs.register(owner, ft)
    }

    pub fn register_special(
        &mut self,
        state: Box<dyn SpecialState>,
        signals: &[SpecialUpdateSignal],
    ) {
        self.specials.register(state, signals);
    }

    fn slot_of(&self, cid: u32) -> Option<usize> {
        self.roster_slots.iter().position(|&c| c == cid)
    }

    fn build_hit(&mut self, node: &SkillNode, hit_index: usize, hit_count: usize) -> SingleHit {
        let element = node.element();
        let skill = &node.skill;
        let target = EffectTarget {
            skill_tag: node.tag().to_string(),
            labels: node.labels.clone(),
            element,
            trigger_level: skill.trigger_level,
            back_attack: false,
            origin_cid: node.cid,
        };
        let effects = self.buffs.aggregate(
            &[OwnerId::Character(node.cid), OwnerId::Enemy],
            &target,
            self.tick,
        );
        let bonus = |key: &str| effects.get(key).copied().unwrap_or(0.0);

        let (atk, crit_chance, crit_damage, mastery) = match self.chars.get(&node.cid) {
            Some(state) => (
                state.record.atk,
                state.record.crit_chance,
                state.record.crit_damage,
                state.record.anomaly_mastery,
            ),
            None => (0.0, 0.0, 0.0, 100.0),
        };

        let def_factor = 1000.0 / (1000.0 + self.enemy.record.defense.max(0.0));
        let base = skill.dmg_ratio_per_hit() * atk * (1.0 + bonus(KEY_DMG_PCT)) * def_factor;
        let crit_chance = (crit_chance + bonus(KEY_CRIT_CHANCE)).clamp(0.0, 1.0);
        let crit_damage = crit_damage + bonus(KEY_CRIT_DMG);
        let dmg_crit = base * (1.0 + crit_damage);
        let dmg_expect = base * (1.0 + crit_chance * crit_damage);

        let buildup =
            skill.buildup_per_hit * (mastery / 100.0) * (1.0 + bonus(KEY_BUILDUP_PCT));
        let stun = skill.stun_per_hit * (1.0 + bonus(KEY_STUN_PCT));

        let mut source_ratio = vec![0.0; self.roster_slots.len()];
        if let Some(slot) = self.slot_of(node.cid) {
            source_ratio[slot] = 1.0;
        }

        SingleHit {
            skill_tag: node.tag().to_string(),
            cid: node.cid,
            element,
            buildup,
            source_ratio,
            stun,
            dmg_expect,
            dmg_crit,
            hit_index,
            hit_count,
            proactive: node.active_generation,
            heavy_hit: hit_index + 1 == hit_count && skill.trigger_level >= 2,
            effective_buildup: skill.effective_buildup,
            trigger_level: skill.trigger_level,
        }
    }

    /// Weighted team attack for attributed damage (dots, disorder).
    fn attributed_atk(&self, source_ratio: &[f64]) -> f64 {
        self.roster_slots
            .iter()
            .zip(source_ratio)
            .filter_map(|(cid, ratio)| self.chars.get(cid).map(|c| c.record.atk * ratio))
            .sum()
    }

    /// Duration modifiers from active enemy debuffs, recomputed at every
    /// (re)activation.
    fn anomaly_duration_mods(&mut self, element: Element) -> (f64, f64) {
        let target = EffectTarget {
            skill_tag: String::new(),
            labels: Default::default(),
            element,
            trigger_level: 0,
            back_attack: false,
            origin_cid: 0,
        };
        let effects = self.buffs.aggregate(&[OwnerId::Enemy], &target, self.tick);
        (
            effects.get(KEY_ANOMALY_DURATION_PCT).copied().unwrap_or(0.0),
            effects.get(KEY_ANOMALY_DURATION_FLAT).copied().unwrap_or(0.0),
        )
    }

    fn activate_anomaly(&mut self, element: Element, skill_tag: &str) -> SimResult<f64> {
        let (pct, flat) = self.anomaly_duration_mods(element);
        let tick = self.tick;

        let mut disorder_damage = 0.0;
        let previously_active: Vec<Element> = self
            .enemy
            .bars
            .iter()
            .filter(|b| b.active && b.element != element)
            .map(|b| b.element)
            .collect();

        let ratio = {
            let bar = self.enemy.bar_mut(element);
            let ratio = bar.settle();
            bar.activate(tick, skill_tag, pct, flat);
            ratio
        };

        // A second anomaly against an already-afflicted target converts
        // into a disorder: the old statuses collapse into a burst.
        if !previously_active.is_empty() {
            for prev in &previously_active {
                let bar = self.enemy.bar_mut(*prev);
                bar.active = false;
            }
            self.enemy.bar_mut(element).kind = crate::anomaly::AnomalyKind::Disorder;
            disorder_damage = DISORDER_RATIO * self.attributed_atk(&ratio);
            debug!(tick, %element, collapsed = previously_active.len(), "disorder");
        } else {
            self.enemy.bar_mut(element).kind = crate::anomaly::AnomalyKind::Standard;
        }

        // Spawn the element's dot.
        match element {
            Element::Fire => {
                let mut dot = crate::anomaly::Dot::ignite();
                dot.start(tick, ratio.clone());
                self.enemy.dots.push(dot);
            }
            Element::Ice => {
                let mut dot = crate::anomaly::Dot::freeze(self.enemy.record.freeze_resistance);
                dot.start(tick, ratio.clone());
                self.enemy.dots.push(dot);
            }
            _ => {}
        }

        self.bus.publish(Event {
            signal: Signal::Anomaly,
            payload: EventPayload::Anomaly { element },
            tick,
        });
        Ok(disorder_damage)
    }

    /// Run exactly one tick.
    pub fn run_tick(&mut self) -> SimResult<()> {
        let tick = self.tick;
        let mut damage = 0.0;
        let mut dot_damage = 0.0;
        let mut anomaly_activations = 0u32;

        // Phase 1: special states see the tick before anything moves.
        self.specials
            .broadcast_and_update(SpecialUpdateSignal::BeforePreload, &SpecialCtx {
                tick,
                ..SpecialCtx::default()
            })?;

        // Phase 2: advance the timeline, then let the rotation pick the
        // next action from the world as the previous tick left it.
        let started = self.preload.advance(tick);

        let decision = {
            let status = self.enemy.status_view();
            let ctx = EvalContext {
                tick,
                chars: &self.chars,
                status: &status,
                buffs: &self.buffs,
                preload: &self.preload,
            };
            apl::decide(&self.records, &ctx)?
        };
        if let Some(decision) = decision {
            self.preload.schedule_with(
                &self.data,
                &decision.action_id,
                tick,
                tick,
                decision.forced,
            )?;
        }

        // Phase 3: nodes that started this tick drive field switches,
        // special states, and buff trigger judgement.
        let operating = self.preload.operating_char(tick);
        for node in &started {
            if node.active_generation {
                for (cid, state) in self.chars.iter_mut() {
                    let was = state.on_field;
                    state.on_field = *cid == node.cid;
                    if state.on_field && !was {
                        self.bus.publish(Event {
                            signal: Signal::SwitchIn,
                            payload: EventPayload::Character(*cid),
                            tick,
                        });
                    }
                }
            }
            self.specials
                .broadcast_and_update(SpecialUpdateSignal::CharacterAction, &SpecialCtx {
                    tick,
                    skill: Some(node),
                    hit: None,
                })?;
            self.buffs.judge_triggers(
                tick,
                &TriggerCtx { tick, node: Some(node), hit: None, operating_char: operating },
            )?;
        }

        // Phase 4: land the hits due this tick.
        let due = self.preload.due_hits(tick);
        for due_hit in &due {
            let hit = self.build_hit(&due_hit.node, due_hit.hit_index, due_hit.hit_count);

            self.buffs.on_hit(&hit, tick);
            self.buffs.judge_triggers(
                tick,
                &TriggerCtx { tick, node: None, hit: Some(&hit), operating_char: operating },
            )?;
            self.specials
                .broadcast_and_update(SpecialUpdateSignal::ReceiveHit, &SpecialCtx {
                    tick,
                    skill: Some(&due_hit.node),
                    hit: Some(&hit),
                })?;

            if self.specials.allows_anomaly(hit.element) {
                self.enemy.bar_mut(hit.element).accumulate(
                    hit.buildup,
                    &hit.source_ratio,
                    hit.effective_buildup,
                );
            } else {
                debug!(tick, element = %hit.element, "anomaly buildup vetoed");
            }
            self.enemy.add_stun(hit.stun);

            if let Some(state) = self.chars.get_mut(&hit.cid) {
                state.gain_energy(due_hit.node.skill.energy_gain);
            }

            damage += hit.dmg_expect;
            self.report.hits.push(HitRecord {
                tick,
                cid: hit.cid,
                skill_tag: hit.skill_tag.clone(),
                element: hit.element,
                dmg_expect: hit.dmg_expect,
                dmg_crit: hit.dmg_crit,
                buildup: hit.buildup,
                stun: hit.stun,
            });
            self.bus.publish(Event {
                signal: Signal::Hit,
                payload: EventPayload::Hit {
                    skill_tag: hit.skill_tag.clone(),
                    cid: hit.cid,
                    element: hit.element,
                },
                tick,
            });
        }

        // Phase 5: activations. A bar both full and off cooldown fires.
        for element in Element::ALL {
            if self.enemy.bar(element).can_activate() {
                let by = due
                    .iter()
                    .rev()
                    .find(|d| d.node.element() == element)
                    .map(|d| d.node.tag().to_string())
                    .unwrap_or_else(|| "unattributed".to_string());
                damage += self.activate_anomaly(element, &by)?;
                anomaly_activations += 1;
            }
        }

        // Phase 6: dot applications, then stun bookkeeping.
        let mut dot_hits: Vec<(f64, Vec<f64>)> = Vec::new();
        for dot in &mut self.enemy.dots {
            if dot.is_due(tick) {
                dot.apply(tick);
                dot_hits.push((dot.ft.dmg_ratio, dot.source_ratio.clone()));
            }
        }
        for (ratio, source) in dot_hits {
            dot_damage += ratio * self.attributed_atk(&source);
        }

        if self.enemy.check_stun(tick) {
            self.bus.publish(Event {
                signal: Signal::Stun,
                payload: EventPayload::None,
                tick,
            });
        }

        // Phase 7: buff re-validation, then status/dot lifecycle.
        let activity = self.buffs.update(tick)?;
        self.report.buff_log.record_all(&activity);
        self.enemy.lifecycle(tick);

        // Phase 8: deliver the tick's queued signals and let
        // signal-triggered buffs react to them.
        let queued: Vec<Signal> = self.bus.queued_signals();
        self.bus.flush();
        for signal in queued {
            self.buffs.on_signal(signal, tick)?;
        }

        // Phase 9: passive regen and the tick record.
        for state in self.chars.values_mut() {
            state.regen_tick();
        }
        self.report.ticks.push(TickRecord {
            tick,
            damage: damage + dot_damage,
            dot_damage,
            anomaly_activations,
            enemy_stunned: self.enemy.stunned,
        });

        self.tick += 1;
        Ok(())
    }

    /// Advance up to (not including) `stop_tick`. Soft errors fail the
    /// run; callers distinguish them from invariant violations via
    /// [`SimError::is_hard`].
    pub fn advance(&mut self, stop_tick: u64) -> SimResult<()> {
        while self.tick < stop_tick {
            if let Err(err) = self.run_tick() {
                warn!(tick = self.tick, %err, hard = err.is_hard(), "run failed");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Run a whole tick budget and summarize.
    pub fn run(&mut self, ticks: u64) -> SimResult<RunSummary> {
        self.advance(ticks)?;
        Ok(self.report.summary())
    }

    /// Deterministic per-run random draw, unused by the expectation
    /// model but available to strategies that sample.
    pub fn roll(&mut self) -> f64 {
        self.rng.next_unit()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{AplSource, Difficulty};

    fn roster(script: &str) -> Roster {
        Roster {
            characters: vec![1211, 1091, 1300],
            enemy_index: 11001,
            enemy_adjustment: 1.0,
            difficulty: Difficulty::Normal,
            apl: AplSource::Inline(script.to_string()),
            seed: 7,
        }
    }

    const BASIC_SCRIPT: &str = "\
1211|action|1211_E_EX|attribute.1211:energy>=60
1211|action|1211_NA_1
1091|action|1091_NA_1
1300|action|1300_NA_1
";

    #[test]
    fn init_rejects_unresolvable_roster() {
        let mut bad = roster(BASIC_SCRIPT);
        bad.enemy_index = 99999;
        assert!(matches!(
            Simulation::init(bad, DataRepo::demo()),
            Err(SimError::UnknownEnemy(99999))
        ));

        let mut bad = roster(BASIC_SCRIPT);
        bad.characters = vec![1211, 1211, 1300];
        assert!(matches!(
            Simulation::init(bad, DataRepo::demo()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn init_rejects_empty_rotation() {
        let empty = roster("# nothing but comments\n");
        assert!(matches!(
            Simulation::init(empty, DataRepo::demo()),
            Err(SimError::Config(_))
        ));
    }

    #[test]
    fn run_lands_hits_and_fills_tick_records() {
        let mut sim = Simulation::init(roster(BASIC_SCRIPT), DataRepo::demo()).unwrap();
        let summary = sim.run(300).unwrap();
        assert_eq!(summary.ticks, 300);
        assert!(summary.hit_count > 0);
        assert!(summary.total_damage > 0.0);
        assert_eq!(sim.report.ticks.len(), 300);
    }

    #[test]
    fn identical_seeds_produce_identical_runs() {
        let a = Simulation::init(roster(BASIC_SCRIPT), DataRepo::demo())
            .unwrap()
            .run(400)
            .unwrap();
        let b = Simulation::init(roster(BASIC_SCRIPT), DataRepo::demo())
            .unwrap()
            .run(400)
            .unwrap();
        assert_eq!(a.hit_count, b.hit_count);
        assert_eq!(a.total_damage, b.total_damage);
        assert_eq!(a.damage_by_character, b.damage_by_character);
    }

    #[test]
    fn unknown_skill_tag_fails_the_run_at_the_clock_boundary() {
        let mut sim =
            Simulation::init(roster("1211|action|1211_NA_99\n"), DataRepo::demo()).unwrap();
        let err = sim.run(10).unwrap_err();
        assert!(matches!(err, SimError::UnknownSkill(_)));
        assert!(!err.is_hard());
    }

    #[test]
    fn energy_flows_from_hits_and_regen() {
        let mut sim = Simulation::init(roster(BASIC_SCRIPT), DataRepo::demo()).unwrap();
        sim.run(200).unwrap();
        let rina = &sim.chars[&1211];
        assert!(rina.energy > 0.0);
        assert!(rina.energy <= rina.record.energy_max);
    }
}

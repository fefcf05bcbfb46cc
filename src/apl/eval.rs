//! Condition evaluation and per-tick action selection.
//!
//! Both branches of every `and`/`or` are evaluated unconditionally;
//! condition checks are observable (each leaf's outcome lands in the
//! result box), so short-circuiting would silently change what a run
//! records.

use std::collections::{BTreeMap, BTreeSet};

use tracing::trace;

use crate::apl::condition::{Atom, CondValue, ConditionTree, Namespace};
use crate::apl::parser::ActionRecord;
use crate::buff::BuffManager;
use crate::data::{CharacterState, Element, OwnerId};
use crate::preload::PreloadEngine;
use crate::sim::error::{SimError, SimResult};

/// Enemy-side facts the `status` namespace reads, snapshotted by the
/// clock before each decision pass.
#[derive(Debug, Clone, Default)]
pub struct StatusView {
    pub stunned: bool,
    pub stun_pct: f64,
    pub active_anomalies: BTreeSet<Element>,
    pub anomaly_pct: BTreeMap<Element, f64>,
}

pub struct EvalContext<'a> {
    pub tick: u64,
    pub chars: &'a BTreeMap<u32, CharacterState>,
    pub status: &'a StatusView,
    pub buffs: &'a BuffManager,
    pub preload: &'a PreloadEngine,
}

/// Every leaf outcome from one tree evaluation, in evaluation order.
#[derive(Debug, Clone, Default)]
pub struct ResultBox {
    entries: Vec<(String, bool)>,
}

impl ResultBox {
    pub fn record(&mut self, atom: &Atom, outcome: bool) {
        self.entries.push((atom.to_string(), outcome));
    }

    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The action chosen for a tick, with the evaluation trace that chose it.
#[derive(Debug)]
pub struct Decision {
    pub cid: u32,
    pub action_id: String,
    pub forced: bool,
    pub priority: usize,
    pub result_box: ResultBox,
}

fn expect_number(atom: &Atom) -> SimResult<f64> {
    match &atom.value {
        CondValue::Number(v) => Ok(*v),
        other => Err(SimError::Config(format!(
            "condition `{atom}` needs a numeric value, found `{other}`"
        ))),
    }
}

fn expect_bool(atom: &Atom) -> SimResult<bool> {
    match &atom.value {
        CondValue::Bool(v) => Ok(*v),
        other => Err(SimError::Config(format!(
            "condition `{atom}` needs a boolean value, found `{other}`"
        ))),
    }
}

fn check_status(atom: &Atom, ctx: &EvalContext<'_>) -> SimResult<bool> {
    if atom.target != "enemy" {
        return Err(SimError::Config(format!(
            "status conditions target `enemy`, found `{}`",
            atom.target
        )));
    }
    match atom.stat.as_str() {
        "stun" => atom.op.compare_bool(ctx.status.stunned, expect_bool(atom)?),
        "stun_pct" => Ok(atom.op.compare_f64(ctx.status.stun_pct, expect_number(atom)?)),
        "anomaly" => atom
            .op
            .compare_bool(!ctx.status.active_anomalies.is_empty(), expect_bool(atom)?),
        stat => {
            // Per-element checks by anomaly name: `burn`, `freeze`,
            // `shock`, `assault`, `corruption`, plus `<name>_pct`.
            for element in Element::ALL {
                if stat == element.anomaly_name() {
                    let active = ctx.status.active_anomalies.contains(&element);
                    return atom.op.compare_bool(active, expect_bool(atom)?);
                }
                if stat == format!("{}_pct", element.anomaly_name()) {
                    let pct = ctx.status.anomaly_pct.get(&element).copied().unwrap_or(0.0);
                    return Ok(atom.op.compare_f64(pct, expect_number(atom)?));
                }
            }
            Err(SimError::Config(format!("unknown status stat `{stat}`")))
        }
    }
}

fn resolve_char<'a>(atom: &Atom, ctx: &'a EvalContext<'_>) -> SimResult<&'a CharacterState> {
    let cid: u32 = atom
        .target
        .parse()
        .map_err(|_| SimError::Config(format!("bad character target `{}`", atom.target)))?;
    ctx.chars.get(&cid).ok_or(SimError::UnknownCharacter(cid))
}

fn check_attribute(atom: &Atom, ctx: &EvalContext<'_>) -> SimResult<bool> {
    let state = resolve_char(atom, ctx)?;
    match atom.stat.as_str() {
        "energy" => Ok(atom.op.compare_f64(state.energy, expect_number(atom)?)),
        "energy_max" => Ok(atom
            .op
            .compare_f64(state.record.energy_max, expect_number(atom)?)),
        "on_field" => atom.op.compare_bool(state.on_field, expect_bool(atom)?),
        "atk" => Ok(atom.op.compare_f64(state.record.atk, expect_number(atom)?)),
        stat => Err(SimError::Config(format!("unknown attribute stat `{stat}`"))),
    }
}

fn check_buff(atom: &Atom, ctx: &EvalContext<'_>) -> SimResult<bool> {
    let owner = if atom.target == "enemy" {
        OwnerId::Enemy
    } else {
        let cid: u32 = atom
            .target
            .parse()
            .map_err(|_| SimError::Config(format!("bad buff target `{}`", atom.target)))?;
        OwnerId::Character(cid)
    };
    let count = ctx.buffs.count(owner, &atom.stat) as f64;
    Ok(atom.op.compare_f64(count, expect_number(atom)?))
}

fn check_action(atom: &Atom, ctx: &EvalContext<'_>) -> SimResult<bool> {
    let cid: u32 = atom
        .target
        .parse()
        .map_err(|_| SimError::Config(format!("bad action target `{}`", atom.target)))?;
    let last = ctx.preload.action_stack.peek_for(cid);
    match atom.stat.as_str() {
        "last_skill" => {
            let expected = match &atom.value {
                CondValue::Text(tag) => tag.as_str(),
                other => {
                    return Err(SimError::Config(format!(
                        "last_skill compares against a skill tag, found `{other}`"
                    )))
                }
            };
            let actual = last.map(|node| node.tag()).unwrap_or("");
            atom.op.compare_text(actual, expected)
        }
        "last_skill_end" => {
            let ended = last.map(|node| node.is_expired(ctx.tick)).unwrap_or(false);
            atom.op.compare_bool(ended, expect_bool(atom)?)
        }
        stat => Err(SimError::Config(format!("unknown action stat `{stat}`"))),
    }
}

fn check_special(atom: &Atom, ctx: &EvalContext<'_>) -> SimResult<bool> {
    if atom.target != "preload" {
        return Err(SimError::Config(format!(
            "special conditions target `preload`, found `{}`",
            atom.target
        )));
    }
    match atom.stat.as_str() {
        "operating_char" => {
            let operating = ctx.preload.operating_char(ctx.tick);
            match operating {
                Some(cid) => Ok(atom.op.compare_f64(cid as f64, expect_number(atom)?)),
                None => Ok(false),
            }
        }
        "tick" => Ok(atom.op.compare_f64(ctx.tick as f64, expect_number(atom)?)),
        stat => Err(SimError::Config(format!("unknown special stat `{stat}`"))),
    }
}

fn check_atom(atom: &Atom, ctx: &EvalContext<'_>) -> SimResult<bool> {
    let raw = match atom.namespace {
        Namespace::Status => check_status(atom, ctx)?,
        Namespace::Attribute => check_attribute(atom, ctx)?,
        Namespace::Buff => check_buff(atom, ctx)?,
        Namespace::Action => check_action(atom, ctx)?,
        Namespace::Special => check_special(atom, ctx)?,
    };
    Ok(raw != atom.negate)
}

/// Evaluate a tree. Both children of every connective run before the
/// boolean combine, and each leaf outcome is appended to `result_box`.
pub fn eval_tree(
    tree: &ConditionTree,
    ctx: &EvalContext<'_>,
    result_box: &mut ResultBox,
) -> SimResult<bool> {
    match tree {
        ConditionTree::Always => Ok(true),
        ConditionTree::Leaf(atom) => {
            let outcome = check_atom(atom, ctx)?;
            result_box.record(atom, outcome);
            Ok(outcome)
        }
        ConditionTree::And(left, right) => {
            let left = eval_tree(left, ctx, result_box)?;
            let right = eval_tree(right, ctx, result_box)?;
            Ok(left && right)
        }
        ConditionTree::Or(left, right) => {
            let left = eval_tree(left, ctx, result_box)?;
            let right = eval_tree(right, ctx, result_box)?;
            Ok(left || right)
        }
    }
}

/// Scan the priority-ordered list and return the first record whose
/// character can act and whose tree evaluates true. Ties break by
/// script order because the list is already priority-sorted.
pub fn decide(records: &[ActionRecord], ctx: &EvalContext<'_>) -> SimResult<Option<Decision>> {
    for record in records {
        if ctx.preload.is_busy(record.cid, ctx.tick) {
            continue;
        }
        let mut result_box = ResultBox::default();
        if eval_tree(&record.condition, ctx, &mut result_box)? {
            trace!(
                tick = ctx.tick,
                cid = record.cid,
                action = %record.action_id,
                priority = record.priority,
                "rotation decision"
            );
            return Ok(Some(Decision {
                cid: record.cid,
                action_id: record.action_id.clone(),
                forced: matches!(record.kind, crate::apl::parser::ActionKind::Forced),
                priority: record.priority,
                result_box,
            }));
        }
    }
    Ok(None)
}

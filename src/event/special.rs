//! Per-enemy bespoke multi-tick state machines.
//!
//! A special state is driven at three fixed points per tick: before the
//! preload phase, on each character action, and on every received hit.
//! Each state enforces its own cooldown/duration/veto rules internally.
//! Unlike bus listeners, an error here is a hard error: it means the
//! state machine saw a signal it cannot be in, i.e. a corrupted run.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::data::Element;
use crate::preload::{SingleHit, SkillNode};
use crate::sim::error::{SimError, SimResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SpecialUpdateSignal {
    BeforePreload,
    CharacterAction,
    ReceiveHit,
}

/// Context handed to state machines at each update point. Which fields
/// are populated depends on the signal.
#[derive(Debug, Clone, Copy, Default)]
pub struct SpecialCtx<'a> {
    pub tick: u64,
    pub skill: Option<&'a SkillNode>,
    pub hit: Option<&'a SingleHit>,
}

pub trait SpecialState: Send {
    fn name(&self) -> &str;
    fn active(&self) -> bool;
    fn start(&mut self, tick: u64);
    fn update(&mut self, signal: SpecialUpdateSignal, ctx: &SpecialCtx<'_>) -> SimResult<()>;
    fn end(&mut self, tick: u64);
    /// Veto hook: while active, may restrict which anomalies can occur
    /// against this enemy.
    fn allows_anomaly(&self, _element: Element) -> bool {
        true
    }
}

#[derive(Default)]
pub struct SpecialStateManager {
    states: Vec<Box<dyn SpecialState>>,
    /// State indices per signal, in registration order.
    observers: BTreeMap<SpecialUpdateSignal, Vec<usize>>,
}

impl SpecialStateManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, state: Box<dyn SpecialState>, signals: &[SpecialUpdateSignal]) {
        let index = self.states.len();
        debug!(state = state.name(), "registered special state");
        self.states.push(state);
        for &signal in signals {
            let observers = self.observers.entry(signal).or_default();
            if !observers.contains(&index) {
                observers.push(index);
            }
        }
    }

    pub fn broadcast_and_update(
        &mut self,
        signal: SpecialUpdateSignal,
        ctx: &SpecialCtx<'_>,
    ) -> SimResult<()> {
        let Some(observers) = self.observers.get(&signal) else {
            return Ok(());
        };
        for &index in observers {
            self.states[index].update(signal, ctx)?;
        }
        Ok(())
    }

    /// True when no active state vetoes an anomaly of this element.
    pub fn allows_anomaly(&self, element: Element) -> bool {
        self.states
            .iter()
            .filter(|s| s.active())
            .all(|s| s.allows_anomaly(element))
    }

    pub fn state(&self, name: &str) -> Option<&dyn SpecialState> {
        self.states
            .iter()
            .find(|s| s.name() == name)
            .map(|s| s.as_ref())
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// Reference state machine: an elemental seal only specific skills can
/// apply. While present it persists a fixed tick count and gates which
/// anomalies may occur against the target to its own element.
pub struct ElementalSeal {
    name: String,
    element: Element,
    applied_by: BTreeSet<String>,
    duration: u64,
    active: bool,
    applied_tick: u64,
}

impl ElementalSeal {
    pub fn new(
        name: impl Into<String>,
        element: Element,
        applied_by: impl IntoIterator<Item = String>,
        duration: u64,
    ) -> Self {
        Self {
            name: name.into(),
            element,
            applied_by: applied_by.into_iter().collect(),
            duration,
            active: false,
            applied_tick: 0,
        }
    }
}

impl SpecialState for ElementalSeal {
    fn name(&self) -> &str {
        &self.name
    }

    fn active(&self) -> bool {
        self.active
    }

    fn start(&mut self, tick: u64) {
        self.active = true;
        self.applied_tick = tick;
        debug!(seal = %self.name, element = %self.element, tick, "seal applied");
    }

    fn update(&mut self, signal: SpecialUpdateSignal, ctx: &SpecialCtx<'_>) -> SimResult<()> {
        match signal {
            SpecialUpdateSignal::BeforePreload => {
                if self.active && ctx.tick >= self.applied_tick + self.duration {
                    self.end(ctx.tick);
                }
                Ok(())
            }
            SpecialUpdateSignal::CharacterAction => {
                let skill = ctx.skill.ok_or_else(|| {
                    SimError::Invariant(format!(
                        "seal '{}' received a character-action update without a skill",
                        self.name
                    ))
                })?;
                if self.applied_by.contains(skill.tag()) {
                    self.start(ctx.tick);
                }
                Ok(())
            }
            SpecialUpdateSignal::ReceiveHit => Ok(()),
        }
    }

    fn end(&mut self, tick: u64) {
        self.active = false;
        debug!(seal = %self.name, tick, "seal expired");
    }

    fn allows_anomaly(&self, element: Element) -> bool {
        !self.active || element == self.element
    }
}

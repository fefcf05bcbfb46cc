//! Publish-subscribe delivery of named battle signals.
//!
//! Signals carry a tagged payload so each listener can declare the shape
//! it expects instead of sniffing duck-typed arguments. Delivery is in
//! registration order; one listener failing is logged and never aborts
//! delivery to the rest.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::data::Element;
use crate::preload::SkillNode;
use crate::sim::error::{SimError, SimResult};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Signal {
    EnterBattle,
    SwitchIn,
    Parry,
    Stun,
    Anomaly,
    Hit,
}

#[derive(Debug, Clone)]
pub enum EventPayload {
    Character(u32),
    Skill(SkillNode),
    Anomaly { element: Element },
    Hit { skill_tag: String, cid: u32, element: Element },
    None,
}

#[derive(Debug, Clone)]
pub struct Event {
    pub signal: Signal,
    pub payload: EventPayload,
    pub tick: u64,
}

/// A bus subscriber. Implementations cache the latest matching event
/// until it is consumed or cleared.
pub trait Listener: Send {
    fn id(&self) -> &str;
    fn on_event(&mut self, event: &Event) -> SimResult<()>;
    fn cached(&self) -> Option<&Event>;
    fn consume(&mut self) -> Option<Event>;
    fn clear(&mut self);
}

/// Plain listener that remembers the most recent event it received.
#[derive(Debug, Default)]
pub struct LatestEventListener {
    id: String,
    cache: Option<Event>,
}

impl LatestEventListener {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cache: None,
        }
    }
}

impl Listener for LatestEventListener {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_event(&mut self, event: &Event) -> SimResult<()> {
        self.cache = Some(event.clone());
        Ok(())
    }

    fn cached(&self) -> Option<&Event> {
        self.cache.as_ref()
    }

    fn consume(&mut self) -> Option<Event> {
        self.cache.take()
    }

    fn clear(&mut self) {
        self.cache = None;
    }
}

/// Listener that only accepts skill payloads; anything else is an error.
/// Exists so payload-shape mismatches are caught at the bus, per
/// listener, rather than corrupting the subscriber's state.
#[derive(Debug, Default)]
pub struct SkillEventListener {
    id: String,
    cache: Option<Event>,
}

impl SkillEventListener {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            cache: None,
        }
    }

    pub fn cached_skill(&self) -> Option<&SkillNode> {
        match self.cache.as_ref().map(|e| &e.payload) {
            Some(EventPayload::Skill(node)) => Some(node),
            _ => None,
        }
    }
}

impl Listener for SkillEventListener {
    fn id(&self) -> &str {
        &self.id
    }

    fn on_event(&mut self, event: &Event) -> SimResult<()> {
        match &event.payload {
            EventPayload::Skill(_) => {
                self.cache = Some(event.clone());
                Ok(())
            }
            other => Err(SimError::Invariant(format!(
                "listener '{}' expected a skill payload, got {other:?}",
                self.id
            ))),
        }
    }

    fn cached(&self) -> Option<&Event> {
        self.cache.as_ref()
    }

    fn consume(&mut self) -> Option<Event> {
        self.cache.take()
    }

    fn clear(&mut self) {
        self.cache = None;
    }
}

#[derive(Default)]
pub struct EventBus {
    listeners: Vec<Box<dyn Listener>>,
    /// Listener indices per signal, in registration order.
    subscriptions: HashMap<Signal, Vec<usize>>,
    queue: Vec<Event>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, listener: Box<dyn Listener>, signals: &[Signal]) {
        let index = self.listeners.len();
        self.listeners.push(listener);
        for &signal in signals {
            let subs = self.subscriptions.entry(signal).or_default();
            if !subs.contains(&index) {
                subs.push(index);
            }
        }
    }

    /// Deliver one event now, in registration order. A failing listener
    /// is logged individually and skipped.
    pub fn broadcast(&mut self, event: Event) {
        let Some(subs) = self.subscriptions.get(&event.signal) else {
            return;
        };
        for &index in subs {
            let listener = &mut self.listeners[index];
            if let Err(err) = listener.on_event(&event) {
                warn!(
                    listener = listener.id(),
                    signal = ?event.signal,
                    %err,
                    "listener failed, continuing broadcast"
                );
            }
        }
    }

    /// Queue an event for delivery at the broadcast phase of the tick.
    pub fn publish(&mut self, event: Event) {
        self.queue.push(event);
    }

    /// Deliver everything queued during this tick, in publish order.
    pub fn flush(&mut self) {
        let queued = std::mem::take(&mut self.queue);
        for event in queued {
            self.broadcast(event);
        }
    }

    pub fn listener(&self, id: &str) -> Option<&dyn Listener> {
        self.listeners
            .iter()
            .find(|l| l.id() == id)
            .map(|l| l.as_ref())
    }

    pub fn listener_mut(&mut self, id: &str) -> Option<&mut Box<dyn Listener>> {
        self.listeners.iter_mut().find(|l| l.id() == id)
    }

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    /// Signals currently queued, in publish order.
    pub fn queued_signals(&self) -> Vec<Signal> {
        self.queue.iter().map(|e| e.signal).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataRepo;
    use crate::preload::SkillNode;

    fn skill_event(tick: u64) -> Event {
        let repo = DataRepo::demo();
        Event {
            signal: Signal::Parry,
            payload: EventPayload::Skill(SkillNode::new(
                repo.skill("1211_NA_1").unwrap().clone(),
                tick,
            )),
            tick,
        }
    }

    #[test]
    fn latest_event_sticks_until_consumed() {
        let mut bus = EventBus::new();
        bus.register(
            Box::new(LatestEventListener::new("watcher")),
            &[Signal::Parry, Signal::Stun],
        );

        bus.broadcast(skill_event(5));
        bus.broadcast(Event {
            signal: Signal::Stun,
            payload: EventPayload::Character(1211),
            tick: 9,
        });

        let listener = bus.listener_mut("watcher").unwrap();
        assert_eq!(listener.cached().unwrap().tick, 9);
        let consumed = listener.consume().unwrap();
        assert_eq!(consumed.tick, 9);
        assert!(listener.cached().is_none());
    }

    #[test]
    fn failing_listener_does_not_abort_delivery() {
        let mut bus = EventBus::new();
        // Strict listener first, ordinary one second.
        bus.register(Box::new(SkillEventListener::new("strict")), &[Signal::Stun]);
        bus.register(Box::new(LatestEventListener::new("loose")), &[Signal::Stun]);

        bus.broadcast(Event {
            signal: Signal::Stun,
            payload: EventPayload::Character(1211),
            tick: 3,
        });

        // Strict one rejected the payload; loose one still got it.
        assert!(bus.listener("strict").unwrap().cached().is_none());
        assert_eq!(bus.listener("loose").unwrap().cached().unwrap().tick, 3);
    }

    #[test]
    fn flush_delivers_in_publish_order() {
        let mut bus = EventBus::new();
        bus.register(Box::new(LatestEventListener::new("w")), &[Signal::Anomaly]);
        bus.publish(Event {
            signal: Signal::Anomaly,
            payload: EventPayload::Anomaly {
                element: Element::Fire,
            },
            tick: 1,
        });
        bus.publish(Event {
            signal: Signal::Anomaly,
            payload: EventPayload::Anomaly {
                element: Element::Ice,
            },
            tick: 2,
        });
        assert_eq!(bus.queued_len(), 2);
        bus.flush();
        assert_eq!(bus.queued_len(), 0);
        // Latest wins: the ice event was delivered last.
        match &bus.listener("w").unwrap().cached().unwrap().payload {
            EventPayload::Anomaly { element } => assert_eq!(*element, Element::Ice),
            other => panic!("unexpected payload {other:?}"),
        }
    }
}

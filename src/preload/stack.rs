//! Bounded history of recent skill executions.
//!
//! The action stack answers "what did this character just do"; the node
//! stack answers "what is on the field right now". Both keep only the
//! most recent few entries, globally and per character.

use std::collections::HashMap;

use crate::preload::node::SkillNode;

pub const ACTION_STACK_DEPTH: usize = 2;
pub const NODE_STACK_DEPTH: usize = 3;

/// Fixed-capacity push-out stack. Pushing past capacity drops the oldest
/// entry.
#[derive(Debug, Clone)]
pub struct BoundedStack<T> {
    depth: usize,
    items: Vec<T>,
}

impl<T> BoundedStack<T> {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            items: Vec::with_capacity(depth),
        }
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
        if self.items.len() > self.depth {
            self.items.remove(0);
        }
    }

    pub fn pop(&mut self) -> Option<T> {
        self.items.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.items.last()
    }

    pub fn peek_bottom(&self) -> Option<&T> {
        self.items.first()
    }

    /// 1-based index from the top of the stack.
    pub fn peek_index(&self, index: usize) -> Option<&T> {
        if index == 0 || index > self.items.len() {
            return None;
        }
        self.items.get(self.items.len() - index)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Recent proactive actions, globally and per character. Multiple
/// characters may act in the same tick; the personal views keep each
/// character's own history intact while the global view only retains the
/// most recent entries overall.
#[derive(Debug, Clone)]
pub struct ActionStack {
    depth: usize,
    global: BoundedStack<SkillNode>,
    personal: HashMap<u32, BoundedStack<SkillNode>>,
}

impl Default for ActionStack {
    fn default() -> Self {
        Self::new(ACTION_STACK_DEPTH)
    }
}

impl ActionStack {
    pub fn new(depth: usize) -> Self {
        Self {
            depth,
            global: BoundedStack::new(depth),
            personal: HashMap::new(),
        }
    }

    pub fn push(&mut self, node: SkillNode) {
        self.personal
            .entry(node.cid)
            .or_insert_with(|| BoundedStack::new(self.depth))
            .push(node.clone());
        self.global.push(node);
    }

    /// Latest action overall.
    pub fn peek(&self) -> Option<&SkillNode> {
        self.global.peek()
    }

    /// Latest action of one character.
    pub fn peek_for(&self, cid: u32) -> Option<&SkillNode> {
        self.personal.get(&cid).and_then(|stack| stack.peek())
    }

    pub fn global_len(&self) -> usize {
        self.global.len()
    }

    pub fn global_iter(&self) -> std::slice::Iter<'_, SkillNode> {
        self.global.iter()
    }

    pub fn personal_len(&self, cid: u32) -> usize {
        self.personal.get(&cid).map_or(0, |stack| stack.len())
    }

    pub fn reset(&mut self) {
        self.global.clear();
        self.personal.clear();
    }
}

/// Recently resolved nodes, including reactive ones.
#[derive(Debug, Clone)]
pub struct NodeStack {
    stack: BoundedStack<SkillNode>,
}

impl Default for NodeStack {
    fn default() -> Self {
        Self::new(NODE_STACK_DEPTH)
    }
}

impl NodeStack {
    pub fn new(depth: usize) -> Self {
        Self {
            stack: BoundedStack::new(depth),
        }
    }

    pub fn push(&mut self, node: SkillNode) {
        self.stack.push(node);
    }

    pub fn peek(&self) -> Option<&SkillNode> {
        self.stack.peek()
    }

    /// Most recent node that is not incidental follow-up damage.
    pub fn effective_last(&self) -> Option<&SkillNode> {
        let mut index = 1;
        while let Some(node) = self.stack.peek_index(index) {
            if !node.has_label("additional_damage") {
                return Some(node);
            }
            index += 1;
        }
        None
    }

    /// The node currently operating on the field. With several resident
    /// nodes, the newest player-initiated one wins; failing that, the
    /// newest of any kind.
    pub fn on_field_node(&self, tick: u64) -> Option<&SkillNode> {
        let resident: Vec<&SkillNode> =
            self.stack.iter().filter(|n| n.end_tick >= tick).collect();
        if resident.is_empty() {
            return None;
        }
        let active = resident
            .iter()
            .filter(|n| n.active_generation)
            .max_by_key(|n| n.preload_tick);
        match active {
            Some(node) => Some(*node),
            None => resident.iter().max_by_key(|n| n.preload_tick).copied(),
        }
    }

    pub fn last_node_is_end(&self, tick: u64) -> bool {
        match self.stack.peek() {
            None => true,
            Some(node) => node.end_tick <= tick,
        }
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

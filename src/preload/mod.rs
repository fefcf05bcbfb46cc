pub mod engine;
pub mod node;
pub mod stack;

pub use engine::{DueHit, PreloadEngine};
pub use node::{SingleHit, SkillNode};
pub use stack::{ActionStack, BoundedStack, NodeStack, ACTION_STACK_DEPTH, NODE_STACK_DEPTH};

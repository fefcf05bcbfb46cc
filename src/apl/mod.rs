pub mod condition;
pub mod eval;
pub mod parser;

pub use condition::{Atom, CmpOp, CondValue, ConditionTree, Namespace};
pub use eval::{decide, eval_tree, Decision, EvalContext, ResultBox, StatusView};
pub use parser::{
    inject_defaults, load, parse, parse_condition, read_source, renumber_priorities, ActionKind,
    ActionRecord,
};

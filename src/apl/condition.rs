//! Atomic conditions and the boolean tree they compose into.
//!
//! Atom grammar: `[!]namespace.target:stat<op>value` where namespace is
//! one of status/attribute/buff/action/special, `!` negates, and the
//! operator is one of `==  !=  >  <  >=  <=`. Values parse as booleans,
//! numbers, or bare text in that order.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::sim::error::{SimError, SimResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Namespace {
    Status,
    Attribute,
    Buff,
    Action,
    Special,
}

impl Namespace {
    pub fn parse(text: &str) -> Option<Self> {
        match text {
            "status" => Some(Self::Status),
            "attribute" => Some(Self::Attribute),
            "buff" => Some(Self::Buff),
            "action" => Some(Self::Action),
            "special" => Some(Self::Special),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Attribute => "attribute",
            Self::Buff => "buff",
            Self::Action => "action",
            Self::Special => "special",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Ne,
    Gt,
    Lt,
    Ge,
    Le,
}

impl CmpOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Gt => ">",
            Self::Lt => "<",
            Self::Ge => ">=",
            Self::Le => "<=",
        }
    }

    pub fn compare_f64(&self, actual: f64, expected: f64) -> bool {
        match self {
            Self::Eq => (actual - expected).abs() < f64::EPSILON,
            Self::Ne => (actual - expected).abs() >= f64::EPSILON,
            Self::Gt => actual > expected,
            Self::Lt => actual < expected,
            Self::Ge => actual >= expected,
            Self::Le => actual <= expected,
        }
    }

    pub fn compare_bool(&self, actual: bool, expected: bool) -> SimResult<bool> {
        match self {
            Self::Eq => Ok(actual == expected),
            Self::Ne => Ok(actual != expected),
            other => Err(SimError::Config(format!(
                "operator {} is not valid for boolean conditions",
                other.as_str()
            ))),
        }
    }

    pub fn compare_text(&self, actual: &str, expected: &str) -> SimResult<bool> {
        match self {
            Self::Eq => Ok(actual == expected),
            Self::Ne => Ok(actual != expected),
            other => Err(SimError::Config(format!(
                "operator {} is not valid for text conditions",
                other.as_str()
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CondValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl CondValue {
    pub fn parse(text: &str) -> Self {
        match text {
            "true" | "True" => return Self::Bool(true),
            "false" | "False" => return Self::Bool(false),
            _ => {}
        }
        if let Ok(number) = text.parse::<f64>() {
            return Self::Number(number);
        }
        Self::Text(text.to_string())
    }
}

impl fmt::Display for CondValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(v) => write!(f, "{v}"),
            Self::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    write!(f, "{}", *v as i64)
                } else {
                    write!(f, "{v}")
                }
            }
            Self::Text(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Atom {
    pub negate: bool,
    pub namespace: Namespace,
    pub target: String,
    pub stat: String,
    pub op: CmpOp,
    pub value: CondValue,
}

impl Atom {
    /// Parse one atom. Errors carry the offending text so the caller can
    /// log and skip the whole line.
    pub fn parse(text: &str) -> SimResult<Self> {
        let text = text.trim();
        let (negate, rest) = match text.strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, text),
        };

        let dot = rest
            .find('.')
            .ok_or_else(|| SimError::Config(format!("condition `{text}` has no namespace dot")))?;
        let namespace = Namespace::parse(&rest[..dot]).ok_or_else(|| {
            SimError::Config(format!("condition `{text}` has unknown namespace `{}`", &rest[..dot]))
        })?;
        let rest = &rest[dot + 1..];

        let colon = rest
            .find(':')
            .ok_or_else(|| SimError::Config(format!("condition `{text}` has no target colon")))?;
        let target = rest[..colon].to_string();
        let rest = &rest[colon + 1..];
        if target.is_empty() {
            return Err(SimError::Config(format!("condition `{text}` has empty target")));
        }

        // Two-char operators first so `>=` does not parse as `>`.
        let ops = [
            (">=", CmpOp::Ge),
            ("<=", CmpOp::Le),
            ("==", CmpOp::Eq),
            ("!=", CmpOp::Ne),
            (">", CmpOp::Gt),
            ("<", CmpOp::Lt),
        ];
        let (pos, op_text, op) = ops
            .iter()
            .filter_map(|(symbol, op)| rest.find(symbol).map(|pos| (pos, *symbol, *op)))
            .min_by_key(|(pos, symbol, _)| (*pos, std::cmp::Reverse(symbol.len())))
            .ok_or_else(|| SimError::Config(format!("condition `{text}` has no operator")))?;

        let stat = rest[..pos].trim().to_string();
        let value_text = rest[pos + op_text.len()..].trim();
        if stat.is_empty() || value_text.is_empty() {
            return Err(SimError::Config(format!("condition `{text}` is incomplete")));
        }

        Ok(Self {
            negate,
            namespace,
            target,
            stat,
            op,
            value: CondValue::parse(value_text),
        })
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negate {
            write!(f, "!")?;
        }
        write!(
            f,
            "{}.{}:{}{}{}",
            self.namespace.as_str(),
            self.target,
            self.stat,
            self.op.as_str(),
            self.value
        )
    }
}

/// Boolean tree over atoms. Parentheses bind tightest, then `and`, then
/// `or`, each left-associative.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionTree {
    /// Empty condition list; always true.
    Always,
    Leaf(Atom),
    And(Box<ConditionTree>, Box<ConditionTree>),
    Or(Box<ConditionTree>, Box<ConditionTree>),
}

impl ConditionTree {
    fn precedence(&self) -> u8 {
        match self {
            Self::Or(..) => 0,
            Self::And(..) => 1,
            Self::Always | Self::Leaf(..) => 2,
        }
    }

    fn fmt_child(child: &ConditionTree, parent: u8, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if child.precedence() < parent {
            write!(f, "({child})")
        } else {
            write!(f, "{child}")
        }
    }
}

impl fmt::Display for ConditionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => write!(f, "true"),
            Self::Leaf(atom) => write!(f, "{atom}"),
            Self::And(left, right) => {
                Self::fmt_child(left, 1, f)?;
                write!(f, " and ")?;
                Self::fmt_child(right, 1, f)
            }
            Self::Or(left, right) => {
                Self::fmt_child(left, 0, f)?;
                write!(f, " or ")?;
                Self::fmt_child(right, 0, f)
            }
        }
    }
}

//! Rotation script parsing.
//!
//! Each non-blank, non-comment line reads
//! `CID|action-type|action-id|cond1|cond2|...`; the condition segments
//! are joined with `and` and parsed into a [`ConditionTree`]. Malformed
//! lines are logged and skipped, never fatal. Priorities follow script
//! order and are renumbered after per-character default-behavior
//! injection.

use std::fmt;
use std::fs;

use serde::Deserialize;
use tracing::{debug, warn};

use crate::apl::condition::{Atom, ConditionTree};
use crate::data::{AplSource, DataRepo};
use crate::sim::error::{SimError, SimResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionKind {
    /// Schedule the named skill through the normal preload path.
    Action,
    /// Schedule with the forced-trigger flag set on the resulting node.
    Forced,
    /// Any other action-type tag (`action+=`, `action.*`, ...). Carried
    /// verbatim and scheduled through the normal path.
    Other(String),
}

impl ActionKind {
    fn parse(text: &str) -> Self {
        match text {
            "action" => Self::Action,
            "forced" => Self::Forced,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Action => "action",
            Self::Forced => "forced",
            Self::Other(tag) => tag,
        }
    }
}

/// One parsed rotation entry. Immutable after parsing.
#[derive(Debug, Clone)]
pub struct ActionRecord {
    pub cid: u32,
    pub kind: ActionKind,
    pub action_id: String,
    pub condition: ConditionTree,
    pub priority: usize,
}

impl fmt::Display for ActionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}",
            self.cid,
            self.kind.as_str(),
            self.action_id,
            self.condition
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    LParen,
    RParen,
    And,
    Or,
    Atom(String),
}

fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut word = String::new();
    let mut flush = |word: &mut String, tokens: &mut Vec<Token>| {
        if word.is_empty() {
            return;
        }
        match word.as_str() {
            "and" => tokens.push(Token::And),
            "or" => tokens.push(Token::Or),
            other => tokens.push(Token::Atom(other.to_string())),
        }
        word.clear();
    };
    for ch in text.chars() {
        match ch {
            '(' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::LParen);
            }
            ')' => {
                flush(&mut word, &mut tokens);
                tokens.push(Token::RParen);
            }
            ch if ch.is_whitespace() => flush(&mut word, &mut tokens),
            ch => word.push(ch),
        }
    }
    flush(&mut word, &mut tokens);
    tokens
}

struct TreeParser {
    tokens: Vec<Token>,
    pos: usize,
}

impl TreeParser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    // or-expr := and-expr ("or" and-expr)*
    fn parse_or(&mut self) -> SimResult<ConditionTree> {
        let mut node = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.next();
            let rhs = self.parse_and()?;
            node = ConditionTree::Or(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    // and-expr := primary ("and" primary)*
    fn parse_and(&mut self) -> SimResult<ConditionTree> {
        let mut node = self.parse_primary()?;
        while self.peek() == Some(&Token::And) {
            self.next();
            let rhs = self.parse_primary()?;
            node = ConditionTree::And(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> SimResult<ConditionTree> {
        match self.next() {
            Some(Token::LParen) => {
                let node = self.parse_or()?;
                match self.next() {
                    Some(Token::RParen) => Ok(node),
                    _ => Err(SimError::Config("unbalanced parenthesis".into())),
                }
            }
            Some(Token::Atom(text)) => {
                if text == "true" {
                    return Ok(ConditionTree::Always);
                }
                Ok(ConditionTree::Leaf(Atom::parse(&text)?))
            }
            other => Err(SimError::Config(format!(
                "expected condition, found {other:?}"
            ))),
        }
    }
}

/// Parse a joined condition expression into a tree.
pub fn parse_condition(text: &str) -> SimResult<ConditionTree> {
    let tokens = tokenize(text);
    if tokens.is_empty() {
        return Ok(ConditionTree::Always);
    }
    let mut parser = TreeParser { tokens, pos: 0 };
    let tree = parser.parse_or()?;
    if parser.pos != parser.tokens.len() {
        return Err(SimError::Config(format!(
            "trailing tokens after condition `{text}`"
        )));
    }
    Ok(tree)
}

fn strip_comment(line: &str) -> &str {
    match line.find('#') {
        Some(pos) => &line[..pos],
        None => line,
    }
}

fn parse_line(line: &str) -> SimResult<ActionRecord> {
    let mut segments = line.split('|').map(str::trim);
    let cid_text = segments
        .next()
        .ok_or_else(|| SimError::Config("empty line".into()))?;
    let cid: u32 = cid_text
        .parse()
        .map_err(|_| SimError::Config(format!("bad character id `{cid_text}`")))?;
    let kind_text = segments
        .next()
        .ok_or_else(|| SimError::Config("missing action type".into()))?;
    if kind_text.is_empty() {
        return Err(SimError::Config("empty action type".into()));
    }
    let kind = ActionKind::parse(kind_text);
    let action_id = segments
        .next()
        .ok_or_else(|| SimError::Config("missing action id".into()))?
        .to_string();
    if action_id.is_empty() {
        return Err(SimError::Config("empty action id".into()));
    }

    let joined = segments.collect::<Vec<_>>().join(" and ");
    let condition = parse_condition(&joined)?;

    Ok(ActionRecord {
        cid,
        kind,
        action_id,
        condition,
        priority: 0,
    })
}

/// Parse a full script. Bad lines are skipped with a warning so one typo
/// never takes down the whole rotation.
pub fn parse(script: &str) -> Vec<ActionRecord> {
    let mut records = Vec::new();
    for (number, raw) in script.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        match parse_line(line) {
            Ok(record) => records.push(record),
            Err(err) => warn!(line = number + 1, %err, "skipping malformed rotation line"),
        }
    }
    renumber_priorities(&mut records);
    records
}

/// Reassign priorities to match the current list order.
pub fn renumber_priorities(records: &mut [ActionRecord]) {
    for (priority, record) in records.iter_mut().enumerate() {
        record.priority = priority;
    }
}

/// Prepend each roster character's default-behavior records, then
/// renumber. Defaults are a fixed high-priority prefix loaded from the
/// data repository's `default_apl` directory; a missing file simply
/// means that character has no defaults.
pub fn inject_defaults(
    records: Vec<ActionRecord>,
    cids: &[u32],
    repo: &DataRepo,
) -> Vec<ActionRecord> {
    let Some(dir) = repo.default_apl_dir.as_ref() else {
        let mut records = records;
        renumber_priorities(&mut records);
        return records;
    };

    let mut merged = Vec::new();
    for &cid in cids {
        let path = dir.join(format!("{cid}.apl"));
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        let defaults = parse(&text);
        debug!(cid, count = defaults.len(), "injected default rotation prefix");
        merged.extend(defaults.into_iter().filter(|r| r.cid == cid));
    }
    merged.extend(records);
    renumber_priorities(&mut merged);
    merged
}

#[derive(Debug, Deserialize)]
struct AplToml {
    apl_logic: AplLogic,
}

#[derive(Debug, Deserialize)]
struct AplLogic {
    logic: String,
}

/// Read script text from a rotation source. TOML files carry the script
/// under `apl_logic.logic`; anything else is treated as plain text.
pub fn read_source(source: &AplSource) -> SimResult<String> {
    match source {
        AplSource::Inline(text) => Ok(text.clone()),
        AplSource::File(path) => {
            let text = fs::read_to_string(path)?;
            if path.extension().and_then(|e| e.to_str()) == Some("toml") {
                let parsed: AplToml = toml::from_str(&text)
                    .map_err(|err| SimError::Config(format!("bad rotation file: {err}")))?;
                return Ok(parsed.apl_logic.logic);
            }
            Ok(text)
        }
    }
}

/// Convenience: load, parse, and inject defaults in one step.
pub fn load(source: &AplSource, cids: &[u32], repo: &DataRepo) -> SimResult<Vec<ActionRecord>> {
    let text = read_source(source)?;
    Ok(inject_defaults(parse(&text), cids, repo))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_lines_in_priority_order() {
        let script = "\
# opener
1211|action|1211_E_EX|attribute.1211:energy>=60
1091|action|1091_NA_1
1300|forced|1300_CoAttack|status.enemy:stun==true
";
        let records = parse(script);
        assert_eq!(records.len(), 3);
        assert_eq!(records[0].cid, 1211);
        assert_eq!(records[0].priority, 0);
        assert_eq!(records[1].condition, ConditionTree::Always);
        assert_eq!(records[2].kind, ActionKind::Forced);
        assert_eq!(records[2].priority, 2);
    }

    #[test]
    fn malformed_lines_are_skipped_not_fatal() {
        let script = "\
1211|action|1211_NA_1
garbage line without pipes
1091||1091_NA_1
1091|action|1091_NA_1|bogus.enemy:stun==true
1300|action|1300_NA_1
";
        let records = parse(script);
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].cid, 1211);
        assert_eq!(records[1].cid, 1300);
        assert_eq!(records[1].priority, 1);
    }

    #[test]
    fn unrecognized_action_types_are_kept_verbatim() {
        let records = parse("1211|action+=|1211_NA_1|status.enemy:stun==True");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, ActionKind::Other("action+=".to_string()));
        assert_eq!(records[0].kind.as_str(), "action+=");
    }

    #[test]
    fn extra_segments_join_with_and() {
        let script = "1211|action|1211_E_EX|attribute.1211:energy>=60|status.enemy:stun==false";
        let records = parse(script);
        assert!(matches!(records[0].condition, ConditionTree::And(..)));
    }

    #[test]
    fn parens_bind_tighter_than_and_than_or() {
        let tree = parse_condition(
            "buff.1211:300>=1 or buff.1211:301>=1 and status.enemy:stun==true",
        )
        .unwrap();
        // `or` is the root because `and` binds tighter.
        assert!(matches!(tree, ConditionTree::Or(..)));

        let tree = parse_condition(
            "(buff.1211:300>=1 or buff.1211:301>=1) and status.enemy:stun==true",
        )
        .unwrap();
        assert!(matches!(tree, ConditionTree::And(..)));
    }

    #[test]
    fn operators_are_left_associative() {
        let tree =
            parse_condition("buff.1:a>=1 or buff.1:b>=1 or buff.1:c>=1").unwrap();
        match tree {
            ConditionTree::Or(left, _) => assert!(matches!(*left, ConditionTree::Or(..))),
            other => panic!("expected or at root, got {other:?}"),
        }
    }

    #[test]
    fn unbalanced_parens_fail() {
        assert!(parse_condition("(buff.1:a>=1 and buff.1:b>=1").is_err());
        assert!(parse_condition("buff.1:a>=1)").is_err());
    }

    #[test]
    fn canonical_display_round_trips() {
        let line = "1211|action|1211_E_EX|(buff.1211:300>=1 or buff.1211:301>=1) and attribute.1211:energy>=60";
        let records = parse(line);
        let rendered = records[0].to_string();
        let reparsed = parse(&rendered);
        assert_eq!(reparsed[0].condition, records[0].condition);
        assert_eq!(rendered, parse(&rendered)[0].to_string());
    }

    #[test]
    fn renumber_is_dense_and_ordered() {
        let script = "1211|action|a\n1211|action|b\n1211|action|c";
        let mut records = parse(script);
        records.remove(1);
        renumber_priorities(&mut records);
        let priorities: Vec<_> = records.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![0, 1]);
    }
}

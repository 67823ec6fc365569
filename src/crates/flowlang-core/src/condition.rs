//! The condition language used on edges (§4.F): an OR of ANDs of comparison clauses,
//! evaluated against an `(outcome, context)` pair.
//!
//! Grammar (low to high precedence): `expr := and ("||" and)*`, `and := clause ("&&"
//! clause)*`, `clause := "!"? key operator value | "!"? key`. Operator recognition is
//! first-match over a fixed, ordered list so that e.g. `contains` is tried before the
//! single-character operators it could otherwise be confused with.

use std::collections::HashMap;

use regex::Regex;
use serde_json::Value;

use crate::graph::Outcome;

/// One `key operator value` comparison, or a bare-key truthiness check, with optional
/// leading negation.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub negated: bool,
    pub key: String,
    pub operator: Option<Operator>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    NotEq,
    Contains,
    Matches,
    Lt,
    Gt,
    Le,
    Ge,
}

/// A fully parsed condition: an OR of AND-groups of clauses.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Condition {
    pub groups: Vec<Vec<Clause>>,
}

/// Ordered, first-match list of recognised operators. `Contains`/`Matches` must be
/// tried before the symbol operators so they are never mistaken for a key fragment.
const OPERATORS: [(&str, Operator); 8] = [
    ("contains", Operator::Contains),
    ("matches", Operator::Matches),
    ("<=", Operator::Le),
    (">=", Operator::Ge),
    ("!=", Operator::NotEq),
    ("<", Operator::Lt),
    (">", Operator::Gt),
    ("=", Operator::Eq),
];

/// Parse a condition string. Returns `None` only for an empty/whitespace expression,
/// which evaluates to `true` unconditionally (see [`evaluate`]).
pub fn parse(src: &str) -> Result<Condition, String> {
    let trimmed = src.trim();
    if trimmed.is_empty() {
        return Ok(Condition::default());
    }
    let mut groups = Vec::new();
    for and_part in split_top_level(trimmed, "||") {
        let mut clauses = Vec::new();
        for clause_src in split_top_level(&and_part, "&&") {
            clauses.push(parse_clause(clause_src.trim())?);
        }
        groups.push(clauses);
    }
    Ok(Condition { groups })
}

/// `validateConditionSyntax`: `None` for a valid expression, `Some(reason)` otherwise.
pub fn validate_syntax(src: &str) -> Option<String> {
    parse(src).err()
}

fn split_top_level(src: &str, sep: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut depth_quote: Option<char> = None;
    let mut current = String::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if let Some(q) = depth_quote {
            current.push(chars[i]);
            if chars[i] == q {
                depth_quote = None;
            }
            i += 1;
            continue;
        }
        if chars[i] == '"' || chars[i] == '\'' {
            depth_quote = Some(chars[i]);
            current.push(chars[i]);
            i += 1;
            continue;
        }
        if chars[i..].iter().collect::<String>().starts_with(sep) {
            parts.push(current.trim().to_string());
            current = String::new();
            i += sep.len();
            continue;
        }
        current.push(chars[i]);
        i += 1;
    }
    parts.push(current.trim().to_string());
    parts.into_iter().filter(|p| !p.is_empty()).collect()
}

fn parse_clause(src: &str) -> Result<Clause, String> {
    if src.is_empty() {
        return Err("empty clause".to_string());
    }

    // A leading '!' is negation only when not immediately followed by '='.
    let (negated, rest) = if let Some(stripped) = src.strip_prefix('!') {
        if stripped.starts_with('=') {
            (false, src)
        } else {
            (true, stripped.trim_start())
        }
    } else {
        (false, src)
    };

    for (token, op) in OPERATORS {
        if let Some(idx) = find_operator(rest, token) {
            let key = rest[..idx].trim().to_string();
            let value_raw = rest[idx + token.len()..].trim();
            if key.is_empty() {
                return Err(format!("empty key in clause '{src}'"));
            }
            let value = strip_quotes(value_raw);
            if op == Operator::Matches && Regex::new(&value).is_err() {
                return Err(format!("invalid regex '{value}' in clause '{src}'"));
            }
            return Ok(Clause {
                negated,
                key,
                operator: Some(op),
                value: Some(value),
            });
        }
    }

    if rest.trim().is_empty() {
        return Err(format!("empty key in clause '{src}'"));
    }

    Ok(Clause {
        negated,
        key: rest.trim().to_string(),
        operator: None,
        value: None,
    })
}

/// Find the first occurrence of `op` outside quotes, scanning left to right.
fn find_operator(src: &str, op: &str) -> Option<usize> {
    let chars: Vec<char> = src.chars().collect();
    let op_chars: Vec<char> = op.chars().collect();
    let mut in_quote: Option<char> = None;
    let mut i = 0;
    while i < chars.len() {
        if let Some(q) = in_quote {
            if chars[i] == q {
                in_quote = None;
            }
            i += 1;
            continue;
        }
        if chars[i] == '"' || chars[i] == '\'' {
            in_quote = Some(chars[i]);
            i += 1;
            continue;
        }
        if chars[i..].starts_with(op_chars.as_slice()) {
            // Byte offset, not char offset, for slicing `src` later.
            let byte_idx: usize = chars[..i].iter().map(|c| c.len_utf8()).sum();
            return Some(byte_idx);
        }
        i += 1;
    }
    None
}

fn strip_quotes(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2 {
        let bytes = s.as_bytes();
        let first = bytes[0];
        let last = bytes[bytes.len() - 1];
        if (first == b'"' && last == b'"') || (first == b'\'' && last == b'\'') {
            return s[1..s.len() - 1].to_string();
        }
    }
    s.to_string()
}

/// Resolve a condition clause's key against the outcome and context.
fn resolve_key(key: &str, outcome: &Outcome, context: &HashMap<String, Value>) -> String {
    match key {
        "outcome" => outcome.status_str().to_string(),
        "preferred_label" => outcome.preferred_label.clone().unwrap_or_default(),
        other => {
            let bare = other.strip_prefix("context.").unwrap_or(other);
            context
                .get(bare)
                .map(stringify_value)
                .unwrap_or_default()
        }
    }
}

fn stringify_value(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn eval_clause(clause: &Clause, outcome: &Outcome, context: &HashMap<String, Value>) -> bool {
    let resolved = resolve_key(&clause.key, outcome, context);
    let raw = match (&clause.operator, &clause.value) {
        (None, None) => !resolved.is_empty(),
        (Some(op), Some(value)) => match op {
            Operator::Eq => resolved == *value,
            Operator::NotEq => resolved != *value,
            Operator::Contains => resolved.contains(value.as_str()),
            Operator::Matches => Regex::new(value).map(|re| re.is_match(&resolved)).unwrap_or(false),
            Operator::Lt | Operator::Gt | Operator::Le | Operator::Ge => {
                match (resolved.parse::<f64>(), value.parse::<f64>()) {
                    (Ok(a), Ok(b)) if a.is_finite() && b.is_finite() => match op {
                        Operator::Lt => a < b,
                        Operator::Gt => a > b,
                        Operator::Le => a <= b,
                        Operator::Ge => a >= b,
                        _ => unreachable!(),
                    },
                    _ => false,
                }
            }
        },
        _ => false,
    };
    if clause.negated {
        !raw
    } else {
        raw
    }
}

/// Evaluate a parsed condition. An empty condition (no groups) is always `true`; a
/// non-empty one is true iff any AND-group is fully true.
pub fn evaluate(condition: &Condition, outcome: &Outcome, context: &HashMap<String, Value>) -> bool {
    if condition.groups.is_empty() {
        return true;
    }
    condition
        .groups
        .iter()
        .any(|group| group.iter().all(|clause| eval_clause(clause, outcome, context)))
}

/// Convenience: parse and evaluate a raw condition string in one call, used by edge
/// selection (§4.G) where conditions are stored as unparsed strings on the edge.
pub fn evaluate_str(src: &str, outcome: &Outcome, context: &HashMap<String, Value>) -> bool {
    match parse(src) {
        Ok(cond) => evaluate(&cond, outcome, context),
        Err(_) => false,
    }
}

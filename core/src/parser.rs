//! Text to [`QueryNode`] parsing.
//!
//! Operators have no relative precedence: the query is split at the leftmost
//! top-level `AND NOT`, `AND` or `OR` token, so `a OR b AND c` groups as
//! `a OR (b AND c)`. Parenthesize to force any other grouping.

use crate::ast::{BinaryOp, QueryNode};
use crate::error::{QueryError, Result};
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Alternation order matters: at one position "AND NOT" must win over "AND".
    // Text edges count as delimiters so a dangling operator is still seen.
    static ref OPERATOR: Regex = Regex::new(r"(?:^|\s+)(AND NOT|AND|OR)(?:\s+|$)").expect("valid regex");
}

/// Parse `text` into a query tree, lower-casing leaf words when `ignore_case` is set.
pub fn parse(text: &str, ignore_case: bool) -> Result<QueryNode> {
    let node = parse_expr(text, ignore_case)?;
    tracing::debug!(query = text, parsed = %node, "parsed query");
    Ok(node)
}

/// True when `s` never closes more parentheses than it has opened and ends balanced.
pub fn is_balanced(s: &str) -> bool {
    let mut depth: i64 = 0;
    for c in s.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

/// Remove whole-string wrapping parentheses, as many layers as enclose the text.
fn strip_brackets(mut s: &str) -> &str {
    while s.len() >= 2 && s.starts_with('(') && s.ends_with(')') && is_balanced(&s[1..s.len() - 1]) {
        s = s[1..s.len() - 1].trim();
    }
    s
}

fn leaf(text: &str, ignore_case: bool) -> QueryNode {
    if ignore_case {
        QueryNode::Word(text.to_lowercase())
    } else {
        QueryNode::Word(text.to_string())
    }
}

fn parse_expr(text: &str, ignore_case: bool) -> Result<QueryNode> {
    let q = strip_brackets(text.trim());
    if q.is_empty() {
        return Err(QueryError::Parse("empty query".into()));
    }

    if q.len() >= 2 && q.starts_with('"') && q.ends_with('"') && q.matches('"').count() == 2 {
        return Ok(leaf(&q[1..q.len() - 1], ignore_case));
    }

    if let Some(rest) = q.strip_prefix("NOT ").or_else(|| q.strip_prefix("not ")) {
        return Ok(QueryNode::not(parse_expr(rest, ignore_case)?));
    }

    let split = OPERATOR.captures_iter(q).find_map(|caps| {
        let (whole, token) = (caps.get(0)?, caps.get(1)?);
        let (left, right) = (&q[..whole.start()], &q[whole.end()..]);
        (is_balanced(left) && is_balanced(right)).then_some((left, token.as_str(), right))
    });

    let Some((left, token, right)) = split else {
        if !is_balanced(q) {
            return Err(QueryError::Parse(format!("unbalanced brackets in '{q}'")));
        }
        return Ok(leaf(q, ignore_case));
    };

    if left.trim().is_empty() || right.trim().is_empty() {
        return Err(QueryError::Parse(format!("empty operand for '{token}' in '{q}'")));
    }

    let op: BinaryOp = token.parse().map_err(|_| QueryError::Parse(format!("unrecognized operator '{token}'")))?;
    Ok(QueryNode::binary(op, parse_expr(left, ignore_case)?, parse_expr(right, ignore_case)?))
}

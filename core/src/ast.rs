use crate::error::{QueryError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Binary boolean operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BinaryOp {
    #[serde(rename = "AND")]
    And,
    #[serde(rename = "OR")]
    Or,
    #[serde(rename = "AND NOT")]
    AndNot,
}

impl BinaryOp {
    /// Expansion order: AND, OR, AND NOT.
    pub const ALL: [BinaryOp; 3] = [BinaryOp::And, BinaryOp::Or, BinaryOp::AndNot];

    pub fn as_str(&self) -> &'static str {
        match self {
            BinaryOp::And => "AND",
            BinaryOp::Or => "OR",
            BinaryOp::AndNot => "AND NOT",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for BinaryOp {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> {
        let normalized = s.split_whitespace().collect::<Vec<_>>().join(" ").to_uppercase();
        match normalized.as_str() {
            "AND" => Ok(BinaryOp::And),
            "OR" => Ok(BinaryOp::Or),
            "AND NOT" => Ok(BinaryOp::AndNot),
            _ => Err(QueryError::InvalidOperator(s.to_string())),
        }
    }
}

/// A node of a boolean query tree. Nodes are never mutated once built;
/// rewrites produce new trees.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryNode {
    Word(String),
    Not(Box<QueryNode>),
    Binary { op: BinaryOp, left: Box<QueryNode>, right: Box<QueryNode> },
}

impl QueryNode {
    pub fn word(term: impl Into<String>) -> Self { QueryNode::Word(term.into()) }

    pub fn not(child: QueryNode) -> Self { QueryNode::Not(Box::new(child)) }

    pub fn binary(op: BinaryOp, left: QueryNode, right: QueryNode) -> Self {
        QueryNode::Binary { op, left: Box::new(left), right: Box::new(right) }
    }

    pub fn and(left: QueryNode, right: QueryNode) -> Self { Self::binary(BinaryOp::And, left, right) }

    pub fn or(left: QueryNode, right: QueryNode) -> Self { Self::binary(BinaryOp::Or, left, right) }

    pub fn and_not(left: QueryNode, right: QueryNode) -> Self { Self::binary(BinaryOp::AndNot, left, right) }

    /// Term text of a `Word` leaf.
    pub fn as_word(&self) -> Option<&str> {
        match self {
            QueryNode::Word(term) => Some(term),
            _ => None,
        }
    }

    /// Operand of a `Not` node.
    pub fn child(&self) -> Option<&QueryNode> {
        match self {
            QueryNode::Not(child) => Some(child),
            _ => None,
        }
    }

    pub fn op(&self) -> Option<BinaryOp> {
        match self {
            QueryNode::Binary { op, .. } => Some(*op),
            _ => None,
        }
    }

    pub fn left(&self) -> Option<&QueryNode> {
        match self {
            QueryNode::Binary { left, .. } => Some(left),
            _ => None,
        }
    }

    pub fn right(&self) -> Option<&QueryNode> {
        match self {
            QueryNode::Binary { right, .. } => Some(right),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool { matches!(self, QueryNode::Word(_)) }

    fn is_negation(&self) -> bool { matches!(self, QueryNode::Not(_)) }

    /// Number of `Word` leaves in this subtree.
    pub fn leaf_count(&self) -> usize {
        match self {
            QueryNode::Word(_) => 1,
            QueryNode::Not(child) => child.leaf_count(),
            QueryNode::Binary { left, right, .. } => left.leaf_count() + right.leaf_count(),
        }
    }

    /// Height of the subtree; a lone leaf has depth 1.
    pub fn depth(&self) -> usize {
        match self {
            QueryNode::Word(_) => 1,
            QueryNode::Not(child) => 1 + child.depth(),
            QueryNode::Binary { left, right, .. } => 1 + left.depth().max(right.depth()),
        }
    }

    /// Render with chains of nested ORs collapsed into a single parenthesized list.
    pub fn to_flattened_string(&self) -> String {
        match self {
            QueryNode::Word(term) => term.clone(),
            QueryNode::Not(child) => format!("NOT {}", child.to_flattened_string()),
            QueryNode::Binary { op: BinaryOp::Or, .. } => {
                let mut operands = Vec::new();
                self.collect_or_operands(&mut operands);
                format!("({})", operands.join(" OR "))
            }
            QueryNode::Binary { op, left, right } => {
                format!("({} {} {})", left.flattened_operand(), op, right.flattened_operand())
            }
        }
    }

    fn collect_or_operands(&self, out: &mut Vec<String>) {
        if let QueryNode::Binary { op: BinaryOp::Or, left, right } = self {
            for side in [left, right] {
                if side.op() == Some(BinaryOp::Or) {
                    side.collect_or_operands(out);
                } else {
                    out.push(side.flattened_operand());
                }
            }
        }
    }

    // A bare `NOT x` operand would swallow the rest of the expression when
    // reparsed, so negations are bracketed inside binary nodes.
    fn flattened_operand(&self) -> String {
        if self.is_negation() {
            format!("({})", self.to_flattened_string())
        } else {
            self.to_flattened_string()
        }
    }
}

struct Operand<'a>(&'a QueryNode);

impl fmt::Display for Operand<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_negation() {
            write!(f, "({})", self.0)
        } else {
            write!(f, "{}", self.0)
        }
    }
}

/// Canonical, fully parenthesized infix form.
impl fmt::Display for QueryNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryNode::Word(term) => f.write_str(term),
            QueryNode::Not(child) => write!(f, "NOT {child}"),
            QueryNode::Binary { op, left, right } => write!(f, "({} {op} {})", Operand(left), Operand(right)),
        }
    }
}

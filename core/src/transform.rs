//! Path-addressed rewriting of query trees.
//!
//! Every rewrite returns a new tree: the nodes along the path are rebuilt and
//! all untouched branches are deep-cloned.

use crate::ast::{BinaryOp, QueryNode};
use crate::error::{QueryError, Result};
use crate::parser;
use std::fmt;
use std::str::FromStr;

/// One step from a node to one of its children. `Left` also selects the
/// single operand of a `NOT`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Left,
    Right,
}

impl Step {
    pub fn index(&self) -> u8 {
        match self {
            Step::Left => 0,
            Step::Right => 1,
        }
    }
}

impl TryFrom<u8> for Step {
    type Error = QueryError;

    fn try_from(i: u8) -> Result<Self> {
        match i {
            0 => Ok(Step::Left),
            1 => Ok(Step::Right),
            other => Err(QueryError::InvalidPath(format!("selector {other} is neither 0 nor 1"))),
        }
    }
}

/// Root-to-node address. Only meaningful for the tree it was computed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct Path(Vec<Step>);

impl Path {
    pub fn root() -> Self { Self::default() }

    /// Build a path from 0/1 selectors.
    pub fn from_indices(indices: &[u8]) -> Result<Self> {
        indices.iter().map(|&i| Step::try_from(i)).collect::<Result<Vec<_>>>().map(Path)
    }

    pub fn steps(&self) -> &[Step] { &self.0 }

    pub fn indices(&self) -> Vec<u8> { self.0.iter().map(Step::index).collect() }

    /// This path extended by one step.
    pub fn child(&self, step: Step) -> Path { self.0.iter().copied().chain([step]).collect() }

    pub fn len(&self) -> usize { self.0.len() }

    pub fn is_empty(&self) -> bool { self.0.is_empty() }
}

impl FromIterator<Step> for Path {
    fn from_iter<I: IntoIterator<Item = Step>>(iter: I) -> Self { Path(iter.into_iter().collect()) }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|s| s.index().to_string()).collect();
        write!(f, "[{}]", parts.join(", "))
    }
}

fn step_error(node: &QueryNode, step: Step, depth: usize) -> QueryError {
    let kind = match node {
        QueryNode::Word(_) => "a word",
        QueryNode::Not(_) => "a NOT node",
        QueryNode::Binary { .. } => "a binary node",
    };
    QueryError::InvalidPath(format!("selector {} at depth {depth} cannot descend into {kind}", step.index()))
}

/// The node addressed by `path`.
pub fn subtree_at<'a>(node: &'a QueryNode, path: &Path) -> Result<&'a QueryNode> {
    let mut current = node;
    for (depth, &step) in path.steps().iter().enumerate() {
        current = match (current, step) {
            (QueryNode::Not(child), Step::Left) => child.as_ref(),
            (QueryNode::Binary { left, .. }, Step::Left) => left.as_ref(),
            (QueryNode::Binary { right, .. }, Step::Right) => right.as_ref(),
            (other, step) => return Err(step_error(other, step, depth)),
        };
    }
    Ok(current)
}

/// Replace the node at `path` with `(old op new_word)`.
pub fn expand_at(node: &QueryNode, path: &Path, new_word: &str, op: BinaryOp) -> Result<QueryNode> {
    let expanded = rebuild(node, path.steps(), 0, new_word, op)?;
    tracing::debug!(%path, %op, new_word, result = %expanded, "expanded query");
    Ok(expanded)
}

fn rebuild(node: &QueryNode, steps: &[Step], depth: usize, new_word: &str, op: BinaryOp) -> Result<QueryNode> {
    let Some((&step, rest)) = steps.split_first() else {
        return Ok(QueryNode::binary(op, node.clone(), QueryNode::word(new_word)));
    };
    match (node, step) {
        (QueryNode::Not(child), Step::Left) => Ok(QueryNode::not(rebuild(child, rest, depth + 1, new_word, op)?)),
        (QueryNode::Binary { op: kind, left, right }, Step::Left) => Ok(QueryNode::binary(
            *kind,
            rebuild(left, rest, depth + 1, new_word, op)?,
            (**right).clone(),
        )),
        (QueryNode::Binary { op: kind, left, right }, Step::Right) => Ok(QueryNode::binary(
            *kind,
            (**left).clone(),
            rebuild(right, rest, depth + 1, new_word, op)?,
        )),
        (other, step) => Err(step_error(other, step, depth)),
    }
}

/// Paths of all `Word` leaves in pre-order, left before right.
pub fn leaf_paths(node: &QueryNode) -> Vec<Path> {
    let mut paths = Vec::new();
    collect_leaf_paths(node, &mut Vec::new(), &mut paths);
    paths
}

fn collect_leaf_paths(node: &QueryNode, current: &mut Vec<Step>, out: &mut Vec<Path>) {
    match node {
        QueryNode::Word(_) => out.push(current.iter().copied().collect()),
        QueryNode::Not(child) => {
            current.push(Step::Left);
            collect_leaf_paths(child, current, out);
            current.pop();
        }
        QueryNode::Binary { left, right, .. } => {
            current.push(Step::Left);
            collect_leaf_paths(left, current, out);
            current.pop();
            current.push(Step::Right);
            collect_leaf_paths(right, current, out);
            current.pop();
        }
    }
}

/// A single-leaf rewrite produced by [`all_expansions`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expansion {
    pub path: Path,
    pub op: BinaryOp,
    pub node: QueryNode,
}

/// Every tree obtained by combining one leaf with `new_word` under one
/// operator: `3 * leaf_count` results, leaf-major in pre-order, then AND, OR, AND NOT.
pub fn all_expansions(node: &QueryNode, new_word: &str) -> Vec<Expansion> {
    expansions_under(node, &Path::root(), new_word)
}

fn expansions_under(node: &QueryNode, at: &Path, new_word: &str) -> Vec<Expansion> {
    match node {
        QueryNode::Word(_) => BinaryOp::ALL
            .iter()
            .map(|&op| Expansion {
                path: at.clone(),
                op,
                node: QueryNode::binary(op, node.clone(), QueryNode::word(new_word)),
            })
            .collect(),
        QueryNode::Not(child) => expansions_under(child, &at.child(Step::Left), new_word)
            .into_iter()
            .map(|e| Expansion { node: QueryNode::not(e.node), ..e })
            .collect(),
        QueryNode::Binary { op: kind, left, right } => {
            let lefts = expansions_under(left, &at.child(Step::Left), new_word)
                .into_iter()
                .map(|e| Expansion { node: QueryNode::binary(*kind, e.node, (**right).clone()), ..e });
            let rights = expansions_under(right, &at.child(Step::Right), new_word)
                .into_iter()
                .map(|e| Expansion { node: QueryNode::binary(*kind, (**left).clone(), e.node), ..e });
            lefts.chain(rights).collect()
        }
    }
}

/// Exclusive owner of a query's root node.
#[derive(Clone, PartialEq, Eq)]
pub struct QueryTree {
    root: QueryNode,
}

impl QueryTree {
    pub fn parse(text: &str, ignore_case: bool) -> Result<Self> {
        Ok(Self { root: parser::parse(text, ignore_case)? })
    }

    pub fn from_root(root: QueryNode) -> Self { Self { root } }

    pub fn root(&self) -> &QueryNode { &self.root }

    pub fn into_root(self) -> QueryNode { self.root }

    /// Install a new root, handing back the previous one.
    pub fn replace_root(&mut self, root: QueryNode) -> QueryNode { std::mem::replace(&mut self.root, root) }

    pub fn to_query_string(&self, flattened: bool) -> String {
        if flattened {
            self.root.to_flattened_string()
        } else {
            self.root.to_string()
        }
    }

    pub fn repr(&self) -> String { format!("QueryTree(\"{}\")", self.root.to_flattened_string()) }

    pub fn subtree_at(&self, path: &Path) -> Result<&QueryNode> { subtree_at(&self.root, path) }

    pub fn leaf_paths(&self) -> Vec<Path> { leaf_paths(&self.root) }

    /// Rewrite this tree in place; on error the tree is left as it was.
    pub fn expand(&mut self, path: &Path, new_word: &str, op: BinaryOp) -> Result<()> {
        self.root = expand_at(&self.root, path, new_word, op)?;
        Ok(())
    }

    /// Like [`QueryTree::expand`], with the operator given as a token such as `"AND NOT"`.
    pub fn expand_str(&mut self, path: &Path, new_word: &str, op: &str) -> Result<()> {
        self.expand(path, new_word, op.parse()?)
    }

    pub fn expanded(&self, path: &Path, new_word: &str, op: BinaryOp) -> Result<QueryTree> {
        Ok(QueryTree { root: expand_at(&self.root, path, new_word, op)? })
    }

    pub fn generate_all_expansions(&self, new_word: &str) -> Vec<QueryTree> {
        all_expansions(&self.root, new_word).into_iter().map(|e| QueryTree { root: e.node }).collect()
    }
}

impl FromStr for QueryTree {
    type Err = QueryError;

    fn from_str(s: &str) -> Result<Self> { QueryTree::parse(s, true) }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.root.to_flattened_string()) }
}

impl fmt::Debug for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.repr()) }
}

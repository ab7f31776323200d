//! Query evaluation by merging sorted postings lists.
//!
//! Every operand handed to the set helpers must be strictly ascending; the
//! index keeps its postings that way, and every helper preserves it.

use crate::ast::{BinaryOp, QueryNode};
use crate::index::{DocId, InvertedIndex};
use std::cmp::Ordering;

/// Resolve `node` to the ascending ids of the documents it matches.
pub fn evaluate(node: &QueryNode, index: &InvertedIndex) -> Vec<DocId> {
    match node {
        QueryNode::Word(term) => index.get_postings(term),
        QueryNode::Not(child) => complement(&evaluate(child, index), index.get_document_count()),
        QueryNode::Binary { op, left, right } => {
            let (l, r) = (evaluate(left, index), evaluate(right, index));
            match op {
                BinaryOp::And => intersect(&l, &r),
                BinaryOp::Or => union(&l, &r),
                BinaryOp::AndNot => difference(&l, &r),
            }
        }
    }
}

/// Number of matching documents. Negations and the outermost merge are
/// counted without building the result list.
pub fn count(node: &QueryNode, index: &InvertedIndex) -> usize {
    match node {
        QueryNode::Word(term) => index.postings(term).len(),
        QueryNode::Not(child) => index.get_document_count() as usize - count(child, index),
        QueryNode::Binary { op, left, right } => {
            let (l, r) = (evaluate(left, index), evaluate(right, index));
            let common = intersection_size(&l, &r);
            match op {
                BinaryOp::And => common,
                BinaryOp::Or => l.len() + r.len() - common,
                BinaryOp::AndNot => l.len() - common,
            }
        }
    }
}

pub fn intersect(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len().min(b.len()));
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out
}

pub fn union(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len() + b.len());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => {
                out.push(a[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(b[j]);
                j += 1;
            }
            Ordering::Equal => {
                out.push(a[i]);
                i += 1;
                j += 1;
            }
        }
    }
    out.extend_from_slice(&a[i..]);
    out.extend_from_slice(&b[j..]);
    out
}

/// Ids in `a` that are not in `b`.
pub fn difference(a: &[DocId], b: &[DocId]) -> Vec<DocId> {
    let mut out = Vec::with_capacity(a.len());
    let mut j = 0;
    for &id in a {
        while j < b.len() && b[j] < id {
            j += 1;
        }
        if j >= b.len() || b[j] != id {
            out.push(id);
        }
    }
    out
}

/// Ids in `0..num_docs` that are not in `ids`.
pub fn complement(ids: &[DocId], num_docs: DocId) -> Vec<DocId> {
    let mut out = Vec::with_capacity((num_docs as usize).saturating_sub(ids.len()));
    let mut excluded = ids.iter().peekable();
    for id in 0..num_docs {
        if excluded.next_if_eq(&&id).is_none() {
            out.push(id);
        }
    }
    out
}

fn intersection_size(a: &[DocId], b: &[DocId]) -> usize {
    let (mut i, mut j, mut n) = (0, 0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            Ordering::Less => i += 1,
            Ordering::Greater => j += 1,
            Ordering::Equal => {
                n += 1;
                i += 1;
                j += 1;
            }
        }
    }
    n
}

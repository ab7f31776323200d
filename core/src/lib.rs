//! Boolean query engine: parse `AND` / `OR` / `AND NOT` / `NOT` queries, evaluate
//! them against an append-only inverted index, and derive expanded queries.

pub mod ast;
pub mod error;
pub mod eval;
pub mod index;
pub mod parser;
pub mod persist;
pub mod tokenizer;
pub mod transform;

pub use ast::{BinaryOp, QueryNode};
pub use error::{QueryError, Result};
pub use index::{DocId, InvertedIndex};
pub use tokenizer::{Analyzer, AnalyzerConfig};
pub use transform::{Expansion, Path, QueryTree, Step};

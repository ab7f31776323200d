use crate::error::Result;
use crate::eval;
use crate::persist;
use crate::tokenizer::Analyzer;
use crate::transform::QueryTree;
use std::collections::HashMap;
use std::path::Path;

pub type DocId = u32;

/// Append-only inverted index: term -> ascending, duplicate-free document ids.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct InvertedIndex {
    postings: HashMap<String, Vec<DocId>>,
    num_docs: DocId,
}

impl InvertedIndex {
    pub fn new() -> Self { Self::default() }

    /// Build directly from parts. Callers must hand over sorted, duplicate-free
    /// postings whose ids are below `num_docs`.
    pub(crate) fn from_parts(postings: HashMap<String, Vec<DocId>>, num_docs: DocId) -> Self {
        Self { postings, num_docs }
    }

    /// Open an index previously written with [`InvertedIndex::save`].
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> { persist::load_index(path) }

    /// Add one document and return its id. Terms are taken verbatim.
    pub fn add_document<I, S>(&mut self, words: I) -> DocId
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let doc_id = self.num_docs;
        for word in words {
            let list = self.postings.entry(word.as_ref().to_string()).or_default();
            if list.last() != Some(&doc_id) {
                list.push(doc_id);
            }
        }
        self.num_docs += 1;
        doc_id
    }

    /// Tokenize `text` with `analyzer` and add the resulting terms as one document.
    pub fn add_text(&mut self, text: &str, analyzer: &Analyzer) -> DocId {
        self.add_document(analyzer.terms(text))
    }

    /// Owned copy of the postings for `term`; empty when unknown.
    pub fn get_postings(&self, term: &str) -> Vec<DocId> { self.postings(term).to_vec() }

    pub fn postings(&self, term: &str) -> &[DocId] {
        self.postings.get(term).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of documents added so far, which is also the next id to assign.
    pub fn get_document_count(&self) -> DocId { self.num_docs }

    pub fn num_terms(&self) -> usize { self.postings.len() }

    pub fn contains_term(&self, term: &str) -> bool { self.postings.contains_key(term) }

    pub fn terms(&self) -> impl Iterator<Item = &str> { self.postings.keys().map(String::as_str) }

    pub(crate) fn entries(&self) -> impl Iterator<Item = (&String, &Vec<DocId>)> { self.postings.iter() }

    pub fn search(&self, query: &QueryTree) -> Vec<DocId> { eval::evaluate(query.root(), self) }

    pub fn search_str(&self, query: &str, ignore_case: bool) -> Result<Vec<DocId>> {
        Ok(self.search(&QueryTree::parse(query, ignore_case)?))
    }

    pub fn count(&self, query: &QueryTree) -> usize { eval::count(query.root(), self) }

    pub fn count_str(&self, query: &str, ignore_case: bool) -> Result<usize> {
        Ok(self.count(&QueryTree::parse(query, ignore_case)?))
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> { persist::save_index(self, path) }

    /// Replace this index's state with the contents of `path`.
    pub fn load<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        *self = persist::load_index(path)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_assigned_in_order() {
        let mut index = InvertedIndex::new();
        assert_eq!(index.add_document(["a", "b"]), 0);
        assert_eq!(index.add_document(["b", "c"]), 1);
        assert_eq!(index.add_document(Vec::<String>::new()), 2);
        assert_eq!(index.get_document_count(), 3);
        assert_eq!(index.get_postings("b"), vec![0, 1]);
        assert_eq!(index.get_postings("missing"), Vec::<DocId>::new());
    }

    #[test]
    fn repeated_words_are_recorded_once() {
        let mut index = InvertedIndex::new();
        index.add_document(["a", "a", "b", "a"]);
        index.add_document(["a"]);
        assert_eq!(index.postings("a"), &[0, 1]);
        assert_eq!(index.postings("b"), &[0]);
        assert_eq!(index.num_terms(), 2);
    }

    #[test]
    fn search_and_count_from_text() {
        let mut index = InvertedIndex::new();
        index.add_document(["a", "b"]);
        index.add_document(["b", "c"]);
        assert_eq!(index.search_str("A AND B", true).unwrap(), vec![0]);
        assert_eq!(index.search_str("A AND B", false).unwrap(), Vec::<DocId>::new());
        assert_eq!(index.count_str("b", true).unwrap(), 2);
        assert!(index.search_str("", true).is_err());
    }
}

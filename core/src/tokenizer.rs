use crate::ast::QueryNode;
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref RE: Regex = Regex::new(r"(?u)\p{L}[\p{L}\p{N}_']*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
    static ref STOPWORDS: HashSet<&'static str> = {
        let words: &[&str] = &[
            "a","about","above","after","again","against","all","am","an","and","any","are","aren't","as","at",
            "be","because","been","before","being","below","between","both","but","by",
            "can","can't","cannot","could","couldn't",
            "did","didn't","do","does","doesn't","doing","don't","down","during",
            "each","few","for","from","further",
            "had","hadn't","has","hasn't","have","haven't","having","he","he'd","he'll","he's","her","here","here's","hers","herself","him","himself","his","how","how's",
            "i","i'd","i'll","i'm","i've","if","in","into","is","isn't","it","it's","its","itself",
            "let's","me","more","most","mustn't","my","myself",
            "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
            "same","she","she'd","she'll","she's","should","shouldn't","so","some","such",
            "than","that","that's","the","their","theirs","them","themselves","then","there","there's","these","they","they'd","they'll","they're","they've","this","those","through","to","too",
            "under","until","up","very",
            "was","wasn't","we","we'd","we'll","we're","we've","were","weren't","what","what's","when","when's","where","where's","which","while","who","who's","whom","why","why's","with","won't","would","wouldn't",
            "you","you'd","you'll","you're","you've","your","yours","yourself","yourselves"
        ];
        words.iter().copied().collect()
    };
}

/// How document text is turned into index terms.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Reduce words to their English stem.
    #[serde(default)]
    pub stem: bool,
    #[serde(default)]
    pub remove_stopwords: bool,
}

/// NFKC-normalizes and lower-cases text, splits it into words and optionally
/// drops stopwords and stems. The default analyzer only folds case, so its
/// terms line up with case-folded query leaves.
#[derive(Debug, Clone, Copy, Default)]
pub struct Analyzer {
    config: AnalyzerConfig,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Self { Self { config } }

    pub fn config(&self) -> AnalyzerConfig { self.config }

    /// Terms of `text` in document order, duplicates kept.
    pub fn terms(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        RE.find_iter(&normalized)
            .map(|m| m.as_str())
            .filter(|t| !(self.config.remove_stopwords && STOPWORDS.contains(t)))
            .map(|t| self.finish(t))
            .collect()
    }

    /// Apply the per-word pipeline to one query word. Stopwords are kept.
    pub fn normalize_term(&self, word: &str) -> String {
        let normalized = word.nfkc().collect::<String>().to_lowercase();
        self.finish(&normalized)
    }

    /// Rewrite every leaf of `node` through [`Analyzer::normalize_term`].
    pub fn normalize_query(&self, node: &QueryNode) -> QueryNode {
        match node {
            QueryNode::Word(term) => QueryNode::Word(self.normalize_term(term)),
            QueryNode::Not(child) => QueryNode::not(self.normalize_query(child)),
            QueryNode::Binary { op, left, right } => {
                QueryNode::binary(*op, self.normalize_query(left), self.normalize_query(right))
            }
        }
    }

    fn finish(&self, token: &str) -> String {
        if self.config.stem {
            STEMMER.stem(token).into_owned()
        } else {
            token.to_string()
        }
    }
}

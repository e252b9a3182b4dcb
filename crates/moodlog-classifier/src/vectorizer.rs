//! TF-IDF vectorizer loaded from a JSON export of a fitted model.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::{read_artifact, ClassifierError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    L2,
}

/// On-disk vectorizer document. Omitted fields take the usual TF-IDF
/// defaults.
#[derive(Debug, Deserialize)]
struct VectorizerFile {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    #[serde(default = "default_ngram_range")]
    ngram_range: (usize, usize),
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default = "default_norm")]
    norm: Option<Norm>,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default = "default_token_pattern")]
    token_pattern: String,
}

fn default_ngram_range() -> (usize, usize) {
    (1, 1)
}

fn default_true() -> bool {
    true
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

fn default_token_pattern() -> String {
    r"(?u)\b\w\w+\b".to_string()
}

/// A sparse feature vector, sorted by column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseVector {
    entries: Vec<(usize, f64)>,
}

impl SparseVector {
    pub fn get(&self, column: usize) -> Option<f64> {
        self.entries
            .binary_search_by_key(&column, |&(c, _)| c)
            .ok()
            .map(|i| self.entries[i].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fitted TF-IDF transform: token counts weighted by inverse document
/// frequency, then normalized.
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    lowercase: bool,
    norm: Option<Norm>,
    sublinear_tf: bool,
    token_pattern: Regex,
}

impl TfidfVectorizer {
    /// Load a vectorizer artifact from disk.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let contents = read_artifact(path)?;
        let file: VectorizerFile =
            serde_json::from_str(&contents).map_err(|source| ClassifierError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_file(file)
    }

    /// Build a vectorizer from its JSON document.
    pub fn from_json(json: &str) -> Result<Self, ClassifierError> {
        let file: VectorizerFile = serde_json::from_str(json)
            .map_err(|e| ClassifierError::InvalidVectorizer(e.to_string()))?;
        Self::from_file(file)
    }

    fn from_file(file: VectorizerFile) -> Result<Self, ClassifierError> {
        let (min_n, max_n) = file.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ClassifierError::InvalidVectorizer(format!(
                "bad ngram_range ({}, {})",
                min_n, max_n
            )));
        }

        let overflow = file.vocabulary.iter().find(|&(_, &c)| c >= file.idf.len());
        if let Some((term, &column)) = overflow {
            return Err(ClassifierError::InvalidVectorizer(format!(
                "term '{}' maps to column {} but only {} idf weights exist",
                term,
                column,
                file.idf.len()
            )));
        }

        let token_pattern = Regex::new(&file.token_pattern).map_err(|e| {
            ClassifierError::InvalidVectorizer(format!("bad token_pattern: {}", e))
        })?;
        if token_pattern.captures_len() > 2 {
            return Err(ClassifierError::InvalidVectorizer(
                "token_pattern may have at most one capture group".into(),
            ));
        }

        Ok(Self {
            vocabulary: file.vocabulary,
            idf: file.idf,
            ngram_range: file.ngram_range,
            lowercase: file.lowercase,
            norm: file.norm,
            sublinear_tf: file.sublinear_tf,
            token_pattern,
        })
    }

    /// Number of feature columns.
    pub fn num_features(&self) -> usize {
        self.idf.len()
    }

    /// Turn one document into its TF-IDF vector.
    pub fn transform(&self, document: &str) -> SparseVector {
        let document = if self.lowercase {
            document.to_lowercase()
        } else {
            document.to_string()
        };

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in self.terms(&document) {
            if let Some(&column) = self.vocabulary.get(&term) {
                *counts.entry(column).or_insert(0.0) += 1.0;
            }
        }

        let mut entries: Vec<(usize, f64)> = counts
            .into_iter()
            .map(|(column, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                (column, tf * self.idf[column])
            })
            .collect();

        let total = match self.norm {
            Some(Norm::L2) => entries.iter().map(|(_, v)| v * v).sum::<f64>().sqrt(),
            Some(Norm::L1) => entries.iter().map(|(_, v)| v.abs()).sum::<f64>(),
            None => 0.0,
        };
        if total > 0.0 {
            for (_, value) in entries.iter_mut() {
                *value /= total;
            }
        }

        SparseVector { entries }
    }

    fn tokens<'a>(&self, document: &'a str) -> Vec<&'a str> {
        if self.token_pattern.captures_len() == 2 {
            self.token_pattern
                .captures_iter(document)
                .filter_map(|c| c.get(1).map(|m| m.as_str()))
                .collect()
        } else {
            self.token_pattern
                .find_iter(document)
                .map(|m| m.as_str())
                .collect()
        }
    }

    /// Word n-grams within the configured range.
    fn terms(&self, document: &str) -> Vec<String> {
        let tokens = self.tokens(document);
        let (min_n, max_n) = self.ngram_range;

        let mut terms = Vec::new();
        for n in min_n..=max_n {
            if n > tokens.len() {
                break;
            }
            for window in tokens.windows(n) {
                terms.push(window.join(" "));
            }
        }
        terms
    }
}

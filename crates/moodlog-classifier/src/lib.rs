//! Emotion classifier for moodlog notes.
//!
//! Wraps a pre-fitted TF-IDF vectorizer and a gradient-boosted tree model,
//! both loaded from artifacts produced elsewhere:
//!
//! ```text
//! model/
//!   xgboost.json             # XGBoost JSON model (multi:softprob)
//!   tfidf_vectorizer.json    # vocabulary, idf weights, options
//! ```

mod booster;
mod preprocess;
mod vectorizer;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use moodlog_core::{Emotion, EmotionPredictor};
use thiserror::Error;

pub use booster::Booster;
pub use preprocess::{lemmatize, tokenize, validate, Preprocessor};
pub use vectorizer::{Norm, SparseVector, TfidfVectorizer};

/// Default model location, relative to the working directory.
pub const DEFAULT_MODEL_PATH: &str = "model/xgboost.json";
/// Default vectorizer location, relative to the working directory.
pub const DEFAULT_VECTORIZER_PATH: &str = "model/tfidf_vectorizer.json";

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model: {0}")]
    InvalidModel(String),

    #[error("invalid vectorizer: {0}")]
    InvalidVectorizer(String),

    #[error("model produced unknown class {0}")]
    UnknownClass(usize),
}

impl From<ClassifierError> for moodlog_core::Error {
    fn from(e: ClassifierError) -> Self {
        moodlog_core::Error::Classifier(e.to_string())
    }
}

pub(crate) fn read_artifact(path: &Path) -> Result<String, ClassifierError> {
    fs::read_to_string(path).map_err(|source| ClassifierError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Maps free text to one of the six emotions.
pub struct EmotionClassifier {
    preprocessor: Preprocessor,
    vectorizer: TfidfVectorizer,
    booster: Booster,
}

impl EmotionClassifier {
    /// Load the model and vectorizer artifacts. Either one missing or
    /// malformed is an error the caller should not try to recover from.
    pub fn load<M, V>(model_path: M, vectorizer_path: V) -> Result<Self, ClassifierError>
    where
        M: AsRef<Path>,
        V: AsRef<Path>,
    {
        let booster = Booster::load(model_path.as_ref())?;
        let vectorizer = TfidfVectorizer::load(vectorizer_path.as_ref())?;
        tracing::info!(
            model = %model_path.as_ref().display(),
            vectorizer = %vectorizer_path.as_ref().display(),
            "loaded emotion classifier"
        );
        Self::from_parts(vectorizer, booster)
    }

    pub fn from_parts(
        vectorizer: TfidfVectorizer,
        booster: Booster,
    ) -> Result<Self, ClassifierError> {
        if booster.num_class() > Emotion::ALL.len() {
            return Err(ClassifierError::InvalidModel(format!(
                "model has {} classes but only {} emotions are known",
                booster.num_class(),
                Emotion::ALL.len()
            )));
        }
        if booster.num_feature() != 0 && booster.num_feature() != vectorizer.num_features() {
            tracing::warn!(
                model_features = booster.num_feature(),
                vectorizer_features = vectorizer.num_features(),
                "model and vectorizer disagree on feature count"
            );
        }

        Ok(Self {
            preprocessor: Preprocessor::new(),
            vectorizer,
            booster,
        })
    }

    /// The cleaned text fed to the vectorizer.
    pub fn preprocess(&self, text: &str) -> String {
        self.preprocessor.clean(text)
    }

    fn features(&self, text: &str) -> SparseVector {
        let cleaned = self.preprocess(text);
        let features = self.vectorizer.transform(&cleaned);
        if features.is_empty() {
            tracing::debug!(tokens = %cleaned, "no known terms in text");
        } else {
            tracing::debug!(tokens = %cleaned, features = features.len(), "vectorized text");
        }
        features
    }

    /// The most likely emotion for `text`.
    pub fn predict(&self, text: &str) -> Result<Emotion, ClassifierError> {
        let class = self.booster.predict_class(&self.features(text));
        Emotion::from_class_index(class).ok_or(ClassifierError::UnknownClass(class))
    }

    /// Probability of each emotion the model knows, in class order.
    pub fn predict_proba(&self, text: &str) -> Result<Vec<(Emotion, f64)>, ClassifierError> {
        self.booster
            .predict_proba(&self.features(text))
            .into_iter()
            .enumerate()
            .map(|(class, p)| {
                Emotion::from_class_index(class)
                    .map(|e| (e, p))
                    .ok_or(ClassifierError::UnknownClass(class))
            })
            .collect()
    }

    /// Every emotion with probability at or above `threshold`, most likely
    /// first. Falls back to the single best emotion when none qualifies.
    pub fn predict_labels(
        &self,
        text: &str,
        threshold: f64,
    ) -> Result<Vec<Emotion>, ClassifierError> {
        let mut scored = self.predict_proba(text)?;
        // Stable sort keeps class order among equal probabilities.
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        let labels: Vec<Emotion> = scored
            .iter()
            .filter(|(_, p)| *p >= threshold)
            .map(|(e, _)| *e)
            .collect();

        if labels.is_empty() {
            return Ok(scored.into_iter().take(1).map(|(e, _)| e).collect());
        }
        Ok(labels)
    }
}

impl EmotionPredictor for EmotionClassifier {
    fn predict(&self, text: &str) -> Result<Emotion, moodlog_core::Error> {
        Ok(EmotionClassifier::predict(self, text)?)
    }

    fn predict_above(
        &self,
        text: &str,
        threshold: f64,
    ) -> Result<Vec<Emotion>, moodlog_core::Error> {
        Ok(self.predict_labels(text, threshold)?)
    }
}

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::Error;

/// The closed set of labels the classifier can emit.
///
/// Declaration order is the classifier's class order: class 0 is
/// `Sadness`, class 5 is `Surprise`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Sadness,
    Joy,
    Love,
    Anger,
    Fear,
    Surprise,
}

impl Emotion {
    /// All emotions in class-index order.
    pub const ALL: [Emotion; 6] = [
        Emotion::Sadness,
        Emotion::Joy,
        Emotion::Love,
        Emotion::Anger,
        Emotion::Fear,
        Emotion::Surprise,
    ];

    /// Map a classifier output class back to its label.
    pub fn from_class_index(index: usize) -> Option<Emotion> {
        Self::ALL.get(index).copied()
    }

    pub fn class_index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Emotion::Sadness => "sadness",
            Emotion::Joy => "joy",
            Emotion::Love => "love",
            Emotion::Anger => "anger",
            Emotion::Fear => "fear",
            Emotion::Surprise => "surprise",
        }
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Emotion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| Error::Validation(format!("unknown emotion: {}", s.trim())))
    }
}

/// Anything that can map free text to emotion labels.
pub trait EmotionPredictor {
    /// The single most likely emotion for `text`.
    fn predict(&self, text: &str) -> Result<Emotion, Error>;

    /// Every emotion whose probability reaches `threshold`, most likely
    /// first. Predictors without probabilities fall back to `predict`.
    fn predict_above(&self, text: &str, _threshold: f64) -> Result<Vec<Emotion>, Error> {
        Ok(vec![self.predict(text)?])
    }
}

/// Normalize emotion labels: trim, lowercase, drop empties, and remove
/// duplicates while keeping the first occurrence.
pub fn normalize_labels(labels: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len());
    for label in labels {
        let label = label.trim().to_lowercase();
        if !label.is_empty() && !out.contains(&label) {
            out.push(label);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_index_table() {
        assert_eq!(Emotion::from_class_index(0), Some(Emotion::Sadness));
        assert_eq!(Emotion::from_class_index(1), Some(Emotion::Joy));
        assert_eq!(Emotion::from_class_index(5), Some(Emotion::Surprise));
        assert_eq!(Emotion::from_class_index(6), None);
        assert_eq!(Emotion::Fear.class_index(), 4);
    }

    #[test]
    fn test_parse_case_insensitive() {
        assert_eq!(" Joy ".parse::<Emotion>().unwrap(), Emotion::Joy);
        assert_eq!("ANGER".parse::<Emotion>().unwrap(), Emotion::Anger);
        assert!(matches!("happy".parse::<Emotion>(), Err(Error::Validation(_))));
    }

    #[test]
    fn test_serde_lowercase() {
        let json = serde_json::to_string(&Emotion::Surprise).unwrap();
        assert_eq!(json, "\"surprise\"");
        let back: Emotion = serde_json::from_str("\"love\"").unwrap();
        assert_eq!(back, Emotion::Love);
    }

    struct Always(Emotion);

    impl EmotionPredictor for Always {
        fn predict(&self, _text: &str) -> Result<Emotion, Error> {
            Ok(self.0)
        }
    }

    #[test]
    fn test_default_predict_above_is_single_label() {
        let predictor = Always(Emotion::Fear);
        assert_eq!(predictor.predict_above("dark", 0.0).unwrap(), vec![Emotion::Fear]);
        assert_eq!(predictor.predict_above("dark", 0.99).unwrap(), vec![Emotion::Fear]);
    }

    #[test]
    fn test_normalize_labels() {
        let labels = vec![
            " Joy".to_string(),
            "".to_string(),
            "fear".to_string(),
            "joy".to_string(),
        ];
        assert_eq!(normalize_labels(labels), vec!["joy", "fear"]);
    }
}

//! Bag-of-words sentiment classifier: TF-IDF features into logistic regression.

pub mod logistic;
pub mod model;
pub mod vectorizer;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use logistic::{LogisticRegression, TrainOptions};
pub use model::{ModelError, SentimentModel};
pub use vectorizer::TfidfVectorizer;

/// Binary sentiment label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Sentiment {
    Positive,
    Negative,
}

impl Sentiment {
    /// Training target: 1.0 for positive, 0.0 for negative.
    pub fn target(self) -> f64 {
        match self {
            Sentiment::Positive => 1.0,
            Sentiment::Negative => 0.0,
        }
    }

    /// Label used in the processed corpus (`1` / `0`).
    pub fn as_label(self) -> u8 {
        match self {
            Sentiment::Positive => 1,
            Sentiment::Negative => 0,
        }
    }

    pub fn from_label(label: u8) -> Option<Self> {
        match label {
            1 => Some(Sentiment::Positive),
            0 => Some(Sentiment::Negative),
            _ => None,
        }
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentiment::Positive => write!(f, "Positive"),
            Sentiment::Negative => write!(f, "Negative"),
        }
    }
}

/// Anything that can label already-normalized text.
pub trait Classifier: Send + Sync {
    fn predict(&self, cleaned: &str) -> Sentiment;
}

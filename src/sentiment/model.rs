//! Trained pipeline: vectorizer + classifier, persisted as JSON.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use super::logistic::{LogisticRegression, TrainOptions};
use super::vectorizer::TfidfVectorizer;
use super::{Classifier, Sentiment};
use crate::corpus::LabeledText;

/// Errors loading or saving a model file.
#[derive(Debug)]
pub enum ModelError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
    /// Model file parsed but vectorizer and classifier disagree on feature count.
    Inconsistent { vocabulary: usize, weights: usize },
    /// A vocabulary term points past the end of the feature table.
    IndexOutOfRange { term: String, index: usize, features: usize },
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "model file '{}': {}", path.display(), source),
            Self::Json { path, source } => {
                write!(f, "invalid model file '{}': {}", path.display(), source)
            }
            Self::Inconsistent { vocabulary, weights } => write!(
                f,
                "model has {vocabulary} features but {weights} weights"
            ),
            Self::IndexOutOfRange { term, index, features } => write!(
                f,
                "vocabulary term {term:?} has index {index} but the model has {features} features"
            ),
        }
    }
}

impl std::error::Error for ModelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Inconsistent { .. } | Self::IndexOutOfRange { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SentimentModel {
    vectorizer: TfidfVectorizer,
    classifier: LogisticRegression,
}

impl SentimentModel {
    /// Fit the vectorizer and classifier on a cleaned, labelled corpus.
    pub fn train(samples: &[LabeledText], max_features: usize, opts: TrainOptions) -> Self {
        let docs: Vec<&str> = samples.iter().map(|s| s.text.as_str()).collect();
        let vectorizer = TfidfVectorizer::fit(&docs, max_features);
        info!("Vocabulary: {} features", vectorizer.len());

        let rows: Vec<_> = docs.iter().map(|d| vectorizer.transform(d)).collect();
        let targets: Vec<f64> = samples.iter().map(|s| s.sentiment.target()).collect();
        let classifier = LogisticRegression::fit(&rows, &targets, vectorizer.len(), opts);

        Self { vectorizer, classifier }
    }

    /// Probability that cleaned text is positive.
    pub fn positive_probability(&self, cleaned: &str) -> f64 {
        self.classifier
            .predict_proba(&self.vectorizer.transform(cleaned))
    }

    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| ModelError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }
        let json = serde_json::to_string(self).map_err(|e| ModelError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;
        std::fs::write(path, json).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!("💾 Saved model to {:?}", path);
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, ModelError> {
        let json = std::fs::read_to_string(path).map_err(|e| ModelError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        let model: Self = serde_json::from_str(&json).map_err(|e| ModelError::Json {
            path: path.to_path_buf(),
            source: e,
        })?;

        if model.vectorizer.len() != model.classifier.n_features() {
            return Err(ModelError::Inconsistent {
                vocabulary: model.vectorizer.len(),
                weights: model.classifier.n_features(),
            });
        }
        if let Some((term, index)) = model.vectorizer.dangling_term() {
            return Err(ModelError::IndexOutOfRange {
                term: term.to_string(),
                index,
                features: model.vectorizer.len(),
            });
        }

        info!("Loaded model from {:?} ({} features)", path, model.vectorizer.len());
        Ok(model)
    }
}

impl Classifier for SentimentModel {
    fn predict(&self, cleaned: &str) -> Sentiment {
        if self.positive_probability(cleaned) >= 0.5 {
            Sentiment::Positive
        } else {
            Sentiment::Negative
        }
    }
}

//! Reply API: retrieval (classifier + canned reply) and generative replies.
//!
//! Both models are loaded once at startup and handed to the service as
//! dependencies. A model that failed to load stays `None` and every request
//! for it gets an explicit error instead of a crash.

pub mod server;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::config::ApiConfig;
use crate::generator::GeneratorClient;
use crate::normalize::normalize;
use crate::sentiment::{Classifier, Sentiment, SentimentModel};

/// Returned by the generative path when the model produces nothing.
pub const EMPTY_GENERATION_FALLBACK: &str = "I'm not sure how to respond to that.";

/// Canned replies keyed by sentiment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTemplates {
    pub positive: String,
    pub negative: String,
}

impl Default for ReplyTemplates {
    fn default() -> Self {
        Self {
            positive: "We're so happy to hear you're enjoying it! Thanks for sharing. 😊".to_string(),
            negative: "We're very sorry to hear about your experience. Please DM us so we can help."
                .to_string(),
        }
    }
}

impl ReplyTemplates {
    pub fn for_sentiment(&self, sentiment: Sentiment) -> &str {
        match sentiment {
            Sentiment::Positive => &self.positive,
            Sentiment::Negative => &self.negative,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplyRequest {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalReply {
    pub sentiment: Sentiment,
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerativeReply {
    pub reply: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiError {
    /// The model behind this endpoint failed to load at startup.
    NotLoaded(&'static str),
    /// The generator was loaded but the request to it failed.
    Generation(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotLoaded(which) => write!(f, "{which} model is not loaded."),
            ApiError::Generation(e) => write!(f, "Generation failed: {e}"),
        }
    }
}

impl std::error::Error for ApiError {}

pub struct ResponseService {
    classifier: Option<Arc<dyn Classifier>>,
    generator: Option<GeneratorClient>,
    templates: ReplyTemplates,
}

impl ResponseService {
    pub fn new(
        classifier: Option<Arc<dyn Classifier>>,
        generator: Option<GeneratorClient>,
        templates: ReplyTemplates,
    ) -> Self {
        Self {
            classifier,
            generator,
            templates,
        }
    }

    /// Load both models. Failures are logged and leave that model unloaded.
    pub async fn load(config: &ApiConfig) -> Self {
        let classifier: Option<Arc<dyn Classifier>> = match SentimentModel::load(&config.model_path) {
            Ok(model) => {
                info!("Retrieval model loaded");
                Some(Arc::new(model))
            }
            Err(e) => {
                error!("Retrieval model not loaded: {e}");
                None
            }
        };

        let generator = match &config.generator_url {
            Some(url) => {
                match GeneratorClient::connect(url, config.generation, config.request_timeout).await {
                    Ok(client) => Some(client),
                    Err(e) => {
                        error!("Generative model not loaded: {e}");
                        None
                    }
                }
            }
            None => {
                warn!("No generator_url configured, generative replies disabled");
                None
            }
        };

        Self::new(classifier, generator, config.replies.clone())
    }

    pub fn retrieval_loaded(&self) -> bool {
        self.classifier.is_some()
    }

    pub fn generative_loaded(&self) -> bool {
        self.generator.is_some()
    }

    /// Classify the cleaned text and pick the matching canned reply.
    pub fn predict_retrieval(&self, text: &str) -> Result<RetrievalReply, ApiError> {
        let classifier = self
            .classifier
            .as_ref()
            .ok_or(ApiError::NotLoaded("Retrieval"))?;

        let cleaned = normalize(text);
        let sentiment = classifier.predict(&cleaned);
        Ok(RetrievalReply {
            sentiment,
            reply: self.templates.for_sentiment(sentiment).to_string(),
        })
    }

    /// Generate a free-form reply from the raw text.
    pub async fn predict_generative(&self, text: &str) -> Result<GenerativeReply, ApiError> {
        let generator = self
            .generator
            .as_ref()
            .ok_or(ApiError::NotLoaded("Generative"))?;

        let generated = generator
            .generate(text)
            .await
            .map_err(|e| ApiError::Generation(e.to_string()))?;

        let reply = if generated.trim().is_empty() {
            EMPTY_GENERATION_FALLBACK.to_string()
        } else {
            generated
        };
        Ok(GenerativeReply { reply })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::GenerationParams;
    use std::time::Duration;

    /// Positive when the cleaned text mentions "amazing", records what it saw.
    struct KeywordClassifier {
        seen: std::sync::Mutex<Vec<String>>,
    }

    impl Classifier for KeywordClassifier {
        fn predict(&self, cleaned: &str) -> Sentiment {
            self.seen.lock().unwrap().push(cleaned.to_string());
            if cleaned.contains("amazing") {
                Sentiment::Positive
            } else {
                Sentiment::Negative
            }
        }
    }

    fn keyword_service(templates: ReplyTemplates) -> (ResponseService, Arc<KeywordClassifier>) {
        let classifier = Arc::new(KeywordClassifier { seen: Default::default() });
        let service = ResponseService::new(Some(classifier.clone()), None, templates);
        (service, classifier)
    }

    #[test]
    fn test_retrieval_positive_uses_configured_reply() {
        let templates = ReplyTemplates { positive: "glad!".into(), negative: "sorry!".into() };
        let (service, classifier) = keyword_service(templates);

        let reply = service.predict_retrieval("@company This is AMAZING!! https://x.co").unwrap();
        assert_eq!(reply, RetrievalReply { sentiment: Sentiment::Positive, reply: "glad!".into() });
        // The classifier only ever sees normalized text
        assert_eq!(classifier.seen.lock().unwrap().as_slice(), ["amazing"]);
    }

    #[test]
    fn test_retrieval_negative() {
        let (service, _) = keyword_service(ReplyTemplates::default());
        let reply = service.predict_retrieval("app keeps crashing").unwrap();
        assert_eq!(reply.sentiment, Sentiment::Negative);
        assert_eq!(reply.reply, ReplyTemplates::default().negative);
    }

    #[test]
    fn test_retrieval_not_loaded() {
        let service = ResponseService::new(None, None, ReplyTemplates::default());
        let err = service.predict_retrieval("anything").unwrap_err();
        assert_eq!(err, ApiError::NotLoaded("Retrieval"));
        assert_eq!(err.to_string(), "Retrieval model is not loaded.");
    }

    #[tokio::test]
    async fn test_generative_not_loaded() {
        let service = ResponseService::new(None, None, ReplyTemplates::default());
        let err = service.predict_generative("hi").await.unwrap_err();
        assert_eq!(err.to_string(), "Generative model is not loaded.");
    }

    async fn generator_returning(server: &mut mockito::Server, body: &str) -> GeneratorClient {
        server
            .mock("POST", "/generate")
            .with_status(200)
            .with_body(body)
            .create_async()
            .await;
        GeneratorClient::new(&server.url(), GenerationParams::default(), Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_generative_reply() {
        let mut server = mockito::Server::new_async().await;
        let generator = generator_returning(&mut server, r#"{"generated_text":" Thanks a lot! "}"#).await;
        let service = ResponseService::new(None, Some(generator), ReplyTemplates::default());

        let reply = service.predict_generative("you rock").await.unwrap();
        // Non-blank output is passed through as generated
        assert_eq!(reply.reply, " Thanks a lot! ");
    }

    #[tokio::test]
    async fn test_generative_empty_output_falls_back() {
        let mut server = mockito::Server::new_async().await;
        let generator = generator_returning(&mut server, r#"{"generated_text":"  \n"}"#).await;
        let service = ResponseService::new(None, Some(generator), ReplyTemplates::default());

        let reply = service.predict_generative("...").await.unwrap();
        assert_eq!(reply.reply, EMPTY_GENERATION_FALLBACK);
    }

    #[tokio::test]
    async fn test_generative_backend_failure_is_an_error_payload() {
        let mut server = mockito::Server::new_async().await;
        server.mock("POST", "/generate").with_status(500).create_async().await;
        let generator =
            GeneratorClient::new(&server.url(), GenerationParams::default(), Duration::from_secs(5)).unwrap();
        let service = ResponseService::new(None, Some(generator), ReplyTemplates::default());

        let err = service.predict_generative("hello").await.unwrap_err();
        assert!(matches!(err, ApiError::Generation(_)));
    }

    #[tokio::test]
    async fn test_load_with_missing_model_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            model_path: dir.path().join("missing.json"),
            generator_url: None,
            replies: ReplyTemplates::default(),
            generation: GenerationParams::default(),
            request_timeout: Duration::from_secs(5),
        };
        let service = ResponseService::load(&config).await;
        assert!(!service.retrieval_loaded());
        assert!(!service.generative_loaded());
        assert!(service.predict_retrieval("hello").is_err());
    }

    #[tokio::test]
    async fn test_load_with_corrupt_model_degrades() {
        let dir = tempfile::tempdir().unwrap();
        let model_path = dir.path().join("sentiment_model.json");
        std::fs::write(
            &model_path,
            r#"{"vectorizer":{"vocabulary":{"amazing":5},"idf":[1.0]},"classifier":{"weights":[0.5],"bias":0.0}}"#,
        )
        .unwrap();
        let config = ApiConfig {
            bind: "127.0.0.1:0".parse().unwrap(),
            model_path,
            generator_url: None,
            replies: ReplyTemplates::default(),
            generation: GenerationParams::default(),
            request_timeout: Duration::from_secs(5),
        };

        let service = ResponseService::load(&config).await;
        assert!(!service.retrieval_loaded());
        assert_eq!(service.predict_retrieval("amazing").unwrap_err(), ApiError::NotLoaded("Retrieval"));
    }
}

//! Reply text source for the bot: the reply API over HTTP.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::api::{GenerativeReply, ReplyRequest, RetrievalReply};

/// Which reply API endpoint the bot uses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplyMode {
    /// Classifier + canned reply.
    #[default]
    Retrieval,
    /// Free-form generated reply.
    Generative,
}

impl ReplyMode {
    fn path(self) -> &'static str {
        match self {
            ReplyMode::Retrieval => "/predict-retrieval",
            ReplyMode::Generative => "/predict-generative",
        }
    }
}

#[derive(Debug)]
pub enum ResponderError {
    Http(String),
    /// Non-2xx status or an `{error}` payload.
    Api(String),
    Parse(String),
}

impl fmt::Display for ResponderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResponderError::Http(e) => write!(f, "HTTP error: {e}"),
            ResponderError::Api(e) => write!(f, "reply API error: {e}"),
            ResponderError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for ResponderError {}

/// Produces reply text for a mention.
#[allow(async_fn_in_trait)]
pub trait Responder {
    async fn reply_for(&self, text: &str) -> Result<String, ResponderError>;
}

/// Both endpoints' answers for the same text.
#[derive(Debug)]
pub struct Comparison {
    pub retrieval: Result<RetrievalReply, ResponderError>,
    pub generative: Result<GenerativeReply, ResponderError>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

pub struct ApiClient {
    base_url: String,
    mode: ReplyMode,
    http: reqwest::Client,
}

impl ApiClient {
    pub fn new(base_url: &str, mode: ReplyMode, timeout: Duration) -> Result<Self, ResponderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ResponderError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            mode,
            http,
        })
    }

    pub fn mode(&self) -> ReplyMode {
        self.mode
    }

    async fn call<T: DeserializeOwned>(&self, path: &str, text: &str) -> Result<T, ResponderError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(&ReplyRequest { text: text.to_string() })
            .send()
            .await
            .map_err(|e| ResponderError::Http(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ResponderError::Http(e.to_string()))?;
        debug!("{} → {}", path, status);

        if let Ok(ErrorBody { error }) = serde_json::from_str::<ErrorBody>(&body) {
            return Err(ResponderError::Api(format!("{status}: {error}")));
        }
        if !status.is_success() {
            return Err(ResponderError::Api(format!("{status}: {body}")));
        }

        serde_json::from_str(&body).map_err(|e| ResponderError::Parse(e.to_string()))
    }

    pub async fn retrieval(&self, text: &str) -> Result<RetrievalReply, ResponderError> {
        self.call(ReplyMode::Retrieval.path(), text).await
    }

    pub async fn generative(&self, text: &str) -> Result<GenerativeReply, ResponderError> {
        self.call(ReplyMode::Generative.path(), text).await
    }

    /// Ask both endpoints about the same text.
    pub async fn compare(&self, text: &str) -> Comparison {
        let (retrieval, generative) = tokio::join!(self.retrieval(text), self.generative(text));
        Comparison { retrieval, generative }
    }
}

impl Responder for ApiClient {
    async fn reply_for(&self, text: &str) -> Result<String, ResponderError> {
        match self.mode {
            ReplyMode::Retrieval => self.retrieval(text).await.map(|r| r.reply),
            ReplyMode::Generative => self.generative(text).await.map(|r| r.reply),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sentiment::Sentiment;
    use mockito::Matcher;

    fn client(server: &mockito::Server, mode: ReplyMode) -> ApiClient {
        ApiClient::new(&server.url(), mode, Duration::from_secs(5)).unwrap()
    }

    #[tokio::test]
    async fn test_retrieval_mode() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/predict-retrieval")
            .match_body(Matcher::Json(serde_json::json!({"text": "@acme love it"})))
            .with_status(200)
            .with_body(r#"{"sentiment":"Positive","reply":"Thanks!"}"#)
            .create_async()
            .await;

        let reply = client(&server, ReplyMode::Retrieval)
            .reply_for("@acme love it")
            .await
            .unwrap();
        assert_eq!(reply, "Thanks!");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generative_mode() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict-generative")
            .with_status(200)
            .with_body(r#"{"reply":"Glad you like it"}"#)
            .create_async()
            .await;

        let reply = client(&server, ReplyMode::Generative).reply_for("hi").await.unwrap();
        assert_eq!(reply, "Glad you like it");
    }

    #[tokio::test]
    async fn test_error_payload_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict-retrieval")
            .with_status(200)
            .with_body(r#"{"error":"Retrieval model is not loaded."}"#)
            .create_async()
            .await;

        let err = client(&server, ReplyMode::Retrieval).reply_for("hi").await.unwrap_err();
        assert!(matches!(err, ResponderError::Api(ref m) if m.contains("not loaded")));
    }

    #[tokio::test]
    async fn test_non_success_status() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict-generative")
            .with_status(502)
            .with_body("bad gateway")
            .create_async()
            .await;

        let err = client(&server, ReplyMode::Generative).reply_for("hi").await.unwrap_err();
        assert!(matches!(err, ResponderError::Api(ref m) if m.starts_with("502")));
    }

    #[tokio::test]
    async fn test_unreachable_api() {
        // Nothing listens on the discard port
        let client = ApiClient::new("http://127.0.0.1:9", ReplyMode::Retrieval, Duration::from_secs(2)).unwrap();
        let err = client.reply_for("hi").await.unwrap_err();
        assert!(matches!(err, ResponderError::Http(_)));
    }

    #[tokio::test]
    async fn test_compare_reports_both() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/predict-retrieval")
            .with_status(200)
            .with_body(r#"{"sentiment":"Negative","reply":"Sorry"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/predict-generative")
            .with_status(503)
            .with_body(r#"{"error":"Generative model is not loaded."}"#)
            .create_async()
            .await;

        let result = client(&server, ReplyMode::Retrieval).compare("broken again").await;
        let retrieval = result.retrieval.unwrap();
        assert_eq!(retrieval.sentiment, Sentiment::Negative);
        assert_eq!(retrieval.reply, "Sorry");
        assert!(result.generative.is_err());
    }
}

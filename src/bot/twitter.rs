//! Twitter API v2 client for mentions and replies.

use reqwest::header::AUTHORIZATION;
use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::oauth::{self, Credentials};
use super::{AccountId, FeedError, Mention, MentionBatch, MentionFeed, MentionId};

pub struct TwitterClient {
    base_url: String,
    credentials: Credentials,
    http: reqwest::Client,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    meta: Option<Meta>,
}

#[derive(Deserialize)]
struct Meta {
    newest_id: Option<MentionId>,
}

#[derive(Deserialize)]
struct User {
    id: AccountId,
    username: Option<String>,
}

#[derive(Deserialize)]
struct Tweet {
    id: MentionId,
    text: String,
    author_id: Option<AccountId>,
}

impl TwitterClient {
    pub fn new(base_url: &str, credentials: Credentials, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FeedError::Http(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }

    /// Send a signed request and return the body of a successful response.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, &str)],
        body: Option<serde_json::Value>,
    ) -> Result<String, FeedError> {
        let url = format!("{}{}", self.base_url, path);
        let auth = oauth::authorization_header(&self.credentials, method.as_str(), &url, query);

        let mut request = self.http.request(method, &url).header(AUTHORIZATION, auth);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request
            .send()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;
        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| FeedError::Http(e.to_string()))?;
        debug!("{} → {}", path, status);

        match status {
            s if s.is_success() => Ok(text),
            StatusCode::UNAUTHORIZED => Err(FeedError::Auth(format!("{status}: {text}"))),
            StatusCode::TOO_MANY_REQUESTS => Err(FeedError::RateLimited(format!("{status}: {text}"))),
            _ => Err(FeedError::Api(format!("{status}: {text}"))),
        }
    }
}

fn parse<T: for<'de> Deserialize<'de>>(body: &str) -> Result<T, FeedError> {
    serde_json::from_str(body).map_err(|e| FeedError::Parse(e.to_string()))
}

impl MentionFeed for TwitterClient {
    async fn self_account_id(&self) -> Result<AccountId, FeedError> {
        let body = self.send(Method::GET, "/2/users/me", &[], None).await?;
        let envelope: Envelope<User> = parse(&body)?;
        let user = envelope
            .data
            .ok_or_else(|| FeedError::Parse("no user in /2/users/me response".into()))?;
        info!(
            "Authenticated as @{} ({})",
            user.username.as_deref().unwrap_or("?"),
            user.id
        );
        Ok(user.id)
    }

    async fn fetch_mentions_since(
        &self,
        account: &AccountId,
        since: Option<MentionId>,
    ) -> Result<MentionBatch, FeedError> {
        let path = format!("/2/users/{}/mentions", urlencoding::encode(&account.0));
        let since = since.map(|id| id.to_string());
        let mut query = vec![("tweet.fields", "author_id")];
        if let Some(ref since) = since {
            query.push(("since_id", since.as_str()));
        }

        let body = self.send(Method::GET, &path, &query, None).await?;
        let envelope: Envelope<Vec<Tweet>> = parse(&body)?;

        let mentions = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .map(|t| Mention {
                id: t.id,
                // Missing author means we cannot tell; it is never equal to our own id
                author_id: t.author_id.unwrap_or_else(|| AccountId(String::new())),
                text: t.text,
            })
            .collect();

        Ok(MentionBatch {
            mentions,
            newest_id: envelope.meta.and_then(|m| m.newest_id),
        })
    }

    async fn post_reply(&self, in_reply_to: MentionId, text: &str) -> Result<(), FeedError> {
        let body = json!({
            "text": text,
            "reply": { "in_reply_to_tweet_id": in_reply_to.to_string() },
        });
        self.send(Method::POST, "/2/tweets", &[], Some(body)).await?;
        Ok(())
    }
}

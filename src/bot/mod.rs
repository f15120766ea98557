//! Mention bot - polls the feed for new mentions and replies through the reply API.

pub mod cursor;
pub mod database;
pub mod oauth;
pub mod poller;
pub mod responder;
pub mod retry;
pub mod twitter;


use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

pub use cursor::{CursorError, CursorStore, FileCursorStore, ReplyRecord, ReplyStatus};
pub use database::Database;
pub use poller::{CycleReport, MentionPoller, PollerError, PollerSettings};
pub use responder::{ApiClient, Comparison, ReplyMode, Responder, ResponderError};
pub use retry::{Backoff, RetryPolicy};
pub use twitter::TwitterClient;

/// Feed-assigned mention identifier. Later mentions have larger ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MentionId(pub u64);

impl fmt::Display for MentionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MentionId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(MentionId)
    }
}

// Ids travel as decimal strings on the wire.
impl Serialize for MentionId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for MentionId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Account identifier, compared only for equality.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub String);

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    pub id: MentionId,
    pub author_id: AccountId,
    pub text: String,
}

/// One page of mentions plus the feed's own newest-id marker.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MentionBatch {
    pub mentions: Vec<Mention>,
    pub newest_id: Option<MentionId>,
}

/// Errors talking to the mention feed.
#[derive(Debug)]
pub enum FeedError {
    /// Transport failure, including timeouts.
    Http(String),
    /// Credentials rejected.
    Auth(String),
    RateLimited(String),
    Api(String),
    Parse(String),
}

impl fmt::Display for FeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedError::Http(e) => write!(f, "HTTP error: {e}"),
            FeedError::Auth(e) => write!(f, "authentication failed: {e}"),
            FeedError::RateLimited(e) => write!(f, "rate limited: {e}"),
            FeedError::Api(e) => write!(f, "API error: {e}"),
            FeedError::Parse(e) => write!(f, "Parse error: {e}"),
        }
    }
}

impl std::error::Error for FeedError {}

/// The social platform as the poller sees it.
#[allow(async_fn_in_trait)]
pub trait MentionFeed {
    /// Account the credentials belong to. Called once at startup.
    async fn self_account_id(&self) -> Result<AccountId, FeedError>;

    /// Mentions of `account` newer than `since` (all available if `None`), one page.
    async fn fetch_mentions_since(
        &self,
        account: &AccountId,
        since: Option<MentionId>,
    ) -> Result<MentionBatch, FeedError>;

    async fn post_reply(&self, in_reply_to: MentionId, text: &str) -> Result<(), FeedError>;
}

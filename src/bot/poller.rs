//! The mention loop: fetch, reply one by one, advance the cursor, sleep.

use chrono::Utc;
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::cursor::{CursorError, CursorStore, ReplyRecord, ReplyStatus};
use super::responder::Responder;
use super::retry::RetryPolicy;
use super::{AccountId, FeedError, Mention, MentionFeed, MentionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollerSettings {
    /// Sleep between cycles.
    pub interval: Duration,
    pub retry: RetryPolicy,
}

impl PollerSettings {
    /// Fixed interval, with fetch failures retried at the same pace.
    pub fn new(interval: Duration, max_fetch_attempts: Option<u32>) -> Self {
        Self {
            interval,
            retry: RetryPolicy {
                max_attempts: max_fetch_attempts,
                ..RetryPolicy::forever(interval)
            },
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self::new(Duration::from_secs(60), None)
    }
}

/// What one cycle did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub fetched: usize,
    pub replied: Vec<MentionId>,
    pub skipped_self: usize,
    /// Mentions whose reply could not be produced or posted. Not retried.
    pub failed: Vec<MentionId>,
    /// Cursor after the cycle.
    pub cursor: Option<MentionId>,
}

#[derive(Debug)]
pub enum PollerError {
    /// Could not establish who we are. Credentials are wrong or missing.
    Auth(String),
    /// Cursor store unreadable at startup.
    Store(CursorError),
    RetriesExhausted { attempts: u32, last: FeedError },
}

impl fmt::Display for PollerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PollerError::Auth(e) => write!(f, "authentication failed: {e}"),
            PollerError::Store(e) => write!(f, "cursor store unavailable: {e}"),
            PollerError::RetriesExhausted { attempts, last } => {
                write!(f, "giving up after {attempts} consecutive fetch failures, last: {last}")
            }
        }
    }
}

impl std::error::Error for PollerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PollerError::Auth(_) => None,
            PollerError::Store(e) => Some(e),
            PollerError::RetriesExhausted { last, .. } => Some(last),
        }
    }
}

pub struct MentionPoller<F, R, S> {
    feed: F,
    responder: R,
    store: S,
    settings: PollerSettings,
    account: AccountId,
    cursor: Option<MentionId>,
}

impl<F, R, S> MentionPoller<F, R, S>
where
    F: MentionFeed,
    R: Responder,
    S: CursorStore,
{
    /// Authenticate against the feed and load the cursor.
    pub async fn connect(
        feed: F,
        responder: R,
        store: S,
        settings: PollerSettings,
    ) -> Result<Self, PollerError> {
        let account = match feed.self_account_id().await {
            Ok(account) => account,
            Err(e) => {
                error!(severity = "critical", "Authentication failed: {e}");
                return Err(PollerError::Auth(e.to_string()));
            }
        };

        let cursor = match store.load() {
            Ok(cursor) => cursor,
            Err(e) => {
                error!(severity = "critical", "Cannot read cursor: {e}");
                return Err(PollerError::Store(e));
            }
        };

        match cursor {
            Some(id) => info!("Resuming after mention {}", id),
            None => info!("No cursor yet, starting from the newest available mentions"),
        }

        Ok(Self {
            feed,
            responder,
            store,
            settings,
            account,
            cursor,
        })
    }

    pub fn cursor(&self) -> Option<MentionId> {
        self.cursor
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// One fetch-reply-persist cycle. Errors only when the fetch fails.
    pub async fn poll_once(&mut self) -> Result<CycleReport, FeedError> {
        match self.cursor {
            Some(id) => info!("Checking for mentions since {}", id),
            None => info!("Checking for mentions"),
        }

        let batch = self.feed.fetch_mentions_since(&self.account, self.cursor).await?;

        let mut report = CycleReport {
            fetched: batch.mentions.len(),
            cursor: self.cursor,
            ..Default::default()
        };

        if batch.mentions.is_empty() {
            info!("No new mentions");
            return Ok(report);
        }
        info!("📬 {} new mention(s)", batch.mentions.len());

        for mention in &batch.mentions {
            if mention.author_id == self.account {
                debug!("Skipping own mention {}", mention.id);
                report.skipped_self += 1;
                continue;
            }

            if self.reply_to(mention).await {
                report.replied.push(mention.id);
            } else {
                report.failed.push(mention.id);
            }
        }

        let newest = match batch.newest_id {
            Some(id) => Some(id),
            None => {
                warn!("Feed returned no newest_id, using the largest id in the batch");
                batch.mentions.iter().map(|m| m.id).max()
            }
        };
        if let Some(newest) = newest {
            self.advance(newest);
        }

        if !report.failed.is_empty() {
            warn!("Could not reply to: {:?}", report.failed);
        }
        report.cursor = self.cursor;
        Ok(report)
    }

    /// Produce and post a reply. Returns whether it was posted.
    /// Failures are logged and journaled here.
    async fn reply_to(&self, mention: &Mention) -> bool {
        let reply = match self.responder.reply_for(&mention.text).await {
            Ok(reply) => reply,
            Err(e) => {
                error!("No reply for mention {}: {e}", mention.id);
                self.journal(mention, None, ReplyStatus::Failed);
                return false;
            }
        };

        match self.feed.post_reply(mention.id, &reply).await {
            Ok(()) => {
                info!("↩️ Replied to {} from {}: {:?}", mention.id, mention.author_id, reply);
                self.journal(mention, Some(reply), ReplyStatus::Sent);
                true
            }
            Err(e) => {
                error!("Failed to post reply to {}: {e}", mention.id);
                self.journal(mention, Some(reply), ReplyStatus::Failed);
                false
            }
        }
    }

    fn journal(&self, mention: &Mention, reply: Option<String>, status: ReplyStatus) {
        let record = ReplyRecord {
            mention_id: mention.id,
            author_id: mention.author_id.clone(),
            text: mention.text.clone(),
            reply,
            status,
            replied_at: Utc::now(),
        };
        if let Err(e) = self.store.record_reply(&record) {
            warn!("Failed to journal reply for {}: {e}", mention.id);
        }
    }

    /// Move the cursor forward and persist it. Never moves backward.
    fn advance(&mut self, newest: MentionId) {
        if self.cursor.is_some_and(|current| newest <= current) {
            return;
        }
        if let Err(e) = self.store.save(newest) {
            error!("Failed to persist cursor {}: {e}", newest);
        }
        self.cursor = Some(newest);
    }

    /// Poll until the retry policy gives up.
    pub async fn run_forever(&mut self) -> Result<(), PollerError> {
        info!("🤖 Mention bot running as {} (every {:?})", self.account, self.settings.interval);
        let mut failures: u32 = 0;

        loop {
            let delay = match self.poll_once().await {
                Ok(report) => {
                    failures = 0;
                    if report.fetched > 0 {
                        info!(
                            "Cycle done: {} replied, {} failed, {} own skipped, cursor {:?}",
                            report.replied.len(),
                            report.failed.len(),
                            report.skipped_self,
                            report.cursor.map(|c| c.0)
                        );
                    }
                    self.settings.interval
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if !self.settings.retry.should_retry(failures) {
                        error!("Giving up after {} consecutive fetch failures: {e}", failures);
                        return Err(PollerError::RetriesExhausted { attempts: failures, last: e });
                    }
                    warn!("Fetch failed ({} in a row): {e}", failures);
                    self.settings.retry.delay(failures)
                }
            };
            tokio::time::sleep(delay).await;
        }
    }
}

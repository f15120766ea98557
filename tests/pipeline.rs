//! End-to-end: trained model behind a live reply API, answered through the poller.
//!
//! Run with: cargo test --test pipeline

use std::sync::{Arc, Mutex};
use std::time::Duration;

use sentibot::api::server::router;
use sentibot::api::{ReplyTemplates, ResponseService};
use sentibot::bot::{
    AccountId, ApiClient, CursorStore, FeedError, FileCursorStore, Mention, MentionBatch,
    MentionFeed, MentionId, MentionPoller, PollerSettings, ReplyMode,
};
use sentibot::corpus::LabeledText;
use sentibot::sentiment::{Classifier, Sentiment, SentimentModel, TrainOptions};

const BOT: &str = "555";

#[derive(Clone, Default)]
struct ScriptedFeed {
    timeline: Arc<Mutex<Vec<Mention>>>,
    posted: Arc<Mutex<Vec<(MentionId, String)>>>,
}

impl MentionFeed for ScriptedFeed {
    async fn self_account_id(&self) -> Result<AccountId, FeedError> {
        Ok(AccountId(BOT.into()))
    }

    async fn fetch_mentions_since(
        &self,
        _account: &AccountId,
        since: Option<MentionId>,
    ) -> Result<MentionBatch, FeedError> {
        let mentions: Vec<Mention> = self
            .timeline
            .lock()
            .unwrap()
            .iter()
            .filter(|m| since.is_none_or(|s| m.id > s))
            .cloned()
            .collect();
        let newest_id = mentions.iter().map(|m| m.id).max();
        Ok(MentionBatch { mentions, newest_id })
    }

    async fn post_reply(&self, in_reply_to: MentionId, text: &str) -> Result<(), FeedError> {
        self.posted.lock().unwrap().push((in_reply_to, text.to_string()));
        Ok(())
    }
}

fn trained_model() -> SentimentModel {
    let pos = ["love amazing product", "great support thanks", "amazing team love", "great update"];
    let neg = ["hate broken app", "terrible support", "broken again hate", "terrible update"];
    let samples: Vec<LabeledText> = pos
        .iter()
        .map(|t| LabeledText { sentiment: Sentiment::Positive, text: t.to_string() })
        .chain(neg.iter().map(|t| LabeledText { sentiment: Sentiment::Negative, text: t.to_string() }))
        .collect();
    SentimentModel::train(&samples, 100, TrainOptions { epochs: 60, ..Default::default() })
}

/// Serve the reply API on an ephemeral port and return its base URL.
async fn spawn_api(model: Option<SentimentModel>, templates: ReplyTemplates) -> String {
    let classifier = model.map(|m| Arc::new(m) as Arc<dyn Classifier>);
    let service = Arc::new(ResponseService::new(classifier, None, templates));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router(service)).await.unwrap();
    });
    format!("http://{addr}")
}

fn mention(id: u64, author: &str, text: &str) -> Mention {
    Mention { id: MentionId(id), author_id: AccountId(author.into()), text: text.into() }
}

#[tokio::test]
async fn test_mentions_answered_end_to_end() {
    let templates = ReplyTemplates { positive: "Thanks, glad you like it!".into(), negative: "Sorry! DM us.".into() };
    let base_url = spawn_api(Some(trained_model()), templates.clone()).await;

    let feed = ScriptedFeed::default();
    feed.timeline.lock().unwrap().extend([
        mention(11, "1", "@acme_support I love this AMAZING product! https://t.co/abc"),
        mention(12, BOT, "@acme_support our own reply"),
        mention(13, "2", "@acme_support the app is broken again, terrible"),
    ]);

    let dir = tempfile::tempdir().unwrap();
    let cursor_path = dir.path().join("last_seen_id.txt");
    let responder = ApiClient::new(&base_url, ReplyMode::Retrieval, Duration::from_secs(5)).unwrap();
    let mut poller = MentionPoller::connect(
        feed.clone(),
        responder,
        FileCursorStore::new(&cursor_path),
        PollerSettings::new(Duration::ZERO, None),
    )
    .await
    .unwrap();

    let report = poller.poll_once().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.skipped_self, 1);
    assert!(report.failed.is_empty());

    let posted = feed.posted.lock().unwrap().clone();
    assert_eq!(
        posted,
        vec![
            (MentionId(11), templates.positive.clone()),
            (MentionId(13), templates.negative.clone()),
        ]
    );
    assert_eq!(FileCursorStore::new(&cursor_path).load().unwrap(), Some(MentionId(13)));
}

#[tokio::test]
async fn test_unloaded_model_fails_mentions_but_advances() {
    let base_url = spawn_api(None, ReplyTemplates::default()).await;

    let feed = ScriptedFeed::default();
    feed.timeline.lock().unwrap().push(mention(21, "1", "@acme_support hello"));

    let dir = tempfile::tempdir().unwrap();
    let responder = ApiClient::new(&base_url, ReplyMode::Retrieval, Duration::from_secs(5)).unwrap();
    let mut poller = MentionPoller::connect(
        feed.clone(),
        responder,
        FileCursorStore::new(dir.path().join("cursor.txt")),
        PollerSettings::new(Duration::ZERO, None),
    )
    .await
    .unwrap();

    let report = poller.poll_once().await.unwrap();
    assert_eq!(report.failed, vec![MentionId(21)]);
    assert!(feed.posted.lock().unwrap().is_empty());
    assert_eq!(poller.cursor(), Some(MentionId(21)));
}

#[tokio::test]
async fn test_compare_against_live_api() {
    let base_url = spawn_api(Some(trained_model()), ReplyTemplates::default()).await;
    let client = ApiClient::new(&base_url, ReplyMode::Retrieval, Duration::from_secs(5)).unwrap();

    let result = client.compare("@acme_support terrible update, hate it").await;
    let retrieval = result.retrieval.unwrap();
    assert_eq!(retrieval.sentiment, Sentiment::Negative);
    assert_eq!(retrieval.reply, ReplyTemplates::default().negative);

    let err = result.generative.unwrap_err();
    assert!(err.to_string().contains("Generative model is not loaded."));
}

//! Activity feed refresher.
//!
//! Keeps a bounded, de-duplicated local mirror of a repository activity feed.
//! Each refresh is a conditional GET: the last `Last-Modified` value the
//! server sent goes out as `If-Modified-Since`, so an unchanged feed costs a
//! 304 instead of a full download.
//!
//! Failures never reach the caller. Network, decode and disk errors are
//! logged and the previous state stays in place.

use anyhow::Result;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::api::{ApiClient, FeedResponse};
use crate::cache::CacheManager;
use crate::config::Config;
use crate::models::{merge_feed, FeedEvent};

/// Feed entries kept after a merge.
pub const DEFAULT_HISTORY_LIMIT: usize = 50;

/// What a refresh did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// New events were merged; `cached` is the history length afterwards
    Updated { received: usize, cached: usize },
    /// The server answered without new events (e.g. 304)
    NotModified,
    /// Network failure, error status or undecodable body
    Failed,
}

pub struct FeedRefresher {
    client: ApiClient,
    cache: CacheManager,
    feed_url: String,
    history_limit: usize,
    events: watch::Sender<Vec<FeedEvent>>,
    token: watch::Sender<Option<String>>,
    refreshing: watch::Sender<bool>,
    had_cache: bool,
}

impl FeedRefresher {
    /// Create a refresher, reading the persisted history and token once.
    pub fn open(client: ApiClient, cache: CacheManager, feed_url: String, history_limit: usize) -> Self {
        let token = match cache.load_fetch_token() {
            Ok(token) => token,
            Err(e) => {
                warn!(error = %e, "Failed to read fetch token, starting without one");
                None
            }
        };

        let cached = match cache.load_feed_events() {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to read cached feed, starting empty");
                None
            }
        };
        let had_cache = cached.is_some();

        debug!(
            url = %feed_url,
            cached = cached.as_ref().map(Vec::len).unwrap_or(0),
            has_token = token.is_some(),
            "Feed refresher opened"
        );

        Self {
            client,
            cache,
            feed_url,
            history_limit,
            events: watch::Sender::new(cached.unwrap_or_default()),
            token: watch::Sender::new(token),
            refreshing: watch::Sender::new(false),
            had_cache,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let client = ApiClient::from_config(config)?;
        let cache = CacheManager::new(config.cache_dir()?)?;
        Ok(Self::open(
            client,
            cache,
            config.feed_url(),
            config.feed_history_limit,
        ))
    }

    /// Whether a persisted history was found at startup.
    /// Without one, callers should refresh right away.
    pub fn has_cached_events(&self) -> bool {
        self.had_cache
    }

    /// Current history, newest first
    pub fn events(&self) -> Vec<FeedEvent> {
        self.events.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<FeedEvent>> {
        self.events.subscribe()
    }

    pub fn fetch_token(&self) -> Option<String> {
        self.token.borrow().clone()
    }

    pub fn is_refreshing(&self) -> bool {
        *self.refreshing.borrow()
    }

    pub fn subscribe_refreshing(&self) -> watch::Receiver<bool> {
        self.refreshing.subscribe()
    }

    /// Fetch the feed once and fold the result into the local mirror.
    ///
    /// Callers must not start another refresh before this one returns.
    pub async fn refresh(&self) -> RefreshOutcome {
        self.refreshing.send_replace(true);

        let token = self.fetch_token();
        let outcome = match self.client.fetch_feed(&self.feed_url, token.as_deref()).await {
            Ok(response) => {
                let (outcome, ()) =
                    tokio::join!(self.apply_events(&response), self.apply_token(&response));
                outcome
            }
            Err(e) => {
                warn!(url = %self.feed_url, error = %e, "Feed fetch failed");
                RefreshOutcome::Failed
            }
        };

        self.refreshing.send_replace(false);
        outcome
    }

    async fn apply_events(&self, response: &FeedResponse) -> RefreshOutcome {
        if !response.has_events() {
            if response.accepts_token() {
                debug!(status = %response.status, "Feed not modified");
                return RefreshOutcome::NotModified;
            }
            warn!(status = %response.status, "Feed request rejected");
            return RefreshOutcome::Failed;
        }

        let fresh = match response.decode_events() {
            Ok(events) => events,
            Err(e) => {
                warn!(error = %e, "Failed to decode feed body");
                return RefreshOutcome::Failed;
            }
        };

        let received = fresh.len();
        let merged = merge_feed(fresh, &self.events.borrow(), self.history_limit);
        let cached = merged.len();

        if let Err(e) = self.cache.save_feed_events(&merged) {
            warn!(error = %e, "Failed to cache feed events");
        }
        self.events.send_replace(merged);

        info!(received = received, cached = cached, "Feed refreshed");
        RefreshOutcome::Updated { received, cached }
    }

    async fn apply_token(&self, response: &FeedResponse) {
        if !response.accepts_token() {
            return;
        }
        let Some(ref token) = response.last_modified else {
            return;
        };

        if let Err(e) = self.cache.save_fetch_token(token) {
            warn!(error = %e, "Failed to persist fetch token");
        }
        self.token.send_replace(Some(token.clone()));
        debug!(token = %token, "Fetch token updated");
    }
}

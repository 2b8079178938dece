//! Category/event merging.
//!
//! Loads the category list, fetches open and closed events for every category
//! with a bounded number of categories in flight, and folds each completed
//! batch onto the categories. Every fold step produces a fresh
//! `Vec<Category>`; earlier snapshots are never mutated.

use async_trait::async_trait;
use futures::future;
use futures::stream::{self, Stream, StreamExt};
use tracing::{debug, info, warn};

use crate::api::ApiError;
use crate::config::Config;
use crate::models::{filtered_events, Category, Event, EventStatus};

/// Look back this many days when fetching events for a category.
pub const DEFAULT_LOOKBACK_DAYS: u32 = 360;

/// Category event fetches allowed in flight at once.
pub const DEFAULT_MAX_CONCURRENT: usize = 2;

/// Where categories and their events come from.
#[async_trait]
pub trait EventSource: Send + Sync {
    async fn categories(&self) -> Result<Vec<Category>, ApiError>;

    async fn events(
        &self,
        endpoint: &str,
        days: u32,
        status: EventStatus,
    ) -> Result<Vec<Event>, ApiError>;
}

/// Open and closed events fetched from one category's endpoint.
///
/// The events may also belong to other categories; the fold offers every
/// batch to every category.
#[derive(Debug, Clone)]
pub struct EventBatch {
    pub category_id: String,
    pub events: Vec<Event>,
}

/// Fold one batch into a new snapshot.
pub fn apply_batch(categories: &[Category], batch: &EventBatch) -> Vec<Category> {
    categories
        .iter()
        .map(|category| {
            let incoming = filtered_events(&batch.events, category);
            if incoming.is_empty() {
                return category.clone();
            }
            let mut updated = category.clone();
            updated.events.extend(incoming);
            updated
        })
        .collect()
}

pub struct CategoryMerger<S> {
    source: S,
    lookback_days: u32,
    max_concurrent: usize,
}

impl<S: EventSource> CategoryMerger<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }

    pub fn from_config(source: S, config: &Config) -> Self {
        Self::new(source)
            .with_lookback_days(config.event_lookback_days)
            .with_max_concurrent(config.max_concurrent_category_fetches)
    }

    pub fn with_lookback_days(mut self, days: u32) -> Self {
        self.lookback_days = days;
        self
    }

    /// A cap of zero would never start a fetch, so it is raised to one.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    /// Category list sorted by name; empty when the fetch fails
    pub async fn fetch_categories(&self) -> Vec<Category> {
        match self.source.categories().await {
            Ok(mut categories) => {
                categories.sort_by(|a, b| a.name.cmp(&b.name));
                info!(count = categories.len(), "Categories fetched");
                categories
            }
            Err(e) => {
                warn!(error = %e, "Categories fetch failed");
                Vec::new()
            }
        }
    }

    async fn fetch_status(&self, category: &Category, status: EventStatus) -> Vec<Event> {
        match self
            .source
            .events(&category.endpoint_path, self.lookback_days, status)
            .await
        {
            Ok(events) => events,
            Err(e) => {
                warn!(category = %category.id, status = %status, error = %e, "Events fetch failed");
                Vec::new()
            }
        }
    }

    /// Open and closed events for one category, fetched side by side
    pub async fn fetch_category_events(&self, category: &Category) -> EventBatch {
        let (open, closed) = future::join(
            self.fetch_status(category, EventStatus::Open),
            self.fetch_status(category, EventStatus::Closed),
        )
        .await;

        let mut events = open;
        events.extend(closed);
        EventBatch {
            category_id: category.id.clone(),
            events,
        }
    }

    /// Initial category list first, then one updated snapshot per category
    /// batch, in completion order.
    pub fn load_categories_with_events(&self) -> impl Stream<Item = Vec<Category>> + '_ {
        stream::once(self.fetch_categories()).flat_map(move |categories| {
            let initial = stream::once(future::ready(categories.clone()));

            let updates = stream::iter(categories.clone())
                .map(move |category| async move { self.fetch_category_events(&category).await })
                .buffer_unordered(self.max_concurrent)
                .scan(categories, |snapshot, batch| {
                    debug!(category = %batch.category_id, events = batch.events.len(), "Merging category events");
                    *snapshot = apply_batch(snapshot, &batch);
                    future::ready(Some(snapshot.clone()))
                });

            initial.chain(updates)
        })
    }

    /// Drive the merge to completion and return the last snapshot
    pub async fn load_final(&self) -> Vec<Category> {
        self.load_categories_with_events()
            .fold(Vec::new(), |_, snapshot| future::ready(snapshot))
            .await
    }
}

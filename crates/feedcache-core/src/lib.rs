//! feedcache core library.
//!
//! Two small pipelines over HTTP APIs:
//! - [`FeedRefresher`]: bounded local mirror of a repository activity feed,
//!   refreshed with conditional requests
//! - [`CategoryMerger`]: natural-event categories with their open and closed
//!   events fetched per category and folded in as they arrive

pub mod api;
pub mod cache;
pub mod config;
pub mod feed;
pub mod merger;
pub mod models;
pub mod utils;

pub use api::{ApiClient, ApiError, FeedResponse};
pub use cache::{CacheManager, PersistenceError};
pub use config::Config;
pub use feed::{FeedRefresher, RefreshOutcome};
pub use merger::{apply_batch, CategoryMerger, EventBatch, EventSource};
pub use models::{Category, Event, EventStatus, FeedEvent};

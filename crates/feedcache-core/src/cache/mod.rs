//! Local caching module for the activity feed.
//!
//! This module provides the `CacheManager`, which keeps two flat files in
//! the cache directory:
//! - `events.json`: the bounded feed history as a JSON array
//! - `modified.txt`: the last `Last-Modified` value the server sent
//!
//! Write failures surface as `PersistenceError`; callers treat them as
//! best-effort and only log them.

pub mod error;
pub mod manager;

pub use error::PersistenceError;
pub use manager::{CacheManager, EVENTS_FILE, TOKEN_FILE};

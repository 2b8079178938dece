//! REST API client module.
//!
//! This module provides the `ApiClient` for talking to the GitHub events
//! API (repository activity feed) and the NASA EONET API (natural-event
//! categories and events).

pub mod client;
pub mod error;

pub use client::{ApiClient, FeedResponse};
pub use error::ApiError;

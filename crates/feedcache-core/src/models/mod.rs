//! Data models for feeds, categories and events.
//!
//! - `FeedEvent`: one entry of a repository activity feed
//! - `Category`, `Event`: natural-event categories and the events attached to them
//!
//! Each domain type has a `*Response` counterpart matching the provider's
//! JSON shape, converted with `to_*` methods.

pub mod category;
pub mod feed;

pub use category::{
    events_within_days, filtered_events, Category, CategoryResponse, Envelope, Event,
    EventResponse, EventStatus,
};
pub use feed::{merge_feed, FeedEvent, FeedEventResponse};

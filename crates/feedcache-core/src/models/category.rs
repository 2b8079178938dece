use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Event status filter understood by the events endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    Open,
    Closed,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Open => "open",
            EventStatus::Closed => "closed",
        }
    }
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Category {
    pub id: String,
    pub name: String,
    pub description: String,
    pub endpoint_path: String,
    pub events: Vec<Event>,
}

impl Category {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        endpoint_path: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            endpoint_path: endpoint_path.into(),
            events: Vec::new(),
        }
    }

    pub fn has_event(&self, event_id: &str) -> bool {
        self.events.iter().any(|e| e.id == event_id)
    }

    /// List label: "Wildfires (12)"
    pub fn display_label(&self) -> String {
        format!("{} ({})", self.name, self.events.len())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub category_ids: BTreeSet<String>,
    pub date: Option<DateTime<Utc>>,
}

impl Event {
    pub fn belongs_to(&self, category_id: &str) -> bool {
        self.category_ids.contains(category_id)
    }

    /// Date ascending, undated events last, ties broken by id.
    pub fn compare_dates(a: &Event, b: &Event) -> Ordering {
        let by_date = match (&a.date, &b.date) {
            (Some(x), Some(y)) => x.cmp(y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        by_date.then_with(|| a.id.cmp(&b.id))
    }

    pub fn formatted_date(&self) -> String {
        match &self.date {
            Some(dt) => dt.format("%b %d, %Y").to_string(),
            None => "TBD".to_string(),
        }
    }
}

/// Events from `events` that belong to `category` and are not attached to it
/// yet, each id at most once, in [`Event::compare_dates`] order.
pub fn filtered_events(events: &[Event], category: &Category) -> Vec<Event> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut matching: Vec<Event> = events
        .iter()
        .filter(|event| event.belongs_to(&category.id) && !category.has_event(&event.id))
        .filter(|event| seen.insert(event.id.as_str()))
        .cloned()
        .collect();
    matching.sort_by(Event::compare_dates);
    matching
}

/// Events dated within `days` of `now` in either direction; undated events
/// are always kept.
pub fn events_within_days(events: &[Event], days: u32, now: DateTime<Utc>) -> Vec<Event> {
    let max_interval = Duration::days(i64::from(days));
    events
        .iter()
        .filter(|event| match event.date {
            Some(date) => (date - now).abs() < max_interval,
            None => true,
        })
        .cloned()
        .collect()
}

// ============================================================================
// EONET wire format
// ============================================================================

/// `{"categories": [...]}` / `{"events": [...]}` response wrapper
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    #[serde(alias = "categories", alias = "events")]
    pub content: Vec<T>,
}

#[derive(Debug, Deserialize)]
pub struct CategoryResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(alias = "name")]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(alias = "endpoint")]
    pub link: String,
}

impl CategoryResponse {
    pub fn to_category(&self) -> Category {
        Category::new(
            self.id.clone(),
            self.title.clone(),
            self.description.clone().unwrap_or_default(),
            self.link.clone(),
        )
    }
}

#[derive(Debug, Deserialize)]
pub struct EventResponse {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub categories: Vec<EventCategoryRef>,
    #[serde(default)]
    pub geometries: Vec<EventGeometry>,
}

#[derive(Debug, Deserialize)]
pub struct EventCategoryRef {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct EventGeometry {
    pub date: Option<String>,
}

impl EventResponse {
    pub fn to_event(&self) -> Event {
        // Most recent observation wins; unparseable dates are ignored
        let date = self
            .geometries
            .iter()
            .filter_map(|g| g.date.as_deref())
            .filter_map(|d| DateTime::parse_from_rfc3339(d).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .max();

        Event {
            id: self.id.clone(),
            title: self.title.clone(),
            category_ids: self.categories.iter().map(|c| c.id.clone()).collect(),
            date,
        }
    }
}

/// EONET v2 uses numeric category ids, v3 uses slugs.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Text(String),
        Number(i64),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Text(s) => s,
        RawId::Number(n) => n.to_string(),
    })
}

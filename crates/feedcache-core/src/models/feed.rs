use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::utils::{action_label, format_date};

/// One entry of a repository activity feed.
///
/// Stored in its own flat form; the GitHub wire shape is decoded through
/// [`FeedEventResponse`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedEvent {
    pub id: String,
    pub actor_name: String,
    #[serde(rename = "actorAvatarURL")]
    pub actor_avatar_url: String,
    pub repo_name: String,
    pub action_kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

impl FeedEvent {
    /// Detail line for list view: "ReactiveX/RxSwift, push"
    pub fn summary(&self) -> String {
        format!("{}, {}", self.repo_name, action_label(&self.action_kind))
    }

    pub fn formatted_timestamp(&self) -> String {
        self.timestamp
            .as_deref()
            .map(format_date)
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// GitHub events API shape

#[derive(Debug, Deserialize)]
pub struct FeedEventResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub actor: FeedActor,
    pub repo: FeedRepo,
    pub created_at: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedActor {
    pub login: Option<String>,
    pub display_login: Option<String>,
    #[serde(default)]
    pub avatar_url: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedRepo {
    pub name: String,
}

impl FeedEventResponse {
    pub fn to_feed_event(&self) -> FeedEvent {
        let actor_name = self
            .actor
            .display_login
            .clone()
            .or_else(|| self.actor.login.clone())
            .unwrap_or_default();

        FeedEvent {
            id: self.id.clone(),
            actor_name,
            actor_avatar_url: self.actor.avatar_url.clone(),
            repo_name: self.repo.name.clone(),
            action_kind: self.kind.clone(),
            timestamp: self.created_at.clone(),
        }
    }
}

/// Put freshly fetched events in front of the cached history.
///
/// Keeps the first occurrence of each id, so a re-delivered event replaces its
/// older cached copy, then truncates to `limit` entries.
pub fn merge_feed(fresh: Vec<FeedEvent>, cached: &[FeedEvent], limit: usize) -> Vec<FeedEvent> {
    let mut seen: HashSet<String> = HashSet::with_capacity(fresh.len() + cached.len());
    let mut merged = Vec::with_capacity(limit.min(fresh.len() + cached.len()));

    for event in fresh.into_iter().chain(cached.iter().cloned()) {
        if merged.len() == limit {
            break;
        }
        if seen.insert(event.id.clone()) {
            merged.push(event);
        }
    }

    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(id: &str) -> FeedEvent {
        FeedEvent {
            id: id.to_string(),
            actor_name: "octocat".to_string(),
            actor_avatar_url: "https://avatars.example/octocat".to_string(),
            repo_name: "ReactiveX/RxSwift".to_string(),
            action_kind: "PushEvent".to_string(),
            timestamp: None,
        }
    }

    fn ids(events: &[FeedEvent]) -> Vec<&str> {
        events.iter().map(|e| e.id.as_str()).collect()
    }

    #[test]
    fn test_decode_github_event() {
        let json = r#"{
            "id": "2489651045",
            "type": "WatchEvent",
            "actor": {
                "id": 665991,
                "login": "petroav",
                "display_login": "petroav",
                "avatar_url": "https://avatars.githubusercontent.com/u/665991?"
            },
            "repo": { "id": 28688495, "name": "petroav/6.828" },
            "payload": { "action": "started" },
            "public": true,
            "created_at": "2015-01-01T15:00:00Z"
        }"#;

        let raw: FeedEventResponse = serde_json::from_str(json).unwrap();
        let event = raw.to_feed_event();
        assert_eq!(event.id, "2489651045");
        assert_eq!(event.actor_name, "petroav");
        assert_eq!(event.repo_name, "petroav/6.828");
        assert_eq!(event.action_kind, "WatchEvent");
        assert_eq!(event.timestamp.as_deref(), Some("2015-01-01T15:00:00Z"));
        assert_eq!(event.summary(), "petroav/6.828, watch");
    }

    #[test]
    fn test_actor_falls_back_to_login() {
        let json = r#"{
            "id": "1", "type": "ForkEvent",
            "actor": { "login": "hubot", "avatar_url": "" },
            "repo": { "name": "a/b" }
        }"#;
        let raw: FeedEventResponse = serde_json::from_str(json).unwrap();
        let event = raw.to_feed_event();
        assert_eq!(event.actor_name, "hubot");
        assert_eq!(event.timestamp, None);
    }

    #[test]
    fn test_cached_form_uses_flat_field_names() {
        let value = serde_json::to_value(event("7")).unwrap();
        assert_eq!(value["actorName"], "octocat");
        assert_eq!(value["actorAvatarURL"], "https://avatars.example/octocat");
        assert_eq!(value["actionKind"], "PushEvent");
        assert!(value.get("timestamp").is_none());
    }

    #[test]
    fn test_merge_puts_fresh_events_first() {
        let cached = vec![event("3"), event("2")];
        let merged = merge_feed(vec![event("5"), event("4")], &cached, 50);
        assert_eq!(ids(&merged), vec!["5", "4", "3", "2"]);
    }

    #[test]
    fn test_merge_never_exceeds_limit() {
        let cached: Vec<FeedEvent> = (0..50).map(|i| event(&format!("old-{}", i))).collect();
        let fresh: Vec<FeedEvent> = (0..30).map(|i| event(&format!("new-{}", i))).collect();
        let merged = merge_feed(fresh, &cached, 50);
        assert_eq!(merged.len(), 50);
        assert_eq!(merged[0].id, "new-0");
        assert_eq!(merged[29].id, "new-29");
        assert_eq!(merged[30].id, "old-0");
    }

    #[test]
    fn test_merge_drops_redelivered_ids() {
        let cached = vec![event("2"), event("1")];
        let mut updated = event("2");
        updated.actor_name = "someone-else".to_string();
        let merged = merge_feed(vec![event("3"), updated], &cached, 50);
        assert_eq!(ids(&merged), vec!["3", "2", "1"]);
        assert_eq!(merged[1].actor_name, "someone-else");
    }
}

use std::time::Duration;

use feedcache_core::{ApiClient, ApiError, CategoryMerger, EventStatus};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(server.uri(), Duration::from_secs(5)).unwrap()
}

async fn mount_categories(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "title": "EONET Event Categories",
            "categories": [
                {
                    "id": 8,
                    "title": "Wildfires",
                    "link": format!("{}/categories/8", server.uri()),
                    "description": "Wildland fires."
                },
                {
                    "id": 6,
                    "title": "Drought",
                    "link": format!("{}/categories/6", server.uri()),
                    "description": "Long lasting absence of precipitation."
                }
            ]
        })))
        .mount(server)
        .await;
}

fn events_body(events: &[(&str, i64)]) -> serde_json::Value {
    let events: Vec<serde_json::Value> = events
        .iter()
        .map(|(id, category)| {
            json!({
                "id": id,
                "title": format!("Event {}", id),
                "categories": [{ "id": category, "title": "ignored" }],
                "geometries": [{ "date": "2020-08-01T00:00:00Z", "type": "Point" }]
            })
        })
        .collect();
    json!({ "title": "EONET Events", "events": events })
}

#[tokio::test]
async fn fetches_and_decodes_categories() {
    let server = MockServer::start().await;
    mount_categories(&server).await;

    let categories = client(&server).fetch_categories().await.unwrap();
    assert_eq!(categories.len(), 2);
    assert_eq!(categories[0].id, "8");
    assert_eq!(categories[0].name, "Wildfires");
    assert!(categories[0].endpoint_path.ends_with("/categories/8"));
    assert!(categories.iter().all(|c| c.events.is_empty()));
}

#[tokio::test]
async fn event_fetch_sends_days_and_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories/8"))
        .and(query_param("days", "360"))
        .and(query_param("status", "closed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(events_body(&[("EONET_1", 8)])))
        .expect(1)
        .mount(&server)
        .await;

    let events = client(&server)
        .fetch_events("/categories/8", 360, EventStatus::Closed)
        .await
        .unwrap();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].id, "EONET_1");
    assert!(events[0].belongs_to("8"));
    assert!(events[0].date.is_some());
}

#[tokio::test]
async fn error_status_maps_to_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(404).set_body_string("no such thing"))
        .mount(&server)
        .await;

    let result = client(&server).fetch_categories().await;
    assert!(matches!(result, Err(ApiError::NotFound(ref body)) if body == "no such thing"));
}

#[tokio::test]
async fn merger_folds_events_over_http() {
    let server = MockServer::start().await;
    mount_categories(&server).await;

    Mock::given(method("GET"))
        .and(path("/categories/8"))
        .and(query_param("status", "open"))
        .respond_with(ResponseTemplate::new(200).set_body_json(events_body(&[("EONET_10", 8)])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories/8"))
        .and(query_param("status", "closed"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(events_body(&[("EONET_11", 8), ("EONET_10", 8)])),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/categories/6"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .mount(&server)
        .await;

    let merger = CategoryMerger::new(client(&server));
    let categories = merger.load_final().await;

    // Sorted by name: Drought before Wildfires
    assert_eq!(categories[0].name, "Drought");
    assert!(categories[0].events.is_empty());

    let wildfire_ids: Vec<&str> = categories[1].events.iter().map(|e| e.id.as_str()).collect();
    assert_eq!(wildfire_ids.len(), 2);
    assert!(wildfire_ids.contains(&"EONET_10"));
    assert!(wildfire_ids.contains(&"EONET_11"));
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_categories(&server).await;

    let client = client(&server).with_initial_backoff(Duration::from_millis(10));
    let categories = client.fetch_categories().await.unwrap();
    assert_eq!(categories.len(), 2);
}

#[tokio::test]
async fn persistent_rate_limit_gives_up_after_three_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/categories"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let client = client(&server).with_initial_backoff(Duration::from_millis(5));
    let result = client.fetch_categories().await;
    assert!(matches!(result, Err(ApiError::RateLimited)));
}

use ig_scraper::app::ports::RegistryPort;
use ig_scraper::error::{ScraperError, SinkError};
use ig_scraper::infra::registry::HttpRegistry;
use ig_scraper::pipeline::active_items;
use serde_json::json;
use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn registry_for(server: &MockServer) -> HttpRegistry {
    HttpRegistry::new(reqwest::Client::new(), &format!("{}/api/", server.uri()), "secret")
}

#[tokio::test]
async fn lists_items_and_keeps_active_ones_in_order() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/"))
        .and(query_param("key", "secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": "a1", "url": "https://www.instagram.com/p/B/", "active": true, "platform": "instagram"},
            {"id": 2, "url": "https://www.instagram.com/p/C/", "active": false},
            {"id": 3, "url": "https://www.instagram.com/reel/D/", "active": true}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let items = registry.list_items().await.unwrap();
    assert_eq!(items.len(), 3);

    let active = active_items(items);
    let ids: Vec<&str> = active.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["a1", "3"]);
}

#[tokio::test]
async fn null_urls_and_malformed_entries_do_not_fail_the_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"id": 1, "url": "https://www.instagram.com/p/B/", "active": true},
            {"id": 2, "url": null, "active": false},
            {"id": 3, "url": null, "active": true},
            {"id": null, "url": "https://www.instagram.com/p/C/", "active": true}
        ])))
        .mount(&server)
        .await;

    let items = registry_for(&server).list_items().await.unwrap();
    let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["1", "2", "3"]);
    assert_eq!(items[1].url, None);
    assert_eq!(items[2].url, None);
    assert!(items[2].active);
}

#[tokio::test]
async fn listing_failure_is_an_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/posts/"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
        .mount(&server)
        .await;

    let err = registry_for(&server).list_items().await.unwrap_err();
    match err {
        ScraperError::Api { message } => assert!(message.contains("HTTP 401: bad key"), "{message}"),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn item_url_embeds_id_and_key() {
    let registry = HttpRegistry::new(reqwest::Client::new(), "https://registry.example/api/", "k1");
    assert_eq!(registry.item_url("42"), "https://registry.example/api/posts/42?key=k1");
}

#[tokio::test]
async fn deactivate_patches_active_false() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path("/api/posts/7"))
        .and(query_param("key", "secret"))
        .and(body_json(json!({"active": false})))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    registry.deactivate(&registry.item_url("7")).await.unwrap();
}

#[tokio::test]
async fn deactivate_failure_hides_the_key() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let registry = registry_for(&server);
    let err = registry.deactivate(&registry.item_url("7")).await.unwrap_err();
    match &err {
        SinkError::Deactivate { target, message } => {
            assert!(target.ends_with("/api/posts/7"));
            assert_eq!(message, "HTTP 500");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!err.to_string().contains("secret"));
}

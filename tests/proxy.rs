// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: (C) 2025 Cranky Kernel <crankykernel@proton.me>

//! End-to-end: configuration text -> cache manager -> HTTP surface, against
//! a mock upstream.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;
use wiremock::matchers::{method, path, query_param, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};
use xtream_proxy::server::{self, AppState};
use xtream_proxy::{CacheManager, Config};

fn config(upstream: &str) -> Config {
    Config::from_toml(&format!(
        r#"
        [upstream]
        server = "{upstream}/player_api.php"
        user = "proxyuser"
        pass = "proxypass"

        [proxy]
        refresh_interval_secs = 3600

        [filter]
        whitelist = ["  News ", "Kids"]
        blacklist = ["XXX"]
        whitelist-category = ["200"]
        "#
    ))
    .unwrap()
}

fn app(config: &Config) -> Router {
    let cache = CacheManager::from_config(config).unwrap();
    server::router(AppState::new(cache))
}

async fn mount(server: &MockServer, action: Option<&str>, body: Value) {
    let mock = Mock::given(method("GET"))
        .and(path("/player_api.php"))
        .and(query_param("username", "proxyuser"))
        .and(query_param("password", "proxypass"));
    let mock = match action {
        Some(action) => mock.and(query_param("action", action)),
        None => mock.and(query_param_is_missing("action")),
    };
    mock.respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

async fn mount_upstream(server: &MockServer) {
    mount(
        server,
        None,
        json!({
            "user_info": {"username": "proxyuser", "password": "proxypass", "status": "Active"},
            "server_info": {"url": "origin.example", "port": "80", "timezone": "UTC"},
        }),
    )
    .await;
    mount(
        server,
        Some("get_live_streams"),
        json!([
            {"num": 1, "name": "BBC News", "stream_id": 11, "category_id": "1"},
            {"num": 2, "name": "XXX News", "stream_id": 12, "category_id": "1"},
            {"num": 3, "name": "Sports", "stream_id": 13, "category_id": "2"},
            {"num": 4, "name": "Regional", "stream_id": 14, "category_id": "1"},
            {"num": 5, "name": "Music", "stream_id": 15, "category_id": "200"},
        ]),
    )
    .await;
    mount(
        server,
        Some("get_series"),
        json!([
            {"name": "Kids Club", "series_id": 21, "category_id": 30},
            {"name": "Drama", "series_id": 22, "category_id": 31},
        ]),
    )
    .await;
    mount(
        server,
        Some("get_vod_streams"),
        json!([
            {"name": "Cartoon Movie", "stream_id": 31, "category_id": "30"},
            {"name": "Thriller", "stream_id": 32, "category_id": "40"},
        ]),
    )
    .await;
    mount(
        server,
        Some("get_live_categories"),
        json!([
            {"category_id": "1", "category_name": "News"},
            {"category_id": "2", "category_name": "Sports"},
            {"category_id": "200", "category_name": "Music"},
        ]),
    )
    .await;
    mount(
        server,
        Some("get_series_categories"),
        json!([
            {"category_id": "30", "category_name": "Kids"},
            {"category_id": "31", "category_name": "Drama"},
        ]),
    )
    .await;
    mount(
        server,
        Some("get_vod_categories"),
        json!([
            {"category_id": "30", "category_name": "Kids"},
            {"category_id": "40", "category_name": "Thrillers"},
        ]),
    )
    .await;
}

async fn get_json(app: &Router, uri: &str) -> Value {
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = app.clone().oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK, "GET {uri}");
    let body = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

fn field(list: &Value, key: &str) -> Vec<Value> {
    list.as_array()
        .unwrap()
        .iter()
        .map(|item| item[key].clone())
        .collect()
}

#[tokio::test]
async fn test_filtered_catalog_is_served_from_one_refresh() {
    let upstream = MockServer::start().await;
    mount_upstream(&upstream).await;
    let app = app(&config(&upstream.uri()));

    let live = get_json(
        &app,
        "/player_api.php?username=a&password=b&action=get_live_streams",
    )
    .await;
    // Regional is admitted through category 1, unlocked by BBC News.
    // Music is admitted through the static category whitelist.
    assert_eq!(field(&live, "stream_id"), [json!(11), json!(14), json!(15)]);

    let series = get_json(&app, "/player_api.php?action=get_series").await;
    assert_eq!(field(&series, "series_id"), [json!(21)]);

    // Category 30 was unlocked by the series list.
    let vod = get_json(&app, "/player_api.php?action=get_vod_streams").await;
    assert_eq!(field(&vod, "stream_id"), [json!(31)]);

    let live_categories = get_json(&app, "/player_api.php?action=get_live_categories").await;
    assert_eq!(field(&live_categories, "category_id"), [json!("1"), json!("200")]);

    let series_categories = get_json(&app, "/player_api.php?action=get_series_categories").await;
    assert_eq!(field(&series_categories, "category_name"), [json!("Kids")]);

    let vod_categories = get_json(&app, "/player_api.php?action=get_vod_categories").await;
    assert_eq!(field(&vod_categories, "category_id"), [json!("30")]);

    let info = get_json(&app, "/player_api.php").await;
    assert_eq!(info["user_info"]["status"], "Active");
    assert_ne!(info["user_info"]["password"], "proxypass");
    assert_ne!(info["server_info"]["url"], "origin.example");
    assert_eq!(info["server_info"]["timezone"], "UTC");

    // Each upstream mock expects exactly one call; verified on drop.
}

#[tokio::test]
async fn test_playback_is_redirected_with_configured_credentials() {
    let upstream = MockServer::start().await;
    let app = app(&config(&upstream.uri()));

    let req = Request::builder()
        .uri("/movie/someone/whatever/31.mkv")
        .body(Body::empty())
        .unwrap();
    let resp = app.oneshot(req).await.unwrap();

    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = resp.headers()[header::LOCATION].to_str().unwrap();
    assert_eq!(
        location,
        format!("{}/movie/proxyuser/proxypass/31.mkv", upstream.uri())
    );
}

//! Blog endpoints over a temporary content directory.

#![allow(clippy::unwrap_used)]

use axum::http::{StatusCode, header};
use milletmart_integration_tests::{TestApp, json_body};

const RAGI: &str = "---
title: Why Ragi
description: Calcium without the dairy.
published_at: 2026-03-02
tags: [Nutrition, ragi]
---

Finger millet has **more calcium** than milk.
";

const PULAO: &str = "---
title: Foxtail Pulao
published_at: 2026-04-18
tags: [recipes]
---

Rinse, temper, simmer.
";

const DRAFT: &str = "---
title: Festive Hampers
published_at: 2026-11-01
tags: [announcements]
draft: true
---

Coming soon.
";

fn app() -> TestApp {
    TestApp::with_posts(&[
        ("2026-03-02-why-ragi", RAGI),
        ("2026-04-18-foxtail-pulao", PULAO),
        ("2026-11-01-festive-hampers", DRAFT),
        ("broken", "no front matter here"),
    ])
}

#[tokio::test]
async fn test_listing_is_newest_first_without_drafts() {
    let app = app();
    let response = app.get("/api/blog").await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "public, max-age=300");

    let posts = json_body(response).await;
    let slugs: Vec<&str> = posts
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["slug"].as_str().unwrap())
        .collect();
    assert_eq!(slugs, ["foxtail-pulao", "why-ragi"]);

    let ragi = &posts[1];
    assert_eq!(ragi["title"], "Why Ragi");
    assert_eq!(ragi["excerpt"], "Calcium without the dairy.");
    assert_eq!(ragi["reading_time_minutes"], 1);
    assert!(ragi.get("content_html").is_none());
}

#[tokio::test]
async fn test_listing_filters_by_tag() {
    let app = app();
    let posts = json_body(app.get("/api/blog?tag=nutrition").await).await;
    assert_eq!(posts.as_array().unwrap().len(), 1);
    assert_eq!(posts[0]["slug"], "why-ragi");

    let posts = json_body(app.get("/api/blog?tag=announcements").await).await;
    assert_eq!(posts, serde_json::json!([]));
}

#[tokio::test]
async fn test_tags_exclude_drafts() {
    let app = app();
    let tags = json_body(app.get("/api/blog/tags").await).await;
    assert_eq!(tags, serde_json::json!(["nutrition", "ragi", "recipes"]));
}

#[tokio::test]
async fn test_post_detail_renders_markdown() {
    let app = app();
    let response = app.get("/api/blog/why-ragi").await;
    assert_eq!(response.status(), StatusCode::OK);

    let post = json_body(response).await;
    assert_eq!(post["published_at"], "2026-03-02");
    assert!(
        post["content_html"]
            .as_str()
            .unwrap()
            .contains("<strong>more calcium</strong>")
    );
}

#[tokio::test]
async fn test_drafts_and_unknown_posts_are_not_found() {
    let app = app();
    for uri in ["/api/blog/festive-hampers", "/api/blog/broken", "/api/blog/nope"] {
        let response = app.get(uri).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(json_body(response).await["error"], "Post not found");
    }
}

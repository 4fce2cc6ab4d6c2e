#![allow(clippy::unwrap_used, clippy::missing_panics_doc, missing_debug_implementations, unreachable_pub)]
mod common;

use common::{TestApp, TestUser};
use serde_json::{Value, json};

async fn publish(app: &TestApp, user: &TestUser, title: &str, category: &str, subcategory: &str) -> Value {
    let body = json!({
        "title": title,
        "category": category,
        "subcategory": subcategory,
        "url": format!("https://cdn.example.com/video/upload/{title}.mp4"),
    });
    let (status, video) = app.post_json("/videos", &user.token, &body).await;
    assert_eq!(status, 201, "{video}");
    video
}

async fn patch(app: &TestApp, user: &TestUser, id: &Value, body: &Value) -> (u16, Value) {
    let resp = app
        .client
        .patch(app.url(&format!("/videos/{}", id.as_str().unwrap())))
        .bearer_auth(&user.token)
        .json(body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap_or(Value::Null))
}

#[tokio::test]
async fn test_publish_list_and_filter() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;
    let bob = app.register_user("bob").await;

    let first = publish(&app, &alice, "sunrise", "travel", "beaches").await;
    assert_eq!(first["uploader"]["username"], alice.username);
    assert_eq!(first["likes"], 0);
    publish(&app, &bob, "ramen", "food", "noodles").await;
    publish(&app, &bob, "lagoon", "travel", "beaches").await;

    let (status, all) = app.get_json("/videos", &alice.token).await;
    assert_eq!(status, 200);
    let titles: Vec<&str> = all.as_array().unwrap().iter().map(|v| v["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["lagoon", "ramen", "sunrise"]);

    let (_, travel) = app.get_json("/videos/search?category=travel&subcategory=beaches", &alice.token).await;
    assert_eq!(travel.as_array().unwrap().len(), 2);

    let (_, mine) = app.get_json(&format!("/videos?uploader={}", alice.id), &bob.token).await;
    assert_eq!(mine.as_array().unwrap().len(), 1);
    assert_eq!(mine[0]["id"], first["id"]);

    let (status, _) = app.get_json("/videos?uploader=nope", &alice.token).await;
    assert_eq!(status, 400);

    let (status, _) = app.get_json("/videos", "garbage").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn test_publish_requires_fields_and_http_url() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;

    let (status, _) = app.post_json("/videos", &alice.token, &json!({ "title": "no url" })).await;
    assert_eq!(status, 400);

    let body = json!({ "title": "t", "category": "c", "subcategory": "s", "url": "ftp://cdn.example.com/x.mp4" });
    let (status, _) = app.post_json("/videos", &alice.token, &body).await;
    assert_eq!(status, 400);
    assert_eq!(app.store.video_count(), 0);
}

#[tokio::test]
async fn test_likes_are_counted_once_per_user() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;
    let bob = app.register_user("bob").await;
    let video = publish(&app, &alice, "sunset", "travel", "beaches").await;

    for _ in 0..2 {
        let (status, liked) = patch(&app, &bob, &video["id"], &json!({ "action": "like" })).await;
        assert_eq!(status, 200);
        assert_eq!(liked["likes"], 1);
        assert_eq!(liked["likedBy"], json!([bob.id.to_string()]));
    }

    let (_, unliked) = patch(&app, &bob, &video["id"], &json!({ "action": "unlike" })).await;
    assert_eq!(unliked["likes"], 0);

    let (status, _) = patch(&app, &bob, &video["id"], &json!({ "action": "share" })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn test_only_the_uploader_edits_and_deletes() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;
    let bob = app.register_user("bob").await;
    let video = publish(&app, &alice, "sunset", "travel", "beaches").await;
    let path = format!("/videos/{}", video["id"].as_str().unwrap());

    let (status, _) = patch(&app, &bob, &video["id"], &json!({ "title": "mine now" })).await;
    assert_eq!(status, 403);

    let (status, edited) = patch(&app, &alice, &video["id"], &json!({ "title": "golden hour" })).await;
    assert_eq!(status, 200);
    assert_eq!(edited["title"], "golden hour");
    assert_eq!(edited["url"], video["url"]);

    let (status, _) = patch(&app, &alice, &video["id"], &json!({ "url": "https://elsewhere.example.com/x.mp4" })).await;
    assert_eq!(status, 400);

    let resp = app.client.delete(app.url(&path)).bearer_auth(&bob.token).send().await.unwrap();
    assert_eq!(resp.status(), 403);
    let resp = app.client.delete(app.url(&path)).bearer_auth(&alice.token).send().await.unwrap();
    assert_eq!(resp.status(), 204);

    let (status, _) = app.get_json(&path, &alice.token).await;
    assert_eq!(status, 404);
    assert_eq!(app.store.video_count(), 0);
}

#[tokio::test]
async fn test_profile_embeds_uploads_and_account_deletion_removes_them() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;
    let bob = app.register_user("bob").await;
    let video = publish(&app, &alice, "sunset", "travel", "beaches").await;
    patch(&app, &alice, &video["id"], &json!({ "action": "like" })).await;
    let other = publish(&app, &bob, "ramen", "food", "noodles").await;
    patch(&app, &alice, &other["id"], &json!({ "action": "like" })).await;

    let (status, profile) = app.get_json(&format!("/users/{}", alice.id), &bob.token).await;
    assert_eq!(status, 200);
    assert_eq!(profile["username"], alice.username);
    let videos = profile["videos"].as_array().unwrap();
    assert_eq!(videos.len(), 1);
    assert_eq!(videos[0]["id"], video["id"]);
    assert_eq!(videos[0]["uploader"], alice.id.to_string());

    let resp = app.client.delete(app.url(&format!("/users/{}", alice.id))).bearer_auth(&alice.token).send().await.unwrap();
    assert_eq!(resp.status(), 204);
    assert_eq!(app.store.video_count(), 1);

    let (_, remaining) = app.get_json(&format!("/videos/{}", other["id"].as_str().unwrap()), &bob.token).await;
    assert_eq!(remaining["likes"], 0);
}

#[tokio::test]
async fn test_categories() {
    let app = TestApp::spawn().await;
    let alice = app.register_user("alice").await;

    let body = json!({ "name": "Travel", "subcategories": ["beaches", " beaches ", "", "cities"] });
    let (status, created) = app.post_json("/categories", &alice.token, &body).await;
    assert_eq!(status, 201);
    assert_eq!(created["subcategories"], json!(["beaches", "cities"]));

    let (status, _) = app.post_json("/categories", &alice.token, &json!({ "name": "Travel" })).await;
    assert_eq!(status, 409);
    let (status, _) = app.post_json("/categories", &alice.token, &json!({ "name": "  " })).await;
    assert_eq!(status, 400);
    app.post_json("/categories", &alice.token, &json!({ "name": "Food" })).await;

    let resp = app.client.post(app.url("/categories")).json(&json!({ "name": "Anon" })).send().await.unwrap();
    assert_eq!(resp.status(), 401);

    let list: Value = app.client.get(app.url("/categories")).send().await.unwrap().json().await.unwrap();
    let names: Vec<&str> = list.as_array().unwrap().iter().map(|c| c["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["Food", "Travel"]);

    let path = format!("/categories/{}", created["id"].as_str().unwrap());
    let fetched: Value = app.client.get(app.url(&path)).send().await.unwrap().json().await.unwrap();
    assert_eq!(fetched, created);

    let resp = app.client.get(app.url(&format!("/categories/{}", uuid::Uuid::new_v4()))).send().await.unwrap();
    assert_eq!(resp.status(), 404);
}

mod common;

use axum::http::StatusCode;
use serde_json::json;
use studio_api::users::repo_types::Role;

use common::TestApp;

#[tokio::test]
async fn booking_conversation_end_to_end() {
    let app = TestApp::new();
    let admin = app.user("Ada Admin", Role::Admin).await;
    let artist = app.user("Ari Artist", Role::Artist).await;
    let admin_token = app.token_for(&admin);
    let artist_token = app.token_for(&artist);

    let (status, body) = app
        .post("/api/clients", &admin_token, json!({"name": "Walk In", "phone": "555-0100"}))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let client_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .post(
            "/api/conversations",
            &admin_token,
            json!({"client_id": client_id, "title": "Sleeve consult"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "new");
    assert!(body["data"]["artist_id"].is_null());
    assert!(body["data"]["last_message_at"].is_null());
    let conversation_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .put(
            &format!("/api/conversations/{conversation_id}/assign"),
            &admin_token,
            json!({"user_id": artist.id}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "active");
    assert_eq!(body["data"]["artist_id"], artist.id.to_string());

    let (status, body) = app
        .post(
            &format!("/api/conversations/{conversation_id}/messages"),
            &artist_token,
            json!({"content": "Thanks for reaching out!"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["user_id"], artist.id.to_string());
    assert!(body["data"]["client_id"].is_null());
    assert_eq!(body["data"]["is_read"], false);
    let message_created_at = body["data"]["created_at"].clone();

    let (_, body) = app
        .get(&format!("/api/conversations/{conversation_id}"), &admin_token)
        .await;
    assert_eq!(body["data"]["last_message_at"], message_created_at);
    assert_eq!(body["data"]["messages"][0]["sender_name"], "Ari Artist");
    assert_eq!(body["data"]["latest_message"]["content"], "Thanks for reaching out!");

    let (status, body) = app
        .get(&format!("/api/conversations/{conversation_id}/messages"), &admin_token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["meta"]["total"], 1);
}

#[tokio::test]
async fn client_opens_conversation_with_first_message() {
    let app = TestApp::new();
    let (user, client) = app.client_user("Cleo Client").await;
    let token = app.token_for(&user);

    let (status, body) = app
        .post(
            "/api/conversations",
            &token,
            json!({"title": "Small wrist piece", "message": "Hi! Are you booking in May?"}),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Conversation created");
    assert_eq!(body["data"]["client_id"], client.id.to_string());
    assert_eq!(body["data"]["status"], "new");
    assert!(body["data"]["last_message_at"].is_string());
    assert_eq!(body["data"]["latest_message"]["client_id"], client.id.to_string());
    assert!(body["data"]["latest_message"]["user_id"].is_null());
    assert_eq!(body["data"]["last_message_at"], body["data"]["latest_message"]["created_at"]);

    let (_, body) = app.get("/api/conversations", &token).await;
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["latest_message"]["content"], "Hi! Are you booking in May?");
}

#[tokio::test]
async fn assigned_artist_moves_status_freely() {
    let app = TestApp::new();
    let artist = app.user("Ari Artist", Role::Artist).await;
    let token = app.token_for(&artist);
    let client = app.contact("Walk In").await;

    let (_, body) = app
        .post("/api/conversations", &token, json!({"client_id": client.id}))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    // Not assigned yet, so the artist cannot move it.
    let (status, _) = app
        .put(&format!("/api/conversations/{id}/status"), &token, json!({"status": "active"}))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .put(&format!("/api/conversations/{id}/assign"), &token, json!({"user_id": artist.id}))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app
        .put(&format!("/api/conversations/{id}/status"), &token, json!({"status": "completed"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");

    let (status, body) = app
        .put(&format!("/api/conversations/{id}/status"), &token, json!({"status": "completed"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Status unchanged");

    let (status, body) = app
        .put(&format!("/api/conversations/{id}/status"), &token, json!({"status": "new"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "new");

    let (status, _) = app
        .put(&format!("/api/conversations/{id}/status"), &token, json!({"status": "Archived"}))
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn admin_sets_any_status_directly() {
    let app = TestApp::new();
    let admin = app.user("Ada Admin", Role::Admin).await;
    let token = app.token_for(&admin);
    let client = app.contact("Walk In").await;

    let (_, body) = app
        .post("/api/conversations", &token, json!({"client_id": client.id}))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/conversations/{id}/status");

    for next in ["completed", "new", "archived", "completed", "active", "new"] {
        let (status, body) = app.put(&uri, &token, json!({"status": next})).await;
        assert_eq!(status, StatusCode::OK, "moving to {next}");
        assert_eq!(body["data"]["status"], next);
    }

    let (status, body) = app.put(&uri, &token, json!({"status": "closed"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["status"][0], "The selected status is invalid.");
}

#[tokio::test]
async fn list_filters_by_exact_status() {
    let app = TestApp::new();
    let admin = app.user("Ada Admin", Role::Admin).await;
    let artist = app.user("Ari Artist", Role::Artist).await;
    let token = app.token_for(&admin);
    let client = app.contact("Walk In").await;

    for _ in 0..2 {
        app.post("/api/conversations", &token, json!({"client_id": client.id}))
            .await;
    }
    let (_, body) = app
        .post("/api/conversations", &token, json!({"client_id": client.id}))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    app.put(&format!("/api/conversations/{id}/assign"), &token, json!({"user_id": artist.id}))
        .await;

    let (_, body) = app.get("/api/conversations?status=new", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);
    let (_, body) = app.get("/api/conversations?status=active", &token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    let (_, body) = app
        .get(&format!("/api/conversations?artist_id={}", artist.id), &token)
        .await;
    assert_eq!(body["data"][0]["id"], id);

    let (status, body) = app.get("/api/conversations?status=NEW", &token).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["status"].is_array());
}

#[tokio::test]
async fn messages_paginate_in_creation_order() {
    let app = TestApp::new();
    let (user, _) = app.client_user("Cleo Client").await;
    let token = app.token_for(&user);

    let (_, body) = app.post("/api/conversations", &token, json!({})).await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    for i in 0..5 {
        let (status, _) = app
            .post(
                &format!("/api/conversations/{id}/messages"),
                &token,
                json!({"content": format!("note {i}")}),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, body) = app.get(&format!("/api/conversations/{id}/messages"), &token).await;
    let data = body["data"].as_array().unwrap();
    assert_eq!(data.len(), 5);
    assert_eq!(data[0]["content"], "note 0");
    assert_eq!(data[4]["content"], "note 4");

    let (_, body) = app
        .get(&format!("/api/conversations/{id}/messages?page=2&per_page=2"), &token)
        .await;
    assert_eq!(body["data"][0]["content"], "note 2");
    assert_eq!(body["meta"]["current_page"], 2);
    assert_eq!(body["meta"]["last_page"], 3);

    let (status, body) = app
        .get(&format!("/api/conversations/{id}/messages?per_page=500"), &token)
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["errors"]["per_page"].is_array());
}

#[tokio::test]
async fn mark_read_is_idempotent_over_http() {
    let app = TestApp::new();
    let (user, _) = app.client_user("Cleo Client").await;
    let admin = app.user("Ada Admin", Role::Admin).await;
    let client_token = app.token_for(&user);
    let admin_token = app.token_for(&admin);

    let (_, body) = app
        .post("/api/conversations", &client_token, json!({"message": "Hello"}))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();
    let message_id = body["data"]["latest_message"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/conversations/{id}/messages/{message_id}/read");

    let (status, first) = app.put(&uri, &admin_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["is_read"], true);

    let (status, second) = app.put(&uri, &admin_token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["data"]["read_at"], second["data"]["read_at"]);

    let other = uuid::Uuid::new_v4();
    let (status, body) = app
        .put(&format!("/api/conversations/{id}/messages/{other}/read"), &admin_token, json!({}))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Resource not found");
}

#[tokio::test]
async fn deleting_a_client_removes_its_conversations() {
    let app = TestApp::new();
    let admin = app.user("Ada Admin", Role::Admin).await;
    let token = app.token_for(&admin);
    let client = app.contact("Walk In").await;

    let (_, body) = app
        .post("/api/conversations", &token, json!({"client_id": client.id, "message": "hi"}))
        .await;
    let id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, body) = app
        .request(
            axum::http::Method::DELETE,
            &format!("/api/clients/{}", client.id),
            Some(&token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].is_null());

    let (status, _) = app.get(&format!("/api/conversations/{id}"), &token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

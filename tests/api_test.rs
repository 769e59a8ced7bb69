use bandhan::auth::session;
use bandhan::config::Config;
use bandhan::db;
use bandhan::ids::UserId;
use bandhan::routes;
use bandhan::state::AppState;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

struct TestApp {
    base: String,
    state: AppState,
    client: reqwest::Client,
    _temp: TempDir,
}

/// Serve the full router on an ephemeral port over a fresh database.
async fn spawn_app() -> TestApp {
    let temp = TempDir::new().unwrap();
    let mut config = Config::default();
    config.resolve_paths(temp.path());

    let pool = db::create_pool(config.db_path()).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    let state = AppState::new(pool, config);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = routes::build_router(state.clone());
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    TestApp {
        base: format!("http://{}", addr),
        state,
        client: reqwest::Client::new(),
        _temp: temp,
    }
}

impl TestApp {
    /// Insert a user and return a bearer token for it.
    fn login(&self, name: &str) -> String {
        let conn = self.state.db.get().unwrap();
        conn.execute(
            "INSERT INTO users (id, full_name) VALUES (?1, ?2)",
            rusqlite::params![name, name],
        )
        .unwrap();
        session::create_session(&self.state.db, &UserId::new(name), 1).unwrap()
    }

    async fn create_profile(&self, token: &str, city: &str) -> String {
        let res = self
            .client
            .post(format!("{}/profiles", self.base))
            .bearer_auth(token)
            .json(&json!({
                "short_bio": "Enjoys long walks and books",
                "age": 29,
                "gender": "female",
                "city": city,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
        let body: Value = res.json().await.unwrap();
        body["id"].as_str().unwrap().to_string()
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> (StatusCode, Value) {
        let res = req.send().await.unwrap();
        let status = res.status();
        let body = res.json().await.unwrap_or(Value::Null);
        (status, body)
    }
}

#[tokio::test]
async fn health_needs_no_session() {
    let app = spawn_app().await;
    let res = app
        .client
        .get(format!("{}/health", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn requests_without_a_valid_session_are_rejected() {
    let app = spawn_app().await;

    let (status, body) = app
        .send(app.client.get(format!("{}/conversations", app.base)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "unauthorized");

    let (status, _) = app
        .send(
            app.client
                .get(format!("{}/conversations", app.base))
                .bearer_auth("not-a-token"),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn user_without_profile_cannot_use_connections() {
    let app = spawn_app().await;
    let token = app.login("u1");

    let (status, body) = app
        .send(
            app.client
                .get(format!("{}/connection-requests", app.base))
                .bearer_auth(&token),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "forbidden");
}

#[tokio::test]
async fn request_accept_then_chat_over_rest() {
    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    let alice_id = app.create_profile(&alice, "Dhaka").await;
    let bob_id = app.create_profile(&bob, "Sylhet").await;

    // Alice asks, Bob sees it
    let (status, request) = app
        .send(
            app.client
                .post(format!("{}/connection-requests", app.base))
                .bearer_auth(&alice)
                .json(&json!({ "receiver": bob_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(request["status"], "pending");
    let request_id = request["id"].as_str().unwrap().to_string();

    let (_, received) = app
        .send(
            app.client
                .get(format!("{}/connection-requests?role=received", app.base))
                .bearer_auth(&bob),
        )
        .await;
    assert_eq!(received.as_array().unwrap().len(), 1);

    // Asking again in the other direction is a duplicate
    let (status, body) = app
        .send(
            app.client
                .post(format!("{}/connection-requests", app.base))
                .bearer_auth(&bob)
                .json(&json!({ "receiver": alice_id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_request");

    // The sender cannot accept their own request
    let (status, _) = app
        .send(
            app.client
                .patch(format!("{}/connection-requests/{}", app.base, request_id))
                .bearer_auth(&alice)
                .json(&json!({ "status": "accepted" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, outcome) = app
        .send(
            app.client
                .patch(format!("{}/connection-requests/{}", app.base, request_id))
                .bearer_auth(&bob)
                .json(&json!({ "status": "accepted" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(outcome["status"], "accepted");
    let conversation_id = outcome["conversation"]["id"].as_str().unwrap().to_string();

    // The request is gone
    let (_, sent) = app
        .send(
            app.client
                .get(format!("{}/connection-requests?role=sent", app.base))
                .bearer_auth(&alice),
        )
        .await;
    assert!(sent.as_array().unwrap().is_empty());

    // Listed with no last message yet
    let (_, listed) = app
        .send(
            app.client
                .get(format!("{}/conversations", app.base))
                .bearer_auth(&alice),
        )
        .await;
    assert_eq!(listed[0]["id"], conversation_id.as_str());
    assert!(listed[0]["last_message"].is_null());

    let (status, message) = app
        .send(
            app.client
                .post(format!("{}/conversations/{}/messages", app.base, conversation_id))
                .bearer_auth(&alice)
                .json(&json!({ "text": "hi" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(message["sender"], alice_id.as_str());

    let (status, detail) = app
        .send(
            app.client
                .get(format!("{}/conversations/{}", app.base, conversation_id))
                .bearer_auth(&bob),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let messages = detail["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hi");

    let (_, listed) = app
        .send(
            app.client
                .get(format!("{}/conversations", app.base))
                .bearer_auth(&bob),
        )
        .await;
    assert_eq!(listed[0]["last_message"]["text"], "hi");
}

#[tokio::test]
async fn starting_twice_returns_the_same_conversation() {
    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    app.create_profile(&alice, "Dhaka").await;
    let bob_id = app.create_profile(&bob, "Khulna").await;

    let url = format!("{}/conversations/start/{}", app.base, bob_id);
    let (first_status, first) = app.send(app.client.post(&url).bearer_auth(&alice)).await;
    let (second_status, second) = app.send(app.client.post(&url).bearer_auth(&alice)).await;

    assert_eq!(first_status, StatusCode::CREATED);
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(first["id"], second["id"]);

    let count: i64 = app
        .state
        .db
        .get()
        .unwrap()
        .query_row("SELECT COUNT(*) FROM conversations", [], |row| row.get(0))
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn outsiders_cannot_read_a_conversation() {
    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    let eve = app.login("eve");
    app.create_profile(&alice, "Dhaka").await;
    let bob_id = app.create_profile(&bob, "Rajshahi").await;
    app.create_profile(&eve, "Barishal").await;

    let (_, conversation) = app
        .send(
            app.client
                .post(format!("{}/conversations/start/{}", app.base, bob_id))
                .bearer_auth(&alice),
        )
        .await;
    let id = conversation["id"].as_str().unwrap();

    let (status, _) = app
        .send(
            app.client
                .get(format!("{}/conversations/{}", app.base, id))
                .bearer_auth(&eve),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(
            app.client
                .get(format!("{}/conversations/missing", app.base))
                .bearer_auth(&eve),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attachments_are_served_back() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    app.create_profile(&alice, "Dhaka").await;
    let bob_id = app.create_profile(&bob, "Comilla").await;

    let (_, conversation) = app
        .send(
            app.client
                .post(format!("{}/conversations/start/{}", app.base, bob_id))
                .bearer_auth(&alice),
        )
        .await;
    let id = conversation["id"].as_str().unwrap();

    let (status, message) = app
        .send(
            app.client
                .post(format!("{}/conversations/{}/messages", app.base, id))
                .bearer_auth(&alice)
                .json(&json!({
                    "text": "",
                    "attachment": { "data": STANDARD.encode(b"fake png"), "format": "png" }
                })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let url = message["attachment_url"].as_str().unwrap();

    let res = app
        .client
        .get(format!("{}{}", app.base, url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["content-type"], "image/png");
    assert_eq!(res.bytes().await.unwrap().as_ref(), b"fake png");

    let res = app
        .client
        .get(format!("{}/media/0123.png", app.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn websocket_upgrade_is_refused_to_outsiders() {
    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    let eve = app.login("eve");
    app.create_profile(&alice, "Dhaka").await;
    let bob_id = app.create_profile(&bob, "Gazipur").await;
    app.create_profile(&eve, "Bogura").await;

    let (_, conversation) = app
        .send(
            app.client
                .post(format!("{}/conversations/start/{}", app.base, bob_id))
                .bearer_auth(&alice),
        )
        .await;
    let id = conversation["id"].as_str().unwrap();

    let upgrade = |path: String, token: &str| {
        app.client
            .get(format!("{}{}?token={}", app.base, path, token))
            .header("connection", "upgrade")
            .header("upgrade", "websocket")
            .header("sec-websocket-version", "13")
            .header("sec-websocket-key", "dGhlIHNhbXBsZSBub25jZQ==")
    };

    let (status, _) = app
        .send(upgrade(format!("/conversations/{}/ws", id), &eve))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .send(upgrade("/conversations/missing/ws".to_string(), &alice))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn attachments_up_to_the_configured_size_are_accepted() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    app.create_profile(&alice, "Dhaka").await;
    let bob_id = app.create_profile(&bob, "Mymensingh").await;

    let (_, conversation) = app
        .send(
            app.client
                .post(format!("{}/conversations/start/{}", app.base, bob_id))
                .bearer_auth(&alice),
        )
        .await;
    let url = format!(
        "{}/conversations/{}/messages",
        app.base,
        conversation["id"].as_str().unwrap()
    );
    let max = app.state.config.chat.max_attachment_bytes;

    let near_limit = vec![7u8; max - 1024];
    let (status, message) = app
        .send(app.client.post(&url).bearer_auth(&alice).json(&json!({
            "text": "big picture",
            "attachment": { "data": STANDARD.encode(&near_limit), "format": "png" }
        })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(message["attachment_url"].is_string());
}

#[tokio::test]
async fn profiles_can_be_browsed_with_images() {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;

    let app = spawn_app().await;
    let alice = app.login("alice");
    let bob = app.login("bob");
    app.create_profile(&alice, "Dhaka").await;

    let (status, created) = app
        .send(
            app.client
                .post(format!("{}/profiles", app.base))
                .bearer_auth(&bob)
                .json(&json!({
                    "short_bio": "Architect and amateur painter",
                    "age": 33,
                    "gender": "male",
                    "city": "Sylhet",
                    "images": [
                        { "data": STANDARD.encode(b"first image"), "format": "jpg" },
                        { "data": STANDARD.encode(b"second image"), "format": "jpg" }
                    ]
                })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(created["display_image"], created["images"][0]["url"]);

    let (status, listed) = app
        .send(app.client.get(format!("{}/profiles", app.base)).bearer_auth(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    let listed = listed.as_array().unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0]["id"], created["id"]);
    assert_eq!(listed[0]["images"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn logout_ends_the_session() {
    let app = spawn_app().await;
    let token = app.login("alice");
    app.create_profile(&token, "Dhaka").await;

    let res = app
        .client
        .post(format!("{}/auth/logout", app.base))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    assert!(res.headers()["set-cookie"]
        .to_str()
        .unwrap()
        .contains("Max-Age=0"));

    let (status, _) = app
        .send(app.client.get(format!("{}/profiles/me", app.base)).bearer_auth(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn query_token_is_ignored_outside_chat_sockets() {
    let app = spawn_app().await;
    let token = app.login("alice");
    app.create_profile(&token, "Dhaka").await;

    let (status, _) = app
        .send(app.client.get(format!("{}/profiles/me?token={}", app.base, token)))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

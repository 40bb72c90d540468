use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;

use taskflow_backend::config::BackendConfig;
use taskflow_backend::server::build_app;
use taskflow_backend::state::AppState;
use taskflow_core::store::memory::MemoryStore;
use taskflow_core::store::DocumentStore;

fn test_app() -> (Router, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let state = AppState::new(store.clone(), &BackendConfig::default());
    (build_app(state), store)
}

async fn body_json(body: Body) -> serde_json::Value {
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_text(body: Body) -> String {
    let bytes = body.collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn json_request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Board owned by alice with bob as member and one card in "To Do".
async fn seeded(store: &MemoryStore) -> String {
    let board_id = store.create_board("Launch", "", "alice").await.unwrap();
    store.add_member(&board_id, "bob").await.unwrap();
    let mut board = store.read_board(&board_id).await.unwrap();
    board
        .columns
        .get_mut("col-todo")
        .unwrap()
        .card_ids
        .push("card-1".into());
    board.cards.insert(
        "card-1".into(),
        taskflow_core::Card::new("card-1".into(), "Write \"docs\"".into(), 0, 0),
    );
    store.insert_board(board).unwrap();
    board_id
}

#[tokio::test]
async fn test_status() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/status")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response.into_body()).await;
    assert_eq!(body["status"], "running");
    assert_eq!(body["sync"]["queue_limit"], 64);
}

#[tokio::test]
async fn test_create_then_list_and_read() {
    let (app, _) = test_app();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/boards",
            serde_json::json!({ "title": "Roadmap", "ownerId": "alice" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let board_id = body_json(response.into_body()).await["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app.clone().oneshot(get("/boards?user=alice")).await.unwrap();
    let body = body_json(response.into_body()).await;
    assert_eq!(body["boards"][0]["id"], board_id.as_str());
    assert_eq!(body["boards"][0]["title"], "Roadmap");

    let response = app
        .clone()
        .oneshot(get(&format!("/boards/{}", board_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let etag = response.headers()["etag"].to_str().unwrap().to_string();
    let doc = body_json(response.into_body()).await;
    assert_eq!(
        doc["columnIds"],
        serde_json::json!(["col-todo", "col-inprogress", "col-done"])
    );

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/boards/{}", board_id))
                .header("if-none-match", etag)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_MODIFIED);
}

#[tokio::test]
async fn test_list_requires_user() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/boards")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_missing_board_is_404() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/boards/board-nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body = body_json(response.into_body()).await;
    assert!(body["error"].as_str().unwrap().contains("board-nope"));
}

#[tokio::test]
async fn test_patch_moves_card() {
    let (app, store) = test_app();
    let board_id = seeded(&store).await;

    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/boards/{}?user=bob", board_id),
            serde_json::json!({
                "columns.col-todo.cardIds": { "set": [] },
                "columns.col-done.cardIds": { "set": ["card-1"] },
                "updatedAt": { "set": 99 }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let board = store.read_board(&board_id).await.unwrap();
    assert_eq!(board.columns["col-done"].card_ids, vec!["card-1"]);
    assert!(board.columns["col-todo"].card_ids.is_empty());
    assert_eq!(board.updated_at, 99);
}

#[tokio::test]
async fn test_patch_is_gated_and_validated() {
    let (app, store) = test_app();
    let board_id = seeded(&store).await;
    let before = store.read_board(&board_id).await.unwrap();

    // Not a member.
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/boards/{}?user=mallory", board_id),
            serde_json::json!({ "title": { "set": "Pwned" } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    // Membership only through the member routes.
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/boards/{}?user=bob", board_id),
            serde_json::json!({ "memberIds": { "set": ["bob"] } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Result would put the card in two columns.
    let response = app
        .oneshot(json_request(
            "PATCH",
            &format!("/boards/{}?user=bob", board_id),
            serde_json::json!({ "columns.col-done.cardIds": { "set": ["card-1"] } }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(store.read_board(&board_id).await.unwrap(), before);
}

#[tokio::test]
async fn test_member_routes_require_owner() {
    let (app, store) = test_app();
    let board_id = seeded(&store).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/boards/{}/members?user=bob", board_id),
            serde_json::json!({ "userId": "carol" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/boards/{}/members?user=alice", board_id),
            serde_json::json!({ "userId": "carol" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store
        .read_board(&board_id)
        .await
        .unwrap()
        .member_ids
        .contains("carol"));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/boards/{}/members/alice?user=alice", board_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/boards/{}/members/carol?user=alice", board_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_delete_requires_owner() {
    let (app, store) = test_app();
    let board_id = seeded(&store).await;

    let delete = |user: &str| {
        Request::builder()
            .method("DELETE")
            .uri(format!("/boards/{}?user={}", board_id, user))
            .body(Body::empty())
            .unwrap()
    };

    let response = app.clone().oneshot(delete("bob")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.oneshot(delete("alice")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(store.read_board(&board_id).await.is_err());
}

#[tokio::test]
async fn test_exports() {
    let (app, store) = test_app();
    let board_id = seeded(&store).await;

    let response = app
        .clone()
        .oneshot(get(&format!("/boards/{}/export.csv", board_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .contains("Launch-export.csv"));
    let csv = body_text(response.into_body()).await;
    assert_eq!(
        csv.lines().nth(1).unwrap(),
        "\"Write \"\"docs\"\"\",\"To Do\",medium,\"\",\"\",1970-01-01"
    );

    let response = app
        .oneshot(get(&format!("/boards/{}/export.html", board_id)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let html = body_text(response.into_body()).await;
    assert!(html.contains("Write &quot;docs&quot;"));
    assert!(html.contains("<h2>To Do (1)</h2>"));
}

#[tokio::test]
async fn test_logs_endpoint() {
    let (app, _) = test_app();
    let response = app.oneshot(get("/logs")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response.into_body()).await;
    assert!(body["entries"].is_array());
    assert!(body["filePath"].as_str().unwrap().ends_with("backend.log"));
}

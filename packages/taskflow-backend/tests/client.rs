use std::sync::Arc;
use std::time::Duration;

use taskflow_backend::client::HttpDocumentStore;
use taskflow_backend::config::BackendConfig;
use taskflow_backend::server::spawn_server;
use taskflow_backend::state::AppState;
use taskflow_core::config::{SyncSettings, UserIdentity};
use taskflow_core::store::memory::MemoryStore;
use taskflow_core::store::{DocumentStore, StoreError};
use taskflow_core::{BoardError, BoardSession, Mutation, SyncState};

/// Serve a fresh backend on an ephemeral port; returns its base URL.
async fn start_backend() -> (String, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let config = BackendConfig {
        port: 0,
        ..Default::default()
    };
    let (port, _server) = spawn_server(AppState::new(store.clone(), &config))
        .await
        .unwrap();
    (format!("http://127.0.0.1:{}", port), store)
}

#[tokio::test]
async fn test_store_contract_over_http() {
    let (url, _) = start_backend().await;
    let alice = HttpDocumentStore::new(&url, "alice");

    let board_id = alice.create_board("Remote", "over http", "alice").await.unwrap();
    let board = alice.read_board(&board_id).await.unwrap();
    assert_eq!(board.title, "Remote");
    assert_eq!(board.column_ids.len(), 3);

    alice.add_member(&board_id, "bob").await.unwrap();
    let listed = alice.list_boards("bob").await.unwrap();
    assert_eq!(listed.len(), 1);

    let bob = HttpDocumentStore::new(&url, "bob");
    assert!(matches!(
        bob.delete_board(&board_id).await,
        Err(StoreError::PermissionDenied(_))
    ));
    assert!(matches!(
        alice.read_board("board-nope").await,
        Err(StoreError::BoardNotFound(_))
    ));

    alice.delete_board(&board_id).await.unwrap();
    assert!(alice.list_boards("alice").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_live_subscription_pushes_and_ends_on_delete() {
    let (url, store) = start_backend().await;
    let board_id = store.create_board("Live", "", "alice").await.unwrap();
    let client = HttpDocumentStore::new(&url, "alice");

    let mut subscription = client.subscribe(&board_id).await.unwrap();
    let first = subscription.next().await.unwrap().unwrap();
    assert_eq!(first.title, "Live");

    store.add_member(&board_id, "bob").await.unwrap();
    let pushed = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap();
    assert!(pushed.member_ids.contains("bob"));

    store.delete_board(&board_id).await.unwrap();
    let ended = tokio::time::timeout(Duration::from_secs(5), subscription.next())
        .await
        .unwrap();
    assert!(ended.is_none());
}

#[tokio::test]
async fn test_board_session_over_http() {
    let (url, store) = start_backend().await;
    let board_id = store.create_board("Sprint", "", "alice").await.unwrap();
    store.add_member(&board_id, "bob").await.unwrap();

    let identity = UserIdentity {
        id: "alice".into(),
        name: "Alice".into(),
        email: None,
    };
    let alice: Arc<dyn DocumentStore> =
        Arc::new(HttpDocumentStore::for_identity(&url, &identity));
    let session = BoardSession::open(alice, &board_id, &identity.id, &SyncSettings::default())
        .await
        .unwrap();

    let card_id = session
        .apply(Mutation::AddCard {
            column_id: "col-todo".into(),
            title: "Ship it".into(),
        })
        .await
        .unwrap()
        .created_id
        .unwrap();
    session
        .apply(Mutation::MoveCard {
            card_id: card_id.clone(),
            from_column_id: "col-todo".into(),
            from_index: 0,
            to_column_id: "col-done".into(),
            to_index: 0,
        })
        .await
        .unwrap();

    let stored = store.read_board(&board_id).await.unwrap();
    assert_eq!(stored.columns["col-done"].card_ids, vec![card_id.clone()]);
    assert_eq!(session.status().state, SyncState::Idle);

    // A removed member can still open the board but not change it.
    store.remove_member(&board_id, "bob").await.unwrap();
    let bob: Arc<dyn DocumentStore> = Arc::new(HttpDocumentStore::new(&url, "bob"));
    let bob_session = BoardSession::open(bob, &board_id, "bob", &SyncSettings::default())
        .await
        .unwrap();
    let err = bob_session
        .apply(Mutation::DeleteCard { card_id })
        .await
        .unwrap_err();
    assert!(matches!(err, BoardError::Permission { .. }));

    session.close().await;
    bob_session.close().await;
}

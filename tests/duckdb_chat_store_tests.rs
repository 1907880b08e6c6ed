use std::sync::Arc;

use chatrelay::{DuckdbChatStore, MessageRepository, Role, UserRepository};
use chatrelay::domain::MessageAttributes;
use tempfile::tempdir;

#[tokio::test]
async fn duckdb_chat_store_persists_across_reopen() {
    let dir = tempdir().expect("tempdir");
    let db_path = dir.path().join("chatrelay.duckdb");

    let (user_id, message_id) = {
        let store = Arc::new(DuckdbChatStore::new(&db_path).expect("duckdb init"));
        let user = store.register("alice").await.expect("register");
        let message_id = store
            .append_message(
                user.id(),
                "what is in this picture?",
                Role::User,
                MessageAttributes::default().with_image(Some("/9j/abc".to_string())),
            )
            .await
            .expect("append user turn");
        store
            .append_message(
                user.id(),
                "A cat.",
                Role::Assistant,
                MessageAttributes::default().with_reasoning_summary(Some("whiskers".to_string())),
            )
            .await
            .expect("append assistant turn");
        (user.id(), message_id)
    };

    let store = DuckdbChatStore::new(&db_path).expect("duckdb reopen");

    let user = store.register("alice").await.expect("register again");
    assert_eq!(user.id(), user_id);

    let messages = store.list_messages(user_id).await.expect("list");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].id(), message_id);
    assert_eq!(messages[0].image(), Some("/9j/abc"));
    assert_eq!(messages[1].content(), "A cat.");
    assert_eq!(messages[1].reasoning_summary(), Some("whiskers"));
}

#[tokio::test]
async fn duckdb_chat_store_clear_is_per_user() {
    let dir = tempdir().expect("tempdir");
    let store = DuckdbChatStore::new(&dir.path().join("chatrelay.duckdb")).expect("duckdb init");

    let alice = store.register("alice").await.expect("alice");
    let bob = store.register("bob").await.expect("bob");
    for user in [&alice, &bob] {
        store
            .append_message(user.id(), "hi", Role::User, MessageAttributes::default())
            .await
            .expect("append");
    }

    store.clear_messages(alice.id()).await.expect("clear");

    assert!(store.list_messages(alice.id()).await.expect("list").is_empty());
    assert_eq!(store.list_messages(bob.id()).await.expect("list").len(), 1);
}

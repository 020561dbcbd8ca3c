//! Postgres store tests.
//!
//! These need a disposable database and are ignored by default:
//! `DATABASE_URL=postgres://... cargo test --test postgres_store -- --ignored`

use studio_api::clients::repo_types::{ClientChanges, NewClient};
use studio_api::conversations::repo_types::{ConversationStatus, NewConversation};
use studio_api::messages::repo_types::{NewMessage, Sender};
use studio_api::store::{PageRequest, PgStore, Store, StoreError};
use studio_api::users::repo_types::{NewUser, Role, UserChanges};
use uuid::Uuid;

/// Connects to `DATABASE_URL` and applies the migrations.
async fn setup_test_db() -> PgStore {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set for postgres tests");
    let store = PgStore::connect(&url, 2).await.unwrap();
    store.migrate().await.unwrap();
    store
}

/// Tests share one database, so every email is unique per call.
fn new_user(role: Role) -> NewUser {
    NewUser {
        name: "Pg Test".into(),
        email: format!("pg-{}@example.com", Uuid::new_v4().simple()),
        password_hash: "hash".into(),
        role,
        phone: Some("555-0100".into()),
        avatar: None,
    }
}

fn new_client(name: &str) -> NewClient {
    NewClient {
        user_id: None,
        name: name.into(),
        email: Some("walk-in@example.com".into()),
        phone: Some("555-0101".into()),
        notes: Some("prefers mornings".into()),
    }
}

fn new_conversation(client_id: Uuid) -> NewConversation {
    NewConversation {
        client_id,
        artist_id: None,
        title: Some("Forearm piece".into()),
        status: ConversationStatus::New,
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn duplicate_email_maps_to_email_conflict() {
    let store = setup_test_db().await;
    let user = store.create_user(new_user(Role::Artist)).await.unwrap();

    let err = store
        .create_user(NewUser { email: user.email.clone(), ..new_user(Role::Admin) })
        .await
        .unwrap_err();
    match err {
        StoreError::Conflict { field, message } => {
            assert_eq!(field, "email");
            assert_eq!(message, "The email has already been taken.");
        }
        other => panic!("expected conflict, got {other:?}"),
    }
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn foreign_key_violations_map_to_fields() {
    let store = setup_test_db().await;

    let err = store
        .create_client(NewClient { user_id: Some(Uuid::new_v4()), ..new_client("Ghost") })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "user_id", .. }));

    let err = store
        .create_conversation(new_conversation(Uuid::new_v4()))
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "client_id", .. }));

    let client = store.create_client(new_client("Walk In")).await.unwrap();
    let err = store
        .append_message(NewMessage {
            conversation_id: Uuid::new_v4(),
            sender: Sender::Client(client.id),
            content: "hi".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound));

    let conversation = store.create_conversation(new_conversation(client.id)).await.unwrap();
    let err = store
        .append_message(NewMessage {
            conversation_id: conversation.id,
            sender: Sender::User(Uuid::new_v4()),
            content: "hi".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "sender", .. }));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn role_filter_binds_as_user_role() {
    let store = setup_test_db().await;
    let artist = store.create_user(new_user(Role::Artist)).await.unwrap();
    let admin = store.create_user(new_user(Role::Admin)).await.unwrap();

    let artists = store.list_users(Some(Role::Artist)).await.unwrap();
    assert!(artists.iter().all(|u| u.role == Role::Artist));
    assert!(artists.iter().any(|u| u.id == artist.id));
    assert!(!artists.iter().any(|u| u.id == admin.id));

    let everyone = store.list_users(None).await.unwrap();
    assert!(everyone.iter().any(|u| u.id == artist.id));
    assert!(everyone.iter().any(|u| u.id == admin.id));
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn first_message_and_append_move_last_message_at() {
    let store = setup_test_db().await;
    let client = store.create_client(new_client("Walk In")).await.unwrap();

    let (conversation, first) = store
        .create_conversation_with_message(
            new_conversation(client.id),
            Sender::Client(client.id),
            "hello".into(),
        )
        .await
        .unwrap();
    assert_eq!(first.conversation_id, conversation.id);
    assert_eq!(conversation.last_message_at, Some(first.created_at));

    let second = store
        .append_message(NewMessage {
            conversation_id: conversation.id,
            sender: Sender::Client(client.id),
            content: "still there?".into(),
        })
        .await
        .unwrap();
    let reloaded = store.find_conversation(conversation.id).await.unwrap().unwrap();
    assert_eq!(reloaded.last_message_at, Some(second.created_at));

    let page = store
        .list_messages(conversation.id, PageRequest::default())
        .await
        .unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, first.id);
    assert_eq!(store.latest_message(conversation.id).await.unwrap().unwrap().id, second.id);

    // A bad sender rolls back the conversation insert too.
    let before = store.list_conversations(&Default::default()).await.unwrap().len();
    let err = store
        .create_conversation_with_message(
            new_conversation(client.id),
            Sender::User(Uuid::new_v4()),
            "hi".into(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Conflict { field: "sender", .. }));
    let after = store.list_conversations(&Default::default()).await.unwrap().len();
    assert_eq!(before, after);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn updates_distinguish_untouched_from_cleared() {
    let store = setup_test_db().await;
    let client = store.create_client(new_client("Walk In")).await.unwrap();

    let updated = store
        .update_client(
            client.id,
            ClientChanges {
                phone: Some(None),
                notes: Some(Some("afternoons now".into())),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.phone, None);
    assert_eq!(updated.notes.as_deref(), Some("afternoons now"));
    assert_eq!(updated.email, client.email);

    let user = store.create_user(new_user(Role::Artist)).await.unwrap();
    let updated = store
        .update_user(user.id, UserChanges { phone: Some(None), ..Default::default() })
        .await
        .unwrap();
    assert_eq!(updated.phone, None);
    assert_eq!(updated.name, user.name);
}

#[tokio::test]
#[ignore = "needs DATABASE_URL"]
async fn deleting_a_client_cascades_through_messages() {
    let store = setup_test_db().await;
    let leaving = store.create_client(new_client("Leaving")).await.unwrap();
    let staying = store.create_client(new_client("Staying")).await.unwrap();

    let (own, own_message) = store
        .create_conversation_with_message(
            new_conversation(leaving.id),
            Sender::Client(leaving.id),
            "bye".into(),
        )
        .await
        .unwrap();
    let (other, _) = store
        .create_conversation_with_message(
            new_conversation(staying.id),
            Sender::Client(staying.id),
            "hi".into(),
        )
        .await
        .unwrap();
    let stray = store
        .append_message(NewMessage {
            conversation_id: other.id,
            sender: Sender::Client(leaving.id),
            content: "cc".into(),
        })
        .await
        .unwrap();

    store.delete_client(leaving.id).await.unwrap();
    assert!(store.find_conversation(own.id).await.unwrap().is_none());
    assert!(store.find_message(own_message.id).await.unwrap().is_none());
    assert!(store.find_message(stray.id).await.unwrap().is_none());
    assert!(store.find_conversation(other.id).await.unwrap().is_some());
    assert!(matches!(
        store.delete_client(leaving.id).await.unwrap_err(),
        StoreError::NotFound
    ));
}

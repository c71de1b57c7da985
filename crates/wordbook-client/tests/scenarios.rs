//! End-to-end behaviour of sessions sharing one in-memory backend.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::sleep;
use wordbook_client::{
    ChannelSink, ClientConfig, DictionarySession, EntryList, MemorySessionStorage, Notification,
    SortOrder, WriteError,
};
use wordbook_store::{AuthDirectory, CollectionStore, MemoryAuth, MemoryStore};

struct Client {
    session: DictionarySession,
    notes: UnboundedReceiver<Notification>,
}

async fn client(store: &Arc<MemoryStore>, directory: &Arc<AuthDirectory>, config: ClientConfig) -> Client {
    let (sink, notes) = ChannelSink::new();
    let session = DictionarySession::start(
        config,
        store.clone(),
        Arc::new(MemoryAuth::with_directory(directory.clone())),
        Arc::new(MemorySessionStorage::new()),
        sink,
    )
    .await
    .unwrap();
    Client { session, notes }
}

async fn wait_for_entries(
    session: &DictionarySession,
    done: impl Fn(&EntryList) -> bool,
) -> EntryList {
    let mut rx = session.snapshots();
    rx.wait_for(|list| done(list)).await.unwrap().clone()
}

fn texts(entries: &EntryList) -> Vec<&str> {
    entries.iter().map(|e| e.text.as_str()).collect()
}

/// Let every ready task run.
async fn settle() {
    sleep(Duration::from_millis(50)).await;
}

#[tokio::test(start_paused = true)]
async fn test_peer_is_notified_author_is_not() {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();
    let mut a = client(&store, &directory, ClientConfig::default()).await;
    let mut b = client(&store, &directory, ClientConfig::default()).await;
    a.session.sign_up("a@mail.com", "secret1", Some("Ana")).await.unwrap();
    b.session.sign_up("b@mail.com", "secret1", Some("Beto")).await.unwrap();

    sleep(Duration::from_millis(1500)).await;
    let id = a.session.create("Efímero", "Que dura poco", None).await.unwrap();

    let note = b.notes.recv().await.unwrap();
    assert_eq!(note.headword, "Efímero");
    assert_eq!(note.entry_id, id);

    let seen = wait_for_entries(&a.session, |l| !l.is_empty()).await;
    assert_eq!(seen[0].created_by_display_name.as_deref(), Some("Ana"));
    settle().await;
    assert!(a.notes.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_initial_load_is_silent() {
    let store = Arc::new(MemoryStore::connected());
    let directory = AuthDirectory::new();
    let mut b = client(&store, &directory, ClientConfig::default()).await;

    for i in 0..5 {
        store
            .set("words", &format!("k{i}"), json!({"text": format!("w{i}"), "createdBy": "peer"}))
            .await
            .unwrap();
    }
    sleep(Duration::from_millis(1500)).await;
    store
        .set("words", "k5", json!({"text": "tardío", "createdBy": "peer"}))
        .await
        .unwrap();

    let note = b.notes.recv().await.unwrap();
    assert_eq!(note.headword, "tardío");
    settle().await;
    assert!(b.notes.try_recv().is_err());
    assert_eq!(b.session.entries().len(), 6);
}

#[tokio::test(start_paused = true)]
async fn test_existing_entries_do_not_notify_late_joiner() {
    let store = Arc::new(MemoryStore::connected());
    for i in 0..3 {
        store
            .set("words", &format!("k{i}"), json!({"text": format!("w{i}"), "createdBy": "peer"}))
            .await
            .unwrap();
    }
    let directory = AuthDirectory::new();
    let mut late = client(&store, &directory, ClientConfig::default()).await;
    wait_for_entries(&late.session, |l| l.len() == 3).await;
    sleep(Duration::from_millis(1500)).await;
    assert!(late.notes.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_favorite_moves_to_front_and_keeps_provenance() {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();
    let a = client(&store, &directory, ClientConfig::default()).await;
    a.session.sign_up("a@mail.com", "secret1", Some("Ana")).await.unwrap();

    a.session.create("abeja", "insecto", None).await.unwrap();
    let zorro = a.session.create("Zorro", "animal", Some("astuto")).await.unwrap();
    let before = wait_for_entries(&a.session, |l| l.len() == 2).await;
    assert_eq!(texts(&before), vec!["abeja", "Zorro"]);
    let original = before.iter().find(|e| e.id == zorro).unwrap().clone();

    assert!(a.session.toggle_favorite(&zorro, false).await.unwrap());
    let after = wait_for_entries(&a.session, |l| l.first().is_some_and(|e| e.is_favorite)).await;
    assert_eq!(texts(&after), vec!["Zorro", "abeja"]);
    let favored = &after[0];
    assert_eq!(favored.created_by, original.created_by);
    assert_eq!(favored.created_at, original.created_at);
    assert_eq!(favored.example.as_deref(), Some("astuto"));
}

#[tokio::test(start_paused = true)]
async fn test_search_settles_after_quiet_period() {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();
    let config = ClientConfig {
        allow_anonymous_writes: true,
        ..Default::default()
    };
    let a = client(&store, &directory, config).await;
    a.session.create("Efímero", "Que dura poco", None).await.unwrap();
    a.session.create("Sol", "Estrella", None).await.unwrap();
    wait_for_entries(&a.session, |l| l.len() == 2).await;

    a.session.search("ef");
    sleep(Duration::from_millis(100)).await;
    a.session.search("efí");
    sleep(Duration::from_millis(200)).await;
    assert_eq!(a.session.search_term(), "");
    assert_eq!(a.session.visible_entries().len(), 2);

    sleep(Duration::from_millis(150)).await;
    assert_eq!(a.session.search_term(), "efí");
    assert_eq!(texts(&a.session.visible_entries()), vec!["Efímero"]);

    a.session.search(" sol");
    sleep(Duration::from_millis(400)).await;
    assert!(a.session.visible_entries().is_empty());

    a.session.search("");
    sleep(Duration::from_millis(400)).await;
    assert_eq!(a.session.visible_entries().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_anonymous_writers_when_allowed() {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();
    let config = ClientConfig {
        allow_anonymous_writes: true,
        ..Default::default()
    };
    let mut a = client(&store, &directory, config.clone()).await;
    let mut b = client(&store, &directory, config).await;
    sleep(Duration::from_millis(1500)).await;

    let id = a.session.create("Sol", "Estrella", None).await.unwrap();
    let note = b.notes.recv().await.unwrap();
    assert_eq!(note.entry_id, id);

    let entries = wait_for_entries(&a.session, |l| l.len() == 1).await;
    let created_by = entries[0].created_by.clone().unwrap();
    assert!(created_by.starts_with("temp-"));
    assert_eq!(created_by, a.session.actor().as_str());
    settle().await;
    assert!(a.notes.try_recv().is_err());
}

#[tokio::test]
async fn test_update_delete_round_trip() {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();
    let a = client(&store, &directory, ClientConfig::default()).await;
    a.session.sign_up("a@mail.com", "secret1", None).await.unwrap();

    let id = a.session.create("  Luna ", "Satélite", Some("brilla")).await.unwrap();
    let raw = store.get("words", id.as_str()).await.unwrap().unwrap();
    assert_eq!(raw["text"], "Luna");
    assert_eq!(raw["textLower"], "luna");

    a.session.update(&id, "Luna", "Satélite natural", None).await.unwrap();
    let raw = store.get("words", id.as_str()).await.unwrap().unwrap();
    assert_eq!(raw["meaning"], "Satélite natural");
    assert!(raw.get("example").is_none());

    a.session.delete(&id).await.unwrap();
    a.session.delete(&id).await.unwrap();
    assert_eq!(store.child_count("words"), 0);
    assert_eq!(
        a.session.update(&id, "Luna", "x", None).await,
        Err(WriteError::NotFound(id.clone()))
    );
    assert!(matches!(
        a.session.create("", "x", None).await,
        Err(WriteError::Validation(_))
    ));
}

#[tokio::test]
async fn test_admin_dashboard_and_feedback() {
    let store = Arc::new(MemoryStore::new());
    let directory = AuthDirectory::new();
    let config = ClientConfig {
        admin_emails: vec!["boss@mail.com".into()],
        ..Default::default()
    };
    let boss = client(&store, &directory, config.clone()).await;
    let user = client(&store, &directory, config).await;

    user.session.submit_feedback("Faltan palabras").await.unwrap();
    user.session.sign_up("ana@mail.com", "secret1", Some("Ana")).await.unwrap();
    user.session.create("Sol", "Estrella", None).await.unwrap();
    assert!(user.session.admin_stats().await.is_err());

    boss.session.sign_up("boss@mail.com", "secret1", None).await.unwrap();
    let stats = boss.session.admin_stats().await.unwrap();
    assert_eq!(stats.total_words, 1);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.unread_feedback, 1);

    let words = boss.session.manage_words("ana", SortOrder::NewestFirst).await.unwrap();
    assert_eq!(words.len(), 1);

    let feedback = boss.session.list_feedback("").await.unwrap();
    assert_eq!(feedback[0].sender(), "Anonymous");
    boss.session.mark_feedback_read(&feedback[0].id, true).await.unwrap();
    assert_eq!(boss.session.unread_feedback().await.unwrap(), 0);
}

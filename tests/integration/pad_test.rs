//! Pads over both storage backends

use assert_matches::assert_matches;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use xfpad::backend::author::AuthorManager;
use xfpad::backend::pad::{PadError, PadManager, ReadOnlyManager};
use xfpad::backend::storage::{MemoryStore, PadQuery, SharedStore, StoreError};

use crate::common::fixtures::temp_sqlite_store;
use crate::{assert_err, assert_ok};

const AUTHOR: &str = "a.0123456789abcdef";

async fn history_survives_reload(store: SharedStore, keyframe_interval: i64) {
    let pads = PadManager::new(store.clone(), "", keyframe_interval);
    let pad = assert_ok!(pads.get_pad("doc", Some("abc"), Some(AUTHOR)).await);
    assert_eq!(assert_ok!(pads.set_text(&pad, "hello world", Some(AUTHOR)).await), 1);
    assert_eq!(assert_ok!(pads.append_text(&pad, "!", None).await), 2);
    assert_eq!(assert_ok!(pads.restore_revision(&pad, 0, None).await), 3);
    assert_ok!(pads.append_chat_message(&pad, "first", Some(AUTHOR), 10).await);
    assert_ok!(pads.append_chat_message(&pad, "second", None, 20).await);

    let fresh = PadManager::new(store, "", keyframe_interval);
    let reloaded = assert_ok!(fresh.get_pad("doc", None, None).await);
    let guard = reloaded.read().await;
    assert_eq!(guard.head, 3);
    assert_eq!(guard.text(), "abc\n");
    assert_eq!(guard.chat_head, 1);
    assert_eq!(assert_ok!(guard.get_internal_revision_atext(1)).text, "hello world\n");
    assert_eq!(assert_ok!(guard.get_internal_revision_atext(2)).text, "hello world!\n");
    assert_eq!(assert_ok!(guard.get_rev_author(1)), Some(AUTHOR));
    assert_eq!(guard.get_all_authors(), vec![AUTHOR.to_string()]);
    assert_ok!(guard.check());
    drop(guard);

    let chat = assert_ok!(fresh.get_chat_messages(&reloaded, 0, 1).await);
    assert_eq!(chat.iter().map(|c| c.text.as_str()).collect::<Vec<_>>(), ["first", "second"]);
    assert_eq!(chat[1].author_id, None);
    assert_eq!(assert_ok!(fresh.get_all_chatters("doc").await), vec![AUTHOR.to_string()]);
    assert_err!(fresh.get_chat_messages(&reloaded, 0, 2).await, PadError::InvalidRange { .. });
}

async fn copy_and_remove(store: SharedStore) {
    let pads = Arc::new(PadManager::new(store.clone(), "", 100));
    let readonly = ReadOnlyManager::new(pads.clone());
    let pad = assert_ok!(pads.get_pad("src", Some("text"), None).await);
    assert_ok!(pads.append_text(&pad, " more", None).await);
    assert_ok!(pads.append_chat_message(&pad, "hello", None, 1).await);
    let ro = assert_ok!(readonly.get_read_only_id("src").await);

    let copy = assert_ok!(pads.copy("src", "dest", false).await);
    assert_eq!(copy.read().await.head, 1);
    assert_err!(pads.copy("src", "dest", false).await, PadError::Conflict(_));
    assert_ok!(pads.copy("src", "dest", true).await);

    let flat = assert_ok!(pads.copy_without_history("src", "flat", false, None).await);
    assert_eq!(flat.read().await.head, 0);
    assert_eq!(flat.read().await.text(), "text more\n");

    let fresh = PadManager::new(store.clone(), "", 100);
    let copied = assert_ok!(fresh.get_pad("dest", None, None).await);
    assert_eq!(copied.read().await.text(), "text more\n");
    assert_eq!(assert_ok!(fresh.get_chat_messages(&copied, 0, 0).await)[0].text, "hello");

    assert_ok!(pads.remove_pad("src").await);
    assert!(!assert_ok!(pads.does_pad_exist("src").await));
    assert_matches!(store.get_revision("src", 0).await, Err(StoreError::RevisionNotFound));
    assert_matches!(store.get_readonly_pad("src").await, Err(StoreError::ReadOnlyIdNotFound));
    let err = readonly.get_pad_id(&ro).await.unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(assert_ok!(pads.list_all_pads().await), vec!["dest".to_string(), "flat".to_string()]);
}

async fn writes_after_remove(store: SharedStore) {
    let pads = PadManager::new(store.clone(), "", 100);
    let stale = assert_ok!(pads.get_pad("doc", Some("abc"), None).await);
    assert_eq!(assert_ok!(pads.append_text(&stale, "d", None).await), 1);
    let record = stale.read().await.to_record();
    let revision = assert_ok!(stale.read().await.get_revision(1)).clone();
    assert_ok!(pads.remove_pad("doc").await);

    assert_err!(pads.append_text(&stale, "e", None).await, PadError::NotFound(_));
    assert_err!(pads.append_chat_message(&stale, "hi", None, 1).await, PadError::NotFound(_));
    assert_err!(pads.add_saved_revision(&stale, 0, AUTHOR, None).await, PadError::NotFound(_));
    assert!(!assert_ok!(pads.does_pad_exist("doc").await));

    // A write that got past the in-memory check still cannot recreate the header.
    assert_matches!(store.save_revision(&revision).await, Err(StoreError::PadNotFound));
    assert_matches!(store.save_pad(&record).await, Err(StoreError::PadNotFound));
    assert!(!assert_ok!(store.does_pad_exist("doc").await));

    let fresh = assert_ok!(pads.get_pad("doc", None, None).await);
    assert_eq!(fresh.read().await.head, 0);
    assert_ok!(fresh.read().await.check());
    let reloaded = assert_ok!(PadManager::new(store, "", 100).get_pad("doc", None, None).await);
    assert_eq!(reloaded.read().await.head, 0);
}

async fn query_and_authors(store: SharedStore) {
    let pads = PadManager::new(store.clone(), "", 100);
    let authors = AuthorManager::new(store);
    let author = assert_ok!(authors.get_author_for_token("t.query").await);
    assert_eq!(assert_ok!(authors.get_author_for_token("t.query").await).id, author.id);

    for id in ["gamma", "alpha", "beta"] {
        assert_ok!(pads.get_pad(id, None, Some(&author.id)).await);
    }
    let page = assert_ok!(
        pads.query_pads(&PadQuery {
            limit: 2,
            ..PadQuery::default()
        })
        .await
    );
    assert_eq!(page.total, 3);
    let names: Vec<_> = page.pads.iter().map(|p| p.padname.as_str()).collect();
    assert_eq!(names, ["alpha", "beta"]);

    let filtered = assert_ok!(
        pads.query_pads(&PadQuery {
            pattern: Some("AM".to_string()),
            ..PadQuery::default()
        })
        .await
    );
    assert_eq!(filtered.total, 1);
    assert_eq!(filtered.pads[0].padname, "gamma");

    assert_eq!(
        assert_ok!(authors.get_pads_of_author(&author.id).await),
        vec!["alpha".to_string(), "beta".to_string(), "gamma".to_string()]
    );
}

#[tokio::test]
async fn test_memory_history_survives_reload() {
    history_survives_reload(Arc::new(MemoryStore::new()), 100).await;
}

#[tokio::test]
async fn test_memory_history_with_dense_keyframes() {
    history_survives_reload(Arc::new(MemoryStore::new()), 2).await;
}

#[tokio::test]
async fn test_sqlite_history_survives_reload() {
    let (_dir, store) = temp_sqlite_store().await;
    history_survives_reload(store, 2).await;
}

#[tokio::test]
async fn test_memory_copy_and_remove() {
    copy_and_remove(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn test_sqlite_copy_and_remove() {
    let (_dir, store) = temp_sqlite_store().await;
    copy_and_remove(store).await;
}

#[tokio::test]
async fn test_memory_writes_after_remove() {
    writes_after_remove(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn test_sqlite_writes_after_remove() {
    let (_dir, store) = temp_sqlite_store().await;
    writes_after_remove(store).await;
}

#[tokio::test]
async fn test_memory_query_and_authors() {
    query_and_authors(Arc::new(MemoryStore::new())).await;
}

#[tokio::test]
async fn test_sqlite_query_and_authors() {
    let (_dir, store) = temp_sqlite_store().await;
    query_and_authors(store).await;
}

#[tokio::test]
async fn test_invalid_pad_ids_rejected() {
    let pads = PadManager::new(Arc::new(MemoryStore::new()), "", 100);
    assert_err!(pads.get_pad("a$b", None, None).await, PadError::InvalidPadId(_));
    assert_err!(pads.get_pad("", None, None).await, PadError::InvalidPadId(_));
    assert_ok!(pads.get_pad("g.0123456789abcdef$notes", None, None).await);
}

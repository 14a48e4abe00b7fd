//! Collaboration engine scenarios over in-process clients

use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;
use xfpad::backend::collab::CollabEngine;
use xfpad::backend::storage::PadStore;
use xfpad::shared::changeset::apply_to_text;

use crate::common::fixtures::{client_ready, collab, reconnect_ready, test_engine, user_changes, TestClient};
use crate::{assert_denied, assert_disconnect, assert_frame, assert_ok};

/// Pad `p` at revision 3 with text `hello\n`.
async fn seed_hello(engine: &CollabEngine) {
    let pads = engine.pads();
    let pad = assert_ok!(pads.get_pad("p", None, None).await);
    assert_eq!(assert_ok!(pads.append_text(&pad, "he", None).await), 1);
    assert_eq!(assert_ok!(pads.append_text(&pad, "ll", None).await), 2);
    assert_eq!(assert_ok!(pads.append_text(&pad, "o", None).await), 3);
    assert_eq!(pad.read().await.text(), "hello\n");
}

async fn pad_text(engine: &CollabEngine, pad_id: &str) -> (i64, String) {
    let pad = assert_ok!(engine.pads().get_pad(pad_id, None, None).await);
    let guard = pad.read().await;
    (guard.head, guard.text().to_string())
}

#[tokio::test]
async fn test_client_vars() {
    let engine = test_engine();
    seed_hello(&engine).await;

    let (_client, vars) = TestClient::join(&engine, "s1", "p", "t.alice").await;
    assert_frame!(vars, "CLIENT_VARS");
    let data = &vars["data"];
    assert_eq!(data["padId"], "p");
    assert_eq!(data["userName"], "s1");
    assert_eq!(data["readOnly"], false);
    assert!(data["readOnlyId"].as_str().unwrap().starts_with("r."));
    assert!(data["userId"].as_str().unwrap().starts_with("a."));
    assert_eq!(data["colorPalette"].as_array().unwrap().len(), 64);
    assert_eq!(data["chatHead"], -1);
    assert_eq!(data["initialChangesets"].as_array().unwrap().len(), 4);

    let collab_vars = &data["collab_client_vars"];
    assert_eq!(collab_vars["initialAttributedText"]["text"], "hello\n");
    assert_eq!(collab_vars["rev"], 3);
    assert_eq!(collab_vars["clientIp"], "127.0.0.1");
}

#[tokio::test]
async fn test_concurrent_commits_converge() {
    let engine = test_engine();
    seed_hello(&engine).await;

    let (mut a, _) = TestClient::join(&engine, "a", "p", "t.alice").await;
    let (mut b, _) = TestClient::join(&engine, "b", "p", "t.bob").await;
    a.expect("USER_NEWINFO").await;

    assert!(a.send(user_changes(3, "Z:6>1=5+1$!")).await);
    assert!(b.send(user_changes(3, "Z:6>1+1$?")).await);

    let accept = a.expect("ACCEPT_COMMIT").await;
    assert_eq!(accept["data"]["newRev"], 4);
    let theirs = a.expect("NEW_CHANGES").await;
    assert_eq!(theirs["data"]["newRev"], 5);
    assert_eq!(theirs["data"]["changeset"], "Z:7>1+1$?");

    let first = b.expect("NEW_CHANGES").await;
    assert_eq!(first["data"]["newRev"], 4);
    assert_eq!(first["data"]["changeset"], "Z:6>1=5+1$!");
    let accept = b.expect("ACCEPT_COMMIT").await;
    assert_eq!(accept["data"]["newRev"], 5);

    assert_eq!(pad_text(&engine, "p").await, (5, "?hello!\n".to_string()));
}

#[tokio::test]
async fn test_retransmitted_commit_is_identity() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let (mut a, _) = TestClient::join(&engine, "a", "p", "t.alice").await;

    assert!(a.send(user_changes(3, "Z:6>1=5+1$!")).await);
    assert_eq!(a.expect("ACCEPT_COMMIT").await["data"]["newRev"], 4);
    // Same change again from the stale base: already applied.
    assert!(a.send(user_changes(3, "Z:6>1=5+1$!")).await);
    assert_eq!(a.expect("ACCEPT_COMMIT").await["data"]["newRev"], 4);
    assert_eq!(pad_text(&engine, "p").await, (4, "hello!\n".to_string()));
}

#[tokio::test]
async fn test_duplicate_author_is_kicked() {
    let engine = test_engine();
    let (mut first, _) = TestClient::join(&engine, "s1", "dup", "t.same").await;
    let (_second, _) = TestClient::join(&engine, "s2", "dup", "t.same").await;

    assert_disconnect!(first.expect("disconnect").await, "userdup");
    first.expect_closed().await;
    assert_eq!(engine.sessions().count_in("dup").await, 1);
}

#[tokio::test]
async fn test_malformed_token_is_denied() {
    let engine = test_engine();
    let mut client = TestClient::connect(&engine, "s1", "127.0.0.1").await;
    assert!(client.send(client_ready("p", "not-a-token", "x")).await);
    assert_denied!(client.next_json().await);
}

#[tokio::test]
async fn test_unknown_and_malformed_frames() {
    let engine = test_engine();
    let (mut client, _) = TestClient::join(&engine, "s1", "p", "t.alice").await;

    assert!(client.send(collab(json!({"type": "CLIENT_MESSAGE"}))).await);
    assert!(client.is_quiet(Duration::from_millis(100)).await);

    assert!(!engine.handle_frame("s1", "not json").await);
    client.expect_closed().await;
}

#[tokio::test]
async fn test_bad_changeset_disconnects() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let (mut client, _) = TestClient::join(&engine, "s1", "p", "t.alice").await;

    assert!(client.send(user_changes(3, "Z:9>1+1$x")).await);
    assert_disconnect!(client.expect("disconnect").await, "badChangeset");
    assert_eq!(pad_text(&engine, "p").await.0, 3);
}

#[tokio::test]
async fn test_foreign_author_attribute_rejected() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let (mut client, _) = TestClient::join(&engine, "s1", "p", "t.alice").await;

    let frame = json!({
        "type": "COLLABROOM",
        "data": {
            "type": "USER_CHANGES",
            "baseRev": 3,
            "changeset": "Z:6>1*0+1$x",
            "apool": {"numToAttrib": {"0": ["author", "a.someoneelse0000"]}, "nextNum": 1}
        }
    });
    assert!(client.send(frame).await);
    assert_disconnect!(client.expect("disconnect").await, "badChangeset");
    assert_eq!(pad_text(&engine, "p").await.0, 3);
}

#[tokio::test]
async fn test_chat_round_trip() {
    let engine = test_engine();
    let (mut a, vars) = TestClient::join(&engine, "a", "p", "t.alice").await;
    let (mut b, _) = TestClient::join(&engine, "b", "p", "t.bob").await;
    let alice = vars["data"]["userId"].clone();

    let chat = collab(json!({"type": "CHAT_MESSAGE", "message": {"text": "hi", "time": 1234}}));
    assert!(a.send(chat).await);

    for client in [&mut a, &mut b] {
        let message = client.expect("CHAT_MESSAGE").await;
        assert_eq!(message["data"]["text"], "hi");
        assert_eq!(message["data"]["time"], 1234);
        assert_eq!(message["data"]["userId"], alice);
        assert_eq!(message["data"]["userName"], "a");
    }

    assert!(b.send(collab(json!({"type": "GET_CHAT_MESSAGES", "start": 0, "end": 5}))).await);
    let history = b.expect("CHAT_MESSAGES").await;
    let messages = history["data"]["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["text"], "hi");

    // Wider than max_chat_request: dropped without a reply.
    assert!(b.send(collab(json!({"type": "GET_CHAT_MESSAGES", "start": 0, "end": 500}))).await);
    assert!(b.is_quiet(Duration::from_millis(100)).await);
}

#[tokio::test]
async fn test_user_info_update_broadcast() {
    let engine = test_engine();
    let (mut a, _) = TestClient::join(&engine, "a", "p", "t.alice").await;
    let (b, vars) = TestClient::join(&engine, "b", "p", "t.bob").await;
    a.expect("USER_NEWINFO").await;

    let update = collab(json!({"type": "USERINFO_UPDATE", "userInfo": {"name": "Bobby", "colorId": "#00ff00"}}));
    assert!(b.send(update).await);
    let info = a.expect("USER_NEWINFO").await;
    assert_eq!(info["data"]["userInfo"]["userId"], vars["data"]["userId"]);
    assert_eq!(info["data"]["userInfo"]["name"], "Bobby");
    assert_eq!(info["data"]["userInfo"]["colorId"], "#00ff00");
}

#[tokio::test]
async fn test_disconnect_announces_leave() {
    let engine = test_engine();
    let (mut a, _) = TestClient::join(&engine, "a", "p", "t.alice").await;
    let (_b, vars) = TestClient::join(&engine, "b", "p", "t.bob").await;

    engine.disconnect("b").await;
    let leave = a.expect("USER_LEAVE").await;
    assert_eq!(leave["data"]["userInfo"]["userId"], vars["data"]["userId"]);
    assert_eq!(engine.sessions().count_in("p").await, 1);
}

#[tokio::test]
async fn test_read_only_session() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let ro = assert_ok!(engine.readonly().get_read_only_id("p").await);

    let (mut viewer, vars) = TestClient::join(&engine, "v", &ro, "t.viewer").await;
    assert_eq!(vars["data"]["readOnly"], true);
    assert_eq!(vars["data"]["padId"], ro.as_str());
    assert_eq!(vars["data"]["collab_client_vars"]["padId"], ro.as_str());
    assert_eq!(vars["data"]["collab_client_vars"]["initialAttributedText"]["text"], "hello\n");

    assert!(viewer.send(user_changes(3, "Z:6>1+1$x")).await);
    assert!(viewer.is_quiet(Duration::from_millis(100)).await);
    assert_eq!(pad_text(&engine, "p").await.0, 3);
}

#[tokio::test]
async fn test_unknown_read_only_id_denied() {
    let engine = test_engine();
    let mut client = TestClient::connect(&engine, "s1", "127.0.0.1").await;
    assert!(client.send(client_ready("r.0123456789abcdef0123456789abcdef", "t.alice", "x")).await);
    assert_denied!(client.next_json().await);
}

#[tokio::test]
async fn test_reconnect_replays_missed_revisions() {
    let engine = test_engine();
    seed_hello(&engine).await;

    let mut client = TestClient::connect(&engine, "r1", "127.0.0.1").await;
    assert!(client.send(reconnect_ready("p", "t.alice", 1)).await);
    let second = client.expect("CLIENT_RECONNECT").await;
    assert_eq!(second["data"]["newRev"], 2);
    assert_eq!(second["data"]["headRev"], 3);
    let third = client.expect("CLIENT_RECONNECT").await;
    assert_eq!(third["data"]["newRev"], 3);
    assert_eq!(third["data"]["changeset"], "Z:5>1=4+1$o");

    let mut current = TestClient::connect(&engine, "r2", "127.0.0.1").await;
    assert!(current.send(reconnect_ready("p", "t.bob", 3)).await);
    let frame = current.expect("CLIENT_RECONNECT").await;
    assert_eq!(frame["data"]["noChanges"], true);
    assert_eq!(frame["data"]["newRev"], 3);
}

#[tokio::test]
async fn test_save_revision() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let (mut client, vars) = TestClient::join(&engine, "s1", "p", "t.alice").await;

    assert!(client.send(collab(json!({"type": "SAVE_REVISION"}))).await);
    let saved = client.expect("NEW_SAVEDREV").await;
    let revisions = saved["data"]["savedRevisions"].as_array().unwrap();
    assert_eq!(revisions.len(), 1);
    assert_eq!(revisions[0]["revNum"], 3);
    assert_eq!(revisions[0]["savedBy"], vars["data"]["userId"]);
}

#[tokio::test]
async fn test_pad_delete_by_creator_only() {
    let engine = test_engine();
    let (mut creator, _) = TestClient::join(&engine, "a", "gone", "t.alice").await;
    let (mut other, _) = TestClient::join(&engine, "b", "gone", "t.bob").await;

    assert!(other.send(collab(json!({"type": "PAD_DELETE", "padId": "gone"}))).await);
    let error = other.expect("SHOW_ERROR").await;
    assert_eq!(error["data"]["messageId"], "pad.delete.cannotdelete");
    assert!(assert_ok!(engine.pads().does_pad_exist("gone").await));

    assert!(creator.send(collab(json!({"type": "PAD_DELETE", "padId": "gone"}))).await);
    assert_disconnect!(creator.expect("disconnect").await, "deleted");
    assert_disconnect!(other.expect("disconnect").await, "deleted");
    assert!(!assert_ok!(engine.pads().does_pad_exist("gone").await));
}

#[tokio::test]
async fn test_pad_delete_after_queued_writes() {
    let engine = test_engine();
    let (mut creator, _) = TestClient::join(&engine, "a", "gone", "t.alice").await;
    let (mut other, _) = TestClient::join(&engine, "b", "gone", "t.bob").await;
    let (head, text) = pad_text(&engine, "gone").await;
    let len = text.chars().count();

    // No replies awaited between the three frames.
    assert!(creator.send(user_changes(head, &format!("Z:{}>1+1$x", len))).await);
    let chat = collab(json!({"type": "CHAT_MESSAGE", "message": {"text": "bye", "time": 1}}));
    assert!(creator.send(chat).await);
    assert!(creator.send(collab(json!({"type": "PAD_DELETE", "padId": "gone"}))).await);

    let accept = creator.expect("ACCEPT_COMMIT").await;
    assert_eq!(accept["data"]["newRev"], head + 1);
    assert_eq!(creator.expect("CHAT_MESSAGE").await["data"]["text"], "bye");
    assert_disconnect!(creator.expect("disconnect").await, "deleted");
    assert_eq!(other.expect("NEW_CHANGES").await["data"]["newRev"], head + 1);
    assert_disconnect!(other.expect("disconnect").await, "deleted");

    let store = engine.pads().store().clone();
    assert!(!assert_ok!(engine.pads().does_pad_exist("gone").await));
    assert!(store.get_revision("gone", head + 1).await.is_err());
    assert!(store.get_chats_of_pad("gone", 0, 0).await.unwrap().is_empty());

    // The id is free again and loads as a brand-new pad.
    let fresh = assert_ok!(engine.pads().get_pad("gone", None, None).await);
    assert_eq!(fresh.read().await.head, 0);
    assert_ok!(fresh.read().await.check());
}

#[tokio::test]
async fn test_forced_copy_kicks_destination_sessions() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let (mut watcher, _) = TestClient::join(&engine, "w", "dest", "t.carol").await;

    let err = engine.copy_pad("p", "dest", false, true).await.unwrap_err();
    assert!(err.to_string().contains("already exists"));
    assert_eq!(pad_text(&engine, "dest").await, (0, "\n".to_string()));

    assert_ok!(engine.copy_pad("p", "dest", true, true).await);
    assert_disconnect!(watcher.expect("disconnect").await, "deleted");
    assert_eq!(pad_text(&engine, "dest").await, (3, "hello\n".to_string()));

    assert_ok!(engine.copy_pad("p", "flat", false, false).await);
    assert_eq!(pad_text(&engine, "flat").await, (0, "hello\n".to_string()));
}

#[tokio::test]
async fn test_changeset_request_over_long_insert() {
    let engine = test_engine();
    let pads = engine.pads();
    let pad = assert_ok!(pads.get_pad("q", Some("abc"), None).await);
    // Inserts more characters than follow the insertion point.
    assert_eq!(assert_ok!(pads.append_revision(&pad, "Z:4>5=2+5$XYZWV", None).await), 1);
    assert_eq!(pad.read().await.text(), "abXYZWVc\n");

    let (mut client, _) = TestClient::join(&engine, "s1", "q", "t.alice").await;
    let request = json!({"type": "CHANGESET_REQ", "data": {"start": 0, "granularity": 1, "requestID": 1}});
    assert!(client.send(request).await);
    let reply = client.expect("CHANGESET_REQ").await;
    let info = &reply["data"]["data"];
    assert_eq!(info["actualEndNum"], 2);
    let backwards = info["backwardsChangesets"].as_array().unwrap();
    assert_eq!(backwards.len(), 2);
    let undo = backwards[1].as_str().unwrap();
    assert_eq!(assert_ok!(apply_to_text(undo, "abXYZWVc\n")), "abc\n");
}

#[tokio::test]
async fn test_changeset_request() {
    let engine = test_engine();
    seed_hello(&engine).await;
    let (mut client, _) = TestClient::join(&engine, "s1", "p", "t.alice").await;

    let request = json!({"type": "CHANGESET_REQ", "data": {"start": 0, "granularity": 1, "requestID": 7}});
    assert!(client.send(request).await);
    let reply = client.expect("CHANGESET_REQ").await;
    assert_eq!(reply["data"]["requestID"], 7);
    let info = &reply["data"]["data"];
    assert_eq!(info["forwardsChangesets"].as_array().unwrap().len(), 4);
    assert_eq!(info["backwardsChangesets"].as_array().unwrap().len(), 4);
    assert_eq!(info["actualEndNum"], 4);
    assert_eq!(info["forwardsChangesets"][1], "Z:1>2+2$he");
}

#[tokio::test]
async fn test_stats() {
    let engine = test_engine();
    let (_a, _) = TestClient::join(&engine, "a", "one", "t.alice").await;
    let (_b, _) = TestClient::join(&engine, "b", "two", "t.bob").await;

    let stats = assert_ok!(engine.stats().await);
    assert_eq!(stats.total_pads, 2);
    assert_eq!(stats.total_users, 2);
    assert_eq!(stats.active_pads, 2);
}

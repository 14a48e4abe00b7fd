//! Property-based tests for pads over the in-memory store

use proptest::prelude::*;
use std::sync::Arc;
use xfpad::backend::pad::{PadManager, ReadOnlyManager};
use xfpad::backend::storage::MemoryStore;

#[derive(Debug, Clone)]
enum Edit {
    Append(String),
    Replace(String),
    Restore(usize),
}

fn edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        "[a-d\n]{1,6}".prop_map(Edit::Append),
        "[a-d\n]{0,8}".prop_map(Edit::Replace),
        (0usize..8).prop_map(Edit::Restore),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn test_revisions_reconstruct_history(edits in prop::collection::vec(edit(), 1..12), keyframe in 1i64..5) {
        tokio_test::block_on(async {
            let store = Arc::new(MemoryStore::new());
            let pads = PadManager::new(store.clone(), "", keyframe);
            let pad = pads.get_pad("prop", Some("seed"), None).await.unwrap();
            let mut texts = vec![pad.read().await.text().to_string()];

            for edit in edits {
                let head = pad.read().await.head;
                match edit {
                    Edit::Append(text) => { pads.append_text(&pad, &text, None).await.unwrap(); }
                    Edit::Replace(text) => { pads.set_text(&pad, &text, None).await.unwrap(); }
                    Edit::Restore(rev) => { pads.restore_revision(&pad, rev as i64 % (head + 1), None).await.unwrap(); }
                }
                let guard = pad.read().await;
                texts.truncate(guard.head as usize);
                texts.push(guard.text().to_string());
            }

            let reloaded = PadManager::new(store, "", keyframe).get_pad("prop", None, None).await.unwrap();
            let guard = reloaded.read().await;
            guard.check().unwrap();
            for (rev, text) in texts.iter().enumerate() {
                let atext = guard.get_internal_revision_atext(rev as i64).unwrap();
                assert_eq!(&atext.text, text, "revision {}", rev);
            }
        });
    }

    #[test]
    fn test_chat_is_contiguous(lines in prop::collection::vec("[a-z ]{0,10}", 0..15)) {
        tokio_test::block_on(async {
            let pads = PadManager::new(Arc::new(MemoryStore::new()), "", 100);
            let pad = pads.get_pad("chat", None, None).await.unwrap();
            for (i, line) in lines.iter().enumerate() {
                let record = pads.append_chat_message(&pad, line, None, i as i64).await.unwrap();
                assert_eq!(record.seq, i as i64);
            }
            let head = pad.read().await.chat_head;
            assert_eq!(head, lines.len() as i64 - 1);
            if head >= 0 {
                let stored = pads.get_chat_messages(&pad, 0, head).await.unwrap();
                for (i, record) in stored.iter().enumerate() {
                    assert_eq!(record.seq, i as i64);
                    assert_eq!(&record.text, &lines[i]);
                }
            }
        });
    }

    #[test]
    fn test_read_only_bijection(ids in prop::collection::btree_set("[a-z]{1,8}", 1..6)) {
        tokio_test::block_on(async {
            let pads = Arc::new(PadManager::new(Arc::new(MemoryStore::new()), "", 100));
            let readonly = ReadOnlyManager::new(pads.clone());
            for id in &ids {
                pads.get_pad(id, None, None).await.unwrap();
                let alias = readonly.get_read_only_id(id).await.unwrap();
                assert_eq!(&readonly.get_pad_id(&alias).await.unwrap(), id);
                assert_eq!(readonly.get_read_only_id(id).await.unwrap(), alias);
            }
        });
    }
}

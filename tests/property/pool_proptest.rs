//! Property-based tests for the attribute pool

use proptest::prelude::*;
use xfpad::shared::apool::{Attribute, AttributePool};

fn attribute() -> impl Strategy<Value = Attribute> {
    ("[a-c]{1,2}", "[x-z]{0,2}").prop_map(|(k, v)| Attribute::new(k, v))
}

proptest! {
    #[test]
    fn test_ids_stay_dense(attribs in prop::collection::vec(attribute(), 0..40)) {
        let mut pool = AttributePool::new();
        for attrib in &attribs {
            let id = pool.put_attrib(attrib.clone());
            prop_assert!(id < pool.next_num());
            prop_assert_eq!(pool.get_attrib(id), Some(attrib));
        }
        let mut seen = Vec::new();
        pool.each_attrib(|id, _| seen.push(id));
        prop_assert_eq!(seen, (0..pool.next_num()).collect::<Vec<_>>());
        prop_assert!(pool.check().is_ok());
    }

    #[test]
    fn test_put_is_idempotent(attrib in attribute(), others in prop::collection::vec(attribute(), 0..10)) {
        let mut pool = AttributePool::new();
        let first = pool.put_attrib(attrib.clone());
        for other in others {
            pool.put_attrib(other);
        }
        prop_assert_eq!(pool.put_attrib(attrib), first);
    }

    #[test]
    fn test_jsonable_round_trip(attribs in prop::collection::vec(attribute(), 0..20)) {
        let mut pool = AttributePool::new();
        for attrib in attribs {
            pool.put_attrib(attrib);
        }
        let json = serde_json::to_string(&pool.to_jsonable()).unwrap();
        let restored = AttributePool::from_jsonable(serde_json::from_str(&json).unwrap());
        prop_assert_eq!(restored.to_jsonable(), pool.to_jsonable());
        prop_assert_eq!(restored.next_num(), pool.next_num());
    }
}

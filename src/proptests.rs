use std::collections::BTreeMap;

use proptest::prelude::*;
use proptest_derive::Arbitrary;

use crate::{Kv, Lits};

/// Reference implementation: a BTreeMap over owned keys.
#[derive(Default)]
struct Model {
    map: BTreeMap<Vec<u8>, u64>,
}

/// Actions executed against both implementations.
#[derive(Arbitrary, Debug, Clone)]
enum Action {
    Insert(KeyValue),
    Upsert(KeyValue),
    Lookup(Key),
    Remove(Key),
    ScanFrom(Key),
}

/// Wrapper for key generation with a collision-friendly strategy.
#[derive(Debug, Clone)]
struct Key(Vec<u8>);

#[derive(Debug, Clone)]
struct KeyValue {
    key: Key,
    value: u64,
}

impl Arbitrary for Key {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        prop_oneof![
            // Keys from the bulk-loaded region, hitting existing entries.
            (0usize..BULK_KEYS).prop_map(|i| Key(bulk_key(i).into_bytes())),
            // Short keys over a tiny alphabet, forcing shared prefixes
            // and hash-tag collisions in compact nodes.
            prop::collection::vec(prop::sample::select(&b"abcde"[..]), 1..6).prop_map(Key),
            // Keys stacked under one long prefix, exercising single ->
            // compact -> rebuilt-subtree promotion in a single slot.
            "[a-c]{1,3}".prop_map(|s| {
                let mut key = b"shared/prefix/".to_vec();
                key.extend_from_slice(s.as_bytes());
                Key(key)
            }),
        ]
        .boxed()
    }
}

impl Arbitrary for KeyValue {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        // Values start at 1: zero is the upsert "did not exist" sentinel.
        (any::<Key>(), 1u64..u64::MAX)
            .prop_map(|(key, value)| KeyValue { key, value })
            .boxed()
    }
}

const BULK_KEYS: usize = 1000;

fn bulk_key(i: usize) -> String {
    format!("bulk{i:05}")
}

/// Harness executing actions on the index and the model in lockstep.
struct Test {
    index: Lits,
    model: Model,
}

impl Test {
    fn new() -> Test {
        let keys: Vec<String> = (0..BULK_KEYS).map(bulk_key).collect();
        let refs: Vec<&[u8]> = keys.iter().map(|k| k.as_bytes()).collect();
        let values: Vec<u64> = (1..=BULK_KEYS as u64).collect();

        let mut index = Lits::new();
        index.bulkload(&refs, &values).unwrap();

        let map = refs
            .iter()
            .zip(values.iter())
            .map(|(k, &v)| (k.to_vec(), v))
            .collect();

        Test {
            index,
            model: Model { map },
        }
    }

    fn execute(&mut self, action: Action) {
        match action {
            Action::Insert(kv) => {
                let key = kv.key.0;
                let fresh = self.index.insert(&key, kv.value);
                assert_eq!(
                    fresh,
                    !self.model.map.contains_key(&key),
                    "insert mismatch for {key:?}"
                );
                self.model.map.entry(key).or_insert(kv.value);
            }
            Action::Upsert(kv) => {
                let key = kv.key.0;
                let old = self.index.upsert(&key, kv.value);
                let expected = self.model.map.insert(key.clone(), kv.value).unwrap_or(0);
                assert_eq!(old, expected, "upsert mismatch for {key:?}");
            }
            Action::Lookup(key) => {
                assert_eq!(
                    self.index.lookup(&key.0).map(Kv::read),
                    self.model.map.get(&key.0).copied(),
                    "lookup mismatch for {:?}",
                    key.0
                );
            }
            Action::Remove(key) => {
                assert_eq!(
                    self.index.remove(&key.0),
                    self.model.map.remove(&key.0).is_some(),
                    "remove mismatch for {:?}",
                    key.0
                );
            }
            Action::ScanFrom(key) => {
                let mut it = self.index.find(&key.0);
                if !self.model.map.contains_key(&key.0) {
                    assert!(!it.valid(), "find on absent {:?} must be invalid", key.0);
                    return;
                }
                // Exact-start scan: a few steps must mirror the model's
                // range from the same key.
                let mut expected = self.model.map.range(key.0.clone()..);
                for _ in 0..4 {
                    if !it.not_finish() {
                        assert!(expected.next().is_none());
                        break;
                    }
                    let kv = it.get_kv().expect("cursor on a record");
                    let (ek, ev) = expected.next().expect("model exhausted early");
                    assert_eq!(kv.key(), &ek[..]);
                    assert_eq!(kv.read(), *ev);
                    it.next();
                }
            }
        }
        assert_eq!(self.index.len(), self.model.map.len());
    }

    fn check_enumeration(&self) {
        let mut it = self.index.begin();
        for (key, value) in &self.model.map {
            let kv = it.get_kv().expect("index ended before model");
            assert_eq!(kv.key(), &key[..]);
            assert_eq!(kv.read(), *value);
            it.next();
        }
        assert!(!it.not_finish(), "index has keys past the model");
    }
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        failure_persistence: None,
        ..ProptestConfig::default()
    })]

    #[test]
    fn proptest_vs_btreemap(actions in prop::collection::vec(any::<Action>(), 1..128)) {
        let mut test = Test::new();
        for action in actions {
            test.execute(action);
        }
        test.check_enumeration();
    }
}

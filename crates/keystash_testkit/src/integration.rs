//! Cross-crate integration test helpers.
//!
//! [`ListHarness`] applies [`ListOp`]s to a real list container and to the
//! `Vec` model side by side, checking results, stored state and published
//! updates after every step.

use crate::generators::{apply_to_model, ListOp};
use keystash_core::{Converter, ListContainer, StoreError, Subscription};

/// A list container paired with its model.
pub struct ListHarness<C: Converter> {
    list: ListContainer<u8, C>,
    updates: Subscription<Vec<u8>>,
    model: Vec<u8>,
    exists: bool,
}

impl<C: Converter> ListHarness<C> {
    /// Starts a harness on `list`, which must not have been written yet.
    ///
    /// # Panics
    ///
    /// Panics if the list is not empty or cannot be observed.
    pub fn new(list: ListContainer<u8, C>) -> Self {
        let updates = list.observe().expect("Failed to observe list");
        assert_eq!(updates.drain(), vec![Vec::<u8>::new()], "list must start empty");
        Self {
            list,
            updates,
            model: Vec::new(),
            exists: false,
        }
    }

    /// Applies `op` to both sides and checks they agree.
    ///
    /// # Panics
    ///
    /// Panics on any disagreement between container and model.
    pub fn apply(&mut self, op: &ListOp) {
        let expected = apply_to_model(&mut self.model, &mut self.exists, op);
        let result = match op {
            ListOp::Put(list) => self.list.put(list.clone()),
            ListOp::Append(value) => self.list.append(*value),
            ListOp::Replace { value, target } => self.list.replace(*value, |v| v == target),
            ListOp::AddOrReplace { value, target } => {
                self.list.add_or_replace(*value, |v| v == target)
            }
            ListOp::Remove(target) => self.list.remove(|v| v == target),
            ListOp::RemoveAll(target) => self.list.remove_all(|v| v == target),
            ListOp::RemoveAt(index) => self.list.remove_at(*index),
            ListOp::Clear => self.list.clear().map(|()| Vec::new()),
        };

        match result {
            Ok(list) => {
                assert!(!expected.out_of_bounds, "{op:?} should have failed");
                assert_eq!(list, expected.list, "result of {op:?}");
            }
            Err(StoreError::IndexOutOfBounds { .. }) => {
                assert!(expected.out_of_bounds, "{op:?} failed unexpectedly");
            }
            Err(err) => panic!("{op:?} failed: {err}"),
        }

        let published = self.updates.drain();
        if expected.publishes {
            assert_eq!(published, vec![expected.list.clone()], "update for {op:?}");
        } else {
            assert!(published.is_empty(), "{op:?} published {published:?}");
        }

        assert_eq!(self.list.get().expect("Failed to read list"), self.model);
    }

    /// Returns the model's current list.
    pub fn model(&self) -> &[u8] {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::scenarios::Item;
    use crate::fixtures::TestStore;
    use crate::generators::{list_op_sequence_strategy, list_strategy, PropTestConfig};
    use keystash_core::{
        Config, InMemoryBackend, JsonConverter, KeyValueStore, StorageError, ValueUpdate,
    };
    use proptest::prelude::*;
    use std::sync::{mpsc, Arc};
    use std::time::Duration;

    proptest! {
        #![proptest_config(PropTestConfig::quick().to_proptest_config())]

        #[test]
        fn list_matches_model(ops in list_op_sequence_strategy(1, 40)) {
            let test_store = TestStore::memory();
            let mut harness = ListHarness::new(test_store.list::<u8>("model").unwrap());
            for op in &ops {
                harness.apply(op);
            }
        }

        #[test]
        fn file_list_matches_model_across_restart(ops in list_op_sequence_strategy(1, 20)) {
            let test_store = TestStore::file();
            let mut harness = ListHarness::new(test_store.list::<u8>("model").unwrap());
            for op in &ops {
                harness.apply(op);
            }
            let expected = harness.model().to_vec();
            drop(harness);

            let reopened = test_store.reopen();
            prop_assert_eq!(reopened.list::<u8>("model").unwrap().get().unwrap(), expected);
        }

        #[test]
        fn put_then_get_roundtrips(list in list_strategy(32)) {
            let test_store = TestStore::memory();
            let as_list = test_store.list::<u8>("l").unwrap();
            as_list.put(list.clone()).unwrap();
            prop_assert_eq!(as_list.get().unwrap(), list.clone());

            let as_value = test_store.value::<Vec<u8>>("v").unwrap();
            as_value.put(list.clone()).unwrap();
            prop_assert_eq!(as_value.get().unwrap(), Some(list));
        }
    }

    #[test]
    fn unwritten_keys_read_empty() {
        let test_store = TestStore::memory();
        assert_eq!(test_store.value::<Item>("nothing").unwrap().get().unwrap(), None);
        assert!(test_store.list::<Item>("nothing").unwrap().get().unwrap().is_empty());
    }

    #[test]
    fn clear_is_idempotent() {
        let test_store = TestStore::file();
        let value = test_store.value::<u8>("v").unwrap();
        let updates = value.observe().unwrap();

        value.clear().unwrap();
        value.put(1).unwrap();
        value.clear().unwrap();
        value.clear().unwrap();

        assert_eq!(value.get().unwrap(), None);
        assert_eq!(
            updates.drain(),
            vec![
                ValueUpdate::Cleared,
                ValueUpdate::Cleared,
                ValueUpdate::Present(1),
                ValueUpdate::Cleared,
                ValueUpdate::Cleared,
            ]
        );
    }

    #[test]
    fn append_order_is_kept() {
        let test_store = TestStore::file();
        let list = test_store.list::<Item>("items").unwrap();
        let items: Vec<Item> = (0..10).map(|i| Item::new(i, format!("#{i}"))).collect();
        for item in &items {
            list.append(item.clone()).unwrap();
        }
        assert_eq!(list.get().unwrap(), items);
    }

    #[test]
    fn first_match_semantics() {
        let test_store = TestStore::memory();
        let list = test_store.list::<String>("abc").unwrap();
        let abc = || vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let a_or_c = |s: &String| s == "a" || s == "c";

        list.put(abc()).unwrap();
        assert_eq!(list.remove(a_or_c).unwrap(), vec!["b", "c"]);

        list.put(abc()).unwrap();
        assert_eq!(list.remove_all(a_or_c).unwrap(), vec!["b"]);

        list.put(abc()).unwrap();
        assert_eq!(list.replace("z".into(), a_or_c).unwrap(), vec!["z", "b", "c"]);
    }

    #[test]
    fn upsert_semantics() {
        let test_store = TestStore::memory();
        let list = test_store.list::<Item>("items").unwrap();
        list.put(vec![Item::new(1, "a"), Item::new(2, "b"), Item::new(3, "c")])
            .unwrap();

        let replaced = list.add_or_replace(Item::new(2, "B"), |i| i.id == 2).unwrap();
        assert_eq!(
            replaced,
            vec![Item::new(1, "a"), Item::new(2, "B"), Item::new(3, "c")]
        );

        let appended = list.add_or_replace(Item::new(4, "d"), |i| i.id == 4).unwrap();
        assert_eq!(appended.last(), Some(&Item::new(4, "d")));
        assert_eq!(appended.len(), 4);
    }

    #[test]
    fn last_committed_write_survives_restart() {
        let test_store = TestStore::file();
        let value = test_store.value::<Item>("doc").unwrap();
        value.put(Item::new(1, "first")).unwrap();
        value.put(Item::new(2, "second")).unwrap();

        // An interrupted replacement leaves only its temporary behind
        let path = test_store.path().unwrap().to_path_buf();
        std::fs::write(path.join("doc.json.tmp"), br#"{"id":3,"la"#).unwrap();
        drop(value);

        let reopened = test_store.reopen();
        assert_eq!(
            reopened.value::<Item>("doc").unwrap().get().unwrap(),
            Some(Item::new(2, "second"))
        );
        assert!(!path.join("doc.json.tmp").exists());
    }

    #[test]
    fn observe_replays_current_state() {
        let test_store = TestStore::memory();
        let list = test_store.list::<u8>("l").unwrap();
        list.put(vec![1, 2]).unwrap();

        let updates = list.observe().unwrap();
        assert_eq!(updates.recv_timeout(Duration::from_millis(100)), Some(vec![1, 2]));
        assert_eq!(updates.try_recv(), None);

        let value = test_store.value::<u8>("v").unwrap();
        let value_updates = value.observe().unwrap();
        assert_eq!(value_updates.try_recv(), Some(ValueUpdate::Cleared));
    }

    #[test]
    fn subscribers_on_other_handles_see_updates() {
        let test_store = TestStore::memory();
        let updates = test_store.list::<u8>("shared").unwrap().observe().unwrap();

        test_store.list::<u8>("shared").unwrap().append(9).unwrap();
        assert_eq!(updates.drain(), vec![vec![], vec![9]]);
    }

    #[test]
    fn lock_timeout_is_reported() {
        let store = KeyValueStore::with_backend(
            Arc::new(InMemoryBackend::new()),
            JsonConverter::new(),
            Config::default().lock_timeout(Some(Duration::from_millis(20))),
        )
        .unwrap();
        let list = store.list::<u8>("busy").unwrap();
        list.put(vec![1]).unwrap();

        // Park a detached replace inside its predicate, holding the write lock
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let holder = list.detached(move |l| {
            l.replace(0, |_| {
                let _ = entered_tx.send(());
                let _ = release_rx.recv();
                false
            })
        });
        entered_rx.recv().unwrap();

        assert!(matches!(
            list.get(),
            Err(StoreError::Storage(StorageError::LockTimeout { .. }))
        ));

        release_tx.send(()).unwrap();
        assert_eq!(holder.wait().unwrap(), vec![1]);
        assert_eq!(list.get().unwrap(), vec![1]);
    }
}

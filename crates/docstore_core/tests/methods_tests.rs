//! Integration tests for the access strategies and their guards.

use docstore_core::{
    ColumnFamilies, ColumnFamily, ErrorCode, IndexingDisabler, Key, KeyBounds,
    OperationType, SavePoint, StatusHint, TransactionManager, TransactionOptions,
    TransactionState,
};
use docstore_kv::{ColumnFamilyHandle, Database, ReadOptions};
use proptest::prelude::*;
use std::collections::BTreeMap;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    db: Database,
    families: ColumnFamilies,
    manager: TransactionManager,
}

impl Fixture {
    fn new() -> Self {
        init_tracing();
        let db = Database::new();
        let families = ColumnFamilies::open(&db).unwrap();
        let manager = TransactionManager::new(db.clone());
        Self {
            db,
            families,
            manager,
        }
    }

    fn documents(&self) -> &ColumnFamilyHandle {
        self.families.handle(ColumnFamily::Documents)
    }

    fn begin(&self, options: TransactionOptions) -> TransactionState {
        self.manager.begin(options).unwrap()
    }

    fn committed(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.db
            .get(&ReadOptions::new(), self.documents(), key)
            .unwrap()
    }
}

/// Runs one guarded document write the way a collection would.
fn guarded_put(
    txn: &TransactionState,
    cf: &ColumnFamilyHandle,
    key: &str,
    value: &[u8],
    operation: OperationType,
    succeed: bool,
) {
    let save_point = SavePoint::new(txn, operation).unwrap();
    txn.methods()
        .put(cf, &Key::from(key), value, StatusHint::Document)
        .unwrap();
    let committed = txn.add_operation(operation, value.len() as u64).unwrap();
    if succeed {
        save_point.finish(committed).unwrap();
    }
}

#[test]
fn save_point_scenario() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let txn = fixture.begin(TransactionOptions::new());
    let key = Key::from("a");

    txn.methods()
        .put(cf, &key, b"1", StatusHint::Document)
        .unwrap();

    guarded_put(&txn, cf, "a", b"2", OperationType::Update, false);
    assert_eq!(txn.methods().get_value(cf, &key).unwrap(), b"1");
    assert_eq!(txn.num_updates(), 0);

    guarded_put(&txn, cf, "a", b"3", OperationType::Update, true);
    assert_eq!(txn.methods().get_value(cf, &key).unwrap(), b"3");
    assert_eq!(txn.num_updates(), 1);

    txn.commit().unwrap();
    assert_eq!(fixture.committed(b"a").as_deref(), Some(&b"3"[..]));
}

#[test]
fn nested_save_points_unwind_in_order() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let txn = fixture.begin(TransactionOptions::new());

    let outer = SavePoint::new(&txn, OperationType::Insert).unwrap();
    txn.methods()
        .put(cf, &Key::from("outer"), b"o", StatusHint::Document)
        .unwrap();
    {
        let _inner = SavePoint::new(&txn, OperationType::Insert).unwrap();
        txn.methods()
            .put(cf, &Key::from("inner"), b"i", StatusHint::Document)
            .unwrap();
    }
    assert!(!txn.methods().exists(cf, &Key::from("inner")));
    assert!(txn.methods().exists(cf, &Key::from("outer")));

    outer.finish(false).unwrap();
    txn.commit().unwrap();
    assert!(fixture.committed(b"outer").is_some());
    assert!(fixture.committed(b"inner").is_none());
}

#[test]
fn intermediate_commit_inside_save_point() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let txn = fixture.begin(TransactionOptions::new().intermediate_commit_count(1));

    guarded_put(&txn, cf, "k", b"v", OperationType::Insert, true);
    assert_eq!(txn.num_intermediate_commits(), 1);
    assert!(fixture.committed(b"k").is_some());
    assert!(txn.is_active());

    txn.commit().unwrap();
}

#[test]
fn read_only_never_mutates() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let before = fixture.db.latest_sequence_number();
    let txn = fixture.begin(TransactionOptions::new().read_only(true));

    let put = txn
        .methods()
        .put(cf, &Key::from("k"), b"v", StatusHint::Document)
        .unwrap_err();
    let delete = txn.methods().delete(cf, &Key::from("k")).unwrap_err();
    assert_eq!(put.code(), ErrorCode::NotSupported);
    assert_eq!(delete.code(), ErrorCode::NotSupported);

    txn.commit().unwrap();
    assert_eq!(fixture.db.latest_sequence_number(), before);
    assert!(fixture.committed(b"k").is_none());
}

#[test]
fn nested_indexing_disablers_toggle_once() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let txn = fixture.begin(TransactionOptions::new());
    let methods = txn.methods();

    let outer = IndexingDisabler::new(methods, true);
    assert!(outer.is_active());
    {
        let inner = IndexingDisabler::new(methods, true);
        assert!(!inner.is_active());
        methods
            .put(cf, &Key::from("bulk"), b"v", StatusHint::Document)
            .unwrap();
    }
    // Still disabled: the write stays out of the read index.
    assert!(!methods.exists(cf, &Key::from("bulk")));
    drop(outer);

    methods
        .put(cf, &Key::from("after"), b"v", StatusHint::Document)
        .unwrap();
    assert!(methods.exists(cf, &Key::from("after")));

    txn.commit().unwrap();
    assert!(fixture.committed(b"bulk").is_some());
}

#[test]
fn second_disable_reports_false_and_enable_is_safe() {
    let fixture = Fixture::new();
    let txn = fixture.begin(TransactionOptions::new());
    let methods = txn.methods();

    assert!(methods.disable_indexing());
    assert!(!methods.disable_indexing());
    methods.enable_indexing();
    methods.enable_indexing();
    assert!(methods.disable_indexing());
}

#[test]
fn batched_save_points_never_alter_batch() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let txn = fixture.begin(TransactionOptions::new().batched(true));

    guarded_put(&txn, cf, "dropped-guard", b"v", OperationType::Insert, false);
    txn.methods().set_save_point().unwrap();
    txn.methods().rollback_to_save_point().unwrap();

    txn.commit().unwrap();
    assert!(fixture.committed(b"dropped-guard").is_some());
}

#[test]
fn conflicting_writers() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let first = fixture.begin(TransactionOptions::new());
    let second = fixture.begin(TransactionOptions::new());

    first
        .methods()
        .put(cf, &Key::from("k"), b"first", StatusHint::Document)
        .unwrap();
    second
        .methods()
        .put(cf, &Key::from("k"), b"second", StatusHint::Document)
        .unwrap();

    first.commit().unwrap();
    let err = second.commit().unwrap_err();
    assert_eq!(err.code(), ErrorCode::Conflict);
    second.abort().unwrap();
    assert_eq!(fixture.committed(b"k").as_deref(), Some(&b"first"[..]));
}

#[test]
fn count_in_bounds_per_column_family() {
    let fixture = Fixture::new();
    let documents = fixture.documents();
    let primary = fixture.families.handle(ColumnFamily::PrimaryIndex);
    let txn = fixture.begin(TransactionOptions::new());

    for i in 0..5 {
        let key = Key::from(format!("c1/{i}").as_str());
        txn.methods()
            .put(documents, &key, b"doc", StatusHint::Document)
            .unwrap();
    }
    txn.methods()
        .put(primary, &Key::from("c1/0"), b"id", StatusHint::Index)
        .unwrap();

    let bounds = KeyBounds::prefix(b"c1/");
    let methods = txn.methods();
    assert_eq!(methods.count_in_bounds(documents, &bounds, false).unwrap(), 5);
    assert_eq!(methods.count_in_bounds(primary, &bounds, false).unwrap(), 1);
    assert_eq!(methods.count_in_bounds(documents, &bounds, true).unwrap(), 1);
}

#[test]
fn snapshot_isolation_for_readers() {
    let fixture = Fixture::new();
    let cf = fixture.documents();
    let reader = fixture.begin(TransactionOptions::new().read_only(true));

    let writer = fixture.begin(TransactionOptions::new());
    writer
        .methods()
        .put(cf, &Key::from("k"), b"v", StatusHint::Document)
        .unwrap();
    writer.commit().unwrap();

    assert!(!reader.methods().exists(cf, &Key::from("k")));
    let fresh = fixture.begin(TransactionOptions::new().read_only(true));
    assert!(fresh.methods().exists(cf, &Key::from("k")));
}

fn read_your_writes_options() -> impl Strategy<Value = TransactionOptions> {
    prop_oneof![
        Just(TransactionOptions::new()),
        Just(TransactionOptions::new().untracked(true)),
        Just(TransactionOptions::new().batched_indexed(true)),
    ]
}

fn all_options() -> impl Strategy<Value = TransactionOptions> {
    prop_oneof![
        read_your_writes_options(),
        Just(TransactionOptions::new().batched(true)),
        Just(TransactionOptions::new().read_only(true)),
    ]
}

fn key_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 1..16)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn unwritten_keys_are_not_found(
        options in all_options(),
        written in prop::collection::btree_set(key_strategy(), 0..16),
        missing in key_strategy(),
    ) {
        prop_assume!(!written.contains(&missing));
        let fixture = Fixture::new();
        let cf = fixture.documents();

        // Read-only transactions see keys committed before they start.
        let writer = if options.read_only {
            fixture.begin(TransactionOptions::new())
        } else {
            fixture.begin(options.clone())
        };
        for key in &written {
            writer
                .methods()
                .put(cf, &Key::new(key.clone()), b"v", StatusHint::Document)
                .unwrap();
        }
        let txn = if options.read_only {
            writer.commit().unwrap();
            fixture.begin(options)
        } else {
            writer
        };

        let mut buffer = b"sentinel".to_vec();
        let err = txn.methods().get(cf, &missing, &mut buffer).unwrap_err();
        prop_assert_eq!(err.code(), ErrorCode::NotFound);
        prop_assert_eq!(buffer, b"sentinel".to_vec());
    }

    #[test]
    fn writes_are_readable_before_commit(
        options in read_your_writes_options(),
        entries in prop::collection::vec(
            (key_strategy(), prop::collection::vec(any::<u8>(), 0..64)),
            1..32,
        ),
    ) {
        let fixture = Fixture::new();
        let cf = fixture.documents();
        let txn = fixture.begin(options);

        let mut expected = BTreeMap::new();
        for (key, value) in entries {
            txn.methods()
                .put(cf, &Key::new(key.clone()), &value, StatusHint::Document)
                .unwrap();
            expected.insert(key, value);
        }

        for (key, value) in &expected {
            let found = txn.methods().get_value(cf, &Key::new(key.clone())).unwrap();
            prop_assert_eq!(&found, value);
        }

        let listed = txn
            .methods()
            .new_iterator(&txn.methods().iterator_read_options(), cf)
            .unwrap()
            .collect_entries()
            .unwrap();
        let expected: Vec<_> = expected.into_iter().collect();
        prop_assert_eq!(listed, expected);
    }
}

//! End-to-end reconciliation through the operator and a shared catalog.
//!
//! Covers table bootstrap, policy-gated evolution, blacklisting, FIFO
//! emission, and two instances racing on the same table.

mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;

use arrow_array::cast::AsArray;
use arrow_array::types::Int64Type;
use arrow_array::Array;
use serde_json::json;
use tidewater_catalog::TableCatalog;
use tidewater_sink::{SchemaUpdatePolicy, SinkError, TableState};

use common::{
    canal_change, canal_insert, canal_options, field_names, operator, table, CountingCatalog,
};

#[test]
fn unknown_table_is_created_from_first_record() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());

    let out = op
        .process_element(&canal_insert("orders", json!({"id": 1, "b": "x"})))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(field_names(&out[0].schema), vec!["id", "b"]);
    assert_eq!(out[0].primary_keys, vec!["id"]);
    assert_eq!(catalog.calls.creates(), 1);
    assert_eq!(catalog.calls.create_namespace.load(Ordering::SeqCst), 1);

    let live = catalog.inner.load_table(&table("orders")).unwrap();
    assert_eq!(field_names(&live.schema), vec!["id", "b"]);
    assert!(!live.schema.find_field("id").unwrap().nullable);
    assert!(live.schema.find_field("b").unwrap().nullable);
}

#[test]
fn added_column_is_applied() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());
    op.process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        .unwrap();

    let out = op
        .process_element(&canal_insert("t", json!({"id": 2, "b": "y", "c": 7})))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(field_names(&out[0].schema), vec!["id", "b", "c"]);
    let ids: Vec<i32> = out[0].schema.fields().iter().map(|f| f.id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
    assert_eq!(
        out[0].rows.column(2).as_primitive::<Int64Type>().value(0),
        7
    );
    assert_eq!(catalog.calls.commits(), 1);
    assert_eq!(op.metrics().snapshot().evolutions_committed, 1);

    let live = catalog.inner.load_table(&table("t")).unwrap();
    assert_eq!(field_names(&live.schema), vec!["id", "b", "c"]);
    assert!(live.schema.find_field("c").unwrap().nullable);
}

#[test]
fn refused_change_blacklists_without_alteration() {
    let catalog = Arc::new(CountingCatalog::new());
    let options = canal_options().with_add_column_policy(SchemaUpdatePolicy::LogAndError);
    let mut op = operator(&catalog, options);
    op.process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        .unwrap();

    let out = op
        .process_element(&canal_insert("t", json!({"id": 2, "b": "y", "c": 7})))
        .unwrap();

    assert!(out.is_empty());
    assert!(op.is_blacklisted(&table("t")));
    assert_eq!(catalog.calls.commits(), 0);
    let live = catalog.inner.load_table(&table("t")).unwrap();
    assert_eq!(field_names(&live.schema), vec!["id", "b"]);
    assert_eq!(op.metrics().snapshot().tables_blacklisted, 1);
}

#[test]
fn blacklisted_table_drops_without_catalog_calls() {
    let catalog = Arc::new(CountingCatalog::new());
    let options = canal_options().with_add_column_policy(SchemaUpdatePolicy::LogAndError);
    let mut op = operator(&catalog, options);
    op.process_element(&canal_insert("t", json!({"id": 1})))
        .unwrap();
    op.process_element(&canal_insert("t", json!({"id": 2, "c": 1})))
        .unwrap();
    assert!(op.is_blacklisted(&table("t")));

    let calls_before = catalog.calls.total();
    let dropped_before = op.metrics().snapshot().records_dropped;
    for id in 3..6 {
        let out = op
            .process_element(&canal_insert("t", json!({"id": id, "z": id})))
            .unwrap();
        assert!(out.is_empty());
    }

    assert_eq!(catalog.calls.total(), calls_before);
    assert_eq!(op.pending_records(&table("t")), 0);
    assert_eq!(op.metrics().snapshot().records_dropped, dropped_before + 3);
    assert_eq!(op.blacklisted_tables(), vec![table("t")]);
}

#[test]
fn covered_record_is_emitted_without_reconciliation() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());
    op.process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        .unwrap();

    let calls_before = catalog.calls.total();
    let out = op
        .process_element(&canal_insert("t", json!({"id": 2})))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(field_names(&out[0].schema), vec!["id", "b"]);
    assert!(out[0].rows.column(1).is_null(0));
    assert_eq!(catalog.calls.total(), calls_before);
}

#[test]
fn concurrent_bootstrap_creates_one_table() {
    let catalog = Arc::new(CountingCatalog::with_exists_barrier(2));
    let mut first = operator(&catalog, canal_options());
    let mut second = operator(&catalog, canal_options());

    let (a, b) = thread::scope(|s| {
        let a = s.spawn(|| {
            first.process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        });
        let b = s.spawn(|| {
            second.process_element(&canal_insert("t", json!({"id": 2, "b": "y"})))
        });
        (a.join().unwrap(), b.join().unwrap())
    });

    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(a.len(), 1);
    assert_eq!(b.len(), 1);
    assert_eq!(catalog.calls.creates(), 2);
    assert_eq!(catalog.inner.list_tables(), vec![table("t")]);
    assert_eq!(a[0].schema, b[0].schema);
    let created = first.metrics().snapshot().tables_created
        + second.metrics().snapshot().tables_created;
    assert_eq!(created, 1);
}

#[test]
fn emission_preserves_arrival_order_per_table() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());

    let inputs = [
        ("a", json!({"id": 1})),
        ("b", json!({"id": 100})),
        ("a", json!({"id": 2, "x": "new"})),
        ("b", json!({"id": 101, "y": 1.5})),
        ("a", json!({"id": 3})),
        ("a", json!({"id": 4, "x": "again", "w": true})),
    ];
    let mut emitted = Vec::new();
    for (name, row) in inputs {
        for record in op.process_element(&canal_insert(name, row)).unwrap() {
            let id = record.rows.column(0).as_primitive::<Int64Type>().value(0);
            emitted.push((record.table_id.name().to_string(), id));
        }
    }

    let ids_of = |t: &str| -> Vec<i64> {
        emitted
            .iter()
            .filter(|(name, _)| name == t)
            .map(|(_, id)| *id)
            .collect()
    };
    assert_eq!(ids_of("a"), vec![1, 2, 3, 4]);
    assert_eq!(ids_of("b"), vec![100, 101]);
    let live = catalog.inner.load_table(&table("a")).unwrap();
    assert_eq!(field_names(&live.schema), vec!["id", "x", "w"]);
}

#[test]
fn extraction_failure_blacklists_only_that_table() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());
    op.process_element(&canal_insert("bad", json!({"id": 1, "n": 5})))
        .unwrap();
    op.process_element(&canal_insert("good", json!({"id": 1})))
        .unwrap();

    let out = op
        .process_element(&canal_insert("bad", json!({"id": 2, "n": "five"})))
        .unwrap();
    assert!(out.is_empty());
    assert!(op.is_blacklisted(&table("bad")));

    let out = op
        .process_element(&canal_insert("good", json!({"id": 2})))
        .unwrap();
    assert_eq!(out.len(), 1);
    assert!(matches!(op.table_state(&table("good")), TableState::Known(_)));
}

#[test]
fn stale_cache_adopts_concurrent_evolution() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut first = operator(&catalog, canal_options());
    let mut second = operator(&catalog, canal_options());
    first
        .process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        .unwrap();
    second
        .process_element(&canal_insert("t", json!({"id": 2, "b": "y"})))
        .unwrap();

    first
        .process_element(&canal_insert("t", json!({"id": 3, "b": "z", "c": 1})))
        .unwrap();
    let out = second
        .process_element(&canal_insert("t", json!({"id": 4, "b": "w", "d": 2})))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(field_names(&out[0].schema), vec!["id", "b", "c", "d"]);
    assert_eq!(second.metrics().snapshot().stale_rounds, 1);
    let live = catalog.inner.load_table(&table("t")).unwrap();
    assert_eq!(field_names(&live.schema), vec!["id", "b", "c", "d"]);
}

#[test]
fn ignored_delete_keeps_column() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());
    op.process_element(&canal_insert("t", json!({"id": 1, "old": "x"})))
        .unwrap();

    let out = op
        .process_element(&canal_insert("t", json!({"id": 2, "new": "y"})))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(field_names(&out[0].schema), vec!["id", "old", "new"]);
}

#[test]
fn applied_delete_drops_column() {
    let catalog = Arc::new(CountingCatalog::new());
    let options = canal_options().with_delete_column_policy(SchemaUpdatePolicy::Apply);
    let mut op = operator(&catalog, options);
    op.process_element(&canal_insert("t", json!({"id": 1, "old": "x"})))
        .unwrap();

    let out = op
        .process_element(&canal_insert("t", json!({"id": 2, "new": "y"})))
        .unwrap();

    assert_eq!(out.len(), 1);
    assert_eq!(field_names(&out[0].schema), vec!["id", "new"]);
    assert_eq!(catalog.calls.commits(), 1);
}

#[test]
fn unknown_operation_type_leaves_catalog_untouched() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());
    op.process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        .unwrap();
    let calls_before = catalog.calls.total();

    let widened = canal_change("t", "TRUNCATE", json!([{"id": 2, "b": "y", "c": 1}]));
    assert!(matches!(op.process_element(&widened), Err(SinkError::Decode(_))));
    let unseen = canal_change("u", "BOGUS", json!([{"id": 1}]));
    assert!(matches!(op.process_element(&unseen), Err(SinkError::Decode(_))));

    assert_eq!(catalog.calls.total(), calls_before);
    assert_eq!(catalog.inner.list_tables(), vec![table("t")]);
    let live = catalog.inner.load_table(&table("t")).unwrap();
    assert_eq!(field_names(&live.schema), vec!["id", "b"]);
    assert_eq!(op.pending_records(&table("t")), 0);
    assert_eq!(op.pending_records(&table("u")), 0);
}

#[test]
fn record_without_rows_does_not_bootstrap_table() {
    let catalog = Arc::new(CountingCatalog::new());
    let mut op = operator(&catalog, canal_options());

    let mut empty: serde_json::Value =
        serde_json::from_slice(&canal_change("t", "INSERT", json!([]))).unwrap();
    empty["sqlType"] = json!({"id": -5, "b": 12});
    let out = op.process_element(empty.to_string().as_bytes()).unwrap();

    assert!(out.is_empty());
    assert_eq!(catalog.calls.total(), 0);
    assert_eq!(op.pending_records(&table("t")), 0);
    assert!(matches!(op.table_state(&table("t")), TableState::Unknown));
    assert_eq!(op.metrics().snapshot().empty_skipped, 1);

    op.process_element(&canal_insert("t", json!({"id": 1, "b": "x"})))
        .unwrap();
    let live = catalog.inner.load_table(&table("t")).unwrap();
    assert!(!live.schema.find_field("id").unwrap().nullable);
}

pub(crate) use super::*;
use tempfile::TempDir;

fn row(onset: f64, condition: &str, amplitude: Option<f64>) -> EventRow {
    EventRow {
        onset,
        duration: 2.0,
        condition: condition.to_string(),
        amplitude,
    }
}

#[test]
fn test_to_events_renames_and_drops_undefined() {
    let table = SparseTable::new(vec![
        row(0.0, "faces", Some(1.0)),
        row(4.0, "houses", None),
        row(8.0, "houses", Some(f64::NAN)),
        row(12.0, "faces", Some(0.5)),
    ]);

    let events = table.to_events();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].trial_type, "faces");
    assert!((events[1].modulation - 0.5).abs() < 1e-12);
    assert_eq!(table.rows().len(), 4, "source rows are left untouched");
}

#[test]
fn test_trial_types_sorted_unique() {
    let table = SparseTable::new(vec![
        row(0.0, "houses", Some(1.0)),
        row(2.0, "faces", Some(1.0)),
        row(4.0, "houses", Some(1.0)),
    ]);
    assert_eq!(trial_types(&table.to_events()), vec!["faces", "houses"]);
}

#[test]
fn test_sparse_missing_amplitude_deserializes() {
    let json = r#"[{"onset": 0, "duration": 1, "condition": "a"},
                   {"onset": 1, "duration": 1, "condition": "b", "amplitude": null},
                   {"onset": 2, "duration": 1, "condition": "c", "amplitude": 2}]"#;
    let table: SparseTable = serde_json::from_str(json).expect("valid sparse JSON");
    assert_eq!(table.rows().len(), 3);
    assert_eq!(table.to_events().len(), 1);
}

#[test]
fn test_dense_table_validation() {
    assert!(DenseTable::new(vec![]).is_err());
    assert!(DenseTable::new(vec![
        ("a".to_string(), vec![1.0, 2.0]),
        ("b".to_string(), vec![1.0]),
    ])
    .is_err());
    assert!(DenseTable::new(vec![
        ("a".to_string(), vec![1.0]),
        ("a".to_string(), vec![2.0]),
    ])
    .is_err());
    assert!(DenseTable::new(vec![(String::new(), vec![1.0])]).is_err());
}

#[test]
fn test_dense_table_column_access() {
    let table = DenseTable::new(vec![
        ("trans_x".to_string(), vec![0.0, 0.5]),
        ("cosine_00".to_string(), vec![1.0, -1.0]),
    ])
    .expect("valid table");
    assert_eq!(table.column_names(), vec!["trans_x", "cosine_00"]);
    assert_eq!(table.column("cosine_00").expect("exists"), &[1.0, -1.0]);
    assert!(table.column("rot_y").is_err());
    assert_eq!(table.iter_columns().count(), 2);
}

#[test]
fn test_dense_table_rejects_ragged_json() {
    let json = r#"{"columns": [{"name": "a", "values": [1, 2]}, {"name": "b", "values": [1]}]}"#;
    assert!(serde_json::from_str::<DenseTable>(json).is_err());
}

#[test]
fn test_store_roundtrip_and_missing_key() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("regressors.json");
    let dense = DenseTable::new(vec![("trans_x".to_string(), vec![0.0, 0.1, 0.2])])
        .expect("valid table");
    RegressorStore::write(&path, None, Some(&dense)).expect("write store");

    let store = RegressorStore::open(&path).expect("open store");
    assert_eq!(store.dense().expect("dense table present"), dense);
    match store.sparse() {
        Err(GlmError::MissingTable { key, .. }) => assert_eq!(key, SPARSE_KEY),
        other => panic!("expected missing sparse table, got {other:?}"),
    }
}

#[test]
fn test_store_missing_file() {
    let dir = TempDir::new().expect("temp dir");
    let err = RegressorStore::open(dir.path().join("absent.json")).expect_err("no file");
    assert!(matches!(err, GlmError::MissingInput { .. }));
}

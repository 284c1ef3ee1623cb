pub(crate) use super::*;
use tempfile::TempDir;

fn dense(names: &[&str]) -> DenseTable {
    DenseTable::new(
        names
            .iter()
            .map(|n| ((*n).to_string(), vec![0.0, 1.0, 0.0]))
            .collect(),
    )
    .expect("valid table")
}

#[test]
fn test_drift_none_when_cosine_supplied() {
    let table = dense(&["trans_x", "cosine_00", "cosine_01"]);
    assert_eq!(resolve_drift_model(Some(&table), DriftModel::Cosine), None);
}

#[test]
fn test_drift_cosine_without_cosine_column() {
    let table = dense(&["trans_x", "cosine_01"]);
    assert_eq!(
        resolve_drift_model(Some(&table), DriftModel::Cosine),
        Some(DriftModel::Cosine)
    );
}

#[test]
fn test_drift_cosine_without_dense_table() {
    assert_eq!(
        resolve_drift_model(None, DriftModel::Cosine),
        Some(DriftModel::Cosine)
    );
}

#[test]
fn test_drift_default_is_configurable() {
    let poly = DriftModel::Polynomial { order: 2 };
    assert_eq!(resolve_drift_model(None, poly), Some(poly));
}

#[test]
fn test_frame_times() {
    assert_eq!(frame_times(4, 2.5), vec![0.0, 2.5, 5.0, 7.5]);
    assert!(frame_times(0, 2.0).is_empty());
}

#[test]
fn test_design_matrix_validation() {
    let ft = vec![0.0, 1.0];
    assert!(DesignMatrix::new(ft.clone(), vec![]).is_err());
    assert!(DesignMatrix::new(ft.clone(), vec![("a".into(), vec![1.0])]).is_err());
    assert!(DesignMatrix::new(
        ft,
        vec![("a".into(), vec![1.0, 2.0]), ("a".into(), vec![3.0, 4.0])]
    )
    .is_err());
}

#[test]
fn test_design_matrix_columns() {
    let design = DesignMatrix::new(
        vec![0.0, 2.0, 4.0],
        vec![
            ("faces".into(), vec![1.0, 0.0, 1.0]),
            ("constant".into(), vec![1.0, 1.0, 1.0]),
        ],
    )
    .expect("valid design");
    assert_eq!(design.column_names(), &["faces", "constant"]);
    assert_eq!(design.n_rows(), 3);
    assert_eq!(design.n_cols(), 2);
    assert_eq!(design.values().row(2), &[1.0, 1.0]);
    assert_eq!(design.column("faces"), Some(vec![1.0, 0.0, 1.0]));
    assert_eq!(design.column("houses"), None);
}

#[test]
fn test_tsv_roundtrip_preserves_order() {
    let dir = TempDir::new().expect("temp dir");
    let path = dir.path().join("design.tsv");
    let design = DesignMatrix::new(
        vec![0.0, 2.0],
        vec![
            ("zeta".into(), vec![0.25, -1.5]),
            ("alpha".into(), vec![1e-7, 3.0]),
        ],
    )
    .expect("valid design");
    design.write_tsv(&path).expect("write");

    let text = std::fs::read_to_string(&path).expect("read back");
    assert!(text.starts_with("frame_time\tzeta\talpha\n"));

    let restored = DesignMatrix::read_tsv(&path).expect("parse");
    assert_eq!(restored, design);
}

#[test]
fn test_read_tsv_missing_file() {
    let dir = TempDir::new().expect("temp dir");
    let err = DesignMatrix::read_tsv(dir.path().join("design.tsv")).expect_err("absent");
    assert!(matches!(err, GlmError::MissingInput { .. }));
}

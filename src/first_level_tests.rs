pub(crate) use super::*;
use crate::contrast::ContrastType;
use crate::design::{DesignMatrix, COSINE_DRIFT_COLUMN};
use crate::engine::{OlsEngine, OlsFit};
use crate::regressors::EventRow;
use serde_json::Value;
use std::cell::RefCell;
use tempfile::TempDir;

const N_VOLUMES: usize = 40;
const TR: f64 = 2.0;

/// Delegates to [`OlsEngine`] and records every design request it receives.
#[derive(Default)]
struct RecordingEngine {
    inner: OlsEngine,
    requests: RefCell<Vec<DesignRequest>>,
}

impl RecordingEngine {
    fn last_request(&self) -> DesignRequest {
        self.requests
            .borrow()
            .last()
            .cloned()
            .expect("engine was asked for a design")
    }
}

impl ModelingEngine for RecordingEngine {
    type Fitted = OlsFit;

    fn build_design_matrix(&self, request: &DesignRequest) -> Result<DesignMatrix> {
        self.requests.borrow_mut().push(request.clone());
        self.inner.build_design_matrix(request)
    }

    fn fit(
        &self,
        data: &VolumetricMap,
        mask: Option<&VolumetricMap>,
        design: &DesignMatrix,
    ) -> Result<OlsFit> {
        self.inner.fit(data, mask, design)
    }
}

/// Ten alternating `a`/`b` events, 8 s apart; rows 3 and 7 have no amplitude.
fn event_rows() -> Vec<EventRow> {
    (0..10)
        .map(|i| EventRow {
            onset: 8.0 * i as f64,
            duration: 4.0,
            condition: if i % 2 == 0 { "a" } else { "b" }.to_string(),
            amplitude: if i == 3 || i == 7 { None } else { Some(1.0) },
        })
        .collect()
}

fn confounds(with_cosine: bool) -> DenseTable {
    let n = N_VOLUMES as f64;
    let wave = |f: f64| (0..N_VOLUMES).map(|i| (f * i as f64).sin()).collect::<Vec<_>>();
    let mut columns = vec![
        ("trans_x".to_string(), wave(0.37)),
        ("trans_y".to_string(), wave(0.91)),
        ("rot_z".to_string(), wave(1.73)),
    ];
    if with_cosine {
        let cosine = (0..N_VOLUMES)
            .map(|i| (std::f64::consts::PI / n * (i as f64 + 0.5)).cos())
            .collect();
        columns.push((COSINE_DRIFT_COLUMN.to_string(), cosine));
    }
    DenseTable::new(columns).expect("valid confounds")
}

fn bold() -> VolumetricMap {
    let data = (0..N_VOLUMES)
        .flat_map(|i| (0..3).map(move |v| ((i * 7 + v * 3) % 11) as f64 + v as f64))
        .collect();
    VolumetricMap::new(N_VOLUMES, 3, data).expect("valid series")
}

/// Writes a bold series and a regressor store into `dir`.
fn write_run(dir: &Path, with_cosine: bool) -> FirstLevelInputs {
    let bold_file = dir.join("bold.json");
    bold().save(&bold_file).expect("write bold");
    let store = dir.join("regressors.json");
    RegressorStore::write(
        &store,
        Some(&SparseTable::new(event_rows())),
        Some(&confounds(with_cosine)),
    )
    .expect("write store");

    FirstLevelInputs {
        bold_file,
        mask_file: None,
        session_info: SessionInfo {
            sparse: Some(store.clone()),
            dense: Some(store),
            repetition_time: TR,
        },
        contrasts: None,
    }
}

#[test]
fn test_dense_cosine_suppresses_drift_and_filters_events() {
    let dir = TempDir::new().expect("tempdir");
    let inputs = write_run(dir.path(), true);
    let model = FirstLevelModel::new(RecordingEngine::default(), dir.path().join("out"));

    let output = model.fit(&inputs).expect("fit");

    let request = model.engine().last_request();
    assert_eq!(request.drift_model, None);
    assert_eq!(request.events.as_ref().map(Vec::len), Some(8));
    assert_eq!(
        request.confound_names,
        Some(vec![
            "trans_x".to_string(),
            "trans_y".to_string(),
            "rot_z".to_string(),
            "cosine_00".to_string(),
        ])
    );
    assert_eq!(request.frame_times[1], TR);

    let design = DesignMatrix::read_tsv(&output.design_matrix).expect("design persisted");
    for name in ["a", "b", "trans_x", "trans_y", "rot_z", "cosine_00", "constant"] {
        assert!(design.column(name).is_some(), "missing column {name}");
    }
    assert!(output.contrast_maps.is_empty());
}

#[test]
fn test_without_cosine_requests_default_drift() {
    let dir = TempDir::new().expect("tempdir");
    let inputs = write_run(dir.path(), false);
    let model = FirstLevelModel::new(RecordingEngine::default(), dir.path().join("out"));

    model.fit(&inputs).expect("fit");
    assert_eq!(model.engine().last_request().drift_model, Some(DriftModel::Cosine));
}

#[test]
fn test_configured_drift_model_is_forwarded() {
    let dir = TempDir::new().expect("tempdir");
    let inputs = write_run(dir.path(), false);
    let model = FirstLevelModel::new(RecordingEngine::default(), dir.path().join("out"))
        .with_drift_model(DriftModel::Polynomial { order: 2 });

    model.fit(&inputs).expect("fit");
    assert_eq!(
        model.engine().last_request().drift_model,
        Some(DriftModel::Polynomial { order: 2 })
    );
}

#[test]
fn test_no_regressor_sources() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), false);
    inputs.session_info.sparse = None;
    inputs.session_info.dense = None;
    let model = FirstLevelModel::new(RecordingEngine::default(), dir.path().join("out"));

    model.fit(&inputs).expect("constant-only design still fits");
    let request = model.engine().last_request();
    assert!(request.events.is_none());
    assert!(request.confounds.is_none());
    assert_eq!(request.drift_model, Some(DriftModel::Cosine));
}

#[test]
fn test_writes_effect_map_per_contrast() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    inputs.contrasts = Some(vec![
        ContrastSpec::new("a_vs_b", ContrastType::T).with_row([("a", 1.0), ("b", -1.0)]),
        ContrastSpec::new("task", ContrastType::F)
            .with_row([("a", 1.0)])
            .with_row([("b", 1.0)]),
    ]);
    let out_dir = dir.path().join("out");
    let model = FirstLevelModel::new(OlsEngine::new(), &out_dir);

    let output = model.fit(&inputs).expect("fit");

    assert_eq!(
        output.contrast_maps,
        vec![out_dir.join("a_vs_b.json"), out_dir.join("task.json")]
    );
    assert_eq!(output.design_matrix, out_dir.join(DESIGN_FILE));

    let t_map = VolumetricMap::load(&output.contrast_maps[0]).expect("t contrast map");
    assert_eq!((t_map.n_volumes(), t_map.n_voxels()), (1, 3));
    let f_map = VolumetricMap::load(&output.contrast_maps[1]).expect("F contrast map");
    assert_eq!(f_map.n_volumes(), 2);

    let metadata = &output.contrast_metadata[0];
    assert_eq!(metadata["type"], Value::from("effect"));
    let weights = metadata["contrast"].as_array().expect("weights array");
    assert_eq!(weights.len(), 1);
    let row = weights[0].as_array().expect("weight row");
    assert_eq!(row.len(), 7);
    assert_eq!(row[0], Value::from(1.0));
    assert_eq!(row[1], Value::from(-1.0));
}

#[test]
fn test_unknown_regressor_rejected_by_default() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    inputs.contrasts = Some(vec![
        ContrastSpec::new("c_only", ContrastType::T).with_row([("a", 1.0), ("c", 1.0)]),
    ]);
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"));

    match model.fit(&inputs) {
        Err(GlmError::UnknownRegressor { contrast, regressors }) => {
            assert_eq!(contrast, "c_only");
            assert_eq!(regressors, vec!["c".to_string()]);
        }
        other => panic!("expected unknown regressor, got {other:?}"),
    }
}

#[test]
fn test_unknown_regressor_ignored_when_configured() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    inputs.contrasts = Some(vec![
        ContrastSpec::new("a_plus_c", ContrastType::T).with_row([("a", 1.0), ("c", 1.0)]),
    ]);
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"))
        .with_unknown_regressors(UnknownRegressors::Ignore);

    let output = model.fit(&inputs).expect("unknown weight dropped");
    assert_eq!(output.contrast_maps.len(), 1);
}

#[test]
fn test_missing_bold_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    inputs.bold_file = dir.path().join("absent.json");
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"));

    assert!(matches!(model.fit(&inputs), Err(GlmError::MissingInput { .. })));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_missing_dense_table_is_fatal() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    let sparse_only = dir.path().join("sparse_only.json");
    RegressorStore::write(&sparse_only, Some(&SparseTable::new(event_rows())), None)
        .expect("write store");
    inputs.session_info.dense = Some(sparse_only);
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"));

    match model.fit(&inputs) {
        Err(GlmError::MissingTable { key, .. }) => assert_eq!(key, "dense"),
        other => panic!("expected missing table, got {other:?}"),
    }
}

#[test]
fn test_dense_length_must_match_volumes() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    let short = dir.path().join("short.json");
    let table = DenseTable::new(vec![("trans_x".to_string(), vec![0.0; N_VOLUMES - 1])])
        .expect("valid table");
    RegressorStore::write(&short, None, Some(&table)).expect("write store");
    inputs.session_info.dense = Some(short);
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"));

    assert!(matches!(
        model.fit(&inputs),
        Err(GlmError::DimensionMismatch { .. })
    ));
}

#[test]
fn test_rejects_bad_repetition_time() {
    let dir = TempDir::new().expect("tempdir");
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"));
    for tr in [0.0, -2.0, f64::NAN, f64::INFINITY] {
        let mut inputs = write_run(dir.path(), true);
        inputs.session_info.repetition_time = tr;
        assert!(
            matches!(model.fit(&inputs), Err(GlmError::InvalidParameter { .. })),
            "tr {tr} accepted"
        );
    }
}

#[test]
fn test_contrast_names_checked_before_work() {
    let dir = TempDir::new().expect("tempdir");
    let mut inputs = write_run(dir.path(), true);
    inputs.contrasts = Some(vec![
        ContrastSpec::new("../escape", ContrastType::T).with_row([("a", 1.0)]),
    ]);
    let model = FirstLevelModel::new(OlsEngine::new(), dir.path().join("out"));

    assert!(matches!(model.fit(&inputs), Err(GlmError::InvalidContrast { .. })));
    assert!(!dir.path().join("out").exists());
}

#[test]
fn test_session_info_none_string_means_absent() {
    let info: SessionInfo = serde_json::from_str(
        r#"{"sparse": "None", "dense": "/data/run-1_regressors.json", "repetition_time": 2.5}"#,
    )
    .expect("valid session info");
    assert_eq!(info.sparse, None);
    assert_eq!(info.dense, Some(PathBuf::from("/data/run-1_regressors.json")));
    assert_eq!(info.repetition_time, 2.5);

    let info: SessionInfo =
        serde_json::from_str(r#"{"sparse": null, "repetition_time": 1.0}"#).expect("valid");
    assert_eq!((info.sparse, info.dense), (None, None));
}

#[test]
fn test_records_merge_run_entities() {
    let output = FirstLevelOutput {
        design_matrix: PathBuf::from("design.tsv"),
        contrast_maps: vec![PathBuf::from("a.json")],
        contrast_metadata: vec![Entities::from([
            ("type".to_string(), json!("effect")),
            ("subject".to_string(), json!("02")),
        ])],
    };
    let run = Entities::from([
        ("subject".to_string(), json!("01")),
        ("run".to_string(), json!(1)),
    ]);

    let records = output.records(&run);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].file_path, PathBuf::from("a.json"));
    assert_eq!(records[0].metadata["run"], json!(1));
    assert_eq!(records[0].metadata["subject"], json!("02"));
    assert_eq!(records[0].metadata["type"], json!("effect"));
}

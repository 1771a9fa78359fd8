use chrono::{Duration, NaiveDate};

use sentiment_forecast::classifier::sequence::{reassemble, window_partition};
use sentiment_forecast::classifier::{build_classifier, ModelKind};
use sentiment_forecast::config::ModelConfig;
use sentiment_forecast::split::Partition;
use sentiment_forecast::table::FeatureMatrix;

/// Label is 1 when `lead` is positive; `lead` is a noisy copy of the label.
fn separable(n: usize) -> (FeatureMatrix, Vec<u8>) {
    let y: Vec<u8> = (0..n).map(|i| u8::from((i * 37) % 11 < 5)).collect();
    let rows = y
        .iter()
        .enumerate()
        .map(|(i, label)| {
            let lead = if *label == 1 { 1.0 } else { -1.0 } + ((i % 7) as f64 - 3.0) * 0.1;
            vec![lead, (i % 13) as f64, f64::NAN]
        })
        .collect();
    let names = vec!["lead".to_string(), "cycle".to_string(), "unobserved".to_string()];
    (FeatureMatrix::new(names, rows).unwrap(), y)
}

fn small_model_config() -> ModelConfig {
    ModelConfig {
        forest_trees: 15,
        forest_max_depth: 4,
        timesteps: 4,
        ..ModelConfig::default()
    }
}

#[test]
/// Every tabular model family learns a separable signal and tolerates an
/// all-absent column.
fn tabular_models_learn_a_separable_signal() {
    let (x, y) = separable(120);
    for kind in [ModelKind::Forest, ModelKind::Logistic] {
        let mut model = build_classifier(kind, &small_model_config(), 42, x.n_features());
        assert_eq!(model.kind(), kind);
        model.fit(&x, &y).unwrap();

        let pred = model.predict(&x).unwrap();
        let correct = pred.iter().zip(&y).filter(|(p, t)| p == t).count();
        assert!(correct >= 110, "{} got {} of 120", kind, correct);

        let proba = model.predict_proba(&x).unwrap().unwrap();
        assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
    }
}

#[test]
fn only_the_forest_reports_builtin_importances() {
    let (x, y) = separable(60);
    let config = small_model_config();

    let mut forest = build_classifier(ModelKind::Forest, &config, 1, x.n_features());
    forest.fit(&x, &y).unwrap();
    let imp = forest.feature_importances().unwrap();
    assert_eq!(imp.len(), 3);
    assert!(imp[0] > imp[1]);
    assert_eq!(imp[2], 0.0);

    let mut logistic = build_classifier(ModelKind::Logistic, &config, 1, x.n_features());
    logistic.fit(&x, &y).unwrap();
    assert!(logistic.feature_importances().is_none());
}

#[test]
/// The sequence model consumes flattened windows and reassembles them.
fn sequence_model_runs_on_flattened_windows() {
    let (x, y) = separable(80);
    let d0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
    let rows = Partition {
        dates: (0..80).map(|i| d0 + Duration::days(i)).collect(),
        features: x,
        labels: y.iter().map(|v| f64::from(*v)).collect(),
    };
    let config = small_model_config();
    let windows = window_partition(&rows, config.timesteps).unwrap();
    assert_eq!(windows.len(), 80 - config.timesteps);
    assert_eq!(windows.features.n_features(), config.timesteps * 3);
    assert_eq!(reassemble(&windows.features.rows()[0], 3).len(), config.timesteps);

    let mut model = build_classifier(ModelKind::Sequence, &config, 42, 3);
    model.fit(&windows.features, &windows.classes()).unwrap();
    let pred = model.predict(&windows.features).unwrap();
    assert_eq!(pred.len(), windows.len());
    assert!(model.predict_proba(&windows.features).unwrap().is_some());
}

#[test]
fn fitting_on_mismatched_labels_fails() {
    let (x, y) = separable(10);
    let mut model = build_classifier(ModelKind::Logistic, &small_model_config(), 0, 3);
    assert!(model.fit(&x, &y[..9]).is_err());
}

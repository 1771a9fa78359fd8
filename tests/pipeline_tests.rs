mod common;

use anyhow::Result;
use chrono::NaiveDate;

use common::{daily_bars, flat_indicators, leaning_articles, small_config, synthetic_closes, FixtureSource};
use sentiment_forecast::classifier::ModelKind;
use sentiment_forecast::eval::AucScore;
use sentiment_forecast::macro_indicators::IndicatorSet;
use sentiment_forecast::pipeline::{build_all, collect_data, model_split, train_all, train_company};
use sentiment_forecast::schema::ORDINAL_INDEX;
use sentiment_forecast::source::IndicatorSource;
use sentiment_forecast::store::{load_evaluation_records, FeatureStore};

const DAYS: i64 = 120;

struct FixedIndicators(IndicatorSet);

impl IndicatorSource for FixedIndicators {
    fn load_indicators(&self, _series: &[&str], _start: NaiveDate, _end: NaiveDate) -> Result<IndicatorSet> {
        Ok(self.0.clone())
    }
}

fn two_company_source() -> FixtureSource {
    let a = synthetic_closes(DAYS as usize);
    let b: Vec<f64> = a.iter().rev().map(|c| c * 0.5).collect();
    FixtureSource::default()
        .with_company("dltr", daily_bars(&a), leaning_articles(&a))
        .with_company("lulu", daily_bars(&b), leaning_articles(&b))
}

#[test]
/// One company without a price file fails alone; the others still build.
fn failing_company_does_not_stop_the_run() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&["dltr", "ulta", "lulu"], DAYS, dir.path());
    let outcomes = build_all(&config.run, &two_company_source(), &two_company_source(), &flat_indicators());

    let ok: Vec<&str> = outcomes
        .iter()
        .filter(|o| o.is_ok())
        .map(|o| o.company.as_str())
        .collect();
    assert_eq!(ok, vec!["dltr", "lulu"]);
    let failed = outcomes.iter().find(|o| o.company == "ulta").unwrap();
    assert!(format!("{:#}", failed.result.as_ref().unwrap_err()).contains("ulta"));
}

#[test]
fn collect_data_persists_successful_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&["dltr", "ulta", "lulu"], DAYS, dir.path());
    let store = FeatureStore::open(&config.data.feature_store()).unwrap();
    let source = two_company_source();

    let outcomes = collect_data(&config, &source, &source, &FixedIndicators(flat_indicators()), &store).unwrap();
    assert_eq!(outcomes.iter().filter(|o| o.is_ok()).count(), 2);
    assert_eq!(store.companies().unwrap(), vec!["dltr".to_string(), "lulu".to_string()]);
    assert_eq!(store.load("dltr").unwrap().unwrap().len(), DAYS as usize);
}

#[test]
/// Each model family trains and evaluates on a stored table.
fn every_model_kind_produces_a_record() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&["dltr"], DAYS, dir.path());
    let source = two_company_source();
    let table = build_all(&config.run, &source, &source, &flat_indicators())
        .remove(0)
        .result
        .unwrap();

    for kind in ModelKind::ALL {
        let record = train_company(&table, kind, &config).unwrap();
        assert_eq!(record.company, "dltr");
        assert_eq!(record.model_kind, kind);
        assert_eq!(record.probabilities.len(), record.y_test.len());
        assert!((0.0..=1.0).contains(&record.accuracy));
        if let AucScore::Defined { value } = record.auc {
            assert!((0.0..=1.0).contains(&value));
        }
        let permutation = record.permutation_importances.as_ref().unwrap();
        assert!(!permutation.is_empty());
        assert_eq!(record.feature_importances.is_some(), kind == ModelKind::Forest);
    }
}

#[test]
fn model_splits_follow_their_row_filters() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&["dltr"], DAYS, dir.path());
    let source = two_company_source();
    let table = build_all(&config.run, &source, &source, &flat_indicators())
        .remove(0)
        .result
        .unwrap();

    let forest = model_split(&table, ModelKind::Forest, 0.8, 5).unwrap();
    assert_eq!(forest.dev.features.feature_names()[0], ORDINAL_INDEX);
    assert_eq!(forest.dev.len() + forest.test.len(), DAYS as usize - 1);

    let logistic = model_split(&table, ModelKind::Logistic, 0.8, 5).unwrap();
    assert!(logistic.dev.features.rows().iter().all(|r| r.iter().all(|v| !v.is_nan())));
    assert!(logistic.dev.len() + logistic.test.len() < DAYS as usize - 1);

    let sequence = model_split(&table, ModelKind::Sequence, 0.8, 5).unwrap();
    let base = logistic.dev.features.n_features() + 1;
    assert_eq!(sequence.dev.features.n_features(), 5 * base);
    assert_eq!(
        sequence.dev.len() + sequence.test.len(),
        logistic.dev.len() + logistic.test.len() - 5
    );
    assert!(sequence.dev.dates.last().unwrap() < sequence.test.dates.first().unwrap());
}

#[test]
fn train_all_writes_records_and_reports_missing_tables() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&["dltr", "wmt"], DAYS, dir.path());
    let store = FeatureStore::open(&config.data.feature_store()).unwrap();
    let source = two_company_source();
    collect_data(&config, &source, &source, &FixedIndicators(flat_indicators()), &store).unwrap();

    let outcomes = train_all(&config, &store, ModelKind::Logistic).unwrap();
    assert_eq!(outcomes.len(), 2);
    let wmt = outcomes.iter().find(|o| o.company == "wmt").unwrap();
    assert!(!wmt.is_ok());

    let records = load_evaluation_records(&config.data.results_dir()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].company, "dltr");
    assert_eq!(records[0].model_kind, ModelKind::Logistic);
    assert!(records[0].y_test.len() >= 1);
}

#[test]
/// A table stored under other window sizes fails its company instead of
/// training on a different feature set.
fn train_all_rejects_tables_built_with_other_windows() {
    let dir = tempfile::tempdir().unwrap();
    let config = small_config(&["dltr", "lulu"], DAYS, dir.path());
    let store = FeatureStore::open(&config.data.feature_store()).unwrap();
    let source = two_company_source();

    let mut other = small_config(&["lulu"], DAYS, dir.path());
    other.run.window_sizes = vec![5];
    collect_data(&other, &source, &source, &FixedIndicators(flat_indicators()), &store).unwrap();
    let dltr_only = small_config(&["dltr"], DAYS, dir.path());
    collect_data(&dltr_only, &source, &source, &FixedIndicators(flat_indicators()), &store).unwrap();

    let outcomes = train_all(&config, &store, ModelKind::Forest).unwrap();
    let lulu = outcomes.iter().find(|o| o.company == "lulu").unwrap();
    let err = format!("{:#}", lulu.result.as_ref().unwrap_err());
    assert!(err.contains("configured schema"), "{}", err);
    assert!(outcomes.iter().find(|o| o.company == "dltr").unwrap().is_ok());

    let records = load_evaluation_records(&config.data.results_dir()).unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].company, "dltr");
}

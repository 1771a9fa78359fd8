use anyhow::{Context, Result};
use rayon::prelude::*;

use crate::classifier::sequence::window_partition;
use crate::classifier::{build_classifier, ModelKind};
use crate::config::{Config, RunConfig};
use crate::error::PipelineResult;
use crate::eval::{
    builtin_importance_ranking, evaluate, permutation_importance, EvaluationRecord,
};
use crate::macro_indicators::{IndicatorSet, INDICATOR_SERIES};
use crate::merge::merge_components;
use crate::prices::price_frame;
use crate::schema::Schema;
use crate::sentiment::{sentiment_frame, ArticleGroups};
use crate::source::{IndicatorSource, PriceSource, SentimentSource};
use crate::split::{labeled_rows, split_partition, split_table, SplitOptions, SplitPair};
use crate::store::{persist_evaluation_record, FeatureStore};
use crate::table::FeatureTable;

/// Result of one company's share of a run. A failure here never stops the
/// other companies.
#[derive(Debug)]
pub struct CompanyOutcome<T> {
    pub company: String,
    pub result: Result<T>,
}

impl<T> CompanyOutcome<T> {
    pub fn is_ok(&self) -> bool {
        self.result.is_ok()
    }
}

/// Merge one company's sentiment, indicator and price frames onto the
/// calendar skeleton of `run`.
pub fn build_feature_table(
    company: &str,
    run: &RunConfig,
    prices: &dyn PriceSource,
    sentiment: &dyn SentimentSource,
    indicators: &IndicatorSet,
) -> Result<FeatureTable> {
    let (start, end) = (run.start_date, run.end_date);
    let schema = Schema::canonical(&run.window_sizes);

    let bars = prices
        .load_prices(company, start, end)
        .with_context(|| format!("failed to load prices for {}", company))?;
    let articles = sentiment
        .load_articles(company)
        .with_context(|| format!("failed to load sentiment for {}", company))?;
    let groups = ArticleGroups::from_records(articles);

    let frames = vec![
        sentiment_frame(&groups, start, end, &run.window_sizes)?,
        indicators.to_frame(start, end)?,
        price_frame(&bars, start, end, &run.window_sizes)?,
    ];
    let table = merge_components(company, &schema, start, end, &frames)
        .with_context(|| format!("failed to merge features for {}", company))?;
    tracing::info!(
        company,
        rows = table.len(),
        bars = bars.len(),
        article_days = groups.len(),
        "Feature table built"
    );
    Ok(table)
}

/// Build every configured company's table in parallel.
pub fn build_all(
    run: &RunConfig,
    prices: &dyn PriceSource,
    sentiment: &dyn SentimentSource,
    indicators: &IndicatorSet,
) -> Vec<CompanyOutcome<FeatureTable>> {
    run.company_ids()
        .into_par_iter()
        .map(|company| {
            let result = build_feature_table(&company, run, prices, sentiment, indicators);
            if let Err(e) = &result {
                tracing::error!(company = %company, error = %format!("{:#}", e), "Feature table failed");
            }
            CompanyOutcome { company, result }
        })
        .collect()
}

/// Load inputs, build all tables and persist the successful ones.
pub fn collect_data(
    config: &Config,
    prices: &dyn PriceSource,
    sentiment: &dyn SentimentSource,
    indicators: &dyn IndicatorSource,
    store: &FeatureStore,
) -> Result<Vec<CompanyOutcome<usize>>> {
    let run = &config.run;
    let set = indicators
        .load_indicators(&INDICATOR_SERIES, run.start_date, run.end_date)
        .context("failed to load macro indicators")?;
    tracing::info!(observations = set.len(), "Macro indicators loaded");

    let outcomes = build_all(run, prices, sentiment, &set)
        .into_iter()
        .map(|outcome| {
            let result = outcome.result.and_then(|table| {
                store.save(&table)?;
                Ok(table.len())
            });
            CompanyOutcome {
                company: outcome.company,
                result,
            }
        })
        .collect();
    Ok(outcomes)
}

/// How each model family consumes the table.
pub fn split_options(kind: ModelKind, fraction: f64) -> SplitOptions {
    let base = SplitOptions {
        fraction,
        ..SplitOptions::default()
    };
    match kind {
        ModelKind::Forest => SplitOptions {
            trading_days_only: true,
            ordinal_index: true,
            ..base
        },
        ModelKind::Logistic => SplitOptions {
            complete_rows_only: true,
            ..base
        },
        ModelKind::Sequence => SplitOptions {
            trading_days_only: true,
            complete_rows_only: true,
            ordinal_index: true,
            ..base
        },
    }
}

/// Dev/test partitions for `kind`. Sequence models window the labeled rows
/// before the cutoff, so each side holds whole windows.
pub fn model_split(
    table: &FeatureTable,
    kind: ModelKind,
    fraction: f64,
    timesteps: usize,
) -> PipelineResult<SplitPair> {
    let opts = split_options(kind, fraction);
    match kind {
        ModelKind::Sequence => {
            let windows = window_partition(&labeled_rows(table, &opts)?, timesteps)?;
            split_partition(windows, fraction)
        }
        _ => split_table(table, &opts),
    }
}

/// Fit `kind` on the dev partition and evaluate it on the test partition.
pub fn train_company(table: &FeatureTable, kind: ModelKind, config: &Config) -> Result<EvaluationRecord> {
    let company = table.company();
    let timesteps = config.model.timesteps;
    let split = model_split(table, kind, config.run.split_fraction, timesteps)
        .with_context(|| format!("failed to split {} for {}", company, kind))?;
    let (dev, test) = (&split.dev, &split.test);
    tracing::info!(company, model = %kind, dev = dev.len(), test = test.len(), "Split ready");

    let n_features = match kind {
        ModelKind::Sequence => dev.features.n_features() / timesteps.max(1),
        _ => dev.features.n_features(),
    };
    let mut model = build_classifier(kind, &config.model, config.run.seed, n_features);
    model.fit(&dev.features, &dev.classes())?;

    let y_test = test.classes();
    let predicted = model.predict(&test.features)?;
    let proba = model.predict_proba(&test.features)?;
    let evaluation = evaluate(&y_test, &predicted, proba.as_deref())?;

    let mut record = EvaluationRecord::new(company, kind, y_test.clone(), evaluation);
    if let Some(importances) = model.feature_importances() {
        record.feature_importances = Some(builtin_importance_ranking(
            dev.features.feature_names(),
            &importances,
        )?);
    }
    record.permutation_importances = Some(permutation_importance(
        model.as_ref(),
        &test.features,
        &y_test,
        config.model.permutation_repeats,
        config.run.seed,
    )?);

    tracing::info!(
        company,
        model = %kind,
        accuracy = record.accuracy,
        f1 = record.f1,
        auc = ?record.auc.value(),
        "Model evaluated"
    );
    Ok(record)
}

/// Train `kind` for every stored company in parallel and persist each record.
pub fn train_all(
    config: &Config,
    store: &FeatureStore,
    kind: ModelKind,
) -> Result<Vec<CompanyOutcome<EvaluationRecord>>> {
    let expected = Schema::canonical(&config.run.window_sizes);
    let mut tables = Vec::new();
    let mut outcomes = Vec::new();
    for company in config.run.company_ids() {
        match store.load(&company) {
            Ok(Some(table)) => match expected.check_matches(table.schema()) {
                Ok(()) => tables.push(table),
                Err(e) => outcomes.push(CompanyOutcome {
                    result: Err(anyhow::Error::new(e).context(format!(
                        "stored feature table for {} does not match the configured schema; rerun collect-data",
                        company
                    ))),
                    company,
                }),
            },
            Ok(None) => outcomes.push(CompanyOutcome {
                result: Err(anyhow::anyhow!(
                    "no feature table stored for {}; run collect-data first",
                    company
                )),
                company,
            }),
            Err(e) => outcomes.push(CompanyOutcome {
                company,
                result: Err(e),
            }),
        }
    }

    let trained: Vec<CompanyOutcome<EvaluationRecord>> = tables
        .par_iter()
        .map(|table| CompanyOutcome {
            company: table.company().to_string(),
            result: train_company(table, kind, config),
        })
        .collect();

    let results_dir = config.data.results_dir();
    for outcome in trained {
        let result = outcome.result.and_then(|record| {
            let path = persist_evaluation_record(&results_dir, &record)?;
            tracing::info!(company = %record.company, path = %path.display(), "Evaluation record written");
            Ok(record)
        });
        outcomes.push(CompanyOutcome {
            company: outcome.company,
            result,
        });
    }
    for outcome in &outcomes {
        if let Err(e) = &outcome.result {
            tracing::error!(company = %outcome.company, model = %kind, error = %format!("{:#}", e), "Training failed");
        }
    }
    Ok(outcomes)
}

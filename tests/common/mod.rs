#![allow(dead_code)]

use std::collections::HashMap;

use anyhow::{anyhow, Result};
use chrono::{Duration, NaiveDate};

use sentiment_forecast::config::{Config, RunConfig};
use sentiment_forecast::macro_indicators::{IndicatorSet, INDICATOR_SERIES};
use sentiment_forecast::model::article::ArticleRecord;
use sentiment_forecast::model::price_bar::PriceBar;
use sentiment_forecast::source::{PriceSource, SentimentSource};

pub fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
}

pub fn article(date: NaiveDate, sentiment: f64, input_tokens: u64) -> ArticleRecord {
    ArticleRecord {
        date,
        tokens: input_tokens / 2,
        text_sentiment: sentiment,
        text_error: 0.1,
        text_input_tokens: input_tokens,
        daily_article_count: 12,
        daily_token_sum: 4_000,
    }
}

/// In-memory provider keyed by company.
#[derive(Default)]
pub struct FixtureSource {
    pub bars: HashMap<String, Vec<PriceBar>>,
    pub articles: HashMap<String, Vec<ArticleRecord>>,
}

impl FixtureSource {
    pub fn with_company(mut self, company: &str, bars: Vec<PriceBar>, articles: Vec<ArticleRecord>) -> Self {
        self.bars.insert(company.to_string(), bars);
        self.articles.insert(company.to_string(), articles);
        self
    }
}

impl PriceSource for FixtureSource {
    fn load_prices(&self, company: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        let bars = self
            .bars
            .get(company)
            .ok_or_else(|| anyhow!("no price file for {}", company))?;
        Ok(bars
            .iter()
            .filter(|b| b.date >= start && b.date <= end)
            .cloned()
            .collect())
    }
}

impl SentimentSource for FixtureSource {
    fn load_articles(&self, company: &str) -> Result<Vec<ArticleRecord>> {
        Ok(self.articles.get(company).cloned().unwrap_or_default())
    }
}

/// Daily closes from day 0 on, every day a trading day.
pub fn daily_bars(closes: &[f64]) -> Vec<PriceBar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, c)| PriceBar {
            volume: Some(1_000.0 + (i % 5) as f64 * 10.0),
            ..PriceBar::from_close(day(i as i64), *c)
        })
        .collect()
}

/// Deterministic wavy price path.
pub fn synthetic_closes(n: usize) -> Vec<f64> {
    (0..n)
        .map(|i| 100.0 + (i as f64 * 0.7).sin() * 5.0 + (i as f64 * 0.13).cos() * 3.0)
        .collect()
}

/// One article per day whose sentiment leans toward the next move.
pub fn leaning_articles(closes: &[f64]) -> Vec<ArticleRecord> {
    closes
        .windows(2)
        .enumerate()
        .map(|(i, w)| article(day(i as i64), if w[1] > w[0] { 0.6 } else { -0.4 }, 200))
        .collect()
}

/// Every indicator observed once on day 0.
pub fn flat_indicators() -> IndicatorSet {
    let mut set = IndicatorSet::default();
    for (i, series) in INDICATOR_SERIES.iter().enumerate() {
        set.push(series, day(0), 100.0 + i as f64);
    }
    set
}

pub fn run_config(companies: &[&str], days: i64) -> RunConfig {
    RunConfig {
        companies: companies.iter().map(|c| c.to_string()).collect(),
        start_date: day(0),
        end_date: day(days - 1),
        window_sizes: vec![3, 7, 14],
        split_fraction: 0.8,
        seed: 42,
    }
}

pub fn small_config(companies: &[&str], days: i64, data_dir: &std::path::Path) -> Config {
    let toml = format!(
        r#"
[run]
companies = [{}]
start_date = "{}"
end_date = "{}"

[data]
data_dir = "{}"

[model]
permutation_repeats = 2
timesteps = 5
forest_trees = 12
forest_max_depth = 6
logistic_epochs = 200
"#,
        companies.iter().map(|c| format!("\"{}\"", c)).collect::<Vec<_>>().join(", "),
        day(0),
        day(days - 1),
        data_dir.display().to_string().replace('\\', "/"),
    );
    Config::from_toml_str(&toml).unwrap()
}

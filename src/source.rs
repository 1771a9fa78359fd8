use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Deserialize;

use crate::config::DataConfig;
use crate::error::PipelineError;
use crate::macro_indicators::IndicatorSet;
use crate::model::article::ArticleRecord;
use crate::model::price_bar::PriceBar;

pub trait PriceSource: Send + Sync {
    /// Provider rows for `company` within `[start, end]`; may be empty.
    fn load_prices(&self, company: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>>;
}

pub trait SentimentSource: Send + Sync {
    /// Every analyzed article about `company`.
    fn load_articles(&self, company: &str) -> Result<Vec<ArticleRecord>>;
}

pub trait IndicatorSource: Send + Sync {
    fn load_indicators(
        &self,
        series: &[&str],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IndicatorSet>;
}

/// Cached provider exports under the data directory.
#[derive(Debug, Clone)]
pub struct CsvSource {
    data: DataConfig,
}

impl CsvSource {
    pub fn new(data: DataConfig) -> Self {
        Self { data }
    }
}

/// Provider dates may carry a time and a UTC offset; only the day is kept.
pub fn parse_day(raw: &str) -> Result<NaiveDate> {
    let day = raw.trim().split([' ', 'T']).next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d").with_context(|| format!("invalid date {:?}", raw))
}

#[derive(Debug, Deserialize)]
struct PriceRow {
    #[serde(alias = "Date", alias = "date")]
    date: String,
    #[serde(alias = "Open", alias = "open", default)]
    open: Option<f64>,
    #[serde(alias = "High", alias = "high", default)]
    high: Option<f64>,
    #[serde(alias = "Low", alias = "low", default)]
    low: Option<f64>,
    #[serde(alias = "Close", alias = "close", default)]
    close: Option<f64>,
    #[serde(alias = "Volume", alias = "volume", default)]
    volume: Option<f64>,
    #[serde(alias = "Dividends", alias = "dividends", default)]
    dividends: Option<f64>,
    #[serde(alias = "Stock Splits", alias = "stock_splits", default)]
    stock_splits: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ArticleRow {
    date: String,
    tokens: u64,
    text_sentiment: f64,
    text_error: f64,
    text_input_tokens: u64,
    daily_article_count: u64,
    daily_token_sum: u64,
}

fn open_csv(path: &Path) -> Result<csv::Reader<std::fs::File>> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("failed to open {}", path.display()))
}

pub fn read_price_csv(path: &Path, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
    let mut reader = open_csv(path)?;
    let mut bars = Vec::new();
    for (i, row) in reader.deserialize::<PriceRow>().enumerate() {
        let row = row.with_context(|| format!("{}: bad price row {}", path.display(), i + 1))?;
        let date = parse_day(&row.date)?;
        if date < start || date > end {
            continue;
        }
        bars.push(PriceBar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
            dividends: row.dividends,
            stock_splits: row.stock_splits,
        });
    }
    Ok(bars)
}

pub fn read_article_csv(path: &Path) -> Result<Vec<ArticleRecord>> {
    let mut reader = open_csv(path)?;
    let mut articles = Vec::new();
    for (i, row) in reader.deserialize::<ArticleRow>().enumerate() {
        let row = row.with_context(|| format!("{}: bad article row {}", path.display(), i + 1))?;
        articles.push(ArticleRecord {
            date: parse_day(&row.date)?,
            tokens: row.tokens,
            text_sentiment: row.text_sentiment,
            text_error: row.text_error,
            text_input_tokens: row.text_input_tokens,
            daily_article_count: row.daily_article_count,
            daily_token_sum: row.daily_token_sum,
        });
    }
    Ok(articles)
}

/// Wide indicator export: a `Date` column plus one column per series, blank
/// where the series has no observation. Every requested series must be present.
pub fn read_indicator_csv(
    path: &Path,
    series: &[&str],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<IndicatorSet> {
    let mut reader = open_csv(path)?;
    let headers = reader
        .headers()
        .with_context(|| format!("failed to read headers of {}", path.display()))?
        .clone();
    let date_col = headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case("date"))
        .ok_or_else(|| PipelineError::MissingColumn("Date".to_string()))?;
    let mut columns = Vec::with_capacity(series.len());
    for name in series {
        let idx = headers
            .iter()
            .position(|h| h == *name)
            .ok_or_else(|| PipelineError::MissingColumn((*name).to_string()))
            .with_context(|| format!("{} lacks indicator column", path.display()))?;
        columns.push((*name, idx));
    }

    let mut set = IndicatorSet::default();
    // latest observation before `start` per series, seeds the forward fill
    let mut prior: Vec<Option<(NaiveDate, f64)>> = vec![None; columns.len()];
    for (i, record) in reader.records().enumerate() {
        let record = record.with_context(|| format!("{}: bad row {}", path.display(), i + 1))?;
        let date = parse_day(record.get(date_col).unwrap_or_default())?;
        if date > end {
            continue;
        }
        for (slot, (name, idx)) in columns.iter().enumerate() {
            let raw = record.get(*idx).unwrap_or_default();
            if raw.is_empty() {
                continue;
            }
            let value: f64 = raw
                .parse()
                .with_context(|| format!("{}: {} is not a number on {}", path.display(), name, date))?;
            if date >= start {
                set.push(name, date, value);
            } else if prior[slot].map_or(true, |(d, _)| date >= d) {
                prior[slot] = Some((date, value));
            }
        }
    }
    for ((name, _), seed) in columns.iter().zip(prior) {
        if let Some((date, value)) = seed {
            set.push(name, date, value);
        }
    }
    Ok(set)
}

impl PriceSource for CsvSource {
    fn load_prices(&self, company: &str, start: NaiveDate, end: NaiveDate) -> Result<Vec<PriceBar>> {
        let path = self.data.price_csv(company);
        let bars = read_price_csv(&path, start, end)?;
        if bars.is_empty() {
            tracing::warn!(company, path = %path.display(), "Price file has no rows in range");
        }
        Ok(bars)
    }
}

impl SentimentSource for CsvSource {
    fn load_articles(&self, company: &str) -> Result<Vec<ArticleRecord>> {
        read_article_csv(&self.data.sentiment_csv(company))
    }
}

impl IndicatorSource for CsvSource {
    fn load_indicators(
        &self,
        series: &[&str],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<IndicatorSet> {
        read_indicator_csv(&self.data.indicators_csv(), series, start, end)
    }
}

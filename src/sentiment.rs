use std::collections::BTreeMap;

use chrono::NaiveDate;

use crate::calendar;
use crate::error::PipelineResult;
use crate::indicator::rolling::rolling_mean;
use crate::merge::ComponentFrame;
use crate::model::article::ArticleRecord;
use crate::schema::{
    sentiment_rolling_mean, ANALYZED_ARTICLE_COUNT, ANALYZED_BPE_TOKENS, ANALYZED_NAIVE_TOKENS,
    DAILY_ARTICLE_COUNT, DAILY_NAIVE_TOKEN_SUM, WEIGHTED_ERROR, WEIGHTED_SENTIMENT,
};

/// Articles grouped by publication date, each group in input order.
#[derive(Debug, Clone, Default)]
pub struct ArticleGroups {
    groups: BTreeMap<NaiveDate, Vec<ArticleRecord>>,
}

impl ArticleGroups {
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = ArticleRecord>,
    {
        let mut groups: BTreeMap<NaiveDate, Vec<ArticleRecord>> = BTreeMap::new();
        for record in records {
            groups.entry(record.date).or_default().push(record);
        }
        Self { groups }
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn get(&self, date: NaiveDate) -> Option<&[ArticleRecord]> {
        self.groups.get(&date).map(|g| g.as_slice())
    }

    /// Groups in ascending date order.
    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, &[ArticleRecord])> + '_ {
        self.groups.iter().map(|(d, g)| (*d, g.as_slice()))
    }
}

/// Mean of `value` weighted by each article's analyzed (BPE) token count.
/// Absent when the group carries no weight at all.
pub fn token_weighted_mean<F>(articles: &[ArticleRecord], value: F) -> Option<f64>
where
    F: Fn(&ArticleRecord) -> f64,
{
    let weight: f64 = articles.iter().map(|a| a.text_input_tokens as f64).sum();
    if weight <= 0.0 {
        return None;
    }
    let weighted: f64 = articles
        .iter()
        .map(|a| value(a) * a.text_input_tokens as f64)
        .sum();
    Some(weighted / weight)
}

pub fn weighted_sentiment(articles: &[ArticleRecord]) -> Option<f64> {
    token_weighted_mean(articles, |a| a.text_sentiment)
}

pub fn weighted_error(articles: &[ArticleRecord]) -> Option<f64> {
    token_weighted_mean(articles, |a| a.text_error)
}

pub fn analyzed_bpe_tokens(articles: &[ArticleRecord]) -> u64 {
    articles.iter().map(|a| a.text_input_tokens).sum()
}

pub fn analyzed_naive_tokens(articles: &[ArticleRecord]) -> u64 {
    articles.iter().map(|a| a.tokens).sum()
}

pub fn analyzed_article_count(articles: &[ArticleRecord]) -> u64 {
    articles.len() as u64
}

/// Corpus-wide totals repeat on every article of a day; the first one is taken.
pub fn daily_naive_token_sum(articles: &[ArticleRecord]) -> Option<u64> {
    articles.first().map(|a| a.daily_token_sum)
}

pub fn daily_article_count(articles: &[ArticleRecord]) -> Option<u64> {
    articles.first().map(|a| a.daily_article_count)
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailySentiment {
    pub date: NaiveDate,
    pub analyzed_bpe_tokens: u64,
    pub weighted_sentiment: Option<f64>,
    pub weighted_error: Option<f64>,
    pub analyzed_naive_tokens: u64,
    pub daily_naive_token_sum: Option<u64>,
    pub analyzed_article_count: u64,
    pub daily_article_count: Option<u64>,
}

impl DailySentiment {
    pub fn from_group(date: NaiveDate, articles: &[ArticleRecord]) -> Self {
        Self {
            date,
            analyzed_bpe_tokens: analyzed_bpe_tokens(articles),
            weighted_sentiment: weighted_sentiment(articles),
            weighted_error: weighted_error(articles),
            analyzed_naive_tokens: analyzed_naive_tokens(articles),
            daily_naive_token_sum: daily_naive_token_sum(articles),
            analyzed_article_count: analyzed_article_count(articles),
            daily_article_count: daily_article_count(articles),
        }
    }
}

/// One aggregate per article-day, in date order.
pub fn aggregate_daily(groups: &ArticleGroups) -> Vec<DailySentiment> {
    groups
        .iter()
        .map(|(date, articles)| DailySentiment::from_group(date, articles))
        .collect()
}

/// Daily aggregates plus their rolling means, projected onto `[start, end]`.
///
/// Rolling windows run over article-days only; days without coverage are not
/// members of any window.
pub fn sentiment_frame(
    groups: &ArticleGroups,
    start: NaiveDate,
    end: NaiveDate,
    window_sizes: &[usize],
) -> PipelineResult<ComponentFrame> {
    let daily = aggregate_daily(groups);
    let dates: Vec<NaiveDate> = daily.iter().map(|d| d.date).collect();

    let mut frame = ComponentFrame::new("sentiment");
    let mut push = |name: &str, values: Vec<Option<f64>>| -> PipelineResult<()> {
        let observations = dates
            .iter()
            .zip(values)
            .filter_map(|(d, v)| v.map(|v| (*d, v)));
        frame.push(name, calendar::normalize(observations, start, end)?);
        Ok(())
    };

    push(
        ANALYZED_BPE_TOKENS,
        daily.iter().map(|d| Some(d.analyzed_bpe_tokens as f64)).collect(),
    )?;
    let sentiment: Vec<Option<f64>> = daily.iter().map(|d| d.weighted_sentiment).collect();
    push(WEIGHTED_SENTIMENT, sentiment.clone())?;
    push(WEIGHTED_ERROR, daily.iter().map(|d| d.weighted_error).collect())?;
    push(
        ANALYZED_NAIVE_TOKENS,
        daily.iter().map(|d| Some(d.analyzed_naive_tokens as f64)).collect(),
    )?;
    push(
        DAILY_NAIVE_TOKEN_SUM,
        daily.iter().map(|d| d.daily_naive_token_sum.map(|v| v as f64)).collect(),
    )?;
    push(
        ANALYZED_ARTICLE_COUNT,
        daily.iter().map(|d| Some(d.analyzed_article_count as f64)).collect(),
    )?;
    push(
        DAILY_ARTICLE_COUNT,
        daily.iter().map(|d| d.daily_article_count.map(|v| v as f64)).collect(),
    )?;
    for w in window_sizes {
        push(&sentiment_rolling_mean(*w), rolling_mean(&sentiment, *w))?;
    }

    tracing::debug!(article_days = daily.len(), "Sentiment aggregated");
    Ok(frame)
}

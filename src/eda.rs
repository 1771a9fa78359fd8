use serde::Serialize;

use crate::error::PipelineResult;
use crate::schema::{ANALYZED_ARTICLE_COUNT, ANALYZED_BPE_TOKENS, CLOSE, TARGET, WEIGHTED_SENTIMENT};
use crate::table::FeatureTable;

/// Per-company overview of a merged feature table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompanySummary {
    pub company: String,
    pub lowest_price: Option<f64>,
    pub highest_price: Option<f64>,
    pub average_price: Option<f64>,
    pub lowest_sentiment: Option<f64>,
    pub highest_sentiment: Option<f64>,
    pub average_sentiment: Option<f64>,
    pub articles_analyzed: u64,
    pub analyzed_bpe_tokens: u64,
    /// Shares of labeled days; `None` when no day is labeled.
    pub buy_percentage: Option<f64>,
    pub sell_percentage: Option<f64>,
}

#[derive(Debug, Default)]
struct Stats {
    min: Option<f64>,
    max: Option<f64>,
    sum: f64,
    n: usize,
}

impl Stats {
    fn of(values: &[Option<f64>]) -> Self {
        values.iter().flatten().fold(Self::default(), |mut s, v| {
            s.min = Some(s.min.map_or(*v, |m| m.min(*v)));
            s.max = Some(s.max.map_or(*v, |m| m.max(*v)));
            s.sum += v;
            s.n += 1;
            s
        })
    }

    fn mean(&self) -> Option<f64> {
        (self.n > 0).then(|| self.sum / self.n as f64)
    }
}

fn total(values: &[Option<f64>]) -> u64 {
    values.iter().flatten().sum::<f64>().round() as u64
}

pub fn summarize(table: &FeatureTable) -> PipelineResult<CompanySummary> {
    let price = Stats::of(table.column(CLOSE)?);
    let sentiment = Stats::of(table.column(WEIGHTED_SENTIMENT)?);

    let labeled: Vec<f64> = table.column(TARGET)?.iter().flatten().copied().collect();
    let buys = labeled.iter().filter(|t| **t > 0.5).count();
    let share = |count: usize| (!labeled.is_empty()).then(|| count as f64 / labeled.len() as f64);

    Ok(CompanySummary {
        company: table.company().to_string(),
        lowest_price: price.min,
        highest_price: price.max,
        average_price: price.mean(),
        lowest_sentiment: sentiment.min,
        highest_sentiment: sentiment.max,
        average_sentiment: sentiment.mean(),
        articles_analyzed: total(table.column(ANALYZED_ARTICLE_COUNT)?),
        analyzed_bpe_tokens: total(table.column(ANALYZED_BPE_TOKENS)?),
        buy_percentage: share(buys),
        sell_percentage: share(labeled.len() - buys),
    })
}

fn cell(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.4}", v))
}

/// Fixed-width text table, one line per company.
pub fn render_table(summaries: &[CompanySummary]) -> String {
    let mut out = format!(
        "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>9} {:>12} {:>8} {:>8}\n",
        "company",
        "low",
        "high",
        "avg",
        "sent_min",
        "sent_max",
        "sent_avg",
        "articles",
        "bpe_tokens",
        "buy",
        "sell"
    );
    for s in summaries {
        out.push_str(&format!(
            "{:<8} {:>10} {:>10} {:>10} {:>10} {:>10} {:>10} {:>9} {:>12} {:>8} {:>8}\n",
            s.company,
            cell(s.lowest_price),
            cell(s.highest_price),
            cell(s.average_price),
            cell(s.lowest_sentiment),
            cell(s.highest_sentiment),
            cell(s.average_sentiment),
            s.articles_analyzed,
            s.analyzed_bpe_tokens,
            cell(s.buy_percentage),
            cell(s.sell_percentage),
        ));
    }
    out
}

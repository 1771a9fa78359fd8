use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::macro_indicators::INDICATOR_SERIES;

pub const TARGET: &str = "target";
pub const TARGET_PRICE: &str = "target_price";
pub const CLOSE: &str = "close";
pub const ORDINAL_INDEX: &str = "index";

pub const ANALYZED_BPE_TOKENS: &str = "analyzed_bpe_tokens";
pub const WEIGHTED_SENTIMENT: &str = "weighted_sentiment";
pub const WEIGHTED_ERROR: &str = "weighted_error";
pub const ANALYZED_NAIVE_TOKENS: &str = "analyzed_naive_tokens";
pub const DAILY_NAIVE_TOKEN_SUM: &str = "daily_naive_token_sum";
pub const ANALYZED_ARTICLE_COUNT: &str = "analyzed_article_count";
pub const DAILY_ARTICLE_COUNT: &str = "daily_article_count";

pub const PRICE_FIELDS: [&str; 7] = [
    "open",
    "high",
    "low",
    CLOSE,
    "volume",
    "dividends",
    "stock_splits",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ColumnKind {
    /// Activity counts: articles, tokens.
    Count,
    /// Daily sentiment scalars where "no articles" reads as neutral.
    Score,
    SentimentRolling,
    Indicator,
    Price,
    Rolling,
    Target,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FillPolicy {
    Zero,
    ForwardFill,
    Absent,
}

impl ColumnKind {
    pub fn fill_policy(self) -> FillPolicy {
        match self {
            Self::Count | Self::Score => FillPolicy::Zero,
            Self::Indicator => FillPolicy::ForwardFill,
            Self::SentimentRolling | Self::Price | Self::Rolling | Self::Target => {
                FillPolicy::Absent
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnSpec {
    pub name: String,
    pub kind: ColumnKind,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }

    pub fn fill_policy(&self) -> FillPolicy {
        self.kind.fill_policy()
    }

    pub fn is_target(&self) -> bool {
        self.kind == ColumnKind::Target
    }
}

pub fn sentiment_rolling_mean(window: usize) -> String {
    format!("sentiment_{}d_rolling_mean", window)
}

pub fn price_rolling_mean(window: usize) -> String {
    format!("price_{}d_rolling_mean", window)
}

pub fn price_rolling_std(window: usize) -> String {
    format!("price_{}d_rolling_std", window)
}

pub fn volume_rolling_mean(window: usize) -> String {
    format!("volume_{}d_rolling_mean", window)
}

pub fn volume_rolling_std(window: usize) -> String {
    format!("volume_{}d_rolling_std", window)
}

pub fn bollinger_upper(window: usize) -> String {
    format!("bollinger_{}d_upper_band", window)
}

pub fn bollinger_lower(window: usize) -> String {
    format!("bollinger_{}d_lower_band", window)
}

/// Ordered column contract shared by every company's feature table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSpec>,
}

impl Schema {
    pub fn canonical(window_sizes: &[usize]) -> Self {
        let mut columns = vec![
            ColumnSpec::new(ANALYZED_BPE_TOKENS, ColumnKind::Count),
            ColumnSpec::new(WEIGHTED_SENTIMENT, ColumnKind::Score),
            ColumnSpec::new(WEIGHTED_ERROR, ColumnKind::Score),
            ColumnSpec::new(ANALYZED_NAIVE_TOKENS, ColumnKind::Count),
            ColumnSpec::new(DAILY_NAIVE_TOKEN_SUM, ColumnKind::Count),
            ColumnSpec::new(ANALYZED_ARTICLE_COUNT, ColumnKind::Count),
            ColumnSpec::new(DAILY_ARTICLE_COUNT, ColumnKind::Count),
        ];
        for w in window_sizes {
            columns.push(ColumnSpec::new(
                sentiment_rolling_mean(*w),
                ColumnKind::SentimentRolling,
            ));
        }
        for series in INDICATOR_SERIES {
            columns.push(ColumnSpec::new(series, ColumnKind::Indicator));
        }
        for field in PRICE_FIELDS {
            columns.push(ColumnSpec::new(field, ColumnKind::Price));
        }
        for w in window_sizes {
            for name in [
                price_rolling_mean(*w),
                price_rolling_std(*w),
                volume_rolling_mean(*w),
                volume_rolling_std(*w),
                bollinger_upper(*w),
                bollinger_lower(*w),
            ] {
                columns.push(ColumnSpec::new(name, ColumnKind::Rolling));
            }
        }
        columns.push(ColumnSpec::new(TARGET, ColumnKind::Target));
        columns.push(ColumnSpec::new(TARGET_PRICE, ColumnKind::Target));
        Self { columns }
    }

    pub fn from_columns(columns: Vec<ColumnSpec>) -> PipelineResult<Self> {
        for (i, c) in columns.iter().enumerate() {
            if columns[..i].iter().any(|p| p.name == c.name) {
                return Err(PipelineError::InvalidConfig(format!(
                    "duplicate schema column {}",
                    c.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn spec(&self, name: &str) -> Option<&ColumnSpec> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn require(&self, name: &str) -> PipelineResult<usize> {
        self.position(name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    /// Fail fast when a produced column set drifts from the contract.
    pub fn check_names<'a, I>(&self, produced: I) -> PipelineResult<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let produced: Vec<&str> = produced.into_iter().collect();
        if let Some(extra) = produced.iter().find(|n| self.position(n).is_none()) {
            return Err(PipelineError::UnexpectedColumn((*extra).to_string()));
        }
        if let Some(missing) = self.names().find(|n| !produced.contains(n)) {
            return Err(PipelineError::MissingColumn(missing.to_string()));
        }
        Ok(())
    }

    /// Same columns in the same order. A stored table built under other
    /// window sizes fails here.
    pub fn check_matches(&self, other: &Schema) -> PipelineResult<()> {
        self.check_names(other.names())?;
        if let Some((position, (expected, found))) = self
            .names()
            .zip(other.names())
            .enumerate()
            .find(|(_, (e, f))| e != f)
        {
            return Err(PipelineError::ColumnOrder {
                position,
                expected: expected.to_string(),
                found: found.to_string(),
            });
        }
        Ok(())
    }
}

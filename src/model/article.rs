use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One analyzed news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub date: NaiveDate,
    /// Whitespace-delimited token count.
    pub tokens: u64,
    /// Overall sentiment in [-1, 1].
    pub text_sentiment: f64,
    /// Weighted inverse error of the classification; higher is more confident.
    pub text_error: f64,
    /// Byte-pair-encoded tokens the sentiment model actually saw.
    pub text_input_tokens: u64,
    /// Articles available in the corpus for that day, analyzed or not.
    pub daily_article_count: u64,
    /// Naive tokens available in the corpus for that day.
    pub daily_token_sum: u64,
}

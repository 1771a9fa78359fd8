use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One daily record from the price provider. `close` is absent on days the
/// provider emitted a row without a settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
    pub dividends: Option<f64>,
    pub stock_splits: Option<f64>,
}

impl PriceBar {
    /// A bar with only a close, as produced by synthetic fixtures.
    pub fn from_close(date: NaiveDate, close: f64) -> Self {
        Self {
            date,
            open: Some(close),
            high: Some(close),
            low: Some(close),
            close: Some(close),
            volume: Some(0.0),
            dividends: Some(0.0),
            stock_splits: Some(0.0),
        }
    }

    pub fn is_trading_day(&self) -> bool {
        self.close.is_some()
    }

    /// Raw fields in `PRICE_FIELDS` order.
    pub fn fields(&self) -> [Option<f64>; 7] {
        [
            self.open,
            self.high,
            self.low,
            self.close,
            self.volume,
            self.dividends,
            self.stock_splits,
        ]
    }
}

use chrono::NaiveDate;

use crate::model::price_bar::PriceBar;

/// Trading-day-only view of a price series: one bar per date, every bar with
/// a close, dates strictly ascending.
///
/// Built only from provider bars, never from a calendar-projected series, so
/// "the next row" always means the next trading day.
#[derive(Debug, Clone, PartialEq)]
pub struct TradingDays {
    bars: Vec<PriceBar>,
}

impl TradingDays {
    pub fn from_bars<I>(bars: I) -> Self
    where
        I: IntoIterator<Item = PriceBar>,
    {
        let mut bars: Vec<PriceBar> = bars.into_iter().filter(PriceBar::is_trading_day).collect();
        // stable: among equal dates the later input stays last
        bars.sort_by_key(|b| b.date);
        let mut deduped: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match deduped.last_mut() {
                Some(last) if last.date == bar.date => {
                    tracing::warn!(date = %bar.date, "Duplicate trading day, keeping the later bar");
                    *last = bar;
                }
                _ => deduped.push(bar),
            }
        }
        Self { bars: deduped }
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.iter().map(|b| b.date)
    }

    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().filter_map(|b| b.close).collect()
    }

    pub fn volumes(&self) -> Vec<Option<f64>> {
        self.bars.iter().map(|b| b.volume).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetPair {
    /// 1 when the next trading close is strictly higher, else 0.
    pub target: u8,
    pub target_price: f64,
}

/// Next-trading-day labels aligned with `days`. The last trading day has no
/// successor and stays unlabeled.
pub fn label_next_day(days: &TradingDays) -> Vec<Option<TargetPair>> {
    let closes = days.closes();
    let mut labels: Vec<Option<TargetPair>> = closes
        .windows(2)
        .map(|w| {
            Some(TargetPair {
                target: u8::from(w[1] > w[0]),
                target_price: w[1],
            })
        })
        .collect();
    if !closes.is_empty() {
        labels.push(None);
    }
    labels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: Option<f64>) -> PriceBar {
        let mut b = PriceBar::from_close(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), 0.0);
        b.close = close;
        b
    }

    #[test]
    fn drops_days_without_close_and_sorts() {
        let days = TradingDays::from_bars(vec![
            bar(3, Some(12.0)),
            bar(1, Some(10.0)),
            bar(2, None),
        ]);
        assert_eq!(days.closes(), vec![10.0, 12.0]);
    }

    #[test]
    fn ties_label_as_sell_and_last_day_is_unlabeled() {
        let days = TradingDays::from_bars(vec![
            bar(1, Some(10.0)),
            bar(2, Some(10.0)),
            bar(3, Some(11.0)),
        ]);
        let labels = label_next_day(&days);
        assert_eq!(labels.len(), 3);
        assert_eq!(labels[0].unwrap().target, 0);
        assert_eq!(labels[1].unwrap().target, 1);
        assert!((labels[1].unwrap().target_price - 11.0).abs() < f64::EPSILON);
        assert_eq!(labels[2], None);
    }

    #[test]
    fn empty_series_has_no_labels() {
        assert!(label_next_day(&TradingDays::from_bars(Vec::new())).is_empty());
    }
}

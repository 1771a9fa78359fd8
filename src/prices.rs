use chrono::NaiveDate;

use crate::calendar;
use crate::error::PipelineResult;
use crate::indicator::rolling::{bollinger_bands, rolling_stats, RollingStat, BOLLINGER_STD_MULT};
use crate::labeler::{label_next_day, TradingDays};
use crate::merge::ComponentFrame;
use crate::model::price_bar::PriceBar;
use crate::schema::{
    bollinger_lower, bollinger_upper, price_rolling_mean, price_rolling_std, volume_rolling_mean,
    volume_rolling_std, PRICE_FIELDS, TARGET, TARGET_PRICE,
};

/// Rolling close/volume statistics for one window, aligned with trading days.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowFeatures {
    pub window: usize,
    pub price_mean: Vec<Option<f64>>,
    pub price_std: Vec<Option<f64>>,
    pub volume_mean: Vec<Option<f64>>,
    pub volume_std: Vec<Option<f64>>,
    pub upper_band: Vec<Option<f64>>,
    pub lower_band: Vec<Option<f64>>,
}

/// Statistics over the last `window` trading-day observations. Calendar gaps
/// never enter a window.
pub fn window_features(days: &TradingDays, window: usize) -> WindowFeatures {
    let closes: Vec<Option<f64>> = days.closes().into_iter().map(Some).collect();
    let price = rolling_stats(&closes, window);
    let volume = rolling_stats(&days.volumes(), window);

    let mean = |s: &[Option<RollingStat>]| -> Vec<Option<f64>> {
        s.iter().map(|s| s.map(|s| s.mean)).collect()
    };
    let std = |s: &[Option<RollingStat>]| -> Vec<Option<f64>> {
        s.iter().map(|s| s.and_then(|s| s.std)).collect()
    };
    let bands: Vec<_> = price
        .iter()
        .map(|s| s.as_ref().and_then(|s| bollinger_bands(s, BOLLINGER_STD_MULT)))
        .collect();

    WindowFeatures {
        window,
        price_mean: mean(&price),
        price_std: std(&price),
        volume_mean: mean(&volume),
        volume_std: std(&volume),
        upper_band: bands.iter().map(|b| b.map(|b| b.upper)).collect(),
        lower_band: bands.iter().map(|b| b.map(|b| b.lower)).collect(),
    }
}

/// Raw price fields, trading-day rolling statistics and next-day targets,
/// projected onto `[start, end]`.
///
/// Rolling values and targets are computed on the trading-day view first and
/// only then re-expressed on the calendar, so non-trading days carry none.
pub fn price_frame(
    bars: &[PriceBar],
    start: NaiveDate,
    end: NaiveDate,
    window_sizes: &[usize],
) -> PipelineResult<ComponentFrame> {
    let mut frame = ComponentFrame::new("prices");

    for (i, field) in PRICE_FIELDS.iter().enumerate() {
        let observations = bars
            .iter()
            .filter_map(|b| b.fields()[i].map(|v| (b.date, v)));
        frame.push(*field, calendar::normalize(observations, start, end)?);
    }

    let days = TradingDays::from_bars(bars.iter().cloned());
    let dates: Vec<NaiveDate> = days.dates().collect();
    let mut push = |name: String, values: &[Option<f64>]| -> PipelineResult<()> {
        let observations = dates
            .iter()
            .zip(values)
            .filter_map(|(d, v)| v.map(|v| (*d, v)));
        frame.push(name, calendar::normalize(observations, start, end)?);
        Ok(())
    };

    for w in window_sizes {
        let f = window_features(&days, *w);
        push(price_rolling_mean(*w), &f.price_mean)?;
        push(price_rolling_std(*w), &f.price_std)?;
        push(volume_rolling_mean(*w), &f.volume_mean)?;
        push(volume_rolling_std(*w), &f.volume_std)?;
        push(bollinger_upper(*w), &f.upper_band)?;
        push(bollinger_lower(*w), &f.lower_band)?;
    }

    let labels = label_next_day(&days);
    let targets: Vec<Option<f64>> = labels.iter().map(|l| l.map(|l| f64::from(l.target))).collect();
    let target_prices: Vec<Option<f64>> = labels.iter().map(|l| l.map(|l| l.target_price)).collect();
    push(TARGET.to_string(), &targets)?;
    push(TARGET_PRICE.to_string(), &target_prices)?;

    tracing::debug!(bars = bars.len(), trading_days = days.len(), "Price features built");
    Ok(frame)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn std_is_sample_std_and_bands_use_it() {
        let d = |day: u32| NaiveDate::from_ymd_opt(2024, 1, day).unwrap();
        let days = TradingDays::from_bars(vec![
            PriceBar::from_close(d(2), 1.0),
            PriceBar::from_close(d(3), 2.0),
            PriceBar::from_close(d(4), 3.0),
        ]);
        let f = window_features(&days, 3);
        assert_eq!(f.price_mean[..2], [None, None]);
        assert!((f.price_std[2].unwrap() - 1.0).abs() < 1e-12);
        assert!((f.upper_band[2].unwrap() - 4.0).abs() < 1e-12);
        assert!((f.lower_band[2].unwrap() - 0.0).abs() < 1e-12);
        assert_eq!(f.volume_std[2], Some(0.0));
    }
}

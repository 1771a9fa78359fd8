use chrono::NaiveDate;

use crate::calendar::{self, DailySeries};
use crate::error::PipelineResult;
use crate::merge::ComponentFrame;

/// FRED series carried as features. Most are monthly or quarterly.
pub const INDICATOR_SERIES: [&str; 8] = [
    "CPIAUCSL",
    "PCE",
    "PPIACO",
    "ECIALLCIV",
    "GDPDEF",
    "UNRATE",
    "MCUMFN",
    "SP500",
];

#[derive(Debug, Clone, PartialEq)]
pub struct IndicatorObservation {
    pub series: String,
    pub date: NaiveDate,
    pub value: f64,
}

/// Sparse observations grouped per series, exactly as reported.
#[derive(Debug, Clone, Default)]
pub struct IndicatorSet {
    observations: Vec<IndicatorObservation>,
}

impl IndicatorSet {
    pub fn new(observations: Vec<IndicatorObservation>) -> Self {
        Self { observations }
    }

    pub fn push(&mut self, series: &str, date: NaiveDate, value: f64) {
        self.observations.push(IndicatorObservation {
            series: series.to_string(),
            date,
            value,
        });
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn series(&self, name: &str) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        let name = name.to_string();
        self.observations
            .iter()
            .filter(move |o| o.series == name)
            .map(|o| (o.date, o.value))
    }

    /// Latest observation strictly before `start`, if any.
    pub fn last_before(&self, name: &str, start: NaiveDate) -> Option<f64> {
        self.series(name)
            .filter(|(date, _)| *date < start)
            .max_by_key(|(date, _)| *date)
            .map(|(_, value)| value)
    }

    /// Calendar-normalized frame; gaps stay absent until the merger forward-fills.
    /// A series without an observation on `start` is seeded there with its
    /// latest earlier value, so slow series are known from the first day.
    pub fn to_frame(&self, start: NaiveDate, end: NaiveDate) -> PipelineResult<ComponentFrame> {
        let unknown = self
            .observations
            .iter()
            .filter(|o| !INDICATOR_SERIES.contains(&o.series.as_str()))
            .count();
        if unknown > 0 {
            tracing::debug!(unknown, "Ignoring observations for series outside the indicator list");
        }

        let mut frame = ComponentFrame::new("indicators");
        for series in INDICATOR_SERIES {
            let observed_on_start = self.series(series).any(|(date, _)| date == start);
            let seed = if observed_on_start {
                None
            } else {
                self.last_before(series, start).map(|value| (start, value))
            };
            let daily: DailySeries<f64> =
                calendar::normalize(seed.into_iter().chain(self.series(series)), start, end)?;
            tracing::debug!(series, observed = daily.observed_count(), "Indicator normalized");
            frame.push(series, daily);
        }
        Ok(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_has_every_series_and_keeps_gaps() {
        let d = |m: u32, day: u32| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let mut set = IndicatorSet::default();
        set.push("UNRATE", d(1, 1), 3.7);
        set.push("UNRATE", d(2, 1), 3.9);
        set.push("NOT_A_SERIES", d(1, 1), 1.0);

        let frame = set.to_frame(d(1, 1), d(2, 3)).unwrap();
        assert_eq!(frame.columns().len(), INDICATOR_SERIES.len());
        let unrate = frame.column("UNRATE").unwrap();
        assert_eq!(unrate.get(d(1, 1)), Some(&3.7));
        assert_eq!(unrate.get(d(1, 15)), None);
        assert_eq!(unrate.get(d(2, 1)), Some(&3.9));
        assert_eq!(frame.column("SP500").unwrap().observed_count(), 0);
    }

    #[test]
    fn earlier_observation_seeds_the_first_day() {
        let d = |m: u32, day: u32| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let mut set = IndicatorSet::default();
        set.push("GDPDEF", d(1, 1), 120.0);
        set.push("GDPDEF", d(1, 20), 121.0);
        set.push("GDPDEF", d(2, 10), 122.0);
        set.push("UNRATE", d(1, 15), 3.7);
        set.push("UNRATE", d(2, 1), 3.9);

        let frame = set.to_frame(d(2, 1), d(2, 12)).unwrap();
        let gdp = frame.column("GDPDEF").unwrap();
        assert_eq!(gdp.get(d(2, 1)), Some(&121.0));
        assert_eq!(gdp.get(d(2, 2)), None);
        assert_eq!(gdp.get(d(2, 10)), Some(&122.0));
        // an observation on the first day wins over the seed
        assert_eq!(frame.column("UNRATE").unwrap().get(d(2, 1)), Some(&3.9));
        assert_eq!(frame.column("SP500").unwrap().observed_count(), 0);
    }
}

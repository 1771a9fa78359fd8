use std::collections::VecDeque;

pub const BOLLINGER_STD_MULT: f64 = 2.0;

/// Fixed-length window over the most recent observations.
///
/// A statistic is only reported once `period` observations have been pushed and
/// none of them is absent.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    period: usize,
    buffer: VecDeque<Option<f64>>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RollingStat {
    pub mean: f64,
    /// Sample standard deviation (n - 1); absent for a one-observation window.
    pub std: Option<f64>,
}

impl RollingWindow {
    pub fn new(period: usize) -> Self {
        assert!(period > 0, "rolling period must be > 0");
        Self {
            period,
            buffer: VecDeque::with_capacity(period),
        }
    }

    /// Push the next observation, return the statistic over the current window.
    pub fn push(&mut self, value: Option<f64>) -> Option<RollingStat> {
        if self.buffer.len() == self.period {
            let _ = self.buffer.pop_front();
        }
        self.buffer.push_back(value);
        self.value()
    }

    pub fn value(&self) -> Option<RollingStat> {
        if !self.is_ready() {
            return None;
        }
        let mut window = Vec::with_capacity(self.period);
        for v in &self.buffer {
            window.push((*v)?);
        }
        let n = window.len() as f64;
        let mean = window.iter().sum::<f64>() / n;
        let std = if window.len() > 1 {
            let ss = window
                .iter()
                .map(|x| {
                    let d = x - mean;
                    d * d
                })
                .sum::<f64>();
            Some((ss / (n - 1.0)).sqrt())
        } else {
            None
        };
        Some(RollingStat { mean, std })
    }

    pub fn is_ready(&self) -> bool {
        self.buffer.len() >= self.period
    }

    pub fn period(&self) -> usize {
        self.period
    }
}

/// Rolling statistics aligned one-to-one with `values`.
pub fn rolling_stats(values: &[Option<f64>], period: usize) -> Vec<Option<RollingStat>> {
    let mut window = RollingWindow::new(period);
    values.iter().map(|v| window.push(*v)).collect()
}

pub fn rolling_mean(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_stats(values, period)
        .into_iter()
        .map(|s| s.map(|s| s.mean))
        .collect()
}

pub fn rolling_std(values: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    rolling_stats(values, period)
        .into_iter()
        .map(|s| s.and_then(|s| s.std))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub lower: f64,
}

pub fn bollinger_bands(stat: &RollingStat, std_mult: f64) -> Option<BollingerBands> {
    let std = stat.std?;
    Some(BollingerBands {
        upper: stat.mean + std_mult * std,
        lower: stat.mean - std_mult * std,
    })
}

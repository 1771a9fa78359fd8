use chrono::{Duration, NaiveDate};

use crate::error::{PipelineError, PipelineResult};

/// One slot per calendar day in `[start, end]`; `None` marks a day with no observation.
#[derive(Debug, Clone, PartialEq)]
pub struct DailySeries<T> {
    start: NaiveDate,
    end: NaiveDate,
    values: Vec<Option<T>>,
}

pub fn check_range(start: NaiveDate, end: NaiveDate) -> PipelineResult<()> {
    if start > end {
        return Err(PipelineError::InvalidRange { start, end });
    }
    Ok(())
}

/// Every calendar day from `start` to `end`, inclusive.
pub fn date_range(start: NaiveDate, end: NaiveDate) -> PipelineResult<Vec<NaiveDate>> {
    check_range(start, end)?;
    Ok(start.iter_days().take_while(|d| *d <= end).collect())
}

/// Project a sparse series onto the full calendar. Values are never filled here.
///
/// Observations outside the range are dropped. When a date repeats, the later
/// observation replaces the earlier one.
pub fn normalize<T, I>(observations: I, start: NaiveDate, end: NaiveDate) -> PipelineResult<DailySeries<T>>
where
    I: IntoIterator<Item = (NaiveDate, T)>,
{
    check_range(start, end)?;
    let len = (end - start).num_days() as usize + 1;
    let mut values: Vec<Option<T>> = Vec::with_capacity(len);
    values.resize_with(len, || None);

    let mut dropped = 0usize;
    for (date, value) in observations {
        if date < start || date > end {
            dropped += 1;
            continue;
        }
        let idx = (date - start).num_days() as usize;
        if values[idx].is_some() {
            tracing::warn!(date = %date, "Duplicate observation, keeping the later value");
        }
        values[idx] = Some(value);
    }
    if dropped > 0 {
        tracing::debug!(dropped, %start, %end, "Observations outside calendar range dropped");
    }

    Ok(DailySeries { start, end, values })
}

impl<T> DailySeries<T> {
    /// A series over the range with no observations at all.
    pub fn empty(start: NaiveDate, end: NaiveDate) -> PipelineResult<Self> {
        normalize(std::iter::empty(), start, end)
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        if date < self.start || date > self.end {
            return None;
        }
        Some((date - self.start).num_days() as usize)
    }

    pub fn date_at(&self, idx: usize) -> NaiveDate {
        self.start + Duration::days(idx as i64)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&T> {
        self.index_of(date).and_then(|i| self.values[i].as_ref())
    }

    pub fn values(&self) -> &[Option<T>] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Option<T>> {
        self.values
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        (0..self.values.len()).map(move |i| self.date_at(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, Option<&T>)> + '_ {
        self.values
            .iter()
            .enumerate()
            .map(move |(i, v)| (self.date_at(i), v.as_ref()))
    }

    /// Only the days that carry an observation, in date order.
    pub fn observations(&self) -> impl Iterator<Item = (NaiveDate, &T)> + '_ {
        self.iter().filter_map(|(d, v)| v.map(|v| (d, v)))
    }

    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_some()).count()
    }

    pub fn map<U, F: FnMut(&T) -> U>(&self, mut f: F) -> DailySeries<U> {
        DailySeries {
            start: self.start,
            end: self.end,
            values: self.values.iter().map(|v| v.as_ref().map(&mut f)).collect(),
        }
    }
}

impl<T: Clone> DailySeries<T> {
    /// Re-express this series on another calendar range by exact date match.
    pub fn reproject(&self, start: NaiveDate, end: NaiveDate) -> PipelineResult<Self> {
        normalize(self.observations().map(|(d, v)| (d, v.clone())), start, end)
    }
}

use chrono::NaiveDate;

use crate::calendar::{self, DailySeries};
use crate::error::{PipelineError, PipelineResult};
use crate::schema::{FillPolicy, Schema};
use crate::table::FeatureTable;

/// Named daily columns produced by one source (sentiment, indicators, prices).
#[derive(Debug, Clone)]
pub struct ComponentFrame {
    name: &'static str,
    columns: Vec<(String, DailySeries<f64>)>,
}

impl ComponentFrame {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            columns: Vec::new(),
        }
    }

    pub fn push(&mut self, column: impl Into<String>, series: DailySeries<f64>) {
        self.columns.push((column.into(), series));
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn columns(&self) -> &[(String, DailySeries<f64>)] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&DailySeries<f64>> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, s)| s)
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

/// Left-join every component onto a blank `[start, end]` calendar, then apply
/// each column's fill policy. Output columns follow schema order.
pub fn merge_components(
    company: &str,
    schema: &Schema,
    start: NaiveDate,
    end: NaiveDate,
    frames: &[ComponentFrame],
) -> PipelineResult<FeatureTable> {
    let skeleton = calendar::date_range(start, end)?;
    schema.check_names(frames.iter().flat_map(|f| f.column_names()))?;

    let mut slots: Vec<Option<Vec<Option<f64>>>> = vec![None; schema.len()];
    for frame in frames {
        for (name, series) in frame.columns() {
            let idx = schema
                .position(name)
                .ok_or_else(|| PipelineError::UnexpectedColumn(name.clone()))?;
            if slots[idx].is_some() {
                tracing::warn!(frame = frame.name(), column = %name, "Column produced by more than one component");
                return Err(PipelineError::UnexpectedColumn(name.clone()));
            }
            // exact date match only
            let joined = series.reproject(start, end)?;
            slots[idx] = Some(joined.into_values());
        }
    }

    let mut columns = Vec::with_capacity(schema.len());
    for (spec, slot) in schema.columns().iter().zip(slots) {
        let mut values = slot.ok_or_else(|| PipelineError::MissingColumn(spec.name.clone()))?;
        apply_fill(&mut values, spec.fill_policy());
        columns.push(values);
    }

    let table = FeatureTable::new(company, schema.clone(), skeleton, columns)?;
    tracing::debug!(company, rows = table.len(), components = frames.len(), "Components merged");
    Ok(table)
}

pub fn apply_fill(values: &mut [Option<f64>], policy: FillPolicy) {
    match policy {
        FillPolicy::Zero => {
            for v in values.iter_mut() {
                v.get_or_insert(0.0);
            }
        }
        FillPolicy::ForwardFill => {
            let mut last = None;
            for v in values.iter_mut() {
                match v {
                    Some(x) => last = Some(*x),
                    None => *v = last,
                }
            }
        }
        FillPolicy::Absent => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_policies() {
        let mut zero = vec![None, Some(2.0), None];
        apply_fill(&mut zero, FillPolicy::Zero);
        assert_eq!(zero, vec![Some(0.0), Some(2.0), Some(0.0)]);

        let mut ffill = vec![None, Some(2.0), None, None, Some(3.0), None];
        apply_fill(&mut ffill, FillPolicy::ForwardFill);
        assert_eq!(
            ffill,
            vec![None, Some(2.0), Some(2.0), Some(2.0), Some(3.0), Some(3.0)]
        );

        let mut absent = vec![None, Some(2.0)];
        apply_fill(&mut absent, FillPolicy::Absent);
        assert_eq!(absent, vec![None, Some(2.0)]);
    }
}

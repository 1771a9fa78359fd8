use chrono::NaiveDate;

use crate::error::{ensure_same_len, PipelineError, PipelineResult};
use crate::schema::{Schema, CLOSE};

/// Per-company daily feature table, columns in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    company: String,
    schema: Schema,
    dates: Vec<NaiveDate>,
    columns: Vec<Vec<Option<f64>>>,
}

impl FeatureTable {
    pub fn new(
        company: impl Into<String>,
        schema: Schema,
        dates: Vec<NaiveDate>,
        columns: Vec<Vec<Option<f64>>>,
    ) -> PipelineResult<Self> {
        ensure_same_len("schema", schema.len(), "columns", columns.len())?;
        for column in &columns {
            ensure_same_len("dates", dates.len(), "column", column.len())?;
        }
        if let Some(pair) = dates.windows(2).find(|w| w[0] >= w[1]) {
            return Err(PipelineError::InvalidRange {
                start: pair[0],
                end: pair[1],
            });
        }
        Ok(Self {
            company: company.into(),
            schema,
            dates,
            columns,
        })
    }

    pub fn company(&self) -> &str {
        &self.company
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn column(&self, name: &str) -> PipelineResult<&[Option<f64>]> {
        let idx = self.schema.require(name)?;
        Ok(&self.columns[idx])
    }

    pub fn column_at(&self, idx: usize) -> &[Option<f64>] {
        &self.columns[idx]
    }

    pub fn value(&self, row: usize, name: &str) -> PipelineResult<Option<f64>> {
        Ok(self.column(name)?.get(row).copied().flatten())
    }

    pub fn row_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn row(&self, row: usize) -> Vec<Option<f64>> {
        self.columns.iter().map(|c| c[row]).collect()
    }

    /// Rows with a defined close.
    pub fn trading_rows(&self) -> PipelineResult<Vec<usize>> {
        let close = self.column(CLOSE)?;
        Ok(close
            .iter()
            .enumerate()
            .filter_map(|(i, v)| v.map(|_| i))
            .collect())
    }

    /// Copy of the table restricted to `rows`, which must be ascending.
    pub fn select_rows(&self, rows: &[usize]) -> PipelineResult<Self> {
        let dates = rows.iter().map(|r| self.dates[*r]).collect();
        let columns = self
            .columns
            .iter()
            .map(|c| rows.iter().map(|r| c[*r]).collect())
            .collect();
        Self::new(self.company.clone(), self.schema.clone(), dates, columns)
    }
}

/// Dense model input. Absent values are carried as `NaN`.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    feature_names: Vec<String>,
    rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub fn new(feature_names: Vec<String>, rows: Vec<Vec<f64>>) -> PipelineResult<Self> {
        for row in &rows {
            ensure_same_len("feature_names", feature_names.len(), "row", row.len())?;
        }
        Ok(Self {
            feature_names,
            rows,
        })
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn feature_index(&self, name: &str) -> PipelineResult<usize> {
        self.feature_names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| PipelineError::MissingColumn(name.to_string()))
    }

    pub fn column(&self, idx: usize) -> Vec<f64> {
        self.rows.iter().map(|r| r[idx]).collect()
    }

    /// Same matrix with column `idx` replaced by `values`.
    pub fn with_column(&self, idx: usize, values: &[f64]) -> Self {
        let rows = self
            .rows
            .iter()
            .zip(values)
            .map(|(row, v)| {
                let mut row = row.clone();
                row[idx] = *v;
                row
            })
            .collect();
        Self {
            feature_names: self.feature_names.clone(),
            rows,
        }
    }

    pub fn slice(&self, from: usize, to: usize) -> Self {
        Self {
            feature_names: self.feature_names.clone(),
            rows: self.rows[from..to].to_vec(),
        }
    }
}

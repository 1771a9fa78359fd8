use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_same_len, PipelineError, PipelineResult};
use crate::schema::{ORDINAL_INDEX, TARGET, TARGET_PRICE};
use crate::table::{FeatureMatrix, FeatureTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetKind {
    /// Next-day direction, 1 = buy, 0 = sell.
    Direction,
    /// Next-day close.
    Price,
}

impl TargetKind {
    pub fn column(self) -> &'static str {
        match self {
            Self::Direction => TARGET,
            Self::Price => TARGET_PRICE,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitOptions {
    pub fraction: f64,
    pub trading_days_only: bool,
    pub target: TargetKind,
    /// Drop rows where any feature is absent.
    pub complete_rows_only: bool,
    /// Prepend an `index` feature holding each row's position in the full table.
    pub ordinal_index: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            fraction: 0.8,
            trading_days_only: false,
            target: TargetKind::Direction,
            complete_rows_only: false,
            ordinal_index: false,
        }
    }
}

/// Rows of one side of a split, features and labels in lockstep.
#[derive(Debug, Clone, PartialEq)]
pub struct Partition {
    pub dates: Vec<NaiveDate>,
    pub features: FeatureMatrix,
    pub labels: Vec<f64>,
}

impl Partition {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Labels as classes; anything above one half is "buy".
    pub fn classes(&self) -> Vec<u8> {
        self.labels.iter().map(|v| u8::from(*v > 0.5)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SplitPair {
    pub dev: Partition,
    pub test: Partition,
}

/// `floor(fraction * n)`, the first test row.
pub fn cutoff(n: usize, fraction: f64) -> usize {
    ((n as f64) * fraction).floor() as usize
}

/// Chronological dev/test split of a date-sorted table. Never shuffles.
pub fn split_table(table: &FeatureTable, opts: &SplitOptions) -> PipelineResult<SplitPair> {
    let all = labeled_rows(table, opts)?;
    tracing::debug!(company = table.company(), rows = all.len(), "Temporal split");
    split_partition(all, opts.fraction)
}

/// Every usable row of the table, in date order, as one partition.
///
/// Target columns leave the feature matrix and become the label vector. Rows
/// whose selected target is undefined cannot be labeled and are removed here,
/// before any cutoff is computed.
pub fn labeled_rows(table: &FeatureTable, opts: &SplitOptions) -> PipelineResult<Partition> {
    let target = table.column(opts.target.column())?;
    let candidates: Vec<usize> = if opts.trading_days_only {
        table.trading_rows()?
    } else {
        (0..table.len()).collect()
    };

    let feature_idx: Vec<usize> = table
        .schema()
        .columns()
        .iter()
        .enumerate()
        .filter(|(_, c)| !c.is_target())
        .map(|(i, _)| i)
        .collect();
    let mut names: Vec<String> = Vec::with_capacity(feature_idx.len() + 1);
    if opts.ordinal_index {
        names.push(ORDINAL_INDEX.to_string());
    }
    names.extend(
        feature_idx
            .iter()
            .map(|i| table.schema().columns()[*i].name.clone()),
    );

    let mut dates = Vec::new();
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    let mut unlabeled = 0usize;
    let mut incomplete = 0usize;
    for r in candidates {
        let Some(label) = target[r] else {
            unlabeled += 1;
            continue;
        };
        let mut row = Vec::with_capacity(names.len());
        if opts.ordinal_index {
            row.push(r as f64);
        }
        row.extend(feature_idx.iter().map(|i| table.column_at(*i)[r].unwrap_or(f64::NAN)));
        if opts.complete_rows_only && row.iter().any(|v| v.is_nan()) {
            incomplete += 1;
            continue;
        }
        dates.push(table.dates()[r]);
        rows.push(row);
        labels.push(label);
    }
    if unlabeled > 0 || incomplete > 0 {
        tracing::debug!(company = table.company(), unlabeled, incomplete, "Rows left out of the modeling set");
    }

    Ok(Partition {
        dates,
        features: FeatureMatrix::new(names, rows)?,
        labels,
    })
}

/// Cut a date-ordered partition at `floor(fraction * n)`.
pub fn split_partition(all: Partition, fraction: f64) -> PipelineResult<SplitPair> {
    check_lockstep(&all)?;
    let n = all.len();
    if n < 2 {
        return Err(PipelineError::InsufficientData {
            what: "temporal split",
            needed: 2,
            got: n,
        });
    }
    let k = cutoff(n, fraction);
    let Partition {
        mut dates,
        features,
        mut labels,
    } = all;
    let test_dates = dates.split_off(k);
    let test_labels = labels.split_off(k);
    Ok(SplitPair {
        dev: Partition {
            dates,
            features: features.slice(0, k),
            labels,
        },
        test: Partition {
            dates: test_dates,
            features: features.slice(k, n),
            labels: test_labels,
        },
    })
}

pub fn check_lockstep(partition: &Partition) -> PipelineResult<()> {
    ensure_same_len("dates", partition.dates.len(), "labels", partition.labels.len())?;
    ensure_same_len(
        "features",
        partition.features.n_samples(),
        "labels",
        partition.labels.len(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cutoff_floors() {
        assert_eq!(cutoff(9, 0.8), 7);
        assert_eq!(cutoff(10, 0.8), 8);
        assert_eq!(cutoff(2, 0.8), 1);
    }
}

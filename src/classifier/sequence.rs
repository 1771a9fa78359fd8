use super::logistic::{LogisticConfig, LogisticRegression};
use super::{check_training_set, threshold, Classifier, ModelKind};
use crate::error::{PipelineError, PipelineResult};
use crate::split::Partition;
use crate::table::FeatureMatrix;

pub const DEFAULT_TIMESTEPS: usize = 30;

/// Turn date-ordered rows into look-back windows of `timesteps` rows, each
/// flattened step-major into one matrix row.
///
/// Window `i` covers rows `[i, i + timesteps)` and is labeled with row
/// `i + timesteps`; its date is that row's date.
pub fn window_partition(rows: &Partition, timesteps: usize) -> PipelineResult<Partition> {
    let n = rows.len();
    if timesteps == 0 || n <= timesteps {
        return Err(PipelineError::InsufficientData {
            what: "sequence windows",
            needed: timesteps + 1,
            got: n,
        });
    }

    let base = rows.features.feature_names();
    let names: Vec<String> = (0..timesteps)
        .flat_map(|step| {
            let lag = timesteps - step;
            base.iter().map(move |name| format!("{}_lag{}", name, lag))
        })
        .collect();

    let flat: Vec<Vec<f64>> = (0..n - timesteps)
        .map(|i| {
            rows.features.rows()[i..i + timesteps]
                .iter()
                .flat_map(|r| r.iter().copied())
                .collect()
        })
        .collect();

    Ok(Partition {
        dates: rows.dates[timesteps..].to_vec(),
        features: FeatureMatrix::new(names, flat)?,
        labels: rows.labels[timesteps..].to_vec(),
    })
}

/// Reassemble one flattened window into its `timesteps` rows.
pub fn reassemble(flat: &[f64], n_features: usize) -> Vec<&[f64]> {
    flat.chunks(n_features.max(1)).collect()
}

/// Sequence model over flattened windows. Each window is reassembled and
/// summarized per feature (last value, window mean, change over the window)
/// before reaching the inner model.
#[derive(Debug, Clone)]
pub struct SequenceClassifier {
    timesteps: usize,
    n_features: usize,
    inner: LogisticRegression,
}

impl SequenceClassifier {
    pub fn new(timesteps: usize, n_features: usize, config: LogisticConfig) -> Self {
        Self {
            timesteps,
            n_features,
            inner: LogisticRegression::new(config),
        }
    }

    pub fn timesteps(&self) -> usize {
        self.timesteps
    }

    fn summarize(&self, x: &FeatureMatrix) -> PipelineResult<Vec<Vec<f64>>> {
        if self.timesteps == 0 || self.n_features == 0 {
            return Err(PipelineError::InsufficientData {
                what: "sequence window",
                needed: 1,
                got: self.timesteps.min(self.n_features),
            });
        }
        let expected = self.timesteps * self.n_features;
        if x.n_features() != expected {
            return Err(PipelineError::LengthMismatch {
                left: "window width",
                left_len: expected,
                right: "matrix width",
                right_len: x.n_features(),
            });
        }
        Ok(x.rows()
            .iter()
            .map(|flat| {
                let steps = reassemble(flat, self.n_features);
                let first = steps[0];
                let last = steps[steps.len() - 1];
                let mut summary = Vec::with_capacity(self.n_features * 3);
                for j in 0..self.n_features {
                    let mean = steps.iter().map(|s| s[j]).sum::<f64>() / steps.len() as f64;
                    summary.push(last[j]);
                    summary.push(mean);
                    summary.push(last[j] - first[j]);
                }
                summary
            })
            .collect())
    }
}

impl Classifier for SequenceClassifier {
    fn kind(&self) -> ModelKind {
        ModelKind::Sequence
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> PipelineResult<()> {
        check_training_set(x, y)?;
        let summary = self.summarize(x)?;
        self.inner.fit_rows(&summary, y)?;
        tracing::debug!(windows = x.n_samples(), timesteps = self.timesteps, "Sequence model fitted");
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> PipelineResult<Vec<u8>> {
        Ok(threshold(&self.inner.proba_rows(&self.summarize(x)?)))
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> PipelineResult<Option<Vec<f64>>> {
        Ok(Some(self.inner.proba_rows(&self.summarize(x)?)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn partition(n: usize) -> Partition {
        let d0 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Partition {
            dates: (0..n).map(|i| d0 + chrono::Duration::days(i as i64)).collect(),
            features: FeatureMatrix::new(
                vec!["a".to_string(), "b".to_string()],
                (0..n).map(|i| vec![i as f64, -(i as f64)]).collect(),
            )
            .unwrap(),
            labels: (0..n).map(|i| (i % 2) as f64).collect(),
        }
    }

    #[test]
    fn windows_are_labeled_by_the_following_row() {
        let w = window_partition(&partition(5), 3).unwrap();
        assert_eq!(w.len(), 2);
        assert_eq!(w.features.n_features(), 6);
        assert_eq!(w.features.feature_names()[0], "a_lag3");
        assert_eq!(w.features.feature_names()[5], "b_lag1");
        assert_eq!(w.features.rows()[1], vec![1.0, -1.0, 2.0, -2.0, 3.0, -3.0]);
        assert_eq!(w.labels, vec![1.0, 0.0]);
        assert_eq!(w.dates[0], partition(5).dates[3]);

        let steps = reassemble(&w.features.rows()[1], 2);
        assert_eq!(steps.len(), 3);
        assert_eq!(steps[2], &[3.0, -3.0]);
    }

    #[test]
    fn too_few_rows_for_a_window() {
        assert!(matches!(
            window_partition(&partition(3), 3),
            Err(PipelineError::InsufficientData { .. })
        ));
    }

    #[test]
    fn rejects_matrix_of_the_wrong_width() {
        let mut model = SequenceClassifier::new(3, 3, LogisticConfig::default());
        let w = window_partition(&partition(6), 3).unwrap();
        let y = w.labels.iter().map(|v| u8::from(*v > 0.5)).collect::<Vec<_>>();
        assert!(matches!(
            model.fit(&w.features, &y),
            Err(PipelineError::LengthMismatch { .. })
        ));
    }

    #[test]
    fn empty_window_shape_is_insufficient_data() {
        let x = FeatureMatrix::new(Vec::new(), vec![Vec::new(), Vec::new()]).unwrap();
        let mut model = SequenceClassifier::new(3, 0, LogisticConfig::default());
        assert!(matches!(
            model.fit(&x, &[0, 1]),
            Err(PipelineError::InsufficientData { .. })
        ));
        assert!(matches!(
            SequenceClassifier::new(0, 2, LogisticConfig::default()).predict(&x),
            Err(PipelineError::InsufficientData { .. })
        ));
    }
}

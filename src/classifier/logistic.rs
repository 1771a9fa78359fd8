use serde::{Deserialize, Serialize};

use super::{check_training_set, threshold, Classifier, ModelKind};
use crate::error::{ensure_same_len, PipelineResult};
use crate::table::FeatureMatrix;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LogisticConfig {
    pub epochs: usize,
    pub learning_rate: f64,
    pub l2: f64,
}

impl Default for LogisticConfig {
    fn default() -> Self {
        Self {
            epochs: 500,
            learning_rate: 0.05,
            l2: 1e-3,
        }
    }
}

/// Per-feature z-scoring fitted on training rows. Absent values map to the
/// training mean (zero after scaling).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Standardizer {
    mean: Vec<f64>,
    std: Vec<f64>,
}

impl Standardizer {
    pub fn fit(rows: &[Vec<f64>], n_features: usize) -> Self {
        let mut mean = vec![0.0; n_features];
        let mut std = vec![1.0; n_features];
        for j in 0..n_features {
            let present: Vec<f64> = rows.iter().map(|r| r[j]).filter(|v| !v.is_nan()).collect();
            if present.is_empty() {
                continue;
            }
            let m = present.iter().sum::<f64>() / present.len() as f64;
            let var = present.iter().map(|v| (v - m).powi(2)).sum::<f64>() / present.len() as f64;
            mean[j] = m;
            if var.sqrt() > 1e-12 {
                std[j] = var.sqrt();
            }
        }
        Self { mean, std }
    }

    pub fn transform(&self, row: &[f64]) -> Vec<f64> {
        row.iter()
            .zip(self.mean.iter().zip(&self.std))
            .map(|(v, (m, s))| if v.is_nan() { 0.0 } else { (v - m) / s })
            .collect()
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// L2-regularized logistic regression fitted by full-batch gradient descent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticRegression {
    config: LogisticConfig,
    scaler: Standardizer,
    weights: Vec<f64>,
    bias: f64,
}

impl LogisticRegression {
    pub fn new(config: LogisticConfig) -> Self {
        Self {
            config,
            scaler: Standardizer::default(),
            weights: Vec::new(),
            bias: 0.0,
        }
    }

    pub fn fit_rows(&mut self, rows: &[Vec<f64>], y: &[u8]) -> PipelineResult<()> {
        ensure_same_len("rows", rows.len(), "labels", y.len())?;
        let n_features = rows.first().map_or(0, |r| r.len());
        self.scaler = Standardizer::fit(rows, n_features);
        let scaled: Vec<Vec<f64>> = rows.iter().map(|r| self.scaler.transform(r)).collect();

        let n = scaled.len() as f64;
        let mut w = vec![0.0; n_features];
        let mut b = 0.0;
        for _ in 0..self.config.epochs {
            let mut grad_w = vec![0.0; n_features];
            let mut grad_b = 0.0;
            for (row, label) in scaled.iter().zip(y) {
                let z = b + row.iter().zip(&w).map(|(x, w)| x * w).sum::<f64>();
                let err = sigmoid(z) - f64::from(*label);
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }
            for (wj, gj) in w.iter_mut().zip(&grad_w) {
                *wj -= self.config.learning_rate * (gj / n + self.config.l2 * *wj);
            }
            b -= self.config.learning_rate * grad_b / n;
        }
        self.weights = w;
        self.bias = b;
        Ok(())
    }

    pub fn proba_rows(&self, rows: &[Vec<f64>]) -> Vec<f64> {
        rows.iter()
            .map(|r| {
                let x = self.scaler.transform(r);
                sigmoid(self.bias + x.iter().zip(&self.weights).map(|(x, w)| x * w).sum::<f64>())
            })
            .collect()
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }
}

impl Classifier for LogisticRegression {
    fn kind(&self) -> ModelKind {
        ModelKind::Logistic
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> PipelineResult<()> {
        check_training_set(x, y)?;
        self.fit_rows(x.rows(), y)?;
        tracing::debug!(samples = x.n_samples(), features = x.n_features(), "Logistic regression fitted");
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> PipelineResult<Vec<u8>> {
        Ok(threshold(&self.proba_rows(x.rows())))
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> PipelineResult<Option<Vec<f64>>> {
        Ok(Some(self.proba_rows(x.rows())))
    }
}

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::classifier::{Classifier, ModelKind};
use crate::error::{ensure_same_len, PipelineError, PipelineResult};
use crate::table::FeatureMatrix;

pub const RESULT_RECORD_VERSION: u32 = 1;
pub const DEFAULT_PERMUTATION_REPEATS: usize = 10;

/// Rows are true {sell, buy}, columns predicted {sell, buy}.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix(pub [[u64; 2]; 2]);

impl ConfusionMatrix {
    pub fn from_labels(y_true: &[u8], y_pred: &[u8]) -> Self {
        let mut m = [[0u64; 2]; 2];
        for (t, p) in y_true.iter().zip(y_pred) {
            m[usize::from(*t > 0)][usize::from(*p > 0)] += 1;
        }
        Self(m)
    }

    pub fn true_negatives(&self) -> u64 {
        self.0[0][0]
    }

    pub fn false_positives(&self) -> u64 {
        self.0[0][1]
    }

    pub fn false_negatives(&self) -> u64 {
        self.0[1][0]
    }

    pub fn true_positives(&self) -> u64 {
        self.0[1][1]
    }

    pub fn total(&self) -> u64 {
        self.0.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.true_positives() + self.true_negatives()) as f64 / total as f64
    }

    /// F1 of the "buy" class; 0 when precision and recall are both 0.
    pub fn f1(&self) -> f64 {
        let tp = self.true_positives() as f64;
        let denom = 2.0 * tp + self.false_positives() as f64 + self.false_negatives() as f64;
        if denom == 0.0 {
            0.0
        } else {
            2.0 * tp / denom
        }
    }
}

pub fn accuracy(y_true: &[u8], y_pred: &[u8]) -> f64 {
    ConfusionMatrix::from_labels(y_true, y_pred).accuracy()
}

pub fn f1_score(y_true: &[u8], y_pred: &[u8]) -> f64 {
    ConfusionMatrix::from_labels(y_true, y_pred).f1()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RocCurve {
    pub fpr: Vec<f64>,
    pub tpr: Vec<f64>,
    pub thresholds: Vec<f64>,
}

impl RocCurve {
    /// Trapezoidal area under the curve.
    pub fn auc(&self) -> f64 {
        self.fpr
            .windows(2)
            .zip(self.tpr.windows(2))
            .map(|(x, y)| (x[1] - x[0]) * (y[1] + y[0]) / 2.0)
            .sum()
    }
}

/// ROC over distinct score thresholds, highest first, starting at (0, 0).
pub fn roc_curve(y_true: &[u8], scores: &[f64]) -> PipelineResult<RocCurve> {
    ensure_same_len("labels", y_true.len(), "scores", scores.len())?;
    let positives = y_true.iter().filter(|y| **y > 0).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(PipelineError::UndefinedMetric {
            metric: "roc_auc",
            reason: format!(
                "labels hold a single class ({} buy, {} sell)",
                positives, negatives
            ),
        });
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

    let mut fpr = vec![0.0];
    let mut tpr = vec![0.0];
    // above every score, finite for JSON
    let mut thresholds = vec![scores[order[0]] + 1.0];
    let (mut tp, mut fp) = (0usize, 0usize);
    for (i, idx) in order.iter().enumerate() {
        if y_true[*idx] > 0 {
            tp += 1;
        } else {
            fp += 1;
        }
        let last_of_tie = order
            .get(i + 1)
            .map_or(true, |next| scores[*next] != scores[*idx]);
        if last_of_tie {
            fpr.push(fp as f64 / negatives as f64);
            tpr.push(tp as f64 / positives as f64);
            thresholds.push(scores[*idx]);
        }
    }
    Ok(RocCurve {
        fpr,
        tpr,
        thresholds,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AucScore {
    Defined { value: f64 },
    Undefined { reason: String },
}

impl AucScore {
    pub fn value(&self) -> Option<f64> {
        match self {
            Self::Defined { value } => Some(*value),
            Self::Undefined { .. } => None,
        }
    }

    pub fn is_defined(&self) -> bool {
        matches!(self, Self::Defined { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub f1: f64,
    /// Scores the ROC was computed from: probabilities, or predicted labels
    /// when the model has none.
    pub scores: Vec<f64>,
    pub auc: AucScore,
    pub roc_curve: Option<RocCurve>,
}

/// Standard diagnostics. A single-class label vector leaves ROC/AUC undefined
/// rather than failing the evaluation.
pub fn evaluate(y_true: &[u8], y_pred: &[u8], scores: Option<&[f64]>) -> PipelineResult<Evaluation> {
    ensure_same_len("labels", y_true.len(), "predictions", y_pred.len())?;
    let cm = ConfusionMatrix::from_labels(y_true, y_pred);
    let scores: Vec<f64> = match scores {
        Some(s) => s.to_vec(),
        None => y_pred.iter().map(|p| f64::from(*p)).collect(),
    };

    let (auc, roc) = match roc_curve(y_true, &scores) {
        Ok(curve) => (
            AucScore::Defined {
                value: curve.auc(),
            },
            Some(curve),
        ),
        Err(PipelineError::UndefinedMetric { metric, reason }) => {
            tracing::warn!(metric, %reason, "Metric undefined, reporting flag");
            (AucScore::Undefined { reason }, None)
        }
        Err(e) => return Err(e),
    };

    Ok(Evaluation {
        confusion_matrix: cm,
        accuracy: cm.accuracy(),
        f1: cm.f1(),
        scores,
        auc,
        roc_curve: roc,
    })
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
    /// Spread across permutation repeats; zero for built-in importances.
    pub std: f64,
}

fn rank(mut items: Vec<FeatureImportance>) -> Vec<FeatureImportance> {
    items.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    items
}

/// Built-in importances paired with names, zero entries dropped, descending.
pub fn builtin_importance_ranking(
    names: &[String],
    importances: &[f64],
) -> PipelineResult<Vec<FeatureImportance>> {
    ensure_same_len("feature_names", names.len(), "importances", importances.len())?;
    Ok(rank(
        names
            .iter()
            .zip(importances)
            .filter(|(_, v)| **v != 0.0)
            .map(|(n, v)| FeatureImportance {
                feature: n.clone(),
                importance: *v,
                std: 0.0,
            })
            .collect(),
    ))
}

/// Mean accuracy drop from shuffling each column on its own, `repeats` times,
/// with the model and every other column held fixed. Seeded per
/// (column, repeat), so results do not depend on scheduling.
pub fn permutation_importance(
    model: &dyn Classifier,
    x: &FeatureMatrix,
    y: &[u8],
    repeats: usize,
    seed: u64,
) -> PipelineResult<Vec<FeatureImportance>> {
    ensure_same_len("features", x.n_samples(), "labels", y.len())?;
    if repeats == 0 {
        return Err(PipelineError::InvalidConfig(
            "permutation repeats must be > 0".to_string(),
        ));
    }
    let baseline = accuracy(y, &model.predict(x)?);

    let jobs: Vec<(usize, usize)> = (0..x.n_features())
        .flat_map(|j| (0..repeats).map(move |r| (j, r)))
        .collect();
    let drops: Vec<(usize, f64)> = jobs
        .par_iter()
        .map(|(j, r)| {
            let job_seed = seed
                .wrapping_mul(1_000_003)
                .wrapping_add((*j * repeats + *r) as u64);
            let mut rng = ChaCha8Rng::seed_from_u64(job_seed);
            let mut column = x.column(*j);
            column.shuffle(&mut rng);
            let permuted = x.with_column(*j, &column);
            let score = accuracy(y, &model.predict(&permuted)?);
            Ok((*j, baseline - score))
        })
        .collect::<PipelineResult<_>>()?;

    let mut per_feature = vec![Vec::with_capacity(repeats); x.n_features()];
    for (j, drop) in drops {
        per_feature[j].push(drop);
    }
    let items = x
        .feature_names()
        .iter()
        .zip(per_feature)
        .map(|(name, d)| {
            let mean = d.iter().sum::<f64>() / d.len() as f64;
            let var = d.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / d.len() as f64;
            FeatureImportance {
                feature: name.clone(),
                importance: mean,
                std: var.sqrt(),
            }
        })
        .collect();
    Ok(rank(items))
}

/// Versioned result of one model run on one company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub version: u32,
    pub run_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub company: String,
    pub model_kind: ModelKind,
    pub confusion_matrix: ConfusionMatrix,
    pub accuracy: f64,
    pub f1: f64,
    pub probabilities: Vec<f64>,
    pub y_test: Vec<u8>,
    pub auc: AucScore,
    #[serde(default)]
    pub roc_curve: Option<RocCurve>,
    #[serde(default)]
    pub feature_importances: Option<Vec<FeatureImportance>>,
    #[serde(default)]
    pub permutation_importances: Option<Vec<FeatureImportance>>,
}

impl EvaluationRecord {
    pub fn new(company: &str, model_kind: ModelKind, y_test: Vec<u8>, eval: Evaluation) -> Self {
        Self {
            version: RESULT_RECORD_VERSION,
            run_id: Uuid::new_v4(),
            created_at: Utc::now(),
            company: company.to_string(),
            model_kind,
            confusion_matrix: eval.confusion_matrix,
            accuracy: eval.accuracy,
            f1: eval.f1,
            probabilities: eval.scores,
            y_test,
            auc: eval.auc,
            roc_curve: eval.roc_curve,
            feature_importances: None,
            permutation_importances: None,
        }
    }
}

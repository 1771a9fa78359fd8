pub mod forest;
pub mod logistic;
pub mod sequence;

use serde::{Deserialize, Serialize};

use crate::config::ModelConfig;
use crate::error::{ensure_same_len, PipelineError, PipelineResult};
use crate::table::FeatureMatrix;

pub use forest::{ForestConfig, RandomForest};
pub use logistic::{LogisticConfig, LogisticRegression};
pub use sequence::SequenceClassifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    Forest,
    Logistic,
    Sequence,
}

impl ModelKind {
    pub const ALL: [ModelKind; 3] = [Self::Forest, Self::Logistic, Self::Sequence];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Forest => "forest",
            Self::Logistic => "logistic",
            Self::Sequence => "sequence",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forest" | "random_forest" | "rf" => Some(Self::Forest),
            "logistic" | "logreg" => Some(Self::Logistic),
            "sequence" | "seq" => Some(Self::Sequence),
            _ => None,
        }
    }
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Binary direction model: 1 = buy, 0 = sell.
pub trait Classifier: Send + Sync {
    fn kind(&self) -> ModelKind;

    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> PipelineResult<()>;

    fn predict(&self, x: &FeatureMatrix) -> PipelineResult<Vec<u8>>;

    /// Positive-class probabilities, when the model produces them.
    fn predict_proba(&self, _x: &FeatureMatrix) -> PipelineResult<Option<Vec<f64>>> {
        Ok(None)
    }

    /// Per-feature importances in input column order, when the model keeps them.
    fn feature_importances(&self) -> Option<Vec<f64>> {
        None
    }
}

pub fn build_classifier(
    kind: ModelKind,
    model: &ModelConfig,
    seed: u64,
    n_features: usize,
) -> Box<dyn Classifier> {
    match kind {
        ModelKind::Forest => Box::new(RandomForest::new(ForestConfig {
            n_trees: model.forest_trees,
            max_depth: model.forest_max_depth,
            min_samples_leaf: model.forest_min_samples_leaf,
            seed,
            ..ForestConfig::default()
        })),
        ModelKind::Logistic => Box::new(LogisticRegression::new(logistic_config(model))),
        ModelKind::Sequence => Box::new(SequenceClassifier::new(
            model.timesteps,
            n_features,
            logistic_config(model),
        )),
    }
}

fn logistic_config(model: &ModelConfig) -> LogisticConfig {
    LogisticConfig {
        epochs: model.logistic_epochs,
        learning_rate: model.logistic_learning_rate,
        l2: model.logistic_l2,
    }
}

pub(crate) fn check_training_set(x: &FeatureMatrix, y: &[u8]) -> PipelineResult<()> {
    ensure_same_len("features", x.n_samples(), "labels", y.len())?;
    if x.is_empty() {
        return Err(PipelineError::InsufficientData {
            what: "model fit",
            needed: 1,
            got: 0,
        });
    }
    Ok(())
}

pub(crate) fn threshold(probabilities: &[f64]) -> Vec<u8> {
    probabilities.iter().map(|p| u8::from(*p > 0.5)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_kind_parses_aliases() {
        assert_eq!(ModelKind::parse("RF"), Some(ModelKind::Forest));
        assert_eq!(ModelKind::parse(" logistic "), Some(ModelKind::Logistic));
        assert_eq!(ModelKind::parse("seq"), Some(ModelKind::Sequence));
        assert_eq!(ModelKind::parse("svm"), None);
        assert_eq!(ModelKind::Sequence.to_string(), "sequence");
    }
}

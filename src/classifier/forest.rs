use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::{check_training_set, threshold, Classifier, ModelKind};
use crate::error::PipelineResult;
use crate::table::FeatureMatrix;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features tried per split; `sqrt(n_features)` when unset.
    pub max_features: Option<usize>,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            bootstrap: true,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Leaf {
        p_buy: f64,
    },
    Split {
        feature: usize,
        threshold: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
}

impl Node {
    /// Absent (`NaN`) values follow the right branch.
    fn p_buy(&self, row: &[f64]) -> f64 {
        match self {
            Self::Leaf { p_buy } => *p_buy,
            Self::Split {
                feature,
                threshold,
                left,
                right,
            } => {
                if row[*feature] <= *threshold {
                    left.p_buy(row)
                } else {
                    right.p_buy(row)
                }
            }
        }
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

fn gini(pos: usize, n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    let p = pos as f64 / n as f64;
    2.0 * p * (1.0 - p)
}

/// Gini classification tree grown on a row subset.
struct TreeBuilder<'a> {
    x: &'a [Vec<f64>],
    y: &'a [u8],
    config: &'a ForestConfig,
    max_features: usize,
    importances: Vec<f64>,
    rng: ChaCha8Rng,
}

impl TreeBuilder<'_> {
    fn build(&mut self, rows: &[usize], depth: usize) -> Node {
        let n = rows.len();
        let pos = rows.iter().filter(|r| self.y[**r] == 1).count();
        let leaf = Node::Leaf {
            p_buy: if n == 0 { 0.5 } else { pos as f64 / n as f64 },
        };
        if depth >= self.config.max_depth
            || n < self.config.min_samples_split
            || pos == 0
            || pos == n
        {
            return leaf;
        }

        let Some(best) = self.best_split(rows, pos) else {
            return leaf;
        };
        let (left, right): (Vec<usize>, Vec<usize>) = rows
            .iter()
            .partition(|r| self.x[**r][best.feature] <= best.threshold);
        self.importances[best.feature] += best.gain * n as f64;

        Node::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(self.build(&left, depth + 1)),
            right: Box::new(self.build(&right, depth + 1)),
        }
    }

    fn best_split(&mut self, rows: &[usize], pos: usize) -> Option<BestSplit> {
        let n = rows.len();
        let parent = gini(pos, n);
        let n_features = self.importances.len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(&mut self.rng);
        features.truncate(self.max_features);

        let min_leaf = self.config.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;
        for feature in features {
            let mut values: Vec<(f64, u8)> = rows
                .iter()
                .map(|r| (self.x[*r][feature], self.y[*r]))
                .filter(|(v, _)| !v.is_nan())
                .collect();
            values.sort_by(|a, b| a.0.total_cmp(&b.0));

            // absent values always land right
            let mut left_n = 0usize;
            let mut left_pos = 0usize;
            for i in 0..values.len().saturating_sub(1) {
                left_n += 1;
                left_pos += usize::from(values[i].1);
                if values[i].0 == values[i + 1].0 {
                    continue;
                }
                let right_n = n - left_n;
                if left_n < min_leaf || right_n < min_leaf {
                    continue;
                }
                let right_pos = pos - left_pos;
                let weighted = (left_n as f64 * gini(left_pos, left_n)
                    + right_n as f64 * gini(right_pos, right_n))
                    / n as f64;
                let gain = parent - weighted;
                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: (values[i].0 + values[i + 1].0) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    config: ForestConfig,
    trees: Vec<Node>,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    pub fn new(config: ForestConfig) -> Self {
        Self {
            config,
            trees: Vec::new(),
            feature_importances: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    fn proba(&self, x: &FeatureMatrix) -> Vec<f64> {
        if self.trees.is_empty() {
            return vec![0.5; x.n_samples()];
        }
        x.rows()
            .par_iter()
            .map(|row| {
                self.trees.iter().map(|t| t.p_buy(row)).sum::<f64>() / self.trees.len() as f64
            })
            .collect()
    }
}

impl Classifier for RandomForest {
    fn kind(&self) -> ModelKind {
        ModelKind::Forest
    }

    fn fit(&mut self, x: &FeatureMatrix, y: &[u8]) -> PipelineResult<()> {
        check_training_set(x, y)?;
        let n = x.n_samples();
        let n_features = x.n_features();
        let max_features = self
            .config
            .max_features
            .unwrap_or_else(|| (n_features as f64).sqrt().ceil() as usize)
            .clamp(1, n_features.max(1));

        let config = &self.config;
        let grown: Vec<(Node, Vec<f64>)> = (0..config.n_trees)
            .into_par_iter()
            .map(|i| {
                let seed = config.seed.wrapping_add(i as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);
                let rows: Vec<usize> = if config.bootstrap {
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                let mut builder = TreeBuilder {
                    x: x.rows(),
                    y,
                    config,
                    max_features,
                    importances: vec![0.0; n_features],
                    rng,
                };
                let root = builder.build(&rows, 0);
                (root, builder.importances)
            })
            .collect();

        let mut importances = vec![0.0; n_features];
        let mut trees = Vec::with_capacity(grown.len());
        for (tree, tree_importances) in grown {
            let total: f64 = tree_importances.iter().sum();
            if total > 0.0 {
                for (acc, v) in importances.iter_mut().zip(&tree_importances) {
                    *acc += v / total;
                }
            }
            trees.push(tree);
        }
        let total: f64 = importances.iter().sum();
        if total > 0.0 {
            importances.iter_mut().for_each(|v| *v /= total);
        }

        tracing::debug!(trees = trees.len(), samples = n, features = n_features, "Forest fitted");
        self.trees = trees;
        self.feature_importances = importances;
        Ok(())
    }

    fn predict(&self, x: &FeatureMatrix) -> PipelineResult<Vec<u8>> {
        Ok(threshold(&self.proba(x)))
    }

    fn predict_proba(&self, x: &FeatureMatrix) -> PipelineResult<Option<Vec<f64>>> {
        Ok(Some(self.proba(x)))
    }

    fn feature_importances(&self) -> Option<Vec<f64>> {
        if self.feature_importances.is_empty() {
            None
        } else {
            Some(self.feature_importances.clone())
        }
    }
}

//! Multi-output random forest regression.
//!
//! A bootstrap-aggregated ensemble of CART regression trees used to map
//! image feature vectors to tone parameter vectors. Trees split on the
//! variance reduction of the target vector, averaged over outputs, and
//! predict the mean target of the leaf they land in. Training is seeded,
//! so a fixed seed gives an identical forest on every run.

use nanorand::{Pcg64, Rng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Training configuration for [`RandomForest::fit`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees in the ensemble.
    pub n_trees: usize,
    /// Minimum number of rows required to attempt a split.
    pub min_samples_split: usize,
    /// Minimum number of rows on each side of a split.
    pub min_samples_leaf: usize,
    /// Seed for bootstrap sampling.
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            min_samples_split: 2,
            min_samples_leaf: 1,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        values: Vec<f64>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Tree {
    nodes: Vec<Node>,
}

impl Tree {
    /// Walk the tree and add the landed leaf's values into `out`.
    fn predict_into(&self, features: &[f64], out: &mut [f64]) {
        let mut idx = 0;
        loop {
            match &self.nodes[idx] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    idx = if features[*feature] <= *threshold {
                        *left
                    } else {
                        *right
                    };
                }
                Node::Leaf { values } => {
                    for (o, v) in out.iter_mut().zip(values) {
                        *o += v;
                    }
                    return;
                }
            }
        }
    }
}

/// A trained multi-output regression forest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<Tree>,
    n_features: usize,
    n_outputs: usize,
    feature_importances: Vec<f64>,
}

impl RandomForest {
    /// Train a forest on row-major feature and target matrices.
    ///
    /// Every feature row must have the same length, likewise every target
    /// row; the two matrices must have the same number of rows.
    pub fn fit(
        features: &[Vec<f64>],
        targets: &[Vec<f64>],
        config: &ForestConfig,
    ) -> Result<Self> {
        if features.is_empty() {
            return Err(Error::Training("empty training set".to_string()));
        }
        if features.len() != targets.len() {
            return Err(Error::Training(format!(
                "feature rows ({}) and target rows ({}) differ",
                features.len(),
                targets.len()
            )));
        }
        if config.n_trees == 0 {
            return Err(Error::Training("n_trees must be at least 1".to_string()));
        }
        let n_features = features[0].len();
        let n_outputs = targets[0].len();
        if n_features == 0 || n_outputs == 0 {
            return Err(Error::Training("empty feature or target vectors".to_string()));
        }
        if features.iter().any(|row| row.len() != n_features)
            || targets.iter().any(|row| row.len() != n_outputs)
        {
            return Err(Error::Training("ragged feature or target matrix".to_string()));
        }

        // Derive per-tree seeds up front so parallel training is deterministic
        let mut seeder = Pcg64::new_seed(u128::from(config.seed));
        let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| seeder.generate()).collect();

        let n = features.len();
        let grown: Vec<(Tree, Vec<f64>)> = tree_seeds
            .into_par_iter()
            .map(|seed| {
                let mut rng = Pcg64::new_seed(u128::from(seed));
                let rows: Vec<usize> = (0..n).map(|_| rng.generate_range(0..n)).collect();

                let mut builder = TreeBuilder {
                    features,
                    targets,
                    n_outputs,
                    min_samples_split: config.min_samples_split.max(2),
                    min_samples_leaf: config.min_samples_leaf.max(1),
                    nodes: Vec::new(),
                    importances: vec![0.0; n_features],
                    n_total: rows.len() as f64,
                };
                builder.grow(rows);

                let total: f64 = builder.importances.iter().sum();
                if total > 0.0 {
                    for v in &mut builder.importances {
                        *v /= total;
                    }
                }
                (Tree { nodes: builder.nodes }, builder.importances)
            })
            .collect();

        let mut trees = Vec::with_capacity(grown.len());
        let mut feature_importances = vec![0.0; n_features];
        for (tree, importances) in grown {
            for (acc, v) in feature_importances.iter_mut().zip(&importances) {
                *acc += v;
            }
            trees.push(tree);
        }
        let total: f64 = feature_importances.iter().sum();
        if total > 0.0 {
            for v in &mut feature_importances {
                *v /= total;
            }
        }

        Ok(Self {
            trees,
            n_features,
            n_outputs,
            feature_importances,
        })
    }

    /// Predict the target vector for one feature vector.
    pub fn predict(&self, features: &[f64]) -> Result<Vec<f64>> {
        if features.len() != self.n_features {
            return Err(Error::Model(format!(
                "expected {} features, got {}",
                self.n_features,
                features.len()
            )));
        }
        let mut out = vec![0.0; self.n_outputs];
        for tree in &self.trees {
            tree.predict_into(features, &mut out);
        }
        for v in &mut out {
            *v /= self.trees.len() as f64;
        }
        Ok(out)
    }

    /// Coefficient of determination, uniformly averaged over outputs.
    pub fn score(&self, features: &[Vec<f64>], targets: &[Vec<f64>]) -> Result<f64> {
        if features.is_empty() || features.len() != targets.len() {
            return Err(Error::Training(format!(
                "score needs matching non-empty rows, got {} and {}",
                features.len(),
                targets.len()
            )));
        }

        let predictions = features
            .iter()
            .map(|row| self.predict(row))
            .collect::<Result<Vec<_>>>()?;

        let n = targets.len() as f64;
        let mut r2_sum = 0.0;
        for o in 0..self.n_outputs {
            let mean = targets.iter().map(|t| t[o]).sum::<f64>() / n;
            let ss_tot: f64 = targets.iter().map(|t| (t[o] - mean).powi(2)).sum();
            let ss_res: f64 = targets
                .iter()
                .zip(&predictions)
                .map(|(t, p)| (t[o] - p[o]).powi(2))
                .sum();
            r2_sum += if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 0.0 };
        }
        Ok(r2_sum / self.n_outputs as f64)
    }

    /// Number of input features the forest was trained on.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of outputs the forest predicts.
    #[must_use]
    pub fn n_outputs(&self) -> usize {
        self.n_outputs
    }

    /// Number of trees in the ensemble.
    #[must_use]
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Normalized mean impurity decrease per feature. Sums to 1 when any
    /// split was made.
    #[must_use]
    pub fn feature_importances(&self) -> &[f64] {
        &self.feature_importances
    }
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    gain: f64,
}

struct TreeBuilder<'a> {
    features: &'a [Vec<f64>],
    targets: &'a [Vec<f64>],
    n_outputs: usize,
    min_samples_split: usize,
    min_samples_leaf: usize,
    nodes: Vec<Node>,
    importances: Vec<f64>,
    n_total: f64,
}

impl TreeBuilder<'_> {
    /// Grow a subtree over the given rows; returns its root node index.
    fn grow(&mut self, rows: Vec<usize>) -> usize {
        let (sums, sq_sums) = self.accumulate(&rows);
        let node_sse = sse_from(&sums, &sq_sums, rows.len());

        if rows.len() < self.min_samples_split || node_sse <= 1e-12 {
            return self.leaf(&sums, rows.len());
        }
        let Some(split) = self.best_split(&rows, node_sse) else {
            return self.leaf(&sums, rows.len());
        };

        self.importances[split.feature] += split.gain / self.n_total;

        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) = rows
            .into_iter()
            .partition(|&r| self.features[r][split.feature] <= split.threshold);

        // Reserve the slot so children get consecutive positions after it
        let node_idx = self.nodes.len();
        self.nodes.push(Node::Leaf { values: Vec::new() });
        let left = self.grow(left_rows);
        let right = self.grow(right_rows);
        self.nodes[node_idx] = Node::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_idx
    }

    fn leaf(&mut self, sums: &[f64], n: usize) -> usize {
        let values = sums.iter().map(|s| s / n as f64).collect();
        self.nodes.push(Node::Leaf { values });
        self.nodes.len() - 1
    }

    /// Sum and squared-sum of targets per output over the rows.
    fn accumulate(&self, rows: &[usize]) -> (Vec<f64>, Vec<f64>) {
        let mut sums = vec![0.0; self.n_outputs];
        let mut sq_sums = vec![0.0; self.n_outputs];
        for &r in rows {
            for (o, &y) in self.targets[r].iter().enumerate() {
                sums[o] += y;
                sq_sums[o] += y * y;
            }
        }
        (sums, sq_sums)
    }

    /// Exhaustive scan over all features and distinct thresholds.
    fn best_split(&self, rows: &[usize], node_sse: f64) -> Option<SplitCandidate> {
        let n = rows.len();
        let (total_sums, total_sq) = self.accumulate(rows);
        let mut best: Option<SplitCandidate> = None;
        let mut order = rows.to_vec();

        for feature in 0..self.features[0].len() {
            order.sort_by(|&a, &b| {
                self.features[a][feature]
                    .partial_cmp(&self.features[b][feature])
                    .unwrap_or(std::cmp::Ordering::Equal)
            });

            let mut left_sums = vec![0.0; self.n_outputs];
            let mut left_sq = vec![0.0; self.n_outputs];

            for i in 1..n {
                let moved = order[i - 1];
                for (o, &y) in self.targets[moved].iter().enumerate() {
                    left_sums[o] += y;
                    left_sq[o] += y * y;
                }

                let lower = self.features[moved][feature];
                let upper = self.features[order[i]][feature];
                if upper <= lower {
                    continue;
                }
                if i < self.min_samples_leaf || n - i < self.min_samples_leaf {
                    continue;
                }

                let left_sse = sse_from(&left_sums, &left_sq, i);
                let right_sums: Vec<f64> = total_sums
                    .iter()
                    .zip(&left_sums)
                    .map(|(t, l)| t - l)
                    .collect();
                let right_sq: Vec<f64> =
                    total_sq.iter().zip(&left_sq).map(|(t, l)| t - l).collect();
                let right_sse = sse_from(&right_sums, &right_sq, n - i);

                let gain = node_sse - left_sse - right_sse;
                if gain > 1e-12 && best.as_ref().map_or(true, |b| gain > b.gain) {
                    best = Some(SplitCandidate {
                        feature,
                        threshold: (lower + upper) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

/// Sum of squared errors around the mean, totaled over outputs.
fn sse_from(sums: &[f64], sq_sums: &[f64], n: usize) -> f64 {
    let n = n as f64;
    sums.iter()
        .zip(sq_sums)
        .map(|(s, sq)| (sq - s * s / n).max(0.0))
        .sum()
}

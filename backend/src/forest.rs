//! Isolation Forest outlier detector.
//!
//! Trees are grown on random subsamples by picking a random feature and a
//! uniform split point between the node's min and max. Outliers are isolated
//! in fewer splits, so their average path length is shorter. Scores follow
//! the usual convention: `decision_function(x) < 0` marks an outlier, and
//! lower values mean stronger outlier-ness.

use crate::errors::{Error, Result};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;
const MAX_SAMPLES: usize = 256;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub contamination: f64,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            contamination: 0.01,
            seed: 42,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum Node {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn grow(data: &[Vec<f64>], rows: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow_node(data, rows, 0, height_limit, rng);
        tree
    }

    fn grow_node(
        &mut self,
        data: &[Vec<f64>],
        rows: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let index = self.nodes.len();
        self.nodes.push(Node::Leaf { size: rows.len() });

        if depth >= height_limit || rows.len() <= 1 {
            return index;
        }

        let n_features = data[rows[0]].len();
        let mut features: Vec<usize> = (0..n_features).collect();
        features.shuffle(rng);

        // First feature that still varies inside this node
        let split = features.into_iter().find_map(|feature| {
            let (min, max) = rows.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &r| {
                let v = data[r][feature];
                (lo.min(v), hi.max(v))
            });
            (max > min).then_some((feature, min, max))
        });

        let Some((feature, min, max)) = split else {
            return index;
        };

        let threshold = rng.gen_range(min..max);
        let (left_rows, right_rows): (Vec<usize>, Vec<usize>) =
            rows.into_iter().partition(|&r| data[r][feature] < threshold);

        let left = self.grow_node(data, left_rows, depth + 1, height_limit, rng);
        let right = self.grow_node(data, right_rows, depth + 1, height_limit, rng);
        self.nodes[index] = Node::Split {
            feature,
            threshold,
            left,
            right,
        };
        index
    }

    /// Depth of the leaf reached by `x`, adjusted for the leaf's unsplit samples.
    fn path_length(&self, x: &[f64]) -> f64 {
        let mut index = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[index] {
                Node::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    index = if x[*feature] < *threshold { *left } else { *right };
                    depth += 1.0;
                }
                Node::Leaf { size } => return depth + average_path_length(*size),
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsolationForest {
    n_features: usize,
    max_samples: usize,
    contamination: f64,
    offset: f64,
    trees: Vec<IsolationTree>,
}

impl IsolationForest {
    /// Fits the forest on `data` (one row per sample) and calibrates the
    /// decision offset so that roughly `contamination` of the training rows
    /// score as outliers.
    pub fn fit(data: &[Vec<f64>], params: ForestParams) -> Result<Self> {
        if data.len() < 2 {
            return Err(Error::Training(format!(
                "need at least 2 training rows, got {}",
                data.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(Error::Training("n_estimators must be positive".to_string()));
        }
        if !(params.contamination > 0.0 && params.contamination <= 0.5) {
            return Err(Error::Training(format!(
                "contamination {} out of range (0, 0.5]",
                params.contamination
            )));
        }

        let n_features = data[0].len();
        if n_features == 0 || data.iter().any(|row| row.len() != n_features) {
            return Err(Error::Training("training rows must share a non-zero width".to_string()));
        }
        if data.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::Training("training data contains non-finite values".to_string()));
        }

        let max_samples = data.len().min(MAX_SAMPLES);
        let height_limit = (max_samples as f64).log2().ceil().max(1.0) as usize;
        let mut rng = StdRng::seed_from_u64(params.seed);

        let trees = (0..params.n_estimators)
            .map(|_| {
                let rows = rand::seq::index::sample(&mut rng, data.len(), max_samples).into_vec();
                IsolationTree::grow(data, rows, height_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            n_features,
            max_samples,
            contamination: params.contamination,
            offset: 0.0,
            trees,
        };

        let training_scores: Vec<f64> = data.iter().map(|row| forest.score_samples(row)).collect();
        forest.offset = percentile(training_scores, params.contamination * 100.0);

        Ok(forest)
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    pub fn contamination(&self) -> f64 {
        self.contamination
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }

    /// Raw score in [-1, 0): `-2^(-E[h(x)] / c(max_samples))`.
    pub fn score_samples(&self, x: &[f64]) -> f64 {
        let total: f64 = self.trees.iter().map(|tree| tree.path_length(x)).sum();
        let mean = total / self.trees.len() as f64;
        -(2f64).powf(-mean / average_path_length(self.max_samples))
    }

    /// Raw score shifted by the training offset; negative means outlier.
    pub fn decision_function(&self, x: &[f64]) -> f64 {
        self.score_samples(x) - self.offset
    }

    pub fn is_outlier(&self, x: &[f64]) -> bool {
        self.decision_function(x) < 0.0
    }
}

/// Average path length of an unsuccessful BST search over `n` points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// Percentile with linear interpolation between closest ranks.
fn percentile(mut values: Vec<f64>, q: f64) -> f64 {
    values.sort_by(|a, b| a.total_cmp(b));
    let rank = (q / 100.0) * (values.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;
    let weight = rank - lower as f64;
    values[lower] + (values[upper] - values[lower]) * weight
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_distr::{Distribution, Normal};

    fn gaussian_blob(n: usize, seed: u64) -> Vec<Vec<f64>> {
        let mut rng = StdRng::seed_from_u64(seed);
        let normal = Normal::new(0.0, 1.0).unwrap();
        (0..n)
            .map(|_| vec![normal.sample(&mut rng), normal.sample(&mut rng)])
            .collect()
    }

    #[test]
    fn test_average_path_length() {
        assert_eq!(average_path_length(1), 0.0);
        assert_eq!(average_path_length(2), 1.0);
        let c256 = average_path_length(256);
        assert!((c256 - 10.2448).abs() < 1e-3, "c(256) = {}", c256);
    }

    #[test]
    fn test_percentile_interpolates() {
        let values = vec![4.0, 1.0, 3.0, 2.0];
        assert_eq!(percentile(values.clone(), 0.0), 1.0);
        assert_eq!(percentile(values.clone(), 100.0), 4.0);
        assert!((percentile(values, 50.0) - 2.5).abs() < 1e-12);
    }

    #[test]
    fn test_far_point_is_outlier() {
        let data = gaussian_blob(500, 7);
        let forest = IsolationForest::fit(&data, ForestParams::default()).unwrap();

        assert!(!forest.is_outlier(&[0.0, 0.0]));
        assert!(forest.is_outlier(&[8.0, -8.0]));
        assert!(forest.decision_function(&[8.0, -8.0]) < forest.decision_function(&[0.0, 0.0]));
    }

    #[test]
    fn test_offset_matches_contamination() {
        let data = gaussian_blob(1000, 11);
        let params = ForestParams {
            contamination: 0.05,
            ..ForestParams::default()
        };
        let forest = IsolationForest::fit(&data, params).unwrap();

        let flagged = data.iter().filter(|row| forest.is_outlier(row)).count();
        assert!((40..=60).contains(&flagged), "flagged {} of 1000", flagged);
    }

    #[test]
    fn test_fit_is_deterministic_for_seed() {
        let data = gaussian_blob(300, 3);
        let a = IsolationForest::fit(&data, ForestParams::default()).unwrap();
        let b = IsolationForest::fit(&data, ForestParams::default()).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_constant_data_yields_single_leaf_trees() {
        let data = vec![vec![1.0, 1.0]; 50];
        let forest = IsolationForest::fit(&data, ForestParams::default()).unwrap();
        assert!(forest.trees.iter().all(|t| t.nodes.len() == 1));
        assert!(!forest.is_outlier(&[1.0, 1.0]));
    }

    #[test]
    fn test_fit_rejects_bad_input() {
        let params = ForestParams::default();
        assert!(IsolationForest::fit(&[], params).is_err());
        assert!(IsolationForest::fit(&[vec![1.0], vec![1.0, 2.0]], params).is_err());
        assert!(IsolationForest::fit(&[vec![f64::NAN], vec![1.0]], params).is_err());

        let params = ForestParams {
            contamination: 0.9,
            ..ForestParams::default()
        };
        assert!(IsolationForest::fit(&[vec![1.0], vec![2.0]], params).is_err());
    }

    #[test]
    fn test_single_row_is_rejected() {
        let result = IsolationForest::fit(&[vec![1.0, 2.0]], ForestParams::default());
        assert!(matches!(result, Err(Error::Training(_))));

        let data = [vec![1.0, 2.0], vec![3.0, 4.0]];
        let forest = IsolationForest::fit(&data, ForestParams::default()).unwrap();
        assert!(forest.offset().is_finite());
        assert!(forest.decision_function(&[1.0, 2.0]).is_finite());
    }
}

// Deterministic isolation forest
// Splits are hash-seeded rather than RNG-driven so that identical training
// data always yields the same model, and the whole structure serializes into
// the persisted baseline artifact

use serde::{Deserialize, Serialize};

use crate::error::AnalysisError;
use crate::services::features::Features;

const EULER_MASCHERONI: f64 = 0.577_215_664_9;
const GOLDEN_RATIO_CONJUGATE: f64 = 0.618_033_988_749_895;

#[derive(Debug, Clone, Serialize, Deserialize)]
enum IsolationNode {
    Internal {
        split_feature: usize,
        split_value: f64,
        left: Box<IsolationNode>,
        right: Box<IsolationNode>,
    },
    Leaf {
        size: usize,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(data: &[&Features], height_limit: usize, current_height: usize) -> IsolationNode {
        if current_height >= height_limit || data.len() <= 1 {
            return IsolationNode::Leaf { size: data.len() };
        }

        // Deterministic feature choice and split point, seeded by depth and
        // partition size.
        let split_feature = (current_height * 31 + data.len() * 17) % data[0].len();
        let values: Vec<f64> = data.iter().map(|v| v[split_feature]).collect();
        let min_val = values.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        if (max_val - min_val).abs() < f64::EPSILON {
            return IsolationNode::Leaf { size: data.len() };
        }

        let fraction =
            ((current_height * 31 + data.len() * 17) as f64 * GOLDEN_RATIO_CONJUGATE).fract();
        let split_value = min_val + fraction * (max_val - min_val);

        let (left_data, right_data): (Vec<&Features>, Vec<&Features>) = data
            .iter()
            .copied()
            .partition(|v| v[split_feature] < split_value);

        IsolationNode::Internal {
            split_feature,
            split_value,
            left: Box::new(Self::build(&left_data, height_limit, current_height + 1)),
            right: Box::new(Self::build(&right_data, height_limit, current_height + 1)),
        }
    }

    fn path_length(node: &IsolationNode, sample: &Features, current_height: usize) -> f64 {
        match node {
            IsolationNode::Leaf { size } => current_height as f64 + average_unsuccessful_search(*size),
            IsolationNode::Internal {
                split_feature,
                split_value,
                left,
                right,
            } => {
                if sample.get(*split_feature).copied().unwrap_or(0.0) < *split_value {
                    Self::path_length(left, sample, current_height + 1)
                } else {
                    Self::path_length(right, sample, current_height + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search over n records.
fn average_unsuccessful_search(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n = n as f64;
    2.0 * (n.ln() + EULER_MASCHERONI) - (2.0 * (n - 1.0) / n)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    n_trees: usize,
    sample_size: usize,
}

impl IsolationForest {
    pub fn new(n_trees: usize, sample_size: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_trees,
            sample_size,
        }
    }

    pub fn fit(&mut self, data: &[Features]) -> Result<(), AnalysisError> {
        if data.len() < self.sample_size {
            return Err(AnalysisError::InsufficientData {
                have: data.len(),
                need: self.sample_size,
            });
        }

        let height_limit = (self.sample_size as f64).log2().ceil() as usize;
        self.trees.clear();
        for tree_index in 0..self.n_trees {
            // Deterministic subsampling per tree.
            let sample: Vec<&Features> = data
                .iter()
                .enumerate()
                .filter(|(row, _)| (tree_index * 31 + row * 17) % data.len() < self.sample_size)
                .map(|(_, v)| v)
                .take(self.sample_size)
                .collect();

            let root = IsolationTree::build(&sample, height_limit, 0);
            self.trees.push(IsolationTree { root });
        }
        Ok(())
    }

    pub fn is_trained(&self) -> bool {
        !self.trees.is_empty()
    }

    /// Mean path length across trees; shorter paths isolate faster and are
    /// therefore more anomalous.
    pub fn average_path_length(&self, sample: &Features) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees
            .iter()
            .map(|tree| IsolationTree::path_length(&tree.root, sample, 0))
            .sum::<f64>()
            / self.trees.len() as f64
    }

    /// Standard isolation-forest outlier score in (0, 1); higher means more
    /// anomalous.
    pub fn outlier_score(&self, sample: &Features) -> f64 {
        let normalizer = average_unsuccessful_search(self.sample_size);
        if normalizer <= 0.0 {
            return 0.5;
        }
        2.0_f64.powf(-self.average_path_length(sample) / normalizer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clustered_data(n: usize) -> Vec<Features> {
        (0..n)
            .map(|i| {
                [
                    (i as f64).sin() * 10.0 + 50.0,
                    (i % 24) as f64,
                    (i % 5) as f64,
                    if i % 2 == 0 { 1.0 } else { 0.0 },
                    if i % 2 != 0 { 1.0 } else { 0.0 },
                ]
            })
            .collect()
    }

    #[test]
    fn fit_requires_enough_samples() {
        let data = clustered_data(10);
        let mut forest = IsolationForest::new(50, 64);
        let err = forest.fit(&data).unwrap_err();
        assert!(matches!(
            err,
            AnalysisError::InsufficientData { have: 10, need: 64 }
        ));
    }

    #[test]
    fn outliers_score_higher_than_cluster_members() {
        let data = clustered_data(300);
        let mut forest = IsolationForest::new(100, 128);
        forest.fit(&data).unwrap();
        assert!(forest.is_trained());

        let normal = forest.outlier_score(&data[50]);
        let outlier = forest.outlier_score(&[5_000.0, 3.0, 400.0, 1.0, 0.0]);
        assert!(outlier > normal);
        assert!(normal > 0.0 && normal < 1.0);
        assert!(outlier > 0.0 && outlier < 1.0);
    }

    #[test]
    fn fitting_identical_data_is_deterministic() {
        let data = clustered_data(200);
        let mut first = IsolationForest::new(50, 64);
        let mut second = IsolationForest::new(50, 64);
        first.fit(&data).unwrap();
        second.fit(&data).unwrap();
        for sample in &data {
            assert_eq!(first.outlier_score(sample), second.outlier_score(sample));
        }
    }

    #[test]
    fn model_survives_serialization() {
        let data = clustered_data(200);
        let mut forest = IsolationForest::new(50, 64);
        forest.fit(&data).unwrap();
        let encoded = serde_json::to_string(&forest).unwrap();
        let decoded: IsolationForest = serde_json::from_str(&encoded).unwrap();
        for sample in data.iter().take(20) {
            assert_eq!(forest.outlier_score(sample), decoded.outlier_score(sample));
        }
    }
}

// Isolation-forest anomaly scorer.
//
// Ported from the isolation-forest implementation that shipped in this
// workspace's predecessor (`ai_core::production_ml`), trimmed to just the
// isolation-forest primitive the ML anomaly detector needs.

use rand::seq::SliceRandom;
use rand::Rng;

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

struct IsolationTree {
    root: IsolationNode,
}

impl IsolationTree {
    fn build(data: &[Vec<f64>], height_limit: usize, rng: &mut impl Rng) -> Self {
        IsolationTree {
            root: Self::build_recursive(data, 0, height_limit, rng),
        }
    }

    fn build_recursive(
        data: &[Vec<f64>],
        depth: usize,
        height_limit: usize,
        rng: &mut impl Rng,
    ) -> IsolationNode {
        if data.len() <= 1 || depth >= height_limit {
            return IsolationNode::Leaf { size: data.len() };
        }
        let dim = data[0].len();
        if dim == 0 {
            return IsolationNode::Leaf { size: data.len() };
        }
        let split_feature = rng.gen_range(0..dim);
        let mut min_val = f64::INFINITY;
        let mut max_val = f64::NEG_INFINITY;
        for point in data {
            let v = point[split_feature];
            if v < min_val {
                min_val = v;
            }
            if v > max_val {
                max_val = v;
            }
        }
        if (max_val - min_val).abs() < 1e-10 {
            return IsolationNode::Leaf { size: data.len() };
        }
        let split_value = rng.gen_range(min_val..max_val);
        let mut left_data = Vec::new();
        let mut right_data = Vec::new();
        for point in data {
            if point[split_feature] < split_value {
                left_data.push(point.clone());
            } else {
                right_data.push(point.clone());
            }
        }
        IsolationNode::Internal {
            split_feature,
            split_value,
            left: Box::new(Self::build_recursive(&left_data, depth + 1, height_limit, rng)),
            right: Box::new(Self::build_recursive(&right_data, depth + 1, height_limit, rng)),
        }
    }

    fn path_length(&self, point: &[f64]) -> f64 {
        Self::path_length_recursive(&self.root, point, 0)
    }

    fn path_length_recursive(node: &IsolationNode, point: &[f64], depth: usize) -> f64 {
        match node {
            IsolationNode::Leaf { size } => depth as f64 + c_factor(*size),
            IsolationNode::Internal {
                split_feature,
                split_value,
                left,
                right,
            } => {
                if point[*split_feature] < *split_value {
                    Self::path_length_recursive(left, point, depth + 1)
                } else {
                    Self::path_length_recursive(right, point, depth + 1)
                }
            }
        }
    }
}

/// Average path length of an unsuccessful BST search: c(n) = 2H(n-1) - 2(n-1)/n
fn c_factor(n: usize) -> f64 {
    if n <= 1 {
        return 0.0;
    }
    let n_f = n as f64;
    2.0 * harmonic(n - 1) - 2.0 * (n_f - 1.0) / n_f
}

fn harmonic(n: usize) -> f64 {
    if n == 0 {
        return 0.0;
    }
    (n as f64).ln() + 0.5772156649
}

/// Isolation forest: an ensemble of random-split trees whose average path
/// length to isolate a point is inversely related to how anomalous it is.
/// `score()` returns a value in `(0, 1)`; values near 1 indicate strong
/// outliers, values near or below 0.5 indicate points consistent with the
/// training distribution.
pub struct IsolationForest {
    trees: Vec<IsolationTree>,
    subsample_size: usize,
    num_trees: usize,
    trained: bool,
}

impl IsolationForest {
    pub fn new(num_trees: usize, subsample_size: usize) -> Self {
        IsolationForest {
            trees: Vec::new(),
            subsample_size,
            num_trees,
            trained: false,
        }
    }

    pub fn fit(&mut self, data: &[Vec<f64>]) {
        if data.is_empty() {
            return;
        }
        let mut rng = rand::thread_rng();
        let height_limit = (self.subsample_size as f64).log2().ceil().max(1.0) as usize;
        self.trees.clear();

        for _ in 0..self.num_trees {
            let sample: Vec<Vec<f64>> = if data.len() <= self.subsample_size {
                data.to_vec()
            } else {
                let mut indices: Vec<usize> = (0..data.len()).collect();
                indices.shuffle(&mut rng);
                indices[..self.subsample_size]
                    .iter()
                    .map(|&i| data[i].clone())
                    .collect()
            };
            self.trees.push(IsolationTree::build(&sample, height_limit, &mut rng));
        }
        self.trained = true;
    }

    pub fn is_trained(&self) -> bool {
        self.trained
    }

    pub fn score(&self, point: &[f64]) -> f64 {
        if !self.trained || self.trees.is_empty() {
            return 0.5;
        }
        let avg_path: f64 =
            self.trees.iter().map(|t| t.path_length(point)).sum::<f64>() / self.trees.len() as f64;
        let c_n = c_factor(self.subsample_size);
        if c_n <= 0.0 {
            return 0.5;
        }
        2.0_f64.powf(-avg_path / c_n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cluster(center: &[f64], n: usize, spread: f64) -> Vec<Vec<f64>> {
        let mut rng = rand::thread_rng();
        (0..n)
            .map(|_| center.iter().map(|&c| c + rng.gen_range(-spread..spread)).collect())
            .collect()
    }

    #[test]
    fn untrained_forest_returns_midpoint_score() {
        let forest = IsolationForest::new(50, 128);
        assert!((forest.score(&[0.0, 0.0]) - 0.5).abs() < 1e-10);
    }

    #[test]
    fn outliers_score_higher_than_cluster_points() {
        let normal = make_cluster(&[0.0; 25], 256, 1.0);
        let mut forest = IsolationForest::new(80, 256);
        forest.fit(&normal);

        let normal_score = forest.score(&[0.0; 25]);
        let mut outlier = [0.0; 25];
        outlier[0] = 40.0;
        outlier[7] = 35.0;
        let outlier_score = forest.score(&outlier);

        assert!(
            outlier_score > normal_score,
            "outlier_score={outlier_score} should exceed normal_score={normal_score}"
        );
    }

    #[test]
    fn fit_on_empty_data_leaves_forest_untrained() {
        let mut forest = IsolationForest::new(10, 64);
        forest.fit(&[]);
        assert!(!forest.is_trained());
        assert!((forest.score(&[1.0]) - 0.5).abs() < 1e-10);
    }
}

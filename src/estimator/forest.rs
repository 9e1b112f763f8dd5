use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{Target, Tree, TreeBuilder};
use super::{class_indices, validate_classes, validate_training_set, Classifier, FitError};

/// Random forest of Gini decision trees.
///
/// Each tree sees a bootstrap sample and considers √n_features random
/// features per split. Trees are grown on the rayon pool; tree `i` is seeded
/// with `seed + i`, so a fit is reproducible regardless of scheduling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    n_trees: usize,
    max_depth: Option<usize>,
    min_samples_split: usize,
    seed: u64,
    classes: Vec<i64>,
    n_features: usize,
    trees: Vec<Tree>,
}

impl RandomForest {
    pub fn new(n_trees: usize, max_depth: Option<usize>, min_samples_split: usize, seed: u64) -> Self {
        Self {
            n_trees,
            max_depth,
            min_samples_split,
            seed,
            classes: Vec::new(),
            n_features: 0,
            trees: Vec::new(),
        }
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }
}

impl Classifier for RandomForest {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[i64]) -> Result<(), FitError> {
        if self.n_trees == 0 {
            return Err(FitError::Unsupported("random forest needs at least one tree".into()));
        }
        let classes = validate_training_set(x, y)?;
        let labels = class_indices(&classes, y);
        let (n_samples, n_features) = x.dim();

        let max_features = ((n_features as f64).sqrt().round() as usize).max(1);
        let builder = TreeBuilder {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            max_features: Some(max_features),
        };
        let target = Target::Classes { labels: &labels, n_classes: classes.len() };
        let seed = self.seed;

        let trees: Vec<Tree> = (0..self.n_trees)
            .into_par_iter()
            .map(|i| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(i as u64));
                let bootstrap: Vec<usize> =
                    (0..n_samples).map(|_| rng.random_range(0..n_samples)).collect();
                builder.grow(x, &target, bootstrap, &mut rng)
            })
            .collect();

        debug!(
            "grew {} trees, {} nodes total",
            trees.len(),
            trees.iter().map(Tree::node_count).sum::<usize>()
        );

        self.trees = trees;
        self.classes = classes;
        self.n_features = n_features;
        Ok(())
    }

    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let mut proba = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (p, v) in proba.iter_mut().zip(tree.evaluate(row)) {
                *p += v;
            }
        }
        let n = self.trees.len() as f64;
        proba.iter_mut().for_each(|p| *p /= n);
        proba
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn validate(&self) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.trees.is_empty() {
            return Err("random forest has no trees".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| format!("tree {}: {}", i, e))?;
            if tree.leaves().flatten().any(|p| !(0.0..=1.0).contains(p)) {
                return Err(format!("tree {}: leaf probability outside [0, 1]", i));
            }
        }
        Ok(())
    }
}

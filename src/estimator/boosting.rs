use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::tree::{Target, Tree, TreeBuilder};
use super::{sigmoid, validate_classes, validate_training_set, Classifier, FitError};

/// Gradient boosted trees for binary classification.
///
/// Each round fits a regression tree to the log-loss gradients and uses
/// Newton steps as leaf values. The raw score starts at the log-odds of the
/// positive class.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradientBoosting {
    n_rounds: usize,
    learning_rate: f64,
    max_depth: usize,
    classes: Vec<i64>,
    n_features: usize,
    base_score: f64,
    trees: Vec<Tree>,
}

impl GradientBoosting {
    pub fn new(n_rounds: usize, learning_rate: f64, max_depth: usize) -> Self {
        Self {
            n_rounds,
            learning_rate,
            max_depth,
            classes: Vec::new(),
            n_features: 0,
            base_score: 0.0,
            trees: Vec::new(),
        }
    }

    fn raw_score(&self, row: ArrayView1<'_, f64>) -> f64 {
        self.trees
            .iter()
            .fold(self.base_score, |acc, tree| acc + self.learning_rate * tree.evaluate(row)[0])
    }
}

impl Classifier for GradientBoosting {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[i64]) -> Result<(), FitError> {
        let classes = validate_training_set(x, y)?;
        if classes.len() != 2 {
            return Err(FitError::Unsupported(format!(
                "gradient boosting supports binary labels only, got {} classes",
                classes.len()
            )));
        }

        let n_samples = x.nrows();
        let targets: Vec<f64> = y
            .iter()
            .map(|&label| if label == classes[1] { 1.0 } else { 0.0 })
            .collect();

        let positive_rate = (targets.iter().sum::<f64>() / n_samples as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (positive_rate / (1.0 - positive_rate)).ln();

        let builder = TreeBuilder {
            max_depth: Some(self.max_depth),
            min_samples_split: 2,
            max_features: None,
        };
        // Feature subsampling is off, the generator is never drawn from.
        let mut rng = StdRng::seed_from_u64(0);

        let mut scores = vec![base_score; n_samples];
        let mut trees = Vec::with_capacity(self.n_rounds);
        for _ in 0..self.n_rounds {
            let mut gradients = Vec::with_capacity(n_samples);
            let mut hessians = Vec::with_capacity(n_samples);
            for (score, target) in scores.iter().zip(&targets) {
                let p = sigmoid(*score);
                gradients.push(p - target);
                hessians.push((p * (1.0 - p)).max(1e-12));
            }

            let tree = builder.grow(
                x,
                &Target::Gradients { gradients: &gradients, hessians: &hessians },
                (0..n_samples).collect(),
                &mut rng,
            );
            for (i, score) in scores.iter_mut().enumerate() {
                *score += self.learning_rate * tree.evaluate(x.row(i))[0];
            }
            trees.push(tree);
        }
        debug!("boosted {} rounds, base score {:.4}", trees.len(), base_score);

        self.classes = classes;
        self.n_features = x.ncols();
        self.base_score = base_score;
        self.trees = trees;
        Ok(())
    }

    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let p = sigmoid(self.raw_score(row));
        vec![1.0 - p, p]
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.n_features
    }

    fn validate(&self) -> Result<(), String> {
        validate_classes(&self.classes)?;
        if self.classes.len() != 2 {
            return Err(format!("gradient boosting is binary, found {} classes", self.classes.len()));
        }
        if !self.base_score.is_finite() || !self.learning_rate.is_finite() {
            return Err("non-finite base score or learning rate".into());
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, 1)
                .map_err(|e| format!("round {}: {}", i, e))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_boosting_learns_threshold() {
        let x = array![[1.0], [2.0], [3.0], [4.0], [6.0], [7.0], [8.0], [9.0]];
        let y = [0, 0, 0, 0, 1, 1, 1, 1];
        let mut model = GradientBoosting::new(50, 0.3, 2);
        model.fit(x.view(), &y).unwrap();

        assert_eq!(model.score(x.view(), &y), 1.0);
        let (label, confidence) = model.predict_row(array![8.5].view());
        assert_eq!(label, 1);
        assert!(confidence > 0.9 && confidence <= 1.0);
    }

    #[test]
    fn test_zero_rounds_predicts_base_rate() {
        let x = array![[0.0], [1.0], [2.0], [3.0]];
        let y = [0, 1, 1, 1];
        let mut model = GradientBoosting::new(0, 0.1, 3);
        model.fit(x.view(), &y).unwrap();

        let proba = model.predict_proba_row(array![0.0].view());
        assert!((proba[1] - 0.75).abs() < 1e-9);
    }

    #[test]
    fn test_multiclass_is_rejected() {
        let x = array![[0.0], [1.0], [2.0]];
        let mut model = GradientBoosting::new(10, 0.1, 3);
        let err = model.fit(x.view(), &[0, 1, 2]).unwrap_err();
        assert!(err.to_string().contains("binary labels only"));
    }

    #[test]
    fn test_validate_fitted_and_unfitted() {
        let x = array![[1.0], [2.0], [8.0], [9.0]];
        let mut model = GradientBoosting::new(5, 0.3, 2);
        assert!(model.validate().is_err());

        model.fit(x.view(), &[0, 0, 1, 1]).unwrap();
        assert!(model.validate().is_ok());

        model.n_features = 0;
        assert!(model.validate().unwrap_err().contains("round 0"));
    }
}

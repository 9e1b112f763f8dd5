use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::scaler::StandardScaler;
use super::{sigmoid, validate_classes, validate_training_set, Classifier, FitError};

/// Standard scaling followed by logistic regression.
///
/// Two classes are handled by a single sigmoid unit. More classes use
/// one-vs-rest units whose scores are normalized into a distribution.
/// Weights are found with batch gradient descent on the scaled features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogisticPipeline {
    learning_rate: f64,
    max_iter: usize,
    tol: f64,
    scaler: StandardScaler,
    classes: Vec<i64>,
    /// One weight vector per sigmoid unit
    weights: Vec<Vec<f64>>,
    intercepts: Vec<f64>,
}

impl LogisticPipeline {
    pub fn new(learning_rate: f64, max_iter: usize, tol: f64) -> Self {
        Self {
            learning_rate,
            max_iter,
            tol,
            scaler: StandardScaler::new(),
            classes: Vec::new(),
            weights: Vec::new(),
            intercepts: Vec::new(),
        }
    }

    /// Fits one sigmoid unit against 0/1 targets.
    fn fit_unit(&self, x: ArrayView2<'_, f64>, targets: &Array1<f64>) -> (Vec<f64>, f64) {
        let (n_samples, n_features) = x.dim();
        let n = n_samples as f64;
        let mut w = Array1::<f64>::zeros(n_features);
        let mut b = 0.0;

        for iter in 0..self.max_iter {
            let z = x.dot(&w) + b;
            let residual = z.mapv(sigmoid) - targets;

            let grad_w = x.t().dot(&residual) / n;
            let grad_b = residual.sum() / n;

            w.scaled_add(-self.learning_rate, &grad_w);
            b -= self.learning_rate * grad_b;

            let largest = grad_w.iter().fold(grad_b.abs(), |acc, g| acc.max(g.abs()));
            if largest < self.tol {
                debug!("logistic unit converged after {} iterations", iter + 1);
                break;
            }
        }

        (w.to_vec(), b)
    }

    fn unit_score(&self, unit: usize, scaled: &[f64]) -> f64 {
        let z = self.weights[unit]
            .iter()
            .zip(scaled)
            .fold(self.intercepts[unit], |acc, (w, v)| acc + w * v);
        sigmoid(z)
    }
}

impl Classifier for LogisticPipeline {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[i64]) -> Result<(), FitError> {
        let classes = validate_training_set(x, y)?;

        self.scaler.fit(x);
        let scaled = self.scaler.transform(x);

        // A binary problem only needs the unit for the positive class.
        let positives: Vec<i64> = if classes.len() == 2 {
            vec![classes[1]]
        } else {
            classes.clone()
        };

        self.weights.clear();
        self.intercepts.clear();
        for positive in positives {
            let targets: Array1<f64> =
                y.iter().map(|&label| if label == positive { 1.0 } else { 0.0 }).collect();
            let (w, b) = self.fit_unit(scaled.view(), &targets);
            self.weights.push(w);
            self.intercepts.push(b);
        }
        self.classes = classes;
        Ok(())
    }

    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        let scaled = self.scaler.transform_row(row);
        if self.classes.len() == 2 {
            let p = self.unit_score(0, &scaled);
            return vec![1.0 - p, p];
        }

        let scores: Vec<f64> = (0..self.weights.len())
            .map(|unit| self.unit_score(unit, &scaled))
            .collect();
        let total: f64 = scores.iter().sum();
        scores.into_iter().map(|s| s / total).collect()
    }

    fn classes(&self) -> &[i64] {
        &self.classes
    }

    fn n_features(&self) -> usize {
        self.scaler.mean().len()
    }

    fn validate(&self) -> Result<(), String> {
        validate_classes(&self.classes)?;
        let n_features = self.n_features();
        if n_features == 0 || self.scaler.scale().len() != n_features {
            return Err(format!(
                "scaler has {} means and {} scales",
                n_features,
                self.scaler.scale().len()
            ));
        }
        if self.scaler.mean().iter().any(|m| !m.is_finite())
            || self.scaler.scale().iter().any(|s| !(s.is_finite() && *s > 0.0))
        {
            return Err("scaler holds a non-finite mean or a non-positive scale".into());
        }

        let units = if self.classes.len() == 2 { 1 } else { self.classes.len() };
        if self.weights.len() != units || self.intercepts.len() != units {
            return Err(format!(
                "{} classes need {} units, found {} weight vectors and {} intercepts",
                self.classes.len(),
                units,
                self.weights.len(),
                self.intercepts.len()
            ));
        }
        for (unit, w) in self.weights.iter().enumerate() {
            if w.len() != n_features {
                return Err(format!("unit {} has {} weights, expected {}", unit, w.len(), n_features));
            }
            if w.iter().chain(Some(&self.intercepts[unit])).any(|v| !v.is_finite()) {
                return Err(format!("unit {} holds a non-finite weight", unit));
            }
        }
        Ok(())
    }
}

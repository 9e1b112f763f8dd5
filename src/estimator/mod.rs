//! # Estimators
//!
//! Classifiers that can be fit in-process when a model descriptor asks for a
//! freshly trained model instead of a serialized artifact.
//!
//! ## Key Components
//!
//! - `Classifier`: the fit / predict_proba contract every estimator follows
//! - `Estimator`: the closed set of estimators, serializable into artifacts
//! - `EstimatorSpec`: hyper-parameters as they appear in the configuration
//!
//! Labels are integer class ids. Probabilities returned by
//! `predict_proba_row` are aligned with `classes()`, which holds the sorted
//! unique labels seen during `fit`.

mod boosting;
mod forest;
mod logistic;
mod scaler;
mod tree;

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use logistic::LogisticPipeline;
pub use scaler::StandardScaler;

use std::error::Error;
use std::fmt;

use ndarray::{ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};

/// Errors raised while fitting an estimator.
#[derive(Debug, Clone, PartialEq)]
pub enum FitError {
    /// No training rows were provided
    EmptyTrainingSet,
    /// Feature rows and labels disagree in length
    LengthMismatch { samples: usize, labels: usize },
    /// A training value is NaN or infinite
    NonFinite { row: usize, column: usize },
    /// Fewer than two distinct labels
    TooFewClasses(usize),
    /// The estimator cannot handle this training set
    Unsupported(String),
}

impl fmt::Display for FitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FitError::EmptyTrainingSet => write!(f, "cannot fit with zero samples"),
            FitError::LengthMismatch { samples, labels } => write!(
                f,
                "number of samples ({}) and labels ({}) must match",
                samples, labels
            ),
            FitError::NonFinite { row, column } => {
                write!(f, "non-finite value at row {}, column {}", row, column)
            }
            FitError::TooFewClasses(n) => {
                write!(f, "need at least two classes to fit, got {}", n)
            }
            FitError::Unsupported(msg) => write!(f, "{}", msg),
        }
    }
}

impl Error for FitError {}

/// Contract shared by every in-process classifier.
pub trait Classifier {
    /// Fits the classifier on `x` (`n_samples` × `n_features`) and labels `y`.
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[i64]) -> Result<(), FitError>;

    /// Class probabilities for one row, aligned with `classes()`.
    ///
    /// The row must have `n_features()` values.
    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64>;

    /// Sorted class labels seen during fit. Empty until fitted.
    fn classes(&self) -> &[i64];

    /// Number of features the classifier was fit on.
    fn n_features(&self) -> usize;

    fn is_fitted(&self) -> bool {
        !self.classes().is_empty()
    }

    /// Checks that a fitted model is internally consistent, so that
    /// `predict_proba_row` cannot index out of bounds or yield values
    /// outside [0, 1]. Used on estimators decoded from artifacts.
    fn validate(&self) -> Result<(), String>;

    /// Most probable label and its probability.
    fn predict_row(&self, row: ArrayView1<'_, f64>) -> (i64, f64) {
        let proba = self.predict_proba_row(row);
        let best = argmax(&proba);
        (self.classes()[best], proba[best])
    }

    /// Accuracy on a labelled set.
    fn score(&self, x: ArrayView2<'_, f64>, y: &[i64]) -> f64 {
        if y.is_empty() {
            return 0.0;
        }
        let correct = x
            .rows()
            .into_iter()
            .zip(y)
            .filter(|(row, label)| self.predict_row(row.view()).0 == **label)
            .count();
        correct as f64 / y.len() as f64
    }
}

/// A fitted (or fittable) estimator.
///
/// This is the payload stored in model artifacts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Estimator {
    LogisticRegression(LogisticPipeline),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
}

impl Estimator {
    /// Short machine-readable name, matches the serde tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Estimator::LogisticRegression(_) => "logistic_regression",
            Estimator::RandomForest(_) => "random_forest",
            Estimator::GradientBoosting(_) => "gradient_boosting",
        }
    }

    fn inner(&self) -> &dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn Classifier {
        match self {
            Estimator::LogisticRegression(m) => m,
            Estimator::RandomForest(m) => m,
            Estimator::GradientBoosting(m) => m,
        }
    }
}

impl Classifier for Estimator {
    fn fit(&mut self, x: ArrayView2<'_, f64>, y: &[i64]) -> Result<(), FitError> {
        self.inner_mut().fit(x, y)
    }

    fn predict_proba_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        self.inner().predict_proba_row(row)
    }

    fn classes(&self) -> &[i64] {
        self.inner().classes()
    }

    fn n_features(&self) -> usize {
        self.inner().n_features()
    }

    fn validate(&self) -> Result<(), String> {
        self.inner().validate()
    }
}

/// Estimator hyper-parameters as written in the configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EstimatorSpec {
    /// Standard scaling followed by logistic regression
    LogisticRegression {
        #[serde(default = "default_logistic_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_max_iter")]
        max_iter: usize,
        #[serde(default = "default_tol")]
        tol: f64,
    },
    /// Bagged Gini trees
    RandomForest {
        #[serde(default = "default_n_trees")]
        n_trees: usize,
        #[serde(default)]
        max_depth: Option<usize>,
        #[serde(default = "default_min_samples_split")]
        min_samples_split: usize,
        #[serde(default = "default_seed")]
        seed: u64,
    },
    /// Binary log-loss gradient boosting
    GradientBoosting {
        #[serde(default = "default_n_rounds")]
        n_rounds: usize,
        #[serde(default = "default_boosting_learning_rate")]
        learning_rate: f64,
        #[serde(default = "default_boosting_depth")]
        max_depth: usize,
    },
}

fn default_logistic_learning_rate() -> f64 {
    0.1
}
fn default_max_iter() -> usize {
    1000
}
fn default_tol() -> f64 {
    1e-6
}
fn default_n_trees() -> usize {
    100
}
fn default_min_samples_split() -> usize {
    2
}
fn default_seed() -> u64 {
    42
}
fn default_n_rounds() -> usize {
    100
}
fn default_boosting_learning_rate() -> f64 {
    0.1
}
fn default_boosting_depth() -> usize {
    3
}

impl EstimatorSpec {
    /// Builds an unfitted estimator with these hyper-parameters.
    pub fn build(&self) -> Estimator {
        match *self {
            EstimatorSpec::LogisticRegression { learning_rate, max_iter, tol } => {
                Estimator::LogisticRegression(LogisticPipeline::new(learning_rate, max_iter, tol))
            }
            EstimatorSpec::RandomForest { n_trees, max_depth, min_samples_split, seed } => {
                Estimator::RandomForest(RandomForest::new(n_trees, max_depth, min_samples_split, seed))
            }
            EstimatorSpec::GradientBoosting { n_rounds, learning_rate, max_depth } => {
                Estimator::GradientBoosting(GradientBoosting::new(n_rounds, learning_rate, max_depth))
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EstimatorSpec::LogisticRegression { .. } => "logistic_regression",
            EstimatorSpec::RandomForest { .. } => "random_forest",
            EstimatorSpec::GradientBoosting { .. } => "gradient_boosting",
        }
    }

    /// Default logistic regression settings.
    pub fn logistic_regression() -> Self {
        EstimatorSpec::LogisticRegression {
            learning_rate: default_logistic_learning_rate(),
            max_iter: default_max_iter(),
            tol: default_tol(),
        }
    }

    /// Default random forest settings.
    pub fn random_forest() -> Self {
        EstimatorSpec::RandomForest {
            n_trees: default_n_trees(),
            max_depth: None,
            min_samples_split: default_min_samples_split(),
            seed: default_seed(),
        }
    }

    /// Default gradient boosting settings.
    pub fn gradient_boosting() -> Self {
        EstimatorSpec::GradientBoosting {
            n_rounds: default_n_rounds(),
            learning_rate: default_boosting_learning_rate(),
            max_depth: default_boosting_depth(),
        }
    }
}

/// Checks a training set and returns its sorted unique labels.
pub(crate) fn validate_training_set(x: ArrayView2<'_, f64>, y: &[i64]) -> Result<Vec<i64>, FitError> {
    let (n_samples, _) = x.dim();
    if n_samples == 0 {
        return Err(FitError::EmptyTrainingSet);
    }
    if n_samples != y.len() {
        return Err(FitError::LengthMismatch { samples: n_samples, labels: y.len() });
    }
    for ((row, column), value) in x.indexed_iter() {
        if !value.is_finite() {
            return Err(FitError::NonFinite { row, column });
        }
    }

    let mut classes = y.to_vec();
    classes.sort_unstable();
    classes.dedup();
    if classes.len() < 2 {
        return Err(FitError::TooFewClasses(classes.len()));
    }
    Ok(classes)
}

/// Maps each label to its index in `classes`.
/// Fitted classes must be at least two distinct labels in ascending order.
pub(crate) fn validate_classes(classes: &[i64]) -> Result<(), String> {
    if classes.len() < 2 {
        return Err(format!("expected at least two classes, found {}", classes.len()));
    }
    if classes.windows(2).any(|w| w[0] >= w[1]) {
        return Err(format!("classes {:?} are not sorted and distinct", classes));
    }
    Ok(())
}

pub(crate) fn class_indices(classes: &[i64], y: &[i64]) -> Vec<usize> {
    y.iter()
        .map(|label| classes.binary_search(label).unwrap_or_default())
        .collect()
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Index of the largest value; the first one wins ties.
pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, v) in values.iter().enumerate() {
        if *v > values[best] {
            best = i;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_validate_rejects_single_class() {
        let x = array![[1.0], [2.0]];
        let result = validate_training_set(x.view(), &[1, 1]);
        assert_eq!(result, Err(FitError::TooFewClasses(1)));
    }

    #[test]
    fn test_validate_rejects_nan() {
        let x = array![[1.0, 2.0], [f64::NAN, 0.0]];
        let result = validate_training_set(x.view(), &[0, 1]);
        assert_eq!(result, Err(FitError::NonFinite { row: 1, column: 0 }));
    }

    #[test]
    fn test_validate_sorts_classes() {
        let x = array![[1.0], [2.0], [3.0]];
        let classes = validate_training_set(x.view(), &[5, -1, 5]).unwrap();
        assert_eq!(classes, vec![-1, 5]);
        assert_eq!(class_indices(&classes, &[5, -1, 5]), vec![1, 0, 1]);
    }

    #[test]
    fn test_spec_deserializes_with_defaults() {
        let spec: EstimatorSpec =
            serde_json::from_str(r#"{"kind": "random_forest", "n_trees": 10}"#).unwrap();
        assert_eq!(
            spec,
            EstimatorSpec::RandomForest { n_trees: 10, max_depth: None, min_samples_split: 2, seed: 42 }
        );
        assert_eq!(spec.build().kind(), "random_forest");
    }

    #[test]
    fn test_validate_classes() {
        assert!(validate_classes(&[0, 1]).is_ok());
        assert!(validate_classes(&[1]).is_err());
        assert!(validate_classes(&[1, 0]).is_err());
        assert!(validate_classes(&[2, 2]).is_err());
    }

    #[test]
    fn test_argmax_first_wins_ties() {
        assert_eq!(argmax(&[0.5, 0.5]), 0);
        assert_eq!(argmax(&[0.1, 0.7, 0.2]), 1);
    }
}

use ndarray::{Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

/// Standardizes features by removing the mean and scaling to unit variance.
///
/// The standard score of a value x is `z = (x - mean) / std`. Constant
/// columns keep a scale of 1.0 so they map to zero instead of NaN.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StandardScaler {
    /// Mean of each feature (computed during fit)
    mean: Vec<f64>,
    /// Population standard deviation of each feature (computed during fit)
    scale: Vec<f64>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fit(&mut self, x: ArrayView2<'_, f64>) {
        let n_features = x.ncols();
        self.mean = x
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_else(|| vec![0.0; n_features]);
        self.scale = x
            .std_axis(Axis(0), 0.0)
            .iter()
            .map(|&s| if s > f64::EPSILON { s } else { 1.0 })
            .collect();
    }

    pub fn mean(&self) -> &[f64] {
        &self.mean
    }

    pub fn scale(&self) -> &[f64] {
        &self.scale
    }

    pub fn transform(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = x.to_owned();
        for mut row in out.rows_mut() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = (*v - self.mean[j]) / self.scale[j];
            }
        }
        out
    }

    pub fn transform_row(&self, row: ArrayView1<'_, f64>) -> Vec<f64> {
        row.iter()
            .enumerate()
            .map(|(j, v)| (v - self.mean[j]) / self.scale[j])
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_scaled_columns_are_centered() {
        let x = array![[1.0, 100.0], [2.0, 200.0], [3.0, 300.0], [4.0, 400.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(x.view());
        let scaled = scaler.transform(x.view());

        for col in scaled.columns() {
            let mean: f64 = col.sum() / col.len() as f64;
            assert!(mean.abs() < 1e-9);
        }
        assert!((scaler.mean()[1] - 250.0).abs() < 1e-9);
    }

    #[test]
    fn test_constant_column_maps_to_zero() {
        let x = array![[5.0, 1.0], [5.0, 2.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(x.view());
        assert_eq!(scaler.scale()[0], 1.0);
        let row = scaler.transform_row(array![5.0, 1.5].view());
        assert_eq!(row[0], 0.0);
        assert!(row[1].abs() < 1e-9);
    }
}

use std::fs::File;
use std::io::Read;
use std::path::Path;

use ndarray::{s, Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use tracing::info;

use super::types::DatasetError;

/// A fully numeric table loaded from CSV.
#[derive(Debug, Clone)]
pub struct Dataset {
    columns: Vec<String>,
    values: Array2<f64>,
}

/// Features and labels divided into a training part and a holdout part.
#[derive(Debug, Clone)]
pub struct TrainingSplit {
    /// Feature column names, in matrix column order
    pub feature_names: Vec<String>,
    pub x_train: Array2<f64>,
    pub y_train: Vec<i64>,
    pub x_test: Array2<f64>,
    pub y_test: Vec<i64>,
}

impl Dataset {
    /// Loads a CSV file with a header row. Every cell must be numeric.
    pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        Self::from_csv_columns(path, &[])
    }

    /// Loads only `columns` from a CSV file, in the given order. Other
    /// columns may hold text. An empty list loads every column.
    pub fn from_csv_columns<P: AsRef<Path>>(path: P, columns: &[String]) -> Result<Self, DatasetError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| DatasetError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let dataset = Self::from_reader_columns(file, columns)?;
        info!(
            "Loaded dataset {} ({} rows, {} columns)",
            path.display(),
            dataset.n_rows(),
            dataset.columns.len()
        );
        Ok(dataset)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, DatasetError> {
        Self::from_reader_columns(reader, &[])
    }

    pub fn from_reader_columns<R: Read>(reader: R, wanted: &[String]) -> Result<Self, DatasetError> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = reader.headers()?.iter().map(String::from).collect();

        let indices: Vec<usize> = if wanted.is_empty() {
            (0..headers.len()).collect()
        } else {
            wanted
                .iter()
                .map(|name| {
                    headers
                        .iter()
                        .position(|h| h == name)
                        .ok_or_else(|| DatasetError::MissingColumn(name.clone()))
                })
                .collect::<Result<_, _>>()?
        };
        let columns: Vec<String> = indices.iter().map(|&i| headers[i].clone()).collect();

        let mut values = Vec::new();
        let mut n_rows = 0;
        for record in reader.records() {
            let record = record?;
            let line = record.position().map_or(0, |p| p.line());
            for (column, &i) in columns.iter().zip(&indices) {
                let cell = record.get(i).unwrap_or("");
                let value: f64 = cell.parse().map_err(|_| DatasetError::NonNumeric {
                    column: column.clone(),
                    line,
                    value: cell.to_string(),
                })?;
                values.push(value);
            }
            n_rows += 1;
        }

        if n_rows == 0 {
            return Err(DatasetError::Empty);
        }
        let values = Array2::from_shape_vec((n_rows, columns.len()), values)
            .map_err(|e| DatasetError::Csv(e.to_string()))?;
        Ok(Self { columns, values })
    }

    /// Builds a dataset from already parsed values.
    pub fn from_parts(columns: Vec<String>, values: Array2<f64>) -> Result<Self, DatasetError> {
        if values.ncols() != columns.len() {
            return Err(DatasetError::Csv(format!(
                "{} column names for {} value columns",
                columns.len(),
                values.ncols()
            )));
        }
        if values.nrows() == 0 {
            return Err(DatasetError::Empty);
        }
        Ok(Self { columns, values })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// First `n` rows, for previews.
    pub fn head(&self, n: usize) -> ArrayView2<'_, f64> {
        let n = n.min(self.n_rows());
        self.values.slice(s![..n, ..])
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Mean of every column, in column order.
    pub fn column_means(&self) -> Vec<(String, f64)> {
        let means = self
            .values
            .mean_axis(Axis(0))
            .map(|m| m.to_vec())
            .unwrap_or_else(|| vec![0.0; self.columns.len()]);
        self.columns.iter().cloned().zip(means).collect()
    }

    /// Separates the label column from the features.
    ///
    /// Returns the feature names, the feature matrix and the integer labels.
    pub fn features_and_labels(
        &self,
        label_column: &str,
    ) -> Result<(Vec<String>, Array2<f64>, Vec<i64>), DatasetError> {
        let label_index = self
            .column_index(label_column)
            .ok_or_else(|| DatasetError::MissingColumn(label_column.to_string()))?;

        let feature_indices: Vec<usize> =
            (0..self.columns.len()).filter(|&i| i != label_index).collect();
        let feature_names = feature_indices.iter().map(|&i| self.columns[i].clone()).collect();
        let features = self.values.select(Axis(1), &feature_indices);

        let mut labels = Vec::with_capacity(self.n_rows());
        for (line, &value) in self.values.column(label_index).iter().enumerate() {
            if !value.is_finite() || value.fract() != 0.0 {
                return Err(DatasetError::NonIntegralLabel { line: line + 1, value });
            }
            labels.push(value as i64);
        }

        Ok((feature_names, features, labels))
    }

    /// Shuffles rows with a seeded generator and holds out
    /// `ceil(n_rows * test_size)` of them.
    pub fn train_test_split(
        &self,
        label_column: &str,
        test_size: f64,
        seed: u64,
    ) -> Result<TrainingSplit, DatasetError> {
        if !(test_size > 0.0 && test_size < 1.0) {
            return Err(DatasetError::InvalidSplit(format!(
                "test_size must be between 0 and 1, got {}",
                test_size
            )));
        }
        let n = self.n_rows();
        if n < 2 {
            return Err(DatasetError::InvalidSplit(format!("need at least 2 rows, got {}", n)));
        }

        let (feature_names, features, labels) = self.features_and_labels(label_column)?;

        let mut indices: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        indices.shuffle(&mut rng);

        let n_test = ((n as f64 * test_size).ceil() as usize).clamp(1, n - 1);
        let (test_idx, train_idx) = indices.split_at(n_test);

        Ok(TrainingSplit {
            feature_names,
            x_train: features.select(Axis(0), train_idx),
            y_train: train_idx.iter().map(|&i| labels[i]).collect(),
            x_test: features.select(Axis(0), test_idx),
            y_test: test_idx.iter().map(|&i| labels[i]).collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TUMOR_CSV: &str = "\
Area,Perimeter,Tumor
10.0,3.0,0
12.0,3.5,0
11.0,3.2,0
40.0,9.0,1
42.0,9.5,1
41.0,9.2,1
13.0,3.9,0
39.0,8.8,1
9.5,2.9,0
44.0,9.9,1
";

    fn tumor() -> Dataset {
        Dataset::from_reader(TUMOR_CSV.as_bytes()).unwrap()
    }

    #[test]
    fn test_loads_header_and_rows() {
        let dataset = tumor();
        assert_eq!(dataset.columns(), &["Area", "Perimeter", "Tumor"]);
        assert_eq!(dataset.n_rows(), 10);
        assert_eq!(dataset.head(3).nrows(), 3);
        assert_eq!(dataset.head(50).nrows(), 10);
    }

    #[test]
    fn test_non_numeric_cell_reports_column_and_line() {
        let err = Dataset::from_reader("a,b\n1,2\n3,x\n".as_bytes()).unwrap_err();
        match err {
            DatasetError::NonNumeric { column, line, value } => {
                assert_eq!(column, "b");
                assert_eq!(line, 3);
                assert_eq!(value, "x");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_header_only_is_empty() {
        assert!(matches!(Dataset::from_reader("a,b\n".as_bytes()), Err(DatasetError::Empty)));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let err = Dataset::from_csv("definitely/not/here.csv").unwrap_err();
        assert!(matches!(err, DatasetError::Io { .. }));
        assert!(err.to_string().contains("definitely/not/here.csv"));
    }

    #[test]
    fn test_label_column_is_dropped_from_features() {
        let (names, x, y) = tumor().features_and_labels("Tumor").unwrap();
        assert_eq!(names, vec!["Area", "Perimeter"]);
        assert_eq!(x.ncols(), 2);
        assert_eq!(y.iter().filter(|&&l| l == 1).count(), 5);
    }

    #[test]
    fn test_missing_label_column() {
        let err = tumor().features_and_labels("Diagnosis").unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(c) if c == "Diagnosis"));
    }

    #[test]
    fn test_fractional_label_is_rejected() {
        let dataset = Dataset::from_reader("a,y\n1,0\n2,0.5\n".as_bytes()).unwrap();
        let err = dataset.features_and_labels("y").unwrap_err();
        assert!(matches!(err, DatasetError::NonIntegralLabel { line: 2, .. }));
    }

    #[test]
    fn test_split_sizes_and_determinism() {
        let dataset = tumor();
        let a = dataset.train_test_split("Tumor", 0.2, 42).unwrap();
        let b = dataset.train_test_split("Tumor", 0.2, 42).unwrap();

        assert_eq!(a.x_test.nrows(), 2);
        assert_eq!(a.x_train.nrows(), 8);
        assert_eq!(a.y_train.len(), 8);
        assert_eq!(a.x_train, b.x_train);
        assert_eq!(a.y_test, b.y_test);
    }

    #[test]
    fn test_split_rejects_bad_test_size() {
        let err = tumor().train_test_split("Tumor", 1.0, 42).unwrap_err();
        assert!(matches!(err, DatasetError::InvalidSplit(_)));
    }

    #[test]
    fn test_column_means() {
        let means = tumor().column_means();
        assert_eq!(means[2].0, "Tumor");
        assert!((means[2].1 - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_selected_columns_skip_text() {
        let csv = "UDI,Type,Torque [Nm],Machine failure\n1,M,42.8,0\n2,L,61.5,1\n";
        let wanted = vec!["Torque [Nm]".to_string(), "Machine failure".to_string()];
        let dataset = Dataset::from_reader_columns(csv.as_bytes(), &wanted).unwrap();
        assert_eq!(dataset.columns(), wanted.as_slice());
        assert_eq!(dataset.values()[[1, 0]], 61.5);

        let missing = vec!["Tool wear [min]".to_string()];
        let err = Dataset::from_reader_columns(csv.as_bytes(), &missing).unwrap_err();
        assert!(matches!(err, DatasetError::MissingColumn(c) if c == "Tool wear [min]"));
        assert!(Dataset::from_reader(csv.as_bytes()).is_err());
    }
}

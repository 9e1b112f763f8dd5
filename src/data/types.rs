use std::error::Error;
use std::fmt;
use std::path::PathBuf;

/// Errors raised while loading or splitting a dataset
#[derive(Debug)]
pub enum DatasetError {
    /// The CSV file could not be opened or read
    Io { path: PathBuf, message: String },
    /// Malformed CSV (ragged rows, bad quoting)
    Csv(String),
    /// The file has a header but no data rows
    Empty,
    /// A cell does not parse as a number
    NonNumeric { column: String, line: u64, value: String },
    /// A required column is absent
    MissingColumn(String),
    /// A label value is not an integer class id
    NonIntegralLabel { line: usize, value: f64 },
    /// `test_size` outside (0, 1) or too few rows to split
    InvalidSplit(String),
}

impl fmt::Display for DatasetError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DatasetError::Io { path, message } => {
                write!(f, "Could not load '{}': {}", path.display(), message)
            }
            DatasetError::Csv(msg) => write!(f, "Malformed CSV: {}", msg),
            DatasetError::Empty => write!(f, "Dataset has no rows"),
            DatasetError::NonNumeric { column, line, value } => write!(
                f,
                "Column '{}' has non-numeric value '{}' on line {}",
                column, value, line
            ),
            DatasetError::MissingColumn(column) => write!(f, "Column '{}' not found", column),
            DatasetError::NonIntegralLabel { line, value } => {
                write!(f, "Label {} on data row {} is not an integer class", value, line)
            }
            DatasetError::InvalidSplit(msg) => write!(f, "Invalid train/test split: {}", msg),
        }
    }
}

impl Error for DatasetError {}

impl From<csv::Error> for DatasetError {
    fn from(err: csv::Error) -> Self {
        DatasetError::Csv(err.to_string())
    }
}

/// A feature row that does not match a model's column set.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaError {
    /// Columns the model needs that the row lacks
    pub missing: Vec<String>,
    /// Columns in the row the model was not fit on
    pub unexpected: Vec<String>,
}

impl fmt::Display for SchemaError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut parts = Vec::new();
        if !self.missing.is_empty() {
            parts.push(format!("missing columns [{}]", self.missing.join(", ")));
        }
        if !self.unexpected.is_empty() {
            parts.push(format!("unexpected columns [{}]", self.unexpected.join(", ")));
        }
        write!(f, "{}", parts.join("; "))
    }
}

impl Error for SchemaError {}

/// Errors raised when setting a value on the input form
#[derive(Debug, Clone, PartialEq)]
pub enum InputError {
    /// No field has this column name or label
    UnknownField(String),
    /// Value outside the declared bounds
    OutOfRange { field: String, value: f64, min: Option<f64>, max: Option<f64> },
    /// Not a finite number
    NotANumber { field: String, value: String },
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InputError::UnknownField(name) => write!(f, "Unknown input field '{}'", name),
            InputError::OutOfRange { field, value, min, max } => {
                let bound = |b: &Option<f64>| b.map_or_else(|| "-".to_string(), |v| v.to_string());
                write!(
                    f,
                    "{} = {} is outside [{}, {}]",
                    field,
                    value,
                    bound(min),
                    bound(max)
                )
            }
            InputError::NotANumber { field, value } => {
                write!(f, "'{}' is not a valid number for {}", value, field)
            }
        }
    }
}

impl Error for InputError {}

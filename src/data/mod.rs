//! Tabular data handling: CSV datasets, train/test splits, feature rows and
//! the numeric input form used by the interactive surfaces.

mod dataset;
mod input;
mod row;
mod types;

pub use dataset::{Dataset, TrainingSplit};
pub use input::{parse_assignment, InputField, InputForm};
pub use row::FeatureRow;
pub use types::{DatasetError, InputError, SchemaError};

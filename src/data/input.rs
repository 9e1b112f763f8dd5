use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;

use super::dataset::Dataset;
use super::row::FeatureRow;
use super::types::InputError;

/// `column=value`, with optional spaces around `=`. Column names may contain
/// spaces and brackets.
static ASSIGNMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*([^=]*[^=\s])\s*=\s*(\S+)\s*$").expect("valid assignment regex"));

/// Splits `column=value` into its parts. Returns `None` when the text is not
/// an assignment or the value is not a number.
pub fn parse_assignment(text: &str) -> Option<(String, f64)> {
    let captures = ASSIGNMENT.captures(text)?;
    let value = captures[2].parse::<f64>().ok()?;
    Some((captures[1].to_string(), value))
}

/// A numeric input as declared in the configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InputField {
    /// Feature column the value feeds
    pub column: String,
    /// Name shown to the user, defaults to the column
    #[serde(default)]
    pub label: Option<String>,
    /// Unit shown next to the value
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
    pub default: f64,
    /// Added to the entered value before it reaches the model (°C → K)
    #[serde(default)]
    pub offset: f64,
}

impl InputField {
    pub fn display_name(&self) -> &str {
        self.label.as_deref().unwrap_or(&self.column)
    }

    fn matches(&self, name: &str) -> bool {
        self.column == name
            || self.column.eq_ignore_ascii_case(name)
            || self.label.as_deref().is_some_and(|l| l.eq_ignore_ascii_case(name))
    }

    fn check(&self, value: f64) -> Result<(), InputError> {
        if !value.is_finite() {
            return Err(InputError::NotANumber {
                field: self.display_name().to_string(),
                value: value.to_string(),
            });
        }
        let below = self.min.is_some_and(|min| value < min);
        let above = self.max.is_some_and(|max| value > max);
        if below || above {
            return Err(InputError::OutOfRange {
                field: self.display_name().to_string(),
                value,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }
}

/// The current values of a set of input fields.
///
/// Values are held in the units the user types; `to_row` applies each
/// field's offset.
#[derive(Debug, Clone)]
pub struct InputForm {
    fields: Vec<InputField>,
    values: Vec<f64>,
}

impl InputForm {
    pub fn new(fields: Vec<InputField>) -> Self {
        let values = fields.iter().map(|f| f.default).collect();
        Self { fields, values }
    }

    /// One field per feature column of `dataset`, starting at the column mean.
    ///
    /// Columns with a configured field keep its label, unit and bounds; the
    /// others get an unbounded field.
    pub fn from_dataset(dataset: &Dataset, label_column: &str, configured: &[InputField]) -> Self {
        let means = dataset.column_means();
        let fields = means
            .iter()
            .filter(|(column, _)| column != label_column)
            .map(|(column, mean)| {
                configured
                    .iter()
                    .find(|f| &f.column == column)
                    .cloned()
                    .unwrap_or_else(|| InputField {
                        column: column.clone(),
                        label: None,
                        unit: None,
                        min: None,
                        max: None,
                        default: *mean,
                        offset: 0.0,
                    })
            })
            .collect();
        let mut form = Self::new(fields);
        form.apply_means(&means);
        form
    }

    pub fn fields(&self) -> &[InputField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Fields paired with their current values.
    pub fn entries(&self) -> impl Iterator<Item = (&InputField, f64)> {
        self.fields.iter().zip(self.values.iter().copied())
    }

    pub fn value(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.values[i])
    }

    /// Sets a field by column name or label (case-insensitive).
    pub fn set(&mut self, name: &str, value: f64) -> Result<(), InputError> {
        let index = self
            .position(name)
            .ok_or_else(|| InputError::UnknownField(name.to_string()))?;
        self.fields[index].check(value)?;
        self.values[index] = value;
        Ok(())
    }

    /// Parses `raw` and sets it.
    pub fn set_str(&mut self, name: &str, raw: &str) -> Result<(), InputError> {
        let index = self
            .position(name)
            .ok_or_else(|| InputError::UnknownField(name.to_string()))?;
        let value = raw.trim().parse::<f64>().map_err(|_| InputError::NotANumber {
            field: self.fields[index].display_name().to_string(),
            value: raw.to_string(),
        })?;
        self.set(name, value)
    }

    /// Replaces defaults with dataset column means where the column exists.
    /// Means are in model units, so the field offset is taken back out.
    pub fn apply_means(&mut self, means: &[(String, f64)]) {
        for (field, value) in self.fields.iter_mut().zip(self.values.iter_mut()) {
            if let Some((_, mean)) = means.iter().find(|(column, _)| *column == field.column) {
                field.default = mean - field.offset;
                *value = field.default;
            }
        }
    }

    pub fn reset(&mut self) {
        for (field, value) in self.fields.iter().zip(self.values.iter_mut()) {
            *value = field.default;
        }
    }

    /// The row a model sees: one column per field, offsets applied.
    pub fn to_row(&self) -> FeatureRow {
        self.entries()
            .map(|(field, value)| (field.column.clone(), value + field.offset))
            .collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        let name = name.trim();
        self.fields
            .iter()
            .position(|f| f.column == name)
            .or_else(|| self.fields.iter().position(|f| f.matches(name)))
    }
}

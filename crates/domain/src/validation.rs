//! Structural validation results for aggregate factories and behaviors.

use serde::Serialize;

/// One failed structural check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    /// Name of the offending input field.
    pub field: &'static str,
    /// Human-readable explanation.
    pub message: String,
}

/// Every structural problem found in one input, in the order checked.
///
/// Factories collect all failures instead of stopping at the first, so a
/// caller can report them together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(Vec<ValidationError>);

impl ValidationErrors {
    /// Creates an empty error list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a failure for `field`.
    pub fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(ValidationError {
            field,
            message: message.into(),
        });
    }

    /// Records a failure when `failed` is true.
    pub fn check(&mut self, failed: bool, field: &'static str, message: impl Into<String>) {
        if failed {
            self.push(field, message);
        }
    }

    /// Returns true if no failure was recorded.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of failures.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if any failure concerns `field`.
    pub fn has_field(&self, field: &str) -> bool {
        self.0.iter().any(|e| e.field == field)
    }

    /// Iterates over the failures.
    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    /// Returns `Ok(value)` when nothing failed, the collected errors otherwise.
    pub fn into_result<T>(self, value: impl FnOnce() -> T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value())
        } else {
            Err(self)
        }
    }
}

impl std::fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "validation failed")?;
        for (i, error) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{sep}{} {}", error.field, error.message)?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}

/// Records an error when a finite `value` falls outside `min..=max`.
pub(crate) fn check_range(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<f64>,
    min: f64,
    max: f64,
) {
    let Some(value) = value else {
        return;
    };
    if !value.is_finite() {
        errors.push(field, "must be a finite number");
    } else if value < min || value > max {
        errors.push(field, format!("must be between {min} and {max}"));
    }
}

//! Encoded feature matrix.

/// Names of the encoded feature columns, in output order.
pub const FEATURE_NAMES: [&str; 19] = [
    "stage_sequence",
    "days_since_application",
    "age",
    "education",
    "source_encoded",
    "job_role_encoded",
    "department_encoded",
    "gender_encoded",
    "education_field_encoded",
    "age_squared",
    "age_normalized",
    "education_level",
    "stage_progress",
    "is_early_stage",
    "is_late_stage",
    "days_log",
    "is_slow_process",
    "source_success_rate",
    "age_education_interaction",
];

/// A row-major numeric matrix with named columns.
///
/// `rows[sample_idx][feature_idx]`, in the same order as the input records.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub(crate) feature_names: Vec<String>,
    pub(crate) rows: Vec<Vec<f64>>,
}

impl FeatureMatrix {
    pub(crate) fn new(rows: Vec<Vec<f64>>) -> Self {
        Self {
            feature_names: FEATURE_NAMES.iter().map(|name| (*name).to_string()).collect(),
            rows,
        }
    }

    /// Return the column names.
    #[must_use]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Return the rows.
    #[must_use]
    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Consume the matrix and return its rows.
    #[must_use]
    pub fn into_rows(self) -> Vec<Vec<f64>> {
        self.rows
    }

    /// Return the number of rows.
    #[must_use]
    pub fn n_samples(&self) -> usize {
        self.rows.len()
    }

    /// Return the number of columns.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    /// Return the index of a named column.
    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    /// Return every value of one column, top to bottom.
    #[must_use]
    pub fn column(&self, index: usize) -> Vec<f64> {
        self.rows.iter().map(|row| row[index]).collect()
    }
}

//! Tabular feature encoding: categorical codes, derived numeric features,
//! historical source success rates, and median imputation.
//!
//! [`FeatureEncoder::fit_transform`] learns every data-dependent quantity
//! (category codes, age moments, source success rates, column medians) from
//! the fit records and returns them as an immutable [`FittedEncodingState`].
//! [`FeatureEncoder::fit_transform_with_vocabulary`] widens only the category
//! codes to a larger record set.
//! [`transform`] replays that state on new records without refitting.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use rayon::prelude::*;
use tracing::{debug, info, instrument, warn};

use crate::config::EncoderConfig;
use crate::error::FeatureError;
use crate::matrix::{FEATURE_NAMES, FeatureMatrix};
use crate::record::{FunnelRecord, Status};

/// A categorical input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum CategoricalColumn {
    /// Recruiting source channel.
    Source,
    /// Job role.
    JobRole,
    /// Department.
    Department,
    /// Gender.
    Gender,
    /// Education field.
    EducationField,
}

impl CategoricalColumn {
    /// All categorical columns in encoding order.
    pub const ALL: [CategoricalColumn; 5] = [
        CategoricalColumn::Source,
        CategoricalColumn::JobRole,
        CategoricalColumn::Department,
        CategoricalColumn::Gender,
        CategoricalColumn::EducationField,
    ];

    /// Return the input column name.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            CategoricalColumn::Source => "Source",
            CategoricalColumn::JobRole => "Job_Role",
            CategoricalColumn::Department => "Department",
            CategoricalColumn::Gender => "Gender",
            CategoricalColumn::EducationField => "EducationField",
        }
    }

    fn value(self, record: &FunnelRecord) -> &str {
        match self {
            CategoricalColumn::Source => &record.source,
            CategoricalColumn::JobRole => &record.job_role,
            CategoricalColumn::Department => &record.department,
            CategoricalColumn::Gender => &record.gender,
            CategoricalColumn::EducationField => &record.education_field,
        }
    }
}

/// Category-to-code mapping for one column. Codes follow sorted string order.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CategoryCodes {
    column: CategoricalColumn,
    codes: BTreeMap<String, usize>,
}

impl CategoryCodes {
    fn fit<'a>(
        column: CategoricalColumn,
        records: impl Iterator<Item = &'a FunnelRecord>,
    ) -> Self {
        let distinct: BTreeSet<&str> = records.map(|r| column.value(r)).collect();
        let codes = distinct
            .into_iter()
            .enumerate()
            .map(|(code, value)| (value.to_string(), code))
            .collect();
        Self { column, codes }
    }

    /// Return the code for `value`.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownCategory`] if `value` was not seen at fit time.
    pub fn code(&self, value: &str) -> Result<usize, FeatureError> {
        self.codes
            .get(value)
            .copied()
            .ok_or_else(|| FeatureError::UnknownCategory {
                column: self.column.name().to_string(),
                value: value.to_string(),
            })
    }

    /// Return the number of distinct categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.codes.len()
    }

    /// Return `true` if no categories were seen.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// Return the categories in code order.
    pub fn categories(&self) -> impl Iterator<Item = &str> {
        self.codes.keys().map(String::as_str)
    }
}

/// Everything learned from the fit records. Never mutated after fitting.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FittedEncodingState {
    pub(crate) config: EncoderConfig,
    pub(crate) categories: Vec<CategoryCodes>,
    pub(crate) age_mean: f64,
    pub(crate) age_std: f64,
    pub(crate) source_success: BTreeMap<String, f64>,
    pub(crate) base_rate: f64,
    /// One median per output column, in [`FEATURE_NAMES`] order.
    pub(crate) medians: Vec<f64>,
}

impl FittedEncodingState {
    /// Return the encoder thresholds.
    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Return the code mapping of one categorical column.
    #[must_use]
    pub fn category_codes(&self, column: CategoricalColumn) -> Option<&CategoryCodes> {
        self.categories.iter().find(|codes| codes.column == column)
    }

    /// Return the fit-set age mean.
    #[must_use]
    pub fn age_mean(&self) -> f64 {
        self.age_mean
    }

    /// Return the fit-set sample standard deviation of age.
    #[must_use]
    pub fn age_std(&self) -> f64 {
        self.age_std
    }

    /// Return the fraction of fit records with status `Hired`.
    #[must_use]
    pub fn base_rate(&self) -> f64 {
        self.base_rate
    }

    /// Return the historical hire fraction of a source, or the base rate if
    /// the source was not seen at fit time.
    #[must_use]
    pub fn source_success_rate(&self, source: &str) -> f64 {
        self.source_success
            .get(source)
            .copied()
            .unwrap_or(self.base_rate)
    }

    /// Return the imputation medians, one per output column.
    #[must_use]
    pub fn medians(&self) -> &[f64] {
        &self.medians
    }

    /// Encode records with this fitted state.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::UnknownCategory`] if a categorical value was
    /// not seen at fit time.
    #[instrument(skip_all, fields(n_records = records.len()))]
    pub fn transform(&self, records: &[FunnelRecord]) -> Result<FeatureMatrix, FeatureError> {
        let mut rows = self.encode_rows(records)?;
        impute(&mut rows, &self.medians);
        debug!(n_rows = rows.len(), "records encoded");
        Ok(FeatureMatrix::new(rows))
    }

    /// Encode every record without imputation. Missing inputs yield NaN.
    fn encode_rows(&self, records: &[FunnelRecord]) -> Result<Vec<Vec<f64>>, FeatureError> {
        records
            .par_iter()
            .map(|record| self.encode_row(record))
            .collect()
    }

    fn encode_row(&self, record: &FunnelRecord) -> Result<Vec<f64>, FeatureError> {
        let config = &self.config;
        let mut codes = [0.0; 5];
        for (slot, mapping) in codes.iter_mut().zip(&self.categories) {
            *slot = mapping.code(mapping.column.value(record))? as f64;
        }

        let sequence = f64::from(record.stage_sequence);
        let age = record.age.unwrap_or(f64::NAN);
        let education = record.education.unwrap_or(f64::NAN);
        let days = record.days_since_application.unwrap_or(f64::NAN);

        let age_normalized = if self.age_std > 0.0 {
            (age - self.age_mean) / self.age_std
        } else {
            0.0
        };
        let flag = |on: bool| if on { 1.0 } else { 0.0 };

        let mut row = Vec::with_capacity(FEATURE_NAMES.len());
        row.push(sequence);
        row.push(days);
        row.push(age);
        row.push(education);
        row.extend_from_slice(&codes);
        row.push(age * age);
        row.push(age_normalized);
        row.push(education);
        row.push(sequence / f64::from(config.max_stage_count));
        row.push(flag(record.stage_sequence <= config.early_stage_max));
        row.push(flag(record.stage_sequence >= config.late_stage_min));
        row.push(days.ln_1p());
        // NaN comparisons are false, so a missing duration is never slow.
        row.push(flag(days > config.slow_process_days));
        row.push(self.source_success_rate(&record.source));
        row.push(age * education);
        Ok(row)
    }
}

/// Fits a [`FittedEncodingState`] on records and encodes them.
#[derive(Debug, Clone, Default)]
pub struct FeatureEncoder {
    config: EncoderConfig,
}

impl FeatureEncoder {
    /// Create an encoder with the given thresholds.
    #[must_use]
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// Return the encoder thresholds.
    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Learn the encoding state from `records` and encode them.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::EmptyDataset`] | `records` is empty |
    /// | [`FeatureError::InvalidMaxStageCount`] | config has a zero stage count |
    /// | [`FeatureError::InvalidStageThresholds`] | early threshold not below late |
    pub fn fit_transform(
        &self,
        records: &[FunnelRecord],
    ) -> Result<(FeatureMatrix, FittedEncodingState), FeatureError> {
        self.fit_transform_with_vocabulary(records, &[])
    }

    /// Like [`fit_transform`](Self::fit_transform), but category codes are
    /// assigned over `records` and `vocabulary` together.
    ///
    /// Pass the full record set as `vocabulary` when `records` is a training
    /// partition, so categories that only occur in held-out records still
    /// encode. Age moments, source success rates and medians come from
    /// `records` alone; a source known only from `vocabulary` gets the base
    /// rate.
    ///
    /// # Errors
    ///
    /// Same as [`fit_transform`](Self::fit_transform).
    #[instrument(skip_all, fields(n_records = records.len(), n_vocabulary = vocabulary.len()))]
    pub fn fit_transform_with_vocabulary(
        &self,
        records: &[FunnelRecord],
        vocabulary: &[FunnelRecord],
    ) -> Result<(FeatureMatrix, FittedEncodingState), FeatureError> {
        self.config.validate()?;
        if records.is_empty() {
            return Err(FeatureError::EmptyDataset);
        }

        let categories = CategoricalColumn::ALL
            .iter()
            .map(|&column| CategoryCodes::fit(column, records.iter().chain(vocabulary)))
            .collect();

        let ages: Vec<f64> = records
            .iter()
            .filter_map(|r| r.age)
            .filter(|a| a.is_finite())
            .collect();
        let (age_mean, age_std) = mean_and_sample_std(&ages);
        if !(age_std > 0.0) {
            warn!(
                n_ages = ages.len(),
                "age has zero or undefined spread; age_normalized will be 0"
            );
        }

        let (source_success, base_rate) = source_success_rates(records);

        let mut state = FittedEncodingState {
            config: self.config.clone(),
            categories,
            age_mean,
            age_std,
            source_success,
            base_rate,
            medians: Vec::new(),
        };

        let mut rows = state.encode_rows(records)?;
        state.medians = column_medians(&rows, FEATURE_NAMES.len());
        impute(&mut rows, &state.medians);

        info!(
            n_rows = rows.len(),
            n_sources = state.source_success.len(),
            base_rate = state.base_rate,
            "encoder fitted"
        );

        Ok((FeatureMatrix::new(rows), state))
    }
}

/// Encode `records` with a previously fitted state.
///
/// # Errors
///
/// Returns [`FeatureError::UnknownCategory`] if a categorical value was not
/// seen at fit time.
pub fn transform(
    records: &[FunnelRecord],
    state: &FittedEncodingState,
) -> Result<FeatureMatrix, FeatureError> {
    state.transform(records)
}

/// Mean and sample (n - 1) standard deviation. NaN when undefined.
fn mean_and_sample_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if values.len() < 2 {
        return (mean, f64::NAN);
    }
    let ss: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (mean, (ss / (n - 1.0)).sqrt())
}

/// Per-source fraction of records with status `Hired`, plus the global fraction.
fn source_success_rates(records: &[FunnelRecord]) -> (BTreeMap<String, f64>, f64) {
    let mut counts: HashMap<&str, (usize, usize)> = HashMap::new();
    for record in records {
        let entry = counts.entry(record.source.as_str()).or_default();
        entry.1 += 1;
        if record.status == Status::Hired {
            entry.0 += 1;
        }
    }
    let hired_total: usize = counts.values().map(|(h, _)| h).sum();
    let base_rate = hired_total as f64 / records.len() as f64;
    let rates = counts
        .into_iter()
        .map(|(source, (hired, total))| (source.to_string(), hired as f64 / total as f64))
        .collect();
    (rates, base_rate)
}

/// Median of the finite values in each column; 0.0 for an all-missing column.
fn column_medians(rows: &[Vec<f64>], n_columns: usize) -> Vec<f64> {
    (0..n_columns)
        .map(|col| {
            let mut values: Vec<f64> = rows
                .iter()
                .map(|row| row[col])
                .filter(|v| v.is_finite())
                .collect();
            median(&mut values).unwrap_or(0.0)
        })
        .collect()
}

fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

fn impute(rows: &mut [Vec<f64>], medians: &[f64]) {
    for row in rows {
        for (value, &fill) in row.iter_mut().zip(medians) {
            if !value.is_finite() {
                *value = fill;
            }
        }
    }
}

//! Configuration builder for feature encoding.

use crate::error::FeatureError;

/// Thresholds used to derive stage and timing features.
///
/// Construct via [`EncoderConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter           | Default |
/// |---------------------|---------|
/// | `max_stage_count`   | 8       |
/// | `early_stage_max`   | 3       |
/// | `late_stage_min`    | 6       |
/// | `slow_process_days` | 50.0    |
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct EncoderConfig {
    pub(crate) max_stage_count: u32,
    pub(crate) early_stage_max: u32,
    pub(crate) late_stage_min: u32,
    pub(crate) slow_process_days: f64,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderConfig {
    /// Create a config with the default thresholds.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_stage_count: 8,
            early_stage_max: 3,
            late_stage_min: 6,
            slow_process_days: 50.0,
        }
    }

    // --- Setters ---

    /// Set the stage count used to normalize `stage_progress`.
    #[must_use]
    pub fn with_max_stage_count(mut self, max_stage_count: u32) -> Self {
        self.max_stage_count = max_stage_count;
        self
    }

    /// Set the last stage sequence flagged as early.
    #[must_use]
    pub fn with_early_stage_max(mut self, early_stage_max: u32) -> Self {
        self.early_stage_max = early_stage_max;
        self
    }

    /// Set the first stage sequence flagged as late.
    #[must_use]
    pub fn with_late_stage_min(mut self, late_stage_min: u32) -> Self {
        self.late_stage_min = late_stage_min;
        self
    }

    /// Set the elapsed-days threshold above which a record is flagged slow.
    #[must_use]
    pub fn with_slow_process_days(mut self, slow_process_days: f64) -> Self {
        self.slow_process_days = slow_process_days;
        self
    }

    // --- Getters ---

    /// Return the stage count used to normalize `stage_progress`.
    #[must_use]
    pub fn max_stage_count(&self) -> u32 {
        self.max_stage_count
    }

    /// Return the last stage sequence flagged as early.
    #[must_use]
    pub fn early_stage_max(&self) -> u32 {
        self.early_stage_max
    }

    /// Return the first stage sequence flagged as late.
    #[must_use]
    pub fn late_stage_min(&self) -> u32 {
        self.late_stage_min
    }

    /// Return the slow-process threshold in days.
    #[must_use]
    pub fn slow_process_days(&self) -> f64 {
        self.slow_process_days
    }

    /// Check that the thresholds are usable.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::InvalidMaxStageCount`] | `max_stage_count` is zero |
    /// | [`FeatureError::InvalidStageThresholds`] | `early_stage_max >= late_stage_min` |
    pub fn validate(&self) -> Result<(), FeatureError> {
        if self.max_stage_count == 0 {
            return Err(FeatureError::InvalidMaxStageCount {
                max_stage_count: self.max_stage_count,
            });
        }
        if self.early_stage_max >= self.late_stage_min {
            return Err(FeatureError::InvalidStageThresholds {
                early: self.early_stage_max,
                late: self.late_stage_min,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = EncoderConfig::new();
        assert_eq!(config.max_stage_count(), 8);
        assert_eq!(config.early_stage_max(), 3);
        assert_eq!(config.late_stage_min(), 6);
        assert_eq!(config.slow_process_days(), 50.0);
        config.validate().unwrap();
    }

    #[test]
    fn zero_stage_count_rejected() {
        let err = EncoderConfig::new()
            .with_max_stage_count(0)
            .validate()
            .unwrap_err();
        assert!(matches!(err, FeatureError::InvalidMaxStageCount { .. }));
    }

    #[test]
    fn overlapping_thresholds_rejected() {
        let err = EncoderConfig::new()
            .with_early_stage_max(6)
            .validate()
            .unwrap_err();
        assert!(matches!(
            err,
            FeatureError::InvalidStageThresholds { early: 6, late: 6 }
        ));
    }
}

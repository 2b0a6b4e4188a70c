//! Funnel records: one row per (applicant, stage) pair.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;

use crate::error::FeatureError;

/// Outcome of an applicant at one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Status {
    /// Advanced to the next stage.
    Passed,
    /// Dropped out of the funnel at this stage.
    Rejected,
    /// Reached the end of the funnel.
    Hired,
}

impl Status {
    /// Return `true` for `Hired` and `Rejected`.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Status::Hired | Status::Rejected)
    }

    /// Return the canonical status text.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Passed => "Passed",
            Status::Rejected => "Rejected",
            Status::Hired => "Hired",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = FeatureError;

    /// Parse a status, ignoring ASCII case and surrounding whitespace.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        [Status::Passed, Status::Rejected, Status::Hired]
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| FeatureError::InvalidStatus { raw: s.to_string() })
    }
}

/// An applicant identifier.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize)]
pub struct ApplicantId(String);

impl ApplicantId {
    /// Wrap an identifier string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Return the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ApplicantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One applicant at one hiring stage.
///
/// Numeric attributes that may be absent in the source data are `Option`s;
/// the encoder imputes them with fit-time medians.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct FunnelRecord {
    /// Applicant identifier.
    pub applicant_id: ApplicantId,
    /// Recruiting source channel (e.g. `LinkedIn`).
    pub source: String,
    /// Job role applied for.
    pub job_role: String,
    /// Department of the job role.
    pub department: String,
    /// Applicant age in years.
    pub age: Option<f64>,
    /// Applicant gender.
    pub gender: String,
    /// Education level (ordinal).
    pub education: Option<f64>,
    /// Field of education.
    pub education_field: String,
    /// Date the application was received.
    pub application_date: NaiveDate,
    /// Stage name.
    pub stage: String,
    /// One-based position of the stage in the applicant's journey.
    pub stage_sequence: u32,
    /// Date the stage was reached.
    pub stage_date: NaiveDate,
    /// Outcome at this stage.
    pub status: Status,
    /// Days elapsed between application and this stage.
    pub days_since_application: Option<f64>,
}

/// Check the per-applicant funnel invariant.
///
/// Records of one applicant may be interleaved with other applicants, but
/// in input order their stage sequences must strictly increase and the last
/// one must be the only record with a terminal status.
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`FeatureError::NonMonotonicStage`] | a stage sequence does not increase |
/// | [`FeatureError::RecordAfterTermination`] | a record follows `Hired`/`Rejected` |
/// | [`FeatureError::MissingTerminalStatus`] | the history never terminates |
pub fn validate_funnel(records: &[FunnelRecord]) -> Result<(), FeatureError> {
    // applicant -> (last sequence, terminated)
    let mut state: HashMap<&str, (u32, bool)> = HashMap::new();
    let mut order: Vec<&str> = Vec::new();

    for record in records {
        let applicant = record.applicant_id.as_str();
        match state.get_mut(applicant) {
            None => {
                order.push(applicant);
                state.insert(applicant, (record.stage_sequence, record.status.is_terminal()));
            }
            Some((last, terminated)) => {
                if *terminated {
                    return Err(FeatureError::RecordAfterTermination {
                        applicant: applicant.to_string(),
                        stage_sequence: record.stage_sequence,
                    });
                }
                if record.stage_sequence <= *last {
                    return Err(FeatureError::NonMonotonicStage {
                        applicant: applicant.to_string(),
                        previous: *last,
                        current: record.stage_sequence,
                    });
                }
                *last = record.stage_sequence;
                *terminated = record.status.is_terminal();
            }
        }
    }

    if let Some(applicant) = order.into_iter().find(|a| !state[a].1) {
        return Err(FeatureError::MissingTerminalStatus {
            applicant: applicant.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod fixtures {
    use chrono::NaiveDate;

    use super::{ApplicantId, FunnelRecord, Status};

    /// Build a record with fixed dates and demographic fields.
    pub(crate) fn record(
        applicant: &str,
        source: &str,
        sequence: u32,
        status: Status,
        age: Option<f64>,
        days: Option<f64>,
    ) -> FunnelRecord {
        let application_date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        FunnelRecord {
            applicant_id: ApplicantId::new(applicant),
            source: source.to_string(),
            job_role: "Sales Executive".to_string(),
            department: "Sales".to_string(),
            age,
            gender: "Female".to_string(),
            education: Some(3.0),
            education_field: "Marketing".to_string(),
            application_date,
            stage: format!("Stage {sequence}"),
            stage_sequence: sequence,
            stage_date: application_date,
            status,
            days_since_application: days,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::record;
    use super::*;

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("hired".parse::<Status>().unwrap(), Status::Hired);
        assert_eq!(" REJECTED ".parse::<Status>().unwrap(), Status::Rejected);
        assert_eq!("Passed".parse::<Status>().unwrap(), Status::Passed);
    }

    #[test]
    fn status_rejects_unknown_text() {
        let err = "Withdrawn".parse::<Status>().unwrap_err();
        assert!(matches!(err, FeatureError::InvalidStatus { .. }));
    }

    #[test]
    fn terminal_statuses() {
        assert!(Status::Hired.is_terminal());
        assert!(Status::Rejected.is_terminal());
        assert!(!Status::Passed.is_terminal());
    }

    #[test]
    fn valid_interleaved_histories() {
        let records = vec![
            record("A", "LinkedIn", 1, Status::Passed, Some(30.0), Some(0.0)),
            record("B", "Naukri", 1, Status::Rejected, Some(41.0), Some(0.0)),
            record("A", "LinkedIn", 2, Status::Hired, Some(30.0), Some(7.0)),
        ];
        validate_funnel(&records).unwrap();
    }

    #[test]
    fn record_after_rejection_is_invalid() {
        let records = vec![
            record("A", "LinkedIn", 1, Status::Rejected, None, None),
            record("A", "LinkedIn", 2, Status::Passed, None, None),
        ];
        let err = validate_funnel(&records).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::RecordAfterTermination { stage_sequence: 2, .. }
        ));
    }

    #[test]
    fn repeated_sequence_is_invalid() {
        let records = vec![
            record("A", "LinkedIn", 2, Status::Passed, None, None),
            record("A", "LinkedIn", 2, Status::Hired, None, None),
        ];
        let err = validate_funnel(&records).unwrap_err();
        assert!(matches!(
            err,
            FeatureError::NonMonotonicStage { previous: 2, current: 2, .. }
        ));
    }

    #[test]
    fn unterminated_history_is_invalid() {
        let records = vec![record("A", "LinkedIn", 1, Status::Passed, None, None)];
        let err = validate_funnel(&records).unwrap_err();
        assert!(matches!(err, FeatureError::MissingTerminalStatus { .. }));
    }
}

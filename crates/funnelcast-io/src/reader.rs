//! CSV funnel reader with full input validation.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::NaiveDate;
use funnelcast_features::{ApplicantId, FunnelRecord, Status, validate_funnel};
use tracing::{debug, info, instrument};

use crate::IoError;

/// Date format of `Application_Date` and `Stage_Date`.
const DATE_FORMAT: &str = "%Y-%m-%d";

/// Header names, in the order [`Columns`] stores their positions.
const APPLICANT_ID: &str = "Applicant_ID";
const SOURCE: &str = "Source";
const JOB_ROLE: &str = "Job_Role";
const DEPARTMENT: &str = "Department";
const APPLICATION_DATE: &str = "Application_Date";
const STAGE: &str = "Stage";
const STAGE_SEQUENCE: &str = "Stage_Sequence";
const STAGE_DATE: &str = "Stage_Date";
const STATUS: &str = "Status";
const DAYS_SINCE_APPLICATION: &str = "Days_Since_Application";
const AGE: &str = "Age";
const GENDER: &str = "Gender";
const EDUCATION: &str = "Education";
const EDUCATION_FIELD: &str = "EducationField";

/// Reads funnel records (one row per applicant and stage) from a CSV file.
///
/// Columns are located by header name, so extra columns and any column
/// order are accepted. `Age`, `Education` and `Days_Since_Application`
/// may be empty; every other cell is required.
///
/// Expected header (order free):
/// `Applicant_ID,Source,Job_Role,Department,Application_Date,Stage,
/// Stage_Sequence,Stage_Date,Status,Days_Since_Application,Age,Gender,
/// Education,EducationField`
///
/// # Errors
///
/// | Variant | Condition |
/// |---|---|
/// | [`IoError::FileNotFound`] | File doesn't exist or is unreadable |
/// | [`IoError::CsvParse`] | Malformed CSV record or ragged row |
/// | [`IoError::MissingColumn`] | A required header is absent |
/// | [`IoError::EmptyDataset`] | Zero data rows after header |
/// | [`IoError::InvalidValue`] | Cell is empty where required, or unparseable |
/// | [`IoError::InvalidFunnel`] | Applicant histories break the funnel invariant |
pub struct FunnelReader {
    path: PathBuf,
    validate: bool,
}

impl FunnelReader {
    /// Create a new reader for the given CSV file path.
    pub fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            validate: true,
        }
    }

    /// Toggle the per-applicant funnel check (on by default).
    ///
    /// Scoring files may hold applicants still in progress, which have no
    /// terminal record yet.
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Read and validate the CSV file.
    #[instrument(skip(self), fields(path = %self.path.display(), validate = self.validate))]
    pub fn read(&self) -> Result<Vec<FunnelRecord>, IoError> {
        let file = std::fs::File::open(&self.path).map_err(|e| IoError::FileNotFound {
            path: self.path.clone(),
            source: e,
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_reader(file);

        let header = rdr.headers().map_err(|e| self.csv_error(e))?;
        let columns = Columns::locate(header, &self.path)?;
        debug!(n_columns = header.len(), "read CSV header");

        let mut records = Vec::new();
        for (row_index, result) in rdr.records().enumerate() {
            let row = result.map_err(|e| self.csv_error(e))?;
            records.push(self.parse_row(&row, row_index, &columns)?);
        }

        if records.is_empty() {
            return Err(IoError::EmptyDataset {
                path: self.path.clone(),
            });
        }

        if self.validate {
            validate_funnel(&records).map_err(|e| IoError::InvalidFunnel {
                path: self.path.clone(),
                source: e,
            })?;
        }

        let n_applicants = records
            .iter()
            .map(|r| r.applicant_id.as_str())
            .collect::<HashSet<_>>()
            .len();
        info!(n_records = records.len(), n_applicants, "funnel loaded");

        Ok(records)
    }

    fn parse_row(
        &self,
        row: &csv::StringRecord,
        row_index: usize,
        columns: &Columns,
    ) -> Result<FunnelRecord, IoError> {
        let cell = Cell {
            row,
            row_index,
            path: &self.path,
        };
        Ok(FunnelRecord {
            applicant_id: ApplicantId::new(cell.text(columns.applicant_id, APPLICANT_ID)?),
            source: cell.text(columns.source, SOURCE)?,
            job_role: cell.text(columns.job_role, JOB_ROLE)?,
            department: cell.text(columns.department, DEPARTMENT)?,
            age: cell.optional_number(columns.age, AGE)?,
            gender: cell.text(columns.gender, GENDER)?,
            education: cell.optional_number(columns.education, EDUCATION)?,
            education_field: cell.text(columns.education_field, EDUCATION_FIELD)?,
            application_date: cell.date(columns.application_date, APPLICATION_DATE)?,
            stage: cell.text(columns.stage, STAGE)?,
            stage_sequence: cell.parsed(columns.stage_sequence, STAGE_SEQUENCE)?,
            stage_date: cell.date(columns.stage_date, STAGE_DATE)?,
            status: cell.parsed::<Status>(columns.status, STATUS)?,
            days_since_application: cell
                .optional_number(columns.days_since_application, DAYS_SINCE_APPLICATION)?,
        })
    }

    fn csv_error(&self, e: csv::Error) -> IoError {
        IoError::CsvParse {
            path: self.path.clone(),
            offset: e.position().map_or(0, |p| p.byte()),
            source: e,
        }
    }
}

/// Header positions of the required columns.
struct Columns {
    applicant_id: usize,
    source: usize,
    job_role: usize,
    department: usize,
    application_date: usize,
    stage: usize,
    stage_sequence: usize,
    stage_date: usize,
    status: usize,
    days_since_application: usize,
    age: usize,
    gender: usize,
    education: usize,
    education_field: usize,
}

impl Columns {
    fn locate(header: &csv::StringRecord, path: &Path) -> Result<Self, IoError> {
        let find = |column: &'static str| {
            header
                .iter()
                .position(|h| h == column)
                .ok_or_else(|| IoError::MissingColumn {
                    path: path.to_path_buf(),
                    column,
                })
        };
        Ok(Self {
            applicant_id: find(APPLICANT_ID)?,
            source: find(SOURCE)?,
            job_role: find(JOB_ROLE)?,
            department: find(DEPARTMENT)?,
            application_date: find(APPLICATION_DATE)?,
            stage: find(STAGE)?,
            stage_sequence: find(STAGE_SEQUENCE)?,
            stage_date: find(STAGE_DATE)?,
            status: find(STATUS)?,
            days_since_application: find(DAYS_SINCE_APPLICATION)?,
            age: find(AGE)?,
            gender: find(GENDER)?,
            education: find(EDUCATION)?,
            education_field: find(EDUCATION_FIELD)?,
        })
    }
}

/// One row's cells, with typed accessors that report the failing cell.
struct Cell<'a> {
    row: &'a csv::StringRecord,
    row_index: usize,
    path: &'a Path,
}

impl Cell<'_> {
    fn raw(&self, index: usize) -> &str {
        self.row.get(index).unwrap_or("")
    }

    fn invalid(&self, column: &'static str, raw: &str) -> IoError {
        IoError::InvalidValue {
            path: self.path.to_path_buf(),
            row_index: self.row_index,
            column,
            raw: raw.to_string(),
        }
    }

    fn text(&self, index: usize, column: &'static str) -> Result<String, IoError> {
        let raw = self.raw(index);
        if raw.is_empty() {
            return Err(self.invalid(column, raw));
        }
        Ok(raw.to_string())
    }

    fn parsed<T: FromStr>(&self, index: usize, column: &'static str) -> Result<T, IoError> {
        let raw = self.raw(index);
        raw.parse().map_err(|_| self.invalid(column, raw))
    }

    fn date(&self, index: usize, column: &'static str) -> Result<NaiveDate, IoError> {
        let raw = self.raw(index);
        NaiveDate::parse_from_str(raw, DATE_FORMAT).map_err(|_| self.invalid(column, raw))
    }

    /// Empty cells are missing; anything else must be a finite float.
    fn optional_number(&self, index: usize, column: &'static str) -> Result<Option<f64>, IoError> {
        let raw = self.raw(index);
        if raw.is_empty() {
            return Ok(None);
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => Ok(Some(value)),
            _ => Err(self.invalid(column, raw)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const HEADER: &str = "Applicant_ID,Source,Job_Role,Department,Application_Date,Stage,Stage_Sequence,Stage_Date,Status,Days_Since_Application,Age,Gender,Education,EducationField\n";

    fn write_csv(content: &str) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(content.as_bytes()).unwrap();
        f.flush().unwrap();
        f
    }

    fn with_header(rows: &str) -> NamedTempFile {
        write_csv(&format!("{HEADER}{rows}"))
    }

    const TWO_APPLICANTS: &str = "\
A1,Referral,Sales Executive,Sales,2024-01-02,Application Received,1,2024-01-02,Passed,0,34,Female,3,Marketing
A1,Referral,Sales Executive,Sales,2024-01-02,Screening,2,2024-01-09,Hired,7,34,Female,3,Marketing
A2,LinkedIn,Research Scientist,Research & Development,2024-01-05,Application Received,1,2024-01-05,Rejected,0,,Male,,Medical
";

    #[test]
    fn read_valid_funnel() {
        let f = with_header(TWO_APPLICANTS);
        let records = FunnelReader::new(f.path()).read().unwrap();
        assert_eq!(records.len(), 3);

        let hired = &records[1];
        assert_eq!(hired.applicant_id.as_str(), "A1");
        assert_eq!(hired.stage, "Screening");
        assert_eq!(hired.stage_sequence, 2);
        assert_eq!(hired.status, Status::Hired);
        assert_eq!(hired.days_since_application, Some(7.0));
        assert_eq!(hired.stage_date, NaiveDate::from_ymd_opt(2024, 1, 9).unwrap());
        assert_eq!(hired.department, "Sales");
    }

    #[test]
    fn empty_optional_cells_are_missing() {
        let f = with_header(TWO_APPLICANTS);
        let records = FunnelReader::new(f.path()).read().unwrap();
        assert_eq!(records[2].age, None);
        assert_eq!(records[2].education, None);
        assert_eq!(records[2].department, "Research & Development");
    }

    #[test]
    fn columns_located_by_name() {
        let csv = "Status,Stage_Sequence,Stage,Applicant_ID,Extra,Source,Job_Role,Department,Application_Date,Stage_Date,Days_Since_Application,Age,Gender,Education,EducationField\n\
                   rejected,1,Application Received,Z9,ignored,Indeed,Manager,Sales,2024-02-01,2024-02-01,0,41,Male,4,Other\n";
        let f = write_csv(csv);
        let records = FunnelReader::new(f.path()).read().unwrap();
        assert_eq!(records[0].applicant_id.as_str(), "Z9");
        assert_eq!(records[0].status, Status::Rejected);
        assert_eq!(records[0].age, Some(41.0));
    }

    #[test]
    fn error_file_not_found() {
        let result = FunnelReader::new(Path::new("/nonexistent/funnel.csv")).read();
        assert!(matches!(result, Err(IoError::FileNotFound { .. })));
    }

    #[test]
    fn error_empty_dataset() {
        let f = with_header("");
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::EmptyDataset { .. })));
    }

    #[test]
    fn error_missing_column() {
        let f = write_csv("Applicant_ID,Source\nA1,Referral\n");
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(IoError::MissingColumn { column: "Job_Role", .. })
        ));
    }

    #[test]
    fn error_ragged_row() {
        let f = with_header("A1,Referral,Sales Executive\n");
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::CsvParse { .. })));
    }

    #[test]
    fn error_invalid_status() {
        let f = with_header(
            "A1,Referral,Sales Executive,Sales,2024-01-02,Screening,1,2024-01-02,Withdrawn,0,34,Female,3,Marketing\n",
        );
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(IoError::InvalidValue { row_index: 0, column: "Status", .. })
        ));
    }

    #[test]
    fn error_invalid_date() {
        let f = with_header(
            "A1,Referral,Sales Executive,Sales,02/01/2024,Screening,1,2024-01-02,Rejected,0,34,Female,3,Marketing\n",
        );
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(IoError::InvalidValue { column: "Application_Date", .. })
        ));
    }

    #[test]
    fn error_non_finite_number() {
        let f = with_header(
            "A1,Referral,Sales Executive,Sales,2024-01-02,Screening,1,2024-01-02,Rejected,0,inf,Female,3,Marketing\n",
        );
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::InvalidValue { column: "Age", .. })));
    }

    #[test]
    fn error_missing_required_text() {
        let f = with_header(
            ",Referral,Sales Executive,Sales,2024-01-02,Screening,1,2024-01-02,Rejected,0,30,Female,3,Marketing\n",
        );
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(
            result,
            Err(IoError::InvalidValue { column: "Applicant_ID", .. })
        ));
    }

    #[test]
    fn in_progress_history_needs_validation_off() {
        let f = with_header(
            "A1,Referral,Sales Executive,Sales,2024-01-02,Application Received,1,2024-01-02,Passed,0,34,Female,3,Marketing\n",
        );
        let result = FunnelReader::new(f.path()).read();
        assert!(matches!(result, Err(IoError::InvalidFunnel { .. })));

        let records = FunnelReader::new(f.path())
            .with_validation(false)
            .read()
            .unwrap();
        assert_eq!(records.len(), 1);
    }
}

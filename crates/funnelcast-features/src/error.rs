use std::path::PathBuf;

/// Errors from record validation, feature encoding, resampling, and
/// encoder artifact persistence.
#[derive(Debug, thiserror::Error)]
pub enum FeatureError {
    /// Returned when an operation receives zero records or zero samples.
    #[error("dataset has zero samples")]
    EmptyDataset,

    /// Returned when a categorical value was not seen while fitting the encoder.
    #[error("unknown category \"{value}\" in column {column}")]
    UnknownCategory {
        /// Name of the categorical column.
        column: String,
        /// The unseen value.
        value: String,
    },

    /// Returned when the minority class is too small for neighbour interpolation.
    #[error("class {class} has {count} samples, need at least {required} to synthesize neighbours")]
    InsufficientSamples {
        /// The minority class label.
        class: usize,
        /// Number of samples of that class.
        count: usize,
        /// Minimum number of samples required.
        required: usize,
    },

    /// Returned when a label is neither 0 nor 1.
    #[error("sample {sample_index} has label {label}, expected 0 or 1")]
    InvalidLabel {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The label found.
        label: usize,
    },

    /// Returned when features and labels have different lengths.
    #[error("{n_samples} feature rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_samples: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// Returned when a row has a different number of features than the first row.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// The expected number of features.
        expected: usize,
        /// The actual number of features in the sample.
        got: usize,
        /// The zero-based index of the offending sample.
        sample_index: usize,
    },

    /// Returned when a resampler input value is NaN or infinite.
    #[error("non-finite value at sample {sample_index}, feature {feature_index}")]
    NonFiniteValue {
        /// The zero-based index of the offending sample.
        sample_index: usize,
        /// The zero-based index of the offending feature column.
        feature_index: usize,
    },

    /// Returned when the neighbour count is zero.
    #[error("k_neighbors must be at least 1, got {k_neighbors}")]
    InvalidNeighborCount {
        /// The invalid neighbour count.
        k_neighbors: usize,
    },

    /// Returned when the held-out fraction is not in (0.0, 1.0).
    #[error("test fraction must be in (0.0, 1.0), got {fraction}")]
    InvalidTestFraction {
        /// The invalid fraction.
        fraction: f64,
    },

    /// Returned when the stage count used for progress normalization is zero.
    #[error("max_stage_count must be at least 1, got {max_stage_count}")]
    InvalidMaxStageCount {
        /// The invalid stage count.
        max_stage_count: u32,
    },

    /// Returned when the early-stage threshold is not below the late-stage threshold.
    #[error("early stage threshold {early} must be below late stage threshold {late}")]
    InvalidStageThresholds {
        /// Last sequence number counted as early.
        early: u32,
        /// First sequence number counted as late.
        late: u32,
    },

    /// Returned when a status string is not one of `Passed`, `Rejected`, `Hired`.
    #[error("unknown status \"{raw}\"")]
    InvalidStatus {
        /// The raw status text.
        raw: String,
    },

    /// Returned when an applicant's stage sequence does not strictly increase.
    #[error("applicant {applicant}: stage sequence {current} follows {previous}")]
    NonMonotonicStage {
        /// The applicant identifier.
        applicant: String,
        /// The preceding stage sequence.
        previous: u32,
        /// The offending stage sequence.
        current: u32,
    },

    /// Returned when an applicant has a record after a terminal status.
    #[error("applicant {applicant} has a record at stage {stage_sequence} after termination")]
    RecordAfterTermination {
        /// The applicant identifier.
        applicant: String,
        /// Stage sequence of the trailing record.
        stage_sequence: u32,
    },

    /// Returned when an applicant's history never reaches `Hired` or `Rejected`.
    #[error("applicant {applicant} never reaches a terminal status")]
    MissingTerminalStatus {
        /// The applicant identifier.
        applicant: String,
    },

    /// Returned when encoder state serialization fails.
    #[error("failed to serialize encoder state")]
    SerializeState {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when encoder state deserialization fails.
    #[error("failed to deserialize encoder state")]
    DeserializeState {
        /// The underlying bincode error.
        source: Box<bincode::ErrorKind>,
    },

    /// Returned when writing the encoder file fails.
    #[error("failed to write encoder state to {path}")]
    WriteState {
        /// Path to the file that could not be written.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when reading the encoder file fails.
    #[error("failed to read encoder state from {path}")]
    ReadState {
        /// Path to the file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when loading encoder state with an incompatible format version.
    #[error("incompatible encoder format version: expected {expected}, found {found}")]
    IncompatibleStateVersion {
        /// The format version this build expects.
        expected: u32,
        /// The format version found in the artifact.
        found: u32,
    },
}

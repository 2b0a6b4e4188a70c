//! Recruitment funnel records and their tabular feature pipeline.
//!
//! Turns per-stage applicant records into a numeric feature matrix and a
//! binary drop-off target, rebalances classes with SMOTE, and partitions
//! data into stratified train/test sets. The fitted encoder state is an
//! immutable value that can be persisted and replayed on new records.

mod config;
mod encoder;
mod error;
mod label;
mod matrix;
mod record;
mod resample;
mod serialize;
mod split;

pub use config::EncoderConfig;
pub use encoder::{CategoricalColumn, CategoryCodes, FeatureEncoder, FittedEncodingState, transform};
pub use error::FeatureError;
pub use label::{DROP_OFF, RETAINED, drop_off_rate, label};
pub use matrix::{FEATURE_NAMES, FeatureMatrix};
pub use record::{ApplicantId, FunnelRecord, Status, validate_funnel};
pub use resample::{Resampled, Smote, SmoteConfig};
pub use split::{StratifiedSplit, stratified_split};

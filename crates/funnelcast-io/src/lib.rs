//! File I/O for the funnelcast pipeline: a validating CSV funnel reader and
//! a JSON writer for training, scoring and experiment results.

mod domain;
mod error;
mod reader;
mod writer;

pub use domain::RunName;
pub use error::IoError;
pub use reader::FunnelReader;
pub use writer::{ResultWriter, TrainingSummary};

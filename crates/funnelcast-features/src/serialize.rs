//! Encoder state persistence via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::encoder::FittedEncodingState;
use crate::error::FeatureError;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

#[derive(serde::Serialize, serde::Deserialize)]
struct StateEnvelope {
    format_version: u32,
    state: FittedEncodingState,
}

impl FittedEncodingState {
    /// Encode the state as a versioned bincode envelope.
    ///
    /// # Errors
    ///
    /// Returns [`FeatureError::SerializeState`] if bincode encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, FeatureError> {
        let envelope = StateEnvelope {
            format_version: FORMAT_VERSION,
            state: self.clone(),
        };
        bincode::serialize(&envelope).map_err(|e| FeatureError::SerializeState { source: e })
    }

    /// Decode a state produced by [`FittedEncodingState::to_bytes`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::DeserializeState`] | bincode decoding failed |
    /// | [`FeatureError::IncompatibleStateVersion`] | format version mismatch |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FeatureError> {
        let envelope: StateEnvelope = bincode::deserialize(bytes)
            .map_err(|e| FeatureError::DeserializeState { source: e })?;
        if envelope.format_version != FORMAT_VERSION {
            return Err(FeatureError::IncompatibleStateVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
            });
        }
        Ok(envelope.state)
    }

    /// Save the state to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::SerializeState`] | bincode encoding failed |
    /// | [`FeatureError::WriteState`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), FeatureError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;
        std::fs::write(path, &bytes).map_err(|e| FeatureError::WriteState {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(size_bytes = bytes.len(), "encoder state saved");
        Ok(())
    }

    /// Load a state from a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`FeatureError::ReadState`] | file read failed |
    /// | [`FeatureError::DeserializeState`] | bincode decoding failed |
    /// | [`FeatureError::IncompatibleStateVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FeatureError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| FeatureError::ReadState {
            path: path.to_path_buf(),
            source: e,
        })?;
        let state = Self::from_bytes(&bytes)?;
        debug!(n_sources = state.source_success.len(), "encoder state loaded");
        Ok(state)
    }
}

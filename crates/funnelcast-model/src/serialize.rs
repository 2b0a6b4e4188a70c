//! Model serialization and deserialization via bincode.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::ensemble::Ensemble;
use crate::error::ModelError;
use crate::grid::Hyperparameters;
use crate::importance::RankedFeature;
use crate::model::TrainedModel;

/// Current binary format version.
const FORMAT_VERSION: u32 = 1;

/// Versioned envelope for the serialized model.
#[derive(serde::Serialize, serde::Deserialize)]
struct ModelEnvelope {
    /// Format version for compatibility checking.
    format_version: u32,
    /// Feature column names.
    feature_names: Vec<String>,
    /// Importance ranking, most important first.
    importances: Vec<RankedFeature>,
    /// Configuration the ensemble was fitted with.
    hyperparameters: Hyperparameters,
    /// The fitted ensemble.
    ensemble: Ensemble,
}

impl TrainedModel {
    /// Encode the model as a versioned bincode envelope.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::SerializeModel`] if bincode encoding fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, ModelError> {
        let envelope = ModelEnvelope {
            format_version: FORMAT_VERSION,
            feature_names: self.feature_names.clone(),
            importances: self.importances.clone(),
            hyperparameters: self.hyperparameters.clone(),
            ensemble: self.ensemble.clone(),
        };
        bincode::serialize(&envelope).map_err(|e| ModelError::SerializeModel { source: e })
    }

    /// Decode a model produced by [`TrainedModel::to_bytes`].
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::DecodeModel`] | bincode decoding failed |
    /// | [`ModelError::IncompatibleModelVersion`] | format version mismatch |
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ModelError> {
        let envelope: ModelEnvelope =
            bincode::deserialize(bytes).map_err(|e| ModelError::DecodeModel { source: e })?;
        Self::from_envelope(envelope)
    }

    /// Save the model to a binary file.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::SerializeModel`] | bincode encoding failed |
    /// | [`ModelError::WriteModel`] | file write failed |
    #[instrument(skip(self), fields(path = %path.as_ref().display()))]
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ModelError> {
        let path = path.as_ref();
        let bytes = self.to_bytes()?;

        std::fs::write(path, &bytes).map_err(|e| ModelError::WriteModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        info!(
            size_bytes = bytes.len(),
            algorithm = %self.algorithm(),
            "model saved"
        );

        Ok(())
    }

    /// Load a model from a binary file.
    ///
    /// Checks the format version and returns an error on mismatch.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ReadModel`] | file read failed |
    /// | [`ModelError::DeserializeModel`] | bincode decoding failed |
    /// | [`ModelError::IncompatibleModelVersion`] | format version mismatch |
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ModelError> {
        let path = path.as_ref();

        let bytes = std::fs::read(path).map_err(|e| ModelError::ReadModel {
            path: path.to_path_buf(),
            source: e,
        })?;

        let envelope: ModelEnvelope =
            bincode::deserialize(&bytes).map_err(|e| ModelError::DeserializeModel {
                path: path.to_path_buf(),
                source: e,
            })?;

        let model = Self::from_envelope(envelope)?;
        debug!(
            algorithm = %model.algorithm(),
            n_features = model.n_features(),
            "model loaded"
        );
        Ok(model)
    }

    fn from_envelope(envelope: ModelEnvelope) -> Result<Self, ModelError> {
        if envelope.format_version != FORMAT_VERSION {
            return Err(ModelError::IncompatibleModelVersion {
                expected: FORMAT_VERSION,
                found: envelope.format_version,
            });
        }
        Ok(Self {
            ensemble: envelope.ensemble,
            feature_names: envelope.feature_names,
            importances: envelope.importances,
            hyperparameters: envelope.hyperparameters,
        })
    }
}

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::{debug, info};
use ndarray::Array2;
use ort::session::Session;
use ort::value::Tensor;

use super::error::{ArtifactLoadError, ClassifierError};
use super::scorer::{check_width, finish_probability, FeatureVector, Scorer};
use crate::runtime::{create_session_builder, RuntimeConfig};

/// Scores feature vectors with an exported ONNX graph.
///
/// The graph is expected to:
/// - Accept one float input of shape `[batch_size, width]` with a static `width`
/// - Produce as its first output the spam probability (`[batch_size, 1]` or `[batch_size]`)
#[derive(Debug)]
pub struct OnnxScorer {
    model_path: PathBuf,
    session: Session,
    input_name: String,
    input_width: usize,
}

impl OnnxScorer {
    /// Loads an ONNX classifier.
    ///
    /// # Errors
    /// - `Missing` if the file does not exist
    /// - `Corrupt` if ONNX Runtime rejects the file or the graph has the wrong shape
    pub fn load(path: impl AsRef<Path>, config: &RuntimeConfig) -> Result<Self, ArtifactLoadError> {
        let path = path.as_ref();
        info!("Loading ONNX classifier from {:?}", path);
        if !path.exists() {
            return Err(ArtifactLoadError::Missing {
                path: path.to_path_buf(),
            });
        }

        let session = create_session_builder(config)
            .and_then(|builder| builder.commit_from_file(path).map_err(ClassifierError::from))
            .map_err(|e| ArtifactLoadError::corrupt(path, e.to_string()))?;
        Self::from_session(session, path)
    }

    /// Builds a scorer from graph bytes already read from `path`.
    pub(crate) fn from_slice(
        bytes: &[u8],
        path: &Path,
        config: &RuntimeConfig,
    ) -> Result<Self, ArtifactLoadError> {
        info!("Loading ONNX classifier from {} bytes of {:?}", bytes.len(), path);
        let session = create_session_builder(config)
            .and_then(|builder| builder.commit_from_memory(bytes).map_err(ClassifierError::from))
            .map_err(|e| ArtifactLoadError::corrupt(path, e.to_string()))?;
        Self::from_session(session, path)
    }

    fn from_session(session: Session, path: &Path) -> Result<Self, ArtifactLoadError> {
        let (input_name, input_width) = Self::validate_model(&session)
            .map_err(|reason| ArtifactLoadError::corrupt(path, reason))?;
        info!("ONNX classifier validated: input '{}' of width {}", input_name, input_width);

        Ok(Self {
            model_path: path.to_path_buf(),
            session,
            input_name,
            input_width,
        })
    }

    /// Checks the graph has one fixed-width input and at least one output.
    fn validate_model(session: &Session) -> Result<(String, usize), String> {
        let input = match session.inputs.as_slice() {
            [input] => input,
            inputs => {
                return Err(format!(
                    "Model must have exactly 1 input (feature vector), found {}",
                    inputs.len()
                ))
            }
        };
        if session.outputs.is_empty() {
            return Err("Model must have at least 1 output for the probability".to_string());
        }

        let dimensions = input
            .input_type
            .tensor_dimensions()
            .ok_or_else(|| format!("Input '{}' is not a tensor", input.name))?;
        let width = match dimensions.last() {
            Some(&w) if w > 0 => w as usize,
            _ => {
                return Err(format!(
                    "Input '{}' must have a static feature width, found shape {:?}",
                    input.name, dimensions
                ))
            }
        };
        Ok((input.name.clone(), width))
    }

    /// Path the graph was loaded from
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

impl Scorer for OnnxScorer {
    fn name(&self) -> &str {
        "onnx"
    }

    fn input_width(&self) -> usize {
        self.input_width
    }

    fn predict(&self, features: &FeatureVector) -> Result<f32, ClassifierError> {
        check_width(features, self.input_width)?;

        let input_array = Array2::from_shape_vec((1, self.input_width), features.to_vec())
            .map_err(|e| ClassifierError::ModelError(format!("Failed to create input array: {}", e)))?;

        let mut input_tensors = HashMap::new();
        input_tensors.insert(
            self.input_name.as_str(),
            Tensor::from_array(input_array)
                .map_err(|e| ClassifierError::ModelError(format!("Failed to create input tensor: {}", e)))?,
        );

        let outputs = self
            .session
            .run(input_tensors)
            .map_err(|e| ClassifierError::ModelError(format!("Failed to run model: {}", e)))?;
        let output_tensor = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::ModelError(format!("Failed to extract output tensor: {}", e)))?;

        let raw = output_tensor.iter().next().copied().ok_or_else(|| {
            ClassifierError::PredictionError("Model returned an empty output tensor".into())
        })?;
        debug!("ONNX output: {}", raw);
        finish_probability(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_missing_model() {
        let err = OnnxScorer::load("/nonexistent/smsguard/spam_model.onnx", &RuntimeConfig::default())
            .unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Missing { .. }));
    }

    #[test]
    fn test_corrupt_model() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("spam_model.onnx");
        fs::write(&path, "corrupted data")?;

        let err = OnnxScorer::load(&path, &RuntimeConfig::default()).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Corrupt { .. }));
        Ok(())
    }
}

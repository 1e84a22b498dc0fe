use std::path::{Path, PathBuf};

use log::info;

use super::error::{ArtifactLoadError, ClassifierError, DimensionMismatchError};
use super::network::DenseNetwork;
use super::onnx::OnnxScorer;
use super::scorer::{FeatureVector, Scorer};
use super::vectorizer::TfidfVectorizer;
use crate::runtime::RuntimeConfig;

/// On-disk encoding of a classifier artifact, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    /// JSON dense network (`spam_model.json`)
    Dense,
    /// ONNX graph (`spam_model.onnx`)
    Onnx,
}

impl ModelFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("onnx") => Self::Onnx,
            _ => Self::Dense,
        }
    }
}

/// Loads a classifier artifact with the engine matching its format.
pub fn load_classifier(
    path: impl AsRef<Path>,
    config: &RuntimeConfig,
) -> Result<Box<dyn Scorer>, ArtifactLoadError> {
    let path = path.as_ref();
    Ok(match ModelFormat::from_path(path) {
        ModelFormat::Dense => Box::new(DenseNetwork::load(path)?),
        ModelFormat::Onnx => Box::new(OnnxScorer::load(path, config)?),
    })
}

/// Like [`load_classifier`], for artifact bytes that have already been read.
pub(crate) fn classifier_from_slice(
    bytes: &[u8],
    path: &Path,
    config: &RuntimeConfig,
) -> Result<Box<dyn Scorer>, ArtifactLoadError> {
    Ok(match ModelFormat::from_path(path) {
        ModelFormat::Dense => Box::new(DenseNetwork::from_slice(bytes, path)?),
        ModelFormat::Onnx => Box::new(OnnxScorer::from_slice(bytes, path, config)?),
    })
}

/// A vectorizer and a scorer known to agree on feature dimensionality.
///
/// Immutable once constructed; the dimension check happens here, once, so the
/// per-request path never has to repeat it.
#[derive(Debug)]
pub struct TrainedArtifacts {
    vectorizer: TfidfVectorizer,
    scorer: Box<dyn Scorer>,
    model_path: Option<PathBuf>,
}

impl TrainedArtifacts {
    /// Pairs an already loaded vectorizer and scorer.
    ///
    /// # Errors
    /// `DimensionMismatchError` if the vectorizer's output length differs from
    /// the scorer's input width.
    pub fn new(
        vectorizer: TfidfVectorizer,
        scorer: Box<dyn Scorer>,
    ) -> Result<Self, DimensionMismatchError> {
        if vectorizer.dimension() != scorer.input_width() {
            return Err(DimensionMismatchError {
                vectorizer: vectorizer.dimension(),
                classifier: scorer.input_width(),
            });
        }
        Ok(Self {
            vectorizer,
            scorer,
            model_path: None,
        })
    }

    /// Loads both artifacts from disk and validates that they fit together.
    pub fn load(
        vectorizer_path: impl AsRef<Path>,
        classifier_path: impl AsRef<Path>,
    ) -> Result<Self, ClassifierError> {
        Self::load_with_config(vectorizer_path, classifier_path, &RuntimeConfig::default())
    }

    pub fn load_with_config(
        vectorizer_path: impl AsRef<Path>,
        classifier_path: impl AsRef<Path>,
        config: &RuntimeConfig,
    ) -> Result<Self, ClassifierError> {
        let classifier_path = classifier_path.as_ref();
        let vectorizer = TfidfVectorizer::load(vectorizer_path)?;
        let scorer = load_classifier(classifier_path, config)?;
        let artifacts = Self::new(vectorizer, scorer)?.with_model_path(classifier_path);
        info!(
            "Artifacts ready: {} features, scorer '{}'",
            artifacts.vectorizer.dimension(),
            artifacts.scorer.name()
        );
        Ok(artifacts)
    }

    pub(crate) fn with_model_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.model_path = Some(path.into());
        self
    }

    pub fn vectorizer(&self) -> &TfidfVectorizer {
        &self.vectorizer
    }

    pub fn scorer(&self) -> &dyn Scorer {
        self.scorer.as_ref()
    }

    /// Classifier artifact path, when the scorer was loaded from disk
    pub fn model_path(&self) -> Option<&Path> {
        self.model_path.as_deref()
    }

    pub fn features(&self, text: &str) -> FeatureVector {
        self.vectorizer.transform(text)
    }
}

/// Startup entry point: loads the vectorizer and classifier pair.
///
/// Fails with `ArtifactLoad` when either file is missing, unreadable or
/// incompatible, and with `DimensionMismatch` when they were not trained together.
pub fn load_artifacts(
    vectorizer_path: impl AsRef<Path>,
    classifier_path: impl AsRef<Path>,
) -> Result<TrainedArtifacts, ClassifierError> {
    TrainedArtifacts::load(vectorizer_path, classifier_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_format_from_extension() {
        assert_eq!(ModelFormat::from_path(Path::new("a/spam_model.onnx")), ModelFormat::Onnx);
        assert_eq!(ModelFormat::from_path(Path::new("a/SPAM.ONNX")), ModelFormat::Onnx);
        assert_eq!(ModelFormat::from_path(Path::new("a/spam_model.json")), ModelFormat::Dense);
        assert_eq!(ModelFormat::from_path(Path::new("a/model")), ModelFormat::Dense);
    }

    #[test]
    fn test_missing_classifier_is_load_error() {
        let result = load_classifier("/nonexistent/smsguard/spam_model.json", &RuntimeConfig::default());
        assert!(matches!(result, Err(ArtifactLoadError::Missing { .. })));
    }
}

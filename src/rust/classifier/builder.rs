use std::path::{Path, PathBuf};

use log::{error, info};

use super::artifacts::{classifier_from_slice, load_classifier, TrainedArtifacts};
use super::detector::{SpamDetector, SPAM_THRESHOLD};
use super::error::ClassifierError;
use super::scorer::Scorer;
use super::vectorizer::TfidfVectorizer;
use crate::artifact_store::ArtifactStore;
use crate::runtime::RuntimeConfig;

/// A builder for constructing a SpamDetector with a fluent interface.
#[derive(Debug)]
pub struct SpamDetectorBuilder {
    vectorizer: Option<TfidfVectorizer>,
    scorer: Option<Box<dyn Scorer>>,
    model_path: Option<PathBuf>,
    threshold: f32,
    runtime_config: RuntimeConfig,
}

impl Default for SpamDetectorBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SpamDetectorBuilder {
    /// Creates a new empty SpamDetectorBuilder instance with default configuration
    ///
    /// # Example
    /// ```
    /// use smsguard::SpamDetectorBuilder;
    ///
    /// let builder = SpamDetectorBuilder::new();
    /// ```
    pub fn new() -> Self {
        Self {
            vectorizer: None,
            scorer: None,
            model_path: None,
            threshold: SPAM_THRESHOLD,
            runtime_config: RuntimeConfig::default(),
        }
    }

    /// Sets the runtime configuration used when an ONNX classifier is loaded.
    /// Must be called before [`with_model`](Self::with_model) to take effect.
    pub fn with_runtime_config(mut self, config: RuntimeConfig) -> Self {
        self.runtime_config = config;
        self
    }

    /// Loads the vectorizer artifact
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - A vectorizer is already set
    ///   - The path is empty
    ///   - The artifact is missing, corrupt or of an unsupported version
    pub fn with_vectorizer(mut self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Vectorizer path cannot be empty".to_string()));
        }
        if self.vectorizer.is_some() {
            return Err(ClassifierError::BuildError("Vectorizer already set".to_string()));
        }

        let vectorizer = TfidfVectorizer::load(path).map_err(|e| {
            error!("Failed to load vectorizer: {}", e);
            e
        })?;
        self.vectorizer = Some(vectorizer);
        Ok(self)
    }

    /// Loads the classifier artifact. Files ending in `.onnx` run through ONNX
    /// Runtime, anything else is read as a dense network document.
    ///
    /// # Returns
    /// * `Result<Self, ClassifierError>` - The builder instance if successful, or an error if:
    ///   - A classifier is already set
    ///   - The path is empty
    ///   - The artifact is missing, corrupt or of an unsupported version
    pub fn with_model(mut self, path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(ClassifierError::BuildError("Model path cannot be empty".to_string()));
        }
        if self.scorer.is_some() {
            return Err(ClassifierError::BuildError("Classifier already set".to_string()));
        }

        let scorer = load_classifier(path, &self.runtime_config).map_err(|e| {
            error!("Failed to load classifier: {}", e);
            e
        })?;
        info!("Classifier '{}' accepts {} features", scorer.name(), scorer.input_width());
        self.scorer = Some(scorer);
        self.model_path = Some(path.to_path_buf());
        Ok(self)
    }

    /// Loads both artifacts from an [`ArtifactStore`]. When the store carries a
    /// manifest, each file is read once and parsed from the same bytes whose
    /// checksum was verified.
    pub fn with_store(mut self, store: &ArtifactStore) -> Result<Self, ClassifierError> {
        if self.vectorizer.is_some() {
            return Err(ClassifierError::BuildError("Vectorizer already set".to_string()));
        }
        if self.scorer.is_some() {
            return Err(ClassifierError::BuildError("Classifier already set".to_string()));
        }

        let manifest = store.manifest()?;

        let vectorizer_path = store.vectorizer_path();
        info!("Loading vectorizer from {:?}", vectorizer_path);
        let bytes = store.read_verified(manifest.as_ref(), &vectorizer_path)?;
        let vectorizer = TfidfVectorizer::from_slice(&bytes, &vectorizer_path).map_err(|e| {
            error!("Failed to load vectorizer: {}", e);
            e
        })?;

        let model_path = store.model_path();
        info!("Loading classifier from {:?}", model_path);
        let bytes = store.read_verified(manifest.as_ref(), &model_path)?;
        let scorer = classifier_from_slice(&bytes, &model_path, &self.runtime_config).map_err(|e| {
            error!("Failed to load classifier: {}", e);
            e
        })?;
        info!("Classifier '{}' accepts {} features", scorer.name(), scorer.input_width());

        self.vectorizer = Some(vectorizer);
        self.scorer = Some(scorer);
        self.model_path = Some(model_path);
        Ok(self)
    }

    /// Uses an in-memory scoring engine instead of loading one from disk
    pub fn with_scorer(mut self, scorer: Box<dyn Scorer>) -> Result<Self, ClassifierError> {
        if self.scorer.is_some() {
            return Err(ClassifierError::BuildError("Classifier already set".to_string()));
        }
        self.scorer = Some(scorer);
        self.model_path = None;
        Ok(self)
    }

    /// Overrides the spam decision threshold (default [`SPAM_THRESHOLD`]).
    ///
    /// # Errors
    /// `ValidationError` unless `threshold` is a finite number in `[0, 1]`.
    pub fn with_threshold(mut self, threshold: f32) -> Result<Self, ClassifierError> {
        if !threshold.is_finite() || !(0.0..=1.0).contains(&threshold) {
            return Err(ClassifierError::ValidationError(format!(
                "Threshold must be within [0, 1], got {}",
                threshold
            )));
        }
        self.threshold = threshold;
        Ok(self)
    }

    /// Builds and returns the final SpamDetector instance
    ///
    /// # Returns
    /// * `Result<SpamDetector, ClassifierError>` - The constructed detector if successful, or an error if:
    ///   - No vectorizer or classifier has been set
    ///   - The vectorizer and classifier disagree on feature dimensionality
    pub fn build(mut self) -> Result<SpamDetector, ClassifierError> {
        let vectorizer = self
            .vectorizer
            .take()
            .ok_or_else(|| ClassifierError::BuildError("Vectorizer must be set".to_string()))?;
        let scorer = self
            .scorer
            .take()
            .ok_or_else(|| ClassifierError::BuildError("Classifier must be set".to_string()))?;

        let mut artifacts = TrainedArtifacts::new(vectorizer, scorer).map_err(|e| {
            error!("Artifacts are incompatible: {}", e);
            e
        })?;
        if let Some(path) = self.model_path.take() {
            artifacts = artifacts.with_model_path(path);
        }

        info!("Spam detector ready (threshold {})", self.threshold);
        Ok(SpamDetector::from_parts(artifacts, self.threshold))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_requires_artifacts() {
        let result = SpamDetectorBuilder::new().build();
        assert!(matches!(result, Err(ClassifierError::BuildError(_))));
    }

    #[test]
    fn test_empty_paths_rejected() {
        assert!(matches!(
            SpamDetectorBuilder::new().with_vectorizer(""),
            Err(ClassifierError::BuildError(_))
        ));
        assert!(matches!(
            SpamDetectorBuilder::new().with_model(""),
            Err(ClassifierError::BuildError(_))
        ));
    }

    #[test]
    fn test_threshold_validation() {
        assert!(SpamDetectorBuilder::new().with_threshold(0.7).is_ok());
        assert!(SpamDetectorBuilder::new().with_threshold(0.0).is_ok());
        assert!(SpamDetectorBuilder::new().with_threshold(1.0).is_ok());
        for bad in [-0.1, 1.5, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                SpamDetectorBuilder::new().with_threshold(bad),
                Err(ClassifierError::ValidationError(_))
            ));
        }
    }

    #[test]
    fn test_missing_vectorizer_is_load_error() {
        let result = SpamDetectorBuilder::new().with_vectorizer("/nonexistent/smsguard/vectorizer.json");
        assert!(matches!(result, Err(ClassifierError::ArtifactLoad(_))));
    }
}

use std::path::Path;

use log::{error, info, warn};

use super::detector::{InferenceResult, SpamDetector};
use super::error::ClassifierError;

/// Where the artifact load lifecycle currently stands.
///
/// `Unloaded -> Loading -> Ready` or `Unloaded -> Loading -> Failed`. `Failed`
/// is terminal: fixing the artifacts requires a new process.
#[derive(Debug)]
pub enum LoadState {
    Unloaded,
    Loading,
    Ready(SpamDetector),
    Failed(ClassifierError),
}

impl LoadState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Unloaded => "unloaded",
            Self::Loading => "loading",
            Self::Ready(_) => "ready",
            Self::Failed(_) => "failed",
        }
    }
}

/// Serves inference only once artifacts have loaded successfully.
///
/// Callers that hit a load failure get an `Unavailable` error from
/// [`classify`](Self::classify) instead of a default prediction.
#[derive(Debug)]
pub struct DetectorService {
    state: LoadState,
}

impl Default for DetectorService {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorService {
    pub fn new() -> Self {
        Self {
            state: LoadState::Unloaded,
        }
    }

    /// Loads the vectorizer and classifier pair and returns the resulting service,
    /// either ready or failed.
    pub fn start(vectorizer_path: impl AsRef<Path>, model_path: impl AsRef<Path>) -> Self {
        let (vectorizer_path, model_path) = (vectorizer_path.as_ref(), model_path.as_ref());
        Self::new().load_with(|| {
            SpamDetector::builder()
                .with_vectorizer(vectorizer_path)?
                .with_model(model_path)?
                .build()
        })
    }

    /// Runs `loader` if nothing has been loaded yet. Any other state is kept
    /// as is, so a failed service never retries.
    pub fn load_with<F>(mut self, loader: F) -> Self
    where
        F: FnOnce() -> Result<SpamDetector, ClassifierError>,
    {
        if !matches!(self.state, LoadState::Unloaded) {
            warn!("Ignoring load request, artifacts are {}", self.state.name());
            return self;
        }

        self.state = LoadState::Loading;
        info!("Artifacts: unloaded -> loading");
        self.state = match loader() {
            Ok(detector) => {
                info!("Artifacts: loading -> ready");
                LoadState::Ready(detector)
            }
            Err(e) => {
                error!("Artifacts: loading -> failed: {}", e);
                LoadState::Failed(e)
            }
        };
        self
    }

    pub fn state(&self) -> &LoadState {
        &self.state
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, LoadState::Ready(_))
    }

    pub fn detector(&self) -> Option<&SpamDetector> {
        match &self.state {
            LoadState::Ready(detector) => Some(detector),
            _ => None,
        }
    }

    /// The error that put the service into the failed state, if any
    pub fn failure(&self) -> Option<&ClassifierError> {
        match &self.state {
            LoadState::Failed(e) => Some(e),
            _ => None,
        }
    }

    pub fn classify(&self, text: &str) -> Result<InferenceResult, ClassifierError> {
        match &self.state {
            LoadState::Ready(detector) => detector.classify(text),
            LoadState::Failed(e) => Err(ClassifierError::Unavailable(format!(
                "artifacts failed to load: {}",
                e
            ))),
            LoadState::Unloaded | LoadState::Loading => Err(ClassifierError::Unavailable(
                "artifacts are not loaded".to_string(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unloaded_service_refuses_inference() {
        let service = DetectorService::new();
        assert_eq!(service.state().name(), "unloaded");
        assert!(matches!(service.classify("hi"), Err(ClassifierError::Unavailable(_))));
    }

    #[test]
    fn test_failed_load_is_terminal() {
        let service = DetectorService::new()
            .load_with(|| Err(ClassifierError::BuildError("boom".into())));
        assert_eq!(service.state().name(), "failed");
        assert!(!service.is_ready());
        assert!(service.detector().is_none());
        assert!(matches!(service.failure(), Some(ClassifierError::BuildError(_))));

        // A second attempt is ignored rather than retried
        let mut called = false;
        let service = service.load_with(|| {
            called = true;
            Err(ClassifierError::BuildError("again".into()))
        });
        assert!(!called);
        assert_eq!(service.state().name(), "failed");

        match service.classify("hello") {
            Err(ClassifierError::Unavailable(msg)) => assert!(msg.contains("boom")),
            other => panic!("expected Unavailable, got {:?}", other),
        }
    }

    #[test]
    fn test_start_with_missing_artifacts() {
        let service = DetectorService::start(
            "/nonexistent/smsguard/vectorizer.json",
            "/nonexistent/smsguard/spam_model.json",
        );
        assert!(matches!(service.failure(), Some(ClassifierError::ArtifactLoad(_))));
    }
}

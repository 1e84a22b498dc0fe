use std::path::PathBuf;

mod artifacts;
pub mod builder;
mod detector;
mod error;
mod lifecycle;
mod network;
mod onnx;
mod scorer;
mod utils;
mod vectorizer;

pub use artifacts::{load_artifacts, load_classifier, ModelFormat, TrainedArtifacts};
pub use builder::SpamDetectorBuilder;
pub use detector::{InferenceResult, Label, SpamDetector, SPAM_THRESHOLD};
pub use error::{ArtifactLoadError, ClassifierError, DimensionMismatchError};
pub use lifecycle::{DetectorService, LoadState};
pub use network::{Activation, DenseLayer, DenseNetwork};
pub use onnx::OnnxScorer;
pub use scorer::{FeatureVector, Scorer};
pub use vectorizer::{Norm, TfidfVectorizer};

/// Information about the artifacts a detector was built from
#[derive(Debug, Clone)]
pub struct DetectorInfo {
    /// Path to the vectorizer artifact
    pub vectorizer_path: PathBuf,
    /// Path to the classifier artifact, `None` for an in-memory scorer
    pub model_path: Option<PathBuf>,
    /// Name of the scoring engine
    pub scorer: String,
    /// Length of the feature vectors
    pub vocabulary_size: usize,
    /// Spam decision threshold
    pub threshold: f32,
}

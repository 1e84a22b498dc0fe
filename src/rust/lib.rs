//! A small, deterministic SMS spam classifier.
//!
//! A fitted TF-IDF vectorizer turns a message into a fixed-length feature
//! vector, a feed-forward scorer turns that vector into a spam probability, and
//! the decision layer applies the threshold.
//!
//! # Basic Usage
//!
//! ```no_run
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use smsguard::SpamDetector;
//!
//! let detector = SpamDetector::builder()
//!     .with_vectorizer("artifacts/vectorizer.json")?
//!     .with_model("artifacts/spam_model.json")?
//!     .build()?;
//!
//! let result = detector.classify("Congratulations! You won £1000! Click here now!")?;
//! println!("spam: {} ({:.1}%)", result.is_spam, result.probability * 100.0);
//! # Ok(())
//! # }
//! ```
//!
//! # Failing closed
//!
//! Artifacts are loaded once at startup. A [`DetectorService`] that failed to
//! load refuses every request instead of guessing:
//!
//! ```no_run
//! use smsguard::{ClassifierError, DetectorService};
//!
//! let service = DetectorService::start("missing/vectorizer.json", "missing/spam_model.json");
//! assert!(matches!(
//!     service.classify("hello"),
//!     Err(ClassifierError::Unavailable(_))
//! ));
//! ```

pub mod artifact_store;
pub mod classifier;
mod runtime;

pub use artifact_store::{ArtifactStore, Manifest};
pub use classifier::{
    load_artifacts, ArtifactLoadError, ClassifierError, DenseNetwork, DetectorInfo,
    DetectorService, DimensionMismatchError, FeatureVector, InferenceResult, Label, LoadState,
    OnnxScorer, Scorer, SpamDetector, SpamDetectorBuilder, TfidfVectorizer, TrainedArtifacts,
    SPAM_THRESHOLD,
};
pub use runtime::{create_session_builder, RuntimeConfig};

pub fn init_logger() {
    env_logger::init();
}

use std::fmt;

use log::debug;

use super::artifacts::TrainedArtifacts;
use super::builder::SpamDetectorBuilder;
use super::error::ClassifierError;
use super::DetectorInfo;

/// Probability above which a message is reported as spam.
pub const SPAM_THRESHOLD: f32 = 0.5;

/// The two target classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Spam,
    Ham,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spam => write!(f, "spam"),
            Self::Ham => write!(f, "ham"),
        }
    }
}

/// Outcome of classifying one message.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceResult {
    /// Raw scorer output in `[0, 1]`
    pub probability: f32,
    /// `probability > threshold`
    pub is_spam: bool,
    /// `max(probability, 1 - probability)`, always in `[0.5, 1]`
    pub confidence: f32,
}

impl InferenceResult {
    pub fn from_probability(probability: f32, threshold: f32) -> Self {
        Self {
            probability,
            is_spam: probability > threshold,
            confidence: probability.max(1.0 - probability),
        }
    }

    pub fn label(&self) -> Label {
        if self.is_spam {
            Label::Spam
        } else {
            Label::Ham
        }
    }
}

/// Decides spam versus ham for free text.
///
/// Owns its [`TrainedArtifacts`] and never mutates them, so it is `Send + Sync`
/// and can be shared across threads behind an `Arc`:
///
/// ```no_run
/// # fn main() -> Result<(), Box<dyn std::error::Error>> {
/// use smsguard::SpamDetector;
/// use std::sync::Arc;
/// use std::thread;
///
/// let detector = Arc::new(SpamDetector::builder()
///     .with_vectorizer("artifacts/vectorizer.json")?
///     .with_model("artifacts/spam_model.json")?
///     .build()?);
///
/// let detector_clone = Arc::clone(&detector);
/// thread::spawn(move || {
///     detector_clone.classify("Meeting at 3 PM").unwrap();
/// });
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct SpamDetector {
    artifacts: TrainedArtifacts,
    threshold: f32,
}

// Compile-time verification of thread-safety
const _: () = {
    fn assert_send_sync<T: Send + Sync>() {}
    fn verify_thread_safety() {
        assert_send_sync::<SpamDetector>();
    }
};

impl SpamDetector {
    /// Creates a new SpamDetectorBuilder for fluent construction
    pub fn builder() -> SpamDetectorBuilder {
        SpamDetectorBuilder::new()
    }

    /// Wraps validated artifacts with the default [`SPAM_THRESHOLD`]
    pub fn new(artifacts: TrainedArtifacts) -> Self {
        Self::from_parts(artifacts, SPAM_THRESHOLD)
    }

    pub(crate) fn from_parts(artifacts: TrainedArtifacts, threshold: f32) -> Self {
        Self {
            artifacts,
            threshold,
        }
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn artifacts(&self) -> &TrainedArtifacts {
        &self.artifacts
    }

    /// Returns information about the loaded artifacts
    pub fn info(&self) -> DetectorInfo {
        DetectorInfo {
            vectorizer_path: self.artifacts.vectorizer().path().to_path_buf(),
            model_path: self.artifacts.model_path().map(|p| p.to_path_buf()),
            scorer: self.artifacts.scorer().name().to_string(),
            vocabulary_size: self.artifacts.vectorizer().dimension(),
            threshold: self.threshold,
        }
    }

    /// Classifies one message.
    ///
    /// Any text is accepted, including the empty string and text with no known
    /// words. Errors only come from the scoring engine itself (e.g. an ONNX
    /// Runtime failure), never from the content of `text`.
    ///
    /// # Example
    /// ```no_run
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// # let detector = smsguard::SpamDetector::builder()
    /// #     .with_vectorizer("artifacts/vectorizer.json")?
    /// #     .with_model("artifacts/spam_model.json")?
    /// #     .build()?;
    /// let result = detector.classify("URGENT: Verify now")?;
    /// println!("{} ({:.1}%)", result.label(), result.confidence * 100.0);
    /// # Ok(())
    /// # }
    /// ```
    pub fn classify(&self, text: &str) -> Result<InferenceResult, ClassifierError> {
        let features = self.artifacts.features(text);
        let probability = self.artifacts.scorer().predict(&features)?;
        let result = InferenceResult::from_probability(probability, self.threshold);
        debug!(
            "Classified {} chars: p(spam)={:.4} -> {}",
            text.chars().count(),
            probability,
            result.label()
        );
        Ok(result)
    }
}

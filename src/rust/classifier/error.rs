use std::io;
use std::path::PathBuf;

/// Reasons a vectorizer or classifier artifact could not be loaded.
///
/// All variants are fatal at startup: a process holding one of these must not
/// serve predictions.
#[derive(Debug, thiserror::Error)]
pub enum ArtifactLoadError {
    #[error("Artifact not found: {}", path.display())]
    Missing { path: PathBuf },
    #[error("Failed to read artifact {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Artifact {} is corrupt: {reason}", path.display())]
    Corrupt { path: PathBuf, reason: String },
    #[error("Artifact {} has format version {found}, supported version is {expected}", path.display())]
    IncompatibleSchema {
        path: PathBuf,
        found: u32,
        expected: u32,
    },
    #[error("Checksum mismatch for {}: expected {expected}, got {actual}", path.display())]
    ChecksumMismatch {
        path: PathBuf,
        expected: String,
        actual: String,
    },
}

impl ArtifactLoadError {
    /// Path of the artifact that failed to load
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Missing { path }
            | Self::Unreadable { path, .. }
            | Self::Corrupt { path, .. }
            | Self::IncompatibleSchema { path, .. }
            | Self::ChecksumMismatch { path, .. } => path,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Corrupt {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn from_io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        let path = path.into();
        if source.kind() == io::ErrorKind::NotFound {
            Self::Missing { path }
        } else {
            Self::Unreadable { path, source }
        }
    }
}

/// The vectorizer and classifier were trained against different feature spaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("Dimension mismatch: vectorizer produces {vectorizer} features but classifier expects {classifier}")]
pub struct DimensionMismatchError {
    pub vectorizer: usize,
    pub classifier: usize,
}

/// Represents the different types of errors that can occur in the spam classifier.
#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    /// An artifact was missing, unreadable, corrupt or of an unsupported version
    #[error(transparent)]
    ArtifactLoad(#[from] ArtifactLoadError),
    /// Vectorizer and classifier disagree on feature dimensionality
    #[error(transparent)]
    DimensionMismatch(#[from] DimensionMismatchError),
    /// Error occurred while running the scoring engine
    #[error("Model error: {0}")]
    ModelError(String),
    /// Error occurred during the build phase
    #[error("Build error: {0}")]
    BuildError(String),
    /// The scoring engine produced an unusable value
    #[error("Prediction error: {0}")]
    PredictionError(String),
    /// Error occurred due to invalid input parameters
    #[error("Validation error: {0}")]
    ValidationError(String),
    /// Inference was requested while no artifacts are loaded
    #[error("Classifier unavailable: {0}")]
    Unavailable(String),
}

impl From<ort::Error> for ClassifierError {
    fn from(err: ort::Error) -> Self {
        ClassifierError::ModelError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_maps_to_missing() {
        let err = ArtifactLoadError::from_io(
            "missing.json",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, ArtifactLoadError::Missing { .. }));
        assert_eq!(err.path(), &PathBuf::from("missing.json"));
    }

    #[test]
    fn test_other_io_maps_to_unreadable() {
        let err = ArtifactLoadError::from_io(
            "locked.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(matches!(err, ArtifactLoadError::Unreadable { .. }));
    }

    #[test]
    fn test_mismatch_message_names_both_sides() {
        let err = ClassifierError::from(DimensionMismatchError {
            vectorizer: 36,
            classifier: 8,
        });
        let message = err.to_string();
        assert!(message.contains("36"));
        assert!(message.contains("8"));
    }
}

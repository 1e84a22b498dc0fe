use std::fmt::Debug;

use ndarray::Array1;

use super::error::{ClassifierError, DimensionMismatchError};

/// Fixed-length numeric representation of a message, one slot per vocabulary entry.
pub type FeatureVector = Array1<f32>;

/// Anything that can score a fixed-length feature vector with a spam probability.
///
/// The decision layer only talks to this trait, so the concrete engine (a dense
/// network, an ONNX graph, a hand-written linear model in a test) can be swapped
/// without touching it. Implementations must be reentrant: `predict` takes `&self`
/// and may be called from several threads at once.
pub trait Scorer: Send + Sync + Debug {
    /// Short human-readable engine name, used in logs and `DetectorInfo`
    fn name(&self) -> &str;

    /// Number of features the engine was trained to accept
    fn input_width(&self) -> usize;

    /// Returns the spam probability for `features`, in `[0, 1]`.
    ///
    /// # Errors
    /// - `DimensionMismatch` if `features.len() != self.input_width()`
    /// - `PredictionError` / `ModelError` if the engine itself fails
    fn predict(&self, features: &FeatureVector) -> Result<f32, ClassifierError>;
}

pub(crate) fn check_width(features: &FeatureVector, expected: usize) -> Result<(), ClassifierError> {
    if features.len() != expected {
        return Err(DimensionMismatchError {
            vectorizer: features.len(),
            classifier: expected,
        }
        .into());
    }
    Ok(())
}

/// Rejects non-finite engine output and clamps rounding drift into `[0, 1]`.
pub(crate) fn finish_probability(raw: f32) -> Result<f32, ClassifierError> {
    if !raw.is_finite() {
        return Err(ClassifierError::PredictionError(format!(
            "Scorer returned a non-finite probability: {}",
            raw
        )));
    }
    Ok(raw.clamp(0.0, 1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_width() {
        let features = FeatureVector::zeros(3);
        assert!(check_width(&features, 3).is_ok());
        assert!(matches!(
            check_width(&features, 4),
            Err(ClassifierError::DimensionMismatch(DimensionMismatchError {
                vectorizer: 3,
                classifier: 4
            }))
        ));
    }

    #[test]
    fn test_finish_probability() {
        assert_eq!(finish_probability(0.25).unwrap(), 0.25);
        assert_eq!(finish_probability(1.0000001).unwrap(), 1.0);
        assert_eq!(finish_probability(-0.0001).unwrap(), 0.0);
        assert!(finish_probability(f32::NAN).is_err());
        assert!(finish_probability(f32::INFINITY).is_err());
    }
}

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info};
use ndarray::Array1;
use serde::Deserialize;
use tokenizers::Tokenizer;

use super::error::ArtifactLoadError;
use super::scorer::FeatureVector;
use super::utils::{normalize_l1, normalize_vector};

/// Vector normalisation applied after TF-IDF weighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Norm {
    L1,
    #[default]
    L2,
    None,
}

#[derive(Debug, Deserialize)]
struct VectorizerArtifact {
    format_version: u32,
    tokenizer: serde_json::Value,
    #[serde(default)]
    unknown_token: Option<String>,
    vocabulary_size: usize,
    #[serde(default)]
    idf: Option<Vec<f32>>,
    #[serde(default)]
    norm: Norm,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default)]
    binary: bool,
}

/// A fitted TF-IDF vectorizer.
///
/// Normalisation (case folding, punctuation splitting) and the vocabulary come
/// from the embedded tokenizer document, so two processes loading the same
/// artifact produce bit-identical vectors for the same text.
///
/// Only the first `vocabulary_size` token ids are features. The configured
/// unknown token, and any id beyond the feature range, is dropped.
#[derive(Debug)]
pub struct TfidfVectorizer {
    path: PathBuf,
    tokenizer: Tokenizer,
    unknown_id: Option<u32>,
    vocabulary_size: usize,
    idf: Option<Array1<f32>>,
    norm: Norm,
    sublinear_tf: bool,
    binary: bool,
}

impl TfidfVectorizer {
    /// Artifact format version this build understands
    pub const FORMAT_VERSION: u32 = 1;

    /// Loads a vectorizer artifact from disk.
    ///
    /// # Errors
    /// - `Missing` / `Unreadable` if the file cannot be read
    /// - `Corrupt` if it is not a valid vectorizer document
    /// - `IncompatibleSchema` if `format_version` is not [`Self::FORMAT_VERSION`]
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ArtifactLoadError> {
        let path = path.as_ref();
        info!("Loading vectorizer from {:?}", path);
        let bytes = fs::read(path).map_err(|e| ArtifactLoadError::from_io(path, e))?;
        let vectorizer = Self::from_slice(&bytes, path)?;
        info!(
            "Vectorizer loaded: {} features, norm {:?}",
            vectorizer.vocabulary_size, vectorizer.norm
        );
        Ok(vectorizer)
    }

    pub(crate) fn from_slice(bytes: &[u8], path: &Path) -> Result<Self, ArtifactLoadError> {
        let artifact: VectorizerArtifact = serde_json::from_slice(bytes)
            .map_err(|e| ArtifactLoadError::corrupt(path, e.to_string()))?;

        if artifact.format_version != Self::FORMAT_VERSION {
            return Err(ArtifactLoadError::IncompatibleSchema {
                path: path.to_path_buf(),
                found: artifact.format_version,
                expected: Self::FORMAT_VERSION,
            });
        }
        if artifact.vocabulary_size == 0 {
            return Err(ArtifactLoadError::corrupt(path, "vocabulary_size must be positive"));
        }

        let idf = match artifact.idf {
            Some(weights) => {
                if weights.len() != artifact.vocabulary_size {
                    return Err(ArtifactLoadError::corrupt(
                        path,
                        format!(
                            "idf has {} weights but vocabulary_size is {}",
                            weights.len(),
                            artifact.vocabulary_size
                        ),
                    ));
                }
                if let Some(pos) = weights.iter().position(|w| !w.is_finite() || *w < 0.0) {
                    return Err(ArtifactLoadError::corrupt(
                        path,
                        format!("idf weight {} is not a finite non-negative number", pos),
                    ));
                }
                Some(Array1::from_vec(weights))
            }
            None => None,
        };

        let tokenizer_json = serde_json::to_vec(&artifact.tokenizer)
            .map_err(|e| ArtifactLoadError::corrupt(path, e.to_string()))?;
        let tokenizer = Tokenizer::from_bytes(tokenizer_json).map_err(|e| {
            error!("Failed to load tokenizer: {}", e);
            ArtifactLoadError::corrupt(path, format!("invalid tokenizer: {}", e))
        })?;

        // Without an explicit unknown token, fall back to the tokenizer model's own
        let unknown_token = artifact.unknown_token.clone().or_else(|| {
            artifact.tokenizer["model"]["unk_token"]
                .as_str()
                .map(str::to_string)
        });
        let unknown_id = match &unknown_token {
            Some(token) => Some(tokenizer.token_to_id(token).ok_or_else(|| {
                ArtifactLoadError::corrupt(
                    path,
                    format!("unknown token '{}' is not in the vocabulary", token),
                )
            })?),
            None => None,
        };

        // Out-of-vocabulary words must encode, and must not land on a feature
        let probe = "qzxvjkw wqpzrtx 0451999";
        let encoding = tokenizer.encode(probe, false).map_err(|e| {
            ArtifactLoadError::corrupt(
                path,
                format!("tokenizer cannot encode out-of-vocabulary text: {}", e),
            )
        })?;
        let leaked = encoding
            .get_ids()
            .iter()
            .find(|&&id| Some(id) != unknown_id && (id as usize) < artifact.vocabulary_size);
        if let Some(id) = leaked {
            return Err(ArtifactLoadError::corrupt(
                path,
                format!("out-of-vocabulary words map to feature {}", id),
            ));
        }

        Ok(Self {
            path: path.to_path_buf(),
            tokenizer,
            unknown_id,
            vocabulary_size: artifact.vocabulary_size,
            idf,
            norm: artifact.norm,
            sublinear_tf: artifact.sublinear_tf,
            binary: artifact.binary,
        })
    }

    /// Length of every vector produced by [`transform`](Self::transform)
    pub fn dimension(&self) -> usize {
        self.vocabulary_size
    }

    /// Path the artifact was loaded from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Maps raw text to its TF-IDF feature vector.
    ///
    /// Unknown tokens are ignored. Empty input, or input made only of unknown
    /// tokens, yields the all-zero vector.
    pub fn transform(&self, text: &str) -> FeatureVector {
        let mut counts = Array1::<f32>::zeros(self.vocabulary_size);

        let encoding = match self.tokenizer.encode(text, false) {
            Ok(encoding) => encoding,
            Err(e) => {
                // Unreachable for artifacts that passed the load-time probe
                error!("Tokenizer failed on input, treating it as empty: {}", e);
                return counts;
            }
        };

        let mut known = 0usize;
        for &id in encoding.get_ids() {
            if Some(id) == self.unknown_id {
                continue;
            }
            if let Some(slot) = counts.get_mut(id as usize) {
                *slot += 1.0;
                known += 1;
            }
        }
        debug!(
            "Vectorized {} tokens ({} known)",
            encoding.get_ids().len(),
            known
        );

        if self.binary {
            counts.mapv_inplace(|c| c.min(1.0));
        } else if self.sublinear_tf {
            counts.mapv_inplace(|c| if c > 0.0 { 1.0 + c.ln() } else { 0.0 });
        }
        if let Some(idf) = &self.idf {
            counts *= idf;
        }

        match self.norm {
            Norm::L2 => normalize_vector(&counts),
            Norm::L1 => normalize_l1(&counts),
            Norm::None => counts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn artifact(extra: serde_json::Value) -> Vec<u8> {
        let mut doc = json!({
            "format_version": 1,
            "tokenizer": {
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [],
                "normalizer": {"type": "Lowercase"},
                "pre_tokenizer": {"type": "Whitespace"},
                "post_processor": null,
                "decoder": null,
                "model": {
                    "type": "WordLevel",
                    "vocab": {"free": 0, "prize": 1, "hello": 2, "[UNK]": 3},
                    "unk_token": "[UNK]"
                }
            },
            "unknown_token": "[UNK]",
            "vocabulary_size": 3,
            "idf": [1.0, 2.0, 1.0]
        });
        if let (Some(doc), Some(extra)) = (doc.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                doc.insert(key.clone(), value.clone());
            }
        }
        serde_json::to_vec(&doc).unwrap()
    }

    fn load(extra: serde_json::Value) -> Result<TfidfVectorizer, ArtifactLoadError> {
        TfidfVectorizer::from_slice(&artifact(extra), Path::new("vectorizer.json"))
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let vectorizer = load(json!({})).unwrap();
        let v = vectorizer.transform("");
        assert_eq!(v.len(), 3);
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_unknown_tokens_are_ignored() {
        let vectorizer = load(json!({})).unwrap();
        let v = vectorizer.transform("completely unrelated words !!");
        assert!(v.iter().all(|&x| x == 0.0));
    }

    #[test]
    fn test_case_folding_and_punctuation_come_from_tokenizer() {
        let vectorizer = load(json!({})).unwrap();
        assert_eq!(vectorizer.transform("FREE!"), vectorizer.transform("free"));
    }

    #[test]
    fn test_tfidf_weighting_l2() {
        let vectorizer = load(json!({})).unwrap();
        // free: tf 1 * idf 1, prize: tf 1 * idf 2
        let v = vectorizer.transform("free prize");
        let norm = 5f32.sqrt();
        assert!((v[0] - 1.0 / norm).abs() < 1e-6);
        assert!((v[1] - 2.0 / norm).abs() < 1e-6);
        assert_eq!(v[2], 0.0);
    }

    #[test]
    fn test_binary_and_unnormalized() {
        let vectorizer = load(json!({"binary": true, "norm": "none"})).unwrap();
        let v = vectorizer.transform("free free free hello");
        assert_eq!(v.to_vec(), vec![1.0, 0.0, 1.0]);
    }

    #[test]
    fn test_sublinear_tf() {
        let vectorizer = load(json!({"sublinear_tf": true, "norm": "none", "idf": null})).unwrap();
        let v = vectorizer.transform("hello hello");
        assert!((v[2] - (1.0 + 2f32.ln())).abs() < 1e-6);
    }

    #[test]
    fn test_l1_norm() {
        let vectorizer = load(json!({"norm": "l1"})).unwrap();
        let v = vectorizer.transform("free prize");
        assert!((v.sum() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_transform_is_deterministic() {
        let vectorizer = load(json!({})).unwrap();
        let text = "Free prize, hello HELLO free?";
        let a = vectorizer.transform(text);
        let b = vectorizer.transform(text);
        let bits_a: Vec<u32> = a.iter().map(|x| x.to_bits()).collect();
        let bits_b: Vec<u32> = b.iter().map(|x| x.to_bits()).collect();
        assert_eq!(bits_a, bits_b);
    }

    #[test]
    fn test_unsupported_format_version() {
        let err = load(json!({"format_version": 2})).unwrap_err();
        assert!(matches!(
            err,
            ArtifactLoadError::IncompatibleSchema {
                found: 2,
                expected: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_idf_length_must_match_vocabulary() {
        let err = load(json!({"idf": [1.0, 2.0]})).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Corrupt { .. }));
    }

    #[test]
    fn test_unknown_token_must_exist() {
        let err = load(json!({"unknown_token": "<unk>"})).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Corrupt { .. }));
    }

    /// Vocabulary whose unknown token sits inside the feature range
    fn unknown_first_artifact(unknown_token: Option<&str>) -> Vec<u8> {
        let mut doc = json!({
            "format_version": 1,
            "tokenizer": {
                "version": "1.0",
                "truncation": null,
                "padding": null,
                "added_tokens": [],
                "normalizer": {"type": "Lowercase"},
                "pre_tokenizer": {"type": "Whitespace"},
                "post_processor": null,
                "decoder": null,
                "model": {
                    "type": "WordLevel",
                    "vocab": {"[UNK]": 0, "free": 1, "prize": 2},
                    "unk_token": "[UNK]"
                }
            },
            "vocabulary_size": 3,
            "norm": "none"
        });
        if let Some(token) = unknown_token {
            doc["unknown_token"] = json!(token);
        }
        serde_json::to_vec(&doc).unwrap()
    }

    #[test]
    fn test_unknown_id_taken_from_tokenizer_model() {
        let vectorizer =
            TfidfVectorizer::from_slice(&unknown_first_artifact(None), Path::new("v.json")).unwrap();
        let v = vectorizer.transform("completely unrelated words");
        assert_eq!(v.to_vec(), vec![0.0, 0.0, 0.0]);

        let v = vectorizer.transform("free words prize");
        assert_eq!(v.to_vec(), vec![0.0, 1.0, 1.0]);
    }

    #[test]
    fn test_unknown_words_landing_on_a_feature_is_corrupt() {
        // "prize" is declared unknown, but the tokenizer sends unknown words to feature 0
        let err = TfidfVectorizer::from_slice(&unknown_first_artifact(Some("prize")), Path::new("v.json"))
            .unwrap_err();
        match err {
            ArtifactLoadError::Corrupt { reason, .. } => assert!(reason.contains("feature 0")),
            other => panic!("expected Corrupt, got {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_corrupt() {
        let err = TfidfVectorizer::from_slice(b"\x80not json", Path::new("v.json")).unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Corrupt { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = TfidfVectorizer::load("/nonexistent/smsguard/vectorizer.json").unwrap_err();
        assert!(matches!(err, ArtifactLoadError::Missing { .. }));
    }
}

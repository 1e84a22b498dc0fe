use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::classifier::ArtifactLoadError;

/// Environment variable overriding the default artifacts directory
pub const ARTIFACTS_ENV: &str = "SMSGUARD_ARTIFACTS";
pub const VECTORIZER_FILE: &str = "vectorizer.json";
pub const DENSE_MODEL_FILE: &str = "spam_model.json";
pub const ONNX_MODEL_FILE: &str = "spam_model.onnx";
pub const MANIFEST_FILE: &str = "manifest.json";

/// SHA-256 digests of the artifacts in a directory, keyed by file name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: BTreeMap<String, String>,
}

/// A directory holding one trained vectorizer/classifier pair.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Creates a store rooted at the default artifacts directory
    pub fn new_default() -> Self {
        Self::new(Self::get_default_artifacts_dir())
    }

    /// Returns the default artifacts directory path
    pub fn get_default_artifacts_dir() -> PathBuf {
        // 1. Check environment variable
        if let Ok(path) = env::var(ARTIFACTS_ENV) {
            return PathBuf::from(path);
        }

        // 2. Use platform-specific data directory
        if let Some(data_dir) = dirs::data_dir() {
            return data_dir.join("smsguard").join("artifacts");
        }

        // 3. Fallback to user's home directory
        if let Some(home_dir) = dirs::home_dir() {
            return home_dir
                .join(".local")
                .join("share")
                .join("smsguard")
                .join("artifacts");
        }

        // 4. If all else fails, use system temp directory (platform agnostic)
        env::temp_dir().join("smsguard").join("artifacts")
    }

    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn vectorizer_path(&self) -> PathBuf {
        self.root.join(VECTORIZER_FILE)
    }

    /// The classifier artifact: the dense network when present, else the ONNX graph
    pub fn model_path(&self) -> PathBuf {
        let dense = self.root.join(DENSE_MODEL_FILE);
        let onnx = self.root.join(ONNX_MODEL_FILE);
        if !dense.exists() && onnx.exists() {
            onnx
        } else {
            dense
        }
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join(MANIFEST_FILE)
    }

    pub fn is_available(&self) -> bool {
        let vectorizer_path = self.vectorizer_path();
        let model_path = self.model_path();
        log::info!("Checking if artifacts are available:");
        log::info!("  Vectorizer path: {:?} (exists: {})", vectorizer_path, vectorizer_path.exists());
        log::info!("  Model path: {:?} (exists: {})", model_path, model_path.exists());
        vectorizer_path.exists() && model_path.exists()
    }

    /// Reads the manifest, `Ok(None)` when the store has none
    pub fn manifest(&self) -> Result<Option<Manifest>, ArtifactLoadError> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(None);
        }
        let bytes = fs::read(&path).map_err(|e| ArtifactLoadError::from_io(&path, e))?;
        let manifest = serde_json::from_slice(&bytes)
            .map_err(|e| ArtifactLoadError::corrupt(&path, e.to_string()))?;
        Ok(Some(manifest))
    }

    /// Computes the manifest for the artifacts currently in the store
    pub fn compute_manifest(&self) -> Result<Manifest, ArtifactLoadError> {
        let mut manifest = Manifest::default();
        for path in [self.vectorizer_path(), self.model_path()] {
            let name = file_name(&path);
            manifest.files.insert(name, sha256_file(&path)?);
        }
        Ok(manifest)
    }

    /// Writes the manifest for the current artifacts, overwriting any existing one
    pub fn write_manifest(&self) -> Result<Manifest, ArtifactLoadError> {
        let manifest = self.compute_manifest()?;
        let path = self.manifest_path();
        let json = serde_json::to_string_pretty(&manifest)
            .map_err(|e| ArtifactLoadError::corrupt(&path, e.to_string()))?;
        fs::write(&path, json + "\n").map_err(|e| ArtifactLoadError::from_io(&path, e))?;
        log::info!("Wrote manifest to {:?}", path);
        Ok(manifest)
    }

    /// Reads one artifact and checks it against `manifest`, returning the bytes
    /// that were hashed. Files the manifest does not list are returned unchecked.
    pub fn read_verified(
        &self,
        manifest: Option<&Manifest>,
        path: &Path,
    ) -> Result<Vec<u8>, ArtifactLoadError> {
        let bytes = fs::read(path).map_err(|e| ArtifactLoadError::from_io(path, e))?;
        match manifest.and_then(|m| m.files.get(&file_name(path))) {
            Some(expected) => verify_file(path, &bytes, expected)?,
            None if manifest.is_some() => log::warn!("Manifest does not list {:?}", path),
            None => {}
        }
        Ok(bytes)
    }

    /// Checks the vectorizer and model against the manifest.
    ///
    /// A store without a manifest passes; artifacts the manifest does not list
    /// are not checked.
    pub fn verify(&self) -> Result<(), ArtifactLoadError> {
        let Some(manifest) = self.manifest()? else {
            log::debug!("No manifest in {:?}, skipping checksum verification", self.root);
            return Ok(());
        };

        for path in [self.vectorizer_path(), self.model_path()] {
            self.read_verified(Some(&manifest), &path)?;
        }
        log::info!("Artifacts verified against manifest");
        Ok(())
    }
}

fn verify_file(path: &Path, bytes: &[u8], expected_hash: &str) -> Result<(), ArtifactLoadError> {
    log::info!("Verifying file: {:?}", path);
    let hash = sha256_bytes(bytes);
    log::debug!("Calculated hash: {}", hash);
    log::debug!("Expected hash:   {}", expected_hash);
    if !hash.eq_ignore_ascii_case(expected_hash) {
        log::error!("Checksum mismatch for {:?}: expected {}, got {}", path, expected_hash, hash);
        return Err(ArtifactLoadError::ChecksumMismatch {
            path: path.to_path_buf(),
            expected: expected_hash.to_string(),
            actual: hash,
        });
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Lowercase hex SHA-256 of a file's contents
pub fn sha256_file(path: &Path) -> Result<String, ArtifactLoadError> {
    let bytes = fs::read(path).map_err(|e| ArtifactLoadError::from_io(path, e))?;
    Ok(sha256_bytes(&bytes))
}

fn sha256_bytes(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_artifacts_dir() {
        // Test with environment variable
        env::set_var(ARTIFACTS_ENV, "/tmp/smsguard-test-artifacts");
        let path = ArtifactStore::get_default_artifacts_dir();
        assert_eq!(path, PathBuf::from("/tmp/smsguard-test-artifacts"));
        env::remove_var(ARTIFACTS_ENV);

        // Test without environment variable
        let path = ArtifactStore::get_default_artifacts_dir();
        assert!(path.to_string_lossy().contains("smsguard"));
    }

    #[test]
    fn test_model_path_prefers_dense() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.model_path(), dir.path().join(DENSE_MODEL_FILE));

        fs::write(dir.path().join(ONNX_MODEL_FILE), b"onnx")?;
        assert_eq!(store.model_path(), dir.path().join(ONNX_MODEL_FILE));

        fs::write(dir.path().join(DENSE_MODEL_FILE), b"{}")?;
        assert_eq!(store.model_path(), dir.path().join(DENSE_MODEL_FILE));
        Ok(())
    }

    #[test]
    fn test_sha256_of_known_content() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("abc.txt");
        fs::write(&path, b"abc")?;
        assert_eq!(
            sha256_file(&path)?,
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        Ok(())
    }

    #[test]
    fn test_store_without_manifest_verifies() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(dir.path());
        assert!(store.manifest()?.is_none());
        assert!(store.verify().is_ok());
        assert!(!store.is_available());
        Ok(())
    }

    #[test]
    fn test_read_verified_returns_hashed_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempfile::tempdir()?;
        let store = ArtifactStore::new(dir.path());
        let path = store.vectorizer_path();
        fs::write(&path, b"abc")?;

        let mut manifest = Manifest::default();
        manifest.files.insert(VECTORIZER_FILE.to_string(), sha256_file(&path)?);
        assert_eq!(store.read_verified(Some(&manifest), &path)?, b"abc".to_vec());
        assert_eq!(store.read_verified(None, &path)?, b"abc".to_vec());

        fs::write(&path, b"abd")?;
        match store.read_verified(Some(&manifest), &path) {
            Err(ArtifactLoadError::ChecksumMismatch { expected, actual, .. }) => {
                assert_eq!(expected, sha256_bytes(b"abc"));
                assert_eq!(actual, sha256_bytes(b"abd"));
            }
            other => panic!("expected ChecksumMismatch, got {:?}", other),
        }
        Ok(())
    }
}

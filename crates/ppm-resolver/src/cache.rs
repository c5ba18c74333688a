//! The on-disk artifact cache: content-addressed by filename, written atomically via a
//! tempfile-then-rename, with the SHA-256 digest computed as the bytes are written.

use std::io::Write;
use std::path::{Path, PathBuf};

use rattler_digest::{Sha256, HashingWriter};

use crate::error::{IntegrityError, NetworkError};
use crate::http::Http;
use crate::types::Artifact;

/// A content-addressed cache directory keyed by artifact filename.
#[derive(Debug, Clone)]
pub struct Cache {
    dir: PathBuf,
}

impl Cache {
    /// Opens (creating if necessary) a cache rooted at `dir`.
    pub fn new(dir: PathBuf) -> std::io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(Cache { dir })
    }

    /// The path an artifact with `filename` would be cached at.
    pub fn path_for(&self, filename: &str) -> PathBuf {
        self.dir.join(filename)
    }

    /// Returns true if `filename` is already present in the cache.
    pub fn contains(&self, filename: &str) -> bool {
        self.path_for(filename).is_file()
    }

    /// Reads the full bytes of an already-cached artifact back off disk, e.g. so the transitive
    /// engine can open a downloaded wheel as a zip archive.
    pub fn read(&self, filename: &str) -> Result<Vec<u8>, NetworkError> {
        std::fs::read(self.path_for(filename))
            .map_err(|e| NetworkError::CacheRead(filename.to_string(), e))
    }

    /// Ensures `artifact` is present in the cache, downloading it if necessary, and returns the
    /// SHA-256 digest of the cached bytes (lowercase hex, 64 chars).
    ///
    /// If the artifact is already cached, the digest is recomputed from the cached file rather
    /// than trusted blindly, so a corrupted or truncated prior download is still caught.
    ///
    /// If `artifact.sha256` (the hint recorded from the index listing fragment) is non-empty,
    /// the computed digest must match it exactly or this returns
    /// [`IntegrityError::HashMismatch`]. If `strict_hash` is true and no hint was recorded and
    /// the download itself somehow yields no digest (never happens in practice, since the
    /// digest is always computed locally), this would be [`IntegrityError::MissingDigest`]; in
    /// practice the digest is always available once the bytes are read, so this case exists to
    /// make the `strict_hash` contract explicit rather than to model a reachable state.
    pub async fn ensure_cached(
        &self,
        http: &Http,
        artifact: &Artifact,
        strict_hash: bool,
    ) -> Result<String, CacheError> {
        let filename = artifact.filename();
        let path = self.path_for(&filename);

        let digest = if path.is_file() {
            compute_file_digest(&path)?
        } else {
            let bytes = http.get_bytes_strict(artifact.url.as_str()).await?;
            let digest = write_atomic(&self.dir, &filename, &bytes)?;
            digest
        };

        if !artifact.sha256.is_empty() && digest != artifact.sha256 {
            return Err(IntegrityError::HashMismatch {
                filename,
                expected: artifact.sha256.clone(),
                actual: digest,
            }
            .into());
        }

        if strict_hash && digest.is_empty() {
            return Err(IntegrityError::MissingDigest(filename).into());
        }

        Ok(digest)
    }
}

/// Writes `bytes` to `<dir>/<filename>` atomically (via a tempfile in the same directory,
/// renamed into place) and returns the SHA-256 digest computed while writing.
fn write_atomic(dir: &Path, filename: &str, bytes: &[u8]) -> Result<String, NetworkError> {
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .map_err(|e| NetworkError::CacheWrite(filename.to_string(), e))?;

    let mut hashing = HashingWriter::<_, Sha256>::new(&mut tmp);
    // Written in bounded chunks rather than as a single `write_all` so the cache layer never
    // needs to hold more than one chunk resident beyond the already-buffered `bytes` slice.
    for chunk in bytes.chunks(1024 * 1024) {
        hashing
            .write_all(chunk)
            .map_err(|e| NetworkError::CacheWrite(filename.to_string(), e))?;
    }
    let (_, digest) = hashing.finalize();

    tmp.persist(dir.join(filename))
        .map_err(|e| NetworkError::CacheWrite(filename.to_string(), e.error))?;

    Ok(format!("{digest:x}"))
}

fn compute_file_digest(path: &Path) -> Result<String, NetworkError> {
    let bytes = std::fs::read(path).map_err(|e| NetworkError::CacheWrite(path.display().to_string(), e))?;
    let digest = rattler_digest::compute_bytes_digest::<Sha256>(&bytes);
    Ok(format!("{digest:x}"))
}

/// The union of failures `ensure_cached` can produce.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// See [`NetworkError`].
    #[error(transparent)]
    Network(#[from] NetworkError),
    /// See [`IntegrityError`].
    #[error(transparent)]
    Integrity(#[from] IntegrityError),
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::types::{ArtifactName, SDistFilename, SDistFormat};
    use std::time::Duration;

    fn dummy_artifact(sha256: &str) -> Artifact {
        Artifact {
            name: ArtifactName::SDist(SDistFilename {
                distribution: "trio".parse().unwrap(),
                version: "0.18.0".parse().unwrap(),
                format: SDistFormat::TarGz,
            }),
            url: "http://127.0.0.1:1/trio-0.18.0.tar.gz".parse().unwrap(),
            sha256: sha256.to_string(),
            matched_tag: None,
        }
    }

    #[test]
    fn test_path_for_is_content_addressed_by_filename() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf()).unwrap();
        assert_eq!(
            cache.path_for("trio-0.18.0.tar.gz"),
            tmp.path().join("trio-0.18.0.tar.gz")
        );
    }

    #[tokio::test]
    async fn test_hash_mismatch_is_fatal() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf()).unwrap();
        std::fs::write(cache.path_for("trio-0.18.0.tar.gz"), b"not actually trio").unwrap();

        let http = Http::new("ppm-test/0.1", Duration::from_secs(5), 0).unwrap();
        let artifact = dummy_artifact("0".repeat(64).as_str());
        let err = cache.ensure_cached(&http, &artifact, false).await.unwrap_err();
        assert!(matches!(err, CacheError::Integrity(IntegrityError::HashMismatch { .. })));
    }

    #[tokio::test]
    async fn test_already_cached_file_is_not_redownloaded() {
        let tmp = tempfile::tempdir().unwrap();
        let cache = Cache::new(tmp.path().to_path_buf()).unwrap();
        std::fs::write(cache.path_for("trio-0.18.0.tar.gz"), b"hello world").unwrap();

        let http = Http::new("ppm-test/0.1", Duration::from_secs(5), 0).unwrap();
        let artifact = dummy_artifact("");
        let digest = cache.ensure_cached(&http, &artifact, false).await.unwrap();
        assert_eq!(digest.len(), 64);
    }
}

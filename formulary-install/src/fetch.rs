//! Archive retrieval and integrity verification.
//!
//! [`fetch`] is download + verify: callers never see bytes whose SHA-256
//! differs from the artifact's declared digest.

use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use formulary_core::Artifact;

use crate::error::InstallError;

/// Upper bound on archive size (100 MiB).
pub const MAX_ARCHIVE_BYTES: u64 = 100 * 1024 * 1024;

const USER_AGENT: &str = concat!("formulary/", env!("CARGO_PKG_VERSION"));

/// Source of archive bytes. Transport failures map to
/// [`InstallError::Network`].
pub trait Fetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, InstallError>;
}

/// Fetches `http(s)://` URLs with ureq and reads `file://` URLs from disk.
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    max_bytes: u64,
}

impl Default for SourceFetcher {
    fn default() -> Self {
        Self {
            max_bytes: MAX_ARCHIVE_BYTES,
        }
    }
}

impl SourceFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_bytes(max_bytes: u64) -> Self {
        Self { max_bytes }
    }

    fn read_limited(&self, url: &str, reader: impl Read) -> Result<Vec<u8>, InstallError> {
        let mut data = Vec::new();
        reader
            .take(self.max_bytes + 1)
            .read_to_end(&mut data)
            .map_err(|e| network(url, format!("failed to read archive: {e}")))?;
        if data.len() as u64 > self.max_bytes {
            return Err(network(
                url,
                format!("archive exceeds {} bytes", self.max_bytes),
            ));
        }
        Ok(data)
    }
}

impl Fetcher for SourceFetcher {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, InstallError> {
        if let Some(local) = url.strip_prefix("file://") {
            let file = std::fs::File::open(Path::new(local))
                .map_err(|e| network(url, format!("cannot open local archive: {e}")))?;
            return self.read_limited(url, file);
        }

        tracing::debug!(url, "downloading archive");
        let response = match ureq::get(url).set("User-Agent", USER_AGENT).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(code, _)) => return Err(network(url, format!("HTTP {code}"))),
            Err(err) => return Err(network(url, err.to_string())),
        };
        self.read_limited(url, response.into_reader())
    }
}

fn network(url: &str, reason: String) -> InstallError {
    InstallError::Network {
        url: url.to_string(),
        reason,
    }
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Check `bytes` against the artifact's declared digest; returns the digest.
pub fn verify(artifact: &Artifact, bytes: &[u8]) -> Result<String, InstallError> {
    let actual = sha256_hex(bytes);
    if actual != artifact.sha256.to_ascii_lowercase() {
        return Err(InstallError::Integrity {
            url: artifact.url.clone(),
            expected: artifact.sha256.clone(),
            actual,
        });
    }
    Ok(actual)
}

/// Retrieve the artifact's archive and verify it.
pub fn fetch(fetcher: &dyn Fetcher, artifact: &Artifact) -> Result<Vec<u8>, InstallError> {
    let bytes = fetcher.fetch(&artifact.url)?;
    verify(artifact, &bytes)?;
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulary_core::FormulaName;
    use tempfile::TempDir;

    struct Static(Vec<u8>);

    impl Fetcher for Static {
        fn fetch(&self, _url: &str) -> Result<Vec<u8>, InstallError> {
            Ok(self.0.clone())
        }
    }

    fn artifact(url: &str, sha256: &str) -> Artifact {
        Artifact {
            name: FormulaName::from("demo"),
            version: semver::Version::new(1, 0, 0),
            url: url.to_string(),
            sha256: sha256.to_string(),
        }
    }

    #[test]
    fn sha256_of_empty_input() {
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn matching_hash_passes() {
        let bytes = b"archive".to_vec();
        let a = artifact("https://example.com/a.tar.gz", &sha256_hex(&bytes));
        assert_eq!(fetch(&Static(bytes.clone()), &a).unwrap(), bytes);
    }

    #[test]
    fn mismatched_hash_is_integrity_error() {
        let a = artifact("https://example.com/a.tar.gz", &"0".repeat(64));
        let err = fetch(&Static(b"tampered".to_vec()), &a).unwrap_err();
        match err {
            InstallError::Integrity { expected, actual, .. } => {
                assert_eq!(expected, "0".repeat(64));
                assert_eq!(actual, sha256_hex(b"tampered"));
            }
            other => panic!("expected Integrity, got: {other}"),
        }
    }

    #[test]
    fn file_url_reads_local_archive() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a.tar.gz");
        std::fs::write(&path, b"local bytes").unwrap();
        let url = format!("file://{}", path.display());
        let bytes = SourceFetcher::new().fetch(&url).unwrap();
        assert_eq!(bytes, b"local bytes");
    }

    #[test]
    fn missing_local_archive_is_network_error() {
        let dir = TempDir::new().unwrap();
        let url = format!("file://{}", dir.path().join("missing.tar.gz").display());
        let err = SourceFetcher::new().fetch(&url).unwrap_err();
        assert!(matches!(err, InstallError::Network { .. }), "got: {err}");
        assert!(err.to_string().contains("missing.tar.gz"));
    }

    #[test]
    fn oversized_archive_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.tar.gz");
        std::fs::write(&path, vec![0u8; 64]).unwrap();
        let url = format!("file://{}", path.display());
        let err = SourceFetcher::with_max_bytes(16).fetch(&url).unwrap_err();
        assert!(err.to_string().contains("exceeds 16 bytes"));
    }
}

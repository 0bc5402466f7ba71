//! Content verification against declared size and checksum.
//!
//! Verification is pure: the functions here read bytes and compare, they
//! never delete or rename anything. The download orchestrator decides what
//! to do with a mismatch.

mod checksum;

pub use checksum::{Checksum, ChecksumAlgorithm, ChecksumError};

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use md5::Md5;
use sha2::{Digest, Sha256};

use crate::tree::RemoteObjectRef;

/// Read buffer size when hashing files.
const HASH_BUFFER_SIZE: usize = 64 * 1024;

enum Hasher {
    Md5(Md5),
    Sha256(Sha256),
}

impl Hasher {
    fn new(algorithm: ChecksumAlgorithm) -> Self {
        match algorithm {
            ChecksumAlgorithm::Md5 => Hasher::Md5(Md5::new()),
            ChecksumAlgorithm::Sha256 => Hasher::Sha256(Sha256::new()),
        }
    }

    fn update(&mut self, data: &[u8]) {
        match self {
            Hasher::Md5(h) => h.update(data),
            Hasher::Sha256(h) => h.update(data),
        }
    }

    fn finalize_hex(self) -> String {
        match self {
            Hasher::Md5(h) => format!("{:x}", h.finalize()),
            Hasher::Sha256(h) => format!("{:x}", h.finalize()),
        }
    }
}

/// Incremental verifier fed chunk by chunk while bytes are written to disk.
///
/// A verifier can be seeded from the bytes already present in a partial
/// file so that a resumed transfer still checks the whole object.
pub struct StreamingVerifier {
    expected_size: u64,
    expected: Checksum,
    hasher: Hasher,
    bytes_seen: u64,
}

impl StreamingVerifier {
    pub fn new(object: &RemoteObjectRef) -> Self {
        Self {
            expected_size: object.size_bytes,
            expected: object.checksum.clone(),
            hasher: Hasher::new(object.checksum.algorithm()),
            bytes_seen: 0,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_seen += data.len() as u64;
    }

    /// Hash the first `len` bytes of `path`.
    pub fn seed_from_file(&mut self, path: &Path, len: u64) -> io::Result<()> {
        let file = File::open(path)?;
        let mut reader = file.take(len);
        let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
        loop {
            let n = reader.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            self.update(&buffer[..n]);
        }
        if self.bytes_seen < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("{} is shorter than {} bytes", path.display(), len),
            ));
        }
        Ok(())
    }

    pub fn bytes_seen(&self) -> u64 {
        self.bytes_seen
    }

    pub fn expected_size(&self) -> u64 {
        self.expected_size
    }

    /// Finish hashing and return the computed hex digest.
    pub fn finalize_hex(self) -> String {
        self.hasher.finalize_hex()
    }

    /// Finish hashing; true only if both size and checksum match.
    pub fn finish(self) -> bool {
        let size_ok = self.bytes_seen == self.expected_size;
        let expected = self.expected.clone();
        let actual = self.finalize_hex();
        size_ok && expected.matches(&actual)
    }
}

/// Hex digest of an in-memory buffer.
pub fn digest_bytes(algorithm: ChecksumAlgorithm, bytes: &[u8]) -> String {
    let mut hasher = Hasher::new(algorithm);
    hasher.update(bytes);
    hasher.finalize_hex()
}

/// Hex digest of a file on disk.
pub fn digest_file(algorithm: ChecksumAlgorithm, path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Hasher::new(algorithm);
    let mut buffer = vec![0u8; HASH_BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hasher.finalize_hex())
}

/// Whether `bytes` is exactly the object described by `expected`.
pub fn verify_bytes(bytes: &[u8], expected: &RemoteObjectRef) -> bool {
    if bytes.len() as u64 != expected.size_bytes {
        return false;
    }
    let actual = digest_bytes(expected.checksum.algorithm(), bytes);
    expected.checksum.matches(&actual)
}

/// Whether the file at `path` is exactly the object described by `expected`.
///
/// A size mismatch is detected from metadata without reading the file.
pub fn verify_file(path: &Path, expected: &RemoteObjectRef) -> io::Result<bool> {
    let len = std::fs::metadata(path)?.len();
    if len != expected.size_bytes {
        return Ok(false);
    }
    let actual = digest_file(expected.checksum.algorithm(), path)?;
    Ok(expected.checksum.matches(&actual))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    const HELLO_MD5: &str = "5eb63bbbe01eeed093cb22bb8f5acdc3";
    const HELLO_SHA256: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";
    const EMPTY_MD5: &str = "d41d8cd98f00b204e9800998ecf8427e";

    fn object(size: u64, checksum: Checksum) -> RemoteObjectRef {
        RemoteObjectRef::new("https://cdn.test/a.pak", size, checksum)
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(digest_bytes(ChecksumAlgorithm::Md5, b"hello world"), HELLO_MD5);
        assert_eq!(
            digest_bytes(ChecksumAlgorithm::Sha256, b"hello world"),
            HELLO_SHA256
        );
        assert_eq!(digest_bytes(ChecksumAlgorithm::Md5, b""), EMPTY_MD5);
    }

    #[test]
    fn test_verify_bytes_detects_flipped_bit() {
        let expected = object(11, Checksum::md5(HELLO_MD5).unwrap());
        assert!(verify_bytes(b"hello world", &expected));

        let mut corrupted = b"hello world".to_vec();
        corrupted[4] ^= 0x01;
        assert!(!verify_bytes(&corrupted, &expected));
    }

    #[test]
    fn test_verify_bytes_checks_size() {
        let expected = object(12, Checksum::md5(HELLO_MD5).unwrap());
        assert!(!verify_bytes(b"hello world", &expected));
    }

    #[test]
    fn test_verify_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pak");
        std::fs::write(&path, b"hello world").unwrap();

        let good = object(11, Checksum::sha256(HELLO_SHA256).unwrap());
        assert!(verify_file(&path, &good).unwrap());

        let wrong = object(11, Checksum::md5(EMPTY_MD5).unwrap());
        assert!(!verify_file(&path, &wrong).unwrap());
    }

    #[test]
    fn test_verify_missing_file_is_error() {
        let temp = TempDir::new().unwrap();
        let expected = object(0, Checksum::md5(EMPTY_MD5).unwrap());
        assert!(verify_file(&temp.path().join("missing"), &expected).is_err());
    }

    #[test]
    fn test_streaming_verifier_in_chunks() {
        let expected = object(11, Checksum::md5(HELLO_MD5).unwrap());
        let mut verifier = StreamingVerifier::new(&expected);
        verifier.update(b"hello");
        verifier.update(b" ");
        verifier.update(b"world");
        assert_eq!(verifier.bytes_seen(), 11);
        assert!(verifier.finish());
    }

    #[test]
    fn test_streaming_verifier_seeded_from_partial_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.pak.part");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"hello").unwrap();
        drop(file);

        let expected = object(11, Checksum::md5(HELLO_MD5).unwrap());
        let mut verifier = StreamingVerifier::new(&expected);
        verifier.seed_from_file(&path, 5).unwrap();
        verifier.update(b" world");
        assert!(verifier.finish());
    }

    #[test]
    fn test_seed_fails_on_short_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("short.part");
        std::fs::write(&path, b"abc").unwrap();

        let expected = object(11, Checksum::md5(HELLO_MD5).unwrap());
        let mut verifier = StreamingVerifier::new(&expected);
        let err = verifier.seed_from_file(&path, 10).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}

//! Algorithm-tagged content checksums.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Errors produced when constructing a [`Checksum`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ChecksumError {
    #[error("checksum digest is empty")]
    Empty,

    #[error("checksum digest is not hexadecimal: {0}")]
    NotHex(String),

    #[error("{algorithm} digest is {actual} hex characters, longer than {max}")]
    TooLong {
        algorithm: ChecksumAlgorithm,
        max: usize,
        actual: usize,
    },

    #[error("unknown checksum algorithm: {0}")]
    UnknownAlgorithm(String),
}

/// Hash algorithms manifests declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChecksumAlgorithm {
    Md5,
    Sha256,
}

impl ChecksumAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            ChecksumAlgorithm::Md5 => "md5",
            ChecksumAlgorithm::Sha256 => "sha256",
        }
    }

    /// Length of a full digest in hex characters.
    pub fn hex_len(&self) -> usize {
        match self {
            ChecksumAlgorithm::Md5 => 32,
            ChecksumAlgorithm::Sha256 => 64,
        }
    }
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChecksumAlgorithm {
    type Err = ChecksumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "md5" => Ok(ChecksumAlgorithm::Md5),
            "sha256" | "sha-256" => Ok(ChecksumAlgorithm::Sha256),
            other => Err(ChecksumError::UnknownAlgorithm(other.to_string())),
        }
    }
}

/// A lowercase hex digest tagged with the algorithm that produced it.
///
/// Digests shorter than the algorithm's full length are accepted; such a
/// checksum simply never matches real content.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Checksum {
    algorithm: ChecksumAlgorithm,
    digest: String,
}

impl Checksum {
    pub fn new(algorithm: ChecksumAlgorithm, digest: &str) -> Result<Self, ChecksumError> {
        let digest = digest.trim();
        if digest.is_empty() {
            return Err(ChecksumError::Empty);
        }
        if !digest.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(ChecksumError::NotHex(digest.to_string()));
        }
        if digest.len() > algorithm.hex_len() {
            return Err(ChecksumError::TooLong {
                algorithm,
                max: algorithm.hex_len(),
                actual: digest.len(),
            });
        }
        Ok(Self {
            algorithm,
            digest: digest.to_ascii_lowercase(),
        })
    }

    pub fn md5(digest: &str) -> Result<Self, ChecksumError> {
        Self::new(ChecksumAlgorithm::Md5, digest)
    }

    pub fn sha256(digest: &str) -> Result<Self, ChecksumError> {
        Self::new(ChecksumAlgorithm::Sha256, digest)
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Compare against a computed hex digest, ignoring case.
    pub fn matches(&self, actual_hex: &str) -> bool {
        self.digest.eq_ignore_ascii_case(actual_hex)
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.digest)
    }
}

impl FromStr for Checksum {
    type Err = ChecksumError;

    /// Parses `"<algorithm>:<digest>"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (algorithm, digest) = s
            .split_once(':')
            .ok_or_else(|| ChecksumError::UnknownAlgorithm(s.to_string()))?;
        Self::new(algorithm.parse()?, digest)
    }
}

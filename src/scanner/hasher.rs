//! BLAKE3 file hasher with streaming support.
//!
//! # Overview
//!
//! [`Hasher`] computes the BLAKE3 digest of a file's full content by reading
//! it in fixed-size chunks, so memory use stays bounded no matter how large
//! the file is. Equal content always yields an equal [`Digest`]; the empty
//! file has a well-defined digest like any other.
//!
//! # Example
//!
//! ```no_run
//! use filetidy::scanner::Hasher;
//! use std::path::Path;
//!
//! let hasher = Hasher::new();
//! let digest = hasher.hash_file(Path::new("report.pdf")).unwrap();
//! println!("{}", digest);
//! ```

use std::fmt;
use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::Path;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::HashError;

/// Default read buffer size (64 KiB).
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// 32-byte BLAKE3 content digest.
///
/// Displayed and serialized as 64 lowercase hex characters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Wrap raw digest bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex representation.
    #[must_use]
    pub fn to_hex(&self) -> String {
        blake3::Hash::from(self.0).to_hex().to_string()
    }

    /// Parse a 64-character hex string.
    ///
    /// # Errors
    ///
    /// Returns [`DigestParseError`] if the input is not valid hex of the
    /// right length.
    pub fn from_hex(hex: &str) -> Result<Self, DigestParseError> {
        blake3::Hash::from_hex(hex)
            .map(|h| Self(*h.as_bytes()))
            .map_err(|_| DigestParseError(hex.to_string()))
    }
}

impl From<blake3::Hash> for Digest {
    fn from(hash: blake3::Hash) -> Self {
        Self(*hash.as_bytes())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Self::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// Error returned when a stored digest string is malformed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid digest: {0:?}")]
pub struct DigestParseError(pub String);

/// Streaming BLAKE3 hasher.
///
/// Cheap to share between threads; it holds no per-file state.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default 64 KiB buffer.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            shutdown_flag: None,
        }
    }

    /// Use a different read buffer size. Zero is clamped to 1 byte.
    #[must_use]
    pub fn with_buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Abort long reads when `flag` becomes true.
    ///
    /// The flag is checked between chunks; an aborted file yields
    /// [`HashError::Interrupted`].
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Configured buffer size.
    #[must_use]
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Hash the full content of the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`HashError::NotFound`] if the file vanished
    /// - [`HashError::PermissionDenied`] if it cannot be read
    /// - [`HashError::Interrupted`] if cancellation was requested mid-file
    /// - [`HashError::Io`] for any other read failure
    pub fn hash_file(&self, path: &Path) -> Result<Digest, HashError> {
        let mut file = File::open(path).map_err(|e| HashError::from_io(path, e))?;
        let mut hasher = blake3::Hasher::new();
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            if self.is_shutdown_requested() {
                return Err(HashError::Interrupted(path.to_path_buf()));
            }

            let n = match file.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(e) => return Err(HashError::from_io(path, e)),
            };
            hasher.update(&buffer[..n]);
        }

        let digest = Digest::from(hasher.finalize());
        log::trace!("Hashed {} -> {}", path.display(), digest);
        Ok(digest)
    }

    /// Hash an in-memory byte slice.
    #[must_use]
    pub fn hash_bytes(&self, data: &[u8]) -> Digest {
        Digest::from(blake3::hash(data))
    }
}

//! BLAKE3 checksums for emitted events

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Files at or above this size are hashed through a memory map
const MMAP_THRESHOLD: u64 = 4 * 1024 * 1024;

/// Read buffer for streaming hashes
const CHUNK_SIZE: usize = 8192;

/// A BLAKE3 digest of file content (32 bytes)
#[derive(Copy, Clone, Hash, Eq, PartialEq)]
pub struct ContentHash(blake3::Hash);

impl ContentHash {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(blake3::Hash::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_bytes()
    }

    /// Lowercase hex rendering, 64 characters
    pub fn to_hex(&self) -> String {
        self.0.to_hex().as_str().to_owned()
    }
}

impl From<blake3::Hash> for ContentHash {
    fn from(hash: blake3::Hash) -> Self {
        Self(hash)
    }
}

impl std::fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ContentHash({})", self.0.to_hex())
    }
}

impl std::fmt::Display for ContentHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0.to_hex().as_str())
    }
}

/// Hash an in-memory buffer
pub fn hash_bytes(data: &[u8]) -> ContentHash {
    blake3::hash(data).into()
}

/// Hash a file, streaming small files and memory-mapping large ones
pub fn hash_file(path: &Path) -> Result<ContentHash> {
    let len = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat {}", path.display()))?
        .len();

    if len >= MMAP_THRESHOLD {
        let mut hasher = blake3::Hasher::new();
        hasher
            .update_mmap(path)
            .with_context(|| format!("Failed to map {}", path.display()))?;
        return Ok(hasher.finalize().into());
    }

    hash_file_streaming(path)
}

fn hash_file_streaming(path: &Path) -> Result<ContentHash> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let mut reader = BufReader::new(file);
    let mut hasher = blake3::Hasher::new();

    let mut buffer = [0u8; CHUNK_SIZE];
    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize().into())
}

// src/digest.rs

//! SHA-256 digests for source artifact integrity
//!
//! Digests are lowercase hex strings; comparison is case-insensitive so a
//! formula author may paste an uppercase checksum.

use crate::error::Result;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Read buffer for streaming file hashing (64 KB)
const HASH_BUFFER_SIZE: usize = 65536;

/// Hash a byte slice
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Hash a file without loading it into memory
pub fn sha256_file(path: &Path) -> Result<String> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; HASH_BUFFER_SIZE];

    loop {
        let n = reader.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compare two hex digests ignoring case
pub fn digests_match(expected: &str, actual: &str) -> bool {
    expected.eq_ignore_ascii_case(actual)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sha256_bytes_known_vector() {
        // SHA-256 of the empty string
        assert_eq!(
            sha256_bytes(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            sha256_bytes(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sha256_file_matches_bytes() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"hello cellar").unwrap();
        let from_file = sha256_file(file.path()).unwrap();
        assert_eq!(from_file, sha256_bytes(b"hello cellar"));
    }

    #[test]
    fn test_digests_match_case_insensitive() {
        assert!(digests_match("ABC123", "abc123"));
        assert!(!digests_match("abc123", "abc124"));
    }
}

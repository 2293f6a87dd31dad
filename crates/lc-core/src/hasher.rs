// hasher.rs — SHA-256 helpers shared by every checksum in the core.
//
// Every checksum in the system (changeset checksums, policy snapshot
// hashes, reflection hints digests, per-file content hashes) goes through
// one of these three functions so the hex encoding is consistent everywhere.

use std::fs;
use std::io::{self, Read};
use std::path::Path;

use sha2::{Digest, Sha256};

pub fn hash_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

pub fn hash_str(s: &str) -> String {
    hash_bytes(s.as_bytes())
}

/// Stream a file through the hasher in fixed-size chunks rather than
/// reading it fully into memory, since applied files may be large.
pub fn hash_file(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_hash_is_known_value() {
        assert_eq!(
            hash_str(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn hash_is_deterministic() {
        assert_eq!(hash_str("lonelycat"), hash_str("lonelycat"));
    }

    #[test]
    fn different_input_different_hash() {
        assert_ne!(hash_str("a"), hash_str("b"));
    }

    #[test]
    fn hash_file_matches_hash_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        fs::write(&path, b"hello world").unwrap();
        assert_eq!(hash_file(&path).unwrap(), hash_bytes(b"hello world"));
    }
}

//! Hashing utilities

use xxhash_rust::xxh3::xxh3_128;

/// Stable 128-bit digest over a canonicalized path string.
///
/// Used for transcode-cache identity: the same source file always maps to
/// the same derivative filename.
///
/// # Returns
/// A 32-character hex string.
pub fn path_digest(path: &str) -> String {
    format!("{:032x}", xxh3_128(path.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_is_stable() {
        let a = path_digest("/music/Artist/Album/01 - Song.flac");
        let b = path_digest("/music/Artist/Album/01 - Song.flac");
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn test_digest_differs_per_path() {
        let a = path_digest("/music/a.flac");
        let b = path_digest("/music/b.flac");
        assert_ne!(a, b);
    }
}

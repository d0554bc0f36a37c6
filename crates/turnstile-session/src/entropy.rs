//! Random bytes for session tokens.

use rand::TryRngCore;
use rand::rngs::OsRng;

use crate::SessionError;

/// A source of cryptographically strong random bytes.
///
/// The store draws every token from one of these. Swapping it out lets
/// tests simulate an exhausted or broken random source.
pub trait EntropySource: Send + Sync + 'static {
    /// Fills `buf` completely or fails.
    ///
    /// # Errors
    /// Returns [`SessionError::Entropy`] if the source cannot deliver.
    fn fill(&self, buf: &mut [u8]) -> Result<(), SessionError>;
}

/// The operating system's CSPRNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn fill(&self, buf: &mut [u8]) -> Result<(), SessionError> {
        OsRng
            .try_fill_bytes(buf)
            .map_err(|e| SessionError::Entropy(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_entropy_fills_buffer() {
        let mut a = [0u8; 128];
        let mut b = [0u8; 128];

        OsEntropy.fill(&mut a).expect("os rng should work");
        OsEntropy.fill(&mut b).expect("os rng should work");

        assert_ne!(a, b, "two 128-byte draws should differ");
    }
}

//! The master secret: a mnemonic seed phrase.
//!
//! Lives only in memory, during distribution or right after a successful
//! reconstruction. The phrase is normalized to single spaces so that the
//! split bytes and the derived operational key do not depend on how the
//! operator typed it.

use core::fmt;
use zeroize::Zeroizing;

use super::MpcError;

/// Accepted mnemonic lengths.
pub const VALID_WORD_COUNTS: [usize; 5] = [12, 15, 18, 21, 24];

pub struct MasterSecret {
    phrase: Zeroizing<String>,
}

impl MasterSecret {
    /// Parses and normalizes a mnemonic.
    ///
    /// # Errors
    /// * `MpcError::InvalidMnemonic` if the word count is not 12, 15, 18, 21 or 24.
    pub fn parse(phrase: &str) -> Result<Self, MpcError> {
        let words: Vec<&str> = phrase.split_whitespace().collect();
        if !VALID_WORD_COUNTS.contains(&words.len()) {
            return Err(MpcError::InvalidMnemonic(words.len()));
        }
        Ok(Self { phrase: Zeroizing::new(words.join(" ")) })
    }

    /// Rebuilds a master secret from reconstructed bytes.
    ///
    /// Bytes that are not UTF-8 are reported as an integrity failure: they
    /// can only come from a bad reconstruction.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MpcError> {
        let phrase = core::str::from_utf8(bytes).map_err(|_| MpcError::IntegrityFailure)?;
        Self::parse(phrase)
    }

    pub fn phrase(&self) -> &str {
        &self.phrase
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.phrase.as_bytes()
    }

    pub fn word_count(&self) -> usize {
        self.phrase.split(' ').count()
    }
}

impl fmt::Debug for MasterSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MasterSecret")
            .field("words", &self.word_count())
            .field("phrase", &"***SENSITIVE***")
            .finish()
    }
}

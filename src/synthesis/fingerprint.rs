use serde::{Deserialize, Serialize};

use crate::synthesis::SynthesisRequest;
use sha2::{Digest, Sha256};
use std::fmt;

/// Length of the fingerprint prefix used for artifact directory names
pub const SHORT_LEN: usize = 12;

/// Content fingerprint of a synthesis: normalized text, language, voice and prosody
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Hash the inputs that determine the narration
    ///
    /// The text is trimmed and lowercased so that cosmetic differences in
    /// capitalization reuse the same audio.
    pub fn compute(normalized_text: &str, language: &str, voice: &str, rate: &str, volume: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalized_text.trim().to_lowercase().as_bytes());
        for field in [language, voice, rate, volume] {
            hasher.update([0x1f]);
            hasher.update(field.trim().as_bytes());
        }
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Fingerprint of everything a request sends to the synthesizer
    pub fn of_request(request: &SynthesisRequest) -> Self {
        Self::compute(
            &request.text,
            &request.language,
            &request.voice,
            &request.rate,
            &request.volume,
        )
    }

    /// Full lowercase hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Prefix naming the artifact directory
    pub fn short(&self) -> &str {
        self.0.get(..SHORT_LEN).unwrap_or(&self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

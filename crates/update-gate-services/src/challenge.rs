//! Anti-automation challenge verification

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::ServiceResult;

/// Verifies a challenge key / response pair.
#[async_trait]
pub trait ChallengeService: Send + Sync {
    async fn verify(&self, key: &str, value: &str) -> ServiceResult<bool>;
}

/// Stateless challenge keyed by a shared secret.
///
/// A key has the form `nonce:digest` where `digest` is the hex SHA-256 of
/// `secret:nonce:answer`. Answers are compared trimmed and lowercased.
#[derive(Clone)]
pub struct SecretChallenge {
    secret: String,
}

impl SecretChallenge {
    pub fn new(secret: &str) -> Self {
        SecretChallenge {
            secret: secret.to_string(),
        }
    }

    /// Produce the key a client must echo back along with `answer`.
    pub fn issue(&self, nonce: &str, answer: &str) -> String {
        format!("{}:{}", nonce, self.digest(nonce, answer))
    }

    fn digest(&self, nonce: &str, answer: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.secret.as_bytes());
        hasher.update(b":");
        hasher.update(nonce.as_bytes());
        hasher.update(b":");
        hasher.update(normalize(answer).as_bytes());
        hex::encode(hasher.finalize())
    }
}

impl std::fmt::Debug for SecretChallenge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretChallenge").finish_non_exhaustive()
    }
}

fn normalize(answer: &str) -> String {
    answer.trim().to_lowercase()
}

#[async_trait]
impl ChallengeService for SecretChallenge {
    async fn verify(&self, key: &str, value: &str) -> ServiceResult<bool> {
        let Some((nonce, digest)) = key.split_once(':') else {
            debug!("malformed challenge key");
            return Ok(false);
        };
        Ok(self.digest(nonce, value) == digest)
    }
}

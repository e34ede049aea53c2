//! Password hashing: salted Argon2id producing PHC strings.
//! Verification parses the stored PHC string, so hashes made under an older
//! cost setting keep verifying after the configured cost changes.

use anyhow::{anyhow, Result};
use argon2::{Algorithm, Argon2, Params, PasswordHasher, PasswordVerifier, Version};
use password_hash::{PasswordHash, SaltString};

use crate::config::HashCost;

#[derive(Debug, Clone)]
pub struct PasswordHasherConfig {
    cost: HashCost,
}

impl PasswordHasherConfig {
    pub fn new(cost: HashCost) -> Result<Self> {
        // Reject bad parameters at startup rather than on the first registration.
        params_for(cost)?;
        Ok(Self { cost })
    }

    fn argon2(&self) -> Result<Argon2<'static>> {
        Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params_for(self.cost)?))
    }

    pub fn hash_password(&self, password: &str) -> Result<String> {
        let mut salt_bytes = [0u8; 16];
        getrandom::getrandom(&mut salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;
        let phc = self
            .argon2()?
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| anyhow!(e.to_string()))?
            .to_string();
        Ok(phc)
    }
}

fn params_for(cost: HashCost) -> Result<Params> {
    Params::new(cost.memory_kib, cost.iterations, cost.parallelism, None)
        .map_err(|e| anyhow!("invalid argon2 parameters: {}", e))
}

/// Constant-time comparison of `password` against a stored PHC hash.
/// A hash that fails to parse never verifies.
pub fn verify_password(hash: &str, password: &str) -> bool {
    if let Ok(parsed) = PasswordHash::new(hash) {
        Argon2::default().verify_password(password.as_bytes(), &parsed).is_ok()
    } else {
        false
    }
}

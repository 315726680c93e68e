use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::algorithm::CipherSuite;
use crate::error::{CaskError, CaskResult};

/// Legacy PBKDF2-HMAC-SHA256 iteration default. Tokens produced under this
/// default remain decryptable because decryption always honors the count
/// stored in the token, never a process-wide default.
pub const PBKDF2_ITERATIONS_V1: u32 = 100_000;

/// Current PBKDF2-HMAC-SHA256 iteration default for newly produced tokens.
pub const PBKDF2_ITERATIONS_V2: u32 = 600_000;

/// Length of the random salt stored in a token's KDF sub-context
pub const PBKDF2_SALT_LEN: usize = 16;

/// Top-level configuration (loaded from cask.toml)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CaskConfig {
    pub seal: SealConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SealConfig {
    /// Cipher suite for newly produced tokens (default: xchacha20-poly1305)
    pub suite: CipherSuite,
    /// PBKDF2 iteration count for new tokens
    pub pbkdf2_iterations: u32,
    /// Tokens carrying fewer iterations than this still decrypt, but a
    /// warning is logged
    pub pbkdf2_warn_below: u32,
}

impl Default for SealConfig {
    fn default() -> Self {
        Self {
            suite: CipherSuite::XChaCha20Poly1305,
            pbkdf2_iterations: PBKDF2_ITERATIONS_V2,
            pbkdf2_warn_below: PBKDF2_ITERATIONS_V1,
        }
    }
}

impl CaskConfig {
    /// Load a config file, falling back to defaults if it does not exist.
    pub fn load(path: &Path) -> CaskResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .map_err(|e| CaskError::InvalidParameter(format!("config {}: {e}", path.display())))?;
        Self::from_toml(&raw)
    }

    pub fn from_toml(raw: &str) -> CaskResult<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| CaskError::InvalidParameter(format!("config parse: {e}")))?;
        if config.seal.pbkdf2_iterations == 0 {
            return Err(CaskError::InvalidParameter(
                "config: pbkdf2_iterations must be nonzero".into(),
            ));
        }
        Ok(config)
    }
}

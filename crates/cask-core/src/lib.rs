//! cask-core: shared types for the caskcrypt workspace
//!
//! Carries the error taxonomy every crate speaks, the algorithm registry
//! (cipher suite + KDF identifiers and their wire encoding), and the TOML
//! config schema used by the CLI.

pub mod algorithm;
pub mod config;
pub mod error;

pub use algorithm::{Algorithm, CipherSuite, KdfAlg};
pub use config::{
    CaskConfig, SealConfig, PBKDF2_ITERATIONS_V1, PBKDF2_ITERATIONS_V2, PBKDF2_SALT_LEN,
};
pub use error::{CaskError, CaskResult};

/// Size of a cipher key in bytes (256-bit, all supported suites)
pub const KEY_SIZE: usize = 32;

/// Size of an AEAD authentication tag (Poly1305 and GHASH)
pub const TAG_SIZE: usize = 16;

//! cask-seal: sealed-envelope encryption for CaskCrypt
//!
//! Turns a raw symmetric key or a passphrase, a plaintext, and an optional
//! associated context into a self-describing, tamper-evident binary blob,
//! and reverses the process on decryption.
//!
//! Combined `seal` output:
//!
//! ```text
//! [auth token: 20-byte header ∥ IV ∥ tag ∥ optional KDF sub-context][ciphertext]
//! ciphertext length == plaintext length (the tag lives inside the token)
//! ```
//!
//! Three protection modes (see [`Envelope`]):
//! - **Seal** — token prepended to ciphertext, one buffer
//! - **TokenProtect** — token and ciphertext as two independent buffers
//! - **ContextImprint** — deterministic, unauthenticated, exactly
//!   plaintext-sized output bound to a mandatory context
//!
//! ```
//! use cask_seal::{Envelope, KeySource};
//!
//! let envelope = Envelope::new();
//! let key = [0x2Au8; 32];
//! let sealed = envelope
//!     .seal_to_vec(&KeySource::MasterKey(&key), b"attack at dawn", b"mission-7")
//!     .unwrap();
//! let opened = envelope
//!     .unseal_to_vec(&KeySource::MasterKey(&key), &sealed, b"mission-7")
//!     .unwrap();
//! assert_eq!(opened, b"attack at dawn");
//! ```

pub mod envelope;
pub mod kdf;
pub mod token;

pub use envelope::Envelope;
pub use kdf::{DerivedKey, KeySource};
pub use token::{AuthToken, Pbkdf2Context, TOKEN_HEADER_LEN};

// Re-exported so downstream crates can speak the taxonomy without naming
// cask-core directly.
pub use cask_core::{Algorithm, CaskError, CaskResult, CipherSuite, KdfAlg, SealConfig};

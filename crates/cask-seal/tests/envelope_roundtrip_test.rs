//! End-to-end behavior of the three protection modes: round trips across
//! suites and key sources, tamper evidence, buffer negotiation, key
//! separation, and context binding.

use cask_seal::{CaskError, CipherSuite, Envelope, KeySource, SealConfig};
use secrecy::SecretSlice;

const SUITES: [CipherSuite; 2] = [CipherSuite::Aes256Gcm, CipherSuite::XChaCha20Poly1305];

fn envelope_for(suite: CipherSuite) -> Envelope {
    Envelope::with_config(SealConfig {
        suite,
        // Keep test runs fast; production defaults are much higher.
        pbkdf2_iterations: 1_000,
        ..SealConfig::default()
    })
}

fn master_key() -> [u8; 32] {
    let mut key = [0u8; 32];
    for (i, byte) in key.iter_mut().enumerate() {
        *byte = i as u8;
    }
    key
}

#[test]
fn seal_roundtrip_all_suites_and_key_sources() {
    let key = master_key();
    let phrase = SecretSlice::from(b"correct horse battery staple".to_vec());
    for suite in SUITES {
        let envelope = envelope_for(suite);
        for source in [KeySource::MasterKey(&key), KeySource::Passphrase(&phrase)] {
            let sealed = envelope
                .seal_to_vec(&source, b"the quick brown fox", b"ctx")
                .unwrap();
            let opened = envelope.unseal_to_vec(&source, &sealed, b"ctx").unwrap();
            assert_eq!(opened, b"the quick brown fox");
        }
    }
}

#[test]
fn protect_roundtrip_all_suites_and_key_sources() {
    let key = master_key();
    let phrase = SecretSlice::from(b"correct horse battery staple".to_vec());
    for suite in SUITES {
        let envelope = envelope_for(suite);
        for source in [KeySource::MasterKey(&key), KeySource::Passphrase(&phrase)] {
            let (token, ciphertext) = envelope
                .protect_to_vecs(&source, b"detached payload", b"ctx")
                .unwrap();
            assert_eq!(ciphertext.len(), b"detached payload".len());
            let opened = envelope
                .unprotect_to_vec(&source, &token, &ciphertext, b"ctx")
                .unwrap();
            assert_eq!(opened, b"detached payload");
        }
    }
}

#[test]
fn imprint_roundtrip_all_suites() {
    let key = master_key();
    for suite in SUITES {
        let envelope = envelope_for(suite);
        let source = KeySource::MasterKey(&key);
        let imprinted = envelope
            .imprint_to_vec(&source, b"exactly sized payload", b"table:users")
            .unwrap();
        assert_eq!(imprinted.len(), b"exactly sized payload".len());
        let recovered = envelope
            .unimprint_to_vec(&source, &imprinted, b"table:users")
            .unwrap();
        assert_eq!(recovered, b"exactly sized payload");
    }
}

#[test]
fn sealed_buffer_rejects_every_single_bit_flip() {
    let key = master_key();
    for suite in SUITES {
        let envelope = envelope_for(suite);
        let source = KeySource::MasterKey(&key);
        let sealed = envelope.seal_to_vec(&source, b"hello", b"ctx").unwrap();
        let token_len = sealed.len() - 5;

        let mut out = vec![0u8; 5];
        for byte in 0..sealed.len() {
            for bit in 0..8 {
                let mut tampered = sealed.clone();
                tampered[byte] ^= 1 << bit;
                let result = envelope.unseal(&source, &tampered, b"ctx", &mut out);
                assert!(
                    result.is_err(),
                    "flip at byte {byte} bit {bit} must not decrypt"
                );
                // Flips inside the IV, tag, or ciphertext survive parsing and
                // must surface as corruption, never as wrong plaintext.
                if byte >= 20 {
                    assert!(
                        matches!(result, Err(CaskError::DataCorrupt(_))),
                        "flip at byte {byte} (token_len {token_len}) should be DataCorrupt"
                    );
                }
            }
        }
    }
}

#[test]
fn protected_ciphertext_rejects_bit_flips() {
    let key = master_key();
    let envelope = envelope_for(CipherSuite::XChaCha20Poly1305);
    let source = KeySource::MasterKey(&key);
    let (token, ciphertext) = envelope
        .protect_to_vecs(&source, b"detached payload", b"ctx")
        .unwrap();

    let mut out = vec![0u8; ciphertext.len()];
    for byte in 0..ciphertext.len() {
        let mut tampered = ciphertext.clone();
        tampered[byte] ^= 0x80;
        let err = envelope
            .unprotect(&source, &token, &tampered, b"ctx", &mut out)
            .unwrap_err();
        assert!(matches!(err, CaskError::DataCorrupt(_)));
    }
    for byte in 0..token.len() {
        let mut tampered = token.clone();
        tampered[byte] ^= 0x80;
        assert!(envelope
            .unprotect(&source, &tampered, &ciphertext, b"ctx", &mut out)
            .is_err());
    }
}

#[test]
fn imprint_corruption_passes_through_as_xor() {
    let key = master_key();
    let envelope = envelope_for(CipherSuite::XChaCha20Poly1305);
    let source = KeySource::MasterKey(&key);
    let message = b"unauthenticated by design";
    let imprinted = envelope.imprint_to_vec(&source, message, b"ctx").unwrap();

    let mut tampered = imprinted.clone();
    tampered[3] ^= 0x40;
    let garbled = envelope
        .unimprint_to_vec(&source, &tampered, b"ctx")
        .unwrap();

    let mut expected = message.to_vec();
    expected[3] ^= 0x40;
    assert_eq!(garbled, expected, "corruption XORs straight into plaintext");
}

#[test]
fn zero_capacity_query_reports_exact_size_for_every_mode() {
    let key = master_key();
    let envelope = envelope_for(CipherSuite::XChaCha20Poly1305);
    let source = KeySource::MasterKey(&key);
    let message = b"negotiated";

    // Seal
    let err = envelope.seal(&source, message, b"ctx", &mut []).unwrap_err();
    let required = err.required_capacity().expect("recoverable");
    let mut sealed = vec![0u8; required];
    let written = envelope.seal(&source, message, b"ctx", &mut sealed).unwrap();
    assert_eq!(written, required);

    // Unseal
    let err = envelope.unseal(&source, &sealed, b"ctx", &mut []).unwrap_err();
    let required = err.required_capacity().expect("recoverable");
    assert_eq!(required, message.len());
    let mut opened = vec![0u8; required];
    let written = envelope.unseal(&source, &sealed, b"ctx", &mut opened).unwrap();
    assert_eq!(&opened[..written], message);

    // TokenProtect, token buffer first, then ciphertext buffer
    let err = envelope
        .protect(&source, message, b"ctx", &mut [], &mut [])
        .unwrap_err();
    let token_required = err.required_capacity().expect("recoverable");
    let mut token_buf = vec![0u8; token_required];
    let err = envelope
        .protect(&source, message, b"ctx", &mut token_buf, &mut [])
        .unwrap_err();
    let ct_required = err.required_capacity().expect("recoverable");
    assert_eq!(ct_required, message.len());
    let mut ct_buf = vec![0u8; ct_required];
    let (token_written, ct_written) = envelope
        .protect(&source, message, b"ctx", &mut token_buf, &mut ct_buf)
        .unwrap();
    assert_eq!((token_written, ct_written), (token_required, ct_required));

    let err = envelope
        .unprotect(&source, &token_buf, &ct_buf, b"ctx", &mut [])
        .unwrap_err();
    assert_eq!(err.required_capacity(), Some(message.len()));

    // Imprint
    let err = envelope
        .imprint(&source, message, b"ctx", &mut [])
        .unwrap_err();
    assert_eq!(err.required_capacity(), Some(message.len()));
}

#[test]
fn passphrase_encryptions_never_reuse_salt_or_iv() {
    let phrase = SecretSlice::from(b"same passphrase".to_vec());
    let envelope = envelope_for(CipherSuite::XChaCha20Poly1305);
    let source = KeySource::Passphrase(&phrase);

    let a = envelope.seal_to_vec(&source, b"same message", b"ctx").unwrap();
    let b = envelope.seal_to_vec(&source, b"same message", b"ctx").unwrap();
    assert_ne!(a, b, "fresh salt and IV every call");

    let (token_a, ct_a) = envelope.protect_to_vecs(&source, b"same message", b"ctx").unwrap();
    let (token_b, ct_b) = envelope.protect_to_vecs(&source, b"same message", b"ctx").unwrap();
    assert_ne!(token_a, token_b);
    assert_ne!(ct_a, ct_b);
}

#[test]
fn master_key_encryptions_never_reuse_iv() {
    let key = master_key();
    let envelope = envelope_for(CipherSuite::Aes256Gcm);
    let source = KeySource::MasterKey(&key);
    let a = envelope.seal_to_vec(&source, b"same message", b"").unwrap();
    let b = envelope.seal_to_vec(&source, b"same message", b"").unwrap();
    assert_ne!(a, b);
}

#[test]
fn wrong_context_never_decrypts() {
    let key = master_key();
    let phrase = SecretSlice::from(b"passphrase".to_vec());
    for suite in SUITES {
        let envelope = envelope_for(suite);
        for source in [KeySource::MasterKey(&key), KeySource::Passphrase(&phrase)] {
            let sealed = envelope
                .seal_to_vec(&source, b"bound tight", b"context-a")
                .unwrap();
            let err = envelope
                .unseal_to_vec(&source, &sealed, b"context-b")
                .unwrap_err();
            assert!(matches!(err, CaskError::DataCorrupt(_)));
        }
    }
}

#[test]
fn wrong_key_never_decrypts() {
    let envelope = envelope_for(CipherSuite::XChaCha20Poly1305);
    let key_a = master_key();
    let mut key_b = master_key();
    key_b[0] ^= 0xFF;
    let sealed = envelope
        .seal_to_vec(&KeySource::MasterKey(&key_a), b"secret", b"")
        .unwrap();
    let err = envelope
        .unseal_to_vec(&KeySource::MasterKey(&key_b), &sealed, b"")
        .unwrap_err();
    assert!(matches!(err, CaskError::DataCorrupt(_)));
}

#[test]
fn truncated_and_extended_buffers_are_corrupt() {
    let key = master_key();
    let envelope = envelope_for(CipherSuite::XChaCha20Poly1305);
    let source = KeySource::MasterKey(&key);
    let sealed = envelope.seal_to_vec(&source, b"hello", b"").unwrap();
    let mut out = vec![0u8; 16];

    let err = envelope
        .unseal(&source, &sealed[..sealed.len() - 1], b"", &mut out)
        .unwrap_err();
    assert!(matches!(err, CaskError::DataCorrupt(_)));

    let mut extended = sealed.clone();
    extended.push(0);
    let err = envelope.unseal(&source, &extended, b"", &mut out).unwrap_err();
    assert!(matches!(err, CaskError::DataCorrupt(_)));
}

/// The concrete scenario: 32 zero bytes of master key, message "hello",
/// empty context, Seal mode.
#[test]
fn concrete_zero_key_hello_scenario() {
    let key = [0u8; 32];
    let source = KeySource::MasterKey(&key);
    for suite in SUITES {
        let envelope = envelope_for(suite);
        let sealed = envelope.seal_to_vec(&source, b"hello", b"").unwrap();
        assert_eq!(
            sealed.len(),
            20 + suite.nonce_len() + suite.tag_len() + 5,
            "token_min_size + iv_len + tag_len + message"
        );

        let opened = envelope.unseal_to_vec(&source, &sealed, b"").unwrap();
        assert_eq!(opened, b"hello");

        let err = envelope
            .unseal_to_vec(&source, &sealed[..sealed.len() - 1], b"")
            .unwrap_err();
        assert!(matches!(err, CaskError::DataCorrupt(_)));
    }
}

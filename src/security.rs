//! Security-environment negotiator (`spec.md` §4.6).
//!
//! Central state machine choosing between COMPUTE SIGNATURE and
//! INTERNAL AUTHENTICATE for a sign request, based on the requested
//! padding, hash selection, and an optional explicit algorithm
//! reference. The outcome is cached in `CryptoEnv` for the signer
//! (`signer.rs`) to consume exactly once.

use crate::apdu::transmit;
use crate::error::StarcosError;
use crate::iso_layer::{HashFlags, IsoLayer, SuppressErrors};
use crate::sw;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    Pkcs1V15,
    Iso9796,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecOperation {
    Sign,
    Authenticate,
    Decipher,
}

/// Immutable per sign request (`spec.md` §3).
#[derive(Debug, Clone)]
pub struct SecurityEnvironment {
    pub operation: SecOperation,
    pub padding: Padding,
    pub hash_flags: HashFlags,
    pub key_reference: Option<u8>,
    /// Explicit algorithm-reference override ("ALG_REF_PRESENT").
    pub algorithm_reference: Option<u8>,
}

/// What the signer must do once the negotiator has run
/// (`spec.md` §3 `crypto_env.pending_operation`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PendingOperation {
    #[default]
    None,
    SignNative,
    SignByAuthenticate,
}

/// Transient crypto state on the card handle (`spec.md` §3). Set by
/// the negotiator, read and cleared by the signer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CryptoEnv {
    pub pending: PendingOperation,
    pub hash_flags: HashFlags,
}

enum SingleHash {
    Sha1,
    Md5,
    Ripemd160,
}

fn as_single_hash(flags: HashFlags) -> Option<SingleHash> {
    match (flags.sha1, flags.md5, flags.ripemd160) {
        (true, false, false) => Some(SingleHash::Sha1),
        (false, true, false) => Some(SingleHash::Md5),
        (false, false, true) => Some(SingleHash::Ripemd160),
        _ => None,
    }
}

/// Algorithm token byte for the COMPUTE SIGNATURE probe
/// (`spec.md` §4.6 step 2), or `None` when the (padding, hash_flags)
/// combination has no native mapping and the negotiator must fall
/// through to INTERNAL AUTHENTICATE without even probing.
fn native_algorithm_byte(padding: Padding, hash_flags: HashFlags) -> Option<u8> {
    match (padding, as_single_hash(hash_flags)?) {
        (Padding::Pkcs1V15, SingleHash::Sha1) => Some(0x12),
        (Padding::Pkcs1V15, SingleHash::Ripemd160) => Some(0x22),
        (Padding::Pkcs1V15, SingleHash::Md5) => Some(0x32),
        (Padding::Iso9796, SingleHash::Sha1) => Some(0x11),
        (Padding::Iso9796, SingleHash::Ripemd160) => Some(0x21),
        (Padding::Iso9796, SingleHash::Md5) => None,
    }
}

fn key_reference_prefix(env: &SecurityEnvironment) -> Vec<u8> {
    match env.key_reference {
        Some(k) => vec![0x83, 0x01, k],
        None => Vec::new(),
    }
}

fn mse_apdu(p1: u8, p2: u8, data: &[u8]) -> Vec<u8> {
    let mut apdu = vec![0x00, 0x22, p1, p2, data.len() as u8];
    apdu.extend_from_slice(data);
    apdu
}

fn negotiate_decipher(iso: &mut dyn IsoLayer, env: &SecurityEnvironment) -> Result<(), StarcosError> {
    if env.padding != Padding::Pkcs1V15 {
        return Err(StarcosError::InvalidArguments(
            "decipher security environment requires PKCS#1 padding".into(),
        ));
    }
    let mut data = vec![0x80, 0x01, 0x02];
    // Asymmetric key reference; this crate's data model is RSA-only,
    // so the symmetric `0x84` tag from spec.md never applies here.
    if let Some(k) = env.key_reference {
        data.extend_from_slice(&[0x83, 0x01, k]);
    }
    let apdu = mse_apdu(0x81, 0xB8, &data);
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

fn negotiate_authenticate(
    iso: &mut dyn IsoLayer,
    crypto_env: &mut CryptoEnv,
    env: &SecurityEnvironment,
) -> Result<(), StarcosError> {
    if env.padding != Padding::Pkcs1V15 {
        return Err(StarcosError::InvalidArguments(
            "INTERNAL AUTHENTICATE requires PKCS#1 padding".into(),
        ));
    }
    let mut data = key_reference_prefix(env);
    data.extend_from_slice(&[0x80, 0x01, 0x01]);
    let apdu = mse_apdu(0x41, 0xA4, &data);
    // Not suppressed: a failure here is a real error.
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)?;
    crypto_env.pending = PendingOperation::SignByAuthenticate;
    crypto_env.hash_flags = env.hash_flags;
    log::debug!("security env: INTERNAL AUTHENTICATE armed");
    Ok(())
}

fn negotiate_sign(
    iso: &mut dyn IsoLayer,
    crypto_env: &mut CryptoEnv,
    suppress_flag: &mut bool,
    env: &SecurityEnvironment,
) -> Result<(), StarcosError> {
    let algorithm_byte = env
        .algorithm_reference
        .or_else(|| native_algorithm_byte(env.padding, env.hash_flags));

    if let Some(aa) = algorithm_byte {
        let mut data = key_reference_prefix(env);
        data.extend_from_slice(&[0x80, 0x01, aa]);
        let apdu = mse_apdu(0x41, 0xB6, &data);

        let outcome = {
            // The probe may legally fail; suppress error reporting
            // for its duration (`spec.md` §4.6 step 3, §9).
            let _guard = SuppressErrors::acquire(suppress_flag);
            transmit(iso, &apdu)
        };

        if let Ok((0x90, 0x00, _)) = outcome {
            crypto_env.pending = PendingOperation::SignNative;
            crypto_env.hash_flags = HashFlags::NONE;
            log::debug!("security env: COMPUTE SIGNATURE probe succeeded");
            return Ok(());
        }
        log::warn!("security env: COMPUTE SIGNATURE probe failed, falling back to INTERNAL AUTHENTICATE");
    }

    negotiate_authenticate(iso, crypto_env, env)
}

/// Negotiate a security environment, emitting the MANAGE SECURITY
/// ENVIRONMENT APDU(s) appropriate to `env.operation` and recording
/// what the next `sign` call must do.
pub fn negotiate(
    iso: &mut dyn IsoLayer,
    crypto_env: &mut CryptoEnv,
    suppress_flag: &mut bool,
    env: &SecurityEnvironment,
) -> Result<(), StarcosError> {
    match env.operation {
        SecOperation::Decipher => negotiate_decipher(iso, env),
        SecOperation::Sign => negotiate_sign(iso, crypto_env, suppress_flag, env),
        SecOperation::Authenticate => negotiate_authenticate(iso, crypto_env, env),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iso_layer::IsoOutcome;
    use std::collections::VecDeque;

    struct ScriptedIso {
        script: VecDeque<(Vec<u8>, Vec<u8>)>,
    }

    impl IsoLayer for ScriptedIso {
        fn transmit(&mut self, apdu: &[u8]) -> anyhow::Result<Vec<u8>> {
            let (expected, response) = self
                .script
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted APDU: {}", hex::encode_upper(apdu)));
            assert_eq!(apdu, expected.as_slice());
            Ok(response)
        }
        fn find_tlv<'a>(&self, _buf: &'a [u8], _tag: u8) -> Option<&'a [u8]> {
            None
        }
        fn classify(&self, _sw1: u8, _sw2: u8) -> IsoOutcome {
            IsoOutcome::Error
        }
    }

    fn sha1_env() -> SecurityEnvironment {
        SecurityEnvironment {
            operation: SecOperation::Sign,
            padding: Padding::Pkcs1V15,
            hash_flags: HashFlags {
                sha1: true,
                ..HashFlags::NONE
            },
            key_reference: None,
            algorithm_reference: None,
        }
    }

    #[test]
    fn s4_compute_signature_probe_succeeds() {
        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![(
                vec![0x00, 0x22, 0x41, 0xB6, 0x03, 0x80, 0x01, 0x12],
                vec![0x90, 0x00],
            )]),
        };
        let mut crypto_env = CryptoEnv::default();
        let mut suppress = false;
        negotiate(&mut iso, &mut crypto_env, &mut suppress, &sha1_env()).unwrap();
        assert_eq!(crypto_env.pending, PendingOperation::SignNative);
        assert!(!suppress, "suppression must revert after the probe");
    }

    #[test]
    fn s5_compute_signature_probe_falls_back_to_authenticate() {
        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![
                (
                    vec![0x00, 0x22, 0x41, 0xB6, 0x03, 0x80, 0x01, 0x12],
                    vec![0x6A, 0x80],
                ),
                (
                    vec![0x00, 0x22, 0x41, 0xA4, 0x03, 0x80, 0x01, 0x01],
                    vec![0x90, 0x00],
                ),
            ]),
        };
        let mut crypto_env = CryptoEnv::default();
        let mut suppress = false;
        negotiate(&mut iso, &mut crypto_env, &mut suppress, &sha1_env()).unwrap();
        assert_eq!(crypto_env.pending, PendingOperation::SignByAuthenticate);
        assert_eq!(crypto_env.hash_flags.sha1, true);
        assert!(!suppress);
    }

    #[test]
    fn unmapped_combination_skips_the_probe_entirely() {
        let env = SecurityEnvironment {
            operation: SecOperation::Sign,
            padding: Padding::Iso9796,
            hash_flags: HashFlags {
                md5: true,
                ..HashFlags::NONE
            },
            key_reference: None,
            algorithm_reference: None,
        };
        // Only the authenticate MSE should be sent; a probe APDU here
        // would make the scripted transport panic on mismatch.
        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![(
                vec![0x00, 0x22, 0x41, 0xA4, 0x03, 0x80, 0x01, 0x01],
                vec![0x90, 0x00],
            )]),
        };
        let mut crypto_env = CryptoEnv::default();
        let mut suppress = false;
        negotiate(&mut iso, &mut crypto_env, &mut suppress, &env).unwrap();
        assert_eq!(crypto_env.pending, PendingOperation::SignByAuthenticate);
    }

    #[test]
    fn explicit_algorithm_reference_overrides_table_lookup() {
        let mut env = sha1_env();
        env.algorithm_reference = Some(0xAA);
        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![(
                vec![0x00, 0x22, 0x41, 0xB6, 0x03, 0x80, 0x01, 0xAA],
                vec![0x90, 0x00],
            )]),
        };
        let mut crypto_env = CryptoEnv::default();
        let mut suppress = false;
        negotiate(&mut iso, &mut crypto_env, &mut suppress, &env).unwrap();
        assert_eq!(crypto_env.pending, PendingOperation::SignNative);
    }

    #[test]
    fn decipher_requires_pkcs1_padding() {
        let env = SecurityEnvironment {
            operation: SecOperation::Decipher,
            padding: Padding::Iso9796,
            hash_flags: HashFlags::NONE,
            key_reference: None,
            algorithm_reference: None,
        };
        let mut iso = ScriptedIso {
            script: VecDeque::new(),
        };
        let mut crypto_env = CryptoEnv::default();
        let mut suppress = false;
        assert!(negotiate(&mut iso, &mut crypto_env, &mut suppress, &env).is_err());
    }
}

//! Signer (`spec.md` §4.7).
//!
//! Consumes exactly the `CryptoEnv` state the negotiator
//! (`security.rs`) left behind and issues either a native COMPUTE
//! SIGNATURE pair or an INTERNAL AUTHENTICATE, depending on which
//! branch was armed.

use crate::apdu::transmit;
use crate::error::StarcosError;
use crate::iso_layer::{DigestInfoEncoder, IsoLayer};
use crate::security::{CryptoEnv, PendingOperation};
use crate::sw;

/// This card's maximum command data length once extended-length
/// support has been ruled out during `init` (`spec.md` §4.1, §8).
pub const APDU_MAX: usize = 128;

fn sign_native(iso: &mut dyn IsoLayer, data: &[u8]) -> Result<Vec<u8>, StarcosError> {
    let mut hash_apdu = vec![0x00, 0x2A, 0x90, 0x81, data.len() as u8];
    hash_apdu.extend_from_slice(data);
    let (sw1, sw2, _) = transmit(iso, &hash_apdu)?;
    sw::check(&*iso, sw1, sw2)?;

    // Le=0x00 requests the full 256-byte RSA signature (short APDU
    // convention: a zero Le byte means 256).
    let read_apdu = [0x00, 0x2A, 0x9E, 0x9A, 0x00];
    let (sw1, sw2, signature) = transmit(iso, &read_apdu)?;
    sw::check(&*iso, sw1, sw2)?;
    Ok(signature)
}

fn sign_by_authenticate(
    iso: &mut dyn IsoLayer,
    crypto_env: &CryptoEnv,
    digest_encoder: &dyn DigestInfoEncoder,
    data: &[u8],
) -> Result<Vec<u8>, StarcosError> {
    let digest_info = digest_encoder.encode(crypto_env.hash_flags, data)?;
    let mut apdu = vec![0x00, 0x88, 0x10, 0x00, digest_info.len() as u8];
    apdu.extend_from_slice(&digest_info);
    apdu.push(0x00); // Le=256
    let (sw1, sw2, signature) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)?;
    Ok(signature)
}

/// Sign `data` against whatever security environment was last
/// negotiated. `crypto_env` is cleared unconditionally on return,
/// success or failure, so a stale negotiation is never reused
/// (`spec.md` §4.7).
pub fn sign(
    iso: &mut dyn IsoLayer,
    crypto_env: &mut CryptoEnv,
    digest_encoder: &dyn DigestInfoEncoder,
    data: &[u8],
) -> Result<Vec<u8>, StarcosError> {
    let pending = crypto_env.pending;
    let outcome = if data.len() > APDU_MAX {
        Err(StarcosError::InvalidArguments(format!(
            "sign input of {} bytes exceeds APDU_MAX ({APDU_MAX})",
            data.len()
        )))
    } else {
        match pending {
            PendingOperation::SignNative => sign_native(iso, data),
            PendingOperation::SignByAuthenticate => {
                sign_by_authenticate(iso, crypto_env, digest_encoder, data)
            }
            PendingOperation::None => Err(StarcosError::Internal(
                "sign called without a negotiated security environment".into(),
            )),
        }
    };
    *crypto_env = CryptoEnv::default();
    outcome
}

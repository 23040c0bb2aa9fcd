//! Key-pair generator (`spec.md` §4.9).
//!
//! Triggers on-card RSA key-pair generation and reads back the public
//! modulus. The response's key-metadata prefix (algorithm tag,
//! exponent) is intentionally unparsed — see `spec.md` §9.

use crate::apdu::{transmit, VENDOR_CLA};
use crate::error::StarcosError;
use crate::iso_layer::IsoLayer;
use crate::sw;

/// Offset into the key-generation read-back buffer where the
/// little-endian modulus begins (`spec.md` §4.9 step 2).
const MODULUS_OFFSET: usize = 18;

/// Trigger on-card generation of an RSA key pair under `key_id` with
/// a modulus of `modulus_bits` bits.
pub fn generate_key_pair(
    iso: &mut dyn IsoLayer,
    key_id: u8,
    modulus_bits: u16,
) -> Result<(), StarcosError> {
    let bits = modulus_bits.to_be_bytes();
    // No CLA |= 0x80 here: spec.md §4.9 step 1 reserves the vendor CLA
    // for the read-back in step 2 only.
    let apdu = [0x00, 0x46, 0x00, key_id, 0x02, bits[0], bits[1]];
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

/// Read the public modulus for `key_id`, which must have already been
/// generated. `modulus_len` is the expected modulus length in bytes.
/// Returns the modulus in big-endian order.
pub fn read_public_modulus(
    iso: &mut dyn IsoLayer,
    key_id: u8,
    modulus_len: usize,
) -> Result<Vec<u8>, StarcosError> {
    let apdu = [VENDOR_CLA, 0xF0, 0x9C, 0x00, 0x01, key_id, 0x00];
    let (sw1, sw2, data) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)?;

    let end = MODULUS_OFFSET
        .checked_add(modulus_len)
        .ok_or_else(|| StarcosError::InvalidArguments("modulus length overflow".into()))?;
    if data.len() < end {
        return Err(StarcosError::Internal(format!(
            "key-generation response too short: got {} bytes, need {end}",
            data.len()
        )));
    }

    let mut modulus = data[MODULUS_OFFSET..end].to_vec();
    modulus.reverse();
    Ok(modulus)
}

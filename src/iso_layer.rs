//! Collaborator traits the driver consumes but does not implement.
//!
//! The generic ISO 7816-4 command layer (APDU framing, channel
//! management, BER-TLV search, base status-word mapping) and the host
//! cryptographic library (ASN.1 DigestInfo encoding) both live outside
//! this crate's scope. The driver depends on them only through these
//! traits, so it can be exercised in tests against a scripted mock
//! without a real reader or a real RSA stack.

use thiserror::Error;

/// Outcome of the ISO 7816-4 base classifier, consulted once the
/// vendor status-word table (`sw::classify`) has had a chance to claim
/// the status word first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsoOutcome {
    Ok,
    BytesRemaining(u8),
    Warning,
    Error,
}

#[derive(Debug, Error)]
pub enum IsoError {
    #[error("transmit failed: {0}")]
    Transmit(String),
}

/// Hash selection bits for the security environment and DigestInfo
/// encoding, matching `spec.md` §3's `hash_flags` set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HashFlags {
    pub sha1: bool,
    pub md5: bool,
    pub ripemd160: bool,
}

impl HashFlags {
    pub const NONE: Self = Self {
        sha1: false,
        md5: false,
        ripemd160: false,
    };

    pub fn is_none(&self) -> bool {
        !self.sha1 && !self.md5 && !self.ripemd160
    }
}

/// The host-supplied ISO 7816-4 command plumbing. One instance is
/// bound to a card handle for the lifetime of that handle.
pub trait IsoLayer {
    /// Send a raw APDU and return the raw response, including the
    /// trailing SW1/SW2 bytes, exactly as a case-2/3/4 transceive
    /// would. Driver code splits the trailer off itself so that the
    /// vendor classifier sees the same (SW1, SW2) pair the host does.
    fn transmit(&mut self, apdu: &[u8]) -> anyhow::Result<Vec<u8>>;

    /// Search a BER-TLV buffer for the first occurrence of `tag` at
    /// the top level and return its value slice.
    fn find_tlv<'a>(&self, buf: &'a [u8], tag: u8) -> Option<&'a [u8]>;

    /// Base ISO 7816-4 classification, consulted when the vendor
    /// table in `sw::classify` does not recognize the status word.
    fn classify(&self, sw1: u8, sw2: u8) -> IsoOutcome;
}

/// The host's cryptographic library, used only to pre-encode an ASN.1
/// DigestInfo block ahead of INTERNAL AUTHENTICATE (`spec.md` §4.7).
pub trait DigestInfoEncoder {
    fn encode(&self, hash_flags: HashFlags, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// RAII guard implementing the "suppress errors" scoped token the
/// COMPUTE SIGNATURE probe acquires before its deliberately-fallible
/// MSE attempt (`spec.md` §4.6, §9). Reverts unconditionally on drop,
/// including on an early return out of the probe.
pub struct SuppressErrors<'a> {
    flag: &'a mut bool,
    previously_suppressed: bool,
}

impl<'a> SuppressErrors<'a> {
    pub fn acquire(flag: &'a mut bool) -> Self {
        let previously_suppressed = *flag;
        *flag = true;
        Self {
            flag,
            previously_suppressed,
        }
    }
}

impl Drop for SuppressErrors<'_> {
    fn drop(&mut self) {
        *self.flag = self.previously_suppressed;
    }
}

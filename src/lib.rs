//! Core driver for smart cards running the STARCOS SPK 2.3 operating
//! system (`spec.md` §1).
//!
//! This crate implements the ATR matching, file-system navigation,
//! file-creation protocol, security-environment negotiation/signing,
//! and key-installation engine that plug into a host's generic
//! ISO 7816-4 middleware. The host middleware itself — APDU framing,
//! BER-TLV search, base status-word mapping, and the cryptographic
//! library needed to pre-encode a DigestInfo block — is consumed only
//! through the [`IsoLayer`] and [`DigestInfoEncoder`] traits.

mod acl;
mod apdu;
mod driver;
mod error;
mod fci;
mod file_creator;
mod iso_layer;
mod key_install;
mod keygen;
mod path;
mod security;
mod signer;
mod sw;

pub use acl::{AclEntry, AclMethod};
pub use driver::{CardCtlRequest, CreateFileRequest};
pub use error::{Result, StarcosError};
pub use fci::{EfStructure, FileBody, FileKind};
pub use file_creator::{DfAcl, DfSpec, EfAcl, EfSpec, EfStructureSpec, MfAcl, MfSpec};
pub use iso_layer::{DigestInfoEncoder, HashFlags, IsoError, IsoLayer, IsoOutcome, SuppressErrors};
pub use key_install::{KeyInstallRequest, MAX_CHUNK, MODE_INSTALL};
pub use path::{FileDescriptor, LocationCache, PathInput};
pub use security::{CryptoEnv, Padding, PendingOperation, SecOperation, SecurityEnvironment};
pub use signer::APDU_MAX;

/// Result of a successful ATR match (`spec.md` §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CardMatch {
    pub name: &'static str,
    pub cla: u8,
    pub max_send_size: usize,
    pub max_recv_size: usize,
}

const ATR_TABLE: &[&[u8]] = &[
    &[
        0x3B, 0xB7, 0x94, 0x00, 0xC0, 0x24, 0x31, 0xFE, 0x65, 0x53, 0x50, 0x4B, 0x32, 0x33, 0x90,
        0x00, 0xB4,
    ],
    &[
        0x3B, 0xB7, 0x94, 0x00, 0x81, 0x31, 0xFE, 0x65, 0x53, 0x50, 0x4B, 0x32, 0x33, 0x90, 0x00,
        0xD1,
    ],
];

/// Match a raw ATR against STARCOS SPK 2.3's known card signatures
/// (`spec.md` §6, §8 property 1, scenario S1). A mismatch is not an
/// error: the caller tries the next driver.
pub fn match_card(atr: &[u8]) -> Option<CardMatch> {
    if ATR_TABLE.iter().any(|candidate| *candidate == atr) {
        Some(CardMatch {
            name: "STARCOS SPK 2.3",
            cla: 0x00,
            max_send_size: 128,
            max_recv_size: 128,
        })
    } else {
        None
    }
}

/// Per-card handle extension state: the location cache and the
/// transient crypto environment (`spec.md` §3), plus the serial cache
/// and suppress-errors flag this crate's ambient stack adds.
///
/// Owns a borrow of the host's [`IsoLayer`] for its lifetime; there is
/// no persistence beyond the handle (`spec.md` §1 non-goals).
pub struct StarcosDriver<'a> {
    iso: &'a mut dyn IsoLayer,
    cache: LocationCache,
    crypto_env: CryptoEnv,
    serial: Option<Vec<u8>>,
    suppress_errors: bool,
}

impl<'a> StarcosDriver<'a> {
    /// Construct the per-handle extension state. Corresponds to the
    /// source's `init` entry point (`spec.md` §2, §9).
    pub fn init(iso: &'a mut dyn IsoLayer) -> Self {
        Self {
            iso,
            cache: LocationCache::default(),
            crypto_env: CryptoEnv::default(),
            serial: None,
            suppress_errors: false,
        }
    }

    /// Tear down the handle's extension state. Cancellation is
    /// cooperative: there is no in-flight APDU to cancel, so this is
    /// just a drop (`spec.md` §5, §9 `finish`).
    pub fn finish(self) {}

    pub fn select_file(&mut self, target: PathInput) -> Result<FileDescriptor> {
        path::select_file(self.iso, &mut self.cache, target)
    }

    pub fn negotiate_security_env(&mut self, env: &SecurityEnvironment) -> Result<()> {
        security::negotiate(self.iso, &mut self.crypto_env, &mut self.suppress_errors, env)
    }

    pub fn sign(&mut self, digest_encoder: &dyn DigestInfoEncoder, data: &[u8]) -> Result<Vec<u8>> {
        signer::sign(self.iso, &mut self.crypto_env, digest_encoder, data)
    }

    pub fn card_ctl(&mut self, req: CardCtlRequest) -> Result<()> {
        driver::card_ctl(self.iso, &mut self.cache, req)
    }

    /// `spec.md` §6 get-serial: cached after the first successful
    /// call.
    pub fn get_serial(&mut self) -> Result<Vec<u8>> {
        driver::get_serial(self.iso, &mut self.serial)
    }

    /// PIN reference-number pass-through (`SPEC_FULL.md` §4.10); PIN
    /// padding conventions and retry policy live above this crate.
    pub fn verify_pin(&mut self, pin_reference: u8, pin: &[u8]) -> Result<()> {
        driver::verify_pin(self.iso, pin_reference, pin)
    }

    pub fn logout(&mut self) -> Result<()> {
        driver::logout(self.iso, &mut self.cache)
    }

    pub fn generate_key_pair(&mut self, key_id: u8, modulus_bits: u16) -> Result<()> {
        keygen::generate_key_pair(self.iso, key_id, modulus_bits)
    }

    pub fn read_public_modulus(&mut self, key_id: u8, modulus_len: usize) -> Result<Vec<u8>> {
        keygen::read_public_modulus(self.iso, key_id, modulus_len)
    }
}

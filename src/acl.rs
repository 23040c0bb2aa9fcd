//! ACL translator (`spec.md` §3 ACL byte, §4.4).
//!
//! Converts an abstract access-control entry into the single-octet
//! STARCOS wire encoding, and derives the combined secure-messaging
//! sub-byte STARCOS packs alongside each object header.

use crate::error::StarcosError;

/// How an abstract operation is gated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AclMethod {
    Always,
    Never,
    /// PIN reference 1..=15. Reference 1 is the security-officer PIN
    /// (SOPIN) and encodes differently from every other reference.
    ByPin(u8),
    BySecureMessaging,
}

/// A single (operation, gating rule) entry in an abstract ACL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AclEntry {
    pub method: AclMethod,
    pub secure_messaging_required: bool,
}

const ALWAYS: u8 = 0x9F;
const NEVER: u8 = 0x5F;
const SM_BIT: u8 = 0x10;

/// Encode a single abstract ACL entry into the STARCOS wire byte.
///
/// - `ALWAYS`/`NEVER` are sentinel bytes with no PIN/SM encoding.
/// - Otherwise bit 4 (`0x10`) flags secure-messaging, and the low
///   nibble carries the PIN state: local PIN 1 (SOPIN) encodes its raw
///   reference verbatim as `0x01`; every other PIN reference `k`
///   encodes as `0x0F - (k >> 1)`.
pub fn encode_entry(entry: &AclEntry) -> Result<u8, StarcosError> {
    let mut byte = match entry.method {
        AclMethod::Always => return Ok(ALWAYS),
        AclMethod::Never => return Ok(NEVER),
        AclMethod::ByPin(k) => {
            if !(1..=15).contains(&k) {
                return Err(StarcosError::InvalidArguments(format!(
                    "PIN reference {k} out of range 1..=15"
                )));
            }
            if k == 1 {
                // SOPIN: raw low nibble used verbatim.
                k & 0x0F
            } else {
                0x0F - (k >> 1)
            }
        }
        AclMethod::BySecureMessaging => 0x00,
    };
    if entry.secure_messaging_required {
        byte |= SM_BIT;
    }
    Ok(byte)
}

/// Fetch an operation's ACL entry, or fall back to `default` if the
/// caller left it unspecified (`spec.md` §4.4: "If an operation has no
/// entry, use the caller-supplied default").
pub fn entry_or_default(entry: Option<&AclEntry>, default: AclMethod) -> AclEntry {
    entry.copied().unwrap_or(AclEntry {
        method: default,
        secure_messaging_required: false,
    })
}

/// Combined-mode secure-messaging sub-byte (`spec.md` §4.4): scan the
/// ACL entries relevant to a header and set `0x03` if *any* of them
/// requires protected messaging, else `0x00`.
///
/// This resolves the open question in `spec.md` §9.1: the source's
/// loop condition (`tmp == 0`) never fires once `tmp` is initialized
/// to 0, making the EF SM byte always zero in the original. The
/// intended behavior — "scan operations 0..3 and set SM if any
/// requires PRO" — is what this implements.
pub fn combined_sm_byte(entries: &[AclEntry]) -> u8 {
    if entries.iter().any(|e| e.secure_messaging_required) {
        0x03
    } else {
        0x00
    }
}

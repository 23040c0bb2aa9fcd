//! Error kinds surfaced to callers of the driver.
//!
//! Mirrors the ISO 7816-4 host layer's own error enum in shape (a
//! closed set of kinds plus an opaque transport variant) so the two
//! compose cleanly when the host wraps both in its own top-level error.

use thiserror::Error;

/// Every error the driver can return.
///
/// Variants line up with the kinds enumerated in the status-word
/// classifier (`sw::classify`): a vendor or ISO status word maps to
/// exactly one of these, carrying the raw (SW1, SW2) for diagnostics.
#[derive(Debug, Error)]
pub enum StarcosError {
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("out of memory")]
    OutOfMemory,

    #[error("card command failed (SW={sw1:02X}{sw2:02X})")]
    CardCommandFailed { sw1: u8, sw2: u8 },

    #[error("incorrect parameters (SW={sw1:02X}{sw2:02X})")]
    IncorrectParameters { sw1: u8, sw2: u8 },

    #[error("operation not allowed (SW={sw1:02X}{sw2:02X})")]
    NotAllowed { sw1: u8, sw2: u8 },

    #[error("file not found (SW={sw1:02X}{sw2:02X})")]
    FileNotFound { sw1: u8, sw2: u8 },

    #[error("file already exists (SW={sw1:02X}{sw2:02X})")]
    FileAlreadyExists { sw1: u8, sw2: u8 },

    #[error("PIN incorrect, {tries_left} tries left")]
    PinIncorrect { tries_left: u8 },

    #[error("internal protocol invariant violated: {0}")]
    Internal(String),

    #[error("ISO 7816-4 host layer: {0}")]
    IsoLayer(#[from] crate::iso_layer::IsoError),

    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, StarcosError>;

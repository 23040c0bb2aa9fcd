//! Status-word classifier (`spec.md` §4.1, §6).
//!
//! Maps a raw (SW1, SW2) pair to a driver error kind. Recognizes the
//! STARCOS-specific success/PIN-failure shorthands first, then the
//! 14-entry vendor table, and only then defers to the host's ISO
//! 7816-4 base classifier.

use crate::error::StarcosError;
use crate::iso_layer::{IsoLayer, IsoOutcome};

/// One entry of the vendor status-word table (`spec.md` §6).
struct VendorEntry {
    sw: u16,
    make_error: fn(u8, u8) -> StarcosError,
}

macro_rules! vendor_entry {
    ($sw:expr, $variant:ident) => {
        VendorEntry {
            sw: $sw,
            make_error: |sw1, sw2| StarcosError::$variant { sw1, sw2 },
        }
    };
}

const VENDOR_TABLE: &[VendorEntry] = &[
    vendor_entry!(0x6600, IncorrectParameters), // Error setting security env
    vendor_entry!(0x66F0, IncorrectParameters), // No space left for padding
    vendor_entry!(0x69F0, NotAllowed),          // Command not allowed
    vendor_entry!(0x6A89, FileAlreadyExists),   // File exists
    vendor_entry!(0x6A8A, FileAlreadyExists),   // Application exists
    vendor_entry!(0x6F01, CardCommandFailed),   // Public key not complete
    vendor_entry!(0x6F02, CardCommandFailed),   // Data overflow
    vendor_entry!(0x6F03, CardCommandFailed),   // Invalid command sequence
    vendor_entry!(0x6F05, CardCommandFailed),   // Security environment invalid
    vendor_entry!(0x6F07, FileNotFound),        // Key part not found
    vendor_entry!(0x6F08, CardCommandFailed),   // Signature failed
    vendor_entry!(0x6F0A, IncorrectParameters), // Key format != length
    vendor_entry!(0x6F0B, IncorrectParameters), // Key-component length != algorithm
    vendor_entry!(0x6F81, CardCommandFailed),   // System error
];

/// Result of classifying a status word.
#[derive(Debug)]
pub enum Outcome {
    Ok,
    PinIncorrect { tries_left: u8 },
    Vendor(StarcosError),
    IsoDeferred(IsoOutcome),
}

/// Classify a status word, consulting `iso` only once STARCOS-specific
/// rules have had their say (`spec.md` §4.1). Callers that need to
/// special-case a particular SW1/SW2 pair themselves (e.g. the DF/EF
/// discriminator's `62xx`/`61xx` handling in `path.rs`) inspect the
/// raw status word before ever reaching this classifier.
pub fn classify(iso: &dyn IsoLayer, sw1: u8, sw2: u8) -> Outcome {
    if sw1 == 0x90 {
        return Outcome::Ok;
    }
    if sw1 == 0x63 && (sw2 & 0xF0) == 0xC0 {
        return Outcome::PinIncorrect {
            tries_left: sw2 & 0x0F,
        };
    }
    let word = ((sw1 as u16) << 8) | sw2 as u16;
    if let Some(entry) = VENDOR_TABLE.iter().find(|e| e.sw == word) {
        return Outcome::Vendor((entry.make_error)(sw1, sw2));
    }
    Outcome::IsoDeferred(iso.classify(sw1, sw2))
}

/// Convenience: classify and turn a non-OK outcome directly into a
/// `StarcosError`, for call sites that just want fail-fast behavior.
pub fn check(iso: &dyn IsoLayer, sw1: u8, sw2: u8) -> Result<(), StarcosError> {
    match classify(iso, sw1, sw2) {
        Outcome::Ok => Ok(()),
        Outcome::PinIncorrect { tries_left } => Err(StarcosError::PinIncorrect { tries_left }),
        Outcome::Vendor(err) => Err(err),
        Outcome::IsoDeferred(IsoOutcome::Ok) | Outcome::IsoDeferred(IsoOutcome::BytesRemaining(_)) => {
            Ok(())
        }
        Outcome::IsoDeferred(IsoOutcome::Warning) => Ok(()),
        Outcome::IsoDeferred(IsoOutcome::Error) => Err(StarcosError::CardCommandFailed { sw1, sw2 }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockIso {
        classify_result: IsoOutcome,
    }

    impl IsoLayer for MockIso {
        fn transmit(&mut self, _apdu: &[u8]) -> anyhow::Result<Vec<u8>> {
            unreachable!("classifier tests do not transmit")
        }
        fn find_tlv<'a>(&self, _buf: &'a [u8], _tag: u8) -> Option<&'a [u8]> {
            None
        }
        fn classify(&self, _sw1: u8, _sw2: u8) -> IsoOutcome {
            self.classify_result
        }
    }

    fn iso() -> MockIso {
        MockIso {
            classify_result: IsoOutcome::Error,
        }
    }

    #[test]
    fn ok_is_9000() {
        assert!(matches!(classify(&iso(), 0x90, 0x00), Outcome::Ok));
    }

    #[test]
    fn pin_incorrect_surfaces_remaining_tries() {
        // S7 — SW=63 C2 -> pin_code_incorrect, remaining-tries = 2.
        match classify(&iso(), 0x63, 0xC2) {
            Outcome::PinIncorrect { tries_left } => assert_eq!(tries_left, 2),
            other => panic!("expected PinIncorrect, got {other:?}"),
        }
    }

    #[test]
    fn vendor_table_hits_file_exists() {
        match classify(&iso(), 0x6A, 0x89) {
            Outcome::Vendor(StarcosError::FileAlreadyExists { sw1, sw2 }) => {
                assert_eq!((sw1, sw2), (0x6A, 0x89));
            }
            other => panic!("expected FileAlreadyExists, got {other:?}"),
        }
    }

    #[test]
    fn vendor_table_covers_all_fourteen_entries() {
        assert_eq!(VENDOR_TABLE.len(), 14);
    }

    #[test]
    fn unknown_sw_defers_to_iso_layer() {
        let iso = MockIso {
            classify_result: IsoOutcome::BytesRemaining(3),
        };
        match classify(&iso, 0x61, 0x03) {
            Outcome::IsoDeferred(IsoOutcome::BytesRemaining(3)) => {}
            other => panic!("expected IsoDeferred(BytesRemaining), got {other:?}"),
        }
    }

    #[test]
    fn iso_error_surfaces_as_card_command_failed() {
        let err = check(&iso(), 0x6A, 0x81).unwrap_err();
        assert!(matches!(err, StarcosError::CardCommandFailed { .. }));
    }
}

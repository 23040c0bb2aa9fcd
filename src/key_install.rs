//! Key installer (`spec.md` §4.8).
//!
//! Installs a 12-byte key header into the card's Internal Secret
//! File, then streams the key material itself in bounded chunks.

use crate::apdu::{transmit, VENDOR_CLA};
use crate::error::StarcosError;
use crate::iso_layer::IsoLayer;
use crate::sw;

/// Chunk data may not exceed this many bytes per APDU (`spec.md`
/// §4.8 step 3).
pub const MAX_CHUNK: usize = 124;

/// Install mode. `0` writes the header only and arms the card to
/// receive key material for `key_id`; a later resume (e.g. after a
/// cut connection) uses a nonzero mode to continue streaming without
/// re-sending the header.
pub const MODE_INSTALL: u8 = 0x00;

pub struct KeyInstallRequest<'a> {
    pub key_header: [u8; 12],
    pub key_id: u8,
    pub mode: u8,
    pub key_bytes: &'a [u8],
}

fn send_header(iso: &mut dyn IsoLayer, header: &[u8; 12]) -> Result<(), StarcosError> {
    let mut data = vec![0xC1, 0x0C];
    data.extend_from_slice(header);
    let apdu = [
        &[VENDOR_CLA, 0xF4, 0x00, 0x00, data.len() as u8][..],
        &data,
    ]
    .concat();
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

fn send_chunk(
    iso: &mut dyn IsoLayer,
    mode: u8,
    key_id: u8,
    offset: u16,
    chunk: &[u8],
) -> Result<(), StarcosError> {
    let offset_bytes = offset.to_be_bytes();
    let mut data = vec![0xC2, (3 + chunk.len()) as u8, key_id, offset_bytes[0], offset_bytes[1]];
    data.extend_from_slice(chunk);
    let apdu = [
        &[VENDOR_CLA, 0xF4, mode, 0x00, data.len() as u8][..],
        &data,
    ]
    .concat();
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

/// Install a key header and stream its key material. All-or-nothing:
/// the first non-`9000` status aborts the remaining chunks and
/// surfaces the error (`spec.md` §4.8 step 3, scenario S6).
pub fn install_key(iso: &mut dyn IsoLayer, req: &KeyInstallRequest) -> Result<(), StarcosError> {
    if req.mode == MODE_INSTALL {
        send_header(iso, &req.key_header)?;
        if req.key_bytes.is_empty() {
            return Ok(());
        }
    }

    let mut offset: u16 = 0;
    for chunk in req.key_bytes.chunks(MAX_CHUNK) {
        send_chunk(iso, req.mode, req.key_id, offset, chunk)?;
        offset = offset
            .checked_add(chunk.len() as u16)
            .ok_or_else(|| StarcosError::InvalidArguments("key material exceeds 65535 bytes".into()))?;
    }
    Ok(())
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

    #[test]
    fn install_with_no_key_bytes_sends_only_the_header() {
        let header = [0x01; 12];
        let mut data = vec![0xC1, 0x0C];
        data.extend_from_slice(&header);
        let mut apdu = vec![VENDOR_CLA, 0xF4, 0x00, 0x00, data.len() as u8];
        apdu.extend_from_slice(&data);

        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![(apdu, vec![0x90, 0x00])]),
        };
        let req = KeyInstallRequest {
            key_header: header,
            key_id: 0x01,
            mode: MODE_INSTALL,
            key_bytes: &[],
        };
        install_key(&mut iso, &req).unwrap();
    }

    /// Scenario S6: 260-byte key splits into 124/124/12 byte chunks at
    /// offsets 0/124/248.
    #[test]
    fn s6_key_install_splits_into_three_chunks() {
        let header = [0x02; 12];
        let key_bytes = vec![0xAB; 260];

        let mut header_apdu = vec![VENDOR_CLA, 0xF4, 0x00, 0x00, 0x0E, 0xC1, 0x0C];
        header_apdu.extend_from_slice(&header);

        let chunk_apdu = |offset: u16, chunk: &[u8]| {
            let offset_bytes = offset.to_be_bytes();
            let mut data = vec![0xC2, (3 + chunk.len()) as u8, 0x05, offset_bytes[0], offset_bytes[1]];
            data.extend_from_slice(chunk);
            let mut apdu = vec![VENDOR_CLA, 0xF4, 0x00, 0x00, data.len() as u8];
            apdu.extend_from_slice(&data);
            apdu
        };

        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![
                (header_apdu, vec![0x90, 0x00]),
                (chunk_apdu(0, &key_bytes[0..124]), vec![0x90, 0x00]),
                (chunk_apdu(124, &key_bytes[124..248]), vec![0x90, 0x00]),
                (chunk_apdu(248, &key_bytes[248..260]), vec![0x90, 0x00]),
            ]),
        };
        let req = KeyInstallRequest {
            key_header: header,
            key_id: 0x05,
            mode: MODE_INSTALL,
            key_bytes: &key_bytes,
        };
        install_key(&mut iso, &req).unwrap();
    }

    #[test]
    fn intermediate_failure_aborts_remaining_chunks() {
        let header = [0x03; 12];
        let key_bytes = vec![0xCC; 260];

        let mut header_apdu = vec![VENDOR_CLA, 0xF4, 0x00, 0x00, 0x0E, 0xC1, 0x0C];
        header_apdu.extend_from_slice(&header);

        let mut first_chunk_data = vec![0xC2, 127, 0x07, 0x00, 0x00];
        first_chunk_data.extend_from_slice(&key_bytes[0..124]);
        let mut first_chunk_apdu = vec![VENDOR_CLA, 0xF4, 0x00, 0x00, first_chunk_data.len() as u8];
        first_chunk_apdu.extend_from_slice(&first_chunk_data);

        // Only two script entries: the third chunk must never be sent.
        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![
                (header_apdu, vec![0x90, 0x00]),
                (first_chunk_apdu, vec![0x6A, 0x84]),
            ]),
        };
        let req = KeyInstallRequest {
            key_header: header,
            key_id: 0x07,
            mode: MODE_INSTALL,
            key_bytes: &key_bytes,
        };
        assert!(install_key(&mut iso, &req).is_err());
    }

    #[test]
    fn nonzero_mode_resumes_without_resending_header() {
        let key_bytes = vec![0x11; 10];
        let mut data = vec![0xC2, 13, 0x02, 0x00, 0x00];
        data.extend_from_slice(&key_bytes);
        let mut apdu = vec![VENDOR_CLA, 0xF4, 0x01, 0x00, data.len() as u8];
        apdu.extend_from_slice(&data);

        let mut iso = ScriptedIso {
            script: VecDeque::from(vec![(apdu, vec![0x90, 0x00])]),
        };
        let req = KeyInstallRequest {
            key_header: [0; 12],
            key_id: 0x02,
            mode: 0x01,
            key_bytes: &key_bytes,
        };
        install_key(&mut iso, &req).unwrap();
    }
}

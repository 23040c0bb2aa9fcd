//! Card-control multiplexer, PIN pass-through, and serial caching
//! (`spec.md` §6; `SPEC_FULL.md` §4.10–§4.11).

use crate::apdu::{transmit, VENDOR_CLA};
use crate::error::StarcosError;
use crate::file_creator::{self, DfSpec, EfSpec, MfSpec};
use crate::iso_layer::IsoLayer;
use crate::key_install::{self, KeyInstallRequest};
use crate::keygen;
use crate::path::LocationCache;
use crate::sw;

/// Tagged create-file variant (`spec.md` §4.5).
pub enum CreateFileRequest {
    Mf(MfSpec),
    Df(DfSpec),
    Ef(EfSpec),
}

/// A single card-control request, matching the generic multiplexer
/// `spec.md` §6 describes the host driving through.
pub enum CardCtlRequest<'a> {
    CreateFile(CreateFileRequest),
    CreateEnd { id: [u8; 2] },
    WriteKey(KeyInstallRequest<'a>),
    GenerateKey { key_id: u8, modulus_bits: u16 },
    EraseCard,
}

/// Dispatch a tagged card-control request (`spec.md` §6).
pub fn card_ctl(
    iso: &mut dyn IsoLayer,
    cache: &mut LocationCache,
    req: CardCtlRequest,
) -> Result<(), StarcosError> {
    match req {
        CardCtlRequest::CreateFile(CreateFileRequest::Mf(spec)) => file_creator::create_mf(iso, &spec),
        CardCtlRequest::CreateFile(CreateFileRequest::Df(spec)) => file_creator::create_df(iso, &spec),
        CardCtlRequest::CreateFile(CreateFileRequest::Ef(spec)) => file_creator::create_ef(iso, &spec),
        CardCtlRequest::CreateEnd { id } => file_creator::create_end(iso, id),
        CardCtlRequest::WriteKey(req) => key_install::install_key(iso, &req),
        CardCtlRequest::GenerateKey { key_id, modulus_bits } => {
            keygen::generate_key_pair(iso, key_id, modulus_bits)
        }
        CardCtlRequest::EraseCard => erase_card(iso, cache),
    }
}

/// `80 E4 00 00` with data `3F 00`; `6985` (no MF) is success.
/// Invalidates the location cache unconditionally (`spec.md` §6).
fn erase_card(iso: &mut dyn IsoLayer, cache: &mut LocationCache) -> Result<(), StarcosError> {
    let apdu = [VENDOR_CLA, 0xE4, 0x00, 0x00, 0x02, 0x3F, 0x00];
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    cache.invalidate();
    if sw1 == 0x69 && sw2 == 0x85 {
        return Ok(());
    }
    sw::check(&*iso, sw1, sw2)
}

/// `80 F6 00 00`, Le=256. The serial is cached on the card handle and
/// served from cache on every subsequent call (`spec.md` §6).
pub fn get_serial(
    iso: &mut dyn IsoLayer,
    cached: &mut Option<Vec<u8>>,
) -> Result<Vec<u8>, StarcosError> {
    if let Some(serial) = cached {
        return Ok(serial.clone());
    }
    let apdu = [VENDOR_CLA, 0xF6, 0x00, 0x00, 0x00];
    let (sw1, sw2, data) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)?;
    *cached = Some(data.clone());
    Ok(data)
}

/// VERIFY (`INS=0x20`), P1=0x00, P2=`pin_reference`. The reference-
/// number translation is this crate's responsibility; everything
/// above it (PIN padding conventions, retry policy) is out of scope
/// (`spec.md` §1, `SPEC_FULL.md` §4.10).
pub fn verify_pin(iso: &mut dyn IsoLayer, pin_reference: u8, pin: &[u8]) -> Result<(), StarcosError> {
    let mut apdu = vec![0x00, 0x20, 0x00, pin_reference, pin.len() as u8];
    apdu.extend_from_slice(pin);
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

/// SELECT MF by file-id (`A4 00 0C`, data `3F 00`). Errors are
/// suppressed wholesale so teardown never fails; `6985` is simply the
/// documented common case (`spec.md` §6).
pub fn logout(iso: &mut dyn IsoLayer, cache: &mut LocationCache) -> Result<(), StarcosError> {
    let apdu = [0x00, 0xA4, 0x00, 0x0C, 0x02, 0x3F, 0x00];
    let result = transmit(iso, &apdu);
    cache.invalidate();
    match result {
        Ok((0x90, 0x00, _)) | Ok((0x69, 0x85, _)) => Ok(()),
        Ok((sw1, sw2, _)) => {
            log::warn!("logout: SW={sw1:02X}{sw2:02X} suppressed");
            Ok(())
        }
        Err(e) => {
            log::warn!("logout: transmit failed: {e}");
            Ok(())
        }
    }
}

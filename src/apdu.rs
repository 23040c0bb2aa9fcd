//! Thin APDU transmit helper shared by every component that talks to
//! the card through the host's `IsoLayer`.

use crate::error::StarcosError;
use crate::iso_layer::IsoLayer;

/// Vendor CLA STARCOS uses for its proprietary command set
/// (`spec.md` §4.5, §6, §8).
pub const VENDOR_CLA: u8 = 0x80;

/// Send `apdu`, split the trailing SW1/SW2 off the raw response, and
/// return `(sw1, sw2, data)`. Every component in this crate routes its
/// transmits through here so status-word handling stays uniform.
pub fn transmit(iso: &mut dyn IsoLayer, apdu: &[u8]) -> Result<(u8, u8, Vec<u8>), StarcosError> {
    log::trace!("apdu >> {}", hex::encode_upper(apdu));
    let raw = iso.transmit(apdu)?;
    if raw.len() < 2 {
        return Err(crate::iso_layer::IsoError::Transmit(
            "transport returned fewer than 2 bytes".into(),
        )
        .into());
    }
    let split = raw.len() - 2;
    let (data, sw) = raw.split_at(split);
    log::trace!("apdu << {} SW={:02X}{:02X}", hex::encode_upper(data), sw[0], sw[1]);
    Ok((sw[0], sw[1], data.to_vec()))
}

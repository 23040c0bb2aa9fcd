//! File creator (`spec.md` §4.5).
//!
//! Translates an abstract file description into STARCOS's proprietary
//! vendor-CLA creation sequence: CREATE MF, or REGISTER DF + CREATE DF
//! for a directory, or CREATE EF for a leaf, each followed eventually
//! by CREATE END to activate the object's ACL.

use crate::acl::{self, AclEntry, AclMethod};
use crate::apdu::{transmit, VENDOR_CLA};
use crate::error::StarcosError;
use crate::iso_layer::IsoLayer;
use crate::sw;

/// Factory key placeholder STARCOS expects in the MF header
/// (`spec.md` §4.5): bytes `01..08`.
const FACTORY_KEY_PLACEHOLDER: [u8; 8] = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];

/// ALWAYS, forced onto LOCK/UNLOCK/INCREASE/DECREASE in every EF
/// header regardless of caller input (`spec.md` §4.5).
const FORCED_ALWAYS: u8 = 0x9F;

#[derive(Debug, Clone)]
pub struct MfAcl {
    pub create_ef: AclEntry,
    pub create_key: AclEntry,
    pub create_df: AclEntry,
}

#[derive(Debug, Clone)]
pub struct DfAcl {
    pub create_ef: AclEntry,
    pub create_key: AclEntry,
}

#[derive(Debug, Clone)]
pub struct EfAcl {
    pub read: AclEntry,
    pub write: AclEntry,
    pub erase: AclEntry,
}

#[derive(Debug, Clone, Copy)]
pub enum EfStructureSpec {
    Transparent { size: u16 },
    LinearFixed { record_count: u8, record_length: u8 },
    Cyclic { record_count: u8, record_length: u8 },
}

pub struct MfSpec {
    pub size: u16,
    pub acl: MfAcl,
}

pub struct DfSpec {
    pub id: [u8; 2],
    pub aid: Option<Vec<u8>>,
    /// DF storage budget, carried in REGISTER DF's P1/P2
    /// (`spec.md` §4.5), distinct from the ISF size estimate that
    /// lives inside the header bytes.
    pub size: u16,
    pub acl: DfAcl,
}

pub struct EfSpec {
    pub id: [u8; 2],
    pub structure: EfStructureSpec,
    pub acl: EfAcl,
}

fn checked_u16(value: u32, what: &str) -> Result<u16, StarcosError> {
    u16::try_from(value)
        .map_err(|_| StarcosError::InvalidArguments(format!("{what} does not fit in 16 bits")))
}

/// Assemble and send the 19-byte MF header via `INS=0xE0 P1=0x00`.
pub fn create_mf(iso: &mut dyn IsoLayer, spec: &MfSpec) -> Result<(), StarcosError> {
    let mut header = Vec::with_capacity(19);
    header.extend_from_slice(&FACTORY_KEY_PLACEHOLDER);
    header.extend_from_slice(&spec.size.to_be_bytes());
    let isf_estimate = checked_u16((spec.size / 4) as u32, "MF ISF size estimate")?;
    header.extend_from_slice(&isf_estimate.to_be_bytes());
    header.push(acl::encode_entry(&spec.acl.create_ef)?);
    header.push(acl::encode_entry(&spec.acl.create_key)?);
    header.push(acl::encode_entry(&spec.acl.create_df)?);
    header.push(acl::encode_entry(&spec.acl.create_df)?); // AC-register-DF == AC-create-DF
    let sm = acl::combined_sm_byte(&[spec.acl.create_ef, spec.acl.create_key, spec.acl.create_df]);
    header.extend_from_slice(&[sm, sm, sm]);
    debug_assert_eq!(header.len(), 19);

    let mut apdu = vec![VENDOR_CLA, 0xE0, 0x00, 0x00, header.len() as u8];
    apdu.extend_from_slice(&header);
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

fn df_header(spec: &DfSpec) -> Result<[u8; 25], StarcosError> {
    let aid_len = spec.aid.as_ref().map_or(0, |a| a.len());
    if aid_len > 16 {
        return Err(StarcosError::InvalidArguments(
            "application id must be at most 16 bytes".into(),
        ));
    }
    let mut header = [0u8; 25];
    header[0..2].copy_from_slice(&spec.id);
    header[2] = aid_len as u8;
    match &spec.aid {
        Some(aid) if !aid.is_empty() => header[3..3 + aid.len()].copy_from_slice(aid),
        // "fid repeated if namelen==0" (spec.md 4.5): pad the AID
        // field with the file-id bytes when no AID was supplied.
        _ => {
            for chunk in header[3..19].chunks_mut(2) {
                chunk.copy_from_slice(&spec.id);
            }
        }
    }
    // ISF size estimate has no defined input for a DF in spec.md; the
    // DF inherits the ISF budget carved out by its parent MF, so this
    // field is zero here (the card enforces the real ceiling).
    header[19..21].copy_from_slice(&0u16.to_be_bytes());
    header[21] = acl::encode_entry(&spec.acl.create_ef)?;
    header[22] = acl::encode_entry(&spec.acl.create_key)?;
    let sm = acl::combined_sm_byte(&[spec.acl.create_ef, spec.acl.create_key]);
    header[23] = sm;
    header[24] = sm;
    Ok(header)
}

/// Emit the two-step DF creation sequence: REGISTER DF with the
/// prefix of the header, then CREATE DF with the full 25-byte header.
pub fn create_df(iso: &mut dyn IsoLayer, spec: &DfSpec) -> Result<(), StarcosError> {
    let header = df_header(spec)?;
    let aid_len = header[2] as usize;
    let prefix_len = 3 + aid_len;

    let size_bytes = spec.size.to_be_bytes();
    let mut register = vec![VENDOR_CLA, 0x52, size_bytes[0], size_bytes[1], prefix_len as u8];
    register.extend_from_slice(&header[..prefix_len]);
    let (sw1, sw2, _) = transmit(iso, &register)?;
    sw::check(&*iso, sw1, sw2)?;

    let mut create = vec![VENDOR_CLA, 0xE0, 0x01, 0x00, header.len() as u8];
    create.extend_from_slice(&header);
    let (sw1, sw2, _) = transmit(iso, &create)?;
    sw::check(&*iso, sw1, sw2)
}

fn ef_header(spec: &EfSpec) -> Result<[u8; 16], StarcosError> {
    let mut header = [0u8; 16];
    header[0..2].copy_from_slice(&spec.id);
    header[2] = acl::encode_entry(&spec.acl.read)?;
    header[3] = acl::encode_entry(&spec.acl.write)?;
    header[4] = acl::encode_entry(&spec.acl.erase)?;
    header[5] = FORCED_ALWAYS; // LOCK
    header[6] = FORCED_ALWAYS; // UNLOCK
    header[7] = FORCED_ALWAYS; // INCREASE
    header[8] = FORCED_ALWAYS; // DECREASE
                                // header[9..11] RFU, left zero
    header[11] = acl::combined_sm_byte(&[spec.acl.read, spec.acl.write, spec.acl.erase]);
    header[12] = 0x00; // SID: use low 5 bits of FID
    match spec.structure {
        EfStructureSpec::Transparent { size } => {
            header[13] = 0x81;
            header[14..16].copy_from_slice(&size.to_be_bytes());
        }
        EfStructureSpec::LinearFixed {
            record_count,
            record_length,
        } => {
            header[13] = 0x82;
            header[14] = record_count;
            header[15] = record_length;
        }
        EfStructureSpec::Cyclic {
            record_count,
            record_length,
        } => {
            header[13] = 0x84;
            header[14] = record_count;
            header[15] = record_length;
        }
    }
    Ok(header)
}

/// Emit CREATE EF (`INS=0xE0 P1=0x03`) with the 16-byte header.
pub fn create_ef(iso: &mut dyn IsoLayer, spec: &EfSpec) -> Result<(), StarcosError> {
    let header = ef_header(spec)?;
    let mut apdu = vec![VENDOR_CLA, 0xE0, 0x03, 0x00, header.len() as u8];
    apdu.extend_from_slice(&header);
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

/// Emit CREATE END (`INS=0xE0 P1=0x02`) to activate the ACL of the MF
/// or DF just created. Must follow MF/DF creation before any child
/// file is created inside it (`spec.md` §4.5, §5).
pub fn create_end(iso: &mut dyn IsoLayer, id: [u8; 2]) -> Result<(), StarcosError> {
    let apdu = [VENDOR_CLA, 0xE0, 0x02, 0x00, 0x02, id[0], id[1]];
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

//! FCI decoder (`spec.md` §4.2, `process_fci`).
//!
//! Parses the BER-TLV file-control information returned by SELECT into
//! a logical file descriptor. STARCOS is inconsistent about whether a
//! `0x82` file-descriptor tag is present at all, so a missing tag is
//! not an error — it just means "working EF, structure unknown".

use crate::error::StarcosError;

/// Structural shape of an elementary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EfStructure {
    /// Includes the STARCOS "object EF" (tag value `0x11`), which has
    /// no distinct read semantics from a plain transparent EF.
    /// Flagged per the open question in `spec.md` §9.2 so higher
    /// layers can tell the two apart if it ever matters.
    Transparent { is_object: bool },
    LinearFixed,
    Cyclic,
    ComputeService,
    /// No `0x82` tag was present in the FCI.
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Df,
    Ef,
}

/// Size/shape information decoded from the FCI, independent of the
/// identity (file-id/AID) which is supplied by the caller of SELECT,
/// not by the FCI itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FileBody {
    /// Tag `0x80`: total file body size in bytes, big-endian.
    pub size: Option<u32>,
    pub structure: Option<EfStructure>,
    /// Third byte of a 3-byte `0x82` descriptor: record length for
    /// record-structured EFs.
    pub record_length: Option<u8>,
    /// First byte of a 3-byte `0x82` descriptor (record count),
    /// decoded here for completeness though `spec.md` does not name
    /// a separate record-count field distinct from `record_length`.
    pub record_count: Option<u8>,
}

const TAG_FCI: u8 = 0x6F;
const TAG_BODY_SIZE: u8 = 0x80;
const TAG_FILE_DESCRIPTOR: u8 = 0x82;

/// Minimal BER-TLV walk over the flat sequence of tag/length/value
/// triples inside the `0x6F` template. STARCOS FCI templates are not
/// nested beyond this one level, so a full constructed-tag recursion
/// is unneeded here (the host's BER-TLV search handles the general
/// case for other callers; this one is intentionally narrow).
fn each_tlv<'a>(mut buf: &'a [u8], mut f: impl FnMut(u8, &'a [u8])) -> Result<(), StarcosError> {
    while !buf.is_empty() {
        if buf.len() < 2 {
            return Err(StarcosError::InvalidArguments(
                "truncated TLV header in FCI".into(),
            ));
        }
        let tag = buf[0];
        let len = buf[1] as usize;
        let value_start = 2;
        let value_end = value_start + len;
        if value_end > buf.len() {
            return Err(StarcosError::InvalidArguments(
                "FCI tag length exceeds buffer".into(),
            ));
        }
        f(tag, &buf[value_start..value_end]);
        buf = &buf[value_end..];
    }
    Ok(())
}

/// Decode a `0x6F`-tagged FCI template into a `FileBody`.
pub fn process_fci(data: &[u8]) -> Result<FileBody, StarcosError> {
    if data.len() < 2 {
        return Err(StarcosError::InvalidArguments(
            "FCI buffer too short".into(),
        ));
    }
    if data[0] != TAG_FCI {
        return Err(StarcosError::InvalidArguments(format!(
            "FCI must start with tag 0x6F, got {:#04x}",
            data[0]
        )));
    }
    let outer_len = data[1] as usize;
    if 2 + outer_len > data.len() {
        return Err(StarcosError::InvalidArguments(
            "FCI advertised length exceeds buffer".into(),
        ));
    }
    let inner = &data[2..2 + outer_len];

    let mut body = FileBody::default();
    each_tlv(inner, |tag, value| match tag {
        TAG_BODY_SIZE if value.len() >= 2 => {
            body.size = Some(u32::from_be_bytes([
                0,
                0,
                value[value.len() - 2],
                value[value.len() - 1],
            ]));
        }
        TAG_FILE_DESCRIPTOR if value.len() == 1 && value[0] == 0x01 => {
            body.structure = Some(EfStructure::Transparent { is_object: false });
        }
        TAG_FILE_DESCRIPTOR if value.len() == 1 && value[0] == 0x11 => {
            body.structure = Some(EfStructure::Transparent { is_object: true });
        }
        TAG_FILE_DESCRIPTOR if value.len() == 3 && value[1] == 0x21 => {
            body.structure = Some(match value[0] {
                0x02 => EfStructure::LinearFixed,
                0x07 => EfStructure::Cyclic,
                0x17 => EfStructure::ComputeService,
                _ => EfStructure::Unknown,
            });
            body.record_count = Some(value[0]);
            body.record_length = Some(value[2]);
        }
        _ => {}
    })?;
    if body.structure.is_none() {
        body.structure = Some(EfStructure::Unknown);
    }
    Ok(body)
}

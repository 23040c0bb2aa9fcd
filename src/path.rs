//! Path navigator (`spec.md` §4.3, `select_file`).
//!
//! Resolves a caller-supplied file-id, application-id, or full path
//! into a selected card object, maintaining the one-entry location
//! cache described in `spec.md` §3.

use crate::apdu::transmit;
use crate::error::StarcosError;
use crate::fci::{self, FileBody, FileKind};
use crate::iso_layer::IsoLayer;
use crate::sw;

/// Caller-supplied path identity, mirroring the three input kinds
/// STARCOS's SELECT FILE accepts (`spec.md` §4.3).
#[derive(Debug, Clone)]
pub enum PathInput {
    FileId([u8; 2]),
    ApplicationId(Vec<u8>),
    /// Raw path bytes, not yet normalized.
    FullPath(Vec<u8>),
}

/// Resolved descriptor for a selected file or directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDescriptor {
    pub kind: FileKind,
    pub id: [u8; 2],
    pub aid: Option<Vec<u8>>,
    pub body: FileBody,
}

impl FileDescriptor {
    fn synthesized_df(id: [u8; 2]) -> Self {
        Self {
            kind: FileKind::Df,
            id,
            aid: None,
            body: FileBody::default(),
        }
    }
}

/// The one-entry location cache bound to a card handle
/// (`spec.md` §3: `{type, bytes, valid_flag}`).
#[derive(Debug, Clone, Default)]
pub enum LocationCache {
    #[default]
    Invalid,
    Path {
        path: Vec<[u8; 2]>,
        descriptor: FileDescriptor,
    },
    Aid {
        aid: Vec<u8>,
        descriptor: FileDescriptor,
    },
}

impl LocationCache {
    /// Invalidate the cache; called whenever a destructive operation
    /// (erase) runs, per `spec.md` §3's invariant.
    pub fn invalidate(&mut self) {
        *self = LocationCache::Invalid;
    }
}

/// Normalize a full-path byte string into its pair-wise representation
/// (`spec.md` §4.3): even length, `<= 6` bytes, always beginning with
/// `3F00` — either because the caller supplied it, or because the
/// navigator auto-prefixed the MF.
///
/// Idempotent (testable property 4): once a path begins with `3F00`,
/// re-normalizing it is a no-op beyond the length checks.
pub fn normalize_path(path: &[u8]) -> Result<Vec<[u8; 2]>, StarcosError> {
    if path.is_empty() || path.len() % 2 != 0 {
        return Err(StarcosError::InvalidArguments(
            "path must have a positive, even length".into(),
        ));
    }
    if path.len() > 6 {
        return Err(StarcosError::InvalidArguments(
            "path must be at most 6 bytes".into(),
        ));
    }
    let mut pairs: Vec<[u8; 2]> = path.chunks_exact(2).map(|c| [c[0], c[1]]).collect();
    let starts_with_mf = pairs[0] == [0x3F, 0x00];
    if path.len() == 6 {
        if !starts_with_mf {
            return Err(StarcosError::InvalidArguments(
                "a 6-byte path must begin with 3F00".into(),
            ));
        }
    } else if !starts_with_mf {
        pairs.insert(0, [0x3F, 0x00]);
        if pairs.len() * 2 > 6 {
            return Err(StarcosError::InvalidArguments(
                "path exceeds 6 bytes after auto-prefixing the MF".into(),
            ));
        }
    }
    Ok(pairs)
}

fn select_discard_fci(iso: &mut dyn IsoLayer, pair: [u8; 2]) -> Result<(), StarcosError> {
    let apdu = [0x00, 0xA4, 0x00, 0x0C, 0x02, pair[0], pair[1]];
    let (sw1, sw2, _) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)
}

/// DF/EF discrimination (`spec.md` §4.3.1). STARCOS does not always
/// return an FCI for DFs, so the navigator has to probe.
fn discriminate_select(iso: &mut dyn IsoLayer, pair: [u8; 2]) -> Result<FileDescriptor, StarcosError> {
    let apdu = [0x00, 0xA4, 0x00, 0x00, 0x02, pair[0], pair[1]];
    let (sw1, sw2, data) = transmit(iso, &apdu)?;

    if sw1 == 0x62 && sw2 == 0x84 {
        // "No FCI" -> a DF. Re-issue with P2=0x0C to complete the select.
        let apdu2 = [0x00, 0xA4, 0x00, 0x0C, 0x02, pair[0], pair[1]];
        let (sw1b, sw2b, _) = transmit(iso, &apdu2)?;
        sw::check(&*iso, sw1b, sw2b)?;
        return Ok(FileDescriptor::synthesized_df(pair));
    }

    if sw1 == 0x90 || sw1 == 0x61 {
        // Probably an EF; disambiguate with a 1-byte READ BINARY.
        let rb = [0x00, 0xB0, 0x00, 0x00, 0x01];
        let (rsw1, rsw2, _) = transmit(iso, &rb)?;
        if rsw1 == 0x69 && rsw2 == 0x86 {
            // "No current EF selected" -> it was a DF after all.
            return Ok(FileDescriptor::synthesized_df(pair));
        }
        let body = fci::process_fci(&data)?;
        return Ok(FileDescriptor {
            kind: FileKind::Ef,
            id: pair,
            aid: None,
            body,
        });
    }

    sw::check(&*iso, sw1, sw2)?;
    Err(StarcosError::Internal(format!(
        "SELECT returned SW={sw1:02X}{sw2:02X} with no applicable discrimination rule"
    )))
}

fn select_by_name(iso: &mut dyn IsoLayer, aid: &[u8]) -> Result<FileDescriptor, StarcosError> {
    if aid.is_empty() || aid.len() > 16 {
        return Err(StarcosError::InvalidArguments(
            "application id must be 1..=16 bytes".into(),
        ));
    }
    let mut apdu = vec![0x00, 0xA4, 0x04, 0x0C, aid.len() as u8];
    apdu.extend_from_slice(aid);
    let (sw1, sw2, _data) = transmit(iso, &apdu)?;
    sw::check(&*iso, sw1, sw2)?;
    Ok(FileDescriptor {
        kind: FileKind::Df,
        id: [0x00, 0x00],
        aid: Some(aid.to_vec()),
        body: FileBody::default(),
    })
}

fn common_prefix_len(cached: &[[u8; 2]], target: &[[u8; 2]]) -> usize {
    cached
        .iter()
        .zip(target.iter())
        .take_while(|(a, b)| a == b)
        .count()
}

/// Path traversal with cache (`spec.md` §4.3.2). `cache` invalid or in
/// AID mode is treated uniformly as "zero pairs known" (`M = 0`),
/// which folds rule 1 ("walk every DF from MF") into the general rule
/// 2/4 prefix-suffix logic.
fn select_path(
    iso: &mut dyn IsoLayer,
    cache: &mut LocationCache,
    pairs: Vec<[u8; 2]>,
) -> Result<FileDescriptor, StarcosError> {
    let l = pairs.len();
    let cached_path: Option<&[[u8; 2]]> = match cache {
        LocationCache::Path { path, .. } => Some(path.as_slice()),
        _ => None,
    };
    let m = cached_path.map(|p| common_prefix_len(p, &pairs)).unwrap_or(0);

    if m == l {
        if let LocationCache::Path { path, descriptor } = cache {
            if path.len() == l {
                log::debug!("location cache hit, zero APDUs issued");
                return Ok(descriptor.clone());
            }
            // Cache is deeper than the requested ancestor: we never
            // actually re-select it, we just synthesize its
            // descriptor (it must be a DF, since it lies on the path
            // to something we did select).
            log::debug!("location cache hit on an ancestor DF, zero APDUs issued");
            return Ok(FileDescriptor::synthesized_df(pairs[l - 1]));
        }
    }

    for pair in &pairs[m..l - 1] {
        select_discard_fci(iso, *pair)?;
    }
    let descriptor = discriminate_select(iso, pairs[l - 1])?;
    *cache = LocationCache::Path {
        path: pairs,
        descriptor: descriptor.clone(),
    };
    Ok(descriptor)
}

/// Resolve `target` to a selected card object, maintaining `cache`.
pub fn select_file(
    iso: &mut dyn IsoLayer,
    cache: &mut LocationCache,
    target: PathInput,
) -> Result<FileDescriptor, StarcosError> {
    match target {
        PathInput::FileId(fid) => discriminate_select(iso, fid),
        PathInput::ApplicationId(aid) => {
            if let LocationCache::Aid {
                aid: cached_aid,
                descriptor,
            } = cache
            {
                if *cached_aid == aid {
                    log::debug!("AID cache hit, zero APDUs issued");
                    return Ok(descriptor.clone());
                }
            }
            let descriptor = select_by_name(iso, &aid)?;
            *cache = LocationCache::Aid {
                aid,
                descriptor: descriptor.clone(),
            };
            Ok(descriptor)
        }
        PathInput::FullPath(raw) => {
            let pairs = normalize_path(&raw)?;
            select_path(iso, cache, pairs)
        }
    }
}

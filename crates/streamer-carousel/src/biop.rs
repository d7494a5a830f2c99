//! Minimal BIOP (Broadcast Inter-ORB Protocol) sub-parser.
//!
//! §1 treats the full BIOP parser as an opaque external collaborator; this
//! module implements only the two shapes `ModuleAssembler` actually reads
//! out of an IOR: the object carousel's id and module id (`BIOP::ObjectLocation`,
//! tag `0x49534F50`), and the association tag that names the stream a
//! component is carried on (`BIOP::ConnBinder`, tag `0x49534F40`). Every
//! other profile body and tap is skipped using its own declared length.

use crate::error::Error;

const TAG_OBJECT_LOCATION: u32 = 0x4953_4F50;
const TAG_CONN_BINDER: u32 = 0x4953_4F40;
const TAG_BIOP_PROFILE: u32 = 0x4953_4F06;

const COMPRESSED_MODULE_DESCRIPTOR: u8 = 0x09;

/// Fields pulled out of a DSI's gateway IOR (§4.6.1).
#[derive(Debug, Clone, Copy, Default)]
pub struct GatewayIor {
    pub carousel_id: u32,
    pub module_id: u16,
    pub assoc_tag: u16,
}

/// A single BIOP/MPEG-2 descriptor, kept verbatim. Only the tag is
/// interpreted by this crate (§4.6.2's compression descriptor); anything
/// else rides along unexamined, matching the DII's "ownership transfer" of
/// the whole descriptor chain onto the `ModuleRecord`.
#[derive(Debug, Clone)]
pub struct Descriptor {
    pub tag: u8,
    pub data: Vec<u8>,
}

impl Descriptor {
    /// Decodes `original_size` out of a tag-`0x09` compressed-module
    /// descriptor body (`compression_method:1, original_size:4`).
    pub fn compressed_original_size(&self) -> Option<u32> {
        if self.tag != COMPRESSED_MODULE_DESCRIPTOR || self.data.len() < 5 {
            return None;
        }
        Some(u32::from_be_bytes([self.data[1], self.data[2], self.data[3], self.data[4]]))
    }
}

/// Fields pulled out of a DII module_info blob (§4.6.1 "add_module_info").
#[derive(Debug, Clone, Default)]
pub struct ModuleInfo {
    pub assoc_tag: u16,
    pub descriptors: Vec<Descriptor>,
}

fn need(data: &[u8], len: usize) -> Result<(), Error> {
    if data.len() < len { Err(Error::BadBiop("truncated")) } else { Ok(()) }
}

fn read_u32(data: &[u8], off: usize) -> Result<u32, Error> {
    need(data, off + 4)?;
    Ok(u32::from_be_bytes([data[off], data[off + 1], data[off + 2], data[off + 3]]))
}

fn read_u16(data: &[u8], off: usize) -> Result<u16, Error> {
    need(data, off + 2)?;
    Ok(u16::from_be_bytes([data[off], data[off + 1]]))
}

/// Parses a tap list: `count:1`, then per tap `id:2, use:2, assoc_tag:2,
/// selector_len:1, selector:selector_len`. Returns the first tap's
/// association tag (the one carrying object/stream data) and the number
/// of bytes consumed.
fn parse_taps(data: &[u8]) -> Result<(u16, usize), Error> {
    need(data, 1)?;
    let count = data[0] as usize;
    let mut off = 1;
    let mut first_tag = 0u16;
    for i in 0..count {
        need(data, off + 7)?;
        let assoc_tag = read_u16(data, off + 4)?;
        if i == 0 {
            first_tag = assoc_tag;
        }
        let selector_len = data[off + 6] as usize;
        off += 7 + selector_len;
        need(data, off)?;
    }
    Ok((first_tag, off))
}

/// Parses the BIOP profile body of a gateway IOR, starting right after the
/// `type_id`/tagged-profile-count header (§4.6.1: "invoke the BIOP IOR
/// parser at DSMCC_BIOP_OFFSET"). Walks profile bodies looking for the
/// `BIOP::ObjectLocation` and `BIOP::ConnBinder` tagged components; any
/// profile that isn't the BIOP profile body is skipped via its declared
/// length.
pub fn parse_gateway_ior(data: &[u8]) -> Result<GatewayIor, Error> {
    need(data, 4)?;
    let type_id_len = read_u32(data, 0)? as usize;
    let mut off = 4 + type_id_len;
    off += padding(type_id_len);

    let profile_count = read_u32(data, off)?;
    off += 4;

    let mut ior = GatewayIor::default();
    for _ in 0..profile_count {
        need(data, off + 9)?;
        let profile_tag = read_u32(data, off)?;
        let profile_len = read_u32(data, off + 4)? as usize;
        let body_start = off + 9; // tag:4 + len:4 + byte_order:1
        need(data, body_start + profile_len.saturating_sub(1))?;

        if profile_tag == TAG_BIOP_PROFILE {
            parse_biop_profile_body(&data[body_start..], &mut ior)?;
        }

        off = body_start + profile_len - 1;
    }

    Ok(ior)
}

fn parse_biop_profile_body(data: &[u8], ior: &mut GatewayIor) -> Result<(), Error> {
    need(data, 1)?;
    let component_count = data[0] as usize;
    let mut off = 1;

    for _ in 0..component_count {
        need(data, off + 5)?;
        let tag = read_u32(data, off)?;
        let len = data[off + 4] as usize;
        let comp_start = off + 5;
        need(data, comp_start + len)?;
        let comp = &data[comp_start..comp_start + len];

        match tag {
            TAG_OBJECT_LOCATION => {
                ior.carousel_id = read_u32(comp, 0)?;
                ior.module_id = read_u16(comp, 4)?;
            }
            TAG_CONN_BINDER => {
                let (tag, _) = parse_taps(comp)?;
                ior.assoc_tag = tag;
            }
            _ => {}
        }

        off = comp_start + len;
    }

    Ok(())
}

/// Parses a DII module_info blob (§4.6.1): `moduleTimeout:4, blockTimeout:4,
/// minBlockTime:4`, a tap list, then `user_info_length:1` followed by a run
/// of `tag:1, length:1, data:length` descriptors.
pub fn parse_module_info(data: &[u8]) -> Result<(ModuleInfo, usize), Error> {
    need(data, 12)?;
    let mut off = 12;

    let (assoc_tag, tap_len) = parse_taps(&data[off..])?;
    off += tap_len;

    need(data, off + 1)?;
    let user_info_len = data[off] as usize;
    off += 1;

    need(data, off + user_info_len)?;
    let mut descriptors = Vec::new();
    let end = off + user_info_len;
    while off < end {
        need(data, off + 2)?;
        let tag = data[off];
        let len = data[off + 1] as usize;
        off += 2;
        need(data, off + len)?;
        descriptors.push(Descriptor { tag, data: data[off..off + len].to_vec() });
        off += len;
    }

    Ok((ModuleInfo { assoc_tag, descriptors }, off))
}

fn padding(len: usize) -> usize {
    (4 - (len % 4)) % 4
}

//! SectionDispatcher (§4.4) and the DSI/DII/DDB sub-parsers (§4.6): the
//! single entry point into the carousel core. One call processes one
//! complete PSI section; the caller ([`crate::host::CarouselHost`]) is
//! responsible for feeding it sections and draining the resulting
//! subscription requests and completed modules.

use crc::{CRC_32_MPEG_2, Crc};
use tracing::{debug, warn};

use crate::biop;
use crate::error::Error;
use crate::module::{self, DdbHeader, DeclaredModule};
use crate::registry::{CarouselRegistry, Gateway};
use crate::subscription::StreamSubscription;

const TABLE_ID_INDICATION: u8 = 0x3B;
const TABLE_ID_DATA: u8 = 0x3C;
const TABLE_ID_DESCRIPTOR: u8 = 0x3D;

/// Standard 8-byte PSI section header: `table_id`, a flags byte carrying
/// `section_syntax_indicator`/`private_indicator`/the length field's high
/// nibble, the length field's low byte, a 16-bit extension, a second flags
/// byte, and the section/last-section numbers (unused here).
const SECTION_HEADER_LEN: usize = 8;
/// DSM-CC generic message header immediately following the section header:
/// `protocol:1, type:1, message_id:2, id_field:4, reserved:1,
/// adaptation_len:1, message_len:2`.
const MSGHDR_LEN: usize = 12;
const BODY_OFFSET: usize = SECTION_HEADER_LEN + MSGHDR_LEN;

const DSMCC_PROTOCOL: u8 = 0x11;
const DSMCC_TYPE: u8 = 0x03;
const MAX_MESSAGE_LEN: u16 = 4076;

const MSG_ID_DSI: u16 = 0x1006;
const MSG_ID_DII: u16 = 0x1002;

/// A module handed off to the external object-cache sink once assembled
/// (§4.6.2 "Hand the assembled module to the external object-cache sink").
#[derive(Debug, Clone)]
pub struct CompletedModule {
    pub carousel_id: u32,
    pub module_id: u16,
    pub data: Vec<u8>,
}

fn need(data: &[u8], len: usize) -> Result<(), Error> {
    if data.len() < len { Err(Error::Truncated) } else { Ok(()) }
}

fn crc32_check(section: &[u8]) -> Result<(), Error> {
    const CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_MPEG_2);
    if CRC.checksum(section) != 0 { Err(Error::BadCrc) } else { Ok(()) }
}

struct SectionHeader {
    table_id: u8,
}

fn parse_section_header(data: &[u8]) -> Result<SectionHeader, Error> {
    need(data, SECTION_HEADER_LEN)?;
    let flags0 = data[1];
    if flags0 & 0x80 == 0 || flags0 & 0x40 != 0 {
        return Err(Error::BadMessageHeader);
    }
    Ok(SectionHeader { table_id: data[0] })
}

struct MessageHeader {
    message_id: u16,
    id_field: u32,
    message_len: u16,
}

fn parse_message_header(data: &[u8]) -> Result<MessageHeader, Error> {
    need(data, MSGHDR_LEN)?;
    let protocol = data[0];
    let msg_type = data[1];
    if protocol != DSMCC_PROTOCOL || msg_type != DSMCC_TYPE {
        return Err(Error::BadMessageHeader);
    }
    let message_id = u16::from_be_bytes([data[2], data[3]]);
    let id_field = u32::from_be_bytes([data[4], data[5], data[6], data[7]]);
    let message_len = u16::from_be_bytes([data[10], data[11]]);
    if message_len > MAX_MESSAGE_LEN {
        return Err(Error::BadMessageHeader);
    }
    Ok(MessageHeader { message_id, id_field, message_len })
}

/// Entry point (§4.4): CRC-checks a raw section, then routes by `data[0]`.
/// `carousel_id` is the logical carousel the host's section filter is
/// attached for (0 if not yet assigned, e.g. the very first DSI). Returns
/// every module that completed as a result of processing this section, for
/// the caller to forward to its object-cache sink.
pub fn process_section(
    registry: &mut CarouselRegistry,
    subscriptions: &mut StreamSubscription,
    data: &[u8],
    carousel_id: u32,
) -> Result<Vec<CompletedModule>, Error> {
    need(data, 3)?;
    let section_len = (((data[1] & 0x0F) as usize) << 8 | data[2] as usize) + 3;
    need(data, section_len)?;
    let section = &data[..section_len];

    if let Err(e) = crc32_check(section) {
        warn!(table_id = section[0], "section CRC32 residue nonzero, dropping");
        return Err(e);
    }

    match section[0] {
        TABLE_ID_INDICATION => {
            process_indication(registry, subscriptions, section, carousel_id)?;
            Ok(Vec::new())
        }
        TABLE_ID_DATA => Ok(process_data(registry, section)?.into_iter().collect()),
        TABLE_ID_DESCRIPTOR => {
            parse_section_header(section)?;
            debug!("descriptor section received (stub, no further processing)");
            Ok(Vec::new())
        }
        other => {
            debug!(table_id = other, "unrecognised section table id, dropping");
            Ok(Vec::new())
        }
    }
}

fn process_indication(
    registry: &mut CarouselRegistry,
    subscriptions: &mut StreamSubscription,
    section: &[u8],
    carousel_id: u32,
) -> Result<(), Error> {
    parse_section_header(section)?;
    let msg = parse_message_header(&section[SECTION_HEADER_LEN..])?;
    let body = &section[BODY_OFFSET..];

    match msg.message_id {
        MSG_ID_DSI => process_gateway(registry, subscriptions, body, carousel_id),
        MSG_ID_DII => process_download_info(registry, subscriptions, body, msg.id_field),
        other => {
            debug!(message_id = other, "unrecognised indication message id, dropping");
            Ok(())
        }
    }
}

/// DSI / Server Gateway (§4.6.1). Body layout: 20-byte server id (skipped),
/// 2-byte compatibility descriptor length (skipped), `data_len:2`, then the
/// BIOP gateway IOR.
fn process_gateway(
    registry: &mut CarouselRegistry,
    subscriptions: &mut StreamSubscription,
    body: &[u8],
    carousel_id: u32,
) -> Result<(), Error> {
    need(body, 24)?;
    let ior_body = &body[24..];
    let ior = biop::parse_gateway_ior(ior_body)?;

    let carousel = registry.find_or_allocate_gateway(carousel_id).ok_or(Error::RegistryFull)?;
    if carousel.gateway.is_some() {
        debug!(carousel_id = carousel.id, "gateway already known, ignoring");
        return Ok(());
    }

    if carousel.id == 0 {
        carousel.id = ior.carousel_id;
    }
    let adopted_id = carousel.id;
    carousel.gateway = Some(Gateway { module_id: ior.module_id, assoc_tag: ior.assoc_tag });

    subscriptions.add(adopted_id, ior.assoc_tag);
    debug!(carousel_id = adopted_id, assoc_tag = ior.assoc_tag, "carousel gateway received");
    Ok(())
}

/// DII / Download Info Indication (§4.6.1). Body layout: `download_id:4,
/// block_size:2`, `window_size:1, ack_period:1, tc_download_window:4,
/// tc_download_scenario:4`, 2-byte compatibility descriptor length (always
/// 0, skipped), `number_modules:2` (20 bytes total), then per module
/// `module_id:2, module_size:4, module_version:1, module_info_len:1` +
/// BIOP module-info blob.
fn process_download_info(
    registry: &mut CarouselRegistry,
    subscriptions: &mut StreamSubscription,
    body: &[u8],
    download_id: u32,
) -> Result<(), Error> {
    need(body, 20)?;
    let block_size = u16::from_be_bytes([body[4], body[5]]);
    let number_modules = u16::from_be_bytes([body[18], body[19]]);

    let Some(carousel) = registry.find_by_id_mut(download_id) else {
        debug!(download_id, "DII for unknown carousel, dropping");
        return Err(Error::UnknownCarousel(download_id));
    };

    let mut off = 20;
    for _ in 0..number_modules {
        need(body, off + 8)?;
        let module_id = u16::from_be_bytes([body[off], body[off + 1]]);
        let module_size =
            u32::from_be_bytes([body[off + 2], body[off + 3], body[off + 4], body[off + 5]]);
        let module_version = body[off + 6];
        let module_info_len = body[off + 7] as usize;
        off += 8;
        need(body, off + module_info_len)?;
        let (info, _consumed) = biop::parse_module_info(&body[off..off + module_info_len])?;
        off += module_info_len;

        let declared = DeclaredModule {
            module_id,
            size: module_size,
            version: module_version,
            assoc_tag: info.assoc_tag,
            descriptors: info.descriptors,
        };
        let outcome = module::add_module_info(carousel, &declared, block_size as u32);
        if !matches!(outcome, module::AddModuleOutcome::Known) {
            subscriptions.add(download_id, declared.assoc_tag);
        }
        debug!(download_id, module_id, version = module_version, ?outcome, "module info processed");
    }
    Ok(())
}

/// DDB / Download Data Block (§4.6.2). Data header at [`BODY_OFFSET`] minus
/// the message header's id field meaning (`download_id` here instead of
/// `transaction_id`); block header follows immediately: `module_id:2,
/// module_version:1, reserved:1, block_number:2`, payload after that, bounded
/// by `block_len = message_len - 6` — the section's own trailing bytes (CRC,
/// stuffing) are not part of the block.
fn process_data(registry: &mut CarouselRegistry, section: &[u8]) -> Result<Option<CompletedModule>, Error> {
    parse_section_header(section)?;
    let msg = parse_message_header(&section[SECTION_HEADER_LEN..])?;
    let download_id = msg.id_field;
    let block = &section[BODY_OFFSET..];
    need(block, 6)?;
    if msg.message_len < 6 {
        return Err(Error::BadMessageHeader);
    }
    let message_len = msg.message_len as usize;
    need(block, message_len)?;

    let module_id = u16::from_be_bytes([block[0], block[1]]);
    let module_version = block[2];
    let block_number = u16::from_be_bytes([block[4], block[5]]);
    let payload = &block[6..message_len];

    let Some(carousel) = registry.find_by_id_mut(download_id) else {
        debug!(download_id, "DDB for unknown carousel, dropping");
        return Ok(None);
    };
    let header = DdbHeader { module_id, module_version, block_number };

    match module::handle_ddb(carousel, header, payload) {
        Ok(module::DdbOutcome::Stored) => Ok(None),
        Ok(module::DdbOutcome::Completed(data)) => {
            debug!(download_id, module_id, bytes = data.len(), "module assembled");
            Ok(Some(CompletedModule { carousel_id: download_id, module_id, data }))
        }
        Err(e) => {
            debug!(download_id, module_id, block_number, error = %e, "DDB dropped");
            Ok(None)
        }
    }
}

//! ModuleAssembler (§4.6): block dedup, in-order block list insertion,
//! reassembly and optional inflate, modelled on `dsmcc_add_module_info` /
//! `dsmcc_add_module_data` in `dsmcc-receiver.c`.

use crate::biop::Descriptor;
use crate::decompress;
use crate::error::ModuleError;
use crate::registry::Carousel;

/// A single received DDB payload, kept in a `Vec` ordered by ascending
/// `block_number`. The original links these as an intrusive singly-linked
/// list (`struct dsmcc_ddb *next`); §9 calls an arena-per-module a cleaner
/// mapping, and a plain ordered `Vec` is the natural Rust rendering of that
/// note for a list that is append/insert-then-drain-once.
#[derive(Debug, Clone)]
struct Block {
    block_number: u16,
    data: Vec<u8>,
}

/// The fields a DII declares about one module (§4.6.1 "parse ... for each
/// module"), before `add_module_info` turns it into (or supersedes) a
/// [`ModuleRecord`].
#[derive(Debug, Clone)]
pub struct DeclaredModule {
    pub module_id: u16,
    pub size: u32,
    pub version: u8,
    pub assoc_tag: u16,
    pub descriptors: Vec<Descriptor>,
}

/// A single DDB's header fields (§3 `DDB`), already split from its payload.
#[derive(Debug, Clone, Copy)]
pub struct DdbHeader {
    pub module_id: u16,
    pub module_version: u8,
    pub block_number: u16,
}

/// Per-module state (§3 `ModuleRecord`).
#[derive(Debug)]
pub struct ModuleRecord {
    pub module_id: u16,
    pub version: u8,
    pub size: u32,
    pub assoc_tag: u16,
    pub cached: bool,
    pub descriptors: Vec<Descriptor>,
    block_size: u32,
    bitmap: Vec<u8>,
    blocks: Vec<Block>,
    curp: u32,
    data: Option<Vec<u8>>,
}

impl ModuleRecord {
    fn new(declared: &DeclaredModule, block_size: u32) -> Self {
        let block_size = block_size.max(1);
        let num_blocks = declared.size.div_ceil(block_size) as usize;
        let bitmap_len = num_blocks.div_ceil(8);
        Self {
            module_id: declared.module_id,
            version: declared.version,
            size: declared.size,
            assoc_tag: declared.assoc_tag,
            cached: false,
            descriptors: declared.descriptors.clone(),
            block_size,
            bitmap: vec![0u8; bitmap_len],
            blocks: Vec::new(),
            curp: 0,
            data: None,
        }
    }

    pub fn assembled_data(&self) -> Option<&[u8]> {
        self.data.as_deref()
    }

    fn block_received(&self, block_number: u16) -> bool {
        let idx = block_number as usize;
        let (byte, bit) = (idx / 8, idx % 8);
        self.bitmap.get(byte).is_some_and(|b| b & (1 << bit) != 0)
    }

    fn mark_block_received(&mut self, block_number: u16) {
        let idx = block_number as usize;
        let (byte, bit) = (idx / 8, idx % 8);
        if let Some(b) = self.bitmap.get_mut(byte) {
            *b |= 1 << bit;
        }
    }

    /// Ordered insertion by `block_number`: head-insert if the list is
    /// empty or the new number is below the current head, else a linear
    /// scan to the insertion point (§4.6.2 step 4). A `Vec` holding a
    /// handful of in-flight blocks makes this the same cost as the
    /// original's linked-list walk without needing node allocation.
    fn insert_block(&mut self, block_number: u16, data: Vec<u8>) {
        let pos = self.blocks.iter().position(|b| b.block_number > block_number).unwrap_or(self.blocks.len());
        self.blocks.insert(pos, Block { block_number, data });
    }
}

/// Outcome of [`add_module_info`] for one declared module (§4.6.1
/// "add_module_info").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddModuleOutcome {
    /// Same id, same version — already known, nothing changed.
    Known,
    /// Same id, different version — prior accumulation dropped, fresh
    /// record appended.
    Superseded,
    /// No record for this id existed yet — fresh record appended.
    Added,
}

/// Walks `carousel`'s module list for `declared` (§4.6.1): known/superseded/
/// appended. Returns the outcome and, for `Superseded`/`Added`, whether the
/// caller should emit a `StreamRequest(carousel_id, assoc_tag)` — the
/// original only does this for a freshly appended record, which both a
/// brand-new module and a version bump are.
pub fn add_module_info(carousel: &mut Carousel, declared: &DeclaredModule, block_size: u32) -> AddModuleOutcome {
    let modules = carousel.modules_mut();
    if let Some(pos) = modules.iter().position(|m| m.module_id == declared.module_id) {
        if modules[pos].version == declared.version {
            return AddModuleOutcome::Known;
        }
        modules.remove(pos);
        modules.push(ModuleRecord::new(declared, block_size));
        return AddModuleOutcome::Superseded;
    }
    modules.push(ModuleRecord::new(declared, block_size));
    AddModuleOutcome::Added
}

/// Result of delivering one DDB (§4.6.2 "Completion").
#[derive(Debug)]
pub enum DdbOutcome {
    /// Block stored; module not yet complete.
    Stored,
    /// This block completed the module. The module's assembled (and, if a
    /// compression descriptor was present, inflated) bytes are included for
    /// the caller to hand to the object-cache sink.
    Completed(Vec<u8>),
}

/// Applies one DDB to its module (§4.6.2). Every early return is one of the
/// four section-level drop conditions in order: unknown module, already
/// cached, stale version, duplicate block.
pub fn handle_ddb(carousel: &mut Carousel, header: DdbHeader, payload: &[u8]) -> Result<DdbOutcome, ModuleError> {
    let modules = carousel.modules_mut();
    let pos = modules.iter().position(|m| m.module_id == header.module_id).ok_or(ModuleError::NotFound)?;
    let record = &mut modules[pos];

    if record.cached {
        return Err(ModuleError::AlreadyCached);
    }
    if record.version != header.module_version {
        return Err(ModuleError::StaleVersion);
    }
    if record.block_received(header.block_number) {
        return Err(ModuleError::DuplicateBlock);
    }

    record.insert_block(header.block_number, payload.to_vec());
    record.mark_block_received(header.block_number);
    record.curp += payload.len() as u32;

    if record.curp < record.size {
        return Ok(DdbOutcome::Stored);
    }

    let mut assembled = Vec::with_capacity(record.size as usize);
    for block in record.blocks.drain(..) {
        assembled.extend_from_slice(&block.data);
    }

    let inflated = match record.descriptors.iter().find_map(|d| d.compressed_original_size()) {
        Some(original_size) => match decompress::uncompress(&assembled, original_size as usize + 1) {
            Ok(inflated) => inflated,
            Err(_) => {
                // §4.6.2: abandon the module, clearing curp, the bitmap and
                // data so a rebroadcast of its blocks can retry reassembly
                // from scratch — the blocks just drained above are gone, so
                // the bitmap bits marking them received must go with them.
                record.curp = 0;
                record.data = None;
                record.bitmap.fill(0);
                return Ok(DdbOutcome::Stored);
            }
        },
        None => assembled,
    };

    record.data = Some(inflated.clone());
    record.cached = true;
    Ok(DdbOutcome::Completed(inflated))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::CarouselRegistry;

    fn declared(module_id: u16, size: u32, version: u8) -> DeclaredModule {
        DeclaredModule { module_id, size, version, assoc_tag: 9, descriptors: Vec::new() }
    }

    #[test]
    fn add_module_info_appends_then_recognises_known() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();

        let outcome = add_module_info(carousel, &declared(1, 300, 1), 128);
        assert_eq!(outcome, AddModuleOutcome::Added);

        let outcome = add_module_info(carousel, &declared(1, 300, 1), 128);
        assert_eq!(outcome, AddModuleOutcome::Known);
        assert_eq!(carousel.modules().len(), 1);
    }

    #[test]
    fn add_module_info_version_bump_supersedes() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();

        add_module_info(carousel, &declared(1, 300, 1), 128);
        let outcome = add_module_info(carousel, &declared(1, 300, 2), 128);
        assert_eq!(outcome, AddModuleOutcome::Superseded);
        assert_eq!(carousel.modules().len(), 1);
        assert_eq!(carousel.find_module(1).unwrap().version, 2);
    }

    #[test]
    fn ddb_reassembles_in_order_and_reports_completion() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();
        add_module_info(carousel, &declared(1, 9, 1), 3);

        let hdr = |block_number| DdbHeader { module_id: 1, module_version: 1, block_number };
        assert!(matches!(handle_ddb(carousel, hdr(0), b"AAA").unwrap(), DdbOutcome::Stored));
        assert!(matches!(handle_ddb(carousel, hdr(1), b"BBB").unwrap(), DdbOutcome::Stored));
        match handle_ddb(carousel, hdr(2), b"CCC").unwrap() {
            DdbOutcome::Completed(data) => assert_eq!(data, b"AAABBBCCC"),
            DdbOutcome::Stored => panic!("expected completion"),
        }
        assert!(carousel.find_module(1).unwrap().cached);
    }

    #[test]
    fn ddb_reassembles_out_of_order_identically() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();
        add_module_info(carousel, &declared(1, 9, 1), 3);

        let hdr = |block_number| DdbHeader { module_id: 1, module_version: 1, block_number };
        handle_ddb(carousel, hdr(2), b"CCC").unwrap();
        handle_ddb(carousel, hdr(1), b"BBB").unwrap();
        match handle_ddb(carousel, hdr(0), b"AAA").unwrap() {
            DdbOutcome::Completed(data) => assert_eq!(data, b"AAABBBCCC"),
            DdbOutcome::Stored => panic!("expected completion"),
        }
    }

    #[test]
    fn duplicate_ddb_is_rejected_without_double_counting() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();
        add_module_info(carousel, &declared(1, 9, 1), 3);

        let hdr = DdbHeader { module_id: 1, module_version: 1, block_number: 0 };
        handle_ddb(carousel, hdr, b"AAA").unwrap();
        assert_eq!(handle_ddb(carousel, hdr, b"AAA").unwrap_err(), ModuleError::DuplicateBlock);
        assert_eq!(carousel.find_module(1).unwrap().curp, 3);
    }

    #[test]
    fn ddb_at_superseded_version_is_rejected() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();
        add_module_info(carousel, &declared(1, 9, 1), 3);
        add_module_info(carousel, &declared(1, 9, 2), 3);

        let stale = DdbHeader { module_id: 1, module_version: 1, block_number: 0 };
        assert_eq!(handle_ddb(carousel, stale, b"AAA").unwrap_err(), ModuleError::StaleVersion);

        let fresh = DdbHeader { module_id: 1, module_version: 2, block_number: 0 };
        assert!(matches!(handle_ddb(carousel, fresh, b"AAA").unwrap(), DdbOutcome::Stored));
    }

    #[test]
    fn ddb_for_unknown_module_is_not_found() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();

        let hdr = DdbHeader { module_id: 99, module_version: 1, block_number: 0 };
        assert_eq!(handle_ddb(carousel, hdr, b"AAA").unwrap_err(), ModuleError::NotFound);
    }

    #[test]
    fn ddb_after_cached_is_rejected() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();
        add_module_info(carousel, &declared(1, 3, 1), 3);

        let hdr = DdbHeader { module_id: 1, module_version: 1, block_number: 0 };
        handle_ddb(carousel, hdr, b"AAA").unwrap();
        assert!(carousel.find_module(1).unwrap().cached);
        assert_eq!(handle_ddb(carousel, hdr, b"AAA").unwrap_err(), ModuleError::AlreadyCached);
    }

    #[test]
    fn failed_decompress_clears_bitmap_so_a_rebroadcast_can_reassemble() {
        let mut registry = CarouselRegistry::new();
        registry.allocate_for(7);
        let carousel = registry.find_by_id_mut(7).unwrap();

        // compression_method:1, original_size:4 — garbage payload, not
        // valid zlib, so the completing DDB below fails to inflate.
        let compressed_descriptor = Descriptor { tag: 0x09, data: vec![0, 0, 0, 1, 44] };
        let declared = DeclaredModule {
            module_id: 1,
            size: 9,
            version: 1,
            assoc_tag: 9,
            descriptors: vec![compressed_descriptor],
        };
        add_module_info(carousel, &declared, 3);

        let hdr = |block_number| DdbHeader { module_id: 1, module_version: 1, block_number };
        assert!(matches!(handle_ddb(carousel, hdr(0), b"AAA").unwrap(), DdbOutcome::Stored));
        assert!(matches!(handle_ddb(carousel, hdr(1), b"BBB").unwrap(), DdbOutcome::Stored));
        // Completing block: inflate fails, module is abandoned rather than
        // cached.
        assert!(matches!(handle_ddb(carousel, hdr(2), b"CCC").unwrap(), DdbOutcome::Stored));

        let record = carousel.find_module(1).unwrap();
        assert!(!record.cached);
        assert_eq!(record.curp, 0);
        assert!(record.assembled_data().is_none());

        // A rebroadcast of the same blocks must be accepted again, not
        // rejected as duplicates.
        assert!(matches!(handle_ddb(carousel, hdr(0), b"AAA").unwrap(), DdbOutcome::Stored));
        assert!(matches!(handle_ddb(carousel, hdr(1), b"BBB").unwrap(), DdbOutcome::Stored));
        assert!(matches!(handle_ddb(carousel, hdr(2), b"CCC").unwrap(), DdbOutcome::Stored));
    }
}

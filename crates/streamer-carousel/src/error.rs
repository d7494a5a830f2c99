use thiserror::Error;

/// Section-level errors (§7): every variant here means "drop the section,
/// leave all carousel/module state untouched, log and move on" — none of
/// them propagate past [`crate::dispatch::process_section`].
#[derive(Error, Debug)]
pub enum Error {
    #[error("section shorter than its own declared length")]
    Truncated,
    #[error("section CRC32 residue is nonzero")]
    BadCrc,
    #[error("DSM-CC message header failed validation (bad protocol/type/length)")]
    BadMessageHeader,
    #[error("section references carousel {0} which is not registered")]
    UnknownCarousel(u32),
    #[error("no free carousel registry slot")]
    RegistryFull,
    #[error("BIOP structure truncated or malformed: {0}")]
    BadBiop(&'static str),
}

/// Module-reassembly outcomes that aren't section-level errors but still
/// mean "do nothing more with this block/module" (§4.6.2).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleError {
    #[error("module not yet announced by a DII")]
    NotFound,
    #[error("module already fully assembled and cached")]
    AlreadyCached,
    #[error("block belongs to a version superseded by a newer DII")]
    StaleVersion,
    #[error("duplicate block, already received")]
    DuplicateBlock,
}

/// `uncompress()`'s failure outcomes (§4.6.2 lists `Z_DATA_ERROR`,
/// `Z_BUF_ERROR` and `Z_MEM_ERROR`, all three handled identically —
/// free both buffers and abandon the module). `flate2`'s own
/// [`flate2::Decompress`] only ever distinguishes a malformed stream from
/// an undersized output buffer, so those collapse to the two variants here.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecompressError {
    #[error("compressed module data is invalid")]
    DataError,
    #[error("output buffer too small for decompressed module")]
    BufError,
}

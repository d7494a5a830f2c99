//! The `uncompress()` collaborator (§4.6.2), backed by `flate2`'s zlib
//! inflate instead of an opaque external call.

use flate2::{Decompress, FlushDecompress, Status};

use crate::error::DecompressError;

/// Inflates a zlib-wrapped `src` into a freshly allocated buffer sized
/// `expected_len` (the compressed module descriptor's `original_size`).
/// Mirrors zlib's `uncompress(dest, &dest_len, src, src_len)`: `Z_DATA_ERROR`
/// and `Z_BUF_ERROR`/`Z_MEM_ERROR` collapse to the two variants callers
/// already have to handle identically (§4.6.2 frees both buffers and
/// abandons the module either way).
pub fn uncompress(src: &[u8], expected_len: usize) -> Result<Vec<u8>, DecompressError> {
    let mut dest = vec![0u8; expected_len];
    let mut inflater = Decompress::new(true);

    match inflater.decompress(src, &mut dest, FlushDecompress::Finish) {
        Ok(Status::Ok) => {
            // expected_len was `original_size + 1` headroom (§4.6.2); trim
            // back to what was actually produced.
            dest.truncate(inflater.total_out() as usize);
            Ok(dest)
        }
        Ok(Status::StreamEnd) => {
            dest.truncate(inflater.total_out() as usize);
            Ok(dest)
        }
        Ok(Status::BufError) => Err(DecompressError::BufError),
        Err(_) => Err(DecompressError::DataError),
    }
}

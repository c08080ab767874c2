//! Handle encoding and self-validation.
//!
//! The checksum is CRC-64 (ECMA-182) over the first eight bytes of the wire
//! layout, so any peer holding the raw 128 bits can recompute it without
//! access to the issuing store.

use crc_any::CRCu64;

use crate::handle::{CHECKSUM_OFFSET, Handle};

/// Format version stamped into every handle minted by this library.
pub const FORMAT_VERSION: u8 = 1;

/// Serialize the checksummed fields in wire order.
pub(crate) fn header_bytes(fid: u32, reuse: u16, root: u8, version: u8) -> [u8; CHECKSUM_OFFSET] {
    let mut out = [0u8; CHECKSUM_OFFSET];
    out[0..4].copy_from_slice(&fid.to_le_bytes());
    out[4..6].copy_from_slice(&reuse.to_le_bytes());
    out[6] = root;
    out[7] = version;
    out
}

/// Checksum over `{fid, reuse_counter, root, format_version}`.
pub fn checksum(fid: u32, reuse: u16, root: u8, version: u8) -> u64 {
    let mut crc = CRCu64::crc64();
    crc.digest(&header_bytes(fid, reuse, root, version));
    crc.get_crc()
}

/// Build a handle for slot `fid` at reuse count `reuse`, owned by `root`.
pub fn encode(fid: u32, reuse: u16, root: u8) -> Handle {
    Handle {
        fid,
        reuse,
        root,
        version: FORMAT_VERSION,
        checksum: checksum(fid, reuse, root, FORMAT_VERSION),
    }
}

/// Recompute the checksum of `handle` and compare it with the carried one.
pub fn verify_checksum(handle: &Handle) -> bool {
    recompute(handle) == handle.checksum
}

/// Whether `handle` was produced under the supported format version.
pub fn verify_format_version(handle: &Handle) -> bool {
    handle.version == FORMAT_VERSION
}

pub(crate) fn recompute(handle: &Handle) -> u64 {
    checksum(handle.fid, handle.reuse, handle.root, handle.version)
}

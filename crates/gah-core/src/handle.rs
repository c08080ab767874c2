//! Global access handle.
//!
//! A handle names a slot in a [`HandleStore`](crate::HandleStore) and travels
//! between processes as 16 raw bytes:
//!
//! ```text
//! [ fid (4) ][ reuse (2) ][ root (1) ][ version (1) ][ checksum (8) ]
//! ```
//!
//! All multi-byte fields are little-endian. Any change to this layout or to
//! [`FORMAT_VERSION`](crate::FORMAT_VERSION) is a protocol break.

use core::fmt;

use crate::codec;
use crate::error::{GahError, Result};

/// Size of an encoded handle in bytes.
pub const HANDLE_SIZE: usize = 16;

const FID_OFFSET: usize = 0;
const REUSE_OFFSET: usize = 4;
const ROOT_OFFSET: usize = 6;
const VERSION_OFFSET: usize = 7;
pub(crate) const CHECKSUM_OFFSET: usize = 8;

/// Opaque 128-bit handle minted by a [`HandleStore`](crate::HandleStore).
///
/// Handles are plain values: copying one does not extend the life of the slot
/// it names. Fields are read-only outside this crate.
#[repr(C)]
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Handle {
    pub(crate) fid: u32,
    pub(crate) reuse: u16,
    pub(crate) root: u8,
    pub(crate) version: u8,
    pub(crate) checksum: u64,
}

const _: () = assert!(core::mem::size_of::<Handle>() == HANDLE_SIZE);

/// Outcome of [`Handle::is_self_root`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    /// The caller is the handle's declared owner.
    Root,
    /// Another participant owns the handle.
    NotRoot,
}

impl Handle {
    /// The all-zero handle. Never minted by a store.
    pub const NULL: Handle = Handle {
        fid: 0,
        reuse: 0,
        root: 0,
        version: 0,
        checksum: 0,
    };

    /// Whether this is [`Handle::NULL`].
    pub fn is_null(&self) -> bool {
        *self == Self::NULL
    }

    /// Slot index.
    pub fn fid(&self) -> u32 {
        self.fid
    }

    /// Reuse count of the slot at the time the handle was minted.
    pub fn reuse_counter(&self) -> u16 {
        self.reuse
    }

    /// Owner tag set at allocation.
    pub fn root(&self) -> u8 {
        self.root
    }

    /// Format version the handle was encoded under.
    pub fn format_version(&self) -> u8 {
        self.version
    }

    /// Checksum carried by the handle.
    pub fn checksum(&self) -> u64 {
        self.checksum
    }

    /// Wire encoding.
    pub fn to_bytes(&self) -> [u8; HANDLE_SIZE] {
        let mut out = [0u8; HANDLE_SIZE];
        out[..CHECKSUM_OFFSET].copy_from_slice(&codec::header_bytes(
            self.fid,
            self.reuse,
            self.root,
            self.version,
        ));
        out[CHECKSUM_OFFSET..].copy_from_slice(&self.checksum.to_le_bytes());
        out
    }

    /// Decode a handle from its wire encoding.
    ///
    /// Decoding does not validate; call [`check_crc`](Self::check_crc) and
    /// [`check_format_version`](Self::check_format_version) on untrusted input.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let bytes: &[u8; HANDLE_SIZE] = bytes
            .try_into()
            .map_err(|_| GahError::InvalidParameter("handle must be exactly 16 bytes"))?;
        Ok(Self::decode(bytes))
    }

    fn decode(bytes: &[u8; HANDLE_SIZE]) -> Self {
        Self {
            fid: u32::from_le_bytes([
                bytes[FID_OFFSET],
                bytes[FID_OFFSET + 1],
                bytes[FID_OFFSET + 2],
                bytes[FID_OFFSET + 3],
            ]),
            reuse: u16::from_le_bytes([bytes[REUSE_OFFSET], bytes[REUSE_OFFSET + 1]]),
            root: bytes[ROOT_OFFSET],
            version: bytes[VERSION_OFFSET],
            checksum: u64::from_le_bytes([
                bytes[CHECKSUM_OFFSET],
                bytes[CHECKSUM_OFFSET + 1],
                bytes[CHECKSUM_OFFSET + 2],
                bytes[CHECKSUM_OFFSET + 3],
                bytes[CHECKSUM_OFFSET + 4],
                bytes[CHECKSUM_OFFSET + 5],
                bytes[CHECKSUM_OFFSET + 6],
                bytes[CHECKSUM_OFFSET + 7],
            ]),
        }
    }

    /// The wire encoding read as a little-endian integer.
    pub fn to_u128(&self) -> u128 {
        u128::from_le_bytes(self.to_bytes())
    }

    /// Inverse of [`to_u128`](Self::to_u128).
    pub fn from_u128(raw: u128) -> Self {
        Self::decode(&raw.to_le_bytes())
    }

    /// Parse the hex form produced by `{:x}`: the 16 wire bytes, two digits
    /// each, in wire order. A `0x` prefix is accepted.
    pub fn parse_hex(text: &str) -> Result<Self> {
        let digits = text.trim();
        let digits = digits.strip_prefix("0x").unwrap_or(digits);
        if digits.len() != 2 * HANDLE_SIZE {
            return Err(GahError::InvalidParameter("handle hex must be 32 digits"));
        }
        if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(GahError::InvalidParameter("handle hex contains a non-hex digit"));
        }
        let mut bytes = [0u8; HANDLE_SIZE];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&digits[2 * i..2 * i + 2], 16)
                .map_err(|_| GahError::InvalidParameter("handle hex contains a non-hex digit"))?;
        }
        Ok(Self::decode(&bytes))
    }

    /// Verify the embedded checksum.
    pub fn check_crc(&self) -> Result<()> {
        if self.is_null() {
            return Err(GahError::InvalidParameter("null handle"));
        }
        let expected = codec::recompute(self);
        if expected != self.checksum {
            return Err(GahError::ChecksumMismatch {
                expected,
                found: self.checksum,
            });
        }
        Ok(())
    }

    /// Verify the format version against [`FORMAT_VERSION`](crate::FORMAT_VERSION).
    pub fn check_format_version(&self) -> Result<()> {
        if self.is_null() {
            return Err(GahError::InvalidParameter("null handle"));
        }
        if !codec::verify_format_version(self) {
            return Err(GahError::VersionMismatch {
                expected: codec::FORMAT_VERSION,
                found: self.version,
            });
        }
        Ok(())
    }

    /// Whether `caller` is the owner recorded in this handle.
    ///
    /// A differing tag is an ordinary answer, not an error.
    pub fn is_self_root(&self, caller: u8) -> Result<Ownership> {
        if self.is_null() {
            return Err(GahError::InvalidParameter("null handle"));
        }
        Ok(if self.root == caller {
            Ownership::Root
        } else {
            Ownership::NotRoot
        })
    }

    /// Human-readable rendering for logs; `None` for the null handle.
    pub fn describe(&self) -> Option<String> {
        if self.is_null() {
            None
        } else {
            Some(self.to_string())
        }
    }

    /// Compact `gah(<fid>.<reuse>)` form for per-request log lines.
    pub fn short(&self) -> String {
        format!("gah({}.{})", self.fid, self.reuse)
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "fid: {} reuse: {} root: {} version: {} checksum: {:016x} CRC {}",
            self.fid,
            self.reuse,
            self.root,
            self.version,
            self.checksum,
            if codec::verify_checksum(self) {
                "match"
            } else {
                "mismatch"
            }
        )
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("fid", &self.fid)
            .field("reuse", &self.reuse)
            .field("root", &self.root)
            .field("version", &self.version)
            .field("checksum", &format_args!("{:#018x}", self.checksum))
            .finish()
    }
}

/// Wire bytes in wire order, two digits each, so the text matches a hex dump
/// of a captured handle.
impl fmt::LowerHex for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.to_bytes() {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

//! Error taxonomy for handle validation and store management.

use thiserror::Error;

/// Errors returned by the handle codec and the handle store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GahError {
    /// A required input was missing, e.g. the null handle.
    #[error("invalid parameter: {0}")]
    InvalidParameter(&'static str),

    /// The handle's checksum does not match its other fields.
    #[error("checksum mismatch: computed {expected:#018x}, handle carries {found:#018x}")]
    ChecksumMismatch {
        /// Checksum recomputed over the handle fields.
        expected: u64,
        /// Checksum carried by the handle.
        found: u64,
    },

    /// The handle was produced under a different format version.
    #[error("format version mismatch: supported {expected}, handle carries {found}")]
    VersionMismatch {
        /// Version supported by this library.
        expected: u8,
        /// Version carried by the handle.
        found: u8,
    },

    /// The handle was never allocated, was already freed, or its slot was recycled.
    #[error("stale or unknown handle (fid {fid})")]
    StaleOrUnknownHandle {
        /// Slot index named by the handle.
        fid: u32,
    },

    /// The store still holds live handles.
    #[error("{outstanding} handles still allocated")]
    HandlesOutstanding {
        /// Number of live handles.
        outstanding: usize,
    },

    /// The slot table could not reserve memory.
    #[error("out of memory growing the slot table")]
    OutOfMemory,

    /// Every fid is in use.
    #[error("fid space exhausted ({max_slots} slots)")]
    Exhausted {
        /// Configured slot limit.
        max_slots: usize,
    },

    /// The store configuration is inconsistent.
    #[error("invalid store configuration: {0}")]
    InvalidConfig(String),
}

/// Payload-free category of a [`GahError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// See [`GahError::InvalidParameter`].
    InvalidParameter,
    /// See [`GahError::ChecksumMismatch`].
    ChecksumMismatch,
    /// See [`GahError::VersionMismatch`].
    VersionMismatch,
    /// See [`GahError::StaleOrUnknownHandle`].
    StaleOrUnknownHandle,
    /// See [`GahError::HandlesOutstanding`].
    HandlesOutstanding,
    /// See [`GahError::OutOfMemory`].
    OutOfMemory,
    /// See [`GahError::Exhausted`].
    Exhausted,
    /// See [`GahError::InvalidConfig`].
    InvalidConfig,
}

impl GahError {
    /// Category of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            GahError::InvalidParameter(_) => ErrorKind::InvalidParameter,
            GahError::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            GahError::VersionMismatch { .. } => ErrorKind::VersionMismatch,
            GahError::StaleOrUnknownHandle { .. } => ErrorKind::StaleOrUnknownHandle,
            GahError::HandlesOutstanding { .. } => ErrorKind::HandlesOutstanding,
            GahError::OutOfMemory => ErrorKind::OutOfMemory,
            GahError::Exhausted { .. } => ErrorKind::Exhausted,
            GahError::InvalidConfig(_) => ErrorKind::InvalidConfig,
        }
    }
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, GahError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = GahError::StaleOrUnknownHandle { fid: 7 };
        assert_eq!(err.kind(), ErrorKind::StaleOrUnknownHandle);
        assert_eq!(err.to_string(), "stale or unknown handle (fid 7)");

        let err = GahError::ChecksumMismatch {
            expected: 1,
            found: 2,
        };
        assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
        assert!(err.to_string().contains("0x0000000000000001"));
    }
}

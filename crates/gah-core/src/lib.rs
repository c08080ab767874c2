#![deny(unsafe_code)]
#![warn(missing_docs)]

//! Generation address handles: self-validating 128-bit handles and the
//! process-local store that mints and recycles them.

pub mod codec;
mod config;
mod error;
mod handle;
mod slab;
mod store;

pub use codec::FORMAT_VERSION;
pub use config::{DEFAULT_CAPACITY, DEFAULT_GROWTH, MAX_SLOTS, StoreConfig};
pub use error::{ErrorKind, GahError, Result};
pub use handle::{HANDLE_SIZE, Handle, Ownership};
pub use store::{AllocError, DestroyError, HandleStore, StoreStats};

//! Handle store: the allocator that mints and validates handles.
//!
//! All slot-table mutation happens under one mutex. The lock is never held
//! across I/O; the longest critical section is a growth reservation.

use core::fmt;

use gah_metrics::Counter;
use parking_lot::Mutex;
use serde::Serialize;

use crate::codec;
use crate::config::StoreConfig;
use crate::error::{ErrorKind, GahError, Result};
use crate::handle::Handle;
use crate::slab::SlotTable;

/// Process-local allocator of [`Handle`]s.
///
/// The store holds one caller-supplied payload `P` per live handle. It never
/// inspects or releases a payload: `allocate` takes it, `get_info` returns a
/// copy, and `deallocate` hands it back.
pub struct HandleStore<P> {
    table: Mutex<SlotTable<P>>,
    counters: Counters,
}

#[derive(Debug, Default)]
struct Counters {
    allocations: Counter,
    deallocations: Counter,
    rejected_checksum: Counter,
    rejected_version: Counter,
    rejected_stale: Counter,
    rejected_invalid: Counter,
}

/// Point-in-time statistics of a [`HandleStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    /// Live handles.
    pub live: usize,
    /// Slots ever created.
    pub table_len: usize,
    /// Slots waiting on the free list.
    pub free: usize,
    /// Slots the table can hold without growing.
    pub capacity: usize,
    /// Successful allocations.
    pub allocations: u64,
    /// Successful deallocations.
    pub deallocations: u64,
    /// Handles rejected for a checksum mismatch.
    pub rejected_checksum: u64,
    /// Handles rejected for a format version mismatch.
    pub rejected_version: u64,
    /// Handles rejected as stale or unknown.
    pub rejected_stale: u64,
    /// Null handles presented to the store.
    pub rejected_invalid: u64,
}

/// Failed [`HandleStore::allocate`]. Carries the payload back to the caller.
pub struct AllocError<P> {
    error: GahError,
    payload: P,
}

impl<P> AllocError<P> {
    /// Why the allocation failed.
    pub fn error(&self) -> &GahError {
        &self.error
    }

    /// Recover the payload that was not stored.
    pub fn into_payload(self) -> P {
        self.payload
    }
}

impl<P> fmt::Debug for AllocError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AllocError")
            .field("error", &self.error)
            .finish_non_exhaustive()
    }
}

impl<P> fmt::Display for AllocError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "allocation failed: {}", self.error)
    }
}

impl<P> std::error::Error for AllocError<P> {}

impl<P> From<AllocError<P>> for GahError {
    fn from(err: AllocError<P>) -> Self {
        err.error
    }
}

/// Refused [`HandleStore::destroy`]. Gives the untouched store back.
pub struct DestroyError<P> {
    store: HandleStore<P>,
    outstanding: usize,
}

impl<P> DestroyError<P> {
    /// Live handles at the time of the attempt.
    pub fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Take the store back to drain it.
    pub fn into_store(self) -> HandleStore<P> {
        self.store
    }
}

impl<P> fmt::Debug for DestroyError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DestroyError")
            .field("outstanding", &self.outstanding)
            .finish_non_exhaustive()
    }
}

impl<P> fmt::Display for DestroyError<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cannot destroy handle store: {} handles still allocated",
            self.outstanding
        )
    }
}

impl<P> std::error::Error for DestroyError<P> {}

impl<P> From<DestroyError<P>> for GahError {
    fn from(err: DestroyError<P>) -> Self {
        GahError::HandlesOutstanding {
            outstanding: err.outstanding,
        }
    }
}

impl<P> HandleStore<P> {
    /// Create an empty store.
    pub fn new(config: StoreConfig) -> Result<Self> {
        config.validate()?;
        let table = SlotTable::new(&config)?;
        tracing::info!(
            initial_capacity = config.initial_capacity,
            growth_increment = config.growth_increment,
            max_slots = config.max_slots,
            "handle store created"
        );
        Ok(Self {
            table: Mutex::new(table),
            counters: Counters::default(),
        })
    }

    /// Create an empty store with default settings and a capacity hint.
    pub fn with_capacity(initial_capacity: usize) -> Result<Self> {
        Self::new(StoreConfig::with_capacity(initial_capacity))
    }

    /// Tear the store down.
    ///
    /// Refuses while any handle is live: remote peers may still hold those
    /// handles, and payloads belong to the caller. The store comes back inside
    /// the error untouched.
    pub fn destroy(self) -> core::result::Result<(), DestroyError<P>> {
        let outstanding = self.len();
        if outstanding != 0 {
            tracing::warn!(outstanding, "refusing to destroy handle store with live handles");
            return Err(DestroyError {
                store: self,
                outstanding,
            });
        }
        tracing::info!(
            allocations = self.counters.allocations.get(),
            "handle store destroyed"
        );
        Ok(())
    }

    /// Store `payload` and mint a handle for it owned by `root`.
    pub fn allocate(&self, root: u8, payload: P) -> core::result::Result<Handle, AllocError<P>> {
        let inserted = self.table.lock().insert(root, payload);
        match inserted {
            Ok((fid, reuse)) => {
                self.counters.allocations.inc();
                let handle = codec::encode(fid, reuse, root);
                tracing::debug!(
                    fid,
                    reuse,
                    root,
                    wire = format_args!("{handle:x}"),
                    "handle allocated"
                );
                Ok(handle)
            }
            Err((error, payload)) => {
                tracing::warn!(root, %error, "handle allocation failed");
                Err(AllocError { error, payload })
            }
        }
    }

    /// Release the slot named by `handle` and return its payload.
    ///
    /// Fails for stale, foreign, double-freed or corrupt handles; the slot is
    /// left untouched in that case.
    pub fn deallocate(&self, handle: &Handle) -> Result<P> {
        let result = {
            let mut table = self.table.lock();
            Self::validate(&table, handle).and_then(|()| {
                table
                    .remove(handle.fid, handle.reuse)
                    .ok_or(GahError::StaleOrUnknownHandle { fid: handle.fid })
            })
        };
        let payload = self.record("deallocate", handle, result)?;
        self.counters.deallocations.inc();
        tracing::debug!(fid = handle.fid, reuse = handle.reuse, "handle deallocated");
        Ok(payload)
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.table.lock().live()
    }

    /// Whether no handle is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of slots ever created; every live fid is below this.
    pub fn table_len(&self) -> usize {
        self.table.lock().len()
    }

    /// Slots the table can hold without growing.
    pub fn capacity(&self) -> usize {
        self.table.lock().capacity()
    }

    /// Handles for every live slot, in fid order.
    pub fn outstanding(&self) -> Vec<Handle> {
        self.table
            .lock()
            .live_slots()
            .map(|(fid, reuse, owner)| codec::encode(fid, reuse, owner))
            .collect()
    }

    /// Snapshot of table occupancy and event counters.
    pub fn stats(&self) -> StoreStats {
        let (live, table_len, free, capacity) = {
            let table = self.table.lock();
            (table.live(), table.len(), table.free(), table.capacity())
        };
        StoreStats {
            live,
            table_len,
            free,
            capacity,
            allocations: self.counters.allocations.get(),
            deallocations: self.counters.deallocations.get(),
            rejected_checksum: self.counters.rejected_checksum.get(),
            rejected_version: self.counters.rejected_version.get(),
            rejected_stale: self.counters.rejected_stale.get(),
            rejected_invalid: self.counters.rejected_invalid.get(),
        }
    }

    /// Stateless checks plus the range check; liveness is left to the caller.
    fn validate(table: &SlotTable<P>, handle: &Handle) -> Result<()> {
        if handle.is_null() {
            return Err(GahError::InvalidParameter("null handle"));
        }
        if handle.fid as usize >= table.len() {
            return Err(GahError::StaleOrUnknownHandle { fid: handle.fid });
        }
        handle.check_crc()?;
        handle.check_format_version()
    }

    fn record<T>(&self, op: &'static str, handle: &Handle, result: Result<T>) -> Result<T> {
        if let Err(err) = &result {
            let counter = match err.kind() {
                ErrorKind::ChecksumMismatch => &self.counters.rejected_checksum,
                ErrorKind::VersionMismatch => &self.counters.rejected_version,
                ErrorKind::StaleOrUnknownHandle => &self.counters.rejected_stale,
                _ => &self.counters.rejected_invalid,
            };
            counter.inc();
            // Stale handles log at debug; corrupt or skewed ones warn.
            match err.kind() {
                ErrorKind::StaleOrUnknownHandle => {
                    tracing::debug!(op, handle = %handle.short(), "rejected handle: {err}")
                }
                kind => tracing::warn!(
                    op,
                    wire = format_args!("{handle:x}"),
                    ?kind,
                    "rejected handle: {err}"
                ),
            }
        }
        result
    }
}

impl<P: Clone> HandleStore<P> {
    /// Payload stored for a live handle.
    ///
    /// The payload is cloned under the table lock, so `P` should be cheap to
    /// clone (a shared pointer or an id).
    pub fn get_info(&self, handle: &Handle) -> Result<P> {
        let result = {
            let table = self.table.lock();
            Self::validate(&table, handle).and_then(|()| {
                table
                    .get(handle.fid, handle.reuse)
                    .cloned()
                    .ok_or(GahError::StaleOrUnknownHandle { fid: handle.fid })
            })
        };
        self.record("get_info", handle, result)
    }
}

impl<P> fmt::Debug for HandleStore<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table.lock();
        f.debug_struct("HandleStore")
            .field("live", &table.live())
            .field("table_len", &table.len())
            .field("capacity", &table.capacity())
            .finish()
    }
}

impl<P> Drop for HandleStore<P> {
    fn drop(&mut self) {
        let live = self.table.get_mut().live();
        if live != 0 {
            tracing::warn!(live, "handle store dropped with live handles");
        }
    }
}

//! Slot table backing the handle store.
//!
//! Slots live in a dense vector indexed by fid. Freed fids go onto a LIFO
//! free list and are handed out again before the vector grows:
//!
//! ```text
//! slots:     [ 0:live r3 ][ 1:free r1 ][ 2:live r1 ][ 3:free r2 ]
//! free_list: [ 1, 3 ]  <- next allocation takes fid 3
//! ```
//!
//! Each slot carries a wrapping reuse counter that is bumped on every
//! allocation, so a handle minted for an earlier tenant of the slot no
//! longer matches.

use crate::config::StoreConfig;
use crate::error::{GahError, Result};

/// Bookkeeping for one fid.
#[derive(Debug)]
pub(crate) struct Slot<P> {
    reuse: u16,
    owner: u8,
    payload: Option<P>,
}

impl<P> Slot<P> {
    fn vacant() -> Self {
        Self {
            reuse: 0,
            owner: 0,
            payload: None,
        }
    }

    pub(crate) fn in_use(&self) -> bool {
        self.payload.is_some()
    }
}

/// Dense slot vector plus free list.
#[derive(Debug)]
pub(crate) struct SlotTable<P> {
    slots: Vec<Slot<P>>,
    free_list: Vec<u32>,
    live: usize,
    growth: usize,
    max_slots: usize,
}

impl<P> SlotTable<P> {
    /// Create an empty table with storage reserved for `initial_capacity` slots.
    pub(crate) fn new(config: &StoreConfig) -> Result<Self> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(config.initial_capacity)
            .map_err(|_| GahError::OutOfMemory)?;
        let mut free_list = Vec::new();
        free_list
            .try_reserve_exact(config.initial_capacity)
            .map_err(|_| GahError::OutOfMemory)?;

        Ok(Self {
            slots,
            free_list,
            live: 0,
            growth: config.growth_increment,
            max_slots: config.max_slots,
        })
    }

    /// Number of slots ever created.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }

    /// Number of allocated slots.
    pub(crate) fn live(&self) -> usize {
        self.live
    }

    pub(crate) fn free(&self) -> usize {
        self.free_list.len()
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Claim a slot for `payload` and return its `(fid, reuse)` pair.
    ///
    /// On failure the payload is handed back untouched.
    pub(crate) fn insert(
        &mut self,
        owner: u8,
        payload: P,
    ) -> core::result::Result<(u32, u16), (GahError, P)> {
        let fid = match self.free_list.pop() {
            Some(fid) => fid,
            None => match self.push_slot() {
                Ok(fid) => fid,
                Err(err) => return Err((err, payload)),
            },
        };

        let slot = &mut self.slots[fid as usize];
        debug_assert!(!slot.in_use(), "free list held a live slot");
        slot.reuse = slot.reuse.wrapping_add(1);
        slot.owner = owner;
        slot.payload = Some(payload);
        self.live += 1;

        Ok((fid, slot.reuse))
    }

    /// Append a vacant slot, reserving another growth chunk if storage is full.
    fn push_slot(&mut self) -> Result<u32> {
        let next = self.slots.len();
        if next >= self.max_slots {
            return Err(GahError::Exhausted {
                max_slots: self.max_slots,
            });
        }
        let fid = u32::try_from(next).map_err(|_| GahError::Exhausted {
            max_slots: self.max_slots,
        })?;

        if next == self.slots.capacity() {
            let additional = self.growth.min(self.max_slots - next);
            self.slots
                .try_reserve_exact(additional)
                .map_err(|_| GahError::OutOfMemory)?;
            // Keep the free list able to hold every fid so that freeing never allocates.
            let wanted = self.slots.capacity() - self.free_list.len();
            self.free_list
                .try_reserve_exact(wanted)
                .map_err(|_| GahError::OutOfMemory)?;
            tracing::debug!(
                capacity = self.slots.capacity(),
                "slot table storage grown"
            );
        }

        self.slots.push(Slot::vacant());
        Ok(fid)
    }

    /// Payload of the live slot `fid` if it is at reuse count `reuse`.
    pub(crate) fn get(&self, fid: u32, reuse: u16) -> Option<&P> {
        let slot = self.slots.get(fid as usize)?;
        if slot.reuse != reuse {
            return None;
        }
        slot.payload.as_ref()
    }

    /// Release the live slot `fid` at reuse count `reuse`, returning its payload.
    pub(crate) fn remove(&mut self, fid: u32, reuse: u16) -> Option<P> {
        let slot = self.slots.get_mut(fid as usize)?;
        if slot.reuse != reuse {
            return None;
        }
        let payload = slot.payload.take()?;
        self.free_list.push(fid);
        self.live -= 1;
        Some(payload)
    }

    /// `(fid, reuse, owner)` of every live slot in fid order.
    pub(crate) fn live_slots(&self) -> impl Iterator<Item = (u32, u16, u8)> + '_ {
        self.slots
            .iter()
            .zip(0u32..)
            .filter(|(slot, _)| slot.in_use())
            .map(|(slot, fid)| (fid, slot.reuse, slot.owner))
    }
}

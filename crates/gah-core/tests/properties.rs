//! Property-based tests for handle encoding and store behaviour.
//!
//! Uses proptest to generate random inputs and verify invariants hold.

use gah_core::{GahError, HANDLE_SIZE, Handle, HandleStore, Ownership, codec};
use proptest::prelude::*;

proptest! {
    /// A freshly allocated handle resolves to its payload and passes both checks.
    #[test]
    fn allocate_then_get_info(root in any::<u8>(), payload in any::<u64>()) {
        let store: HandleStore<u64> = HandleStore::with_capacity(1).unwrap();
        let h = store.allocate(root, payload).unwrap();
        prop_assert_eq!(store.get_info(&h), Ok(payload));
        prop_assert!(h.check_crc().is_ok());
        prop_assert!(h.check_format_version().is_ok());
        prop_assert_eq!(h.is_self_root(root), Ok(Ownership::Root));
        prop_assert_eq!(store.deallocate(&h), Ok(payload));
    }

    /// Flipping any bit of the checksummed fields breaks the checksum.
    #[test]
    fn single_bit_flip_is_detected(
        fid in any::<u32>(),
        reuse in any::<u16>(),
        root in any::<u8>(),
        bit in 0usize..64,
    ) {
        let h = codec::encode(fid, reuse, root);
        let mut raw = h.to_bytes();
        raw[bit / 8] ^= 1 << (bit % 8);
        let flipped = Handle::from_bytes(&raw).unwrap();
        prop_assert!(!codec::verify_checksum(&flipped));
        // A flipped valid handle is never the null handle, so the only
        // acceptable answer is a checksum mismatch.
        prop_assert!(!flipped.is_null());
        let rejected = matches!(flipped.check_crc(), Err(GahError::ChecksumMismatch { .. }));
        prop_assert!(rejected, "bit {} gave {:?}", bit, flipped.check_crc());
    }

    /// Any other tag is answered with NotRoot, never an error.
    #[test]
    fn other_tags_are_not_root(root in any::<u8>(), other in any::<u8>()) {
        prop_assume!(root != other);
        let h = codec::encode(0, 1, root);
        prop_assert_eq!(h.is_self_root(other), Ok(Ownership::NotRoot));
    }

    /// Wire bytes decode to the same handle.
    #[test]
    fn wire_bytes_decode(fid in any::<u32>(), reuse in any::<u16>(), root in any::<u8>()) {
        let h = codec::encode(fid, reuse, root);
        let raw = h.to_bytes();
        prop_assert_eq!(raw.len(), HANDLE_SIZE);
        prop_assert_eq!(Handle::from_bytes(&raw).unwrap(), h);
        prop_assert_eq!(Handle::from_u128(h.to_u128()), h);
    }

    /// Pure churn never grows the table beyond the peak live count.
    #[test]
    fn churn_is_bounded(ops in proptest::collection::vec(any::<bool>(), 1..200)) {
        let store: HandleStore<usize> = HandleStore::with_capacity(0).unwrap();
        let mut live: Vec<gah_core::Handle> = Vec::new();
        let mut dead: Vec<gah_core::Handle> = Vec::new();
        let mut peak = 0usize;

        for (i, alloc) in ops.into_iter().enumerate() {
            if alloc || live.is_empty() {
                live.push(store.allocate(0, i).unwrap());
            } else {
                let h = live.swap_remove(i % live.len());
                store.deallocate(&h).unwrap();
                dead.push(h);
            }
            peak = peak.max(live.len());
            prop_assert!(store.table_len() <= peak);
        }

        for h in &dead {
            let stale = matches!(store.get_info(h), Err(GahError::StaleOrUnknownHandle { .. }));
            prop_assert!(stale);
        }
        for h in &live {
            prop_assert!(store.get_info(h).is_ok());
            store.deallocate(h).unwrap();
        }
    }
}

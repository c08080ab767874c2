//! Log levels of handle rejections.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use gah_core::{Handle, HandleStore};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::{Context, SubscriberExt};

/// Counts events at `WARN` and above.
#[derive(Clone, Default)]
struct WarnCounter(Arc<AtomicUsize>);

impl WarnCounter {
    fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarnCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() <= Level::WARN {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }
}

fn warns_during(f: impl FnOnce()) -> usize {
    let counter = WarnCounter::default();
    let subscriber = tracing_subscriber::registry().with(counter.clone());
    tracing::subscriber::with_default(subscriber, f);
    counter.get()
}

#[test]
fn stale_lookup_does_not_warn() {
    let store: HandleStore<u32> = HandleStore::with_capacity(4).unwrap();
    let h = store.allocate(0, 1).unwrap();
    store.deallocate(&h).unwrap();

    let warns = warns_during(|| {
        for _ in 0..100 {
            assert!(store.get_info(&h).is_err());
        }
        assert!(store.deallocate(&h).is_err());
    });
    assert_eq!(warns, 0);
    assert_eq!(store.stats().rejected_stale, 101);
}

#[test]
fn corrupt_handle_still_warns() {
    let store: HandleStore<u32> = HandleStore::with_capacity(4).unwrap();
    let h = store.allocate(0, 1).unwrap();
    let mut raw = h.to_bytes();
    raw[6] ^= 0x80;
    let corrupt = Handle::from_bytes(&raw).unwrap();

    let warns = warns_during(|| {
        assert!(store.get_info(&corrupt).is_err());
    });
    assert_eq!(warns, 1);
    assert_eq!(store.deallocate(&h), Ok(1));
}

//! Store configuration.

use serde::{Deserialize, Serialize};

use crate::error::{GahError, Result};

/// Default number of slots reserved when a store is created.
pub const DEFAULT_CAPACITY: usize = 8 * 1024;
/// Default number of slots reserved each time the table outgrows its storage.
pub const DEFAULT_GROWTH: usize = 8 * 1024;
/// Largest slot count addressable by a 32-bit fid.
pub const MAX_SLOTS: usize = u32::MAX as usize;

/// Sizing parameters for a [`HandleStore`](crate::HandleStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Slots reserved up front. A hint only; the table starts empty.
    pub initial_capacity: usize,
    /// Slots reserved whenever the backing storage is full.
    pub growth_increment: usize,
    /// Upper bound on the number of slots.
    pub max_slots: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            initial_capacity: DEFAULT_CAPACITY,
            growth_increment: DEFAULT_GROWTH,
            max_slots: MAX_SLOTS,
        }
    }
}

impl StoreConfig {
    /// Default configuration with a different initial capacity.
    pub fn with_capacity(initial_capacity: usize) -> Self {
        Self {
            initial_capacity,
            ..Self::default()
        }
    }

    /// Reject configurations the slot table cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.growth_increment == 0 {
            return Err(GahError::InvalidConfig(
                "growth_increment must be at least 1".into(),
            ));
        }
        if self.max_slots == 0 || self.max_slots > MAX_SLOTS {
            return Err(GahError::InvalidConfig(format!(
                "max_slots must be within 1..={MAX_SLOTS}, got {}",
                self.max_slots
            )));
        }
        if self.initial_capacity > self.max_slots {
            return Err(GahError::InvalidConfig(format!(
                "initial_capacity {} exceeds max_slots {}",
                self.initial_capacity, self.max_slots
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(StoreConfig::default().validate().is_ok());
        assert!(StoreConfig::with_capacity(0).validate().is_ok());
    }

    #[test]
    fn rejects_bad_sizes() {
        let cfg = StoreConfig {
            growth_increment: 0,
            ..StoreConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(GahError::InvalidConfig(_))));

        let cfg = StoreConfig {
            initial_capacity: 10,
            max_slots: 4,
            ..StoreConfig::default()
        };
        assert!(matches!(cfg.validate(), Err(GahError::InvalidConfig(_))));

        let cfg = StoreConfig {
            max_slots: 0,
            ..StoreConfig::with_capacity(0)
        };
        assert!(matches!(cfg.validate(), Err(GahError::InvalidConfig(_))));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: StoreConfig = serde_json::from_str(r#"{ "initial_capacity": 16 }"#).unwrap();
        assert_eq!(cfg.initial_capacity, 16);
        assert_eq!(cfg.growth_increment, DEFAULT_GROWTH);
        assert_eq!(cfg.max_slots, MAX_SLOTS);
    }
}

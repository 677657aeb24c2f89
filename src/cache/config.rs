//! Cache configuration and TTL classes.

use std::num::NonZeroUsize;
use std::time::Duration;

use crate::config::{BackendKind, CacheSettings};

const DEFAULT_MEMORY_MAX_ENTRIES: usize = 1024;

/// Lifetime classes for cached values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTtl {
    /// 60 seconds.
    Short,
    /// 5 minutes. Listings and the category list.
    Medium,
    /// 1 hour. Single posts by slug.
    Long,
    /// 24 hours.
    VeryLong,
}

impl CacheTtl {
    pub const fn duration(self) -> Duration {
        match self {
            Self::Short => Duration::from_secs(60),
            Self::Medium => Duration::from_secs(300),
            Self::Long => Duration::from_secs(3600),
            Self::VeryLong => Duration::from_secs(86_400),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    pub backend: BackendKind,
    pub memory_max_entries: NonZeroUsize,
}

impl CacheConfig {
    pub fn is_enabled(&self) -> bool {
        self.backend != BackendKind::Disabled
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Memory,
            memory_max_entries: NonZeroUsize::new(DEFAULT_MEMORY_MAX_ENTRIES)
                .unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl From<&CacheSettings> for CacheConfig {
    fn from(settings: &CacheSettings) -> Self {
        Self {
            backend: settings.backend,
            memory_max_entries: settings.memory_max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ttl_classes_have_expected_lengths() {
        assert_eq!(CacheTtl::Short.duration().as_secs(), 60);
        assert_eq!(CacheTtl::Medium.duration().as_secs(), 300);
        assert_eq!(CacheTtl::Long.duration().as_secs(), 3600);
        assert_eq!(CacheTtl::VeryLong.duration().as_secs(), 86_400);
    }

    #[test]
    fn disabled_backend_turns_cache_off() {
        let config = CacheConfig {
            backend: BackendKind::Disabled,
            ..CacheConfig::default()
        };
        assert!(!config.is_enabled());
        assert!(CacheConfig::default().is_enabled());
    }
}

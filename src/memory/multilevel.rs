//! Multi-level cache implementation

use std::io::{self, Write};

use log::{debug, trace};

use super::cache::Cache;
use super::cache::CacheHistory;
use super::{AccessOutcome, AccessType, HierarchyOutcome, StorageInterface};
use crate::config::validate_hierarchy;
use crate::config::CacheConfig;
use crate::error::ConfigError;

/// Multi-level cache.
/// Levels are probed in order; every level that misses installs the
/// block itself, so after an L1 miss and L2 hit the block is also in L1.
#[derive(Clone, Debug)]
pub struct MultilevelCache {
    pub caches: Vec<Cache>,

    /// Accesses that reached each level. Level 0 is counted by the cache.
    level_accesses: Vec<u64>,
}

impl MultilevelCache {
    /// Create a multi-level cache from the configuration of each level,
    /// L1 first
    pub fn make(configs: &[CacheConfig]) -> Result<Self, ConfigError> {
        validate_hierarchy(configs)?;

        let caches = configs
            .iter()
            .map(|config| Cache::make(*config))
            .collect::<Result<Vec<_>, _>>()?;
        debug!("cache hierarchy with {} levels", caches.len());

        Ok(Self {
            level_accesses: vec![0; caches.len()],
            caches,
        })
    }

    /// Access levels in order until one hits
    pub fn access(
        &mut self,
        address: u32,
        access_type: AccessType,
    ) -> HierarchyOutcome {
        for (k, cache) in self.caches.iter_mut().enumerate() {
            if k > 0 {
                self.level_accesses[k] += 1;
            }
            if cache.access(address, access_type) == AccessOutcome::Hit {
                trace!("hierarchy hit at L{} for {:#010x}", k + 1, address);
                return HierarchyOutcome::HitAt(k);
            }
        }
        trace!("hierarchy miss for {:#010x}", address);
        HierarchyOutcome::MissAll
    }

    pub fn accesses_at(&self, k: usize) -> u64 {
        match k {
            0 => self.caches.first().map_or(0, |cache| cache.history.accesses),
            _ => self.level_accesses.get(k).copied().unwrap_or(0),
        }
    }
}

impl StorageInterface for MultilevelCache {
    fn access(
        &mut self,
        address: u32,
        access_type: AccessType,
    ) -> HierarchyOutcome {
        MultilevelCache::access(self, address, access_type)
    }

    fn n(&self) -> usize {
        self.caches.len()
    }

    fn caches(&self, k: usize) -> Option<&Cache> {
        self.caches.get(k)
    }

    fn level_accesses(&self, k: usize) -> u64 {
        self.accesses_at(k)
    }

    fn describe(&self, outcome: HierarchyOutcome) -> String {
        // Levels at and below the hit level hold the block
        let first_hit = match outcome {
            HierarchyOutcome::HitAt(k) => k,
            HierarchyOutcome::MissAll => self.n(),
        };
        (0..self.n())
            .map(|k| {
                let status = if k >= first_hit { "HIT" } else { "MISS" };
                format!("L{}-{}", k + 1, status)
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn write_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        for (k, cache) in self.caches.iter().enumerate() {
            cache.write_stats(out, Some(format!("L{} Cache", k + 1).as_str()))?;
        }
        writeln!(out)?;
        writeln!(out, "* Multi-Level Cache Summary *")?;
        for k in 0..self.n() {
            writeln!(out, "L{} accesses: {}", k + 1, self.accesses_at(k))?;
        }
        Ok(())
    }

    fn write_entries(&self, out: &mut dyn Write) -> io::Result<()> {
        for (k, cache) in self.caches.iter().enumerate() {
            cache.write_entries(out, Some(format!("L{} Cache", k + 1).as_str()))?;
        }
        Ok(())
    }

    fn get_history(&self) -> Vec<CacheHistory> {
        self.caches.iter().map(|cache| cache.history).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Associativity;
    use pretty_assertions::assert_eq;
    use AccessType::{Read, Write};
    use HierarchyOutcome::{HitAt, MissAll};

    fn make_two_level() -> MultilevelCache {
        MultilevelCache::make(&[
            CacheConfig::make(16, 4, Associativity::DirectMapped),
            CacheConfig::make(64, 4, Associativity::FourWay),
        ])
        .unwrap()
    }

    #[test]
    fn test_make_rejects_bad_hierarchy() {
        let l1 = CacheConfig::make(64, 4, Associativity::DirectMapped);
        let l2 = CacheConfig::make(32, 4, Associativity::DirectMapped);
        assert!(matches!(
            MultilevelCache::make(&[l1, l2]),
            Err(ConfigError::HierarchySize { level: 2, .. })
        ));
        assert!(matches!(
            MultilevelCache::make(&[l1]),
            Err(ConfigError::TooFewLevels(1))
        ));
        let bad_l2 = CacheConfig::make(128, 4, Associativity::FourWay);
        let bad_l1 = CacheConfig::make(64, 8, Associativity::DirectMapped);
        assert!(matches!(
            MultilevelCache::make(&[bad_l1, bad_l2]),
            Err(ConfigError::HierarchyBlockSize { level: 2, .. })
        ));
    }

    #[test]
    fn test_l1_hit_skips_l2() {
        let mut mlc = make_two_level();
        assert_eq!(mlc.access(0x40, Read), MissAll);
        assert_eq!(mlc.accesses_at(1), 1);
        assert_eq!(mlc.access(0x40, Read), HitAt(0));
        assert_eq!(mlc.accesses_at(0), 2);
        assert_eq!(mlc.accesses_at(1), 1);
    }

    #[test]
    fn test_miss_fills_every_level() {
        let mut mlc = make_two_level();
        assert_eq!(mlc.access(0x100, Write), MissAll);
        assert!(mlc.caches[0].is_in_cache(0x100));
        assert!(mlc.caches[1].is_in_cache(0x100));
        // Write-allocate applies at every level
        assert!(mlc.caches[0].lookup(0x100).unwrap().dirty);
        assert!(mlc.caches[1].lookup(0x100).unwrap().dirty);
    }

    #[test]
    fn test_l2_hit_fills_l1() {
        let mut mlc = make_two_level();
        mlc.access(0x0, Read);
        // 0x10 conflicts with 0x0 in the direct-mapped L1 only
        mlc.access(0x10, Read);
        assert!(!mlc.caches[0].is_in_cache(0x0));
        assert!(mlc.caches[1].is_in_cache(0x0));

        assert_eq!(mlc.access(0x0, Read), HitAt(1));
        assert!(mlc.caches[0].is_in_cache(0x0));
        assert_eq!(mlc.access(0x0, Read), HitAt(0));

        assert_eq!(mlc.accesses_at(0), 4);
        assert_eq!(mlc.accesses_at(1), 3);
        let history = mlc.get_history();
        assert_eq!(history[0].hits, 1);
        assert_eq!(history[1].hits, 1);
        assert_eq!(history[1].misses, 2);
    }

    #[test]
    fn test_describe() {
        let mlc = make_two_level();
        assert_eq!(mlc.describe(HitAt(0)), "L1-HIT L2-HIT");
        assert_eq!(mlc.describe(HitAt(1)), "L1-MISS L2-HIT");
        assert_eq!(mlc.describe(MissAll), "L1-MISS L2-MISS");
    }

    #[test]
    fn test_three_levels() {
        let mut mlc = MultilevelCache::make(&[
            CacheConfig::make(16, 4, Associativity::DirectMapped),
            CacheConfig::make(32, 4, Associativity::TwoWay),
            CacheConfig::make(256, 16, Associativity::FullyAssociative),
        ])
        .unwrap();
        assert_eq!(mlc.access(0x0, Read), MissAll);
        assert_eq!(mlc.accesses_at(2), 1);
        // Same 16-byte block in L3, different 4-byte block above it
        assert_eq!(mlc.access(0x8, Read), HitAt(2));
        assert_eq!(mlc.describe(HitAt(2)), "L1-MISS L2-MISS L3-HIT");
        assert_eq!(mlc.accesses_at(1), 2);
        assert_eq!(mlc.accesses_at(2), 2);
        assert!(mlc.caches[0].is_in_cache(0x8));
        assert!(mlc.caches[1].is_in_cache(0x8));
    }

    #[test]
    fn test_write_stats() {
        let mut mlc = make_two_level();
        mlc.access(0x0, Read);
        mlc.access(0x0, Read);
        let mut out: Vec<u8> = Vec::new();
        mlc.write_stats(&mut out).unwrap();
        let expected = "
* L1 Cache Statistics *
total accesses: 2
hits: 1
misses: 1
total reads: 2
read hits: 1
total writes: 0
write hits: 0

* L2 Cache Statistics *
total accesses: 1
hits: 0
misses: 1
total reads: 1
read hits: 0
total writes: 0
write hits: 0

* Multi-Level Cache Summary *
L1 accesses: 2
L2 accesses: 1
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
        assert_eq!(mlc.get_global_miss_rate(), 0.5);
    }
}

//! Memory hierarchy: translation structures and caches

pub mod cache;
pub mod lru;
pub mod multilevel;
pub mod page_table;
pub mod tlb;

use std::io::{self, Write};

use cache::Cache;
use cache::CacheHistory;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessType {
    Read,
    Write,
}

/// Outcome of an access to a single cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AccessOutcome {
    Hit,
    Miss,
}

/// Outcome of an access to a chain of caches
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HierarchyOutcome {
    /// Hit at level k (0 is L1)
    HitAt(usize),
    /// Every level missed
    MissAll,
}

/// Outcome of a translation lookup in the TLB or the page table
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Lookup {
    Hit { ppn: u32, dirty: bool },
    Miss,
}

impl Lookup {
    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit { .. })
    }
}

/// Common interface of the single cache and the multi-level cache,
/// driven by the simulation loop
pub trait StorageInterface {
    /// Access the physical address, filling blocks as needed
    fn access(&mut self, address: u32, access_type: AccessType)
        -> HierarchyOutcome;

    /// Number of cache levels
    fn n(&self) -> usize;

    /// Cache at level k
    fn caches(&self, k: usize) -> Option<&Cache>;

    /// Number of accesses that reached level k
    fn level_accesses(&self, k: usize) -> u64;

    /// Render an outcome the way the verbose trace reports it
    fn describe(&self, outcome: HierarchyOutcome) -> String;

    fn write_stats(&self, out: &mut dyn Write) -> io::Result<()>;

    fn write_entries(&self, out: &mut dyn Write) -> io::Result<()>;

    /// Fraction of accesses that missed in every level
    fn get_global_miss_rate(&self) -> f64 {
        let accesses = self.level_accesses(0);
        match self.caches(self.n().saturating_sub(1)) {
            Some(last) if accesses > 0 => {
                last.history.misses as f64 / accesses as f64
            }
            _ => 0.0,
        }
    }

    /// Return the list of cache histories
    fn get_history(&self) -> Vec<CacheHistory> {
        (0..self.n())
            .filter_map(|k| self.caches(k))
            .map(|cache| cache.history)
            .collect()
    }
}

impl StorageInterface for Cache {
    fn access(
        &mut self,
        address: u32,
        access_type: AccessType,
    ) -> HierarchyOutcome {
        match Cache::access(self, address, access_type) {
            AccessOutcome::Hit => HierarchyOutcome::HitAt(0),
            AccessOutcome::Miss => HierarchyOutcome::MissAll,
        }
    }

    fn n(&self) -> usize {
        1
    }

    fn caches(&self, k: usize) -> Option<&Cache> {
        (k == 0).then_some(self)
    }

    fn level_accesses(&self, k: usize) -> u64 {
        if k == 0 {
            self.history.accesses
        } else {
            0
        }
    }

    fn describe(&self, outcome: HierarchyOutcome) -> String {
        match outcome {
            HierarchyOutcome::HitAt(_) => "CACHE-HIT".to_string(),
            HierarchyOutcome::MissAll => "CACHE-MISS".to_string(),
        }
    }

    fn write_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        Cache::write_stats(self, out, None)
    }

    fn write_entries(&self, out: &mut dyn Write) -> io::Result<()> {
        Cache::write_entries(self, out, None)
    }
}

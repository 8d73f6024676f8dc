//! Simulator configuration and its validation

use std::path::PathBuf;

use crate::error::ConfigError;
use crate::memory::cache::is_pow_2;

/// Page size in bytes (4 KiB pages)
pub const PAGE_SIZE: u32 = 1 << PAGE_OFFSET_BITS;
pub const PAGE_OFFSET_BITS: usize = 12;
/// Number of physical frames (1 MiB of physical memory)
pub const NUM_PHYSICAL_PAGES: u32 = 256;
/// Number of page table entries (26-bit virtual addresses)
pub const PAGE_TABLE_ENTRIES: usize = 1 << 14;

pub const DEFAULT_BLOCK_SIZE: u32 = 4;

/// Cache or TLB associativity
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Associativity {
    #[default]
    DirectMapped,
    FullyAssociative,
    TwoWay,
    FourWay,
}

impl Associativity {
    /// Decode the numeric code used on the command line
    pub fn from_code(code: u32) -> Result<Self, ConfigError> {
        match code {
            1 => Ok(Associativity::DirectMapped),
            2 => Ok(Associativity::FullyAssociative),
            3 => Ok(Associativity::TwoWay),
            4 => Ok(Associativity::FourWay),
            _ => Err(ConfigError::InvalidAssociativity(code)),
        }
    }

    pub fn code(&self) -> u32 {
        match self {
            Associativity::DirectMapped => 1,
            Associativity::FullyAssociative => 2,
            Associativity::TwoWay => 3,
            Associativity::FourWay => 4,
        }
    }

    /// Ways per set for a structure holding `slots` lines in total
    pub fn ways(&self, slots: u32) -> u32 {
        match self {
            Associativity::DirectMapped => 1,
            Associativity::FullyAssociative => slots,
            Associativity::TwoWay => 2,
            Associativity::FourWay => 4,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Associativity::DirectMapped => "direct-mapped",
            Associativity::FullyAssociative => "fully-associative",
            Associativity::TwoWay => "2-way",
            Associativity::FourWay => "4-way",
        }
    }
}

/// Geometry of a single cache
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CacheConfig {
    pub size: u32,
    pub block_size: u32,
    pub associativity: Associativity,
}

impl CacheConfig {
    pub fn make(size: u32, block_size: u32, associativity: Associativity) -> Self {
        Self { size, block_size, associativity }
    }

    /// Total number of blocks held by the cache
    pub fn block_num(&self) -> u32 {
        self.size / self.block_size
    }

    pub fn ways(&self) -> u32 {
        self.associativity.ways(self.block_num())
    }

    pub fn num_sets(&self) -> u32 {
        self.block_num() / self.ways()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Cache size must be positive and a multiple of 4
        if self.size == 0 || self.size % 4 != 0 {
            return Err(ConfigError::InvalidCacheSize(self.size));
        }
        // Block size must be a power of 2, at least a word
        if self.block_size < 4 || !is_pow_2(self.block_size) {
            return Err(ConfigError::InvalidBlockSize(self.block_size));
        }
        if self.block_size > self.size {
            return Err(ConfigError::BlockExceedsCache {
                size: self.size,
                block_size: self.block_size,
            });
        }
        let ways = self.ways();
        let divisible = self
            .block_size
            .checked_mul(ways)
            .is_some_and(|set_bytes| self.size % set_bytes == 0);
        if !divisible {
            return Err(ConfigError::IndivisibleGeometry {
                size: self.size,
                block_size: self.block_size,
                ways,
            });
        }
        if !is_pow_2(self.num_sets()) {
            return Err(ConfigError::NonPowerOfTwoSets(self.num_sets()));
        }
        Ok(())
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::make(1024, DEFAULT_BLOCK_SIZE, Associativity::DirectMapped)
    }
}

/// Geometry of the TLB
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TlbConfig {
    pub num_entries: u32,
    pub associativity: Associativity,
}

impl TlbConfig {
    pub fn make(num_entries: u32, associativity: Associativity) -> Self {
        Self { num_entries, associativity }
    }

    pub fn ways(&self) -> u32 {
        self.associativity.ways(self.num_entries)
    }

    pub fn num_sets(&self) -> u32 {
        self.num_entries / self.ways()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_entries < 2 || !is_pow_2(self.num_entries) {
            return Err(ConfigError::InvalidTlbEntries(self.num_entries));
        }
        let ways = self.ways();
        if self.num_entries % ways != 0 {
            return Err(ConfigError::IndivisibleTlb {
                entries: self.num_entries,
                ways,
            });
        }
        Ok(())
    }
}

impl Default for TlbConfig {
    fn default() -> Self {
        Self::make(16, Associativity::DirectMapped)
    }
}

/// Validate an ordered list of cache levels, L1 first
pub fn validate_hierarchy(levels: &[CacheConfig]) -> Result<(), ConfigError> {
    if levels.len() < 2 {
        return Err(ConfigError::TooFewLevels(levels.len()));
    }
    for level in levels {
        level.validate()?;
    }
    for (i, pair) in levels.windows(2).enumerate() {
        let (previous, current) = (&pair[0], &pair[1]);
        if current.size < previous.size {
            return Err(ConfigError::HierarchySize {
                level: i + 2,
                size: current.size,
                previous: i + 1,
                previous_size: previous.size,
            });
        }
        if current.block_size < previous.block_size {
            return Err(ConfigError::HierarchyBlockSize {
                level: i + 2,
                block_size: current.block_size,
                previous: i + 1,
                previous_block_size: previous.block_size,
            });
        }
    }
    Ok(())
}

/// Either a single cache or an ordered hierarchy of caches
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CacheLayout {
    Single(CacheConfig),
    Hierarchy(Vec<CacheConfig>),
}

impl CacheLayout {
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            CacheLayout::Single(config) => config.validate(),
            CacheLayout::Hierarchy(levels) => validate_hierarchy(levels),
        }
    }

    pub fn levels(&self) -> &[CacheConfig] {
        match self {
            CacheLayout::Single(config) => std::slice::from_ref(config),
            CacheLayout::Hierarchy(levels) => levels,
        }
    }
}

/// Complete simulator configuration
#[derive(Clone, Debug)]
pub struct SimConfig {
    pub cache: CacheLayout,
    pub tlb: TlbConfig,
    pub trace_path: PathBuf,
    pub physical_pages: u32,
    /// Print per-access lines and entry dumps
    pub verbose: bool,
    /// Also dump cache lines in verbose mode
    pub dump_cache: bool,
}

impl SimConfig {
    pub fn make(cache: CacheLayout, tlb: TlbConfig, trace_path: PathBuf) -> Self {
        Self {
            cache,
            tlb,
            trace_path,
            physical_pages: NUM_PHYSICAL_PAGES,
            verbose: false,
            dump_cache: false,
        }
    }

    /// Validate the geometry only, without touching the filesystem
    pub fn validate_geometry(&self) -> Result<(), ConfigError> {
        self.cache.validate()?;
        self.tlb.validate()?;
        if self.physical_pages == 0 {
            return Err(ConfigError::EmptyFramePool);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_geometry()?;
        if !self.trace_path.is_file() {
            return Err(ConfigError::TraceNotFound(self.trace_path.clone()));
        }
        Ok(())
    }
}

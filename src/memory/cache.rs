//! Cache implementation

use std::io::{self, Write};

use log::{debug, trace};

use super::lru::RecencyList;
use super::{AccessOutcome, AccessType};
use crate::config::CacheConfig;
use crate::error::ConfigError;

pub const ADDRESS_BITS: usize = 32;

pub fn get_log_2(value: u32) -> usize {
    assert!(value > 0);
    31 - value.leading_zeros() as usize
}

pub fn is_pow_2(value: u32) -> bool {
    value != 0 && value & (value - 1) == 0
}

pub fn get_mask(bits: usize) -> u32 {
    ((1u64 << bits) - 1) as u32
}

/// A single cache line.
/// The payload only models the block size; its content is never read.
#[derive(Clone, Debug)]
pub struct CacheLine {
    pub valid: bool,
    pub dirty: bool,
    pub tag: u32,
    data: Box<[u8]>,
}

impl CacheLine {
    fn make(block_size: usize) -> Self {
        Self {
            valid: false,
            dirty: false,
            tag: 0,
            data: vec![0; block_size].into_boxed_slice(),
        }
    }

    pub fn block_size(&self) -> usize {
        self.data.len()
    }
}

/// A set of ways. Recency is only tracked when there is a choice of victim.
#[derive(Clone, Debug)]
pub struct CacheSet {
    pub lines: Vec<CacheLine>,
    lru: Option<RecencyList>,
}

impl CacheSet {
    fn make(ways: usize, block_size: usize) -> Self {
        Self {
            lines: vec![CacheLine::make(block_size); ways],
            lru: (ways > 1).then(|| RecencyList::make_full(ways)),
        }
    }

    fn find(&self, tag: u32) -> Option<usize> {
        self.lines.iter().position(|line| line.valid && line.tag == tag)
    }

    /// Any invalid way first, then the least recently used one
    fn victim(&self) -> usize {
        if let Some(way) = self.lines.iter().position(|line| !line.valid) {
            return way;
        }
        self.lru.as_ref().and_then(RecencyList::back).unwrap_or(0)
    }

    fn touch(&mut self, way: usize) {
        if let Some(lru) = &mut self.lru {
            lru.move_to_front(way);
        }
    }

    /// Ways ordered from most to least recently used
    pub fn recency_order(&self) -> Vec<usize> {
        match &self.lru {
            Some(lru) => lru.iter().collect(),
            None => vec![0],
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct CacheHistory {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
    pub reads: u64,
    pub read_hits: u64,
    pub writes: u64,
    pub write_hits: u64,
    /// Dirty victims written back on eviction
    pub write_backs: u64,
}

impl CacheHistory {
    pub fn get_miss_rate(&self) -> f64 {
        if self.accesses == 0 {
            0.0
        } else {
            self.misses as f64 / self.accesses as f64
        }
    }
}

/// Set-associative cache with LRU replacement, write-back and write-allocate
#[derive(Clone, Debug)]
pub struct Cache {
    pub config: CacheConfig,

    pub history: CacheHistory,

    num_sets: usize,
    ways_per_set: usize,

    offset_bits: usize,
    index_bits: usize,
    tag_bits: usize,

    offset_mask: u32,
    index_mask: u32,

    sets: Vec<CacheSet>,
}

// Assume that address is 32-bit
// and looks like this:
// | tag | index | offset |
impl Cache {
    pub fn make(config: CacheConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let num_sets = config.num_sets() as usize;
        let ways_per_set = config.ways() as usize;
        let offset_bits = get_log_2(config.block_size);
        let index_bits = get_log_2(config.num_sets());
        let tag_bits = ADDRESS_BITS - offset_bits - index_bits;

        let sets = (0..num_sets)
            .map(|_| CacheSet::make(ways_per_set, config.block_size as usize))
            .collect();

        debug!(
            "cache {}B/{}B {}: {} sets x {} ways, bits tag={} index={} offset={}",
            config.size,
            config.block_size,
            config.associativity.label(),
            num_sets,
            ways_per_set,
            tag_bits,
            index_bits,
            offset_bits
        );

        Ok(Self {
            config,
            history: CacheHistory::default(),
            num_sets,
            ways_per_set,
            offset_bits,
            index_bits,
            tag_bits,
            offset_mask: get_mask(offset_bits),
            index_mask: get_mask(index_bits),
            sets,
        })
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    pub fn ways_per_set(&self) -> usize {
        self.ways_per_set
    }

    pub fn offset_bits(&self) -> usize {
        self.offset_bits
    }

    pub fn index_bits(&self) -> usize {
        self.index_bits
    }

    pub fn tag_bits(&self) -> usize {
        self.tag_bits
    }

    pub fn sets(&self) -> &[CacheSet] {
        &self.sets
    }

    pub fn get_offset(&self, address: u32) -> u32 {
        address & self.offset_mask
    }

    pub fn get_index(&self, address: u32) -> usize {
        ((address >> self.offset_bits) & self.index_mask) as usize
    }

    pub fn get_tag(&self, address: u32) -> u32 {
        address
            .checked_shr((self.offset_bits + self.index_bits) as u32)
            .unwrap_or(0)
    }

    /// Base address of the block holding `tag` in set `index`
    pub fn get_address(&self, tag: u32, index: usize) -> u32 {
        tag.checked_shl((self.offset_bits + self.index_bits) as u32)
            .unwrap_or(0)
            | ((index as u32) << self.offset_bits)
    }

    /// Probe without touching statistics or recency
    pub fn lookup(&self, address: u32) -> Option<&CacheLine> {
        let set = &self.sets[self.get_index(address)];
        set.find(self.get_tag(address)).map(|way| &set.lines[way])
    }

    pub fn is_in_cache(&self, address: u32) -> bool {
        self.lookup(address).is_some()
    }

    /// Access the cache, filling the block on a miss
    pub fn access(
        &mut self,
        address: u32,
        access_type: AccessType,
    ) -> AccessOutcome {
        let is_write = access_type == AccessType::Write;

        self.history.accesses += 1;
        if is_write {
            self.history.writes += 1;
        } else {
            self.history.reads += 1;
        }

        let index = self.get_index(address);
        let tag = self.get_tag(address);

        if let Some(way) = self.sets[index].find(tag) {
            self.history.hits += 1;
            if is_write {
                self.history.write_hits += 1;
            } else {
                self.history.read_hits += 1;
            }

            let set = &mut self.sets[index];
            if is_write {
                set.lines[way].dirty = true;
            }
            set.touch(way);

            trace!("cache hit {:#010x} set={} way={}", address, index, way);
            return AccessOutcome::Hit;
        }

        self.history.misses += 1;

        let way = self.sets[index].victim();
        let victim = &self.sets[index].lines[way];
        if victim.valid && victim.dirty {
            let victim_address = self.get_address(victim.tag, index);
            write_block_to_memory(victim_address, &victim.data);
            self.history.write_backs += 1;
        }

        let set = &mut self.sets[index];
        let line = &mut set.lines[way];
        line.valid = true;
        line.tag = tag;
        // Write-allocate: a write miss installs the block already dirty
        line.dirty = is_write;
        read_block_from_memory(address, &mut line.data);
        set.touch(way);

        trace!("cache miss {:#010x} set={} way={}", address, index, way);
        AccessOutcome::Miss
    }

    pub fn write_stats(
        &self,
        out: &mut dyn Write,
        label: Option<&str>,
    ) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "* {} Statistics *", label.unwrap_or("Cache"))?;
        writeln!(out, "total accesses: {}", self.history.accesses)?;
        writeln!(out, "hits: {}", self.history.hits)?;
        writeln!(out, "misses: {}", self.history.misses)?;
        writeln!(out, "total reads: {}", self.history.reads)?;
        writeln!(out, "read hits: {}", self.history.read_hits)?;
        writeln!(out, "total writes: {}", self.history.writes)?;
        writeln!(out, "write hits: {}", self.history.write_hits)
    }

    /// Dump every line, resident or not
    pub fn write_entries(
        &self,
        out: &mut dyn Write,
        label: Option<&str>,
    ) -> io::Result<()> {
        writeln!(out)?;
        writeln!(
            out,
            "{} Entries (Valid-Bit Dirty-Bit Tag Block-Address)",
            label.unwrap_or("Cache")
        )?;
        for (index, set) in self.sets.iter().enumerate() {
            for line in &set.lines {
                if line.valid {
                    writeln!(
                        out,
                        "1 {} {:#010x} {:#010x}",
                        line.dirty as u8,
                        line.tag,
                        self.get_address(line.tag, index)
                    )?;
                } else {
                    writeln!(out, "0 0 - -")?;
                }
            }
        }
        Ok(())
    }
}

/// Memory is not modelled, so fetching a block is a no-op
fn read_block_from_memory(address: u32, block: &mut [u8]) {
    trace!("fetch {} bytes at {:#010x}", block.len(), address);
}

/// Memory is not modelled, so writing a block back is a no-op
fn write_block_to_memory(address: u32, block: &[u8]) {
    trace!("write back {} bytes to {:#010x}", block.len(), address);
}

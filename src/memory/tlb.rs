//! Translation lookaside buffer

use std::io::{self, Write};

use log::{debug, trace};

use super::cache::{get_log_2, get_mask};
use super::lru::RecencyList;
use super::Lookup;
use crate::config::TlbConfig;
use crate::error::ConfigError;

/// Virtual page numbers are 20 bits wide (bits 31-12 of the address)
pub const VPN_BITS: usize = 20;

#[derive(Clone, Copy, Debug, Default)]
pub struct TlbEntry {
    pub valid: bool,
    pub dirty: bool,
    /// VPN without its index bits
    pub tag: u32,
    pub ppn: u32,
}

#[derive(Clone, Debug)]
pub struct TlbSet {
    pub entries: Vec<TlbEntry>,
    lru: Option<RecencyList>,
}

impl TlbSet {
    fn make(ways: usize) -> Self {
        Self {
            entries: vec![TlbEntry::default(); ways],
            lru: (ways > 1).then(|| RecencyList::make_full(ways)),
        }
    }

    fn find(&self, tag: u32) -> Option<usize> {
        self.entries.iter().position(|entry| entry.valid && entry.tag == tag)
    }

    fn victim(&self) -> usize {
        if let Some(way) = self.entries.iter().position(|entry| !entry.valid) {
            return way;
        }
        self.lru.as_ref().and_then(RecencyList::back).unwrap_or(0)
    }

    fn touch(&mut self, way: usize) {
        if let Some(lru) = &mut self.lru {
            lru.move_to_front(way);
        }
    }
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct TlbHistory {
    pub accesses: u64,
    pub hits: u64,
    pub misses: u64,
}

/// Set-associative TLB with LRU replacement
#[derive(Clone, Debug)]
pub struct Tlb {
    pub config: TlbConfig,

    pub history: TlbHistory,

    num_sets: usize,
    ways_per_set: usize,
    index_bits: usize,
    index_mask: u32,

    sets: Vec<TlbSet>,
}

impl Tlb {
    pub fn make(config: TlbConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let num_sets = config.num_sets() as usize;
        let ways_per_set = config.ways() as usize;
        let index_bits = get_log_2(config.num_sets());

        debug!(
            "tlb {} entries {}: {} sets x {} ways, tag bits {}",
            config.num_entries,
            config.associativity.label(),
            num_sets,
            ways_per_set,
            VPN_BITS.saturating_sub(index_bits)
        );

        Ok(Self {
            config,
            history: TlbHistory::default(),
            num_sets,
            ways_per_set,
            index_bits,
            index_mask: get_mask(index_bits),
            sets: (0..num_sets).map(|_| TlbSet::make(ways_per_set)).collect(),
        })
    }

    pub fn num_sets(&self) -> usize {
        self.num_sets
    }

    pub fn ways_per_set(&self) -> usize {
        self.ways_per_set
    }

    pub fn index_bits(&self) -> usize {
        self.index_bits
    }

    pub fn tag_bits(&self) -> usize {
        VPN_BITS.saturating_sub(self.index_bits)
    }

    pub fn get_index(&self, vpn: u32) -> usize {
        (vpn & self.index_mask) as usize
    }

    pub fn get_tag(&self, vpn: u32) -> u32 {
        vpn >> self.index_bits
    }

    /// Look up a translation, refreshing its recency on a hit.
    /// Never inserts.
    pub fn lookup(&mut self, vpn: u32) -> Lookup {
        self.history.accesses += 1;

        let index = self.get_index(vpn);
        let tag = self.get_tag(vpn);
        let set = &mut self.sets[index];

        match set.find(tag) {
            Some(way) => {
                self.history.hits += 1;
                set.touch(way);
                let entry = set.entries[way];
                trace!("tlb hit vpn={:#07x} ppn={:#07x}", vpn, entry.ppn);
                Lookup::Hit { ppn: entry.ppn, dirty: entry.dirty }
            }
            None => {
                self.history.misses += 1;
                trace!("tlb miss vpn={:#07x}", vpn);
                Lookup::Miss
            }
        }
    }

    /// Install or refresh a translation
    pub fn insert(&mut self, vpn: u32, ppn: u32) {
        let index = self.get_index(vpn);
        let tag = self.get_tag(vpn);
        let set = &mut self.sets[index];

        if let Some(way) = set.find(tag) {
            set.entries[way].ppn = ppn;
            set.touch(way);
            return;
        }

        let way = set.victim();
        set.entries[way] = TlbEntry { valid: true, dirty: false, tag, ppn };
        set.touch(way);
        trace!("tlb insert vpn={:#07x} ppn={:#07x} way={}", vpn, ppn, way);
    }

    /// Mark a resident translation dirty; absent VPNs are left alone
    pub fn set_dirty(&mut self, vpn: u32) {
        let index = self.get_index(vpn);
        let tag = self.get_tag(vpn);
        let set = &mut self.sets[index];
        if let Some(way) = set.find(tag) {
            set.entries[way].dirty = true;
        }
    }

    /// Probe without touching statistics or recency
    pub fn probe(&self, vpn: u32) -> Option<&TlbEntry> {
        let set = &self.sets[self.get_index(vpn)];
        set.find(self.get_tag(vpn)).map(|way| &set.entries[way])
    }

    pub fn write_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "* TLB Statistics *")?;
        writeln!(out, "total accesses: {}", self.history.accesses)?;
        writeln!(out, "hits: {}", self.history.hits)?;
        writeln!(out, "misses: {}", self.history.misses)
    }

    /// Dump every slot, resident or not
    pub fn write_entries(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "TLB Entries (Valid-Bit Dirty-Bit VPN PPN)")?;
        for (index, set) in self.sets.iter().enumerate() {
            for entry in &set.entries {
                if entry.valid {
                    let vpn = (entry.tag << self.index_bits) | index as u32;
                    writeln!(
                        out,
                        "1 {} {:#07x} {:#07x}",
                        entry.dirty as u8, vpn, entry.ppn
                    )?;
                } else {
                    writeln!(out, "0 0 - -")?;
                }
            }
        }
        Ok(())
    }
}

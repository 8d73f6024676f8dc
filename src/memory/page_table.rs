//! Linear page table with an LRU frame allocator
//!
//! Every physical frame is on exactly one of two lists: the free list, or
//! the used list ordered from most to least recently used. A present page
//! table entry owns one frame and that frame points back at the entry.

use std::io::{self, Write};

use log::{debug, trace};

use super::lru::RecencyList;
use super::Lookup;
use crate::config::PAGE_TABLE_ENTRIES;
use crate::error::PageTableError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PageTableEntry {
    pub present: bool,
    pub dirty: bool,
    pub ppn: u32,
}

/// A physical frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Frame {
    pub frame_id: u32,
    /// VPN of the entry currently mapped to this frame
    pub owner: Option<u32>,
}

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub struct PageTableHistory {
    pub accesses: u64,
    pub faults: u64,
    /// Faults that had to write a dirty victim back
    pub dirty_faults: u64,
}

#[derive(Clone, Debug)]
pub struct PageTable {
    pub history: PageTableHistory,

    entries: Vec<PageTableEntry>,
    frames: Vec<Frame>,

    free_list: RecencyList,
    used_list: RecencyList,
}

impl PageTable {
    /// Make a page table with the default number of entries
    pub fn make(num_frames: u32) -> Result<Self, PageTableError> {
        Self::make_sized(PAGE_TABLE_ENTRIES, num_frames)
    }

    pub fn make_sized(
        num_entries: usize,
        num_frames: u32,
    ) -> Result<Self, PageTableError> {
        if num_frames == 0 {
            return Err(PageTableError::EmptyFramePool);
        }
        debug!(
            "page table: {} entries, {} physical frames",
            num_entries, num_frames
        );

        let frames = (0..num_frames)
            .map(|frame_id| Frame { frame_id, owner: None })
            .collect();

        Ok(Self {
            history: PageTableHistory::default(),
            entries: vec![PageTableEntry::default(); num_entries],
            frames,
            // Frames are handed out in ascending order
            free_list: RecencyList::make_full(num_frames as usize),
            used_list: RecencyList::make(num_frames as usize),
        })
    }

    pub fn num_entries(&self) -> usize {
        self.entries.len()
    }

    pub fn num_frames(&self) -> usize {
        self.frames.len()
    }

    pub fn free_frames(&self) -> usize {
        self.free_list.len()
    }

    pub fn used_frames(&self) -> usize {
        self.used_list.len()
    }

    pub fn entry(&self, vpn: u32) -> Option<&PageTableEntry> {
        self.entries.get(vpn as usize)
    }

    pub fn frame(&self, frame_id: u32) -> Option<&Frame> {
        self.frames.get(frame_id as usize)
    }

    /// Used frames from most to least recently used
    pub fn used_order(&self) -> Vec<u32> {
        self.used_list.iter().map(|frame| frame as u32).collect()
    }

    /// Look up a translation, refreshing the frame's recency on a hit.
    /// Never inserts; faults are serviced by `handle_fault`.
    pub fn lookup(&mut self, vpn: u32) -> Lookup {
        self.history.accesses += 1;

        match self.entries.get(vpn as usize) {
            Some(pte) if pte.present => {
                let (ppn, dirty) = (pte.ppn, pte.dirty);
                self.used_list.move_to_front(ppn as usize);
                Lookup::Hit { ppn, dirty }
            }
            _ => Lookup::Miss,
        }
    }

    /// Map `vpn` to a frame, evicting the least recently used page if no
    /// frame is free. Returns the frame id.
    pub fn handle_fault(&mut self, vpn: u32) -> Result<u32, PageTableError> {
        let Some(pte) = self.entries.get(vpn as usize) else {
            return Err(PageTableError::VpnOutOfRange(vpn));
        };
        if pte.present {
            let ppn = pte.ppn;
            self.used_list.move_to_front(ppn as usize);
            return Ok(ppn);
        }

        self.history.faults += 1;

        let frame = match self.free_list.pop_front() {
            Some(frame) => frame,
            None => self
                .evict()
                .ok_or(PageTableError::FrameExhaustion(vpn))?,
        };

        read_page_from_disk(vpn, frame as u32);

        self.entries[vpn as usize] = PageTableEntry {
            present: true,
            dirty: false,
            ppn: frame as u32,
        };
        self.frames[frame].owner = Some(vpn);
        self.used_list.push_front(frame);

        trace!("page fault vpn={:#07x} -> frame {:#07x}", vpn, frame);
        Ok(frame as u32)
    }

    /// Take the least recently used frame away from its owner
    fn evict(&mut self) -> Option<usize> {
        let frame = self.used_list.pop_back()?;
        if let Some(old_vpn) = self.frames[frame].owner.take() {
            let pte = &mut self.entries[old_vpn as usize];
            pte.present = false;
            if pte.dirty {
                self.history.dirty_faults += 1;
                write_page_to_disk(old_vpn, frame as u32);
                pte.dirty = false;
            }
            trace!("evict vpn={:#07x} from frame {:#07x}", old_vpn, frame);
        }
        Some(frame)
    }

    /// Mark a resident page dirty; absent pages are left alone
    pub fn set_dirty(&mut self, vpn: u32) {
        if let Some(pte) = self.entries.get_mut(vpn as usize) {
            if pte.present {
                pte.dirty = true;
            }
        }
    }

    /// Every frame is on exactly one list, and owners and entries agree
    pub fn frames_consistent(&self) -> bool {
        if self.free_list.len() + self.used_list.len() != self.frames.len() {
            return false;
        }
        self.frames.iter().enumerate().all(|(i, frame)| {
            let free = self.free_list.contains(i);
            let used = self.used_list.contains(i);
            if free == used {
                return false;
            }
            match frame.owner {
                Some(vpn) => {
                    used && self.entries.get(vpn as usize).is_some_and(|pte| {
                        pte.present && pte.ppn == frame.frame_id
                    })
                }
                None => free,
            }
        })
    }

    pub fn write_stats(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "* Page Table Statistics *")?;
        writeln!(out, "total accesses: {}", self.history.accesses)?;
        writeln!(out, "page faults: {}", self.history.faults)?;
        writeln!(
            out,
            "page faults with a dirty bit: {}",
            self.history.dirty_faults
        )
    }

    /// Dump resident entries only
    pub fn write_entries(&self, out: &mut dyn Write) -> io::Result<()> {
        writeln!(out)?;
        writeln!(out, "Page Table Entries (Present-Bit Dirty-Bit VPN PPN)")?;
        for (vpn, pte) in self.entries.iter().enumerate() {
            if pte.present {
                writeln!(
                    out,
                    "1 {} {:#07x} {:#07x}",
                    pte.dirty as u8, vpn, pte.ppn
                )?;
            }
        }
        Ok(())
    }
}

/// Disk is not modelled, so loading a page is a no-op
fn read_page_from_disk(vpn: u32, frame: u32) {
    trace!("load vpn={:#07x} into frame {:#07x}", vpn, frame);
}

/// Disk is not modelled, so writing a page back is a no-op
fn write_page_to_disk(vpn: u32, frame: u32) {
    trace!("write back vpn={:#07x} from frame {:#07x}", vpn, frame);
}

//! Virtual to physical address translation through the TLB and page table

use log::{trace, warn};

use crate::config::{TlbConfig, PAGE_OFFSET_BITS, PAGE_SIZE};
use crate::error::SimulatorResult;
use crate::memory::page_table::PageTable;
use crate::memory::tlb::Tlb;
use crate::memory::{AccessOutcome, AccessType, Lookup};

pub fn get_vpn(vaddr: u32) -> u32 {
    vaddr >> PAGE_OFFSET_BITS
}

pub fn get_page_offset(vaddr: u32) -> u32 {
    vaddr & (PAGE_SIZE - 1)
}

pub fn make_paddr(ppn: u32, offset: u32) -> u32 {
    (ppn << PAGE_OFFSET_BITS) | offset
}

/// How the page table took part in a translation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PageOutcome {
    /// The TLB hit, so the translation came from there
    NotConsulted,
    Hit,
    Fault,
    /// The VPN lies beyond the page table; the address passes through
    /// unmapped and nothing is allocated
    Unmapped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Translation {
    pub paddr: u32,
    pub tlb: AccessOutcome,
    pub page: PageOutcome,
}

pub struct AddressTranslator {
    pub tlb: Tlb,
    pub page_table: PageTable,
}

impl AddressTranslator {
    pub fn make(tlb: TlbConfig, physical_pages: u32) -> SimulatorResult<Self> {
        Ok(Self {
            tlb: Tlb::make(tlb)?,
            page_table: PageTable::make(physical_pages)?,
        })
    }

    pub fn translate(
        &mut self,
        vaddr: u32,
        access_type: AccessType,
    ) -> SimulatorResult<Translation> {
        let vpn = get_vpn(vaddr);

        let (ppn, tlb, page) = match self.tlb.lookup(vpn) {
            Lookup::Hit { ppn, .. } => {
                // Keep the page table's recency in step with the TLB
                self.page_table.lookup(vpn);
                (ppn, AccessOutcome::Hit, PageOutcome::NotConsulted)
            }
            Lookup::Miss => {
                let (ppn, page) = match self.page_table.lookup(vpn) {
                    Lookup::Hit { ppn, .. } => (ppn, PageOutcome::Hit),
                    Lookup::Miss
                        if vpn as usize >= self.page_table.num_entries() =>
                    {
                        warn!(
                            "vpn {:#x} of {:#010x} is outside the page table, passing it through",
                            vpn, vaddr
                        );
                        return Ok(Translation {
                            paddr: vaddr,
                            tlb: AccessOutcome::Miss,
                            page: PageOutcome::Unmapped,
                        });
                    }
                    Lookup::Miss => {
                        (self.page_table.handle_fault(vpn)?, PageOutcome::Fault)
                    }
                };
                self.tlb.insert(vpn, ppn);
                (ppn, AccessOutcome::Miss, page)
            }
        };

        if access_type == AccessType::Write {
            self.tlb.set_dirty(vpn);
            self.page_table.set_dirty(vpn);
        }

        let paddr = make_paddr(ppn, get_page_offset(vaddr));
        trace!("translate {:#010x} -> {:#010x}", vaddr, paddr);
        Ok(Translation { paddr, tlb, page })
    }
}

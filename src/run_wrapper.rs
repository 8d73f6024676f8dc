//! A simulator wrapper

use std::io::{self, BufRead, BufWriter, Write};

use log::{debug, info};

use crate::config::{CacheLayout, SimConfig};
use crate::error::SimulatorResult;
use crate::memory::cache::Cache;
use crate::memory::multilevel::MultilevelCache;
use crate::memory::{AccessOutcome, HierarchyOutcome, StorageInterface};
use crate::trace::{TraceOp, TraceReader};
use crate::translate::{AddressTranslator, PageOutcome, Translation};

/// Everything that happened to one access
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AccessRecord {
    pub op: TraceOp,
    pub translation: Translation,
    pub cache: HierarchyOutcome,
}

/// Build the cache side of the simulation from its layout
pub fn make_storage(
    layout: &CacheLayout,
) -> SimulatorResult<Box<dyn StorageInterface>> {
    let storage: Box<dyn StorageInterface> = match layout {
        CacheLayout::Single(config) => Box::new(Cache::make(*config)?),
        CacheLayout::Hierarchy(levels) => {
            Box::new(MultilevelCache::make(levels)?)
        }
    };
    Ok(storage)
}

pub struct Simulation {
    pub translator: AddressTranslator,
    pub storage: Box<dyn StorageInterface>,
    verbose: bool,
    dump_cache: bool,
}

impl Simulation {
    pub fn make(config: &SimConfig) -> SimulatorResult<Self> {
        config.validate_geometry()?;

        let translator =
            AddressTranslator::make(config.tlb, config.physical_pages)?;
        let storage = make_storage(&config.cache)?;
        debug!(
            "simulation ready: {} cache level(s), {} physical frames",
            storage.n(),
            config.physical_pages
        );

        Ok(Self {
            translator,
            storage,
            verbose: config.verbose,
            dump_cache: config.dump_cache,
        })
    }

    /// Translate one access and send it through the caches
    pub fn step(&mut self, op: TraceOp) -> SimulatorResult<AccessRecord> {
        let translation = self.translator.translate(op.address, op.access_type)?;
        let cache = self.storage.access(translation.paddr, op.access_type);
        Ok(AccessRecord { op, translation, cache })
    }

    /// Render a record as a verbose trace line
    pub fn describe(&self, record: &AccessRecord) -> String {
        let tlb = match record.translation.tlb {
            AccessOutcome::Hit => "TLB-HIT",
            AccessOutcome::Miss => "TLB-MISS",
        };
        let page = match record.translation.page {
            PageOutcome::NotConsulted => "-",
            PageOutcome::Hit => "PAGE-HIT",
            PageOutcome::Fault | PageOutcome::Unmapped => "PAGE-FAULT",
        };
        format!(
            "{} {:#010x} {:#010x} {} {} {}",
            record.op.mode,
            record.op.address,
            record.translation.paddr,
            tlb,
            page,
            self.storage.describe(record.cache)
        )
    }

    /// Replay accesses in order and return how many were processed
    pub fn replay<I>(&mut self, ops: I, out: &mut dyn Write) -> SimulatorResult<u64>
    where
        I: IntoIterator<Item = io::Result<TraceOp>>,
    {
        let mut count = 0;
        for op in ops {
            let record = self.step(op?)?;
            if self.verbose {
                writeln!(out, "{}", self.describe(&record))?;
            }
            count += 1;
        }
        Ok(count)
    }

    pub fn run_trace<R: BufRead>(
        &mut self,
        trace: R,
        out: &mut dyn Write,
    ) -> SimulatorResult<u64> {
        self.replay(TraceReader::new(trace), out)
    }

    /// Statistics, then entry dumps in verbose mode
    pub fn write_report(&self, out: &mut dyn Write) -> io::Result<()> {
        self.translator.tlb.write_stats(out)?;
        self.translator.page_table.write_stats(out)?;
        self.storage.write_stats(out)?;

        if self.verbose {
            self.translator.tlb.write_entries(out)?;
            self.translator.page_table.write_entries(out)?;
            if self.dump_cache {
                self.storage.write_entries(out)?;
            }
        }
        Ok(())
    }
}

/// Run simulation on the trace named by the configuration, writing the
/// report to stdout
pub fn run(config: &SimConfig) -> SimulatorResult<()> {
    let mut sim = Simulation::make(config)?;
    let trace = TraceReader::open(&config.trace_path)?;

    let stdout = io::stdout();
    let mut out = BufWriter::new(stdout.lock());

    let count = sim.replay(trace, &mut out)?;
    info!("processed {} accesses from {}", count, config.trace_path.display());

    sim.write_report(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Replay pre-fetched accesses on a fresh simulation, discarding the
/// per-access output
pub fn run_operations(
    config: &SimConfig,
    ops: &[TraceOp],
) -> SimulatorResult<Simulation> {
    let mut sim = Simulation::make(config)?;
    let count = sim.replay(ops.iter().copied().map(Ok), &mut io::sink())?;
    debug!("replayed {} accesses", count);
    Ok(sim)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Associativity, CacheConfig, TlbConfig};
    use crate::error::{ConfigError, SimulatorError};
    use pretty_assertions::assert_eq;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn make_config(cache: CacheLayout, tlb_entries: u32) -> SimConfig {
        SimConfig::make(
            cache,
            TlbConfig::make(tlb_entries, Associativity::DirectMapped),
            PathBuf::from("unused.trace"),
        )
    }

    fn run_to_string(sim: &mut Simulation, trace: &str) -> String {
        let mut out: Vec<u8> = Vec::new();
        sim.run_trace(Cursor::new(trace), &mut out).unwrap();
        sim.write_report(&mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_direct_mapped_scenario() {
        init_logging();
        let mut config = make_config(
            CacheLayout::Single(CacheConfig::make(
                16,
                4,
                Associativity::DirectMapped,
            )),
            2,
        );
        config.verbose = true;
        let mut sim = Simulation::make(&config).unwrap();

        let output =
            run_to_string(&mut sim, "R 0x0\nR 0x4\nR 0x8\nR 0xC\nR 0x0\n");
        let expected = "\
R 0x00000000 0x00000000 TLB-MISS PAGE-FAULT CACHE-MISS
R 0x00000004 0x00000004 TLB-HIT - CACHE-MISS
R 0x00000008 0x00000008 TLB-HIT - CACHE-MISS
R 0x0000000c 0x0000000c TLB-HIT - CACHE-MISS
R 0x00000000 0x00000000 TLB-HIT - CACHE-HIT

* TLB Statistics *
total accesses: 5
hits: 4
misses: 1

* Page Table Statistics *
total accesses: 5
page faults: 1
page faults with a dirty bit: 0

* Cache Statistics *
total accesses: 5
hits: 1
misses: 4
total reads: 5
read hits: 1
total writes: 0
write hits: 0

TLB Entries (Valid-Bit Dirty-Bit VPN PPN)
1 0 0x00000 0x00000
0 0 - -

Page Table Entries (Present-Bit Dirty-Bit VPN PPN)
1 0 0x00000 0x00000
";
        assert_eq!(output, expected);
    }

    #[test]
    fn test_quiet_run_prints_stats_only() {
        let config = make_config(
            CacheLayout::Single(CacheConfig::make(8, 4, Associativity::TwoWay)),
            4,
        );
        let mut sim = Simulation::make(&config).unwrap();
        let output = run_to_string(&mut sim, "R 0x0\nR 0x4\nR 0x8\nR 0x0\n");
        assert!(output.starts_with("\n* TLB Statistics *\n"));
        assert!(!output.contains("Entries"));

        // 0x0 was the LRU line when 0x8 came in
        let history = sim.storage.get_history();
        assert_eq!(history[0].hits, 0);
        assert_eq!(history[0].misses, 4);
    }

    #[test]
    fn test_translation_moves_physical_address() {
        let mut config = make_config(
            CacheLayout::Single(CacheConfig::make(
                64,
                4,
                Associativity::FullyAssociative,
            )),
            4,
        );
        config.verbose = true;
        let mut sim = Simulation::make(&config).unwrap();

        let mut out: Vec<u8> = Vec::new();
        sim.run_trace(Cursor::new("w 0x12345\nR 0x7010\nr 0x12348\n"), &mut out)
            .unwrap();
        let lines = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = lines.lines().collect();
        assert_eq!(
            lines,
            vec![
                "w 0x00012345 0x00000345 TLB-MISS PAGE-FAULT CACHE-MISS",
                "R 0x00007010 0x00001010 TLB-MISS PAGE-FAULT CACHE-MISS",
                "r 0x00012348 0x00000348 TLB-HIT - CACHE-MISS",
            ]
        );
        assert!(sim.translator.page_table.entry(0x12).unwrap().dirty);
        assert!(sim.translator.page_table.frames_consistent());
    }

    #[test]
    fn test_multilevel_report() {
        let mut config = make_config(
            CacheLayout::Hierarchy(vec![
                CacheConfig::make(16, 4, Associativity::DirectMapped),
                CacheConfig::make(64, 4, Associativity::FullyAssociative),
            ]),
            2,
        );
        config.verbose = true;
        config.dump_cache = true;
        let mut sim = Simulation::make(&config).unwrap();

        let output =
            run_to_string(&mut sim, "R 0x0\nW 0x10\nR 0x0\nR 0x0\n");
        let lines: Vec<&str> = output.lines().take(4).collect();
        assert_eq!(
            lines,
            vec![
                "R 0x00000000 0x00000000 TLB-MISS PAGE-FAULT L1-MISS L2-MISS",
                "W 0x00000010 0x00000010 TLB-HIT - L1-MISS L2-MISS",
                "R 0x00000000 0x00000000 TLB-HIT - L1-MISS L2-HIT",
                "R 0x00000000 0x00000000 TLB-HIT - L1-HIT L2-HIT",
            ]
        );
        assert!(output.contains("\n* Multi-Level Cache Summary *\nL1 accesses: 4\nL2 accesses: 3\n"));
        assert!(output.contains("\nL1 Cache Entries (Valid-Bit Dirty-Bit Tag Block-Address)\n"));
        assert!(output.contains("\nL2 Cache Entries (Valid-Bit Dirty-Bit Tag Block-Address)\n"));
    }

    #[test]
    fn test_dirty_page_eviction() {
        let mut config = make_config(
            CacheLayout::Single(CacheConfig::default()),
            2,
        );
        config.physical_pages = 2;
        let mut sim = Simulation::make(&config).unwrap();

        let trace = "W 0x1000\nR 0x2000\nR 0x3000\nR 0x4000\nR 0x1000\n";
        sim.run_trace(Cursor::new(trace), &mut std::io::sink()).unwrap();

        let history = sim.translator.page_table.history;
        assert_eq!(history.faults, 5);
        assert_eq!(history.dirty_faults, 1);
        assert_eq!(sim.translator.page_table.free_frames(), 0);
        assert!(sim.translator.page_table.frames_consistent());
    }

    #[test]
    fn test_malformed_line_ends_trace() {
        let config =
            make_config(CacheLayout::Single(CacheConfig::default()), 2);
        let mut sim = Simulation::make(&config).unwrap();
        let count = sim
            .run_trace(Cursor::new("R 0x0\nR 0x4\nbogus\nR 0x8\n"), &mut std::io::sink())
            .unwrap();
        assert_eq!(count, 2);
        assert_eq!(sim.translator.tlb.history.accesses, 2);
    }

    #[test]
    fn test_out_of_range_vpn_passes_through() {
        init_logging();
        let mut config = make_config(
            CacheLayout::Single(CacheConfig::make(
                16,
                4,
                Associativity::DirectMapped,
            )),
            2,
        );
        config.verbose = true;
        let mut sim = Simulation::make(&config).unwrap();

        let mut out: Vec<u8> = Vec::new();
        let count = sim
            .run_trace(Cursor::new("R 0x0\nR 0x04000000\nR 0x4\n"), &mut out)
            .unwrap();
        sim.write_report(&mut out).unwrap();
        assert_eq!(count, 3);
        assert!(sim.translator.page_table.frames_consistent());

        let expected = "\
R 0x00000000 0x00000000 TLB-MISS PAGE-FAULT CACHE-MISS
R 0x04000000 0x04000000 TLB-MISS PAGE-FAULT CACHE-MISS
R 0x00000004 0x00000004 TLB-HIT - CACHE-MISS

* TLB Statistics *
total accesses: 3
hits: 1
misses: 2

* Page Table Statistics *
total accesses: 3
page faults: 1
page faults with a dirty bit: 0

* Cache Statistics *
total accesses: 3
hits: 0
misses: 3
total reads: 3
read hits: 0
total writes: 0
write hits: 0

TLB Entries (Valid-Bit Dirty-Bit VPN PPN)
1 0 0x00000 0x00000
0 0 - -

Page Table Entries (Present-Bit Dirty-Bit VPN PPN)
1 0 0x00000 0x00000
";
        assert_eq!(String::from_utf8(out).unwrap(), expected);
    }

    #[test]
    fn test_run_operations() {
        let mut config =
            make_config(CacheLayout::Single(CacheConfig::default()), 2);
        config.verbose = true;
        let ops: Vec<TraceOp> = ["R 0x0", "W 0x0", "R 0x1000"]
            .iter()
            .filter_map(|line| crate::trace::parse_line(line))
            .collect();
        let sim = run_operations(&config, &ops).unwrap();
        let history = sim.storage.get_history();
        assert_eq!(history[0].accesses, 3);
        assert_eq!(history[0].write_hits, 1);
        assert_eq!(sim.translator.page_table.history.faults, 2);
    }

    #[test]
    fn test_make_rejects_invalid_geometry() {
        let config = make_config(
            CacheLayout::Single(CacheConfig::make(
                24,
                4,
                Associativity::DirectMapped,
            )),
            2,
        );
        assert!(matches!(
            Simulation::make(&config),
            Err(SimulatorError::ConfigError(ConfigError::NonPowerOfTwoSets(6)))
        ));
    }
}

use std::path::PathBuf;

use clap::Parser;
use log::info;

use sim_lib::config::{
    Associativity, CacheConfig, CacheLayout, SimConfig, TlbConfig,
};
use sim_lib::run_wrapper::run_operations;
use sim_lib::trace::fetch_operations;

/// Compare single-level and two-level caches over one trace
#[derive(Parser, Debug)]
#[command(name = "hierarchy-eval", version)]
struct Args {
    /// Trace file to replay
    trace: PathBuf,

    /// Directory for the CSV output
    #[arg(long, default_value = "eval")]
    out_dir: PathBuf,

    /// Number of TLB entries
    #[arg(short = 'T', long, default_value_t = 16)]
    tlb_entries: u32,
}

fn layouts() -> Vec<(&'static str, CacheLayout)> {
    use Associativity::*;
    vec![
        (
            "L1 1K direct",
            CacheLayout::Single(CacheConfig::make(1024, 16, DirectMapped)),
        ),
        (
            "L1 4K 4-way",
            CacheLayout::Single(CacheConfig::make(4096, 16, FourWay)),
        ),
        (
            "L1 1K direct + L2 16K 4-way",
            CacheLayout::Hierarchy(vec![
                CacheConfig::make(1024, 16, DirectMapped),
                CacheConfig::make(16 * 1024, 16, FourWay),
            ]),
        ),
        (
            "L1 1K 2-way + L2 16K fully",
            CacheLayout::Hierarchy(vec![
                CacheConfig::make(1024, 16, TwoWay),
                CacheConfig::make(16 * 1024, 64, FullyAssociative),
            ]),
        ),
        (
            "L1 4K 4-way + L2 64K 4-way",
            CacheLayout::Hierarchy(vec![
                CacheConfig::make(4096, 16, FourWay),
                CacheConfig::make(64 * 1024, 64, FourWay),
            ]),
        ),
    ]
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let ops = fetch_operations(&args.trace)?;
    let trace_base_name = args
        .trace
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("trace"));

    std::fs::create_dir_all(&args.out_dir)?;
    let output_path =
        args.out_dir.join(format!("hierarchy_{}.csv", trace_base_name));
    let mut writer = csv::Writer::from_path(&output_path)?;
    writer.write_record([
        "Configuration",
        "L1 accesses",
        "L1 miss rate",
        "L2 accesses",
        "L2 miss rate",
        "Global miss rate",
    ])?;

    for (name, layout) in layouts() {
        let config = SimConfig::make(
            layout,
            TlbConfig::make(args.tlb_entries, Associativity::DirectMapped),
            args.trace.clone(),
        );
        let sim = run_operations(&config, &ops)?;
        let storage = &sim.storage;

        let mut record = vec![name.to_string()];
        for k in 0..2 {
            match storage.caches(k) {
                Some(cache) => {
                    record.push(storage.level_accesses(k).to_string());
                    record.push(format!("{:.4}", cache.history.get_miss_rate()));
                }
                None => record.extend([String::new(), String::new()]),
            }
        }

        let global = storage.get_global_miss_rate();
        record.push(format!("{:.4}", global));

        writer.write_record(&record)?;
        info!("{}: global miss rate {:.4}", name, global);
    }

    writer.flush()?;
    info!("wrote {}", output_path.display());
    Ok(())
}

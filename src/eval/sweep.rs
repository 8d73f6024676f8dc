use std::fmt::Display;
use std::path::PathBuf;

use clap::Parser;
use log::{info, warn};
use plotters::prelude::*;

use sim_lib::config::{
    Associativity, CacheConfig, CacheLayout, SimConfig, TlbConfig,
};
use sim_lib::error::SimulatorError;
use sim_lib::run_wrapper::run_operations;
use sim_lib::trace::fetch_operations;

/// Sweep single-level cache geometries over one trace
#[derive(Parser, Debug)]
#[command(name = "sweep-eval", version)]
struct Args {
    /// Trace file to replay
    trace: PathBuf,

    /// Directory for the CSV and SVG output
    #[arg(long, default_value = "eval")]
    out_dir: PathBuf,

    /// Number of TLB entries
    #[arg(short = 'T', long, default_value_t = 16)]
    tlb_entries: u32,
}

const ASSOCIATIVITIES: [Associativity; 4] = [
    Associativity::DirectMapped,
    Associativity::TwoWay,
    Associativity::FourWay,
    Associativity::FullyAssociative,
];

fn plot_error(e: impl Display) -> SimulatorError {
    SimulatorError::PlotError(e.to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    // Cache sizes: 1KB, 4KB, 16KB, 64KB
    let cache_sizes: Vec<u32> = vec![1024, 4 * 1024, 16 * 1024, 64 * 1024];
    // Block sizes: 4B, 16B, 64B, 256B
    let block_sizes: Vec<u32> = vec![4, 16, 64, 256];

    let ops = fetch_operations(&args.trace)?;
    let trace_base_name = args
        .trace
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| String::from("trace"));
    info!("sweeping {} accesses from {}", ops.len(), trace_base_name);

    std::fs::create_dir_all(&args.out_dir)?;
    let csv_path = args.out_dir.join(format!("sweep_{}.csv", trace_base_name));
    let mut writer = csv::Writer::from_path(&csv_path)?;
    writer.write_record([
        "Size",
        "Block",
        "Assoc",
        "Accesses",
        "Hits",
        "Misses",
        "Miss rate",
        "Write-backs",
    ])?;

    // Direct-mapped miss rate per cache size, for the plot
    let mut data: Vec<Vec<(u32, f64)>> = vec![vec![]; cache_sizes.len()];
    let mut y_max: f64 = 0.;
    for (i, cache_size) in cache_sizes.iter().enumerate() {
        for block_size in block_sizes.iter() {
            for assoc in ASSOCIATIVITIES {
                let cache = CacheConfig::make(*cache_size, *block_size, assoc);
                if let Err(e) = cache.validate() {
                    warn!("skipping {:?}: {}", cache, e);
                    continue;
                }
                let config = SimConfig::make(
                    CacheLayout::Single(cache),
                    TlbConfig::make(args.tlb_entries, Associativity::DirectMapped),
                    args.trace.clone(),
                );
                let sim = run_operations(&config, &ops)?;
                let Some(history) = sim.storage.get_history().first().copied()
                else {
                    continue;
                };

                let miss_rate = history.get_miss_rate();
                writer.write_record(&[
                    cache_size.to_string(),
                    block_size.to_string(),
                    assoc.label().to_string(),
                    history.accesses.to_string(),
                    history.hits.to_string(),
                    history.misses.to_string(),
                    format!("{:.4}", miss_rate),
                    history.write_backs.to_string(),
                ])?;

                if assoc == Associativity::DirectMapped {
                    data[i].push((*block_size, miss_rate));
                    y_max = y_max.max(miss_rate);
                }
            }
        }
    }
    writer.flush()?;
    info!("wrote {}", csv_path.display());

    // Plot the data
    let plot_title = format!("Direct-mapped miss rate: {}", trace_base_name);
    let svg_path = args.out_dir.join(format!("sweep_{}.svg", trace_base_name));
    let x_max = block_sizes.iter().copied().max().unwrap_or(4) as i32;
    let y_max = if y_max > 0. { y_max * 1.1 } else { 1.0 };

    let root = SVGBackend::new(&svg_path, (800, 600)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_error)?;

    let mut ctx = ChartBuilder::on(&root)
        .caption(plot_title.as_str(), ("sans-serif", 40).into_font())
        .margin(5)
        .x_label_area_size(40)
        .y_label_area_size(40)
        .build_cartesian_2d(0..x_max + 4, 0.0..y_max)
        .map_err(plot_error)?;
    ctx.configure_mesh()
        .x_desc("Block size")
        .y_desc("Miss rate")
        .draw()
        .map_err(plot_error)?;

    for (i, cache_size) in cache_sizes.iter().enumerate() {
        let series = data[i].iter().map(|(x, y)| (*x as i32, *y));
        let label = format!("Cache size = {}", cache_size);
        let color = Palette99::pick(i).to_rgba();
        ctx.draw_series(LineSeries::new(series, color))
            .map_err(plot_error)?
            .label(label)
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], color)
            });
    }

    ctx.configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()
        .map_err(plot_error)?;
    root.present().map_err(plot_error)?;
    info!("wrote {}", svg_path.display());

    Ok(())
}

use std::ffi::OsString;
use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::config::{
    Associativity, CacheConfig, CacheLayout, SimConfig, TlbConfig,
    DEFAULT_BLOCK_SIZE, NUM_PHYSICAL_PAGES,
};
use crate::error::ConfigError;

/// Virtual memory and cache hierarchy simulator.
///
/// Associativity codes: 1 = direct-mapped, 2 = fully-associative,
/// 3 = 2-way, 4 = 4-way.
#[derive(Parser, Debug)]
#[command(name = "sim", version)]
pub struct SimArgs {
    /// Cache size in bytes (single-level cache)
    #[arg(short = 'S', value_name = "BYTES")]
    pub size: Option<u32>,

    /// Block size in bytes (single-level cache)
    #[arg(short = 'B', value_name = "BYTES", default_value_t = DEFAULT_BLOCK_SIZE)]
    pub block_size: u32,

    /// Associativity code (single-level cache)
    #[arg(short = 'A', value_name = "CODE", default_value = "1", value_parser = parse_associativity)]
    pub associativity: Associativity,

    /// L1 size in bytes; together with --s2 selects the two-level cache
    #[arg(long = "s1", value_name = "BYTES")]
    pub l1_size: Option<u32>,

    /// L1 block size in bytes [default: 4]
    #[arg(long = "b1", value_name = "BYTES")]
    pub l1_block_size: Option<u32>,

    /// L1 associativity code [default: 2]
    #[arg(long = "a1", value_name = "CODE", value_parser = parse_associativity)]
    pub l1_associativity: Option<Associativity>,

    /// L2 size in bytes
    #[arg(long = "s2", value_name = "BYTES")]
    pub l2_size: Option<u32>,

    /// L2 block size in bytes [default: 4]
    #[arg(long = "b2", value_name = "BYTES")]
    pub l2_block_size: Option<u32>,

    /// L2 associativity code [default: 2]
    #[arg(long = "a2", value_name = "CODE", value_parser = parse_associativity)]
    pub l2_associativity: Option<Associativity>,

    /// Number of TLB entries
    #[arg(short = 'T', value_name = "ENTRIES")]
    pub tlb_entries: Option<u32>,

    /// TLB associativity code
    #[arg(short = 'L', value_name = "CODE", default_value = "1", value_parser = parse_associativity)]
    pub tlb_associativity: Associativity,

    /// Path to the trace file
    #[arg(short = 't', value_name = "PATH")]
    pub trace: Option<PathBuf>,

    /// Print every access, then the TLB and page table entries
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Also print cache lines in verbose mode
    #[arg(long)]
    pub dump_cache: bool,

    /// Number of physical frames
    #[arg(long, value_name = "FRAMES", default_value_t = NUM_PHYSICAL_PAGES)]
    pub physical_pages: u32,
}

fn parse_associativity(s: &str) -> Result<Associativity, String> {
    let code = s
        .parse::<u32>()
        .map_err(|_| format!("Invalid associativity: '{}'. Expected 1-4.", s))?;
    Associativity::from_code(code).map_err(|e| e.to_string())
}

/// Rewrite the single-dash level flags (`-S1`, `-B2`, ...) to their long
/// form, since clap would read `-S1` as `-S 1`
pub fn normalize_legacy_args<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(Into::into)
        .map(|arg| {
            let long = match arg.to_str() {
                Some("-S1") => "--s1",
                Some("-B1") => "--b1",
                Some("-A1") => "--a1",
                Some("-S2") => "--s2",
                Some("-B2") => "--b2",
                Some("-A2") => "--a2",
                _ => return arg,
            };
            OsString::from(long)
        })
        .collect()
}

/// Parse the command line. Help and version requests print and exit.
pub fn parse_args<I, T>(args: I) -> Result<SimArgs, ConfigError>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    SimArgs::try_parse_from(normalize_legacy_args(args)).map_err(|e| {
        match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => e.exit(),
            _ => ConfigError::InvalidArguments(e.to_string()),
        }
    })
}

impl SimArgs {
    /// Build the simulator configuration. Both level sizes select the
    /// two-level cache; otherwise the single-level flags apply.
    pub fn into_config(self) -> Result<SimConfig, ConfigError> {
        let cache = match (self.l1_size, self.l2_size) {
            (Some(l1_size), Some(l2_size)) => CacheLayout::Hierarchy(vec![
                CacheConfig::make(
                    l1_size,
                    self.l1_block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
                    self.l1_associativity
                        .unwrap_or(Associativity::FullyAssociative),
                ),
                CacheConfig::make(
                    l2_size,
                    self.l2_block_size.unwrap_or(DEFAULT_BLOCK_SIZE),
                    self.l2_associativity
                        .unwrap_or(Associativity::FullyAssociative),
                ),
            ]),
            _ => CacheLayout::Single(CacheConfig::make(
                self.size.ok_or(ConfigError::MissingCacheSize)?,
                self.block_size,
                self.associativity,
            )),
        };

        let tlb = TlbConfig::make(
            self.tlb_entries.ok_or(ConfigError::MissingTlbEntries)?,
            self.tlb_associativity,
        );
        let trace_path = self.trace.ok_or(ConfigError::MissingTrace)?;

        let mut config = SimConfig::make(cache, tlb, trace_path);
        config.verbose = self.verbose;
        config.dump_cache = self.dump_cache;
        config.physical_pages = self.physical_pages;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_from(args: &[&str]) -> Result<SimConfig, ConfigError> {
        let args = std::iter::once("sim").chain(args.iter().copied());
        parse_args(args)?.into_config()
    }

    #[test]
    fn test_normalize_legacy_args() {
        let args = normalize_legacy_args(["sim", "-S1", "64", "-B2", "8", "-S", "16"]);
        let args: Vec<&str> = args.iter().filter_map(|arg| arg.to_str()).collect();
        assert_eq!(args, vec!["sim", "--s1", "64", "--b2", "8", "-S", "16"]);
    }

    #[test]
    fn test_single_level() {
        let config =
            config_from(&["-S", "1024", "-T", "16", "-t", "trace.txt", "-v"])
                .unwrap();
        assert_eq!(
            config.cache,
            CacheLayout::Single(CacheConfig::make(
                1024,
                4,
                Associativity::DirectMapped
            ))
        );
        assert_eq!(config.tlb, TlbConfig::make(16, Associativity::DirectMapped));
        assert_eq!(config.trace_path, PathBuf::from("trace.txt"));
        assert!(config.verbose);
        assert!(!config.dump_cache);
        assert_eq!(config.physical_pages, NUM_PHYSICAL_PAGES);

        let config = config_from(&[
            "-S", "256", "-B", "16", "-A", "4", "-T", "8", "-L", "2", "-t", "x",
        ])
        .unwrap();
        assert_eq!(
            config.cache,
            CacheLayout::Single(CacheConfig::make(256, 16, Associativity::FourWay))
        );
        assert_eq!(
            config.tlb.associativity,
            Associativity::FullyAssociative
        );
    }

    #[test]
    fn test_two_levels() {
        let config = config_from(&[
            "-S1", "64", "-S2", "256", "-A2", "3", "-T", "8", "-t", "x",
        ])
        .unwrap();
        assert_eq!(
            config.cache,
            CacheLayout::Hierarchy(vec![
                CacheConfig::make(64, 4, Associativity::FullyAssociative),
                CacheConfig::make(256, 4, Associativity::TwoWay),
            ])
        );

        let config = config_from(&[
            "--s1", "64", "--b1", "8", "--s2", "512", "--b2", "16", "-T", "4",
            "-t", "x", "--physical-pages", "8", "--dump-cache",
        ])
        .unwrap();
        assert_eq!(config.cache.levels()[0].block_size, 8);
        assert_eq!(config.cache.levels()[1].block_size, 16);
        assert_eq!(config.physical_pages, 8);
        assert!(config.dump_cache);
    }

    #[test]
    fn test_missing_values() {
        assert_eq!(
            config_from(&["-T", "4", "-t", "x"]).unwrap_err(),
            ConfigError::MissingCacheSize
        );
        // One level size alone does not select the hierarchy
        assert_eq!(
            config_from(&["-S1", "64", "-T", "4", "-t", "x"]).unwrap_err(),
            ConfigError::MissingCacheSize
        );
        assert_eq!(
            config_from(&["-S", "64", "-t", "x"]).unwrap_err(),
            ConfigError::MissingTlbEntries
        );
        assert_eq!(
            config_from(&["-S", "64", "-T", "4"]).unwrap_err(),
            ConfigError::MissingTrace
        );
    }

    #[test]
    fn test_invalid_arguments() {
        for args in [
            &["-S", "64", "-A", "7", "-T", "4", "-t", "x"][..],
            &["-S", "abc", "-T", "4", "-t", "x"],
            &["-S", "64", "-T", "4", "-t", "x", "-X"],
            &["-S", "64", "-T", "4", "-t"],
        ] {
            assert!(matches!(
                config_from(args),
                Err(ConfigError::InvalidArguments(_))
            ));
        }
    }
}

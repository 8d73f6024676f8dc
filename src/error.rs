use std::path::PathBuf;

use thiserror::Error;

/// Top-level error type for the simulator
#[derive(Error, Debug)]
pub enum SimulatorError {
    #[error("Invalid configuration: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Page table error: {0}")]
    PageTableError(#[from] PageTableError),

    #[error("Failed to read trace file '{0}': {1}")]
    TraceReadError(PathBuf, #[source] std::io::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Plotting error: {0}")]
    PlotError(String),
}

impl SimulatorError {
    /// Whether the error was raised before any structure was built
    pub fn is_config_error(&self) -> bool {
        matches!(self, SimulatorError::ConfigError(_))
    }
}

/// Errors detected while validating a configuration
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Cache size must be a positive multiple of 4, got {0}")]
    InvalidCacheSize(u32),

    #[error("Block size must be a power of two no smaller than 4, got {0}")]
    InvalidBlockSize(u32),

    #[error("Block size {block_size} exceeds cache size {size}")]
    BlockExceedsCache { size: u32, block_size: u32 },

    #[error(
        "Cache size {size} is not divisible into {ways}-way sets of {block_size}-byte blocks"
    )]
    IndivisibleGeometry { size: u32, block_size: u32, ways: u32 },

    #[error("Number of sets must be a power of two, got {0}")]
    NonPowerOfTwoSets(u32),

    #[error("Unknown associativity code: {0}")]
    InvalidAssociativity(u32),

    #[error("TLB entries must be a power of two no smaller than 2, got {0}")]
    InvalidTlbEntries(u32),

    #[error("TLB entries {entries} are not divisible into {ways}-way sets")]
    IndivisibleTlb { entries: u32, ways: u32 },

    #[error("A cache hierarchy needs at least 2 levels, got {0}")]
    TooFewLevels(usize),

    #[error("L{level} size {size} is smaller than L{previous} size {previous_size}")]
    HierarchySize {
        level: usize,
        size: u32,
        previous: usize,
        previous_size: u32,
    },

    #[error(
        "L{level} block size {block_size} is smaller than L{previous} block size {previous_block_size}"
    )]
    HierarchyBlockSize {
        level: usize,
        block_size: u32,
        previous: usize,
        previous_block_size: u32,
    },

    #[error("Number of physical pages must be positive")]
    EmptyFramePool,

    #[error("Missing cache size")]
    MissingCacheSize,

    #[error("Missing number of TLB entries")]
    MissingTlbEntries,

    #[error("Missing trace file")]
    MissingTrace,

    #[error("Trace file '{0}' does not exist")]
    TraceNotFound(PathBuf),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),
}

/// Errors related to page table operations
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PageTableError {
    #[error("The physical frame pool is empty")]
    EmptyFramePool,

    #[error("Virtual page number {0:#07x} is outside the page table")]
    VpnOutOfRange(u32),

    #[error("No physical frame can be obtained for VPN {0:#07x}")]
    FrameExhaustion(u32),
}

/// Type alias for Result with SimulatorError
pub type SimulatorResult<T> = Result<T, SimulatorError>;

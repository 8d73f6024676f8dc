//! Memory access traces
//!
//! One access per line: a mode character (`R`/`r` or `W`/`w`) and a
//! `0x`-prefixed hexadecimal virtual address.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::Path;

use log::warn;

use crate::error::{SimulatorError, SimulatorResult};
use crate::memory::AccessType;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TraceOp {
    /// Mode character as written in the trace
    pub mode: char,
    pub access_type: AccessType,
    pub address: u32,
}

/// Parse a single trace line.
/// The space between mode and address is optional (`R0x10`).
pub fn parse_line(line: &str) -> Option<TraceOp> {
    let mut parts = line.split_whitespace();
    let op = parts.next()?;

    let mut chars = op.chars();
    let mode = chars.next()?;
    let address_str = match chars.as_str() {
        "" => parts.next()?,
        rest => rest,
    };
    if parts.next().is_some() {
        return None;
    }
    let access_type = match mode {
        'R' | 'r' => AccessType::Read,
        'W' | 'w' => AccessType::Write,
        _ => return None,
    };

    let digits = address_str
        .strip_prefix("0x")
        .or_else(|| address_str.strip_prefix("0X"))?;
    let address = u32::from_str_radix(digits, 16).ok()?;

    Some(TraceOp { mode, access_type, address })
}

/// Streams accesses out of a trace, one line at a time.
/// Blank lines are skipped; the first malformed line ends the trace.
pub struct TraceReader<R> {
    lines: io::Lines<R>,
    line_num: usize,
    done: bool,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_num: 0, done: false }
    }
}

impl TraceReader<BufReader<File>> {
    pub fn open(path: &Path) -> SimulatorResult<Self> {
        let file = File::open(path).map_err(|e| {
            SimulatorError::TraceReadError(path.to_path_buf(), e)
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = io::Result<TraceOp>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };
            self.line_num += 1;

            if line.trim().is_empty() {
                continue;
            }
            match parse_line(&line) {
                Some(op) => return Some(Ok(op)),
                None => {
                    warn!(
                        "stopping trace at line {}: expected '<R|W> 0x<address>', got '{}'",
                        self.line_num,
                        line.trim()
                    );
                    self.done = true;
                }
            }
        }
        None
    }
}

/// Read a whole trace up front, for runs that replay it more than once
pub fn fetch_operations(path: &Path) -> SimulatorResult<Vec<TraceOp>> {
    TraceReader::open(path)?
        .collect::<io::Result<Vec<_>>>()
        .map_err(|e| SimulatorError::TraceReadError(path.to_path_buf(), e))
}

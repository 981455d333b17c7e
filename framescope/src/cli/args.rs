//! CLI argument definitions

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "framescope",
    about = "Sample the call stack and heap usage of a running interpreter",
    after_help = "\
EXAMPLES:
    sudo framescope php-fpm                           Auto-detect PID and binary
    sudo framescope --pid 1234                        Explicit PID, auto-detect binary
    sudo framescope --pid 1234 --binary ./php         Explicit PID and runtime image
    sudo framescope --pid 1234 --headless --export samples.jsonl"
)]
pub struct Args {
    /// Process name to sample (auto-detects PID and binary)
    #[arg(value_name = "PROCESS")]
    pub process: Option<String>,

    /// Process ID to sample (binary path auto-detected from /proc)
    #[arg(short, long)]
    pub pid: Option<i32>,

    /// Runtime image carrying the executor/allocator symbols (default: /proc/<pid>/exe)
    #[arg(short, long)]
    pub binary: Option<String>,

    /// Sampling interval in microseconds
    #[arg(short, long, default_value = "1000", value_name = "MICROS")]
    pub interval: u64,

    /// Capture raw argument slots of the current frame
    #[arg(long)]
    pub args: bool,

    /// Runtime structure layout of the target
    #[arg(long, default_value = "php80", value_parser = ["php74", "php80"])]
    pub layout: String,

    /// Heap header address, bypasses the `alloc_globals` lookup (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_address)]
    pub heap_anchor: Option<u64>,

    /// Current-frame slot address, bypasses the `executor_globals` lookup (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_address)]
    pub frame_anchor: Option<u64>,

    /// Export samples to file as JSON Lines
    #[arg(long, value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Stop after N seconds (0 = unlimited)
    #[arg(long, default_value = "0")]
    pub duration: u64,

    /// Print statistics only, no per-sample lines (requires --export)
    #[arg(long, requires = "export")]
    pub headless: bool,

    /// Suppress non-essential output
    #[arg(short, long)]
    pub quiet: bool,

    /// Capacity of the sample channel; samples are dropped when it is full
    #[arg(long, default_value = "4096", value_name = "N")]
    pub buffer: usize,
}

/// Parse a hex address, with or without a `0x` prefix
///
/// # Errors
/// Returns a message for clap if the value is not valid hex
pub fn parse_address(value: &str) -> Result<u64, String> {
    let digits = value.strip_prefix("0x").or_else(|| value.strip_prefix("0X")).unwrap_or(value);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid address `{value}`: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("0x7f00dead0000"), Ok(0x7f00_dead_0000));
        assert_eq!(parse_address("ff"), Ok(0xff));
        assert!(parse_address("0xzz").is_err());
        assert!(parse_address("").is_err());
    }

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["framescope", "--pid", "42"]).unwrap();
        assert_eq!(args.pid, Some(42));
        assert_eq!(args.interval, 1000);
        assert_eq!(args.layout, "php80");
        assert_eq!(args.buffer, 4096);
        assert!(!args.args);
        assert!(args.heap_anchor.is_none());
    }

    #[test]
    fn test_anchor_overrides() {
        let args = Args::try_parse_from([
            "framescope",
            "--pid",
            "42",
            "--heap-anchor",
            "0x1000",
            "--frame-anchor",
            "2000",
        ])
        .unwrap();
        assert_eq!(args.heap_anchor, Some(0x1000));
        assert_eq!(args.frame_anchor, Some(0x2000));
    }

    #[test]
    fn test_headless_requires_export() {
        assert!(Args::try_parse_from(["framescope", "--pid", "1", "--headless"]).is_err());
        assert!(Args::try_parse_from([
            "framescope",
            "--pid",
            "1",
            "--headless",
            "--export",
            "out.jsonl"
        ])
        .is_ok());
    }

    #[test]
    fn test_unknown_layout_rejected() {
        assert!(Args::try_parse_from(["framescope", "--pid", "1", "--layout", "php5"]).is_err());
    }
}

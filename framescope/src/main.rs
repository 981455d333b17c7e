//! # framescope - Main Entry Point
//!
//! Supports two operational modes:
//! - **Live** (`--pid <PID>` or `framescope <PROCESS>`): one line per sample on stdout
//! - **Headless** (`--headless --export samples.jsonl`): periodic statistics only
//!
//! Both modes drain the sample channel on the async runtime while the sampler
//! thread produces at its own fixed cadence.

// Main function is intentionally long for clarity; time conversions lose precision for display
#![allow(clippy::too_many_lines, clippy::cast_precision_loss)]

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{bounded, Receiver, TryRecvError};
use log::info;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use framescope::cli::Args;
use framescope::domain::Pid;
use framescope::export::SampleWriter;
use framescope::preflight::run_preflight_checks;
use framescope::process_lookup::{find_process_by_name, resolve_exe_path};
use framescope::profiling::{
    display_sample, display_statistics, Sample, SampleStats, SamplerConfig, SamplerSlot,
    SamplerState,
};
use framescope::remote::ProcessMemory;
use framescope::symbolization::{resolve_anchors, AnchorOverrides, InternTable};
use framescope_common::RuntimeLayout;

// Exit codes
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_USAGE: i32 = 2;
const EXIT_NOPERM: i32 = 77;

fn main() {
    env_logger::init();
    std::process::exit(match run() {
        Ok(()) => EXIT_SUCCESS,
        Err(e) => {
            let code = exit_code_for(&e);
            eprintln!("error: {e:#}");
            code
        }
    });
}

fn exit_code_for(err: &anyhow::Error) -> i32 {
    let msg = format!("{err:#}").to_lowercase();
    if msg.contains("permission denied") || msg.contains("operation not permitted") {
        EXIT_NOPERM
    } else if msg.contains("missing required argument") {
        EXIT_USAGE
    } else {
        EXIT_ERROR
    }
}

/// Resolve PID and runtime image path from CLI arguments.
///
/// Supports three modes:
/// - `framescope php-fpm` - find process by name, auto-detect binary
/// - `framescope --pid 1234` - explicit PID, auto-detect binary from /proc
/// - `framescope --pid 1234 --binary ./php` - explicit PID and binary
fn resolve_pid_and_binary(args: &Args) -> Result<(Pid, String)> {
    // Mode A: Process name provided - auto-detect both
    if let Some(ref name) = args.process {
        if args.pid.is_some() || args.binary.is_some() {
            anyhow::bail!(
                "Cannot use PROCESS argument with --pid or --binary.\n\n\
                 Use either:\n  \
                 framescope php-fpm       (auto-detect)\n  \
                 framescope --pid 1234    (explicit PID)"
            );
        }
        let info = find_process_by_name(name)?;
        let binary = info.exe_path.to_string_lossy().into_owned();
        return Ok((info.pid, binary));
    }

    // Mode B: Explicit PID provided
    if let Some(pid) = args.pid.map(Pid) {
        let binary = if let Some(ref b) = args.binary {
            std::fs::canonicalize(b)
                .with_context(|| format!("Failed to resolve path: {b}"))?
                .to_string_lossy()
                .into_owned()
        } else {
            resolve_exe_path(pid)?.to_string_lossy().into_owned()
        };
        return Ok((pid, binary));
    }

    anyhow::bail!(
        "Missing required argument: PROCESS or --pid\n\n\
         Usage:\n  \
         framescope php-fpm       Auto-detect PID and binary\n  \
         framescope --pid 1234    Explicit PID, auto-detect binary\n\n\
         Run 'framescope --help' for more options"
    )
}

/// Everything the drain loop does with one received sample
struct SampleConsumer {
    stats: SampleStats,
    writer: Option<SampleWriter<BufWriter<File>>>,
    print: bool,
}

impl SampleConsumer {
    fn consume(&mut self, sample: &Sample) -> Result<()> {
        self.stats.record(sample);
        if let Some(writer) = self.writer.as_mut() {
            writer.write(sample).context("Failed to export sample")?;
        }
        if self.print {
            display_sample(sample);
        }
        Ok(())
    }

    /// Consume everything currently queued; `false` once the sampler side is gone
    fn drain(&mut self, rx: &Receiver<Sample>) -> Result<bool> {
        loop {
            match rx.try_recv() {
                Ok(sample) => self.consume(&sample)?,
                Err(TryRecvError::Empty) => return Ok(true),
                Err(TryRecvError::Disconnected) => return Ok(false),
            }
        }
    }
}

#[tokio::main]
async fn run() -> Result<()> {
    let args = Args::parse();

    let quiet = args.quiet;

    let (pid, binary_path) = resolve_pid_and_binary(&args)?;

    // Run pre-flight checks before touching the target
    run_preflight_checks(pid, &binary_path, quiet)?;

    let layout = *RuntimeLayout::by_name(&args.layout)
        .with_context(|| format!("Unknown layout: {}", args.layout))?;

    if !quiet {
        println!("framescope v{}", env!("CARGO_PKG_VERSION"));
        println!("binary: {binary_path}");
        println!("pid: {}", pid.0);
        println!("layout: {}", layout.name);
    }

    // ── Anchors ─────────────────────────────────────────────────────────
    let overrides = AnchorOverrides { heap: args.heap_anchor, current_frame: args.frame_anchor };
    let anchors = resolve_anchors(&ProcessMemory, pid, Path::new(&binary_path), &layout, overrides)
        .context("Failed to resolve anchors")?;

    if !quiet {
        println!("anchors: heap=0x{:x} frame=0x{:x}", anchors.heap, anchors.current_frame);
    }

    // ── Output ──────────────────────────────────────────────────────────
    let writer = args
        .export
        .as_ref()
        .map(|path| -> Result<_> {
            let file = File::create(path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            Ok(SampleWriter::new(BufWriter::new(file)))
        })
        .transpose()?;

    if !quiet {
        if let Some(ref export_path) = args.export {
            println!("export: {}", export_path.display());
        }
    }

    let mut consumer =
        SampleConsumer { stats: SampleStats::default(), writer, print: !args.headless && !quiet };

    // ── Sampler ─────────────────────────────────────────────────────────
    let interval = Duration::from_micros(args.interval);
    let config = SamplerConfig::new(pid, anchors, layout)
        .with_interval(interval)
        .with_args(args.args);

    let (sample_tx, sample_rx) = bounded(args.buffer.max(1));
    let symbols = Arc::new(InternTable::new());

    let mut slot = SamplerSlot::new();
    slot.activate(config, ProcessMemory, Arc::clone(&symbols), sample_tx)
        .context("Failed to start sampler")?;

    if !quiet {
        println!("interval: {}us", interval.as_micros());
    }

    let mut stats_timer = Instant::now();

    // Setup Ctrl+C handler
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    // Track start time for duration limit
    let sampling_start = Instant::now();
    let duration_limit =
        if args.duration > 0 { Some(Duration::from_secs(args.duration)) } else { None };

    // Pre-compute proc path for process liveness check
    let proc_path = format!("/proc/{}", pid.0);

    // Track why we exited the loop
    let mut exit_reason = "interrupted";

    loop {
        if let Some(limit) = duration_limit {
            if sampling_start.elapsed() >= limit {
                exit_reason = "duration limit reached";
                break;
            }
        }

        if !Path::new(&proc_path).exists() {
            exit_reason = "process exited";
            break;
        }

        if slot.state() == SamplerState::Closing {
            exit_reason = "sampler stopped";
            break;
        }

        if !consumer.drain(&sample_rx)? {
            exit_reason = "sampler stopped";
            break;
        }

        // Print statistics every 10 seconds in headless mode
        if args.headless && stats_timer.elapsed() > Duration::from_secs(10) {
            display_statistics(&consumer.stats);
            stats_timer = Instant::now();
        }

        tokio::select! {
            () = tokio::time::sleep(Duration::from_millis(100)) => {}
            _ = &mut ctrl_c => {
                break;
            }
        }
    }

    // Nothing is produced after this returns, so the final drain is complete
    slot.deactivate();
    consumer.drain(&sample_rx)?;

    if !quiet || args.headless {
        let elapsed = sampling_start.elapsed();
        eprintln!(
            "\n{}: {:.1}s, {} samples (user: {}, internal: {}, memory-only: {}), {} symbols, peak memory {:.1}KB",
            exit_reason,
            elapsed.as_secs_f64(),
            consumer.stats.total,
            consumer.stats.user,
            consumer.stats.internal,
            consumer.stats.memory_only,
            symbols.len(),
            consumer.stats.peak_memory as f64 / 1024.0,
        );
    }

    if let Some(writer) = consumer.writer.take() {
        let written = writer.written();
        writer.finish().context("Failed to flush export")?;
        info!("Exported {written} samples");

        if !quiet {
            if let Some(ref export_path) = args.export {
                println!("saved: {}", export_path.display());
            }
        }
    }

    Ok(())
}

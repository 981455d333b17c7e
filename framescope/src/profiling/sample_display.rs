// Byte counts are converted to KiB for display only
#![allow(clippy::cast_precision_loss)]

use super::sample::{Sample, SampleKind};

/// Display one sample in headless mode
pub fn display_sample(sample: &Sample) {
    println!("{}", format_sample(sample));
}

/// One-line rendering of a sample
#[must_use]
pub fn format_sample(sample: &Sample) -> String {
    let memory_kb = sample.memory as f64 / 1024.0;
    let head = format!("[{:>8}] {} mem={memory_kb:.1}KB", sample.kind, sample.elapsed);

    let Some(name) = sample.qualified_name() else {
        return head;
    };
    let mut line = match &sample.location {
        Some(location) => format!("{head} {name} ({}:{})", location.file, location.line),
        None => format!("{head} {name} <internal>"),
    };
    if !sample.args.is_empty() {
        let tags: Vec<String> =
            sample.args.as_slice().iter().map(|slot| slot.type_tag().to_string()).collect();
        line.push_str(&format!(" args=[{}]", tags.join(",")));
    }
    line
}

/// Per-kind sample counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SampleStats {
    pub total: u64,
    pub memory_only: u64,
    pub user: u64,
    pub internal: u64,
    pub peak_memory: u64,
}

impl SampleStats {
    pub fn record(&mut self, sample: &Sample) {
        self.total += 1;
        match sample.kind {
            SampleKind::MemoryOnly => self.memory_only += 1,
            SampleKind::UserFunction => self.user += 1,
            SampleKind::InternalFunction => self.internal += 1,
        }
        self.peak_memory = self.peak_memory.max(sample.memory);
    }
}

/// Display sample statistics
pub fn display_statistics(stats: &SampleStats) {
    eprintln!(
        "stats: samples={} user={} internal={} memory_only={} peak_mem={:.1}KB",
        stats.total,
        stats.user,
        stats.internal,
        stats.memory_only,
        stats.peak_memory as f64 / 1024.0
    );
}

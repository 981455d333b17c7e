//! Memory mapping utilities for process address space analysis
//!
//! This module parses /proc/pid/maps to determine where the runtime image is
//! loaded in the target, which is needed to relocate symbol addresses taken
//! from a position-independent executable or shared library.

use anyhow::{Context, Result};
use log::info;
use std::fs;

use crate::domain::Pid;

/// Memory range of a loaded image in a process's address space
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryRange {
    pub start: u64,
    pub end: u64,
}

/// Parse /proc/pid/maps to find the memory range of a specific image
///
/// # Errors
/// Returns an error if /proc/pid/maps cannot be read or if the image is not mapped
pub fn parse_memory_maps(pid: Pid, image_path: &str) -> Result<MemoryRange> {
    let maps_path = format!("/proc/{}/maps", pid.0);
    let maps = fs::read_to_string(&maps_path).context(format!("Failed to read {maps_path}"))?;

    let range = find_image_range(&maps, image_path)
        .with_context(|| format!("Could not find memory range for {image_path} in {pid}"))?;

    info!(
        "Runtime image range: 0x{:x} - 0x{:x} (size: {} KB)",
        range.start,
        range.end,
        (range.end - range.start) / 1024
    );
    Ok(range)
}

/// Find the span covering every mapping of `image_path` in maps-formatted text
///
/// Each line reads "start-end perms offset dev inode pathname"; the result runs
/// from the lowest start to the highest end of matching lines.
#[must_use]
pub fn find_image_range(maps: &str, image_path: &str) -> Option<MemoryRange> {
    maps.lines()
        .filter(|line| line.split_whitespace().nth(5) == Some(image_path))
        .filter_map(|line| {
            let (start, end) = line.split_whitespace().next()?.split_once('-')?;
            let start = u64::from_str_radix(start, 16).ok()?;
            let end = u64::from_str_radix(end, 16).ok()?;
            Some(MemoryRange { start, end })
        })
        .reduce(|acc, range| MemoryRange {
            start: acc.start.min(range.start),
            end: acc.end.max(range.end),
        })
}

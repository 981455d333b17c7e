//! # framescope - Remote Sampling Profiler for Interpreted Runtimes
//!
//! framescope periodically snapshots the execution state of another, live
//! process: the currently executing function, its source location, its class
//! scope and the heap usage of the runtime. It never stops the target and
//! never attaches a debugger; every byte is copied out of the target's
//! address space with `process_vm_readv(2)` while the target keeps running.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Target Process                           │
//! │         (interpreter: executor globals, frames, heap)           │
//! └───────────────────────┬─────────────────────────────────────────┘
//!                         │ process_vm_readv
//!                         ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                   framescope (This Crate)                       │
//! │                                                                 │
//! │  ┌──────────────┐   ┌──────────────┐   ┌──────────────┐         │
//! │  │   Sampler    │──▶│    Frame     │──▶│   Remote     │         │
//! │  │   Timer      │   │   Walker     │   │   Reader     │         │
//! │  └──────┬───────┘   └──────┬───────┘   └──────────────┘         │
//! │         │                  │                                    │
//! │         │                  ▼                                    │
//! │         │           ┌──────────────┐                            │
//! │         │           │   Symbol     │                            │
//! │         │           │  Resolver    │                            │
//! │         │           └──────────────┘                            │
//! │         ▼                                                       │
//! │  ┌──────────────┐   ┌──────────────┐                            │
//! │  │ Sample Sink  │──▶│    Export    │                            │
//! │  │  (channel)   │   │ (JSON Lines) │                            │
//! │  └──────────────┘   └──────────────┘                            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Structure
//!
//! ### Sampling Pipeline
//!
//! - [`remote`]: the single remote read primitive and an in-memory stand-in
//! - [`symbolization`]: runtime string resolution, interning, anchor discovery
//! - [`profiling`]: frame walker, timer thread, sampler slot, output sink
//!
//! ### Host Modules
//!
//! - [`export`]: JSON Lines sample export
//! - [`cli`]: command-line argument parsing
//! - [`preflight`]: permission and `/proc` checks before sampling
//! - [`process_lookup`]: find a target by name
//! - [`domain`]: core types (`Pid`, `Timestamp`) and error enums
//!
//! ## Degradation
//!
//! The target mutates its own structures while they are read. Any failed hop
//! turns the tick into a memory-only sample; the loop keeps its cadence and
//! the next tick starts from scratch.
//!
//! ## Typical Usage
//!
//! ```bash
//! # Sample a running interpreter by name
//! sudo ./framescope php-fpm
//!
//! # Capture arguments and export every sample
//! sudo ./framescope --pid <PID> --args --headless --export samples.jsonl
//! ```

pub mod cli;
pub mod domain;
pub mod export;
pub mod preflight;
pub mod process_lookup;
pub mod profiling;
pub mod remote;
pub mod symbolization;

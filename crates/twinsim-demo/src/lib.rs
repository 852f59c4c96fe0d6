//! Headless scenario runner for the supply-chain engine.
//!
//! Plays the part of a render loop: advances a simulated clock one frame at
//! a time, feeds it to the engine's throttled driver, fires scripted and
//! seeded random spikes, and records network statistics.
//!
//! # Usage
//!
//! ```rust,ignore
//! use twinsim_demo::HeadlessRunner;
//!
//! let mut runner = HeadlessRunner::from_dir("data/")?;
//! let summary = runner.run_to_end();
//! println!("{} ticks, hash {:#018x}", summary.ticks, summary.state_hash);
//! ```

pub mod error;
pub mod runner;
pub mod timeline;

pub use error::DemoError;
pub use runner::{FrameReport, HeadlessRunner, RunSummary};
pub use timeline::{Timeline, TimelineAction, build_timeline};

//! Headless runner: plays the bundled scenario twice, prints a per-second
//! health line and verifies the two runs end in the same state.
//!
//! Run with: `cargo run --package twinsim-demo --example headless_runner`
//! Set `RUST_LOG=twinsim_core=debug` to see spikes and depletions.

use std::path::Path;

use twinsim_core::fixed::fixed64_to_f64;
use twinsim_demo::HeadlessRunner;

const REPORT_EVERY: u64 = 1_000;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let data_dir = Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/../twinsim-data/data"));

    // Run 1
    let mut runner = HeadlessRunner::from_dir(data_dir).unwrap_or_else(|e| {
        panic!("failed to load scenario from {}: {e}", data_dir.display());
    });
    println!(
        "=== {} nodes, {} lanes, {} scripted actions over {} ms ===",
        runner.engine().graph().node_count(),
        runner.engine().graph().edge_count(),
        runner.timeline().actions.len(),
        runner.timeline().duration,
    );

    let mut next_report = 0;
    while !runner.is_finished() {
        let frame = runner.frame();
        if frame.now >= next_report {
            let health = runner.engine().health();
            println!(
                "  t={:>6} ms  tick={:>4}  avg={:>6.2}%  demand={:>7.2}  critical={}  markers={}  status={:?}",
                frame.now,
                runner.engine().tick(),
                fixed64_to_f64(health.average_inventory),
                fixed64_to_f64(health.total_demand),
                health.critical_nodes,
                runner.engine().effects().len(),
                health.status,
            );
            next_report += REPORT_EVERY;
        }
    }
    let first = runner.summary();

    println!();
    for snap in runner.engine().snapshot_all_nodes() {
        println!(
            "  [{:>8}] inventory={:>6.2}/{:<6.2} demand={:>6.2}",
            snap.name,
            fixed64_to_f64(snap.inventory),
            fixed64_to_f64(snap.capacity),
            fixed64_to_f64(snap.demand),
        );
    }
    println!(
        "\n  {} frames, {} ticks, {} spikes, {} resets, peak demand {:.2}, inventory trend {:?}",
        first.frames,
        first.ticks,
        first.spikes,
        first.resets,
        fixed64_to_f64(first.peak_demand),
        runner.stats().inventory_trend(),
    );

    // Run 2 -- determinism check
    let mut replay = HeadlessRunner::from_dir(data_dir).unwrap_or_else(|e| {
        panic!("failed to load scenario (run 2): {e}");
    });
    let second = replay.run_to_end();

    if first.state_hash == second.state_hash {
        println!("  Determinism: PASS (hash {:#018x})", first.state_hash);
    } else {
        println!(
            "  Determinism: FAIL! hash1={:#018x} != hash2={:#018x}",
            first.state_hash, second.state_hash
        );
        std::process::exit(1);
    }
}

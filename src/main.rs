use anyhow::Result;
use clap::Parser;
use fraglen_rs::cli;
use fraglen_rs::pipeline;
use mimalloc::MiMalloc;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Initialize tracing subscriber
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| {
            if args.quiet {
                EnvFilter::new("warn")
            } else {
                EnvFilter::new("info")
            }
        });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let stats = pipeline::run(&args)?;
    tracing::info!(
        total_reads = stats.total_reads,
        unmapped_reads = stats.unmapped_reads,
        read_groups = stats.read_groups,
        singles = stats.singles,
        pairs = stats.pairs,
        dropped_pairs = stats.dropped_pairs,
        slot_overwrites = stats.slot_overwrites,
        single_overwrites = stats.single_overwrites,
        "fraglen-rs: processing complete"
    );
    Ok(())
}

//! Command-line driver for mirrored queues: inspect geometry and run stress scenarios.

use std::process::ExitCode;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mirror_queue::mirror::{page_size, round_capacity};
use mirror_queue::DEFAULT_MIN_CAPACITY;
use queue_scenarios::{run_scenario, verify, ScenarioConfig, ScenarioReport};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about = "Inspect and stress mirrored shared-memory queues", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the page size and the capacity a request rounds up to.
    Info {
        /// Minimum capacity in bytes (decimal or hex).
        #[arg(long, value_parser = parse_usize, default_value_t = DEFAULT_MIN_CAPACITY)]
        capacity: usize,
    },
    /// Stream bytes between two threads and check what arrives.
    Run {
        #[arg(value_enum)]
        scenario: ScenarioArg,
        /// Bytes to stream (per burst for `burst`).
        #[arg(long, value_parser = parse_usize, default_value_t = 16 << 20)]
        bytes: usize,
        /// Largest single write in bytes.
        #[arg(long, value_parser = parse_usize, default_value_t = 4096)]
        chunk: usize,
        /// Minimum queue capacity in bytes.
        #[arg(long, value_parser = parse_usize, default_value_t = DEFAULT_MIN_CAPACITY)]
        capacity: usize,
        /// Number of bursts for `burst`.
        #[arg(long, default_value_t = 16)]
        bursts: u32,
        /// Consumer pause between reads for `backpressure`, in microseconds.
        #[arg(long, default_value_t = 50)]
        delay_us: u64,
        #[arg(long, default_value_t = ScenarioConfig::DEFAULT_SEED)]
        seed: u64,
        /// Use begin/commit grants instead of copying reads and writes.
        #[arg(long)]
        zero_copy: bool,
        /// Back the queue with a named shm object (e.g. /mq-bench).
        #[arg(long)]
        name: Option<String>,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScenarioArg {
    Flood,
    Burst,
    Backpressure,
}

fn main() -> ExitCode {
    init_tracing();
    match execute(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Info { capacity } => {
            let page = page_size();
            let rounded = round_capacity(capacity, page)
                .ok_or_else(|| anyhow!("capacity {capacity} cannot be mapped twice"))?;
            println!("page size:         {page}");
            println!("requested:         {capacity}");
            println!("capacity:          {rounded}");
            println!("reserved address:  {}", rounded * 2);
            println!("backing object:    {}", page + rounded);
            Ok(())
        }
        Command::Run {
            scenario,
            bytes,
            chunk,
            capacity,
            bursts,
            delay_us,
            seed,
            zero_copy,
            name,
        } => {
            let config = match scenario {
                ScenarioArg::Flood => ScenarioConfig::flood(bytes as u64, chunk),
                ScenarioArg::Burst => ScenarioConfig::burst(bursts, bytes),
                ScenarioArg::Backpressure => ScenarioConfig::backpressure(
                    bytes as u64,
                    chunk,
                    Duration::from_micros(delay_us),
                ),
            }
            .with_capacity(capacity)
            .with_seed(seed)
            .with_zero_copy(zero_copy)
            .with_shm_name(name);

            let report = run_scenario(&config)
                .with_context(|| format!("failed to run {} scenario", config.kind.name()))?;
            print_report(&report);
            verify(&report, &config).map_err(|reason| anyhow!("check failed: {reason}"))?;
            info!(scenario = report.name, "checks passed");
            Ok(())
        }
    }
}

fn print_report(report: &ScenarioReport) {
    let stats = &report.stats;
    println!("scenario:      {}", report.name);
    println!("queue:         {} ({} bytes)", report.queue_name, report.capacity);
    println!("elapsed:       {:.3?}", report.elapsed);
    println!("throughput:    {:.1} MiB/s", report.throughput_mib_s());
    println!("produced:      {}", stats.produced);
    println!("consumed:      {}", stats.consumed);
    println!("write stalls:  {}", stats.write_stalls);
    println!("read stalls:   {}", stats.read_stalls);
    println!("max depth:     {}", stats.max_depth);
    println!("mismatches:    {}", stats.mismatches);
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Ignore error if already set (e.g., during tests).
    let _ = fmt().with_env_filter(env_filter).try_init();
}

fn parse_usize(input: &str) -> Result<usize, String> {
    let trimmed = input.trim();
    let parsed = if let Some(hex) = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        usize::from_str_radix(hex, 16)
    } else {
        trimmed.parse::<usize>()
    };
    parsed.map_err(|err| format!("invalid size {input:?}: {err}"))
}

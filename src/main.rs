use clap::{Parser, Subcommand};
use std::io;
use std::process::ExitCode;
use std::time::{Duration, Instant};
use tracing::warn;
use tracing_subscriber::EnvFilter;

use ulam::config::{DEFAULT_WORKERS, EngineConfig};
use ulam::storage::{self, RunRecord};
use ulam::{Engine, FactorCounts};

#[derive(Parser)]
#[command(name = "ulam")]
#[command(about = "Prime factor counts for Ulam spirals", long_about = None)]
struct Cli {
    #[arg(short, long, global = true, help = "Log scheduler activity (debug level)")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Count prime factors of every pixel of a SIZE x SIZE spiral")]
    Factor {
        #[arg(help = "Spiral width in pixels (3 to 16000)")]
        size: usize,
        #[arg(short, long, default_value_t = DEFAULT_WORKERS, help = "Number of worker threads")]
        workers: usize,
    },
    #[command(about = "Print every prime up to a given limit")]
    Primes {
        #[arg(help = "The upper limit to search for primes")]
        limit: usize,
        #[arg(short, long, default_value_t = DEFAULT_WORKERS, help = "Number of worker threads")]
        workers: usize,
    },
}

fn setup_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("ulam=debug")
        } else {
            EnvFilter::new("ulam=warn")
        }
    });

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    setup_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Factor { size, workers } => factor(size, workers),
        Commands::Primes { limit, workers } => primes(limit, workers),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn factor(size: usize, workers: usize) -> ulam::Result<()> {
    let config = EngineConfig::for_spiral(size)?.with_workers(workers);
    let engine = Engine::new(config)?;
    let pixels = config.limit;

    println!(
        "Now calculating {} prime factorizations with {} workers...",
        pixels, workers
    );
    let start = Instant::now();
    let counts = engine.run()?;
    let duration = start.elapsed();

    print_statistics(&counts, duration);
    record_run("factor", size, workers, duration);
    Ok(())
}

fn primes(limit: usize, workers: usize) -> ulam::Result<()> {
    let engine = Engine::new(EngineConfig::new(limit).with_workers(workers))?;

    let start = Instant::now();
    let counts = engine.run()?;

    if let Err(e) = storage::write_primes(io::stdout().lock(), counts.primes()) {
        // Broken pipe from `| head` is not worth a failure status
        if e.kind() != io::ErrorKind::BrokenPipe {
            eprintln!("Error writing primes: {}", e);
        }
    }

    record_run("primes", limit, workers, start.elapsed());
    Ok(())
}

fn print_statistics(counts: &FactorCounts, duration: Duration) {
    let pixels = counts.limit();
    let primes = counts.prime_count();

    println!(
        "Calculation took {}us ({:.2}ms)",
        duration.as_micros(),
        duration.as_micros() as f64 / 1000.0
    );
    println!(
        "Average time per pixel: {}ns",
        duration.as_nanos() / pixels as u128
    );
    println!("Found {} primes", primes);
    if primes > 0 {
        println!("Ratio: {:.4} pixels per prime", pixels as f64 / primes as f64);
    }

    println!("\nPrime factors\tPixels");
    for (omega, &count) in counts.histogram().iter().enumerate().skip(1) {
        println!("{}\t\t{}", omega, count);
    }

    let stats = counts.stats();
    println!(
        "\n{} ranges dispatched, at most {} waiting for reorder",
        stats.tasks_dispatched, stats.peak_buffered
    );
}

fn record_run(subcommand: &str, input: usize, workers: usize, elapsed: Duration) {
    let record = RunRecord {
        subcommand,
        input,
        workers,
        elapsed,
    };
    if let Err(e) = storage::log_execution(&record) {
        warn!("failed to log execution: {}", e);
    }
}

//! kvbridge Benchmark Binary
//!
//! Drives concurrent set/get pairs through a client and reports throughput.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use kvbridge::engine::Engine;
use kvbridge::{Client, Config};
use tracing_subscriber::{fmt, EnvFilter};

/// kvbridge benchmark
#[derive(Parser, Debug)]
#[command(name = "kvbridge-bench")]
#[command(about = "Concurrent set/get throughput through the kvbridge client")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Server port
    #[arg(short, long, default_value = "6379")]
    port: u32,

    /// Number of client threads
    #[arg(short, long, default_value = "8")]
    concurrency: usize,

    /// set/get pairs per thread
    #[arg(short = 'n', long, default_value = "10000")]
    ops: usize,

    /// Value size in bytes
    #[arg(short = 's', long, default_value = "64")]
    value_size: usize,

    /// Request timeout in milliseconds
    #[arg(short, long, default_value = "1000")]
    timeout_ms: u64,

    /// Delivery threads of the in-memory engine
    #[arg(short, long, default_value = "4")]
    workers: usize,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,kvbridge=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(true)
        .init();

    let args = Args::parse();

    tracing::info!("kvbridge bench v{}", kvbridge::VERSION);
    tracing::info!(
        "{} thread(s) x {} set/get pairs, {} byte values",
        args.concurrency,
        args.ops,
        args.value_size
    );

    let config = Config::new(&args.host, args.port)
        .with_request_timeout(Duration::from_millis(args.timeout_ms))
        .with_client_name("kvbridge-bench");

    let client = match Client::connect(open_engine(&args), &config) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!("Failed to connect: {}", e);
            std::process::exit(1);
        }
    };

    let value = vec![b'x'; args.value_size];
    let started = Instant::now();

    let handles: Vec<_> = (0..args.concurrency)
        .map(|worker| {
            let client = client.clone();
            let value = value.clone();
            let ops = args.ops;
            thread::spawn(move || run_worker(&client, worker, ops, &value))
        })
        .collect();

    let mut failures = 0;
    for handle in handles {
        match handle.join() {
            Ok(failed) => failures += failed,
            Err(_) => {
                tracing::error!("Worker panicked");
                failures += args.ops;
            }
        }
    }

    let elapsed = started.elapsed();
    let total = args.concurrency * args.ops * 2;
    let rate = total as f64 / elapsed.as_secs_f64().max(f64::EPSILON);

    println!("commands: {}", total);
    println!("failures: {}", failures);
    println!("elapsed:  {:.3}s", elapsed.as_secs_f64());
    println!("rate:     {:.0} ops/s", rate);
}

#[cfg(not(feature = "native"))]
fn open_engine(args: &Args) -> Arc<dyn Engine> {
    Arc::new(
        kvbridge::MemoryEngine::builder()
            .workers(args.workers)
            .build(),
    )
}

#[cfg(feature = "native")]
fn open_engine(_args: &Args) -> Arc<dyn Engine> {
    Arc::new(kvbridge::engine::NativeEngine::new())
}

/// Returns the number of failed pairs
fn run_worker(client: &Client, worker: usize, ops: usize, value: &[u8]) -> usize {
    let mut failed = 0;
    for i in 0..ops {
        let key = format!("bench:{}:{}", worker, i);
        let set = client.set(&key, value);
        let outcome = set.get().and_then(|_| client.get(&key).get());
        match outcome {
            Ok(Some(read)) if read.as_ref() == value => {}
            Ok(other) => {
                tracing::warn!("Unexpected value for {}: {:?}", key, other.map(|v| v.len()));
                failed += 1;
            }
            Err(e) => {
                tracing::warn!("Command failed for {}: {}", key, e);
                failed += 1;
            }
        }
    }
    failed
}

//! gahctl: operator tool for the GAH handle store.
//!
//! Run with: `gahctl [COMMAND]`

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail, ensure};
use clap::{Parser, Subcommand};
use tracing::{debug, info};

use gah_core::{GahError, Handle, HandleStore, Ownership, StoreConfig};

#[derive(Parser)]
#[command(name = "gahctl")]
#[command(about = "Exercise and inspect generation address handles")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Store configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override the initial slot capacity
    #[arg(long, global = true)]
    capacity: Option<usize>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Allocate, inspect and release a batch of handles
    Exercise {
        /// Number of handles to allocate
        #[arg(long, default_value_t = 1024 * 9)]
        handles: usize,

        /// Size of each payload in bytes
        #[arg(long, default_value_t = 512)]
        payload_size: usize,

        /// Owner tag for every handle
        #[arg(long, default_value_t = 0)]
        root: u8,
    },

    /// Allocate and release from several threads at once
    Churn {
        /// Worker threads
        #[arg(long, default_value_t = 8)]
        threads: usize,

        /// Allocate/release rounds per thread
        #[arg(long, default_value_t = 10_000)]
        iterations: usize,

        /// Handles held per round
        #[arg(long, default_value_t = 64)]
        batch: usize,
    },

    /// Decode a handle captured as 32 hex digits
    Decode {
        /// Handle in hex, optionally prefixed with 0x
        hex: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    gah_metrics::trace::init(cli.verbose).map_err(|err| anyhow!(err))?;

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => StoreConfig::default(),
    };
    if let Some(capacity) = cli.capacity {
        config.initial_capacity = capacity;
    }

    match cli.command {
        Commands::Exercise {
            handles,
            payload_size,
            root,
        } => exercise(config, handles, payload_size, root),
        Commands::Churn {
            threads,
            iterations,
            batch,
        } => churn(config, threads, iterations, batch),
        Commands::Decode { hex } => decode(&hex),
    }
}

fn load_config(path: &Path) -> Result<StoreConfig> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let config: StoreConfig = serde_json::from_str(&text)
        .with_context(|| format!("parsing {}", path.display()))?;
    config.validate()?;
    Ok(config)
}

fn exercise(config: StoreConfig, count: usize, payload_size: usize, root: u8) -> Result<()> {
    ensure!(count > 0, "--handles must be at least 1");
    let store: HandleStore<Box<[u8]>> = HandleStore::new(config).context("initialising store")?;

    let mut handles = Vec::with_capacity(count);
    for i in 0..count {
        let payload = vec![0u8; payload_size].into_boxed_slice();
        let handle = store
            .allocate(root, payload)
            .map_err(GahError::from)
            .with_context(|| format!("allocating handle {i}"))?;
        handles.push(handle);
    }
    info!(count, table_len = store.table_len(), "handles allocated");

    let first = handles[0];
    first.check_crc().context("checksum of first handle")?;
    info!("check_crc ok");
    first
        .check_format_version()
        .context("format version of first handle")?;
    info!("check_format_version ok");

    ensure!(
        first.is_self_root(root)? == Ownership::Root,
        "first handle does not report root {root} as owner"
    );
    let other = root.wrapping_add(2);
    ensure!(
        first.is_self_root(other)? == Ownership::NotRoot,
        "first handle claims root {other} as owner"
    );
    info!(root, other, "ownership queries ok");

    let text = first
        .describe()
        .ok_or_else(|| anyhow!("first handle rendered as null"))?;
    info!("handle[0] {text}");

    for handle in &handles {
        // The payload comes back to us; dropping it here is the release.
        let payload = store
            .deallocate(handle)
            .with_context(|| format!("deallocating {}", handle.short()))?;
        ensure!(payload.len() == payload_size, "payload size changed");
    }

    let stats = store.stats();
    store.destroy().map_err(GahError::from).context("destroying store")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn churn(config: StoreConfig, threads: usize, iterations: usize, batch: usize) -> Result<()> {
    ensure!(threads > 0 && batch > 0, "--threads and --batch must be at least 1");
    let store: HandleStore<(usize, usize)> = HandleStore::new(config).context("initialising store")?;

    std::thread::scope(|s| -> Result<()> {
        let workers: Vec<_> = (0..threads)
            .map(|t| {
                let store = &store;
                s.spawn(move || churn_worker(store, t, iterations, batch))
            })
            .collect();
        for (t, worker) in workers.into_iter().enumerate() {
            worker
                .join()
                .map_err(|_| anyhow!("worker {t} panicked"))?
                .with_context(|| format!("worker {t}"))?;
        }
        Ok(())
    })?;

    ensure!(
        store.is_empty(),
        "{} handles left after churn",
        store.len()
    );
    let stats = store.stats();
    store.destroy().map_err(GahError::from).context("destroying store")?;
    println!("{}", serde_json::to_string_pretty(&stats)?);
    Ok(())
}

fn churn_worker(
    store: &HandleStore<(usize, usize)>,
    thread: usize,
    iterations: usize,
    batch: usize,
) -> Result<()> {
    let tag = u8::try_from(thread % 256)?;
    let mut held = Vec::with_capacity(batch);
    for round in 0..iterations {
        for i in 0..batch {
            let payload = (thread, round * batch + i);
            held.push((store.allocate(tag, payload).map_err(GahError::from)?, payload));
        }
        for (handle, payload) in &held {
            ensure!(store.get_info(handle)? == *payload, "payload mismatch for {}", handle.short());
        }
        for (handle, payload) in held.drain(..) {
            ensure!(store.deallocate(&handle)? == payload, "payload mismatch on release");
            if store.get_info(&handle).is_ok() {
                bail!("{} still resolves after release", handle.short());
            }
        }
    }
    debug!(thread, iterations, "worker finished");
    Ok(())
}

fn decode(hex: &str) -> Result<()> {
    let handle = Handle::parse_hex(hex).context("parsing handle")?;
    let Some(text) = handle.describe() else {
        println!("null handle");
        return Ok(());
    };
    println!("{text}");
    println!("  fid:            {}", handle.fid());
    println!("  reuse counter:  {}", handle.reuse_counter());
    println!("  root:           {}", handle.root());
    println!("  format version: {}", handle.format_version());
    println!("  checksum:       {:#018x}", handle.checksum());
    println!("  check_crc:      {}", verdict(handle.check_crc()));
    println!("  check_version:  {}", verdict(handle.check_format_version()));
    Ok(())
}

fn verdict(result: gah_core::Result<()>) -> String {
    match result {
        Ok(()) => "ok".to_string(),
        Err(err) => err.to_string(),
    }
}

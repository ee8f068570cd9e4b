use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use clusterfs::{ClusterFs, FileStatus, VfsConfig};
use tracing_subscriber::EnvFilter;

mod demo;

#[derive(Parser)]
#[command(name = "clusterfs")]
#[command(about = "A cluster-chain virtual file system in three host files", long_about = None)]
struct Cli {
    /// Cluster size used when a new VFS is initialized
    #[arg(long, global = true, default_value_t = 10)]
    cluster_size: u64,

    /// Maximum concurrent handles per file
    #[arg(long, global = true, default_value_t = 20)]
    max_handles: u32,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Write text to a file, creating the VFS if needed")]
    Write {
        #[arg(value_name = "PATH")]
        path: PathBuf,
        #[arg(value_name = "TEXT")]
        text: String,
    },
    #[command(about = "Print a file to stdout")]
    Cat {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    #[command(about = "Show rows, chains and the consistency report of the VFS above PATH")]
    Inspect {
        #[arg(value_name = "PATH")]
        path: PathBuf,
    },
    #[command(about = "Run a round trip and a multi-threaded workload in DIR")]
    Demo {
        #[arg(value_name = "DIR")]
        dir: PathBuf,
        #[arg(long, default_value_t = 4)]
        threads: usize,
    },
}

fn write_file(fs: &ClusterFs, path: &Path, text: &str) -> anyhow::Result<()> {
    let mut file = fs
        .try_create(path)
        .with_context(|| format!("cannot create {}", path.display()))?;
    let n = file.write(text.as_bytes());
    file.close();
    if n < text.len() {
        bail!("short write: {n} of {} bytes", text.len());
    }
    println!("wrote {n} bytes to {}", path.display());
    Ok(())
}

fn cat_file(fs: &ClusterFs, path: &Path) -> anyhow::Result<()> {
    let mut file = fs
        .try_open(path)
        .with_context(|| format!("cannot open {}", path.display()))?;
    let chunk = file.cluster_size().max(1) as usize;
    let mut out = std::io::stdout().lock();
    loop {
        let bytes = file.read_vec(chunk);
        out.write_all(&bytes)?;
        if file.status() != FileStatus::ReadOnly {
            break;
        }
    }
    out.flush()?;
    let status = file.status();
    file.close();
    if status == FileStatus::Bad {
        bail!("{} has a broken chain", path.display());
    }
    Ok(())
}

fn inspect(fs: &ClusterFs, path: &Path) -> anyhow::Result<()> {
    let volume = fs.mount(path)?;
    let info = volume.info()?;
    println!("root: {}", volume.root().display());
    println!(
        "cluster size: {}, first empty cluster: {}",
        info.cluster_size, info.first_empty_cluster
    );
    for entry in volume.entries()? {
        let mode = entry.mode.map(|m| m.to_string()).unwrap_or_default();
        match volume.chain(entry.first_cluster) {
            Ok(chain) => println!(
                "{} first={} mode={mode} open={} chain={chain:?}",
                entry.name, entry.first_cluster, entry.open_count
            ),
            Err(e) => println!("{} first={} chain error: {e}", entry.name, entry.first_cluster),
        }
    }
    let report = volume.check()?;
    println!("table: {} records, free: {:?}", report.table_len, report.free);
    if report.is_consistent() {
        println!("consistent");
    } else {
        for problem in &report.problems {
            println!("problem: {problem}");
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    let fs = ClusterFs::new(VfsConfig {
        cluster_size: cli.cluster_size,
        max_handles: cli.max_handles,
    })?;

    match cli.command {
        Commands::Write { path, text } => write_file(&fs, &path, &text),
        Commands::Cat { path } => cat_file(&fs, &path),
        Commands::Inspect { path } => inspect(&fs, &path),
        Commands::Demo { dir, threads } => demo::run(&fs, &dir, threads),
    }
}

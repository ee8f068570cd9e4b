//! End-to-end demo on a host directory: a single-thread round trip across
//! several clusters, then one writer thread per file, then a consistency check.

use std::path::Path;

use anyhow::{Context, bail};
use clusterfs::ClusterFs;

fn pattern(len: usize, seed: usize) -> Vec<u8> {
    (0..len).map(|i| ((i + seed) % 251) as u8).collect()
}

fn round_trip(fs: &ClusterFs, path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let mut writer = fs
        .try_create(path)
        .with_context(|| format!("create {}", path.display()))?;
    let n = writer.write(data);
    writer.close();
    if n != data.len() {
        bail!("{}: wrote {n} of {} bytes", path.display(), data.len());
    }

    let mut reader = fs
        .try_open(path)
        .with_context(|| format!("open {}", path.display()))?;
    let out = reader.read_vec(data.len());
    reader.close();
    if out != data {
        bail!("{}: data mismatch", path.display());
    }
    Ok(())
}

pub fn run(fs: &ClusterFs, dir: &Path, threads: usize) -> anyhow::Result<()> {
    std::fs::create_dir_all(dir)?;
    let cluster_size = fs.config().cluster_size as usize;

    // 2.5 clusters, so the chain grows twice
    let single = dir.join("single.txt");
    round_trip(fs, &single, &pattern(cluster_size * 5 / 2, 0))?;
    println!("single thread: ok");

    std::thread::scope(|s| {
        let workers: Vec<_> = (0..threads)
            .map(|i| {
                let path = dir.join(format!("thread-{i}.txt"));
                s.spawn(move || round_trip(fs, &path, &pattern(cluster_size * 3 + i, i)))
            })
            .collect();
        workers.into_iter().try_for_each(|w| match w.join() {
            Ok(res) => res,
            Err(_) => bail!("worker panicked"),
        })
    })?;
    println!("{threads} threads: ok");

    let report = fs.mount(&single)?.check()?;
    if !report.is_consistent() {
        for problem in &report.problems {
            eprintln!("problem: {problem}");
        }
        bail!("volume is inconsistent");
    }
    println!(
        "consistent: {} files, {} table records",
        report.chains.len(),
        report.table_len
    );
    Ok(())
}

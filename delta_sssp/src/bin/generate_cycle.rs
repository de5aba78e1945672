//! Builds a weighted cycle, block-partitioned into per-rank inputs, along
//! with the expected per-rank outputs for a run rooted at vertex 0.
//!
//! One edge of the cycle is inflated so the total cycle weight hits a
//! chosen value; the inflated edge sits just past the point where the
//! clockwise and counterclockwise distances from the root meet, so it
//! never lies on a shortest path and the expected outputs stay exact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use delta_sssp::block_dist::BlockDist;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Number of vertices in the cycle
    num_vertices: i64,

    /// Number of ranks to split the input across
    num_processes: usize,

    /// Random seed for the edge weights
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Force the total cycle weight by inflating one edge
    #[arg(long, default_value_t = i64::MAX)]
    total_weight: i64,

    /// Directory to create (default `bigcycle_<n>_<p>`)
    #[arg(long)]
    out_dir: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let n = cli.num_vertices;
    if n < 2 {
        bail!("number of vertices must be at least 2");
    }
    if cli.num_processes == 0 {
        bail!("number of processes must be at least 1");
    }

    let mut rng = StdRng::seed_from_u64(cli.seed);
    // weights[i] belongs to the edge i -> (i + 1) mod n
    let mut weights: Vec<i64> = (0..n).map(|_| rng.gen_range(1..=10)).collect();

    // prefix[i] is the clockwise distance from vertex 0 to vertex i
    let mut prefix = vec![0i64; n as usize + 1];
    for i in 0..n as usize {
        prefix[i + 1] = prefix[i] + weights[i];
    }
    let total = prefix[n as usize];

    // first vertex whose clockwise distance meets the counterclockwise one
    let (mut left, mut right) = (0i64, n);
    let mut tipping_point = n;
    while left <= right {
        let mid = left + (right - left) / 2;
        let clockwise = prefix[mid as usize];
        if clockwise >= total - clockwise {
            tipping_point = mid;
            right = mid - 1;
        } else {
            left = mid + 1;
        }
    }

    let diff = cli.total_weight - total;
    let adjust = ((tipping_point - 1 + n) % n) as usize;
    let adjusted = weights[adjust]
        .checked_add(diff)
        .context("adjusted edge weight overflows")?;
    if adjusted < 0 {
        bail!("adjusted edge weight is negative; raise --total-weight");
    }
    weights[adjust] = adjusted;

    let dist = BlockDist::new(cli.num_processes, n as usize)?;
    let dir = cli
        .out_dir
        .unwrap_or_else(|| PathBuf::from(format!("bigcycle_{n}_{}", cli.num_processes)));
    fs::create_dir_all(&dir).with_context(|| format!("cannot create {}", dir.display()))?;

    for rank in 0..cli.num_processes {
        let first = dist.first_of(rank) as i64;
        let count = dist.count_of(rank) as i64;
        let last = first + count - 1;

        let in_path = dir.join(format!("{rank}.in"));
        let out_path = dir.join(format!("{rank}.out"));
        let mut input = BufWriter::new(
            File::create(&in_path).with_context(|| format!("cannot create {}", in_path.display()))?,
        );
        let mut expected = BufWriter::new(
            File::create(&out_path)
                .with_context(|| format!("cannot create {}", out_path.display()))?,
        );

        writeln!(input, "{n} {first} {last}")?;
        if count > 0 {
            // the edge arriving from the predecessor block, then one edge
            // per owned vertex
            let prev = (first - 1 + n) % n;
            writeln!(input, "{prev} {first} {}", weights[prev as usize])?;
            for v in first..=last {
                let next = (v + 1) % n;
                writeln!(input, "{v} {next} {}", weights[v as usize])?;
                let d = if v <= adjust as i64 {
                    prefix[v as usize]
                } else {
                    total - prefix[v as usize]
                };
                writeln!(expected, "{d}")?;
            }
        }
        input.flush()?;
        expected.flush()?;
    }

    println!(
        "generated a {n}-cycle for {} ranks under {}",
        cli.num_processes,
        dir.display()
    );
    println!("tipping point {tipping_point}, inflated edge {adjust} to weight {adjusted}");
    Ok(())
}

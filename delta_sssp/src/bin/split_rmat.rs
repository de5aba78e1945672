//! Splits a Graph500 R-MAT binary edge list into per-rank text inputs.
//!
//! Vertex ids arrive as 6-byte little-endian words masked down to
//! `2^scale`; weights arrive as 32-bit little-endian floats and are mapped
//! through `int(w * 256) mod 256`. Each edge line is written to the owner
//! of both endpoints, once when they coincide.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;

use delta_sssp::block_dist::BlockDist;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Directory holding `edges.out` and `edges.out.weights`
    edges_folder: PathBuf,

    /// log2 of the vertex count
    scale: u32,

    /// Number of ranks to split across
    num_procs: usize,

    /// Directory to create the per-rank inputs under
    tests_dir: PathBuf,
}

fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> Result<bool> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = reader.read(&mut buf[filled..])?;
        if n == 0 {
            if filled == 0 {
                return Ok(false);
            }
            bail!("unexpected end of file mid-record");
        }
        filled += n;
    }
    Ok(true)
}

fn read_vertex(reader: &mut impl Read, mask: u64) -> Result<Option<u64>> {
    let mut bytes = [0u8; 6];
    if !read_exact_or_eof(reader, &mut bytes)? {
        return Ok(None);
    }
    let mut padded = [0u8; 8];
    padded[..6].copy_from_slice(&bytes);
    Ok(Some(u64::from_le_bytes(padded) & mask))
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.num_procs == 0 {
        bail!("need at least one rank");
    }
    if cli.scale >= 48 {
        bail!("scale {} does not fit 6-byte vertex ids", cli.scale);
    }

    let num_vertices = 1u64 << cli.scale;
    let mask = num_vertices - 1;
    let dist = BlockDist::new(cli.num_procs, num_vertices as usize)?;

    let out_dir = cli.tests_dir.join(format!(
        "graph500-scale-{}_{}_{}",
        cli.scale, num_vertices, cli.num_procs
    ));
    fs::create_dir_all(&out_dir).with_context(|| format!("cannot create {}", out_dir.display()))?;

    let mut outputs = Vec::with_capacity(cli.num_procs);
    for rank in 0..cli.num_procs {
        let path = out_dir.join(format!("{rank}.in"));
        let mut out = BufWriter::new(
            File::create(&path).with_context(|| format!("cannot create {}", path.display()))?,
        );
        let first = dist.first_of(rank) as i64;
        let last = first + dist.count_of(rank) as i64 - 1;
        writeln!(out, "{num_vertices} {first} {last}")?;
        outputs.push(out);
    }

    let edges_path = cli.edges_folder.join("edges.out");
    let weights_path = cli.edges_folder.join("edges.out.weights");
    let mut edges = BufReader::new(
        File::open(&edges_path).with_context(|| format!("cannot open {}", edges_path.display()))?,
    );
    let mut weights = BufReader::new(
        File::open(&weights_path)
            .with_context(|| format!("cannot open {}", weights_path.display()))?,
    );

    let mut num_edges = 0u64;
    while let Some(u) = read_vertex(&mut edges, mask)? {
        let v = read_vertex(&mut edges, mask)?.context("edge list ends after one endpoint")?;
        let mut weight_bytes = [0u8; 4];
        if !read_exact_or_eof(&mut weights, &mut weight_bytes)? {
            bail!("weight list shorter than edge list");
        }
        let w = (f32::from_le_bytes(weight_bytes) * 256.0) as i64 % 256;

        let owner_u = dist
            .owner(u as usize)
            .context("vertex outside the distribution")?;
        let owner_v = dist
            .owner(v as usize)
            .context("vertex outside the distribution")?;
        writeln!(outputs[owner_u], "{u} {v} {w}")?;
        if owner_u != owner_v {
            writeln!(outputs[owner_v], "{u} {v} {w}")?;
        }
        num_edges += 1;
    }
    for mut out in outputs {
        out.flush()?;
    }

    println!(
        "split {num_edges} edges over {} ranks under {}",
        cli.num_procs,
        out_dir.display()
    );
    Ok(())
}

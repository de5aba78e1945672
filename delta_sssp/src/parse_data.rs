//! Per-rank input loading.
//!
//! Line 1 of a rank's input is `N first_owned last_owned`; every following
//! non-empty line is one undirected edge `u v w`. The declared ownership
//! range must agree with the block distribution derived from the world
//! size. A rank that owns nothing declares an empty range by writing
//! `last < first`; with `N = 0` the range fields are ignored entirely.

use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use std::str::FromStr;

use crate::block_dist::BlockDist;
use crate::error::SsspError;
use crate::graph_store::GraphStore;

pub struct LoadedGraph {
    pub dist: BlockDist,
    pub store: GraphStore,
}

fn field<T: FromStr>(
    fields: &mut std::str::SplitWhitespace<'_>,
    line: &str,
    what: &str,
) -> Result<T, SsspError> {
    fields
        .next()
        .ok_or_else(|| SsspError::Data(format!("missing {what} in line '{line}'")))?
        .parse()
        .map_err(|_| SsspError::Data(format!("cannot parse {what} in line '{line}'")))
}

/// Parse one rank's input stream and build its graph store.
pub fn load_graph<R: Read>(
    input: R,
    my_pe: usize,
    num_pes: usize,
    assume_nomultiedge: bool,
) -> Result<LoadedGraph, SsspError> {
    let mut lines = BufReader::new(input).lines();

    let header = lines
        .next()
        .ok_or_else(|| SsspError::Data("missing header line".into()))??;
    let mut fields = header.split_whitespace();
    let n_global: usize = field(&mut fields, &header, "vertex count")?;
    let first: i64 = field(&mut fields, &header, "first owned vertex")?;
    let last: i64 = field(&mut fields, &header, "last owned vertex")?;

    let dist = BlockDist::new(num_pes, n_global)?;
    if n_global > 0 {
        let expect_first = dist.first_of(my_pe) as i64;
        let expect_count = dist.count_of(my_pe) as i64;
        if first < 0 || last < first {
            // an empty declared range is legal only when the distribution
            // assigns this rank nothing
            if expect_count != 0 {
                return Err(SsspError::Data(format!(
                    "rank {my_pe} declared an empty range but owns {expect_count} vertices"
                )));
            }
        } else {
            let declared = last - first + 1;
            if first != expect_first || declared != expect_count || last >= n_global as i64 {
                return Err(SsspError::Data(format!(
                    "rank {my_pe} declared range [{first}, {last}] but the distribution \
                     assigns {expect_count} vertices from {expect_first}"
                )));
            }
        }
    }

    let mut store = GraphStore::new(&dist, my_pe);
    for line in lines {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split_whitespace();
        let u: i64 = field(&mut fields, &line, "edge source")?;
        let v: i64 = field(&mut fields, &line, "edge target")?;
        let w: i64 = field(&mut fields, &line, "edge weight")?;
        if u < 0 || v < 0 || w < 0 {
            return Err(SsspError::Data(format!("negative field in line '{line}'")));
        }
        store.add_edge(u as usize, v as usize, w)?;
    }

    if !assume_nomultiedge {
        store.trim_multi_edges();
    }
    store.finalize();
    Ok(LoadedGraph { dist, store })
}

/// `load_graph` over a file path.
pub fn load_graph_file(
    path: &Path,
    my_pe: usize,
    num_pes: usize,
    assume_nomultiedge: bool,
) -> Result<LoadedGraph, SsspError> {
    let file = File::open(path)
        .map_err(|e| SsspError::Config(format!("cannot open {}: {e}", path.display())))?;
    load_graph(file, my_pe, num_pes, assume_nomultiedge)
}

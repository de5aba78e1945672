//! Owned adjacency and the shadow/window distance pair.
//!
//! Edges accumulate as triplets while the input streams in; `finalize`
//! compresses them into a CSR matrix of `n_owned` rows over the global
//! column space. Tentative distances live in two layers: the shadow, the
//! owner's authoritative copy between phases, and the window, the remotely
//! accumulated copy reconciled at each closing fence.

use std::collections::HashMap;
use std::mem;

use sprs::{CsMat, TriMat};

use crate::block_dist::BlockDist;
use crate::error::SsspError;
use crate::transport::Transport;

/// Sentinel for an unreached vertex.
pub const INF: i64 = i64::MAX;

/// A distance improvement observed at the end of a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Update {
    /// Global id of the improved vertex.
    pub vertex: usize,
    pub prev: i64,
    pub new: i64,
}

pub struct GraphStore {
    first_owned: usize,
    n_owned: usize,
    n_global: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    weights: Vec<i64>,
    matrix: Option<CsMat<i64>>,
    shadow: Vec<i64>,
}

impl GraphStore {
    pub fn new(dist: &BlockDist, my_pe: usize) -> Self {
        let first_owned = dist.first_of(my_pe);
        let n_owned = dist.count_of(my_pe);
        GraphStore {
            first_owned,
            n_owned,
            n_global: dist.num_vertices(),
            rows: Vec::new(),
            cols: Vec::new(),
            weights: Vec::new(),
            matrix: None,
            shadow: vec![INF; n_owned],
        }
    }

    pub fn n_owned(&self) -> usize {
        self.n_owned
    }

    pub fn n_global(&self) -> usize {
        self.n_global
    }

    pub fn first_owned(&self) -> usize {
        self.first_owned
    }

    pub fn owns(&self, v: usize) -> bool {
        v >= self.first_owned && v < self.first_owned + self.n_owned
    }

    fn local_idx(&self, v: usize) -> Result<usize, SsspError> {
        if !self.owns(v) {
            return Err(SsspError::Data(format!(
                "vertex {v} is not owned by this rank ([{}, {}))",
                self.first_owned,
                self.first_owned + self.n_owned
            )));
        }
        Ok(v - self.first_owned)
    }

    /// Record the half-edges of `{u, v}` that land on this rank. Self-loops
    /// are dropped.
    pub fn add_edge(&mut self, u: usize, v: usize, w: i64) -> Result<(), SsspError> {
        if self.matrix.is_some() {
            return Err(SsspError::Data("edge added after finalize".into()));
        }
        if u >= self.n_global || v >= self.n_global {
            return Err(SsspError::Data(format!(
                "edge ({u}, {v}) out of range for {} vertices",
                self.n_global
            )));
        }
        if w < 0 {
            return Err(SsspError::Data(format!(
                "edge ({u}, {v}) has negative weight {w}"
            )));
        }
        if u == v {
            return Ok(());
        }
        if self.owns(u) {
            self.rows.push(u - self.first_owned);
            self.cols.push(v);
            self.weights.push(w);
        }
        if self.owns(v) {
            self.rows.push(v - self.first_owned);
            self.cols.push(u);
            self.weights.push(w);
        }
        Ok(())
    }

    /// Collapse multi-edges to the minimum weight per neighbor pair.
    pub fn trim_multi_edges(&mut self) {
        let mut best: HashMap<(usize, usize), i64> = HashMap::with_capacity(self.rows.len());
        for i in 0..self.rows.len() {
            let entry = best
                .entry((self.rows[i], self.cols[i]))
                .or_insert(self.weights[i]);
            if self.weights[i] < *entry {
                *entry = self.weights[i];
            }
        }
        let mut entries: Vec<_> = best.into_iter().collect();
        entries.sort_unstable_by_key(|&(pos, _)| pos);
        self.rows.clear();
        self.cols.clear();
        self.weights.clear();
        for ((row, col), w) in entries {
            self.rows.push(row);
            self.cols.push(col);
            self.weights.push(w);
        }
    }

    /// Compress the accumulated triplets into CSR. No edges may be added
    /// afterwards. Duplicate triplets must have been trimmed first.
    pub fn finalize(&mut self) {
        let rows = mem::take(&mut self.rows);
        let cols = mem::take(&mut self.cols);
        let weights = mem::take(&mut self.weights);
        let tri = TriMat::from_triplets((self.n_owned, self.n_global), rows, cols, weights);
        self.matrix = Some(tri.to_csr());
    }

    /// Visit every outgoing half-edge of an owned vertex as
    /// `(neighbor_global_id, weight)`.
    pub fn for_each_neighbor<F>(&self, u: usize, mut visit: F) -> Result<(), SsspError>
    where
        F: FnMut(usize, i64),
    {
        let row = self.local_idx(u)?;
        let matrix = self
            .matrix
            .as_ref()
            .ok_or_else(|| SsspError::Data("adjacency queried before finalize".into()))?;
        if let Some(view) = matrix.outer_view(row) {
            for (v, w) in view.iter() {
                visit(v, *w);
            }
        }
        Ok(())
    }

    /// Shadow value of an owned vertex.
    pub fn dist_of(&self, u: usize) -> Result<i64, SsspError> {
        Ok(self.shadow[self.local_idx(u)?])
    }

    /// Seed a shadow value directly (root initialisation only).
    pub fn set_dist(&mut self, u: usize, d: i64) -> Result<(), SsspError> {
        let idx = self.local_idx(u)?;
        self.shadow[idx] = d;
        Ok(())
    }

    /// Copy the shadow into the window. Called once per phase, before the
    /// epoch opens.
    pub fn sync_shadow_to_window<T: Transport>(&self, transport: &mut T) {
        for (offset, &d) in self.shadow.iter().enumerate() {
            transport.window_write(offset, d);
        }
    }

    /// Route a relaxation at the owner's window slot. Local targets go
    /// through the window as well, so every effect converges at the fence.
    pub fn remote_relax<T: Transport>(
        &self,
        transport: &mut T,
        candidate: i64,
        owner: usize,
        offset: usize,
    ) {
        transport.accumulate_min(owner, offset, candidate);
    }

    /// Scan the window against the shadow after a closing fence. Slots that
    /// decreased are installed into the shadow and reported; a slot that
    /// increased means min-accumulate was broken and the job must abort.
    pub fn drain_updates<T: Transport>(
        &mut self,
        transport: &T,
    ) -> Result<Vec<Update>, SsspError> {
        let mut updates = Vec::new();
        for offset in 0..self.n_owned {
            let seen = transport.window_read(offset);
            let held = self.shadow[offset];
            if seen > held {
                return Err(SsspError::Invariant(format!(
                    "window slot of vertex {} increased from {held} to {seen}",
                    self.first_owned + offset
                )));
            }
            if seen < held {
                updates.push(Update {
                    vertex: self.first_owned + offset,
                    prev: held,
                    new: seen,
                });
                self.shadow[offset] = seen;
            }
        }
        Ok(updates)
    }

    /// Final distances for the owned range, in global-id order.
    pub fn distances(&self) -> &[i64] {
        &self.shadow
    }
}

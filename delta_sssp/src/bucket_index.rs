//! Per-rank bucket membership.
//!
//! An ordered map from bucket key to the owned vertices whose tentative
//! distance currently falls in that bucket. A vertex lives in at most one
//! bucket at a time; the move operation checks this on both ends and
//! reports a fatal error on violation.

use std::collections::BTreeMap;

use crate::error::SsspError;

#[derive(Debug, Default)]
pub struct BucketIndex {
    buckets: BTreeMap<i64, Vec<usize>>,
}

impl BucketIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Smallest populated bucket key.
    pub fn smallest_key(&self) -> Option<i64> {
        self.buckets.keys().next().copied()
    }

    /// Remove and return the vertex list at `key` (empty if absent).
    pub fn take(&mut self, key: i64) -> Vec<usize> {
        self.buckets.remove(&key).unwrap_or_default()
    }

    /// Replace the contents at `key`; an empty list erases the key.
    pub fn set_active(&mut self, key: i64, vertices: Vec<usize>) {
        if vertices.is_empty() {
            self.buckets.remove(&key);
        } else {
            self.buckets.insert(key, vertices);
        }
    }

    /// Move `v` from `old_key` (or from nowhere) into `new_key`.
    ///
    /// `old_key = None` means the caller knows `v` is in no bucket. A
    /// missing vertex at `old_key` or a duplicate at `new_key` is an
    /// invariant violation.
    pub fn move_vertex(
        &mut self,
        v: usize,
        old_key: Option<i64>,
        new_key: i64,
    ) -> Result<(), SsspError> {
        if let Some(old) = old_key {
            let bucket = self.buckets.get_mut(&old).ok_or_else(|| {
                SsspError::Invariant(format!("vertex {v} not found in bucket {old}"))
            })?;
            let pos = bucket.iter().position(|&u| u == v).ok_or_else(|| {
                SsspError::Invariant(format!("vertex {v} not found in bucket {old}"))
            })?;
            bucket.swap_remove(pos);
            if bucket.is_empty() {
                self.buckets.remove(&old);
            }
        }
        let dest = self.buckets.entry(new_key).or_default();
        if dest.contains(&v) {
            return Err(SsspError::Invariant(format!(
                "vertex {v} already present in bucket {new_key}"
            )));
        }
        dest.push(v);
        Ok(())
    }

    pub fn contains(&self, key: i64, v: usize) -> bool {
        self.buckets.get(&key).is_some_and(|b| b.contains(&v))
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of populated buckets.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Drop empty buckets. Normal operation never leaves any behind.
    pub fn purge_empty(&mut self) {
        self.buckets.retain(|_, b| !b.is_empty());
    }
}

//! Block distribution of vertices over PEs.
//!
//! Ranks `0 .. extra` own `base + 1` vertices and the remaining ranks own
//! `base`, where `base = n / p` and `extra = n % p`. All queries are O(1)
//! arithmetic on the two stored sizes.

use crate::error::SsspError;

#[derive(Debug, Clone, Copy)]
pub struct BlockDist {
    num_pes: usize,
    num_vertices: usize,
}

impl BlockDist {
    pub fn new(num_pes: usize, num_vertices: usize) -> Result<Self, SsspError> {
        if num_vertices > 0 && num_pes == 0 {
            return Err(SsspError::Config(
                "cannot distribute nonzero work among zero ranks".into(),
            ));
        }
        Ok(BlockDist {
            num_pes,
            num_vertices,
        })
    }

    pub fn num_vertices(&self) -> usize {
        self.num_vertices
    }

    pub fn num_pes(&self) -> usize {
        self.num_pes
    }

    fn base_load(&self) -> usize {
        if self.num_pes == 0 {
            0
        } else {
            self.num_vertices / self.num_pes
        }
    }

    fn extra(&self) -> usize {
        if self.num_pes == 0 {
            0
        } else {
            self.num_vertices % self.num_pes
        }
    }

    /// Rank that owns the vertex, or `None` outside `[0, n)`.
    pub fn owner(&self, v: usize) -> Option<usize> {
        if v >= self.num_vertices || self.num_pes == 0 {
            return None;
        }
        // ranks below `extra` carry one extra vertex each
        let threshold = (self.base_load() + 1) * self.extra();
        if v < threshold {
            Some(v / (self.base_load() + 1))
        } else {
            Some(self.extra() + (v - threshold) / self.base_load())
        }
    }

    /// Owner rank and the slot of the vertex in the owner's local arrays.
    pub fn local_offset(&self, v: usize) -> Option<(usize, usize)> {
        let rank = self.owner(v)?;
        Some((rank, v - self.first_of(rank)))
    }

    /// First global id owned by the rank.
    pub fn first_of(&self, rank: usize) -> usize {
        let heavier = rank.min(self.extra());
        heavier * (self.base_load() + 1) + rank.saturating_sub(self.extra()) * self.base_load()
    }

    /// Number of vertices owned by the rank (0 for ranks past the end).
    pub fn count_of(&self, rank: usize) -> usize {
        if rank >= self.num_pes {
            return 0;
        }
        if rank < self.extra() {
            self.base_load() + 1
        } else {
            self.base_load()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trivial_distribution() {
        let dist = BlockDist::new(0, 0).unwrap();
        assert_eq!(dist.count_of(0), 0);
        assert_eq!(dist.count_of(1), 0);
        assert_eq!(dist.count_of(100), 0);
        assert_eq!(dist.owner(0), None);
        assert_eq!(dist.owner(100), None);
    }

    #[test]
    fn zero_ranks_nonzero_work_rejected() {
        assert!(BlockDist::new(0, 1).is_err());
        assert!(BlockDist::new(0, 100).is_err());
    }

    #[test]
    fn single_rank_owns_everything() {
        let dist = BlockDist::new(1, 19).unwrap();
        assert_eq!(dist.owner(0), Some(0));
        assert_eq!(dist.owner(1), Some(0));
        assert_eq!(dist.owner(10), Some(0));
        assert_eq!(dist.owner(18), Some(0));
        assert_eq!(dist.owner(19), None);
        assert_eq!(dist.count_of(0), 19);
    }

    #[test]
    fn even_split() {
        let dist = BlockDist::new(2, 4).unwrap();
        assert_eq!(dist.owner(0), Some(0));
        assert_eq!(dist.owner(1), Some(0));
        assert_eq!(dist.owner(2), Some(1));
        assert_eq!(dist.owner(3), Some(1));
        assert_eq!(dist.owner(4), None);
    }

    #[test]
    fn uniform_distribution() {
        let n_ranks = 17;
        let per_rank = 13;
        let dist = BlockDist::new(n_ranks, n_ranks * per_rank).unwrap();
        assert_eq!(dist.count_of(0), per_rank);
        assert_eq!(dist.count_of(1), per_rank);
        assert_eq!(dist.count_of(15), per_rank);
        assert_eq!(dist.count_of(16), per_rank);

        assert_eq!(dist.owner(0), Some(0));
        assert_eq!(dist.owner(per_rank - 1), Some(0));
        assert_eq!(dist.owner(per_rank), Some(1));
        assert_eq!(
            dist.owner(n_ranks * per_rank - per_rank - 1),
            Some(n_ranks - 2)
        );
        assert_eq!(dist.owner(n_ranks * per_rank - per_rank), Some(n_ranks - 1));
        assert_eq!(dist.owner(n_ranks * per_rank - 1), Some(n_ranks - 1));
        assert_eq!(dist.owner(n_ranks * per_rank), None);
        assert_eq!(dist.owner(n_ranks * per_rank * 100 + 9999), None);
    }

    #[test]
    fn uneven_distribution_two_heavy_ranks() {
        // [2] * 2 + [1] * 15
        let dist = BlockDist::new(17, 19).unwrap();
        assert_eq!(dist.count_of(0), 2);
        assert_eq!(dist.count_of(1), 2);
        assert_eq!(dist.count_of(3), 1);
        assert_eq!(dist.count_of(16), 1);

        assert_eq!(dist.owner(0), Some(0));
        assert_eq!(dist.owner(1), Some(0));
        assert_eq!(dist.owner(2), Some(1));
        assert_eq!(dist.owner(3), Some(1));
        assert_eq!(dist.owner(4), Some(2));
        assert_eq!(dist.owner(5), Some(3));
        assert_eq!(dist.owner(6), Some(4));
        assert_eq!(dist.owner(18), Some(16));
        assert_eq!(dist.owner(19), None);
    }

    #[test]
    fn uneven_distribution_light_tail_rank() {
        // [4] * 16 + [3]
        let dist = BlockDist::new(17, 67).unwrap();
        assert_eq!(dist.count_of(0), 4);
        assert_eq!(dist.count_of(15), 4);
        assert_eq!(dist.count_of(16), 3);

        for v in 0..4 {
            assert_eq!(dist.owner(v), Some(0));
        }
        for v in 4..8 {
            assert_eq!(dist.owner(v), Some(1));
        }
        for v in 60..64 {
            assert_eq!(dist.owner(v), Some(15));
        }
        for v in 64..67 {
            assert_eq!(dist.owner(v), Some(16));
        }
        assert_eq!(dist.owner(67), None);
    }

    #[test]
    fn offsets_are_owner_relative() {
        let dist = BlockDist::new(17, 19).unwrap();
        assert_eq!(dist.local_offset(0), Some((0, 0)));
        assert_eq!(dist.local_offset(1), Some((0, 1)));
        assert_eq!(dist.local_offset(2), Some((1, 0)));
        assert_eq!(dist.local_offset(4), Some((2, 0)));
        assert_eq!(dist.local_offset(18), Some((16, 0)));
        assert_eq!(dist.local_offset(19), None);
    }

    #[test]
    fn ranges_cover_every_vertex_once() {
        for (p, n) in [(1, 1), (3, 10), (7, 30), (16, 16), (5, 3), (4, 0)] {
            let dist = BlockDist::new(p, n).unwrap();
            let total: usize = (0..p).map(|r| dist.count_of(r)).sum();
            assert_eq!(total, n);
            for r in 0..p {
                let first = dist.first_of(r);
                for off in 0..dist.count_of(r) {
                    assert_eq!(dist.owner(first + off), Some(r));
                    assert_eq!(dist.local_offset(first + off), Some((r, off)));
                }
            }
        }
    }

    #[test]
    fn more_ranks_than_vertices() {
        let dist = BlockDist::new(5, 3).unwrap();
        assert_eq!(dist.count_of(0), 1);
        assert_eq!(dist.count_of(2), 1);
        assert_eq!(dist.count_of(3), 0);
        assert_eq!(dist.count_of(4), 0);
        assert_eq!(dist.owner(2), Some(2));
    }
}

//! The epoch/phase relaxation engine.
//!
//! Every epoch the ranks collectively agree on the smallest populated
//! bucket, then drain it through phases: take the bucket's vertices, relax
//! their outgoing edges into the owners' windows inside an open epoch,
//! fence, and rebuild bucket membership from the distance changes the
//! fence made visible. An epoch ends when no rank has work left in the
//! bucket; the run ends when no rank has any bucket at all.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::block_dist::BlockDist;
use crate::bucket_index::BucketIndex;
use crate::error::SsspError;
use crate::graph_store::{GraphStore, INF};
use crate::logger::RankLogger;
use crate::transport::Transport;

/// Reduced in place of a bucket key by ranks with nothing left to do.
const NO_BUCKET: i64 = i64::MAX;

/// Switches for the relaxation heuristics.
#[derive(Debug, Clone, Copy)]
pub struct Policy {
    /// Split each epoch into an inner-short pass and its complement.
    pub ios: bool,
    /// With `ios` off, split each epoch into light and heavy edge passes.
    pub pruning: bool,
    /// Consume locally owned targets that stay in the active bucket within
    /// the same phase instead of waiting a fence for them.
    pub local_bypass: bool,
    /// Reserved; accepted and ignored.
    pub hybrid: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Policy {
            ios: true,
            pruning: true,
            local_bypass: true,
            hybrid: true,
        }
    }
}

/// Which edges one `process_bucket` pass may relax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelaxPass {
    Every,
    Light,
    Heavy,
    InnerShort,
    OuterShort,
}

impl RelaxPass {
    fn keeps(self, dist_u: i64, w: i64, k: i64, delta: i64) -> bool {
        match self {
            RelaxPass::Every => true,
            RelaxPass::Light => w < delta,
            RelaxPass::Heavy => w >= delta,
            RelaxPass::InnerShort => inner_short(dist_u, w, k, delta),
            RelaxPass::OuterShort => !inner_short(dist_u, w, k, delta),
        }
    }
}

/// A short edge whose relaxation cannot leave bucket `k`.
fn inner_short(dist_u: i64, w: i64, k: i64, delta: i64) -> bool {
    let bucket_end = (k + 1).saturating_mul(delta).saturating_sub(1);
    w < delta && dist_u.saturating_add(w) <= bucket_end
}

/// Counters accumulated over a run.
#[derive(Debug, Default, Clone, Copy)]
pub struct RunStats {
    pub epochs: u64,
    pub phases: u64,
    pub relaxations: u64,
    pub updates: u64,
}

pub struct DeltaStepper<'a, T: Transport> {
    graph: &'a mut GraphStore,
    dist: &'a BlockDist,
    transport: &'a mut T,
    logger: &'a mut RankLogger,
    delta: i64,
    policy: Policy,
    progress_freq: u64,
    buckets: BucketIndex,
    stats: RunStats,
}

/// Per-phase relaxation state. Borrows the graph and distribution shared
/// and the transport exclusively, so one phase can interleave edge walks
/// with accumulate traffic.
struct Relaxer<'p, T: Transport> {
    graph: &'p GraphStore,
    dist: &'p BlockDist,
    transport: &'p mut T,
    stats: &'p mut RunStats,
    delta: i64,
    k: i64,
    pass: RelaxPass,
    my_pe: usize,
    local_bypass: bool,
    bypass_best: HashMap<usize, i64>,
    bypass_queue: VecDeque<usize>,
}

impl<'p, T: Transport> Relaxer<'p, T> {
    /// Relax the kept outgoing edges of `u`, assuming tentative distance
    /// `dist_u`.
    fn relax_from(&mut self, u: usize, dist_u: i64) -> Result<(), SsspError> {
        let Relaxer {
            graph,
            dist,
            transport,
            stats,
            delta,
            k,
            pass,
            my_pe,
            local_bypass,
            bypass_best,
            bypass_queue,
        } = self;
        let graph: &GraphStore = *graph;
        let (delta, k, pass, my_pe, local_bypass) = (*delta, *k, *pass, *my_pe, *local_bypass);

        let mut pending: Option<SsspError> = None;
        graph.for_each_neighbor(u, |v, w| {
            if pending.is_some() || !pass.keeps(dist_u, w, k, delta) {
                return;
            }
            let candidate = dist_u.saturating_add(w);
            let Some((owner, offset)) = dist.local_offset(v) else {
                pending = Some(SsspError::Data(format!(
                    "edge target {v} outside the distribution"
                )));
                return;
            };
            graph.remote_relax(&mut **transport, candidate, owner, offset);
            stats.relaxations += 1;

            if local_bypass && owner == my_pe && candidate / delta == k {
                // shadow is stale for targets already improved this phase
                let best = bypass_best
                    .get(&v)
                    .copied()
                    .unwrap_or_else(|| graph.dist_of(v).unwrap_or(INF));
                if candidate < best {
                    bypass_best.insert(v, candidate);
                    bypass_queue.push_back(v);
                }
            }
        })?;
        match pending {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Relax from every queued bypass target before the epoch closes.
    fn drain_bypass(&mut self) -> Result<(), SsspError> {
        while let Some(v) = self.bypass_queue.pop_front() {
            let dist_v = self.bypass_best[&v];
            self.relax_from(v, dist_v)?;
        }
        Ok(())
    }
}

impl<'a, T: Transport> DeltaStepper<'a, T> {
    pub fn new(
        graph: &'a mut GraphStore,
        dist: &'a BlockDist,
        transport: &'a mut T,
        logger: &'a mut RankLogger,
        delta: i64,
        policy: Policy,
        progress_freq: u64,
    ) -> Result<Self, SsspError> {
        if delta <= 0 {
            return Err(SsspError::Config(format!(
                "delta must be positive, got {delta}"
            )));
        }
        Ok(DeltaStepper {
            graph,
            dist,
            transport,
            logger,
            delta,
            policy,
            progress_freq,
            buckets: BucketIndex::new(),
            stats: RunStats::default(),
        })
    }

    fn key_of(&self, d: i64) -> i64 {
        d / self.delta
    }

    /// Run to global quiescence from `root` and return the counters.
    pub fn run(&mut self, root: usize) -> Result<RunStats, SsspError> {
        if self.graph.n_global() > 0 && root >= self.graph.n_global() {
            return Err(SsspError::Config(format!(
                "root {root} out of range for {} vertices",
                self.graph.n_global()
            )));
        }
        if self.graph.n_global() > 0 && self.graph.owns(root) {
            self.graph.set_dist(root, 0)?;
            self.buckets.move_vertex(root, None, 0)?;
        }

        loop {
            self.buckets.purge_empty();
            let local_min = self.buckets.smallest_key().unwrap_or(NO_BUCKET);
            // every rank enters the epoch with the same k, or all stop
            let k = self.transport.allreduce_min_i64(local_min);
            if k == NO_BUCKET {
                break;
            }
            self.stats.epochs += 1;

            // vertices drained from bucket k during this epoch; they sit in
            // no bucket, so drains must re-insert rather than move them
            let mut epoch_taken: HashSet<usize> = HashSet::new();

            if self.policy.ios {
                let settled = self.process_bucket(k, RelaxPass::InnerShort, &mut epoch_taken)?;
                self.buckets.set_active(k, settled);
                self.process_bucket(k, RelaxPass::OuterShort, &mut epoch_taken)?;
            } else if self.policy.pruning {
                let settled = self.process_bucket(k, RelaxPass::Light, &mut epoch_taken)?;
                self.buckets.set_active(k, settled);
                self.process_bucket(k, RelaxPass::Heavy, &mut epoch_taken)?;
            } else {
                self.process_bucket(k, RelaxPass::Every, &mut epoch_taken)?;
            }
            self.buckets.set_active(k, Vec::new());

            if self.progress_freq > 0 && self.stats.epochs % self.progress_freq == 0 {
                self.logger.progress(&format!(
                    "epoch {}: bucket {k}, {} phases so far, {} buckets pending, {} updates applied",
                    self.stats.epochs,
                    self.stats.phases,
                    self.buckets.len(),
                    self.stats.updates,
                ));
            }
        }

        self.logger.progress(&format!(
            "settled after {} epochs / {} phases ({} relaxations, {} updates)",
            self.stats.epochs, self.stats.phases, self.stats.relaxations, self.stats.updates,
        ));
        Ok(self.stats)
    }

    /// Drain bucket `k` through phases restricted to `pass`, returning the
    /// distinct vertices this rank drained from the bucket.
    fn process_bucket(
        &mut self,
        k: i64,
        pass: RelaxPass,
        epoch_taken: &mut HashSet<usize>,
    ) -> Result<Vec<usize>, SsspError> {
        let mut settled: Vec<usize> = Vec::new();
        loop {
            let active = self.buckets.take(k);
            let has_work = self
                .transport
                .allreduce_max_i32(if active.is_empty() { 0 } else { 1 });
            if has_work == 0 {
                settled.sort_unstable();
                settled.dedup();
                return Ok(settled);
            }
            self.stats.phases += 1;
            if self.logger.debug_on() {
                self.logger.debug(&format!(
                    "bucket {k} ({pass:?}): phase {} over {} active vertices",
                    self.stats.phases,
                    active.len(),
                ));
            }

            let my_pe = self.transport.my_pe();
            self.graph.sync_shadow_to_window(self.transport);
            self.transport.open_epoch();
            {
                let mut relaxer = Relaxer {
                    graph: &*self.graph,
                    dist: self.dist,
                    transport: &mut *self.transport,
                    stats: &mut self.stats,
                    delta: self.delta,
                    k,
                    pass,
                    my_pe,
                    local_bypass: self.policy.local_bypass,
                    bypass_best: HashMap::new(),
                    bypass_queue: VecDeque::new(),
                };
                for &u in &active {
                    epoch_taken.insert(u);
                    settled.push(u);
                    let dist_u = relaxer.graph.dist_of(u)?;
                    if dist_u == INF {
                        return Err(SsspError::Invariant(format!(
                            "active vertex {u} has no tentative distance"
                        )));
                    }
                    relaxer.relax_from(u, dist_u)?;
                }
                relaxer.drain_bypass()?;
            }
            self.transport.close_epoch();

            for update in self.graph.drain_updates(self.transport)? {
                if update.new < 0 {
                    return Err(SsspError::Invariant(format!(
                        "vertex {} relaxed to negative distance {}",
                        update.vertex, update.new
                    )));
                }
                let new_key = self.key_of(update.new);
                let old_key = if update.prev == INF || epoch_taken.contains(&update.vertex) {
                    None
                } else {
                    Some(self.key_of(update.prev))
                };
                self.buckets.move_vertex(update.vertex, old_key, new_key)?;
                self.stats.updates += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sssp_serial::shortest_path_lengths;
    use crate::transport::SoloTransport;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn solve_with(
        n: usize,
        edges: &[(usize, usize, i64)],
        root: usize,
        delta: i64,
        policy: Policy,
    ) -> Vec<i64> {
        let dist = BlockDist::new(1, n).unwrap();
        let mut graph = GraphStore::new(&dist, 0);
        for &(u, v, w) in edges {
            graph.add_edge(u, v, w).unwrap();
        }
        graph.trim_multi_edges();
        graph.finalize();
        let mut transport = SoloTransport::new(graph.n_owned(), INF);
        let mut logger = RankLogger::disabled();
        let mut stepper = DeltaStepper::new(
            &mut graph,
            &dist,
            &mut transport,
            &mut logger,
            delta,
            policy,
            0,
        )
        .unwrap();
        stepper.run(root).unwrap();
        graph.distances().to_vec()
    }

    fn solve(n: usize, edges: &[(usize, usize, i64)], root: usize, delta: i64) -> Vec<i64> {
        solve_with(n, edges, root, delta, Policy::default())
    }

    #[test]
    fn triangle_with_short_and_long_mix() {
        let edges = [(0, 1, 1), (1, 2, 1), (0, 2, 10)];
        for delta in [1, 2, 10, 100] {
            assert_eq!(solve(3, &edges, 0, delta), vec![0, 1, 2]);
        }
    }

    #[test]
    fn disconnected_vertices_stay_unreached() {
        let edges = [(0, 1, 2), (2, 3, 2)];
        assert_eq!(solve(4, &edges, 0, 10), vec![0, 2, INF, INF]);
    }

    #[test]
    fn heavy_chain_with_delta_below_every_weight() {
        let edges = [(0, 1, 10), (1, 2, 10), (2, 3, 10)];
        assert_eq!(solve(4, &edges, 0, 1), vec![0, 10, 20, 30]);
    }

    #[test]
    fn heavy_chain_with_delta_above_every_weight() {
        let edges = [(0, 1, 10), (1, 2, 10), (2, 3, 10)];
        assert_eq!(solve(4, &edges, 0, 100), vec![0, 10, 20, 30]);
    }

    #[test]
    fn later_shorter_path_rebuckets_a_vertex() {
        let edges = [(0, 1, 4), (1, 4, 5), (0, 2, 1), (2, 3, 1), (3, 4, 1)];
        assert_eq!(solve(5, &edges, 0, 10), vec![0, 4, 1, 2, 3]);
    }

    #[test]
    fn rebucket_from_pending_far_bucket() {
        // the heavy edge parks vertex 1 in a far bucket; the short path
        // later pulls it down into the bucket being processed
        let edges = [(0, 1, 90), (0, 2, 15), (2, 3, 5), (3, 1, 5)];
        for delta in [1, 10, 50] {
            assert_eq!(solve(4, &edges, 0, delta), vec![0, 25, 15, 20]);
        }
    }

    #[test]
    fn self_loop_on_root_is_ignored() {
        let edges = [(0, 0, 5), (0, 1, 3)];
        assert_eq!(solve(2, &edges, 0, 10), vec![0, 3]);
    }

    #[test]
    fn empty_graph_terminates_immediately() {
        assert_eq!(solve(0, &[], 0, 10), Vec::<i64>::new());
    }

    #[test]
    fn root_out_of_range_is_a_config_error() {
        let dist = BlockDist::new(1, 2).unwrap();
        let mut graph = GraphStore::new(&dist, 0);
        graph.add_edge(0, 1, 1).unwrap();
        graph.finalize();
        let mut transport = SoloTransport::new(2, INF);
        let mut logger = RankLogger::disabled();
        let mut stepper = DeltaStepper::new(
            &mut graph,
            &dist,
            &mut transport,
            &mut logger,
            10,
            Policy::default(),
            0,
        )
        .unwrap();
        assert!(matches!(stepper.run(5), Err(SsspError::Config(_))));
    }

    #[test]
    fn nonpositive_delta_is_rejected() {
        let dist = BlockDist::new(1, 1).unwrap();
        let mut graph = GraphStore::new(&dist, 0);
        graph.finalize();
        let mut transport = SoloTransport::new(1, INF);
        let mut logger = RankLogger::disabled();
        for delta in [0, -3] {
            assert!(DeltaStepper::new(
                &mut graph,
                &dist,
                &mut transport,
                &mut logger,
                delta,
                Policy::default(),
                0,
            )
            .is_err());
        }
    }

    #[test]
    fn every_policy_combination_agrees() {
        let edges = [
            (0, 1, 4),
            (1, 4, 5),
            (0, 2, 1),
            (2, 3, 1),
            (3, 4, 1),
            (4, 5, 20),
            (0, 5, 23),
            (2, 5, 21),
        ];
        let expect = solve_with(
            6,
            &edges,
            0,
            3,
            Policy {
                ios: false,
                pruning: false,
                local_bypass: false,
                hybrid: true,
            },
        );
        for ios in [false, true] {
            for pruning in [false, true] {
                for local_bypass in [false, true] {
                    let policy = Policy {
                        ios,
                        pruning,
                        local_bypass,
                        hybrid: true,
                    };
                    assert_eq!(
                        solve_with(6, &edges, 0, 3, policy),
                        expect,
                        "policy {policy:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn distances_do_not_depend_on_delta() {
        let edges = [(0, 1, 7), (1, 2, 3), (0, 3, 2), (3, 2, 6), (2, 4, 1)];
        let expect = solve(5, &edges, 0, 1);
        for delta in [2, 3, 5, 8, 1000] {
            assert_eq!(solve(5, &edges, 0, delta), expect);
        }
    }

    #[test]
    fn rerunning_is_deterministic() {
        let edges = [(0, 1, 4), (1, 2, 4), (2, 0, 9), (1, 3, 2)];
        let first = solve(4, &edges, 0, 5);
        let second = solve(4, &edges, 0, 5);
        assert_eq!(first, second);
    }

    #[test]
    fn random_graphs_match_the_serial_reference() {
        for seed in 0..6u64 {
            let mut rng = StdRng::seed_from_u64(seed);
            let n = 60;
            let edges: Vec<(usize, usize, i64)> = (0..240)
                .map(|_| {
                    (
                        rng.gen_range(0..n),
                        rng.gen_range(0..n),
                        rng.gen_range(0..=20),
                    )
                })
                .collect();
            let expect = shortest_path_lengths(n, &edges, 0);
            for delta in [1, 4, 25] {
                assert_eq!(solve(n, &edges, 0, delta), expect, "seed {seed} delta {delta}");
            }
        }
    }

    #[test]
    fn triangle_inequality_holds_at_termination() {
        let mut rng = StdRng::seed_from_u64(99);
        let n = 40;
        let edges: Vec<(usize, usize, i64)> = (0..150)
            .map(|_| {
                (
                    rng.gen_range(0..n),
                    rng.gen_range(0..n),
                    rng.gen_range(1..=15),
                )
            })
            .collect();
        let dist = solve(n, &edges, 0, 4);
        for &(u, v, w) in &edges {
            if u == v {
                continue;
            }
            if dist[u] != INF {
                assert!(dist[v] <= dist[u].saturating_add(w));
            }
            if dist[v] != INF {
                assert!(dist[u] <= dist[v].saturating_add(w));
            }
        }
    }
}

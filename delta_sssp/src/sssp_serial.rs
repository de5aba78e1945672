//! Whole-graph serial reference used to check the distributed engine.

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::graph_store::INF;

/// Single-source distances over an undirected edge list; `INF` marks
/// vertices the root cannot reach.
pub fn shortest_path_lengths(n: usize, edges: &[(usize, usize, i64)], root: usize) -> Vec<i64> {
    let mut dist = vec![INF; n];
    if n == 0 {
        return dist;
    }
    let mut graph = UnGraph::<(), i64>::with_capacity(n, edges.len());
    for _ in 0..n {
        graph.add_node(());
    }
    for &(u, v, w) in edges {
        if u != v {
            graph.add_edge(NodeIndex::new(u), NodeIndex::new(v), w);
        }
    }
    for (node, d) in dijkstra(&graph, NodeIndex::new(root), None, |e| *e.weight()) {
        dist[node.index()] = d;
    }
    dist
}

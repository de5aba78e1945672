//! Distributed delta-stepping single-source shortest paths over the
//! Lamellar runtime.
//!
//! The graph is block-partitioned across PEs; each PE owns a contiguous
//! vertex range and the half-edges incident on it. Relaxations travel as
//! one-sided min-accumulates into the owner's distance window and are
//! reconciled against the owner's private shadow copy at each phase fence.

pub mod block_dist;
pub mod bucket_index;
pub mod delta_stepper;
pub mod error;
pub mod graph_store;
pub mod logger;
pub mod options;
pub mod parse_data;
pub mod sssp_serial;
pub mod transport;

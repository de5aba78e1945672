//! One-sided coordination between PEs.
//!
//! The window is the only remotely writable state: one `AtomicI64` slot per
//! owned vertex, updated exclusively through min-accumulate requests issued
//! inside an open epoch. Requests are binned per destination PE and flushed
//! as a single active message per destination at the closing fence, which
//! then drains outstanding messages and barriers. Between a close and the
//! next open the owner may read and write its slots directly.

use std::mem;
use std::sync::atomic::{AtomicI32, AtomicI64, Ordering};

use lamellar::active_messaging::prelude::*;
use lamellar::darc::prelude::*;

/// Wire-level primitives the solver needs from the runtime.
pub trait Transport {
    fn my_pe(&self) -> usize;
    fn num_pes(&self) -> usize;

    /// Start a one-sided access epoch on the window.
    fn open_epoch(&mut self);
    /// Queue `min(window[offset], value)` against `target_pe`'s window.
    /// Completion is deferred to the closing fence.
    fn accumulate_min(&mut self, target_pe: usize, offset: usize, value: i64);
    /// Complete all outstanding accumulates, system-wide.
    fn close_epoch(&mut self);

    fn allreduce_min_i64(&mut self, value: i64) -> i64;
    fn allreduce_max_i32(&mut self, value: i32) -> i32;
    fn allreduce_sum_i64(&mut self, value: i64) -> i64;
    fn barrier(&mut self);

    /// Owner-side read of a local window slot. Valid only between epochs.
    fn window_read(&self, offset: usize) -> i64;
    /// Owner-side write of a local window slot. Valid only between epochs.
    fn window_write(&mut self, offset: usize, value: i64);
}

#[derive(Debug)]
struct WindowSlots {
    slots: Vec<AtomicI64>,
}

#[derive(Debug)]
struct ReduceCells {
    min_i64: AtomicI64,
    max_i32: AtomicI32,
    sum_i64: AtomicI64,
}

/// Transport over a Lamellar world.
pub struct LamellarTransport {
    world: lamellar::LamellarWorld,
    window: Darc<WindowSlots>,
    cells: Darc<ReduceCells>,
    bins: Vec<Vec<(usize, i64)>>,
    epoch_open: bool,
}

impl LamellarTransport {
    /// Allocate a window of `window_len` slots filled with `fill`.
    pub fn new(world: lamellar::LamellarWorld, window_len: usize, fill: i64) -> Self {
        let window = Darc::new(
            world.team(),
            WindowSlots {
                slots: (0..window_len).map(|_| AtomicI64::new(fill)).collect(),
            },
        )
        .expect("window allocation failed");
        let cells = Darc::new(
            world.team(),
            ReduceCells {
                min_i64: AtomicI64::new(i64::MAX),
                max_i32: AtomicI32::new(i32::MIN),
                sum_i64: AtomicI64::new(0),
            },
        )
        .expect("reduction cell allocation failed");
        let bins = vec![Vec::new(); world.num_pes()];
        LamellarTransport {
            world,
            window,
            cells,
            bins,
            epoch_open: false,
        }
    }

    /// Drain locally issued messages, then rendezvous. Once every PE has
    /// passed this point all messages everywhere have executed.
    fn fence(&self) {
        self.world.wait_all();
        self.world.barrier();
    }
}

impl Transport for LamellarTransport {
    fn my_pe(&self) -> usize {
        self.world.my_pe()
    }

    fn num_pes(&self) -> usize {
        self.world.num_pes()
    }

    fn open_epoch(&mut self) {
        assert!(!self.epoch_open, "epoch already open");
        self.epoch_open = true;
    }

    fn accumulate_min(&mut self, target_pe: usize, offset: usize, value: i64) {
        assert!(self.epoch_open, "accumulate issued outside an open epoch");
        self.bins[target_pe].push((offset, value));
    }

    fn close_epoch(&mut self) {
        assert!(self.epoch_open, "no epoch to close");
        for pe in 0..self.bins.len() {
            if self.bins[pe].is_empty() {
                continue;
            }
            let updates = mem::take(&mut self.bins[pe]);
            let _ = self.world.exec_am_pe(
                pe,
                AccumulateMinAm {
                    window: self.window.clone(),
                    updates,
                },
            );
        }
        self.fence();
        self.epoch_open = false;
    }

    fn allreduce_min_i64(&mut self, value: i64) -> i64 {
        self.cells.min_i64.store(i64::MAX, Ordering::Relaxed);
        // contributions must not race the reset on a slower PE
        self.world.barrier();
        let _ = self.world.exec_am_all(ReduceMinI64Am {
            cells: self.cells.clone(),
            value,
        });
        self.fence();
        self.cells.min_i64.load(Ordering::Relaxed)
    }

    fn allreduce_max_i32(&mut self, value: i32) -> i32 {
        self.cells.max_i32.store(i32::MIN, Ordering::Relaxed);
        self.world.barrier();
        let _ = self.world.exec_am_all(ReduceMaxI32Am {
            cells: self.cells.clone(),
            value,
        });
        self.fence();
        self.cells.max_i32.load(Ordering::Relaxed)
    }

    fn allreduce_sum_i64(&mut self, value: i64) -> i64 {
        self.cells.sum_i64.store(0, Ordering::Relaxed);
        self.world.barrier();
        let _ = self.world.exec_am_all(ReduceSumI64Am {
            cells: self.cells.clone(),
            value,
        });
        self.fence();
        self.cells.sum_i64.load(Ordering::Relaxed)
    }

    fn barrier(&mut self) {
        self.world.barrier();
    }

    fn window_read(&self, offset: usize) -> i64 {
        self.window.slots[offset].load(Ordering::Relaxed)
    }

    fn window_write(&mut self, offset: usize, value: i64) {
        assert!(
            !self.epoch_open,
            "owner writes are only legal between epochs"
        );
        self.window.slots[offset].store(value, Ordering::Relaxed);
    }
}

/// Applies a batch of min-accumulates to the owner's window slots.
#[lamellar::AmData(Debug, Clone)]
pub struct AccumulateMinAm {
    window: Darc<WindowSlots>,
    updates: Vec<(usize, i64)>,
}

#[lamellar::am]
impl LamellarAM for AccumulateMinAm {
    async fn exec(self) {
        for (offset, value) in self.updates.iter() {
            self.window.slots[*offset].fetch_min(*value, Ordering::Relaxed);
        }
    }
}

/// Folds one PE's contribution into every PE's min cell.
#[lamellar::AmData(Debug, Clone)]
pub struct ReduceMinI64Am {
    cells: Darc<ReduceCells>,
    value: i64,
}

#[lamellar::am]
impl LamellarAM for ReduceMinI64Am {
    async fn exec(self) {
        self.cells.min_i64.fetch_min(self.value, Ordering::Relaxed);
    }
}

/// Folds one PE's contribution into every PE's max cell.
#[lamellar::AmData(Debug, Clone)]
pub struct ReduceMaxI32Am {
    cells: Darc<ReduceCells>,
    value: i32,
}

#[lamellar::am]
impl LamellarAM for ReduceMaxI32Am {
    async fn exec(self) {
        self.cells.max_i32.fetch_max(self.value, Ordering::Relaxed);
    }
}

/// Folds one PE's contribution into every PE's sum cell.
#[lamellar::AmData(Debug, Clone)]
pub struct ReduceSumI64Am {
    cells: Darc<ReduceCells>,
    value: i64,
}

#[lamellar::am]
impl LamellarAM for ReduceSumI64Am {
    async fn exec(self) {
        self.cells.sum_i64.fetch_add(self.value, Ordering::Relaxed);
    }
}

/// Single-PE transport with the same fence discipline as the Lamellar one.
/// Drives the full solver deterministically in the test suite.
#[derive(Debug, Default)]
pub struct SoloTransport {
    slots: Vec<i64>,
    staged: Vec<(usize, i64)>,
    epoch_open: bool,
}

impl SoloTransport {
    pub fn new(window_len: usize, fill: i64) -> Self {
        SoloTransport {
            slots: vec![fill; window_len],
            staged: Vec::new(),
            epoch_open: false,
        }
    }
}

impl Transport for SoloTransport {
    fn my_pe(&self) -> usize {
        0
    }

    fn num_pes(&self) -> usize {
        1
    }

    fn open_epoch(&mut self) {
        assert!(!self.epoch_open, "epoch already open");
        self.epoch_open = true;
    }

    fn accumulate_min(&mut self, target_pe: usize, offset: usize, value: i64) {
        assert!(self.epoch_open, "accumulate issued outside an open epoch");
        assert_eq!(target_pe, 0, "single-PE transport");
        self.staged.push((offset, value));
    }

    fn close_epoch(&mut self) {
        assert!(self.epoch_open, "no epoch to close");
        for (offset, value) in self.staged.drain(..) {
            let slot = &mut self.slots[offset];
            *slot = (*slot).min(value);
        }
        self.epoch_open = false;
    }

    fn allreduce_min_i64(&mut self, value: i64) -> i64 {
        value
    }

    fn allreduce_max_i32(&mut self, value: i32) -> i32 {
        value
    }

    fn allreduce_sum_i64(&mut self, value: i64) -> i64 {
        value
    }

    fn barrier(&mut self) {}

    fn window_read(&self, offset: usize) -> i64 {
        self.slots[offset]
    }

    fn window_write(&mut self, offset: usize, value: i64) {
        assert!(
            !self.epoch_open,
            "owner writes are only legal between epochs"
        );
        self.slots[offset] = value;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_are_deferred_to_the_fence() {
        let mut transport = SoloTransport::new(2, 100);
        transport.open_epoch();
        transport.accumulate_min(0, 0, 7);
        transport.accumulate_min(0, 0, 3);
        transport.accumulate_min(0, 1, 200);
        assert_eq!(transport.window_read(0), 100);
        transport.close_epoch();
        assert_eq!(transport.window_read(0), 3);
        assert_eq!(transport.window_read(1), 100);
    }

    #[test]
    fn owner_writes_between_epochs() {
        let mut transport = SoloTransport::new(1, 0);
        transport.window_write(0, 42);
        assert_eq!(transport.window_read(0), 42);
    }

    #[test]
    fn solo_collectives_are_identities() {
        let mut transport = SoloTransport::new(0, 0);
        assert_eq!(transport.allreduce_min_i64(5), 5);
        assert_eq!(transport.allreduce_max_i32(-2), -2);
        assert_eq!(transport.allreduce_sum_i64(9), 9);
    }

    #[test]
    #[should_panic(expected = "epoch already open")]
    fn double_open_panics() {
        let mut transport = SoloTransport::new(1, 0);
        transport.open_epoch();
        transport.open_epoch();
    }

    #[test]
    #[should_panic(expected = "outside an open epoch")]
    fn accumulate_outside_epoch_panics() {
        let mut transport = SoloTransport::new(1, 0);
        transport.accumulate_min(0, 0, 1);
    }

    #[test]
    #[should_panic(expected = "between epochs")]
    fn owner_write_inside_epoch_panics() {
        let mut transport = SoloTransport::new(1, 0);
        transport.open_epoch();
        transport.window_write(0, 1);
    }
}

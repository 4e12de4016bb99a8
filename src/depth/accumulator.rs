use std::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crate::foundation::error::{DepthError, DepthResult};

/// Lock-free per-pixel height accumulator shared by integration workers.
///
/// Every update is a relaxed `fetch_add`; completion is ordered by the worker channel, not
/// by the atomics themselves. Sums wrap on i32 overflow and raise [`Self::overflowed`].
#[derive(Debug)]
pub struct IntegralAccumulator {
    width: u32,
    height: u32,
    sum: Vec<AtomicI32>,
    count: Vec<AtomicU32>,
    overflowed: AtomicBool,
}

impl IntegralAccumulator {
    /// A zeroed accumulator for a `width x height` grid.
    pub fn new(width: u32, height: u32) -> Self {
        let len = width as usize * height as usize;
        Self {
            width,
            height,
            sum: (0..len).map(|_| AtomicI32::new(0)).collect(),
            count: (0..len).map(|_| AtomicU32::new(0)).collect(),
            overflowed: AtomicBool::new(false),
        }
    }

    /// Rebuild an accumulator from plain buffers.
    pub fn from_raw(width: u32, height: u32, sums: Vec<i32>, counts: Vec<u32>) -> DepthResult<Self> {
        let len = width as usize * height as usize;
        if sums.len() != len || counts.len() != len {
            return Err(DepthError::validation(format!(
                "accumulator buffers hold {} sums and {} counts, expected {len}",
                sums.len(),
                counts.len()
            )));
        }
        Ok(Self {
            width,
            height,
            sum: sums.into_iter().map(AtomicI32::new).collect(),
            count: counts.into_iter().map(AtomicU32::new).collect(),
            overflowed: AtomicBool::new(false),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Number of pixel slots.
    pub fn len(&self) -> usize {
        self.sum.len()
    }

    /// `true` for a zero-sized grid.
    pub fn is_empty(&self) -> bool {
        self.sum.is_empty()
    }

    /// Add one ray visit with running integral `value` to pixel slot `idx`.
    pub fn add(&self, idx: usize, value: i32) {
        let prev = self.sum[idx].fetch_add(value, Ordering::Relaxed);
        if prev.checked_add(value).is_none() {
            self.overflowed.store(true, Ordering::Relaxed);
        }
        self.count[idx].fetch_add(1, Ordering::Relaxed);
    }

    /// Accumulated sum at slot `idx`.
    pub fn sum_at(&self, idx: usize) -> i32 {
        self.sum[idx].load(Ordering::Relaxed)
    }

    /// Visit count at slot `idx`.
    pub fn count_at(&self, idx: usize) -> u32 {
        self.count[idx].load(Ordering::Relaxed)
    }

    /// Snapshot of every sum, row-major.
    pub fn sums(&self) -> Vec<i32> {
        self.sum.iter().map(|s| s.load(Ordering::Relaxed)).collect()
    }

    /// Snapshot of every count, row-major.
    pub fn counts(&self) -> Vec<u32> {
        self.count.iter().map(|c| c.load(Ordering::Relaxed)).collect()
    }

    /// `true` once any sum wrapped.
    pub fn overflowed(&self) -> bool {
        self.overflowed.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/depth/accumulator.rs"]
mod tests;

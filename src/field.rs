// Trail field: the shared 2D intensity grid agents sense from and deposit into

use rayon::prelude::*;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::config::SATURATION;
use crate::error::{try_alloc_with, ConfigError, SimError};

// Deposits accumulate as fixed point so concurrent adds commute exactly.
const FRACTION_BITS: u32 = 32;
const FIXED_ONE: f64 = (1u64 << FRACTION_BITS) as f64;
// Set by saturating deposits; additive sums clamp below it.
const SATURATE_BIT: u64 = 1 << 63;
const PENDING_MAX: u64 = SATURATE_BIT - 1;

/// Most trail one cell can gather in a single tick. Larger sums clamp here.
pub const MAX_TICK_DEPOSIT: f64 = PENDING_MAX as f64 / FIXED_ONE;
/// Smallest deposit step. Positive amounts below it count as one step.
pub const DEPOSIT_RESOLUTION: f64 = 1.0 / FIXED_ONE;

/// Row-major grid of trail intensity with a scratch buffer for blurring and a
/// pending-deposit accumulator written concurrently during the agent pass.
pub struct TrailField {
    width: usize,
    height: usize,
    cells: Vec<f32>,
    scratch: Vec<f32>,
    pending: Vec<AtomicU64>,
}

impl TrailField {
    pub fn new(width: usize, height: usize) -> Result<Self, SimError> {
        if width == 0 || height == 0 {
            return Err(ConfigError::EmptyGrid { width, height }.into());
        }
        let len = width
            .checked_mul(height)
            .ok_or(ConfigError::GridTooLarge { width, height })?;
        Ok(Self {
            width,
            height,
            cells: try_alloc_with("trail field", len, || 0.0)?,
            scratch: try_alloc_with("trail scratch", len, || 0.0)?,
            pending: try_alloc_with("deposit accumulator", len, || AtomicU64::new(0))?,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Committed intensities, row-major.
    pub fn cells(&self) -> &[f32] {
        &self.cells
    }

    pub fn rows(&self) -> std::slice::ChunksExact<'_, f32> {
        self.cells.chunks_exact(self.width)
    }

    pub fn get(&self, x: usize, y: usize) -> f32 {
        self.cells[y * self.width + x]
    }

    pub fn set(&mut self, x: usize, y: usize, value: f32) {
        self.cells[y * self.width + x] = value;
    }

    pub fn clear(&mut self) {
        self.cells.fill(0.0);
        for p in &mut self.pending {
            *p.get_mut() = 0;
        }
    }

    /// Index of the cell containing `(x, y)`, clamped to the nearest valid cell.
    #[inline]
    pub fn cell_index(&self, x: f32, y: f32) -> usize {
        let cx = clamp_coord(x, self.width);
        let cy = clamp_coord(y, self.height);
        cy * self.width + cx
    }

    /// Committed intensity at `(x, y)`. Deposits of the running tick are not visible.
    #[inline]
    pub fn sample(&self, x: f32, y: f32) -> f32 {
        self.cells[self.cell_index(x, y)]
    }

    /// Queue an additive deposit. Safe to call from many threads at once.
    ///
    /// The per-tick sum for a cell clamps at [`MAX_TICK_DEPOSIT`] instead of
    /// wrapping, and a positive amount never rounds away to nothing.
    #[inline]
    pub fn deposit(&self, x: f32, y: f32, amount: f32) {
        if !(amount > 0.0) {
            return;
        }
        // `as u64` saturates, so infinities land on the cap too.
        let fixed = ((amount as f64 * FIXED_ONE).round() as u64).clamp(1, PENDING_MAX);
        let slot = &self.pending[self.cell_index(x, y)];
        // Clamped addition is still commutative, so the result is schedule-independent.
        let _ = slot.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |raw| {
            let sum = (raw & PENDING_MAX).saturating_add(fixed).min(PENDING_MAX);
            Some((raw & SATURATE_BIT) | sum)
        });
    }

    /// Queue a deposit that raises the cell to at least [`SATURATION`].
    #[inline]
    pub fn saturate(&self, x: f32, y: f32) {
        self.pending[self.cell_index(x, y)].fetch_or(SATURATE_BIT, Ordering::Relaxed);
    }

    /// Fold queued deposits into the committed cells and reset the accumulator.
    pub fn commit_deposits(&mut self) {
        self.cells
            .par_iter_mut()
            .zip(self.pending.par_iter_mut())
            .for_each(|(cell, pending)| {
                let raw = std::mem::take(pending.get_mut());
                if raw == 0 {
                    return;
                }
                let added = (raw & PENDING_MAX) as f64 / FIXED_ONE;
                *cell += added as f32;
                if raw & SATURATE_BIT != 0 {
                    *cell = cell.max(SATURATION);
                }
            });
    }

    /// Blend every cell toward its clamped 3x3 mean by `rate * dt` (capped at 1).
    pub fn diffuse(&mut self, rate: f32, dt: f32) {
        let blend = (rate * dt).clamp(0.0, 1.0);
        if !(blend > 0.0) {
            return;
        }
        let (width, height) = (self.width, self.height);
        let src = &self.cells;
        self.scratch
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(y, row)| {
                let ys = [y.saturating_sub(1), y, (y + 1).min(height - 1)];
                for (x, out) in row.iter_mut().enumerate() {
                    let xs = [x.saturating_sub(1), x, (x + 1).min(width - 1)];
                    let mut sum = 0.0;
                    for ny in ys {
                        let base = ny * width;
                        for nx in xs {
                            sum += src[base + nx];
                        }
                    }
                    let original = src[y * width + x];
                    *out = original + (sum / 9.0 - original) * blend;
                }
            });
        std::mem::swap(&mut self.cells, &mut self.scratch);
    }

    /// Multiply every cell by `max(0, 1 - rate * dt)`.
    pub fn decay(&mut self, rate: f32, dt: f32) {
        let factor = (1.0 - rate * dt).max(0.0);
        if factor == 1.0 {
            return;
        }
        self.cells.par_iter_mut().for_each(|c| *c *= factor);
    }

    /// Blur then fade, as run once per tick after the agent pass.
    pub fn post_process(&mut self, blur_rate: f32, fade_rate: f32, dt: f32) {
        self.diffuse(blur_rate, dt);
        self.decay(fade_rate, dt);
    }

    pub fn total_intensity(&self) -> f64 {
        self.cells.par_iter().map(|&c| c as f64).sum()
    }

    pub fn max_intensity(&self) -> f32 {
        self.cells.par_iter().copied().reduce(|| 0.0, f32::max)
    }
}

#[inline]
fn clamp_coord(v: f32, len: usize) -> usize {
    // NaN and negatives land on 0 via the saturating cast.
    (v.floor() as isize).clamp(0, len as isize - 1) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(w: usize, h: usize) -> TrailField {
        TrailField::new(w, h).unwrap()
    }

    #[test]
    fn test_new_rejects_empty() {
        assert!(matches!(
            TrailField::new(0, 4),
            Err(SimError::Config(ConfigError::EmptyGrid { .. }))
        ));
        assert!(matches!(
            TrailField::new(usize::MAX, 2),
            Err(SimError::Config(ConfigError::GridTooLarge { .. }))
        ));
    }

    #[test]
    fn test_sample_clamps_to_edge() {
        let mut f = field(4, 3);
        f.set(0, 0, 1.0);
        f.set(3, 2, 2.0);
        assert_eq!(f.sample(-5.0, -0.5), 1.0);
        assert_eq!(f.sample(10.0, 99.0), 2.0);
        assert_eq!(f.sample(3.999, 2.5), 2.0);
        assert_eq!(f.sample(f32::NAN, 0.0), 1.0);
        assert_eq!(f.sample(1.5, 1.5), 0.0);
    }

    #[test]
    fn test_deposit_not_visible_until_commit() {
        let mut f = field(4, 4);
        f.deposit(1.2, 2.7, 0.5);
        f.deposit(1.9, 2.1, 0.25);
        assert_eq!(f.sample(1.5, 2.5), 0.0);
        f.commit_deposits();
        assert_eq!(f.get(1, 2), 0.75);
        f.commit_deposits();
        assert_eq!(f.get(1, 2), 0.75);
    }

    #[test]
    fn test_saturate_raises_to_max_only() {
        let mut f = field(3, 1);
        f.set(0, 0, 3.0);
        f.saturate(0.5, 0.5);
        f.saturate(1.5, 0.5);
        f.saturate(1.5, 0.5);
        f.commit_deposits();
        assert_eq!(f.get(0, 0), 3.0);
        assert_eq!(f.get(1, 0), SATURATION);
        assert_eq!(f.get(2, 0), 0.0);
    }

    #[test]
    fn test_concurrent_deposits_are_not_lost() {
        let mut f = field(2, 2);
        let shared = &f;
        (0..10_000).into_par_iter().for_each(|i| {
            shared.deposit((i % 2) as f32, 0.0, 0.125);
        });
        f.commit_deposits();
        assert_eq!(f.get(0, 0), 625.0);
        assert_eq!(f.get(1, 0), 625.0);
        assert_eq!(f.get(0, 1), 0.0);
    }

    #[test]
    fn test_huge_deposits_clamp_instead_of_wrapping() {
        let mut f = field(3, 1);
        f.deposit(0.0, 0.0, 1e13);
        f.deposit(0.0, 0.0, f32::INFINITY);
        for _ in 0..3 {
            f.deposit(1.0, 0.0, 1e9);
        }
        f.saturate(2.0, 0.0);
        f.deposit(2.0, 0.0, 1e13);
        f.deposit(2.0, 0.0, 1e13);
        f.commit_deposits();

        let cap = MAX_TICK_DEPOSIT as f32;
        assert_eq!(f.get(0, 0), cap);
        assert_eq!(f.get(1, 0), cap);
        assert_eq!(f.get(2, 0), cap);
        assert!(cap > 2e9);

        // The cap is per tick; the committed cell keeps growing.
        f.deposit(1.0, 0.0, 1e9);
        f.commit_deposits();
        assert!(f.get(1, 0) > cap);
    }

    #[test]
    fn test_tiny_deposits_are_kept() {
        let mut f = field(2, 1);
        for _ in 0..1000 {
            f.deposit(0.0, 0.0, 1e-8);
        }
        f.deposit(1.0, 0.0, 1e-20);
        f.commit_deposits();
        assert!((f.get(0, 0) - 1e-5).abs() < 2e-7, "{}", f.get(0, 0));
        assert_eq!(f.get(1, 0), DEPOSIT_RESOLUTION as f32);
    }

    #[test]
    fn test_decay_scales_every_cell() {
        let mut f = field(5, 5);
        for (i, c) in f.cells.iter_mut().enumerate() {
            *c = i as f32 * 0.1;
        }
        let before = f.cells().to_vec();
        let factor = (1.0f32 - 0.2 * 0.5).max(0.0);
        f.decay(0.2, 0.5);
        for (a, b) in before.iter().zip(f.cells()) {
            assert!(*b <= *a);
            assert_eq!(*b, *a * factor);
        }
        f.decay(10.0, 1.0);
        assert!(f.cells().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn test_diffuse_conserves_total() {
        let mut f = field(7, 5);
        f.set(0, 0, 9.0);
        f.set(6, 4, 4.0);
        f.set(3, 2, 1.5);
        f.set(6, 0, 2.0);
        let before = f.total_intensity();
        for _ in 0..25 {
            f.diffuse(10.0, 0.05);
        }
        let after = f.total_intensity();
        assert!((before - after).abs() < 1e-4 * before, "{before} vs {after}");
        assert!(f.get(1, 1) > 0.0);
    }

    #[test]
    fn test_diffuse_full_blend_is_box_mean() {
        let mut f = field(3, 3);
        f.set(1, 1, 9.0);
        f.diffuse(1.0, 1.0);
        for y in 0..3 {
            for x in 0..3 {
                assert!((f.get(x, y) - 1.0).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_diffuse_zero_rate_is_identity() {
        let mut f = field(3, 2);
        f.set(2, 1, 4.0);
        f.diffuse(0.0, 1.0);
        assert_eq!(f.get(2, 1), 4.0);
        assert_eq!(f.total_intensity(), 4.0);
    }

    #[test]
    fn test_clear() {
        let mut f = field(2, 2);
        f.set(1, 1, 1.0);
        f.deposit(0.0, 0.0, 1.0);
        f.clear();
        f.commit_deposits();
        assert_eq!(f.max_intensity(), 0.0);
    }
}

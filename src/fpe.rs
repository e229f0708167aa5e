//! Floating-point expansion cache: the per-worker front end that coalesces
//! summands with error-free transforms before they reach the superaccumulator.
//!
//! The cache holds `N` lane batches of non-overlapping magnitude. Each
//! incoming batch runs a TwoSum cascade down the slots; whatever falls off
//! the end is exact residue and spills into the superaccumulator. Since
//! TwoSum and TwoProductFMA are error-free, nothing is ever lost — the cache
//! only exists to keep the (comparatively expensive) bin updates rare.

use crate::lane::LaneBatch;
use crate::superacc::Superaccumulator;

/// Knuth TwoSum: `(s, e)` with `s = fl(a + b)` and `a + b = s + e` exactly.
///
/// Branchless, no magnitude test, lanewise on any batch width.
#[inline(always)]
pub fn two_sum<L: LaneBatch>(a: L, b: L) -> (L, L) {
    let s = a + b;
    let z = s - a;
    let e = (a - (s - z)) + (b - z);
    (s, e)
}

/// TwoProductFMA: `(p, e)` with `p = fl(a * b)` and `a * b = p + e` exactly
/// (for finite `p`; the error term is one fused multiply-add).
#[inline(always)]
pub fn two_product_fma<L: LaneBatch>(a: L, b: L) -> (L, L) {
    let p = a * b;
    let e = a.mul_add(b, -p);
    (p, e)
}

/// Expansion cache of `N` batches (3 ≤ N ≤ 8) bound to one superaccumulator.
///
/// Slots hold finite values only: non-finite summands are diverted into the
/// accumulator's saturation state up front, because an infinity entering the
/// TwoSum cascade would turn the slots into NaN.
pub struct FpExpansion<'a, L: LaneBatch, const N: usize> {
    slots: [L; N],
    superacc: &'a mut Superaccumulator,
}

impl<'a, L: LaneBatch, const N: usize> FpExpansion<'a, L, N> {
    /// Bind an empty cache to `superacc`.
    pub fn new(superacc: &'a mut Superaccumulator) -> Self {
        const {
            assert!(N >= 3 && N <= 8, "expansion depth must be in [3, 8]");
        }
        Self {
            slots: [L::splat(0.0); N],
            superacc,
        }
    }

    /// Run one batch through the TwoSum cascade.
    ///
    /// Slot `k` keeps the high part, the low part carries into slot `k + 1`;
    /// the cascade short-circuits once the carry is all zero. A value
    /// displaced past the last slot spills into the superaccumulator.
    pub fn accumulate(&mut self, x: L) {
        let mut x = x;
        if !x.all_finite() {
            x.for_each_lane(|v| {
                if !v.is_finite() {
                    self.superacc.accumulate(v);
                }
            });
            x = x.zero_where_nonfinite(x);
        }
        for i in 0..N {
            let (s, e) = two_sum(self.slots[i], x);
            self.slots[i] = s;
            x = e;
            if i != 0 && !x.any_nonzero() {
                return;
            }
        }
        self.spill(x);
    }

    /// Spill every slot into the superaccumulator and zero the cache.
    ///
    /// Must run before the superaccumulator is normalized or merged.
    pub fn flush(&mut self) {
        for i in 0..N {
            let x = self.slots[i];
            self.slots[i] = L::splat(0.0);
            self.spill(x);
        }
    }

    fn spill(&mut self, x: L) {
        x.for_each_lane(|v| self.superacc.accumulate(v));
    }
}

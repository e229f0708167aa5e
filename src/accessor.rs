//! Input accessors: a slice or a broadcast scalar, interchangeable at
//! compile time.
//!
//! The kernels are generic over `DotInput`, so `exdot(n, &xs[..], 2.0)` is
//! the weighted sum `2 Σ xᵢ` with no separate code path and no output
//! difference from materializing the constant vector. binary32 inputs are
//! widened lane-by-lane on load; anything not convertible to binary64 fails
//! to compile at the trait bound.

use crate::lane::LaneBatch;

/// Element source for one dot-product operand.
pub trait DotInput: Copy + Sync {
    /// Scalar element access, used by the 1-lane path.
    fn get(&self, i: usize) -> f64;
    /// Load one full batch starting at element `i`.
    fn gather<L: LaneBatch>(&self, i: usize) -> L;
    /// Load `n < WIDTH` trailing elements starting at `i`, zero-filled.
    fn gather_partial<L: LaneBatch>(&self, i: usize, n: usize) -> L;
}

impl DotInput for &[f64] {
    #[inline(always)]
    fn get(&self, i: usize) -> f64 {
        self[i]
    }

    #[inline(always)]
    fn gather<L: LaneBatch>(&self, i: usize) -> L {
        L::load(self, i)
    }

    #[inline(always)]
    fn gather_partial<L: LaneBatch>(&self, i: usize, n: usize) -> L {
        L::load_partial(self, i, n)
    }
}

impl DotInput for &[f32] {
    #[inline(always)]
    fn get(&self, i: usize) -> f64 {
        self[i] as f64
    }

    #[inline(always)]
    fn gather<L: LaneBatch>(&self, i: usize) -> L {
        L::load_f32(self, i)
    }

    #[inline(always)]
    fn gather_partial<L: LaneBatch>(&self, i: usize, n: usize) -> L {
        L::load_f32_partial(self, i, n)
    }
}

/// Broadcast: the scalar stands in for a vector of repeated values.
impl DotInput for f64 {
    #[inline(always)]
    fn get(&self, _i: usize) -> f64 {
        *self
    }

    #[inline(always)]
    fn gather<L: LaneBatch>(&self, _i: usize) -> L {
        L::splat(*self)
    }

    #[inline(always)]
    fn gather_partial<L: LaneBatch>(&self, _i: usize, n: usize) -> L {
        // trailing lanes must stay zero so they contribute nothing
        let mut v = L::splat(0.0);
        if n > 0 {
            v = partial_splat::<L>(*self, n);
        }
        v
    }
}

impl DotInput for f32 {
    #[inline(always)]
    fn get(&self, _i: usize) -> f64 {
        *self as f64
    }

    #[inline(always)]
    fn gather<L: LaneBatch>(&self, i: usize) -> L {
        (*self as f64).gather(i)
    }

    #[inline(always)]
    fn gather_partial<L: LaneBatch>(&self, i: usize, n: usize) -> L {
        (*self as f64).gather_partial(i, n)
    }
}

/// Splat `v` into the first `n` lanes, zero elsewhere.
#[inline(always)]
fn partial_splat<L: LaneBatch>(v: f64, n: usize) -> L {
    debug_assert!(n <= L::WIDTH);
    let buf = [v; 8]; // WIDTH is at most 8
    L::load_partial(&buf[..L::WIDTH.min(buf.len())], 0, n)
}

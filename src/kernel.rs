//! Per-worker iteration: walk a batch-aligned range of the inputs and feed
//! exact (or deliberately once-rounded) products into the expansion cache.

use crate::accessor::DotInput;
use crate::fpe::{two_product_fma, FpExpansion};
use crate::lane::LaneBatch;

/// Range `[l, r)` for worker `t` of `tnum`, both ends rounded down to a
/// multiple of the batch width. With 1-lane batches the mask is a no-op and
/// the split is exact; otherwise the last worker also owns the tail
/// `[r_last, n)`.
pub fn partition(n: usize, t: usize, tnum: usize, lanes: usize) -> (usize, usize) {
    debug_assert!(lanes.is_power_of_two());
    let mask = !(lanes - 1);
    let l = (t as u128 * n as u128 / tnum as u128) as usize & mask;
    let r = ((t + 1) as u128 * n as u128 / tnum as u128) as usize & mask;
    (l, r)
}

/// Two-operand kernel over `[l, r)`: both halves of each TwoProductFMA go
/// into the cache, so the full 106-bit product is retained.
///
/// `tail` is `Some(n)` for the worker that owns the ragged end; lanes past
/// `n` are zero-filled before the transform. The error half is masked to
/// zero on lanes whose product is non-finite — those lanes are fully
/// described by the product half, and the fma residue there is an artifact.
pub fn dot2_range<L, A, B, const N: usize>(
    cache: &mut FpExpansion<'_, L, N>,
    a: A,
    b: B,
    l: usize,
    r: usize,
    tail: Option<usize>,
) where
    L: LaneBatch,
    A: DotInput,
    B: DotInput,
{
    let mut i = l;
    while i < r {
        let (p, e) = two_product_fma(a.gather::<L>(i), b.gather::<L>(i));
        cache.accumulate(p);
        cache.accumulate(e.zero_where_nonfinite(p));
        i += L::WIDTH;
    }
    if let Some(n) = tail {
        if r < n {
            let (p, e) = two_product_fma(
                a.gather_partial::<L>(r, n - r),
                b.gather_partial::<L>(r, n - r),
            );
            cache.accumulate(p);
            cache.accumulate(e.zero_where_nonfinite(p));
        }
    }
}

/// Three-operand kernel over `[l, r)`: `x₁ = fl(a·b)`, `x₂ = fl(x₁·c)`, one
/// rounding each, and only `x₂` enters the cache.
///
/// Reproducible but not bit-exact against the real triple product; the
/// once-rounded form is the compatibility contract. The `exact-triple`
/// feature swaps in the fully error-free variant (two TwoProductFMA levels
/// plus the cross term).
pub fn dot3_range<L, A, B, C, const N: usize>(
    cache: &mut FpExpansion<'_, L, N>,
    a: A,
    b: B,
    c: C,
    l: usize,
    r: usize,
    tail: Option<usize>,
) where
    L: LaneBatch,
    A: DotInput,
    B: DotInput,
    C: DotInput,
{
    let mut i = l;
    while i < r {
        triple_batch(cache, a.gather::<L>(i), b.gather::<L>(i), c.gather::<L>(i));
        i += L::WIDTH;
    }
    if let Some(n) = tail {
        if r < n {
            triple_batch(
                cache,
                a.gather_partial::<L>(r, n - r),
                b.gather_partial::<L>(r, n - r),
                c.gather_partial::<L>(r, n - r),
            );
        }
    }
}

#[cfg(not(feature = "exact-triple"))]
#[inline(always)]
fn triple_batch<L: LaneBatch, const N: usize>(cache: &mut FpExpansion<'_, L, N>, a: L, b: L, c: L) {
    let x1 = a * b;
    let x2 = x1 * c;
    cache.accumulate(x2);
}

#[cfg(feature = "exact-triple")]
#[inline(always)]
fn triple_batch<L: LaneBatch, const N: usize>(cache: &mut FpExpansion<'_, L, N>, a: L, b: L, c: L) {
    // a·b·c = (p₁ + e₁)·c = (p₂ + e₂) + (p₃ + e₃), each transform error-free
    let (p1, e1) = two_product_fma(a, b);
    let (p2, e2) = two_product_fma(p1, c);
    cache.accumulate(p2);
    cache.accumulate(e2.zero_where_nonfinite(p2));
    let (p3, e3) = two_product_fma(e1, c);
    cache.accumulate(p3);
    cache.accumulate(e3.zero_where_nonfinite(p3));
}

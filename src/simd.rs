//! 8-lane batch backing over portable SIMD (`std::simd::f64x8`).
//!
//! Compiled with `--features simd` on nightly. Every operation here is
//! lane-local, which is what keeps the SIMD path bit-compatible with the
//! scalar fallback in `lane.rs`.

use std::simd::cmp::SimdPartialEq;
use std::simd::num::SimdFloat;
use std::simd::{f64x8, StdFloat};

use crate::lane::LaneBatch;

impl LaneBatch for f64x8 {
    const WIDTH: usize = 8;

    #[inline(always)]
    fn splat(v: f64) -> Self {
        f64x8::splat(v)
    }

    #[inline(always)]
    fn load(src: &[f64], i: usize) -> Self {
        f64x8::from_slice(&src[i..i + 8])
    }

    #[inline(always)]
    fn load_partial(src: &[f64], i: usize, n: usize) -> Self {
        debug_assert!(n < 8);
        let mut lanes = [0.0; 8];
        lanes[..n].copy_from_slice(&src[i..i + n]);
        f64x8::from_array(lanes)
    }

    #[inline(always)]
    fn load_f32(src: &[f32], i: usize) -> Self {
        let mut lanes = [0.0; 8];
        for (l, &s) in lanes.iter_mut().zip(&src[i..i + 8]) {
            *l = s as f64;
        }
        f64x8::from_array(lanes)
    }

    #[inline(always)]
    fn load_f32_partial(src: &[f32], i: usize, n: usize) -> Self {
        debug_assert!(n < 8);
        let mut lanes = [0.0; 8];
        for (l, &s) in lanes.iter_mut().zip(&src[i..i + n]) {
            *l = s as f64;
        }
        f64x8::from_array(lanes)
    }

    #[inline(always)]
    fn mul_add(self, b: Self, c: Self) -> Self {
        StdFloat::mul_add(self, b, c)
    }

    #[inline(always)]
    fn any_nonzero(self) -> bool {
        self.simd_ne(f64x8::splat(0.0)).any()
    }

    #[inline(always)]
    fn all_finite(self) -> bool {
        self.is_finite().all()
    }

    #[inline(always)]
    fn zero_where_nonfinite(self, mask_src: Self) -> Self {
        mask_src.is_finite().select(self, f64x8::splat(0.0))
    }

    #[inline(always)]
    fn for_each_lane(self, mut f: impl FnMut(f64)) {
        for v in self.to_array() {
            f(v);
        }
    }
}

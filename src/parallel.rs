//! Worker spawn and deterministic tree reduction.
//!
//! Scoped threads, no pool, no runtime. Each worker owns one
//! superaccumulator in a shared array and one readiness counter in its own
//! cache line. After the local phase the workers merge up a binary tree
//! whose shape depends only on worker index — never on completion order —
//! so the reduced accumulator is independent of scheduling, and by
//! bin-addition associativity independent of the worker count itself.
//!
//! Synchronization is one release-acquire pair per merge: the child's
//! `fetch_add` on its readiness counter publishes its accumulator, the
//! parent's spin on that counter acquires it. Without the `simd` feature the
//! spin is replaced by a full barrier per level.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::superacc::Superaccumulator;

/// Fewest elements per worker before another thread is worth waking.
pub const MIN_GRAIN: usize = 8192;

/// Workers for an input of length `n`: one per logical CPU, capped so each
/// gets at least `MIN_GRAIN` elements, and always at least one.
pub fn thread_count(n: usize) -> usize {
    let hw = std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1);
    hw.min(n.div_ceil(MIN_GRAIN)).max(1)
}

/// One readiness counter, alone on its cache line to avoid false sharing
/// between the spinning parent and unrelated writers.
#[repr(align(64))]
struct ReadySlot(AtomicU32);

/// A worker-owned superaccumulator slot.
///
/// Sound without a lock because access follows the reduction protocol:
/// during the local phase only the owning worker touches slot `t`; during
/// reduction level `s` only the parent `t & !(2^s - 1)` touches it, and only
/// after the owner's release-increment of `ready[t]` (acquired by the
/// parent's spin or by the per-level barrier). A slot is never touched again
/// by its owner once the owner has published the level that hands it over.
struct AccSlot(UnsafeCell<Superaccumulator>);

unsafe impl Sync for AccSlot {}

/// Run `local(tid, tnum, acc)` on `tnum` workers and tree-reduce their
/// accumulators into one. The result is left unnormalized.
///
/// `local` must leave `acc` flushed (no expansion cache still bound to it);
/// normalization happens here. Worker spawn failure is fatal and panics.
pub fn reduce_workers<F>(tnum: usize, local: F) -> Superaccumulator
where
    F: Fn(usize, usize, &mut Superaccumulator) + Sync,
{
    assert!(tnum >= 1);
    let accs: Vec<AccSlot> = (0..tnum)
        .map(|_| AccSlot(UnsafeCell::new(Superaccumulator::new())))
        .collect();
    let ready: Vec<ReadySlot> = (0..tnum).map(|_| ReadySlot(AtomicU32::new(0))).collect();
    #[cfg(not(feature = "simd"))]
    let barrier = std::sync::Barrier::new(tnum);

    std::thread::scope(|scope| {
        for tid in 0..tnum {
            let accs = &accs;
            let ready = &ready;
            let local = &local;
            #[cfg(not(feature = "simd"))]
            let barrier = &barrier;
            scope.spawn(move || {
                {
                    // local phase: sole writer of this slot
                    let acc = unsafe { &mut *accs[tid].0.get() };
                    local(tid, tnum, acc);
                    acc.normalize();
                }
                let mut s = 1u32;
                while 1usize << (s - 1) < tnum {
                    // publish: local phase and all levels below s are done
                    ready[tid].0.fetch_add(1, Ordering::Release);
                    #[cfg(not(feature = "simd"))]
                    barrier.wait();
                    if tid % (1 << s) == 0 {
                        let tid2 = tid | 1 << (s - 1);
                        if tid2 < tnum {
                            #[cfg(feature = "simd")]
                            while ready[tid2].0.load(Ordering::Acquire) < s {
                                std::hint::spin_loop();
                            }
                            // SAFETY: tid2 has published level s, its borrows
                            // of both slots are gone, and it never touches
                            // its slot below level s again (its index keeps
                            // bit s-1 set, so it is a pure publisher from
                            // here on). This thread is the unique parent.
                            let acc = unsafe { &mut *accs[tid].0.get() };
                            let other = unsafe { &mut *accs[tid2].0.get() };
                            acc.normalize();
                            other.normalize();
                            acc.merge_from(other);
                        }
                    }
                    s += 1;
                }
            });
        }
    });

    accs.into_iter()
        .next()
        .map(|slot| slot.0.into_inner())
        .unwrap()
}

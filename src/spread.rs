/*
 * // Copyright (c) Radzivon Bartoshyk 3/2026. All rights reserved.
 * //
 * // Redistribution and use in source and binary forms, with or without modification,
 * // are permitted provided that the following conditions are met:
 * //
 * // 1.  Redistributions of source code must retain the above copyright notice, this
 * // list of conditions and the following disclaimer.
 * //
 * // 2.  Redistributions in binary form must reproduce the above copyright notice,
 * // this list of conditions and the following disclaimer in the documentation
 * // and/or other materials provided with the distribution.
 * //
 * // 3.  Neither the name of the copyright holder nor the names of its
 * // contributors may be used to endorse or promote products derived from
 * // this software without specific prior written permission.
 * //
 * // THIS SOFTWARE IS PROVIDED BY THE COPYRIGHT HOLDERS AND CONTRIBUTORS "AS IS"
 * // AND ANY EXPRESS OR IMPLIED WARRANTIES, INCLUDING, BUT NOT LIMITED TO, THE
 * // IMPLIED WARRANTIES OF MERCHANTABILITY AND FITNESS FOR A PARTICULAR PURPOSE ARE
 * // DISCLAIMED. IN NO EVENT SHALL THE COPYRIGHT HOLDER OR CONTRIBUTORS BE LIABLE
 * // FOR ANY DIRECT, INDIRECT, INCIDENTAL, SPECIAL, EXEMPLARY, OR CONSEQUENTIAL
 * // DAMAGES (INCLUDING, BUT NOT LIMITED TO, PROCUREMENT OF SUBSTITUTE GOODS OR
 * // SERVICES; LOSS OF USE, DATA, OR PROFITS; OR BUSINESS INTERRUPTION) HOWEVER
 * // CAUSED AND ON ANY THEORY OF LIABILITY, WHETHER IN CONTRACT, STRICT LIABILITY,
 * // OR TORT (INCLUDING NEGLIGENCE OR OTHERWISE) ARISING IN ANY WAY OUT OF THE USE
 * // OF THIS SOFTWARE, EVEN IF ADVISED OF THE POSSIBILITY OF SUCH DAMAGE.
 */
use crate::err::{try_vec, ZunftError};
use crate::kernel::es_kernel;
use crate::opts::{KernelEvalMethod, SpreadOpts, SpreadSort, MAX_NSPREAD};
use crate::util::{fold_rescale, wrap_index};
use crate::NufftSample;
use novtb::{ParallelZonedIterator, TbSliceMut};
use num_complex::Complex;
use num_traits::AsPrimitive;

const THREE_PI: f64 = 3.0 * std::f64::consts::PI;

/// Below this many points the shadow-grid machinery costs more than it saves.
const SERIAL_SPREAD_CUTOFF: usize = 8192;

/// Bin edge lengths, in fine-grid cells, used by the locality sort.
const BIN_DIMS: [usize; 3] = [16, 4, 4];

/// Rejects coordinates outside `[-3pi, 3pi]` when bounds checking is on.
pub(crate) fn spread_check<T: NufftSample>(
    dim: usize,
    x: &[T],
    y: &[T],
    z: &[T],
    sp: &SpreadOpts,
) -> Result<(), ZunftError> {
    if !sp.chkbnds {
        return Ok(());
    }
    let mut axes: [&[T]; 3] = [x, &[], &[]];
    if dim > 1 {
        axes[1] = y;
    }
    if dim > 2 {
        axes[2] = z;
    }
    for axis in axes.iter().take(dim) {
        for (j, v) in axis.iter().enumerate() {
            let v: f64 = v.as_();
            if !(-THREE_PI..=THREE_PI).contains(&v) {
                return Err(ZunftError::SpreadBounds(j));
            }
        }
    }
    Ok(())
}

/// Bin sort of nonuniform points over boxes of `BIN_DIMS` grid cells, which
/// keeps successive stencil writes close in memory. Returns the permutation
/// and whether sorting actually happened; an unsorted (identity) permutation
/// is always a valid input to the spread/interp calls below.
///
/// The heuristic sorts once the cloud outnumbers `32 * cbrt(grid volume)`,
/// below which pass order barely matters for cache residency.
pub(crate) fn index_sort<T: NufftSample>(
    dim: usize,
    nf: [usize; 3],
    x: &[T],
    y: &[T],
    z: &[T],
    sp: &SpreadOpts,
) -> Result<(Vec<usize>, bool), ZunftError> {
    let nj = x.len();
    let nf_total = nf[0] * nf[1] * nf[2];
    let do_sort = match sp.sort {
        SpreadSort::Never => false,
        SpreadSort::Always => true,
        SpreadSort::Heuristic => nj as f64 > 32.0 * (nf_total as f64).cbrt(),
    };
    let mut perm = try_vec![0usize; nj];
    if !do_sort {
        for (i, p) in perm.iter_mut().enumerate() {
            *p = i;
        }
        return Ok((perm, false));
    }

    let mut nbins = [1usize; 3];
    for d in 0..dim {
        nbins[d] = nf[d].div_ceil(BIN_DIMS[d]).max(1);
    }
    let mut bin_of = try_vec![0usize; nj];
    for (j, b) in bin_of.iter_mut().enumerate() {
        let b1 = (fold_rescale(x[j].as_(), nf[0]) as usize / BIN_DIMS[0]).min(nbins[0] - 1);
        let mut bin = b1;
        if dim > 1 {
            let b2 = (fold_rescale(y[j].as_(), nf[1]) as usize / BIN_DIMS[1]).min(nbins[1] - 1);
            bin += nbins[0] * b2;
        }
        if dim > 2 {
            let b3 = (fold_rescale(z[j].as_(), nf[2]) as usize / BIN_DIMS[2]).min(nbins[2] - 1);
            bin += nbins[0] * nbins[1] * b3;
        }
        *b = bin;
    }
    let mut offsets = try_vec![0usize; nbins[0] * nbins[1] * nbins[2] + 1];
    for &b in bin_of.iter() {
        offsets[b + 1] += 1;
    }
    for i in 1..offsets.len() {
        offsets[i] += offsets[i - 1];
    }
    for (j, &b) in bin_of.iter().enumerate() {
        perm[offsets[b]] = j;
        offsets[b] += 1;
    }
    Ok((perm, true))
}

#[inline(always)]
fn eval_kernel_row(ker: &mut [f64; MAX_NSPREAD], x1: f64, ns: usize, sp: &SpreadOpts) {
    // padding to a multiple of 4 gives the autovectorizer fixed-length runs;
    // entries past the support evaluate to zero and are never read back
    let width = if sp.kerpad && sp.kerevalmeth == KernelEvalMethod::Direct {
        ns.next_multiple_of(4).min(MAX_NSPREAD)
    } else {
        ns
    };
    for (l, k) in ker.iter_mut().enumerate().take(width) {
        *k = es_kernel(x1 + l as f64, sp.beta, sp.es_c);
    }
}

#[inline(always)]
fn spread_one<T: NufftSample>(
    dim: usize,
    nf: [usize; 3],
    fw: &mut [Complex<T>],
    x: &[T],
    y: &[T],
    z: &[T],
    j: usize,
    cj: Complex<T>,
    sp: &SpreadOpts,
) where
    f64: AsPrimitive<T>,
{
    let ns = sp.nspread;
    let ns2 = ns as f64 / 2.0;
    let gx = fold_rescale(x[j].as_(), nf[0]);
    let i1 = (gx - ns2).ceil() as i64;
    let mut ker1 = [0.0f64; MAX_NSPREAD];
    eval_kernel_row(&mut ker1, i1 as f64 - gx, ns, sp);
    match dim {
        1 => {
            for (l1, &k1) in ker1.iter().enumerate().take(ns) {
                let w: T = k1.as_();
                fw[wrap_index(i1 + l1 as i64, nf[0])] += cj * w;
            }
        }
        2 => {
            let gy = fold_rescale(y[j].as_(), nf[1]);
            let i2 = (gy - ns2).ceil() as i64;
            let mut ker2 = [0.0f64; MAX_NSPREAD];
            eval_kernel_row(&mut ker2, i2 as f64 - gy, ns, sp);
            for (l2, &k2) in ker2.iter().enumerate().take(ns) {
                let base = wrap_index(i2 + l2 as i64, nf[1]) * nf[0];
                for (l1, &k1) in ker1.iter().enumerate().take(ns) {
                    let w: T = (k2 * k1).as_();
                    fw[base + wrap_index(i1 + l1 as i64, nf[0])] += cj * w;
                }
            }
        }
        _ => {
            let gy = fold_rescale(y[j].as_(), nf[1]);
            let i2 = (gy - ns2).ceil() as i64;
            let mut ker2 = [0.0f64; MAX_NSPREAD];
            eval_kernel_row(&mut ker2, i2 as f64 - gy, ns, sp);
            let gz = fold_rescale(z[j].as_(), nf[2]);
            let i3 = (gz - ns2).ceil() as i64;
            let mut ker3 = [0.0f64; MAX_NSPREAD];
            eval_kernel_row(&mut ker3, i3 as f64 - gz, ns, sp);
            for (l3, &k3) in ker3.iter().enumerate().take(ns) {
                let plane = wrap_index(i3 + l3 as i64, nf[2]) * nf[0] * nf[1];
                for (l2, &k2) in ker2.iter().enumerate().take(ns) {
                    let base = plane + wrap_index(i2 + l2 as i64, nf[1]) * nf[0];
                    let k32 = k3 * k2;
                    for (l1, &k1) in ker1.iter().enumerate().take(ns) {
                        let w: T = (k32 * k1).as_();
                        fw[base + wrap_index(i1 + l1 as i64, nf[0])] += cj * w;
                    }
                }
            }
        }
    }
}

#[inline(always)]
fn interp_one<T: NufftSample>(
    dim: usize,
    nf: [usize; 3],
    fw: &[Complex<T>],
    x: &[T],
    y: &[T],
    z: &[T],
    j: usize,
    sp: &SpreadOpts,
) -> Complex<T>
where
    f64: AsPrimitive<T>,
{
    let ns = sp.nspread;
    let ns2 = ns as f64 / 2.0;
    let gx = fold_rescale(x[j].as_(), nf[0]);
    let i1 = (gx - ns2).ceil() as i64;
    let mut ker1 = [0.0f64; MAX_NSPREAD];
    eval_kernel_row(&mut ker1, i1 as f64 - gx, ns, sp);
    let mut acc = Complex::<T>::default();
    match dim {
        1 => {
            for (l1, &k1) in ker1.iter().enumerate().take(ns) {
                let w: T = k1.as_();
                acc += fw[wrap_index(i1 + l1 as i64, nf[0])] * w;
            }
        }
        2 => {
            let gy = fold_rescale(y[j].as_(), nf[1]);
            let i2 = (gy - ns2).ceil() as i64;
            let mut ker2 = [0.0f64; MAX_NSPREAD];
            eval_kernel_row(&mut ker2, i2 as f64 - gy, ns, sp);
            for (l2, &k2) in ker2.iter().enumerate().take(ns) {
                let base = wrap_index(i2 + l2 as i64, nf[1]) * nf[0];
                for (l1, &k1) in ker1.iter().enumerate().take(ns) {
                    let w: T = (k2 * k1).as_();
                    acc += fw[base + wrap_index(i1 + l1 as i64, nf[0])] * w;
                }
            }
        }
        _ => {
            let gy = fold_rescale(y[j].as_(), nf[1]);
            let i2 = (gy - ns2).ceil() as i64;
            let mut ker2 = [0.0f64; MAX_NSPREAD];
            eval_kernel_row(&mut ker2, i2 as f64 - gy, ns, sp);
            let gz = fold_rescale(z[j].as_(), nf[2]);
            let i3 = (gz - ns2).ceil() as i64;
            let mut ker3 = [0.0f64; MAX_NSPREAD];
            eval_kernel_row(&mut ker3, i3 as f64 - gz, ns, sp);
            for (l3, &k3) in ker3.iter().enumerate().take(ns) {
                let plane = wrap_index(i3 + l3 as i64, nf[2]) * nf[0] * nf[1];
                for (l2, &k2) in ker2.iter().enumerate().take(ns) {
                    let base = plane + wrap_index(i2 + l2 as i64, nf[1]) * nf[0];
                    let k32 = k3 * k2;
                    for (l1, &k1) in ker1.iter().enumerate().take(ns) {
                        let w: T = (k32 * k1).as_();
                        acc += fw[base + wrap_index(i1 + l1 as i64, nf[0])] * w;
                    }
                }
            }
        }
    }
    acc
}

/// Direction 1: zeroes the working slab, then accumulates every strength
/// through the kernel stencil, periodic in each dimension.
///
/// With more than one thread and a large cloud, contiguous runs of the sorted
/// permutation go to per-thread shadow slabs that are summed row-parallel
/// afterwards; the schedule is deterministic for a fixed thread count.
pub(crate) fn spread_sorted<T: NufftSample>(
    perm: &[usize],
    dim: usize,
    nf: [usize; 3],
    fw: &mut [Complex<T>],
    x: &[T],
    y: &[T],
    z: &[T],
    c: &[Complex<T>],
    sp: &SpreadOpts,
    did_sort: bool,
    nthreads: usize,
) -> Result<(), ZunftError>
where
    f64: AsPrimitive<T>,
{
    for v in fw.iter_mut() {
        *v = Complex::default();
    }
    let nj = perm.len();
    if nthreads <= 1 || nj < SERIAL_SPREAD_CUTOFF {
        if did_sort {
            for &j in perm.iter() {
                spread_one(dim, nf, fw, x, y, z, j, c[j], sp);
            }
        } else {
            // identity permutation, skip the indirection
            for j in 0..nj {
                spread_one(dim, nf, fw, x, y, z, j, c[j], sp);
            }
        }
        return Ok(());
    }

    let vol = fw.len();
    let shadow_len = vol
        .checked_mul(nthreads)
        .ok_or(ZunftError::OutOfMemory(vol.saturating_mul(nthreads)))?;
    let mut shadows = try_vec![Complex::<T>::default(); shadow_len];
    let chunk = nj.div_ceil(nthreads);
    let pool = novtb::ThreadPool::new(nthreads);
    shadows
        .tb_par_chunks_exact_mut(vol)
        .for_each_enumerated(&pool, |t, shadow| {
            let lo = (t * chunk).min(nj);
            let hi = ((t + 1) * chunk).min(nj);
            if did_sort {
                for &j in perm[lo..hi].iter() {
                    spread_one(dim, nf, shadow, x, y, z, j, c[j], sp);
                }
            } else {
                for j in lo..hi {
                    spread_one(dim, nf, shadow, x, y, z, j, c[j], sp);
                }
            }
        });
    let row = nf[0];
    let shadows = &shadows[..];
    fw.tb_par_chunks_exact_mut(row)
        .for_each_enumerated(&pool, |r, out| {
            for t in 0..nthreads {
                let src = &shadows[t * vol + r * row..t * vol + (r + 1) * row];
                for (o, s) in out.iter_mut().zip(src.iter()) {
                    *o += *s;
                }
            }
        });
    Ok(())
}

/// Direction 2: samples the grid at every nonuniform point through the same
/// stencil, writing one value per point. The single-threaded path walks the
/// sorted order for cache residency; the parallel path splits the output.
pub(crate) fn interp_sorted<T: NufftSample>(
    perm: &[usize],
    dim: usize,
    nf: [usize; 3],
    fw: &[Complex<T>],
    x: &[T],
    y: &[T],
    z: &[T],
    c: &mut [Complex<T>],
    sp: &SpreadOpts,
    did_sort: bool,
    nthreads: usize,
) -> Result<(), ZunftError>
where
    f64: AsPrimitive<T>,
{
    let nj = perm.len();
    if nthreads <= 1 || nj < SERIAL_SPREAD_CUTOFF {
        if did_sort {
            for &j in perm.iter() {
                c[j] = interp_one(dim, nf, fw, x, y, z, j, sp);
            }
        } else {
            for (j, o) in c.iter_mut().enumerate().take(nj) {
                *o = interp_one(dim, nf, fw, x, y, z, j, sp);
            }
        }
        return Ok(());
    }
    let chunk = nj.div_ceil(nthreads);
    let full = (nj / chunk) * chunk;
    let pool = novtb::ThreadPool::new(nthreads);
    c[..full]
        .tb_par_chunks_exact_mut(chunk)
        .for_each_enumerated(&pool, |q, out| {
            let j0 = q * chunk;
            for (jj, o) in out.iter_mut().enumerate() {
                *o = interp_one(dim, nf, fw, x, y, z, j0 + jj, sp);
            }
        });
    for (j, o) in c.iter_mut().enumerate().skip(full) {
        *o = interp_one(dim, nf, fw, x, y, z, j, sp);
    }
    Ok(())
}

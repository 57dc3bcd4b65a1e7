/*
 * // Copyright (c) Radzivon Bartoshyk 2/2026. All rights reserved.
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
use crate::err::ZunftError;
use crate::opts::{NufftOpts, SpreadOpts};
use num_traits::AsPrimitive;

/// Cap on `nf1*nf2*nf3*batch`; grids past this are refused outright.
pub(crate) const MAX_NF: u64 = 100_000_000_000;

/// Batch sizes beyond this many transforms stop paying off.
pub(crate) const MAX_USEFUL_NTHREADS: usize = 24;

pub(crate) fn available_threads() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(1)
}

/// Smallest even number `>= n` whose prime factors are all in {2, 3, 5}.
pub(crate) fn next235even(n: usize) -> usize {
    if n <= 2 {
        return 2;
    }
    let mut nplus = if n % 2 == 1 { n + 1 } else { n };
    loop {
        let mut numdiv = nplus;
        while numdiv % 2 == 0 {
            numdiv /= 2;
        }
        while numdiv % 3 == 0 {
            numdiv /= 3;
        }
        while numdiv % 5 == 0 {
            numdiv /= 5;
        }
        if numdiv == 1 {
            return nplus;
        }
        nplus += 2;
    }
}

/// Fine-grid size for types 1 and 2: `sigma*m`, floored at twice the kernel
/// width, rounded to the next even 2,3,5-smooth integer.
pub(crate) fn set_nf_type12(
    m: usize,
    opts: &NufftOpts,
    sp: &SpreadOpts,
) -> Result<usize, ZunftError> {
    let mut nf = (opts.upsampfac * m as f64) as usize;
    if nf < 2 * sp.nspread {
        nf = 2 * sp.nspread;
    }
    if (nf as u64) < MAX_NF {
        Ok(next235even(nf))
    } else {
        Err(ZunftError::MaxNallocExceeded(nf))
    }
}

/// Maps a coordinate in `[-3pi, 3pi]` onto the periodic grid `[0, n)`,
/// with `x = 0` landing on grid index 0.
#[inline]
pub(crate) fn fold_rescale(x: f64, n: usize) -> f64 {
    let w = x * (0.5 * std::f64::consts::FRAC_1_PI);
    (w - w.floor()) * n as f64
}

#[inline]
pub(crate) fn wrap_index(i: i64, n: usize) -> usize {
    let m = i % n as i64;
    (if m < 0 { m + n as i64 } else { m }) as usize
}

/// Half-width and center of the interval enclosing `vals`. Centers much
/// smaller than the width are snapped to zero (the width grows to cover),
/// which keeps later phase factors trivial for roughly centered data.
pub(crate) fn array_width_center<T: Copy + AsPrimitive<f64>>(vals: &[T]) -> (f64, f64) {
    if vals.is_empty() {
        return (0.0, 0.0);
    }
    let mut lo = f64::INFINITY;
    let mut hi = f64::NEG_INFINITY;
    for v in vals.iter() {
        let v: f64 = v.as_();
        lo = lo.min(v);
        hi = hi.max(v);
    }
    let mut w = (hi - lo) / 2.0;
    let mut c = (hi + lo) / 2.0;
    if c.abs() < 0.1 * w {
        w += c.abs();
        c = 0.0;
    }
    (w, c)
}

/// Type-3 grid sizing: given target half-width `s` and source half-width `x`,
/// returns the fine grid size, its spacing `h`, and the source scale `gamma`.
pub(crate) fn set_nhg_type3(
    s: f64,
    x: f64,
    opts: &NufftOpts,
    sp: &SpreadOpts,
) -> Result<(usize, f64, f64), ZunftError> {
    let nss = sp.nspread + 1;
    let mut x_safe = x;
    let mut s_safe = s;
    // degenerate clouds still need X*S >= 1 for a sane grid
    if x == 0.0 {
        if s == 0.0 {
            x_safe = 1.0;
            s_safe = 1.0;
        } else {
            x_safe = x_safe.max(1.0 / s);
        }
    } else {
        s_safe = s_safe.max(1.0 / x);
    }
    let nfd = 2.0 * opts.upsampfac * s_safe * x_safe / std::f64::consts::PI + nss as f64;
    let nfd = if nfd.is_finite() { nfd } else { 0.0 };
    let mut nf = nfd as usize;
    if nf < 2 * sp.nspread {
        nf = 2 * sp.nspread;
    }
    if nf as u64 >= MAX_NF {
        return Err(ZunftError::MaxNallocExceeded(nf));
    }
    let nf = next235even(nf);
    let h = 2.0 * std::f64::consts::PI / nf as f64;
    let gam = nf as f64 / (2.0 * opts.upsampfac * s_safe);
    Ok((nf, h, gam))
}

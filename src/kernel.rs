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
use crate::opts::SpreadOpts;
use num_traits::AsPrimitive;
use std::f64::consts::PI;

pub(crate) const MAX_NQUAD: usize = 100;

/// Exponential-of-semicircle spreading kernel, `exp(beta*(sqrt(1-z^2)-1))`
/// with `z = 2x/nspread`; identically zero outside the support.
#[inline]
pub(crate) fn es_kernel(x: f64, beta: f64, es_c: f64) -> f64 {
    let arg = 1.0 - es_c * x * x;
    if arg <= 0.0 {
        return 0.0;
    }
    (beta * (arg.sqrt() - 1.0)).exp()
}

/// Legendre polynomial `P_n` and its derivative at `x`, by the three-term
/// recurrence.
fn legendre_pd(n: usize, x: f64) -> (f64, f64) {
    let mut p0 = 1.0f64;
    let mut p1 = x;
    if n == 0 {
        return (1.0, 0.0);
    }
    for k in 2..=n {
        let k = k as f64;
        let p2 = ((2.0 * k - 1.0) * x * p1 - (k - 1.0) * p0) / k;
        p0 = p1;
        p1 = p2;
    }
    let dp = n as f64 * (x * p1 - p0) / (x * x - 1.0);
    (p1, dp)
}

/// Gauss-Legendre nodes and weights on `[-1, 1]`, Newton iteration from the
/// Chebyshev initial guess. Nodes are returned with the positive half first,
/// descending.
pub(crate) fn gauss_legendre(n: usize, nodes: &mut [f64], weights: &mut [f64]) {
    let m = (n + 1) / 2;
    for i in 0..m {
        let mut x = (PI * (i as f64 + 0.75) / (n as f64 + 0.5)).cos();
        for _ in 0..60 {
            let (p, dp) = legendre_pd(n, x);
            let step = p / dp;
            x -= step;
            if step.abs() < 5e-16 {
                break;
            }
        }
        let (_, dp) = legendre_pd(n, x);
        let w = 2.0 / ((1.0 - x * x) * dp * dp);
        nodes[i] = x;
        nodes[n - 1 - i] = -x;
        weights[i] = w;
        weights[n - 1 - i] = w;
    }
}

/// Quadrature nodes over the positive half of the kernel support, paired with
/// `weight * kernel` values. Shared by the series and nonuniform FT below.
fn kernel_quadrature(q: usize, sp: &SpreadOpts, z: &mut [f64], f: &mut [f64]) {
    let j2 = sp.nspread as f64 / 2.0;
    let mut nodes = [0.0f64; 2 * MAX_NQUAD];
    let mut weights = [0.0f64; 2 * MAX_NQUAD];
    gauss_legendre(2 * q, &mut nodes, &mut weights);
    for n in 0..q {
        let zn = nodes[n] * j2;
        z[n] = zn;
        f[n] = j2 * weights[n] * es_kernel(zn, sp.beta, sp.es_c);
    }
}

/// Fills the nonnegative half (`nf/2 + 1` entries) of the kernel's Fourier
/// series on an `nf`-point grid. Values are positive and decay monotonically
/// away from frequency zero, up to rounding.
pub(crate) fn onedim_fseries_kernel<T: Copy + 'static>(nf: usize, out: &mut [T], sp: &SpreadOpts)
where
    f64: AsPrimitive<T>,
{
    let q = (2.0 + 3.0 * sp.nspread as f64 / 2.0) as usize;
    debug_assert!(q <= MAX_NQUAD);
    let mut z = [0.0f64; MAX_NQUAD];
    let mut f = [0.0f64; MAX_NQUAD];
    kernel_quadrature(q, sp, &mut z, &mut f);
    let nout = nf / 2 + 1;
    let step = 2.0 * PI / nf as f64;
    for (j, o) in out.iter_mut().enumerate().take(nout) {
        let kj = j as f64 * step;
        let mut acc = 0.0f64;
        for n in 0..q {
            acc += 2.0 * f[n] * (kj * z[n]).cos();
        }
        *o = acc.as_();
    }
}

/// Continuous Fourier transform of the kernel at arbitrary frequencies `ks`
/// (radians per fine-grid point), one output per target.
pub(crate) fn onedim_nuft_kernel<T: Copy + AsPrimitive<f64> + 'static>(
    ks: &[T],
    out: &mut [T],
    sp: &SpreadOpts,
) where
    f64: AsPrimitive<T>,
{
    let q = (2.0 + 2.0 * sp.nspread as f64 / 2.0) as usize;
    debug_assert!(q <= MAX_NQUAD);
    let mut z = [0.0f64; MAX_NQUAD];
    let mut f = [0.0f64; MAX_NQUAD];
    kernel_quadrature(q, sp, &mut z, &mut f);
    for (k, o) in ks.iter().zip(out.iter_mut()) {
        let kk: f64 = k.as_();
        let mut acc = 0.0f64;
        for n in 0..q {
            acc += 2.0 * f[n] * (kk * z[n]).cos();
        }
        *o = acc.as_();
    }
}

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

//! Division of mode arrays by the kernel's Fourier series, fused with the
//! shuffle between user mode ordering and the FFT grid's natural layout.
//! Mode `k` of an `m`-long band lives at grid slot `k mod nf`; on the user
//! side it lives at `k + m/2` (increasing ordering) or `k mod m` (FFT
//! ordering). The band is `[-m/2, (m-1)/2]` in every dimension.

use crate::opts::ModeOrder;
use crate::NufftSample;
use num_complex::Complex;
use num_traits::AsPrimitive;

#[inline]
fn band(m: usize) -> (i64, i64) {
    (-((m / 2) as i64), ((m - 1) / 2) as i64)
}

#[inline]
fn starts(m: usize, kmax: i64, modeord: ModeOrder) -> (usize, usize) {
    // element offsets of mode 0 and of the most negative mode
    match modeord {
        ModeOrder::Cmcl => (m / 2, 0),
        ModeOrder::Fft => (0, (kmax + 1) as usize),
    }
}

/// Finishing step of an adjoint transform: pull the mode band out of the
/// grid slab `fw`, amplifying by `prefac / ker`.
pub(crate) fn deconvolve_to_modes_1d<T: NufftSample>(
    prefac: f64,
    ker: &[T],
    ms: usize,
    fk: &mut [Complex<T>],
    nf1: usize,
    fw: &[Complex<T>],
    modeord: ModeOrder,
) where
    f64: AsPrimitive<T>,
{
    let (kmin, kmax) = band(ms);
    let (pp, pn) = starts(ms, kmax, modeord);
    for k in 0..=kmax as usize {
        let scale: T = (prefac / ker[k].as_()).as_();
        fk[pp + k] = fw[k] * scale;
    }
    for (i, k) in (kmin..0).enumerate() {
        let scale: T = (prefac / ker[(-k) as usize].as_()).as_();
        fk[pn + i] = fw[(nf1 as i64 + k) as usize] * scale;
    }
}

/// Starting step of a forward transform: place the amplified mode band into
/// the grid slab `fw` and zero everything outside it.
pub(crate) fn deconvolve_to_grid_1d<T: NufftSample>(
    prefac: f64,
    ker: &[T],
    ms: usize,
    fk: &[Complex<T>],
    nf1: usize,
    fw: &mut [Complex<T>],
    modeord: ModeOrder,
) where
    f64: AsPrimitive<T>,
{
    let (kmin, kmax) = band(ms);
    let (pp, pn) = starts(ms, kmax, modeord);
    for k in 0..=kmax as usize {
        let scale: T = (prefac / ker[k].as_()).as_();
        fw[k] = fk[pp + k] * scale;
    }
    for v in fw[(kmax + 1) as usize..(nf1 as i64 + kmin) as usize].iter_mut() {
        *v = Complex::default();
    }
    for (i, k) in (kmin..0).enumerate() {
        let scale: T = (prefac / ker[(-k) as usize].as_()).as_();
        fw[(nf1 as i64 + k) as usize] = fk[pn + i] * scale;
    }
}

pub(crate) fn deconvolve_to_modes_2d<T: NufftSample>(
    prefac: f64,
    ker1: &[T],
    ker2: &[T],
    ms: usize,
    mt: usize,
    fk: &mut [Complex<T>],
    nf1: usize,
    nf2: usize,
    fw: &[Complex<T>],
    modeord: ModeOrder,
) where
    f64: AsPrimitive<T>,
{
    let (k2min, k2max) = band(mt);
    let (pp, pn) = starts(mt, k2max, modeord);
    let mut pp = pp * ms;
    let mut pn = pn * ms;
    for k2 in 0..=k2max as usize {
        let pf = prefac / ker2[k2].as_();
        deconvolve_to_modes_1d(
            pf,
            ker1,
            ms,
            &mut fk[pp..pp + ms],
            nf1,
            &fw[nf1 * k2..nf1 * (k2 + 1)],
            modeord,
        );
        pp += ms;
    }
    for k2 in k2min..0 {
        let pf = prefac / ker2[(-k2) as usize].as_();
        let row = (nf2 as i64 + k2) as usize;
        deconvolve_to_modes_1d(
            pf,
            ker1,
            ms,
            &mut fk[pn..pn + ms],
            nf1,
            &fw[nf1 * row..nf1 * (row + 1)],
            modeord,
        );
        pn += ms;
    }
}

pub(crate) fn deconvolve_to_grid_2d<T: NufftSample>(
    prefac: f64,
    ker1: &[T],
    ker2: &[T],
    ms: usize,
    mt: usize,
    fk: &[Complex<T>],
    nf1: usize,
    nf2: usize,
    fw: &mut [Complex<T>],
    modeord: ModeOrder,
) where
    f64: AsPrimitive<T>,
{
    let (k2min, k2max) = band(mt);
    let (pp, pn) = starts(mt, k2max, modeord);
    let mut pp = pp * ms;
    let mut pn = pn * ms;
    // rows strictly between the band halves never receive modes
    for v in fw[nf1 * (k2max + 1) as usize..nf1 * (nf2 as i64 + k2min) as usize].iter_mut() {
        *v = Complex::default();
    }
    for k2 in 0..=k2max as usize {
        let pf = prefac / ker2[k2].as_();
        deconvolve_to_grid_1d(
            pf,
            ker1,
            ms,
            &fk[pp..pp + ms],
            nf1,
            &mut fw[nf1 * k2..nf1 * (k2 + 1)],
            modeord,
        );
        pp += ms;
    }
    for k2 in k2min..0 {
        let pf = prefac / ker2[(-k2) as usize].as_();
        let row = (nf2 as i64 + k2) as usize;
        deconvolve_to_grid_1d(
            pf,
            ker1,
            ms,
            &fk[pn..pn + ms],
            nf1,
            &mut fw[nf1 * row..nf1 * (row + 1)],
            modeord,
        );
        pn += ms;
    }
}

pub(crate) fn deconvolve_to_modes_3d<T: NufftSample>(
    prefac: f64,
    ker1: &[T],
    ker2: &[T],
    ker3: &[T],
    ms: usize,
    mt: usize,
    mu: usize,
    fk: &mut [Complex<T>],
    nf1: usize,
    nf2: usize,
    nf3: usize,
    fw: &[Complex<T>],
    modeord: ModeOrder,
) where
    f64: AsPrimitive<T>,
{
    let (k3min, k3max) = band(mu);
    let (pp, pn) = starts(mu, k3max, modeord);
    let plane_fk = ms * mt;
    let plane_fw = nf1 * nf2;
    let mut pp = pp * plane_fk;
    let mut pn = pn * plane_fk;
    for k3 in 0..=k3max as usize {
        let pf = prefac / ker3[k3].as_();
        deconvolve_to_modes_2d(
            pf,
            ker1,
            ker2,
            ms,
            mt,
            &mut fk[pp..pp + plane_fk],
            nf1,
            nf2,
            &fw[plane_fw * k3..plane_fw * (k3 + 1)],
            modeord,
        );
        pp += plane_fk;
    }
    for k3 in k3min..0 {
        let pf = prefac / ker3[(-k3) as usize].as_();
        let plane = (nf3 as i64 + k3) as usize;
        deconvolve_to_modes_2d(
            pf,
            ker1,
            ker2,
            ms,
            mt,
            &mut fk[pn..pn + plane_fk],
            nf1,
            nf2,
            &fw[plane_fw * plane..plane_fw * (plane + 1)],
            modeord,
        );
        pn += plane_fk;
    }
}

pub(crate) fn deconvolve_to_grid_3d<T: NufftSample>(
    prefac: f64,
    ker1: &[T],
    ker2: &[T],
    ker3: &[T],
    ms: usize,
    mt: usize,
    mu: usize,
    fk: &[Complex<T>],
    nf1: usize,
    nf2: usize,
    nf3: usize,
    fw: &mut [Complex<T>],
    modeord: ModeOrder,
) where
    f64: AsPrimitive<T>,
{
    let (k3min, k3max) = band(mu);
    let (pp, pn) = starts(mu, k3max, modeord);
    let plane_fk = ms * mt;
    let plane_fw = nf1 * nf2;
    let mut pp = pp * plane_fk;
    let mut pn = pn * plane_fk;
    for v in fw[plane_fw * (k3max + 1) as usize..plane_fw * (nf3 as i64 + k3min) as usize].iter_mut()
    {
        *v = Complex::default();
    }
    for k3 in 0..=k3max as usize {
        let pf = prefac / ker3[k3].as_();
        deconvolve_to_grid_2d(
            pf,
            ker1,
            ker2,
            ms,
            mt,
            &fk[pp..pp + plane_fk],
            nf1,
            nf2,
            &mut fw[plane_fw * k3..plane_fw * (k3 + 1)],
            modeord,
        );
        pp += plane_fk;
    }
    for k3 in k3min..0 {
        let pf = prefac / ker3[(-k3) as usize].as_();
        let plane = (nf3 as i64 + k3) as usize;
        deconvolve_to_grid_2d(
            pf,
            ker1,
            ker2,
            ms,
            mt,
            &fk[pn..pn + plane_fk],
            nf1,
            nf2,
            &mut fw[plane_fw * plane..plane_fw * (plane + 1)],
            modeord,
        );
        pn += plane_fk;
    }
}

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

//! Batched multidimensional complex DFT on top of rustfft's 1D plans.
//! Each transform occupies a contiguous slab with stride 1 along the first
//! (fastest-varying) axis and slab distance `nf1*nf2*nf3`; higher axes are
//! handled by gathering strided lines into a contiguous buffer.

use crate::err::ZunftError;
use crate::opts::FftQuality;
use crate::NufftSample;
use novtb::{ParallelZonedIterator, TbSliceMut};
use num_complex::Complex;
use rustfft::{Fft, FftDirection, FftPlanner};
use std::sync::Arc;

pub(crate) struct BatchedDft<T: NufftSample> {
    nf: [usize; 3],
    thread_count: usize,
    fft1: Arc<dyn Fft<T>>,
    fft2: Option<Arc<dyn Fft<T>>>,
    fft3: Option<Arc<dyn Fft<T>>>,
}

impl<T: NufftSample> std::fmt::Debug for BatchedDft<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BatchedDft")
            .field("nf", &self.nf)
            .field("thread_count", &self.thread_count)
            .finish_non_exhaustive()
    }
}

impl<T: NufftSample> BatchedDft<T> {
    /// Plans one transform per axis. `sign >= 0` selects the `exp(+i...)`
    /// convention (rustfft "inverse"), negative the `exp(-i...)` one; rustfft
    /// never normalizes, which is what the surrounding pipeline expects.
    /// The planning-effort hint is accepted but has no effect here: rustfft
    /// chooses its strategy deterministically from the length alone.
    pub(crate) fn new(
        dim: usize,
        nf: [usize; 3],
        sign: i32,
        _quality: FftQuality,
        thread_count: usize,
    ) -> Result<Self, ZunftError> {
        if !(1..=3).contains(&dim) {
            return Err(ZunftError::DimNotValid(dim));
        }
        let direction = if sign >= 0 {
            FftDirection::Inverse
        } else {
            FftDirection::Forward
        };
        let mut planner = FftPlanner::<T>::new();
        let fft1 = planner.plan_fft(nf[0], direction);
        let fft2 = (dim > 1).then(|| planner.plan_fft(nf[1], direction));
        let fft3 = (dim > 2).then(|| planner.plan_fft(nf[2], direction));
        Ok(BatchedDft {
            nf,
            thread_count,
            fft1,
            fft2,
            fft3,
        })
    }

    /// Transforms the first `howmany` slabs of `fw` in place, slab-parallel.
    pub(crate) fn execute(
        &self,
        fw: &mut [Complex<T>],
        howmany: usize,
    ) -> Result<(), ZunftError> {
        let vol = self.nf[0] * self.nf[1] * self.nf[2];
        let needed = vol * howmany;
        if fw.len() < needed {
            return Err(ZunftError::InvalidBufferLength(needed, fw.len()));
        }
        if howmany == 0 {
            return Ok(());
        }
        let pool = novtb::ThreadPool::new(self.thread_count.min(howmany).max(1));
        fw[..needed]
            .tb_par_chunks_exact_mut(vol)
            .for_each(&pool, |slab| {
                self.transform_slab(slab);
            });
        Ok(())
    }

    fn transform_slab(&self, slab: &mut [Complex<T>]) {
        let [nf1, nf2, nf3] = self.nf;

        // axis 1, contiguous rows
        let mut scratch =
            vec![Complex::<T>::default(); self.fft1.get_inplace_scratch_len()];
        for row in slab.chunks_exact_mut(nf1) {
            self.fft1.process_with_scratch(row, &mut scratch);
        }

        // axis 2, stride nf1
        if let Some(fft2) = self.fft2.as_deref() {
            let mut line = vec![Complex::<T>::default(); nf2];
            let mut scratch =
                vec![Complex::<T>::default(); fft2.get_inplace_scratch_len()];
            let plane = nf1 * nf2;
            for iz in 0..nf3 {
                let base = iz * plane;
                for ix in 0..nf1 {
                    for (iy, v) in line.iter_mut().enumerate() {
                        *v = slab[base + iy * nf1 + ix];
                    }
                    fft2.process_with_scratch(&mut line, &mut scratch);
                    for (iy, v) in line.iter().enumerate() {
                        slab[base + iy * nf1 + ix] = *v;
                    }
                }
            }
        }

        // axis 3, stride nf1*nf2
        if let Some(fft3) = self.fft3.as_deref() {
            let mut line = vec![Complex::<T>::default(); nf3];
            let mut scratch =
                vec![Complex::<T>::default(); fft3.get_inplace_scratch_len()];
            let plane = nf1 * nf2;
            for iy in 0..nf2 {
                for ix in 0..nf1 {
                    let base = iy * nf1 + ix;
                    for (iz, v) in line.iter_mut().enumerate() {
                        *v = slab[base + iz * plane];
                    }
                    fft3.process_with_scratch(&mut line, &mut scratch);
                    for (iz, v) in line.iter().enumerate() {
                        slab[base + iz * plane] = *v;
                    }
                }
            }
        }

    }
}

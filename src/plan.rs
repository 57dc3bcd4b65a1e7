/*
 * // Copyright (c) Radzivon Bartoshyk 4/2026. All rights reserved.
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

//! The stateful transform plan: make, bind points, execute in batches over
//! the transform axis, drop. The adjoint direction runs spread -> DFT ->
//! deconvolve, the forward direction its mirror image, and the
//! nonuniform-to-nonuniform reduction wraps a forward plan between a
//! prephase/spread front end and a phased deconvolution back end.

use crate::deconvolve::{
    deconvolve_to_grid_1d, deconvolve_to_grid_2d, deconvolve_to_grid_3d, deconvolve_to_modes_1d,
    deconvolve_to_modes_2d, deconvolve_to_modes_3d,
};
use crate::err::{try_vec, ZunftError};
use crate::fft::BatchedDft;
use crate::kernel::{onedim_fseries_kernel, onedim_nuft_kernel};
use crate::opts::{setup_spreader, ModeOrder, NufftOpts, SpreadOpts, SpreadThread};
use crate::spread::{index_sort, interp_sorted, spread_check, spread_sorted};
use crate::util::{
    array_width_center, available_threads, set_nf_type12, set_nhg_type3, MAX_NF,
    MAX_USEFUL_NTHREADS,
};
use crate::NufftSample;
use novtb::{ParallelZonedIterator, TbSliceMut};
use num_complex::Complex;
use num_traits::AsPrimitive;
use std::sync::atomic::{AtomicI32, Ordering};
use std::time::Instant;

/// Transform direction of a plan.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash)]
pub enum NufftType {
    /// Adjoint: nonuniform strengths to a regular grid of Fourier modes.
    Type1,
    /// Forward: regular Fourier modes to values at nonuniform points.
    Type2,
    /// Nonuniform sources to values at nonuniform target frequencies.
    Type3,
}

impl TryFrom<i32> for NufftType {
    type Error = ZunftError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(NufftType::Type1),
            2 => Ok(NufftType::Type2),
            3 => Ok(NufftType::Type3),
            other => Err(ZunftError::TypeNotValid(other)),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum PlanState {
    Planned,
    Pointed,
}

/// Nonuniform coordinates bound to a plan: either borrowed from the caller
/// for the plan's lifetime, or internally rescaled copies the plan owns.
#[derive(Debug)]
enum Coords<'a, T> {
    Unset,
    Borrowed(&'a [T]),
    Owned(Vec<T>),
}

impl<'a, T> Coords<'a, T> {
    fn as_slice(&self) -> &[T] {
        match self {
            Coords::Unset => &[],
            Coords::Borrowed(s) => s,
            Coords::Owned(v) => v.as_slice(),
        }
    }
}

/// Shift/scale record of the nonuniform-to-nonuniform reduction.
#[derive(Debug)]
struct Type3Params {
    /// Source bounding-interval centers.
    c: [f64; 3],
    /// Target-frequency bounding-interval centers.
    d: [f64; 3],
    /// Fine-grid spacings `2*pi/nf`.
    h: [f64; 3],
    /// Source scale factors taking `x - C` onto the periodic domain.
    gam: [f64; 3],
}

#[derive(Debug)]
struct Type3State<'a, T: NufftSample> {
    params: Type3Params,
    inner: Box<NufftPlan<'a, T>>,
    /// `exp(sign*i*(D . x_j))`, one per source point.
    prephase: Vec<Complex<T>>,
    /// `exp(sign*i*((s_k - D) . C)) / phihat(s'_k)`, one per target.
    deconv: Vec<Complex<T>>,
    /// Rephased strengths for the batch in flight.
    cpj: Vec<Complex<T>>,
}

/// A planned NUFFT of one (type, dim, sign, tolerance, transform count)
/// tuple. Created by [`NufftPlan::make_plan`], pointed by
/// [`NufftPlan::set_points`], run by [`NufftPlan::execute`] any number of
/// times, and released on drop (or explicitly via [`NufftPlan::destroy`]).
///
/// The plan owns its kernel tables, working grid, sort permutation and any
/// inner sub-plan; user coordinate arrays are only borrowed, and are never
/// written to.
#[derive(Debug)]
pub struct NufftPlan<'a, T: NufftSample> {
    kind: NufftType,
    dim: usize,
    sign: i32,
    n_modes: [usize; 3],
    n_transf: usize,
    tol: f64,
    batch_size: usize,
    thread_count: usize,
    opts: NufftOpts,
    spopts: SpreadOpts,
    state: PlanState,
    nf: [usize; 3],
    nj: usize,
    nk: usize,
    phihat: Vec<T>,
    fw: Vec<Complex<T>>,
    sort_indices: Vec<usize>,
    did_sort: bool,
    fft: Option<BatchedDft<T>>,
    xp: Coords<'a, T>,
    yp: Coords<'a, T>,
    zp: Coords<'a, T>,
    t3: Option<Type3State<'a, T>>,
}

/// Outer (across transform sets) and inner (inside one spread/interp)
/// thread budgets for the selected policy. `Nested` grants the full budget
/// on both axes; each set's spread then decides for itself whether the
/// cloud is large enough to engage its shadow grids.
fn stage_threads(policy: SpreadThread, threads: usize) -> (usize, usize) {
    match policy {
        SpreadThread::Auto | SpreadThread::SeqMultithreaded => (1, threads),
        SpreadThread::ParSinglethreaded => (threads, 1),
        SpreadThread::Nested => (threads, threads),
    }
}

impl<'a, T: NufftSample> NufftPlan<'a, T>
where
    f64: AsPrimitive<T>,
{
    /// Creates a plan. For types 1 and 2 this sizes the fine grid, fills the
    /// kernel Fourier tables, allocates the working grid and plans the DFT;
    /// type 3 defers all of that to [`NufftPlan::set_points`].
    ///
    /// `n_modes` holds the mode extents per dimension (ignored entries for
    /// unused dimensions and for type 3). `iflag >= 0` selects the
    /// `exp(+i...)` convention. `max_batch == 0` picks the batch size
    /// automatically.
    ///
    /// # Errors
    /// Returns a [`ZunftError`] on invalid arguments, an unreachable
    /// tolerance, an oversized fine grid, or allocation failure.
    pub fn make_plan(
        kind: NufftType,
        dim: usize,
        n_modes: [usize; 3],
        iflag: i32,
        n_transf: usize,
        tol: f64,
        max_batch: usize,
        opts: Option<NufftOpts>,
    ) -> Result<Self, ZunftError> {
        if !(1..=3).contains(&dim) {
            return Err(ZunftError::DimNotValid(dim));
        }
        if n_transf < 1 {
            return Err(ZunftError::NtransfNotValid(n_transf));
        }
        let opts = opts.unwrap_or_default();
        let spopts = setup_spreader(tol, &opts)?;
        let thread_count = if opts.nthreads > 0 {
            opts.nthreads
        } else {
            available_threads()
        };
        let batch_size = if max_batch == 0 {
            thread_count.min(MAX_USEFUL_NTHREADS)
        } else {
            max_batch
        }
        .min(n_transf);
        let sign = if iflag >= 0 { 1 } else { -1 };

        let mut plan = NufftPlan {
            kind,
            dim,
            sign,
            n_modes: [1, 1, 1],
            n_transf,
            tol,
            batch_size,
            thread_count,
            opts,
            spopts,
            state: PlanState::Planned,
            nf: [1, 1, 1],
            nj: 0,
            nk: 0,
            phihat: Vec::new(),
            fw: Vec::new(),
            sort_indices: Vec::new(),
            did_sort: false,
            fft: None,
            xp: Coords::Unset,
            yp: Coords::Unset,
            zp: Coords::Unset,
            t3: None,
        };

        if kind == NufftType::Type3 {
            // grid and DFT sizing depend on the point clouds; nothing else to do
            if plan.opts.debug > 0 {
                eprintln!("[make_plan] {dim}d3: deferred until set_points");
            }
            return Ok(plan);
        }

        for d in 0..dim {
            plan.n_modes[d] = n_modes[d].max(1);
            plan.nf[d] = set_nf_type12(plan.n_modes[d], &plan.opts, &plan.spopts)?;
        }
        let vol = plan.nf[0] * plan.nf[1] * plan.nf[2];
        if (vol as u64).saturating_mul(batch_size as u64) > MAX_NF {
            return Err(ZunftError::MaxNallocExceeded(vol * batch_size));
        }
        if plan.opts.debug > 0 {
            eprintln!(
                "[make_plan] {}d{}: (ms,mt,mu)=({},{},{}) (nf1,nf2,nf3)=({},{},{}) batch={}",
                dim,
                if kind == NufftType::Type1 { 1 } else { 2 },
                plan.n_modes[0],
                plan.n_modes[1],
                plan.n_modes[2],
                plan.nf[0],
                plan.nf[1],
                plan.nf[2],
                batch_size
            );
        }

        let started = Instant::now();
        let mut table_len = plan.nf[0] / 2 + 1;
        if dim > 1 {
            table_len += plan.nf[1] / 2 + 1;
        }
        if dim > 2 {
            table_len += plan.nf[2] / 2 + 1;
        }
        let mut phihat = try_vec![T::zero(); table_len];
        let mut offset = 0usize;
        for d in 0..dim {
            let half = plan.nf[d] / 2 + 1;
            onedim_fseries_kernel(plan.nf[d], &mut phihat[offset..offset + half], &plan.spopts);
            offset += half;
        }
        plan.phihat = phihat;
        if plan.opts.debug > 0 {
            eprintln!(
                "[make_plan] kernel fser (ns={}):\t{:.3e} s",
                plan.spopts.nspread,
                started.elapsed().as_secs_f64()
            );
        }

        plan.fw = try_vec![Complex::<T>::default(); vol * batch_size];
        let started = Instant::now();
        plan.fft = Some(BatchedDft::new(
            dim,
            plan.nf,
            sign,
            plan.opts.fft_quality,
            thread_count,
        )?);
        if plan.opts.debug > 0 {
            eprintln!(
                "[make_plan] fft plan:\t\t{:.3e} s",
                started.elapsed().as_secs_f64()
            );
        }
        Ok(plan)
    }

    /// Binds nonuniform points to the plan. Types 1 and 2 use the source
    /// cloud `(x, y, z)` only (pass empty slices for unused dimensions and
    /// for `(s, t, u)`); type 3 additionally takes the nonuniform target
    /// frequencies and performs its deferred grid sizing, inner planning and
    /// phase precomputation here.
    ///
    /// # Errors
    /// Out-of-range coordinates, mismatched lengths, oversized grids, inner
    /// planning failures and allocation failures are reported.
    pub fn set_points(
        &mut self,
        x: &'a [T],
        y: &'a [T],
        z: &'a [T],
        s: &'a [T],
        t: &'a [T],
        u: &'a [T],
    ) -> Result<(), ZunftError> {
        let nj = x.len();
        if self.dim > 1 && y.len() != nj {
            return Err(ZunftError::InvalidBufferLength(nj, y.len()));
        }
        if self.dim > 2 && z.len() != nj {
            return Err(ZunftError::InvalidBufferLength(nj, z.len()));
        }
        if self.kind != NufftType::Type3 {
            let started = Instant::now();
            spread_check(self.dim, x, y, z, &self.spopts)?;
            let (perm, did_sort) = index_sort(self.dim, self.nf, x, y, z, &self.spopts)?;
            if self.opts.debug > 0 {
                eprintln!(
                    "[set_points] sort (did_sort={did_sort}):\t{:.3e} s",
                    started.elapsed().as_secs_f64()
                );
            }
            if self.spopts.debug > 0 {
                eprintln!("[spread] {nj} points bound, kernel width {}", self.spopts.nspread);
            }
            self.sort_indices = perm;
            self.did_sort = did_sort;
            self.nj = nj;
            self.xp = Coords::Borrowed(x);
            self.yp = Coords::Borrowed(y);
            self.zp = Coords::Borrowed(z);
            self.state = PlanState::Pointed;
            return Ok(());
        }
        self.set_points_type3(x, y, z, s, t, u)
    }

    /// The deferred half of type-3 planning: bounding boxes, grid sizing,
    /// coordinate rescaling, the inner forward sub-plan, and the phase and
    /// deconvolution tables, all fixed here so execute only applies them.
    fn set_points_type3(
        &mut self,
        x: &'a [T],
        y: &'a [T],
        z: &'a [T],
        s: &'a [T],
        t: &'a [T],
        u: &'a [T],
    ) -> Result<(), ZunftError> {
        let nj = x.len();
        let nk = s.len();
        if self.dim > 1 && t.len() != nk {
            return Err(ZunftError::InvalidBufferLength(nk, t.len()));
        }
        if self.dim > 2 && u.len() != nk {
            return Err(ZunftError::InvalidBufferLength(nk, u.len()));
        }
        let dim = self.dim;
        let sources: [&[T]; 3] = [x, y, z];
        let targets: [&[T]; 3] = [s, t, u];

        let mut params = Type3Params {
            c: [0.0; 3],
            d: [0.0; 3],
            h: [0.0; 3],
            gam: [1.0; 3],
        };
        let mut nf = [1usize; 3];
        for d in 0..dim {
            let (xw, xc) = array_width_center(sources[d]);
            let (sw, sc) = array_width_center(targets[d]);
            params.c[d] = xc;
            params.d[d] = sc;
            let (nfd, h, gam) = set_nhg_type3(sw, xw, &self.opts, &self.spopts)?;
            nf[d] = nfd;
            params.h[d] = h;
            params.gam[d] = gam;
        }
        let vol = nf[0] * nf[1] * nf[2];
        if (vol as u64).saturating_mul(self.batch_size as u64) > MAX_NF {
            return Err(ZunftError::MaxNallocExceeded(vol * self.batch_size));
        }
        if self.opts.debug > 0 {
            eprintln!(
                "[set_points] {dim}d3: nj={nj} nk={nk} (nf1,nf2,nf3)=({},{},{}) batch={}",
                nf[0], nf[1], nf[2], self.batch_size
            );
        }

        // rescaled source cloud, periodic on the fine grid
        let mut scaled_sources: [Vec<T>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        let mut scaled_targets: [Vec<T>; 3] = [Vec::new(), Vec::new(), Vec::new()];
        for d in 0..dim {
            let c = params.c[d];
            let gam = params.gam[d];
            let mut xs = try_vec![T::zero(); nj];
            for (o, v) in xs.iter_mut().zip(sources[d].iter()) {
                let v: f64 = v.as_();
                *o = ((v - c) / gam).as_();
            }
            scaled_sources[d] = xs;

            let dd = params.d[d];
            let hg = params.h[d] * gam;
            let mut ss = try_vec![T::zero(); nk];
            for (o, v) in ss.iter_mut().zip(targets[d].iter()) {
                let v: f64 = v.as_();
                *o = (hg * (v - dd)).as_();
            }
            scaled_targets[d] = ss;
        }

        // prephase per source, applied to every strength vector in a batch
        let sign_f = self.sign as f64;
        let mut prephase = try_vec![Complex::<T>::default(); nj];
        for (j, p) in prephase.iter_mut().enumerate() {
            let mut theta = params.d[0] * sources[0][j].as_();
            if dim > 1 {
                theta += params.d[1] * sources[1][j].as_();
            }
            if dim > 2 {
                theta += params.d[2] * sources[2][j].as_();
            }
            let re: T = theta.cos().as_();
            let im: T = (sign_f * theta.sin()).as_();
            *p = Complex::new(re, im);
        }

        // kernel FT at the scaled targets, folded into the postphase factors
        let mut phihat_prod = try_vec![1.0f64; nk];
        for d in 0..dim {
            let mut tab = try_vec![T::zero(); nk];
            onedim_nuft_kernel(&scaled_targets[d], &mut tab, &self.spopts);
            for (p, v) in phihat_prod.iter_mut().zip(tab.iter()) {
                *p *= v.as_();
            }
        }
        let mut deconv = try_vec![Complex::<T>::default(); nk];
        for (k, dc) in deconv.iter_mut().enumerate() {
            let mut theta = (targets[0][k].as_() - params.d[0]) * params.c[0];
            if dim > 1 {
                theta += (targets[1][k].as_() - params.d[1]) * params.c[1];
            }
            if dim > 2 {
                theta += (targets[2][k].as_() - params.d[2]) * params.c[2];
            }
            let amp = 1.0 / phihat_prod[k];
            let re: T = (amp * theta.cos()).as_();
            let im: T = (amp * sign_f * theta.sin()).as_();
            *dc = Complex::new(re, im);
        }

        // the inner forward plan reads the spread slab as modes in FFT
        // ordering, which is exactly how grid slot k mod nf holds mode k
        let mut t2opts = self.opts.clone();
        t2opts.modeord = ModeOrder::Fft;
        t2opts.chkbnds = false;
        t2opts.debug = (self.opts.debug - 1).max(0);
        t2opts.spread_debug = (self.opts.spread_debug - 1).max(0);
        let mut inner = NufftPlan::make_plan(
            NufftType::Type2,
            dim,
            nf,
            self.sign,
            self.batch_size,
            self.tol,
            self.batch_size,
            Some(t2opts),
        )?;
        let [ss, tt, uu] = scaled_targets;
        inner.bind_owned_points(ss, tt, uu)?;

        let fw = try_vec![Complex::<T>::default(); vol * self.batch_size];
        let cpj = try_vec![Complex::<T>::default(); nj * self.batch_size];

        // sort the rescaled sources for the outer spread
        let [xs, ys, zs] = scaled_sources;
        let (perm, did_sort) = index_sort(dim, nf, &xs, &ys, &zs, &self.spopts)?;

        self.nf = nf;
        self.nj = nj;
        self.nk = nk;
        self.fw = fw;
        self.sort_indices = perm;
        self.did_sort = did_sort;
        self.xp = Coords::Owned(xs);
        self.yp = Coords::Owned(ys);
        self.zp = Coords::Owned(zs);
        self.t3 = Some(Type3State {
            params,
            inner: Box::new(inner),
            prephase,
            deconv,
            cpj,
        });
        self.state = PlanState::Pointed;
        Ok(())
    }

    /// Internal variant of point binding over buffers the plan owns; used by
    /// the type-3 reduction for its rescaled target frequencies.
    fn bind_owned_points(&mut self, x: Vec<T>, y: Vec<T>, z: Vec<T>) -> Result<(), ZunftError> {
        {
            let xs = x.as_slice();
            let ys = y.as_slice();
            let zs = z.as_slice();
            spread_check(self.dim, xs, ys, zs, &self.spopts)?;
            let (perm, did_sort) = index_sort(self.dim, self.nf, xs, ys, zs, &self.spopts)?;
            self.sort_indices = perm;
            self.did_sort = did_sort;
            self.nj = xs.len();
        }
        self.xp = Coords::Owned(x);
        self.yp = Coords::Owned(y);
        self.zp = Coords::Owned(z);
        self.state = PlanState::Pointed;
        Ok(())
    }

    /// Runs all `n_transf` transforms in batches. For type 1, `cj` is read
    /// (`nj*n_transf` strengths) and `fk` written (`ms*mt*mu*n_transf`
    /// modes); type 2 is the reverse; type 3 reads `cj` and writes
    /// `nk*n_transf` target values into `fk`.
    ///
    /// # Errors
    /// Returns [`ZunftError::NotReady`] before a successful `set_points`,
    /// and propagates per-set spreader codes (first nonzero aborts).
    pub fn execute(
        &mut self,
        cj: &mut [Complex<T>],
        fk: &mut [Complex<T>],
    ) -> Result<(), ZunftError> {
        if self.state != PlanState::Pointed {
            return Err(ZunftError::NotReady);
        }
        let fk_row = match self.kind {
            NufftType::Type3 => self.nk,
            _ => self.n_modes[0] * self.n_modes[1] * self.n_modes[2],
        };
        if cj.len() < self.nj * self.n_transf {
            return Err(ZunftError::InvalidBufferLength(
                self.nj * self.n_transf,
                cj.len(),
            ));
        }
        if fk.len() < fk_row * self.n_transf {
            return Err(ZunftError::InvalidBufferLength(
                fk_row * self.n_transf,
                fk.len(),
            ));
        }
        match self.kind {
            NufftType::Type1 | NufftType::Type2 => self.exec_type12(cj, fk),
            NufftType::Type3 => self.exec_type3(cj, fk),
        }
    }

    fn exec_type12(
        &mut self,
        cj: &mut [Complex<T>],
        fk: &mut [Complex<T>],
    ) -> Result<(), ZunftError> {
        let (outer, inner) = stage_threads(self.opts.spread_thread, self.thread_count);
        let batch = self.batch_size;
        let mut t_spread = 0.0f64;
        let mut t_fft = 0.0f64;
        let mut t_deconv = 0.0f64;

        let Self {
            kind,
            dim,
            n_modes,
            n_transf,
            thread_count,
            opts,
            spopts,
            nf,
            nj,
            phihat,
            fw,
            sort_indices,
            did_sort,
            xp,
            yp,
            zp,
            fft,
            ..
        } = self;
        let Some(fft) = fft.as_ref() else {
            return Err(ZunftError::NotReady);
        };
        let x = xp.as_slice();
        let y = yp.as_slice();
        let z = zp.as_slice();

        let mut batch_num = 0usize;
        while batch_num * batch < *n_transf {
            let set_base = batch_num * batch;
            let bsize = (*n_transf - set_base).min(batch);

            if *kind == NufftType::Type1 {
                let started = Instant::now();
                spread_batch(
                    fw,
                    sort_indices,
                    *dim,
                    *nf,
                    x,
                    y,
                    z,
                    cj,
                    set_base,
                    bsize,
                    *nj,
                    spopts,
                    *did_sort,
                    outer,
                    inner,
                )?;
                t_spread += started.elapsed().as_secs_f64();

                let started = Instant::now();
                fft.execute(fw, bsize)?;
                t_fft += started.elapsed().as_secs_f64();

                let started = Instant::now();
                deconvolve_batch_to_modes(
                    fw,
                    phihat,
                    *dim,
                    *nf,
                    *n_modes,
                    fk,
                    set_base,
                    bsize,
                    opts.modeord,
                    *thread_count,
                );
                t_deconv += started.elapsed().as_secs_f64();
            } else {
                let started = Instant::now();
                deconvolve_batch_to_grid(
                    fw,
                    phihat,
                    *dim,
                    *nf,
                    *n_modes,
                    fk,
                    set_base,
                    bsize,
                    opts.modeord,
                    *thread_count,
                );
                t_deconv += started.elapsed().as_secs_f64();

                let started = Instant::now();
                fft.execute(fw, bsize)?;
                t_fft += started.elapsed().as_secs_f64();

                let started = Instant::now();
                interp_batch(
                    fw,
                    sort_indices,
                    *dim,
                    *nf,
                    x,
                    y,
                    z,
                    cj,
                    set_base,
                    bsize,
                    *nj,
                    spopts,
                    *did_sort,
                    outer,
                    inner,
                )?;
                t_spread += started.elapsed().as_secs_f64();
            }
            batch_num += 1;
        }

        if opts.debug > 0 {
            let stage = if *kind == NufftType::Type1 {
                "spread"
            } else {
                "interp"
            };
            eprintln!("[execute] tot {stage}:\t\t{t_spread:.3e} s");
            eprintln!("[execute] tot fft:\t\t{t_fft:.3e} s");
            eprintln!("[execute] tot deconvolve:\t{t_deconv:.3e} s");
        }
        Ok(())
    }

    fn exec_type3(
        &mut self,
        cj: &mut [Complex<T>],
        fk: &mut [Complex<T>],
    ) -> Result<(), ZunftError> {
        let (outer, inner_threads) = stage_threads(self.opts.spread_thread, self.thread_count);
        let batch = self.batch_size;
        let mut t_phase = 0.0f64;
        let mut t_spread = 0.0f64;
        let mut t_inner = 0.0f64;

        let Self {
            dim,
            n_transf,
            thread_count,
            opts,
            spopts,
            nf,
            nj,
            nk,
            fw,
            sort_indices,
            did_sort,
            xp,
            yp,
            zp,
            t3,
            ..
        } = self;
        let Some(t3) = t3.as_mut() else {
            return Err(ZunftError::NotReady);
        };
        let Type3State {
            params,
            inner,
            prephase,
            deconv,
            cpj,
        } = t3;
        if opts.debug > 1 {
            eprintln!(
                "[execute] t3 scale gam=({:.3e},{:.3e},{:.3e}) h=({:.3e},{:.3e},{:.3e})",
                params.gam[0], params.gam[1], params.gam[2], params.h[0], params.h[1], params.h[2]
            );
        }
        let x = xp.as_slice();
        let y = yp.as_slice();
        let z = zp.as_slice();
        let nj = *nj;
        let nk = *nk;

        let mut batch_num = 0usize;
        while batch_num * batch < *n_transf {
            let set_base = batch_num * batch;
            let bsize = (*n_transf - set_base).min(batch);

            // rephase this batch of strengths into the plan-owned buffer
            let started = Instant::now();
            {
                let pool = novtb::ThreadPool::new((*thread_count).min(bsize).max(1));
                let prephase = &prephase[..];
                let cj = &cj[..];
                cpj[..bsize * nj]
                    .tb_par_chunks_exact_mut(nj)
                    .for_each_enumerated(&pool, |i, slab| {
                        let src = &cj[(set_base + i) * nj..(set_base + i) * nj + nj];
                        for ((o, v), p) in slab.iter_mut().zip(src.iter()).zip(prephase.iter()) {
                            *o = *v * *p;
                        }
                    });
            }
            t_phase += started.elapsed().as_secs_f64();

            let started = Instant::now();
            spread_batch(
                fw,
                sort_indices,
                *dim,
                *nf,
                x,
                y,
                z,
                cpj,
                0,
                bsize,
                nj,
                spopts,
                *did_sort,
                outer,
                inner_threads,
            )?;
            t_spread += started.elapsed().as_secs_f64();

            // the tail batch narrows the inner plan's transform count so it
            // never reads past the caller's buffers
            inner.n_transf = bsize;
            let started = Instant::now();
            inner.execute(&mut fk[set_base * nk..(set_base + bsize) * nk], fw)?;
            t_inner += started.elapsed().as_secs_f64();

            let started = Instant::now();
            {
                let pool = novtb::ThreadPool::new((*thread_count).min(bsize).max(1));
                let deconv = &deconv[..];
                fk[set_base * nk..(set_base + bsize) * nk]
                    .tb_par_chunks_exact_mut(nk)
                    .for_each(&pool, |slab| {
                        for (o, d) in slab.iter_mut().zip(deconv.iter()) {
                            *o *= *d;
                        }
                    });
            }
            t_phase += started.elapsed().as_secs_f64();
            batch_num += 1;
        }

        if opts.debug > 0 {
            eprintln!("[execute] tot prephase+deconvolve:\t{t_phase:.3e} s");
            eprintln!("[execute] tot spread:\t\t{t_spread:.3e} s");
            eprintln!("[execute] tot inner forward:\t{t_inner:.3e} s");
        }
        Ok(())
    }

    /// Consumes the plan, releasing the working grid, kernel tables, sort
    /// permutation and any inner sub-plan. Dropping the plan does the same.
    pub fn destroy(self) {}

    /// Mode extents `(ms, mt, mu)` for types 1 and 2.
    pub fn n_modes(&self) -> [usize; 3] {
        self.n_modes
    }

    /// Number of transforms executed per call.
    pub fn n_transforms(&self) -> usize {
        self.n_transf
    }

    /// Tolerance the plan was built for.
    pub fn tolerance(&self) -> f64 {
        self.tol
    }
}

fn first_spread_error(iers: &[AtomicI32]) -> Result<(), ZunftError> {
    for ier in iers.iter() {
        let code = ier.load(Ordering::Relaxed);
        if code != 0 {
            return Err(ZunftError::SpreadOther(code));
        }
    }
    Ok(())
}

#[allow(clippy::too_many_arguments)]
fn spread_batch<T: NufftSample>(
    fw: &mut [Complex<T>],
    perm: &[usize],
    dim: usize,
    nf: [usize; 3],
    x: &[T],
    y: &[T],
    z: &[T],
    c_all: &[Complex<T>],
    set_base: usize,
    bsize: usize,
    nj: usize,
    sp: &SpreadOpts,
    did_sort: bool,
    outer: usize,
    inner: usize,
) -> Result<(), ZunftError>
where
    f64: AsPrimitive<T>,
{
    let vol = nf[0] * nf[1] * nf[2];
    if outer <= 1 {
        for i in 0..bsize {
            let cs = &c_all[(set_base + i) * nj..(set_base + i) * nj + nj];
            spread_sorted(
                perm,
                dim,
                nf,
                &mut fw[i * vol..(i + 1) * vol],
                x,
                y,
                z,
                cs,
                sp,
                did_sort,
                inner,
            )?;
        }
        return Ok(());
    }
    let iers: Vec<AtomicI32> = (0..bsize).map(|_| AtomicI32::new(0)).collect();
    let pool = novtb::ThreadPool::new(outer.min(bsize).max(1));
    fw[..bsize * vol]
        .tb_par_chunks_exact_mut(vol)
        .for_each_enumerated(&pool, |i, slab| {
            let cs = &c_all[(set_base + i) * nj..(set_base + i) * nj + nj];
            if let Err(e) = spread_sorted(perm, dim, nf, slab, x, y, z, cs, sp, did_sort, inner) {
                iers[i].store(e.code(), Ordering::Relaxed);
            }
        });
    first_spread_error(&iers)
}

#[allow(clippy::too_many_arguments)]
fn interp_batch<T: NufftSample>(
    fw: &[Complex<T>],
    perm: &[usize],
    dim: usize,
    nf: [usize; 3],
    x: &[T],
    y: &[T],
    z: &[T],
    c_all: &mut [Complex<T>],
    set_base: usize,
    bsize: usize,
    nj: usize,
    sp: &SpreadOpts,
    did_sort: bool,
    outer: usize,
    inner: usize,
) -> Result<(), ZunftError>
where
    f64: AsPrimitive<T>,
{
    let vol = nf[0] * nf[1] * nf[2];
    if outer <= 1 {
        for i in 0..bsize {
            let cs = &mut c_all[(set_base + i) * nj..(set_base + i) * nj + nj];
            interp_sorted(
                perm,
                dim,
                nf,
                &fw[i * vol..(i + 1) * vol],
                x,
                y,
                z,
                cs,
                sp,
                did_sort,
                inner,
            )?;
        }
        return Ok(());
    }
    let iers: Vec<AtomicI32> = (0..bsize).map(|_| AtomicI32::new(0)).collect();
    let pool = novtb::ThreadPool::new(outer.min(bsize).max(1));
    c_all[set_base * nj..(set_base + bsize) * nj]
        .tb_par_chunks_exact_mut(nj)
        .for_each_enumerated(&pool, |i, cs| {
            let slab = &fw[i * vol..(i + 1) * vol];
            if let Err(e) = interp_sorted(perm, dim, nf, slab, x, y, z, cs, sp, did_sort, inner) {
                iers[i].store(e.code(), Ordering::Relaxed);
            }
        });
    first_spread_error(&iers)
}

fn phihat_views<T>(phihat: &[T], dim: usize, nf: [usize; 3]) -> (&[T], &[T], &[T]) {
    let (k1, rest) = phihat.split_at(nf[0] / 2 + 1);
    if dim == 1 {
        return (k1, &[], &[]);
    }
    let (k2, rest) = rest.split_at(nf[1] / 2 + 1);
    if dim == 2 {
        return (k1, k2, &[]);
    }
    (k1, k2, rest)
}

#[allow(clippy::too_many_arguments)]
fn deconvolve_batch_to_modes<T: NufftSample>(
    fw: &[Complex<T>],
    phihat: &[T],
    dim: usize,
    nf: [usize; 3],
    ms: [usize; 3],
    fk: &mut [Complex<T>],
    set_base: usize,
    bsize: usize,
    modeord: ModeOrder,
    threads: usize,
) where
    f64: AsPrimitive<T>,
{
    let vol = nf[0] * nf[1] * nf[2];
    let fk_row = ms[0] * ms[1] * ms[2];
    let (k1, k2, k3) = phihat_views(phihat, dim, nf);
    let pool = novtb::ThreadPool::new(threads.min(bsize).max(1));
    fk[set_base * fk_row..(set_base + bsize) * fk_row]
        .tb_par_chunks_exact_mut(fk_row)
        .for_each_enumerated(&pool, |i, fk_set| {
            let slab = &fw[i * vol..(i + 1) * vol];
            match dim {
                1 => deconvolve_to_modes_1d(1.0, k1, ms[0], fk_set, nf[0], slab, modeord),
                2 => deconvolve_to_modes_2d(
                    1.0, k1, k2, ms[0], ms[1], fk_set, nf[0], nf[1], slab, modeord,
                ),
                _ => deconvolve_to_modes_3d(
                    1.0, k1, k2, k3, ms[0], ms[1], ms[2], fk_set, nf[0], nf[1], nf[2], slab,
                    modeord,
                ),
            }
        });
}

#[allow(clippy::too_many_arguments)]
fn deconvolve_batch_to_grid<T: NufftSample>(
    fw: &mut [Complex<T>],
    phihat: &[T],
    dim: usize,
    nf: [usize; 3],
    ms: [usize; 3],
    fk: &[Complex<T>],
    set_base: usize,
    bsize: usize,
    modeord: ModeOrder,
    threads: usize,
) where
    f64: AsPrimitive<T>,
{
    let vol = nf[0] * nf[1] * nf[2];
    let fk_row = ms[0] * ms[1] * ms[2];
    let (k1, k2, k3) = phihat_views(phihat, dim, nf);
    let pool = novtb::ThreadPool::new(threads.min(bsize).max(1));
    fw[..bsize * vol]
        .tb_par_chunks_exact_mut(vol)
        .for_each_enumerated(&pool, |i, slab| {
            let row = (set_base + i) * fk_row;
            let fk_set = &fk[row..row + fk_row];
            match dim {
                1 => deconvolve_to_grid_1d(1.0, k1, ms[0], fk_set, nf[0], slab, modeord),
                2 => deconvolve_to_grid_2d(
                    1.0, k1, k2, ms[0], ms[1], fk_set, nf[0], nf[1], slab, modeord,
                ),
                _ => deconvolve_to_grid_3d(
                    1.0, k1, k2, k3, ms[0], ms[1], ms[2], fk_set, nf[0], nf[1], nf[2], slab,
                    modeord,
                ),
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_codes_map_to_variants() {
        assert_eq!(NufftType::try_from(1).unwrap(), NufftType::Type1);
        assert_eq!(NufftType::try_from(2).unwrap(), NufftType::Type2);
        assert_eq!(NufftType::try_from(3).unwrap(), NufftType::Type3);
        assert_eq!(NufftType::try_from(7).unwrap_err().code(), 10);
    }

    #[test]
    fn invalid_plan_arguments_are_rejected() {
        let bad_dim = NufftPlan::<f64>::make_plan(
            NufftType::Type1,
            4,
            [8, 1, 1],
            1,
            1,
            1e-6,
            0,
            None,
        );
        assert_eq!(bad_dim.unwrap_err().code(), 12);
        let bad_ntr =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [8, 1, 1], 1, 0, 1e-6, 0, None);
        assert_eq!(bad_ntr.unwrap_err().code(), 9);
        let bad_eps =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [8, 1, 1], 1, 1, 1e-18, 0, None);
        assert_eq!(bad_eps.unwrap_err().code(), 1);
    }

    #[test]
    fn execute_before_points_is_not_ready() {
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [8, 1, 1], 1, 1, 1e-9, 0, None)
                .unwrap();
        let mut c = vec![Complex::new(1.0, 0.0); 4];
        let mut f = vec![Complex::default(); 8];
        assert_eq!(plan.execute(&mut c, &mut f).unwrap_err().code(), 14);
    }

    #[test]
    fn short_buffers_are_rejected() {
        let x = [0.1f64, -0.2, 0.3];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [8, 1, 1], 1, 1, 1e-9, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        let mut c = vec![Complex::new(1.0, 0.0); 2]; // one short
        let mut f = vec![Complex::default(); 8];
        assert_eq!(plan.execute(&mut c, &mut f).unwrap_err().code(), 15);
        let mut c = vec![Complex::new(1.0, 0.0); 3];
        let mut f_short = vec![Complex::default(); 7];
        assert_eq!(plan.execute(&mut c, &mut f_short).unwrap_err().code(), 15);
    }

    #[test]
    fn nested_policy_captures_per_set_spreader_failures() {
        // enough points to engage the shadow grids inside each set's spread,
        // and a thread budget so absurd the shadow allocation must fail; the
        // per-set code is captured and the first nonzero aborts the call
        let nj = 9000;
        let x: Vec<f64> = (0..nj).map(|j| -3.0 + 6.0 * j as f64 / nj as f64).collect();
        let mut opts = NufftOpts::default();
        opts.spread_thread = SpreadThread::Nested;
        opts.nthreads = usize::MAX / 2;
        let mut plan = NufftPlan::<f64>::make_plan(
            NufftType::Type1,
            1,
            [8, 1, 1],
            1,
            2,
            1e-6,
            2,
            Some(opts),
        )
        .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        let mut c = vec![Complex::new(1.0, 0.0); nj * 2];
        let mut f = vec![Complex::default(); 8 * 2];
        let err = plan.execute(&mut c, &mut f).unwrap_err();
        assert_eq!(err.code(), 6);
    }

    #[test]
    fn out_of_range_points_are_rejected() {
        let x = [0.1f64, 10.0];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [8, 1, 1], 1, 1, 1e-9, 0, None)
                .unwrap();
        let err = plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap_err();
        assert_eq!(err.code(), 4);
        // with checking off the same cloud folds periodically instead
        let mut opts = NufftOpts::default();
        opts.chkbnds = false;
        let mut plan = NufftPlan::<f64>::make_plan(
            NufftType::Type1,
            1,
            [8, 1, 1],
            1,
            1,
            1e-9,
            0,
            Some(opts),
        )
        .unwrap();
        assert!(plan.set_points(&x, &[], &[], &[], &[], &[]).is_ok());
    }
}

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

/// Arrangement of Fourier modes in user-facing mode arrays (types 1 and 2).
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub enum ModeOrder {
    /// Increasing ordering `-M/2, ..., (M-1)/2`.
    #[default]
    Cmcl,
    /// FFT-style ordering: `0, ..., (M-1)/2` then `-M/2, ..., -1`.
    Fft,
}

/// Whether the spreader reorders nonuniform points for cache locality.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub enum SpreadSort {
    Never,
    Always,
    /// Sort only when the point count is large relative to the fine grid.
    #[default]
    Heuristic,
}

/// How kernel values are produced inside the spreader.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub enum KernelEvalMethod {
    /// Evaluate `exp(beta*(sqrt(1-z^2)-1))` directly per stencil tap.
    #[default]
    Direct,
    /// Piecewise-polynomial slot; currently served by direct evaluation.
    Horner,
}

/// Thread placement for multi-transform batches.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub enum SpreadThread {
    /// One parallel region at a time; spread/interp uses all threads internally.
    #[default]
    Auto,
    /// Serial batch loop, multithreaded spread. Same schedule as `Auto`.
    SeqMultithreaded,
    /// One thread per transform set, single-threaded spread inside each.
    ParSinglethreaded,
    /// One thread per transform set, with each set's spread multithreaded
    /// inside as well (engages only for large point clouds).
    Nested,
}

/// FFT planning effort hint. The rustfft planner is deterministic, so both
/// variants currently plan identically; the knob is kept for interface parity.
#[derive(Debug, Copy, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Default)]
pub enum FftQuality {
    #[default]
    Estimate,
    Measure,
}

/// User-controllable options for a NUFFT plan.
#[derive(Debug, Clone)]
pub struct NufftOpts {
    /// 0: silent, 1: stage timing report on stderr.
    pub debug: i32,
    /// Spreader chatter: 0 none, 1 some, 2 lots.
    pub spread_debug: i32,
    pub spread_sort: SpreadSort,
    pub spread_kerevalmeth: KernelEvalMethod,
    /// Pad kernel width to a multiple of 4. Accepted for compatibility;
    /// direct evaluation produces identical output either way.
    pub spread_kerpad: bool,
    /// Reject nonuniform coordinates outside `[-3*pi, 3*pi]`.
    pub chkbnds: bool,
    pub fft_quality: FftQuality,
    pub modeord: ModeOrder,
    /// Oversampling ratio sigma, 2.0 (standard) or 1.25 (smaller FFTs).
    pub upsampfac: f64,
    pub spread_thread: SpreadThread,
    /// Worker thread budget; 0 picks the machine parallelism.
    pub nthreads: usize,
}

impl Default for NufftOpts {
    fn default() -> Self {
        NufftOpts {
            debug: 0,
            spread_debug: 0,
            spread_sort: SpreadSort::Heuristic,
            spread_kerevalmeth: KernelEvalMethod::Direct,
            spread_kerpad: true,
            chkbnds: true,
            fft_quality: FftQuality::Estimate,
            modeord: ModeOrder::Cmcl,
            upsampfac: 2.0,
            spread_thread: SpreadThread::Auto,
            nthreads: 0,
        }
    }
}

/// Returns the default options record.
pub fn default_opts() -> NufftOpts {
    NufftOpts::default()
}

pub(crate) const MAX_NSPREAD: usize = 16;

/// Derived spreading-kernel parameters, fixed once per plan.
#[derive(Debug, Clone)]
pub(crate) struct SpreadOpts {
    /// Kernel support width in fine-grid points.
    pub nspread: usize,
    /// Shape parameter of the exponential-of-semicircle kernel.
    pub beta: f64,
    /// `4/nspread^2`; turns a grid offset into the kernel's unit argument squared.
    pub es_c: f64,
    pub sort: SpreadSort,
    pub kerevalmeth: KernelEvalMethod,
    pub kerpad: bool,
    pub chkbnds: bool,
    pub debug: i32,
}

/// Chooses kernel width and shape reaching tolerance `eps` at upsampling
/// `opts.upsampfac`, or reports that the tolerance is unreachable.
pub(crate) fn setup_spreader(eps: f64, opts: &NufftOpts) -> Result<SpreadOpts, ZunftError> {
    let sigma = opts.upsampfac;
    if sigma <= 1.0 {
        return Err(ZunftError::UpsampfacNotValid(sigma));
    }
    let ns = if sigma == 2.0 {
        (-(eps / 10.0).log10()).ceil() as i64
    } else {
        (-eps.ln() / (std::f64::consts::PI * (1.0 - 1.0 / sigma).sqrt())).ceil() as i64
    };
    let ns = ns.max(2);
    if ns > MAX_NSPREAD as i64 {
        return Err(ZunftError::EpsTooSmall(eps));
    }
    let ns = ns as usize;

    // shape constants tuned per width for sigma=2, generic rate otherwise
    let beta_over_ns = if sigma == 2.0 {
        match ns {
            2 => 2.20,
            3 => 2.26,
            4 => 2.38,
            _ => 2.30,
        }
    } else {
        0.97 * std::f64::consts::PI * (1.0 - 1.0 / (2.0 * sigma))
    };

    Ok(SpreadOpts {
        nspread: ns,
        beta: beta_over_ns * ns as f64,
        es_c: 4.0 / (ns * ns) as f64,
        sort: opts.spread_sort,
        kerevalmeth: opts.spread_kerevalmeth,
        kerpad: opts.spread_kerpad,
        chkbnds: opts.chkbnds,
        debug: opts.spread_debug,
    })
}

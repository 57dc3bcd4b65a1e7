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

//! Nonuniform fast Fourier transforms of types 1 (nonuniform to modes),
//! 2 (modes to nonuniform) and 3 (nonuniform to nonuniform) in one, two and
//! three dimensions, to a user-chosen tolerance.
//!
//! The workflow is plan-based: [`NufftPlan::make_plan`] fixes the transform
//! shape and precomputes kernel tables and the oversampled DFT,
//! [`NufftPlan::set_points`] binds (and for type 3, rescales) the nonuniform
//! points, and [`NufftPlan::execute`] runs any number of strength vectors
//! through spread/interpolate, batched DFT and deconvolution stages.
//!
//! Coordinates are radians; a mode index `k` pairs with a point `x` through
//! `exp(sign*i*k*x)`, with no normalization applied anywhere.

#![allow(clippy::too_many_arguments, clippy::manual_div_ceil)]

mod deconvolve;
mod err;
mod fft;
mod kernel;
mod opts;
mod plan;
mod spread;
mod util;

pub use err::ZunftError;
pub use opts::{
    default_opts, FftQuality, KernelEvalMethod, ModeOrder, NufftOpts, SpreadSort, SpreadThread,
};
pub use plan::{NufftPlan, NufftType};

use num_traits::{AsPrimitive, Float, FloatConst, NumAssign};

/// Floating-point sample types the transforms are implemented for.
pub trait NufftSample:
    rustfft::FftNum + Float + FloatConst + NumAssign + Default + AsPrimitive<f64>
{
}

impl NufftSample for f32 {}
impl NufftSample for f64 {}

#[cfg(test)]
mod tests {
    use crate::{ModeOrder, NufftOpts, NufftPlan, NufftType, SpreadSort, SpreadThread};
    use num_complex::Complex;
    use rand::Rng;
    use std::f64::consts::PI;

    type C64 = Complex<f64>;

    fn cis(theta: f64, sign: f64) -> C64 {
        Complex::new(theta.cos(), sign * theta.sin())
    }

    /// Direct adjoint sum in up to three dimensions, increasing mode order.
    fn direct_type1(
        x: &[f64],
        y: &[f64],
        z: &[f64],
        c: &[C64],
        sign: f64,
        ms: [usize; 3],
    ) -> Vec<C64> {
        let dim = if !z.is_empty() {
            3
        } else if !y.is_empty() {
            2
        } else {
            1
        };
        let kmin: Vec<i64> = ms.iter().map(|&m| -((m / 2) as i64)).collect();
        let total = ms[0] * ms[1] * ms[2];
        let mut out = vec![Complex::new(0.0, 0.0); total];
        for (idx, o) in out.iter_mut().enumerate() {
            let k1 = kmin[0] + (idx % ms[0]) as i64;
            let k2 = kmin[1] + ((idx / ms[0]) % ms[1]) as i64;
            let k3 = kmin[2] + (idx / (ms[0] * ms[1])) as i64;
            let mut acc = Complex::new(0.0, 0.0);
            for (j, cj) in c.iter().enumerate() {
                let mut theta = k1 as f64 * x[j];
                if dim > 1 {
                    theta += k2 as f64 * y[j];
                }
                if dim > 2 {
                    theta += k3 as f64 * z[j];
                }
                acc += cj * cis(theta, sign);
            }
            *o = acc;
        }
        out
    }

    /// Direct forward sum: modes (increasing order) to nonuniform points.
    fn direct_type2(
        x: &[f64],
        y: &[f64],
        z: &[f64],
        f: &[C64],
        sign: f64,
        ms: [usize; 3],
    ) -> Vec<C64> {
        let dim = if !z.is_empty() {
            3
        } else if !y.is_empty() {
            2
        } else {
            1
        };
        let kmin: Vec<i64> = ms.iter().map(|&m| -((m / 2) as i64)).collect();
        let nj = x.len();
        let mut out = vec![Complex::new(0.0, 0.0); nj];
        for (j, o) in out.iter_mut().enumerate() {
            let mut acc = Complex::new(0.0, 0.0);
            for (idx, fk) in f.iter().enumerate() {
                let k1 = kmin[0] + (idx % ms[0]) as i64;
                let k2 = kmin[1] + ((idx / ms[0]) % ms[1]) as i64;
                let k3 = kmin[2] + (idx / (ms[0] * ms[1])) as i64;
                let mut theta = k1 as f64 * x[j];
                if dim > 1 {
                    theta += k2 as f64 * y[j];
                }
                if dim > 2 {
                    theta += k3 as f64 * z[j];
                }
                acc += fk * cis(theta, sign);
            }
            *o = acc;
        }
        out
    }

    /// Direct nonuniform-to-nonuniform sum.
    fn direct_type3(
        x: &[f64],
        y: &[f64],
        c: &[C64],
        s: &[f64],
        t: &[f64],
        sign: f64,
    ) -> Vec<C64> {
        let mut out = vec![Complex::new(0.0, 0.0); s.len()];
        for (k, o) in out.iter_mut().enumerate() {
            let mut acc = Complex::new(0.0, 0.0);
            for (j, cj) in c.iter().enumerate() {
                let mut theta = s[k] * x[j];
                if !y.is_empty() {
                    theta += t[k] * y[j];
                }
                acc += cj * cis(theta, sign);
            }
            *o = acc;
        }
        out
    }

    fn rel_err(got: &[C64], want: &[C64]) -> f64 {
        let num: f64 = got
            .iter()
            .zip(want.iter())
            .map(|(a, b)| (a - b).norm_sqr())
            .sum();
        let den: f64 = want.iter().map(|v| v.norm_sqr()).sum();
        (num / den.max(f64::MIN_POSITIVE)).sqrt()
    }

    fn random_cloud(n: usize, lo: f64, hi: f64) -> Vec<f64> {
        let mut rng = rand::rng();
        (0..n).map(|_| rng.random_range(lo..hi)).collect()
    }

    fn random_strengths(n: usize) -> Vec<C64> {
        let mut rng = rand::rng();
        (0..n)
            .map(|_| Complex::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)))
            .collect()
    }

    #[test]
    fn type1_single_point_at_origin_gives_flat_modes() {
        let x = [0.0f64];
        let mut c = vec![Complex::new(1.0, 0.0)];
        let mut f = vec![C64::default(); 8];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [8, 1, 1], 1, 1, 1e-12, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        for (k, v) in f.iter().enumerate() {
            assert!(
                (v.re - 1.0).abs() < 1e-11 && v.im.abs() < 1e-11,
                "mode {k} = {v}"
            );
        }
    }

    #[test]
    fn type2_flat_modes_sum_at_origin() {
        let x = [0.0f64];
        let mut c = vec![C64::default()];
        let mut f = vec![Complex::new(1.0, 0.0); 8];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type2, 1, [8, 1, 1], 1, 1, 1e-12, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        assert!((c[0].re - 8.0).abs() < 1e-10, "got {}", c[0]);
        assert!(c[0].im.abs() < 1e-10);
    }

    #[test]
    fn type1_1d_matches_direct_summation() {
        let eps = 1e-9;
        let nj = 100;
        let ms = 20;
        let x = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);
        let want = direct_type1(&x, &[], &[], &c, -1.0, [ms, 1, 1]);
        let mut f = vec![C64::default(); ms];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], -1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type2_1d_matches_direct_summation() {
        let eps = 1e-9;
        let nj = 90;
        let ms = 24;
        let x = random_cloud(nj, -PI, PI);
        let mut f = random_strengths(ms);
        let want = direct_type2(&x, &[], &[], &f, 1.0, [ms, 1, 1]);
        let mut c = vec![C64::default(); nj];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type2, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&c, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type1_2d_matches_direct_summation() {
        let eps = 1e-9;
        let nj = 60;
        let ms = [12usize, 14, 1];
        let x = random_cloud(nj, -PI, PI);
        let y = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);
        let want = direct_type1(&x, &y, &[], &c, 1.0, ms);
        let mut f = vec![C64::default(); ms[0] * ms[1]];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 2, ms, 1, 1, eps, 0, None).unwrap();
        plan.set_points(&x, &y, &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type2_2d_matches_direct_summation() {
        let eps = 1e-9;
        let nj = 70;
        let ms = [10usize, 9, 1];
        let x = random_cloud(nj, -PI, PI);
        let y = random_cloud(nj, -PI, PI);
        let mut f = random_strengths(ms[0] * ms[1]);
        let want = direct_type2(&x, &y, &[], &f, -1.0, ms);
        let mut c = vec![C64::default(); nj];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type2, 2, ms, -1, 1, eps, 0, None).unwrap();
        plan.set_points(&x, &y, &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&c, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type1_3d_matches_direct_summation() {
        let eps = 1e-7;
        let nj = 40;
        let ms = [6usize, 5, 7];
        let x = random_cloud(nj, -PI, PI);
        let y = random_cloud(nj, -PI, PI);
        let z = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);
        let want = direct_type1(&x, &y, &z, &c, 1.0, ms);
        let mut f = vec![C64::default(); ms[0] * ms[1] * ms[2]];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 3, ms, 1, 1, eps, 0, None).unwrap();
        plan.set_points(&x, &y, &z, &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type2_3d_matches_direct_summation() {
        let eps = 1e-7;
        let nj = 35;
        let ms = [5usize, 6, 4];
        let x = random_cloud(nj, -PI, PI);
        let y = random_cloud(nj, -PI, PI);
        let z = random_cloud(nj, -PI, PI);
        let mut f = random_strengths(ms[0] * ms[1] * ms[2]);
        let want = direct_type2(&x, &y, &z, &f, 1.0, ms);
        let mut c = vec![C64::default(); nj];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type2, 3, ms, 1, 1, eps, 0, None).unwrap();
        plan.set_points(&x, &y, &z, &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&c, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn adjoint_then_forward_roundtrip_2d() {
        let eps = 1e-10;
        let nj = 50;
        let ms = [16usize, 16, 1];
        let x = random_cloud(nj, -PI, PI);
        let y = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);
        let modes_ref = direct_type1(&x, &y, &[], &c, 1.0, ms);
        let back_ref = direct_type2(&x, &y, &[], &modes_ref, 1.0, ms);

        let mut modes = vec![C64::default(); ms[0] * ms[1]];
        let mut plan1 =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 2, ms, 1, 1, eps, 0, None).unwrap();
        plan1.set_points(&x, &y, &[], &[], &[], &[]).unwrap();
        plan1.execute(&mut c, &mut modes).unwrap();

        let mut back = vec![C64::default(); nj];
        let mut plan2 =
            NufftPlan::<f64>::make_plan(NufftType::Type2, 2, ms, 1, 1, eps, 0, None).unwrap();
        plan2.set_points(&x, &y, &[], &[], &[], &[]).unwrap();
        plan2.execute(&mut back, &mut modes).unwrap();

        let err = rel_err(&back, &back_ref);
        assert!(err < 100.0 * eps, "roundtrip relative error {err:e}");
    }

    #[test]
    fn type3_1d_matches_direct_summation() {
        let eps = 1e-9;
        let n = 100;
        let x = random_cloud(n, -10.0, 10.0);
        let s = random_cloud(n, -10.0, 10.0);
        let mut c = random_strengths(n);
        let want = direct_type3(&x, &[], &c, &s, &[], 1.0);
        let mut f = vec![C64::default(); n];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type3, 1, [1, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &s, &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 100.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type3_1d_negative_sign_matches_direct() {
        let eps = 1e-8;
        let n = 80;
        let x = random_cloud(n, 2.0, 9.0); // off-center cloud exercises the shifts
        let s = random_cloud(n, -6.0, -1.0);
        let mut c = random_strengths(n);
        let want = direct_type3(&x, &[], &c, &s, &[], -1.0);
        let mut f = vec![C64::default(); n];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type3, 1, [1, 1, 1], -1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &s, &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 100.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type3_2d_matches_direct_summation() {
        let eps = 1e-8;
        let nj = 60;
        let nk = 50;
        let x = random_cloud(nj, -5.0, 5.0);
        let y = random_cloud(nj, -4.0, 4.0);
        let s = random_cloud(nk, -3.0, 3.0);
        let t = random_cloud(nk, -3.0, 3.0);
        let mut c = random_strengths(nj);
        let want = direct_type3(&x, &y, &c, &s, &t, 1.0);
        let mut f = vec![C64::default(); nk];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type3, 2, [1, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &y, &[], &s, &t, &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 100.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn type3_batched_tail_matches_direct() {
        // three transforms through batches of two exercises the partial tail
        let eps = 1e-8;
        let n = 40;
        let ntr = 3;
        let x = random_cloud(n, -8.0, 8.0);
        let s = random_cloud(n, -8.0, 8.0);
        let mut c: Vec<C64> = (0..ntr).flat_map(|_| random_strengths(n)).collect();
        let mut f = vec![C64::default(); n * ntr];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type3, 1, [1, 1, 1], 1, ntr, eps, 2, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &s, &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        for tr in 0..ntr {
            let want = direct_type3(&x, &[], &c[tr * n..(tr + 1) * n], &s, &[], 1.0);
            let err = rel_err(&f[tr * n..(tr + 1) * n], &want);
            assert!(err < 100.0 * eps, "transform {tr} relative error {err:e}");
        }
    }

    #[test]
    fn adjoint_and_forward_are_adjoints() {
        let eps = 1e-10;
        let nj = 40;
        let ms = 16;
        let x = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);
        let f = random_strengths(ms);

        let mut t1_out = vec![C64::default(); ms];
        let mut plan1 =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan1.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan1.execute(&mut c, &mut t1_out).unwrap();

        let mut t2_out = vec![C64::default(); nj];
        let mut f_in = f.clone();
        let mut plan2 =
            NufftPlan::<f64>::make_plan(NufftType::Type2, 1, [ms, 1, 1], -1, 1, eps, 0, None)
                .unwrap();
        plan2.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan2.execute(&mut t2_out, &mut f_in).unwrap();

        let lhs: C64 = t1_out.iter().zip(f.iter()).map(|(a, b)| a * b.conj()).sum();
        let rhs: C64 = c.iter().zip(t2_out.iter()).map(|(a, b)| a * b.conj()).sum();
        assert!(
            (lhs - rhs).norm() < 1e-8 * lhs.norm().max(1.0),
            "<T1 c, f> = {lhs}, <c, T2 f> = {rhs}"
        );
    }

    #[test]
    fn execute_is_linear_in_the_strengths() {
        let eps = 1e-11;
        let nj = 30;
        let ms = 12;
        let x = random_cloud(nj, -PI, PI);
        let c1 = random_strengths(nj);
        let c2 = random_strengths(nj);
        let alpha = Complex::new(0.7, -0.3);
        let beta = Complex::new(-1.1, 0.4);

        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();

        let mut out1 = vec![C64::default(); ms];
        let mut in1 = c1.clone();
        plan.execute(&mut in1, &mut out1).unwrap();
        let mut out2 = vec![C64::default(); ms];
        let mut in2 = c2.clone();
        plan.execute(&mut in2, &mut out2).unwrap();

        let mut combo: Vec<C64> = c1
            .iter()
            .zip(c2.iter())
            .map(|(a, b)| alpha * a + beta * b)
            .collect();
        let mut out_combo = vec![C64::default(); ms];
        plan.execute(&mut combo, &mut out_combo).unwrap();

        for ((a, b), got) in out1.iter().zip(out2.iter()).zip(out_combo.iter()) {
            let want = alpha * a + beta * b;
            assert!((got - want).norm() < 1e-11 * want.norm().max(1.0));
        }
    }

    #[test]
    fn flipping_the_sign_conjugates_real_input_output() {
        let eps = 1e-11;
        let nj = 25;
        let ms = 10;
        let x = random_cloud(nj, -PI, PI);
        let mut rng = rand::rng();
        let c_real: Vec<C64> = (0..nj)
            .map(|_| Complex::new(rng.random_range(-1.0..1.0), 0.0))
            .collect();

        let mut plus = vec![C64::default(); ms];
        let mut plan_p =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan_p.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        let mut cp = c_real.clone();
        plan_p.execute(&mut cp, &mut plus).unwrap();

        let mut minus = vec![C64::default(); ms];
        let mut plan_m =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], -1, 1, eps, 0, None)
                .unwrap();
        plan_m.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        let mut cm = c_real.clone();
        plan_m.execute(&mut cm, &mut minus).unwrap();

        for (p, m) in plus.iter().zip(minus.iter()) {
            assert!((p - m.conj()).norm() < 1e-11 * p.norm().max(1.0));
        }
    }

    #[test]
    fn fft_ordering_is_a_half_rotation_of_increasing_order() {
        let eps = 1e-10;
        let nj = 45;
        let ms = [14usize, 8, 1];
        let x = random_cloud(nj, -PI, PI);
        let y = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);

        let mut cmcl = vec![C64::default(); ms[0] * ms[1]];
        let mut plan_a =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 2, ms, 1, 1, eps, 0, None).unwrap();
        plan_a.set_points(&x, &y, &[], &[], &[], &[]).unwrap();
        plan_a.execute(&mut c, &mut cmcl).unwrap();

        let mut opts = NufftOpts::default();
        opts.modeord = ModeOrder::Fft;
        let mut fftord = vec![C64::default(); ms[0] * ms[1]];
        let mut plan_b =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 2, ms, 1, 1, eps, 0, Some(opts))
                .unwrap();
        plan_b.set_points(&x, &y, &[], &[], &[], &[]).unwrap();
        plan_b.execute(&mut c, &mut fftord).unwrap();

        for k2 in -(ms[1] as i64) / 2..=(ms[1] as i64 - 1) / 2 {
            for k1 in -(ms[0] as i64) / 2..=(ms[0] as i64 - 1) / 2 {
                let ci = ((k2 + ms[1] as i64 / 2) as usize) * ms[0]
                    + (k1 + ms[0] as i64 / 2) as usize;
                let fi = (k2.rem_euclid(ms[1] as i64) as usize) * ms[0]
                    + k1.rem_euclid(ms[0] as i64) as usize;
                assert!(
                    (cmcl[ci] - fftord[fi]).norm() < 1e-14,
                    "modes ({k1},{k2}) differ"
                );
            }
        }
    }

    #[test]
    fn batched_execution_matches_one_by_one() {
        let eps = 1e-10;
        let nj = 55;
        let ms = 18;
        let ntr = 5;
        let x = random_cloud(nj, -PI, PI);
        let mut c: Vec<C64> = (0..ntr).flat_map(|_| random_strengths(nj)).collect();

        let mut batched = vec![C64::default(); ms * ntr];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, ntr, eps, 2, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut batched).unwrap();

        let mut single =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        single.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        for tr in 0..ntr {
            let mut one_c = c[tr * nj..(tr + 1) * nj].to_vec();
            let mut one_f = vec![C64::default(); ms];
            single.execute(&mut one_c, &mut one_f).unwrap();
            for (a, b) in batched[tr * ms..(tr + 1) * ms].iter().zip(one_f.iter()) {
                assert!((a - b).norm() < 1e-13, "transform {tr}: {a} vs {b}");
            }
        }
    }

    #[test]
    fn duplicated_points_with_split_strengths_are_invisible() {
        let eps = 1e-9;
        let nj = 30;
        let ms = 16;
        let x = random_cloud(nj, -PI, PI);
        let c = random_strengths(nj);

        let mut base = vec![C64::default(); ms];
        let mut plan =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        let mut cin = c.clone();
        plan.execute(&mut cin, &mut base).unwrap();

        let x4: Vec<f64> = x.iter().flat_map(|&v| [v; 4]).collect();
        let mut c4: Vec<C64> = c.iter().flat_map(|&v| [v * 0.25; 4]).collect();
        let mut quad = vec![C64::default(); ms];
        let mut plan4 =
            NufftPlan::<f64>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan4.set_points(&x4, &[], &[], &[], &[], &[]).unwrap();
        plan4.execute(&mut c4, &mut quad).unwrap();

        let err = rel_err(&quad, &base);
        assert!(err < eps, "cluster sensitivity {err:e}");
    }

    #[test]
    fn spread_policies_agree() {
        let eps = 1e-9;
        let nj = 64;
        let ms = 20;
        let ntr = 3;
        let x = random_cloud(nj, -PI, PI);
        let mut c: Vec<C64> = (0..ntr).flat_map(|_| random_strengths(nj)).collect();

        let mut run = |policy: SpreadThread| {
            let mut opts = NufftOpts::default();
            opts.spread_thread = policy;
            let mut out = vec![C64::default(); ms * ntr];
            let mut plan = NufftPlan::<f64>::make_plan(
                NufftType::Type1,
                1,
                [ms, 1, 1],
                1,
                ntr,
                eps,
                0,
                Some(opts),
            )
            .unwrap();
            plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
            plan.execute(&mut c, &mut out).unwrap();
            out
        };
        let auto = run(SpreadThread::Auto);
        let par = run(SpreadThread::ParSinglethreaded);
        let seq = run(SpreadThread::SeqMultithreaded);
        let nested = run(SpreadThread::Nested);
        for (((a, b), c), d) in auto.iter().zip(par.iter()).zip(seq.iter()).zip(nested.iter()) {
            assert!((a - b).norm() < 1e-13);
            assert!((a - c).norm() < 1e-13);
            assert!((a - d).norm() < 1e-13);
        }
    }

    #[test]
    fn forced_sorting_does_not_change_results() {
        let eps = 1e-9;
        let nj = 150;
        let ms = 22;
        let x = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);

        let mut run = |sort: SpreadSort| {
            let mut opts = NufftOpts::default();
            opts.spread_sort = sort;
            let mut out = vec![C64::default(); ms];
            let mut plan = NufftPlan::<f64>::make_plan(
                NufftType::Type1,
                1,
                [ms, 1, 1],
                1,
                1,
                eps,
                0,
                Some(opts),
            )
            .unwrap();
            plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
            plan.execute(&mut c, &mut out).unwrap();
            out
        };
        let sorted = run(SpreadSort::Always);
        let unsorted = run(SpreadSort::Never);
        let err = rel_err(&sorted, &unsorted);
        assert!(err < 1e-13);
    }

    #[test]
    fn low_upsampling_factor_still_meets_tolerance() {
        let eps = 1e-6;
        let nj = 80;
        let ms = 26;
        let x = random_cloud(nj, -PI, PI);
        let mut c = random_strengths(nj);
        let want = direct_type1(&x, &[], &[], &c, 1.0, [ms, 1, 1]);
        let mut opts = NufftOpts::default();
        opts.upsampfac = 1.25;
        let mut f = vec![C64::default(); ms];
        let mut plan = NufftPlan::<f64>::make_plan(
            NufftType::Type1,
            1,
            [ms, 1, 1],
            1,
            1,
            eps,
            0,
            Some(opts),
        )
        .unwrap();
        plan.set_points(&x, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c, &mut f).unwrap();
        let err = rel_err(&f, &want);
        assert!(err < 10.0 * eps, "relative error {err:e}");
    }

    #[test]
    fn single_precision_transform_is_usable() {
        let eps = 1e-4;
        let nj = 50;
        let ms = 16;
        let mut rng = rand::rng();
        let x32: Vec<f32> = (0..nj)
            .map(|_| rng.random_range(-PI as f32..PI as f32))
            .collect();
        let mut c32: Vec<Complex<f32>> = (0..nj)
            .map(|_| Complex::new(rng.random_range(-1.0..1.0), rng.random_range(-1.0..1.0)))
            .collect();
        let mut f32out = vec![Complex::<f32>::default(); ms];
        let mut plan =
            NufftPlan::<f32>::make_plan(NufftType::Type1, 1, [ms, 1, 1], 1, 1, eps, 0, None)
                .unwrap();
        plan.set_points(&x32, &[], &[], &[], &[], &[]).unwrap();
        plan.execute(&mut c32, &mut f32out).unwrap();

        let x: Vec<f64> = x32.iter().map(|&v| v as f64).collect();
        let c: Vec<C64> = c32
            .iter()
            .map(|v| Complex::new(v.re as f64, v.im as f64))
            .collect();
        let want = direct_type1(&x, &[], &[], &c, 1.0, [ms, 1, 1]);
        let got: Vec<C64> = f32out
            .iter()
            .map(|v| Complex::new(v.re as f64, v.im as f64))
            .collect();
        let err = rel_err(&got, &want);
        assert!(err < 1e-3, "relative error {err:e}");
    }
}

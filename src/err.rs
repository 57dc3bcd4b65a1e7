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
use std::error::Error;
use std::fmt::Formatter;

#[derive(Clone, Debug)]
pub enum ZunftError {
    /// Requested tolerance is below what the spreading kernel can reach.
    EpsTooSmall(f64),
    /// The fine grid (times the batch size) would exceed the allocation cap.
    MaxNallocExceeded(usize),
    /// A nonuniform coordinate lies outside `[-3*pi, 3*pi]`; payload is the point index.
    SpreadBounds(usize),
    /// Spreader failed for a reason other than bounds; payload is its raw code.
    SpreadOther(i32),
    UpsampfacNotValid(f64),
    NtransfNotValid(usize),
    TypeNotValid(i32),
    OutOfMemory(usize),
    DimNotValid(usize),
    /// Execute was called before set_points succeeded.
    NotReady,
    InvalidBufferLength(usize, usize),
}

impl ZunftError {
    /// Stable integer code for FFI-style reporting; zero is reserved for success.
    pub fn code(&self) -> i32 {
        match self {
            ZunftError::EpsTooSmall(_) => 1,
            ZunftError::MaxNallocExceeded(_) => 2,
            ZunftError::SpreadBounds(_) => 4,
            ZunftError::SpreadOther(_) => 6,
            ZunftError::UpsampfacNotValid(_) => 7,
            ZunftError::NtransfNotValid(_) => 9,
            ZunftError::TypeNotValid(_) => 10,
            ZunftError::OutOfMemory(_) => 11,
            ZunftError::DimNotValid(_) => 12,
            ZunftError::NotReady => 14,
            ZunftError::InvalidBufferLength(_, _) => 15,
        }
    }
}

impl Error for ZunftError {}

impl std::fmt::Display for ZunftError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ZunftError::EpsTooSmall(eps) => f.write_fmt(format_args!(
                "Tolerance {eps:e} is too small for the spreading kernel"
            )),
            ZunftError::MaxNallocExceeded(nf) => f.write_fmt(format_args!(
                "Fine grid of {nf} points exceeds the maximum allowed allocation"
            )),
            ZunftError::SpreadBounds(j) => f.write_fmt(format_args!(
                "Nonuniform point {j} is outside [-3pi, 3pi]"
            )),
            ZunftError::SpreadOther(code) => {
                f.write_fmt(format_args!("Spreader failed with code {code}"))
            }
            ZunftError::UpsampfacNotValid(sigma) => f.write_fmt(format_args!(
                "Upsampling factor {sigma} is invalid, it must exceed 1"
            )),
            ZunftError::NtransfNotValid(n) => f.write_fmt(format_args!(
                "Number of transforms {n} should be at least 1"
            )),
            ZunftError::TypeNotValid(t) => f.write_fmt(format_args!(
                "Invalid transform type {t}, should be 1, 2 or 3"
            )),
            ZunftError::OutOfMemory(length) => {
                f.write_fmt(format_args!("Cannot allocate {length} elements to vector"))
            }
            ZunftError::DimNotValid(d) => {
                f.write_fmt(format_args!("Invalid dimension {d}, should be 1, 2 or 3"))
            }
            ZunftError::NotReady => {
                f.write_str("Execute called before set_points; the plan has no points bound")
            }
            ZunftError::InvalidBufferLength(expected, got) => f.write_fmt(format_args!(
                "Buffer length expected to be at least {expected}, but it was {got}"
            )),
        }
    }
}

macro_rules! try_vec {
    () => {
        Vec::new()
    };
    ($elem:expr; $n:expr) => {{
        let mut v = Vec::new();
        v.try_reserve_exact($n)
            .map_err(|_| crate::err::ZunftError::OutOfMemory($n))?;
        v.resize($n, $elem);
        v
    }};
}

pub(crate) use try_vec;

//! Frame delta estimation.
//!
//! The delta between two equal-size grayscale frames is
//! `sum(|a_i - b_i|) / (P * 255)` where `P` is the pixel count, so identical
//! frames give 0.0 and fully inverted black/white frames give 1.0.
//!
//! The absolute-difference-and-sum runs once per frame on the full frame,
//! so it is dispatched to a [`DeltaKernel`] chosen from the CPU's
//! capabilities at run time. Every kernel produces exactly the same integer
//! sum; the vector kernels hand their unaligned remainder to the scalar
//! loop.

use serde::{Deserialize, Serialize};

/// One implementation of the batch absolute-difference-and-sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeltaKernel {
    /// Portable byte-at-a-time loop.
    Scalar,
    /// x86_64 `psadbw`, 16 bytes per step.
    Sse2,
    /// aarch64 `uabd` + pairwise widening adds, 16 bytes per step.
    Neon,
}

impl DeltaKernel {
    /// Pick the fastest kernel the running CPU supports.
    pub fn detect() -> Self {
        if Self::Neon.is_available() {
            Self::Neon
        } else if Self::Sse2.is_available() {
            Self::Sse2
        } else {
            Self::Scalar
        }
    }

    /// Whether this kernel can run on the current CPU.
    pub fn is_available(self) -> bool {
        match self {
            Self::Scalar => true,
            Self::Sse2 => {
                #[cfg(target_arch = "x86_64")]
                {
                    std::arch::is_x86_feature_detected!("sse2")
                }
                #[cfg(not(target_arch = "x86_64"))]
                {
                    false
                }
            }
            Self::Neon => {
                #[cfg(target_arch = "aarch64")]
                {
                    std::arch::is_aarch64_feature_detected!("neon")
                }
                #[cfg(not(target_arch = "aarch64"))]
                {
                    false
                }
            }
        }
    }

    /// All kernels usable on this CPU, scalar first.
    pub fn available() -> Vec<Self> {
        [Self::Scalar, Self::Sse2, Self::Neon]
            .into_iter()
            .filter(|k| k.is_available())
            .collect()
    }

    /// Short name for logs and reports.
    pub fn name(self) -> &'static str {
        match self {
            Self::Scalar => "scalar",
            Self::Sse2 => "sse2",
            Self::Neon => "neon",
        }
    }

    /// Sum of absolute byte differences over the common length of `a` and `b`.
    ///
    /// An unavailable kernel falls back to the scalar loop.
    pub fn sum_abs_diff(self, a: &[u8], b: &[u8]) -> u64 {
        debug_assert_eq!(a.len(), b.len(), "delta inputs must have equal length");
        let len = a.len().min(b.len());
        let (a, b) = (&a[..len], &b[..len]);

        match self {
            #[cfg(target_arch = "x86_64")]
            Self::Sse2 if self.is_available() => {
                // SAFETY: SSE2 support was just checked at run time.
                unsafe { x86::sum_abs_diff_sse2(a, b) }
            }
            #[cfg(target_arch = "aarch64")]
            Self::Neon if self.is_available() => {
                // SAFETY: NEON support was just checked at run time.
                unsafe { arm::sum_abs_diff_neon(a, b) }
            }
            _ => scalar_sum_abs_diff(a, b),
        }
    }

    /// Normalized delta in [0, 1]. Empty frames give 0.0.
    pub fn delta(self, a: &[u8], b: &[u8]) -> f64 {
        let len = a.len().min(b.len());
        if len == 0 {
            return 0.0;
        }
        self.sum_abs_diff(a, b) as f64 / (len as f64 * 255.0)
    }
}

impl std::fmt::Display for DeltaKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized delta between two frames using the best available kernel.
pub fn frame_delta(a: &[u8], b: &[u8]) -> f64 {
    DeltaKernel::detect().delta(a, b)
}

fn scalar_sum_abs_diff(a: &[u8], b: &[u8]) -> u64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| u64::from(x.abs_diff(y)))
        .sum()
}

#[cfg(target_arch = "x86_64")]
mod x86 {
    use std::arch::x86_64::{
        __m128i, _mm_add_epi64, _mm_loadu_si128, _mm_sad_epu8, _mm_setzero_si128,
        _mm_storeu_si128,
    };

    /// `psadbw` yields two 64-bit partial sums per 16 bytes, so the
    /// accumulator cannot overflow for any addressable frame.
    #[target_feature(enable = "sse2")]
    pub(super) unsafe fn sum_abs_diff_sse2(a: &[u8], b: &[u8]) -> u64 {
        let len = a.len();
        let mut acc = _mm_setzero_si128();
        let mut i = 0;

        while i + 16 <= len {
            let va = _mm_loadu_si128(a.as_ptr().add(i) as *const __m128i);
            let vb = _mm_loadu_si128(b.as_ptr().add(i) as *const __m128i);
            acc = _mm_add_epi64(acc, _mm_sad_epu8(va, vb));
            i += 16;
        }

        let mut lanes = [0u64; 2];
        _mm_storeu_si128(lanes.as_mut_ptr() as *mut __m128i, acc);

        lanes[0] + lanes[1] + super::scalar_sum_abs_diff(&a[i..], &b[i..])
    }
}

#[cfg(target_arch = "aarch64")]
mod arm {
    use std::arch::aarch64::{
        vabdq_u8, vaddlvq_u32, vdupq_n_u32, vld1q_u8, vpadalq_u16, vpaddlq_u8,
    };

    /// Blocks of 16 bytes folded into the u32 lanes before they are drained.
    /// Each block adds at most 4 * 255 to a lane, so 2^16 blocks stay far
    /// below `u32::MAX`.
    const BLOCKS_PER_FLUSH: usize = 1 << 16;

    #[target_feature(enable = "neon")]
    pub(super) unsafe fn sum_abs_diff_neon(a: &[u8], b: &[u8]) -> u64 {
        let blocks = a.len() / 16;
        let mut total: u64 = 0;
        let mut block = 0;

        while block < blocks {
            let end = (block + BLOCKS_PER_FLUSH).min(blocks);
            let mut acc = vdupq_n_u32(0);
            while block < end {
                let offset = block * 16;
                let va = vld1q_u8(a.as_ptr().add(offset));
                let vb = vld1q_u8(b.as_ptr().add(offset));
                acc = vpadalq_u16(acc, vpaddlq_u8(vabdq_u8(va, vb)));
                block += 1;
            }
            total += vaddlvq_u32(acc);
        }

        let tail = blocks * 16;
        total + super::scalar_sum_abs_diff(&a[tail..], &b[tail..])
    }
}

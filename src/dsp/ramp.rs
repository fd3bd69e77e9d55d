//! Previous/current gain pairs and the ramped mixing kernels.
//!
//! Every gain in the mixer is stored as a pair: the value resolved for the
//! previous block and the value resolved for the current one. A `process`
//! call interpolates linearly between the two across the whole requested
//! frame count, so control changes never produce an audible step. This is
//! O(1) memory per gain and exactly reproducible, unlike a smoothing filter.

/// A linearly ramped gain: `prev` is the value resolved for the last block,
/// `cur` the target for the block being processed.
///
/// The value at frame `k` of an `n`-frame block is `prev + (cur - prev) * k/n`,
/// so the first frame of a block is exactly the last block's resolved gain.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize)]
pub struct GainRamp {
    prev: f32,
    cur: f32,
}

impl GainRamp {
    pub const fn new(value: f32) -> Self {
        Self {
            prev: value,
            cur: value,
        }
    }

    /// Set the target for the coming block. The previous value is left
    /// untouched; it advances in [`settle`](Self::settle) at block end.
    #[inline]
    pub fn retarget(&mut self, target: f32) {
        self.cur = target;
    }

    /// Advance `prev` to `cur`. Called exactly once per `process` call,
    /// after the last sample has been produced.
    #[inline]
    pub fn settle(&mut self) {
        self.prev = self.cur;
    }

    /// Per-frame increment for a block of `samples` frames.
    #[inline]
    pub fn step(&self, samples: usize) -> f32 {
        debug_assert!(samples > 0);
        (self.cur - self.prev) / samples as f32
    }

    /// Gain at frame `offset` of a block of `samples` frames.
    #[inline]
    pub fn value_at(&self, offset: usize, samples: usize) -> f32 {
        self.prev + self.step(samples) * offset as f32
    }

    #[inline]
    pub fn previous(&self) -> f32 {
        self.prev
    }

    #[inline]
    pub fn current(&self) -> f32 {
        self.cur
    }

    /// True when no ramp is pending for this block.
    #[inline]
    pub fn is_flat(&self) -> bool {
        self.prev == self.cur
    }
}

impl Default for GainRamp {
    fn default() -> Self {
        Self::new(0.0)
    }
}

// =============================================================================
// Slice kernels
// =============================================================================
//
// The hot loops of the engine. All take pre-sliced buffers of equal length;
// the caller owns sub-block tiling and global ramp offsets.

#[inline]
pub fn fill_zero(dst: &mut [f32]) {
    dst.fill(0.0);
}

/// `dst[i] = src[i] * (g0 + step * i)`
#[inline]
pub fn ramp_copy(dst: &mut [f32], src: &[f32], g0: f32, step: f32) {
    debug_assert_eq!(dst.len(), src.len());
    if step == 0.0 {
        for (d, s) in dst.iter_mut().zip(src) {
            *d = s * g0;
        }
        return;
    }
    let mut g = g0;
    for (d, s) in dst.iter_mut().zip(src) {
        *d = s * g;
        g += step;
    }
}

/// `dst[i] += src[i] * (g0 + step * i)`
#[inline]
pub fn ramp_add(dst: &mut [f32], src: &[f32], g0: f32, step: f32) {
    debug_assert_eq!(dst.len(), src.len());
    if step == 0.0 {
        if g0 == 0.0 {
            return;
        }
        for (d, s) in dst.iter_mut().zip(src) {
            *d += s * g0;
        }
        return;
    }
    let mut g = g0;
    for (d, s) in dst.iter_mut().zip(src) {
        *d += s * g;
        g += step;
    }
}

// =============================================================================
// Tests
// =============================================================================

//! Bypass crossfader.
//!
//! Smooths the on/off transitions of full plugin bypass. The two steady
//! states are exact copy paths: a steadily bypassed bus reproduces its input
//! bit-for-bit, a steadily active bus passes the wet signal through
//! untouched. Any toggle of the switch, including one that lands
//! mid-transition, re-arms a fixed-length linear crossfade between the two
//! paths. The crossfade runs on its own per-sample position, so it overlaps
//! cleanly with the control-rate gain ramps happening on the wet path: the
//! two signals are blended, never multiplied together.

/// Crossfade length in seconds, converted to a per-sample step in
/// [`Bypass::init`].
const CROSSFADE_TIME_SEC: f32 = 0.005;

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize)]
pub enum BypassState {
    /// Output equals the wet path.
    Active,
    /// Output equals the dry path, sample-for-sample.
    Bypassed,
    /// Linear blend moving toward the switch target.
    Transitioning,
}

/// Per-bus bypass state machine. Lives for the plugin's lifetime; there is
/// no terminal state.
#[derive(Clone, Copy, Debug, serde::Serialize)]
pub struct Bypass {
    /// Switch target, read once per block by the parameter resolver.
    bypassed: bool,
    /// Dry amount in the output blend: 0.0 = fully active, 1.0 = fully
    /// bypassed.
    dry_mix: f32,
    /// Per-sample crossfade increment, derived from the sample rate.
    step: f32,
}

impl Bypass {
    pub const fn new() -> Self {
        Self {
            bypassed: false,
            dry_mix: 0.0,
            step: 0.0,
        }
    }

    /// Derive the crossfade step from the sample rate. Until this is called
    /// the crossfader snaps instead of fading.
    pub fn init(&mut self, sample_rate: f32) {
        let samples = (sample_rate * CROSSFADE_TIME_SEC).max(1.0);
        self.step = 1.0 / samples;
    }

    /// Set the switch target. Safe to call mid-transition; the fade reverses
    /// from its current position.
    #[inline]
    pub fn set_bypass(&mut self, bypass: bool) {
        self.bypassed = bypass;
    }

    #[inline]
    pub fn state(&self) -> BypassState {
        let target = if self.bypassed { 1.0 } else { 0.0 };
        if self.dry_mix == target {
            if self.bypassed {
                BypassState::Bypassed
            } else {
                BypassState::Active
            }
        } else {
            BypassState::Transitioning
        }
    }

    /// Blend `dry` and `wet` into `dst`, advancing the crossfade position.
    /// All three slices must have equal length.
    pub fn process(&mut self, dst: &mut [f32], dry: &[f32], wet: &[f32]) {
        debug_assert_eq!(dst.len(), dry.len());
        debug_assert_eq!(dst.len(), wet.len());

        let target = if self.bypassed { 1.0 } else { 0.0 };
        if self.dry_mix == target {
            if self.bypassed {
                dst.copy_from_slice(dry);
            } else {
                dst.copy_from_slice(wet);
            }
            return;
        }

        if self.step <= 0.0 {
            // Not initialized with a sample rate: hard switch.
            self.dry_mix = target;
            self.process(dst, dry, wet);
            return;
        }

        let mut settled = dst.len();
        for (i, (d, (x, w))) in dst.iter_mut().zip(dry.iter().zip(wet)).enumerate() {
            *d = x * self.dry_mix + w * (1.0 - self.dry_mix);
            if self.dry_mix < target {
                self.dry_mix = (self.dry_mix + self.step).min(target);
            } else {
                self.dry_mix = (self.dry_mix - self.step).max(target);
            }
            if self.dry_mix == target {
                settled = i + 1;
                break;
            }
        }

        // Fade completed mid-buffer: finish with the steady-state copy path.
        if settled < dst.len() {
            if self.bypassed {
                dst[settled..].copy_from_slice(&dry[settled..]);
            } else {
                dst[settled..].copy_from_slice(&wet[settled..]);
            }
        }
    }
}

impl Default for Bypass {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_active() {
        let b = Bypass::new();
        assert_eq!(b.state(), BypassState::Active);
    }

    #[test]
    fn test_steady_active_passes_wet() {
        let mut b = Bypass::new();
        b.init(48_000.0);
        let dry = [1.0; 8];
        let wet = [0.25; 8];
        let mut out = [0.0; 8];
        b.process(&mut out, &dry, &wet);
        assert_eq!(out, wet);
    }

    #[test]
    fn test_steady_bypass_is_exact_identity() {
        let mut b = Bypass::new();
        b.init(48_000.0);
        b.set_bypass(true);
        // Long enough to complete the 5 ms fade.
        let dry: Vec<f32> = (0..1024).map(|i| (i as f32 * 0.31).sin()).collect();
        let wet = vec![0.0; 1024];
        let mut out = vec![0.0; 1024];
        b.process(&mut out, &dry, &wet);
        assert_eq!(b.state(), BypassState::Bypassed);

        // Steady state must be a bit-exact copy of the dry input.
        b.process(&mut out, &dry, &wet);
        assert_eq!(out, dry);
    }

    #[test]
    fn test_transition_is_monotonic_blend() {
        let mut b = Bypass::new();
        b.init(48_000.0); // 240-sample fade
        b.set_bypass(true);
        let dry = [1.0; 64];
        let wet = [0.0; 64];
        let mut out = [0.0; 64];
        b.process(&mut out, &dry, &wet);
        assert_eq!(b.state(), BypassState::Transitioning);
        assert_eq!(out[0], 0.0);
        for w in out.windows(2) {
            assert!(w[1] >= w[0]);
        }
        assert!(out[63] > 0.0 && out[63] < 1.0);
    }

    #[test]
    fn test_toggle_mid_transition_reverses() {
        let mut b = Bypass::new();
        b.init(48_000.0);
        b.set_bypass(true);
        let dry = [1.0; 64];
        let wet = [0.0; 64];
        let mut out = [0.0; 64];
        b.process(&mut out, &dry, &wet);
        let mid = out[63];

        b.set_bypass(false);
        b.process(&mut out, &dry, &wet);
        for w in out.windows(2) {
            assert!(w[1] <= w[0]);
        }
        assert!(out[63] < mid);
    }

    #[test]
    fn test_fade_settles_within_buffer() {
        let mut b = Bypass::new();
        b.init(1_000.0); // 5-sample fade
        b.set_bypass(true);
        let dry = [1.0; 16];
        let wet = [-1.0; 16];
        let mut out = [0.0; 16];
        b.process(&mut out, &dry, &wet);
        assert_eq!(b.state(), BypassState::Bypassed);
        // Tail after the fade is the exact dry copy.
        assert_eq!(&out[8..], &dry[8..]);
    }

    #[test]
    fn test_uninitialized_snaps() {
        let mut b = Bypass::new();
        b.set_bypass(true);
        let dry = [0.5; 4];
        let wet = [0.0; 4];
        let mut out = [0.0; 4];
        b.process(&mut out, &dry, &wet);
        assert_eq!(out, dry);
        assert_eq!(b.state(), BypassState::Bypassed);
    }
}

//! Peak measurement.

/// Absolute maximum of a buffer. Returns `0.0` for an empty buffer.
///
/// The mixer calls this once per sub-block per monitored signal, so the
/// published meter value has sub-block granularity: the last sub-block of a
/// `process` call wins, it is not a windowed maximum over the whole call.
#[inline]
pub fn abs_max(buf: &[f32]) -> f32 {
    buf.iter().fold(0.0f32, |m, s| m.max(s.abs()))
}

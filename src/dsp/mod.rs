pub mod bypass;
pub mod mixer;
pub mod peak;
pub mod ramp;

pub use bypass::{Bypass, BypassState};
pub use mixer::{
    BusControls, ChannelControls, EngineDump, MixerControls, MixerEngine, Topology, SUB_BLOCK,
};
pub use ramp::GainRamp;

/// The plugin-module contract between the real-time engine and the host
/// adapter. The adapter depends on this trait, never the other way around:
/// the engine knows nothing about parameter objects, port layouts, or
/// plugin formats.
///
/// Call order per audio block: `update_settings` once, before any sample is
/// touched, then `process` exactly once. `init` and `update_sample_rate`
/// run outside the real-time path.
pub trait MixModule {
    /// Host-facing control snapshot, read once per block.
    type Controls;
    /// Diagnostic state snapshot.
    type Dump: serde::Serialize;

    /// Allocate all working state. Returns false on allocation failure, in
    /// which case the module stays in a degraded state where `process` is a
    /// no-op.
    fn init(&mut self) -> bool;

    fn update_sample_rate(&mut self, sample_rate: f32);

    /// Resolve control values into per-block gain targets.
    fn update_settings(&mut self, controls: &Self::Controls);

    /// Mix `samples` frames. Bus buffers are in place (input on entry,
    /// output on exit); `None` entries mark unavailable host buffers.
    fn process(
        &mut self,
        bus_io: &mut [Option<&mut [f32]>],
        mix_in: &[Option<&[f32]>],
        samples: usize,
    );

    /// Diagnostic snapshot; may allocate.
    fn dump(&self) -> Self::Dump;
}

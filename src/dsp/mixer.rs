//! The mixing engine.
//!
//! `MixerEngine` sums N mix input channels into one (mono) or two (stereo)
//! primary buses. Control values are resolved once per block into
//! previous/current gain pairs ([`update_settings`](MixerEngine::update_settings)),
//! then [`process`](MixerEngine::process) mixes sample-accurately, ramping
//! every gain across the whole call so parameter changes never click.
//!
//! Processing is tiled into sub-blocks of at most [`SUB_BLOCK`] frames purely
//! to bound working-buffer memory; ramp progress is tracked against the full
//! requested frame count, not per tile.
//!
//! Primary bus buffers are used in place: they hold the host's input on
//! entry and receive the mixed output on exit. The engine stages every input
//! through pre-allocated buffers before writing, so input and output may
//! share memory.

use serde::Serialize;

use crate::dsp::bypass::Bypass;
use crate::dsp::peak::abs_max;
use crate::dsp::ramp::{fill_zero, ramp_add, ramp_copy, GainRamp};
use crate::dsp::MixModule;

/// Maximum sub-block size in frames. Working buffers are sized to this once
/// at initialization; published meter values have this granularity.
pub const SUB_BLOCK: usize = 4096;

/// Primary bus topology. Fixed per engine instance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Topology {
    Mono,
    Stereo,
}

impl Topology {
    /// Number of primary buses: 1 for mono, 2 for stereo.
    #[inline]
    pub fn buses(self) -> usize {
        match self {
            Topology::Mono => 1,
            Topology::Stereo => 2,
        }
    }

    /// Mix channels per strip: stereo mixers pair channels L/R.
    #[inline]
    pub fn pair_width(self) -> usize {
        self.buses()
    }
}

// =============================================================================
// Control snapshot
// =============================================================================
//
// Filled by the host adapter once per block from scalar parameter reads.
// All values arrive pre-clamped by the parameter layer; the engine performs
// no range checks of its own.

/// Bus-level controls, shared by both sides of a stereo pair of buses.
#[derive(Clone, Copy, Debug)]
pub struct BusControls {
    /// Dry signal amount, linear amplitude.
    pub dry: f32,
    /// Wet signal amount, linear amplitude.
    pub wet: f32,
    /// Output gain, multiplied into both dry and wet.
    pub out_gain: f32,
    /// Output balance in [-1, 1]. Stereo only.
    pub balance: f32,
    /// Fold the stereo output to mono. Stereo only.
    pub mono_out: bool,
    /// Full-plugin bypass switch.
    pub bypass: bool,
}

impl Default for BusControls {
    fn default() -> Self {
        Self {
            dry: 1.0,
            wet: 1.0,
            out_gain: 1.0,
            balance: 0.0,
            mono_out: false,
            bypass: false,
        }
    }
}

/// Per-mix-channel controls. In a stereo pair the L and R channel carry the
/// same solo/mute/phase/balance/gain values (the adapter binds the shared
/// controls to both); pan is individual.
#[derive(Clone, Copy, Debug)]
pub struct ChannelControls {
    /// Send gain, linear amplitude.
    pub gain: f32,
    /// Pan in [-1, 1]. Stereo only.
    pub pan: f32,
    /// Pair balance in [-1, 1]. Stereo only.
    pub balance: f32,
    pub solo: bool,
    pub mute: bool,
    /// Phase invert: flips the sign of the post gain.
    pub phase: bool,
}

impl Default for ChannelControls {
    fn default() -> Self {
        Self {
            gain: 1.0,
            pan: 0.0,
            balance: 0.0,
            solo: false,
            mute: false,
            phase: false,
        }
    }
}

/// Full control snapshot for one block.
#[derive(Clone, Debug)]
pub struct MixerControls {
    pub bus: BusControls,
    pub channels: Vec<ChannelControls>,
}

impl MixerControls {
    pub fn new(mix_channels: usize) -> Self {
        Self {
            bus: BusControls::default(),
            channels: vec![ChannelControls::default(); mix_channels],
        }
    }
}

// =============================================================================
// Engine state
// =============================================================================

struct PrimaryBus {
    dry: GainRamp,
    wet: GainRamp,
    /// Cross-gain row: how much of this side's pre-cross signal feeds each
    /// output side (balance / mono fold). Stereo only.
    cross: [GainRamp; 2],
    bypass: Bypass,
    /// Input peak, last sub-block.
    in_level: f32,
    /// Output peak, last sub-block.
    out_level: f32,
}

impl PrimaryBus {
    fn new(side: usize) -> Self {
        // Identity cross routing until the first settings update.
        let cross = if side == 0 {
            [GainRamp::new(1.0), GainRamp::new(0.0)]
        } else {
            [GainRamp::new(0.0), GainRamp::new(1.0)]
        };
        Self {
            dry: GainRamp::new(1.0),
            wet: GainRamp::new(1.0),
            cross,
            bypass: Bypass::new(),
            in_level: 0.0,
            out_level: 0.0,
        }
    }
}

struct MixChannel {
    /// Send gains into each bus side. Mono uses index 0 only.
    send: [GainRamp; 2],
    /// Signed mute/solo/phase gain: 0 when silenced, ±1 otherwise.
    post: GainRamp,
    solo: bool,
    /// Pre-post-gain peak, last sub-block.
    level: f32,
}

impl MixChannel {
    fn new() -> Self {
        Self {
            send: [GainRamp::new(0.0); 2],
            post: GainRamp::new(1.0),
            solo: false,
            level: 0.0,
        }
    }
}

/// The real-time mixing engine. All channel state and working buffers are
/// allocated once ([`MixModule::init`]); `process` neither allocates nor
/// panics.
pub struct MixerEngine {
    topology: Topology,
    buses: Vec<PrimaryBus>,
    channels: Vec<MixChannel>,

    // Working buffers, SUB_BLOCK frames each once initialized.
    dry: [Vec<f32>; 2],
    wet: [Vec<f32>; 2],
    pair: [Vec<f32>; 2],
    pre: [Vec<f32>; 2],
    scratch: Vec<f32>,

    initialized: bool,
}

impl MixerEngine {
    /// Build an engine for the given topology. `mix_channels` must be even
    /// for stereo (channels pair L/R).
    pub fn new(topology: Topology, mix_channels: usize) -> Self {
        assert!(
            topology == Topology::Mono || mix_channels % 2 == 0,
            "stereo mix channels must pair L/R"
        );
        Self {
            topology,
            buses: (0..topology.buses()).map(PrimaryBus::new).collect(),
            channels: (0..mix_channels).map(|_| MixChannel::new()).collect(),
            dry: [Vec::new(), Vec::new()],
            wet: [Vec::new(), Vec::new()],
            pair: [Vec::new(), Vec::new()],
            pre: [Vec::new(), Vec::new()],
            scratch: Vec::new(),
            initialized: false,
        }
    }

    #[inline]
    pub fn topology(&self) -> Topology {
        self.topology
    }

    #[inline]
    pub fn mix_channels(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Pre-post-gain peak of a mix channel, last sub-block.
    #[inline]
    pub fn channel_level(&self, index: usize) -> f32 {
        self.channels[index].level
    }

    /// Input peak of a bus side, last sub-block.
    #[inline]
    pub fn bus_in_level(&self, side: usize) -> f32 {
        self.buses[side].in_level
    }

    /// Output peak of a bus side, last sub-block.
    #[inline]
    pub fn bus_out_level(&self, side: usize) -> f32 {
        self.buses[side].out_level
    }

    fn alloc_buffer(buf: &mut Vec<f32>) -> bool {
        if buf.try_reserve_exact(SUB_BLOCK).is_err() {
            return false;
        }
        buf.resize(SUB_BLOCK, 0.0);
        true
    }

    /// One sub-block of mixing. `offset` and `samples` track ramp progress
    /// across the whole `process` call; `count <= SUB_BLOCK`.
    fn process_sub_block(
        &mut self,
        bus_io: &mut [Option<&mut [f32]>],
        mix_in: &[Option<&[f32]>],
        offset: usize,
        count: usize,
        samples: usize,
    ) {
        let stereo = self.topology == Topology::Stereo;
        let sides = self.topology.buses();
        let width = self.topology.pair_width();
        let Self {
            buses,
            channels,
            dry,
            wet,
            pair,
            pre,
            scratch,
            ..
        } = self;

        // Stage bus inputs before anything is written: bus buffers may be
        // the very memory the host wants the output in.
        for s in 0..sides {
            if let Some(buf) = &bus_io[s] {
                dry[s][..count].copy_from_slice(&buf[offset..offset + count]);
            }
            fill_zero(&mut wet[s][..count]);
        }

        // Mix channels, one strip (pair) at a time. Each channel is staged
        // through `scratch` with its send-gain ramp applied so its own meter
        // can be taken pre-post-gain, then accumulated into the strip
        // buffer. The strip buffer then passes through the shared post-gain
        // ramp (mute/solo/phase) into the wet accumulators.
        for (strip, inputs) in channels.chunks_mut(width).zip(mix_in.chunks(width)) {
            for s in 0..sides {
                fill_zero(&mut pair[s][..count]);
            }
            for (ch, input) in strip.iter_mut().zip(inputs) {
                let Some(input) = *input else {
                    ch.level = 0.0;
                    continue;
                };
                let src = &input[offset..offset + count];
                let mut level = 0.0f32;
                for s in 0..sides {
                    let send = ch.send[s];
                    ramp_copy(
                        &mut scratch[..count],
                        src,
                        send.value_at(offset, samples),
                        send.step(samples),
                    );
                    level = level.max(abs_max(&scratch[..count]));
                    for (d, x) in pair[s][..count].iter_mut().zip(&scratch[..count]) {
                        *d += x;
                    }
                }
                ch.level = level;
            }

            // Solo/mute/phase are strip-wide; the lead channel's ramp holds
            // the resolved value for the whole pair.
            let post = strip[0].post;
            for s in 0..sides {
                ramp_add(
                    &mut wet[s][..count],
                    &pair[s][..count],
                    post.value_at(offset, samples),
                    post.step(samples),
                );
            }
        }

        // Pre-cross signal per side: wet accumulator through the wet-gain
        // ramp plus staged input through the dry-gain ramp. A side without a
        // host buffer has no dry path but its wet half still exists (it
        // feeds the other side's cross term).
        for s in 0..sides {
            let wet_gain = buses[s].wet;
            ramp_copy(
                &mut pre[s][..count],
                &wet[s][..count],
                wet_gain.value_at(offset, samples),
                wet_gain.step(samples),
            );
            if bus_io[s].is_some() {
                let dry_gain = buses[s].dry;
                ramp_add(
                    &mut pre[s][..count],
                    &dry[s][..count],
                    dry_gain.value_at(offset, samples),
                    dry_gain.step(samples),
                );
            }
        }

        // Balance / mono-fold cross matrix (stereo only). The strip buffers
        // are free again at this point and serve as the cross output.
        if stereo {
            for d in 0..2 {
                fill_zero(&mut pair[d][..count]);
                for s in 0..2 {
                    let g = buses[s].cross[d];
                    ramp_add(
                        &mut pair[d][..count],
                        &pre[s][..count],
                        g.value_at(offset, samples),
                        g.step(samples),
                    );
                }
            }
        }

        // Bypass crossfade, output write, meters. A side without a host
        // buffer is skipped: nothing written, meters untouched.
        for s in 0..sides {
            let Some(buf) = &mut bus_io[s] else {
                continue;
            };
            let out = &mut buf[offset..offset + count];
            let wet_out = if stereo {
                &pair[s][..count]
            } else {
                &pre[s][..count]
            };
            buses[s].bypass.process(out, &dry[s][..count], wet_out);
            buses[s].in_level = abs_max(&dry[s][..count]);
            buses[s].out_level = abs_max(out);
        }
    }

    /// Advance every previous gain to its current value. Runs exactly once
    /// per `process` call, after the last sample.
    fn settle(&mut self) {
        for bus in &mut self.buses {
            bus.dry.settle();
            bus.wet.settle();
            bus.cross[0].settle();
            bus.cross[1].settle();
        }
        for ch in &mut self.channels {
            ch.send[0].settle();
            ch.send[1].settle();
            ch.post.settle();
        }
    }
}

impl MixModule for MixerEngine {
    type Controls = MixerControls;
    type Dump = EngineDump;

    /// Allocate the sub-block working buffers. On failure the engine stays
    /// uninitialized and every `process` call is a no-op.
    fn init(&mut self) -> bool {
        let Self {
            dry,
            wet,
            pair,
            pre,
            scratch,
            ..
        } = self;
        let ok = dry
            .iter_mut()
            .chain(wet.iter_mut())
            .chain(pair.iter_mut())
            .chain(pre.iter_mut())
            .chain(std::iter::once(scratch))
            .all(Self::alloc_buffer);
        self.initialized = ok;
        ok
    }

    fn update_sample_rate(&mut self, sample_rate: f32) {
        for bus in &mut self.buses {
            bus.bypass.init(sample_rate);
        }
    }

    /// The parameter resolver. Runs once per `process` invocation, before
    /// any sample is touched. Retargets every gain ramp; previous values are
    /// preserved for ramping and advance only when the block settles.
    fn update_settings(&mut self, controls: &MixerControls) {
        debug_assert_eq!(controls.channels.len(), self.channels.len());

        // Bus dry/wet fold in the output gain; bypass switch goes to the
        // crossfaders.
        let bus_ctl = controls.bus;
        for bus in &mut self.buses {
            bus.dry.retarget(bus_ctl.dry * bus_ctl.out_gain);
            bus.wet.retarget(bus_ctl.wet * bus_ctl.out_gain);
            bus.bypass.set_bypass(bus_ctl.bypass);
        }

        // Output balance / mono fold. pan_mix 1.0 routes each side to
        // itself; 0.5 folds both sides equally into both outputs.
        if self.topology == Topology::Stereo {
            let bal = [1.0 - bus_ctl.balance, 1.0 + bus_ctl.balance];
            let pan_mix = if bus_ctl.mono_out { 0.5 } else { 1.0 };
            self.buses[0].cross[0].retarget(pan_mix * bal[0]);
            self.buses[0].cross[1].retarget((1.0 - pan_mix) * bal[1]);
            self.buses[1].cross[0].retarget((1.0 - pan_mix) * bal[0]);
            self.buses[1].cross[1].retarget(pan_mix * bal[1]);
        }

        // Solo is a global override: any active solo forces every
        // non-soloed channel silent regardless of its own mute.
        let has_solo = controls.channels.iter().any(|c| c.solo);

        for (ch, ctl) in self.channels.iter_mut().zip(&controls.channels) {
            ch.solo = ctl.solo;

            let muted = ctl.mute || (has_solo && !ctl.solo);
            let mut post = if muted { 0.0 } else { 1.0 };
            if ctl.phase {
                post = -post;
            }
            ch.post.retarget(post);

            match self.topology {
                Topology::Mono => ch.send[0].retarget(ctl.gain),
                Topology::Stereo => {
                    // Equal-split pan plus pair balance; balance always
                    // scales by destination side.
                    ch.send[0]
                        .retarget(ctl.gain * 0.5 * (1.0 - ctl.pan) * (1.0 - ctl.balance));
                    ch.send[1]
                        .retarget(ctl.gain * 0.5 * (1.0 + ctl.pan) * (1.0 + ctl.balance));
                }
            }
        }
    }

    /// Mix `samples` frames. `bus_io` holds one in-place buffer per bus side
    /// (`None` skips that side for the block); `mix_in` holds one read-only
    /// input per mix channel (`None` contributes silence).
    fn process(
        &mut self,
        bus_io: &mut [Option<&mut [f32]>],
        mix_in: &[Option<&[f32]>],
        samples: usize,
    ) {
        if !self.initialized || samples == 0 {
            return;
        }
        debug_assert_eq!(bus_io.len(), self.buses.len());
        debug_assert_eq!(mix_in.len(), self.channels.len());

        let mut offset = 0;
        while offset < samples {
            let count = (samples - offset).min(SUB_BLOCK);
            self.process_sub_block(bus_io, mix_in, offset, count, samples);
            offset += count;
        }

        self.settle();
    }

    /// Diagnostic snapshot of all gain/ramp/solo/bypass state. Allocates;
    /// never call from the audio thread outside debug sessions.
    fn dump(&self) -> EngineDump {
        EngineDump {
            topology: self.topology,
            initialized: self.initialized,
            buses: self
                .buses
                .iter()
                .map(|b| BusDump {
                    dry: b.dry,
                    wet: b.wet,
                    cross: b.cross,
                    bypass: b.bypass,
                    in_level: b.in_level,
                    out_level: b.out_level,
                })
                .collect(),
            channels: self
                .channels
                .iter()
                .map(|c| ChannelDump {
                    send: c.send,
                    post: c.post,
                    solo: c.solo,
                    level: c.level,
                })
                .collect(),
        }
    }
}

// =============================================================================
// State dump
// =============================================================================

#[derive(Clone, Copy, Debug, Serialize)]
pub struct BusDump {
    pub dry: GainRamp,
    pub wet: GainRamp,
    pub cross: [GainRamp; 2],
    pub bypass: Bypass,
    pub in_level: f32,
    pub out_level: f32,
}

#[derive(Clone, Copy, Debug, Serialize)]
pub struct ChannelDump {
    pub send: [GainRamp; 2],
    pub post: GainRamp,
    pub solo: bool,
    pub level: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct EngineDump {
    pub topology: Topology,
    pub initialized: bool,
    pub buses: Vec<BusDump>,
    pub channels: Vec<ChannelDump>,
}

// =============================================================================
// Tests
// =============================================================================

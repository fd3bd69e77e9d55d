mod debug;
pub mod dsp;
pub mod meters;

use crate::dsp::{
    BusControls, ChannelControls, MixModule, MixerControls, MixerEngine, Topology,
};
use crate::meters::Meters;
use nih_plug::prelude::*;
use std::sync::Arc;

/// Stereo channel strips exposed by the shipped plugin variant.
const NUM_STRIPS: usize = 8;
/// Mix channels fed to the engine: strips are L/R pairs.
const NUM_MIX_CHANNELS: usize = NUM_STRIPS * 2;

const DEFAULT_SAMPLE_RATE: f32 = 44100.0;

/// Channel gain ceiling, +12 dB (matching the strip gain range).
const GAIN_MAX_DB: f32 = 12.0;

// -----------------------------------------------------------------------------
// PARAMETERS
// -----------------------------------------------------------------------------

#[derive(Params)]
pub struct MixBoardParams {
    #[id = "bypass"]
    pub bypass: BoolParam,

    #[id = "mono"]
    pub mono_out: BoolParam,

    #[id = "dry"]
    pub dry: FloatParam,

    #[id = "wet"]
    pub wet: FloatParam,

    #[id = "out_gain"]
    pub out_gain: FloatParam,

    #[id = "balance"]
    pub balance: FloatParam,

    #[nested(array, group = "Strip")]
    pub strips: [StripParams; NUM_STRIPS],
}

/// One stereo channel strip. Solo/mute/phase, balance and gain are shared by
/// the L and R mix channel of the pair; pan is individual.
#[derive(Params)]
pub struct StripParams {
    #[id = "solo"]
    pub solo: BoolParam,

    #[id = "mute"]
    pub mute: BoolParam,

    #[id = "phase"]
    pub phase: BoolParam,

    #[id = "pan_l"]
    pub pan_left: FloatParam,

    #[id = "pan_r"]
    pub pan_right: FloatParam,

    #[id = "balance"]
    pub balance: FloatParam,

    #[id = "gain"]
    pub gain: FloatParam,
}

fn gain_param(name: String, default: f32) -> FloatParam {
    FloatParam::new(
        name,
        default,
        FloatRange::Skewed {
            min: 0.0,
            max: util::db_to_gain(GAIN_MAX_DB),
            factor: FloatRange::gain_skew_factor(util::MINUS_INFINITY_DB, GAIN_MAX_DB),
        },
    )
    .with_unit(" dB")
    .with_value_to_string(formatters::v2s_f32_gain_to_db(2))
    .with_string_to_value(formatters::s2v_f32_gain_to_db())
}

/// Pan/balance control: -100 (left) .. 100 (right), resolved to [-1, 1] in
/// the control snapshot.
fn pan_param(name: String) -> FloatParam {
    FloatParam::new(
        name,
        0.0,
        FloatRange::Linear {
            min: -100.0,
            max: 100.0,
        },
    )
    .with_value_to_string(Arc::new(|v| format!("{:.0}", v)))
}

impl StripParams {
    fn new(strip: usize) -> Self {
        Self {
            solo: BoolParam::new(format!("Strip {strip} Solo"), false),
            mute: BoolParam::new(format!("Strip {strip} Mute"), false),
            phase: BoolParam::new(format!("Strip {strip} Phase"), false),
            pan_left: pan_param(format!("Strip {strip} Pan L")),
            pan_right: pan_param(format!("Strip {strip} Pan R")),
            balance: pan_param(format!("Strip {strip} Balance")),
            gain: gain_param(format!("Strip {strip} Gain"), 1.0),
        }
    }
}

impl Default for MixBoardParams {
    fn default() -> Self {
        Self {
            bypass: BoolParam::new("Bypass", false).is_bypass(),
            mono_out: BoolParam::new("Mono Output", false),
            dry: gain_param("Dry".into(), 0.0),
            wet: gain_param("Wet".into(), 1.0),
            out_gain: gain_param("Output Gain".into(), 1.0),
            balance: pan_param("Output Balance".into()),
            strips: std::array::from_fn(|i| StripParams::new(i + 1)),
        }
    }
}

// -----------------------------------------------------------------------------
// PLUGIN
// -----------------------------------------------------------------------------

pub struct MixBoard {
    params: Arc<MixBoardParams>,
    engine: MixerEngine,
    /// Control snapshot reused every block; filled from one `value()` read
    /// per parameter before any sample is touched.
    controls: MixerControls,
    meters: Arc<Meters>,
    sample_rate: f32,
}

impl Default for MixBoard {
    fn default() -> Self {
        Self {
            params: Arc::new(MixBoardParams::default()),
            engine: MixerEngine::new(Topology::Stereo, NUM_MIX_CHANNELS),
            controls: MixerControls::new(NUM_MIX_CHANNELS),
            meters: Arc::new(Meters::new(NUM_MIX_CHANNELS, Topology::Stereo.buses())),
            sample_rate: DEFAULT_SAMPLE_RATE,
        }
    }
}

impl Plugin for MixBoard {
    const NAME: &'static str = "MixBoard";
    const VENDOR: &'static str = "Andrzej Marczewski";
    const URL: &'static str = "";
    const EMAIL: &'static str = "";
    const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    const AUDIO_IO_LAYOUTS: &'static [AudioIOLayout] = &[AudioIOLayout {
        main_input_channels: NonZeroU32::new(2),
        main_output_channels: NonZeroU32::new(2),
        aux_input_ports: &[new_nonzero_u32(2); NUM_STRIPS],
        ..AudioIOLayout::const_default()
    }];

    const MIDI_INPUT: MidiConfig = MidiConfig::None;

    type SysExMessage = ();
    type BackgroundTask = ();

    fn params(&self) -> Arc<dyn Params> {
        self.params.clone()
    }

    fn initialize(
        &mut self,
        _audio_io_layout: &AudioIOLayout,
        buffer_config: &BufferConfig,
        _context: &mut impl InitContext<Self>,
    ) -> bool {
        #[cfg(feature = "debug")]
        crate::debug::logger::init_logger();

        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.sample_rate = buffer_config.sample_rate;
            self.engine.update_sample_rate(self.sample_rate);

            // Working buffers; on failure the engine degrades to a no-op
            // and we report the failure to the host.
            let ok = self.engine.init();
            if ok {
                log::info!("initialized at {} Hz", self.sample_rate);
                crate::debug::log_engine_dump("engine state", &self.engine.dump());
            } else {
                log::error!("working buffer allocation failed, engine runs as a no-op");
            }

            ok
        }))
        .unwrap_or(false)
    }

    fn process(
        &mut self,
        buffer: &mut Buffer,
        aux: &mut AuxiliaryBuffers,
        _context: &mut impl ProcessContext<Self>,
    ) -> ProcessStatus {
        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            self.process_internal(buffer, aux)
        }))
        .unwrap_or(ProcessStatus::Normal)
    }

    fn reset(&mut self) {
        self.meters.reset();
        log::logger().flush();
    }
}

impl MixBoard {
    fn process_internal(&mut self, buffer: &mut Buffer, aux: &mut AuxiliaryBuffers) -> ProcessStatus {
        let samples = buffer.samples();

        // Read every control exactly once, at the start of the block. A
        // concurrent automation write lands one block late at worst, never
        // torn.
        let p = self.params.as_ref();
        self.controls.bus = BusControls {
            dry: p.dry.value(),
            wet: p.wet.value(),
            out_gain: p.out_gain.value(),
            balance: p.balance.value() * 0.01,
            mono_out: p.mono_out.value(),
            bypass: p.bypass.value(),
        };
        for (i, strip) in p.strips.iter().enumerate() {
            let shared = ChannelControls {
                gain: strip.gain.value(),
                pan: 0.0,
                balance: strip.balance.value() * 0.01,
                solo: strip.solo.value(),
                mute: strip.mute.value(),
                phase: strip.phase.value(),
            };
            self.controls.channels[i * 2] = ChannelControls {
                pan: strip.pan_left.value() * 0.01,
                ..shared
            };
            self.controls.channels[i * 2 + 1] = ChannelControls {
                pan: strip.pan_right.value() * 0.01,
                ..shared
            };
        }
        self.engine.update_settings(&self.controls);

        // Primary bus: the main buffer, processed in place.
        let main = buffer.as_slice();
        let mut bus_io: [Option<&mut [f32]>; 2] = match main.split_first_mut() {
            Some((left, rest)) => {
                let right = rest.first_mut().map(|r| &mut r[..]);
                [Some(&mut left[..]), right]
            }
            None => [None, None],
        };

        // Mix channels: the auxiliary stereo inputs, read-only.
        let mut mix_in: [Option<&[f32]>; NUM_MIX_CHANNELS] = [None; NUM_MIX_CHANNELS];
        for (i, aux_buffer) in aux.inputs.iter_mut().take(NUM_STRIPS).enumerate() {
            let mut channels = aux_buffer.as_slice().iter();
            mix_in[i * 2] = channels.next().map(|c| &c[..]);
            mix_in[i * 2 + 1] = channels.next().map(|c| &c[..]);
        }

        self.engine.process(&mut bus_io, &mix_in, samples);

        // Publish the block's peaks (last sub-block values).
        for i in 0..NUM_MIX_CHANNELS {
            self.meters.set_channel_peak(i, self.engine.channel_level(i));
        }
        for side in 0..self.engine.topology().buses() {
            self.meters.set_bus_in_peak(side, self.engine.bus_in_level(side));
            self.meters.set_bus_out_peak(side, self.engine.bus_out_level(side));
        }

        ProcessStatus::Normal
    }
}

impl ClapPlugin for MixBoard {
    const CLAP_ID: &'static str = "com.andrzej.mixboard";
    const CLAP_DESCRIPTION: Option<&'static str> = Some("N-channel summing mixer");
    const CLAP_MANUAL_URL: Option<&'static str> = None;
    const CLAP_SUPPORT_URL: Option<&'static str> = None;
    const CLAP_FEATURES: &'static [ClapFeature] = &[
        ClapFeature::AudioEffect,
        ClapFeature::Mixing,
        ClapFeature::Stereo,
    ];
}

impl Vst3Plugin for MixBoard {
    const VST3_CLASS_ID: [u8; 16] = *b"MixBoardStereo16";
    const VST3_SUBCATEGORIES: &'static [Vst3SubCategory] =
        &[Vst3SubCategory::Fx, Vst3SubCategory::Tools];
}

nih_export_clap!(MixBoard);
nih_export_vst3!(MixBoard);

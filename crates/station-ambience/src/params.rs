//! Parameter table: environment in, target values for every graph parameter out.

use crate::environment::{Environment, Scene};

/// Cutoff that leaves a highpass effectively open.
pub const HIGHPASS_OFF: f32 = 0.0;
/// Cutoff that leaves a lowpass effectively open.
pub const LOWPASS_OFF: f32 = 50_000.0;

/// The program is band-limited the same way in every scene; only its level
/// changes outside.
pub const PROGRAM_BAND: Band = Band::new(360.0, 2500.0);

/// Program level outside, whatever the slider says.
pub const OUTSIDE_PROGRAM_CAP: f32 = 0.15;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub highpass_hz: f32,
    pub lowpass_hz: f32,
}

impl Band {
    pub const OPEN: Band = Band {
        highpass_hz: HIGHPASS_OFF,
        lowpass_hz: LOWPASS_OFF,
    };

    const fn new(highpass_hz: f32, lowpass_hz: f32) -> Self {
        Self {
            highpass_hz,
            lowpass_hz,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MixParams {
    pub program: Band,
    pub rain: Band,
    pub rain_gain: f32,
    pub crickets: Band,
    pub crickets_gain: f32,
    pub doves_gain: f32,
    pub loons_gain: f32,
    /// Shared panner for rain and crickets; positive is right.
    pub pan: f32,
}

const INSIDE_WINDOW_SHUT: MixParams = MixParams {
    program: PROGRAM_BAND,
    rain: Band::new(300.0, 2500.0),
    rain_gain: 0.3,
    crickets: Band::OPEN,
    crickets_gain: 0.0,
    doves_gain: 0.0,
    loons_gain: 0.0,
    pan: 0.0,
};

const INSIDE_WINDOW_OPEN: MixParams = MixParams {
    program: PROGRAM_BAND,
    rain: Band::new(200.0, 5000.0),
    rain_gain: 0.2,
    crickets: Band::new(100.0, 2000.0),
    crickets_gain: 0.3,
    doves_gain: 0.0,
    loons_gain: 0.0,
    pan: 0.4,
};

const OUTSIDE: MixParams = MixParams {
    program: PROGRAM_BAND,
    rain: Band::OPEN,
    rain_gain: 0.6,
    crickets: Band::OPEN,
    crickets_gain: 0.3,
    doves_gain: 0.7,
    loons_gain: 0.3,
    pan: 0.0,
};

pub fn table(scene: Scene) -> &'static MixParams {
    match scene {
        Scene::InsideWindowShut => &INSIDE_WINDOW_SHUT,
        Scene::InsideWindowOpen => &INSIDE_WINDOW_OPEN,
        Scene::Outside => &OUTSIDE,
    }
}

/// Table row for the scene with the rain gate applied.
pub fn compute(env: &Environment) -> MixParams {
    let mut params = *table(env.scene());
    if !env.raining {
        params.rain_gain = 0.0;
    }
    params
}

/// `(program, ambient master)` gains for a slider position.
pub fn volume_levels(env: &Environment, master: f32) -> (f32, f32) {
    let master = if master.is_nan() { 0.0 } else { master.clamp(0.0, 1.0) };
    let program = if env.is_outside() {
        master.min(OUTSIDE_PROGRAM_CAP)
    } else {
        master
    };
    (program, master)
}

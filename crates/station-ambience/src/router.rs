use std::time::Duration;

use tracing::{debug, info};

use crate::environment::{Environment, Location};
use crate::graph::{Node, SignalGraph, Source};
use crate::params::{self, MixParams};

pub const DEFAULT_VOLUME: f32 = 0.5;

/// Owns the signal graph and maps listener toggles onto it.
pub struct AudioRouter {
    graph: SignalGraph,
    env: Environment,
    volume: f32,
}

impl Default for AudioRouter {
    fn default() -> Self {
        Self::new(Environment::default(), DEFAULT_VOLUME)
    }
}

impl AudioRouter {
    /// Build the graph and snap it to the starting scene without a glide.
    pub fn new(env: Environment, volume: f32) -> Self {
        let mut router = Self {
            graph: SignalGraph::new(),
            env,
            volume: clamp_volume(volume),
        };
        router.retarget();
        router.graph.settle();
        info!(?env, volume = router.volume, "Audio router initialised");
        router
    }

    pub fn environment(&self) -> Environment {
        self.env
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn graph(&self) -> &SignalGraph {
        &self.graph
    }

    /// Move to a new environment.  Returns whether any parameter target
    /// changed; reapplying the current state changes nothing.
    pub fn apply_state(&mut self, location: Location, window_open: bool, raining: bool) -> bool {
        self.env = Environment::new(location, window_open, raining);
        let changed = self.retarget();
        if changed {
            debug!(env = ?self.env, scene = ?self.env.scene(), "Ambience retargeted");
        }
        changed
    }

    pub fn toggle_outside(&mut self, outside: bool) -> bool {
        let location = if outside {
            Location::Outside
        } else {
            Location::Inside
        };
        self.apply_state(location, self.env.window_open, self.env.raining)
    }

    pub fn toggle_window(&mut self, open: bool) -> bool {
        self.apply_state(self.env.location, open, self.env.raining)
    }

    pub fn toggle_rain(&mut self, raining: bool) -> bool {
        self.apply_state(self.env.location, self.env.window_open, raining)
    }

    /// Master slider in [0, 1]; out-of-range input is clamped.
    pub fn set_volume(&mut self, volume: f32) -> bool {
        self.volume = clamp_volume(volume);
        self.retarget()
    }

    /// Parameter smoothing step, called from the host's render clock.
    pub fn advance(&mut self, dt: Duration) {
        self.graph.advance(dt);
    }

    fn retarget(&mut self) -> bool {
        let mix = params::compute(&self.env);
        let (program_gain, ambient_gain) = params::volume_levels(&self.env, self.volume);

        let mut changed = false;
        for (node, value) in targets(&mix, program_gain, ambient_gain) {
            changed |= self.graph.set_target(node, value).unwrap_or(false);
        }
        changed
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        0.0
    } else {
        volume.clamp(0.0, 1.0)
    }
}

fn targets(mix: &MixParams, program_gain: f32, ambient_gain: f32) -> [(Node, f32); 13] {
    use Source::*;
    [
        (Node::Highpass(Program), mix.program.highpass_hz),
        (Node::Lowpass(Program), mix.program.lowpass_hz),
        (Node::Gain(Program), program_gain),
        (Node::Gain(Rain), mix.rain_gain),
        (Node::Highpass(Rain), mix.rain.highpass_hz),
        (Node::Lowpass(Rain), mix.rain.lowpass_hz),
        (Node::Gain(Crickets), mix.crickets_gain),
        (Node::Highpass(Crickets), mix.crickets.highpass_hz),
        (Node::Lowpass(Crickets), mix.crickets.lowpass_hz),
        (Node::Pan, mix.pan),
        (Node::Gain(Doves), mix.doves_gain),
        (Node::Gain(Loons), mix.loons_gain),
        (Node::AmbientMaster, ambient_gain),
    ]
}

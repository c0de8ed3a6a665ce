//! Time-of-day ambience: which nature loops play, and when a bird calls.

use std::time::Duration;

use chrono::Timelike;
use rand::Rng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NatureLoops {
    pub doves: bool,
    pub loons: bool,
    pub crickets: bool,
}

/// Loops for a local hour (0–23).
pub fn loops_for_hour(hour: u32) -> NatureLoops {
    match hour {
        0..=5 => NatureLoops {
            doves: false,
            loons: true,
            crickets: true,
        },
        6..=17 => NatureLoops {
            doves: true,
            loons: false,
            crickets: false,
        },
        _ => NatureLoops {
            doves: true,
            loons: true,
            crickets: true,
        },
    }
}

pub fn loops_now() -> NatureLoops {
    loops_for_hour(chrono::Local::now().hour())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BirdCall {
    Sparrow,
    Robin,
    Finch,
}

impl BirdCall {
    pub const ALL: [BirdCall; 3] = [BirdCall::Sparrow, BirdCall::Robin, BirdCall::Finch];

    pub fn file_name(self) -> &'static str {
        match self {
            BirdCall::Sparrow => "sparrow.mp3",
            BirdCall::Robin => "robin.mp3",
            BirdCall::Finch => "finch.mp3",
        }
    }

    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::ALL[rng.gen_range(0..Self::ALL.len())]
    }
}

/// Calls per minute.
pub fn call_rate(hour: u32, raining: bool) -> f64 {
    let base = match hour {
        5..=8 => 0.5,
        9..=17 => 0.2,
        _ => 0.05,
    };
    if raining {
        base * 0.4
    } else {
        base
    }
}

/// Exponentially distributed wait until the next call.
pub fn next_call_in<R: Rng + ?Sized>(hour: u32, raining: bool, rng: &mut R) -> Duration {
    let per_sec = call_rate(hour, raining) / 60.0;
    // gen::<f64>() is in [0, 1), so 1 - u is never zero
    let u: f64 = rng.gen();
    Duration::from_secs_f64(-(1.0 - u).ln() / per_sec)
}

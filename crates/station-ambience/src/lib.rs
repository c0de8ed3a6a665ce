//! Client-side audio router: mixes the station program with ambient nature
//! sources according to where the listener is standing.

pub mod environment;
pub mod graph;
pub mod nature;
pub mod params;
pub mod router;

pub use environment::{Environment, Location, Scene};
pub use graph::{Node, SignalGraph, Source};
pub use router::AudioRouter;

//! Fixed signal graph.
//!
//! ```text
//!   program  ─ hp ─ lp ─ gain ───────────────────────────┐
//!   rain     ─ gain ─ hp ─ lp ─┐                         │
//!   crickets ─ gain ─ hp ─ lp ─┴─ pan ─┐                 ├─ destination
//!   doves    ─ gain ───────────────────┼─ ambient master ┘
//!   loons    ─ gain ───────────────────┘
//! ```
//!
//! Built once.  Scene changes only move parameter targets; values glide
//! toward them when the host calls [`SignalGraph::advance`].

use std::collections::HashMap;
use std::time::Duration;

use thiserror::Error;

/// Smoothing time constant for every parameter.
pub const SMOOTHING_TAU: Duration = Duration::from_millis(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    Program,
    Rain,
    Crickets,
    Doves,
    Loons,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Node {
    Input(Source),
    Highpass(Source),
    Lowpass(Source),
    Gain(Source),
    Pan,
    AmbientMaster,
    Destination,
}

impl Node {
    /// Resting value of the node's parameter, or None for nodes without one.
    fn default_value(self) -> Option<f32> {
        match self {
            Node::Input(_) | Node::Destination => None,
            Node::Highpass(_) => Some(crate::params::HIGHPASS_OFF),
            Node::Lowpass(_) => Some(crate::params::LOWPASS_OFF),
            Node::Gain(_) | Node::AmbientMaster => Some(1.0),
            Node::Pan => Some(0.0),
        }
    }
}

use Node::*;
use Source::*;

pub const TOPOLOGY: &[(Node, Node)] = &[
    (Input(Program), Highpass(Program)),
    (Highpass(Program), Lowpass(Program)),
    (Lowpass(Program), Gain(Program)),
    (Gain(Program), Destination),
    (Input(Rain), Gain(Rain)),
    (Gain(Rain), Highpass(Rain)),
    (Highpass(Rain), Lowpass(Rain)),
    (Lowpass(Rain), Pan),
    (Input(Crickets), Gain(Crickets)),
    (Gain(Crickets), Highpass(Crickets)),
    (Highpass(Crickets), Lowpass(Crickets)),
    (Lowpass(Crickets), Pan),
    (Pan, AmbientMaster),
    (Input(Doves), Gain(Doves)),
    (Gain(Doves), AmbientMaster),
    (Input(Loons), Gain(Loons)),
    (Gain(Loons), AmbientMaster),
    (AmbientMaster, Destination),
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0:?} has no parameter")]
    NoParameter(Node),
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Param {
    current: f32,
    target: f32,
}

pub struct SignalGraph {
    params: HashMap<Node, Param>,
}

impl Default for SignalGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SignalGraph {
    pub fn new() -> Self {
        let mut params = HashMap::new();
        for &(from, to) in TOPOLOGY {
            for node in [from, to] {
                if let Some(v) = node.default_value() {
                    params.entry(node).or_insert(Param {
                        current: v,
                        target: v,
                    });
                }
            }
        }
        Self { params }
    }

    pub fn edges(&self) -> &'static [(Node, Node)] {
        TOPOLOGY
    }

    /// Returns whether the target moved.
    pub fn set_target(&mut self, node: Node, value: f32) -> Result<bool, GraphError> {
        let param = self.params.get_mut(&node).ok_or(GraphError::NoParameter(node))?;
        if param.target == value {
            return Ok(false);
        }
        param.target = value;
        Ok(true)
    }

    pub fn value(&self, node: Node) -> Option<f32> {
        self.params.get(&node).map(|p| p.current)
    }

    pub fn target(&self, node: Node) -> Option<f32> {
        self.params.get(&node).map(|p| p.target)
    }

    /// One-pole approach of every value toward its target over `dt`.
    pub fn advance(&mut self, dt: Duration) {
        let alpha = 1.0 - (-dt.as_secs_f32() / SMOOTHING_TAU.as_secs_f32()).exp();
        for param in self.params.values_mut() {
            let delta = param.target - param.current;
            if delta.abs() <= f32::EPSILON * param.target.abs().max(1.0) {
                param.current = param.target;
            } else {
                param.current += delta * alpha;
            }
        }
    }

    /// Jump straight to the targets.
    pub fn settle(&mut self) {
        for param in self.params.values_mut() {
            param.current = param.target;
        }
    }

    pub fn is_settled(&self) -> bool {
        self.params.values().all(|p| p.current == p.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_source_reaches_destination() {
        let graph = SignalGraph::new();
        for source in [Program, Rain, Crickets, Doves, Loons] {
            let mut node = Input(source);
            let mut hops = 0;
            while node != Destination {
                node = graph
                    .edges()
                    .iter()
                    .find(|(from, _)| *from == node)
                    .map(|(_, to)| *to)
                    .unwrap();
                hops += 1;
                assert!(hops < 10);
            }
        }
    }

    #[test]
    fn test_ambient_paths_share_master() {
        assert!(TOPOLOGY.contains(&(Lowpass(Rain), Pan)));
        assert!(TOPOLOGY.contains(&(Lowpass(Crickets), Pan)));
        assert!(TOPOLOGY.contains(&(Gain(Doves), AmbientMaster)));
        assert!(!TOPOLOGY.contains(&(Gain(Program), AmbientMaster)));
    }

    #[test]
    fn test_nodes_without_parameters() {
        let mut graph = SignalGraph::new();
        assert_eq!(
            graph.set_target(Input(Rain), 1.0),
            Err(GraphError::NoParameter(Input(Rain)))
        );
        assert_eq!(graph.value(Destination), None);
        assert_eq!(graph.value(Lowpass(Program)), Some(50_000.0));
    }

    #[test]
    fn test_same_target_is_noop() {
        let mut graph = SignalGraph::new();
        assert_eq!(graph.set_target(Gain(Rain), 0.3), Ok(true));
        assert_eq!(graph.set_target(Gain(Rain), 0.3), Ok(false));
    }

    #[test]
    fn test_smoothing_glides_then_settles() {
        let mut graph = SignalGraph::new();
        graph.set_target(Gain(Doves), 0.0).unwrap();

        graph.advance(SMOOTHING_TAU);
        let after_one_tau = graph.value(Gain(Doves)).unwrap();
        assert!((after_one_tau - (-1.0f32).exp()).abs() < 1e-4);
        assert!(!graph.is_settled());

        for _ in 0..200 {
            graph.advance(Duration::from_millis(10));
        }
        assert!(graph.value(Gain(Doves)).unwrap() < 1e-6);

        graph.settle();
        assert!(graph.is_settled());
        assert_eq!(graph.value(Gain(Doves)), Some(0.0));
    }
}

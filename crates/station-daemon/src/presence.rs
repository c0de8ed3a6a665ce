//! Presence tracker: distinct listeners, deduplicated by network identity.
//!
//! A listener may hold several connections at once (tabs, devices behind one
//! NAT, reconnect races).  It is counted once, exists exactly while it has at
//! least one connection, and is reaped by the periodic sweep when it has not
//! been seen for `stale_after` even if its connections never closed cleanly.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};

/// Opaque token for one physical connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{:06x}", self.0)
    }
}

#[derive(Debug)]
struct Listener {
    /// User agent of the connection that created the entry.
    user_agent: String,
    connections: HashSet<ConnectionId>,
    last_seen: Instant,
}

/// What `remove_listener` actually did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    /// Already gone (swept, or removed twice).
    Unknown,
    /// Listener still has other connections.
    ConnectionClosed { remaining: usize },
    /// Last connection closed; listener removed.
    ListenerGone,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub listeners: usize,
    pub connections: usize,
}

#[derive(Default)]
struct Registry {
    listeners: HashMap<String, Listener>,
    /// Reverse index: connection -> owning identity.
    connections: HashMap<ConnectionId, String>,
}

pub struct PresenceTracker {
    registry: Mutex<Registry>,
    stale_after: Duration,
    next_id: AtomicU64,
}

impl PresenceTracker {
    pub fn new(stale_after: Duration) -> Self {
        Self {
            registry: Mutex::new(Registry::default()),
            stale_after,
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection for `identity`.  A second connection from a
    /// known identity refreshes it without changing the count.
    pub async fn add_listener(&self, identity: &str, user_agent: &str) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let now = Instant::now();

        let mut registry = self.registry.lock().await;
        registry.connections.insert(id, identity.to_string());

        match registry.listeners.get_mut(identity) {
            Some(listener) => {
                listener.connections.insert(id);
                listener.last_seen = now;
                debug!(
                    identity,
                    conn = %id,
                    connections = listener.connections.len(),
                    "Additional connection from known listener"
                );
            }
            None => {
                registry.listeners.insert(
                    identity.to_string(),
                    Listener {
                        user_agent: user_agent.to_string(),
                        connections: HashSet::from([id]),
                        last_seen: now,
                    },
                );
                info!(
                    identity,
                    conn = %id,
                    user_agent = %truncate(user_agent, 40),
                    listeners = registry.listeners.len(),
                    "New listener"
                );
            }
        }

        id
    }

    /// Heartbeat.  Returns false when the connection is no longer tracked.
    pub async fn touch(&self, id: ConnectionId) -> bool {
        let mut registry = self.registry.lock().await;
        let Registry {
            listeners,
            connections,
        } = &mut *registry;

        match connections.get(&id).and_then(|ip| listeners.get_mut(ip)) {
            Some(listener) => {
                listener.last_seen = Instant::now();
                true
            }
            None => false,
        }
    }

    pub async fn remove_listener(&self, id: ConnectionId) -> Removal {
        let mut registry = self.registry.lock().await;

        let Some(identity) = registry.connections.remove(&id) else {
            debug!(conn = %id, "Removal of unknown connection ignored");
            return Removal::Unknown;
        };

        let Some(listener) = registry.listeners.get_mut(&identity) else {
            return Removal::Unknown;
        };

        listener.connections.remove(&id);
        let remaining = listener.connections.len();
        if remaining > 0 {
            debug!(identity = %identity, conn = %id, remaining, "Connection closed");
            return Removal::ConnectionClosed { remaining };
        }

        registry.listeners.remove(&identity);
        info!(
            identity = %identity,
            conn = %id,
            listeners = registry.listeners.len(),
            "Listener left"
        );
        Removal::ListenerGone
    }

    /// Number of distinct listeners.
    pub async fn count(&self) -> usize {
        self.registry.lock().await.listeners.len()
    }

    /// Total tracked connections across all listeners.
    pub async fn connection_count(&self) -> usize {
        self.registry.lock().await.connections.len()
    }

    /// Reap listeners not seen for longer than `stale_after`, together with
    /// every reverse-index entry they own.
    pub async fn sweep(&self) -> SweepReport {
        let now = Instant::now();
        let mut registry = self.registry.lock().await;
        let Registry {
            listeners,
            connections,
        } = &mut *registry;

        let mut report = SweepReport::default();
        listeners.retain(|identity, listener| {
            if now.duration_since(listener.last_seen) <= self.stale_after {
                return true;
            }
            for id in &listener.connections {
                if connections.remove(id).is_some() {
                    report.connections += 1;
                }
            }
            debug!(
                identity = %identity,
                user_agent = %truncate(&listener.user_agent, 40),
                "Reaping stale listener"
            );
            report.listeners += 1;
            false
        });

        if report.listeners > 0 {
            info!(
                removed = report.listeners,
                connections = report.connections,
                listeners = listeners.len(),
                "Presence sweep reaped stale listeners"
            );
        }
        report
    }

    /// Run `sweep` every `period` for the life of the process.
    pub fn spawn_sweeper(self: Arc<Self>, period: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval.tick().await;
            info!(
                "Presence sweep every {:?}, stale after {:?}",
                period, self.stale_after
            );

            loop {
                interval.tick().await;
                self.sweep().await;
            }
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

//! Broadcast scheduler: the one authoritative playhead.
//!
//! ```text
//!   tick loop (fixed interval) ──┐
//!   admin toggle ────────────────┼──► Mutex<Playhead> ──► fan-out ──► mpsc per subscriber
//!   subscribe / unsubscribe ─────┘
//! ```
//!
//! Every mutation and every fan-out happens under the same lock, so readers
//! never see a track/progress pair from two different moments, and a new
//! subscriber's first snapshot is always queued before any later push.
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use station_proto::playlist::Playlist;
use station_proto::protocol::{RadioState, Track};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

/// Queue depth per subscriber.  A push that does not fit means the consumer
/// has stopped draining; it is dropped rather than buffered further.
pub const SUBSCRIBER_QUEUE: usize = 8;

pub type SubscriberId = u64;

/// Receiving half handed to a transport session.  The first message is
/// always the snapshot taken at subscribe time.
pub struct Subscription {
    pub id: SubscriberId,
    pub rx: mpsc::Receiver<Arc<RadioState>>,
}

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("playlist cursor {index} out of range ({len} tracks)")]
    CursorOutOfRange { index: usize, len: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not playing: nothing advanced, nothing sent.
    Paused,
    Advanced { progress: f64 },
    Rotated { from: String, to: String },
}

struct Playhead {
    index: usize,
    track: Track,
    elapsed: f64,
    is_playing: bool,
    subscribers: HashMap<SubscriberId, mpsc::Sender<Arc<RadioState>>>,
}

impl Playhead {
    fn snapshot(&self) -> RadioState {
        RadioState {
            current_track: self.track.clone(),
            progress: self.elapsed,
            is_playing: self.is_playing,
            listener_count: None,
        }
    }

    /// Push `state` to every subscriber without waiting.  Closed or full
    /// queues are unsubscribed on the spot.
    fn fan_out(&mut self, state: RadioState) {
        let state = Arc::new(state);
        self.subscribers.retain(|id, tx| match tx.try_send(Arc::clone(&state)) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(subscriber = id, "Subscriber not draining, dropping it");
                false
            }
            Err(TrySendError::Closed(_)) => {
                debug!(subscriber = id, "Subscriber gone, dropping it");
                false
            }
        });
    }
}

pub struct Scheduler {
    playlist: Arc<Playlist>,
    tick_interval: Duration,
    playhead: Mutex<Playhead>,
    next_subscriber: AtomicU64,
    running: AtomicBool,
}

impl Scheduler {
    /// Position the playhead at the start of the first track, playing.
    /// The tick loop is not running until `start` is called.
    pub fn new(playlist: Arc<Playlist>, tick_interval: Duration) -> Self {
        let track = playlist.first().clone();
        Self {
            playlist,
            tick_interval,
            playhead: Mutex::new(Playhead {
                index: 0,
                track,
                elapsed: 0.0,
                is_playing: true,
                subscribers: HashMap::new(),
            }),
            next_subscriber: AtomicU64::new(1),
            running: AtomicBool::new(false),
        }
    }

    /// Spawn the tick loop.  Returns `None` if it is already running.
    pub fn start(self: &Arc<Self>) -> Option<tokio::task::JoinHandle<()>> {
        if self
            .running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("Scheduler already running, ignoring second start");
            return None;
        }

        let scheduler = Arc::clone(self);
        Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(scheduler.tick_interval);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick of a tokio interval fires immediately
            interval.tick().await;

            info!(
                "Scheduler ticking every {:?} over {} tracks",
                scheduler.tick_interval,
                scheduler.playlist.len()
            );

            loop {
                interval.tick().await;
                match scheduler.tick().await {
                    Ok(TickOutcome::Rotated { from, to }) => {
                        info!(from = %from, to = %to, "Rotated to next track");
                    }
                    Ok(_) => {}
                    Err(e) => error!("Tick failed, station keeps running: {}", e),
                }
            }
        }))
    }

    /// Advance the playhead by one interval and push the result.
    pub async fn tick(&self) -> Result<TickOutcome, SchedulerError> {
        let mut playhead = self.playhead.lock().await;
        if !playhead.is_playing {
            return Ok(TickOutcome::Paused);
        }

        let elapsed = playhead.elapsed + self.tick_interval.as_secs_f64();
        let outcome = if elapsed >= playhead.track.effective_duration() {
            let next = self.playlist.next_index(playhead.index);
            let track = self
                .playlist
                .get(next)
                .ok_or(SchedulerError::CursorOutOfRange {
                    index: next,
                    len: self.playlist.len(),
                })?
                .clone();
            let from = std::mem::replace(&mut playhead.track, track);
            playhead.index = next;
            playhead.elapsed = 0.0;
            TickOutcome::Rotated {
                from: from.path,
                to: playhead.track.path.clone(),
            }
        } else {
            playhead.elapsed = elapsed;
            TickOutcome::Advanced { progress: elapsed }
        };

        let state = playhead.snapshot();
        playhead.fan_out(state);
        Ok(outcome)
    }

    pub async fn get_state(&self) -> RadioState {
        self.playhead.lock().await.snapshot()
    }

    /// Flip play/pause.  Resuming continues from the current position.
    pub async fn toggle_play_pause(&self) -> RadioState {
        let mut playhead = self.playhead.lock().await;
        playhead.is_playing = !playhead.is_playing;
        info!(
            track = %playhead.track.path,
            progress = playhead.elapsed,
            "Station {}",
            if playhead.is_playing { "resumed" } else { "paused" }
        );

        let state = playhead.snapshot();
        playhead.fan_out(state.clone());
        state
    }

    pub async fn subscribe(&self) -> Subscription {
        let id = self.next_subscriber.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(SUBSCRIBER_QUEUE);

        let mut playhead = self.playhead.lock().await;
        // Fresh channel with capacity > 0: cannot fail
        let _ = tx.try_send(Arc::new(playhead.snapshot()));
        playhead.subscribers.insert(id, tx);
        debug!(
            subscriber = id,
            total = playhead.subscribers.len(),
            "Subscriber added"
        );

        Subscription { id, rx }
    }

    pub async fn unsubscribe(&self, id: SubscriberId) {
        let mut playhead = self.playhead.lock().await;
        if playhead.subscribers.remove(&id).is_some() {
            debug!(
                subscriber = id,
                total = playhead.subscribers.len(),
                "Subscriber removed"
            );
        }
    }

    pub async fn subscriber_count(&self) -> usize {
        self.playhead.lock().await.subscribers.len()
    }
}

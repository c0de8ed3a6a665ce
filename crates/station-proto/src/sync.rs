//! Client-side reconciliation of a local player against pushed `RadioState`.
//!
//! Clients never drive the playhead.  On every push they compare what they
//! are playing with the server's view and either switch track, seek, or
//! leave playback alone.  Small drift is tolerated so network jitter does
//! not cause audible hiccups.

use crate::protocol::RadioState;

/// Drift (seconds) tolerated before a client seeks to the server position.
pub const RESYNC_THRESHOLD_SECS: f64 = 1.0;

#[derive(Debug, Clone, PartialEq)]
pub enum Reconcile {
    /// Local player is on another track: load `path` and seek to `seek_to`.
    LoadTrack {
        path: String,
        seek_to: f64,
        should_play: bool,
    },
    /// Same track, drifted past the threshold.
    Seek { to: f64, should_play: bool },
    InSync { should_play: bool },
}

impl Reconcile {
    pub fn should_play(&self) -> bool {
        match self {
            Reconcile::LoadTrack { should_play, .. }
            | Reconcile::Seek { should_play, .. }
            | Reconcile::InSync { should_play } => *should_play,
        }
    }
}

/// Decide what a local player must do to follow `server`.
///
/// `local_path` is `None` before anything has been loaded.
pub fn reconcile(local_path: Option<&str>, local_progress: f64, server: &RadioState) -> Reconcile {
    let should_play = server.is_playing;

    if local_path != Some(server.current_track.path.as_str()) {
        return Reconcile::LoadTrack {
            path: server.current_track.path.clone(),
            seek_to: server.progress,
            should_play,
        };
    }

    if (local_progress - server.progress).abs() > RESYNC_THRESHOLD_SECS {
        Reconcile::Seek {
            to: server.progress,
            should_play,
        }
    } else {
        Reconcile::InSync { should_play }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::Track;

    fn server(path: &str, progress: f64, is_playing: bool) -> RadioState {
        RadioState {
            current_track: Track::new(path, 10.0),
            progress,
            is_playing,
            listener_count: None,
        }
    }

    #[test]
    fn test_first_push_loads_track() {
        let action = reconcile(None, 0.0, &server("a", 4.0, true));
        assert_eq!(
            action,
            Reconcile::LoadTrack {
                path: "a".into(),
                seek_to: 4.0,
                should_play: true
            }
        );
    }

    #[test]
    fn test_small_drift_is_tolerated() {
        assert_eq!(
            reconcile(Some("a"), 4.6, &server("a", 4.0, true)),
            Reconcile::InSync { should_play: true }
        );
        // exactly at the threshold still counts as in sync
        assert_eq!(
            reconcile(Some("a"), 5.0, &server("a", 4.0, false)),
            Reconcile::InSync { should_play: false }
        );
    }

    #[test]
    fn test_large_drift_seeks_either_direction() {
        assert_eq!(
            reconcile(Some("a"), 1.5, &server("a", 4.0, true)),
            Reconcile::Seek {
                to: 4.0,
                should_play: true
            }
        );
        let ahead = reconcile(Some("a"), 9.0, &server("a", 4.0, true));
        assert!(matches!(ahead, Reconcile::Seek { to, .. } if to == 4.0));
    }

    #[test]
    fn test_track_change_wins_over_drift() {
        let action = reconcile(Some("a"), 0.0, &server("b", 0.0, false));
        assert!(matches!(action, Reconcile::LoadTrack { ref path, .. } if path == "b"));
        assert!(!action.should_play());
    }
}

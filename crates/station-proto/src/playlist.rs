use std::collections::HashSet;

use thiserror::Error;

use crate::protocol::Track;

#[derive(Debug, Error, PartialEq)]
pub enum PlaylistError {
    #[error("playlist is empty")]
    Empty,

    #[error("duplicate track path: {0}")]
    DuplicatePath(String),
}

/// Ordered, non-empty list of tracks.  Immutable after construction.
#[derive(Debug, Clone)]
pub struct Playlist {
    tracks: Vec<Track>,
}

impl Playlist {
    pub fn new(tracks: Vec<Track>) -> Result<Self, PlaylistError> {
        if tracks.is_empty() {
            return Err(PlaylistError::Empty);
        }

        let mut seen = HashSet::with_capacity(tracks.len());
        for track in &tracks {
            if !seen.insert(track.path.as_str()) {
                return Err(PlaylistError::DuplicatePath(track.path.clone()));
            }
        }

        Ok(Self { tracks })
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    /// Always false; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn first(&self) -> &Track {
        // non-empty by construction
        &self.tracks[0]
    }

    pub fn get(&self, idx: usize) -> Option<&Track> {
        self.tracks.get(idx)
    }

    /// Index that follows `idx`, wrapping to 0 after the last track.
    pub fn next_index(&self, idx: usize) -> usize {
        (idx + 1) % self.tracks.len()
    }

    pub fn find(&self, path: &str) -> Option<&Track> {
        self.tracks.iter().find(|t| t.path == path)
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Sum of all track durations, in seconds.
    pub fn total_duration(&self) -> f64 {
        self.tracks.iter().map(Track::effective_duration).sum()
    }
}

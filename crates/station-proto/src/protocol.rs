use serde::{Deserialize, Serialize};

/// One entry of the rotating playlist.  Identity is `path`, relative to the
/// library root with `/` separators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Track {
    pub path: String,
    /// Seconds, as probed at load time.
    #[serde(rename = "duration")]
    pub duration_secs: f64,
}

impl Track {
    pub fn new(path: impl Into<String>, duration_secs: f64) -> Self {
        Self {
            path: path.into(),
            duration_secs,
        }
    }

    /// Duration used for rotation.  Non-positive (or NaN) durations count as
    /// one second so a bad probe can never wedge the station on one track.
    pub fn effective_duration(&self) -> f64 {
        if self.duration_secs > 0.0 {
            self.duration_secs
        } else {
            1.0
        }
    }
}

/// The single authoritative playhead, pushed to every client.
///
/// Wire shape:
/// `{ "currentTrack": { "path", "duration" }, "progress", "isPlaying" }`
/// plus an optional `listenerCount`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RadioState {
    pub current_track: Track,
    /// Elapsed seconds into `current_track`.
    pub progress: f64,
    pub is_playing: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub listener_count: Option<usize>,
}

impl RadioState {
    pub fn with_listener_count(mut self, count: usize) -> Self {
        self.listener_count = Some(count);
        self
    }
}

/// Response body of the polled listener-count endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ListenerCount {
    pub count: usize,
    /// Server time, epoch milliseconds.
    pub timestamp: i64,
}

/// Body of the admin control endpoint.  `action` is kept as raw JSON so a
/// missing, null or non-string value is answered as an invalid action rather
/// than a decode failure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdminRequest {
    #[serde(default)]
    pub action: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminAction {
    Toggle,
}

impl AdminRequest {
    pub fn new(action: &str) -> Self {
        Self {
            action: Some(serde_json::Value::from(action)),
        }
    }

    pub fn parse(&self) -> Option<AdminAction> {
        match self.action.as_ref().and_then(|v| v.as_str()) {
            Some("toggle") => Some(AdminAction::Toggle),
            _ => None,
        }
    }

    /// The action as it was sent, for logging.
    pub fn raw_action(&self) -> String {
        match &self.action {
            Some(serde_json::Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        }
    }
}

/// JSON error body shared by every failing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_radio_state_wire_shape() {
        let state = RadioState {
            current_track: Track::new("chant/one.mp3", 5.0),
            progress: 2.0,
            is_playing: true,
            listener_count: None,
        };
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "currentTrack": { "path": "chant/one.mp3", "duration": 5.0 },
                "progress": 2.0,
                "isPlaying": true
            })
        );
    }

    #[test]
    fn test_listener_count_is_optional_on_the_wire() {
        let state = RadioState {
            current_track: Track::new("a", 3.0),
            progress: 0.0,
            is_playing: false,
            listener_count: None,
        }
        .with_listener_count(4);
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["listenerCount"], 4);

        let decoded: RadioState = serde_json::from_str(
            r#"{"currentTrack":{"path":"a","duration":3},"progress":0,"isPlaying":false}"#,
        )
        .unwrap();
        assert_eq!(decoded.listener_count, None);
    }

    #[test]
    fn test_effective_duration_defends_against_bad_probes() {
        assert_eq!(Track::new("a", 4.5).effective_duration(), 4.5);
        assert_eq!(Track::new("a", 0.0).effective_duration(), 1.0);
        assert_eq!(Track::new("a", -3.0).effective_duration(), 1.0);
        assert_eq!(Track::new("a", f64::NAN).effective_duration(), 1.0);
    }

    #[test]
    fn test_admin_action_parse() {
        assert_eq!(AdminRequest::new("toggle").parse(), Some(AdminAction::Toggle));
        assert_eq!(AdminRequest::new("skip").parse(), None);
        assert_eq!(AdminRequest::default().parse(), None);
    }

    #[test]
    fn test_admin_action_tolerates_odd_shapes() {
        for body in [r#"{}"#, r#"{"action":null}"#, r#"{"action":5}"#, r#"{"action":["toggle"]}"#] {
            let request: AdminRequest = serde_json::from_str(body).unwrap();
            assert_eq!(request.parse(), None, "{}", body);
        }
        let request: AdminRequest = serde_json::from_str(r#"{"action":5}"#).unwrap();
        assert_eq!(request.raw_action(), "5");
    }
}

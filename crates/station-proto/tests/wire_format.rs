use station_proto::protocol::{AdminAction, AdminRequest, ErrorBody, ListenerCount, RadioState};
use station_proto::sync::{reconcile, Reconcile};

/// A push exactly as a browser client receives it.
const PUSH: &str = r#"{
    "currentTrack": { "path": "album/chant.mp3", "duration": 183.5 },
    "progress": 42,
    "isPlaying": true,
    "listenerCount": 3
}"#;

#[test]
fn client_push_drives_reconcile() {
    let state: RadioState = serde_json::from_str(PUSH).unwrap();
    assert_eq!(state.listener_count, Some(3));
    assert_eq!(state.current_track.duration_secs, 183.5);

    // fresh page load: nothing loaded yet
    assert_eq!(
        reconcile(None, 0.0, &state),
        Reconcile::LoadTrack {
            path: "album/chant.mp3".into(),
            seek_to: 42.0,
            should_play: true,
        }
    );
    // tab was throttled in the background
    assert_eq!(
        reconcile(Some("album/chant.mp3"), 30.0, &state),
        Reconcile::Seek {
            to: 42.0,
            should_play: true
        }
    );
    assert_eq!(
        reconcile(Some("album/chant.mp3"), 41.6, &state),
        Reconcile::InSync { should_play: true }
    );
}

#[test]
fn push_without_listener_count_is_accepted() {
    let text = r#"{"currentTrack":{"path":"a.mp3","duration":5},"progress":0,"isPlaying":false}"#;
    let state: RadioState = serde_json::from_str(text).unwrap();
    assert_eq!(state.listener_count, None);
    assert!(!reconcile(Some("a.mp3"), 0.0, &state).should_play());

    let back = serde_json::to_value(&state).unwrap();
    assert!(back.get("listenerCount").is_none());
}

#[test]
fn http_bodies() {
    let count = serde_json::to_value(ListenerCount {
        count: 2,
        timestamp: 1_700_000_000_000,
    })
    .unwrap();
    assert_eq!(count, serde_json::json!({"count": 2, "timestamp": 1_700_000_000_000_i64}));

    let request: AdminRequest = serde_json::from_str(r#"{"action":"toggle"}"#).unwrap();
    assert_eq!(request.parse(), Some(AdminAction::Toggle));

    let error = serde_json::to_string(&ErrorBody::new("Invalid action")).unwrap();
    assert_eq!(error, r#"{"error":"Invalid action"}"#);
}

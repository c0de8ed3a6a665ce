use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{ConnectInfo, State, WebSocketUpgrade};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use futures_util::{SinkExt, StreamExt};
use station_proto::protocol::RadioState;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

use crate::http::AppState;
use crate::presence::{ConnectionId, PresenceTracker};
use crate::session;

/// `GET /api/radio`: upgrade to the listener push channel.
pub async fn radio_websocket(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
) -> Response {
    let identity = session::client_identity(&headers, peer, state.trust_proxy_headers);
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();
    let (token, fresh) = session::listener_token(&headers);

    let mut response = ws
        .on_upgrade(move |socket| handle_listener(socket, state, identity, user_agent))
        .into_response();

    if fresh {
        if let Ok(cookie) = HeaderValue::from_str(&session::token_cookie(&token)) {
            response.headers_mut().append(header::SET_COOKIE, cookie);
        }
    }
    response
}

/// One listener connection: presence registration, state push, heartbeat.
///
/// Exits when the client goes away, a send fails, or the scheduler drops
/// our subscription; cleanup runs on every exit path.
async fn handle_listener(socket: WebSocket, state: AppState, identity: String, user_agent: String) {
    let mut conn = state.presence.add_listener(&identity, &user_agent).await;
    let mut subscription = state.scheduler.subscribe().await;
    let subscribers = state.scheduler.subscriber_count().await;
    info!(
        identity = %identity,
        conn = %conn,
        sub = subscription.id,
        subscribers = subscribers,
        "Listener connected"
    );

    let (mut sender, mut receiver) = socket.split();
    let mut heartbeat = tokio::time::interval(state.heartbeat_interval);
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);
    heartbeat.tick().await;

    loop {
        tokio::select! {
            update = subscription.rx.recv() => {
                let Some(update) = update else {
                    debug!(conn = %conn, "Subscription dropped by scheduler");
                    break;
                };
                let text = match encode_update(&update, state.presence.count().await) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!("Failed to encode state: {}", e);
                        continue;
                    }
                };
                if let Err(e) = sender.send(Message::Text(text)).await {
                    debug!(conn = %conn, "Send failed: {}", e);
                    break;
                }
            }

            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!(conn = %conn, "WebSocket error: {}", e);
                        break;
                    }
                    // any frame counts as a heartbeat
                    Some(Ok(_)) => {
                        conn = refresh_presence(&state.presence, conn, &identity, &user_agent).await;
                    }
                }
            }

            _ = heartbeat.tick() => {
                if sender.send(Message::Ping(Vec::new())).await.is_err() {
                    break;
                }
            }
        }
    }

    state.scheduler.unsubscribe(subscription.id).await;
    state.presence.remove_listener(conn).await;
    let listeners = state.presence.count().await;
    let connections = state.presence.connection_count().await;
    info!(
        identity = %identity,
        conn = %conn,
        listeners = listeners,
        connections = connections,
        "Listener disconnected"
    );
}

/// Heartbeat for `conn`.  A connection the sweeper already dropped is
/// registered again under a new id, since its socket is evidently alive.
async fn refresh_presence(
    presence: &PresenceTracker,
    conn: ConnectionId,
    identity: &str,
    user_agent: &str,
) -> ConnectionId {
    if presence.touch(conn).await {
        return conn;
    }
    let fresh = presence.add_listener(identity, user_agent).await;
    info!(identity = %identity, old = %conn, conn = %fresh, "Swept listener re-registered");
    fresh
}

fn encode_update(update: &Arc<RadioState>, listeners: usize) -> serde_json::Result<String> {
    let state = RadioState::clone(update).with_listener_count(listeners);
    serde_json::to_string(&state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    use futures_util::Stream;
    use station_proto::playlist::Playlist;
    use station_proto::protocol::Track;
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::Message as ClientMessage;

    use crate::scheduler::Scheduler;

    const KNOWN_TOKEN: &str = "0123456789abcdef0123456789abcdef";

    async fn spawn_station() -> (SocketAddr, AppState) {
        let playlist = Arc::new(
            Playlist::new(vec![Track::new("a.mp3", 30.0), Track::new("b.mp3", 30.0)]).unwrap(),
        );
        let state = AppState {
            scheduler: Arc::new(Scheduler::new(Arc::clone(&playlist), Duration::from_secs(1))),
            presence: Arc::new(PresenceTracker::new(Duration::from_secs(60))),
            playlist,
            library_dir: Arc::new(PathBuf::from(".")),
            trust_proxy_headers: false,
            heartbeat_interval: Duration::from_secs(20),
        };

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = crate::http::router(state.clone())
            .into_make_service_with_connect_info::<SocketAddr>();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (addr, state)
    }

    async fn next_state<S>(ws: &mut S) -> serde_json::Value
    where
        S: Stream<Item = Result<ClientMessage, tokio_tungstenite::tungstenite::Error>> + Unpin,
    {
        loop {
            match ws.next().await.unwrap().unwrap() {
                ClientMessage::Text(text) => return serde_json::from_str(&text).unwrap(),
                ClientMessage::Ping(_) | ClientMessage::Pong(_) => continue,
                other => panic!("unexpected frame {:?}", other),
            }
        }
    }

    async fn wait_for_departure(state: &AppState) {
        for _ in 0..200 {
            if state.presence.count().await == 0 && state.scheduler.subscriber_count().await == 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("listener still registered after close");
    }

    #[tokio::test]
    async fn test_listener_session_lifecycle() {
        let (addr, state) = spawn_station().await;
        let url = format!("ws://{}/api/radio", addr);
        let (mut ws, response) = tokio_tungstenite::connect_async(url).await.unwrap();

        let cookie = response.headers()["set-cookie"].to_str().unwrap();
        assert!(cookie.starts_with("listener_token="), "{}", cookie);

        // snapshot first, before any tick
        let first = next_state(&mut ws).await;
        assert_eq!(first["currentTrack"]["path"], "a.mp3");
        assert_eq!(first["progress"], 0.0);
        assert_eq!(first["listenerCount"], 1);
        assert_eq!(state.presence.count().await, 1);
        assert_eq!(state.scheduler.subscriber_count().await, 1);

        state.scheduler.tick().await.unwrap();
        let pushed = next_state(&mut ws).await;
        assert_eq!(pushed["progress"], 1.0);

        ws.send(ClientMessage::Text("still here".into())).await.unwrap();
        ws.close(None).await.unwrap();
        wait_for_departure(&state).await;
        assert_eq!(state.presence.connection_count().await, 0);
    }

    #[tokio::test]
    async fn test_known_token_is_not_reissued() {
        let (addr, state) = spawn_station().await;
        let mut request = format!("ws://{}/api/radio", addr)
            .into_client_request()
            .unwrap();
        request.headers_mut().insert(
            "cookie",
            format!("theme=dark; listener_token={}", KNOWN_TOKEN).parse().unwrap(),
        );
        let (mut ws, response) = tokio_tungstenite::connect_async(request).await.unwrap();
        assert!(response.headers().get("set-cookie").is_none());

        next_state(&mut ws).await;
        assert_eq!(state.presence.count().await, 1);
        drop(ws);
        wait_for_departure(&state).await;
    }

    #[tokio::test]
    async fn test_two_sockets_from_one_address_are_one_listener() {
        let (addr, state) = spawn_station().await;
        let url = format!("ws://{}/api/radio", addr);
        let (mut a, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        next_state(&mut a).await;
        let (mut b, _) = tokio_tungstenite::connect_async(url.as_str()).await.unwrap();
        let second = next_state(&mut b).await;

        assert_eq!(second["listenerCount"], 1);
        assert_eq!(state.presence.connection_count().await, 2);

        a.close(None).await.unwrap();
        for _ in 0..200 {
            if state.presence.connection_count().await == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(state.presence.connection_count().await, 1);
        assert_eq!(state.presence.count().await, 1);

        b.close(None).await.unwrap();
        wait_for_departure(&state).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_swept_connection_rejoins_on_heartbeat() {
        let presence = PresenceTracker::new(Duration::from_secs(60));
        let conn = presence.add_listener("1.2.3.4", "UA").await;
        assert_eq!(refresh_presence(&presence, conn, "1.2.3.4", "UA").await, conn);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert_eq!(presence.sweep().await.connections, 1);
        assert_eq!(presence.count().await, 0);

        let rejoined = refresh_presence(&presence, conn, "1.2.3.4", "UA").await;
        assert_ne!(rejoined, conn);
        assert_eq!(presence.count().await, 1);
        assert!(presence.touch(rejoined).await);
    }

    #[test]
    fn test_push_carries_listener_count() {
        let update = Arc::new(RadioState {
            current_track: Track::new("a.mp3", 3.0),
            progress: 1.0,
            is_playing: true,
            listener_count: None,
        });
        let text = encode_update(&update, 4).unwrap();
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["listenerCount"], 4);
        assert_eq!(value["currentTrack"]["path"], "a.mp3");
        assert_eq!(value["isPlaying"], true);
    }
}

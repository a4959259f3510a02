//! WebSocket endpoint for the signaling protocol.
//!
//! Connection lifecycle: the handshake must carry `clientId` and
//! `movieId` query parameters and is rejected before the upgrade when
//! either is missing or unsafe. Once upgraded the peer is registered and
//! receives the current peer set; inbound messages are dispatched until
//! the socket closes, at which point registry cleanup runs on this
//! connection's own teardown path.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::mpsc::{self, UnboundedSender};

use super::protocol::{ErrorMessage, MessageType};
use crate::api::SharedState;
use crate::metrics;
use crate::seeder::validate::{is_safe_identifier, is_valid_movie_id};

/// Query parameters of the signaling handshake.
#[derive(Debug, Deserialize)]
pub struct ConnectParams {
    #[serde(rename = "clientId")]
    pub client_id: Option<String>,
    #[serde(rename = "movieId")]
    pub movie_id: Option<String>,
    /// Legacy per-stream variant; accepted but the swarm is movie-scoped.
    #[serde(rename = "qualityId")]
    pub quality_id: Option<String>,
}

/// A registered signaling connection.
pub struct ClientSession {
    pub client_id: String,
    pub movie_id: String,
    tx: UnboundedSender<Message>,
}

impl ClientSession {
    pub fn new(client_id: String, movie_id: String, tx: UnboundedSender<Message>) -> Self {
        Self {
            client_id,
            movie_id,
            tx,
        }
    }

    /// Queue a JSON payload for the outbound pump. Send failures mean the
    /// connection is already tearing down; they are ignored.
    pub fn send_json<T: Serialize>(&self, payload: &T) {
        match serde_json::to_string(payload) {
            Ok(json) => {
                let _ = self.tx.send(Message::Text(json));
            }
            Err(e) => {
                tracing::error!(client_id = %self.client_id, error = %e, "Failed to serialize reply");
            }
        }
    }

    fn send_error(&self, error: impl Into<String>) {
        self.send_json(&ErrorMessage::new(error));
    }
}

/// Check the handshake parameters: both ids present, trimmed, and safe
/// to echo into registry keys. Returns the accepted `(clientId, movieId)`.
pub fn validate_handshake(params: &ConnectParams) -> Result<(String, String), &'static str> {
    let client_id = params.client_id.as_deref().map(str::trim).unwrap_or("");
    let movie_id = params.movie_id.as_deref().map(str::trim).unwrap_or("");

    if client_id.is_empty() || movie_id.is_empty() {
        return Err("clientId and movieId are required");
    }
    if !is_safe_identifier(client_id) || !is_valid_movie_id(movie_id) {
        return Err("invalid clientId or movieId");
    }
    Ok((client_id.to_string(), movie_id.to_string()))
}

/// `GET /ws/signaling?clientId=...&movieId=...`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<ConnectParams>,
    State(state): State<SharedState>,
) -> Response {
    let (client_id, movie_id) = match validate_handshake(&params) {
        Ok(ids) => ids,
        Err(reason) => {
            tracing::warn!(reason, "Signaling handshake rejected");
            return (StatusCode::BAD_REQUEST, reason).into_response();
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, state, client_id, movie_id))
}

async fn handle_socket(socket: WebSocket, state: SharedState, client_id: String, movie_id: String) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<Message>();

    // Outbound pump: everything the session queues goes through here, so
    // replies and relayed messages never block the inbound loop.
    let send_task = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if sink.send(message).await.is_err() {
                break;
            }
        }
    });

    state.connections.register(&client_id, tx.clone()).await;
    let session = ClientSession::new(client_id.clone(), movie_id.clone(), tx);

    // UNREGISTERED -> REGISTERED: announce and push the bootstrap snapshot.
    match state.signaling.register_client(&client_id, &movie_id).await {
        Ok(peer_list) => session.send_json(&peer_list),
        Err(e) => {
            tracing::warn!(client_id = %client_id, error = %e, "Failed to register client");
            session.send_error("Registration failed, registry unavailable");
        }
    }

    while let Some(result) = stream.next().await {
        let message = match result {
            Ok(message) => message,
            Err(e) => {
                tracing::debug!(client_id = %client_id, error = %e, "WebSocket receive error");
                break;
            }
        };
        match message {
            Message::Text(text) => process_message(&state, &session, &text).await,
            Message::Close(_) => break,
            // Pings are answered by the library; binary frames are not
            // part of the protocol.
            _ => {}
        }
    }

    // REGISTERED -> CLOSED: cleanup on our own teardown path. A reconnect
    // may already own the connection-table slot; only our entry is removed.
    state.connections.unregister_sender(&client_id, &session.tx).await;
    state.signaling.handle_disconnect(&client_id, &movie_id).await;
    send_task.abort();
}

/// Dispatch one inbound text frame. Malformed or unknown messages get an
/// explicit error reply; the connection always stays open.
pub async fn process_message(state: &SharedState, session: &ClientSession, text: &str) {
    let payload: Value = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(_) => {
            session.send_error("Malformed JSON message");
            return;
        }
    };

    let type_raw = payload.get("type").and_then(Value::as_str).unwrap_or("");
    let message_type = match MessageType::parse(type_raw) {
        Some(t) => t,
        None => {
            session.send_error("Unsupported or missing message type");
            return;
        }
    };
    metrics::record_signaling_message(type_raw.trim());

    match message_type {
        MessageType::WhoHas => handle_who_has(state, session, &payload).await,
        MessageType::ReportSegment => handle_report_segment(state, session, &payload).await,
        MessageType::RemoveSegment => handle_remove_segment(state, session, &payload).await,
        MessageType::RtcOffer | MessageType::RtcAnswer | MessageType::IceCandidate => {
            handle_rtc_relay(state, session, payload).await
        }
    }
}

fn text_field<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Extract and validate the segment coordinates shared by WHO_HAS,
/// REPORT_SEGMENT and REMOVE_SEGMENT. `movieId` falls back to the
/// session's movie when the message omits it.
fn segment_coordinates(
    session: &ClientSession,
    payload: &Value,
    context: &str,
) -> Result<(String, Option<String>, String), String> {
    let movie_id = text_field(payload, "movieId")
        .unwrap_or(&session.movie_id)
        .to_string();
    let quality_id = text_field(payload, "qualityId").map(str::to_string);
    let segment_id = text_field(payload, "segmentId")
        .ok_or_else(|| format!("{} requires segmentId", context))?
        .to_string();

    if !is_valid_movie_id(&movie_id) {
        return Err(format!("{}: invalid movieId", context));
    }
    if let Some(q) = &quality_id {
        if !is_safe_identifier(q) {
            return Err(format!("{}: invalid qualityId", context));
        }
    }
    if !is_safe_identifier(&segment_id) {
        return Err(format!("{}: invalid segmentId", context));
    }

    Ok((movie_id, quality_id, segment_id))
}

async fn handle_who_has(state: &SharedState, session: &ClientSession, payload: &Value) {
    let (movie_id, quality_id, segment_id) = match segment_coordinates(session, payload, "WHO_HAS")
    {
        Ok(coords) => coords,
        Err(message) => {
            session.send_error(message);
            return;
        }
    };

    match state
        .signaling
        .who_has(&movie_id, quality_id.as_deref(), &segment_id)
        .await
    {
        Ok(reply) => session.send_json(&reply),
        Err(e) => {
            tracing::warn!(client_id = %session.client_id, error = %e, "WHO_HAS failed");
            session.send_error("Discovery failed, registry unavailable");
        }
    }
}

async fn handle_report_segment(state: &SharedState, session: &ClientSession, payload: &Value) {
    let (movie_id, quality_id, segment_id) =
        match segment_coordinates(session, payload, "REPORT_SEGMENT") {
            Ok(coords) => coords,
            Err(message) => {
                session.send_error(message);
                return;
            }
        };

    let source = text_field(payload, "source").unwrap_or("peer");
    if !source.eq_ignore_ascii_case("peer") && !source.eq_ignore_ascii_case("origin") {
        session.send_error("REPORT_SEGMENT: source must be \"origin\" or \"peer\"");
        return;
    }
    let latency = payload.get("latency").and_then(Value::as_i64).unwrap_or(0);
    let speed = payload.get("speed").and_then(Value::as_f64).unwrap_or(0.0);

    match state
        .signaling
        .report_segment(
            &session.client_id,
            &movie_id,
            quality_id.as_deref(),
            &segment_id,
            source,
            speed,
            latency,
        )
        .await
    {
        Ok(ack) => session.send_json(&ack),
        Err(e) => {
            tracing::warn!(client_id = %session.client_id, error = %e, "REPORT_SEGMENT failed");
            session.send_error("Report failed, registry unavailable");
        }
    }
}

async fn handle_remove_segment(state: &SharedState, session: &ClientSession, payload: &Value) {
    let (movie_id, quality_id, segment_id) =
        match segment_coordinates(session, payload, "REMOVE_SEGMENT") {
            Ok(coords) => coords,
            Err(message) => {
                session.send_error(message);
                return;
            }
        };

    // No reply on success; retraction is fire-and-forget.
    if let Err(e) = state
        .signaling
        .remove_segment(
            &session.client_id,
            &movie_id,
            quality_id.as_deref(),
            &segment_id,
        )
        .await
    {
        tracing::warn!(client_id = %session.client_id, error = %e, "REMOVE_SEGMENT failed");
        session.send_error("Retraction failed, registry unavailable");
    }
}

/// Relay an opaque RTC negotiation payload verbatim to the target peer,
/// with the sender's id injected as `from`.
async fn handle_rtc_relay(state: &SharedState, session: &ClientSession, mut payload: Value) {
    let target = match text_field(&payload, "to") {
        Some(target) => target.to_string(),
        None => {
            session.send_error("RTC relay requires a target peer id in \"to\"");
            return;
        }
    };

    if let Some(object) = payload.as_object_mut() {
        object.insert("from".to_string(), Value::String(session.client_id.clone()));
    }

    let json = match serde_json::to_string(&payload) {
        Ok(json) => json,
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize relay payload");
            return;
        }
    };

    if !state.connections.send_to(&target, Message::Text(json)).await {
        session.send_error(format!("Target peer not connected: {}", target));
    }
}

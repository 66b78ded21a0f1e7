use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use thiserror::Error;
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::{BroadcastStream, errors::BroadcastStreamRecvError};
use tracing::{debug, info, warn};

use crate::{
    dao::models::UserId,
    dto::ws::{ErrorPayload, InboundMessage, OutboundEvent},
    error::{ErrorKind, ServiceError},
    services::answer_service,
    state::{SharedState, state_machine::SessionPhase},
};

/// Internal error type for participant message handling.
///
/// Distinct from `ServiceError`: a closed writer ends the connection, while
/// service failures are reported back on the socket.
#[derive(Debug, Error)]
enum ParticipantError {
    /// Writer channel closed - connection should be terminated immediately.
    #[error("connection closed")]
    ConnectionClosed,
    /// Frame could not be decoded into an inbound message.
    #[error("malformed message: {0}")]
    Malformed(String),
    /// Error from the answer workflow.
    #[error("service error: {0}")]
    Service(#[from] ServiceError),
}

/// Handle the full lifecycle of one participant WebSocket connection.
///
/// `user_id` was validated upstream before the upgrade.
pub async fn handle_socket(state: SharedState, socket: WebSocket, user_id: UserId) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound messages flowing even while we await inbound frames.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let connection_id = state.connections().register(user_id);
    let forward_task = spawn_event_forwarder(&state, outbound_tx.clone(), user_id);
    match state.sessions().get().await {
        Ok(Some(snapshot)) if snapshot.phase != SessionPhase::Finished => {
            state.ensure_stats_broadcaster(snapshot.game_id);
        }
        Ok(_) => {}
        Err(err) => warn!(user_id, error = %err, "failed to read snapshot on connect"),
    }
    info!(
        user_id,
        connection_id = %connection_id,
        sockets = state.connections().connections_of(user_id),
        "participant connected"
    );

    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                debug!(user_id, payload = %text, "received participant message");
                let res = match serde_json::from_str::<InboundMessage>(&text) {
                    Ok(inbound) => handle_message(&state, user_id, inbound, &outbound_tx).await,
                    Err(err) => Err(ParticipantError::Malformed(err.to_string())),
                };
                if let Err(err) = res {
                    if matches!(err, ParticipantError::ConnectionClosed) {
                        info!(user_id, "connection closed during message handling, terminating");
                        break;
                    }
                    warn!(user_id, error = %err, "participant message rejected");
                    if send_event(&outbound_tx, &error_event(&err)).is_err() {
                        break;
                    }
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                info!(user_id, "participant closed");
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) => {}
            Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    let connected_ms = state
        .connections()
        .unregister(connection_id)
        .map_or(0, |connection| connection.connected_at.elapsed().as_millis() as u64);
    forward_task.abort();
    info!(
        user_id,
        connection_id = %connection_id,
        connected_ms,
        "participant disconnected"
    );

    finalize(writer_task, outbound_tx).await;
}

async fn handle_message(
    state: &SharedState,
    user_id: UserId,
    message: InboundMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ParticipantError> {
    match message {
        InboundMessage::Join => {
            let joined = answer_service::join(state, user_id).await?;
            send_event(outbound_tx, &OutboundEvent::Joined(joined))
        }
        InboundMessage::Answer { user_answer } => {
            answer_service::record_answer(state, user_id, user_answer).await?;
            Ok(())
        }
        InboundMessage::QuestionUpAck => {
            answer_service::acknowledge_question(state, user_id).await?;
            Ok(())
        }
        InboundMessage::QuestionDownAck
        | InboundMessage::AnswerUpAck
        | InboundMessage::AnswerDownAck => {
            debug!(user_id, ?message, "acknowledgement received");
            Ok(())
        }
        InboundMessage::Unknown => Err(ParticipantError::Malformed(
            "unknown message type".into(),
        )),
    }
}

/// Relay hub events to this connection until it goes away.
fn spawn_event_forwarder(
    state: &SharedState,
    outbound_tx: mpsc::UnboundedSender<Message>,
    user_id: UserId,
) -> JoinHandle<()> {
    let mut events = BroadcastStream::new(state.hub().subscribe());
    tokio::spawn(async move {
        while let Some(item) = events.next().await {
            match item {
                Ok(event) => {
                    if send_event(&outbound_tx, &event).is_err() {
                        break;
                    }
                }
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!(user_id, skipped, "participant lagged behind the event stream");
                }
            }
        }
    })
}

fn error_event(err: &ParticipantError) -> OutboundEvent {
    let (kind, message) = match err {
        ParticipantError::Service(service) => (service.kind(), service.public_message()),
        ParticipantError::Malformed(reason) => (ErrorKind::ValidationError, reason.clone()),
        ParticipantError::ConnectionClosed => (ErrorKind::InternalError, err.to_string()),
    };
    OutboundEvent::Error(ErrorPayload { kind, message })
}

/// Serialize an event and push it onto the connection's writer.
///
/// Serialization failures are logged and swallowed; a closed writer is reported.
fn send_event(
    tx: &mpsc::UnboundedSender<Message>,
    event: &OutboundEvent,
) -> Result<(), ParticipantError> {
    let payload = match serde_json::to_string(event) {
        Ok(payload) => payload,
        Err(err) => {
            warn!(event = event.name(), error = %err, "failed to serialize event");
            return Ok(());
        }
    };
    tx.send(Message::Text(payload.into()))
        .map_err(|_| ParticipantError::ConnectionClosed)
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_failures_keep_their_kind() {
        let err = ParticipantError::from(ServiceError::InvalidState("the question is closed".into()));
        let OutboundEvent::Error(payload) = error_event(&err) else {
            panic!("expected an error event");
        };
        assert_eq!(payload.kind, ErrorKind::Conflict);
        assert_eq!(payload.message, "the question is closed");
    }

    #[test]
    fn closed_writer_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let event = OutboundEvent::Timer(crate::dto::ws::TimerPayload { counter: 3 });
        assert!(matches!(
            send_event(&tx, &event),
            Err(ParticipantError::ConnectionClosed)
        ));
    }
}

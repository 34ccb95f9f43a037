/**
 * Realtime Connection Task
 *
 * Runs one authenticated WebSocket. The socket is split in two:
 *
 * - a writer task owns the sink and drains the connection's bounded event
 *   queue (fed by the hub and by this task's own replies) plus an unbounded
 *   control queue for pings, pongs and close frames
 * - the reader loop below decodes client frames and dispatches them
 *
 * A ping task closes the socket with 1001 when no pong arrives in time and
 * signals the reader loop to stop, so a half-open link is cleaned up even
 * though the peer never answers the close.
 *
 * Whatever ends the reader loop, the [`DisconnectGuard`] queues the hub's
 * disconnect cleanup when it is dropped, including on panic or abort.
 */

use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};

use crate::backend::auth::SessionUser;
use crate::backend::error::BackendError;
use crate::backend::realtime::dispatcher::EventEnvelope;
use crate::backend::realtime::hub::{EventPublisher, RealtimeHandle};
use crate::backend::trips::store::{NewChatMessage, TripStore};
use crate::shared::event::{AckPayload, SendMessage, TypingInput, TypingState};
use crate::shared::{ClientEvent, ConnectionId, IncomingFrame, ServerEvent, TripId};

/// Close code sent when the session cannot be resolved
pub const CLOSE_UNAUTHENTICATED: u16 = 4001;
const CLOSE_GOING_AWAY: u16 = 1001;

/// Per-connection tuning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SocketSettings {
    pub ping_interval: Duration,
    pub pong_timeout: Duration,
    pub outbound_buffer: usize,
}

impl Default for SocketSettings {
    fn default() -> Self {
        Self {
            ping_interval: Duration::from_secs(30),
            pong_timeout: Duration::from_secs(10),
            outbound_buffer: 256,
        }
    }
}

/// Queues the hub cleanup for a connection when dropped
pub struct DisconnectGuard {
    connection_id: ConnectionId,
    realtime: RealtimeHandle,
}

impl DisconnectGuard {
    pub fn new(connection_id: ConnectionId, realtime: RealtimeHandle) -> Self {
        Self {
            connection_id,
            realtime,
        }
    }
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        if let Err(e) = self.realtime.disconnect(self.connection_id) {
            tracing::error!(connection_id = %self.connection_id, "[Realtime] Disconnect not queued: {}", e);
        }
    }
}

/// Handles the decoded requests of one connection
pub struct ConnectionActor {
    connection_id: ConnectionId,
    user: SessionUser,
    realtime: RealtimeHandle,
    store: Arc<dyn TripStore>,
    replies: mpsc::Sender<ServerEvent>,
}

impl ConnectionActor {
    pub fn new(
        connection_id: ConnectionId,
        user: SessionUser,
        realtime: RealtimeHandle,
        store: Arc<dyn TripStore>,
        replies: mpsc::Sender<ServerEvent>,
    ) -> Self {
        Self {
            connection_id,
            user,
            realtime,
            store,
            replies,
        }
    }

    /// Handle one text frame
    ///
    /// Failures never end the connection: they are answered with an `error`
    /// frame, followed by a failed `ack` when the frame asked for one.
    pub async fn on_text(&self, text: &str) {
        let frame = match IncomingFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                self.fail(None, &BackendError::from(e)).await;
                return;
            }
        };

        let ack_id = frame.ack_id;
        let result = match frame.decode() {
            Ok(event) => self.dispatch(event).await,
            Err(e) => Err(BackendError::from(e)),
        };

        match result {
            Ok(data) => {
                if let Some(ack_id) = ack_id {
                    self.reply(ServerEvent::Ack(AckPayload::ok(ack_id, data))).await;
                }
            }
            Err(err) => self.fail(ack_id, &err).await,
        }
    }

    async fn dispatch(&self, event: ClientEvent) -> Result<Option<Value>, BackendError> {
        match event {
            ClientEvent::Join(trip_id) => self.join(trip_id).await,
            ClientEvent::Leave(trip_id) => {
                self.realtime.leave(self.connection_id, trip_id)?;
                Ok(None)
            }
            ClientEvent::SendMessage(message) => self.send_message(message).await,
            ClientEvent::Typing(typing) => self.typing(typing).await,
        }
    }

    async fn join(&self, trip_id: TripId) -> Result<Option<Value>, BackendError> {
        self.authorize(&trip_id).await?;
        let outcome = self.realtime.join(self.connection_id, trip_id).await?;
        Ok(Some(serde_json::to_value(&outcome.snapshot)?))
    }

    async fn send_message(&self, message: SendMessage) -> Result<Option<Value>, BackendError> {
        self.authorize(&message.trip_id).await?;
        let record = self
            .store
            .save_chat_message(NewChatMessage {
                trip_id: message.trip_id,
                user_id: self.user.user_id.clone(),
                user_name: self.user.display_name.clone(),
                content: message.content,
                message_type: message.message_type,
            })
            .await?;
        let data = serde_json::to_value(&record)?;
        self.realtime.publish(EventEnvelope::chat_message(record))?;
        Ok(Some(data))
    }

    async fn typing(&self, typing: TypingInput) -> Result<Option<Value>, BackendError> {
        let name = if typing.name.trim().is_empty() {
            self.user.display_name.clone()
        } else {
            typing.name
        };
        let state = TypingState {
            user_id: self.user.user_id.clone(),
            trip_id: typing.trip_id,
            is_typing: typing.is_typing,
            name,
        };
        self.realtime
            .publish_from(self.connection_id, EventEnvelope::typing(state))
            .await?;
        Ok(None)
    }

    async fn authorize(&self, trip_id: &TripId) -> Result<(), BackendError> {
        if self.store.is_member(trip_id, &self.user.user_id).await? {
            Ok(())
        } else {
            Err(BackendError::authorization(format!(
                "You do not have access to trip {}",
                trip_id
            )))
        }
    }

    async fn fail(&self, ack_id: Option<u64>, err: &BackendError) {
        tracing::warn!(
            connection_id = %self.connection_id,
            user_id = %self.user.user_id,
            "[Realtime] Request failed: {}",
            err
        );
        self.reply(err.to_error_event()).await;
        if let Some(ack_id) = ack_id {
            self.reply(ServerEvent::Ack(AckPayload::failed(ack_id, err.message())))
                .await;
        }
    }

    async fn reply(&self, event: ServerEvent) {
        if self.replies.send(event).await.is_err() {
            tracing::debug!(connection_id = %self.connection_id, "[Realtime] Reply dropped, writer gone");
        }
    }
}

/// Drive an authenticated socket until it closes
pub async fn run_connection(
    socket: WebSocket,
    user: SessionUser,
    realtime: RealtimeHandle,
    store: Arc<dyn TripStore>,
    settings: SocketSettings,
) {
    let connection_id = ConnectionId::new();
    let (ws_sender, mut ws_receiver) = socket.split();
    let (event_tx, event_rx) = mpsc::channel::<ServerEvent>(settings.outbound_buffer.max(1));
    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();

    if let Err(e) = realtime.connect(connection_id, user.clone(), event_tx.clone()) {
        tracing::error!(user_id = %user.user_id, "[Realtime] Could not register connection: {}", e);
        return;
    }
    let _guard = DisconnectGuard::new(connection_id, realtime.clone());

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user.user_id,
        "[Realtime] Connection started"
    );

    let writer_handle = tokio::spawn(writer_task(ws_sender, event_rx, control_rx));

    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let (expired_tx, mut pong_expired) = oneshot::channel::<()>();
    let ping_tx = control_tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(settings.ping_interval);
        // First tick fires immediately
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;
            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                break;
            }
            match timeout(settings.pong_timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    tracing::warn!(connection_id = %connection_id, "[Realtime] Pong timeout, closing connection");
                    let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                        code: CLOSE_GOING_AWAY,
                        reason: "Pong timeout".into(),
                    })));
                    let _ = expired_tx.send(());
                    break;
                }
            }
        }
    });

    let actor = ConnectionActor::new(connection_id, user.clone(), realtime, store, event_tx);

    loop {
        let received = tokio::select! {
            received = ws_receiver.next() => received,
            // Fires on pong timeout, or when the ping task ends with the writer
            _ = &mut pong_expired => {
                tracing::info!(connection_id = %connection_id, "[Realtime] Dropping unresponsive connection");
                break;
            }
        };

        match received {
            Some(Ok(Message::Text(text))) => actor.on_text(text.as_str()).await,
            Some(Ok(Message::Binary(_))) => {
                actor
                    .reply(ServerEvent::error("Binary frames are not supported"))
                    .await;
            }
            Some(Ok(Message::Pong(_))) => {
                let _ = pong_tx.send(());
            }
            Some(Ok(Message::Ping(data))) => {
                let _ = control_tx.send(Message::Pong(data));
            }
            Some(Ok(Message::Close(frame))) => {
                tracing::info!(
                    connection_id = %connection_id,
                    reason = ?frame,
                    "[Realtime] Client initiated close"
                );
                break;
            }
            Some(Err(e)) => {
                tracing::warn!(
                    connection_id = %connection_id,
                    error = %e,
                    "[Realtime] Receive error"
                );
                break;
            }
            None => break,
        }
    }

    writer_handle.abort();
    ping_handle.abort();

    tracing::info!(
        connection_id = %connection_id,
        user_id = %user.user_id,
        "[Realtime] Connection stopped"
    );
}

/// Upgrade-side rejection: tell the peer why, then close with 4001
pub async fn reject_connection(mut socket: WebSocket, err: BackendError) {
    if let Ok(text) = err.to_error_event().to_text() {
        let _ = socket.send(Message::Text(text.into())).await;
    }
    let _ = socket
        .send(Message::Close(Some(CloseFrame {
            code: CLOSE_UNAUTHENTICATED,
            reason: err.message().into(),
        })))
        .await;
}

async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut events: mpsc::Receiver<ServerEvent>,
    mut control: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let message = tokio::select! {
            Some(message) = control.recv() => message,
            Some(event) = events.recv() => match event.to_text() {
                Ok(text) => Message::Text(text.into()),
                Err(e) => {
                    tracing::error!("[Realtime] Could not encode {}: {}", event.name(), e);
                    continue;
                }
            },
            else => break,
        };

        let closing = matches!(message, Message::Close(_));
        if ws_sender.send(message).await.is_err() || closing {
            break;
        }
    }
}

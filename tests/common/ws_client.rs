//! Minimal WebSocket client speaking the tripsync frame format

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::COOKIE;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tripsync::shared::{ClientEvent, ServerEvent};

pub const RECV_TIMEOUT: Duration = Duration::from_secs(2);
pub const QUIET_PERIOD: Duration = Duration::from_millis(300);

pub struct WsClient {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    next_ack_id: u64,
}

impl WsClient {
    /// Connect, optionally presenting a `Cookie` header
    pub async fn connect(url: &str, cookie: Option<&str>) -> Self {
        let mut request = url
            .into_client_request()
            .expect("Invalid WebSocket URL");
        if let Some(cookie) = cookie {
            request.headers_mut().insert(
                COOKIE,
                HeaderValue::from_str(cookie).expect("Invalid cookie header"),
            );
        }
        let (stream, _) = tokio_tungstenite::connect_async(request)
            .await
            .expect("WebSocket handshake failed");
        Self {
            stream,
            next_ack_id: 1,
        }
    }

    /// Send a request with a fresh ack id and return that id
    pub async fn send(&mut self, event: ClientEvent) -> u64 {
        let ack_id = self.next_ack_id;
        self.next_ack_id += 1;
        let text = event.to_text(Some(ack_id)).expect("Failed to encode frame");
        self.send_raw(&text).await;
        ack_id
    }

    pub async fn send_raw(&mut self, text: &str) {
        self.stream
            .send(Message::Text(text.to_string().into()))
            .await
            .expect("Failed to send frame");
    }

    /// Next server event, skipping control frames
    pub async fn recv(&mut self) -> ServerEvent {
        loop {
            let message = timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("Timed out waiting for a frame")
                .expect("Stream ended")
                .expect("Receive error");
            match message {
                Message::Text(text) => {
                    return ServerEvent::from_text(text.as_str()).expect("Undecodable server frame")
                }
                Message::Close(frame) => panic!("Unexpected close: {:?}", frame),
                _ => continue,
            }
        }
    }

    /// Receive until an event with this wire name arrives
    pub async fn recv_named(&mut self, name: &str) -> ServerEvent {
        loop {
            let event = self.recv().await;
            if event.name() == name {
                return event;
            }
        }
    }

    /// Assert that no event arrives for a short while
    pub async fn expect_silence(&mut self) {
        if let Ok(Some(Ok(message))) = timeout(QUIET_PERIOD, self.stream.next()).await {
            if let Message::Text(text) = message {
                panic!("Expected no frames, got {}", text.as_str());
            }
        }
    }

    /// Wait for the server to close, returning the close frame
    pub async fn recv_close(&mut self) -> Option<CloseFrame> {
        loop {
            let message = timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .expect("Timed out waiting for close")?;
            match message {
                Ok(Message::Close(frame)) => return frame,
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }

    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
        // Drain until the server acknowledges the close
        while let Ok(Some(Ok(_))) = timeout(RECV_TIMEOUT, self.stream.next()).await {}
    }
}

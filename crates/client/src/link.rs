//! The WebSocket link: one connection, JSON text frames both ways.

use anyhow::Context;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use skylink_protocol::Outbound;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info};

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub type Inbox = SplitStream<WsStream>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Open,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    Text(String),
    /// Ping/pong/binary; nothing for the session.
    Ignored,
    Closed { clean: bool },
}

/// Outbound half of the connection plus its lifecycle state.
pub struct Link {
    sink: SplitSink<WsStream, Message>,
    state: ConnectionState,
}

pub async fn connect(url: &str) -> anyhow::Result<(Link, Inbox)> {
    info!(url, state = ?ConnectionState::Connecting, "connecting");
    let (ws, _response) = connect_async(url)
        .await
        .with_context(|| format!("websocket connect: {url}"))?;
    let (sink, inbox) = ws.split();
    let link = Link {
        sink,
        state: ConnectionState::Open,
    };
    info!(url, state = ?link.state, "connection opened");
    Ok((link, inbox))
}

pub fn classify(frame: Option<Result<Message, tungstenite::Error>>) -> Incoming {
    match frame {
        Some(Ok(Message::Text(text))) => Incoming::Text(text),
        Some(Ok(Message::Close(close))) => {
            debug!(?close, "close frame received");
            Incoming::Closed { clean: true }
        }
        Some(Ok(_)) => Incoming::Ignored,
        Some(Err(e)) => {
            error!(error = %e, "websocket error");
            Incoming::Closed { clean: false }
        }
        None => Incoming::Closed { clean: false },
    }
}

impl Link {
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn mark_closed(&mut self, clean: bool) {
        self.state = ConnectionState::Closed;
        if clean {
            info!(state = ?self.state, "connection closed cleanly");
        } else {
            error!(state = ?self.state, "connection died");
        }
    }

    pub async fn send(&mut self, cmd: &Outbound) -> anyhow::Result<()> {
        let text = cmd.to_text().context("encode command")?;
        self.sink
            .send(Message::Text(text))
            .await
            .with_context(|| format!("send `{}`", cmd.channel()))?;
        debug!(channel = cmd.channel(), "command sent");
        Ok(())
    }

    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        if let Err(e) = self.sink.send(Message::Close(None)).await {
            debug!(error = %e, "close frame not delivered");
        }
        self.mark_closed(true);
    }
}

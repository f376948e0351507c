use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{timeout, Duration};

use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{connect_async, tungstenite::Message, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use super::lifecycle::CloseKind;
use crate::error::MirrorError;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// What a socket task reports back to the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Opened,
    Frame(String),
    Failed(String),
    Closed(CloseKind),
}

/// A [`TransportEvent`] tagged with the attempt that produced it, so events
/// from a replaced socket can be told apart.
#[derive(Debug, Clone)]
pub struct SocketEvent {
    pub session: u64,
    pub event: TransportEvent,
}

/// Owner of one socket attempt running in the background.
///
/// Dropping the handle (or calling [`SocketHandle::close`]) asks the task to
/// send a normal-closure frame and exit. Completion is not awaited.
pub struct SocketHandle {
    session: u64,
    close_tx: Option<oneshot::Sender<()>>,
}

impl SocketHandle {
    pub fn spawn(
        session: u64,
        url: Url,
        connect_timeout: Duration,
        events: mpsc::Sender<SocketEvent>,
    ) -> Self {
        let (close_tx, close_rx) = oneshot::channel();
        tokio::spawn(run_socket(session, url, connect_timeout, events, close_rx));

        Self {
            session,
            close_tx: Some(close_tx),
        }
    }

    #[inline]
    pub fn session(&self) -> u64 {
        self.session
    }

    /// Clean close, fire and forget.
    pub fn close(mut self) {
        self.request_close();
    }

    fn request_close(&mut self) {
        if let Some(tx) = self.close_tx.take() {
            // task may already be gone
            let _ = tx.send(());
        }
    }
}

impl Drop for SocketHandle {
    fn drop(&mut self) {
        self.request_close();
    }
}

/// Map a close frame to [`CloseKind`]. Only 1000 counts as clean.
pub fn classify_close(frame: Option<&CloseFrame>) -> CloseKind {
    match frame {
        Some(frame) if frame.code == CloseCode::Normal => CloseKind::Clean,
        Some(frame) => CloseKind::Abnormal(Some(u16::from(frame.code))),
        None => CloseKind::Abnormal(None),
    }
}

async fn run_socket(
    session: u64,
    url: Url,
    connect_timeout: Duration,
    events: mpsc::Sender<SocketEvent>,
    mut close_rx: oneshot::Receiver<()>,
) {
    let emit = |event| {
        let events = events.clone();
        async move { events.send(SocketEvent { session, event }).await.is_ok() }
    };

    info!("Connecting to {}...", url);

    let attempt = tokio::select! {
        _ = &mut close_rx => {
            debug!("Attempt {} abandoned before the handshake finished", session);
            return;
        }
        result = timeout(connect_timeout, connect_async(url.as_str())) => result,
    };

    let stream = match attempt {
        Ok(Ok((stream, _))) => stream,
        Ok(Err(e)) => {
            let e = MirrorError::from(e);
            error!("Connection failed: {}", e);
            emit(TransportEvent::Failed(e.to_string())).await;
            emit(TransportEvent::Closed(CloseKind::Abnormal(None))).await;
            return;
        }
        Err(_) => {
            let e = MirrorError::ConnectTimeout(connect_timeout);
            error!("Connection failed: {}", e);
            emit(TransportEvent::Failed(e.to_string())).await;
            emit(TransportEvent::Closed(CloseKind::Abnormal(None))).await;
            return;
        }
    };

    if !emit(TransportEvent::Opened).await {
        return;
    }
    pump(stream, close_rx, emit).await;
}

async fn pump<F, Fut>(stream: WsStream, mut close_rx: oneshot::Receiver<()>, emit: F)
where
    F: Fn(TransportEvent) -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    // 'write' is only used for the closing handshake; 'read' carries the feed
    let (mut write, mut read) = stream.split();

    loop {
        tokio::select! {
            _ = &mut close_rx => {
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: String::from("client closing").into(),
                };
                if let Err(e) = write.send(Message::Close(Some(frame))).await {
                    debug!("Close frame not delivered: {}", e);
                }
                return;
            }
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        trace!("Frame: {}", &*text);
                        if !emit(TransportEvent::Frame(text.to_string())).await {
                            return; // manager gone
                        }
                    }
                    Some(Ok(Message::Binary(bytes))) => {
                        match String::from_utf8(bytes.to_vec()) {
                            Ok(text) => {
                                if !emit(TransportEvent::Frame(text)).await {
                                    return;
                                }
                            }
                            Err(_) => warn!("Dropping non-UTF-8 binary frame ({} bytes)", bytes.len()),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let kind = classify_close(frame.as_ref());
                        info!("Server closed the socket: {:?}", kind);
                        emit(TransportEvent::Closed(kind)).await;
                        return;
                    }
                    Some(Ok(_)) => {
                        // ping/pong are answered by tungstenite
                    }
                    Some(Err(e)) => {
                        error!("Websocket error: {}", e);
                        emit(TransportEvent::Failed(e.to_string())).await;
                        emit(TransportEvent::Closed(CloseKind::Abnormal(None))).await;
                        return;
                    }
                    None => {
                        warn!("Stream ended unexpectedly");
                        emit(TransportEvent::Closed(CloseKind::Abnormal(None))).await;
                        return;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_close() {
        let normal = CloseFrame {
            code: CloseCode::Normal,
            reason: String::new().into(),
        };
        let away = CloseFrame {
            code: CloseCode::Away,
            reason: String::new().into(),
        };

        assert_eq!(classify_close(Some(&normal)), CloseKind::Clean);
        assert_eq!(classify_close(Some(&away)), CloseKind::Abnormal(Some(1001)));
        assert_eq!(classify_close(None), CloseKind::Abnormal(None));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_reports_failure_then_close() {
        // port 9 on localhost is almost never listening
        let url = Url::parse("ws://127.0.0.1:9/").unwrap();
        let (tx, mut rx) = mpsc::channel(8);
        let _handle = SocketHandle::spawn(3, url, Duration::from_secs(5), tx);

        let first = rx.recv().await.unwrap();
        assert_eq!(first.session, 3);
        assert!(matches!(first.event, TransportEvent::Failed(_)));

        let second = rx.recv().await.unwrap();
        assert_eq!(second.event, TransportEvent::Closed(CloseKind::Abnormal(None)));

        // the task exits after reporting, dropping its sender
        assert!(rx.recv().await.is_none());
    }
}

//! Mock signal relay for integration tests.
//!
//! Accepts WebSocket connections, records subscribe requests and, once a
//! client subscribes, publishes the scripted payloads. Optionally closes each
//! connection after publishing to exercise reconnection.

use futures_util::{SinkExt, StreamExt};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::{accept_async, tungstenite::Message};

pub struct MockRelay {
    addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    subscriptions: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
}

impl MockRelay {
    /// Start a relay that publishes `payloads` to every subscriber.
    pub async fn start(payloads: Vec<String>, close_after_publish: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let subscriptions = Arc::new(Mutex::new(Vec::new()));
        let connections = Arc::new(Mutex::new(0));
        let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

        let subs = subscriptions.clone();
        let conns = connections.clone();
        let payloads = Arc::new(payloads);

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Ok((stream, _)) = listener.accept() => {
                        tokio::spawn(handle_connection(
                            stream,
                            payloads.clone(),
                            close_after_publish,
                            subs.clone(),
                            conns.clone(),
                        ));
                    }
                    _ = shutdown_rx.recv() => break,
                }
            }
        });

        Self {
            addr,
            shutdown_tx,
            subscriptions,
            connections,
        }
    }

    pub fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    pub async fn connection_count(&self) -> u32 {
        *self.connections.lock().await
    }

    pub async fn subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().await.clone()
    }

    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

async fn handle_connection(
    stream: TcpStream,
    payloads: Arc<Vec<String>>,
    close_after_publish: bool,
    subscriptions: Arc<Mutex<Vec<String>>>,
    connections: Arc<Mutex<u32>>,
) {
    *connections.lock().await += 1;

    let Ok(ws_stream) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws_stream.split();

    while let Some(msg) = read.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let Ok(parsed) = serde_json::from_str::<serde_json::Value>(&text) else {
                    continue;
                };
                if parsed.get("method") != Some(&serde_json::json!("subscribe")) {
                    continue;
                }
                let channel = parsed
                    .get("channel")
                    .and_then(|c| c.as_str())
                    .unwrap_or_default()
                    .to_string();
                subscriptions.lock().await.push(channel);

                for payload in payloads.iter() {
                    if write.send(Message::Text(payload.clone())).await.is_err() {
                        return;
                    }
                }
                if close_after_publish {
                    let _ = write.send(Message::Close(None)).await;
                    return;
                }
            }
            Ok(Message::Ping(data)) => {
                let _ = write.send(Message::Pong(data)).await;
            }
            Ok(Message::Close(_)) | Err(_) => break,
            _ => {}
        }
    }
}

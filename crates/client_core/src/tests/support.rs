//! In-process push server used by the transport and live-collection tests.

use std::sync::Arc;

use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    routing::get,
    Router,
};
use tokio::{
    net::TcpListener,
    sync::{mpsc, Mutex},
};

pub(crate) enum Push {
    Text(String),
    Binary(Vec<u8>),
    Close,
}

type PushQueue = Arc<Mutex<Option<mpsc::UnboundedReceiver<Push>>>>;

/// Serves one WebSocket connection on `path`, forwarding queued pushes in order.
///
/// Pushes queued before the client connects are delivered once it does.
pub(crate) async fn spawn_push_server(path: &'static str) -> (String, mpsc::UnboundedSender<Push>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let (tx, rx) = mpsc::unbounded_channel();
    let queue: PushQueue = Arc::new(Mutex::new(Some(rx)));
    let app = Router::new().route(
        path,
        get(move |ws: WebSocketUpgrade| {
            let queue = Arc::clone(&queue);
            async move { ws.on_upgrade(move |socket| serve_pushes(socket, queue)) }
        }),
    );
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("ws://{addr}{path}"), tx)
}

async fn serve_pushes(mut socket: WebSocket, queue: PushQueue) {
    let Some(mut rx) = queue.lock().await.take() else {
        return;
    };
    while let Some(push) = rx.recv().await {
        let frame = match push {
            Push::Text(text) => Message::Text(text),
            Push::Binary(bytes) => Message::Binary(bytes),
            Push::Close => {
                let _ = socket.send(Message::Close(None)).await;
                return;
            }
        };
        if socket.send(frame).await.is_err() {
            return;
        }
    }
}

/// A loopback address with nothing listening on it.
pub(crate) async fn unused_ws_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("ws://{addr}/ws")
}

//! Per-connection read loop.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::channel::WsChannel;
use crate::dispatcher::{Dispatched, Dispatcher};
use crate::registry::{Channel, ChannelId};

type WsSink = SplitSink<WebSocketStream<TcpStream>, Message>;

/// Serves one upgraded WebSocket connection until either side closes it.
///
/// Every text or binary message is handed to the dispatcher as one payload.
/// When the connection ends, the ids it registered are released, unless a
/// newer connection has since taken them over.
pub async fn serve(
    ws: WebSocketStream<TcpStream>,
    peer_addr: SocketAddr,
    channel_id: ChannelId,
    dispatcher: Dispatcher,
) {
    let (sink, mut stream) = ws.split();
    let (ws_channel, rx) = WsChannel::new(channel_id);
    let channel: Arc<dyn Channel> = Arc::new(ws_channel);
    let mut writer = tokio::spawn(write_loop(sink, rx, channel_id));
    let mut writer_done = false;

    // Ids registered over this socket, released on close.
    let mut registered: HashSet<String> = HashSet::new();

    info!(peer = %peer_addr, channel = %channel_id, "websocket connected");

    loop {
        let outcome = tokio::select! {
            incoming = stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => dispatcher.handle_payload(text.as_bytes(), &channel),
                Some(Ok(Message::Binary(data))) => dispatcher.handle_payload(&data, &channel),
                Some(Ok(Message::Close(_))) | None => break,
                // Ping/pong are answered by tungstenite itself.
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!(peer = %peer_addr, channel = %channel_id, error = %e, "websocket read failed");
                    break;
                }
            },
            _ = &mut writer => {
                writer_done = true;
                break;
            }
        };

        if let Dispatched::Registered { id, .. } = outcome {
            registered.insert(id);
        }
    }

    for id in &registered {
        if dispatcher
            .registry()
            .remove_if_channel(id, channel_id)
            .is_some()
        {
            debug!(id = %id, channel = %channel_id, "released registration on close");
        }
    }

    if !writer_done {
        channel.close();
        if let Err(e) = writer.await {
            debug!(channel = %channel_id, error = %e, "writer task ended abnormally");
        }
    }

    info!(peer = %peer_addr, channel = %channel_id, "websocket closed");
}

/// Drains queued frames into the socket until the queue closes, a close
/// frame is sent, or the socket fails.
async fn write_loop(mut sink: WsSink, mut rx: mpsc::UnboundedReceiver<Message>, id: ChannelId) {
    while let Some(message) = rx.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(e) = sink.send(message).await {
            debug!(channel = %id, error = %e, "websocket write failed");
            break;
        }
        if closing {
            break;
        }
    }
    // Dropping the receiver here makes every later `send` on the channel fail.
    drop(rx);
    let _ = sink.close().await;
}

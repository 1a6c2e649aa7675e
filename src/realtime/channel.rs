//! [`Channel`] implementation backed by a WebSocket writer task.

use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;

use crate::registry::{Channel, ChannelError, ChannelId};

/// Send handle for one WebSocket connection.
///
/// Frames are pushed onto an unbounded queue drained by the connection's
/// writer task. Once that task is gone every send fails with
/// [`ChannelError::Closed`].
#[derive(Debug)]
pub struct WsChannel {
    id: ChannelId,
    tx: mpsc::UnboundedSender<Message>,
}

impl WsChannel {
    /// Creates a channel and the receiving end its writer task must drain.
    pub fn new(id: ChannelId) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { id, tx }, rx)
    }
}

impl Channel for WsChannel {
    fn id(&self) -> ChannelId {
        self.id
    }

    fn send(&self, frame: &str) -> Result<(), ChannelError> {
        self.tx
            .send(Message::Text(frame.to_owned().into()))
            .map_err(|_| ChannelError::Closed(self.id))
    }

    fn close(&self) {
        // Already-closed is fine: the socket is gone either way.
        let _ = self.tx.send(Message::Close(None));
    }
}

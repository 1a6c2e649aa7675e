//! Send handle abstraction over a live transport connection.

use std::fmt;

use thiserror::Error;

/// Process-unique identifier of one transport connection.
///
/// Two registry entries holding the same `ChannelId` share the same socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Wraps a raw connection number.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Errors returned by [`Channel::send`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// The transport behind this channel is gone.
    #[error("channel {0} is closed")]
    Closed(ChannelId),
}

/// A send-capable handle to a client connection.
///
/// The registry stores these behind an `Arc`; the transport layer owns the
/// actual socket. Implementations must not block: `send` enqueues a frame
/// and reports immediately whether the channel can still accept it.
pub trait Channel: Send + Sync + fmt::Debug {
    /// Identifier of the underlying transport connection.
    fn id(&self) -> ChannelId;

    /// Enqueues one text frame for delivery.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Closed`] when the transport is dead.
    fn send(&self, frame: &str) -> Result<(), ChannelError>;

    /// Asks the transport to close the connection. Best-effort, never fails.
    fn close(&self);
}

#[cfg(test)]
pub(crate) mod mock {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};

    use super::*;

    /// In-memory channel that records frames and can be told to fail.
    #[derive(Debug)]
    pub(crate) struct MockChannel {
        id: ChannelId,
        frames: Mutex<Vec<String>>,
        failing: AtomicBool,
        closed: AtomicBool,
    }

    impl MockChannel {
        pub(crate) fn new(id: u64) -> Arc<Self> {
            Arc::new(Self {
                id: ChannelId::new(id),
                frames: Mutex::new(Vec::new()),
                failing: AtomicBool::new(false),
                closed: AtomicBool::new(false),
            })
        }

        pub(crate) fn failing(id: u64) -> Arc<Self> {
            let channel = Self::new(id);
            channel.failing.store(true, Ordering::SeqCst);
            channel
        }

        pub(crate) fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }

        pub(crate) fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    impl Channel for MockChannel {
        fn id(&self) -> ChannelId {
            self.id
        }

        fn send(&self, frame: &str) -> Result<(), ChannelError> {
            if self.failing.load(Ordering::SeqCst) || self.is_closed() {
                return Err(ChannelError::Closed(self.id));
            }
            self.frames.lock().unwrap().push(frame.to_owned());
            Ok(())
        }

        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }
}

//! Per-connection handles and outbound delivery
//!
//! A [`Connection`] is the cheap, cloneable handle the registries hold for a
//! connected peer. Frames pushed through it land in an unbounded queue that a
//! dedicated writer task drains onto the socket, so queuing a frame never
//! blocks the caller. Closing the handle signals both the writer and the
//! reader loop of that peer.
//!
//! The [`Outbox`] collects frames produced while the registries are locked
//! and delivers them once the locks are released.

use log::{debug, warn};
use shared::{write_frame, Frame, MessageType};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, watch};

/// How long a closing writer may spend flushing frames queued before the close
pub const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);
/// A peer that accepts no bytes for this long is treated as gone
pub const WRITE_TIMEOUT: Duration = Duration::from_secs(5);

pub type ConnectionId = u64;

/// Handle to one connected peer
#[derive(Debug, Clone)]
pub struct Connection {
    id: ConnectionId,
    peer: SocketAddr,
    outgoing: mpsc::UnboundedSender<Frame>,
    closed: Arc<watch::Sender<bool>>,
}

/// Receiving ends owned by the connection's writer task
#[derive(Debug)]
pub struct ConnectionIo {
    pub outgoing: mpsc::UnboundedReceiver<Frame>,
    pub closed: watch::Receiver<bool>,
}

impl Connection {
    pub fn new(id: ConnectionId, peer: SocketAddr) -> (Connection, ConnectionIo) {
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (closed_tx, closed_rx) = watch::channel(false);

        let connection = Connection {
            id,
            peer,
            outgoing: outgoing_tx,
            closed: Arc::new(closed_tx),
        };
        let io = ConnectionIo {
            outgoing: outgoing_rx,
            closed: closed_rx,
        };
        (connection, io)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Queues a frame for the writer; returns false once the writer is gone
    pub fn send(&self, frame: Frame) -> bool {
        let msg_type = frame.msg_type;
        if self.outgoing.send(frame).is_err() {
            debug!("Dropping {} for closed connection {}", msg_type, self.peer);
            return false;
        }
        true
    }

    /// Asks the reader and writer of this peer to shut down
    pub fn close(&self) {
        self.closed.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.borrow()
    }

    /// New subscription to the close signal
    pub fn close_signal(&self) -> watch::Receiver<bool> {
        self.closed.subscribe()
    }
}

/// Resolves once the close flag is set or its sender is dropped
pub async fn wait_closed(closed: &mut watch::Receiver<bool>) {
    while !*closed.borrow_and_update() {
        if closed.changed().await.is_err() {
            return;
        }
    }
}

/// Drains queued frames onto `writer` until the connection closes
///
/// Queued frames take priority over the close signal, so a final `ERRR` or
/// `LBBY` pushed just before a close still reaches the peer.
pub async fn run_writer<W>(mut writer: W, io: ConnectionIo, peer: SocketAddr)
where
    W: AsyncWrite + Unpin,
{
    let ConnectionIo {
        mut outgoing,
        mut closed,
    } = io;

    loop {
        let frame = tokio::select! {
            biased;
            frame = outgoing.recv() => frame,
            _ = wait_closed(&mut closed) => None,
        };
        let Some(frame) = frame else {
            break;
        };

        match tokio::time::timeout(WRITE_TIMEOUT, write_frame(&mut writer, &frame)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Failed to send {} to {}: {}", frame.msg_type, peer, e);
                break;
            }
            Err(_) => {
                warn!("Timed out sending {} to {}", frame.msg_type, peer);
                break;
            }
        }
    }

    let flush = async {
        while let Ok(frame) = outgoing.try_recv() {
            if write_frame(&mut writer, &frame).await.is_err() {
                break;
            }
        }
    };
    if tokio::time::timeout(FLUSH_TIMEOUT, flush).await.is_err() {
        debug!("Gave up flushing to {}", peer);
    }
    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of {} failed: {}", peer, e);
    }
    debug!("Writer for {} finished", peer);
}

/// Frames waiting to be delivered once the registry locks are dropped
#[derive(Debug, Default)]
pub struct Outbox {
    frames: Vec<(Connection, Frame)>,
    closing: Vec<Connection>,
}

impl Outbox {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, connection: &Connection, msg_type: MessageType, payload: impl Into<String>) {
        self.frames
            .push((connection.clone(), Frame::new(msg_type, payload)));
    }

    /// Closes `connection` once all frames in the outbox have been handed over
    pub fn close(&mut self, connection: &Connection) {
        self.closing.push(connection.clone());
    }

    /// Hands every frame to its writer, then applies the queued closes
    pub fn deliver(self) {
        for (connection, frame) in self.frames {
            connection.send(frame);
        }
        for connection in self.closing {
            connection.close();
        }
    }
}

#[cfg(test)]
impl Outbox {
    /// Frames queued for one connection, in order
    pub(crate) fn frames_for(&self, id: ConnectionId) -> Vec<&Frame> {
        self.frames
            .iter()
            .filter(|(connection, _)| connection.id() == id)
            .map(|(_, frame)| frame)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr() -> SocketAddr {
        "127.0.0.1:10000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_send_and_close() {
        let (connection, mut io) = Connection::new(1, addr());
        assert!(connection.send(Frame::new(MessageType::Ping, "")));
        assert_eq!(
            io.outgoing.recv().await.unwrap(),
            Frame::new(MessageType::Ping, "")
        );

        assert!(!connection.is_closed());
        connection.close();
        assert!(connection.is_closed());
        wait_closed(&mut io.closed).await;
    }

    #[tokio::test]
    async fn test_outbox_delivers_in_order_then_closes() {
        let (connection, mut io) = Connection::new(2, addr());
        let mut outbox = Outbox::new();
        outbox.push(&connection, MessageType::Error, "Invalid data");
        outbox.close(&connection);
        outbox.push(&connection, MessageType::Notice, "late");
        assert_eq!(outbox.frames_for(2).len(), 2);

        outbox.deliver();
        assert!(connection.is_closed());
        assert_eq!(io.outgoing.recv().await.unwrap().msg_type, MessageType::Error);
        assert_eq!(io.outgoing.recv().await.unwrap().msg_type, MessageType::Notice);
    }

    #[tokio::test]
    async fn test_writer_flushes_queued_frames_on_close() {
        let (connection, io) = Connection::new(3, addr());
        connection.send(Frame::new(MessageType::Error, "Invalid data"));
        connection.close();

        let writer = tokio_test::io::Builder::new()
            .write(b"JOKEERRR0012Invalid data")
            .build();
        run_writer(writer, io, addr()).await;
    }

    /// Accepts every byte but refuses to shut down, like a reset socket
    struct ResetOnShutdown(Vec<u8>);

    impl AsyncWrite for ResetOnShutdown {
        fn poll_write(
            mut self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.0.extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }

        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }

        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Err(std::io::ErrorKind::ConnectionReset.into()))
        }
    }

    #[tokio::test]
    async fn test_writer_finishes_when_shutdown_fails() {
        let (connection, io) = Connection::new(4, addr());
        connection.send(Frame::new(MessageType::Ping, ""));
        connection.close();

        let mut writer = ResetOnShutdown(Vec::new());
        tokio::time::timeout(Duration::from_secs(2), run_writer(&mut writer, io, addr()))
            .await
            .unwrap();
        assert_eq!(writer.0, b"JOKEPING0000");
    }
}

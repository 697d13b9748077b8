//! Server network layer: TCP listener and per-connection workers
//!
//! The listener accepts peers and spawns one worker per connection. A worker
//! owns the read half of its socket and runs frames through the
//! [`Dispatcher`]; the write half belongs to a separate writer task fed by
//! the connection's queue. The sweeper runs alongside as its own task.

use crate::config::ServerConfig;
use crate::connection::{run_writer, wait_closed, Connection, ConnectionId};
use crate::dispatcher::{Dispatcher, Flow};
use crate::registry::Registries;
use crate::sweeper;
use log::{debug, error, info, warn};
use shared::{read_frame, Frame, MessageType};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

/// Card server bound to a TCP port
pub struct Server {
    listener: TcpListener,
    dispatcher: Arc<Dispatcher>,
    next_connection: ConnectionId,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        let registries = Arc::new(Registries::new(&config));
        info!(
            "{} session slots, {} room slots, reconnect window {:?}",
            config.max_sessions, config.max_rooms, config.reconnect_timeout
        );

        Ok(Server {
            listener,
            dispatcher: Arc::new(Dispatcher::new(registries, Arc::new(config))),
            next_connection: 0,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn dispatcher(&self) -> Arc<Dispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Accepts connections until the listener fails
    pub async fn run(mut self) -> Result<(), Box<dyn std::error::Error>> {
        tokio::spawn(sweeper::run(Arc::clone(&self.dispatcher)));
        info!("Server started successfully");

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
                    continue;
                }
            };

            self.next_connection += 1;
            let id = self.next_connection;
            let dispatcher = Arc::clone(&self.dispatcher);
            tokio::spawn(async move {
                handle_connection(dispatcher, stream, peer, id).await;
            });
        }
    }
}

/// Drives one peer from accept to teardown
async fn handle_connection(
    dispatcher: Arc<Dispatcher>,
    stream: TcpStream,
    peer: SocketAddr,
    id: ConnectionId,
) {
    debug!("Accepted {} as connection {}", peer, id);
    if let Err(e) = stream.set_nodelay(true) {
        debug!("Could not disable Nagle for {}: {}", peer, e);
    }

    let (reader, writer) = stream.into_split();
    let (connection, io) = Connection::new(id, peer);
    let writer_task = tokio::spawn(run_writer(writer, io, peer));

    let Some(mut slot) = dispatcher.accept(&connection).await else {
        let _ = writer_task.await;
        return;
    };

    let mut reader = BufReader::new(reader);
    let mut closed = connection.close_signal();

    loop {
        let result = tokio::select! {
            result = read_frame(&mut reader) => result,
            _ = wait_closed(&mut closed) => break,
        };

        match result {
            Ok(frame) => {
                debug!("{} -> {} {:?}", peer, frame.msg_type, frame.payload);
                if dispatcher.handle_frame(&mut slot, &connection, frame).await == Flow::Disconnect {
                    break;
                }
            }
            Err(e) if e.is_transport() => {
                info!("Connection {} from {} closed: {}", id, peer, e);
                break;
            }
            Err(e) => {
                warn!("Protocol error from {}: {}", peer, e);
                connection.send(Frame::new(MessageType::Error, "Invalid data"));
                break;
            }
        }
    }

    dispatcher.handle_disconnect(slot, &connection).await;
    connection.close();
    if writer_task.await.is_err() {
        error!("Writer task for {} panicked", peer);
    }
    debug!("Connection {} from {} finished", id, peer);
}

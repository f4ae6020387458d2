//! Client session
//!
//! One accepted client connection paired with one dialed remote connection.

use log::{debug, error, info};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpStream;
use uuid::Uuid;

use super::connection::SafeConnection;
use super::pipe::InterceptPipe;
use super::server::Shared;
use super::stop::StopSignal;
use super::types::Direction;

/// A single client session
pub(crate) struct Session {
    id: Uuid,
    shared: Arc<Shared>,
    signal: StopSignal,
    client_addr: SocketAddr,
}

impl Session {
    pub(crate) fn new(shared: Arc<Shared>, signal: StopSignal, client_addr: SocketAddr) -> Self {
        Self {
            id: Uuid::new_v4(),
            shared,
            signal,
            client_addr,
        }
    }

    /// Dial the remote and relay both directions until both pipes end
    pub(crate) async fn run(self, client: TcpStream) {
        debug!("[{}] Handling connection from {}", self.id, self.client_addr);

        let remote = match TcpStream::connect(self.shared.target_addr.as_str()).await {
            Ok(stream) => stream,
            Err(e) => {
                error!(
                    "[{}] Error dialing remote host {}: {}",
                    self.id, self.shared.target_addr, e
                );
                return;
            }
        };

        for stream in [&client, &remote] {
            if let Err(e) = stream.set_nodelay(true) {
                debug!("[{}] Failed to set TCP_NODELAY: {}", self.id, e);
            }
        }

        let remote_addr = remote
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| self.shared.target_addr.clone());
        info!("[{}] {} <-> {}", self.id, self.client_addr, remote_addr);

        let (client_read, client_write) = client.into_split();
        let (remote_read, remote_write) = remote.into_split();
        let client_conn = Arc::new(SafeConnection::new(client_write, self.client_addr.to_string()));
        let remote_conn = Arc::new(SafeConnection::new(remote_write, remote_addr));

        // One task per direction; each pipe spawns its own drain
        let upstream = InterceptPipe::new(
            Arc::clone(&self.shared),
            self.signal.clone(),
            self.id,
            Direction::Client,
            remote_conn,
        );
        let downstream = InterceptPipe::new(
            Arc::clone(&self.shared),
            self.signal.clone(),
            self.id,
            Direction::Remote,
            client_conn,
        );
        let upstream = tokio::spawn(upstream.run(client_read));
        let downstream = tokio::spawn(downstream.run(remote_read));

        let (up, down) = tokio::join!(upstream, downstream);
        for (direction, result) in [(Direction::Client, up), (Direction::Remote, down)] {
            if let Err(e) = result {
                error!("[{}] {} pipe panicked: {}", self.id, direction, e);
            }
        }
        info!("[{}] Session with {} ended", self.id, self.client_addr);
    }
}

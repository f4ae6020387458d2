//! Out-of-band byte injection
//!
//! Each direction has one buffer, shared by every session of a proxy. Callers
//! append to it at any time; a drain running next to each pipe takes the whole
//! buffer in one step and writes it to the pipe's destination. Buffers live in
//! the server state and are only touched under the server lock.

use bytes::{Bytes, BytesMut};
use log::{debug, error, info};
use std::sync::Arc;
use tokio::io::AsyncWrite;
use tokio::sync::Notify;
use uuid::Uuid;

use crate::common::escape_bytes;
use super::connection::SafeConnection;
use super::server::Shared;
use super::stop::StopSignal;
use super::types::Direction;

/// Pending injected bytes, one buffer per direction
#[derive(Debug, Default)]
pub(crate) struct InjectionBuffers {
    client: BytesMut,
    remote: BytesMut,
}

impl InjectionBuffers {
    fn buffer(&self, direction: Direction) -> &BytesMut {
        match direction {
            Direction::Client => &self.client,
            Direction::Remote => &self.remote,
        }
    }

    fn buffer_mut(&mut self, direction: Direction) -> &mut BytesMut {
        match direction {
            Direction::Client => &mut self.client,
            Direction::Remote => &mut self.remote,
        }
    }

    pub(crate) fn append(&mut self, direction: Direction, bytes: &[u8]) {
        self.buffer_mut(direction).extend_from_slice(bytes);
    }

    /// Take everything queued for `direction`, leaving the buffer empty
    pub(crate) fn take(&mut self, direction: Direction) -> Option<Bytes> {
        let buffer = self.buffer_mut(direction);
        if buffer.is_empty() {
            None
        } else {
            Some(buffer.split().freeze())
        }
    }

    pub(crate) fn clear(&mut self, direction: Direction) {
        self.buffer_mut(direction).clear();
    }

    pub(crate) fn len(&self, direction: Direction) -> usize {
        self.buffer(direction).len()
    }
}

/// Wake-ups for drains waiting on an empty buffer
#[derive(Debug, Default)]
pub(crate) struct InjectionWakers {
    client: Notify,
    remote: Notify,
}

impl InjectionWakers {
    pub(crate) fn get(&self, direction: Direction) -> &Notify {
        match direction {
            Direction::Client => &self.client,
            Direction::Remote => &self.remote,
        }
    }
}

/// Drain of one direction's injection buffer into one destination
pub(crate) struct Drain<W> {
    shared: Arc<Shared>,
    signal: StopSignal,
    finished: StopSignal,
    session: Uuid,
    direction: Direction,
    dest: Arc<SafeConnection<W>>,
}

impl<W> Drain<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// # Parameters
    ///
    /// * `signal` - Proxy stop signal
    /// * `finished` - Closed when the owning pipe ends
    pub(crate) fn new(
        shared: Arc<Shared>,
        signal: StopSignal,
        finished: StopSignal,
        session: Uuid,
        direction: Direction,
        dest: Arc<SafeConnection<W>>,
    ) -> Self {
        Self { shared, signal, finished, session, direction, dest }
    }

    /// Flush injected bytes until the proxy stops, the pipe ends or a write fails
    pub(crate) async fn run(self) {
        let waker = self.shared.wakers.get(self.direction);

        loop {
            if self.signal.is_closed() || self.finished.is_closed() {
                break;
            }

            // Created before the buffer check so an append racing with it still wakes us
            let notified = waker.notified();

            if let Some(bytes) = self.shared.take_injected(self.direction) {
                info!(
                    "[{}] Writing {} injected {} bytes to {}",
                    self.session,
                    bytes.len(),
                    self.direction,
                    self.dest.peer()
                );
                debug!("[{}] Injected data: {}", self.session, escape_bytes(&bytes));

                if let Err(e) = self.dest.write_all(&bytes).await {
                    error!(
                        "[{}] Error writing injected bytes to {}: {}",
                        self.session,
                        self.dest.peer(),
                        e
                    );
                    self.shared.on_failure(&self.signal);
                    return;
                }
                continue;
            }

            tokio::select! {
                _ = notified => {}
                _ = self.signal.closed() => break,
                _ = self.finished.closed() => break,
            }
        }

        // Hand queued bytes over to a drain that is still alive
        if self.shared.pending(self.direction) > 0 {
            waker.notify_one();
        }
        debug!("[{}] Injection drain for {} ended", self.session, self.direction);
    }
}

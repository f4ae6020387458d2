//! Write-serialized connection wrapper
//!
//! Both the relay pipe and the injection drain write to the same destination.
//! Every write goes through one async mutex so their bytes never interleave.
//! The read side is not wrapped: each connection has exactly one reader.

use std::io;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::Mutex;

/// Connection whose writes are serialized behind an exclusive lock
#[derive(Debug)]
pub struct SafeConnection<W> {
    writer: Mutex<W>,
    peer: String,
}

impl<W> SafeConnection<W>
where
    W: AsyncWrite + Unpin + Send,
{
    /// Wrap the write side of a connection
    ///
    /// # Parameters
    ///
    /// * `writer` - Write half of the underlying stream
    /// * `peer` - Peer description used in log messages
    pub fn new(writer: W, peer: impl Into<String>) -> Self {
        Self {
            writer: Mutex::new(writer),
            peer: peer.into(),
        }
    }

    /// Peer description
    pub fn peer(&self) -> &str {
        &self.peer
    }

    /// Write the whole buffer and flush it, holding the lock throughout
    pub async fn write_all(&self, buf: &[u8]) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.write_all(buf).await?;
        writer.flush().await
    }

    /// Shut down the write side
    pub async fn shutdown(&self) -> io::Result<()> {
        let mut writer = self.writer.lock().await;
        writer.shutdown().await
    }
}

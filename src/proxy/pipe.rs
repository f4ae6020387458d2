//! Frame relay in one direction
//!
//! A pipe reads delimiter-terminated frames from its source, runs the
//! direction's handler on each one and writes non-empty results to the
//! destination under the destination's write lock. The injection drain for
//! the same destination runs as its own task and ends with the pipe, after
//! which the destination's write side is shut down.

use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, BufReader};
use uuid::Uuid;

use crate::common::escape_bytes;
use super::connection::SafeConnection;
use super::injector::Drain;
use super::server::Shared;
use super::stop::StopSignal;
use super::types::Direction;

/// One direction of a session
pub(crate) struct InterceptPipe<W> {
    shared: Arc<Shared>,
    signal: StopSignal,
    session: Uuid,
    direction: Direction,
    dest: Arc<SafeConnection<W>>,
}

impl<W> InterceptPipe<W>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    /// # Parameters
    ///
    /// * `shared` - Proxy state (handlers, delimiter, injection buffers)
    /// * `signal` - Stop signal of the proxy run this session belongs to
    /// * `session` - Session id for log messages
    /// * `direction` - Side the frames are read from
    /// * `dest` - Connection the frames are written to
    pub(crate) fn new(
        shared: Arc<Shared>,
        signal: StopSignal,
        session: Uuid,
        direction: Direction,
        dest: Arc<SafeConnection<W>>,
    ) -> Self {
        Self { shared, signal, session, direction, dest }
    }

    /// Relay frames from `source` until it ends, a write fails or the proxy stops
    ///
    /// The drain is spawned on its own task; the relay runs on the caller's.
    pub(crate) async fn run<R>(self, source: R)
    where
        R: AsyncRead + Unpin,
    {
        let finished = StopSignal::new();
        let drain = tokio::spawn(
            Drain::new(
                Arc::clone(&self.shared),
                self.signal.clone(),
                finished.clone(),
                self.session,
                self.direction,
                Arc::clone(&self.dest),
            )
            .run(),
        );

        self.relay(source).await;
        finished.close();

        if let Err(e) = drain.await {
            error!("[{}] {} injection drain panicked: {}", self.session, self.direction, e);
        }

        // Nothing writes to `dest` any more; pass the end of stream on
        if let Err(e) = self.dest.shutdown().await {
            debug!("[{}] Error closing {}: {}", self.session, self.dest.peer(), e);
        }
    }

    async fn relay<R>(&self, source: R)
    where
        R: AsyncRead + Unpin,
    {
        let handler = self.shared.handler(self.direction);
        let delimiter = self.shared.delimiter;
        let mut reader = BufReader::new(source);
        let mut frame = Vec::new();

        loop {
            if self.signal.is_closed() {
                debug!("[{}] Proxy stopped, ending {} pipe", self.session, self.direction);
                return;
            }

            frame.clear();
            match reader.read_until(delimiter, &mut frame).await {
                Ok(0) => {
                    info!("[{}] {} side closed the connection", self.session, self.direction);
                    break;
                }
                Ok(n) if frame.last() != Some(&delimiter) => {
                    warn!(
                        "[{}] {} side closed mid-frame, discarding {} bytes",
                        self.session, self.direction, n
                    );
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    error!("[{}] Error reading from {} side: {}", self.session, self.direction, e);
                    break;
                }
            }

            let out = handler.transform(&frame);
            if out.is_empty() {
                debug!("[{}] Suppressed {} frame: {}", self.session, self.direction, escape_bytes(&frame));
                continue;
            }
            debug!(
                "[{}] {} frame {} -> {}",
                self.session,
                self.direction,
                escape_bytes(&frame),
                escape_bytes(&out)
            );

            if let Err(e) = self.dest.write_all(&out).await {
                error!("[{}] Error writing to {}: {}", self.session, self.dest.peer(), e);
                break;
            }
        }

        self.shared.on_failure(&self.signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    use crate::proxy::handler::MockFrameHandler;
    use crate::proxy::server::ProxyServer;
    use crate::proxy::types::FailurePolicy;

    fn server_with(
        client: impl crate::proxy::FrameHandler + 'static,
        policy: FailurePolicy,
    ) -> ProxyServer {
        ProxyServer::builder("127.0.0.1:0", "127.0.0.1:1")
            .client_handler(client)
            .delimiter(b'\n')
            .failure_policy(policy)
            .build()
    }

    fn client_pipe(
        server: &ProxyServer,
        signal: &StopSignal,
        dest: &Arc<SafeConnection<DuplexStream>>,
    ) -> InterceptPipe<DuplexStream> {
        InterceptPipe::new(
            server.shared(),
            signal.clone(),
            Uuid::new_v4(),
            Direction::Client,
            Arc::clone(dest),
        )
    }

    /// Run a client-direction pipe over in-memory streams, feeding it `input`
    /// and returning everything written to the destination.
    async fn relay_through(server: &ProxyServer, input: &[u8]) -> Vec<u8> {
        let signal = StopSignal::new();
        let (mut src_tx, src_rx) = tokio::io::duplex(1024);
        let (dst_w, mut dst_r) = tokio::io::duplex(1024);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));

        src_tx.write_all(input).await.unwrap();
        drop(src_tx);

        client_pipe(server, &signal, &dest).run(src_rx).await;
        drop(dest);

        let mut out = Vec::new();
        dst_r.read_to_end(&mut out).await.unwrap();
        out
    }

    /// Pipe whose destination reader is already gone, fed one frame
    async fn relay_into_closed_destination(server: &ProxyServer, signal: &StopSignal) {
        let (mut src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_w, dst_r) = tokio::io::duplex(64);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));
        drop(dst_r);

        src_tx.write_all(b"frame\n").await.unwrap();

        tokio::time::timeout(
            Duration::from_secs(2),
            client_pipe(server, signal, &dest).run(src_rx),
        )
        .await
        .expect("pipe should end after the write failure");
        drop(src_tx);
    }

    #[tokio::test]
    async fn test_frames_split_on_delimiter() {
        let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
        let recorder = {
            let seen = Arc::clone(&seen);
            move |frame: &[u8]| -> Vec<u8> {
                seen.lock().unwrap().push(frame.to_vec());
                frame.to_vec()
            }
        };
        let server = server_with(recorder, FailurePolicy::Session);

        let out = relay_through(&server, b"one\ntwo\n\nthree\n").await;

        assert_eq!(out, b"one\ntwo\n\nthree\n");
        let frames = seen.lock().unwrap().clone();
        assert_eq!(
            frames,
            vec![b"one\n".to_vec(), b"two\n".to_vec(), b"\n".to_vec(), b"three\n".to_vec()]
        );
    }

    #[tokio::test]
    async fn test_empty_result_suppresses_frame() {
        let mut handler = MockFrameHandler::new();
        handler
            .expect_transform()
            .withf(|frame: &[u8]| frame == b"secret\n")
            .times(1)
            .returning(|_| Vec::new());
        handler
            .expect_transform()
            .returning(|frame: &[u8]| frame.to_vec());
        let server = server_with(handler, FailurePolicy::Session);

        let out = relay_through(&server, b"a\nsecret\nb\n").await;
        assert_eq!(out, b"a\nb\n");
    }

    #[tokio::test]
    async fn test_result_length_may_differ() {
        let server = server_with(
            |frame: &[u8]| -> Vec<u8> { [frame, frame].concat() },
            FailurePolicy::Session,
        );
        let out = relay_through(&server, b"x\n").await;
        assert_eq!(out, b"x\nx\n");
    }

    #[tokio::test]
    async fn test_trailing_partial_frame_is_discarded() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Session);
        let out = relay_through(&server, b"whole\npart").await;
        assert_eq!(out, b"whole\n");
    }

    #[tokio::test]
    async fn test_destination_closed_when_pipe_ends() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Session);
        let signal = StopSignal::new();

        let (mut src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_w, mut dst_r) = tokio::io::duplex(64);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));

        src_tx.write_all(b"last\n").await.unwrap();
        drop(src_tx);
        client_pipe(&server, &signal, &dest).run(src_rx).await;

        // `dest` is still alive, yet the reader sees end of stream
        let mut out = Vec::new();
        tokio::time::timeout(Duration::from_secs(2), dst_r.read_to_end(&mut out))
            .await
            .expect("destination should be shut down")
            .unwrap();
        assert_eq!(out, b"last\n");
        drop(dest);
    }

    #[tokio::test]
    async fn test_end_of_stream_applies_global_policy() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Global);
        server.start().await.unwrap();
        let signal = server.shared().current_signal();

        let (src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_w, _dst_r) = tokio::io::duplex(64);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));
        drop(src_tx);

        client_pipe(&server, &signal, &dest).run(src_rx).await;

        assert!(server.stopped());
        assert!(signal.is_closed());
    }

    #[tokio::test]
    async fn test_end_of_stream_under_session_policy_keeps_server() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Session);
        server.start().await.unwrap();
        let signal = server.shared().current_signal();

        let (src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_w, _dst_r) = tokio::io::duplex(64);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));
        drop(src_tx);

        client_pipe(&server, &signal, &dest).run(src_rx).await;

        assert!(!server.stopped());
        server.stop();
    }

    #[tokio::test]
    async fn test_write_failure_applies_global_policy() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Global);
        server.start().await.unwrap();
        let signal = server.shared().current_signal();

        relay_into_closed_destination(&server, &signal).await;

        assert!(signal.is_closed());
        assert!(server.stopped());
    }

    #[tokio::test]
    async fn test_write_failure_under_session_policy_keeps_server() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Session);
        server.start().await.unwrap();
        let signal = server.shared().current_signal();

        relay_into_closed_destination(&server, &signal).await;

        assert!(!signal.is_closed());
        assert!(!server.stopped());
        server.stop();
    }

    #[tokio::test]
    async fn test_injection_flushed_while_idle() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Session);
        let signal = StopSignal::new();

        let (mut src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_w, mut dst_r) = tokio::io::duplex(64);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));

        let pipe = client_pipe(&server, &signal, &dest).run(src_rx);

        let driver = async {
            server.inject(Direction::Client, b"X");
            let mut buf = [0u8; 1];
            tokio::time::timeout(Duration::from_secs(2), dst_r.read_exact(&mut buf))
                .await
                .expect("injected byte should arrive")
                .unwrap();
            assert_eq!(&buf, b"X");
            assert_eq!(server.pending(Direction::Client), 0);

            src_tx.write_all(b"after\n").await.unwrap();
            let mut frame = [0u8; 6];
            dst_r.read_exact(&mut frame).await.unwrap();
            assert_eq!(&frame, b"after\n");
            drop(src_tx);
        };

        tokio::join!(pipe, driver);
    }

    #[tokio::test]
    async fn test_stop_ends_idle_drain_and_pipe_between_frames() {
        let server = server_with(crate::proxy::Passthrough, FailurePolicy::Session);
        let signal = StopSignal::new();

        let (mut src_tx, src_rx) = tokio::io::duplex(64);
        let (dst_w, mut dst_r) = tokio::io::duplex(64);
        let dest = Arc::new(SafeConnection::new(dst_w, "dest"));

        let pipe = client_pipe(&server, &signal, &dest).run(src_rx);

        let driver = async {
            src_tx.write_all(b"one\n").await.unwrap();
            let mut frame = [0u8; 4];
            dst_r.read_exact(&mut frame).await.unwrap();
            signal.close();
            // The blocked read only returns once another frame arrives
            src_tx.write_all(b"two\n").await.unwrap();
        };

        tokio::time::timeout(Duration::from_secs(2), async { tokio::join!(pipe, driver) })
            .await
            .expect("pipe should end after stop");
    }
}

//! Proxy server module
//!
//! This module implements the listening side of the relay: lifecycle
//! (start/stop), the accept loop, and the control surface for injecting
//! bytes into running sessions.
//!
//! All mutable per-proxy state (lifecycle, stop signal, injection buffers)
//! sits behind one lock, which is never held across an `.await`.

use bytes::Bytes;
use log::{debug, error, info, warn};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::net::TcpListener;

use crate::common::{escape_bytes, ProxyError, Result};
use crate::config::{defaults, ProxyConfig};
use super::handler::{FrameHandler, Passthrough, SharedHandler};
use super::injector::{InjectionBuffers, InjectionWakers};
use super::session::Session;
use super::stop::StopSignal;
use super::types::{Direction, FailurePolicy};

/// Pause between accept attempts after an accept error
const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Stopped,
}

struct ServerState {
    lifecycle: Lifecycle,
    /// Signal of the current (or next) run
    signal: StopSignal,
    local_addr: Option<SocketAddr>,
    injectors: InjectionBuffers,
}

impl ServerState {
    /// Close the current run; false if it is not running
    fn close_run(&mut self) -> bool {
        if self.lifecycle != Lifecycle::Running {
            return false;
        }
        self.signal.close();
        self.lifecycle = Lifecycle::Stopped;
        true
    }
}

/// State shared by the proxy handle, the accept loop and every session
pub(crate) struct Shared {
    pub(crate) listen_addr: String,
    pub(crate) target_addr: String,
    pub(crate) delimiter: u8,
    pub(crate) policy: FailurePolicy,
    client_handler: SharedHandler,
    remote_handler: SharedHandler,
    state: Mutex<ServerState>,
    pub(crate) wakers: InjectionWakers,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ServerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handler for frames read from `direction`
    pub(crate) fn handler(&self, direction: Direction) -> &SharedHandler {
        match direction {
            Direction::Client => &self.client_handler,
            Direction::Remote => &self.remote_handler,
        }
    }

    pub(crate) fn take_injected(&self, direction: Direction) -> Option<Bytes> {
        self.lock().injectors.take(direction)
    }

    pub(crate) fn pending(&self, direction: Direction) -> usize {
        self.lock().injectors.len(direction)
    }

    pub(crate) fn current_signal(&self) -> StopSignal {
        self.lock().signal.clone()
    }

    /// Stop the run `signal` belongs to
    ///
    /// A signal from an earlier run is already closed, so a late failure from
    /// one of its sessions never stops a newer run.
    pub(crate) fn stop_run(&self, signal: &StopSignal) -> bool {
        let mut state = self.lock();
        if state.signal.same_as(signal) {
            state.close_run()
        } else {
            signal.close();
            false
        }
    }

    /// Apply the failure policy after a pipe or drain hit a terminal I/O condition
    pub(crate) fn on_failure(&self, signal: &StopSignal) {
        match self.policy {
            FailurePolicy::Global => {
                if self.stop_run(signal) {
                    warn!(
                        "Stopping proxy {} -> {} after relay failure",
                        self.listen_addr, self.target_addr
                    );
                }
            }
            FailurePolicy::Session => {}
        }
    }
}

/// Builder for [`ProxyServer`]
pub struct ProxyServerBuilder {
    listen_addr: String,
    target_addr: String,
    client_handler: SharedHandler,
    remote_handler: SharedHandler,
    delimiter: u8,
    policy: FailurePolicy,
}

impl ProxyServerBuilder {
    /// Handler for frames read from the client
    pub fn client_handler(mut self, handler: impl FrameHandler + 'static) -> Self {
        self.client_handler = Arc::new(handler);
        self
    }

    /// Handler for frames read from the remote
    pub fn remote_handler(mut self, handler: impl FrameHandler + 'static) -> Self {
        self.remote_handler = Arc::new(handler);
        self
    }

    /// Handler for one direction, already shared
    pub fn shared_handler(mut self, direction: Direction, handler: SharedHandler) -> Self {
        match direction {
            Direction::Client => self.client_handler = handler,
            Direction::Remote => self.remote_handler = handler,
        }
        self
    }

    /// Frame delimiter byte
    pub fn delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// What a relay failure tears down
    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> ProxyServer {
        ProxyServer {
            shared: Arc::new(Shared {
                listen_addr: self.listen_addr,
                target_addr: self.target_addr,
                delimiter: self.delimiter,
                policy: self.policy,
                client_handler: self.client_handler,
                remote_handler: self.remote_handler,
                state: Mutex::new(ServerState {
                    lifecycle: Lifecycle::Idle,
                    signal: StopSignal::new(),
                    local_addr: None,
                    injectors: InjectionBuffers::default(),
                }),
                wakers: InjectionWakers::default(),
            }),
        }
    }
}

/// Intercepting TCP proxy
///
/// Accepts clients on the listen address, dials the fixed target for each of
/// them and relays frames in both directions through the configured handlers.
/// Cloning yields another handle to the same proxy.
#[derive(Clone)]
pub struct ProxyServer {
    shared: Arc<Shared>,
}

impl ProxyServer {
    /// Start building a proxy
    ///
    /// Defaults: passthrough handlers, `\n` delimiter, global failure policy.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use tcp_intercept::ProxyServer;
    /// # async fn run() -> tcp_intercept::Result<()> {
    /// let proxy = ProxyServer::builder("127.0.0.1:9000", "127.0.0.1:9001")
    ///     .client_handler(|frame: &[u8]| frame.to_ascii_uppercase())
    ///     .build();
    /// proxy.start().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn builder(listen_addr: impl Into<String>, target_addr: impl Into<String>) -> ProxyServerBuilder {
        ProxyServerBuilder {
            listen_addr: listen_addr.into(),
            target_addr: target_addr.into(),
            client_handler: Arc::new(Passthrough),
            remote_handler: Arc::new(Passthrough),
            delimiter: defaults::DELIMITER,
            policy: FailurePolicy::default(),
        }
    }

    /// Build a proxy from a resolved configuration
    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::builder(config.listen(), config.target())
            .shared_handler(Direction::Client, config.client_handler().build(Direction::Client))
            .shared_handler(Direction::Remote, config.remote_handler().build(Direction::Remote))
            .delimiter(config.delimiter())
            .failure_policy(config.failure_policy())
            .build()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> Arc<Shared> {
        Arc::clone(&self.shared)
    }

    /// Configured listen address
    pub fn listen_addr(&self) -> &str {
        &self.shared.listen_addr
    }

    /// Configured target address
    pub fn target_addr(&self) -> &str {
        &self.shared.target_addr
    }

    /// Frame delimiter byte
    pub fn delimiter(&self) -> u8 {
        self.shared.delimiter
    }

    /// Failure policy
    pub fn failure_policy(&self) -> FailurePolicy {
        self.shared.policy
    }

    /// Address the listener is bound to, once started
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared.lock().local_addr
    }

    /// Bind the listen address and spawn the accept loop
    ///
    /// Returns as soon as the listener is bound. A proxy that was stopped can
    /// be started again; it gets a fresh stop signal.
    ///
    /// # Errors
    ///
    /// `ProxyError::Bind` if the address cannot be bound, `ProxyError::AlreadyRunning`
    /// if the accept loop is already running.
    pub async fn start(&self) -> Result<SocketAddr> {
        if self.shared.lock().lifecycle == Lifecycle::Running {
            return Err(ProxyError::AlreadyRunning(self.shared.listen_addr.clone()));
        }

        info!("Starting proxy on {}", self.shared.listen_addr);
        let listener = TcpListener::bind(self.shared.listen_addr.as_str())
            .await
            .map_err(|source| ProxyError::Bind {
                addr: self.shared.listen_addr.clone(),
                source,
            })?;
        let local_addr = listener.local_addr()?;

        let signal = {
            let mut state = self.shared.lock();
            match state.lifecycle {
                // Lost a race with a concurrent start; our listener is dropped
                Lifecycle::Running => {
                    return Err(ProxyError::AlreadyRunning(self.shared.listen_addr.clone()));
                }
                Lifecycle::Stopped => state.signal = StopSignal::new(),
                Lifecycle::Idle => {}
            }
            state.lifecycle = Lifecycle::Running;
            state.local_addr = Some(local_addr);
            state.signal.clone()
        };

        info!(
            "Proxy listening on {}, forwarding to {}",
            local_addr, self.shared.target_addr
        );
        tokio::spawn(accept_loop(Arc::clone(&self.shared), listener, signal));

        Ok(local_addr)
    }

    /// Stop the proxy
    ///
    /// No-op if it never started or is already stopped.
    pub fn stop(&self) {
        if self.shared.lock().close_run() {
            info!("Stopping proxy on {}", self.shared.listen_addr);
        }
    }

    /// Whether the proxy has been stopped
    pub fn stopped(&self) -> bool {
        self.shared.lock().lifecycle == Lifecycle::Stopped
    }

    /// Wait until the current run is stopped
    pub async fn wait(&self) {
        let signal = self.shared.current_signal();
        signal.closed().await;
    }

    /// Queue bytes to be written toward the destination of `direction`
    ///
    /// `Client` bytes are written to the remote, `Remote` bytes to the client.
    /// Empty input is ignored.
    pub fn inject(&self, direction: Direction, bytes: impl AsRef<[u8]>) {
        let bytes = bytes.as_ref();
        if bytes.is_empty() {
            return;
        }

        let pending = {
            let mut state = self.shared.lock();
            state.injectors.append(direction, bytes);
            state.injectors.len(direction)
        };
        self.shared.wakers.get(direction).notify_one();

        debug!(
            "Injected {} {} bytes ({} pending): {}",
            bytes.len(),
            direction,
            pending,
            escape_bytes(bytes)
        );
    }

    /// Drop everything queued for `direction`
    pub fn clear_inject(&self, direction: Direction) {
        self.shared.lock().injectors.clear(direction);
    }

    /// Number of injected bytes not yet written for `direction`
    pub fn pending(&self, direction: Direction) -> usize {
        self.shared.pending(direction)
    }
}

impl std::fmt::Debug for ProxyServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProxyServer")
            .field("listen_addr", &self.shared.listen_addr)
            .field("target_addr", &self.shared.target_addr)
            .field("delimiter", &self.shared.delimiter)
            .field("policy", &self.shared.policy)
            .field("handlers", &"<FrameHandler>")
            .finish()
    }
}

async fn accept_loop(shared: Arc<Shared>, listener: TcpListener, signal: StopSignal) {
    loop {
        tokio::select! {
            biased;

            _ = signal.closed() => {
                info!("Accept loop on {} stopped", shared.listen_addr);
                break;
            }

            accepted = listener.accept() => match accepted {
                Ok((stream, client_addr)) => {
                    info!("New connection from {}", client_addr);
                    let session = Session::new(Arc::clone(&shared), signal.clone(), client_addr);
                    tokio::spawn(session.run(stream));
                }
                Err(e) => {
                    error!("Error accepting connection: {}", e);
                    accept_backoff(&signal).await;
                }
            },
        }
    }
}

/// Pause after a failed accept so a persistent error (e.g. EMFILE) does not spin
///
/// Returns early when the run is stopped.
async fn accept_backoff(signal: &StopSignal) {
    tokio::select! {
        _ = signal.closed() => {}
        _ = tokio::time::sleep(ACCEPT_ERROR_BACKOFF) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn local_proxy() -> ProxyServer {
        ProxyServer::builder("127.0.0.1:0", "127.0.0.1:1").build()
    }

    #[test]
    fn test_builder_defaults() {
        let proxy = local_proxy();
        assert_eq!(proxy.listen_addr(), "127.0.0.1:0");
        assert_eq!(proxy.target_addr(), "127.0.0.1:1");
        assert_eq!(proxy.delimiter(), b'\n');
        assert_eq!(proxy.failure_policy(), FailurePolicy::Global);
        assert!(proxy.local_addr().is_none());
        assert!(!proxy.stopped());
    }

    #[test]
    fn test_stop_before_start_is_noop() {
        let proxy = local_proxy();
        proxy.stop();
        proxy.stop();
        assert!(!proxy.stopped());
    }

    #[tokio::test]
    async fn test_stop_twice() {
        let proxy = local_proxy();
        proxy.start().await.unwrap();

        proxy.stop();
        assert!(proxy.stopped());
        proxy.stop();
        assert!(proxy.stopped());

        tokio::time::timeout(Duration::from_secs(1), proxy.wait())
            .await
            .expect("wait should return once stopped");
    }

    #[tokio::test]
    async fn test_concurrent_stop() {
        let proxy = local_proxy();
        proxy.start().await.unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let proxy = proxy.clone();
                tokio::spawn(async move { proxy.stop() })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }
        assert!(proxy.stopped());
    }

    #[tokio::test]
    async fn test_start_twice_is_rejected() {
        let proxy = local_proxy();
        proxy.start().await.unwrap();
        assert!(matches!(proxy.start().await, Err(ProxyError::AlreadyRunning(_))));
        proxy.stop();
    }

    #[tokio::test]
    async fn test_restart_gets_fresh_signal() {
        let proxy = local_proxy();
        proxy.start().await.unwrap();
        let first = proxy.shared().current_signal();
        proxy.stop();

        proxy.start().await.unwrap();
        assert!(!proxy.stopped());
        let second = proxy.shared().current_signal();
        assert!(first.is_closed());
        assert!(!second.is_closed());

        // A failure reported against the old run leaves the new one alone
        assert!(!proxy.shared().stop_run(&first));
        assert!(!proxy.stopped());
        proxy.stop();
    }

    #[tokio::test]
    async fn test_bind_failure() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap();
        let proxy = ProxyServer::builder(addr.to_string(), "127.0.0.1:1").build();

        match proxy.start().await {
            Err(ProxyError::Bind { addr: failed, .. }) => assert_eq!(failed, addr.to_string()),
            other => panic!("expected bind error, got {:?}", other),
        }
        assert!(!proxy.stopped());
        assert!(proxy.local_addr().is_none());
    }

    #[test]
    fn test_inject_and_clear() {
        let proxy = local_proxy();
        proxy.inject(Direction::Client, b"");
        assert_eq!(proxy.pending(Direction::Client), 0);

        proxy.inject(Direction::Client, b"ab");
        proxy.inject(Direction::Client, "cd");
        assert_eq!(proxy.pending(Direction::Client), 4);
        assert_eq!(proxy.pending(Direction::Remote), 0);

        proxy.clear_inject(Direction::Client);
        assert_eq!(proxy.pending(Direction::Client), 0);
    }

    #[test]
    fn test_concurrent_inject_and_clear() {
        // Every byte is either cleared, or still pending; nothing else
        let proxy = local_proxy();
        let writers: Vec<_> = (0..4)
            .map(|_| {
                let proxy = proxy.clone();
                std::thread::spawn(move || {
                    for _ in 0..500 {
                        proxy.inject(Direction::Remote, b"x");
                    }
                })
            })
            .collect();
        let clearer = {
            let proxy = proxy.clone();
            std::thread::spawn(move || {
                for _ in 0..100 {
                    proxy.clear_inject(Direction::Remote);
                }
            })
        };
        for writer in writers {
            writer.join().unwrap();
        }
        clearer.join().unwrap();

        proxy.inject(Direction::Remote, b"after");
        assert!(proxy.pending(Direction::Remote) >= 5);
        let taken = proxy.shared().take_injected(Direction::Remote).unwrap();
        assert!(taken.ends_with(b"after"));
        assert!(taken[..taken.len() - 5].iter().all(|&b| b == b'x'));
        assert_eq!(proxy.pending(Direction::Remote), 0);
    }

    #[tokio::test]
    async fn test_accept_backoff_pauses() {
        let signal = StopSignal::new();
        let started = Instant::now();
        accept_backoff(&signal).await;
        assert!(started.elapsed() >= ACCEPT_ERROR_BACKOFF);
    }

    #[tokio::test]
    async fn test_accept_backoff_ends_on_stop() {
        let signal = StopSignal::new();
        signal.close();
        tokio::time::timeout(ACCEPT_ERROR_BACKOFF / 2, accept_backoff(&signal))
            .await
            .expect("backoff should end as soon as the run is stopped");
    }
}

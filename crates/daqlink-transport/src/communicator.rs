use std::future::Future;
use std::io;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::{Endpoint, TransportConfig};
use crate::error::{Result, TransportError};
use crate::stream::{ReadHalf, WriteHalf};
use crate::traits::Transport;

/// Connection lifecycle of a single [`Communicator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    /// Transient, only while `connect` is running.
    Connecting,
    Connected,
    /// The last `connect` attempt failed. Behaves like `Disconnected`.
    Faulted,
}

/// A byte-stream endpoint over a named pipe or a TCP socket.
///
/// The receive and send halves are guarded independently, so one read and
/// one write may be in flight at once. A second concurrent operation in the
/// same direction fails with [`TransportError::Busy`].
pub struct Communicator {
    endpoint: Endpoint,
    state: Mutex<ConnectionState>,
    shutdown: Mutex<CancellationToken>,
    reader: tokio::sync::Mutex<Option<ReadHalf>>,
    writer: tokio::sync::Mutex<Option<WriteHalf>>,
}

impl Communicator {
    /// Create a disconnected communicator for `endpoint`.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            state: Mutex::new(ConnectionState::Disconnected),
            shutdown: Mutex::new(CancellationToken::new()),
            reader: tokio::sync::Mutex::new(None),
            writer: tokio::sync::Mutex::new(None),
        }
    }

    pub fn named_pipe(name: impl Into<String>) -> Self {
        Self::new(Endpoint::named_pipe(name))
    }

    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::new(Endpoint::tcp(host, port))
    }

    /// Build the variant selected by `config`.
    pub fn from_config(config: &TransportConfig) -> Self {
        Self::new(config.endpoint())
    }

    /// Wrap an already-established stream (device side, after `accept`).
    pub(crate) fn from_halves(endpoint: Endpoint, (read, write): (ReadHalf, WriteHalf)) -> Self {
        Self {
            endpoint,
            state: Mutex::new(ConnectionState::Connected),
            shutdown: Mutex::new(CancellationToken::new()),
            reader: tokio::sync::Mutex::new(Some(read)),
            writer: tokio::sync::Mutex::new(Some(write)),
        }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_state(&self, state: ConnectionState) {
        *self.lock_state() = state;
    }

    fn shutdown_token(&self) -> CancellationToken {
        self.shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn replace_shutdown_token(&self) -> CancellationToken {
        let token = CancellationToken::new();
        *self
            .shutdown
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = token.clone();
        token
    }

    fn mark_disconnected(&self) {
        let mut state = self.lock_state();
        if *state == ConnectionState::Connected {
            *state = ConnectionState::Disconnected;
        }
    }

    fn not_connected(&self, operation: &'static str) -> TransportError {
        TransportError::NotConnected {
            target: self.endpoint.target(),
            operation,
        }
    }

    fn closed(&self, operation: &'static str) -> TransportError {
        TransportError::ConnectionClosed {
            target: self.endpoint.target(),
            operation,
        }
    }

    fn busy(&self, operation: &'static str) -> TransportError {
        TransportError::Busy {
            target: self.endpoint.target(),
            operation,
        }
    }

    fn io_failure(&self, operation: &'static str, source: io::Error) -> TransportError {
        self.mark_disconnected();
        match source.kind() {
            io::ErrorKind::BrokenPipe
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::UnexpectedEof
            | io::ErrorKind::WriteZero => self.closed(operation),
            _ => TransportError::Io {
                target: self.endpoint.target(),
                operation,
                source,
            },
        }
    }
}

/// Race a connect attempt against `deadline` and a cancellation signal.
async fn connect_within<F, T>(
    target: String,
    deadline: Duration,
    cancel: &CancellationToken,
    attempt: F,
) -> Result<T>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(TransportError::Cancelled { target }),
        outcome = tokio::time::timeout(deadline, attempt) => match outcome {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(TransportError::Connect { target, source }),
            Err(_) => Err(TransportError::Timeout {
                target,
                operation: "connect",
                after: deadline,
            }),
        },
    }
}

async fn open(endpoint: &Endpoint) -> io::Result<(ReadHalf, WriteHalf)> {
    match endpoint {
        Endpoint::Tcp { host, port } => {
            let stream = tokio::net::TcpStream::connect((host.as_str(), *port)).await?;
            stream.set_nodelay(true)?;
            Ok(crate::stream::split_tcp(stream))
        }
        Endpoint::NamedPipe { name } => open_pipe(name).await,
    }
}

#[cfg(unix)]
async fn open_pipe(name: &str) -> io::Result<(ReadHalf, WriteHalf)> {
    let stream = tokio::net::UnixStream::connect(crate::config::pipe_path(name)).await?;
    Ok(crate::stream::split_unix(stream))
}

#[cfg(windows)]
async fn open_pipe(name: &str) -> io::Result<(ReadHalf, WriteHalf)> {
    use tokio::net::windows::named_pipe::ClientOptions;

    const ERROR_PIPE_BUSY: i32 = 231;

    let path = crate::config::pipe_path(name);
    loop {
        match ClientOptions::new().open(&path) {
            Ok(client) => return Ok(crate::stream::split_pipe_client(client)),
            // Every server instance is taken; the caller's deadline bounds this wait.
            Err(err) if err.raw_os_error() == Some(ERROR_PIPE_BUSY) => {}
            Err(err) => return Err(err),
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

#[async_trait]
impl Transport for Communicator {
    async fn connect(&self, deadline: Duration) -> Result<()> {
        let cancel = {
            let mut state = self.lock_state();
            match *state {
                ConnectionState::Connected => {
                    return Err(TransportError::AlreadyConnected {
                        target: self.endpoint.target(),
                    })
                }
                ConnectionState::Connecting => return Err(self.busy("connect")),
                ConnectionState::Disconnected | ConnectionState::Faulted => {}
            }
            // Token swap happens under the state lock so a concurrent dispose
            // either precedes this attempt or cancels it.
            *state = ConnectionState::Connecting;
            self.replace_shutdown_token()
        };

        debug!(endpoint = %self.endpoint, ?deadline, "connecting");
        let halves = match connect_within(
            self.endpoint.target(),
            deadline,
            &cancel,
            open(&self.endpoint),
        )
        .await
        {
            Ok(halves) => halves,
            Err(err) => {
                debug!(endpoint = %self.endpoint, error = %err, "connect failed");
                if cancel.is_cancelled() || matches!(err, TransportError::Cancelled { .. }) {
                    self.set_state(ConnectionState::Disconnected);
                } else {
                    self.set_state(ConnectionState::Faulted);
                }
                return Err(err);
            }
        };

        let (read, write) = halves;
        *self.reader.lock().await = Some(read);
        *self.writer.lock().await = Some(write);

        // dispose() may have run between the attempt resolving and the install.
        let installed = {
            let mut state = self.lock_state();
            if cancel.is_cancelled() {
                *state = ConnectionState::Disconnected;
                false
            } else {
                *state = ConnectionState::Connected;
                true
            }
        };
        if !installed {
            self.reader.lock().await.take();
            self.writer.lock().await.take();
            return Err(TransportError::Cancelled {
                target: self.endpoint.target(),
            });
        }

        info!(endpoint = %self.endpoint, "connected");
        Ok(())
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        let mut guard = self.reader.try_lock().map_err(|_| self.busy("read"))?;
        let cancel = self.shutdown_token();
        if !self.is_connected() {
            return Err(self.not_connected("read"));
        }
        let Some(stream) = guard.as_mut() else {
            return Err(self.not_connected("read"));
        };

        let outcome = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(self.closed("read")),
            outcome = stream.read(buf) => outcome,
        };

        match outcome {
            Ok(0) if !buf.is_empty() => {
                debug!(endpoint = %self.endpoint, "peer closed stream");
                self.mark_disconnected();
                Ok(0)
            }
            Ok(read) => Ok(read),
            Err(err) => Err(self.io_failure("read", err)),
        }
    }

    async fn write(&self, buf: &[u8]) -> Result<()> {
        let mut guard = self.writer.try_lock().map_err(|_| self.busy("write"))?;
        let cancel = self.shutdown_token();
        if !self.is_connected() {
            return Err(self.not_connected("write"));
        }
        let Some(stream) = guard.as_mut() else {
            return Err(self.not_connected("write"));
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.closed("write")),
            outcome = stream.write_all(buf) => outcome.map_err(|err| self.io_failure("write", err)),
        }
    }

    async fn flush(&self) -> Result<()> {
        let mut guard = self.writer.try_lock().map_err(|_| self.busy("flush"))?;
        let cancel = self.shutdown_token();
        if !self.is_connected() {
            return Err(self.not_connected("flush"));
        }
        let Some(stream) = guard.as_mut() else {
            return Err(self.not_connected("flush"));
        };

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(self.closed("flush")),
            outcome = stream.flush() => outcome.map_err(|err| self.io_failure("flush", err)),
        }
    }

    fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    fn description(&self) -> String {
        self.endpoint.to_string()
    }

    fn target(&self) -> String {
        self.endpoint.target()
    }

    async fn dispose(&self) {
        // Cancel first so in-flight operations release their half. Serialized
        // with connect's state transitions.
        {
            let mut state = self.lock_state();
            self.shutdown_token().cancel();
            *state = ConnectionState::Disconnected;
        }
        let reader = self.reader.lock().await.take();
        let writer = self.writer.lock().await.take();
        let was_open = reader.is_some() || writer.is_some();
        drop(reader);
        drop(writer);
        if was_open {
            debug!(endpoint = %self.endpoint, "disposed");
        }
    }
}

impl std::fmt::Debug for Communicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Communicator")
            .field("endpoint", &self.endpoint)
            .field("state", &self.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Instant;

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    const DEADLINE: Duration = Duration::from_secs(2);

    async fn local_listener() -> (TcpListener, u16) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener should bind");
        let port = listener.local_addr().expect("local addr").port();
        (listener, port)
    }

    #[tokio::test]
    async fn operations_before_connect_fail_not_connected() {
        let comm = Communicator::tcp("127.0.0.1", 1);
        assert!(!comm.is_connected());
        assert_eq!(comm.state(), ConnectionState::Disconnected);

        let mut buf = [0u8; 4];
        assert!(comm.read(&mut buf).await.unwrap_err().is_not_connected());
        assert!(comm.write(b"x").await.unwrap_err().is_not_connected());
        assert!(comm.flush().await.unwrap_err().is_not_connected());
    }

    #[test]
    fn description_available_before_connect() {
        assert_eq!(
            Communicator::tcp("localhost", 1234).description(),
            "TCP Socket: localhost:1234"
        );
        assert_eq!(
            Communicator::named_pipe("daq").description(),
            "Named Pipe: daq"
        );
    }

    #[tokio::test]
    async fn connect_and_dispose_lifecycle() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

        let comm = Communicator::tcp("127.0.0.1", port);
        comm.connect(DEADLINE).await.expect("connect should succeed");
        assert!(comm.is_connected());
        let _peer = server.await.expect("join").expect("accept");

        comm.dispose().await;
        assert!(!comm.is_connected());
        comm.dispose().await;
        comm.dispose().await;
        assert!(!comm.is_connected());
        assert_eq!(comm.state(), ConnectionState::Disconnected);

        let mut buf = [0u8; 1];
        assert!(comm.read(&mut buf).await.unwrap_err().is_not_connected());
        assert!(comm.write(b"x").await.unwrap_err().is_not_connected());
        assert!(comm.flush().await.unwrap_err().is_not_connected());
    }

    #[tokio::test]
    async fn dispose_without_connect_is_noop() {
        let comm = Communicator::named_pipe("never-connected");
        comm.dispose().await;
        comm.dispose().await;
        assert!(!comm.is_connected());
    }

    #[tokio::test]
    async fn connect_twice_is_rejected() {
        let (listener, port) = local_listener().await;
        let _server = tokio::spawn(async move { listener.accept().await });

        let comm = Communicator::tcp("127.0.0.1", port);
        comm.connect(DEADLINE).await.expect("connect should succeed");
        let err = comm.connect(DEADLINE).await.unwrap_err();
        assert!(matches!(err, TransportError::AlreadyConnected { .. }));
        assert!(comm.is_connected());
        comm.dispose().await;
    }

    #[tokio::test]
    async fn echo_round_trip() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.expect("accept");
            let mut buf = [0u8; 64];
            let n = stream.read(&mut buf).await.expect("server read");
            stream.write_all(&buf[..n]).await.expect("server write");
        });

        let comm = Communicator::tcp("127.0.0.1", port);
        comm.connect(DEADLINE).await.expect("connect should succeed");

        let payload = b"Hello, TCP!";
        comm.write(payload).await.expect("write");
        comm.flush().await.expect("flush");

        let mut received = Vec::new();
        let mut buf = [0u8; 64];
        while received.len() < payload.len() {
            let n = comm.read(&mut buf).await.expect("read");
            assert!(n > 0, "peer closed early");
            received.extend_from_slice(&buf[..n]);
        }
        assert_eq!(received.len(), payload.len());
        assert_eq!(received.as_slice(), payload);

        server.await.expect("server task");
        comm.dispose().await;
    }

    #[tokio::test]
    async fn refused_connection_is_connect_error() {
        let (listener, port) = local_listener().await;
        drop(listener);

        let comm = Communicator::tcp("127.0.0.1", port);
        let started = Instant::now();
        let err = comm.connect(DEADLINE).await.unwrap_err();
        assert!(matches!(err, TransportError::Connect { .. }), "got {err:?}");
        assert!(started.elapsed() < DEADLINE);
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
        assert!(!comm.is_connected());
        assert_eq!(comm.state(), ConnectionState::Faulted);
    }

    #[tokio::test]
    async fn pending_attempt_times_out_at_deadline() {
        let cancel = CancellationToken::new();
        let started = Instant::now();
        let err = connect_within(
            "10.255.255.1:1234".to_string(),
            Duration::from_millis(50),
            &cancel,
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("10.255.255.1:1234"));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn cancelled_attempt_resolves_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = connect_within(
            "x".to_string(),
            Duration::from_secs(10),
            &cancel,
            std::future::pending::<io::Result<()>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, TransportError::Cancelled { .. }));
    }

    #[tokio::test]
    async fn unreachable_host_is_bounded_by_deadline() {
        let comm = Communicator::tcp("10.255.255.1", 1234);
        let started = Instant::now();
        let err = comm.connect(DEADLINE).await.unwrap_err();
        // Sandboxes without a route report the failure immediately instead.
        assert!(
            err.is_timeout() || matches!(err, TransportError::Connect { .. }),
            "got {err:?}"
        );
        assert!(started.elapsed() < DEADLINE + Duration::from_millis(500));
        assert!(!comm.is_connected());
    }

    #[tokio::test]
    async fn dispose_unblocks_in_flight_read() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

        let comm = Arc::new(Communicator::tcp("127.0.0.1", port));
        comm.connect(DEADLINE).await.expect("connect should succeed");
        let _peer = server.await.expect("join").expect("accept");

        let reader = {
            let comm = Arc::clone(&comm);
            tokio::spawn(async move {
                let mut buf = [0u8; 8];
                comm.read(&mut buf).await
            })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        comm.dispose().await;

        let outcome = tokio::time::timeout(Duration::from_secs(1), reader)
            .await
            .expect("read should unblock")
            .expect("reader task");
        assert!(outcome.unwrap_err().is_connection_closed());
        assert!(!comm.is_connected());
    }

    #[tokio::test]
    async fn second_concurrent_read_is_busy_but_write_proceeds() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

        let comm = Arc::new(Communicator::tcp("127.0.0.1", port));
        comm.connect(DEADLINE).await.expect("connect should succeed");
        let mut peer = server.await.expect("join").expect("accept");

        let first = {
            let comm = Arc::clone(&comm);
            tokio::spawn(async move {
                let mut buf = [0u8; 8];
                comm.read(&mut buf).await
            })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        let mut buf = [0u8; 8];
        let err = comm.read(&mut buf).await.unwrap_err();
        assert!(matches!(err, TransportError::Busy { operation: "read", .. }));

        // Full duplex: the write half is independent of the blocked read.
        comm.write(b"ping").await.expect("write while reading");
        comm.flush().await.expect("flush while reading");
        let mut echoed = [0u8; 4];
        peer.read_exact(&mut echoed).await.expect("peer read");
        assert_eq!(&echoed, b"ping");

        peer.write_all(b"pong").await.expect("peer write");
        let n = first.await.expect("join").expect("first read");
        assert!(n > 0);
        comm.dispose().await;
    }

    #[tokio::test]
    async fn peer_close_reads_zero_and_disconnects() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(async move { listener.accept().await.map(|(s, _)| s) });

        let comm = Communicator::tcp("127.0.0.1", port);
        comm.connect(DEADLINE).await.expect("connect should succeed");
        let peer = server.await.expect("join").expect("accept");
        drop(peer);

        let mut buf = [0u8; 8];
        let n = comm.read(&mut buf).await.expect("read at eof");
        assert_eq!(n, 0);
        assert!(!comm.is_connected());
        comm.dispose().await;
    }

    #[tokio::test]
    async fn reconnect_after_dispose() {
        let (listener, port) = local_listener().await;
        let server = tokio::spawn(async move {
            let first = listener.accept().await.map(|(s, _)| s);
            let second = listener.accept().await.map(|(s, _)| s);
            (first, second)
        });

        let comm = Communicator::tcp("127.0.0.1", port);
        comm.connect(DEADLINE).await.expect("first connect");
        comm.dispose().await;
        comm.connect(DEADLINE).await.expect("second connect");
        assert!(comm.is_connected());

        let (first, second) = server.await.expect("join");
        assert!(first.is_ok() && second.is_ok());
        comm.dispose().await;
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn dispose_racing_connect_is_never_lost() {
        let (listener, port) = local_listener().await;
        let _server = tokio::spawn(async move {
            let mut accepted = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                accepted.push(stream);
            }
        });

        for _ in 0..50 {
            let comm = Arc::new(Communicator::tcp("127.0.0.1", port));
            let connecting = {
                let comm = Arc::clone(&comm);
                tokio::spawn(async move { comm.connect(DEADLINE).await })
            };
            while comm.state() == ConnectionState::Disconnected && !connecting.is_finished() {
                tokio::task::yield_now().await;
            }
            comm.dispose().await;

            let outcome = connecting.await.expect("connect task");
            assert!(
                outcome.is_ok() || matches!(outcome, Err(TransportError::Cancelled { .. })),
                "got {outcome:?}"
            );
            // Whatever the interleaving, the dispose that followed wins.
            assert!(!comm.is_connected());
            assert_eq!(comm.state(), ConnectionState::Disconnected);
        }
    }
}

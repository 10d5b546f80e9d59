#[cfg(unix)]
use std::os::unix::fs::{FileTypeExt, MetadataExt, PermissionsExt};
use std::path::Path;
#[cfg(unix)]
use std::path::PathBuf;

use tracing::{debug, info};

use crate::communicator::Communicator;
use crate::config::{pipe_path, Endpoint};
use crate::error::{Result, TransportError};

/// Device-side listener that hands out connected [`Communicator`]s.
///
/// TCP endpoints bind a socket; named-pipe endpoints bind a Unix domain
/// socket (Linux/macOS) or create the first pipe instance (Windows).
pub struct Listener {
    endpoint: Endpoint,
    inner: ListenerInner,
}

enum ListenerInner {
    Tcp(tokio::net::TcpListener),
    #[cfg(unix)]
    Pipe(UnixPipe),
    #[cfg(windows)]
    Pipe(WindowsPipe),
}

impl Listener {
    /// Default permission mode for created socket paths.
    #[cfg(unix)]
    pub const DEFAULT_SOCKET_MODE: u32 = 0o600;

    /// Bind and listen on `endpoint`.
    ///
    /// For TCP, port `0` picks a free port; [`Listener::endpoint`] reports it.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint {
            Endpoint::Tcp { host, port } => {
                let listener = tokio::net::TcpListener::bind((host.as_str(), *port))
                    .await
                    .map_err(|source| TransportError::Bind {
                        target: endpoint.target(),
                        source,
                    })?;
                let bound = listener
                    .local_addr()
                    .map_err(|source| TransportError::Bind {
                        target: endpoint.target(),
                        source,
                    })?
                    .port();
                let endpoint = Endpoint::tcp(host.clone(), bound);
                info!(%endpoint, "listening");
                Ok(Self {
                    endpoint,
                    inner: ListenerInner::Tcp(listener),
                })
            }
            Endpoint::NamedPipe { name } => {
                let pipe = bind_pipe(name)?;
                info!(%endpoint, path = ?pipe.path(), "listening");
                Ok(Self {
                    endpoint: endpoint.clone(),
                    inner: ListenerInner::Pipe(pipe),
                })
            }
        }
    }

    /// Accept the next host connection.
    pub async fn accept(&mut self) -> Result<Communicator> {
        let target = self.endpoint.target();
        match &mut self.inner {
            ListenerInner::Tcp(listener) => {
                let (stream, peer) = listener
                    .accept()
                    .await
                    .map_err(|source| TransportError::Accept { target, source })?;
                stream
                    .set_nodelay(true)
                    .map_err(|source| TransportError::Accept {
                        target: self.endpoint.target(),
                        source,
                    })?;
                debug!(%peer, "accepted connection");
                Ok(Communicator::from_halves(
                    Endpoint::tcp(peer.ip().to_string(), peer.port()),
                    crate::stream::split_tcp(stream),
                ))
            }
            ListenerInner::Pipe(pipe) => {
                let halves = pipe
                    .accept()
                    .await
                    .map_err(|source| TransportError::Accept { target, source })?;
                debug!(endpoint = %self.endpoint, "accepted connection");
                Ok(Communicator::from_halves(self.endpoint.clone(), halves))
            }
        }
    }

    /// The bound endpoint (with the resolved port for TCP).
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Filesystem path of a named-pipe listener.
    pub fn path(&self) -> Option<&Path> {
        match &self.inner {
            ListenerInner::Tcp(_) => None,
            ListenerInner::Pipe(pipe) => Some(pipe.path()),
        }
    }
}

#[cfg(unix)]
struct UnixPipe {
    listener: tokio::net::UnixListener,
    path: PathBuf,
    created_inode: Option<(u64, u64)>,
}

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
const MAX_PATH_LEN: usize = 108;
#[cfg(all(unix, not(target_os = "linux")))]
const MAX_PATH_LEN: usize = 104;

#[cfg(unix)]
fn bind_pipe(name: &str) -> Result<UnixPipe> {
    let path = pipe_path(name);
    let bind_error = |source: std::io::Error| TransportError::Bind {
        target: name.to_string(),
        source,
    };

    let path_bytes = path.as_os_str().len();
    if path_bytes >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path,
            len: path_bytes,
            max: MAX_PATH_LEN,
        });
    }

    // Remove a stale socket, but never a non-socket file.
    if path.exists() {
        let metadata = std::fs::symlink_metadata(&path).map_err(bind_error)?;
        if metadata.file_type().is_socket() {
            debug!(?path, "removing stale socket");
            std::fs::remove_file(&path).map_err(bind_error)?;
        } else {
            return Err(bind_error(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                "existing path is not a unix socket",
            )));
        }
    }

    let listener = tokio::net::UnixListener::bind(&path).map_err(bind_error)?;
    std::fs::set_permissions(
        &path,
        std::fs::Permissions::from_mode(Listener::DEFAULT_SOCKET_MODE),
    )
    .map_err(bind_error)?;
    let created = std::fs::symlink_metadata(&path).map_err(bind_error)?;

    Ok(UnixPipe {
        listener,
        path,
        created_inode: Some((created.dev(), created.ino())),
    })
}

#[cfg(unix)]
impl UnixPipe {
    async fn accept(
        &mut self,
    ) -> std::io::Result<(crate::stream::ReadHalf, crate::stream::WriteHalf)> {
        let (stream, _addr) = self.listener.accept().await?;
        Ok(crate::stream::split_unix(stream))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(unix)]
impl Drop for UnixPipe {
    fn drop(&mut self) {
        let Some((expected_dev, expected_ino)) = self.created_inode else {
            return;
        };
        if let Ok(metadata) = std::fs::symlink_metadata(&self.path) {
            if metadata.file_type().is_socket()
                && metadata.dev() == expected_dev
                && metadata.ino() == expected_ino
            {
                debug!(path = ?self.path, "cleaning up socket file");
                let _ = std::fs::remove_file(&self.path);
            } else {
                debug!(path = ?self.path, "socket path identity changed; skipping cleanup");
            }
        }
    }
}

#[cfg(windows)]
struct WindowsPipe {
    path: std::path::PathBuf,
    next: tokio::net::windows::named_pipe::NamedPipeServer,
}

#[cfg(windows)]
fn bind_pipe(name: &str) -> Result<WindowsPipe> {
    use tokio::net::windows::named_pipe::ServerOptions;

    let path = pipe_path(name);
    let next = ServerOptions::new()
        .first_pipe_instance(true)
        .create(&path)
        .map_err(|source| TransportError::Bind {
            target: name.to_string(),
            source,
        })?;
    Ok(WindowsPipe { path, next })
}

#[cfg(windows)]
impl WindowsPipe {
    async fn accept(
        &mut self,
    ) -> std::io::Result<(crate::stream::ReadHalf, crate::stream::WriteHalf)> {
        use tokio::net::windows::named_pipe::ServerOptions;

        self.next.connect().await?;
        let fresh = ServerOptions::new().create(&self.path)?;
        let connected = std::mem::replace(&mut self.next, fresh);
        Ok(crate::stream::split_pipe_server(connected))
    }

    fn path(&self) -> &Path {
        &self.path
    }
}

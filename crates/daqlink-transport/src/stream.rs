use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

/// Receive half of a connected OS stream.
pub(crate) enum ReadHalf {
    Tcp(tokio::net::tcp::OwnedReadHalf),
    #[cfg(unix)]
    Unix(tokio::net::unix::OwnedReadHalf),
    #[cfg(windows)]
    PipeClient(tokio::io::ReadHalf<tokio::net::windows::named_pipe::NamedPipeClient>),
    #[cfg(windows)]
    PipeServer(tokio::io::ReadHalf<tokio::net::windows::named_pipe::NamedPipeServer>),
}

/// Send half of a connected OS stream.
pub(crate) enum WriteHalf {
    Tcp(tokio::net::tcp::OwnedWriteHalf),
    #[cfg(unix)]
    Unix(tokio::net::unix::OwnedWriteHalf),
    #[cfg(windows)]
    PipeClient(tokio::io::WriteHalf<tokio::net::windows::named_pipe::NamedPipeClient>),
    #[cfg(windows)]
    PipeServer(tokio::io::WriteHalf<tokio::net::windows::named_pipe::NamedPipeServer>),
}

pub(crate) fn split_tcp(stream: tokio::net::TcpStream) -> (ReadHalf, WriteHalf) {
    let (read, write) = stream.into_split();
    (ReadHalf::Tcp(read), WriteHalf::Tcp(write))
}

#[cfg(unix)]
pub(crate) fn split_unix(stream: tokio::net::UnixStream) -> (ReadHalf, WriteHalf) {
    let (read, write) = stream.into_split();
    (ReadHalf::Unix(read), WriteHalf::Unix(write))
}

#[cfg(windows)]
pub(crate) fn split_pipe_client(
    pipe: tokio::net::windows::named_pipe::NamedPipeClient,
) -> (ReadHalf, WriteHalf) {
    let (read, write) = tokio::io::split(pipe);
    (ReadHalf::PipeClient(read), WriteHalf::PipeClient(write))
}

#[cfg(windows)]
pub(crate) fn split_pipe_server(
    pipe: tokio::net::windows::named_pipe::NamedPipeServer,
) -> (ReadHalf, WriteHalf) {
    let (read, write) = tokio::io::split(pipe);
    (ReadHalf::PipeServer(read), WriteHalf::PipeServer(write))
}

impl AsyncRead for ReadHalf {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ReadHalf::Tcp(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(unix)]
            ReadHalf::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(windows)]
            ReadHalf::PipeClient(stream) => Pin::new(stream).poll_read(cx, buf),
            #[cfg(windows)]
            ReadHalf::PipeServer(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for WriteHalf {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            WriteHalf::Tcp(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(unix)]
            WriteHalf::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(windows)]
            WriteHalf::PipeClient(stream) => Pin::new(stream).poll_write(cx, buf),
            #[cfg(windows)]
            WriteHalf::PipeServer(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            WriteHalf::Tcp(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(unix)]
            WriteHalf::Unix(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(windows)]
            WriteHalf::PipeClient(stream) => Pin::new(stream).poll_flush(cx),
            #[cfg(windows)]
            WriteHalf::PipeServer(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            WriteHalf::Tcp(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(unix)]
            WriteHalf::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(windows)]
            WriteHalf::PipeClient(stream) => Pin::new(stream).poll_shutdown(cx),
            #[cfg(windows)]
            WriteHalf::PipeServer(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for ReadHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            ReadHalf::Tcp(_) => "tcp",
            #[cfg(unix)]
            ReadHalf::Unix(_) => "unix",
            #[cfg(windows)]
            ReadHalf::PipeClient(_) | ReadHalf::PipeServer(_) => "named-pipe",
        };
        f.debug_struct("ReadHalf").field("type", &kind).finish()
    }
}

impl std::fmt::Debug for WriteHalf {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self {
            WriteHalf::Tcp(_) => "tcp",
            #[cfg(unix)]
            WriteHalf::Unix(_) => "unix",
            #[cfg(windows)]
            WriteHalf::PipeClient(_) | WriteHalf::PipeServer(_) => "named-pipe",
        };
        f.debug_struct("WriteHalf").field("type", &kind).finish()
    }
}

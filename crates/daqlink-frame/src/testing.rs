use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use daqlink_transport::{Result, Transport};

/// In-memory transport that replays scripted read chunks and records writes.
pub(crate) struct ScriptedTransport {
    chunks: Mutex<VecDeque<Vec<u8>>>,
    written: Mutex<Vec<u8>>,
    read_calls: AtomicUsize,
    write_calls: AtomicUsize,
    flush_calls: AtomicUsize,
    write_delay: Option<Duration>,
}

impl ScriptedTransport {
    pub(crate) fn chunks(chunks: Vec<Vec<u8>>) -> Self {
        Self {
            chunks: Mutex::new(chunks.into()),
            written: Mutex::new(Vec::new()),
            read_calls: AtomicUsize::new(0),
            write_calls: AtomicUsize::new(0),
            flush_calls: AtomicUsize::new(0),
            write_delay: None,
        }
    }

    /// Deliver `bytes` one byte per read.
    pub(crate) fn byte_by_byte(bytes: &[u8]) -> Self {
        Self::chunks(bytes.iter().map(|b| vec![*b]).collect())
    }

    pub(crate) fn with_write_delay(mut self, delay: Duration) -> Self {
        self.write_delay = Some(delay);
        self
    }

    pub(crate) fn written(&self) -> Vec<u8> {
        self.written.lock().unwrap().clone()
    }

    pub(crate) fn read_calls(&self) -> usize {
        self.read_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn write_calls(&self) -> usize {
        self.write_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn flush_calls(&self) -> usize {
        self.flush_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn connect(&self, _deadline: Duration) -> Result<()> {
        Ok(())
    }

    async fn read(&self, buf: &mut [u8]) -> Result<usize> {
        self.read_calls.fetch_add(1, Ordering::SeqCst);
        let mut chunks = self.chunks.lock().unwrap();
        let Some(mut chunk) = chunks.pop_front() else {
            return Ok(0);
        };
        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        if n < chunk.len() {
            chunks.push_front(chunk.split_off(n));
        }
        Ok(n)
    }

    async fn write(&self, buf: &[u8]) -> Result<()> {
        self.write_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.write_delay {
            tokio::time::sleep(delay).await;
        }
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(())
    }

    async fn flush(&self) -> Result<()> {
        self.flush_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        true
    }

    fn description(&self) -> String {
        "Scripted".to_string()
    }

    fn target(&self) -> String {
        "scripted".to_string()
    }

    async fn dispose(&self) {}
}

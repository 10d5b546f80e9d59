use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use daqlink_frame::FrameReader;
use daqlink_schema::{Measurement, Message};
use daqlink_transport::Transport;
use futures::Stream;
use tracing::debug;

use crate::error::{HostError, Result};

/// The lazy sequence of measurements arriving on one connection.
///
/// Ends (`None`) only after the owning [`Host`](crate::Host) is disposed.
/// Any failure seen before that, including the device closing the
/// connection, is yielded once as `Err`, after which the sequence ends; it
/// cannot be restarted.
pub struct Measurements<T: ?Sized> {
    reader: Option<FrameReader<Arc<T>>>,
    disposed: Arc<AtomicBool>,
}

impl<T: Transport + ?Sized + 'static> Measurements<T> {
    pub(crate) fn new(reader: FrameReader<Arc<T>>, disposed: Arc<AtomicBool>) -> Self {
        Self {
            reader: Some(reader),
            disposed,
        }
    }

    /// Wait for the next measurement.
    pub async fn next(&mut self) -> Option<Result<Measurement>> {
        let err = loop {
            let reader = self.reader.as_mut()?;
            match reader.read_frame().await {
                Ok(Message::Measurement(measurement)) => return Some(Ok(measurement)),
                Ok(other) => debug!(kind = other.kind(), "skipping non-measurement frame"),
                Err(err) => break err,
            }
        };

        self.reader = None;
        if self.disposed.load(Ordering::Acquire) {
            debug!("measurement stream ended by dispose");
            None
        } else {
            Some(Err(HostError::from(err)))
        }
    }

    /// True once the sequence has ended.
    pub fn is_finished(&self) -> bool {
        self.reader.is_none()
    }

    /// Adapt into a [`futures::Stream`].
    pub fn into_stream(self) -> impl Stream<Item = Result<Measurement>> + Send + 'static {
        futures::stream::unfold(self, |mut measurements| async move {
            let item = measurements.next().await?;
            Some((item, measurements))
        })
    }
}

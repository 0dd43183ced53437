//! Mock bus source for testing
//!
//! Frames and transport errors are injected through a [`MockSourceHandle`].
//! The source reports exhaustion once every handle has been dropped and the
//! queue is empty.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::{BusSource, TransportError};
use crate::frame::CanFrame;

type Item = Result<CanFrame, TransportError>;

pub struct MockSource {
    rx: mpsc::UnboundedReceiver<Item>,
}

/// Injects frames into a [`MockSource`]
#[derive(Clone)]
pub struct MockSourceHandle {
    tx: mpsc::UnboundedSender<Item>,
}

impl MockSource {
    pub fn new() -> (Self, MockSourceHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, MockSourceHandle { tx })
    }
}

impl MockSourceHandle {
    /// Queue a frame; false if the source is gone
    pub fn send(&self, frame: CanFrame) -> bool {
        self.tx.send(Ok(frame)).is_ok()
    }

    /// Queue a frame built from id and payload
    pub fn send_data(&self, id: u32, data: &[u8]) -> bool {
        match CanFrame::new(id, data) {
            Some(frame) => self.send(frame),
            None => false,
        }
    }

    /// Queue a transport error
    pub fn send_error(&self, error: TransportError) -> bool {
        self.tx.send(Err(error)).is_ok()
    }
}

#[async_trait]
impl BusSource for MockSource {
    async fn recv(&mut self) -> Result<Option<CanFrame>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => Ok(None),
        }
    }

    fn describe(&self) -> String {
        "mock".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_then_exhaustion() {
        let (mut source, handle) = MockSource::new();
        assert!(handle.send_data(0x5F0, &[1, 2]));
        assert!(handle.send_error(TransportError::ConnectionClosed));
        assert!(!handle.send_data(0x5F0, &[0; 9]));
        drop(handle);

        let frame = source.recv().await.unwrap().unwrap();
        assert_eq!(frame.data(), &[1, 2]);
        assert!(matches!(
            source.recv().await,
            Err(TransportError::ConnectionClosed)
        ));
        assert!(source.recv().await.unwrap().is_none());
    }
}

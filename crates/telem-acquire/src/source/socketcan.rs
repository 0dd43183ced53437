//! Raw SocketCAN bus source (Linux only)
//!
//! A blocking listener thread reads the non-blocking socket and forwards
//! data frames to the decoder through a bounded channel. The listener stops
//! when the source is dropped.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use socketcan::{CanFrame as RawFrame, CanSocket, EmbeddedFrame, Frame, Socket};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use super::{BusSource, TransportError};
use crate::config::SocketCanConfig;
use crate::frame::CanFrame;

/// Pause after a socket read error before trying again
const READ_ERROR_BACKOFF: Duration = Duration::from_millis(100);

type Item = Result<CanFrame, TransportError>;

pub struct SocketCanSource {
    interface: String,
    rx: mpsc::Receiver<Item>,
    running: Arc<AtomicBool>,
}

impl SocketCanSource {
    /// Open `config.interface` and start the listener thread
    pub fn open(config: &SocketCanConfig) -> Result<Self, TransportError> {
        if config.channel_capacity == 0 {
            return Err(TransportError::InvalidConfig(
                "channel_capacity must be at least 1".to_string(),
            ));
        }

        let socket = CanSocket::open(&config.interface).map_err(|e| {
            TransportError::ConnectionFailed(format!(
                "Failed to open raw CAN socket on {}: {}",
                config.interface, e
            ))
        })?;

        socket.set_nonblocking(true).map_err(|e| {
            TransportError::InvalidConfig(format!("Failed to set non-blocking: {}", e))
        })?;

        let (tx, rx) = mpsc::channel(config.channel_capacity);
        let running = Arc::new(AtomicBool::new(true));

        let interface = config.interface.clone();
        let flag = running.clone();
        tokio::task::spawn_blocking(move || listen(socket, &interface, tx, flag));

        info!(interface = %config.interface, "SocketCAN source open");
        Ok(Self {
            interface: config.interface.clone(),
            rx,
            running,
        })
    }
}

fn listen(socket: CanSocket, interface: &str, tx: mpsc::Sender<Item>, running: Arc<AtomicBool>) {
    while running.load(Ordering::SeqCst) {
        match socket.read_frame() {
            Ok(RawFrame::Data(raw)) => {
                let Some(frame) =
                    CanFrame::with_format(raw.raw_id(), raw.is_extended(), raw.data())
                else {
                    continue;
                };
                if tx.blocking_send(Ok(frame)).is_err() {
                    break;
                }
            }
            // Remote and error frames carry no telemetry
            Ok(_) => {}
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(1));
            }
            Err(e) => {
                let error = TransportError::ReceiveFailed(format!("{}: {}", interface, e));
                if let Err(mpsc::error::TrySendError::Closed(_)) = tx.try_send(Err(error)) {
                    break;
                }
                std::thread::sleep(READ_ERROR_BACKOFF);
            }
        }
    }
    debug!(interface = %interface, "SocketCAN listener stopped");
}

#[async_trait]
impl BusSource for SocketCanSource {
    async fn recv(&mut self) -> Result<Option<CanFrame>, TransportError> {
        match self.rx.recv().await {
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(e)) => Err(e),
            None => {
                warn!(interface = %self.interface, "SocketCAN listener exited");
                Err(TransportError::ConnectionClosed)
            }
        }
    }

    fn describe(&self) -> String {
        format!("socketcan {}", self.interface)
    }
}

impl Drop for SocketCanSource {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

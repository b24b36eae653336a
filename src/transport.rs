/*!
 # Datagram transport to the bridge

 The bridge listens for 3-byte UDP datagrams and never answers, so sending is
 fire-and-forget. It also drops frames that arrive too close together, which
 is why every send is followed by a fixed pacing delay.
*/

use std::future::Future;
use std::net::{Ipv4Addr, SocketAddrV4};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tracing::{debug, instrument, trace};

use crate::command::CommandFrame;
use crate::{Error, Result};

/// Anything that can deliver a frame to the bridge
pub trait Transport: Send + Sync {
    fn send(&self, frame: CommandFrame) -> impl Future<Output = Result<()>> + Send;
}

/// Where and how fast frames are sent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub broadcast_addr: Ipv4Addr,
    pub port: u16,
    /// Pause after every frame, in milliseconds
    pub pacing_ms: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            broadcast_addr: Ipv4Addr::BROADCAST,
            port: 8899,
            pacing_ms: 500,
        }
    }
}

impl TransportConfig {
    pub fn target(&self) -> SocketAddrV4 {
        SocketAddrV4::new(self.broadcast_addr, self.port)
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// Broadcast UDP transport, one short-lived socket per frame
#[derive(Debug)]
pub struct UdpTransport {
    config: TransportConfig,
    /// Held across send and pacing so frames never overlap
    gate: Mutex<()>,
}

impl UdpTransport {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            config,
            gate: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }
}

impl Transport for UdpTransport {
    #[instrument(skip(self, frame), fields(frame = %frame))]
    async fn send(&self, frame: CommandFrame) -> Result<()> {
        let _turn = self.gate.lock().await;

        let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
            .await
            .map_err(Error::Transport)?;
        socket.set_broadcast(true).map_err(Error::Transport)?;

        let target = self.config.target();
        debug!("Sending {} to {}", frame, target);
        socket
            .send_to(frame.as_bytes(), target)
            .await
            .map_err(Error::Transport)?;
        drop(socket);

        trace!("Pacing for {:?}", self.config.pacing());
        tokio::time::sleep(self.config.pacing()).await;
        Ok(())
    }
}

impl<T: Transport> Transport for Arc<T> {
    fn send(&self, frame: CommandFrame) -> impl Future<Output = Result<()>> + Send {
        (**self).send(frame)
    }
}

// ── Recording transport for tests ──

/// In-memory transport for unit and integration tests.
///
/// Always compiled, hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::io;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// Records every frame with the tokio instant it was sent at
    #[derive(Debug, Default)]
    pub struct RecordingTransport {
        sent: Mutex<Vec<(tokio::time::Instant, CommandFrame)>>,
        /// If true, `send` fails like an unplugged interface
        pub fail: AtomicBool,
    }

    impl RecordingTransport {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn frames(&self) -> Vec<CommandFrame> {
            self.sent.lock().iter().map(|(_, f)| *f).collect()
        }

        pub fn timestamps(&self) -> Vec<tokio::time::Instant> {
            self.sent.lock().iter().map(|(t, _)| *t).collect()
        }

        pub fn clear(&self) {
            self.sent.lock().clear();
        }

        pub fn set_failing(&self, fail: bool) {
            self.fail.store(fail, Ordering::SeqCst);
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&self, frame: CommandFrame) -> Result<()> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(Error::Transport(io::Error::new(
                    io::ErrorKind::AddrNotAvailable,
                    "mock transport set to fail",
                )));
            }
            self.sent.lock().push((tokio::time::Instant::now(), frame));
            Ok(())
        }
    }
}

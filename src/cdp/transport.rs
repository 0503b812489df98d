//! Transport boundary.
//!
//! Wire framing (WebSocket, pipe, ...) lives outside this crate; the
//! multiplexer only requires the [`Transport`] contract. A channel-backed
//! [`ChannelTransport`] is provided for in-process embedding and tests.

// ============================================================================
// Imports
// ============================================================================

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::{Error, Result};

// ============================================================================
// Transport
// ============================================================================

/// A duplex text-message transport to the browser.
///
/// Implementations frame one protocol message per call. `receive`
/// returning `None` signals that the transport closed; the multiplexer
/// then rejects all outstanding requests and clears session state.
#[async_trait]
pub trait Transport: Send + 'static {
    /// Sends one serialized protocol message.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disconnected`] if the peer is gone.
    async fn send(&mut self, message: String) -> Result<()>;

    /// Receives the next serialized protocol message.
    ///
    /// Returns `None` once the transport is closed.
    async fn receive(&mut self) -> Option<String>;
}

// ============================================================================
// ChannelTransport
// ============================================================================

/// An in-process transport backed by unbounded channels.
///
/// [`ChannelTransport::pair`] yields two crossed endpoints: whatever one
/// side sends, the other receives. Dropping an endpoint closes the
/// opposite side's receive stream.
#[derive(Debug)]
pub struct ChannelTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

impl ChannelTransport {
    /// Creates two connected endpoints.
    #[must_use]
    pub fn pair() -> (Self, Self) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();

        (
            Self { tx: a_tx, rx: b_rx },
            Self { tx: b_tx, rx: a_rx },
        )
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, message: String) -> Result<()> {
        self.tx.send(message).map_err(|_| Error::Disconnected)
    }

    async fn receive(&mut self) -> Option<String> {
        self.rx.recv().await
    }
}

// ============================================================================
// Tests
// ============================================================================

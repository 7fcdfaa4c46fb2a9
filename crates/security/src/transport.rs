//! Transport-Abstraktion fuer Sicherheits-Frames
//!
//! Die Engine sieht nur `FrameTransport`; darunter kann ein serieller
//! Funk-Adapter, ein IP-Tunnel oder (in Tests) ein Speicher-Paar
//! liegen.

use async_trait::async_trait;

use funknetz_protocol::frame::SecurityFrame;

use crate::error::{SecurityError, SecurityResult};

/// Versand und Empfang roher Sicherheits-Frames
#[async_trait]
pub trait FrameTransport: Send + Sync + 'static {
    /// Sendet einen Frame an die Gegenseite
    async fn senden(&self, frame: SecurityFrame) -> SecurityResult<()>;

    /// Wartet auf den naechsten eingehenden Frame
    async fn empfangen(&self) -> SecurityResult<SecurityFrame>;
}

/// In-Memory-Transport fuer Tests und Simulationen
pub mod mock {
    use tokio::sync::{mpsc, Mutex};

    use super::*;

    /// Eine Seite eines verbundenen Speicher-Paars
    pub struct MemoryTransport {
        ausgang: mpsc::Sender<SecurityFrame>,
        eingang: Mutex<mpsc::Receiver<SecurityFrame>>,
    }

    impl MemoryTransport {
        /// Erstellt zwei ueber Kreuz verbundene Transporte
        pub fn paar() -> (MemoryTransport, MemoryTransport) {
            let (zu_b, von_a) = mpsc::channel(64);
            let (zu_a, von_b) = mpsc::channel(64);
            (
                MemoryTransport {
                    ausgang: zu_b,
                    eingang: Mutex::new(von_b),
                },
                MemoryTransport {
                    ausgang: zu_a,
                    eingang: Mutex::new(von_a),
                },
            )
        }
    }

    #[async_trait]
    impl FrameTransport for MemoryTransport {
        async fn senden(&self, frame: SecurityFrame) -> SecurityResult<()> {
            self.ausgang
                .send(frame)
                .await
                .map_err(|_| SecurityError::Transport("Gegenseite geschlossen".to_string()))
        }

        async fn empfangen(&self) -> SecurityResult<SecurityFrame> {
            self.eingang
                .lock()
                .await
                .recv()
                .await
                .ok_or_else(|| SecurityError::Transport("Gegenseite geschlossen".to_string()))
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::mock::MemoryTransport;
    use super::*;
    use funknetz_protocol::command::SecurityCommand;

    #[tokio::test]
    async fn paar_uebertraegt_in_beide_richtungen() {
        let (a, b) = MemoryTransport::paar();

        let hin = SecurityFrame::neu(1, 2, SecurityCommand::NonceGet, vec![0x01]);
        a.senden(hin.clone()).await.unwrap();
        assert_eq!(b.empfangen().await.unwrap(), hin);

        let zurueck = SecurityFrame::neu(2, 1, SecurityCommand::NonceReport, vec![0x01, 0x01]);
        b.senden(zurueck.clone()).await.unwrap();
        assert_eq!(a.empfangen().await.unwrap(), zurueck);
    }

    #[tokio::test]
    async fn geschlossene_gegenseite_meldet_fehler() {
        let (a, b) = MemoryTransport::paar();
        drop(b);
        let frame = SecurityFrame::neu(1, 2, SecurityCommand::NonceGet, vec![]);
        assert!(a.senden(frame).await.is_err());
    }
}

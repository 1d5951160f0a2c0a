//! Signal handling for watch mode

use colored::Colorize;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;

/// Signals understood by the watch loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchSignal {
    /// Sync right away (SIGHUP)
    SyncNow,
    /// Stop watching (SIGINT/SIGTERM)
    Shutdown,
}

/// Watch signal handler
///
/// Forwards OS signals into a channel the watch loop can select on.
pub struct WatchSignalHandler {
    receiver: mpsc::Receiver<WatchSignal>,
}

impl WatchSignalHandler {
    /// Install SIGINT, SIGTERM and SIGHUP listeners.
    ///
    /// Returns the handler and a sender for injecting signals from elsewhere.
    pub fn new() -> Result<(Self, mpsc::Sender<WatchSignal>), std::io::Error> {
        let (tx, rx) = mpsc::channel(10);

        let tx_int = tx.clone();
        let mut sigint = signal(SignalKind::interrupt())?;
        tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                eprintln!("{} Received SIGINT (shutdown)", "↓".cyan());
                if tx_int.send(WatchSignal::Shutdown).await.is_err() {
                    break;
                }
            }
        });

        let tx_term = tx.clone();
        let mut sigterm = signal(SignalKind::terminate())?;
        tokio::spawn(async move {
            while sigterm.recv().await.is_some() {
                eprintln!("{} Received SIGTERM (shutdown)", "↓".cyan());
                if tx_term.send(WatchSignal::Shutdown).await.is_err() {
                    break;
                }
            }
        });

        let tx_hup = tx.clone();
        let mut sighup = signal(SignalKind::hangup())?;
        tokio::spawn(async move {
            while sighup.recv().await.is_some() {
                eprintln!("{} Received SIGHUP (sync now)", "↻".cyan());
                if tx_hup.send(WatchSignal::SyncNow).await.is_err() {
                    break;
                }
            }
        });

        Ok((Self { receiver: rx }, tx))
    }

    /// Wait for the next signal
    pub async fn recv(&mut self) -> Option<WatchSignal> {
        self.receiver.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn injected_signals_arrive_in_order() {
        let (mut handler, tx) = WatchSignalHandler::new().unwrap();

        tx.send(WatchSignal::SyncNow).await.unwrap();
        tx.send(WatchSignal::Shutdown).await.unwrap();

        assert_eq!(handler.recv().await, Some(WatchSignal::SyncNow));
        assert_eq!(handler.recv().await, Some(WatchSignal::Shutdown));
    }
}

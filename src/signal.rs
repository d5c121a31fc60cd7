//! # Signal Handling Module
//!
//! Gestione di Ctrl+C per uno shutdown cooperativo.
//!
//! ## Responsabilità:
//! - Collega il segnale di interrupt a un `CancellationToken` condiviso con il dispatcher
//! - Il primo Ctrl+C cancella il token una sola volta: i file già in lavorazione terminano,
//!   nessun nuovo file viene avviato, lo stato viene salvato
//! - I Ctrl+C successivi vengono solo loggati (nessuna terminazione forzata del tool esterno)
//!
//! ## Exit code:
//! - `EXIT_CODE_INTERRUPTED` (130 = 128 + SIGINT) quando il run è stato interrotto

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Exit code after an interrupt (128 + SIGINT)
pub const EXIT_CODE_INTERRUPTED: u8 = 130;

/// Cancel `token` when the process receives Ctrl+C.
///
/// The listener keeps running until the returned handle is aborted.
pub fn install_ctrl_c_handler(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!("Cannot listen for Ctrl+C: {}", e);
                return;
            }
            if token.is_cancelled() {
                warn!("Still waiting for running files to finish...");
            } else {
                warn!("Interrupted. Finishing files in progress, no new files will be started.");
                token.cancel();
            }
            debug!("Ctrl+C handled");
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_follows_unix_convention() {
        assert_eq!(EXIT_CODE_INTERRUPTED, 128 + 2);
    }

    #[tokio::test]
    async fn test_handler_does_not_cancel_by_itself() {
        let token = CancellationToken::new();
        let handle = install_ctrl_c_handler(token.clone());
        tokio::task::yield_now().await;
        assert!(!token.is_cancelled());
        handle.abort();
    }
}

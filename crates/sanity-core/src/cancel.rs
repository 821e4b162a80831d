//! Per-run cooperative cancellation.
//!
//! Every run gets its own signal, so a stale signal from a superseded run can
//! never reach a newer one.

use tokio::sync::watch;

use crate::error::{Result, SanityError};

/// Owning side of a run's cancellation flag.
#[derive(Debug)]
pub struct CancelSignal {
    tx: watch::Sender<bool>,
}

impl CancelSignal {
    /// Create a fresh signal together with the first observer token.
    pub fn new() -> (Self, CancelToken) {
        let (tx, rx) = watch::channel(false);
        (Self { tx }, CancelToken { rx })
    }

    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side, polled by runners and checks.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// `Err(SanityError::Cancelled)` once cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(SanityError::Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_reaches_all_tokens() {
        let (signal, token) = CancelSignal::new();
        let other = token.clone();
        assert!(!token.is_cancelled());
        assert!(token.check().is_ok());

        signal.cancel();
        assert!(token.is_cancelled());
        assert!(other.is_cancelled());
        assert!(token.check().unwrap_err().is_cancelled());
    }

    #[test]
    fn test_signals_are_independent() {
        let (first, first_token) = CancelSignal::new();
        let (_second, second_token) = CancelSignal::new();

        first.cancel();
        assert!(first_token.is_cancelled());
        assert!(!second_token.is_cancelled());
    }

    #[test]
    fn test_never_token() {
        let token = CancelToken::never();
        assert!(!token.is_cancelled());
    }

    #[test]
    fn test_token_survives_dropped_signal() {
        let (signal, token) = CancelSignal::new();
        signal.cancel();
        drop(signal);
        assert!(token.is_cancelled());
    }
}

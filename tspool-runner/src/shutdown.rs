//! Worker shutdown
//!
//! Stopping the worker only stops admission. Jobs it already launched are
//! separate process groups and keep running; the next worker adopts them
//! during orphan recovery.

use tokio::signal::unix::{SignalKind, signal};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Returns a token cancelled on the first SIGINT, SIGTERM or SIGHUP
pub fn install_shutdown_handler() -> std::io::Result<CancellationToken> {
    let token = CancellationToken::new();
    let cancel = token.clone();

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sighup = signal(SignalKind::hangup())?;

    tokio::spawn(async move {
        let received = tokio::select! {
            _ = sigterm.recv() => "SIGTERM",
            _ = sigint.recv() => "SIGINT",
            _ = sighup.recv() => "SIGHUP",
        };
        info!("Received {}, stopping worker", received);

        cancel.cancel();
    });

    Ok(token)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::sys::signal::{Signal, raise};
    use std::time::Duration;

    #[tokio::test]
    async fn test_hangup_cancels_token() {
        let token = install_shutdown_handler().unwrap();
        assert!(!token.is_cancelled());

        raise(Signal::SIGHUP).unwrap();

        tokio::time::timeout(Duration::from_secs(5), token.cancelled())
            .await
            .expect("token was not cancelled");
    }
}

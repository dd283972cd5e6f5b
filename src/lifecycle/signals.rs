//! OS signal handling.
//!
//! SIGINT/SIGTERM request shutdown. SIGHUP requests a manual reload, which
//! still works after the file watcher has stopped.

use std::io;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessSignal {
    Shutdown,
    Reload,
}

/// Registered signal streams. Create once and call [`Signals::recv`] in a loop.
pub struct Signals {
    #[cfg(unix)]
    terminate: Signal,
    #[cfg(unix)]
    hangup: Signal,
}

impl Signals {
    pub fn new() -> io::Result<Self> {
        Ok(Self {
            #[cfg(unix)]
            terminate: signal(SignalKind::terminate())?,
            #[cfg(unix)]
            hangup: signal(SignalKind::hangup())?,
        })
    }

    pub async fn recv(&mut self) -> ProcessSignal {
        #[cfg(unix)]
        {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => ProcessSignal::Shutdown,
                _ = self.terminate.recv() => ProcessSignal::Shutdown,
                _ = self.hangup.recv() => ProcessSignal::Reload,
            }
        }

        #[cfg(not(unix))]
        {
            let _ = tokio::signal::ctrl_c().await;
            ProcessSignal::Shutdown
        }
    }
}

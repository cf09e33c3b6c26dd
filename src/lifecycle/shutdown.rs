//! Shutdown coordination for the proxy.
//!
//! One `Shutdown` is shared by the listener, the signal watcher and, in tests,
//! whoever runs an in-process proxy. The stop flag is latched: a waiter that
//! arrives after the trigger still sees it.

use std::future::Future;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lifecycle::signals;

/// Latched stop flag for the listener.
#[derive(Debug, Clone)]
pub struct Shutdown {
    stop: watch::Sender<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (stop, _) = watch::channel(false);
        Self { stop }
    }

    /// Resolves once shutdown is triggered. Hand this to `HttpServer::run`.
    ///
    /// Also resolves if every `Shutdown` handle is dropped, since nothing can
    /// trigger it any more.
    pub fn wait(&self) -> impl Future<Output = ()> + Send + 'static {
        let mut stop = self.stop.subscribe();
        async move {
            let _ = stop.wait_for(|stopped| *stopped).await;
        }
    }

    /// Stop accepting connections. In-flight exchanges drain. Idempotent.
    pub fn trigger(&self) {
        self.stop.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.stop.borrow()
    }

    /// Trigger on SIGINT or SIGTERM.
    pub fn trigger_on_signal(&self) -> JoinHandle<()> {
        let shutdown = self.clone();
        tokio::spawn(async move {
            signals::wait_for_signal().await;
            shutdown.trigger();
        })
    }

    /// Number of pending `wait()` futures.
    pub fn waiter_count(&self) -> usize {
        self.stop.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

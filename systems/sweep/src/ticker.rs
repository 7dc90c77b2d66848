//! Cancellable fixed-rate background ticker.

use std::{
    io,
    sync::mpsc::{self, RecvTimeoutError, Sender},
    thread::{self, JoinHandle},
    time::Duration,
};

use tracing::{debug, warn};

const THREAD_NAME: &str = "gridsweep-ticker";

/// Background thread invoking a callback once per interval until stopped.
///
/// The wait between ticks is the only suspension point and doubles as the
/// cancellation point: a stop signal wakes the thread immediately.
#[derive(Debug)]
pub(crate) struct Ticker {
    stop: Sender<()>,
    handle: JoinHandle<()>,
}

impl Ticker {
    pub(crate) fn spawn<F>(interval: Duration, mut on_tick: F) -> io::Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop, signal) = mpsc::channel::<()>();
        let handle = thread::Builder::new()
            .name(THREAD_NAME.to_owned())
            .spawn(move || loop {
                match signal.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => on_tick(),
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })?;
        debug!(?interval, "sweep ticker started");
        Ok(Self { stop, handle })
    }

    /// Signals the thread and waits for it to exit, including any tick that
    /// is currently running.
    pub(crate) fn stop(self) {
        let _ = self.stop.send(());
        if self.handle.join().is_err() {
            warn!("sweep ticker thread panicked before shutdown");
        } else {
            debug!("sweep ticker stopped");
        }
    }
}

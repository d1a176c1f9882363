// Hard-mode reset ticker
// A background thread that periodically picks a random tile and reports it over a channel.
// It owns no game or UI state; the UI loop drains the events and applies them itself.

use rand::Rng;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryIter};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

/// A tile chosen for a cosmetic reset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResetEvent {
    pub x: usize,
    pub y: usize,
}

pub struct ResetTicker {
    events: Receiver<ResetEvent>,
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl ResetTicker {
    /// Start ticking for a `width` x `height` board
    pub fn spawn(width: usize, height: usize, interval: Duration) -> ResetTicker {
        let (tx, events) = mpsc::channel::<ResetEvent>();
        let (stop, stop_rx) = mpsc::channel::<()>();
        let handle = thread::spawn(move || {
            let mut rng = rand::thread_rng();
            debug!(width, height, ?interval, "reset ticker started");
            loop {
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {
                        let ev = ResetEvent {
                            x: rng.gen_range(0..width),
                            y: rng.gen_range(0..height),
                        };
                        if tx.send(ev).is_err() {
                            break;
                        }
                    }
                    // explicit stop or owner gone
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
            debug!("reset ticker stopped");
        });
        ResetTicker {
            events,
            stop: Some(stop),
            handle: Some(handle),
        }
    }

    /// Events queued since the last call, without blocking
    pub fn events(&self) -> TryIter<'_, ResetEvent> {
        self.events.try_iter()
    }

    /// Stop the thread and wait for it to finish
    pub fn cancel(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for ResetTicker {
    fn drop(&mut self) {
        self.cancel();
    }
}

//! Background reader
//!
//! Drains unsolicited device data while async reading is enabled and
//! publishes it through [`SessionEvents::async_data`]. A failed read means
//! the link is gone: the reader raises `abrupt_disconnect` and exits.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::Signal;
use crate::events::SessionEvents;
use crate::transport::{DataReady, Transport};

pub(super) struct ReaderContext {
    pub transport: Arc<dyn Transport>,
    pub data_ready: Arc<dyn DataReady>,
    pub enabled: Arc<Signal>,
    pub events: Arc<SessionEvents>,
    /// Upper bound on one idle iteration, and so on the latency of a stop
    /// request while no data is being read
    pub poll_interval: Duration,
}

pub(super) struct AsyncReader {
    cancel: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl AsyncReader {
    pub fn spawn(context: ReaderContext) -> io::Result<Self> {
        let cancel = Arc::new(AtomicBool::new(false));
        let thread = thread::Builder::new()
            .name("torquelink-async-read".to_string())
            .spawn({
                let cancel = cancel.clone();
                move || run(context, &cancel)
            })?;
        Ok(Self { cancel, thread })
    }

    pub fn is_running(&self) -> bool {
        !self.thread.is_finished()
    }

    /// Ask the reader to exit.
    ///
    /// Blocks until it has exited, except when called from the reader thread
    /// itself (from inside a notification callback), where it returns at once
    /// and the loop ends after the callback returns.
    pub fn stop(self) {
        self.cancel.store(true, Ordering::SeqCst);

        if self.thread.thread().id() == thread::current().id() {
            debug!("async reader stop requested from its own thread");
            return;
        }
        if self.thread.join().is_err() {
            warn!("async reader thread panicked");
        }
    }
}

fn run(context: ReaderContext, cancel: &AtomicBool) {
    debug!("async reader started");

    while !cancel.load(Ordering::SeqCst) {
        // Both waits share one slice so a stop is seen within `poll_interval`
        let deadline = Instant::now() + context.poll_interval;
        if !context.enabled.wait_timeout(context.poll_interval) {
            continue;
        }
        if !context
            .data_ready
            .wait(deadline.saturating_duration_since(Instant::now()))
        {
            continue;
        }
        if cancel.load(Ordering::SeqCst) {
            break;
        }

        match context.transport.receive(Duration::ZERO) {
            Ok(data) if !data.is_empty() => {
                trace!("async rx {:02x?}", data);
                context.events.async_data.notify(&data);
            }
            Ok(_) => {}
            Err(code) => {
                warn!("async read failed: {}; treating as abrupt disconnect", code);
                context.events.abrupt_disconnect.notify(&());
                break;
            }
        }
    }

    debug!("async reader stopped");
}

//! Device session
//!
//! A [`DeviceSession`] owns the transport of one device for as long as the
//! connection is open. It offers plain send/receive, device queries, and an
//! optional background reader that publishes unsolicited data.
//!
//! All methods take `&self`; a session can be shared through an `Arc` and
//! closed from any thread, including from inside its own notification
//! callbacks.

mod reader;
mod signal;

pub use signal::Signal;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::LinkConfig;
use crate::device::{DeviceDescriptor, ProtocolId, TraceData, Unit};
use crate::error::{ErrorCode, ProtocolError, Result};
use crate::events::SessionEvents;
use crate::transport::{Connector, DataReady, Transport};
use reader::{AsyncReader, ReaderContext};

struct SessionState {
    transport: Option<Arc<dyn Transport>>,
    data_ready: Option<Arc<dyn DataReady>>,
    async_enabled: Option<Arc<Signal>>,
    reader: Option<AsyncReader>,
    descriptor: DeviceDescriptor,
    protocol: ProtocolId,
}

impl SessionState {
    fn closed() -> Self {
        Self {
            transport: None,
            data_ready: None,
            async_enabled: None,
            reader: None,
            descriptor: DeviceDescriptor::empty(),
            protocol: ProtocolId::Invalid,
        }
    }

    /// Move everything an open session holds out of the state, leaving it
    /// closed. Once this returns, `enable_async_read` can no longer start a
    /// reader on the old transport.
    fn take_open(&mut self) -> OpenResources {
        let previous = std::mem::replace(self, Self::closed());
        OpenResources {
            transport: previous.transport,
            reader: previous.reader,
            id: previous.descriptor.id,
        }
    }
}

/// Resources taken out of a session that still have to be released
struct OpenResources {
    transport: Option<Arc<dyn Transport>>,
    reader: Option<AsyncReader>,
    id: String,
}

impl OpenResources {
    /// Stop the reader first so that no notification follows the transport
    /// close, then close the transport.
    fn release(self) {
        if let Some(reader) = self.reader {
            reader.stop();
        }
        if let Some(transport) = self.transport {
            transport.close();
            debug!("session closed: {}", self.id);
        }
    }
}

/// Connection to one device
pub struct DeviceSession {
    connector: Arc<dyn Connector>,
    events: Arc<SessionEvents>,
    poll_interval: Duration,
    state: Mutex<SessionState>,
}

impl DeviceSession {
    /// Create a closed session using default timing
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_config(connector, &LinkConfig::default())
    }

    /// Create a closed session with the reader timing from `config`
    pub fn with_config(connector: Arc<dyn Connector>, config: &LinkConfig) -> Self {
        Self {
            connector,
            events: Arc::new(SessionEvents::default()),
            poll_interval: config.async_poll_interval(),
            state: Mutex::new(SessionState::closed()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport(&self, context: &str) -> Result<Arc<dyn Transport>> {
        self.state()
            .transport
            .clone()
            .ok_or_else(|| ProtocolError::connection(context, ErrorCode::InvalidHandle))
    }

    /// Notification channels of this session
    pub fn events(&self) -> &Arc<SessionEvents> {
        &self.events
    }

    /// Whether a transport is held
    pub fn is_open(&self) -> bool {
        self.state().transport.is_some()
    }

    /// Descriptor of the open device (empty while closed)
    pub fn descriptor(&self) -> DeviceDescriptor {
        self.state().descriptor.clone()
    }

    /// Protocol negotiated at open (`Invalid` while closed)
    pub fn protocol(&self) -> ProtocolId {
        self.state().protocol
    }

    /// Whether the background reader thread exists and has not exited
    pub fn is_async_reader_running(&self) -> bool {
        self.state()
            .reader
            .as_ref()
            .is_some_and(|reader| reader.is_running())
    }

    /// Open the device identified by `id`.
    ///
    /// An open session is closed first. On failure the session is left closed
    /// with nothing acquired.
    pub fn open(&self, id: &str, protocol: ProtocolId, param: i32) -> Result<()> {
        self.close();

        let descriptor = self
            .connector
            .query_device(id)
            .map_err(|code| ProtocolError::connection("query device info", code))?;
        if !descriptor.is_ready() {
            return Err(ProtocolError::connection(
                format!("could not find or identify device '{}'", id),
                ErrorCode::General,
            ));
        }

        let transport = self
            .connector
            .open(&descriptor, protocol, param)
            .map_err(|code| ProtocolError::connection("open", code))?;

        let Some(data_ready) = transport.data_ready() else {
            transport.close();
            return Err(ProtocolError::connection(
                "acquire data-ready signal",
                ErrorCode::InvalidEventObject,
            ));
        };

        debug!("session opened: {} ({:?})", descriptor.id, protocol);

        // A concurrent open may have stored its own transport meanwhile; the
        // last open wins and the other one is released.
        let replaced = {
            let mut state = self.state();
            let replaced = state.take_open();
            state.transport = Some(transport);
            state.data_ready = Some(data_ready);
            state.descriptor = descriptor;
            state.protocol = protocol;
            replaced
        };
        if replaced.transport.is_some() {
            debug!("replacing concurrently opened session: {}", replaced.id);
        }
        replaced.release();
        Ok(())
    }

    /// Stop the background reader and release the transport.
    ///
    /// Safe to call in any state and any number of times.
    pub fn close(&self) {
        // Everything is taken out under one lock, so a concurrent
        // `enable_async_read` either ran before (and its reader is taken
        // here) or finds the session closed. The reader is stopped without
        // holding the lock so that callbacks running on it can still use the
        // session.
        let resources = self.state().take_open();
        resources.release();
    }

    /// Stop the background reader, if any, leaving the session open.
    ///
    /// A later `enable_async_read` starts a new reader.
    pub fn stop_async_read(&self) {
        let reader = {
            let mut state = self.state();
            state.async_enabled = None;
            state.reader.take()
        };
        if let Some(reader) = reader {
            reader.stop();
        }
    }

    /// Discard pending inbound data. Failures are ignored.
    pub fn clear(&self) {
        if let Ok(transport) = self.transport("transport clear") {
            if let Err(code) = transport.clear() {
                debug!("transport clear failed: {}", code);
            }
        }
    }

    /// Start the background reader if needed and let it read.
    pub fn enable_async_read(&self) -> Result<()> {
        let mut state = self.state();
        let (Some(transport), Some(data_ready)) =
            (state.transport.clone(), state.data_ready.clone())
        else {
            return Err(ProtocolError::connection(
                "enable async read",
                ErrorCode::InvalidHandle,
            ));
        };

        if state.reader.is_none() {
            let enabled = Arc::new(Signal::new(false));
            let reader = AsyncReader::spawn(ReaderContext {
                transport,
                data_ready,
                enabled: enabled.clone(),
                events: self.events.clone(),
                poll_interval: self.poll_interval,
            })?;
            state.reader = Some(reader);
            state.async_enabled = Some(enabled);
        }

        if let Some(enabled) = &state.async_enabled {
            enabled.set();
        }
        Ok(())
    }

    /// Pause the background reader. The thread keeps running.
    pub fn disable_async_read(&self) {
        if let Some(enabled) = &self.state().async_enabled {
            enabled.reset();
        }
    }

    fn transport_error(&self, context: &str, code: ErrorCode) -> ProtocolError {
        if code.is_disconnect() {
            warn!("{} failed: device disconnected", context);
            self.events.abrupt_disconnect.notify(&());
        }
        ProtocolError::connection(context, code)
    }

    /// Send raw bytes and publish them through `data_sent`
    pub fn send(&self, data: &[u8]) -> Result<()> {
        let transport = self.transport("transport send")?;
        transport
            .send(data)
            .map_err(|code| self.transport_error("transport send", code))?;

        trace!("tx {:02x?}", data);
        self.events.data_sent.notify(data);
        Ok(())
    }

    /// Receive one message. Returns an empty vector if nothing arrived in time.
    pub fn receive(&self, timeout: Duration) -> Result<Vec<u8>> {
        let transport = self.transport("transport receive")?;
        let data = transport
            .receive(timeout)
            .map_err(|code| self.transport_error("transport receive", code))?;

        if !data.is_empty() {
            trace!("rx {:02x?}", data);
        }
        self.events.data_received.notify(&data);
        Ok(data)
    }

    /// Bit mask of the device's internal output states
    pub fn internal_outputs(&self) -> Result<u32> {
        let transport = self.transport("get output")?;
        transport
            .internal_outputs()
            .map_err(|code| self.transport_error("get output", code))
    }

    /// Fetch the recorded trace of channel `trace_index`
    pub fn trace_points(&self, trace_index: usize) -> Result<TraceData> {
        let transport = self.transport("get trace info")?;
        let info = transport
            .trace_info(trace_index)
            .map_err(|code| self.transport_error("get trace info", code))?;
        let mut points = transport
            .trace_points(trace_index, 0, info.point_count)
            .map_err(|code| self.transport_error("get trace points", code))?;
        points.truncate(info.point_count);

        Ok(TraceData {
            points,
            sample_rate: info.sample_rate,
            unit: Unit::from_raw(info.unit),
        })
    }
}

impl Drop for DeviceSession {
    fn drop(&mut self) {
        self.close();
    }
}

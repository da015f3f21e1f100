//! Scripted in-memory transport for session and protocol tests

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use torquelink_core::config::LinkConfig;
use torquelink_core::device::{DeviceDescriptor, DeviceStatus, ProtocolId, TracePoint};
use torquelink_core::session::Signal;
use torquelink_core::transport::{Connector, DataReady, TraceInfo, Transport, TransportResult};
use torquelink_core::ErrorCode;

pub const DEVICE_ID: &str = "fake://mtf400";

/// Short timeouts so retry tests finish quickly
pub fn test_config() -> LinkConfig {
    LinkConfig {
        read_timeout_ms: 20,
        max_retries: 2,
        async_poll_interval_ms: 2,
        ..LinkConfig::default()
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub struct FakeTransport {
    inbox: Mutex<VecDeque<TransportResult<Vec<u8>>>>,
    arrived: Condvar,
    ready: Arc<Signal>,
    sent: Mutex<Vec<Vec<u8>>>,
    send_error: Mutex<Option<ErrorCode>>,
    open: AtomicBool,
    close_count: AtomicUsize,
    receive_count: AtomicUsize,
    receive_delay: Mutex<Duration>,
    journal: Mutex<Vec<String>>,
    pub outputs: Mutex<TransportResult<u32>>,
    pub trace: Mutex<Option<(TraceInfo, Vec<TracePoint>)>>,
}

impl FakeTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inbox: Mutex::new(VecDeque::new()),
            arrived: Condvar::new(),
            ready: Arc::new(Signal::new(false)),
            sent: Mutex::new(Vec::new()),
            send_error: Mutex::new(None),
            open: AtomicBool::new(false),
            close_count: AtomicUsize::new(0),
            receive_count: AtomicUsize::new(0),
            receive_delay: Mutex::new(Duration::ZERO),
            journal: Mutex::new(Vec::new()),
            outputs: Mutex::new(Err(ErrorCode::NotSupported)),
            trace: Mutex::new(None),
        })
    }

    fn push(&self, item: TransportResult<Vec<u8>>) {
        self.inbox.lock().unwrap().push_back(item);
        self.ready.set();
        self.arrived.notify_all();
    }

    /// Queue bytes for the next receive
    pub fn push_reply(&self, bytes: &[u8]) {
        self.push(Ok(bytes.to_vec()));
    }

    /// Make the next receive fail
    pub fn push_error(&self, code: ErrorCode) {
        self.push(Err(code));
    }

    pub fn fail_sends(&self, code: ErrorCode) {
        *self.send_error.lock().unwrap() = Some(code);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    pub fn pending(&self) -> usize {
        self.inbox.lock().unwrap().len()
    }

    pub fn close_count(&self) -> usize {
        self.close_count.load(Ordering::SeqCst)
    }

    pub fn receive_count(&self) -> usize {
        self.receive_count.load(Ordering::SeqCst)
    }

    /// Sleep this long at the start of every receive
    pub fn set_receive_delay(&self, delay: Duration) {
        *self.receive_delay.lock().unwrap() = delay;
    }

    /// Sends (`"tx <text>"`) and receives (`"rx"`) in the order they happened
    pub fn journal(&self) -> Vec<String> {
        self.journal.lock().unwrap().clone()
    }

    fn mark_open(&self) {
        self.open.store(true, Ordering::SeqCst);
    }
}

impl Transport for FakeTransport {
    fn send(&self, data: &[u8]) -> TransportResult<()> {
        if !self.is_valid() {
            return Err(ErrorCode::InvalidHandle);
        }
        if let Some(code) = *self.send_error.lock().unwrap() {
            return Err(code);
        }
        self.sent.lock().unwrap().push(data.to_vec());
        self.journal
            .lock()
            .unwrap()
            .push(format!("tx {}", String::from_utf8_lossy(data)));
        Ok(())
    }

    fn receive(&self, timeout: Duration) -> TransportResult<Vec<u8>> {
        if !self.is_valid() {
            return Err(ErrorCode::InvalidHandle);
        }
        self.receive_count.fetch_add(1, Ordering::SeqCst);
        let delay = *self.receive_delay.lock().unwrap();
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
        self.journal.lock().unwrap().push("rx".to_string());

        let inbox = self.inbox.lock().unwrap();
        let (mut inbox, _) = self
            .arrived
            .wait_timeout_while(inbox, timeout, |queue| queue.is_empty())
            .unwrap();
        let item = inbox.pop_front();
        if inbox.is_empty() {
            self.ready.reset();
        }
        item.unwrap_or_else(|| Ok(Vec::new()))
    }

    fn clear(&self) -> TransportResult<()> {
        self.inbox.lock().unwrap().clear();
        self.ready.reset();
        Ok(())
    }

    fn is_valid(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    fn close(&self) {
        if self.open.swap(false, Ordering::SeqCst) {
            self.close_count.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn data_ready(&self) -> Option<Arc<dyn DataReady>> {
        Some(self.ready.clone())
    }

    fn internal_outputs(&self) -> TransportResult<u32> {
        *self.outputs.lock().unwrap()
    }

    fn trace_info(&self, _trace_index: usize) -> TransportResult<TraceInfo> {
        self.trace
            .lock()
            .unwrap()
            .as_ref()
            .map(|(info, _)| *info)
            .ok_or(ErrorCode::NotSupported)
    }

    fn trace_points(
        &self,
        _trace_index: usize,
        start: usize,
        max_points: usize,
    ) -> TransportResult<Vec<TracePoint>> {
        self.trace
            .lock()
            .unwrap()
            .as_ref()
            .map(|(_, points)| points.iter().skip(start).take(max_points).copied().collect())
            .ok_or(ErrorCode::NotSupported)
    }
}

/// Hands out the same [`FakeTransport`] on every open, or a new one per open
/// when `fresh_transports` is set
pub struct FakeConnector {
    pub transport: Arc<FakeTransport>,
    pub fresh_transports: AtomicBool,
    /// Transports created because of `fresh_transports`, in open order
    pub opened: Mutex<Vec<Arc<FakeTransport>>>,
    pub status: Mutex<DeviceStatus>,
    pub open_error: Mutex<Option<ErrorCode>>,
    /// When false, opened transports report no data-ready signal
    pub with_data_ready: AtomicBool,
    pub open_count: AtomicUsize,
}

impl FakeConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            transport: FakeTransport::new(),
            fresh_transports: AtomicBool::new(false),
            opened: Mutex::new(Vec::new()),
            status: Mutex::new(DeviceStatus::Ready),
            open_error: Mutex::new(None),
            with_data_ready: AtomicBool::new(true),
            open_count: AtomicUsize::new(0),
        })
    }

    pub fn descriptor(&self) -> DeviceDescriptor {
        self.query_device(DEVICE_ID).unwrap()
    }
}

impl Connector for FakeConnector {
    fn query_device(&self, id: &str) -> TransportResult<DeviceDescriptor> {
        Ok(DeviceDescriptor {
            serial: "MT-0001".to_string(),
            id: id.to_string(),
            status: *self.status.lock().unwrap(),
            index: 0,
            ..DeviceDescriptor::empty()
        })
    }

    fn open(
        &self,
        _descriptor: &DeviceDescriptor,
        _protocol: ProtocolId,
        _param: i32,
    ) -> TransportResult<Arc<dyn Transport>> {
        if let Some(code) = *self.open_error.lock().unwrap() {
            return Err(code);
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);
        let transport = if self.fresh_transports.load(Ordering::SeqCst) {
            let transport = FakeTransport::new();
            self.opened.lock().unwrap().push(transport.clone());
            transport
        } else {
            self.transport.clone()
        };
        transport.mark_open();

        if self.with_data_ready.load(Ordering::SeqCst) {
            Ok(transport)
        } else {
            Ok(Arc::new(NoSignalTransport(transport)))
        }
    }
}

/// Wraps a fake transport but offers no data-ready signal
struct NoSignalTransport(Arc<FakeTransport>);

impl Transport for NoSignalTransport {
    fn send(&self, data: &[u8]) -> TransportResult<()> {
        self.0.send(data)
    }

    fn receive(&self, timeout: Duration) -> TransportResult<Vec<u8>> {
        self.0.receive(timeout)
    }

    fn clear(&self) -> TransportResult<()> {
        self.0.clear()
    }

    fn is_valid(&self) -> bool {
        self.0.is_valid()
    }

    fn close(&self) {
        self.0.close()
    }

    fn data_ready(&self) -> Option<Arc<dyn DataReady>> {
        None
    }
}

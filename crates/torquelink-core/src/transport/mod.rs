//! Transport abstraction
//!
//! A [`Connector`] looks devices up and opens them; the resulting
//! [`Transport`] is the open link to one device. Transports are shared
//! between the foreground caller and the background reader, so every method
//! takes `&self` and implementations synchronise internally.
//!
//! Failures are reported as a bare [`ErrorCode`]; the session turns them into
//! [`crate::ProtocolError::Connection`] with context.

pub mod serial;

use std::sync::Arc;
use std::time::Duration;

use crate::device::{DeviceDescriptor, ProtocolId, TracePoint};
use crate::error::ErrorCode;

/// Result of a transport call
pub type TransportResult<T> = std::result::Result<T, ErrorCode>;

/// Waitable "data ready" indication of an open transport
pub trait DataReady: Send + Sync {
    /// Block until data is ready or `timeout` elapses. Returns `true` if ready.
    fn wait(&self, timeout: Duration) -> bool;
}

/// Trace channel metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TraceInfo {
    /// Number of recorded samples
    pub point_count: usize,
    /// Samples per second
    pub sample_rate: i32,
    /// Raw unit index, see [`crate::device::Unit::from_raw`]
    pub unit: i32,
}

/// Open link to one device
pub trait Transport: Send + Sync {
    /// Send one message
    fn send(&self, data: &[u8]) -> TransportResult<()>;

    /// Receive one message, waiting at most `timeout`.
    ///
    /// Returns an empty vector on timeout. A zero timeout only collects what
    /// is already buffered.
    fn receive(&self, timeout: Duration) -> TransportResult<Vec<u8>>;

    /// Discard pending inbound data
    fn clear(&self) -> TransportResult<()>;

    /// Whether the underlying handle is still usable
    fn is_valid(&self) -> bool;

    /// Release the handle. Must be idempotent.
    fn close(&self);

    /// Signal raised while inbound data is waiting, if the transport has one
    fn data_ready(&self) -> Option<Arc<dyn DataReady>>;

    /// Bit mask of the device's internal output states
    fn internal_outputs(&self) -> TransportResult<u32> {
        Err(ErrorCode::NotSupported)
    }

    /// Metadata of trace channel `trace_index`
    fn trace_info(&self, _trace_index: usize) -> TransportResult<TraceInfo> {
        Err(ErrorCode::NotSupported)
    }

    /// Read up to `max_points` trace samples starting at `start`
    fn trace_points(
        &self,
        _trace_index: usize,
        _start: usize,
        _max_points: usize,
    ) -> TransportResult<Vec<TracePoint>> {
        Err(ErrorCode::NotSupported)
    }
}

/// Device lookup and transport factory
pub trait Connector: Send + Sync {
    /// Look up a device by its connection string
    fn query_device(&self, id: &str) -> TransportResult<DeviceDescriptor>;

    /// Open a transport to a device. `param` is reserved and passed through.
    fn open(
        &self,
        descriptor: &DeviceDescriptor,
        protocol: ProtocolId,
        param: i32,
    ) -> TransportResult<Arc<dyn Transport>>;
}

//! Serial port transport
//!
//! Talks to a device attached through a USB-serial or RS-232 port using the
//! `serialport` crate. Messages are read whole: bytes are collected until an
//! ETX arrives or the line goes quiet for the inter-character timeout.

use serialport::{SerialPort, SerialPortType};
use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

use super::{Connector, DataReady, Transport, TransportResult};
use crate::config::{LinkConfig, SerialConfig};
use crate::device::{ComInterface, DeviceDescriptor, DeviceStatus, DeviceType, ProtocolId};
use crate::error::ErrorCode;
use crate::protocol::ETX;

/// Granularity of the bytes-available polling
const POLL_INTERVAL: Duration = Duration::from_millis(1);

type PortSlot = Mutex<Option<Box<dyn SerialPort>>>;

fn lock(slot: &PortSlot) -> MutexGuard<'_, Option<Box<dyn SerialPort>>> {
    slot.lock().unwrap_or_else(PoisonError::into_inner)
}

fn map_io_error(kind: io::ErrorKind, fallback: ErrorCode) -> ErrorCode {
    match kind {
        io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::NotFound
        | io::ErrorKind::UnexpectedEof
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted => ErrorCode::Disconnected,
        _ => fallback,
    }
}

fn map_serial_error(e: &serialport::Error, fallback: ErrorCode) -> ErrorCode {
    match e.kind() {
        serialport::ErrorKind::NoDevice => ErrorCode::Disconnected,
        serialport::ErrorKind::InvalidInput => ErrorCode::InvalidParameter,
        serialport::ErrorKind::Io(kind) => map_io_error(kind, fallback),
        _ => fallback,
    }
}

/// Configure a freshly opened port for device communication
fn configure_port(port: &mut dyn SerialPort) -> Result<(), serialport::Error> {
    // Standard 8N1 configuration
    port.set_data_bits(serialport::DataBits::Eight)?;
    port.set_parity(serialport::Parity::None)?;
    port.set_stop_bits(serialport::StopBits::One)?;
    port.set_flow_control(serialport::FlowControl::None)?;

    // Some USB bridges only forward data with DTR/RTS asserted
    if let Err(e) = port.write_data_terminal_ready(true) {
        warn!("configure_port: failed to set DTR high: {} (continuing)", e);
    }
    if let Err(e) = port.write_request_to_send(true) {
        warn!("configure_port: failed to set RTS high: {} (continuing)", e);
    }

    Ok(())
}

/// Opens serial-attached devices
#[derive(Debug, Clone)]
pub struct SerialConnector {
    config: SerialConfig,
    rx_buffer_size: usize,
}

impl SerialConnector {
    /// Connector with the default receive buffer size
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            rx_buffer_size: crate::config::DEFAULT_RX_BUFFER_SIZE,
        }
    }

    /// Connector using the serial settings and buffer size of `config`
    pub fn from_link_config(config: &LinkConfig) -> Self {
        Self {
            config: config.serial.clone(),
            rx_buffer_size: config.rx_buffer_size,
        }
    }
}

impl Default for SerialConnector {
    fn default() -> Self {
        Self::new(SerialConfig::default())
    }
}

impl Connector for SerialConnector {
    fn query_device(&self, id: &str) -> TransportResult<DeviceDescriptor> {
        let mut descriptor = DeviceDescriptor {
            serial: id.to_string(),
            id: id.to_string(),
            ..DeviceDescriptor::empty()
        };

        let ports = serialport::available_ports().unwrap_or_default();
        if let Some((index, info)) = ports
            .into_iter()
            .enumerate()
            .find(|(_, info)| info.port_name == id)
        {
            descriptor.index = index as i32;
            descriptor.status = DeviceStatus::Ready;
            descriptor.interface = match info.port_type {
                SerialPortType::UsbPort(usb) => {
                    if let Some(serial) = usb.serial_number {
                        descriptor.serial = serial;
                    }
                    ComInterface::Usb
                }
                _ => ComInterface::Rs232,
            };
        } else if Path::new(id).exists() {
            // Enumeration misses some ACM/USB nodes; trust the device node itself
            descriptor.status = DeviceStatus::Ready;
            descriptor.interface = ComInterface::Rs232;
        }

        descriptor.device_type = DeviceType::Unknown;
        debug!("query_device {}: {:?}", id, descriptor.status);
        Ok(descriptor)
    }

    fn open(
        &self,
        descriptor: &DeviceDescriptor,
        protocol: ProtocolId,
        _param: i32,
    ) -> TransportResult<Arc<dyn Transport>> {
        if protocol != ProtocolId::Ascii {
            return Err(ErrorCode::NotSupported);
        }

        let mut port = serialport::new(descriptor.id.as_str(), self.config.baud_rate)
            .timeout(Duration::from_millis(self.config.open_timeout_ms))
            .open()
            .map_err(|e| {
                debug!("open {} failed: {}", descriptor.id, e);
                map_serial_error(&e, ErrorCode::ConnectionError)
            })?;
        configure_port(port.as_mut()).map_err(|e| map_serial_error(&e, ErrorCode::InterfaceError))?;
        port.clear(serialport::ClearBuffer::All)
            .map_err(|e| map_serial_error(&e, ErrorCode::InterfaceError))?;

        let watcher = port
            .try_clone()
            .map_err(|e| map_serial_error(&e, ErrorCode::InvalidEventObject))?;

        debug!(
            "opened {} at {} baud",
            descriptor.id, self.config.baud_rate
        );

        Ok(Arc::new(SerialTransport {
            port: Mutex::new(Some(port)),
            ready: Arc::new(SerialDataReady {
                watcher: Mutex::new(Some(watcher)),
            }),
            inter_char_timeout: Duration::from_millis(self.config.inter_char_timeout_ms),
            rx_buffer_size: self.rx_buffer_size,
        }))
    }
}

/// Polls a cloned port handle for pending input
struct SerialDataReady {
    watcher: PortSlot,
}

impl SerialDataReady {
    fn close(&self) {
        lock(&self.watcher).take();
    }
}

impl DataReady for SerialDataReady {
    fn wait(&self, timeout: Duration) -> bool {
        let start = Instant::now();
        loop {
            {
                let guard = lock(&self.watcher);
                let Some(port) = guard.as_ref() else {
                    return false;
                };
                match port.bytes_to_read() {
                    Ok(n) if n > 0 => return true,
                    Ok(_) => {}
                    // Let the following receive surface the failure
                    Err(_) => return true,
                }
            }
            if start.elapsed() >= timeout {
                return false;
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

/// An open serial port
pub struct SerialTransport {
    port: PortSlot,
    ready: Arc<SerialDataReady>,
    inter_char_timeout: Duration,
    rx_buffer_size: usize,
}

impl SerialTransport {
    /// Read whatever is available right now. `Ok(None)` means nothing pending.
    fn read_available(&self, room: usize) -> TransportResult<Option<Vec<u8>>> {
        let mut guard = lock(&self.port);
        let port = guard.as_mut().ok_or(ErrorCode::InvalidHandle)?;

        let available = port
            .bytes_to_read()
            .map_err(|e| map_serial_error(&e, ErrorCode::ReceiveError))? as usize;
        if available == 0 {
            return Ok(None);
        }

        let mut chunk = vec![0u8; available.min(room)];
        match port.read(&mut chunk) {
            Ok(0) => Err(ErrorCode::Disconnected),
            Ok(n) => {
                chunk.truncate(n);
                Ok(Some(chunk))
            }
            Err(ref e)
                if e.kind() == io::ErrorKind::TimedOut || e.kind() == io::ErrorKind::WouldBlock =>
            {
                Ok(None)
            }
            Err(e) => Err(map_io_error(e.kind(), ErrorCode::ReceiveError)),
        }
    }
}

impl Transport for SerialTransport {
    fn send(&self, data: &[u8]) -> TransportResult<()> {
        let mut guard = lock(&self.port);
        let port = guard.as_mut().ok_or(ErrorCode::InvalidHandle)?;
        trace!("serial tx {:02x?}", data);
        port.write_all(data)
            .map_err(|e| map_io_error(e.kind(), ErrorCode::TransmitError))?;
        port.flush()
            .map_err(|e| map_io_error(e.kind(), ErrorCode::TransmitError))
    }

    fn receive(&self, timeout: Duration) -> TransportResult<Vec<u8>> {
        let start = Instant::now();
        let mut message = Vec::new();
        let mut last_data: Option<Instant> = None;

        loop {
            let room = self.rx_buffer_size - message.len();
            if let Some(chunk) = self.read_available(room)? {
                message.extend_from_slice(&chunk);
                last_data = Some(Instant::now());
                if message.last() == Some(&ETX) || message.len() >= self.rx_buffer_size {
                    break;
                }
                continue;
            }

            match last_data {
                Some(at) if at.elapsed() >= self.inter_char_timeout => break,
                None if start.elapsed() >= timeout => break,
                _ => {}
            }
            thread::sleep(POLL_INTERVAL);
        }

        if !message.is_empty() {
            trace!("serial rx {:02x?}", message);
        }
        Ok(message)
    }

    fn clear(&self) -> TransportResult<()> {
        let guard = lock(&self.port);
        let port = guard.as_ref().ok_or(ErrorCode::InvalidHandle)?;
        port.clear(serialport::ClearBuffer::Input)
            .map_err(|e| map_serial_error(&e, ErrorCode::General))
    }

    fn is_valid(&self) -> bool {
        lock(&self.port).is_some()
    }

    fn close(&self) {
        self.ready.close();
        if lock(&self.port).take().is_some() {
            debug!("serial port closed");
        }
    }

    fn data_ready(&self) -> Option<Arc<dyn DataReady>> {
        Some(self.ready.clone())
    }
}

impl Drop for SerialTransport {
    fn drop(&mut self) {
        self.close();
    }
}

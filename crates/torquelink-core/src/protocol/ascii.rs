//! ASCII protocol connection

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

use super::commands::{parse_cycle_counter, CYCLE_COUNTER};
use super::frame::{decode_text, encode_text, is_valid_message};
use super::ACK_FRAME_LEN;
use crate::config::LinkConfig;
use crate::device::{DeviceDescriptor, ProtocolId};
use crate::error::{ProtocolError, Result};
use crate::events::SessionEvents;
use crate::session::DeviceSession;
use crate::transport::Connector;

/// A device session speaking the checksummed ASCII protocol.
///
/// Each exchange (open, close, or one command with its reply attempts) holds
/// an exclusive lock, so exchanges on one connection never interleave. The
/// background reader does not take this lock; disable async reading before
/// exchanges that must see every reply.
///
/// `open` and `close` stop the background reader before taking the lock, so
/// notification callbacks may call back into the connection. A callback that
/// starts an exchange still waits for any exchange in progress on another
/// thread.
pub struct AsciiConnection {
    session: DeviceSession,
    read_timeout: Duration,
    max_retries: u32,
    exchange: Mutex<()>,
}

impl AsciiConnection {
    /// Create a closed connection with default timing
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self::with_config(connector, &LinkConfig::default())
    }

    /// Create a closed connection with timing taken from `config`
    pub fn with_config(connector: Arc<dyn Connector>, config: &LinkConfig) -> Self {
        Self {
            session: DeviceSession::with_config(connector, config),
            read_timeout: config.read_timeout(),
            max_retries: config.max_retries,
            exchange: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.exchange.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Time to wait for each reply attempt
    pub fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    /// Change the reply timeout of later exchanges
    pub fn set_read_timeout(&mut self, timeout: Duration) {
        self.read_timeout = timeout;
    }

    /// Receive attempts after the first before giving up
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Change the retry budget of later exchanges
    pub fn set_max_retries(&mut self, retries: u32) {
        self.max_retries = retries;
    }

    /// The underlying session
    pub fn session(&self) -> &DeviceSession {
        &self.session
    }

    /// Notification channels of the underlying session
    pub fn events(&self) -> &Arc<SessionEvents> {
        self.session.events()
    }

    /// Whether a device is open
    pub fn is_open(&self) -> bool {
        self.session.is_open()
    }

    /// Open a device using the ASCII protocol
    pub fn open(&self, descriptor: &DeviceDescriptor) -> Result<()> {
        self.open_with(&descriptor.id, ProtocolId::Ascii, 0)
    }

    /// Open a device by connection string with an explicit protocol
    pub fn open_with(&self, id: &str, protocol: ProtocolId, param: i32) -> Result<()> {
        self.session.stop_async_read();
        let _guard = self.lock();
        self.session.open(id, protocol, param)
    }

    /// Close the device if open. Safe to call any number of times.
    pub fn close(&self) {
        self.session.stop_async_read();
        let _guard = self.lock();
        if self.session.is_open() {
            self.session.close();
        }
    }

    /// Start delivering unsolicited data through `events().async_data`
    pub fn enable_async_read(&self) -> Result<()> {
        self.session.enable_async_read()
    }

    /// Pause delivery of unsolicited data
    pub fn disable_async_read(&self) {
        self.session.disable_async_read()
    }

    /// Send `command` and receive until `accept` takes a valid frame or the
    /// retry budget runs out. Every receive call uses up one attempt.
    fn exchange<T>(&self, command: &str, mut accept: impl FnMut(&[u8]) -> Option<T>) -> Result<T> {
        let _guard = self.lock();

        let tx = encode_text(command);
        self.session.send(&tx)?;

        for attempt in 0..=self.max_retries {
            let rx = self.session.receive(self.read_timeout)?;

            if is_valid_message(&rx) {
                if let Some(result) = accept(&rx) {
                    return Ok(result);
                }
                debug!(
                    "{:?}: ignoring uncorrelated frame (attempt {})",
                    command,
                    attempt + 1
                );
            } else if !rx.is_empty() {
                debug!(
                    "{:?}: ignoring invalid frame {:02x?} (attempt {})",
                    command,
                    rx,
                    attempt + 1
                );
            }
        }

        debug!("{:?}: no reply after {} attempts", command, self.max_retries + 1);
        Err(ProtocolError::ProtocolTimeout)
    }

    /// Send a command and wait for ACK (`true`) or NAK (`false`)
    pub fn send_wait_ack(&self, command: &str) -> Result<bool> {
        self.exchange(command, |rx| {
            if rx.len() != ACK_FRAME_LEN {
                return None;
            }
            match rx[2] {
                b'A' => Some(true),
                b'N' => Some(false),
                _ => None,
            }
        })
    }

    /// Send a command and wait for the reply that echoes it.
    ///
    /// A reply matches when the `command_len` characters at offset 2 are a
    /// prefix of `command` and the reply is longer than `command_len + 2`.
    /// Returns the whole decoded frame.
    pub fn send_wait_reply(&self, command: &str, command_len: usize) -> Result<String> {
        let tx = encode_text(command);
        self.exchange(command, |rx| {
            if rx.len() > command_len + 2 && tx.starts_with(&rx[2..2 + command_len]) {
                Some(decode_text(rx))
            } else {
                None
            }
        })
    }

    /// Read the device's tightening cycle counter
    pub fn read_cycle_counter(&self) -> Result<u32> {
        let reply = self.send_wait_reply(CYCLE_COUNTER, CYCLE_COUNTER.len())?;
        parse_cycle_counter(&reply)
    }
}

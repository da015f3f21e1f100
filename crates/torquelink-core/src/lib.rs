//! # TorqueLink Core Library
//!
//! Host-side communication with MicroTorque torque-measurement devices.

#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

//!
//! This library provides:
//! - A [`session::DeviceSession`] owning the transport of one device, with a
//!   cancellable background reader for unsolicited data
//! - The checksummed ASCII protocol ([`protocol::AsciiConnection`]) with
//!   request/reply correlation and bounded retry
//! - A serial port transport ([`transport::serial::SerialConnector`])
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use torquelink_core::prelude::*;
//!
//! let connector = Arc::new(SerialConnector::default());
//! let conn = AsciiConnection::new(connector.clone());
//! let device = connector.query_device("/dev/ttyUSB0")?;
//! conn.open(&device)?;
//!
//! let reply = conn.send_wait_reply("IC", 2)?;
//! println!("cycle counter reply: {reply}");
//! conn.close();
//! ```

pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod protocol;
pub mod session;
pub mod transport;

pub use error::{ErrorCode, ProtocolError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::LinkConfig;
    pub use crate::device::{
        DeviceDescriptor, DeviceStatus, ProtocolId, TraceData, TracePoint, Unit,
    };
    pub use crate::error::{ErrorCode, ProtocolError};
    pub use crate::events::{SessionEvents, SubscriptionId};
    pub use crate::protocol::AsciiConnection;
    pub use crate::session::DeviceSession;
    pub use crate::transport::serial::SerialConnector;
    pub use crate::transport::{Connector, Transport};
}

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

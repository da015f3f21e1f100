//! Device description
//!
//! Identity and status of a MicroTorque device as reported by the transport,
//! plus the value types returned by device-specific queries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Physical interface a device is attached through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ComInterface {
    /// Not attached / unknown
    Invalid,
    /// USB (including USB-serial bridges)
    Usb,
    /// RS-232 serial line
    Rs232,
    /// TCP/IP
    Tcp,
}

/// Known device families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceType {
    /// Not identified
    Unknown,
    /// MicroTest MC
    MicroTestMc,
    /// MT G4
    MtG4,
    /// ACTA MT4
    ActaMt4,
    /// MTF400 (B variant)
    Mtf400B,
    /// MTF400 (A variant)
    Mtf400A,
    /// MTF400 (D variant)
    Mtf400D,
    /// MTF6000
    Mtf6000,
}

/// Readiness of a device as seen by the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// No device behind the connection string
    NotFound,
    /// Device node exists but is not usable yet
    Present,
    /// Attached but not identified
    Connected,
    /// Can be opened
    Ready,
}

/// Protocol negotiated when opening a transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProtocolId {
    /// No protocol (closed session)
    Invalid,
    /// Checksummed ASCII command protocol
    Ascii,
    /// Legacy binary trace protocol
    LegacyTrace,
    /// Legacy binary result summary protocol
    LegacySummary,
}

/// Torque/force unit reported with trace data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Unit {
    /// mNm
    MilliNewtonMeter,
    /// cNm
    CentiNewtonMeter,
    /// Nm
    NewtonMeter,
    /// mN
    MilliNewton,
    /// N
    Newton,
    /// kN
    KiloNewton,
    /// in.lbf
    InchPoundForce,
    /// lbf
    PoundForce,
    /// in.ozf
    InchOunceForce,
    /// gcm
    GramCentimeter,
    /// kgm
    KilogramMeter,
    /// ft.lbf
    FootPoundForce,
    /// ozf
    OunceForce,
    /// kgf
    KilogramForce,
    /// gf
    GramForce,
    /// Unknown unit index
    Invalid,
}

impl Unit {
    const ORDERED: [Unit; 15] = [
        Unit::MilliNewtonMeter,
        Unit::CentiNewtonMeter,
        Unit::NewtonMeter,
        Unit::MilliNewton,
        Unit::Newton,
        Unit::KiloNewton,
        Unit::InchPoundForce,
        Unit::PoundForce,
        Unit::InchOunceForce,
        Unit::GramCentimeter,
        Unit::KilogramMeter,
        Unit::FootPoundForce,
        Unit::OunceForce,
        Unit::KilogramForce,
        Unit::GramForce,
    ];

    /// Convert the driver's unit index
    pub fn from_raw(raw: i32) -> Self {
        usize::try_from(raw)
            .ok()
            .and_then(|i| Self::ORDERED.get(i).copied())
            .unwrap_or(Unit::Invalid)
    }

    /// Short unit symbol
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::MilliNewtonMeter => "mNm",
            Unit::CentiNewtonMeter => "cNm",
            Unit::NewtonMeter => "Nm",
            Unit::MilliNewton => "mN",
            Unit::Newton => "N",
            Unit::KiloNewton => "kN",
            Unit::InchPoundForce => "in.lbf",
            Unit::PoundForce => "lbf",
            Unit::InchOunceForce => "in.ozf",
            Unit::GramCentimeter => "gcm",
            Unit::KilogramMeter => "kgm",
            Unit::FootPoundForce => "ft.lbf",
            Unit::OunceForce => "ozf",
            Unit::KilogramForce => "kgf",
            Unit::GramForce => "gf",
            Unit::Invalid => "?",
        }
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// One sample of a tightening trace
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct TracePoint {
    /// Torque in the unit of the trace
    pub torque: f64,
    /// Angle in degrees
    pub angle: f64,
}

/// Trace data retrieved from a device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraceData {
    /// Samples in recording order
    pub points: Vec<TracePoint>,
    /// Samples per second
    pub sample_rate: i32,
    /// Unit of the torque values
    pub unit: Unit,
}

/// Identity and status of a device.
///
/// `id` is the connection string the transport understands (a port path for
/// serial links). Two descriptors are equal when their ids are equal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceDescriptor {
    /// Device serial number, or the connection string when unknown
    pub serial: String,
    /// Connection string
    pub id: String,
    /// Interface the device is attached through
    pub interface: ComInterface,
    /// Device family
    pub device_type: DeviceType,
    /// Readiness at query time
    pub status: DeviceStatus,
    /// Enumeration index, `-1` if not enumerated
    pub index: i32,
}

impl DeviceDescriptor {
    /// The descriptor held by a closed session
    pub fn empty() -> Self {
        Self {
            serial: String::new(),
            id: String::new(),
            interface: ComInterface::Invalid,
            device_type: DeviceType::Unknown,
            status: DeviceStatus::NotFound,
            index: -1,
        }
    }

    /// True for the descriptor of a closed session
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
    }

    /// Whether the device can be opened
    pub fn is_ready(&self) -> bool {
        self.status == DeviceStatus::Ready
    }
}

impl Default for DeviceDescriptor {
    fn default() -> Self {
        Self::empty()
    }
}

impl PartialEq for DeviceDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for DeviceDescriptor {}

impl Hash for DeviceDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Display for DeviceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.serial)
    }
}

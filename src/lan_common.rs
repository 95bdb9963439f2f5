use std::fmt;

use serde::{Deserialize, Serialize};

pub type PacketId = u64;
pub type Ttl = u32;
pub type SimTime = u64;

pub const DEFAULT_TTL: Ttl = 64;

// every tick runs this many full passes over the device registry, so a packet
// can advance two hops per user-visible tick
pub const PASSES_PER_TICK: usize = 2;

// ============================================================================
// Addressing of interfaces across devices
// ============================================================================

/// Non-owning handle to an interface on some device (by name).
///
/// Devices own their interfaces; everything else refers to an interface through
/// one of these.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InterfaceRef {
    pub device: String,
    pub interface: String,
}

impl InterfaceRef {
    pub fn new(device: impl Into<String>, interface: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            interface: interface.into(),
        }
    }

    /// Parse the `Device:iface` form used in connection descriptors.
    ///
    /// The split happens on the first `:` so interface names may not contain one
    /// in the device part, but `g0/0` style names are fine.
    pub fn parse(text: &str) -> Option<Self> {
        let (device, interface) = text.trim().split_once(':')?;
        if device.is_empty() || interface.is_empty() || interface.contains(':') {
            return None;
        }
        Some(Self::new(device, interface))
    }
}

impl fmt::Display for InterfaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.interface)
    }
}

// ============================================================================
// Device kinds
// ============================================================================

/// Device types only differ in the interfaces they are provisioned with.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceKind {
    Router,
    Switch,
    #[serde(alias = "pc")]
    Host,
    Firewall,
}

const ROUTER_INTERFACES: &[&str] = &["g0/0", "g0/1"];
const SWITCH_INTERFACES: &[&str] = &["g0/0", "g0/1", "g0/2", "g0/3"];
const HOST_INTERFACES: &[&str] = &["eth0"];
const FIREWALL_INTERFACES: &[&str] = &["inside", "outside"];

impl DeviceKind {
    pub fn default_interfaces(&self) -> &'static [&'static str] {
        match self {
            DeviceKind::Router => ROUTER_INTERFACES,
            DeviceKind::Switch => SWITCH_INTERFACES,
            DeviceKind::Host => HOST_INTERFACES,
            DeviceKind::Firewall => FIREWALL_INTERFACES,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::Router => "router",
            DeviceKind::Switch => "switch",
            DeviceKind::Host => "host",
            DeviceKind::Firewall => "firewall",
        }
    }

    /// Case-insensitive lookup; `pc` is accepted as an alias for `host`.
    pub fn parse(text: &str) -> Option<Self> {
        match text.to_ascii_lowercase().as_str() {
            "router" => Some(DeviceKind::Router),
            "switch" => Some(DeviceKind::Switch),
            "host" | "pc" => Some(DeviceKind::Host),
            "firewall" => Some(DeviceKind::Firewall),
            _ => None,
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Packet outcomes and configuration errors
// ============================================================================

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum DropReason {
    TtlExpired,
    NoRoute,
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::TtlExpired => f.write_str("TTL expired"),
            DropReason::NoRoute => f.write_str("no route to destination"),
        }
    }
}

/// Configuration failures reported by the simulation core
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LanError {
    /// No device registered under this name
    UnknownDevice(String),

    /// Device exists but has no interface with this name
    UnknownInterface { device: String, interface: String },

    /// A device with this name is already registered
    DuplicateDevice(String),

    /// The device already has an interface with this name
    DuplicateInterface { device: String, interface: String },

    /// Not a dotted quad with octets in 0..=255
    InvalidAddress(String),

    /// Both ends of a connection are the same interface
    SelfConnection(InterfaceRef),

    /// Device is offline and cannot originate traffic
    DeviceOffline(String),

    /// No up interface on the device carries the requested source address
    NoSourceInterface { device: String, address: String },

    /// Connection descriptor not in `DevA:ifA <-> DevB:ifB` form
    MalformedConnection(String),
}

impl fmt::Display for LanError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LanError::UnknownDevice(name) => write!(f, "device '{}' not found", name),
            LanError::UnknownInterface { device, interface } => {
                write!(f, "interface '{}' not found on device '{}'", interface, device)
            }
            LanError::DuplicateDevice(name) => write!(f, "device '{}' already exists", name),
            LanError::DuplicateInterface { device, interface } => {
                write!(f, "interface '{}' already exists on device '{}'", interface, device)
            }
            LanError::InvalidAddress(address) => write!(f, "invalid IP address '{}'", address),
            LanError::SelfConnection(iface) => {
                write!(f, "cannot connect interface {} to itself", iface)
            }
            LanError::DeviceOffline(name) => write!(f, "device '{}' is offline", name),
            LanError::NoSourceInterface { device, address } => write!(
                f,
                "device '{}' has no up interface with address {}",
                device, address
            ),
            LanError::MalformedConnection(text) => {
                write!(f, "malformed connection descriptor '{}'", text)
            }
        }
    }
}

impl std::error::Error for LanError {}

// ============================================================================
// Event Logging System
// ============================================================================

/// Events emitted while devices process packets during a tick
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Packet reached a device whose interface carries the destination address
    PacketDelivered {
        packet: PacketId,
        device: String,
        hops: usize,
    },
    /// Packet placed on an egress queue for the next hop
    PacketForwarded {
        packet: PacketId,
        device: String,
        egress: String,
        ttl: Ttl,
    },
    /// Packet handed from an egress queue to a neighbor's ingress queue
    PacketTransmitted {
        packet: PacketId,
        from: InterfaceRef,
        to: InterfaceRef,
    },
    /// Packet reached a terminal dropped state
    PacketDropped {
        packet: PacketId,
        device: String,
        reason: DropReason,
    },
}

/// Trait for consuming events from the simulation
pub trait EventSink {
    fn log(&mut self, tick: SimTime, event: Event);
}

/// No-op event sink (zero overhead)
pub struct NoOpSink;

impl EventSink for NoOpSink {
    #[inline(always)]
    fn log(&mut self, _tick: SimTime, _event: Event) {}
}

/// Forwards every event to the `log` facade at debug level
pub struct LogEventSink;

impl EventSink for LogEventSink {
    fn log(&mut self, tick: SimTime, event: Event) {
        match event {
            Event::PacketDelivered {
                packet,
                device,
                hops,
            } => log::debug!("{} dlv: {:08x} at {} hops:{}", tick, packet, device, hops),
            Event::PacketForwarded {
                packet,
                device,
                egress,
                ttl,
            } => log::debug!("{} fwd: {:08x} {} -> {} ttl:{}", tick, packet, device, egress, ttl),
            Event::PacketTransmitted { packet, from, to } => {
                log::debug!("{} tx: {:08x} {} -> {}", tick, packet, from, to)
            }
            Event::PacketDropped {
                packet,
                device,
                reason,
            } => log::debug!("{} drop: {:08x} at {} ({})", tick, packet, device, reason),
        }
    }
}

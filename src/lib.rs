//! # lan-sim - Virtual LAN Packet Forwarding Simulator
//!
//! A discrete-time simulation of a small local network: devices (routers,
//! switches, hosts, firewalls) own interfaces, interfaces are wired together
//! into a symmetric neighbor topology, and packets move hop by hop as the
//! network is ticked.
//!
//! ## Core Components
//!
//! - **Packet**: addressed unit of traffic with a TTL, a hop trace and a terminal state
//! - **Interface**: addressed port with ingress/egress FIFOs and a neighbor set
//! - **Device**: named node that processes one packet per queue per step
//! - **Network**: device and connection registry driving the tick loop
//!
//! Routing is deliberately naive: a device forwards on the first up interface
//! that has a neighbor, whatever the destination. Packets can bounce between
//! two devices until their TTL runs out, which is the behavior being studied.
//!
//! ```no_run
//! use lan_sim::lan_snapshot::demo_topology;
//!
//! let mut network = demo_topology().expect("demo topology is valid");
//! network
//!     .send("PC1", "192.168.1.10", "10.0.0.10", "hello", None)
//!     .expect("PC1 owns 192.168.1.10");
//!
//! for packet in network.tick() {
//!     println!("{}", packet);
//! }
//! println!("delivered so far: {}", network.stats().delivered);
//! ```
//!
//! ## Tools
//!
//! The `lan_sim` binary is a router-style console over a [`Network`]
//! (see [`lan_cli`]); `scenario_runner` plays YAML scenario files
//! (see [`lan_scenario`]).

// Core simulation
pub mod lan_common;
pub mod lan_containers;
pub mod lan_device;
pub mod lan_iface;
pub mod lan_network;
pub mod lan_packet;
pub mod lan_stats;

// Configuration and persistence
pub mod lan_persistence;
pub mod lan_snapshot;

// Front ends
pub mod lan_cli;
pub mod lan_report;
pub mod lan_scenario;

// Re-export commonly used types
pub use lan_common::{
    DeviceKind, DropReason, Event, EventSink, InterfaceRef, LanError, LogEventSink, NoOpSink,
    PacketId, SimTime, Ttl, DEFAULT_TTL, PASSES_PER_TICK,
};
pub use lan_device::Device;
pub use lan_iface::Interface;
pub use lan_network::{Connection, Network, TopologyViolation};
pub use lan_packet::Packet;
pub use lan_snapshot::NetworkSnapshot;
pub use lan_stats::GlobalStats;

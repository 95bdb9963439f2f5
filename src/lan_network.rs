// Network: device registry, connection registry and the tick loop.
//
// The registry is insertion ordered. Every pass visits devices in that order,
// which decides how far a packet travels within one tick.

use std::fmt;

use hashbrown::HashSet;
use indexmap::IndexMap;
use log::{debug, info, warn};

use crate::lan_common::{
    DeviceKind, EventSink, InterfaceRef, LanError, NoOpSink, PacketId, SimTime, Ttl, DEFAULT_TTL,
    PASSES_PER_TICK,
};
use crate::lan_device::{Device, Medium};
use crate::lan_iface::Interface;
use crate::lan_packet::Packet;
use crate::lan_stats::GlobalStats;

// ============================================================================
// Connections
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Connection {
    pub a: InterfaceRef,
    pub b: InterfaceRef,
}

impl Connection {
    pub fn new(a: InterfaceRef, b: InterfaceRef) -> Self {
        Self { a, b }
    }

    /// Same link, in either orientation
    pub fn joins(&self, x: &InterfaceRef, y: &InterfaceRef) -> bool {
        (&self.a == x && &self.b == y) || (&self.a == y && &self.b == x)
    }

    pub fn involves_device(&self, device: &str) -> bool {
        self.a.device == device || self.b.device == device
    }

    /// Parse `DevA:ifA <-> DevB:ifB`
    pub fn parse(text: &str) -> Result<Self, LanError> {
        let malformed = || LanError::MalformedConnection(text.to_string());
        let (left, right) = text.split_once("<->").ok_or_else(malformed)?;
        let a = InterfaceRef::parse(left).ok_or_else(malformed)?;
        let b = InterfaceRef::parse(right).ok_or_else(malformed)?;
        Ok(Self { a, b })
    }
}

impl fmt::Display for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <-> {}", self.a, self.b)
    }
}

/// `from` lists `to` as a neighbor but `to` does not list `from`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyViolation {
    pub from: InterfaceRef,
    pub to: InterfaceRef,
}

impl fmt::Display for TopologyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "one-way link: {} lists {} but not the reverse",
            self.from, self.to
        )
    }
}

// ============================================================================
// Link table (the medium devices transmit into during a tick)
// ============================================================================

struct LinkTable {
    // administrative state cannot change mid-tick, so this is computed once
    up: HashSet<InterfaceRef>,
    in_flight: Vec<(InterfaceRef, Packet)>,
}

impl Medium for LinkTable {
    fn is_up(&self, iface: &InterfaceRef) -> bool {
        self.up.contains(iface)
    }

    fn transmit(&mut self, to: &InterfaceRef, packet: Packet) {
        self.in_flight.push((to.clone(), packet));
    }
}

// ============================================================================
// Network
// ============================================================================

pub struct Network {
    devices: IndexMap<String, Device>,
    connections: Vec<Connection>,
    stats: GlobalStats,
    ticks: SimTime,
    event_sink: Box<dyn EventSink>,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// Create an empty network with the default NoOpSink
    pub fn new() -> Self {
        Self::with_sink(Box::new(NoOpSink))
    }

    /// Create an empty network with a custom event sink for debugging/analysis
    pub fn with_sink(event_sink: Box<dyn EventSink>) -> Self {
        Self {
            devices: IndexMap::new(),
            connections: Vec::new(),
            stats: GlobalStats::default(),
            ticks: 0,
            event_sink,
        }
    }

    pub fn set_event_sink(&mut self, event_sink: Box<dyn EventSink>) {
        self.event_sink = event_sink;
    }

    /// Take over another network's devices and connections, resetting statistics.
    /// The current event sink is kept.
    pub fn replace_topology(&mut self, other: Network) {
        self.devices = other.devices;
        self.connections = other.connections;
        self.stats = GlobalStats::default();
        self.ticks = 0;
    }

    pub fn ticks(&self) -> SimTime {
        self.ticks
    }

    // ===== Device registry =====

    pub fn add_device(&mut self, name: &str, kind: DeviceKind) -> Result<(), LanError> {
        if self.devices.contains_key(name) {
            return Err(LanError::DuplicateDevice(name.to_string()));
        }
        self.devices.insert(name.to_string(), Device::new(name, kind));
        debug!("added {} {}", kind, name);
        Ok(())
    }

    /// Remove a device together with every link that touches it
    pub fn remove_device(&mut self, name: &str) -> Result<(), LanError> {
        let device = self
            .devices
            .shift_remove(name)
            .ok_or_else(|| LanError::UnknownDevice(name.to_string()))?;

        for iface in device.interfaces() {
            let local = iface.handle();
            for neighbor in iface.neighbors().iter() {
                if let Some(remote) = self.interface_mut(neighbor) {
                    remote.remove_neighbor(&local);
                }
            }
        }
        self.connections.retain(|c| !c.involves_device(name));
        debug!("removed {}", name);
        Ok(())
    }

    /// Rename a device in place, keeping its registry position and its links
    pub fn rename_device(&mut self, old: &str, new: &str) -> Result<(), LanError> {
        if old == new {
            return self
                .device(old)
                .map(|_| ())
                .ok_or_else(|| LanError::UnknownDevice(old.to_string()));
        }
        if self.devices.contains_key(new) {
            return Err(LanError::DuplicateDevice(new.to_string()));
        }
        let (index, _, mut device) = self
            .devices
            .shift_remove_full(old)
            .ok_or_else(|| LanError::UnknownDevice(old.to_string()))?;

        device.set_name(new);
        self.devices.shift_insert(index, new.to_string(), device);

        for device in self.devices.values_mut() {
            for iface in device.interfaces_mut() {
                iface.neighbors_mut().rename_device(old, new);
            }
        }
        for connection in &mut self.connections {
            for end in [&mut connection.a, &mut connection.b] {
                if end.device == old {
                    end.device = new.to_string();
                }
            }
        }
        info!("renamed {} to {}", old, new);
        Ok(())
    }

    pub fn device(&self, name: &str) -> Option<&Device> {
        self.devices.get(name)
    }

    pub fn device_mut(&mut self, name: &str) -> Option<&mut Device> {
        self.devices.get_mut(name)
    }

    fn require_device(&mut self, name: &str) -> Result<&mut Device, LanError> {
        self.devices
            .get_mut(name)
            .ok_or_else(|| LanError::UnknownDevice(name.to_string()))
    }

    /// In registry order
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.values()
    }

    /// `(name, online)` in registry order
    pub fn device_list(&self) -> Vec<(String, bool)> {
        self.devices
            .values()
            .map(|d| (d.name().to_string(), d.is_online()))
            .collect()
    }

    pub fn set_device_online(&mut self, name: &str, online: bool) -> Result<(), LanError> {
        self.require_device(name)?.set_online(online);
        Ok(())
    }

    // ===== Interfaces =====

    pub fn interface(&self, iface: &InterfaceRef) -> Option<&Interface> {
        self.devices.get(&iface.device)?.interface(&iface.interface)
    }

    fn interface_mut(&mut self, iface: &InterfaceRef) -> Option<&mut Interface> {
        self.devices
            .get_mut(&iface.device)?
            .interface_mut(&iface.interface)
    }

    fn require_interface(&self, iface: &InterfaceRef) -> Result<(), LanError> {
        let device = self
            .devices
            .get(&iface.device)
            .ok_or_else(|| LanError::UnknownDevice(iface.device.clone()))?;
        device
            .interface(&iface.interface)
            .map(|_| ())
            .ok_or_else(|| LanError::UnknownInterface {
                device: iface.device.clone(),
                interface: iface.interface.clone(),
            })
    }

    pub fn add_interface(&mut self, device: &str, iface: &str) -> Result<(), LanError> {
        self.require_device(device)?.add_interface(iface)
    }

    pub fn set_address(&mut self, device: &str, iface: &str, address: &str) -> Result<(), LanError> {
        self.require_device(device)?.assign_address(iface, address)
    }

    pub fn set_interface_up(&mut self, device: &str, iface: &str, up: bool) -> Result<(), LanError> {
        self.require_device(device)?.set_interface_up(iface, up)
    }

    // ===== Connections =====

    /// Link two interfaces symmetrically. Connecting an existing pair is a no-op.
    pub fn connect(
        &mut self,
        dev_a: &str,
        if_a: &str,
        dev_b: &str,
        if_b: &str,
    ) -> Result<(), LanError> {
        let a = InterfaceRef::new(dev_a, if_a);
        let b = InterfaceRef::new(dev_b, if_b);
        self.require_interface(&a)?;
        self.require_interface(&b)?;
        if a == b {
            return Err(LanError::SelfConnection(a));
        }

        if let Some(iface) = self.interface_mut(&a) {
            iface.add_neighbor(b.clone());
        }
        if let Some(iface) = self.interface_mut(&b) {
            iface.add_neighbor(a.clone());
        }

        if !self.connections.iter().any(|c| c.joins(&a, &b)) {
            debug!("connected {} <-> {}", a, b);
            self.connections.push(Connection::new(a, b));
        }
        Ok(())
    }

    /// Remove both neighbor entries and the descriptor (either orientation)
    pub fn disconnect(
        &mut self,
        dev_a: &str,
        if_a: &str,
        dev_b: &str,
        if_b: &str,
    ) -> Result<(), LanError> {
        let a = InterfaceRef::new(dev_a, if_a);
        let b = InterfaceRef::new(dev_b, if_b);
        self.require_interface(&a)?;
        self.require_interface(&b)?;

        if let Some(iface) = self.interface_mut(&a) {
            iface.remove_neighbor(&b);
        }
        if let Some(iface) = self.interface_mut(&b) {
            iface.remove_neighbor(&a);
        }
        self.connections.retain(|c| !c.joins(&a, &b));
        debug!("disconnected {} <-> {}", a, b);
        Ok(())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// `DevA:ifA <-> DevB:ifB` strings in creation order
    pub fn connection_strings(&self) -> Vec<String> {
        self.connections.iter().map(|c| c.to_string()).collect()
    }

    /// Report every one-way neighbor entry; nothing is repaired
    pub fn validate_topology(&self) -> Vec<TopologyViolation> {
        let mut violations = Vec::new();
        for device in self.devices.values() {
            for iface in device.interfaces() {
                let local = iface.handle();
                for neighbor in iface.neighbors().iter() {
                    let symmetric = self
                        .interface(neighbor)
                        .map(|remote| remote.neighbors().contains(&local))
                        .unwrap_or(false);
                    if !symmetric {
                        violations.push(TopologyViolation {
                            from: local.clone(),
                            to: neighbor.clone(),
                        });
                    }
                }
            }
        }
        violations
    }

    // ===== Traffic =====

    /// Inject a packet on `device`; `ttl` defaults to DEFAULT_TTL
    pub fn send(
        &mut self,
        device: &str,
        source: &str,
        destination: &str,
        payload: &str,
        ttl: Option<Ttl>,
    ) -> Result<PacketId, LanError> {
        self.require_device(device)?
            .send(source, destination, payload, ttl.unwrap_or(DEFAULT_TTL))
    }

    fn up_interfaces(&self) -> HashSet<InterfaceRef> {
        self.devices
            .values()
            .flat_map(|d| d.interfaces())
            .filter(|iface| iface.is_up())
            .map(Interface::handle)
            .collect()
    }

    fn land(&mut self, links: &mut LinkTable) {
        for (to, packet) in links.in_flight.drain(..) {
            let rejected = match self.interface_mut(&to) {
                Some(iface) => iface.enqueue_ingress(packet).err(),
                None => Some(packet),
            };
            if let Some(packet) = rejected {
                warn!("{:08x} lost on the way to {}", packet.id(), to);
            }
        }
    }

    /// Advance the simulation by one tick (PASSES_PER_TICK full passes).
    ///
    /// Returns a snapshot of every packet touched, in processing order. The
    /// same packet can show up once per pass.
    pub fn tick(&mut self) -> Vec<Packet> {
        self.ticks += 1;
        let tick = self.ticks;

        let mut links = LinkTable {
            up: self.up_interfaces(),
            in_flight: Vec::new(),
        };
        let mut touched = Vec::new();

        for _ in 0..PASSES_PER_TICK {
            for idx in 0..self.devices.len() {
                if let Some((_, device)) = self.devices.get_index_mut(idx) {
                    touched.extend(device.process_step(&mut links, &mut *self.event_sink, tick));
                }
                self.land(&mut links);
            }
        }

        self.stats.record_packets(&touched);
        self.stats
            .update_activity(self.devices.values().map(|d| (d.name(), d.processed())));

        debug!("tick {}: {} packets touched", tick, touched.len());
        touched
    }

    /// Global statistics with `total_sent` summed over the current devices
    pub fn stats(&self) -> GlobalStats {
        let mut stats = self.stats.clone();
        stats.total_sent = self.devices.values().map(Device::sent).sum();
        stats
    }
}

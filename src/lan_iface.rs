// Network interfaces: one named endpoint of a device with its two packet
// queues and its adjacency list.

use std::fmt;

use crate::lan_common::{InterfaceRef, LanError};
use crate::lan_containers::{Fifo, NeighborSet};
use crate::lan_packet::Packet;

/// Dotted quad, 1-3 digits per octet, each octet 0..=255.
///
/// Leading zeros are accepted and the text is kept as written, since addresses
/// are compared as plain strings.
pub fn is_valid_address(address: &str) -> bool {
    let octets: Vec<&str> = address.split('.').collect();
    if octets.len() != 4 {
        return false;
    }

    octets.iter().all(|octet| {
        !octet.is_empty()
            && octet.len() <= 3
            && octet.bytes().all(|b| b.is_ascii_digit())
            && octet.parse::<u16>().map(|v| v <= 255).unwrap_or(false)
    })
}

#[derive(Debug, Clone)]
pub struct Interface {
    name: String,
    // owning device, by name
    device: String,
    address: Option<String>,
    up: bool,
    neighbors: NeighborSet,
    ingress: Fifo<Packet>,
    egress: Fifo<Packet>,
}

impl Interface {
    /// New interfaces start administratively down, like a fresh router port
    pub fn new(name: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            device: device.into(),
            address: None,
            up: false,
            neighbors: NeighborSet::new(),
            ingress: Fifo::new(),
            egress: Fifo::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn handle(&self) -> InterfaceRef {
        InterfaceRef::new(self.device.clone(), self.name.clone())
    }

    pub(crate) fn set_device(&mut self, device: &str) {
        self.device = device.to_string();
    }

    pub fn address(&self) -> Option<&str> {
        self.address.as_deref()
    }

    /// Replace the address; malformed input leaves the old one in place
    pub fn assign_address(&mut self, address: &str) -> Result<(), LanError> {
        if !is_valid_address(address) {
            return Err(LanError::InvalidAddress(address.to_string()));
        }
        self.address = Some(address.to_string());
        Ok(())
    }

    pub fn clear_address(&mut self) {
        self.address = None;
    }

    pub fn is_up(&self) -> bool {
        self.up
    }

    pub fn set_up(&mut self) {
        self.up = true;
    }

    /// Queued packets stay where they are; they just stop moving
    pub fn set_down(&mut self) {
        self.up = false;
    }

    // ===== Adjacency (local side only) =====

    pub fn add_neighbor(&mut self, other: InterfaceRef) -> bool {
        self.neighbors.insert(other)
    }

    pub fn remove_neighbor(&mut self, other: &InterfaceRef) -> bool {
        self.neighbors.remove(other)
    }

    pub fn neighbors(&self) -> &NeighborSet {
        &self.neighbors
    }

    pub fn has_neighbors(&self) -> bool {
        !self.neighbors.is_empty()
    }

    pub(crate) fn neighbors_mut(&mut self) -> &mut NeighborSet {
        &mut self.neighbors
    }

    // ===== Queues =====

    /// Rejected packets are handed back untouched
    pub fn enqueue_ingress(&mut self, packet: Packet) -> Result<(), Packet> {
        if !self.up || packet.is_terminal() {
            return Err(packet);
        }
        self.ingress.push(packet);
        Ok(())
    }

    pub fn enqueue_egress(&mut self, packet: Packet) -> Result<(), Packet> {
        if !self.up || packet.is_terminal() {
            return Err(packet);
        }
        self.egress.push(packet);
        Ok(())
    }

    pub fn dequeue_ingress(&mut self) -> Option<Packet> {
        if !self.up {
            return None;
        }
        self.ingress.pop()
    }

    pub fn dequeue_egress(&mut self) -> Option<Packet> {
        if !self.up {
            return None;
        }
        self.egress.pop()
    }

    pub fn ingress(&self) -> &Fifo<Packet> {
        &self.ingress
    }

    pub fn egress(&self) -> &Fifo<Packet> {
        &self.egress
    }

    pub fn status(&self) -> InterfaceStatus {
        InterfaceStatus {
            name: self.name.clone(),
            address: self.address.clone(),
            up: self.up,
            neighbors: self.neighbors.len(),
            ingress_depth: self.ingress.len(),
            egress_depth: self.egress.len(),
        }
    }
}

/// Read-only snapshot of an interface for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceStatus {
    pub name: String,
    pub address: Option<String>,
    pub up: bool,
    pub neighbors: usize,
    pub ingress_depth: usize,
    pub egress_depth: usize,
}

impl InterfaceStatus {
    pub fn address_label(&self) -> &str {
        self.address.as_deref().unwrap_or("unassigned")
    }

    pub fn state_label(&self) -> &'static str {
        if self.up {
            "up"
        } else {
            "down"
        }
    }
}

impl fmt::Display for InterfaceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} neighbors:{} in:{} out:{}",
            self.name,
            self.address_label(),
            self.state_label(),
            self.neighbors,
            self.ingress_depth,
            self.egress_depth
        )
    }
}

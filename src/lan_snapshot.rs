// Structured, serializable form of a network's configuration
//
// Captures what is needed to rebuild the same topology: devices (kind, online
// flag, interface address and state) plus the connection list. Queued and
// in-flight packets are not part of a snapshot.

use serde::{Deserialize, Serialize};

use crate::lan_common::{DeviceKind, LanError};
use crate::lan_network::{Connection, Network};

pub const SNAPSHOT_VERSION: &str = "1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkSnapshot {
    #[serde(default)]
    pub metadata: SnapshotMeta,

    #[serde(default)]
    pub devices: Vec<DeviceSnapshot>,

    /// `DevA:ifA <-> DevB:ifB` descriptors
    #[serde(default)]
    pub connections: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Default for SnapshotMeta {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION.to_string(),
            description: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceSnapshot {
    pub name: String,

    #[serde(rename = "type")]
    pub kind: DeviceKind,

    #[serde(default = "default_online")]
    pub online: bool,

    /// Interfaces not listed keep their defaults (down, no address)
    #[serde(default)]
    pub interfaces: Vec<InterfaceSnapshot>,
}

fn default_online() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSnapshot {
    pub name: String,

    #[serde(default)]
    pub address: Option<String>,

    #[serde(default)]
    pub state: LinkState,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Up,
    #[default]
    Down,
}

impl LinkState {
    pub fn is_up(&self) -> bool {
        matches!(self, LinkState::Up)
    }
}

impl From<bool> for LinkState {
    fn from(up: bool) -> Self {
        if up {
            LinkState::Up
        } else {
            LinkState::Down
        }
    }
}

impl Network {
    pub fn snapshot(&self) -> NetworkSnapshot {
        let devices = self
            .devices()
            .map(|device| DeviceSnapshot {
                name: device.name().to_string(),
                kind: device.kind(),
                online: device.is_online(),
                interfaces: device
                    .interfaces()
                    .map(|iface| InterfaceSnapshot {
                        name: iface.name().to_string(),
                        address: iface.address().map(str::to_string),
                        state: iface.is_up().into(),
                    })
                    .collect(),
            })
            .collect();

        NetworkSnapshot {
            metadata: SnapshotMeta::default(),
            devices,
            connections: self.connection_strings(),
        }
    }

    /// Build a fresh network from a snapshot; the first configuration error aborts
    pub fn from_snapshot(snapshot: &NetworkSnapshot) -> Result<Network, LanError> {
        let mut network = Network::new();

        for device in &snapshot.devices {
            network.add_device(&device.name, device.kind)?;
            network.set_device_online(&device.name, device.online)?;

            for iface in &device.interfaces {
                let exists = network
                    .device(&device.name)
                    .and_then(|d| d.interface(&iface.name))
                    .is_some();
                if !exists {
                    network.add_interface(&device.name, &iface.name)?;
                }
                if let Some(address) = &iface.address {
                    network.set_address(&device.name, &iface.name, address)?;
                }
                network.set_interface_up(&device.name, &iface.name, iface.state.is_up())?;
            }
        }

        for descriptor in &snapshot.connections {
            let connection = Connection::parse(descriptor)?;
            network.connect(
                &connection.a.device,
                &connection.a.interface,
                &connection.b.device,
                &connection.b.interface,
            )?;
        }

        Ok(network)
    }

    /// Replace the current topology with the snapshot's; on error nothing changes
    pub fn apply_snapshot(&mut self, snapshot: &NetworkSnapshot) -> Result<(), LanError> {
        let rebuilt = Network::from_snapshot(snapshot)?;
        self.replace_topology(rebuilt);
        Ok(())
    }
}

fn up(name: &str, address: Option<&str>) -> InterfaceSnapshot {
    InterfaceSnapshot {
        name: name.to_string(),
        address: address.map(str::to_string),
        state: LinkState::Up,
    }
}

/// Router1 / Switch1 / PC1 / PC2 lab topology
pub fn demo_snapshot() -> NetworkSnapshot {
    NetworkSnapshot {
        metadata: SnapshotMeta {
            version: SNAPSHOT_VERSION.to_string(),
            description: Some("Two-subnet lab: PC1 behind Switch1, PC2 on Router1".to_string()),
        },
        devices: vec![
            DeviceSnapshot {
                name: "Router1".to_string(),
                kind: DeviceKind::Router,
                online: true,
                interfaces: vec![up("g0/0", Some("192.168.1.1")), up("g0/1", Some("10.0.0.1"))],
            },
            DeviceSnapshot {
                name: "Switch1".to_string(),
                kind: DeviceKind::Switch,
                online: true,
                interfaces: vec![up("g0/0", None), up("g0/1", None)],
            },
            DeviceSnapshot {
                name: "PC1".to_string(),
                kind: DeviceKind::Host,
                online: true,
                interfaces: vec![up("eth0", Some("192.168.1.10"))],
            },
            DeviceSnapshot {
                name: "PC2".to_string(),
                kind: DeviceKind::Host,
                online: true,
                interfaces: vec![up("eth0", Some("10.0.0.10"))],
            },
        ],
        connections: vec![
            "Router1:g0/0 <-> Switch1:g0/0".to_string(),
            "Switch1:g0/1 <-> PC1:eth0".to_string(),
            "Router1:g0/1 <-> PC2:eth0".to_string(),
        ],
    }
}

pub fn demo_topology() -> Result<Network, LanError> {
    Network::from_snapshot(&demo_snapshot())
}

use indexmap::IndexMap;

use crate::lan_common::{
    DeviceKind, DropReason, Event, EventSink, InterfaceRef, LanError, PacketId, SimTime, Ttl,
};
use crate::lan_containers::HistoryStack;
use crate::lan_iface::{Interface, InterfaceStatus};
use crate::lan_packet::Packet;

/// Whatever carries packets between interfaces of different devices.
///
/// A device only sees its own interfaces. During the egress pass it asks the
/// medium whether the chosen neighbor can take the packet and hands it over.
pub trait Medium {
    fn is_up(&self, iface: &InterfaceRef) -> bool;

    /// Only called after `is_up` returned true for `to`
    fn transmit(&mut self, to: &InterfaceRef, packet: Packet);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceStats {
    pub name: String,
    pub kind: DeviceKind,
    pub online: bool,
    pub interfaces: usize,
    pub processed: u64,
    pub sent: u64,
    pub dropped: u64,
    pub history: usize,
}

/// Non-destructive view of one interface's queues, oldest packet first
pub struct QueueView<'a> {
    pub interface: &'a str,
    pub ingress: Vec<&'a Packet>,
    pub egress: Vec<&'a Packet>,
}

pub struct Device {
    name: String,
    kind: DeviceKind,
    // insertion order drives both passes and egress selection
    interfaces: IndexMap<String, Interface>,
    online: bool,
    processed: u64,
    sent: u64,
    dropped: u64,
    history: HistoryStack<Packet>,
}

impl Device {
    /// Create an online device provisioned with the default interfaces of its kind
    pub fn new(name: impl Into<String>, kind: DeviceKind) -> Self {
        let name = name.into();
        let interfaces = kind
            .default_interfaces()
            .iter()
            .map(|iface| (iface.to_string(), Interface::new(*iface, name.clone())))
            .collect();

        Self {
            name,
            kind,
            interfaces,
            online: true,
            processed: 0,
            sent: 0,
            dropped: 0,
            history: HistoryStack::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
        for iface in self.interfaces.values_mut() {
            iface.set_device(name);
        }
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Offline devices keep all their state but skip processing
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    // ===== Interfaces =====

    pub fn add_interface(&mut self, name: &str) -> Result<(), LanError> {
        if self.interfaces.contains_key(name) {
            return Err(LanError::DuplicateInterface {
                device: self.name.clone(),
                interface: name.to_string(),
            });
        }
        self.interfaces
            .insert(name.to_string(), Interface::new(name, self.name.clone()));
        Ok(())
    }

    pub fn interface(&self, name: &str) -> Option<&Interface> {
        self.interfaces.get(name)
    }

    pub fn interface_mut(&mut self, name: &str) -> Option<&mut Interface> {
        self.interfaces.get_mut(name)
    }

    fn require_interface(&mut self, name: &str) -> Result<&mut Interface, LanError> {
        let device = &self.name;
        self.interfaces
            .get_mut(name)
            .ok_or_else(|| LanError::UnknownInterface {
                device: device.clone(),
                interface: name.to_string(),
            })
    }

    /// In insertion order
    pub fn interfaces(&self) -> impl Iterator<Item = &Interface> {
        self.interfaces.values()
    }

    pub(crate) fn interfaces_mut(&mut self) -> impl Iterator<Item = &mut Interface> {
        self.interfaces.values_mut()
    }

    pub fn assign_address(&mut self, interface: &str, address: &str) -> Result<(), LanError> {
        self.require_interface(interface)?.assign_address(address)
    }

    pub fn set_interface_up(&mut self, interface: &str, up: bool) -> Result<(), LanError> {
        let iface = self.require_interface(interface)?;
        if up {
            iface.set_up();
        } else {
            iface.set_down();
        }
        Ok(())
    }

    /// Does any local interface carry this address?
    pub fn owns_address(&self, address: &str) -> bool {
        self.interfaces
            .values()
            .any(|iface| iface.address() == Some(address))
    }

    // ===== Traffic =====

    /// Originate a packet from the up interface holding `source`.
    ///
    /// The packet enters the same egress pipeline forwarded packets use, with
    /// this device as its first hop.
    pub fn send(
        &mut self,
        source: &str,
        destination: &str,
        payload: &str,
        ttl: Ttl,
    ) -> Result<PacketId, LanError> {
        if !self.online {
            return Err(LanError::DeviceOffline(self.name.clone()));
        }

        let device = self.name.clone();
        let no_source = || LanError::NoSourceInterface {
            device: device.clone(),
            address: source.to_string(),
        };

        let Some(iface) = self
            .interfaces
            .values_mut()
            .find(|iface| iface.is_up() && iface.address() == Some(source))
        else {
            return Err(no_source());
        };

        let mut packet = Packet::new(source, destination, payload, ttl);
        packet.append_hop(device.clone());
        let id = packet.id();

        if iface.enqueue_egress(packet).is_err() {
            return Err(no_source());
        }

        self.sent += 1;
        log::debug!(
            "{} queued {:08x} {} -> {} on {}",
            device,
            id,
            source,
            destination,
            iface.name()
        );
        Ok(id)
    }

    /// First interface, in insertion order, that is up and has a neighbor.
    ///
    /// Ignores the destination and the interface the packet came in on, so
    /// packets may bounce between two devices until their TTL runs out.
    fn select_egress(&self) -> Option<usize> {
        self.interfaces
            .values()
            .position(|iface| iface.is_up() && iface.has_neighbors())
    }

    /// One processing step: ingress pass then egress pass.
    ///
    /// Returns a snapshot of every packet taken off an ingress queue plus any
    /// packet dropped while leaving an egress queue. Offline devices return
    /// nothing and leave their queues alone.
    pub fn process_step(
        &mut self,
        medium: &mut dyn Medium,
        sink: &mut dyn EventSink,
        tick: SimTime,
    ) -> Vec<Packet> {
        let mut touched = Vec::new();
        if !self.online {
            return touched;
        }

        // Phase 1: at most one packet from each ingress queue
        for idx in 0..self.interfaces.len() {
            let Some(mut packet) = self
                .interfaces
                .get_index_mut(idx)
                .and_then(|(_, iface)| iface.dequeue_ingress())
            else {
                continue;
            };

            packet.append_hop(self.name.clone());
            self.processed += 1;

            if self.owns_address(packet.destination()) {
                packet.mark_delivered();
                sink.log(
                    tick,
                    Event::PacketDelivered {
                        packet: packet.id(),
                        device: self.name.clone(),
                        hops: packet.hop_count(),
                    },
                );
                touched.push(packet.clone());
                self.history.push(packet);
                continue;
            }

            if !packet.decrement_ttl() {
                self.drop_packet(packet, DropReason::TtlExpired, sink, tick, &mut touched);
                continue;
            }

            let Some(egress) = self.select_egress() else {
                self.drop_packet(packet, DropReason::NoRoute, sink, tick, &mut touched);
                continue;
            };

            let snapshot = packet.clone();
            let (_, iface) = match self.interfaces.get_index_mut(egress) {
                Some(entry) => entry,
                None => continue,
            };
            let egress_name = iface.name().to_string();
            match iface.enqueue_egress(packet) {
                Ok(()) => {
                    sink.log(
                        tick,
                        Event::PacketForwarded {
                            packet: snapshot.id(),
                            device: self.name.clone(),
                            egress: egress_name,
                            ttl: snapshot.ttl(),
                        },
                    );
                    touched.push(snapshot);
                }
                Err(packet) => {
                    self.drop_packet(packet, DropReason::NoRoute, sink, tick, &mut touched)
                }
            }
        }

        // Phase 2: at most one packet from each egress queue to the first neighbor
        for idx in 0..self.interfaces.len() {
            let Some((_, iface)) = self.interfaces.get_index_mut(idx) else {
                continue;
            };
            if !iface.is_up() {
                continue;
            }
            let Some(packet) = iface.dequeue_egress() else {
                continue;
            };

            let from = iface.handle();
            match iface.neighbors().first().cloned() {
                Some(next) if medium.is_up(&next) => {
                    sink.log(
                        tick,
                        Event::PacketTransmitted {
                            packet: packet.id(),
                            from,
                            to: next.clone(),
                        },
                    );
                    medium.transmit(&next, packet);
                    self.sent += 1;
                }
                _ => self.drop_packet(packet, DropReason::NoRoute, sink, tick, &mut touched),
            }
        }

        touched
    }

    fn drop_packet(
        &mut self,
        mut packet: Packet,
        reason: DropReason,
        sink: &mut dyn EventSink,
        tick: SimTime,
        touched: &mut Vec<Packet>,
    ) {
        // TTL expiry already marked the packet; this is a no-op then
        packet.mark_dropped(reason);
        self.dropped += 1;
        sink.log(
            tick,
            Event::PacketDropped {
                packet: packet.id(),
                device: self.name.clone(),
                reason,
            },
        );
        touched.push(packet);
    }

    // ===== Introspection =====

    pub fn processed(&self) -> u64 {
        self.processed
    }

    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    /// Delivered packets, most recent first
    pub fn history(&self) -> impl Iterator<Item = &Packet> {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn interface_statuses(&self) -> Vec<InterfaceStatus> {
        self.interfaces.values().map(Interface::status).collect()
    }

    pub fn queues(&self) -> Vec<QueueView<'_>> {
        self.interfaces
            .values()
            .map(|iface| QueueView {
                interface: iface.name(),
                ingress: iface.ingress().iter().collect(),
                egress: iface.egress().iter().collect(),
            })
            .collect()
    }

    pub fn stats(&self) -> DeviceStats {
        DeviceStats {
            name: self.name.clone(),
            kind: self.kind,
            online: self.online,
            interfaces: self.interfaces.len(),
            processed: self.processed,
            sent: self.sent,
            dropped: self.dropped,
            history: self.history.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lan_common::NoOpSink;
    use std::collections::HashSet;

    /// Medium where a fixed set of remote interfaces is up
    struct MockMedium {
        up: HashSet<InterfaceRef>,
        delivered: Vec<(InterfaceRef, Packet)>,
    }

    impl MockMedium {
        fn new(up: &[InterfaceRef]) -> Self {
            Self {
                up: up.iter().cloned().collect(),
                delivered: Vec::new(),
            }
        }
    }

    impl Medium for MockMedium {
        fn is_up(&self, iface: &InterfaceRef) -> bool {
            self.up.contains(iface)
        }

        fn transmit(&mut self, to: &InterfaceRef, packet: Packet) {
            self.delivered.push((to.clone(), packet));
        }
    }

    struct RecordingSink {
        events: Vec<Event>,
    }

    impl EventSink for RecordingSink {
        fn log(&mut self, _tick: SimTime, event: Event) {
            self.events.push(event);
        }
    }

    fn router() -> Device {
        let mut device = Device::new("R1", DeviceKind::Router);
        device.assign_address("g0/0", "10.0.0.1").unwrap();
        device.assign_address("g0/1", "10.0.1.1").unwrap();
        device.set_interface_up("g0/0", true).unwrap();
        device.set_interface_up("g0/1", true).unwrap();
        device
    }

    fn inject(device: &mut Device, iface: &str, packet: Packet) {
        device
            .interface_mut(iface)
            .unwrap()
            .enqueue_ingress(packet)
            .unwrap();
    }

    #[test]
    fn test_default_interfaces() {
        let switch = Device::new("S1", DeviceKind::Switch);
        let names: Vec<&str> = switch.interfaces().map(|i| i.name()).collect();
        assert_eq!(names, vec!["g0/0", "g0/1", "g0/2", "g0/3"]);
        assert!(switch.is_online());
        assert!(switch.interfaces().all(|i| i.device() == "S1" && !i.is_up()));
    }

    #[test]
    fn test_add_interface_rejects_duplicates() {
        let mut fw = Device::new("FW", DeviceKind::Firewall);
        fw.add_interface("dmz").unwrap();
        assert!(matches!(
            fw.add_interface("inside"),
            Err(LanError::DuplicateInterface { .. })
        ));
        assert_eq!(fw.interfaces().count(), 3);
    }

    #[test]
    fn test_unknown_interface_errors() {
        let mut host = Device::new("PC1", DeviceKind::Host);
        assert_eq!(
            host.assign_address("eth9", "10.0.0.1"),
            Err(LanError::UnknownInterface {
                device: "PC1".into(),
                interface: "eth9".into()
            })
        );
        assert!(host.set_interface_up("eth9", true).is_err());
    }

    #[test]
    fn test_send_requires_up_source_interface() {
        let mut host = Device::new("PC1", DeviceKind::Host);
        host.assign_address("eth0", "192.168.1.10").unwrap();

        // interface still down
        assert!(matches!(
            host.send("192.168.1.10", "10.0.0.10", "hi", 64),
            Err(LanError::NoSourceInterface { .. })
        ));

        host.set_interface_up("eth0", true).unwrap();
        assert!(host.send("10.9.9.9", "10.0.0.10", "hi", 64).is_err());
        assert!(host.send("192.168.1.10", "10.0.0.10", "hi", 64).is_ok());
        assert_eq!(host.sent(), 1);

        let queued = host.interface("eth0").unwrap().egress().peek().unwrap();
        assert_eq!(queued.trace(), &["PC1".to_string()]);
        assert_eq!(queued.ttl(), 64);
    }

    #[test]
    fn test_offline_device_cannot_send_or_process() {
        let mut device = router();
        inject(&mut device, "g0/0", Packet::new("1.1.1.1", "10.0.1.1", "x", 8));
        device.set_online(false);

        assert_eq!(
            device.send("10.0.0.1", "1.1.1.1", "x", 8),
            Err(LanError::DeviceOffline("R1".into()))
        );

        let mut medium = MockMedium::new(&[]);
        let touched = device.process_step(&mut medium, &mut NoOpSink, 0);
        assert!(touched.is_empty());
        assert_eq!(device.interface("g0/0").unwrap().ingress().len(), 1);
        assert_eq!(device.processed(), 0);
    }

    #[test]
    fn test_local_delivery() {
        let mut device = router();
        let mut packet = Packet::new("1.1.1.1", "10.0.1.1", "for me", 8);
        packet.append_hop("PC9");
        inject(&mut device, "g0/0", packet);

        let mut medium = MockMedium::new(&[]);
        let touched = device.process_step(&mut medium, &mut NoOpSink, 0);

        assert_eq!(touched.len(), 1);
        let delivered = &touched[0];
        assert!(delivered.is_delivered());
        // delivery does not cost TTL
        assert_eq!(delivered.ttl(), 8);
        assert_eq!(delivered.trace().last().map(String::as_str), Some("R1"));
        assert_eq!(device.processed(), 1);
        assert_eq!(device.history_len(), 1);
        assert_eq!(device.history().next().unwrap().payload(), "for me");
    }

    #[test]
    fn test_no_route_drop() {
        let mut device = router();
        inject(&mut device, "g0/0", Packet::new("1.1.1.1", "8.8.8.8", "x", 8));

        let mut sink = RecordingSink { events: Vec::new() };
        let mut medium = MockMedium::new(&[]);
        let touched = device.process_step(&mut medium, &mut sink, 3);

        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].drop_reason(), Some(DropReason::NoRoute));
        assert_eq!(touched[0].ttl(), 7);
        assert_eq!(device.dropped(), 1);
        assert!(matches!(
            sink.events.as_slice(),
            [Event::PacketDropped {
                reason: DropReason::NoRoute,
                ..
            }]
        ));
    }

    #[test]
    fn test_ttl_expiry_drop() {
        let mut device = router();
        device
            .interface_mut("g0/1")
            .unwrap()
            .add_neighbor(InterfaceRef::new("R2", "g0/0"));
        inject(&mut device, "g0/0", Packet::new("1.1.1.1", "8.8.8.8", "x", 1));

        let mut medium = MockMedium::new(&[InterfaceRef::new("R2", "g0/0")]);
        let touched = device.process_step(&mut medium, &mut NoOpSink, 0);

        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].drop_reason(), Some(DropReason::TtlExpired));
        assert_eq!(device.dropped(), 1);
        assert!(medium.delivered.is_empty());
    }

    #[test]
    fn test_forward_uses_first_up_interface_with_neighbor() {
        let mut device = router();
        device.add_interface("g0/2").unwrap();
        device.set_interface_up("g0/2", true).unwrap();

        let r2 = InterfaceRef::new("R2", "g0/0");
        let r3 = InterfaceRef::new("R3", "g0/0");
        device.interface_mut("g0/1").unwrap().add_neighbor(r2.clone());
        device.interface_mut("g0/2").unwrap().add_neighbor(r3.clone());

        // the packet arrives on g0/1 and still leaves through g0/1
        inject(&mut device, "g0/1", Packet::new("1.1.1.1", "8.8.8.8", "x", 8));

        let mut medium = MockMedium::new(&[r2.clone(), r3]);
        let touched = device.process_step(&mut medium, &mut NoOpSink, 0);

        assert_eq!(touched.len(), 1);
        assert!(!touched[0].is_terminal());
        assert_eq!(touched[0].ttl(), 7);
        assert_eq!(medium.delivered.len(), 1);
        assert_eq!(medium.delivered[0].0, r2);
        assert_eq!(device.sent(), 1);
    }

    #[test]
    fn test_egress_to_down_neighbor_drops() {
        let mut device = router();
        let r2 = InterfaceRef::new("R2", "g0/0");
        device.interface_mut("g0/0").unwrap().add_neighbor(r2);
        device.send("10.0.0.1", "8.8.8.8", "x", 8).unwrap();

        let mut medium = MockMedium::new(&[]);
        let touched = device.process_step(&mut medium, &mut NoOpSink, 0);

        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].drop_reason(), Some(DropReason::NoRoute));
        assert_eq!(device.dropped(), 1);
        // only the send itself was counted
        assert_eq!(device.sent(), 1);
    }

    #[test]
    fn test_egress_without_neighbors_drops() {
        let mut device = router();
        device.send("10.0.0.1", "8.8.8.8", "x", 8).unwrap();

        let mut medium = MockMedium::new(&[]);
        let touched = device.process_step(&mut medium, &mut NoOpSink, 0);
        assert_eq!(touched.len(), 1);
        assert_eq!(touched[0].drop_reason(), Some(DropReason::NoRoute));
    }

    #[test]
    fn test_one_packet_per_queue_per_step() {
        let mut device = router();
        for i in 0..3 {
            inject(&mut device, "g0/0", Packet::new("1.1.1.1", "10.0.0.1", i.to_string(), 8));
        }

        let mut medium = MockMedium::new(&[]);
        assert_eq!(device.process_step(&mut medium, &mut NoOpSink, 0).len(), 1);
        assert_eq!(device.interface("g0/0").unwrap().ingress().len(), 2);

        device.process_step(&mut medium, &mut NoOpSink, 0);
        device.process_step(&mut medium, &mut NoOpSink, 0);
        let payloads: Vec<&str> = device.history().map(|p| p.payload()).collect();
        assert_eq!(payloads, vec!["2", "1", "0"]);
    }

    #[test]
    fn test_down_interface_is_skipped() {
        let mut device = router();
        inject(&mut device, "g0/0", Packet::new("1.1.1.1", "10.0.0.1", "x", 8));
        device.set_interface_up("g0/0", false).unwrap();

        let mut medium = MockMedium::new(&[]);
        assert!(device.process_step(&mut medium, &mut NoOpSink, 0).is_empty());
        assert_eq!(device.interface("g0/0").unwrap().ingress().len(), 1);
    }

    #[test]
    fn test_queue_view_and_stats() {
        let mut device = router();
        device.send("10.0.0.1", "8.8.8.8", "a", 8).unwrap();
        device.send("10.0.0.1", "8.8.8.8", "b", 8).unwrap();

        let queues = device.queues();
        assert_eq!(queues.len(), 2);
        assert_eq!(queues[0].interface, "g0/0");
        assert_eq!(queues[0].egress.len(), 2);
        assert_eq!(queues[0].egress[0].payload(), "a");
        assert!(queues[1].ingress.is_empty());

        let stats = device.stats();
        assert_eq!(stats.sent, 2);
        assert_eq!(stats.interfaces, 2);
        assert_eq!(stats.kind, DeviceKind::Router);
        // peeking does not drain
        assert_eq!(device.interface("g0/0").unwrap().egress().len(), 2);
    }
}

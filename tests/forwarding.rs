// End-to-end forwarding behavior through the public API

use lan_sim::lan_snapshot::demo_topology;
use lan_sim::{DeviceKind, DropReason, InterfaceRef, Network, Packet, DEFAULT_TTL};

/// Hosts and a router wired in a line; `order` fixes the registry order.
/// The router's first interface faces `C` so forwarded traffic heads that way.
fn chain(order: [&str; 3]) -> Network {
    let mut net = Network::new();
    for name in order {
        let kind = if name == "B" {
            DeviceKind::Router
        } else {
            DeviceKind::Host
        };
        net.add_device(name, kind).unwrap();
    }

    net.set_address("A", "eth0", "10.0.1.1").unwrap();
    net.set_address("B", "g0/0", "10.0.2.1").unwrap();
    net.set_address("B", "g0/1", "10.0.1.2").unwrap();
    net.set_address("C", "eth0", "10.0.2.2").unwrap();
    for (dev, iface) in [("A", "eth0"), ("B", "g0/0"), ("B", "g0/1"), ("C", "eth0")] {
        net.set_interface_up(dev, iface, true).unwrap();
    }

    net.connect("B", "g0/0", "C", "eth0").unwrap();
    net.connect("A", "eth0", "B", "g0/1").unwrap();
    net
}

fn names(trace: &[String]) -> Vec<&str> {
    trace.iter().map(String::as_str).collect()
}

#[test]
fn test_ttl_one_expires_before_second_hop() {
    let mut net = chain(["A", "B", "C"]);
    net.send("A", "10.0.1.1", "10.0.2.2", "short", Some(1)).unwrap();

    let touched = net.tick();
    assert_eq!(touched.len(), 1);
    let packet = &touched[0];
    assert_eq!(packet.drop_reason(), Some(DropReason::TtlExpired));
    assert_eq!(names(packet.trace()), vec!["A", "B"]);
    assert_eq!(packet.ttl(), 0);

    assert_eq!(net.device("C").unwrap().processed(), 0);
    assert_eq!(net.stats().dropped_ttl, 1);
    assert!(net.tick().is_empty());
}

#[test]
fn test_neighbor_symmetry_after_connect_and_disconnect() {
    let mut net = chain(["A", "B", "C"]);
    assert!(net.validate_topology().is_empty());

    net.disconnect("C", "eth0", "B", "g0/0").unwrap();
    let b = net.interface(&InterfaceRef::new("B", "g0/0")).unwrap();
    let c = net.interface(&InterfaceRef::new("C", "eth0")).unwrap();
    assert!(!b.neighbors().contains(&InterfaceRef::new("C", "eth0")));
    assert!(!c.neighbors().contains(&InterfaceRef::new("B", "g0/0")));
    assert_eq!(net.connection_strings(), vec!["A:eth0 <-> B:g0/1"]);
    assert!(net.validate_topology().is_empty());
}

#[test]
fn test_down_interface_freezes_its_queue() {
    let mut net = chain(["A", "B", "C"]);
    net.send("A", "10.0.1.1", "10.0.2.2", "held", None).unwrap();
    net.set_interface_up("A", "eth0", false).unwrap();

    let iface = net
        .device_mut("A")
        .unwrap()
        .interface_mut("eth0")
        .unwrap();
    let extra = Packet::new("10.0.1.1", "10.0.2.2", "late", DEFAULT_TTL);
    assert!(iface.enqueue_egress(extra.clone()).is_err());
    assert!(iface.enqueue_ingress(extra).is_err());

    for _ in 0..3 {
        assert!(net.tick().is_empty());
    }
    let iface = net.interface(&InterfaceRef::new("A", "eth0")).unwrap();
    assert_eq!(iface.egress().len(), 1);
    assert_eq!(iface.ingress().len(), 0);

    // with the default order the whole line is crossed in one pass
    net.set_interface_up("A", "eth0", true).unwrap();
    let touched = net.tick();
    assert!(touched.iter().any(|p| p.is_delivered()));
}

#[test]
fn test_delivered_on_owner_of_destination() {
    let mut net = demo_topology().unwrap();
    net.send("PC1", "192.168.1.10", "192.168.1.1", "gateway", None).unwrap();

    assert!(net.tick().iter().all(|p| !p.is_delivered()));
    let touched = net.tick();
    let packet = touched.iter().find(|p| p.is_delivered()).unwrap();

    assert_eq!(names(packet.trace()), vec!["PC1", "Switch1", "Router1"]);
    assert_eq!(packet.trace().last().map(String::as_str), Some("Router1"));
    // delivery does not cost TTL
    assert_eq!(packet.ttl(), DEFAULT_TTL - 1);
    assert_eq!(net.device("Router1").unwrap().history_len(), 1);
    assert_eq!(net.stats().delivered, 1);
    assert_eq!(net.stats().total_hops, 3);
}

#[test]
fn test_tick_runs_two_passes() {
    // reverse order so each pass moves the packet across one link only

    // one link: A -> B delivered within a single tick
    let mut direct = chain(["C", "B", "A"]);
    direct
        .send("A", "10.0.1.1", "10.0.1.2", "near", None)
        .unwrap();
    assert!(direct.tick().iter().any(|p| p.is_delivered()));

    // two links: A -> B -> C needs a second tick
    let mut far = chain(["C", "B", "A"]);
    far.send("A", "10.0.1.1", "10.0.2.2", "far", None).unwrap();
    assert!(far.tick().iter().all(|p| !p.is_delivered()));
    assert_eq!(
        far.interface(&InterfaceRef::new("C", "eth0"))
            .unwrap()
            .ingress()
            .len(),
        1
    );

    let touched = far.tick();
    assert_eq!(touched.len(), 1);
    assert!(touched[0].is_delivered());
    assert_eq!(names(touched[0].trace()), vec!["A", "B", "C"]);
}

#[test]
fn test_demo_scenario_first_tick() {
    let mut net = demo_topology().unwrap();
    net.send("PC1", "192.168.1.10", "10.0.0.10", "hi", Some(64)).unwrap();

    let touched = net.tick();
    assert_eq!(touched.len(), 1);
    let packet = &touched[0];
    assert_eq!(names(packet.trace()), vec!["PC1", "Switch1"]);
    assert!(!packet.is_delivered());
    assert_eq!(packet.ttl(), 63);

    // Switch1 sent it on towards Router1
    let router_in = net
        .interface(&InterfaceRef::new("Router1", "g0/0"))
        .unwrap()
        .ingress()
        .len();
    assert_eq!(router_in, 1);
}

#[test]
fn test_demo_scenario_loops_until_ttl_expires() {
    let mut net = demo_topology().unwrap();
    net.send("PC1", "192.168.1.10", "10.0.0.10", "hi", Some(6)).unwrap();

    let mut dropped = None;
    for _ in 0..10 {
        if let Some(p) = net.tick().into_iter().find(|p| p.is_dropped()) {
            dropped = Some(p);
            break;
        }
    }
    let packet = dropped.unwrap();

    assert_eq!(packet.drop_reason(), Some(DropReason::TtlExpired));
    // bounces between Router1 and Switch1 and never reaches PC2
    assert!(!packet.trace().iter().any(|hop| hop == "PC2"));
    assert_eq!(net.device("PC2").unwrap().history_len(), 0);
    assert_eq!(net.stats().delivered, 0);
}

#[test]
fn test_no_route_drop_on_isolated_device() {
    let mut net = Network::new();
    net.add_device("Lonely", DeviceKind::Host).unwrap();
    net.set_address("Lonely", "eth0", "10.9.0.1").unwrap();
    net.set_interface_up("Lonely", "eth0", true).unwrap();

    let stray = Packet::new("10.9.0.7", "10.9.0.99", "stray", DEFAULT_TTL);
    net.device_mut("Lonely")
        .unwrap()
        .interface_mut("eth0")
        .unwrap()
        .enqueue_ingress(stray)
        .unwrap();

    let touched = net.tick();
    assert_eq!(touched.len(), 1);
    assert_eq!(touched[0].drop_reason(), Some(DropReason::NoRoute));
    assert_eq!(net.device("Lonely").unwrap().dropped(), 1);
    assert_eq!(net.stats().dropped_no_route, 1);
}

#[test]
fn test_offline_device_cannot_send() {
    let mut net = demo_topology().unwrap();
    net.set_device_online("PC1", false).unwrap();
    assert!(net
        .send("PC1", "192.168.1.10", "10.0.0.10", "hi", None)
        .is_err());
    assert_eq!(net.stats().total_sent, 0);
}

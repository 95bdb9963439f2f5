//! Human-readable reports over the network's read-only views

use crate::lan_network::Network;
use crate::lan_packet::Packet;

fn unknown_device(name: &str) -> String {
    format!("Error: device '{}' not found.", name)
}

/// Delivered packets, most recent first
pub fn history_report(network: &Network, device: &str) -> String {
    let Some(device) = network.device(device) else {
        return unknown_device(device);
    };
    if device.history_len() == 0 {
        return format!("No packet history for {}.", device.name());
    }

    let mut lines = vec![format!("History of {}:", device.name())];
    for (i, packet) in device.history().enumerate() {
        lines.push(format!(
            "{}) From {} to {}: \"{}\" | TTL on arrival: {} | Route: {}",
            i + 1,
            packet.source(),
            packet.destination(),
            packet.payload(),
            packet.ttl(),
            packet.formatted_trace()
        ));
    }
    lines.join("\n")
}

pub fn queue_report(network: &Network, device: &str) -> String {
    let Some(device) = network.device(device) else {
        return unknown_device(device);
    };

    let mut lines = vec![format!("Queues of {}:", device.name())];
    for view in device.queues() {
        lines.push(format!("Interface {}:", view.interface));
        for (label, packets) in [("Ingress", &view.ingress), ("Egress", &view.egress)] {
            if packets.is_empty() {
                lines.push(format!("  {} queue: empty", label));
            } else {
                lines.push(format!("  {} queue:", label));
                lines.extend(packets.iter().map(|p| format!("    - {}", p)));
            }
        }
    }
    lines.join("\n")
}

pub fn interfaces_report(network: &Network, device: &str) -> String {
    let Some(device) = network.device(device) else {
        return unknown_device(device);
    };

    let mut lines = vec![format!("Interfaces of {}:", device.name())];
    for status in device.interface_statuses() {
        lines.push(format!("{}:", status.name));
        lines.push(format!("  IP: {}", status.address_label()));
        lines.push(format!("  State: {}", status.state_label().to_uppercase()));
        lines.push(format!("  Neighbors: {}", status.neighbors));
        lines.push(format!("  Ingress queue: {} packets", status.ingress_depth));
        lines.push(format!("  Egress queue: {} packets", status.egress_depth));
    }
    lines.join("\n")
}

pub fn statistics_report(network: &Network) -> String {
    let stats = network.stats();

    let mut lines = vec!["=== NETWORK STATISTICS ===".to_string()];
    lines.push(format!("Total packets sent: {}", stats.total_sent));
    lines.push(format!("Delivered: {}", stats.delivered));
    lines.push(format!("Dropped (TTL): {}", stats.dropped_ttl));
    lines.push(format!("Dropped (no route): {}", stats.dropped_no_route));
    lines.push(format!("Average hops: {:.1}", stats.average_hops()));
    if let Some(name) = &stats.most_active_device {
        lines.push(format!(
            "Most active device: {} ({} packets processed)",
            name, stats.max_processed
        ));
    }

    lines.push(String::new());
    lines.push("=== PER-DEVICE STATISTICS ===".to_string());
    for device in network.devices() {
        let s = device.stats();
        lines.push(format!("{} ({}):", s.name, s.kind));
        lines.push(format!("  State: {}", if s.online { "online" } else { "offline" }));
        lines.push(format!("  Interfaces: {}", s.interfaces));
        lines.push(format!("  Sent: {}", s.sent));
        lines.push(format!("  Processed: {}", s.processed));
        lines.push(format!("  Dropped: {}", s.dropped));
        lines.push(format!("  Received history: {}", s.history));
    }
    lines.join("\n")
}

pub fn device_list_report(network: &Network) -> String {
    let mut lines = vec!["Devices:".to_string()];
    for (name, online) in network.device_list() {
        lines.push(format!(
            "  - {} ({})",
            name,
            if online { "online" } else { "offline" }
        ));
    }
    lines.join("\n")
}

pub fn topology_report(network: &Network) -> String {
    let mut lines = vec!["=== NETWORK TOPOLOGY ===".to_string(), device_list_report(network)];

    lines.push("Connections:".to_string());
    let connections = network.connection_strings();
    if connections.is_empty() {
        lines.push("  - none".to_string());
    }
    lines.extend(connections.iter().map(|c| format!("  - {}", c)));

    let violations = network.validate_topology();
    if violations.is_empty() {
        lines.push("Topology valid - no errors detected".to_string());
    } else {
        lines.push("Topology errors detected:".to_string());
        lines.extend(violations.iter().map(|v| format!("  - {}", v)));
    }
    lines.join("\n")
}

/// One line per touched packet
pub fn tick_report(packets: &[Packet]) -> String {
    if packets.is_empty() {
        return "Tick processed - no activity".to_string();
    }

    let mut lines = vec!["Tick processed:".to_string()];
    for packet in packets {
        let line = if packet.is_delivered() {
            format!("  + {:08x} delivered: {}", packet.id(), packet.formatted_trace())
        } else if let Some(reason) = packet.drop_reason() {
            format!("  x {:08x} dropped: {}", packet.id(), reason)
        } else {
            format!("  > {:08x} in transit: TTL={}", packet.id(), packet.ttl())
        };
        lines.push(line);
    }
    lines.join("\n")
}

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::lan_common::{DropReason, PacketId, Ttl};

static NEXT_PACKET_ID: AtomicU64 = AtomicU64::new(1);

fn next_packet_id() -> PacketId {
    NEXT_PACKET_ID.fetch_add(1, Ordering::Relaxed)
}

/// One message in flight.
///
/// Once delivered or dropped a packet is terminal: its TTL and trace no longer
/// change and `Interface` refuses to queue it.
#[derive(Clone, Debug, PartialEq)]
pub struct Packet {
    id: PacketId,
    source: String,
    destination: String,
    payload: String,
    initial_ttl: Ttl,
    ttl: Ttl,
    trace: Vec<String>,
    delivered: bool,
    dropped: bool,
    drop_reason: Option<DropReason>,
}

impl Packet {
    pub fn new(
        source: impl Into<String>,
        destination: impl Into<String>,
        payload: impl Into<String>,
        ttl: Ttl,
    ) -> Self {
        Self {
            id: next_packet_id(),
            source: source.into(),
            destination: destination.into(),
            payload: payload.into(),
            initial_ttl: ttl,
            ttl,
            trace: Vec::new(),
            delivered: false,
            dropped: false,
            drop_reason: None,
        }
    }

    pub fn id(&self) -> PacketId {
        self.id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn payload(&self) -> &str {
        &self.payload
    }

    pub fn initial_ttl(&self) -> Ttl {
        self.initial_ttl
    }

    pub fn ttl(&self) -> Ttl {
        self.ttl
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn hop_count(&self) -> usize {
        self.trace.len()
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered
    }

    pub fn is_dropped(&self) -> bool {
        self.dropped
    }

    pub fn drop_reason(&self) -> Option<DropReason> {
        self.drop_reason
    }

    pub fn is_terminal(&self) -> bool {
        self.delivered || self.dropped
    }

    /// Spend one hop of TTL.
    ///
    /// Returns false when the packet expired (it is then dropped with
    /// `TtlExpired`) or was already terminal, in which case nothing changes.
    pub fn decrement_ttl(&mut self) -> bool {
        if self.is_terminal() {
            return false;
        }

        self.ttl = self.ttl.saturating_sub(1);
        if self.ttl == 0 {
            self.mark_dropped(DropReason::TtlExpired);
            return false;
        }
        true
    }

    /// No-op on terminal packets
    pub fn append_hop(&mut self, device: impl Into<String>) {
        if !self.is_terminal() {
            self.trace.push(device.into());
        }
    }

    pub fn mark_delivered(&mut self) {
        if !self.is_terminal() {
            self.delivered = true;
        }
    }

    pub fn mark_dropped(&mut self, reason: DropReason) {
        if !self.is_terminal() {
            self.dropped = true;
            self.drop_reason = Some(reason);
        }
    }

    /// `A -> B -> C`, or `no trace` before the first hop
    pub fn formatted_trace(&self) -> String {
        if self.trace.is_empty() {
            return "no trace".to_string();
        }
        self.trace.join(" -> ")
    }

    pub fn state_label(&self) -> &'static str {
        if self.delivered {
            "Delivered"
        } else if self.dropped {
            "Dropped"
        } else {
            "In transit"
        }
    }
}

impl fmt::Display for Packet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Packet {:08x}: {} -> {} | TTL: {} | State: {}",
            self.id,
            self.source,
            self.destination,
            self.ttl,
            self.state_label()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_packet_is_in_transit() {
        let p = Packet::new("10.0.0.1", "10.0.0.2", "hello", 5);

        assert_eq!(p.ttl(), 5);
        assert_eq!(p.initial_ttl(), 5);
        assert!(p.trace().is_empty());
        assert!(!p.is_terminal());
        assert_eq!(p.drop_reason(), None);
        assert_eq!(p.formatted_trace(), "no trace");
    }

    #[test]
    fn test_ids_are_unique() {
        let a = Packet::new("a", "b", "", 1);
        let b = Packet::new("a", "b", "", 1);
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_decrement_until_expired() {
        let mut p = Packet::new("a", "b", "x", 2);

        assert!(p.decrement_ttl());
        assert_eq!(p.ttl(), 1);
        assert!(!p.is_dropped());

        assert!(!p.decrement_ttl());
        assert_eq!(p.ttl(), 0);
        assert!(p.is_dropped());
        assert_eq!(p.drop_reason(), Some(DropReason::TtlExpired));

        // terminal: nothing moves anymore
        assert!(!p.decrement_ttl());
        assert_eq!(p.ttl(), 0);
    }

    #[test]
    fn test_zero_ttl_expires_on_first_decrement() {
        let mut p = Packet::new("a", "b", "x", 0);
        assert!(!p.decrement_ttl());
        assert_eq!(p.drop_reason(), Some(DropReason::TtlExpired));
    }

    #[test]
    fn test_terminal_packet_freezes_trace() {
        let mut p = Packet::new("a", "b", "x", 8);
        p.append_hop("PC1");
        p.append_hop("Switch1");
        p.mark_delivered();
        p.append_hop("Router1");

        assert_eq!(p.trace(), &["PC1".to_string(), "Switch1".to_string()]);
        assert_eq!(p.hop_count(), 2);
        assert_eq!(p.formatted_trace(), "PC1 -> Switch1");

        // delivered packets cannot be dropped afterwards
        p.mark_dropped(DropReason::NoRoute);
        assert!(!p.is_dropped());
        assert_eq!(p.state_label(), "Delivered");
    }

    #[test]
    fn test_display() {
        let p = Packet::new("192.168.1.10", "10.0.0.10", "hi", 64);
        let text = p.to_string();
        assert!(text.contains("192.168.1.10 -> 10.0.0.10"));
        assert!(text.contains("TTL: 64"));
        assert!(text.ends_with("State: In transit"));
    }
}

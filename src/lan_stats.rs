//! Network-wide delivery statistics

use crate::lan_common::DropReason;
use crate::lan_packet::Packet;

/// Running totals folded in after every tick
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GlobalStats {
    /// Sum of every device's `sent` counter (refreshed on each fold)
    pub total_sent: u64,

    pub delivered: u64,

    pub dropped_ttl: u64,

    pub dropped_no_route: u64,

    /// Trace lengths of delivered packets, summed
    pub total_hops: u64,

    /// Device with the highest `processed` counter; first in registry order wins ties
    pub most_active_device: Option<String>,

    pub max_processed: u64,
}

impl GlobalStats {
    /// Count terminal packets from one tick's snapshots
    pub fn record_packets<'a>(&mut self, packets: impl IntoIterator<Item = &'a Packet>) {
        for packet in packets {
            if packet.is_delivered() {
                self.delivered += 1;
                self.total_hops += packet.hop_count() as u64;
            }

            match packet.drop_reason() {
                Some(DropReason::TtlExpired) => self.dropped_ttl += 1,
                Some(DropReason::NoRoute) => self.dropped_no_route += 1,
                None => {}
            }
        }
    }

    /// `(name, processed)` pairs in registry order
    pub fn update_activity<'a>(&mut self, devices: impl IntoIterator<Item = (&'a str, u64)>) {
        let mut best: Option<(&str, u64)> = None;
        for (name, processed) in devices {
            if processed > best.map(|(_, p)| p).unwrap_or(0) {
                best = Some((name, processed));
            }
        }

        self.most_active_device = best.map(|(name, _)| name.to_string());
        self.max_processed = best.map(|(_, p)| p).unwrap_or(0);
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_ttl + self.dropped_no_route
    }

    pub fn average_hops(&self) -> f64 {
        if self.delivered == 0 {
            return 0.0;
        }
        self.total_hops as f64 / self.delivered as f64
    }
}

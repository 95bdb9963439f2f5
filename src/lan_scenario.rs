// Scenario files - a topology plus a traffic schedule, run for a fixed number of ticks
//
// Traffic scheduled for tick `t` is injected right before tick `t` is processed.
// Random traffic (optional) is drawn from a seeded StdRng, so a run is reproducible
// from the seed it reports.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use hashbrown::HashMap;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Deserialize;

use crate::lan_common::{DropReason, LanError, LogEventSink, PacketId, SimTime, Ttl, DEFAULT_TTL};
use crate::lan_network::Network;
use crate::lan_packet::Packet;
use crate::lan_snapshot::NetworkSnapshot;
use crate::lan_stats::GlobalStats;

// ============================================================================
// File format
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioFile {
    #[serde(default)]
    pub meta: ScenarioMeta,

    pub config: ScenarioConfig,

    pub topology: NetworkSnapshot,

    #[serde(default)]
    pub traffic: Vec<ScheduledSend>,

    #[serde(default)]
    pub random_traffic: Option<RandomTraffic>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioMeta {
    pub name: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioConfig {
    pub ticks: SimTime,

    /// Hex string, optional `0x` prefix
    #[serde(default)]
    pub seed: Option<String>,

    #[serde(default)]
    pub log_level: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledSend {
    pub tick: SimTime,
    pub device: String,
    pub source: String,
    pub destination: String,

    #[serde(default)]
    pub payload: String,

    #[serde(default)]
    pub ttl: Option<Ttl>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RandomTraffic {
    pub packets_per_tick: usize,

    #[serde(default = "default_ttl")]
    pub ttl: Ttl,

    #[serde(default = "default_payload")]
    pub payload: String,
}

fn default_ttl() -> Ttl {
    DEFAULT_TTL
}

fn default_payload() -> String {
    "ping".to_string()
}

impl ScenarioFile {
    pub fn from_yaml(text: &str) -> Result<Self, ScenarioError> {
        Ok(serde_yaml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let text = fs::read_to_string(path)?;
        Self::from_yaml(&text)
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub enum ScenarioError {
    Io(io::Error),
    Yaml(serde_yaml::Error),
    Topology(LanError),
    /// A scheduled send was rejected
    Traffic { tick: SimTime, error: LanError },
    InvalidSeed(String),
}

impl fmt::Display for ScenarioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScenarioError::Io(e) => write!(f, "I/O error: {}", e),
            ScenarioError::Yaml(e) => write!(f, "invalid scenario file: {}", e),
            ScenarioError::Topology(e) => write!(f, "invalid topology: {}", e),
            ScenarioError::Traffic { tick, error } => {
                write!(f, "send scheduled for tick {} failed: {}", tick, error)
            }
            ScenarioError::InvalidSeed(text) => write!(f, "invalid hex seed '{}'", text),
        }
    }
}

impl std::error::Error for ScenarioError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ScenarioError::Io(e) => Some(e),
            ScenarioError::Yaml(e) => Some(e),
            ScenarioError::Topology(e) => Some(e),
            ScenarioError::Traffic { error, .. } => Some(error),
            ScenarioError::InvalidSeed(_) => None,
        }
    }
}

impl From<io::Error> for ScenarioError {
    fn from(e: io::Error) -> Self {
        ScenarioError::Io(e)
    }
}

impl From<serde_yaml::Error> for ScenarioError {
    fn from(e: serde_yaml::Error) -> Self {
        ScenarioError::Yaml(e)
    }
}

impl From<LanError> for ScenarioError {
    fn from(e: LanError) -> Self {
        ScenarioError::Topology(e)
    }
}

// ============================================================================
// Seeds
// ============================================================================

/// Parse up to 32 bytes of hex; missing trailing bytes are zero
pub fn parse_seed_hex(hex: &str) -> Result<[u8; 32], ScenarioError> {
    let trimmed = hex.trim();
    let digits = trimmed.strip_prefix("0x").unwrap_or(trimmed);
    let invalid = || ScenarioError::InvalidSeed(hex.to_string());
    if digits.is_empty() || digits.len() > 64 {
        return Err(invalid());
    }

    let mut seed = [0u8; 32];
    for (i, chunk) in digits.as_bytes().chunks(2).enumerate() {
        let byte_str = std::str::from_utf8(chunk).map_err(|_| invalid())?;
        seed[i] = u8::from_str_radix(byte_str, 16).map_err(|_| invalid())?;
    }
    Ok(seed)
}

pub fn seed_to_hex(seed: &[u8; 32]) -> String {
    seed.iter().map(|b| format!("{:02x}", b)).collect()
}

/// Use the given seed or draw a fresh one
pub fn resolve_seed(seed: Option<[u8; 32]>) -> [u8; 32] {
    seed.unwrap_or_else(|| {
        let mut seed = [0u8; 32];
        rand::thread_rng().fill(&mut seed);
        seed
    })
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Delivered { tick: SimTime, hops: usize },
    Dropped { tick: SimTime, reason: DropReason },
    InFlight,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PacketRecord {
    pub id: PacketId,
    pub source: String,
    pub destination: String,
    /// First tick that could move the packet
    pub injected_tick: SimTime,
    pub outcome: Outcome,
}

impl PacketRecord {
    /// Ticks between injection and the terminal state, inclusive
    pub fn ticks_in_flight(&self) -> Option<SimTime> {
        match self.outcome {
            Outcome::Delivered { tick, .. } | Outcome::Dropped { tick, .. } => {
                Some(tick - self.injected_tick + 1)
            }
            Outcome::InFlight => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ScenarioResult {
    pub name: String,
    pub seed_used: [u8; 32],
    pub ticks: SimTime,
    /// In send order
    pub packets: Vec<PacketRecord>,
    pub stats: GlobalStats,
}

impl ScenarioResult {
    pub fn delivered(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| matches!(p.outcome, Outcome::Delivered { .. }))
            .count()
    }

    pub fn dropped(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| matches!(p.outcome, Outcome::Dropped { .. }))
            .count()
    }

    pub fn in_flight(&self) -> usize {
        self.packets
            .iter()
            .filter(|p| p.outcome == Outcome::InFlight)
            .count()
    }

    /// Mean ticks in flight over delivered packets
    pub fn average_delivery_ticks(&self) -> f64 {
        let ticks: Vec<SimTime> = self
            .packets
            .iter()
            .filter(|p| matches!(p.outcome, Outcome::Delivered { .. }))
            .filter_map(PacketRecord::ticks_in_flight)
            .collect();
        if ticks.is_empty() {
            return 0.0;
        }
        ticks.iter().sum::<SimTime>() as f64 / ticks.len() as f64
    }

    pub fn summary(&self) -> String {
        let mut lines = vec![
            format!("=== {} ===", self.name),
            format!("Seed: 0x{}", seed_to_hex(&self.seed_used)),
            format!("Ticks: {}", self.ticks),
            String::new(),
            "Packets:".to_string(),
        ];

        for record in &self.packets {
            let outcome = match record.outcome {
                Outcome::Delivered { tick, hops } => {
                    format!("delivered at tick {} ({} hops)", tick, hops)
                }
                Outcome::Dropped { tick, reason } => format!("dropped at tick {}: {}", tick, reason),
                Outcome::InFlight => "still in flight".to_string(),
            };
            lines.push(format!(
                "  {:08x} {} -> {} (tick {}): {}",
                record.id, record.source, record.destination, record.injected_tick, outcome
            ));
        }

        lines.push(String::new());
        lines.push(format!(
            "Delivered: {}  Dropped: {}  In flight: {}",
            self.delivered(),
            self.dropped(),
            self.in_flight()
        ));
        lines.push(format!(
            "Average ticks to delivery: {:.2}",
            self.average_delivery_ticks()
        ));
        lines.push(format!("Average hops: {:.2}", self.stats.average_hops()));
        lines.push(format!(
            "Dropped (TTL / no route): {} / {}",
            self.stats.dropped_ttl, self.stats.dropped_no_route
        ));
        if let Some(name) = &self.stats.most_active_device {
            lines.push(format!(
                "Most active device: {} ({} processed)",
                name, self.stats.max_processed
            ));
        }
        lines.join("\n")
    }
}

// ============================================================================
// Runner
// ============================================================================

pub struct ScenarioRunner {
    name: String,
    ticks: SimTime,
    traffic: Vec<ScheduledSend>,
    random_traffic: Option<RandomTraffic>,
    network: Network,
    rng: StdRng,
    seed: [u8; 32],

    records: Vec<PacketRecord>,
    index: HashMap<PacketId, usize>,
}

impl ScenarioRunner {
    /// Build the topology. `seed` overrides the file's seed.
    pub fn new(scenario: ScenarioFile, seed: Option<[u8; 32]>) -> Result<Self, ScenarioError> {
        let file_seed = scenario
            .config
            .seed
            .as_deref()
            .map(parse_seed_hex)
            .transpose()?;
        let seed = resolve_seed(seed.or(file_seed));

        let mut network = Network::with_sink(Box::new(LogEventSink));
        network.apply_snapshot(&scenario.topology)?;

        let mut traffic = scenario.traffic;
        // stable, so same-tick sends keep file order
        traffic.sort_by_key(|s| s.tick);

        Ok(Self {
            name: scenario.meta.name.unwrap_or_else(|| "Scenario".to_string()),
            ticks: scenario.config.ticks,
            traffic,
            random_traffic: scenario.random_traffic,
            network,
            rng: StdRng::from_seed(seed),
            seed,
            records: Vec::new(),
            index: HashMap::new(),
        })
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn run(mut self) -> Result<ScenarioResult, ScenarioError> {
        info!(
            "running '{}' for {} ticks (seed 0x{})",
            self.name,
            self.ticks,
            seed_to_hex(&self.seed)
        );

        let traffic = std::mem::take(&mut self.traffic);
        let mut pending = traffic.iter().peekable();

        for tick in 1..=self.ticks {
            while let Some(send) = pending.next_if(|s| s.tick <= tick) {
                self.inject_scheduled(send, tick)?;
            }
            self.inject_random(tick);

            let touched = self.network.tick();
            self.record_outcomes(&touched, tick);
        }

        let skipped = pending.count();
        if skipped > 0 {
            warn!("{} sends scheduled after the last tick were not injected", skipped);
        }

        Ok(ScenarioResult {
            name: self.name,
            seed_used: self.seed,
            ticks: self.ticks,
            packets: self.records,
            stats: self.network.stats(),
        })
    }

    fn track(&mut self, id: PacketId, source: &str, destination: &str, tick: SimTime) {
        self.index.insert(id, self.records.len());
        self.records.push(PacketRecord {
            id,
            source: source.to_string(),
            destination: destination.to_string(),
            injected_tick: tick,
            outcome: Outcome::InFlight,
        });
    }

    fn inject_scheduled(&mut self, send: &ScheduledSend, tick: SimTime) -> Result<(), ScenarioError> {
        let id = self
            .network
            .send(&send.device, &send.source, &send.destination, &send.payload, send.ttl)
            .map_err(|error| ScenarioError::Traffic {
                tick: send.tick,
                error,
            })?;
        debug!("tick {}: {} sent {:08x}", tick, send.device, id);
        self.track(id, &send.source, &send.destination, tick);
        Ok(())
    }

    /// `(device, address)` of every up, addressed interface on an online device
    fn endpoints(&self) -> Vec<(String, String)> {
        self.network
            .devices()
            .filter(|d| d.is_online())
            .flat_map(|d| {
                d.interfaces()
                    .filter(|iface| iface.is_up())
                    .filter_map(move |iface| {
                        iface
                            .address()
                            .map(|address| (d.name().to_string(), address.to_string()))
                    })
            })
            .collect()
    }

    fn inject_random(&mut self, tick: SimTime) {
        let Some(random) = self.random_traffic.clone() else {
            return;
        };
        let endpoints = self.endpoints();
        if endpoints.len() < 2 {
            return;
        }

        for _ in 0..random.packets_per_tick {
            let from = self.rng.gen_range(0..endpoints.len());
            // any other endpoint
            let mut to = self.rng.gen_range(0..endpoints.len() - 1);
            if to >= from {
                to += 1;
            }
            let (device, source) = &endpoints[from];
            let (_, destination) = &endpoints[to];

            match self
                .network
                .send(device, source, destination, &random.payload, Some(random.ttl))
            {
                Ok(id) => self.track(id, source, destination, tick),
                Err(e) => warn!("tick {}: random send from {} failed: {}", tick, device, e),
            }
        }
    }

    fn record_outcomes(&mut self, touched: &[Packet], tick: SimTime) {
        for packet in touched {
            let Some(&i) = self.index.get(&packet.id()) else {
                continue;
            };
            let record = &mut self.records[i];
            if record.outcome != Outcome::InFlight {
                continue;
            }

            if packet.is_delivered() {
                record.outcome = Outcome::Delivered {
                    tick,
                    hops: packet.hop_count(),
                };
            } else if let Some(reason) = packet.drop_reason() {
                record.outcome = Outcome::Dropped { tick, reason };
            }
        }
    }
}

/// Load and run one scenario file
pub fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) -> Result<ScenarioResult, ScenarioError> {
    let scenario = ScenarioFile::load(path)?;
    ScenarioRunner::new(scenario, seed)?.run()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAIR: &str = r#"
meta:
  name: Direct pair
config:
  ticks: 3
  seed: "0x01"
topology:
  devices:
    - name: A
      type: host
      interfaces:
        - { name: eth0, address: 10.0.0.1, state: up }
    - name: B
      type: host
      interfaces:
        - { name: eth0, address: 10.0.0.2, state: up }
  connections:
    - "A:eth0 <-> B:eth0"
traffic:
  - { tick: 2, device: A, source: 10.0.0.1, destination: 10.0.0.2, payload: hello }
  - { tick: 1, device: A, source: 10.0.0.1, destination: 10.9.9.9, ttl: 1 }
"#;

    #[test]
    fn test_parse_seed_hex() {
        let seed = parse_seed_hex("0x0102ff").unwrap();
        assert_eq!(&seed[..4], &[0x01, 0x02, 0xff, 0x00]);
        assert!(parse_seed_hex("zz").is_err());
        assert!(parse_seed_hex("").is_err());
        assert!(parse_seed_hex(&"0".repeat(66)).is_err());
        assert_eq!(seed_to_hex(&seed).len(), 64);
        assert!(seed_to_hex(&seed).starts_with("0102ff00"));
    }

    #[test]
    fn test_scheduled_traffic_outcomes() {
        let scenario = ScenarioFile::from_yaml(PAIR).unwrap();
        let result = ScenarioRunner::new(scenario, None).unwrap().run().unwrap();

        assert_eq!(result.name, "Direct pair");
        assert_eq!(result.seed_used[0], 0x01);
        assert_eq!(result.packets.len(), 2);

        // sorted by tick, so the tick-1 send comes first
        let unknown = &result.packets[0];
        assert_eq!(unknown.destination, "10.9.9.9");
        assert_eq!(unknown.injected_tick, 1);
        // B decrements TTL 1 -> 0
        assert_eq!(
            unknown.outcome,
            Outcome::Dropped {
                tick: 1,
                reason: DropReason::TtlExpired
            }
        );

        let hello = &result.packets[1];
        assert_eq!(hello.outcome, Outcome::Delivered { tick: 2, hops: 2 });
        assert_eq!(hello.ticks_in_flight(), Some(1));

        assert_eq!(result.delivered(), 1);
        assert_eq!(result.dropped(), 1);
        assert_eq!(result.in_flight(), 0);
        assert_eq!(result.stats.dropped_ttl, 1);
        assert!(result.summary().contains("delivered at tick 2 (2 hops)"));
    }

    #[test]
    fn test_failed_send_aborts() {
        let mut scenario = ScenarioFile::from_yaml(PAIR).unwrap();
        scenario.traffic[0].source = "10.0.0.99".to_string();

        let err = ScenarioRunner::new(scenario, None).unwrap().run().unwrap_err();
        assert!(matches!(
            err,
            ScenarioError::Traffic {
                tick: 2,
                error: LanError::NoSourceInterface { .. }
            }
        ));
    }

    #[test]
    fn test_bad_topology_and_yaml() {
        let mut scenario = ScenarioFile::from_yaml(PAIR).unwrap();
        scenario.topology.connections.push("A:eth0 <-> C:eth0".to_string());
        assert!(matches!(
            ScenarioRunner::new(scenario, None),
            Err(ScenarioError::Topology(LanError::UnknownDevice(_)))
        ));

        assert!(matches!(
            ScenarioFile::from_yaml("config: [1, 2"),
            Err(ScenarioError::Yaml(_))
        ));
    }

    #[test]
    fn test_random_traffic_is_reproducible() {
        let text = format!(
            "{}random_traffic:\n  packets_per_tick: 1\n  ttl: 4\n",
            PAIR.replace("ticks: 3", "ticks: 5")
        );
        let run = |seed| {
            let scenario = ScenarioFile::from_yaml(&text).unwrap();
            ScenarioRunner::new(scenario, Some(seed)).unwrap().run().unwrap()
        };

        let first = run([7u8; 32]);
        let second = run([7u8; 32]);
        assert_eq!(first.packets.len(), 2 + 5);

        let endpoints = |r: &ScenarioResult| -> Vec<(String, String)> {
            r.packets
                .iter()
                .map(|p| (p.source.clone(), p.destination.clone()))
                .collect()
        };
        assert_eq!(endpoints(&first), endpoints(&second));
        // never addressed to itself
        assert!(first.packets.iter().all(|p| p.source != p.destination));
        // every random packet crosses one direct link
        assert!(first.packets[2..]
            .iter()
            .all(|p| matches!(p.outcome, Outcome::Delivered { hops: 2, .. })));
    }

    #[test]
    fn test_sends_after_last_tick_are_skipped() {
        let mut scenario = ScenarioFile::from_yaml(PAIR).unwrap();
        scenario.traffic[0].tick = 10;
        let result = ScenarioRunner::new(scenario, None).unwrap().run().unwrap();
        assert_eq!(result.packets.len(), 1);
    }
}

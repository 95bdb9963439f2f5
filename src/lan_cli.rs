// Router-style command interpreter
//
// Thin adapter over the Network API: each line is tokenized, checked against the
// current mode and mapped onto one core operation, whose result is turned into a
// message for the user.
//
// Modes: user `>`, privileged `#`, global config `(config)#`, interface config
// `(config-if)#`.

use std::path::{Path, PathBuf};

use crate::lan_common::{DeviceKind, Ttl};
use crate::lan_network::Network;
use crate::lan_persistence::{
    list_config_files, load_config, save_running_config, DEFAULT_CONFIG_FILE,
};
use crate::lan_report;

const DEFAULT_CONSOLE_DEVICE: &str = "Router1";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    User,
    Privileged,
    Config,
    InterfaceConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliOutput {
    Text(String),
    Quit,
}

impl CliOutput {
    fn text(s: impl Into<String>) -> Self {
        CliOutput::Text(s.into())
    }
}

/// Split on whitespace, keeping `"quoted text"` together (quotes removed)
pub fn tokenize(line: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut has_token = false;

    for c in line.chars() {
        match c {
            '"' => {
                quoted = !quoted;
                has_token = true;
            }
            c if c.is_whitespace() && !quoted => {
                if has_token {
                    tokens.push(std::mem::take(&mut current));
                    has_token = false;
                }
            }
            c => {
                current.push(c);
                has_token = true;
            }
        }
    }
    if has_token {
        tokens.push(current);
    }
    tokens
}

pub struct CliSession {
    network: Network,
    device: String,
    mode: Mode,
    interface: Option<String>,
    config_dir: PathBuf,
}

impl CliSession {
    /// Attach a console to `Router1` (created if the network has no such device)
    pub fn new(mut network: Network) -> Self {
        if network.device(DEFAULT_CONSOLE_DEVICE).is_none() {
            // only fails on a duplicate name, which was just ruled out
            let _ = network.add_device(DEFAULT_CONSOLE_DEVICE, DeviceKind::Router);
        }

        Self {
            network,
            device: DEFAULT_CONSOLE_DEVICE.to_string(),
            mode: Mode::User,
            interface: None,
            config_dir: PathBuf::from("."),
        }
    }

    /// Directory relative file names are resolved against
    pub fn with_config_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config_dir = dir.into();
        self
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    pub fn network_mut(&mut self) -> &mut Network {
        &mut self.network
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn current_device(&self) -> &str {
        &self.device
    }

    pub fn prompt(&self) -> String {
        match self.mode {
            Mode::User => format!("{}> ", self.device),
            Mode::Privileged => format!("{}# ", self.device),
            Mode::Config => format!("{}(config)# ", self.device),
            Mode::InterfaceConfig => format!("{}(config-if)# ", self.device),
        }
    }

    fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        if mode != Mode::InterfaceConfig {
            self.interface = None;
        }
    }

    fn resolve(&self, file: &str) -> PathBuf {
        let path = Path::new(file);
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.config_dir.join(path)
        }
    }

    pub fn execute(&mut self, line: &str) -> CliOutput {
        let tokens = tokenize(line);
        let Some((command, args)) = tokens.split_first() else {
            return CliOutput::text("");
        };
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        log::debug!("{} {:?} {:?}", self.device, self.mode, tokens);

        match (command.to_ascii_lowercase().as_str(), args.as_slice()) {
            ("quit", _) => CliOutput::Quit,
            ("exit", _) if self.mode == Mode::User => CliOutput::Quit,
            ("exit", _) => CliOutput::text(self.exit()),
            ("help", _) => CliOutput::text(help_text()),
            ("enable", _) => {
                self.set_mode(Mode::Privileged);
                CliOutput::text("Privileged mode enabled")
            }
            ("disable", _) => {
                self.set_mode(Mode::User);
                CliOutput::text("User mode")
            }
            ("end", _) => {
                self.set_mode(Mode::Privileged);
                CliOutput::text("Back to privileged mode")
            }
            ("configure", ["terminal", ..]) | ("configure", []) => {
                CliOutput::text(self.configure_terminal())
            }
            ("hostname", args) => CliOutput::text(self.hostname(args)),
            ("interface", args) => CliOutput::text(self.interface(args)),
            ("ip", ["address", address, ..]) => CliOutput::text(self.ip_address(address)),
            ("ip", _) => CliOutput::text("Error: usage: ip address <ip>"),
            ("shutdown", _) => CliOutput::text(self.shutdown(false)),
            ("no", ["shutdown", ..]) => CliOutput::text(self.shutdown(true)),
            ("no", ["ip", "address", ..]) => CliOutput::text(self.clear_address()),
            ("connect", args) => CliOutput::text(self.link(args, true)),
            ("disconnect", args) => CliOutput::text(self.link(args, false)),
            ("send", args) => CliOutput::text(self.send(args)),
            ("tick", _) | ("process", _) => {
                CliOutput::text(lan_report::tick_report(&self.network.tick()))
            }
            ("show", args) => CliOutput::text(self.show(args)),
            ("save", args) => CliOutput::text(self.save(args)),
            ("load", args) => CliOutput::text(self.load(args)),
            ("list_devices", _) => CliOutput::text(lan_report::device_list_report(&self.network)),
            ("list_configs", _) => CliOutput::text(self.list_configs()),
            ("add_device", args) => CliOutput::text(self.add_device(args)),
            ("set_device_status", args) => CliOutput::text(self.set_device_status(args)),
            ("console", args) => CliOutput::text(self.console(args)),
            (other, _) => CliOutput::text(format!("Unrecognized command: {}", other)),
        }
    }

    // ===== Mode changes =====

    fn exit(&mut self) -> String {
        match self.mode {
            Mode::InterfaceConfig => {
                self.set_mode(Mode::Config);
                "Leaving interface configuration".to_string()
            }
            Mode::Config => {
                self.set_mode(Mode::Privileged);
                "Leaving global configuration".to_string()
            }
            _ => "Already at base mode".to_string(),
        }
    }

    fn configure_terminal(&mut self) -> String {
        if self.mode != Mode::Privileged {
            return "Error: command only available in privileged mode".to_string();
        }
        self.set_mode(Mode::Config);
        "Entering global configuration mode".to_string()
    }

    // ===== Configuration =====

    fn hostname(&mut self, args: &[&str]) -> String {
        if self.mode != Mode::Config {
            return "Error: command only available in configuration mode".to_string();
        }
        let Some(new_name) = args.first() else {
            return "Error: specify the device name".to_string();
        };

        match self.network.rename_device(&self.device, new_name) {
            Ok(()) => {
                self.device = new_name.to_string();
                format!("Hostname changed to {}", new_name)
            }
            Err(e) => format!("Error: {}", e),
        }
    }

    fn interface(&mut self, args: &[&str]) -> String {
        if self.mode != Mode::Config {
            return "Error: command only available in configuration mode".to_string();
        }
        let Some(name) = args.first() else {
            return "Error: specify the interface name".to_string();
        };

        let exists = self
            .network
            .device(&self.device)
            .map(|d| d.interface(name).is_some());
        match exists {
            None => return format!("Error: device '{}' not found", self.device),
            Some(false) => {
                if let Err(e) = self.network.add_interface(&self.device, name) {
                    return format!("Error: {}", e);
                }
            }
            Some(true) => {}
        }

        self.set_mode(Mode::InterfaceConfig);
        self.interface = Some(name.to_string());
        format!("Configuring interface {}", name)
    }

    fn ip_address(&mut self, address: &str) -> String {
        let Some(iface) = self.interface.clone().filter(|_| self.mode == Mode::InterfaceConfig)
        else {
            return "Error: command only available in interface configuration mode".to_string();
        };

        match self.network.set_address(&self.device, &iface, address) {
            Ok(()) => format!("IP {} assigned to {}", address, iface),
            Err(e) => format!("Error: {}", e),
        }
    }

    fn clear_address(&mut self) -> String {
        let Some(iface) = self.interface.clone().filter(|_| self.mode == Mode::InterfaceConfig)
        else {
            return "Error: command only available in interface configuration mode".to_string();
        };

        match self
            .network
            .device_mut(&self.device)
            .and_then(|d| d.interface_mut(&iface))
        {
            Some(interface) => {
                interface.clear_address();
                format!("IP address removed from {}", iface)
            }
            None => format!("Error: interface '{}' not found", iface),
        }
    }

    fn shutdown(&mut self, up: bool) -> String {
        let Some(iface) = self.interface.clone().filter(|_| self.mode == Mode::InterfaceConfig)
        else {
            return "Error: command only available in interface configuration mode".to_string();
        };

        match self.network.set_interface_up(&self.device, &iface, up) {
            Ok(()) if up => format!("Interface {} enabled", iface),
            Ok(()) => format!("Interface {} shut down", iface),
            Err(e) => format!("Error: {}", e),
        }
    }

    fn link(&mut self, args: &[&str], connect: bool) -> String {
        let [local, remote_device, remote_iface, ..] = args else {
            let verb = if connect { "connect" } else { "disconnect" };
            return format!("Error: usage: {} <iface> <device> <iface>", verb);
        };

        let result = if connect {
            self.network
                .connect(&self.device, local, remote_device, remote_iface)
        } else {
            self.network
                .disconnect(&self.device, local, remote_device, remote_iface)
        };

        match result {
            Ok(()) if connect => format!(
                "Connected {}:{} <-> {}:{}",
                self.device, local, remote_device, remote_iface
            ),
            Ok(()) => format!(
                "Disconnected {}:{} <-> {}:{}",
                self.device, local, remote_device, remote_iface
            ),
            Err(e) => format!("Error: {}", e),
        }
    }

    fn add_device(&mut self, args: &[&str]) -> String {
        let [name, kind, ..] = args else {
            return "Error: usage: add_device <name> <router|switch|host|firewall>".to_string();
        };
        let Some(kind) = DeviceKind::parse(kind) else {
            return format!("Error: unknown device type '{}'", kind);
        };

        match self.network.add_device(name, kind) {
            Ok(()) => format!("Device {} ({}) added", name, kind),
            Err(e) => format!("Error: {}", e),
        }
    }

    fn set_device_status(&mut self, args: &[&str]) -> String {
        let [name, status, ..] = args else {
            return "Error: usage: set_device_status <device> <online|offline>".to_string();
        };
        let online = match status.to_ascii_lowercase().as_str() {
            "online" => true,
            "offline" => false,
            _ => return "Error: status must be 'online' or 'offline'".to_string(),
        };

        match self.network.set_device_online(name, online) {
            Ok(()) => format!("Device {} set {}", name, status.to_ascii_lowercase()),
            Err(e) => format!("Error: {}", e),
        }
    }

    fn console(&mut self, args: &[&str]) -> String {
        let Some(name) = args.first() else {
            return "Error: specify the device".to_string();
        };
        if self.network.device(name).is_none() {
            return format!("Error: device '{}' not found", name);
        }

        self.device = name.to_string();
        self.set_mode(Mode::User);
        format!("Connected to {}", name)
    }

    // ===== Traffic =====

    fn send(&mut self, args: &[&str]) -> String {
        let [source, destination, payload, rest @ ..] = args else {
            return "Error: usage: send <source_ip> <destination_ip> <message> [ttl]".to_string();
        };
        let ttl = match rest.first() {
            Some(text) => match text.parse::<Ttl>() {
                Ok(ttl) => Some(ttl),
                Err(_) => return format!("Error: invalid TTL '{}'", text),
            },
            None => None,
        };

        match self
            .network
            .send(&self.device, source, destination, payload, ttl)
        {
            Ok(id) => format!("Packet {:08x} sent", id),
            Err(e) => format!("Error: {}", e),
        }
    }

    // ===== Reports and persistence =====

    fn show(&self, args: &[&str]) -> String {
        let Some(what) = args.first() else {
            return "Error: specify what to show (history, queue, interfaces, statistics, topology)"
                .to_string();
        };
        let device = args.get(1).copied().unwrap_or(self.device.as_str());

        match what.to_ascii_lowercase().as_str() {
            "history" => lan_report::history_report(&self.network, device),
            "queue" => lan_report::queue_report(&self.network, device),
            "interfaces" => lan_report::interfaces_report(&self.network, device),
            "statistics" => lan_report::statistics_report(&self.network),
            "topology" => lan_report::topology_report(&self.network),
            other => format!("Unrecognized show subcommand: {}", other),
        }
    }

    fn save(&self, args: &[&str]) -> String {
        let ["running-config", rest @ ..] = args else {
            return "Error: usage: save running-config [file]".to_string();
        };
        let path = self.resolve(rest.first().copied().unwrap_or(DEFAULT_CONFIG_FILE));

        match save_running_config(&self.network, Some(&path)) {
            Ok(path) => format!("Configuration saved to {}", path.display()),
            Err(e) => format!("Error saving configuration: {}", e),
        }
    }

    fn load(&mut self, args: &[&str]) -> String {
        let ["config", file, ..] = args else {
            return "Error: usage: load config <file>".to_string();
        };
        let path = self.resolve(file);

        match load_config(&mut self.network, &path) {
            Ok(count) => {
                if self.network.device(&self.device).is_none() {
                    self.device = self
                        .network
                        .device_list()
                        .first()
                        .map(|(name, _)| name.clone())
                        .unwrap_or_else(|| self.device.clone());
                }
                self.set_mode(Mode::User);
                format!("Configuration loaded from {} ({} devices)", path.display(), count)
            }
            Err(e) => format!("Error loading configuration: {}", e),
        }
    }

    fn list_configs(&self) -> String {
        match list_config_files(&self.config_dir) {
            Ok(files) if files.is_empty() => "No configuration files found.".to_string(),
            Ok(files) => {
                let mut lines = vec!["Available configuration files:".to_string()];
                lines.extend(files.iter().map(|f| format!("  - {}", f.display())));
                lines.join("\n")
            }
            Err(e) => format!("Error: {}", e),
        }
    }
}

pub fn help_text() -> String {
    [
        "=== AVAILABLE COMMANDS ===",
        "Basic:",
        "  enable | disable | exit | end | help | quit",
        "Configuration:",
        "  configure terminal",
        "  hostname <name>",
        "  interface <name>",
        "  ip address <ip> | no ip address",
        "  shutdown | no shutdown",
        "Network:",
        "  connect <iface> <device> <iface>",
        "  disconnect <iface> <device> <iface>",
        "  add_device <name> <router|switch|host|firewall>",
        "  list_devices",
        "  set_device_status <device> <online|offline>",
        "  console <device>",
        "Traffic:",
        "  send <source_ip> <destination_ip> <message> [ttl]",
        "  tick | process",
        "Information:",
        "  show history|queue|interfaces [device]",
        "  show statistics | show topology",
        "Persistence:",
        "  save running-config [file]",
        "  load config <file>",
        "  list_configs",
    ]
    .join("\n")
}

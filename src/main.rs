// Interactive console over the demo lab
//
// Usage:
//   cargo run --bin lan_sim
//   cargo run --bin lan_sim -- --config lab-config.json --log-level debug

use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::process;

use log::{info, LevelFilter};
use simple_logger::SimpleLogger;

use lan_sim::lan_cli::{CliOutput, CliSession};
use lan_sim::lan_persistence::load_config;
use lan_sim::lan_snapshot::demo_topology;
use lan_sim::Network;

fn main() {
    let args: Vec<String> = env::args().collect();
    let mut config: Option<String> = None;
    let mut level = LevelFilter::Warn;

    let mut i = 1;
    while i < args.len() {
        match (args[i].as_str(), args.get(i + 1)) {
            ("--config", Some(file)) => config = Some(file.clone()),
            ("--log-level", Some(text)) => {
                level = text.parse().unwrap_or_else(|_| {
                    eprintln!("Invalid log level: {}", text);
                    process::exit(1);
                })
            }
            _ => {
                eprintln!("Usage: {} [--config FILE] [--log-level LEVEL]", args[0]);
                process::exit(1);
            }
        }
        i += 2;
    }

    if let Err(e) = SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialise logger: {}", e);
    }

    let network = match &config {
        Some(file) => {
            let mut network = Network::new();
            if let Err(e) = load_config(&mut network, Path::new(file)) {
                eprintln!("Failed to load {}: {}", file, e);
                process::exit(1);
            }
            network
        }
        None => demo_topology().unwrap_or_else(|e| {
            eprintln!("Failed to build demo topology: {}", e);
            process::exit(1);
        }),
    };
    info!("starting console");

    println!("=== Virtual LAN Simulator ===");
    println!("Type 'help' for the command list.\n");

    let mut session = CliSession::new(network);
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print!("{}", session.prompt());
        if io::stdout().flush().is_err() {
            break;
        }

        let Some(Ok(line)) = lines.next() else {
            break;
        };

        match session.execute(&line) {
            CliOutput::Quit => break,
            CliOutput::Text(text) if text.is_empty() => {}
            CliOutput::Text(text) => println!("{}", text),
        }
    }

    println!("Bye.");
}

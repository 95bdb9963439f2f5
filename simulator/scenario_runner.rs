// Scenario Runner - Load and execute scenario YAML files
//
// Usage:
//   cargo run --bin scenario_runner scenarios/demo_lab.yaml
//   cargo run --bin scenario_runner scenarios/  (runs all .yaml files in directory)
//   cargo run --bin scenario_runner scenarios/random_lab.yaml --seed 0x1234...

use std::env;
use std::fs;
use std::path::Path;
use std::process;

use log::LevelFilter;
use simple_logger::SimpleLogger;

use lan_sim::lan_scenario::{parse_seed_hex, ScenarioFile, ScenarioRunner};

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <scenario.yaml | directory/> [--seed SEED_HEX]", args[0]);
        eprintln!("\nExamples:");
        eprintln!("  {} scenarios/demo_lab.yaml", args[0]);
        eprintln!("  {} scenarios/", args[0]);
        eprintln!("  {} scenarios/random_lab.yaml --seed 0x123456...", args[0]);
        process::exit(1);
    }

    let path = Path::new(&args[1]);

    // Parse optional seed
    let seed: Option<[u8; 32]> = if args.len() >= 4 && args[2] == "--seed" {
        Some(parse_seed_hex(&args[3]).unwrap_or_else(|e| {
            eprintln!("{}", e);
            process::exit(1);
        }))
    } else {
        None
    };

    if path.is_file() {
        run_scenario_file(path, seed);
    } else if path.is_dir() {
        run_scenario_directory(path, seed);
    } else {
        eprintln!("Error: Path does not exist: {}", path.display());
        process::exit(1);
    }
}

fn run_scenario_directory(dir: &Path, seed: Option<[u8; 32]>) {
    let mut scenarios = Vec::new();

    if let Ok(entries) = fs::read_dir(dir) {
        for entry in entries.flatten() {
            let path = entry.path();
            let ext = path.extension().and_then(|s| s.to_str());
            if ext == Some("yaml") || ext == Some("yml") {
                scenarios.push(path);
            }
        }
    }

    scenarios.sort();

    if scenarios.is_empty() {
        eprintln!("No .yaml files found in {}", dir.display());
        process::exit(1);
    }

    println!("Found {} scenario(s) to run\n", scenarios.len());

    for (i, scenario_path) in scenarios.iter().enumerate() {
        println!("\n{}/{} Running: {}\n", i + 1, scenarios.len(), scenario_path.display());
        run_scenario_file(scenario_path, seed);
    }

    println!("\nAll scenarios complete!\n");
}

fn run_scenario_file(path: &Path, seed: Option<[u8; 32]>) {
    println!("Loading scenario from: {}", path.display());

    let scenario = ScenarioFile::load(path).unwrap_or_else(|e| {
        eprintln!("Failed to load {}: {}", path.display(), e);
        process::exit(1);
    });

    // first scenario to name a level wins; later init calls fail harmlessly
    let level = scenario
        .config
        .log_level
        .as_deref()
        .and_then(|text| text.parse().ok())
        .unwrap_or(LevelFilter::Info);
    let _ = SimpleLogger::new().with_level(level).init();

    if let Some(desc) = &scenario.meta.description {
        println!("{}\n", desc);
    }

    println!("Configuration:");
    println!("  Ticks: {}", scenario.config.ticks);
    println!("  Devices: {}", scenario.topology.devices.len());
    println!("  Connections: {}", scenario.topology.connections.len());
    println!("  Scheduled sends: {}", scenario.traffic.len());
    if let Some(random) = &scenario.random_traffic {
        println!("  Random packets per tick: {}", random.packets_per_tick);
    }
    println!("\nStarting simulation...\n");

    let result = ScenarioRunner::new(scenario, seed)
        .and_then(ScenarioRunner::run)
        .unwrap_or_else(|e| {
            eprintln!("Scenario {} failed: {}", path.display(), e);
            process::exit(1);
        });

    println!("{}", result.summary());
    println!("\nScenario complete!\n");
}

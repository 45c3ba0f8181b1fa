use plutus_orders_rs::config::Config;
use plutus_orders_rs::kupo::KupoApi;
use plutus_orders_rs::manifest::Blueprint;
use plutus_orders_rs::scenarios::{self, Step, SCENARIOS};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const CONCURRENCY: usize = 4;

#[derive(Serialize)]
struct ScenarioExport {
    scenario: String,
    ok: bool,
    error: Option<String>,
    steps: Vec<Step>,
}

fn print_usage(bin: &str) {
    eprintln!("Usage:");
    eprintln!("  {} [--scenario <name|all>] [--out <file>]", bin);
    eprintln!("  {} --kupo <pattern>", bin);
    eprintln!();
    eprintln!("  No args          → run every scenario on the emulator");
    eprintln!("  --scenario       → run one scenario (default: all)");
    eprintln!("  --out            → write the report to a file instead of stdout");
    eprintln!("  --kupo           → print unspent outputs matching a Kupo pattern");
    eprintln!();
    eprintln!("  Available scenarios:");
    for name in SCENARIOS {
        eprintln!("    {}", name);
    }
    eprintln!();
    eprintln!("  Environment: KUPO_URL, PLUTUS_MANIFEST, NETWORK,");
    eprintln!("               EMULATOR_BLOCK_MS, EMULATOR_START_MS, RUST_LOG");
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    let raw_args: Vec<String> = std::env::args().collect();
    let mut scenario = "all".to_string();
    let mut out: Option<String> = None;
    let mut kupo_pattern: Option<String> = None;
    let mut i = 1;
    while i < raw_args.len() {
        let flag = raw_args[i].as_str();
        if !matches!(flag, "--scenario" | "--out" | "--kupo") {
            print_usage(&raw_args[0]);
            std::process::exit(1);
        }
        i += 1;
        if i >= raw_args.len() {
            eprintln!("{} requires a value", flag);
            std::process::exit(1);
        }
        let value = raw_args[i].clone();
        match flag {
            "--scenario" => scenario = value,
            "--out" => out = Some(value),
            _ => kupo_pattern = Some(value),
        }
        i += 1;
    }

    if let Some(pattern) = kupo_pattern {
        return query_kupo(&config, &pattern).await;
    }

    let names: Vec<String> = if scenario == "all" {
        SCENARIOS.iter().map(|s| s.to_string()).collect()
    } else if SCENARIOS.contains(&scenario.as_str()) {
        vec![scenario]
    } else {
        eprintln!("Unknown scenario: '{}'.", scenario);
        print_usage(&raw_args[0]);
        std::process::exit(1);
    };

    let blueprint = match Blueprint::load(&config.manifest_path) {
        Ok(b) => Some(b),
        Err(e) => {
            warn!(path = %config.manifest_path, "no blueprint loaded ({}), using built-in scripts", e);
            None
        }
    };

    let exports = run_all(names, config, blueprint).await;
    let failed = exports.iter().filter(|e| !e.ok).count();
    let json = serde_json::to_string_pretty(&exports)?;
    match out {
        Some(path) => {
            std::fs::write(&path, &json)?;
            eprintln!("Wrote {} scenario report(s) to {}", exports.len(), path);
        }
        None => println!("{}", json),
    }

    if failed > 0 {
        error!("{} scenario(s) failed", failed);
        std::process::exit(1);
    }
    Ok(())
}

/// Each scenario gets its own emulator, so they run side by side.
async fn run_all(
    names: Vec<String>,
    config: Config,
    blueprint: Option<Blueprint>,
) -> Vec<ScenarioExport> {
    let config = Arc::new(config);
    let semaphore = Arc::new(Semaphore::new(CONCURRENCY));
    let mut handles = Vec::with_capacity(names.len());

    for name in names {
        let config = Arc::clone(&config);
        let sem = Arc::clone(&semaphore);
        let blueprint = blueprint.clone();

        handles.push(tokio::spawn(async move {
            let _permit = sem.acquire().await.ok();
            info!(scenario = %name, "running");
            match scenarios::run(&name, &config, blueprint).await {
                Ok(steps) => ScenarioExport {
                    scenario: name,
                    ok: true,
                    error: None,
                    steps,
                },
                Err(e) => {
                    error!(scenario = %name, "failed: {:#}", e);
                    ScenarioExport {
                        scenario: name,
                        ok: false,
                        error: Some(format!("{:#}", e)),
                        steps: Vec::new(),
                    }
                }
            }
        }));
    }

    let mut exports = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(export) => exports.push(export),
            Err(e) => error!("scenario task panicked: {}", e),
        }
    }
    exports
}

async fn query_kupo(config: &Config, pattern: &str) -> Result<(), Box<dyn std::error::Error>> {
    let kupo = KupoApi::new(config.require_kupo_url()?)?;
    eprintln!("Querying {} for {}...", kupo.api_url(), pattern);
    let utxos = kupo.get(pattern, true).await?;
    eprintln!("Found {} UTxO(s).", utxos.len());
    println!("{}", serde_json::to_string_pretty(&utxos)?);
    Ok(())
}

//! roam-runner: headless driver for the roaming ledger.
//!
//! Usage:
//!   roam-runner --seed 12345 --steps 500 --db ledger.db
//!   roam-runner --config data/ledger.json --ipc-mode

use anyhow::{Context, Result};
use bcroam_core::{
    clock::ManualClock,
    event::JournalEntry,
    seed,
    traffic::TrafficGenerator,
    FraudRegistry, Invocation, LedgerConfig, LedgerError, Outcome, RoamingEngine, SqliteLedger,
};
use std::collections::BTreeMap;
use std::env;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

#[derive(serde::Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum IpcCommand {
    Invoke {
        function: String,
        #[serde(default)]
        args: Vec<String>,
    },
    Registry,
    Quit,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum IpcReply {
    Applied { ok: bool, event: bcroam_core::event::LedgerEvent },
    Queried { ok: bool, payload: String },
    Registry { ok: bool, registry: BTreeMap<String, String> },
    Failed { ok: bool, error: String },
}

#[derive(Default)]
struct ReplayTally {
    applied: u64,
    denied: u64,
    rejected: u64,
    failed: u64,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", 42u64);
    let steps = parse_arg(&args, "--steps", 500usize);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let config_path = flag_value(&args, "--config").unwrap_or("./data/ledger.json");

    let config = if Path::new(config_path).exists() {
        LedgerConfig::load(config_path)?
    } else {
        log::info!("{config_path} not found, using defaults");
        LedgerConfig::default()
    };

    if !ipc_mode {
        println!("Roaming ledger: roam-runner");
        println!("  seed:      {seed}");
        println!("  steps:     {steps}");
        println!("  db:        {db}");
        println!("  rate/min:  {}", config.per_minute_rate);
        println!("  lifecycle: {:?}", config.lifecycle);
        println!();
    }

    let db_effective = if db == ":memory:" {
        format!("file:roam_{}?mode=memory&cache=shared", uuid::Uuid::new_v4().simple())
    } else {
        db.to_string()
    };
    let store = SqliteLedger::open(&db_effective)
        .with_context(|| format!("opening ledger at {db_effective}"))?;
    store.migrate()?;

    if ipc_mode {
        let engine = RoamingEngine::build(store, config)?;
        run_ipc_loop(&engine)
    } else {
        let clock = Arc::new(ManualClock::new(chrono::Utc::now()));
        let engine = RoamingEngine::new(store, Arc::new(FraudRegistry::new()), clock.clone(), config);
        let seeded = engine.seed()?;
        journal(&engine, &seeded)?;

        let mut tally = ReplayTally::default();
        for step in TrafficGenerator::new(seed).steps(steps) {
            clock.advance(step.advance);
            match engine.invoke(&step.invocation) {
                Ok(outcome) => {
                    tally.applied += 1;
                    if let Some(event) = outcome.event() {
                        journal(&engine, event)?;
                    }
                }
                Err(LedgerError::AuthenticationDenied { .. }) => tally.denied += 1,
                Err(LedgerError::InvalidTransition { .. }) => tally.rejected += 1,
                Err(e) => {
                    log::error!("{} failed: {e}", step.invocation.function);
                    tally.failed += 1;
                }
            }
        }
        print_summary(&engine, &tally)
    }
}

fn run_ipc_loop(engine: &RoamingEngine<SqliteLedger>) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: IpcCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let reply = IpcReply::Failed { ok: false, error: e.to_string() };
                writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = match cmd {
            IpcCommand::Quit => break,
            IpcCommand::Registry => IpcReply::Registry { ok: true, registry: engine.registry().snapshot() },
            IpcCommand::Invoke { function, args } => {
                match engine.invoke(&Invocation { function, args }) {
                    Ok(Outcome::Applied(event)) => {
                        journal(engine, &event)?;
                        IpcReply::Applied { ok: true, event }
                    }
                    Ok(Outcome::Queried(bytes)) => IpcReply::Queried {
                        ok: true,
                        payload: String::from_utf8_lossy(&bytes).into_owned(),
                    },
                    Err(e) => IpcReply::Failed { ok: false, error: e.to_string() },
                }
            }
        };
        writeln!(stdout, "{}", serde_json::to_string(&reply)?)?;
        stdout.flush()?;
    }
    Ok(())
}

fn journal(engine: &RoamingEngine<SqliteLedger>, event: &bcroam_core::event::LedgerEvent) -> Result<()> {
    let entry = JournalEntry::for_event(uuid::Uuid::new_v4().to_string(), event)?;
    engine.store().append_event(&entry)?;
    Ok(())
}

fn print_summary(engine: &RoamingEngine<SqliteLedger>, tally: &ReplayTally) -> Result<()> {
    let store = engine.store();
    println!("=== RUN SUMMARY ===");
    println!("  applied:        {}", tally.applied);
    println!("  denied:         {}", tally.denied);
    println!("  rejected:       {}", tally.rejected);
    println!("  failed:         {}", tally.failed);
    println!("  journal rows:   {}", store.journal_len()?);
    println!("  registry size:  {}", engine.registry().len());
    println!("  rate/min:       {}", engine.config().per_minute_rate);

    println!();
    println!("=== SUBSCRIBERS ===");
    for key in seed::inventory_keys() {
        let rec = engine.record(key)?;
        println!(
            "  {key:<4} | v{:<3} | {:<10} | roaming: {:<5} | {:>8.2} min | ${:>8.2} | {:?}",
            store.version(key)?,
            rec.location,
            rec.roaming,
            rec.duration_minutes,
            rec.charges,
            rec.flag,
        );
    }
    Ok(())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2).find(|w| w[0] == flag).map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

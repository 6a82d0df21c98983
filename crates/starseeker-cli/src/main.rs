//! Starseeker - a terminal driver for the hyperspace gate catalog.
//!
//! Serves gates from the local cache straight away, revalidates against the
//! gates service, and keeps working offline.

mod output;
mod session;

use std::io;

use anyhow::{bail, Result};
use chrono::Utc;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use starseeker_core::cache::is_fresh;
use starseeker_core::config::Config;
use starseeker_core::models::filter_gates;
use starseeker_core::sync::spawn_probe;

use session::{Session, Storage};

const USAGE: &str = "\
Usage: starseeker <command> [options]

Commands:
  gates [--search QUERY] [--favorites] [--json]   List gates
  gate CODE                                       Show one gate and its links
  favorite CODE                                   Toggle a favorite gate
  favorites                                       List favorite gates
  refresh                                         Fetch the catalog now
  status                                          Show cache and connectivity status
  watch                                           Keep syncing until Ctrl+C
  logout                                          Clear cached gates and favorites";

/// Initialize the tracing subscriber for logging.
/// The returned guard flushes buffered log lines when dropped.
fn init_tracing() -> WorkerGuard {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (writer, guard) = tracing_appender::non_blocking(io::stderr());
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(writer))
        .with(filter)
        .init();
    guard
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let _log_guard = init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        eprintln!("{}", USAGE);
        return Ok(());
    };
    let rest = &args[1..];

    let config = Config::load()?;
    info!(command = %command, "Starseeker starting");

    match command.as_str() {
        "gates" => list_gates(config, rest).await,
        "gate" => show_gate(config, required_code(rest)?).await,
        "favorite" => toggle_favorite(config, required_code(rest)?).await,
        "favorites" => list_favorites(config).await,
        "refresh" => refresh(config).await,
        "status" => status(config).await,
        "watch" => watch(config).await,
        "logout" => logout(config).await,
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
}

fn required_code(args: &[String]) -> Result<&str> {
    match args.first() {
        Some(code) if !code.trim().is_empty() => Ok(code.trim()),
        _ => bail!("Missing gate code\n\n{}", USAGE),
    }
}

#[derive(Debug, Default, PartialEq)]
struct GatesArgs {
    search: String,
    favorites_only: bool,
    json: bool,
}

fn parse_gates_args(args: &[String]) -> Result<GatesArgs> {
    let mut parsed = GatesArgs::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--search" | "-s" => match iter.next() {
                Some(query) => parsed.search = query.clone(),
                None => bail!("--search needs a query"),
            },
            "--favorites" | "-f" => parsed.favorites_only = true,
            "--json" => parsed.json = true,
            other => bail!("Unknown option for gates: {}", other),
        }
    }
    Ok(parsed)
}

async fn list_gates(config: Config, args: &[String]) -> Result<()> {
    let args = parse_gates_args(args)?;
    let mut session = Session::open(config)?;
    session.start_and_settle().await;

    let favorites = session.favorites.list().await;
    let gates = filter_gates(
        session.sync.gates(),
        &args.search,
        args.favorites_only.then_some(&favorites),
    );

    if args.json {
        println!("{}", serde_json::to_string_pretty(&gates)?);
    } else {
        for gate in &gates {
            println!("{}", output::gate_line(gate, &favorites));
        }
        if gates.is_empty() {
            println!("No gates found");
        }
    }

    if let Some(error) = session.sync.last_error() {
        eprintln!("warning: {}", error);
    }
    Ok(())
}

async fn show_gate(config: Config, code: &str) -> Result<()> {
    let session = Session::open(config)?;
    let favorite = session.favorites.is_favorite(code).await;

    match session.sync.fetch_gate(code).await {
        Ok(gate) => print!("{}", output::gate_detail(&gate, favorite)),
        Err(e) if e.is_not_found() => bail!("No gate with code {}", code),
        Err(e) => {
            // Fall back to the cached catalog when the service is unreachable
            let record = session.cache.load().await;
            match record.gates().iter().find(|g| g.code == code) {
                Some(gate) => {
                    eprintln!("warning: {} (showing cached data)", e);
                    print!("{}", output::gate_detail(gate, favorite));
                }
                None => return Err(e.into()),
            }
        }
    }
    Ok(())
}

async fn toggle_favorite(config: Config, code: &str) -> Result<()> {
    let storage = Storage::open(&config)?;
    if storage.favorites.toggle(code).await {
        println!("{} added to favorites", code);
    } else {
        println!("{} removed from favorites", code);
    }
    Ok(())
}

async fn list_favorites(config: Config) -> Result<()> {
    let storage = Storage::open(&config)?;
    let favorites = storage.favorites.list().await;
    if favorites.is_empty() {
        println!("No favorites yet");
        return Ok(());
    }

    // Cache only: listing favorites should not wait on the network
    let record = storage.cache.load().await;
    for code in favorites.iter() {
        match record.gates().iter().find(|g| g.code == code) {
            Some(gate) => println!("{}", output::gate_line(gate, &favorites)),
            None => println!("* {:<6} (not in the cached catalog)", code),
        }
    }
    Ok(())
}

async fn refresh(config: Config) -> Result<()> {
    // A forced fetch; no need for the cache-first initial load
    let mut session = Session::open(config)?;
    let update = session.sync.refresh().await;
    println!("{}", output::update_line(&update));
    Ok(())
}

async fn status(config: Config) -> Result<()> {
    let storage = Storage::open(&config)?;
    let record = storage.cache.load().await;

    match record.snapshot {
        Some(ref snapshot) => println!(
            "cache: {} gates, updated {}",
            snapshot.len(),
            snapshot.age_display()
        ),
        None => println!("cache: empty"),
    }
    let fresh = is_fresh(&record, Utc::now(), config.cache_ttl());
    println!("fresh: {}", if fresh { "yes" } else { "no" });
    println!("favorites: {}", storage.favorites.list().await.len());

    let service = match session::connect(&config) {
        Ok(client) => {
            if client.ping().await {
                "reachable"
            } else {
                "unreachable"
            }
        }
        Err(_) => "not configured",
    };
    println!("service: {}", service);
    Ok(())
}

async fn watch(config: Config) -> Result<()> {
    let mut session = Session::open(config)?;
    let probe = spawn_probe(
        session.hub.clone(),
        session.client.clone(),
        session.config.probe_interval(),
    );

    session.sync.start(session.hub.as_ref()).await;
    for line in output::status_lines(&session.sync) {
        println!("{}", line);
    }

    loop {
        tokio::select! {
            update = session.sync.next_event() => match update {
                Some(update) => println!("{}", output::update_line(&update)),
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    probe.abort();
    session.sync.stop();
    info!("Starseeker shutting down");
    Ok(())
}

async fn logout(config: Config) -> Result<()> {
    // Local data only, so logging out works without a configured service
    let storage = Storage::open(&config)?;
    storage.cache.clear().await;
    storage.favorites.clear().await;
    println!("Cleared cached gates and favorites");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_gates_args() {
        let parsed =
            parse_gates_args(&args(&["--search", "sir", "--favorites", "--json"])).unwrap();
        assert_eq!(
            parsed,
            GatesArgs {
                search: "sir".to_string(),
                favorites_only: true,
                json: true,
            }
        );
        assert_eq!(parse_gates_args(&[]).unwrap(), GatesArgs::default());
    }

    #[test]
    fn test_parse_gates_args_errors() {
        assert!(parse_gates_args(&args(&["--search"])).is_err());
        assert!(parse_gates_args(&args(&["--bogus"])).is_err());
    }

    #[test]
    fn test_required_code() {
        assert_eq!(required_code(&args(&[" SOL "])).unwrap(), "SOL");
        assert!(required_code(&args(&[])).is_err());
        assert!(required_code(&args(&[""])).is_err());
    }
}

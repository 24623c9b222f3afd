//! courier-ctl — inspect configuration, validate connectivity settings and
//! manage stored sessions.

use std::time::Instant;

use anyhow::{bail, Context, Result};

use courier_client::{dialer_for, Dialer, FileStorage, SessionStorage};
use courier_core::{CourierConfig, Session};

// ── Subcommand handlers ───────────────────────────────────────────────────────

fn cmd_config(config: &CourierConfig) -> Result<()> {
    println!("# {}", CourierConfig::file_path().display());
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = CourierConfig::write_default_if_missing()?;
    println!("Config at {}", path.display());
    Ok(())
}

async fn cmd_check(config: &CourierConfig, session: Option<&str>, dial: Option<&str>) -> Result<()> {
    let tg = &config.telegram;
    let dialer = dialer_for(&tg.proxy, config.transport.dial_timeout())?;

    println!("═══════════════════════════════════════");
    println!("  Courier Settings Check");
    println!("═══════════════════════════════════════");
    println!("  App id          : {}", tg.app_id);
    println!(
        "  Proxy           : {}",
        if tg.proxy.is_empty() { "direct" } else { "socks5" }
    );
    println!(
        "  Rate limit      : {} ({} ms, burst {})",
        if tg.rate_limit { "on" } else { "off" },
        tg.rate,
        tg.rate_burst
    );
    println!("  Retries         : {}", tg.retries);
    println!(
        "  Transport       : dial {}s, {} retries every {}s",
        config.transport.dial_timeout_secs,
        config.transport.max_retries,
        config.transport.retry_interval_secs
    );

    if let Some(encoded) = session {
        let session = Session::from_string_session(encoded)?;
        println!("  Session         : ok ({} bytes)", session.len());
    }

    if let Some(addr) = dial {
        let started = Instant::now();
        let stream = dialer
            .dial("tcp", addr)
            .await
            .with_context(|| format!("failed to reach {addr}"))?;
        let peer = stream.peer_addr().context("connected socket has no peer")?;
        println!(
            "  Dial {addr} : ok ({peer}, {} ms)",
            started.elapsed().as_millis()
        );
    }

    Ok(())
}

async fn cmd_session_import(config: &CourierConfig, identity: &str, encoded: &str) -> Result<()> {
    let session = Session::from_string_session(encoded)?;
    let storage = FileStorage::new(&config.storage.session_dir)?;
    storage.save(identity, &session).await?;
    tracing::info!(identity, len = session.len(), "session imported");
    println!("Stored {} bytes for {identity}.", session.len());
    Ok(())
}

async fn cmd_session_show(config: &CourierConfig, identity: &str) -> Result<()> {
    let storage = FileStorage::new(&config.storage.session_dir)?;
    match storage.load(identity).await? {
        Some(session) => println!("{}", session.to_string_session()),
        None => bail!("no session stored for {identity}"),
    }
    Ok(())
}

fn print_usage() {
    println!("Usage: courier-ctl [--config <path>] <command>");
    println!();
    println!("Commands:");
    println!("  config                          Print the resolved configuration");
    println!("  config init                     Write a default config file if none exists");
    println!("  check [--session <s>] [--dial <host:port>]");
    println!("                                  Validate proxy and session settings");
    println!("  session import <id> <string>    Store a string session under <id>");
    println!("  session show <id>               Print the stored session for <id>");
    println!();
    println!("Options:");
    println!("  --config <path>   Config file (default: {})", CourierConfig::file_path().display());
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();

    let mut config_path = None;
    let mut session = None;
    let mut dial = None;
    let mut remaining: Vec<&str> = Vec::new();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" => {
                i += 1;
                config_path = Some(args.get(i).context("--config requires a value")?.clone());
            }
            "--session" => {
                i += 1;
                session = Some(args.get(i).context("--session requires a value")?.as_str());
            }
            "--dial" => {
                i += 1;
                dial = Some(args.get(i).context("--dial requires a value")?.as_str());
            }
            other => remaining.push(other),
        }
        i += 1;
    }

    let config = match config_path {
        Some(path) => CourierConfig::load_from(path.into()),
        None => CourierConfig::load(),
    }
    .context("failed to load configuration")?;

    match remaining.as_slice() {
        ["config"] | []                 => cmd_config(&config),
        ["config", "init"]              => cmd_config_init(),
        ["check"]                       => cmd_check(&config, session, dial).await,
        ["session", "import", id, s]    => cmd_session_import(&config, id, s).await,
        ["session", "show", id]         => cmd_session_show(&config, id).await,
        ["help"] | ["--help"] | ["-h"]  => { print_usage(); Ok(()) }
        other => {
            eprintln!("Unknown command: {}", other.join(" "));
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    }
}

//! lirc-listen
//!
//! Connects to lircd, loads lircrc tables and prints every code the daemon
//! sends along with its translations. Reconnects when the daemon goes away.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use lirc_client::{ClientConfig, ClientEvent, ConfigSources, Session};
use tokio::time::sleep;
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Print lircd codes and their lircrc translations
#[derive(Parser, Debug)]
#[command(name = "lirc-listen")]
#[command(version, about, long_about = None)]
struct Args {
    /// Program name matched against `prog` in lircrc entries
    #[arg(short, long, default_value = "lirc-listen")]
    program: String,

    /// Report protocol diagnostics and log at debug level
    #[arg(short, long)]
    verbose: bool,

    /// lircd socket (defaults to `$LIRC_SOCKET_PATH` or `/var/run/lirc/lircd`)
    #[arg(short, long, value_name = "PATH")]
    socket: Option<PathBuf>,

    /// JSON client configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Print events as JSON lines
    #[arg(long)]
    json: bool,

    /// Seconds to wait between reconnect attempts
    #[arg(long, value_name = "SECS", default_value_t = 5)]
    reconnect_delay: u64,

    /// lircrc files to load (defaults to the user's lircrc)
    #[arg(value_name = "LIRCRC")]
    lircrc: Vec<String>,
}

fn setup_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("lirc_client={level},lirc_listen={level}")));

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(verbose);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter)
        .init();
}

fn load_config(args: &Args) -> Result<ClientConfig> {
    let config = match &args.config {
        Some(path) => ClientConfig::load(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ClientConfig::from_env(),
    };

    Ok(match &args.socket {
        Some(socket) => config.with_socket_path(socket),
        None => config,
    })
}

fn print_event(event: &ClientEvent, json: bool) {
    if json {
        match serde_json::to_string(event) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!("Failed to serialize event: {}", e),
        }
        return;
    }

    match event {
        ClientEvent::RawData { code } => println!("{code}"),
        ClientEvent::Data { button, source } if source.is_empty() => {
            println!("  -> {button} (default lircrc)");
        }
        ClientEvent::Data { button, source } => println!("  -> {button} ({source})"),
        ClientEvent::Closed => println!("lircd connection closed"),
    }
}

/// Retry `reconnect` until it succeeds. Returns false if interrupted.
async fn reconnect(session: &mut Session, delay: Duration) -> bool {
    loop {
        tokio::select! {
            () = sleep(delay) => {}
            _ = tokio::signal::ctrl_c() => return false,
        }

        match session.reconnect().await {
            Ok(()) => {
                info!("Reconnected to lircd");
                return true;
            }
            Err(e) => warn!("Reconnect failed: {}", e),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.verbose);

    let config = load_config(&args)?;
    let sources = if args.lircrc.is_empty() {
        ConfigSources::default()
    } else {
        ConfigSources::from(args.lircrc.clone())
    };
    let json = args.json;

    let mut session = Session::new(config);
    session
        .connect(&args.program, args.verbose, sources, move |event: ClientEvent| {
            print_event(&event, json);
        })
        .await
        .context("Failed to connect to lircd")?;

    let delay = Duration::from_secs(args.reconnect_delay);
    loop {
        let interrupted = tokio::select! {
            () = session.run() => false,
            _ = tokio::signal::ctrl_c() => true,
        };

        if interrupted || !reconnect(&mut session, delay).await {
            break;
        }
    }

    session.close();
    info!("Exiting");
    Ok(())
}

use std::io;
use std::process;
use std::time::Duration;

use clap::Parser;
use redcli::client::Client;
use redcli::config::{ConnectionConfig, DEFAULT_HEARTBEAT_SECS, DEFAULT_HOST, DEFAULT_PORT};
use redcli::render::{RenderOptions, Renderer};
use redcli::session::Session;
use tokio::io::BufReader;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, Level};

const CLOSE_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Redis server host
    #[arg(long, env = "REDCLI_HOST", default_value = DEFAULT_HOST)]
    host: String,

    /// Redis server port
    #[arg(long, env = "REDCLI_PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Redis server password
    #[arg(long, env = "REDCLI_PASSWORD", default_value = "", hide_env_values = true)]
    password: String,

    /// Redis database number
    #[arg(long, env = "REDCLI_DATABASE", default_value_t = 0)]
    database: u32,

    /// Enable write commands (default: read-only mode)
    #[arg(long)]
    writable: bool,

    /// Pretty print JSON values
    #[arg(long)]
    pretty: bool,

    /// Heartbeat interval in seconds
    #[arg(
        long,
        env = "REDCLI_HEARTBEAT",
        default_value_t = DEFAULT_HEARTBEAT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    heartbeat: u64,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Diagnostics level, written to stderr
    #[arg(long, env = "REDCLI_LOG_LEVEL", default_value_t = Level::WARN)]
    log_level: Level,
}

impl Args {
    fn connection_config(&self) -> ConnectionConfig {
        ConnectionConfig {
            host: self.host.clone(),
            port: self.port,
            password: self.password.clone(),
            database: self.database,
            heartbeat: Duration::from_secs(self.heartbeat),
            writable: self.writable,
        }
    }

    fn render_options(&self) -> RenderOptions {
        RenderOptions {
            pretty: self.pretty,
            no_color: self.no_color,
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let _ = tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(args.log_level)
        .try_init()
        .map_err(|e| eprintln!("Failed to initialize global tracing: {}", e));

    let client = match Client::connect(args.connection_config()).await {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to Redis: {}", e);
            process::exit(1);
        }
    };

    let renderer = Renderer::new(args.render_options());
    let session = Session::new(&client, renderer);

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let mut stdout = io::stdout();
    let mut stderr = io::stderr();

    let result = match session.greet(&mut stdout) {
        Ok(()) => {
            let stdin = BufReader::new(tokio::io::stdin());
            session.run(stdin, &mut stdout, &mut stderr, shutdown).await
        }
        Err(e) => Err(e),
    };
    if let Err(e) = result {
        eprintln!("Error reading input: {}", e);
    }

    // An interrupted session may leave the heartbeat waiting on a silent store.
    match time::timeout(CLOSE_TIMEOUT, client.close()).await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => debug!("Failed to close connection: {}", e),
        Err(_) => debug!("Timed out closing connection"),
    }

    // The blocking stdin reader cannot be interrupted, so leave without waiting for it.
    process::exit(0);
}

async fn cancel_on_signal(shutdown: CancellationToken) {
    wait_for_signal().await;
    shutdown.cancel();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            debug!("Failed to listen for SIGTERM: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

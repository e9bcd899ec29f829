//! clickgate daemon — serves the verification endpoint and waits on
//! identifiers read from stdin.
//!
//! Each non-empty stdin line is registered as a pending verification. When
//! it resolves, `<identifier> <outcome>` is printed to stdout, so another
//! process can pipe identifiers in and read results back out.

use anyhow::Context;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

use clickgate_registry::WaiterRegistry;
use clickgate_server::{RenderKind, ServerConfig, VerifyServer};
use clickgate_utils::{init_logging, LogFormat};

#[derive(Parser)]
#[command(name = "clickgate", about = "Human verification via out-of-band click")]
struct Cli {
    /// Path to a TOML configuration file. If provided, file settings
    /// are used as the base; CLI flags and env vars override them.
    #[arg(long, env = "CLICKGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "CLICKGATE_LISTEN")]
    listen: Option<SocketAddr>,

    /// Seconds a verification stays open after it is awaited.
    #[arg(long, env = "CLICKGATE_TIMEOUT_SECS")]
    timeout_secs: Option<u64>,

    /// Seconds between expiry sweeps (0 disables the sweep).
    #[arg(long, env = "CLICKGATE_SWEEP_INTERVAL_SECS")]
    sweep_interval_secs: Option<u64>,

    /// Block a client address, e.g. `--block 9.9.9.9=abuse`. Repeatable;
    /// merged over the config file's blocklist.
    #[arg(long = "block", value_name = "IP=REASON", value_parser = parse_block_entry)]
    block: Vec<(IpAddr, String)>,

    /// Serve over HTTPS (requires --tls-cert and --tls-key).
    #[arg(long, env = "CLICKGATE_TLS")]
    tls: bool,

    /// PEM certificate chain.
    #[arg(long, env = "CLICKGATE_TLS_CERT")]
    tls_cert: Option<PathBuf>,

    /// PEM private key.
    #[arg(long, env = "CLICKGATE_TLS_KEY")]
    tls_key: Option<PathBuf>,

    /// Trust X-Forwarded-For / X-Real-IP for the client address.
    #[arg(long, env = "CLICKGATE_TRUST_FORWARDED_FOR")]
    trust_forwarded_for: bool,

    /// Response format: "json" or "html".
    #[arg(long, env = "CLICKGATE_RENDER", value_parser = parse_render)]
    render: Option<RenderKind>,

    /// Expose Prometheus metrics at /metrics.
    #[arg(long, env = "CLICKGATE_ENABLE_METRICS")]
    metrics: bool,

    /// Log format: "human" or "json".
    #[arg(long, env = "CLICKGATE_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, env = "CLICKGATE_LOG_LEVEL")]
    log_level: Option<String>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Serve the endpoint and await identifiers read from stdin.
    Serve,
    /// Print the effective configuration as TOML and exit.
    Config,
}

fn parse_block_entry(s: &str) -> Result<(IpAddr, String), String> {
    let (addr, reason) = s
        .split_once('=')
        .ok_or_else(|| format!("expected IP=REASON, got {s:?}"))?;
    let addr = addr
        .trim()
        .parse::<IpAddr>()
        .map_err(|e| format!("invalid address {addr:?}: {e}"))?;
    Ok((addr, reason.trim().to_string()))
}

fn parse_render(s: &str) -> Result<RenderKind, String> {
    match s.to_ascii_lowercase().as_str() {
        "json" => Ok(RenderKind::Json),
        "html" => Ok(RenderKind::Html),
        _ => Err(format!("unknown render format {s:?}, expected \"json\" or \"html\"")),
    }
}

/// File config (or defaults) with CLI flags and env vars layered on top.
fn effective_config(cli: &Cli) -> anyhow::Result<ServerConfig> {
    let mut config = match &cli.config {
        Some(path) => ServerConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ServerConfig::default(),
    };

    if let Some(listen) = cli.listen {
        config.listen_addr = listen;
    }
    if let Some(timeout) = cli.timeout_secs {
        config.timeout_secs = timeout;
    }
    if let Some(interval) = cli.sweep_interval_secs {
        config.sweep_interval_secs = interval;
    }
    for (addr, reason) in &cli.block {
        config.blocklist.insert(*addr, reason.clone());
    }
    config.use_tls |= cli.tls;
    if cli.tls_cert.is_some() {
        config.tls_cert = cli.tls_cert.clone();
    }
    if cli.tls_key.is_some() {
        config.tls_key = cli.tls_key.clone();
    }
    config.trust_forwarded_for |= cli.trust_forwarded_for;
    if let Some(render) = cli.render {
        config.render = render;
    }
    config.enable_metrics |= cli.metrics;
    if let Some(format) = cli.log_format {
        config.log_format = format;
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }

    config.validate()?;
    Ok(config)
}

/// Register every identifier read from stdin and report its outcome.
async fn await_from_stdin(registry: Arc<WaiterRegistry>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let identifier = match lines.next_line().await {
            Ok(Some(line)) => line.trim().to_string(),
            Ok(None) => {
                tracing::debug!("stdin closed; serving until shutdown");
                return;
            }
            Err(e) => {
                tracing::warn!("failed to read stdin: {e}");
                return;
            }
        };
        if identifier.is_empty() {
            continue;
        }

        match registry.register(identifier.clone()) {
            Ok(visit) => {
                tokio::spawn(async move {
                    match visit.wait().await {
                        Ok(outcome) => println!("{identifier} {outcome}"),
                        Err(e) => tracing::warn!("{e}"),
                    }
                });
            }
            Err(e) => tracing::warn!("{e}"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = effective_config(&cli)?;

    match cli.command {
        Command::Config => {
            print!("{}", config.to_toml_string());
        }
        Command::Serve => {
            init_logging(config.log_format, &config.log_level)
                .context("installing log subscriber")?;

            let server = VerifyServer::new(config)?;
            let shutdown = server.shutdown_controller();
            tokio::spawn(async move { shutdown.wait_for_signal().await });
            let stdin_task = tokio::spawn(await_from_stdin(Arc::clone(server.registry())));

            let result = server.serve().await;
            stdin_task.abort();
            result.context("verification server failed")?;

            tracing::info!("clickgate exited cleanly");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_entry_splits_on_first_equals() {
        let (addr, reason) = parse_block_entry("9.9.9.9=abuse = spam").unwrap();
        assert_eq!(addr, "9.9.9.9".parse::<IpAddr>().unwrap());
        assert_eq!(reason, "abuse = spam");
        assert!(parse_block_entry("9.9.9.9").is_err());
        assert!(parse_block_entry("nine=abuse").is_err());
    }

    #[test]
    fn cli_flags_override_defaults() {
        let cli = Cli::parse_from([
            "clickgate",
            "--listen",
            "127.0.0.1:9999",
            "--timeout-secs",
            "2",
            "--block",
            "9.9.9.9=abuse",
            "--render",
            "html",
            "config",
        ]);
        let config = effective_config(&cli).unwrap();
        assert_eq!(config.listen_addr, "127.0.0.1:9999".parse().unwrap());
        assert_eq!(config.timeout_secs, 2);
        assert_eq!(config.render, RenderKind::Html);
        assert_eq!(
            config.blocklist.reason_for(&"9.9.9.9".parse().unwrap()),
            Some("abuse")
        );
    }

    #[test]
    fn tls_flag_without_files_is_rejected() {
        let cli = Cli::parse_from(["clickgate", "--tls", "config"]);
        assert!(effective_config(&cli).is_err());
    }
}

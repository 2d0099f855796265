mod output;
mod telemetry;
mod view_server;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use promdash_core::config::Config;
use promdash_core::filter::NameFilter;
use promdash_core::model::MetricsPayload;
use promdash_core::time::parse_duration_str;
use promdash_ingest::decode::{DecodeOptions, encode_exposition, normalize_body};
use promdash_ingest::fetch::{MetricsSource, ScrapeClient, ScrapeConfig};
use promdash_ingest::poller::{Poller, Snapshot};
use promdash_render::build_view;
use tokio::io::AsyncReadExt;

use crate::output::{print_snapshot_human, print_view_human};
use crate::telemetry::{TelemetryConfig, init_cli_tracing, init_run_tracing, shutdown_tracing};

#[derive(Parser, Debug)]
#[command(name = "promdash")]
#[command(about = "Normalize, classify and render Prometheus metrics")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, global = true, help = "Config file (defaults to $XDG_CONFIG_HOME/promdash/config.toml)")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(about = "Fetch or read one payload and print it")]
    Show {
        #[arg(long)]
        url: Option<String>,
        #[arg(long, conflicts_with = "url")]
        file: Option<PathBuf>,
        #[arg(long, conflicts_with_all = ["url", "file"])]
        stdin: bool,
        #[arg(long, help = "Glob over metric names, e.g. 'http_*'")]
        only: Option<String>,
        #[arg(long, value_enum, default_value_t = OutputFormat::Human)]
        output: OutputFormat,
        #[arg(long, help = "Keep metrics that have HELP but no TYPE line")]
        commit_untyped: bool,
    },
    #[command(about = "Poll the scrape URL and reprint the view on every poll")]
    Watch {
        #[arg(long)]
        url: Option<String>,
        #[arg(long, help = "Poll interval, e.g. 30s")]
        interval: Option<String>,
        #[arg(long)]
        only: Option<String>,
        #[arg(long)]
        json: bool,
    },
    #[command(about = "Poll the scrape URL and serve the latest view over HTTP")]
    Serve {
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        addr: Option<String>,
        #[arg(long)]
        interval: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Grouped, formatted view for terminals
    Human,
    /// Grouped view as JSON
    Json,
    /// Canonical `{metrics, timestamp}` payload as JSON
    Payload,
    /// Canonical metrics re-encoded as exposition text
    Prom,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut cfg = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Show {
            url,
            file,
            stdin,
            only,
            output,
            commit_untyped,
        } => {
            init_cli_tracing();
            if let Some(v) = url {
                cfg.scrape_url = v;
            }
            cfg.commit_untyped |= commit_untyped;
            let filter = NameFilter::from_option(only.as_deref())?;
            let source = if stdin {
                PayloadSource::Stdin
            } else if let Some(path) = file {
                PayloadSource::File(path)
            } else {
                PayloadSource::Scrape
            };
            let mut payload = read_payload(source, &cfg).await?;
            payload.metrics = filter.apply(payload.metrics);
            print_payload(&payload, output)
        }
        Commands::Watch {
            url,
            interval,
            only,
            json,
        } => {
            init_run_tracing(TelemetryConfig::from_env());
            apply_poll_overrides(&mut cfg, url, interval)?;
            let filter = NameFilter::from_option(only.as_deref())?;
            let result = run_watch(&cfg, filter, json).await;
            shutdown_tracing();
            result
        }
        Commands::Serve {
            url,
            addr,
            interval,
        } => {
            init_run_tracing(TelemetryConfig::from_env());
            apply_poll_overrides(&mut cfg, url, interval)?;
            if let Some(v) = addr {
                cfg.view_http_addr = v;
            }
            let result = run_serve(&cfg).await;
            shutdown_tracing();
            result
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    let cfg = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    cfg.context("load config")
}

fn apply_poll_overrides(
    cfg: &mut Config,
    url: Option<String>,
    interval: Option<String>,
) -> anyhow::Result<()> {
    if let Some(v) = url {
        cfg.scrape_url = v;
    }
    if let Some(v) = interval {
        cfg.poll_interval = parse_interval(&v)?;
    }
    Ok(())
}

fn parse_interval(raw: &str) -> anyhow::Result<Duration> {
    let interval = parse_duration_str(raw)?;
    if interval.is_zero() {
        anyhow::bail!("poll interval must be greater than zero");
    }
    Ok(interval)
}

enum PayloadSource {
    Scrape,
    File(PathBuf),
    Stdin,
}

async fn read_payload(source: PayloadSource, cfg: &Config) -> anyhow::Result<MetricsPayload> {
    let options = DecodeOptions {
        commit_untyped: cfg.commit_untyped,
    };
    match source {
        PayloadSource::Scrape => {
            let client = ScrapeClient::new(ScrapeConfig::from_config(cfg))?;
            Ok(client.fetch().await?)
        }
        PayloadSource::File(path) => {
            let body = tokio::fs::read(&path)
                .await
                .with_context(|| format!("read {}", path.display()))?;
            Ok(normalize_body(&body, options, Utc::now()))
        }
        PayloadSource::Stdin => {
            let mut body = Vec::new();
            tokio::io::stdin()
                .read_to_end(&mut body)
                .await
                .context("read stdin")?;
            Ok(normalize_body(&body, options, Utc::now()))
        }
    }
}

fn print_payload(payload: &MetricsPayload, output: OutputFormat) -> anyhow::Result<()> {
    match output {
        OutputFormat::Human => print_view_human(&build_view(payload)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&build_view(payload))?),
        OutputFormat::Payload => println!("{}", serde_json::to_string_pretty(payload)?),
        OutputFormat::Prom => print!("{}", encode_exposition(&payload.metrics)),
    }
    Ok(())
}

async fn run_watch(cfg: &Config, filter: NameFilter, json: bool) -> anyhow::Result<()> {
    let client = ScrapeClient::new(ScrapeConfig::from_config(cfg))?;
    tracing::info!(url = %client.url(), interval = ?cfg.poll_interval, "watching");
    let handle = Poller::spawn(client, cfg.poll_interval);
    let mut rx = handle.subscribe();

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = filtered(rx.borrow_and_update().clone(), &filter);
                print_snapshot(&snapshot, json)?;
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received ctrl-c, stopping watch");
                break;
            }
        }
    }
    Ok(())
}

fn filtered(mut snapshot: Snapshot, filter: &NameFilter) -> Snapshot {
    if let Some(payload) = snapshot.payload.as_mut() {
        payload.metrics = filter.apply(std::mem::take(&mut payload.metrics));
    }
    snapshot
}

fn print_snapshot(snapshot: &Snapshot, json: bool) -> anyhow::Result<()> {
    if json {
        let view = snapshot.payload.as_ref().map(build_view);
        let line = serde_json::json!({
            "sequence": snapshot.sequence,
            "error": snapshot.error,
            "view": view,
        });
        println!("{}", serde_json::to_string(&line)?);
    } else {
        print_snapshot_human(snapshot);
    }
    Ok(())
}

async fn run_serve(cfg: &Config) -> anyhow::Result<()> {
    let client = ScrapeClient::new(ScrapeConfig::from_config(cfg))?;
    let addr: SocketAddr = cfg
        .view_http_addr
        .parse()
        .with_context(|| format!("bad view address {}", cfg.view_http_addr))?;

    eprintln!("promdash serve");
    eprintln!("  scrape: {}", client.url());
    eprintln!("  every: {}", humantime::format_duration(cfg.poll_interval));
    eprintln!("  view http: {}", cfg.view_http_addr);

    let handle = Poller::spawn(client, cfg.poll_interval);
    let server = tokio::spawn(view_server::run_view_server(handle.subscribe(), addr));

    tokio::select! {
        res = server => {
            res??;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("received ctrl-c, shutting down");
        }
    }

    drop(handle);
    Ok(())
}

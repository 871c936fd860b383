use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use report_orchestrator::{DispatchConfig, Dispatcher, JobPlanner, ReportOrchestrator, ResolutionChain};
use source_client::SourceClients;
use tokio::signal::unix::SignalKind;
use tokio::time;
use watchlist_core::{AnalysisSource, NarrativeFallback, ReportKind};

mod config;
mod metrics;
mod render;

use config::AgentConfig;
use metrics::RunMetrics;

const USAGE: &str = "usage: report-agent <morning_brief|midday_review|eod_summary> [--user ID]... [--json]";

#[derive(Debug, PartialEq)]
struct CliArgs {
    kind: ReportKind,
    users: Vec<String>,
    json: bool,
}

fn parse_args(args: &[String]) -> Result<CliArgs, String> {
    let mut kind = None;
    let mut users = Vec::new();
    let mut json = false;

    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--json" => json = true,
            "--user" => {
                let user = iter.next().ok_or("--user needs a value")?;
                users.push(user.clone());
            }
            flag if flag.starts_with("--") => return Err(format!("unknown flag: {}", flag)),
            value => {
                if kind.is_some() {
                    return Err(format!("unexpected argument: {}", value));
                }
                kind = Some(value.parse::<ReportKind>().map_err(|e| e.to_string())?);
            }
        }
    }

    let kind = kind.ok_or("missing report kind")?;
    Ok(CliArgs { kind, users, json })
}

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Load .env, init tracing
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .with_writer(std::io::stderr)
            .init();
    }

    // Panic hook: log panic info before crashing
    std::panic::set_hook(Box::new(|info| {
        eprintln!("PANIC: {info}");
        tracing::error!("PANIC: {info}");
    }));

    // 2. Arguments
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = match parse_args(&args) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            std::process::exit(1);
        }
    };

    // 3. Configuration
    let config = AgentConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  Report: {}", cli.kind);
    tracing::info!("  Workers: {} | per-job timeout: {:?}", config.max_workers, config.per_job_timeout);
    tracing::info!(
        "  Primary source: {}",
        config.sources.scanner_url.as_deref().unwrap_or("(disabled)")
    );
    tracing::info!(
        "  Fallback: {}",
        if config.sources.llm_api_key.is_some() { config.sources.llm_model.as_str() } else { "(disabled)" }
    );

    // 4. Clients and pipeline, built once and reused by every run
    let clients = SourceClients::new(&config.sources).context("failed to build HTTP clients")?;
    let primary = clients.scanner.clone().map(|s| s as Arc<dyn AnalysisSource>);
    let fallback = clients.fallback.clone().map(|f| f as Arc<dyn NarrativeFallback>);

    let chain = ResolutionChain::new(primary.clone(), fallback);
    let dispatcher = Dispatcher::new(
        Arc::new(chain),
        DispatchConfig {
            max_workers: config.max_workers,
            per_job_timeout: config.per_job_timeout,
        },
    );

    let mut planner = JobPlanner::new();
    if config.enable_name_lookup {
        match &clients.scanner {
            Some(scanner) => {
                planner = planner.with_lookup(scanner.clone(), config.sources.lookup_timeout);
            }
            None => tracing::warn!("ENABLE_NAME_LOOKUP is set but SCANNER_URL is not; lookup disabled"),
        }
    }

    let mut orchestrator = ReportOrchestrator::new(clients.store.clone(), dispatcher).with_planner(planner);
    if let Some(source) = primary {
        orchestrator = orchestrator.with_index_source(source, config.sources.scanner_timeout);
    }

    let mut metrics = RunMetrics::new();

    // 5. One-shot
    if config.run_interval_seconds == 0 {
        return run_once(&orchestrator, &cli, &mut metrics).await;
    }

    // 6. Periodic mode with graceful shutdown (SIGINT + SIGTERM)
    tracing::info!("Periodic mode: every {} seconds", config.run_interval_seconds);
    let mut interval = time::interval(Duration::from_secs(config.run_interval_seconds));
    let mut sigterm = tokio::signal::unix::signal(SignalKind::terminate())?;
    let shutdown = async {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT");
            }
            _ = sigterm.recv() => {
                tracing::info!("Received SIGTERM");
            }
        }
    };
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                if let Err(e) = run_once(&orchestrator, &cli, &mut metrics).await {
                    tracing::error!("Error in report run: {:#}", e);
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received, exiting gracefully...");
                metrics.log_metrics();
                break;
            }
        }
    }

    Ok(())
}

async fn run_once(orchestrator: &ReportOrchestrator, cli: &CliArgs, metrics: &mut RunMetrics) -> Result<()> {
    let run_start = RunMetrics::start_timer();

    let recipients = orchestrator
        .recipients(cli.kind, &cli.users)
        .await
        .context("failed to list report recipients")?;
    if recipients.is_empty() {
        tracing::warn!(report = %cli.kind, "no recipients");
        metrics.finish_run(run_start);
        return Ok(());
    }

    let outcomes = orchestrator.run(cli.kind, &recipients).await;
    for (_, outcome) in &outcomes {
        match outcome {
            Ok(report) => metrics.record_report(report),
            Err(_) => metrics.record_failure(),
        }
    }

    if cli.json {
        println!("{}", render::render_json(&outcomes).context("failed to encode reports")?);
    } else {
        for (recipient, outcome) in &outcomes {
            match outcome {
                Ok(report) => println!("{}", render::render_text(recipient, report)),
                Err(e) => println!("=== {} | {} ===\nreport failed: {}\n", cli.kind.title(), recipient.user_id, e),
            }
        }
    }

    metrics.finish_run(run_start);
    Ok(())
}

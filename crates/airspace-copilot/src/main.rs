//! `airspace` - CLI for airspace-copilot
//!
//! This binary exposes the operations and traveler agents, the flight query
//! tools, and snapshot directory maintenance.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;

use airspace_copilot::agent::{AgentContext, OpsSession, TravelerSession};
use airspace_copilot::cli::{
    render, AlertsCommand, AnalyzeCommand, AskCommand, Cli, Command, ConfigCommand,
    FlightsCommand, IngestCommand, MonitorCommand, OutputFormat, TrackCommand,
};
use airspace_copilot::store::{parse_snapshot, write_snapshot};
use airspace_copilot::{init_logging, llm, Config, Error, FlightQueryService, SnapshotStore};

/// Exit code for errors caused by the request rather than the system.
const EXIT_CLIENT_ERROR: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => match err.downcast_ref::<Error>() {
            Some(e) if e.is_client_error() => {
                eprintln!("{}", e.user_message());
                ExitCode::from(EXIT_CLIENT_ERROR)
            }
            _ => {
                eprintln!("Error: {err:#}");
                ExitCode::FAILURE
            }
        },
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // `config validate` reports problems instead of failing on them.
    let config = match cli.command {
        Command::Config(ConfigCommand::Validate { file }) => {
            handle_config_validate(file.or(cli.config));
            return Ok(());
        }
        _ => Config::load_from(cli.config.clone()).context("failed to load configuration")?,
    };

    match cli.command {
        Command::Analyze(cmd) => handle_analyze(&config, cmd).await,
        Command::Track(cmd) => handle_track(&config, cmd).await,
        Command::Ask(cmd) => handle_ask(&config, cmd).await,
        Command::Alerts(cmd) => handle_alerts(&config, cmd).await,
        Command::Flights(cmd) => handle_flights(&config, cmd).await,
        Command::Ingest(cmd) => handle_ingest(&config, &cmd),
        Command::Monitor(cmd) => handle_monitor(&config, &cmd).await,
        Command::Status(cmd) => handle_status(&config, cmd.json),
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

fn open_store(config: &Config) -> anyhow::Result<Arc<SnapshotStore>> {
    let dir = config.data_dir();
    let store = SnapshotStore::open(&dir)
        .with_context(|| format!("failed to open snapshot directory {}", dir.display()))?;
    Ok(Arc::new(store))
}

fn query_service(config: &Config, store: Arc<SnapshotStore>) -> FlightQueryService {
    FlightQueryService::new(store).with_read_timeout(config.read_timeout())
}

fn agent_context(config: &Config) -> anyhow::Result<AgentContext> {
    let store = open_store(config)?;
    let generator = llm::from_config(&config.llm)?;
    Ok(AgentContext::new(query_service(config, store), generator)
        .with_settings(config.agent_settings()))
}

fn region<'a>(config: &'a Config, requested: Option<&'a str>) -> &'a str {
    requested.unwrap_or(&config.agent.default_region)
}

fn emit<T: Serialize>(
    format: OutputFormat,
    value: &T,
    plain: impl FnOnce(&T) -> String,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(value)?),
        OutputFormat::Plain => print!("{}", plain(value)),
    }
    Ok(())
}

async fn handle_analyze(config: &Config, cmd: AnalyzeCommand) -> anyhow::Result<()> {
    let mut ops = OpsSession::new(agent_context(config)?);
    let report = ops.analyze(region(config, cmd.region.as_deref())).await?;
    emit(cmd.format, &report, render::ops_report)
}

async fn handle_track(config: &Config, cmd: TrackCommand) -> anyhow::Result<()> {
    let mut traveler = TravelerSession::new(agent_context(config)?);
    let report = traveler
        .track(region(config, cmd.region.as_deref()), &cmd.flight)
        .await?;
    emit(cmd.format, &report, render::track_report)
}

async fn handle_ask(config: &Config, cmd: AskCommand) -> anyhow::Result<()> {
    let mut traveler = TravelerSession::new(agent_context(config)?);
    traveler
        .track(region(config, cmd.region.as_deref()), &cmd.flight)
        .await?;
    let answer = traveler.ask(&cmd.question).await?;
    emit(cmd.format, &answer, render::traveler_answer)
}

async fn handle_alerts(config: &Config, cmd: AlertsCommand) -> anyhow::Result<()> {
    let ops = OpsSession::new(agent_context(config)?);
    let report = ops
        .summarize_alerts(region(config, cmd.region.as_deref()))
        .await?;
    emit(cmd.format, &report, render::alerts_report)
}

async fn handle_flights(config: &Config, cmd: FlightsCommand) -> anyhow::Result<()> {
    let queries = query_service(config, open_store(config)?);
    let region_id = region(config, cmd.region.as_deref());
    let view = if cmd.anomalous {
        queries.list_active_alerts(region_id).await?
    } else {
        queries.list_region_snapshot(region_id).await?
    };
    emit(cmd.format, &view, render::region_view)
}

fn handle_ingest(config: &Config, cmd: &IngestCommand) -> anyhow::Result<()> {
    let bytes = std::fs::read(&cmd.file)
        .with_context(|| format!("failed to read {}", cmd.file.display()))?;
    let snapshot = parse_snapshot(&cmd.region, &bytes)?;
    let path = write_snapshot(&config.data_dir(), &snapshot)?;
    println!(
        "Ingested {} flights for {} into {}",
        snapshot.len(),
        snapshot.region_id,
        path.display()
    );
    Ok(())
}

async fn handle_monitor(config: &Config, cmd: &MonitorCommand) -> anyhow::Result<()> {
    let interval = cmd
        .interval
        .filter(|secs| *secs > 0)
        .map_or_else(|| config.refresh_interval(), std::time::Duration::from_secs);

    let watcher = airspace_copilot::SnapshotWatcher::new(open_store(config)?, interval);
    let handle = watcher.handle();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received; stopping");
            handle.stop();
        }
    });

    println!(
        "Watching {} every {}s (Ctrl-C to stop)",
        config.data_dir().display(),
        interval.as_secs()
    );
    watcher.run().await;
    Ok(())
}

fn handle_status(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = open_store(config)?;
    let stats = store.stats();
    let regions = store.regions();
    let llm_ready = config.llm.narratives_enabled();

    if json {
        let status = serde_json::json!({
            "data_dir": config.data_dir(),
            "regions": regions,
            "total_flights": stats.total_flights,
            "newest_capture": stats.newest_capture,
            "text_generation": {
                "enabled": llm_ready,
                "model": config.llm.model,
            },
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("airspace status");
        println!("---------------");
        println!("Data dir:        {}", config.data_dir().display());
        println!("Regions:         {}", stats.regions);
        for region in &regions {
            println!("  - {region}");
        }
        println!("Total flights:   {}", stats.total_flights);
        match stats.newest_capture {
            Some(at) => println!("Newest capture:  {}", at.to_rfc3339()),
            None => println!("Newest capture:  none"),
        }
        if llm_ready {
            println!("Narratives:      {}", config.llm.model);
        } else {
            println!("Narratives:      off (facts only)");
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    let shown = config.redacted();
    match cmd {
        ConfigCommand::Show { json: true } => {
            println!("{}", serde_json::to_string_pretty(&shown)?);
        }
        ConfigCommand::Show { json: false } => {
            println!("Current Configuration");
            println!("=====================");
            println!();
            println!("[store]");
            println!("  data_dir:              {}", shown.data_dir().display());
            println!("  read_timeout_ms:       {}", shown.store.read_timeout_ms);
            println!("  refresh_interval_secs: {}", shown.store.refresh_interval_secs);
            println!();
            println!("[llm]");
            println!("  enabled:               {}", shown.llm.enabled);
            println!("  endpoint:              {}", shown.llm.endpoint);
            println!("  model:                 {}", shown.llm.model);
            println!(
                "  api_key:               {}",
                shown.llm.api_key.as_deref().unwrap_or("(not set)")
            );
            println!("  temperature:           {}", shown.llm.temperature);
            println!("  timeout_secs:          {}", shown.llm.timeout_secs);
            println!();
            println!("[agent]");
            println!("  default_region:        {}", shown.agent.default_region);
            println!("  prompt_flight_limit:   {}", shown.agent.prompt_flight_limit);
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_config_validate(file),
    }
    Ok(())
}

fn handle_config_validate(file: Option<std::path::PathBuf>) {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
}

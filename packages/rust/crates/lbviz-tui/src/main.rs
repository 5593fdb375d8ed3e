//! lbviz CLI: interactive TUI (default) or headless `run` / `send` / `add-target`.
//!
//! Logging: set `RUST_LOG=lbviz=debug` (or `info`, `warn`) to override the
//! default filter. In TUI mode logs go to `--log-file` or are kept at `warn`
//! so they do not tear the screen.

use std::fs::File;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use lbviz_client::{DecisionService, HttpDecisionClient};
use lbviz_sim::RunController;
use lbviz_tui::cli::{Cli, Command};
use lbviz_tui::headless::{self, OutputMode};
use lbviz_tui::{AppState, LbvizSettings, load_settings, run_tui, set_config_home_override};
use lbviz_types::RunConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();
    if let Some(conf_dir) = cli.conf.clone() {
        set_config_home_override(conf_dir);
    }
    let command = cli.command.take().unwrap_or(Command::Tui);
    init_tracing(&cli, &command)?;

    let settings = load_settings();
    let client_config = settings.client_config(cli.base_url.as_deref());
    tracing::info!(base_url = %client_config.base_url, "using decision service");
    let client = HttpDecisionClient::from_config(&client_config)
        .context("failed to build decision service client")?;
    let service: Arc<dyn DecisionService> = Arc::new(client);
    let controller = RunController::start(service, settings.controller_config());

    let outcome = run_command(&controller, &settings, command).await;
    controller.shutdown().await;
    outcome
}

async fn run_command(
    controller: &RunController,
    settings: &LbvizSettings,
    command: Command,
) -> anyhow::Result<()> {
    let mut stdout = io::stdout();
    match command {
        Command::Tui => {
            let state = AppState::new(
                "Load Balancer Visualizer",
                settings.rate_per_second(),
                settings.duration_seconds(),
            );
            run_tui(controller.clone(), state, settings.tick_rate()).await
        }
        Command::Run {
            rate,
            duration,
            continuous,
            algorithm,
            json,
        } => {
            let rate = rate.unwrap_or_else(|| settings.rate_per_second());
            let config = if continuous {
                RunConfig::continuous(rate)?
            } else {
                RunConfig::new(rate, duration.unwrap_or_else(|| settings.duration_seconds()))?
            };
            headless::run_load_test(
                controller,
                config,
                algorithm.map(Into::into),
                output_mode(json),
                &mut stdout,
            )
            .await?;
            stdout.flush()?;
            Ok(())
        }
        Command::Send { count, json } => {
            headless::send_requests(controller, count, output_mode(json), &mut stdout).await
        }
        Command::AddTarget { index } => {
            headless::add_target(controller, index, OutputMode::Text, &mut stdout).await
        }
    }
}

fn output_mode(json: bool) -> OutputMode {
    if json { OutputMode::Json } else { OutputMode::Text }
}

fn init_tracing(cli: &Cli, command: &Command) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "lbviz=debug,lbviz_sim=debug,lbviz_client=debug,lbviz_tui=debug"
        } else if matches!(command, Command::Tui) && cli.log_file.is_none() {
            "lbviz=warn,lbviz_sim=warn,lbviz_client=warn,lbviz_tui=warn"
        } else {
            "lbviz=info,lbviz_sim=info,lbviz_client=info,lbviz_tui=info"
        })
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match &cli.log_file {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to open log file {}", path.display()))?;
            let _ = builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = builder.with_writer(io::stderr).try_init();
        }
    }
    Ok(())
}

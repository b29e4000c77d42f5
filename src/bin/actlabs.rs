use actlabs::cli::{Cli, Command, SetupArgs};
use actlabs::config::Settings;
use actlabs::error::{ActlabsError, Result};
use actlabs::event::{Event, EventHandler};
use actlabs::headless;
use actlabs::infra::{ProvisionEvent, ProvisioningConfig, create_executor, start_provisioning};
use actlabs::setup::{self, SetupAction, SetupApp};
use clap::Parser;
use crossterm::{
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::prelude::*;
use std::io::stdout;
use std::panic;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let Command::Setup(ref args) = cli.command;
    init_logging(cli.log_file.as_deref(), args.interactive);
    info!("Starting actlabs");

    match run(&cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Setup failed: {e}");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// The wizard owns the terminal, so interactive runs only log to a file.
fn init_logging(log_file: Option<&Path>, interactive: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path);
            match file {
                Ok(file) => tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(file)
                    .with_ansi(false)
                    .init(),
                Err(e) => eprintln!("Cannot open log file {}: {e}", path.display()),
            }
        }
        None if !interactive => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init(),
        None => {}
    }
}

async fn run(cli: &Cli) -> Result<()> {
    let settings = match cli.config {
        Some(ref path) => Settings::load_from(path)?,
        None => Settings::load()?,
    };

    match cli.command {
        Command::Setup(ref args) => setup_command(args, &settings, cli.dryrun).await,
    }
}

async fn setup_command(args: &SetupArgs, settings: &Settings, dryrun: bool) -> Result<()> {
    let dryrun = dryrun || settings.general.dryrun;
    let config = args.provisioning_config(settings);

    if !args.interactive {
        let executor = create_executor(dryrun, &settings.endpoints(), tenant_hint(&config));
        let config = headless::run(executor, config, settings.stage_timeout()).await?;
        println!(
            "ACTLabs is set up in resource group '{}' ({}) with storage account '{}'",
            config.resource_group_name,
            config.location,
            config.storage_account()
        );
        return Ok(());
    }

    // Set up panic handler to restore terminal
    let original_hook = panic::take_hook();
    panic::set_hook(Box::new(move |panic_info| {
        let _ = restore_terminal();
        original_hook(panic_info);
    }));

    let mut terminal = setup_terminal()?;
    let result = run_wizard(&mut terminal, config, settings, dryrun).await;
    restore_terminal()?;

    match result {
        Ok(true) => {
            println!("Setup cancelled, nothing was created.");
            Ok(())
        }
        Ok(false) => Ok(()),
        Err(e) => Err(e),
    }
}

fn tenant_hint(config: &ProvisioningConfig) -> Option<String> {
    Some(config.tenant_id.clone()).filter(|t| !t.is_empty())
}

fn setup_terminal() -> Result<Terminal<CrosstermBackend<std::io::Stdout>>> {
    enable_raw_mode().map_err(|e| ActlabsError::Terminal(e.to_string()))?;
    let mut stdout = stdout();
    execute!(stdout, EnterAlternateScreen).map_err(|e| ActlabsError::Terminal(e.to_string()))?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).map_err(|e| ActlabsError::Terminal(e.to_string()))?;
    Ok(terminal)
}

fn restore_terminal() -> Result<()> {
    disable_raw_mode().map_err(|e| ActlabsError::Terminal(e.to_string()))?;
    execute!(stdout(), LeaveAlternateScreen).map_err(|e| ActlabsError::Terminal(e.to_string()))?;
    Ok(())
}

async fn next_progress(rx: &mut Option<UnboundedReceiver<ProvisionEvent>>) -> Option<ProvisionEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Drive the wizard until it exits. Returns true when cancelled from the form.
async fn run_wizard(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    base: ProvisioningConfig,
    settings: &Settings,
    dryrun: bool,
) -> Result<bool> {
    let tick_rate = Duration::from_millis(120);
    let mut events = EventHandler::new(tick_rate);
    let mut app = SetupApp::new(base, dryrun);
    let mut progress = None;
    let mut task = None;

    loop {
        terminal
            .draw(|frame| setup::ui::draw(frame, &app))
            .map_err(|e| ActlabsError::Terminal(e.to_string()))?;

        tokio::select! {
            event = events.next() => match event {
                Some(Event::Key(key)) => {
                    if let Some(SetupAction::StartProvisioning(config)) = app.handle_key(key) {
                        let executor =
                            create_executor(dryrun, &settings.endpoints(), tenant_hint(&config));
                        let (rx, handle) =
                            start_provisioning(executor, config, settings.stage_timeout());
                        progress = Some(rx);
                        task = Some(handle);
                    }
                }
                Some(Event::Resize) => {}
                Some(Event::Tick) => app.tick(),
                None => break,
            },
            event = next_progress(&mut progress) => match event {
                Some(event) => app.handle_provision_event(event),
                None => {
                    progress = None;
                    app.progress_closed();
                }
            },
        }

        if app.should_exit {
            break;
        }
    }

    if let Some(handle) = task {
        handle
            .await
            .map_err(|e| ActlabsError::Aborted(e.to_string()))?;
    }

    match app.take_outcome() {
        Some(Err(e)) => Err(e.into()),
        None if app.was_aborted() => Err(ActlabsError::Aborted(
            "provisioning ended without a result".to_string(),
        )),
        _ => Ok(app.was_cancelled()),
    }
}

//! `glowcap` - CLI for glowfam
//!
//! Drives the capture flow against the file-backed device services and the
//! estimation backend configured for this machine.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::time::Duration;

use anyhow::{bail, Context};
use clap::Parser;
use tracing::{debug, warn};

use glowfam::cli::{Cli, Command, ConfigCommand, HistoryCommand, MeasureCommand, TiltCommand};
use glowfam::platform;
use glowfam::{
    init_logging, CaptureController, Config, CountdownStep, EstimationBackend, FlowSettings,
    HttpBackend, Notification, PressOutcome, SensorSubscription, TiltPolicy,
};

/// How many update intervals to wait for the first tilt reading.
const FIRST_READING_INTERVALS: u32 = 5;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Measure(cmd) => handle_measure(&config, cmd).await,
        Command::History(cmd) => handle_history(&config, &cmd).await,
        Command::Tilt(cmd) => handle_tilt(&config, &cmd).await,
        Command::Config(cmd) => handle_config(&config, cmd),
    }
}

async fn handle_measure(config: &Config, cmd: MeasureCommand) -> anyhow::Result<()> {
    config.validate()?;
    glowfam_device::init().map_err(|e| anyhow::anyhow!("{e}"))?;

    let mut settings = FlowSettings::from_config(config);
    if let Some(facing) = cmd.facing() {
        settings.default_facing = facing;
    }
    let services = platform::file_backed_services(config)?;
    let mut controller = CaptureController::new(settings, cmd.context(), services);

    let screen = controller.screen_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted; closing the capture screen");
            screen.unmount();
        }
    });

    let outcome = run_measurement(&mut controller, config, &cmd).await;
    for note in printable_notes(controller.take_notifications(), cmd.json) {
        println!("{note}");
    }
    outcome
}

/// Success notes worth echoing. Failures reach the user once, as the error
/// returned from `main`.
fn printable_notes(notes: Vec<Notification>, json: bool) -> Vec<Notification> {
    if json {
        return Vec::new();
    }
    notes.into_iter().filter(|note| !note.is_error()).collect()
}

async fn run_measurement(
    controller: &mut CaptureController,
    config: &Config,
    cmd: &MeasureCommand,
) -> anyhow::Result<()> {
    controller.set_reference_input(cmd.reference.as_str());
    controller.submit_reference_height(&cmd.reference)?;

    if let Some(mut updates) = controller.tilt_updates() {
        let wait = config.sensor_interval() * FIRST_READING_INTERVALS;
        if tokio::time::timeout(wait, updates.changed()).await.is_err() {
            debug!("No tilt reading yet");
        }
    }
    match controller.refresh_tilt() {
        Some(indicator) if !cmd.json => println!("Tilt: {indicator}"),
        Some(_) => {}
        None if !cmd.json => println!("Tilt: no reading"),
        None => {}
    }

    if cmd.timer {
        controller.toggle_timer();
    }

    let result = match controller.press_capture().await? {
        PressOutcome::Measured(result) => result,
        PressOutcome::CountdownStarted { seconds } => {
            if !cmd.json {
                println!("Taking the photo in {seconds}s...");
            }
            loop {
                match controller.next_countdown_step().await? {
                    CountdownStep::Tick { remaining } if !cmd.json => println!("{remaining}..."),
                    CountdownStep::Tick { .. } => {}
                    CountdownStep::Measured(result) => break result,
                    CountdownStep::Idle => bail!("capture cancelled"),
                }
            }
        }
    };

    let mut saved_image = None;
    if cmd.save {
        controller.save_measurement().await?;
    }
    if cmd.save_image {
        saved_image = Some(controller.save_image().await?);
    }

    if cmd.json {
        let tilt = controller.session().tilt();
        let output = serde_json::json!({
            "child_height_cm": result.child_height_cm,
            "reference_distance_cm": result.reference_distance_cm,
            "tilt_degrees": tilt.map(|t| t.degrees()),
            "saved": cmd.save,
            "image_path": saved_image,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("{}", result.headline());
        if let Some(distance) = result.reference_distance_cm {
            println!("Distance to the adult: {distance:.0} cm");
        }
        if let Some(path) = saved_image {
            println!("Image: {}", path.display());
        }
    }
    Ok(())
}

async fn handle_history(config: &Config, cmd: &HistoryCommand) -> anyhow::Result<()> {
    config.validate()?;
    let backend = HttpBackend::new(config)?;
    let records = backend.measurement_history(cmd.family).await?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    if records.is_empty() {
        println!("No measurements for family {}.", cmd.family);
        return Ok(());
    }
    println!("{:<8} {:<20} {:>10}", "No", "Recorded", "Height");
    for record in &records {
        let when = record
            .measure_regist_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default();
        let height = record
            .height_cm()
            .map(|h| format!("{h:.1} cm"))
            .unwrap_or_default();
        println!("{:<8} {:<20} {:>10}", record.measure_no, when, height);
    }
    Ok(())
}

async fn handle_tilt(config: &Config, cmd: &TiltCommand) -> anyhow::Result<()> {
    config.validate()?;
    let motion = platform::motion_from_config(config)?;
    let policy = TiltPolicy::from(&config.tilt);
    let subscription = SensorSubscription::acquire(&motion, config.sensor_interval())?;
    let mut updates = subscription.watch();

    for _ in 0..cmd.samples {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    println!("Motion stream ended.");
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => break,
        }
        let reading = *updates.borrow_and_update();
        if let Some(indicator) = policy.indicator(reading) {
            println!("{indicator}  [{}]", indicator.color.hex());
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Backend]");
                println!("  Base URL:           {}", config.backend.base_url);
                println!(
                    "  Upload timeout:     {}s",
                    config.backend.upload_timeout_secs
                );
                println!(
                    "  Request timeout:    {}s",
                    config.backend.request_timeout_secs
                );
                println!();
                println!("[Capture]");
                println!("  Countdown:          {}s", config.capture.countdown_secs);
                println!(
                    "  Sensor interval:    {:?}",
                    Duration::from_millis(config.capture.sensor_interval_ms)
                );
                println!("  JPEG quality:       {}", config.capture.jpeg_quality);
                println!("  Default lens:       {}", config.capture.default_facing);
                println!("  Album:              {}", config.capture.album);
                println!();
                println!("[Tilt]");
                println!(
                    "  Nominal up to:      {}°",
                    config.tilt.nominal_max_degrees
                );
                println!(
                    "  Caution up to:      {}°",
                    config.tilt.caution_max_degrees
                );
                println!();
                println!("[Device]");
                println!("  Photos:             {}", config.photo_dir().display());
                println!("  Media library:      {}", config.media_dir().display());
                println!("  Cache:              {}", config.cache_dir().display());
                match &config.device.motion_replay {
                    Some(path) => println!("  Motion replay:      {}", path.display()),
                    None => println!("  Motion replay:      (upright)"),
                }
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)).and_then(|c| c.validate().map(|()| c)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}

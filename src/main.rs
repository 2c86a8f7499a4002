mod sim;

use anyhow::{Context, Result, bail};
use bytes::Bytes;
use clap::{Args, Parser, Subcommand};
use clap_verbosity_flag::{InfoLevel, Verbosity};
use num_enum::FromPrimitive;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tokio::{signal, time::Instant};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use loxlegacy_lib::actor;
use loxlegacy_lib::fragment::{FragmentCommand, FragmentStream};
use loxlegacy_lib::{DeviceConfig, DeviceType, Frame, LegacyExtension};
use sim::{LogIndicator, LogReset, PrintTransport};

/// Simulator and tooling for legacy CAN extensions.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Optional path to a file to write logs to, in addition to stderr.
    #[arg(short, long, global = true)]
    log_file: Option<PathBuf>,
    #[command(flatten)]
    verbose: Verbosity<InfoLevel>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an extension against a scripted bus and print every frame it sends.
    Simulate {
        #[command(flatten)]
        device: DeviceArgs,
        /// Script of received frames, one `<offset-ms> <candump-frame>` per line.
        #[arg(short, long)]
        script: Option<PathBuf>,
        /// How long to run, in milliseconds.
        #[arg(short, long, default_value_t = 1000)]
        duration_ms: u64,
        /// File to send as a fragmented transfer once the script has been played.
        #[arg(long)]
        send_file: Option<PathBuf>,
        /// Sub-command tag for `--send-file`.
        #[arg(long, value_parser = parse_u8, default_value = "0")]
        send_command: u8,
    },
    /// Print the frames of a fragmented transfer.
    Fragment {
        #[command(flatten)]
        device: DeviceArgs,
        /// Sub-command tag of the transfer.
        #[arg(short, long, value_parser = parse_u8)]
        command: u8,
        /// Payload file.
        #[arg(conflicts_with = "hex", required_unless_present = "hex")]
        file: Option<PathBuf>,
        /// Payload as a hex string.
        #[arg(long)]
        hex: Option<String>,
    },
    /// Report how an extension would classify a candump frame.
    Classify {
        #[command(flatten)]
        device: DeviceArgs,
        /// Frame in candump notation, e.g. `10012345#0400000000000000`.
        frame: String,
    },
}

#[derive(Args, Debug)]
struct DeviceArgs {
    /// JSON device configuration; flags below override its fields.
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long, value_parser = parse_u32)]
    serial: Option<u32>,
    #[arg(long, value_parser = parse_u8)]
    device_type: Option<u8>,
    #[arg(long)]
    hardware_version: Option<u8>,
    #[arg(long, value_parser = parse_u32)]
    firmware_version: Option<u32>,
}

impl DeviceArgs {
    fn resolve(&self) -> Result<DeviceConfig> {
        let mut config = match &self.config {
            Some(path) => DeviceConfig::from_json_file(path)
                .with_context(|| format!("Failed to load device config from {:?}", path))?,
            None => DeviceConfig::new(0, DeviceType::Extension, 1, 1),
        };
        if let Some(serial) = self.serial {
            config.serial = serial;
        }
        if let Some(device_type) = self.device_type {
            config.device_type = device_type;
        }
        if let Some(hardware_version) = self.hardware_version {
            config.hardware_version = hardware_version;
        }
        if let Some(firmware_version) = self.firmware_version {
            config.firmware_version = firmware_version;
        }
        if config.serial == 0 {
            bail!("No serial configured, pass --serial or --config");
        }
        Ok(config)
    }
}

fn parse_u32(s: &str) -> Result<u32, String> {
    match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => s.parse(),
    }
    .map_err(|e| format!("{s:?}: {e}"))
}

fn parse_u8(s: &str) -> Result<u8, String> {
    let value = parse_u32(s)?;
    u8::try_from(value).map_err(|_| format!("{s:?} does not fit in a byte"))
}

fn setup_logging(
    log_file_path: Option<&Path>,
    verbosity: &Verbosity<InfoLevel>,
) -> Result<Option<WorkerGuard>> {
    // stdout carries the frames, logs go to stderr
    let console_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time();

    let (file_layer, guard) = if let Some(path) = log_file_path {
        let log_file = File::create(path).with_context(|| format!("Failed to create log file at: {:?}", path))?;
        let (non_blocking_writer, guard) = tracing_appender::non_blocking(log_file);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(non_blocking_writer)
            .with_ansi(false)
            .with_target(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    let filter = EnvFilter::builder()
        .with_default_directive(verbosity.tracing_level_filter().into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();

    if let Some(path) = log_file_path {
        info!("Logging to file: {:?}", path);
    }

    Ok(guard)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = setup_logging(cli.log_file.as_deref(), &cli.verbose)?;

    let result = match cli.command {
        Command::Simulate {
            device,
            script,
            duration_ms,
            send_file,
            send_command,
        } => {
            let config = device.resolve()?;
            tokio::select! {
                res = simulate(
                    config,
                    script,
                    Duration::from_millis(duration_ms),
                    send_file,
                    send_command,
                ) => res,
                _ = signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down.");
                    Ok(())
                }
            }
        }
        Command::Fragment {
            device,
            command,
            file,
            hex,
        } => fragment(device.resolve()?, command, file, hex),
        Command::Classify { device, frame } => classify(device.resolve()?, &frame),
    };

    if let Err(e) = result {
        error!("{:?}", e);
        process::exit(1);
    }
    Ok(())
}

/// One scripted frame: offset from simulation start, frame.
fn parse_script(text: &str) -> Result<Vec<(Duration, Frame)>> {
    let mut entries = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let (offset, frame) = line
            .split_once(char::is_whitespace)
            .with_context(|| format!("line {}: expected `<offset-ms> <frame>`", n + 1))?;
        let offset: u64 = offset
            .parse()
            .with_context(|| format!("line {}: bad offset {:?}", n + 1, offset))?;
        let frame: Frame = frame
            .trim()
            .parse()
            .with_context(|| format!("line {}: bad frame", n + 1))?;
        entries.push((Duration::from_millis(offset), frame));
    }
    entries.sort_by_key(|(offset, _)| *offset);
    Ok(entries)
}

async fn simulate(
    config: DeviceConfig,
    script: Option<PathBuf>,
    duration: Duration,
    send_file: Option<PathBuf>,
    send_command: u8,
) -> Result<()> {
    let entries = match &script {
        Some(path) => {
            let text = std::fs::read_to_string(path).with_context(|| format!("Failed to read script {:?}", path))?;
            parse_script(&text)?
        }
        None => Vec::new(),
    };
    info!(serial = config.serial, frames = entries.len(), "starting simulation");

    let extension = LegacyExtension::new(config, PrintTransport::default(), LogIndicator, LogReset::default());
    let (handle, task) = actor::spawn(extension);
    let start = Instant::now();

    for (offset, frame) in entries {
        tokio::time::sleep_until(start + offset).await;
        if handle.receive(frame).await.is_err() {
            warn!("extension halted, remaining script skipped");
            break;
        }
    }

    if let Some(path) = send_file {
        let payload = Bytes::from(std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?);
        match handle
            .send_fragmented(FragmentCommand::from_primitive(send_command), payload)
            .await
        {
            Ok(frames) => info!(frames, "fragmented transfer sent"),
            Err(e) => warn!(error = %e, "fragmented transfer not sent"),
        }
    }

    tokio::time::sleep_until(start + duration).await;
    // fails only if a reset already stopped the loop
    let _ = handle.shutdown().await;
    let extension = task.join().await.context("Extension task panicked")?;

    info!(
        state = %extension.state(),
        identified = extension.is_identified(),
        muted = extension.is_muted(),
        update_active = extension.firmware_update_active(),
        halted = extension.is_halted(),
        sent = extension.transport().sent,
        "simulation finished"
    );
    Ok(())
}

fn fragment(config: DeviceConfig, command: u8, file: Option<PathBuf>, hex: Option<String>) -> Result<()> {
    let payload = match (file, hex) {
        (Some(path), _) => std::fs::read(&path).with_context(|| format!("Failed to read {:?}", path))?,
        (None, Some(text)) => hex::decode(text.trim()).context("Invalid hex payload")?,
        (None, None) => bail!("No payload given"),
    };
    let stream = FragmentStream::new(FragmentCommand::from_primitive(command), &payload)?;
    info!(
        tier = %stream.tier(),
        len = payload.len(),
        checksum = stream.header().checksum.get(),
        fragments = stream.len(),
        "fragmenting"
    );
    for fragment in stream {
        println!("{}", Frame::from_device(config.serial, fragment.command).with_data(fragment.data));
    }
    Ok(())
}

fn classify(config: DeviceConfig, text: &str) -> Result<()> {
    let frame: Frame = text.parse()?;
    match config.route().classify(&frame, false) {
        Some(category) => println!("{category}: {} ({})", frame.command(), frame.direction),
        None => println!("not addressed to {:#010X}", config.serial),
    }
    Ok(())
}

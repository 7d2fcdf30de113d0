//! qr_follow - drive a Thymio-II toward a QR marker
//!
//! This program:
//! 1. Loads calibration and runtime configuration (file + env)
//! 2. Connects to the Aseba network over D-Bus and lists its nodes
//! 3. Opens the camera (or replays still images)
//! 4. Steers toward the first QR marker in view on every tick
//! 5. On Ctrl-C, stops the motors and releases the camera

use anyhow::Result;
use clap::{ArgAction, Parser};
use std::path::{Path, PathBuf};

use qr_follower::{
    ActuationSink, ControlLoop, FollowerConfig, FrameSource, LoggingSink, QrBackend,
    ShutdownSignal, StillConfig, StillSource, V4l2Config, V4l2Source,
};

const DEFAULT_OUTPUT: &str = "barcodes.csv";

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Path to output CSV file containing barcodes (accepted, not written).
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,
    /// Use the system bus instead of the session bus.
    #[arg(
        short = 's',
        long,
        action = ArgAction::Set,
        num_args = 0..=1,
        default_value_t = false,
        default_missing_value = "true"
    )]
    systemdbus: bool,
    /// JSON configuration file.
    #[arg(long, env = "QR_FOLLOW_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,
    /// Camera device node (overrides the configuration).
    #[arg(long, value_name = "PATH")]
    device: Option<String>,
    /// Replay images from a file or directory instead of the camera.
    #[arg(long, value_name = "PATH", conflicts_with = "device")]
    stills: Option<PathBuf>,
    /// Log motor commands instead of sending them to the robot.
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    if args.output != Path::new(DEFAULT_OUTPUT) {
        log::warn!(
            "--output {} is accepted for compatibility; no file is written",
            args.output.display()
        );
    }

    let mut config = FollowerConfig::load(args.config.as_deref())?;
    if let Some(device) = &args.device {
        config.camera.device = device.clone();
    }

    let sink = open_sink(&args, &config)?;

    let source: Box<dyn FrameSource> = match &args.stills {
        Some(path) => Box::new(StillSource::new(StillConfig {
            path: path.clone(),
            looping: true,
        })),
        None => Box::new(V4l2Source::new(V4l2Config {
            device: config.camera.device.clone(),
            target_fps: config.camera.target_fps,
            width: config.calibration.frame_width_px,
            height: config.calibration.frame_height_px,
        })?),
    };

    let shutdown = ShutdownSignal::install_ctrlc()?;
    let mut control = ControlLoop::new(
        source,
        QrBackend::new(),
        sink,
        config.calibration,
        config.control,
    )?;

    log::info!(
        "following QR markers: standoff={}cm max_speed={} working resolution {}x{}",
        config.calibration.target_distance_cm,
        config.calibration.max_speed,
        config.calibration.frame_width_px,
        config.calibration.frame_height_px
    );
    let stats = control.run(&shutdown)?;
    log::info!(
        "qr_follow exiting after {} ticks ({} steered, {} idle)",
        stats.ticks,
        stats.steered,
        stats.idle
    );
    Ok(())
}

fn open_sink(args: &Args, config: &FollowerConfig) -> Result<Box<dyn ActuationSink>> {
    if args.dry_run {
        log::info!("dry run: motor commands are logged, not sent");
        return Ok(Box::new(LoggingSink::new()));
    }

    #[cfg(feature = "aseba-dbus")]
    {
        use qr_follower::{AsebaNetwork, BusKind};

        let bus = if args.systemdbus {
            BusKind::System
        } else {
            BusKind::Session
        };
        let network = AsebaNetwork::connect(bus, config.aseba.clone())?;
        let nodes = network.nodes_list()?;
        log::info!("aseba nodes: {:?}", nodes);
        if !nodes.iter().any(|node| node == &config.aseba.node) {
            log::warn!(
                "node {} is not on the aseba network; is asebamedulla running?",
                config.aseba.node
            );
        }
        Ok(Box::new(network))
    }

    #[cfg(not(feature = "aseba-dbus"))]
    {
        let _ = config;
        anyhow::bail!("sending motor commands requires the aseba-dbus feature (or use --dry-run)")
    }
}

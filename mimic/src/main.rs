mod camera;
mod display;

use anyhow::{Context, Result};
use log::{error, info, warn};
use mimic_core::catalog::list_images;
use mimic_core::{ExpressionSession, MimicConfig, OverlayLayout, SnapshotWriter};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use camera::{Camera, VideoSource};
use display::Window;

/// Command line overrides, given as `key=value` pairs or bare flags.
#[derive(Debug, Clone, Default)]
struct CliArgs {
    config_file: Option<PathBuf>,
    catalog: Option<PathBuf>,
    images: Option<PathBuf>,
    endpoint: Option<String>,
    cadence: Option<u64>,
    device: Option<String>,
    debug: bool,
    background: bool,
    inline: bool,
    unknown: Vec<String>,
}

impl CliArgs {
    fn apply(&self, config: &mut MimicConfig) {
        if let Some(ref path) = self.catalog {
            config.catalog.mapping_file = path.clone();
        }
        if let Some(ref dir) = self.images {
            config.catalog.image_dir = dir.clone();
        }
        if let Some(ref endpoint) = self.endpoint {
            config.classifier.endpoint = endpoint.clone();
        }
        if let Some(cadence) = self.cadence {
            config.classifier.cadence = cadence;
        }
        if self.background {
            config.classifier.background = true;
        }
        if self.inline {
            config.display.layout = OverlayLayout::Inline;
        }
    }
}

fn parse_args<I: IntoIterator<Item = String>>(args: I) -> Result<CliArgs> {
    let mut cli = CliArgs::default();

    for arg in args {
        if let Some(value) = arg.strip_prefix("config=") {
            cli.config_file = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("catalog=") {
            cli.catalog = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("images=") {
            cli.images = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("endpoint=") {
            cli.endpoint = Some(value.to_string());
        } else if let Some(value) = arg.strip_prefix("cadence=") {
            cli.cadence = Some(value.parse().with_context(|| format!("Invalid cadence '{}'", value))?);
        } else if let Some(value) = arg.strip_prefix("device=") {
            cli.device = Some(value.to_string());
        } else if arg == "debug" {
            cli.debug = true;
        } else if arg == "background" {
            cli.background = true;
        } else if arg == "inline" {
            cli.inline = true;
        } else {
            cli.unknown.push(arg);
        }
    }

    Ok(cli)
}

/// A number selects a camera index, anything else is a video file.
fn video_source(device: Option<&str>, default_index: i32) -> VideoSource {
    match device {
        Some(d) => match d.parse::<i32>() {
            Ok(index) => VideoSource::Camera(index),
            Err(_) => VideoSource::File(d.to_string()),
        },
        None => VideoSource::Camera(default_index),
    }
}

fn check_image_dir(dir: &Path) {
    if !dir.is_dir() {
        warn!("Image directory {:?} not found; reference images will be placeholders", dir);
        return;
    }
    match list_images(dir).len() {
        0 => warn!("No images found in {:?}", dir),
        n => info!("Found {} image(s) in {:?}", n, dir),
    }
}

fn run(cli: &CliArgs) -> Result<()> {
    for arg in &cli.unknown {
        warn!("Ignoring unknown argument '{}'", arg);
    }

    let config_path = cli.config_file.clone().unwrap_or_else(MimicConfig::default_path);
    let mut config = MimicConfig::load(&config_path)
        .with_context(|| format!("Failed to load config {:?}", config_path))?;
    cli.apply(&mut config);
    config.validate().context("Invalid command line override")?;

    check_image_dir(&config.catalog.image_dir);
    let mut session = ExpressionSession::from_config(&config)?;

    let source = video_source(cli.device.as_deref(), config.capture.device_index);
    let mut camera = Camera::open(&source, config.capture.frame_width, config.capture.frame_height)?;
    let mut window = Window::open(&config.display.window_title)?;
    let mut snapshots = SnapshotWriter::new(&config.output.dir, &config.output.prefix);

    mimic_core::run(&mut camera, &mut window, &mut session, &mut snapshots)?;
    Ok(())
}

fn main() -> ExitCode {
    let cli = match parse_args(std::env::args().skip(1)) {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let default_filter = if cli.debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter)).init();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

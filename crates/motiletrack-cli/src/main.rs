//! motiletrack CLI — batch motility analysis over directories of image
//! stacks.
//!
//! Each subdirectory of the input directory is one time-lapse stack: its
//! image files, sorted by name, are the frames. Results land as one
//! `tracks_<name>.csv` per stack in the output directory; rerunning with the
//! same output directory resumes where the previous run stopped.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use image::DynamicImage;
use tracing::info;

use motiletrack::{BatchRunner, FramePlane, FrameStack, StackSource, TrackingConfig, TrackingError};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

/// Frame file extensions recognized inside a stack directory.
const FRAME_EXTENSIONS: &[&str] = &["tif", "tiff", "png", "jpg", "jpeg", "bmp"];

#[derive(Parser)]
#[command(name = "motiletrack")]
#[command(about = "Track moving objects in time-lapse microscopy and classify their motility")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process every stack under a directory.
    Run(CliRunArgs),

    /// Print the effective configuration as JSON and exit.
    ConfigInfo {
        /// Optional `.properties` configuration file.
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Debug, Clone, Args)]
struct CliRunArgs {
    /// Input directory; every subdirectory holding image files is one stack.
    #[arg(long)]
    input: PathBuf,

    /// Output directory for the per-stack CSV tables. Defaults to
    /// `<input>/results`.
    #[arg(long)]
    out: Option<PathBuf>,

    /// `.properties` configuration file; omitted keys keep their defaults.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Physical pixel size in µm/pixel.
    #[arg(long, default_value = "1.0")]
    pixel_size_um: f64,

    /// Time between consecutive frames in seconds.
    #[arg(long, default_value = "1.0")]
    frame_interval_s: f64,

    /// Rolling background subtraction radius in pixels; 0 disables it.
    /// Overrides BACKGROUND_SUBTRACTION_RADIUS from the config file.
    /// [default: 50 when no config file is given]
    #[arg(long)]
    background_radius: Option<u32>,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run(args) => run_batch(&args),
        Commands::ConfigInfo { config } => run_config_info(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> Result<TrackingConfig, TrackingError> {
    match path {
        Some(p) => TrackingConfig::from_properties_file(p),
        None => {
            // stand-alone CLI runs get background subtraction by default;
            // config files opt out explicitly
            let mut config = TrackingConfig::default();
            config.background_radius_px = 50;
            Ok(config)
        }
    }
}

fn run_config_info(config_path: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

fn run_batch(args: &CliRunArgs) -> CliResult<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(radius) = args.background_radius {
        config.background_radius_px = radius;
    }

    let source = DirStackSource::new(&args.input, args.pixel_size_um, args.frame_interval_s)?;
    let out_dir = args
        .out
        .clone()
        .unwrap_or_else(|| args.input.join("results"));

    let runner = BatchRunner::new(source, &out_dir, config);
    let token = runner.cancel_token();
    ctrlc_handler(token);
    let report = runner.run()?;

    info!(
        completed = report.completed(),
        skipped = report.skipped(),
        failed = report.failed(),
        "done"
    );
    if report.failed() > 0 {
        return Err(format!("{} stack(s) failed; see log", report.failed()).into());
    }
    Ok(())
}

/// Ctrl-C requests a clean stop: the in-flight stack finishes and its table
/// is written before the run ends.
fn ctrlc_handler(token: motiletrack::CancelToken) {
    let result = ctrlc::set_handler(move || {
        info!("interrupt received, finishing current stack");
        token.cancel();
    });
    if result.is_err() {
        tracing::warn!("could not install interrupt handler; Ctrl-C aborts immediately");
    }
}

/// Stack provider over a directory tree: one subdirectory per stack, one
/// image file per frame, frame order by file name.
struct DirStackSource {
    root: PathBuf,
    names: Vec<String>,
    pixel_size_um: f64,
    frame_interval_s: f64,
}

impl DirStackSource {
    fn new(root: &Path, pixel_size_um: f64, frame_interval_s: f64) -> Result<Self, TrackingError> {
        let mut names = Vec::new();
        let entries = std::fs::read_dir(root).map_err(|e| {
            TrackingError::Precondition(format!("cannot read {}: {}", root.display(), e))
        })?;
        for entry in entries {
            let entry = entry.map_err(|e| {
                TrackingError::Precondition(format!("cannot read {}: {}", root.display(), e))
            })?;
            if !entry.path().is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                let files = frame_files(&entry.path()).map_err(|e| {
                    TrackingError::Precondition(format!(
                        "cannot read {}: {}",
                        entry.path().display(),
                        e
                    ))
                })?;
                if !files.is_empty() {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        if names.is_empty() {
            return Err(TrackingError::Precondition(format!(
                "no stack directories with image files under {}",
                root.display()
            )));
        }
        Ok(Self {
            root: root.to_path_buf(),
            names,
            pixel_size_um,
            frame_interval_s,
        })
    }
}

impl StackSource for DirStackSource {
    fn entries(&self) -> Vec<String> {
        self.names.clone()
    }

    fn load(&self, name: &str) -> Result<FrameStack, TrackingError> {
        let dir = self.root.join(name);
        // a stack turning unreadable mid-batch fails that image, not the run
        let files = frame_files(&dir).map_err(|e| TrackingError::InvalidFrame {
            frame: 0,
            reason: format!("cannot read {}: {}", dir.display(), e),
        })?;
        let mut planes = Vec::with_capacity(files.len());
        for (frame, path) in files.iter().enumerate() {
            let img = image::open(path).map_err(|e| TrackingError::InvalidFrame {
                frame,
                reason: format!("cannot decode {}: {}", path.display(), e),
            })?;
            planes.push(decode_plane(img));
        }
        Ok(FrameStack::new(
            planes,
            self.pixel_size_um,
            self.frame_interval_s,
        ))
    }
}

/// Image files of one stack directory, sorted by file name. Callers decide
/// whether a read failure is fatal for the batch or for one image.
fn frame_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_frame = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| FRAME_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
            .unwrap_or(false);
        if path.is_file() && is_frame {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Convert a decoded image to a grayscale f32 plane in native intensity
/// units (0..255 for 8-bit sources, 0..65535 for 16-bit).
///
/// The float conversions of the decoder normalize to [0, 1]; scaling back up
/// keeps quality thresholds comparable to what the acquisition software
/// reports.
fn decode_plane(img: DynamicImage) -> FramePlane {
    let bits = img.color().bits_per_pixel() / img.color().channel_count() as u16;
    let scale: f32 = match bits {
        8 => 255.0,
        16 => 65535.0,
        _ => 1.0,
    };
    let mut plane = img.to_luma32f();
    if scale != 1.0 {
        for pixel in plane.pixels_mut() {
            pixel[0] *= scale;
        }
    }
    plane
}

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, bail};
use clap::{Parser, ValueEnum};
use log::{info, warn};

use dicom_mpr::{
    Interpolation, Orientation, PRESETS, SliceSource, SortBy, VolumeLoader, WindowSpec,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Plane {
    Axial,
    Coronal,
    Sagittal,
}

impl From<Plane> for Orientation {
    fn from(plane: Plane) -> Self {
        match plane {
            Plane::Axial => Orientation::Axial,
            Plane::Coronal => Orientation::Coronal,
            Plane::Sagittal => Orientation::Sagittal,
        }
    }
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Quality {
    Nearest,
    Linear,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Order {
    Position,
    Instance,
    Input,
}

/// Render one windowed slice of a DICOM series.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Cli {
    /// Directory holding the .dcm files of one series
    #[arg(required_unless_present = "list_presets")]
    input: Option<PathBuf>,

    /// Plane to cut
    #[arg(long, value_enum, default_value = "axial")]
    plane: Plane,

    /// Index along the plane's fixed axis; defaults to the middle
    #[arg(long)]
    position: Option<f64>,

    #[arg(long, value_enum, default_value = "linear")]
    interpolation: Quality,

    /// Window preset name (see --list-presets)
    #[arg(long, conflicts_with_all = ["center", "width"])]
    preset: Option<String>,

    #[arg(long, requires = "width", allow_hyphen_values = true)]
    center: Option<f64>,

    #[arg(long, requires = "center")]
    width: Option<f64>,

    /// Resample coronal and sagittal slices to square pixels
    #[arg(long)]
    aspect: bool,

    #[arg(long, value_enum, default_value = "position")]
    sort: Order,

    #[arg(short, long, default_value = "slice.png")]
    output: PathBuf,

    /// Print the window presets and exit
    #[arg(long)]
    list_presets: bool,
}

fn read_sources(dir: &Path) -> Result<Vec<SliceSource>> {
    let mut paths: Vec<_> = fs::read_dir(dir)
        .with_context(|| format!("Failed to read directory {}", dir.display()))?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("dcm"))
        })
        .collect();
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let bytes = fs::read(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            Ok(SliceSource::new(path.display().to_string(), bytes))
        })
        .collect()
}

async fn run(cli: Cli) -> Result<()> {
    if cli.list_presets {
        for preset in PRESETS {
            println!(
                "{:<12} center {:>6} width {:>6}",
                preset.name, preset.window.center, preset.window.width
            );
        }
        return Ok(());
    }

    let Some(input) = cli.input.as_deref() else {
        bail!("No input directory given");
    };
    let sources = read_sources(input)?;
    if sources.is_empty() {
        bail!("No .dcm files in {}", input.display());
    }
    let sort_by = match cli.sort {
        Order::Position => SortBy::ImagePositionPatient,
        Order::Instance => SortBy::InstanceNumber,
        Order::Input => SortBy::None,
    };

    let report = VolumeLoader::load_async(sources, sort_by).await?;
    for failure in &report.failures {
        warn!("skipped {}: {}", failure.name, failure.error);
    }
    let volume = report.volume;

    let window = match (&cli.preset, cli.center, cli.width) {
        (Some(name), _, _) => {
            WindowSpec::preset(name).with_context(|| format!("Unknown window preset '{name}'"))?
        }
        (None, Some(center), Some(width)) => WindowSpec::new(center, width),
        _ => volume.default_window().unwrap_or_default(),
    };

    let orientation = Orientation::from(cli.plane);
    let position = cli
        .position
        .unwrap_or((volume.axis_len(orientation) / 2) as f64);
    let interpolation = match cli.interpolation {
        Quality::Nearest => Interpolation::Nearest,
        Quality::Linear => Interpolation::Linear,
    };

    let image = volume
        .render(orientation, position, interpolation, window, cli.aspect)
        .context("Slice buffer does not match its dimensions")?;
    image
        .save(&cli.output)
        .with_context(|| format!("Failed to save image to {}", cli.output.display()))?;
    info!(
        "{} slice at {} ({}x{}) with window {}/{} saved to {}",
        orientation,
        position,
        image.width(),
        image.height(),
        window.center,
        window.width,
        cli.output.display()
    );
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    run(Cli::parse()).await
}

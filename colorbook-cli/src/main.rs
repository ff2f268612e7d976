use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colorbook_core::exif_orientation::decode_upright;
use colorbook_core::{
    flood_fill, generate_line_art, CancelFlag, DirectorySource, LineArtParams, PixelBuffer,
    RasterSurface, Session,
};
use image::{DynamicImage, ImageFormat, RgbaImage};
use std::io::Cursor;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(
    name = "colorbook",
    about = "Turn photos into coloring-book line art and fill regions"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Line-art tuning shared by every generating subcommand.
#[derive(Args, Clone)]
struct TuningArgs {
    /// Named preset: standard, bold, fine, classic
    #[arg(long)]
    preset: Option<String>,

    /// JSON file with line-art parameters (applied on top of the preset)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Contrast amount, -255..255 (0 = unchanged)
    #[arg(long, allow_hyphen_values = true)]
    contrast: Option<f32>,

    /// Edge magnitudes at or below this stay white
    #[arg(long)]
    threshold: Option<f32>,

    /// Edge strength multiplier
    #[arg(long)]
    multiplier: Option<f32>,

    /// Skip the 3x3 smoothing pass
    #[arg(long)]
    no_smoothing: bool,

    /// Fit the photo into this width
    #[arg(long)]
    max_width: Option<u32>,

    /// Fit the photo into this height
    #[arg(long)]
    max_height: Option<u32>,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert a single photo to line art
    LineArt {
        /// Input image path
        input: PathBuf,

        /// Output image path (default: input_<preset>.png)
        output: Option<PathBuf>,

        #[command(flatten)]
        tuning: TuningArgs,
    },

    /// Flood fill a region of an image
    Fill {
        /// Input image path
        input: PathBuf,

        /// Start column
        x: u32,

        /// Start row
        y: u32,

        /// Fill color as 6 hex digits (e.g. "#ff8800")
        color: String,

        /// Output image path (default: input_filled.png)
        output: Option<PathBuf>,
    },

    /// Convert every photo in a directory
    Batch {
        /// Input directory
        input_dir: PathBuf,

        /// Output directory (default: input_dir/line_art)
        output_dir: Option<PathBuf>,

        /// Run only a specific preset (default: all presets)
        #[arg(long)]
        preset: Option<String>,

        /// Number of parallel jobs (default: num_cpus)
        #[arg(long, short)]
        jobs: Option<usize>,

        /// Reprocess even if output is up-to-date
        #[arg(long)]
        force: bool,
    },

    /// Replay a coloring session: generate from a photo directory, fill, undo
    Session {
        /// Directory of photos, one subdirectory per category
        photos: PathBuf,

        /// Category subdirectory to pick from (default: photos dir itself)
        #[arg(long, default_value = "")]
        category: String,

        /// Canvas width
        #[arg(long, default_value_t = 800)]
        width: u32,

        /// Canvas height
        #[arg(long, default_value_t = 600)]
        height: u32,

        /// Fill operations as "x,y,#rrggbb" (repeatable, applied in order)
        #[arg(long = "fill")]
        fills: Vec<String>,

        /// Undo this many steps after the fills
        #[arg(long, default_value_t = 0)]
        undo: usize,

        /// Output image path
        #[arg(long, short, default_value = "session.png")]
        output: PathBuf,

        #[command(flatten)]
        tuning: TuningArgs,
    },
}

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp"];

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
        .unwrap_or(false)
}

const FILLED_SUFFIX: &str = "filled";

fn is_generated_file(path: &Path) -> bool {
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
    LineArtParams::all_presets()
        .iter()
        .map(|(name, _)| *name)
        .chain(std::iter::once(FILLED_SUFFIX))
        .any(|name| stem.ends_with(&format!("_{}", name)))
}

fn default_output_path(input: &Path, suffix: &str) -> Result<PathBuf> {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| anyhow!("cannot derive an output name from {}", input.display()))?;
    let parent = input.parent().unwrap_or(Path::new("."));
    Ok(parent.join(format!("{}_{}.png", stem, suffix)))
}

fn resolve_params(tuning: &TuningArgs) -> Result<(String, LineArtParams)> {
    let (name, mut params) = match tuning.preset.as_deref() {
        Some(name) => {
            let p = LineArtParams::from_preset(name).ok_or_else(|| {
                let available: Vec<_> = LineArtParams::all_presets().iter().map(|(n, _)| *n).collect();
                anyhow!("Unknown preset '{}'. Available: {}", name, available.join(", "))
            })?;
            (name.to_string(), p)
        }
        None => ("standard".to_string(), LineArtParams::standard()),
    };

    if let Some(path) = &tuning.config {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        params = merge_json(&params, &text)
            .with_context(|| format!("parsing config {}", path.display()))?;
    }

    if let Some(v) = tuning.contrast {
        params.contrast = v;
    }
    if let Some(v) = tuning.threshold {
        params.threshold = v;
    }
    if let Some(v) = tuning.multiplier {
        params.multiplier = v;
    }
    if tuning.no_smoothing {
        params.smoothing = false;
    }
    if tuning.max_width.is_some() {
        params.max_width = tuning.max_width;
    }
    if tuning.max_height.is_some() {
        params.max_height = tuning.max_height;
    }

    params.validate()?;
    Ok((name, params))
}

/// Overlay the keys present in a JSON object onto `base`.
fn merge_json(base: &LineArtParams, text: &str) -> Result<LineArtParams> {
    let mut value = serde_json::to_value(base)?;
    let patch: serde_json::Value = serde_json::from_str(text)?;
    let patch = patch
        .as_object()
        .ok_or_else(|| anyhow!("config must be a JSON object"))?;
    if let Some(obj) = value.as_object_mut() {
        for (k, v) in patch {
            obj.insert(k.clone(), v.clone());
        }
    }
    Ok(serde_json::from_value(value)?)
}

fn parse_fill(arg: &str) -> Result<(u32, u32, String)> {
    let parts: Vec<&str> = arg.split(',').map(str::trim).collect();
    if parts.len() != 3 {
        bail!("--fill expects \"x,y,#rrggbb\", got '{}'", arg);
    }
    let x = parts[0].parse().with_context(|| format!("bad x in '{}'", arg))?;
    let y = parts[1].parse().with_context(|| format!("bad y in '{}'", arg))?;
    Ok((x, y, parts[2].to_string()))
}

fn load_photo(path: &Path) -> Result<RgbaImage> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let img = decode_upright(&bytes).with_context(|| format!("decoding {}", path.display()))?;
    Ok(img.to_rgba8())
}

/// Encode for the extension of `path` (PNG when unknown), then write.
///
/// Nothing touches `path` until encoding succeeded.
fn save_buffer(buf: PixelBuffer, path: &Path) -> Result<()> {
    let img = DynamicImage::ImageRgba8(buf.into());
    let format = ImageFormat::from_path(path).unwrap_or(ImageFormat::Png);
    let mut encoded = Vec::new();
    let mut cursor = Cursor::new(&mut encoded);
    match format {
        // No alpha in JPEG.
        ImageFormat::Jpeg => img.to_rgb8().write_to(&mut cursor, format),
        _ => img.write_to(&mut cursor, format),
    }
    .with_context(|| format!("encoding {}", path.display()))?;
    std::fs::write(path, encoded).with_context(|| format!("writing {}", path.display()))
}

fn cmd_line_art(input: &Path, output: Option<&Path>, tuning: &TuningArgs) -> Result<()> {
    let (preset_name, params) = resolve_params(tuning)?;
    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(input, &preset_name)?,
    };

    eprintln!("Processing: {} -> {}", input.display(), output_path.display());
    eprintln!("Preset: {}", preset_name);

    let photo = load_photo(input)?;
    let art = generate_line_art(&photo, &params)?;
    save_buffer(art, &output_path)?;
    eprintln!("Done: {}", output_path.display());
    Ok(())
}

fn cmd_fill(input: &Path, x: u32, y: u32, color: &str, output: Option<&Path>) -> Result<()> {
    let output_path = match output {
        Some(p) => p.to_path_buf(),
        None => default_output_path(input, FILLED_SUFFIX)?,
    };
    let mut buf = PixelBuffer::from(load_photo(input)?);
    let report = flood_fill(&mut buf, x, y, color)?;
    save_buffer(buf, &output_path)?;
    eprintln!(
        "Filled {} pixels at ({}, {}) with {} -> {}",
        report.filled,
        x,
        y,
        color,
        output_path.display()
    );
    Ok(())
}

fn cmd_batch(
    input_dir: &Path,
    output_dir: &Path,
    presets: Vec<(String, LineArtParams)>,
    jobs: Option<usize>,
    force: bool,
) -> Result<()> {
    let mut images: Vec<PathBuf> = std::fs::read_dir(input_dir)
        .with_context(|| format!("listing {}", input_dir.display()))?
        .filter_map(|entry| entry.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_image_file(p) && !is_generated_file(p))
        .collect();
    images.sort();

    if images.is_empty() {
        eprintln!("No source images found in {}", input_dir.display());
        return Ok(());
    }

    eprintln!("Found {} source images, {} presets", images.len(), presets.len());
    std::fs::create_dir_all(output_dir)?;

    if let Some(n) = jobs {
        if let Err(e) = rayon::ThreadPoolBuilder::new().num_threads(n).build_global() {
            warn!("could not size thread pool: {}", e);
        }
    }

    let mut work: Vec<(PathBuf, PathBuf, String, LineArtParams)> = Vec::new();
    let mut skipped = 0usize;
    for image_path in &images {
        let Some(stem) = image_path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        for (preset_name, params) in &presets {
            let output_path = output_dir.join(format!("{}_{}.png", stem, preset_name));
            if !force && is_up_to_date(image_path, &output_path) {
                skipped += 1;
                continue;
            }
            work.push((image_path.clone(), output_path, preset_name.clone(), params.clone()));
        }
    }

    eprintln!("To process: {} outputs, skipping {} up-to-date", work.len(), skipped);

    let errors: Vec<String> = work
        .par_iter()
        .filter_map(|(image_path, output_path, preset_name, params)| {
            eprintln!("  Applying [{}] -> {}", preset_name, output_path.display());
            let result = load_photo(image_path)
                .and_then(|photo| Ok(generate_line_art(&photo, params)?))
                .and_then(|art| save_buffer(art, output_path));
            match result {
                Ok(()) => None,
                Err(e) => {
                    let msg = format!("{} [{}]: {:#}", image_path.display(), preset_name, e);
                    eprintln!("  Error: {}", msg);
                    Some(msg)
                }
            }
        })
        .collect();

    eprintln!(
        "\nDone! Processed: {}, Skipped: {}, Errors: {}",
        work.len() - errors.len(),
        skipped,
        errors.len()
    );
    for e in &errors {
        eprintln!("  {}", e);
    }
    Ok(())
}

fn is_up_to_date(input: &Path, output: &Path) -> bool {
    let modified = |p: &Path| p.metadata().and_then(|m| m.modified()).ok();
    match (modified(input), modified(output)) {
        (Some(in_time), Some(out_time)) => out_time > in_time,
        _ => false,
    }
}

#[allow(clippy::too_many_arguments)]
fn cmd_session(
    photos: &Path,
    category: &str,
    width: u32,
    height: u32,
    fills: &[String],
    undo: usize,
    output: &Path,
    tuning: &TuningArgs,
) -> Result<()> {
    let (_, params) = resolve_params(tuning)?;
    let fills = fills
        .iter()
        .map(|f| parse_fill(f))
        .collect::<Result<Vec<_>>>()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let source = DirectorySource::new(photos);
    let mut session = Session::new(RasterSurface::new(width, height)).with_params(params);

    runtime.block_on(session.generate(&source, category, &CancelFlag::new()))?;
    info!(category, "line art generated");

    for (x, y, color) in &fills {
        let report = session.fill_at_hex(*x, *y, color)?;
        eprintln!("Filled {} pixels at ({}, {}) with {}", report.filled, x, y, color);
    }

    for _ in 0..undo {
        if !session.undo()? {
            eprintln!("Nothing left to undo");
            break;
        }
    }

    let png = session.surface().to_png()?;
    std::fs::write(output, png).with_context(|| format!("writing {}", output.display()))?;
    eprintln!(
        "Done: {} ({} undo steps left)",
        output.display(),
        session.history().len()
    );
    Ok(())
}

fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colorbook=info,colorbook_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().without_time().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::LineArt {
            input,
            output,
            tuning,
        } => cmd_line_art(&input, output.as_deref(), &tuning)?,

        Commands::Fill {
            input,
            x,
            y,
            color,
            output,
        } => cmd_fill(&input, x, y, &color, output.as_deref())?,

        Commands::Batch {
            input_dir,
            output_dir,
            preset,
            jobs,
            force,
        } => {
            let output = output_dir.unwrap_or_else(|| input_dir.join("line_art"));
            let presets: Vec<(String, LineArtParams)> = match preset {
                Some(name) => {
                    let p = LineArtParams::from_preset(&name)
                        .ok_or_else(|| anyhow!("Unknown preset: {}", name))?;
                    vec![(name, p)]
                }
                None => LineArtParams::all_presets()
                    .into_iter()
                    .map(|(name, p)| (name.to_string(), p))
                    .collect(),
            };
            cmd_batch(&input_dir, &output, presets, jobs, force)?;
        }

        Commands::Session {
            photos,
            category,
            width,
            height,
            fills,
            undo,
            output,
            tuning,
        } => cmd_session(&photos, &category, width, height, &fills, undo, &output, &tuning)?,
    }

    Ok(())
}

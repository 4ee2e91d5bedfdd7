use clap::{Parser, Subcommand};
use pressroom::config::{self, EditorConfig};
use pressroom::imaging::{AspectRatio, CropRect, OutputFormat};
use pressroom::ingest::{IngestedFile, collect_image_paths};
use pressroom::item::{Axis, ItemId, Setting};
use pressroom::registry::{EditorEvent, Registry};
use pressroom::{logging, output};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Settings applied to every loaded image before encoding.
#[derive(clap::Args, Clone, Debug)]
struct SettingsArgs {
    /// Quality 1-100 (values outside are clamped)
    #[arg(long, short)]
    quality: Option<u32>,

    /// Output width in pixels; height follows the aspect ratio unless given
    #[arg(long)]
    width: Option<String>,

    /// Output height in pixels; width follows the aspect ratio unless given
    #[arg(long)]
    height: Option<String>,

    /// Output format, overriding [encoder].format
    #[arg(long, value_parser = parse_format)]
    format: Option<OutputFormat>,

    /// Crop rectangle applied before encoding, as X,Y,WIDTH,HEIGHT
    #[arg(long, value_parser = parse_crop)]
    crop: Option<CropRect>,

    /// Aspect ratio the crop is constrained to: free, a preset like 16:9, or any W:H
    #[arg(long, value_parser = parse_aspect)]
    aspect: Option<AspectRatio>,
}

#[derive(Parser)]
#[command(name = "pressroom")]
#[command(about = "Recompress, resize and crop images")]
#[command(long_about = "\
Recompress, resize and crop images

Loads one or more images, applies quality, size and crop settings, and
writes re-encoded artifacts (AVIF by default).

Sizing:
  --width 800            height follows the original aspect ratio
  --width 800 --height 800  exact size, aspect ratio not preserved
  neither                original size

Cropping happens first and replaces the original:
  --crop 100,50,1200,800       exact rectangle (clamped to the image)
  --aspect 16:9                largest centered 16:9 rectangle
  --crop 0,0,900,900 --aspect 1:1  rectangle shrunk to 1:1 around its center

Run 'pressroom gen-config' to generate a documented pressroom.toml.")]
#[command(version)]
struct Cli {
    /// Config file (missing file means stock defaults)
    #[arg(long, default_value = config::CONFIG_FILE_NAME, global = true)]
    config: PathBuf,

    /// Print item state as JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Final-quality encode of files and directories
    Compress {
        /// Image files or directories to load
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Directory for compressed files
        #[arg(long, default_value = "compressed")]
        out_dir: PathBuf,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Fast preview encode of one file through the debounced editing path
    Preview {
        path: PathBuf,

        /// Preview file to write (default: <name>.preview.<ext> next to the input)
        #[arg(long)]
        out: Option<PathBuf>,

        #[command(flatten)]
        settings: SettingsArgs,
    },
    /// Print a stock pressroom.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let mut editor_config = config::load_config(&cli.config)?;
    logging::init_logging(&editor_config.logging)?;

    match cli.command {
        Command::Compress {
            paths,
            out_dir,
            settings,
        } => {
            apply_overrides(&mut editor_config, &settings);
            compress(editor_config, &paths, &out_dir, &settings, cli.json).await?;
        }
        Command::Preview {
            path,
            out,
            settings,
        } => {
            apply_overrides(&mut editor_config, &settings);
            preview(editor_config, &path, out, &settings, cli.json).await?;
        }
        Command::GenConfig => {}
    }

    Ok(())
}

fn apply_overrides(config: &mut EditorConfig, settings: &SettingsArgs) {
    if let Some(format) = settings.format {
        config.encoder.format = format;
    }
}

fn build_registry(
    config: EditorConfig,
) -> (Registry, tokio::sync::mpsc::UnboundedReceiver<EditorEvent>) {
    let backend = Arc::new(config.build_backend());
    Registry::with_events(backend, config)
}

/// Load every input, apply settings and crop, then compress all items concurrently.
async fn compress(
    config: EditorConfig,
    inputs: &[PathBuf],
    out_dir: &Path,
    settings: &SettingsArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = config.encoder.format;
    let (registry, mut events) = build_registry(config);
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            if !json {
                output::print_event(&event);
            }
        }
    });

    let mut loaded = Vec::new();
    for path in collect_image_paths(inputs)? {
        match load(&registry, &path, settings).await {
            Ok(id) => loaded.push(id),
            Err(e) => log::warn!("skipping {}: {e}", path.display()),
        }
    }

    let mut tasks = tokio::task::JoinSet::new();
    for id in loaded.iter().copied() {
        let registry = registry.clone();
        tasks.spawn(async move { (id, registry.compress(id).await) });
    }
    while let Some(joined) = tasks.join_next().await {
        let (id, result) = joined?;
        if let Err(e) = result {
            log::warn!("{id} not compressed: {e}");
        }
    }

    std::fs::create_dir_all(out_dir)?;
    let items = registry.snapshot();
    for item in &items {
        if let Some(bytes) = registry.final_bytes(item.id) {
            let path = out_dir.join(output_name(&item.name, None, format));
            std::fs::write(&path, &bytes)?;
            log::info!("wrote {}", path.display());
        }
    }

    drop(registry);
    printer.await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        output::print_items(&items);
        output::print_summary(&items);
    }
    Ok(())
}

/// Drive one file through the interactive path: edits arm the debounce
/// timer and the preview is written once it fires.
async fn preview(
    config: EditorConfig,
    path: &Path,
    out: Option<PathBuf>,
    settings: &SettingsArgs,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = config.encoder.format;
    let (registry, mut events) = build_registry(config);
    let id = load(&registry, path, settings).await?;

    if !registry.has_pending_preview(id) {
        registry.regenerate_preview(id).await?;
    }

    loop {
        let Some(event) = events.recv().await else {
            return Err("event channel closed before the preview finished".into());
        };
        if !json {
            output::print_event(&event);
        }
        match event {
            EditorEvent::PreviewReady { id: ready, .. } if ready == id => break,
            EditorEvent::Failed { id: failed, message } if failed == id => {
                return Err(message.into());
            }
            _ => {}
        }
    }

    let out = out.unwrap_or_else(|| {
        let name = registry
            .item(id)
            .map(|item| item.name)
            .unwrap_or_default();
        path.with_file_name(output_name(&name, Some("preview"), format))
    });
    if let Some(bytes) = registry.preview_bytes(id) {
        std::fs::write(&out, &bytes)?;
        log::info!("wrote {}", out.display());
    }

    if let Some(item) = registry.item(id) {
        if json {
            println!("{}", serde_json::to_string_pretty(&item)?);
        } else {
            output::print_items(std::slice::from_ref(&item));
        }
    }
    Ok(())
}

/// Ingest one file and apply crop and settings to it.
async fn load(
    registry: &Registry,
    path: &Path,
    settings: &SettingsArgs,
) -> Result<ItemId, Box<dyn std::error::Error>> {
    let file = IngestedFile::from_path(path)?;
    let id = registry.ingest(file).await?;

    if settings.crop.is_some() || settings.aspect.is_some() {
        let mut crop = registry.open_crop(id, settings.aspect.unwrap_or_default())?;
        if let Some(rect) = settings.crop {
            if !crop.set_rect(rect) {
                return Err(format!("crop {rect:?} lies outside the image").into());
            }
        }
        registry
            .apply_crop(id, crop.rect(), crop.aspect())
            .await?;
    }

    if let Some(quality) = settings.quality {
        registry.update_setting(id, Setting::Quality(quality))?;
    }
    if let Some(width) = &settings.width {
        registry.update_dimension_text(id, Axis::Width, width)?;
    }
    if let Some(height) = &settings.height {
        registry.update_dimension_text(id, Axis::Height, height)?;
    }
    Ok(id)
}

/// `harbor.jpg` → `harbor.avif`, or `harbor.preview.avif` with a tag.
fn output_name(source_name: &str, tag: Option<&str>, format: OutputFormat) -> String {
    let stem = Path::new(source_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    match tag {
        Some(tag) => format!("{stem}.{tag}.{}", format.extension()),
        None => format!("{stem}.{}", format.extension()),
    }
}

fn parse_format(input: &str) -> Result<OutputFormat, String> {
    match input.to_ascii_lowercase().as_str() {
        "avif" => Ok(OutputFormat::Avif),
        "jpeg" | "jpg" => Ok(OutputFormat::Jpeg),
        other => Err(format!("unknown format {other:?} (expected avif or jpeg)")),
    }
}

fn parse_crop(input: &str) -> Result<CropRect, String> {
    let parts: Vec<u32> = input
        .split(',')
        .map(|p| p.trim().parse::<u32>())
        .collect::<Result<_, _>>()
        .map_err(|e| format!("invalid crop {input:?}: {e}"))?;
    match parts[..] {
        [x, y, width, height] if width > 0 && height > 0 => Ok(CropRect {
            x,
            y,
            width,
            height,
        }),
        _ => Err(format!(
            "invalid crop {input:?}: expected X,Y,WIDTH,HEIGHT with positive size"
        )),
    }
}

fn parse_aspect(input: &str) -> Result<AspectRatio, String> {
    AspectRatio::parse(input).ok_or_else(|| format!("invalid aspect ratio {input:?}"))
}

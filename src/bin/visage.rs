use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};

#[derive(Parser, Debug)]
#[command(name = "visage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a project over its photo and write a PNG.
    Composite(CompositeArgs),
    /// Composite and encode with format/quality/size options.
    Export(ExportArgs),
}

#[derive(Parser, Debug)]
struct CompositeArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Photo image the project was created against.
    #[arg(long)]
    photo: PathBuf,

    /// Optional landmarks JSON (enables region masks and the face midline).
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct ExportArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Photo image the project was created against.
    #[arg(long)]
    photo: PathBuf,

    /// Optional landmarks JSON (enables region masks and the face midline).
    #[arg(long)]
    landmarks: Option<PathBuf>,

    /// Output image path.
    #[arg(long)]
    out: PathBuf,

    /// Output format.
    #[arg(long, value_enum, default_value_t = FormatChoice::Png)]
    format: FormatChoice,

    /// JPEG quality (1-100).
    #[arg(long, default_value_t = 90)]
    quality: u8,

    /// Longest output edge in pixels.
    #[arg(long, default_value_t = 2048)]
    max_edge: u32,

    /// Emit a side-by-side before/after pair.
    #[arg(long)]
    before_after: bool,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum FormatChoice {
    Png,
    Jpeg,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Composite(args) => cmd_composite(args),
        Command::Export(args) => cmd_export(args),
    }
}

fn read_project_json(path: &Path) -> anyhow::Result<visage::Project> {
    let f = File::open(path).with_context(|| format!("open project '{}'", path.display()))?;
    let r = BufReader::new(f);
    let project: visage::Project =
        serde_json::from_reader(r).with_context(|| "parse project JSON")?;
    Ok(project)
}

fn read_landmarks_json(path: &Path) -> anyhow::Result<visage::Landmarks> {
    let f = File::open(path).with_context(|| format!("open landmarks '{}'", path.display()))?;
    let r = BufReader::new(f);
    let landmarks: visage::Landmarks =
        serde_json::from_reader(r).with_context(|| "parse landmarks JSON")?;
    Ok(landmarks)
}

fn load_photo(path: &Path) -> anyhow::Result<visage::ImageRgba8> {
    let img = image::open(path)
        .with_context(|| format!("open photo '{}'", path.display()))?
        .to_rgba8();
    let (width, height) = img.dimensions();
    Ok(visage::ImageRgba8::from_raw(width, height, img.into_raw())?)
}

fn ensure_parent_dir(path: &Path) -> anyhow::Result<()> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    Ok(())
}

fn cmd_composite(args: CompositeArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    project.validate()?;

    let pixels = load_photo(&args.photo)?;
    let landmarks = args
        .landmarks
        .as_deref()
        .map(read_landmarks_json)
        .transpose()?;

    let frame = visage::composite_project(&pixels, &project, landmarks.as_ref())?;

    ensure_parent_dir(&args.out)?;
    image::save_buffer_with_format(
        &args.out,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

fn cmd_export(args: ExportArgs) -> anyhow::Result<()> {
    let project = read_project_json(&args.in_path)?;
    project.validate()?;

    let pixels = load_photo(&args.photo)?;
    let landmarks = args
        .landmarks
        .as_deref()
        .map(read_landmarks_json)
        .transpose()?;

    let settings = visage::ExportSettings {
        format: match args.format {
            FormatChoice::Png => visage::ExportFormat::Png,
            FormatChoice::Jpeg => visage::ExportFormat::Jpeg,
        },
        quality: args.quality,
        max_edge: args.max_edge,
        before_after: args.before_after,
    };

    let composited = visage::composite_project(&pixels, &project, landmarks.as_ref())?;
    let bytes = if settings.before_after {
        visage::encode_before_after(&pixels, &composited, &settings)?
    } else {
        visage::encode_image(&composited, &settings)?
    };

    ensure_parent_dir(&args.out)?;
    std::fs::write(&args.out, &bytes)
        .with_context(|| format!("write output '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}

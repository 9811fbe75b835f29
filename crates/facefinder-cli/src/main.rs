use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use facefinder_core::{
    encode_known_faces, recognize_faces, validate, Config, DetectorModel, EncodeSummary,
    EncodingStore, MatchPolicy, MultiFacePolicy, OnnxFaceAnalyzer, Recognition, ValidationReport,
};
use serde_json::json;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "facefinder",
    about = "Train and test face recognition against a local encoding store"
)]
struct Cli {
    /// Encode every image under training/ and overwrite the store
    #[arg(long)]
    train: bool,

    /// Run recognition on every image under validation/
    #[arg(long)]
    validate: bool,

    /// Run recognition on a single image
    #[arg(short = 't', long = "test", value_name = "IMAGE")]
    test: Option<PathBuf>,

    /// Face detector: hog (fast) or cnn (more accurate)
    #[arg(long, value_enum, default_value_t = ModelArg::Hog)]
    model: ModelArg,

    /// How to pick among several matching stored faces
    #[arg(long, value_enum, default_value_t = MatchArg::First)]
    match_policy: MatchArg,

    /// What to do with training photos that contain several faces
    #[arg(long, value_enum, default_value_t = MultiFaceArg::First)]
    multi_face: MultiFaceArg,

    /// Project root containing training/, validation/ and output/
    #[arg(long)]
    root: Option<PathBuf>,

    /// Print results as JSON instead of text
    #[arg(long)]
    json: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Hog,
    Cnn,
}

impl From<ModelArg> for DetectorModel {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::Hog => DetectorModel::Hog,
            ModelArg::Cnn => DetectorModel::Cnn,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MatchArg {
    /// Earliest stored face that matches
    First,
    /// Closest matching stored face
    Nearest,
}

impl From<MatchArg> for MatchPolicy {
    fn from(arg: MatchArg) -> Self {
        match arg {
            MatchArg::First => MatchPolicy::FirstMatch,
            MatchArg::Nearest => MatchPolicy::Nearest,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum MultiFaceArg {
    /// Keep the first detected face
    First,
    /// Skip the photo
    Skip,
}

impl From<MultiFaceArg> for MultiFacePolicy {
    fn from(arg: MultiFaceArg) -> Self {
        match arg {
            MultiFaceArg::First => MultiFacePolicy::First,
            MultiFaceArg::Skip => MultiFacePolicy::Skip,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if !(cli.train || cli.validate || cli.test.is_some()) {
        Cli::command().print_help()?;
        println!();
        println!("Examples:");
        println!("  facefinder --train              # encode training/ into the store");
        println!("  facefinder --validate           # recognize every image in validation/");
        println!("  facefinder --test photo.jpg     # recognize faces in one image");
        return Ok(());
    }

    let config = Config::load(cli.root.clone()).context("loading configuration")?;
    config
        .ensure_layout()
        .with_context(|| format!("creating project layout under {}", config.root.display()))?;
    tracing::debug!(?config, "configuration loaded");

    let model = DetectorModel::from(cli.model);
    let policy = MatchPolicy::from(cli.match_policy);
    let mut analyzer = OnnxFaceAnalyzer::new(&config);

    let mut out = std::io::stdout().lock();

    if cli.train {
        eprintln!("Training started (model: {model})");
        let summary = encode_known_faces(&config, &mut analyzer, model, cli.multi_face.into())?;
        print_summary(&mut out, &summary, cli.json)?;
    }

    if cli.validate {
        eprintln!("Validation started (model: {model})");
        let report = validate(&config, &mut analyzer, model, policy)?;
        print_validation(&mut out, &report, &config.validation_dir, cli.json)?;
    }

    if let Some(image) = &cli.test {
        eprintln!("Testing: {}", image.display());
        let store = EncodingStore::load(&config.encodings_path)?;
        let faces = recognize_faces(image, &mut analyzer, model, &store, policy)?;
        if cli.json {
            let body = json!({ "path": image, "faces": faces });
            writeln!(out, "{}", serde_json::to_string_pretty(&body)?)?;
        } else {
            print_faces(&mut out, &faces)?;
        }
    }

    Ok(())
}

fn print_summary(out: &mut impl Write, summary: &EncodeSummary, as_json: bool) -> Result<()> {
    if as_json {
        writeln!(out, "{}", serde_json::to_string_pretty(summary)?)?;
        return Ok(());
    }

    for skipped in &summary.skipped {
        writeln!(out, "Skipped {}: {}", skipped.path.display(), skipped.reason)?;
    }
    writeln!(out, "Saved encodings: {}", summary.artifact.display())?;
    writeln!(out, "Total {} face encodings", summary.encoded)?;
    for (name, count) in &summary.per_identity {
        let plural = if *count == 1 { "" } else { "s" };
        writeln!(out, "  - {name}: {count} encoding{plural}")?;
    }
    Ok(())
}

fn print_validation(
    out: &mut impl Write,
    report: &ValidationReport,
    validation_dir: &Path,
    as_json: bool,
) -> Result<()> {
    if as_json {
        writeln!(out, "{}", serde_json::to_string_pretty(report)?)?;
        return Ok(());
    }

    if report.empty {
        writeln!(out, "Validation directory is empty: {}", validation_dir.display())?;
        return Ok(());
    }

    for image in &report.images {
        writeln!(out)?;
        writeln!(out, "Testing: {}", file_name(&image.path))?;
        print_faces(out, &image.faces)?;
    }
    Ok(())
}

fn print_faces(out: &mut impl Write, faces: &[Recognition]) -> Result<()> {
    writeln!(out, "Found {} face(s)", faces.len())?;
    for face in faces {
        writeln!(out, "  Face: {}", face.label)?;
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use handeye_core::{CorrespondenceSet, PatternGeometry, PatternKind, Real, TargetModel};
use handeye_pipeline::dataset::{
    load_image_detections, load_koide_poses, load_tabb_poses, read_tabb_object, PrecomputedDetections,
    TaggedPose,
};
use handeye_pipeline::{
    CalibrationRecord, CalibrationRecordAssembler, IntrinsicCalibrationSolver, SolverConfig,
};
use log::{info, warn};

/// Turn a hand-eye calibration dataset into a calibration record.
#[derive(Debug, Parser)]
#[command(name = "handeye-prep", author, version, about = "Hand-eye dataset preprocessing")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Directory with `<n>.png` images and `<n>.csv` hand poses.
    Koide(KoideArgs),
    /// Tabb RWHEC dataset (`calibration_object.txt`, `robot_cali.txt`, `images/camera<id>`).
    Tabb(TabbArgs),
}

#[derive(Debug, Args)]
struct OutputArgs {
    /// JSON file with target detections per image.
    /// Defaults to `detections.json` inside the image directory.
    #[arg(long, value_name = "FILE")]
    detections: Option<PathBuf>,

    /// Output filename (JSON).
    #[arg(short, long, value_name = "FILENAME", default_value = "out.json")]
    out: PathBuf,

    /// Solver settings (JSON). Defaults are used if omitted.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Debug, Args)]
struct KoideArgs {
    /// Directory containing the image and pose files.
    path: PathBuf,

    /// Target pattern size.
    #[arg(short, long, num_args = 2, value_names = ["W", "H"], default_values_t = [4, 11])]
    pattern_size: Vec<usize>,

    /// 0: chessboard, 1: asymmetric circles grid, 2: symmetric circles grid.
    #[arg(
        short = 't',
        long,
        value_name = "TYPE",
        default_value_t = 1,
        value_parser = clap::value_parser!(u8).range(0..=2)
    )]
    pattern_type: u8,

    /// Real world pitch of the target.
    #[arg(short, long, value_name = "SIZE", default_value_t = 0.016)]
    square_size: Real,

    #[command(flatten)]
    output: OutputArgs,
}

#[derive(Debug, Args)]
struct TabbArgs {
    /// Dataset directory (DS*).
    path: PathBuf,

    /// Camera to use; only one camera is processed per run.
    #[arg(short = 'i', long, value_name = "ID", default_value_t = 0)]
    camera_id: u32,

    #[command(flatten)]
    output: OutputArgs,
}

fn load_config(path: Option<&Path>) -> Result<SolverConfig> {
    match path {
        Some(path) => SolverConfig::from_json_file(path)
            .with_context(|| format!("loading solver config {}", path.display())),
        None => Ok(SolverConfig::default()),
    }
}

fn load_detector(explicit: Option<&Path>, image_dir: &Path) -> Result<PrecomputedDetections> {
    let path = explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| image_dir.join("detections.json"));
    PrecomputedDetections::from_json_file(&path)
        .with_context(|| format!("loading detections {}", path.display()))
}

/// Detect, calibrate and assemble; shared by both dataset layouts.
fn prepare(
    model: TargetModel,
    image_dir: &Path,
    wth: Vec<TaggedPose>,
    output: &OutputArgs,
) -> Result<CalibrationRecord> {
    let config = load_config(output.config.as_deref())?;
    let detector = load_detector(output.detections.as_deref(), image_dir)?;

    info!("Reading images...");
    let detections = load_image_detections(image_dir, &detector)?;
    let set = CorrespondenceSet::new(model.clone(), detections)?;

    info!("Calibrating camera intrinsic parameters...");
    let solution = IntrinsicCalibrationSolver::new(config).solve(&set)?;
    for warning in &solution.warnings {
        warn!("{warning}");
    }
    info!(
        "fx={:.3} fy={:.3} cx={:.3} cy={:.3}, rms {:.4} px",
        solution.camera.intrinsics.fx,
        solution.camera.intrinsics.fy,
        solution.camera.intrinsics.cx,
        solution.camera.intrinsics.cy,
        solution.rms
    );

    Ok(CalibrationRecordAssembler.from_solution(solution, model, set.into_views(), wth)?)
}

fn run_koide(args: &KoideArgs) -> Result<CalibrationRecord> {
    let [columns, rows] = args.pattern_size[..] else {
        return Err(anyhow!("pattern size needs exactly two values"));
    };
    let kind = PatternKind::from_index(args.pattern_type)
        .ok_or_else(|| anyhow!("unknown pattern type {}", args.pattern_type))?;
    let model = TargetModel::from_geometry(&PatternGeometry::new(
        columns,
        rows,
        args.square_size,
        kind,
    ));

    info!("Reading poses...");
    let wth = load_koide_poses(&args.path)?;
    prepare(model, &args.path, wth, &args.output)
}

fn run_tabb(args: &TabbArgs) -> Result<CalibrationRecord> {
    info!("Reading calibration object metadata...");
    let object = read_tabb_object(&args.path.join("calibration_object.txt"))?;
    let model = TargetModel::from_geometry(&object.geometry());

    info!("Reading poses...");
    let wth = load_tabb_poses(&args.path.join("robot_cali.txt"))?;

    let image_dir = args
        .path
        .join("images")
        .join(format!("camera{}", args.camera_id));
    prepare(model, &image_dir, wth, &args.output)
}

fn run(cli: &Cli) -> Result<()> {
    let (record, out) = match &cli.command {
        Command::Koide(args) => (run_koide(args)?, &args.output.out),
        Command::Tabb(args) => (run_tabb(args)?, &args.output.out),
    };
    record
        .write_json(out)
        .with_context(|| format!("writing {}", out.display()))?;
    info!("Output written to {}", out.display());
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();
    if let Err(err) = run(&cli) {
        eprintln!("error: {err:#}");
        std::process::exit(1);
    }
}

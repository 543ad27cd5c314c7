//! Command-line front end for the analysis engine.
//!
//! `inspect` summarizes recordings; `analyze` drives the full action
//! protocol in one shot: upload, calibrate, label row ranges, project,
//! fit a decision boundary and export the projected samples.

use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand, ValueEnum};

use rusty_nose::analysis::scaling::Scaling;
use rusty_nose::analysis::svm::{BoundaryParams, GammaSetting, Kernel};
use rusty_nose::app::{Action, App, FileUpload};
use rusty_nose::calibrate::CalibrationMethod;
use rusty_nose::data::loader;
use rusty_nose::state::InteractionMode;

#[derive(Parser)]
#[command(name = "rusty-nose", about = "Electronic-nose time-series analysis", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Load recordings and print a per-file summary.
    Inspect {
        /// Recording files (.csv, .json or .parquet)
        files: Vec<PathBuf>,
    },
    /// Run the calibrate → label → project → classify → export pipeline.
    Analyze {
        /// Recording files (.csv, .json or .parquet)
        files: Vec<PathBuf>,

        /// Dataset to analyze (defaults to the first uploaded file)
        #[arg(long)]
        active: Option<String>,

        /// Baseline correction formula
        #[arg(long, value_enum)]
        method: Option<MethodArg>,

        /// Constant baseline window as `start..end` row indices
        #[arg(long)]
        window: Option<String>,

        /// Linear baseline fit rows, comma separated (e.g. `0,5,19`)
        #[arg(long)]
        baseline_points: Option<String>,

        /// Label a row range: `name=start..end` (repeatable)
        #[arg(long = "label")]
        labels: Vec<String>,

        /// Feature scaling before PCA
        #[arg(long, value_enum, default_value_t = ScalingArg::Standardize)]
        scaling: ScalingArg,

        /// Projection dimensionality (2 or 3)
        #[arg(long, default_value_t = 2)]
        dims: usize,

        /// Fit a decision boundary with this kernel
        #[arg(long, value_enum)]
        kernel: Option<KernelArg>,

        /// SVM regularization parameter
        #[arg(long, default_value_t = 1.0)]
        c: f64,

        /// Kernel width: a positive number, `scale` or `auto`
        #[arg(long, default_value = "scale")]
        gamma: String,

        /// Polynomial kernel degree
        #[arg(long, default_value_t = 3)]
        degree: u32,

        /// Write the projected samples as CSV to this path
        #[arg(long)]
        export: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Ratio,
    Difference,
    InverseRatio,
}

impl From<MethodArg> for CalibrationMethod {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Ratio => CalibrationMethod::Ratio,
            MethodArg::Difference => CalibrationMethod::Difference,
            MethodArg::InverseRatio => CalibrationMethod::InverseRatio,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum ScalingArg {
    Standardize,
    MinMax,
}

impl From<ScalingArg> for Scaling {
    fn from(arg: ScalingArg) -> Self {
        match arg {
            ScalingArg::Standardize => Scaling::Standardize,
            ScalingArg::MinMax => Scaling::MinMax,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum KernelArg {
    Linear,
    Rbf,
    Poly,
}

impl From<KernelArg> for Kernel {
    fn from(arg: KernelArg) -> Self {
        match arg {
            KernelArg::Linear => Kernel::Linear,
            KernelArg::Rbf => Kernel::Rbf,
            KernelArg::Poly => Kernel::Polynomial,
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Command::Inspect { files } => inspect(&files),
        Command::Analyze {
            files,
            active,
            method,
            window,
            baseline_points,
            labels,
            scaling,
            dims,
            kernel,
            c,
            gamma,
            degree,
            export,
        } => analyze(AnalyzeArgs {
            files,
            active,
            method,
            window,
            baseline_points,
            labels,
            scaling,
            dims,
            kernel,
            c,
            gamma,
            degree,
            export,
        }),
    }
}

fn inspect(files: &[PathBuf]) -> anyhow::Result<()> {
    if files.is_empty() {
        bail!("no input files given");
    }
    for path in files {
        let table = loader::load_table(path)
            .with_context(|| format!("loading {}", path.display()))?;
        println!(
            "{}: {} rows, {} numeric channels {:?}",
            path.display(),
            table.n_rows(),
            table.numeric_channel_names().len(),
            table.numeric_channel_names()
        );
    }
    Ok(())
}

struct AnalyzeArgs {
    files: Vec<PathBuf>,
    active: Option<String>,
    method: Option<MethodArg>,
    window: Option<String>,
    baseline_points: Option<String>,
    labels: Vec<String>,
    scaling: ScalingArg,
    dims: usize,
    kernel: Option<KernelArg>,
    c: f64,
    gamma: String,
    degree: u32,
    export: Option<PathBuf>,
}

fn analyze(args: AnalyzeArgs) -> anyhow::Result<()> {
    if args.files.is_empty() {
        bail!("no input files given");
    }
    if !(args.dims == 2 || args.dims == 3) {
        bail!("--dims must be 2 or 3, got {}", args.dims);
    }

    let mut app = App::default();

    // Upload every file; per-file parse failures skip that file only.
    let uploads: Vec<FileUpload> = args
        .files
        .iter()
        .map(|path| FileUpload {
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            table: loader::load_table(path).map_err(|e| e.to_string()),
        })
        .collect();
    let output = app.apply(Action::UploadFiles(uploads));
    println!("{}", output.status);
    if let Some(report) = &output.upload_report {
        for (name, reason) in &report.skipped {
            eprintln!("skipped {name}: {reason}");
        }
        if report.added.is_empty() {
            bail!("no file could be loaded");
        }
    }

    if let Some(name) = &args.active {
        expect_ok(app.apply(Action::SelectActiveFile(name.clone())))?;
    }

    // Calibration: a constant window or a linear fit through clicked rows.
    if let Some(method) = args.method {
        let method: CalibrationMethod = method.into();
        match (&args.window, &args.baseline_points) {
            (Some(window), None) => {
                let (start, end) = parse_range(window)?;
                expect_ok(app.apply(Action::ApplyConstantCalibration { start, end, method }))?;
            }
            (None, Some(points)) => {
                expect_ok(app.apply(Action::ToggleMode(InteractionMode::BaselineSelection)))?;
                for index in parse_indices(points)? {
                    expect_ok(app.apply(Action::ClickPoint(index)))?;
                }
                expect_ok(app.apply(Action::ApplyLinearCalibration { method }))?;
                expect_ok(app.apply(Action::ToggleMode(InteractionMode::BaselineSelection)))?;
            }
            (Some(_), Some(_)) => bail!("--window and --baseline-points are mutually exclusive"),
            (None, None) => bail!("--method needs either --window or --baseline-points"),
        }
    }

    // Label row ranges of the active dataset.
    if !args.labels.is_empty() {
        expect_ok(app.apply(Action::ToggleMode(InteractionMode::Labeling)))?;
        for spec in &args.labels {
            let (name, start, end) = parse_label_spec(spec)?;
            for index in start..end {
                expect_ok(app.apply(Action::ClickPoint(index)))?;
            }
            expect_ok(app.apply(Action::CommitLabel(name)))?;
        }
        expect_ok(app.apply(Action::ToggleMode(InteractionMode::Labeling)))?;
    }

    expect_ok(app.apply(Action::RequestProjection {
        scaling: args.scaling.into(),
        dims: args.dims,
    }))?;

    if let Some(kernel) = args.kernel {
        let gamma: GammaSetting = args
            .gamma
            .parse()
            .map_err(|e: rusty_nose::NoseError| anyhow::anyhow!(e))?;
        let params = BoundaryParams {
            kernel: kernel.into(),
            c: args.c,
            gamma,
            degree: args.degree,
        };
        expect_ok(app.apply(Action::RequestBoundary(params)))?;
    }

    if let Some(view) = app.projection_view() {
        println!("{}", serde_json::to_string_pretty(&view)?);
    }

    if let Some(path) = &args.export {
        let output = app.apply(Action::RequestExport);
        if !output.ok {
            bail!("{}", output.status);
        }
        if let Some(csv) = output.export_csv {
            std::fs::write(path, csv)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Exported projection to {}", path.display());
        }
    }

    Ok(())
}

fn expect_ok(output: rusty_nose::app::ActionOutput) -> anyhow::Result<()> {
    if output.ok {
        if !output.status.is_empty() {
            println!("{}", output.status);
        }
        Ok(())
    } else {
        bail!("{}", output.status)
    }
}

/// Parse `start..end` into a half-open row range.
fn parse_range(s: &str) -> anyhow::Result<(usize, usize)> {
    let (start, end) = s
        .split_once("..")
        .with_context(|| format!("expected start..end, got '{s}'"))?;
    Ok((
        start.trim().parse().with_context(|| format!("bad row index '{start}'"))?,
        end.trim().parse().with_context(|| format!("bad row index '{end}'"))?,
    ))
}

/// Parse a comma-separated index list.
fn parse_indices(s: &str) -> anyhow::Result<Vec<usize>> {
    s.split(',')
        .map(|part| {
            part.trim()
                .parse()
                .with_context(|| format!("bad row index '{part}'"))
        })
        .collect()
}

/// Parse `name=start..end`.
fn parse_label_spec(s: &str) -> anyhow::Result<(String, usize, usize)> {
    let (name, range) = s
        .split_once('=')
        .with_context(|| format!("expected name=start..end, got '{s}'"))?;
    let (start, end) = parse_range(range)?;
    Ok((name.trim().to_string(), start, end))
}

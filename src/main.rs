use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Parser;
use flexi_logger::Logger;
use image::{DynamicImage, ImageReader};

use targetsight::{
    ConfigPatch, Configuration, DirectoryDebugSink, FrameSnapshotter, PipelineOutput, Stage,
    TargetPipeline,
};

#[derive(Parser)]
#[command(name = "targetsight")]
#[command(about = "Locate vision targets in images and report their offset from the aim point")]
struct Cli {
    /// Image files to process, in order
    #[arg(value_name = "IMAGE", required = true)]
    images: Vec<PathBuf>,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Stop after this stage
    #[arg(long, value_enum)]
    stage: Option<Stage>,

    /// JSON configuration file; missing fields keep their defaults
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Property override, e.g. --set red.low=10 (repeatable)
    #[arg(long = "set", value_name = "KEY=VALUE")]
    overrides: Vec<String>,

    /// Save intermediate images to directory (must be empty)
    #[arg(long, value_name = "DIR")]
    debug_out: Option<PathBuf>,

    /// Save each processed image to directory
    #[arg(long, value_name = "DIR")]
    save_result: Option<PathBuf>,

    /// Snapshot raw frames to directory in the background
    #[arg(long, value_name = "DIR")]
    snapshot_dir: Option<PathBuf>,

    /// Minimum time between snapshots
    #[arg(long, default_value_t = 1000)]
    snapshot_interval_ms: u64,

    /// Print reports as JSON lines
    #[arg(long)]
    json: bool,
}

fn load_config(args: &Cli) -> anyhow::Result<Configuration> {
    let mut config = match &args.config {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path.display(), e))?;
            serde_json::from_str(&text)
                .map_err(|e| anyhow::anyhow!("Failed to parse {}: {}", path.display(), e))?
        }
        None => Configuration::default(),
    };

    for raw in &args.overrides {
        let patch: ConfigPatch = raw.parse()?;
        config.apply(&patch)?;
    }

    if let Some(stage) = args.stage {
        config.stage = stage;
    }

    Ok(config)
}

fn print_output(path: &Path, output: &PipelineOutput, json: bool) -> anyhow::Result<()> {
    if json {
        let line = serde_json::json!({
            "file": path.display().to_string(),
            "stage": output.stage.name(),
            "elapsed_ms": output.elapsed.as_secs_f64() * 1e3,
            "reports": output.reports,
        });
        println!("{}", line);
        return Ok(());
    }

    println!("{}:", path.display());
    if output.reports.is_empty() {
        println!("  (stopped at stage '{}', no reports)", output.stage);
    }
    for report in &output.reports {
        if report.found {
            println!(
                "  {}: x={:.4} y={:.4}  ({:.2}°, {:.2}°)",
                report.category, report.offset_x, report.offset_y, report.angle_x_deg, report.angle_y_deg
            );
        } else {
            println!("  {}: not found", report.category);
        }
    }
    println!("  Processed in {:.3} ms", output.elapsed.as_secs_f64() * 1e3);
    Ok(())
}

#[derive(Debug, Default, PartialEq, Eq)]
struct BatchSummary {
    processed: usize,
    failed: usize,
}

fn load_image(path: &Path) -> anyhow::Result<DynamicImage> {
    ImageReader::open(path)?
        .with_guessed_format()?
        .decode()
        .map_err(|e| anyhow::anyhow!("Failed to decode image: {}", e))
}

/// Feeds every readable file through the pipeline in order.
///
/// A file that cannot be opened or decoded is reported on stderr and skipped.
/// Pipeline and `on_output` errors abort the run.
fn run_batch(
    pipeline: &mut TargetPipeline,
    config: &Configuration,
    paths: &[PathBuf],
    mut on_output: impl FnMut(usize, &Path, PipelineOutput) -> anyhow::Result<()>,
) -> anyhow::Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for (i, path) in paths.iter().enumerate() {
        let img = match load_image(path) {
            Ok(img) => img,
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                summary.failed += 1;
                continue;
            }
        };
        let output = pipeline.process_dynamic(&img, config)?;
        on_output(i, path, output)?;
        summary.processed += 1;
    }
    Ok(summary)
}

fn save_result(dir: &Path, index: usize, path: &Path, output: PipelineOutput) -> anyhow::Result<()> {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| format!("frame{}", index));
    let out_path = dir.join(format!("{:03}_{}.png", index + 1, stem));
    output
        .image
        .into_dynamic()
        .save(&out_path)
        .map_err(|e| anyhow::anyhow!("Failed to save {}: {}", out_path.display(), e))
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let _logger = Logger::try_with_str(if args.verbose { "debug" } else { "info" })?.start()?;

    let config = load_config(&args)?;
    if args.verbose {
        println!("Configuration: {}\n", serde_json::to_string(&config)?);
    }

    // Results go to stdout directly; the log sink would duplicate them
    let mut pipeline = TargetPipeline::new().without_telemetry();
    if let Some(dir) = &args.debug_out {
        pipeline = pipeline.with_debug_sink(Box::new(DirectoryDebugSink::new(dir)?));
    }
    if let Some(dir) = &args.snapshot_dir {
        let snapshots =
            FrameSnapshotter::spawn(dir, Duration::from_millis(args.snapshot_interval_ms))?;
        pipeline = pipeline.with_snapshots(snapshots);
    }
    if let Some(dir) = &args.save_result {
        std::fs::create_dir_all(dir)?;
    }

    let save_dir = args.save_result.as_deref();
    let summary = run_batch(&mut pipeline, &config, &args.images, |i, path, output| {
        print_output(path, &output, args.json)?;
        if let Some(dir) = save_dir {
            save_result(dir, i, path, output)?;
        }
        Ok(())
    })?;

    pipeline.release();

    if args.verbose {
        println!("{} files processed", summary.processed);
    }
    if summary.failed > 0 {
        eprintln!("{} of {} files could not be read", summary.failed, args.images.len());
    }
    Ok(())
}

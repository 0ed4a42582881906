use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use matseg::{
    BatchReport, DatasetInfo, LabelStrategy, Segmenter, SegmenterConfig, annotate_batch, export_batch,
    segment_batch,
};
use matseg_cli::{JobSpec, expand_input};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Segment images and write the overlay for each one
    Segment {
        /// Image file or folder of images
        #[arg(short, long)]
        input: PathBuf,
        /// Output directory for `<stem>_segmented.png` files
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Segmenter settings (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Labeling strategy, overrides the config file
        #[arg(long, value_parser = LabelStrategy::names().to_vec())]
        strategy: Option<String>,
        /// Also write `<stem>_segmented.txt` with the coverage percentage
        #[arg(long)]
        sidecar: bool,
    },
    /// Build a COCO-style polygon dataset from images
    Annotate {
        /// Image file or folder of images
        #[arg(short, long)]
        input: PathBuf,
        /// Path of the dataset JSON to write
        #[arg(short, long)]
        output: PathBuf,
        /// Segmenter settings (.toml or .json)
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Labeling strategy, overrides the config file
        #[arg(long, value_parser = LabelStrategy::names().to_vec())]
        strategy: Option<String>,
    },
    /// Run a job file (.toml or .json)
    Run {
        #[arg(short, long)]
        job: PathBuf,
    },
    /// Print the JSON schema of the job file
    Schema {
        /// Print the schema of the segmenter settings only
        #[arg(long)]
        segmenter_only: bool,
    },
}

fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match &cli.command {
        Commands::Segment { input, output_dir, config, strategy, sidecar } => {
            let segmenter = load_segmenter(config.as_deref(), strategy.as_deref())?;
            let paths = expand_input(input)?;
            run_segment(&segmenter, &paths, output_dir, *sidecar)?;
        }
        Commands::Annotate { input, output, config, strategy } => {
            let segmenter = load_segmenter(config.as_deref(), strategy.as_deref())?;
            let paths = expand_input(input)?;
            run_annotate(&segmenter, &paths, output, DatasetInfo::default())?;
        }
        Commands::Run { job } => {
            run_job(job)?;
        }
        Commands::Schema { segmenter_only } => {
            let schema = if *segmenter_only {
                serde_json::to_string_pretty(&SegmenterConfig::schema())?
            } else {
                serde_json::to_string_pretty(&schemars::schema_for!(JobSpec))?
            };
            println!("{schema}");
        }
    }

    Ok(())
}

fn load_segmenter(config: Option<&Path>, strategy: Option<&str>) -> Result<Segmenter> {
    let mut settings = match config {
        Some(path) => SegmenterConfig::from_file(path)?,
        None => SegmenterConfig::default(),
    };
    if let Some(name) = strategy {
        settings.strategy = name.to_string();
    }
    info!("Segmenter settings: {:?}", settings);
    Ok(settings.build()?)
}

fn run_segment(segmenter: &Segmenter, paths: &[PathBuf], output_dir: &Path, sidecar: bool) -> Result<()> {
    info!("Segmenting {} image(s) into {:?}", paths.len(), output_dir);
    let outcomes = segment_batch(segmenter, paths, output_dir, sidecar);

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    if failed == outcomes.len() {
        return Err(eyre!("All {} image(s) failed to segment", failed));
    }
    if failed > 0 {
        warn!("{} of {} image(s) were skipped", failed, outcomes.len());
    }
    info!("✅ Segmentation completed!");
    Ok(())
}

fn run_annotate(segmenter: &Segmenter, paths: &[PathBuf], output: &Path, info: DatasetInfo) -> Result<()> {
    let report = annotate_batch(segmenter, paths, info)?;
    write_dataset(&report, output)
}

fn write_dataset(report: &BatchReport, output: &Path) -> Result<()> {
    for (path, reason) in &report.failed {
        warn!("Skipped {:?}: {}", path, reason);
    }
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    report.dataset.to_json_file(output)?;
    info!(
        "✅ Wrote {} image(s) and {} annotation(s) to {:?}",
        report.processed,
        report.dataset.annotations.len(),
        output
    );
    Ok(())
}

fn run_job(job_path: &Path) -> Result<()> {
    let job = JobSpec::from_file(job_path)?;
    info!("Job: {:?}", job);

    let segmenter = job.segmenter.build()?;
    let paths = job.resolve_inputs()?;

    let Some(dataset) = &job.dataset else {
        return run_segment(&segmenter, &paths, &job.output_dir, job.sidecar);
    };

    let report = export_batch(
        &segmenter,
        &paths,
        &job.output_dir,
        job.sidecar,
        job.info.clone().unwrap_or_default(),
    )?;
    if report.processed == 0 {
        return Err(eyre!("All {} image(s) failed to segment", report.failed.len()));
    }
    write_dataset(&report, dataset)
}

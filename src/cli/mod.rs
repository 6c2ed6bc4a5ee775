//! Command-line interface for the converter.

use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::SplitConfig;
use crate::core::database::LogDatabase;
use crate::core::loaders::NuScenesDb;
use crate::processors::{SplitConverter, SplitSummary};
use crate::ConverterConfig;

#[derive(Parser)]
#[command(name = "radar-camera-converter")]
#[command(about = "Converts multi-sensor driving logs into a radar-fused annotated frame dataset", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert dataset splits into one JSON document each
    Convert {
        /// Dataset root directory
        #[arg(long)]
        root: Option<PathBuf>,
        /// Directory for the split documents
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Number of radar sweeps accumulated per channel
        #[arg(long)]
        sweeps: Option<usize>,
        /// Splits to convert (all configured splits when omitted)
        #[arg(short, long)]
        split: Vec<String>,
    },

    /// Render a single converted frame as a PNG
    Visualize {
        /// Dataset version, e.g. v1.0-mini
        version: String,
        /// Token of the sample to render
        sample_token: String,
        /// Camera channel, e.g. CAM_FRONT
        camera: String,
        /// Output PNG file path (defaults to <sample_token>_<camera>.png)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Also write the fused radar points of the frame as CSV
        #[arg(long)]
        radar_csv: Option<PathBuf>,
    },

    /// Write the default configuration as YAML
    WriteConfig {
        /// Output YAML file
        path: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Create a progress bar over the samples of a split
fn create_sample_bar(split: &str) -> ProgressBar {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} samples ({eta})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    pb.set_message(split.to_string());
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            format!("{}...", value.chars().take(36).collect::<String>())
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity (must come first)
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    // Load config
    let config = match &cli.config {
        Some(path) => match ConverterConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                error!("Failed to load config from {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => ConverterConfig::default(),
    };

    // Dispatch to subcommands
    match cli.command {
        Commands::Convert { root, output_dir, sweeps, split } => {
            cmd_convert(root, output_dir, sweeps, &split, config);
        }
        Commands::Visualize { version, sample_token, camera, output, radar_csv } => {
            cmd_visualize(&version, &sample_token, &camera, output, radar_csv, &config);
        }
        Commands::WriteConfig { path } => {
            cmd_write_config(&path, &config);
        }
    }
}

fn load_database(config: &ConverterConfig, version: &str) -> NuScenesDb {
    let spinner = create_spinner(&format!("Loading {} tables...", version));
    match NuScenesDb::load(&config.dataset.root, version, &config.radar.filters) {
        Ok(db) => {
            spinner.finish_and_clear();
            db
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to load {} from {}: {}", version, config.dataset.root.display(), e);
            std::process::exit(1);
        }
    }
}

fn summary_items(summary: &SplitSummary) -> Vec<(&'static str, String)> {
    vec![
        (
            "Output file",
            summary
                .output
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
        ),
        ("Samples", summary.samples.to_string()),
        ("Skipped samples", summary.skipped_samples.to_string()),
        ("Videos", summary.videos.to_string()),
        ("Images", summary.images.to_string()),
        ("Annotations", summary.annotations.to_string()),
        ("Hidden", summary.hidden.to_string()),
        ("Uncategorized boxes", summary.stats.uncategorized.to_string()),
        ("Unprojectable boxes", summary.stats.unprojectable.to_string()),
        ("Multi-attribute", summary.stats.multi_attribute.to_string()),
        ("Duration", format!("{:.2?}", summary.duration)),
    ]
}

fn cmd_convert(
    root: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    sweeps: Option<usize>,
    split_names: &[String],
    mut config: ConverterConfig,
) {
    let start = Instant::now();

    // CLI flags override the config file
    if let Some(root) = root {
        config.dataset.root = root;
    }
    if output_dir.is_some() {
        config.dataset.output_dir = output_dir;
    }
    if let Some(sweeps) = sweeps {
        config.radar.num_sweeps = sweeps;
    }
    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    let splits: Vec<SplitConfig> = if split_names.is_empty() {
        config.splits.clone()
    } else {
        let mut selected = Vec::with_capacity(split_names.len());
        for name in split_names {
            match config.split(name) {
                Some(split) => selected.push(split.clone()),
                None => {
                    error!("Unknown split '{}'", name);
                    std::process::exit(1);
                }
            }
        }
        selected
    };

    println!("Converting {} split(s)...", splits.len());
    println!("Dataset root: {}", config.dataset.root.display());
    println!("Output directory: {}", config.output_dir().display());
    println!("Radar sweeps: {}", config.radar.num_sweeps);

    let mut loaded: Option<NuScenesDb> = None;
    let mut total_images = 0;
    let mut total_annotations = 0;

    for split in &splits {
        let db = match loaded.take() {
            Some(db) if db.version() == split.version => db,
            _ => load_database(&config, &split.version),
        };

        let pb = create_sample_bar(&split.name);
        let result = SplitConverter::new(&db, &config)
            .with_progress(&pb)
            .write_split(&split.name);
        pb.finish_and_clear();

        match result {
            Ok(summary) => {
                info!("{} of {} samples converted", summary.samples, db.samples().len());
                total_images += summary.images;
                total_annotations += summary.annotations;
                print_summary(&format!("Split {} Complete", split.name), &summary_items(&summary));
            }
            Err(e) => {
                error!("Conversion of split {} failed: {:#}", split.name, e);
                std::process::exit(1);
            }
        }

        loaded = Some(db);
    }

    print_summary(
        "Conversion Complete",
        &[
            ("Splits", splits.len().to_string()),
            ("Images", total_images.to_string()),
            ("Annotations", total_annotations.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
}

fn cmd_visualize(
    version: &str,
    sample_token: &str,
    camera: &str,
    output: Option<PathBuf>,
    radar_csv: Option<PathBuf>,
    config: &ConverterConfig,
) {
    use crate::core::writers;
    use crate::visualization;

    let start = Instant::now();

    // Determine output path (default to <sample>_<camera>.png)
    let output_path = output.unwrap_or_else(|| PathBuf::from(format!("{}_{}.png", sample_token, camera)));

    println!("Visualizing frame...");
    println!("Sample: {}", sample_token);
    println!("Camera: {}", camera);
    println!("Output: {}", output_path.display());

    let db = load_database(config, version);

    let spinner = create_spinner("Converting frame...");
    let frame = match SplitConverter::new(&db, config).convert_frame(sample_token, camera) {
        Ok(frame) => frame,
        Err(e) => {
            spinner.finish_and_clear();
            error!("Failed to convert frame: {:#}", e);
            std::process::exit(1);
        }
    };

    if let Some(csv_path) = &radar_csv {
        spinner.set_message("Writing radar CSV...");
        if let Err(e) = writers::write_radar_csv(csv_path, &frame.image.radar_pc) {
            spinner.finish_and_clear();
            error!("Failed to write radar CSV: {}", e);
            std::process::exit(1);
        }
    }

    spinner.set_message("Rendering frame...");
    match visualization::render_frame(&output_path, &frame.image, &frame.annotations) {
        Ok(()) => {
            spinner.finish_and_clear();

            print_summary(
                "Visualization Complete",
                &[
                    ("Sample", sample_token.to_string()),
                    ("Camera", camera.to_string()),
                    ("Output PNG", output_path.display().to_string()),
                    (
                        "Radar CSV",
                        radar_csv
                            .as_deref()
                            .map(|p| p.display().to_string())
                            .unwrap_or_else(|| "-".to_string()),
                    ),
                    ("Radar points", frame.image.radar_pc.len().to_string()),
                    ("Annotations", frame.annotations.len().to_string()),
                    ("Hidden", frame.hidden.to_string()),
                    ("Duration", format!("{:.2?}", start.elapsed())),
                ],
            );
        }
        Err(e) => {
            spinner.finish_and_clear();
            error!("Visualization failed: {}", e);
            std::process::exit(1);
        }
    }
}

fn cmd_write_config(path: &Path, config: &ConverterConfig) {
    match config.to_yaml(path) {
        Ok(()) => println!("Wrote configuration to {}", path.display()),
        Err(e) => {
            error!("Failed to write configuration to {}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}
